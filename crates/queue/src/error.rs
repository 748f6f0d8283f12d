//! Queue error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue unreachable: {0}")]
    Connection(String),

    #[error("queue not found: {0}")]
    NotFound(String),

    #[error("malformed scan request: {0}")]
    MalformedRequest(String),

    #[error("unexpected provider response: {0}")]
    InvalidResponse(String),

    #[error("failed to delete message: {0}")]
    Delete(String),
}
