//! Message queue trait and types.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::QueueError;

/// A raw message received from a queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueMessage {
    /// Unique message identifier from the queue provider.
    pub message_id: String,
    /// Raw message text (JSON string).
    pub message_text: String,
    /// Provider-specific handle needed to delete the message (e.g., SQS receipt handle).
    pub receipt_handle: String,
    /// When the message was sent to the queue.
    pub timestamp: DateTime<Utc>,
    /// Number of times this message has been dequeued.
    pub dequeue_count: u32,
}

/// Health status of a queue connection.
#[derive(Debug, Clone, Serialize)]
pub struct QueueHealth {
    /// Whether the queue is reachable.
    pub connected: bool,
    /// Approximate number of messages waiting in the queue.
    pub approximate_message_count: Option<u64>,
    /// Queue provider name (e.g., "sqs", "memory").
    pub provider: String,
}

impl fmt::Display for QueueHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "QueueHealth {{ connected: {}, messages: {:?}, provider: {} }}",
            self.connected, self.approximate_message_count, self.provider
        )
    }
}

/// Trait for scan request queue backends.
///
/// Dequeued messages stay invisible for the provider's visibility timeout and
/// come back unless they are deleted.
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Dequeue up to `count` messages from `queue`.
    ///
    /// Issues as many provider calls as needed. Returns fewer messages when the
    /// queue runs dry, and an empty vec when nothing is available.
    async fn get_messages_with_total_count(
        &self,
        queue: &str,
        count: usize,
    ) -> Result<Vec<QueueMessage>, QueueError>;

    /// Remove a processed message from the queue.
    async fn delete_message(&self, queue: &str, message: &QueueMessage) -> Result<(), QueueError>;

    /// Check queue connectivity and return health status.
    async fn health_check(&self, queue: &str) -> Result<QueueHealth, QueueError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_display_includes_depth_and_provider() {
        let health = QueueHealth {
            connected: true,
            approximate_message_count: Some(42),
            provider: "sqs".to_string(),
        };
        let display = health.to_string();
        assert!(display.contains("connected: true"));
        assert!(display.contains("Some(42)"));
        assert!(display.contains("provider: sqs"));
    }

    #[test]
    fn health_display_with_unknown_depth() {
        let health = QueueHealth {
            connected: false,
            approximate_message_count: None,
            provider: "memory".to_string(),
        };
        assert!(health.to_string().contains("messages: None"));
    }
}
