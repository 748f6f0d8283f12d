pub mod error;
pub mod message;
pub mod memory;
pub mod parser;
pub mod sqs;

pub use error::QueueError;
pub use message::{MessageQueue, QueueHealth, QueueMessage};
pub use memory::MemoryQueue;
pub use parser::{parse_scan_request, ScanRequestMessage};
pub use sqs::SqsQueue;
