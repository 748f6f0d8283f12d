//! In-process queue backend.
//!
//! Mirrors the visibility semantics of a cloud queue closely enough for local
//! runs and tests: dequeued messages move to an in-flight set and only leave
//! the queue when deleted. [`MemoryQueue::requeue_in_flight`] plays the role
//! of an expired visibility timeout.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::message::{MessageQueue, QueueHealth, QueueMessage};
use crate::error::QueueError;

#[derive(Debug, Default)]
struct QueueState {
    ready: VecDeque<QueueMessage>,
    /// Dequeued but not yet deleted, keyed by receipt handle.
    in_flight: HashMap<String, QueueMessage>,
}

/// In-memory [`MessageQueue`] holding any number of named queues.
#[derive(Debug, Default)]
pub struct MemoryQueue {
    queues: Mutex<HashMap<String, QueueState>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a message and return its id.
    pub async fn send(&self, queue: &str, message_text: impl Into<String>) -> String {
        let message_id = Uuid::new_v4().to_string();
        let msg = QueueMessage {
            message_id: message_id.clone(),
            message_text: message_text.into(),
            receipt_handle: String::new(),
            timestamp: Utc::now(),
            dequeue_count: 0,
        };
        let mut queues = self.queues.lock().await;
        queues.entry(queue.to_string()).or_default().ready.push_back(msg);
        message_id
    }

    /// Messages waiting to be dequeued.
    pub async fn ready_len(&self, queue: &str) -> usize {
        let queues = self.queues.lock().await;
        queues.get(queue).map_or(0, |q| q.ready.len())
    }

    /// Messages dequeued and not yet deleted.
    pub async fn in_flight_len(&self, queue: &str) -> usize {
        let queues = self.queues.lock().await;
        queues.get(queue).map_or(0, |q| q.in_flight.len())
    }

    /// Make every in-flight message visible again. Returns how many were requeued.
    pub async fn requeue_in_flight(&self, queue: &str) -> usize {
        let mut queues = self.queues.lock().await;
        let Some(state) = queues.get_mut(queue) else {
            return 0;
        };
        let count = state.in_flight.len();
        for (_, mut msg) in state.in_flight.drain() {
            msg.receipt_handle.clear();
            state.ready.push_back(msg);
        }
        count
    }
}

#[async_trait]
impl MessageQueue for MemoryQueue {
    async fn get_messages_with_total_count(
        &self,
        queue: &str,
        count: usize,
    ) -> Result<Vec<QueueMessage>, QueueError> {
        let mut queues = self.queues.lock().await;
        let state = queues.entry(queue.to_string()).or_default();

        let take = count.min(state.ready.len());
        let mut messages = Vec::with_capacity(take);
        for mut msg in state.ready.drain(..take) {
            msg.receipt_handle = Uuid::new_v4().to_string();
            msg.dequeue_count += 1;
            state.in_flight.insert(msg.receipt_handle.clone(), msg.clone());
            messages.push(msg);
        }

        debug!(queue, requested = count, received = messages.len(), "Dequeued memory messages");
        Ok(messages)
    }

    async fn delete_message(&self, queue: &str, message: &QueueMessage) -> Result<(), QueueError> {
        let mut queues = self.queues.lock().await;
        let state = queues
            .get_mut(queue)
            .ok_or_else(|| QueueError::NotFound(queue.to_string()))?;

        state
            .in_flight
            .remove(&message.receipt_handle)
            .map(|_| ())
            .ok_or_else(|| {
                QueueError::Delete(format!(
                    "message {} is not in flight (receipt {})",
                    message.message_id, message.receipt_handle
                ))
            })
    }

    async fn health_check(&self, queue: &str) -> Result<QueueHealth, QueueError> {
        Ok(QueueHealth {
            connected: true,
            approximate_message_count: Some(self.ready_len(queue).await as u64),
            provider: "memory".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUEUE: &str = "scan-requests";

    #[tokio::test]
    async fn dequeue_is_bounded_by_count() {
        let queue = MemoryQueue::new();
        for i in 0..5 {
            queue.send(QUEUE, format!(r#"{{"id":"scan-{i}"}}"#)).await;
        }

        let batch = queue.get_messages_with_total_count(QUEUE, 3).await.unwrap();
        assert_eq!(batch.len(), 3);
        assert_eq!(queue.ready_len(QUEUE).await, 2);
        assert_eq!(queue.in_flight_len(QUEUE).await, 3);
        assert!(batch.iter().all(|m| m.dequeue_count == 1));
        assert!(batch.iter().all(|m| !m.receipt_handle.is_empty()));
    }

    #[tokio::test]
    async fn dequeue_returns_fewer_when_queue_runs_dry() {
        let queue = MemoryQueue::new();
        queue.send(QUEUE, "{}").await;

        let batch = queue.get_messages_with_total_count(QUEUE, 10).await.unwrap();
        assert_eq!(batch.len(), 1);

        let empty = queue.get_messages_with_total_count(QUEUE, 10).await.unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn unknown_queue_yields_nothing() {
        let queue = MemoryQueue::new();
        let batch = queue.get_messages_with_total_count("missing", 4).await.unwrap();
        assert!(batch.is_empty());
    }

    #[tokio::test]
    async fn delete_removes_in_flight_message() {
        let queue = MemoryQueue::new();
        queue.send(QUEUE, "{}").await;
        let batch = queue.get_messages_with_total_count(QUEUE, 1).await.unwrap();

        queue.delete_message(QUEUE, &batch[0]).await.unwrap();
        assert_eq!(queue.in_flight_len(QUEUE).await, 0);

        let again = queue.delete_message(QUEUE, &batch[0]).await;
        assert!(matches!(again, Err(QueueError::Delete(_))));
    }

    #[tokio::test]
    async fn requeue_makes_messages_visible_again() {
        let queue = MemoryQueue::new();
        let id = queue.send(QUEUE, "{}").await;
        queue.get_messages_with_total_count(QUEUE, 1).await.unwrap();

        assert_eq!(queue.requeue_in_flight(QUEUE).await, 1);
        let batch = queue.get_messages_with_total_count(QUEUE, 1).await.unwrap();
        assert_eq!(batch[0].message_id, id);
        assert_eq!(batch[0].dequeue_count, 2);
    }

    #[tokio::test]
    async fn health_reports_ready_depth() {
        let queue = MemoryQueue::new();
        queue.send(QUEUE, "{}").await;
        queue.send(QUEUE, "{}").await;

        let health = queue.health_check(QUEUE).await.unwrap();
        assert!(health.connected);
        assert_eq!(health.approximate_message_count, Some(2));
        assert_eq!(health.provider, "memory");
    }
}
