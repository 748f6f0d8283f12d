//! Batch task creator -- the job manager's control loop.
//!
//! Split into focused submodules:
//! - `core`: BatchTaskCreator struct, configuration and accessors
//! - `cycle`: one task creation cycle and the timed run loop
//! - `metrics`: totals accumulated across cycles

mod core;
mod cycle;
mod metrics;

use async_trait::async_trait;
use serde::Serialize;

use scanjob_queue::QueueMessage;

use crate::batch::{BatchTask, JobTask};
use crate::error::SchedulerError;
use crate::reconcile::ReconcileSummary;

pub use self::core::{BatchTaskCreator, CreatorConfig};
pub use self::metrics::CreatorMetrics;

/// Messages pulled for one cycle, with the increment they were requested for.
#[derive(Debug, Clone, Default)]
pub struct TaskCreationBatch {
    pub requested: u64,
    pub messages: Vec<QueueMessage>,
}

/// Job-specific steps plugged into a [`BatchTaskCreator`].
#[async_trait]
pub trait JobTaskHandler: Send + Sync {
    /// Decide how many tasks the pool can take and pull that many messages.
    async fn get_messages_for_task_creation(&self) -> Result<TaskCreationBatch, SchedulerError>;

    /// Called every cycle with the tasks the batch service accepted (possibly none).
    async fn on_tasks_added(&self, tasks: &[JobTask]);

    /// Reconcile failed tasks. Per-task problems are logged and counted, never returned.
    async fn handle_failed_tasks(&self, tasks: &[BatchTask]) -> ReconcileSummary;
}

/// What one cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// Increment computed by the load generator.
    pub requested: u64,
    /// Messages received from the queue.
    pub dequeued: usize,
    /// Tasks accepted by the batch service.
    pub added: usize,
    /// Tasks the batch service refused; their messages stay queued.
    pub rejected: usize,
    /// Messages dropped because they carry no usable scan id.
    pub poison: usize,
    pub reconcile: ReconcileSummary,
}
