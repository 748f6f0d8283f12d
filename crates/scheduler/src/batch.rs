//! Batch job and task types exchanged with a [`crate::collaborators::BatchClient`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A task to be added to the batch job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchTaskDescriptor {
    pub id: String,
    /// Id of the queue message the task was created from.
    pub message_id: String,
    /// JSON handed to the scan process, see [`crate::task_args::TaskArguments`].
    pub task_arguments: String,
}

/// Submission state of a task after `add_tasks`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobTaskState {
    Queued,
    Failed,
}

/// Per-task result of `add_tasks`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobTask {
    pub id: String,
    pub state: JobTaskState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl JobTask {
    pub fn is_queued(&self) -> bool {
        self.state == JobTaskState::Queued
    }
}

/// Why the batch service considers a task failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureInfo {
    pub category: String,
    pub message: String,
}

/// A task that finished unsuccessfully.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchTask {
    pub id: String,
    pub task_arguments: String,
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_info: Option<FailureInfo>,
    pub timestamp: DateTime<Utc>,
}

impl BatchTask {
    /// Error text recorded on the scan run this task belonged to.
    pub fn failure_summary(&self) -> String {
        let exit_code = self
            .exit_code
            .map_or_else(|| "none".to_string(), |code| code.to_string());
        match &self.failure_info {
            Some(info) => format!(
                "Task {} terminated unexpectedly. Exit code: {}. Failure: {}: {}",
                self.id, exit_code, info.category, info.message
            ),
            None => format!(
                "Task {} terminated unexpectedly. Exit code: {}",
                self.id, exit_code
            ),
        }
    }
}
