use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a scan run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Pending,
    Accepted,
    Queued,
    Running,
    Completed,
    Failed,
}

impl RunState {
    /// Whether the run has reached a final state.
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed)
    }
}

/// The `run` section of a scan-run record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRun {
    pub state: RunState,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScanRun {
    pub fn failed(timestamp: DateTime<Utc>, error: impl Into<String>) -> Self {
        Self {
            state: RunState::Failed,
            timestamp,
            error: Some(error.into()),
        }
    }
}

/// A persisted scan-run record as seen by the job manager.
///
/// Only `run` is written here; the remaining fields belong to the upstream
/// request pipeline and are carried through unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRunResult {
    pub id: String,
    pub url: String,
    pub run: ScanRun,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_state_serializes_lowercase() {
        let json = serde_json::to_string(&RunState::Failed).unwrap();
        assert_eq!(json, "\"failed\"");
    }

    #[test]
    fn terminal_states() {
        assert!(RunState::Completed.is_terminal());
        assert!(RunState::Failed.is_terminal());
        assert!(!RunState::Queued.is_terminal());
        assert!(!RunState::Running.is_terminal());
    }

    #[test]
    fn failed_run_carries_error() {
        let now = Utc::now();
        let run = ScanRun::failed(now, "exit code 1");
        assert_eq!(run.state, RunState::Failed);
        assert_eq!(run.error.as_deref(), Some("exit code 1"));

        let value = serde_json::to_value(&run).unwrap();
        assert_eq!(value["state"], "failed");
        assert_eq!(value["error"], "exit code 1");
    }

    #[test]
    fn pending_run_has_no_error_field() {
        let run = ScanRun {
            state: RunState::Pending,
            timestamp: Utc::now(),
            error: None,
        };
        let value = serde_json::to_value(&run).unwrap();
        assert!(value.get("error").is_none());
    }
}
