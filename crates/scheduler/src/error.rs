use scanjob_queue::QueueError;

/// Errors returned by a [`crate::collaborators::BatchClient`].
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("Batch request failed: {0}")]
    Request(String),
    #[error("Pool not found: {0}")]
    PoolNotFound(String),
    #[error("Job not found: {0}")]
    JobNotFound(String),
}

/// Errors returned by the scan-run and snapshot stores.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store request failed: {0}")]
    Request(String),
}

/// Errors that abort a task creation cycle.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Batch(#[from] BatchError),
    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// Why a batch task's arguments cannot be tied to a scan run.
#[derive(Debug, thiserror::Error)]
pub enum TaskArgumentsError {
    #[error("Task arguments are not valid JSON: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("Task arguments are not a JSON object")]
    NotAnObject,
    #[error("Task arguments carry no scan id")]
    MissingScanId,
}

/// Failure to reconcile one failed batch task.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("Failed to read scan run {scan_id}: {source}")]
    Read {
        scan_id: String,
        #[source]
        source: StoreError,
    },
    #[error("Failed to update scan run {scan_id}: {source}")]
    Update {
        scan_id: String,
        #[source]
        source: StoreError,
    },
}
