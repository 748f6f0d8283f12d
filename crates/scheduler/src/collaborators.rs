//! Services the job manager talks to.
//!
//! Implementations wrap the cloud SDK clients; retries and timeouts belong
//! there, not in the scheduler.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use scanjob_core::ScanRunResult;

use crate::batch::{BatchTask, BatchTaskDescriptor, JobTask};
use crate::error::{BatchError, StoreError};
use crate::pool::{PoolLoadSnapshot, PoolMetricsInfo};

/// Batch compute service hosting the scan pool and job.
#[async_trait]
pub trait BatchClient: Send + Sync {
    /// Capacity and current load of the pool.
    async fn get_pool_metrics_info(&self, pool_id: &str) -> Result<PoolMetricsInfo, BatchError>;

    /// Add tasks to the job. Returns one [`JobTask`] per descriptor, in order.
    async fn add_tasks(
        &self,
        job_id: &str,
        tasks: Vec<BatchTaskDescriptor>,
    ) -> Result<Vec<JobTask>, BatchError>;

    /// Tasks of the job that failed at or after `since`.
    async fn get_failed_tasks(
        &self,
        job_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<BatchTask>, BatchError>;
}

/// Sink for pool load snapshots. Diagnostic only.
#[async_trait]
pub trait PoolLoadSnapshotProvider: Send + Sync {
    async fn write_batch_pool_load_snapshot(&self, snapshot: &PoolLoadSnapshot) -> Result<(), StoreError>;
}

/// Persisted scan-run records.
#[async_trait]
pub trait ScanRunStore: Send + Sync {
    async fn read_scan_run(&self, scan_id: &str) -> Result<Option<ScanRunResult>, StoreError>;

    async fn update_scan_run(&self, result: &ScanRunResult) -> Result<(), StoreError>;
}
