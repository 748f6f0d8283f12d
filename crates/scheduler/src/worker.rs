//! Scan job worker: the [`JobTaskHandler`] behind the scan job manager.
//!
//! Reads pool load, asks the [`PoolLoadGenerator`] how many tasks the pool can
//! take, pulls that many scan requests and marks scan runs failed when their
//! batch task fails.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use scanjob_core::{Config, ScanRun};
use scanjob_queue::MessageQueue;

use crate::batch::{BatchTask, JobTask};
use crate::collaborators::{BatchClient, PoolLoadSnapshotProvider, ScanRunStore};
use crate::creator::{JobTaskHandler, TaskCreationBatch};
use crate::error::{ReconcileError, SchedulerError};
use crate::pool::{PoolLoadGenerator, PoolLoadGeneratorConfig, PoolMetricsState};
use crate::reconcile::{ReconcileOutcome, ReconcileSummary};
use crate::task_args::TaskArguments;

/// Identity of the pool and queue a [`Worker`] serves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSettings {
    pub pool_id: String,
    pub queue_name: String,
}

impl WorkerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            pool_id: config.batch.pool_id.clone(),
            queue_name: config.queue.queue_name.clone(),
        }
    }
}

pub struct Worker {
    settings: WorkerSettings,
    batch: Arc<dyn BatchClient>,
    queue: Arc<dyn MessageQueue>,
    snapshots: Arc<dyn PoolLoadSnapshotProvider>,
    scan_runs: Arc<dyn ScanRunStore>,
    /// One generator per served pool. Only one cycle runs at a time, the
    /// mutex exists because the handler methods take `&self`.
    generator: Mutex<PoolLoadGenerator>,
}

impl Worker {
    pub fn new(
        settings: WorkerSettings,
        generator_config: PoolLoadGeneratorConfig,
        batch: Arc<dyn BatchClient>,
        queue: Arc<dyn MessageQueue>,
        snapshots: Arc<dyn PoolLoadSnapshotProvider>,
        scan_runs: Arc<dyn ScanRunStore>,
    ) -> Self {
        Self {
            settings,
            batch,
            queue,
            snapshots,
            scan_runs,
            generator: Mutex::new(PoolLoadGenerator::new(generator_config)),
        }
    }

    /// Current load-feedback state of the served pool.
    pub async fn pool_state(&self) -> PoolMetricsState {
        self.generator.lock().await.pool_metrics().state().clone()
    }

    /// Mark the scan run behind one failed task as failed.
    async fn reconcile_failed_task(&self, task: &BatchTask) -> Result<ReconcileOutcome, ReconcileError> {
        let args = match TaskArguments::parse(&task.task_arguments) {
            Ok(args) => args,
            Err(e) => {
                warn!(
                    task_id = %task.id,
                    task_arguments = %task.task_arguments,
                    error = %e,
                    "Failed task has no scan id, scan run state cannot be updated"
                );
                return Ok(ReconcileOutcome::Uncorrelated);
            }
        };
        let scan_id = args.scan_id;

        let scan_run = self
            .scan_runs
            .read_scan_run(&scan_id)
            .await
            .map_err(|source| ReconcileError::Read {
                scan_id: scan_id.clone(),
                source,
            })?;

        let Some(mut scan_run) = scan_run else {
            warn!(task_id = %task.id, scan_id = %scan_id, "Scan run of failed task not found");
            return Ok(ReconcileOutcome::ScanNotFound { scan_id });
        };

        if scan_run.run.state.is_terminal() {
            debug!(
                scan_id = %scan_id,
                state = ?scan_run.run.state,
                "Overwriting final scan run state with task failure"
            );
        }

        let failure = task.failure_summary();
        scan_run.run = ScanRun::failed(Utc::now(), failure.clone());
        self.scan_runs
            .update_scan_run(&scan_run)
            .await
            .map_err(|source| ReconcileError::Update {
                scan_id: scan_id.clone(),
                source,
            })?;

        info!(
            task_id = %task.id,
            scan_id = %scan_id,
            exit_code = ?task.exit_code,
            error = %failure,
            "Scan run marked failed after batch task failure"
        );
        Ok(ReconcileOutcome::Updated { scan_id })
    }
}

#[async_trait]
impl JobTaskHandler for Worker {
    async fn get_messages_for_task_creation(&self) -> Result<TaskCreationBatch, SchedulerError> {
        let pool_metrics_info = self
            .batch
            .get_pool_metrics_info(&self.settings.pool_id)
            .await?;

        let snapshot = self
            .generator
            .lock()
            .await
            .pool_load_snapshot(&pool_metrics_info);

        info!(
            pool_id = %snapshot.pool_metrics_info.id,
            max_tasks = snapshot.pool_metrics_info.max_tasks_per_pool,
            active = snapshot.pool_metrics_info.load.active_tasks,
            running = snapshot.pool_metrics_info.load.running_tasks,
            pending = snapshot.pool_metrics_info.load.pending_tasks,
            processing_speed = snapshot.processing_speed_per_interval,
            increment = snapshot.tasks_increment_count_per_interval,
            "Pool load snapshot"
        );

        if let Err(e) = self.snapshots.write_batch_pool_load_snapshot(&snapshot).await {
            warn!(pool_id = %self.settings.pool_id, error = %e, "Failed to persist pool load snapshot");
        }

        let requested = snapshot.tasks_increment_count_per_interval;
        if requested == 0 {
            return Ok(TaskCreationBatch {
                requested,
                messages: Vec::new(),
            });
        }

        let count = usize::try_from(requested).unwrap_or(usize::MAX);
        let messages = self
            .queue
            .get_messages_with_total_count(&self.settings.queue_name, count)
            .await?;

        if messages.is_empty() {
            info!(queue = %self.settings.queue_name, "Scan request queue is empty");
        }

        Ok(TaskCreationBatch { requested, messages })
    }

    async fn on_tasks_added(&self, tasks: &[JobTask]) {
        self.generator
            .lock()
            .await
            .set_last_tasks_increment_count(tasks.len() as u64);
    }

    async fn handle_failed_tasks(&self, tasks: &[BatchTask]) -> ReconcileSummary {
        let results = join_all(tasks.iter().map(|task| self.reconcile_failed_task(task))).await;

        let mut summary = ReconcileSummary::default();
        for (task, result) in tasks.iter().zip(&results) {
            if let Err(e) = result {
                error!(task_id = %task.id, error = %e, "Failed to reconcile failed task");
            }
            summary.record(result);
        }
        summary
    }
}
