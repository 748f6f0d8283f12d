use std::collections::HashSet;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::info;

use scanjob_core::Config;
use scanjob_queue::MessageQueue;

use crate::batch::BatchTask;
use crate::collaborators::BatchClient;

use super::metrics::CreatorMetrics;
use super::JobTaskHandler;

/// Settings of a [`BatchTaskCreator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatorConfig {
    pub job_id: String,
    pub queue_name: String,
    /// Pause between two cycles.
    pub add_tasks_interval: Duration,
    /// `run` returns once this much time has passed.
    pub max_wall_clock_time: Duration,
}

impl CreatorConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            job_id: config.batch.job_id.clone(),
            queue_name: config.queue.queue_name.clone(),
            add_tasks_interval: Duration::from_secs(config.job_manager.add_tasks_interval_secs),
            max_wall_clock_time: Duration::from_secs(config.job_manager.max_wall_clock_time_minutes * 60),
        }
    }
}

/// Lower bound of the failed-task query. It only moves to timestamps the
/// batch service reported, never to the local clock.
#[derive(Debug)]
pub(super) struct FailedTaskWindow {
    since: DateTime<Utc>,
    /// Tasks already handed out whose timestamp equals `since`; the query is
    /// inclusive so they come back once more.
    seen_at_since: HashSet<String>,
}

impl FailedTaskWindow {
    pub(super) fn new(since: DateTime<Utc>) -> Self {
        Self {
            since,
            seen_at_since: HashSet::new(),
        }
    }

    pub(super) fn since(&self) -> DateTime<Utc> {
        self.since
    }

    /// Drop tasks reported by an earlier query and move the window to the
    /// newest task timestamp. An empty result leaves it where it is.
    pub(super) fn advance(&mut self, failed: Vec<BatchTask>) -> Vec<BatchTask> {
        let fresh: Vec<BatchTask> = failed
            .into_iter()
            .filter(|task| !(task.timestamp == self.since && self.seen_at_since.contains(&task.id)))
            .collect();

        let Some(newest) = fresh.iter().map(|task| task.timestamp).max() else {
            return fresh;
        };
        if newest > self.since {
            self.since = newest;
            self.seen_at_since.clear();
        }
        self.seen_at_since.extend(
            fresh
                .iter()
                .filter(|task| task.timestamp == self.since)
                .map(|task| task.id.clone()),
        );
        fresh
    }
}

/// Drives task creation for one batch job: pulls messages through its
/// [`JobTaskHandler`], submits them as tasks and reconciles failed tasks.
///
/// Cycles must not overlap; `run` executes them one after another.
pub struct BatchTaskCreator {
    pub(super) config: CreatorConfig,
    pub(super) batch: Arc<dyn BatchClient>,
    pub(super) queue: Arc<dyn MessageQueue>,
    pub(super) handler: Arc<dyn JobTaskHandler>,
    pub(super) metrics: Arc<RwLock<CreatorMetrics>>,
    pub(super) failed_tasks: Mutex<FailedTaskWindow>,
}

impl BatchTaskCreator {
    pub fn new(
        config: CreatorConfig,
        batch: Arc<dyn BatchClient>,
        queue: Arc<dyn MessageQueue>,
        handler: Arc<dyn JobTaskHandler>,
    ) -> Self {
        info!(
            job_id = %config.job_id,
            queue = %config.queue_name,
            interval = ?config.add_tasks_interval,
            max_wall_clock = ?config.max_wall_clock_time,
            "Batch task creator initialized"
        );
        Self {
            config,
            batch,
            queue,
            handler,
            metrics: Arc::new(RwLock::new(CreatorMetrics::default())),
            failed_tasks: Mutex::new(FailedTaskWindow::new(Utc::now())),
        }
    }

    pub fn config(&self) -> &CreatorConfig {
        &self.config
    }

    /// Get a snapshot of the accumulated metrics.
    pub fn metrics(&self) -> CreatorMetrics {
        match self.metrics.read() {
            Ok(m) => m.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Get an Arc to the metrics (for external reads without cloning).
    pub fn metrics_handle(&self) -> Arc<RwLock<CreatorMetrics>> {
        Arc::clone(&self.metrics)
    }
}
