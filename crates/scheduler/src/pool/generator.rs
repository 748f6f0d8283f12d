use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use scanjob_core::config::JobManagerConfig;

use super::metrics::{PoolMetrics, PoolMetricsInfo};

/// Fixed settings of a [`PoolLoadGenerator`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoolLoadGeneratorConfig {
    pub target_queued_tasks_overload_ratio: f64,
    pub sampling_interval_in_seconds: u64,
}

impl From<&JobManagerConfig> for PoolLoadGeneratorConfig {
    fn from(config: &JobManagerConfig) -> Self {
        Self {
            target_queued_tasks_overload_ratio: config.target_queued_tasks_overload_ratio,
            sampling_interval_in_seconds: config.sampling_interval_secs,
        }
    }
}

/// Result of one load generation step, persisted for observability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolLoadSnapshot {
    #[serde(flatten)]
    pub pool_metrics_info: PoolMetricsInfo,
    pub tasks_increment_count_per_interval: u64,
    pub sampling_interval_in_seconds: u64,
    pub target_queued_tasks_overload_ratio: f64,
    pub processing_speed_per_interval: i64,
    pub processing_speed_per_minute: f64,
    /// Active tasks per running task; 0 when nothing runs.
    pub active_to_running_tasks_ratio: f64,
    pub timestamp: DateTime<Utc>,
}

/// Owns the load-feedback state of one pool.
#[derive(Debug, Clone)]
pub struct PoolLoadGenerator {
    config: PoolLoadGeneratorConfig,
    pool_metrics: PoolMetrics,
}

impl PoolLoadGenerator {
    pub fn new(config: PoolLoadGeneratorConfig) -> Self {
        Self {
            config,
            pool_metrics: PoolMetrics::new(),
        }
    }

    pub fn config(&self) -> &PoolLoadGeneratorConfig {
        &self.config
    }

    pub fn pool_metrics(&self) -> &PoolMetrics {
        &self.pool_metrics
    }

    /// Compute this interval's task increment and package it with the pool metadata.
    pub fn pool_load_snapshot(&mut self, pool_metrics_info: &PoolMetricsInfo) -> PoolLoadSnapshot {
        let increment = self.pool_metrics.tasks_increment_count(
            pool_metrics_info,
            self.config.target_queued_tasks_overload_ratio,
        );
        let processing_speed = self.pool_metrics.state().processing_speed.unwrap_or(0);

        let processing_speed_per_minute = if self.config.sampling_interval_in_seconds == 0 {
            0.0
        } else {
            processing_speed as f64 * 60.0 / self.config.sampling_interval_in_seconds as f64
        };

        let load = pool_metrics_info.load;
        let active_to_running_tasks_ratio = if load.running_tasks == 0 {
            0.0
        } else {
            load.active_tasks as f64 / load.running_tasks as f64
        };

        PoolLoadSnapshot {
            pool_metrics_info: pool_metrics_info.clone(),
            tasks_increment_count_per_interval: increment,
            sampling_interval_in_seconds: self.config.sampling_interval_in_seconds,
            target_queued_tasks_overload_ratio: self.config.target_queued_tasks_overload_ratio,
            processing_speed_per_interval: processing_speed,
            processing_speed_per_minute,
            active_to_running_tasks_ratio,
            timestamp: Utc::now(),
        }
    }

    /// Record how many tasks were actually added after the last snapshot.
    ///
    /// The queue may hold fewer messages than requested, and the pool may
    /// reject some tasks; the next drain estimate has to start from what
    /// really went in.
    pub fn set_last_tasks_increment_count(&mut self, count: u64) {
        self.pool_metrics.set_last_tasks_increment_count(count);
    }
}
