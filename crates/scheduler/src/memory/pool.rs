use std::collections::VecDeque;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::batch::{BatchTask, BatchTaskDescriptor, FailureInfo, JobTask, JobTaskState};
use crate::collaborators::BatchClient;
use crate::error::BatchError;
use crate::pool::{PoolLoad, PoolMetricsInfo};

/// Shape of a [`SimulatedPool`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedPoolConfig {
    pub pool_id: String,
    pub max_tasks_per_pool: u64,
    /// Ticks a task runs before it finishes. Values below 1 count as 1.
    pub task_duration_ticks: u64,
    /// Every n-th finished task fails.
    pub fail_every: Option<u64>,
    /// Every n-th submitted task is refused by `add_tasks`.
    pub reject_every: Option<u64>,
}

impl Default for SimulatedPoolConfig {
    fn default() -> Self {
        Self {
            pool_id: "scan-pool".to_string(),
            max_tasks_per_pool: 32,
            task_duration_ticks: 2,
            fail_every: None,
            reject_every: None,
        }
    }
}

/// Running totals of a [`SimulatedPool`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SimulatedPoolStats {
    pub active: u64,
    pub submitted: u64,
    pub rejected: u64,
    pub completed: u64,
    pub failed: u64,
}

#[derive(Debug)]
struct SimTask {
    id: String,
    task_arguments: String,
    remaining_ticks: u64,
}

#[derive(Debug, Default)]
struct PoolState {
    /// Active tasks in submission order; the first `max_tasks_per_pool` run.
    tasks: VecDeque<SimTask>,
    failed: Vec<BatchTask>,
    stats: SimulatedPoolStats,
}

/// A batch pool that runs tasks in discrete ticks.
///
/// Nothing happens between calls to [`SimulatedPool::advance`], so every
/// observation is deterministic.
#[derive(Debug)]
pub struct SimulatedPool {
    config: SimulatedPoolConfig,
    state: Mutex<PoolState>,
}

fn hits(every: Option<u64>, n: u64) -> bool {
    matches!(every, Some(k) if k > 0 && n % k == 0)
}

impl SimulatedPool {
    pub fn new(config: SimulatedPoolConfig) -> Self {
        Self {
            config,
            state: Mutex::new(PoolState::default()),
        }
    }

    pub fn config(&self) -> &SimulatedPoolConfig {
        &self.config
    }

    pub async fn stats(&self) -> SimulatedPoolStats {
        let state = self.state.lock().await;
        SimulatedPoolStats {
            active: state.tasks.len() as u64,
            ..state.stats
        }
    }

    /// Run one tick. Returns how many tasks finished, failed ones included.
    pub async fn advance(&self) -> usize {
        let mut state = self.state.lock().await;
        let running = state.tasks.len().min(self.config.max_tasks_per_pool as usize);

        let mut still_active = VecDeque::with_capacity(state.tasks.len());
        let mut finished = Vec::new();
        for (i, mut task) in std::mem::take(&mut state.tasks).into_iter().enumerate() {
            if i < running {
                task.remaining_ticks = task.remaining_ticks.saturating_sub(1);
                if task.remaining_ticks == 0 {
                    finished.push(task);
                    continue;
                }
            }
            still_active.push_back(task);
        }
        state.tasks = still_active;

        let count = finished.len();
        for task in finished {
            let n = state.stats.completed + state.stats.failed + 1;
            if hits(self.config.fail_every, n) {
                state.stats.failed += 1;
                state.failed.push(BatchTask {
                    id: task.id,
                    task_arguments: task.task_arguments,
                    exit_code: Some(1),
                    failure_info: Some(FailureInfo {
                        category: "UserError".to_string(),
                        message: "Scan process exited with a non-zero code".to_string(),
                    }),
                    timestamp: Utc::now(),
                });
            } else {
                state.stats.completed += 1;
            }
        }

        debug!(
            pool_id = %self.config.pool_id,
            finished = count,
            active = state.tasks.len(),
            "Simulated pool advanced"
        );
        count
    }
}

#[async_trait]
impl BatchClient for SimulatedPool {
    async fn get_pool_metrics_info(&self, pool_id: &str) -> Result<PoolMetricsInfo, BatchError> {
        if pool_id != self.config.pool_id {
            return Err(BatchError::PoolNotFound(pool_id.to_string()));
        }
        let state = self.state.lock().await;
        let active = state.tasks.len() as u64;
        let running = active.min(self.config.max_tasks_per_pool);
        Ok(PoolMetricsInfo {
            id: self.config.pool_id.clone(),
            max_tasks_per_pool: self.config.max_tasks_per_pool,
            load: PoolLoad {
                active_tasks: active,
                running_tasks: running,
                pending_tasks: active - running,
            },
        })
    }

    async fn add_tasks(
        &self,
        _job_id: &str,
        tasks: Vec<BatchTaskDescriptor>,
    ) -> Result<Vec<JobTask>, BatchError> {
        let mut state = self.state.lock().await;
        let now = Utc::now();

        let results = tasks
            .into_iter()
            .map(|descriptor| {
                state.stats.submitted += 1;
                if hits(self.config.reject_every, state.stats.submitted) {
                    state.stats.rejected += 1;
                    return JobTask {
                        id: descriptor.id,
                        state: JobTaskState::Failed,
                        error: Some("Task rejected by simulated pool".to_string()),
                        timestamp: now,
                    };
                }
                state.tasks.push_back(SimTask {
                    id: descriptor.id.clone(),
                    task_arguments: descriptor.task_arguments,
                    remaining_ticks: self.config.task_duration_ticks.max(1),
                });
                JobTask {
                    id: descriptor.id,
                    state: JobTaskState::Queued,
                    error: None,
                    timestamp: now,
                }
            })
            .collect();

        Ok(results)
    }

    async fn get_failed_tasks(
        &self,
        _job_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<BatchTask>, BatchError> {
        let mut state = self.state.lock().await;
        // Callers only move `since` forward, so older failures are never asked for again.
        state.failed.retain(|task| task.timestamp >= since);
        Ok(state.failed.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(max: u64, duration: u64) -> SimulatedPool {
        SimulatedPool::new(SimulatedPoolConfig {
            pool_id: "pool-1".to_string(),
            max_tasks_per_pool: max,
            task_duration_ticks: duration,
            ..SimulatedPoolConfig::default()
        })
    }

    fn descriptors(n: usize) -> Vec<BatchTaskDescriptor> {
        (0..n)
            .map(|i| BatchTaskDescriptor {
                id: format!("task-{i}"),
                message_id: format!("msg-{i}"),
                task_arguments: format!(r#"{{"id":"scan-{i}"}}"#),
            })
            .collect()
    }

    #[tokio::test]
    async fn load_splits_running_and_pending() {
        let pool = pool(4, 1);
        pool.add_tasks("job", descriptors(10)).await.unwrap();

        let info = pool.get_pool_metrics_info("pool-1").await.unwrap();
        assert_eq!(info.max_tasks_per_pool, 4);
        assert_eq!(
            info.load,
            PoolLoad {
                active_tasks: 10,
                running_tasks: 4,
                pending_tasks: 6,
            }
        );
    }

    #[tokio::test]
    async fn only_running_tasks_progress() {
        let pool = pool(4, 2);
        pool.add_tasks("job", descriptors(6)).await.unwrap();

        assert_eq!(pool.advance().await, 0);
        assert_eq!(pool.advance().await, 4);
        assert_eq!(pool.stats().await.active, 2);
        // The two pending tasks start only now.
        assert_eq!(pool.advance().await, 0);
        assert_eq!(pool.advance().await, 2);
        assert_eq!(pool.stats().await.completed, 6);
    }

    #[tokio::test]
    async fn unknown_pool_is_an_error() {
        let pool = pool(4, 1);
        let result = pool.get_pool_metrics_info("other").await;
        assert!(matches!(result, Err(BatchError::PoolNotFound(id)) if id == "other"));
    }

    #[tokio::test]
    async fn every_nth_submission_is_rejected() {
        let pool = SimulatedPool::new(SimulatedPoolConfig {
            reject_every: Some(3),
            ..SimulatedPoolConfig::default()
        });

        let results = pool.add_tasks("job", descriptors(7)).await.unwrap();
        let rejected: Vec<&str> = results
            .iter()
            .filter(|t| !t.is_queued())
            .map(|t| t.id.as_str())
            .collect();

        assert_eq!(results.len(), 7);
        assert_eq!(rejected, ["task-2", "task-5"]);
        assert!(results[2].error.is_some());
        assert_eq!(pool.stats().await.active, 5);
    }

    #[tokio::test]
    async fn failed_tasks_are_reported_since_timestamp() {
        let pool = SimulatedPool::new(SimulatedPoolConfig {
            pool_id: "pool-1".to_string(),
            task_duration_ticks: 1,
            fail_every: Some(2),
            ..SimulatedPoolConfig::default()
        });
        let before = Utc::now();
        pool.add_tasks("job", descriptors(4)).await.unwrap();
        pool.advance().await;

        let failed = pool.get_failed_tasks("job", before).await.unwrap();
        let ids: Vec<&str> = failed.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["task-1", "task-3"]);
        assert_eq!(failed[0].task_arguments, r#"{"id":"scan-1"}"#);
        assert_eq!(failed[0].exit_code, Some(1));

        let later = Utc::now() + chrono::Duration::seconds(1);
        assert!(pool.get_failed_tasks("job", later).await.unwrap().is_empty());

        let stats = pool.stats().await;
        assert_eq!(stats.completed, 2);
        assert_eq!(stats.failed, 2);
    }

    #[tokio::test]
    async fn failures_before_the_last_query_are_dropped() {
        let pool = SimulatedPool::new(SimulatedPoolConfig {
            pool_id: "pool-1".to_string(),
            task_duration_ticks: 1,
            fail_every: Some(1),
            ..SimulatedPoolConfig::default()
        });
        let before = Utc::now();
        pool.add_tasks("job", descriptors(3)).await.unwrap();
        pool.advance().await;
        assert_eq!(pool.state.lock().await.failed.len(), 3);

        let later = Utc::now() + chrono::Duration::seconds(1);
        assert!(pool.get_failed_tasks("job", later).await.unwrap().is_empty());
        assert!(pool.state.lock().await.failed.is_empty());

        // Going back in time finds nothing once the entries are gone.
        assert!(pool.get_failed_tasks("job", before).await.unwrap().is_empty());
        assert_eq!(pool.stats().await.failed, 3);
    }
}
