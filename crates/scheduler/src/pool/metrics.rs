use serde::{Deserialize, Serialize};

/// Occupancy of a pool at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolLoad {
    /// Tasks assigned to the pool and not finished (running + queued on the pool).
    pub active_tasks: u64,
    /// Active tasks currently executing on a node.
    pub running_tasks: u64,
    /// Tasks waiting for a node.
    pub pending_tasks: u64,
}

/// Pool identity, capacity and current load, read fresh every cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolMetricsInfo {
    pub id: String,
    pub max_tasks_per_pool: u64,
    pub load: PoolLoad,
}

/// Scheduler memory for one pool.
///
/// `last_tasks_increment_count` is `None` until the first increment has been
/// computed. `processing_speed` goes negative when active tasks grow faster
/// than the scheduler injects them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolMetricsState {
    pub last_pool_load: Option<PoolLoad>,
    pub last_tasks_increment_count: Option<u64>,
    pub processing_speed: Option<i64>,
}

/// Converts pool load observations into a task increment per interval.
#[derive(Debug, Clone, Default)]
pub struct PoolMetrics {
    pool_state: PoolMetricsState,
}

impl PoolMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &PoolMetricsState {
        &self.pool_state
    }

    /// Number of tasks to add to the pool this interval.
    ///
    /// The first call seeds the pool with `max_tasks_per_pool * ratio` tasks.
    /// Later calls infer how many of the previously injected tasks drained
    /// (`processing_speed`) from the change in active tasks, and ask for enough
    /// tasks to get back to the overload target plus what drained:
    ///
    /// ```text
    /// processing_speed = last_increment - (active - last_active)
    /// increment        = max(target - active + processing_speed, 0)
    /// ```
    pub fn tasks_increment_count(
        &mut self,
        pool_metrics_info: &PoolMetricsInfo,
        target_queued_tasks_overload_ratio: f64,
    ) -> u64 {
        let load = pool_metrics_info.load;
        let target = target_queued_tasks(
            pool_metrics_info.max_tasks_per_pool,
            target_queued_tasks_overload_ratio,
        );

        let (last_load, last_increment) = match (
            self.pool_state.last_pool_load,
            self.pool_state.last_tasks_increment_count,
        ) {
            (Some(load), Some(increment)) => (load, increment),
            _ => {
                let seed = target.max(0) as u64;
                self.pool_state = PoolMetricsState {
                    last_pool_load: Some(load),
                    last_tasks_increment_count: Some(seed),
                    processing_speed: Some(0),
                };
                return seed;
            }
        };

        let active = signed(load.active_tasks);
        let active_delta = active.saturating_sub(signed(last_load.active_tasks));
        let processing_speed = signed(last_increment).saturating_sub(active_delta);

        let increment = target
            .saturating_sub(active)
            .saturating_add(processing_speed)
            .max(0) as u64;

        // last_pool_load must only move after processing_speed has used it.
        self.pool_state.processing_speed = Some(processing_speed);
        self.pool_state.last_pool_load = Some(load);
        self.pool_state.last_tasks_increment_count = Some(increment);

        increment
    }

    /// Replace the stored increment with the number of tasks actually added.
    ///
    /// Ignored until a first increment has been computed, so the state stays
    /// unseeded and the next call still seeds.
    pub fn set_last_tasks_increment_count(&mut self, count: u64) {
        if self.pool_state.last_pool_load.is_none() {
            return;
        }
        self.pool_state.last_tasks_increment_count = Some(count);
    }
}

/// `max_tasks_per_pool * ratio`, rounded to the nearest task.
fn target_queued_tasks(max_tasks_per_pool: u64, ratio: f64) -> i64 {
    let target = (max_tasks_per_pool as f64 * ratio).round();
    if target.is_finite() && target > 0.0 {
        target as i64
    } else {
        0
    }
}

fn signed(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
