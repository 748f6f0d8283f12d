use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::CycleReport;

/// Task creator totals across cycles.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CreatorMetrics {
    pub cycles: u64,
    pub tasks_requested: u64,
    pub messages_dequeued: u64,
    pub tasks_added: u64,
    pub tasks_rejected: u64,
    pub poison_messages: u64,
    pub failed_tasks_updated: u64,
    /// Failed tasks whose scan run could not be found or identified.
    pub failed_tasks_unresolved: u64,
    pub reconcile_errors: u64,
    pub avg_cycle_duration: Duration,
    pub last_cycle_at: Option<DateTime<Utc>>,
}

impl CreatorMetrics {
    /// Fold one cycle into the totals.
    pub fn record_cycle(&mut self, report: &CycleReport, duration: Duration) {
        self.cycles += 1;
        self.tasks_requested += report.requested;
        self.messages_dequeued += report.dequeued as u64;
        self.tasks_added += report.added as u64;
        self.tasks_rejected += report.rejected as u64;
        self.poison_messages += report.poison as u64;
        self.failed_tasks_updated += report.reconcile.updated as u64;
        self.failed_tasks_unresolved +=
            (report.reconcile.scan_not_found + report.reconcile.uncorrelated) as u64;
        self.reconcile_errors += report.reconcile.errors as u64;
        self.last_cycle_at = Some(Utc::now());

        // Incremental mean: new_avg = prev_avg + (duration - prev_avg) / count
        self.avg_cycle_duration = if self.cycles == 1 {
            duration
        } else {
            let prev_nanos = self.avg_cycle_duration.as_nanos() as f64;
            let cur_nanos = duration.as_nanos() as f64;
            let avg_nanos = prev_nanos + (cur_nanos - prev_nanos) / self.cycles as f64;
            Duration::from_nanos(avg_nanos as u64)
        };
    }
}
