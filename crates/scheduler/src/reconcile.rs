//! Outcome accounting for failed-task reconciliation.

use serde::Serialize;

use crate::error::ReconcileError;

/// What happened to one failed batch task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The scan run was marked failed.
    Updated { scan_id: String },
    /// The arguments named a scan run that does not exist.
    ScanNotFound { scan_id: String },
    /// The arguments could not be tied to a scan run.
    Uncorrelated,
}

/// Per-cycle totals over all failed tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    pub updated: usize,
    pub scan_not_found: usize,
    pub uncorrelated: usize,
    pub errors: usize,
}

impl ReconcileSummary {
    pub fn record(&mut self, result: &Result<ReconcileOutcome, ReconcileError>) {
        match result {
            Ok(ReconcileOutcome::Updated { .. }) => self.updated += 1,
            Ok(ReconcileOutcome::ScanNotFound { .. }) => self.scan_not_found += 1,
            Ok(ReconcileOutcome::Uncorrelated) => self.uncorrelated += 1,
            Err(_) => self.errors += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.updated + self.scan_not_found + self.uncorrelated + self.errors
    }
}
