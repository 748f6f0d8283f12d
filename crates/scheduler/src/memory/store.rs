use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use scanjob_core::ScanRunResult;

use crate::collaborators::{PoolLoadSnapshotProvider, ScanRunStore};
use crate::error::StoreError;
use crate::pool::PoolLoadSnapshot;

/// Scan-run records keyed by scan id.
#[derive(Debug, Default)]
pub struct MemoryScanRunStore {
    runs: RwLock<HashMap<String, ScanRunResult>>,
}

impl MemoryScanRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, result: ScanRunResult) {
        self.runs.write().await.insert(result.id.clone(), result);
    }

    pub async fn get(&self, scan_id: &str) -> Option<ScanRunResult> {
        self.runs.read().await.get(scan_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.runs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.runs.read().await.is_empty()
    }
}

#[async_trait]
impl ScanRunStore for MemoryScanRunStore {
    async fn read_scan_run(&self, scan_id: &str) -> Result<Option<ScanRunResult>, StoreError> {
        Ok(self.get(scan_id).await)
    }

    async fn update_scan_run(&self, result: &ScanRunResult) -> Result<(), StoreError> {
        let mut runs = self.runs.write().await;
        match runs.get_mut(&result.id) {
            Some(existing) => {
                *existing = result.clone();
                Ok(())
            }
            None => Err(StoreError::Request(format!("scan run {} does not exist", result.id))),
        }
    }
}

/// Append-only log of pool load snapshots.
#[derive(Debug, Default)]
pub struct MemorySnapshotLog {
    snapshots: Mutex<Vec<PoolLoadSnapshot>>,
}

impl MemorySnapshotLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshots(&self) -> Vec<PoolLoadSnapshot> {
        self.snapshots.lock().await.clone()
    }
}

#[async_trait]
impl PoolLoadSnapshotProvider for MemorySnapshotLog {
    async fn write_batch_pool_load_snapshot(&self, snapshot: &PoolLoadSnapshot) -> Result<(), StoreError> {
        self.snapshots.lock().await.push(snapshot.clone());
        Ok(())
    }
}
