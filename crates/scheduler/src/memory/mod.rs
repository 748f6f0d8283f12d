//! In-process collaborators for local runs and tests.

mod pool;
mod store;

pub use pool::{SimulatedPool, SimulatedPoolConfig, SimulatedPoolStats};
pub use store::{MemoryScanRunStore, MemorySnapshotLog};
