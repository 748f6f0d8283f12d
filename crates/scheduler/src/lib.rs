pub mod batch;
pub mod collaborators;
pub mod creator;
pub mod error;
pub mod memory;
pub mod pool;
pub mod reconcile;
pub mod task_args;
pub mod worker;

pub use batch::{BatchTask, BatchTaskDescriptor, FailureInfo, JobTask, JobTaskState};
pub use collaborators::{BatchClient, PoolLoadSnapshotProvider, ScanRunStore};
pub use creator::{BatchTaskCreator, CreatorConfig, CreatorMetrics, CycleReport, JobTaskHandler, TaskCreationBatch};
pub use error::{BatchError, ReconcileError, SchedulerError, StoreError, TaskArgumentsError};
pub use memory::{MemoryScanRunStore, MemorySnapshotLog, SimulatedPool, SimulatedPoolConfig, SimulatedPoolStats};
pub use pool::{
    PoolLoad, PoolLoadGenerator, PoolLoadGeneratorConfig, PoolLoadSnapshot, PoolMetrics,
    PoolMetricsInfo, PoolMetricsState,
};
pub use reconcile::{ReconcileOutcome, ReconcileSummary};
pub use task_args::TaskArguments;
pub use worker::{Worker, WorkerSettings};
