//! Feedback-driven load control for a fixed-capacity batch pool.
//!
//! [`PoolMetrics`] turns consecutive pool load observations into the number of
//! tasks to inject next, and [`PoolLoadGenerator`] wraps it with the job
//! manager's configuration and packages the result as a [`PoolLoadSnapshot`].

pub mod generator;
pub mod metrics;

pub use generator::{PoolLoadGenerator, PoolLoadGeneratorConfig, PoolLoadSnapshot};
pub use metrics::{PoolLoad, PoolMetrics, PoolMetricsInfo, PoolMetricsState};
