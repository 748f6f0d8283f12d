//! Drive the scan job manager against a simulated batch pool.
//!
//! Each tick runs one task creation cycle and then lets the pool run for one
//! interval, so the load feedback can be watched converging without cloud
//! resources. With `--queue-backend sqs` scan requests come from the
//! configured SQS queue instead of an in-memory one.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing::info;

use scanjob_core::config::{load_dotenv, Config};
use scanjob_core::{RunState, ScanRun, ScanRunResult};
use scanjob_queue::{MemoryQueue, MessageQueue, SqsQueue};
use scanjob_scheduler::{
    BatchTaskCreator, CreatorConfig, CreatorMetrics, MemoryScanRunStore, MemorySnapshotLog,
    PoolLoadGeneratorConfig, SimulatedPool, SimulatedPoolConfig, SimulatedPoolStats, Worker,
    WorkerSettings,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum QueueBackend {
    Memory,
    Sqs,
}

#[derive(Parser, Debug)]
#[command(name = "pool-sim", about = "Simulate scan task scheduling against a batch pool")]
struct Cli {
    /// Number of scheduling intervals to simulate.
    #[arg(long, default_value_t = 20)]
    ticks: u64,

    #[arg(long, default_value_t = 32)]
    max_tasks_per_pool: u64,

    /// Overrides TARGET_QUEUED_TASKS_OVERLOAD_RATIO.
    #[arg(long)]
    overload_ratio: Option<f64>,

    /// Scan requests to enqueue up front (memory backend only).
    #[arg(long, default_value_t = 500)]
    messages: usize,

    /// Intervals a scan task runs before finishing.
    #[arg(long, default_value_t = 3)]
    task_duration_ticks: u64,

    /// Every n-th finished task fails.
    #[arg(long)]
    fail_every: Option<u64>,

    /// Every n-th submitted task is rejected.
    #[arg(long)]
    reject_every: Option<u64>,

    #[arg(long, value_enum, default_value_t = QueueBackend::Memory)]
    queue_backend: QueueBackend,

    /// Print the final report as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct SimulationReport {
    ticks: u64,
    creator: CreatorMetrics,
    pool: SimulatedPoolStats,
    failed_scan_runs: usize,
}

fn or_default(value: &str, default: &str) -> String {
    if value.is_empty() { default.to_string() } else { value.to_string() }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    load_dotenv();
    let mut config = Config::from_env();
    if let Some(ratio) = cli.overload_ratio {
        config.job_manager.target_queued_tasks_overload_ratio = ratio;
    }
    config.batch.pool_id = or_default(&config.batch.pool_id, "sim-pool");
    config.batch.job_id = or_default(&config.batch.job_id, "sim-job");
    if cli.queue_backend == QueueBackend::Memory {
        config.queue.queue_name = or_default(&config.queue.queue_name, "scan-requests");
    }
    config.validate().context("invalid configuration")?;
    config.log_summary();

    let store = Arc::new(MemoryScanRunStore::new());
    let queue: Arc<dyn MessageQueue> = match cli.queue_backend {
        QueueBackend::Memory => {
            let queue = Arc::new(MemoryQueue::new());
            for i in 0..cli.messages {
                let scan_id = format!("sim-scan-{i}");
                store
                    .insert(ScanRunResult {
                        id: scan_id.clone(),
                        url: format!("https://example.com/{i}"),
                        run: ScanRun {
                            state: RunState::Queued,
                            timestamp: Utc::now(),
                            error: None,
                        },
                    })
                    .await;
                let body = serde_json::json!({ "id": scan_id, "url": format!("https://example.com/{i}") });
                queue.send(&config.queue.queue_name, body.to_string()).await;
            }
            queue as Arc<dyn MessageQueue>
        }
        QueueBackend::Sqs => Arc::new(SqsQueue::new(&config.aws, &config.queue)) as Arc<dyn MessageQueue>,
    };

    let health = queue
        .health_check(&config.queue.queue_name)
        .await
        .context("queue health check failed")?;
    info!("{}", health);

    let pool = Arc::new(SimulatedPool::new(SimulatedPoolConfig {
        pool_id: config.batch.pool_id.clone(),
        max_tasks_per_pool: cli.max_tasks_per_pool,
        task_duration_ticks: cli.task_duration_ticks,
        fail_every: cli.fail_every,
        reject_every: cli.reject_every,
    }));

    let worker = Arc::new(Worker::new(
        WorkerSettings::from_config(&config),
        PoolLoadGeneratorConfig::from(&config.job_manager),
        pool.clone(),
        queue.clone(),
        Arc::new(MemorySnapshotLog::new()),
        store.clone(),
    ));
    let creator = BatchTaskCreator::new(CreatorConfig::from_config(&config), pool.clone(), queue, worker);

    for tick in 1..=cli.ticks {
        let report = creator
            .run_cycle()
            .await
            .with_context(|| format!("task creation cycle {tick} failed"))?;
        let finished = pool.advance().await;
        info!(
            tick,
            requested = report.requested,
            added = report.added,
            finished,
            "Tick done"
        );
    }

    let mut failed_scan_runs = 0;
    for i in 0..cli.messages {
        if let Some(result) = store.get(&format!("sim-scan-{i}")).await {
            if result.run.state == RunState::Failed {
                failed_scan_runs += 1;
            }
        }
    }

    let report = SimulationReport {
        ticks: cli.ticks,
        creator: creator.metrics(),
        pool: pool.stats().await,
        failed_scan_runs,
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        info!(
            ticks = report.ticks,
            tasks_added = report.creator.tasks_added,
            tasks_rejected = report.creator.tasks_rejected,
            active = report.pool.active,
            completed = report.pool.completed,
            failed = report.pool.failed,
            failed_scan_runs = report.failed_scan_runs,
            avg_cycle = ?report.creator.avg_cycle_duration,
            "Simulation finished"
        );
    }

    Ok(())
}
