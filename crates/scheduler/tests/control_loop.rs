//! End-to-end runs of the task creation loop against a simulated pool.
//!
//! ```text
//!   [MemoryQueue] --dequeue--> [Worker] --descriptors--> [BatchTaskCreator] --add_tasks--> [SimulatedPool]
//!                                 ^                                                              |
//!                                 +------------- pool load / failed tasks ----------------------+
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Notify;
use tokio::time::timeout;

use scanjob_core::{RunState, ScanRun, ScanRunResult};
use scanjob_queue::MemoryQueue;
use scanjob_scheduler::{
    BatchTaskCreator, CreatorConfig, MemoryScanRunStore, MemorySnapshotLog,
    PoolLoadGeneratorConfig, SimulatedPool, SimulatedPoolConfig, Worker, WorkerSettings,
};

const QUEUE: &str = "scan-requests";
const POOL: &str = "scan-pool";
const MAX_TASKS: u64 = 8;
const RATIO: f64 = 2.0;
const TIMEOUT: Duration = Duration::from_secs(5);

struct Setup {
    pool: Arc<SimulatedPool>,
    queue: Arc<MemoryQueue>,
    store: Arc<MemoryScanRunStore>,
    snapshots: Arc<MemorySnapshotLog>,
    creator: Arc<BatchTaskCreator>,
}

async fn setup(pool_config: SimulatedPoolConfig, scans: usize, add_tasks_interval: Duration) -> Setup {
    let pool = Arc::new(SimulatedPool::new(SimulatedPoolConfig {
        pool_id: POOL.to_string(),
        max_tasks_per_pool: MAX_TASKS,
        ..pool_config
    }));
    let queue = Arc::new(MemoryQueue::new());
    let store = Arc::new(MemoryScanRunStore::new());
    let snapshots = Arc::new(MemorySnapshotLog::new());

    for i in 0..scans {
        let id = format!("scan-{i}");
        store
            .insert(ScanRunResult {
                id: id.clone(),
                url: format!("https://example.com/{i}"),
                run: ScanRun {
                    state: RunState::Queued,
                    timestamp: Utc::now(),
                    error: None,
                },
            })
            .await;
        queue
            .send(QUEUE, serde_json::json!({ "id": id, "url": format!("https://example.com/{i}") }).to_string())
            .await;
    }

    let worker = Arc::new(Worker::new(
        WorkerSettings {
            pool_id: POOL.to_string(),
            queue_name: QUEUE.to_string(),
        },
        PoolLoadGeneratorConfig {
            target_queued_tasks_overload_ratio: RATIO,
            sampling_interval_in_seconds: 15,
        },
        pool.clone(),
        queue.clone(),
        snapshots.clone(),
        store.clone(),
    ));
    let creator = Arc::new(BatchTaskCreator::new(
        CreatorConfig {
            job_id: "scan-job".to_string(),
            queue_name: QUEUE.to_string(),
            add_tasks_interval,
            max_wall_clock_time: Duration::from_secs(60),
        },
        pool.clone(),
        queue.clone(),
        worker,
    ));

    Setup {
        pool,
        queue,
        store,
        snapshots,
        creator,
    }
}

async fn failed_scan_runs(store: &MemoryScanRunStore, scans: usize) -> usize {
    let mut failed = 0;
    for i in 0..scans {
        if let Some(result) = store.get(&format!("scan-{i}")).await {
            if result.run.state == RunState::Failed {
                failed += 1;
            }
        }
    }
    failed
}

/// Every request is eventually scheduled and every task failure lands on its
/// scan run, while the pool never holds much more than the overload target.
#[tokio::test]
async fn queue_drains_and_failures_are_reconciled() {
    const SCANS: usize = 200;
    let s = setup(
        SimulatedPoolConfig {
            task_duration_ticks: 2,
            fail_every: Some(5),
            ..SimulatedPoolConfig::default()
        },
        SCANS,
        Duration::from_millis(1),
    )
    .await;

    let target = (MAX_TASKS as f64 * RATIO).round() as u64;
    let mut ticks = 0;
    loop {
        let report = s.creator.run_cycle().await.unwrap();
        assert!(report.dequeued as u64 <= report.requested);

        let active = s.pool.stats().await.active;
        // Overshoot is bounded by what drained during the previous interval.
        assert!(active <= target + MAX_TASKS, "active {active} at tick {ticks}");

        s.pool.advance().await;
        ticks += 1;

        let stats = s.pool.stats().await;
        if s.queue.ready_len(QUEUE).await == 0 && stats.active == 0 {
            break;
        }
        assert!(ticks < 500, "queue did not drain");
    }
    // Pick up failures from the last interval.
    s.creator.run_cycle().await.unwrap();

    let stats = s.pool.stats().await;
    assert_eq!(stats.completed + stats.failed, SCANS as u64);
    assert_eq!(stats.failed, 40);
    assert_eq!(s.queue.in_flight_len(QUEUE).await, 0);

    assert_eq!(failed_scan_runs(&s.store, SCANS).await, 40);
    let metrics = s.creator.metrics();
    assert_eq!(metrics.tasks_added, SCANS as u64);
    assert_eq!(metrics.failed_tasks_updated, 40);
    assert_eq!(metrics.reconcile_errors, 0);
}

/// With nothing but the scheduler feeding the pool, the inferred processing
/// speed equals the number of tasks that left the pool in the last interval.
#[tokio::test]
async fn processing_speed_tracks_drained_tasks() {
    let s = setup(
        SimulatedPoolConfig {
            task_duration_ticks: 3,
            reject_every: Some(7),
            ..SimulatedPoolConfig::default()
        },
        300,
        Duration::from_millis(1),
    )
    .await;

    let mut drained = Vec::new();
    for _ in 0..12 {
        s.creator.run_cycle().await.unwrap();
        drained.push(s.pool.advance().await as i64);
    }
    s.creator.run_cycle().await.unwrap();

    let snapshots = s.snapshots.snapshots().await;
    assert_eq!(snapshots.len(), 13);
    assert_eq!(snapshots[0].tasks_increment_count_per_interval, 16);
    assert_eq!(snapshots[0].processing_speed_per_interval, 0);

    for (i, finished) in drained.iter().enumerate() {
        assert_eq!(
            snapshots[i + 1].processing_speed_per_interval,
            *finished,
            "interval {i}"
        );
    }
    assert!(s.creator.metrics().tasks_rejected > 0);
}

#[tokio::test]
async fn spawned_loop_stops_on_shutdown() {
    let s = setup(SimulatedPoolConfig::default(), 50, Duration::from_millis(20)).await;

    let shutdown = Arc::new(Notify::new());
    let creator = s.creator.clone();
    let signal = shutdown.clone();
    let handle = tokio::spawn(async move { creator.run(signal).await });

    tokio::time::sleep(Duration::from_millis(60)).await;
    shutdown.notify_one();

    let metrics = timeout(TIMEOUT, handle)
        .await
        .expect("loop should stop after shutdown")
        .expect("loop task panicked")
        .unwrap();

    assert!(metrics.cycles >= 1);
    assert_eq!(metrics.tasks_added, 16);
}
