use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use scanjob_queue::{parse_scan_request, QueueMessage};

use crate::batch::{BatchTaskDescriptor, JobTask};
use crate::error::SchedulerError;
use crate::reconcile::ReconcileSummary;
use crate::task_args::TaskArguments;

use super::metrics::CreatorMetrics;
use super::{BatchTaskCreator, CycleReport};

/// Descriptors ready for submission, plus the message behind each task id.
#[derive(Default)]
struct PreparedTasks {
    descriptors: Vec<BatchTaskDescriptor>,
    messages: HashMap<String, QueueMessage>,
    poison: usize,
}

impl BatchTaskCreator {
    /// Run the task creation loop until `shutdown` is notified or the
    /// wall-clock limit is reached.
    ///
    /// Use `Notify::notify_one` to stop it so the signal is not lost while a
    /// cycle is in progress. A cycle error ends the loop and is returned.
    pub async fn run(&self, shutdown: Arc<Notify>) -> Result<CreatorMetrics, SchedulerError> {
        let started = Instant::now();
        info!(job_id = %self.config.job_id, "Batch task creator starting");

        loop {
            if started.elapsed() >= self.config.max_wall_clock_time {
                info!(
                    job_id = %self.config.job_id,
                    elapsed = ?started.elapsed(),
                    "Wall-clock limit reached, stopping task creation"
                );
                break;
            }

            self.run_cycle().await?;

            tokio::select! {
                _ = tokio::time::sleep(self.config.add_tasks_interval) => {}
                _ = shutdown.notified() => {
                    info!(job_id = %self.config.job_id, "Batch task creator shutdown requested");
                    break;
                }
            }
        }

        info!(job_id = %self.config.job_id, "Batch task creator stopped");
        Ok(self.metrics())
    }

    /// Run one task creation cycle.
    ///
    /// Errors reading pool metrics, dequeuing messages, submitting tasks or
    /// listing failed tasks abort the cycle. Everything else is logged.
    pub async fn run_cycle(&self) -> Result<CycleReport, SchedulerError> {
        let timer = Instant::now();

        let batch = self.handler.get_messages_for_task_creation().await?;
        let mut report = CycleReport {
            requested: batch.requested,
            dequeued: batch.messages.len(),
            ..CycleReport::default()
        };

        let prepared = self.prepare_tasks(batch.messages).await;
        report.poison = prepared.poison;

        let submitted = prepared.descriptors.len();
        let queued = if submitted == 0 {
            Vec::new()
        } else {
            let job_tasks = self
                .batch
                .add_tasks(&self.config.job_id, prepared.descriptors)
                .await?;
            self.settle_messages(job_tasks, &prepared.messages).await
        };
        report.added = queued.len();
        report.rejected = submitted.saturating_sub(queued.len());

        self.handler.on_tasks_added(&queued).await;

        report.reconcile = self.reconcile_failed_tasks().await?;

        if let Ok(mut m) = self.metrics.write() {
            m.record_cycle(&report, timer.elapsed());
        }

        info!(
            job_id = %self.config.job_id,
            requested = report.requested,
            dequeued = report.dequeued,
            added = report.added,
            rejected = report.rejected,
            poison = report.poison,
            failed_tasks = report.reconcile.total(),
            "Task creation cycle completed"
        );

        Ok(report)
    }

    /// Turn messages into task descriptors. Messages without a usable scan
    /// id are deleted from the queue and counted as poison.
    async fn prepare_tasks(&self, messages: Vec<QueueMessage>) -> PreparedTasks {
        let mut prepared = PreparedTasks::default();

        for msg in messages {
            let arguments = match parse_scan_request(&msg) {
                Ok(request) => TaskArguments::from_scan_request(request, &msg.message_id)
                    .to_json()
                    .map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };

            match arguments {
                Ok(task_arguments) => {
                    let id = format!("task-{}", Uuid::new_v4());
                    prepared.descriptors.push(BatchTaskDescriptor {
                        id: id.clone(),
                        message_id: msg.message_id.clone(),
                        task_arguments,
                    });
                    prepared.messages.insert(id, msg);
                }
                Err(e) => {
                    error!(
                        message_id = %msg.message_id,
                        message_text = %msg.message_text,
                        error = %e,
                        "Dropping scan request message that cannot be tied to a scan run"
                    );
                    prepared.poison += 1;
                    if let Err(e) = self.queue.delete_message(&self.config.queue_name, &msg).await {
                        warn!(message_id = %msg.message_id, error = %e, "Failed to delete poison message");
                    }
                }
            }
        }

        prepared
    }

    /// Delete the messages of accepted tasks and return those tasks.
    /// Messages of rejected tasks stay in the queue for a later cycle.
    /// Results for ids that were not submitted this cycle, or repeated ones,
    /// are ignored.
    async fn settle_messages(
        &self,
        job_tasks: Vec<JobTask>,
        messages: &HashMap<String, QueueMessage>,
    ) -> Vec<JobTask> {
        let mut seen = HashSet::new();
        let mut queued = Vec::new();

        for task in job_tasks {
            if !task.is_queued() {
                warn!(
                    task_id = %task.id,
                    error = task.error.as_deref().unwrap_or("unknown"),
                    "Batch rejected task, message stays queued"
                );
            } else if messages.contains_key(&task.id) && seen.insert(task.id.clone()) {
                queued.push(task);
            } else {
                warn!(task_id = %task.id, "Ignoring unknown or duplicate task result");
            }
        }

        let deletes = queued.iter().filter_map(|task| {
            let msg = messages.get(&task.id)?;
            Some(async move {
                if let Err(e) = self.queue.delete_message(&self.config.queue_name, msg).await {
                    warn!(
                        task_id = %task.id,
                        message_id = %msg.message_id,
                        error = %e,
                        "Failed to delete message of queued task"
                    );
                }
            })
        });
        join_all(deletes).await;

        queued
    }

    /// Hand failed tasks not reported by an earlier cycle to the handler.
    async fn reconcile_failed_tasks(&self) -> Result<ReconcileSummary, SchedulerError> {
        let mut window = self.failed_tasks.lock().await;

        let failed = self
            .batch
            .get_failed_tasks(&self.config.job_id, window.since())
            .await?;
        let failed = window.advance(failed);
        drop(window);

        if failed.is_empty() {
            return Ok(ReconcileSummary::default());
        }

        debug!(job_id = %self.config.job_id, count = failed.len(), "Reconciling failed tasks");
        Ok(self.handler.handle_failed_tasks(&failed).await)
    }
}
