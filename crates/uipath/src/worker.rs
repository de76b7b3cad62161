//! Background polling of queued orchestrator jobs.
//!
//! Every job id received from the queue gets its own polling task. The task
//! checks the orchestrator once per interval and, when the job reaches a
//! terminal state, posts the outcome to the Slack channel that requested it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use hyperbot_core::config::WorkerConfig;
use hyperbot_core::domain::uipath::{job_outcome, JobId, UiPathJob, GENERIC_FAILURE_MESSAGE};
use hyperbot_slack::SlackPoster;

use crate::client::UiPathError;
use crate::service::JobService;

/// Slack text for a finished job, `None` while the job is still in flight.
pub fn terminal_message(job: &UiPathJob) -> Option<String> {
    job_outcome(job.job_type, &job.state, job.output.as_deref()).message().map(str::to_owned)
}

pub struct JobWorker {
    service: Arc<JobService>,
    poster: Arc<dyn SlackPoster>,
    poll_interval: Duration,
}

impl JobWorker {
    pub fn new(service: Arc<JobService>, poster: Arc<dyn SlackPoster>, poll_interval: Duration) -> Self {
        Self { service, poster, poll_interval }
    }

    pub fn from_config(
        service: Arc<JobService>,
        poster: Arc<dyn SlackPoster>,
        config: &WorkerConfig,
    ) -> Self {
        Self::new(service, poster, Duration::from_millis(config.poll_interval_ms.max(1)))
    }

    /// Re-queues jobs left unfinished by a previous process.
    pub async fn recover(&self) -> Result<usize, UiPathError> {
        let requeued = self.service.requeue_unfinished().await?;
        info!(event_name = "uipath.worker.recovered", requeued, "unfinished jobs requeued");
        Ok(requeued)
    }

    /// Runs until the shutdown flag flips or the queue closes, then waits for
    /// in-flight polling tasks to observe the shutdown.
    pub async fn run(self: Arc<Self>, mut jobs: mpsc::Receiver<JobId>, shutdown: watch::Receiver<bool>) {
        let mut tasks = JoinSet::new();
        let mut stop = shutdown.clone();

        info!(event_name = "uipath.worker.started", "job worker started");
        loop {
            tokio::select! {
                _ = wait_for_shutdown(&mut stop) => break,
                next = jobs.recv() => {
                    let Some(job_id) = next else {
                        break;
                    };
                    let worker = Arc::clone(&self);
                    let task_shutdown = shutdown.clone();
                    tasks.spawn(async move { worker.poll_job(job_id, task_shutdown).await });
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(join_error) = joined {
                        error!(
                            event_name = "uipath.worker.task_failed",
                            error = %join_error,
                            "job polling task failed"
                        );
                    }
                }
            }
        }

        while tasks.join_next().await.is_some() {}
        info!(event_name = "uipath.worker.stopped", "job worker stopped");
    }

    async fn poll_job(&self, job_id: JobId, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = wait_for_shutdown(&mut shutdown) => return,
                _ = ticker.tick() => {}
            }

            match self.service.check_and_update(job_id).await {
                Ok(job) => {
                    if let Some(message) = terminal_message(&job) {
                        self.notify(&job.slack_channel, &message).await;
                        return;
                    }
                }
                Err(poll_error) => {
                    self.notify_failure(job_id, &poll_error).await;
                    return;
                }
            }
        }
    }

    async fn notify(&self, channel: &str, message: &str) {
        if let Err(post_error) = self.poster.send_message(Some(channel), message).await {
            warn!(
                event_name = "uipath.worker.notify_failed",
                channel,
                error = %post_error,
                "could not post job outcome to slack"
            );
        }
    }

    async fn notify_failure(&self, job_id: JobId, poll_error: &UiPathError) {
        match self.service.job(job_id).await {
            Ok(Some(job)) => self.notify(&job.slack_channel, GENERIC_FAILURE_MESSAGE).await,
            Ok(None) | Err(_) => {
                error!(
                    event_name = "uipath.worker.poll_failed",
                    job_id = %job_id,
                    error = %poll_error,
                    "job polling failed and the job has no known channel"
                );
            }
        }
    }
}

async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
