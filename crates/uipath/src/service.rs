use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use hyperbot_core::config::UiPathProcessKeys;
use hyperbot_core::domain::uipath::{
    FillBuddyInput, GreetingInput, JobId, JobState, JobType, LeaveRequestInput,
    SheetProcessInput, UiPathJob,
};
use hyperbot_db::repositories::UiPathJobRepository;

use crate::client::{JobDetails, Orchestrator, UiPathError};
use crate::queue::JobQueue;

/// Triggers orchestrator processes and keeps the local job rows in step with
/// the orchestrator's view of them.
pub struct JobService {
    orchestrator: Arc<dyn Orchestrator>,
    jobs: Arc<dyn UiPathJobRepository>,
    queue: Arc<dyn JobQueue>,
    processes: UiPathProcessKeys,
}

impl JobService {
    pub fn new(
        orchestrator: Arc<dyn Orchestrator>,
        jobs: Arc<dyn UiPathJobRepository>,
        queue: Arc<dyn JobQueue>,
        processes: UiPathProcessKeys,
    ) -> Self {
        Self { orchestrator, jobs, queue, processes }
    }

    pub async fn create_greeting_job(
        &self,
        input: &GreetingInput,
        channel: &str,
    ) -> Result<UiPathJob, UiPathError> {
        let key = self.processes.greeting_new_employee.clone();
        self.start(JobType::WelcomeNewEmployee, &key, input, channel).await
    }

    pub async fn create_buddy_job(
        &self,
        input: &FillBuddyInput,
        channel: &str,
    ) -> Result<UiPathJob, UiPathError> {
        let key = self.processes.fill_buddy.clone();
        self.start(JobType::FillBuddyForm, &key, input, channel).await
    }

    pub async fn create_leave_request_job(
        &self,
        input: &LeaveRequestInput,
        channel: &str,
    ) -> Result<UiPathJob, UiPathError> {
        let key = self.processes.create_leave_request.clone();
        self.start(JobType::CreateLeaveRequest, &key, input, channel).await
    }

    pub async fn create_integrate_training_job(
        &self,
        input: &SheetProcessInput,
        channel: &str,
    ) -> Result<UiPathJob, UiPathError> {
        let key = self.processes.create_integrate_training.clone();
        self.start(JobType::IntegrateTrainingForm, &key, input, channel).await
    }

    pub async fn create_pre_onboard_email_job(
        &self,
        input: &SheetProcessInput,
        channel: &str,
    ) -> Result<UiPathJob, UiPathError> {
        let key = self.processes.pre_onboard_email.clone();
        self.start(JobType::PreOnboardEmail, &key, input, channel).await
    }

    // The row is written before the id is queued so a restart can recover it.
    async fn start<T: Serialize>(
        &self,
        job_type: JobType,
        process_key: &str,
        input: &T,
        channel: &str,
    ) -> Result<UiPathJob, UiPathError> {
        let body = serde_json::to_value(input).map_err(|error| UiPathError::Decode(error.to_string()))?;
        let started = self.orchestrator.start_job(process_key, body).await?;

        let job = UiPathJob::pending(JobId(started.id), job_type, channel, Utc::now());
        self.jobs.create(job.clone()).await?;
        self.queue.enqueue(job.job_id).await?;

        info!(
            event_name = "uipath.job.created",
            job_id = %job.job_id,
            job_type = job_type.as_str(),
            channel,
            "uipath job created"
        );
        Ok(job)
    }

    pub async fn job(&self, job_id: JobId) -> Result<Option<UiPathJob>, UiPathError> {
        Ok(self.jobs.find_by_id(job_id).await?)
    }

    pub async fn job_details(&self, job_id: JobId) -> Result<JobDetails, UiPathError> {
        self.orchestrator.job_details(job_id).await
    }

    /// Fetches the orchestrator state and stores it. A failed fetch faults
    /// the job locally before the error is returned.
    pub async fn check_and_update(&self, job_id: JobId) -> Result<UiPathJob, UiPathError> {
        let details = match self.orchestrator.job_details(job_id).await {
            Ok(details) => details,
            Err(error) => {
                warn!(
                    event_name = "uipath.job.details_failed",
                    job_id = %job_id,
                    error = %error,
                    "could not fetch job details"
                );
                let detail = error.to_string();
                self.jobs.update_state(job_id, &JobState::Faulted, None, Some(&detail)).await?;
                return Err(error);
            }
        };

        let state = JobState::parse(&details.state);
        let job = match &state {
            JobState::Successful => {
                let output = details.output_arguments.as_deref().unwrap_or("{}");
                self.jobs.update_state(job_id, &state, Some(output), None).await?
            }
            state if state.is_terminal() => {
                self.jobs.update_state(job_id, state, None, details.info.as_deref()).await?
            }
            JobState::Running => self.jobs.update_state(job_id, &state, None, None).await?,
            _ => self.jobs.find_by_id(job_id).await?.ok_or(UiPathError::UnknownJob(job_id))?,
        };

        if job.state.is_terminal() {
            info!(
                event_name = "uipath.job.finished",
                job_id = %job_id,
                state = job.state.as_str(),
                "uipath job reached a terminal state"
            );
        }
        Ok(job)
    }

    /// Queues every job that has not reached a terminal state.
    pub async fn requeue_unfinished(&self) -> Result<usize, UiPathError> {
        let unfinished = self.jobs.list_unfinished().await?;
        for job in &unfinished {
            self.queue.enqueue(job.job_id).await?;
        }
        Ok(unfinished.len())
    }
}
