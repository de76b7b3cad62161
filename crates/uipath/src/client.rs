//! Orchestrator REST client.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use hyperbot_core::config::UiPathConfig;
use hyperbot_core::domain::uipath::JobId;
use hyperbot_db::RepositoryError;

use crate::queue::QueueError;

#[derive(Debug, Error)]
pub enum UiPathError {
    #[error("orchestrator request failed: {0}")]
    Http(String),
    #[error("orchestrator rejected the job: {message} (code {code})")]
    Orchestrator { message: String, code: i64 },
    #[error("orchestrator returned unexpected status code {0}")]
    Status(u16),
    #[error("orchestrator response could not be decoded: {0}")]
    Decode(String),
    #[error("job {0} is not tracked")]
    UnknownJob(JobId),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// Body of the 202 returned when a process is triggered.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartedJob {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub creation_time: String,
    pub id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrchestratorFailure {
    #[serde(default)]
    message: String,
    #[serde(default)]
    error_code: i64,
    #[serde(default)]
    trace_id: String,
}

/// Subset of the OData `Jobs({id})` entity the bot reads.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct JobDetails {
    pub id: i64,
    pub key: String,
    pub state: String,
    pub info: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub creation_time: Option<String>,
    pub release_name: Option<String>,
    pub input_arguments: Option<String>,
    /// JSON object serialized as a string by the robot.
    pub output_arguments: Option<String>,
}

#[async_trait]
pub trait Orchestrator: Send + Sync {
    async fn start_job(&self, process_key: &str, input: Value) -> Result<StartedJob, UiPathError>;
    async fn job_details(&self, job_id: JobId) -> Result<JobDetails, UiPathError>;
}

#[derive(Clone)]
pub struct UiPathClient {
    http: Client,
    host: String,
    tenant: String,
    tenant_id: String,
    api_key: SecretString,
}

impl UiPathClient {
    pub fn new(
        host: impl Into<String>,
        tenant: impl Into<String>,
        tenant_id: impl Into<String>,
        api_key: SecretString,
    ) -> Self {
        Self {
            http: Client::new(),
            host: host.into().trim_end_matches('/').to_owned(),
            tenant: tenant.into(),
            tenant_id: tenant_id.into(),
            api_key,
        }
    }

    pub fn from_config(config: &UiPathConfig) -> Self {
        Self::new(
            config.host.clone(),
            config.tenant.clone(),
            config.tenant_id.clone(),
            config.api_key.clone(),
        )
    }

    fn trigger_url(&self, process_key: &str) -> String {
        format!("{}/{}/orchestrator_/t/{}/{process_key}", self.host, self.tenant, self.tenant_id)
    }

    fn details_url(&self, job_id: JobId) -> String {
        format!("{}/{}/orchestrator_/odata/Jobs({job_id})", self.host, self.tenant)
    }
}

#[async_trait]
impl Orchestrator for UiPathClient {
    async fn start_job(&self, process_key: &str, input: Value) -> Result<StartedJob, UiPathError> {
        let response = self
            .http
            .post(self.trigger_url(process_key))
            .bearer_auth(self.api_key.expose_secret())
            .json(&input)
            .send()
            .await
            .map_err(|error| UiPathError::Http(error.to_string()))?;

        if response.status() != StatusCode::ACCEPTED {
            let status = response.status().as_u16();
            let failure = response
                .json::<OrchestratorFailure>()
                .await
                .map_err(|_| UiPathError::Status(status))?;
            warn!(
                event_name = "uipath.job.trigger_rejected",
                process_key,
                status,
                code = failure.error_code,
                trace_id = %failure.trace_id,
                "orchestrator rejected job trigger"
            );
            return Err(UiPathError::Orchestrator {
                message: failure.message,
                code: failure.error_code,
            });
        }

        let started = response
            .json::<StartedJob>()
            .await
            .map_err(|error| UiPathError::Decode(error.to_string()))?;
        debug!(event_name = "uipath.job.triggered", process_key, job_id = started.id, "job triggered");
        Ok(started)
    }

    async fn job_details(&self, job_id: JobId) -> Result<JobDetails, UiPathError> {
        let response = self
            .http
            .get(self.details_url(job_id))
            .bearer_auth(self.api_key.expose_secret())
            .send()
            .await
            .map_err(|error| UiPathError::Http(error.to_string()))?;

        if !response.status().is_success() {
            return Err(UiPathError::Status(response.status().as_u16()));
        }

        response.json::<JobDetails>().await.map_err(|error| UiPathError::Decode(error.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use secrecy::SecretString;
    use serde_json::json;

    use hyperbot_core::domain::uipath::JobId;

    use super::{Orchestrator, UiPathClient, UiPathError};

    fn client(server: &MockServer) -> UiPathClient {
        UiPathClient::new(server.base_url(), "acme", "tenant-1", SecretString::from("robot-key"))
    }

    #[tokio::test]
    async fn start_job_posts_input_to_process_key() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/acme/orchestrator_/t/tenant-1/greeting-key")
                    .header("authorization", "Bearer robot-key")
                    .json_body(json!({ "SkillFile": "https://sheet", "PersonalEmail": "a@b.co" }));
                then.status(202).json_body(json!({
                    "key": "8d1f",
                    "state": "Pending",
                    "creationTime": "2026-03-02T08:00:00Z",
                    "id": 4242
                }));
            })
            .await;

        let started = client(&server)
            .start_job(
                "greeting-key",
                json!({ "SkillFile": "https://sheet", "PersonalEmail": "a@b.co" }),
            )
            .await
            .expect("started");

        mock.assert_async().await;
        assert_eq!(started.id, 4242);
        assert_eq!(started.state, "Pending");
    }

    #[tokio::test]
    async fn rejected_trigger_surfaces_orchestrator_message() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/acme/orchestrator_/t/tenant-1/buddy-key");
                then.status(400).json_body(json!({
                    "message": "Process not found",
                    "errorCode": 1002,
                    "traceId": "00-abc"
                }));
            })
            .await;

        let error = client(&server).start_job("buddy-key", json!({})).await.expect_err("rejected");

        match error {
            UiPathError::Orchestrator { message, code } => {
                assert_eq!(message, "Process not found");
                assert_eq!(code, 1002);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn job_details_decodes_pascal_case_entity() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/acme/orchestrator_/odata/Jobs(4242)");
                then.status(200).json_body(json!({
                    "Id": 4242,
                    "Key": "8d1f",
                    "State": "Successful",
                    "Info": "Job completed",
                    "ReleaseName": "GreetingNewEmployee",
                    "OutputArguments": "{\"Greeting\":\"Welcome Lan!\"}"
                }));
            })
            .await;

        let details = client(&server).job_details(JobId(4242)).await.expect("details");

        assert_eq!(details.state, "Successful");
        assert_eq!(details.output_arguments.as_deref(), Some("{\"Greeting\":\"Welcome Lan!\"}"));
        assert_eq!(details.end_time, None);
    }

    #[tokio::test]
    async fn job_details_error_status_is_reported() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/acme/orchestrator_/odata/Jobs(7)");
                then.status(404);
            })
            .await;

        let error = client(&server).job_details(JobId(7)).await.expect_err("missing");

        assert!(matches!(error, UiPathError::Status(404)));
    }
}
