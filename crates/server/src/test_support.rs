use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::to_bytes;
use axum::response::Response;
use httpmock::MockServer;
use secrecy::SecretString;
use serde_json::{Map, Value};
use tokio::sync::{mpsc, Mutex};

use hyperbot_agent::assistant::{AssistantMessage, MessageContent, MessageText};
use hyperbot_agent::{AssistantApi, AssistantError, ConversationService, ConversationSettings};
use hyperbot_core::config::UiPathProcessKeys;
use hyperbot_core::domain::uipath::JobId;
use hyperbot_db::repositories::{
    InMemoryMessageRepository, InMemoryThreadRepository, InMemoryUiPathJobRepository,
    InMemoryUserPointRepository, InMemoryUserRepository,
};
use hyperbot_sheets::{SheetService, SheetsClient, StaticToken};
use hyperbot_slack::{EventDispatcher, MessageTemplate, SlackApiError, SlackPoster};
use hyperbot_uipath::{ChannelJobQueue, JobDetails, JobService, Orchestrator, StartedJob, UiPathError};

use crate::api::{AppState, AuthTokens};

pub const SIGNING_SECRET: &str = "8f742231b10e8888abcd99yyyzzz85a5";
pub const DEFAULT_CHANNEL: &str = "C-DEFAULT";

#[derive(Default)]
pub struct RecordingPoster {
    posted: Mutex<Vec<(String, MessageTemplate)>>,
}

impl RecordingPoster {
    pub async fn posted(&self) -> Vec<(String, MessageTemplate)> {
        self.posted.lock().await.clone()
    }
}

#[async_trait]
impl SlackPoster for RecordingPoster {
    fn default_channel(&self) -> &str {
        DEFAULT_CHANNEL
    }

    async fn post_message(
        &self,
        channel: &str,
        message: &MessageTemplate,
    ) -> Result<String, SlackApiError> {
        let mut posted = self.posted.lock().await;
        posted.push((channel.to_owned(), message.clone()));
        Ok(format!("1700000000.{:06}", posted.len()))
    }

    async fn user_name(&self, _user_id: &str) -> Result<String, SlackApiError> {
        Ok("linh".to_owned())
    }
}

/// Assistant that completes every run immediately with one fixed reply.
pub struct FakeAssistant {
    reply: String,
}

#[async_trait]
impl AssistantApi for FakeAssistant {
    async fn create_thread(&self) -> Result<String, AssistantError> {
        Ok("thread-1".to_owned())
    }

    async fn create_message(&self, _thread_id: &str, _content: &str) -> Result<String, AssistantError> {
        Ok("msg-user-1".to_owned())
    }

    async fn create_run(&self, _thread_id: &str, _assistant_id: &str) -> Result<String, AssistantError> {
        Ok("run-1".to_owned())
    }

    async fn get_run(&self, _thread_id: &str, _run_id: &str) -> Result<String, AssistantError> {
        Ok("completed".to_owned())
    }

    async fn list_messages(&self, _thread_id: &str) -> Result<Vec<AssistantMessage>, AssistantError> {
        Ok(vec![AssistantMessage {
            id: "msg-assistant-1".to_owned(),
            role: "assistant".to_owned(),
            content: vec![MessageContent {
                kind: "text".to_owned(),
                text: Some(MessageText { value: self.reply.clone(), annotations: Vec::new() }),
            }],
        }])
    }

    async fn get_file_content(&self, _file_id: &str) -> Result<Vec<u8>, AssistantError> {
        Ok(Vec::new())
    }

    async fn get_file_information(&self, _file_id: &str) -> Result<Map<String, Value>, AssistantError> {
        Ok(Map::new())
    }
}

/// Orchestrator that hands out ids from 501 and knows no job details.
pub struct FakeOrchestrator {
    next_id: AtomicI64,
    started: Mutex<Vec<String>>,
}

impl Default for FakeOrchestrator {
    fn default() -> Self {
        Self { next_id: AtomicI64::new(501), started: Mutex::new(Vec::new()) }
    }
}

impl FakeOrchestrator {
    pub async fn started(&self) -> Vec<String> {
        self.started.lock().await.clone()
    }
}

#[async_trait]
impl Orchestrator for FakeOrchestrator {
    async fn start_job(&self, process_key: &str, _input: Value) -> Result<StartedJob, UiPathError> {
        self.started.lock().await.push(process_key.to_owned());
        Ok(StartedJob {
            key: format!("key-{process_key}"),
            state: "Pending".to_owned(),
            creation_time: "2026-10-16T08:00:00Z".to_owned(),
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
        })
    }

    async fn job_details(&self, _job_id: JobId) -> Result<JobDetails, UiPathError> {
        Err(UiPathError::Status(404))
    }
}

pub fn process_keys() -> UiPathProcessKeys {
    UiPathProcessKeys {
        greeting_new_employee: "greeting-key".to_owned(),
        fill_buddy: "buddy-key".to_owned(),
        create_leave_request: "leave-key".to_owned(),
        create_integrate_training: "training-key".to_owned(),
        pre_onboard_email: "pre-onboard-key".to_owned(),
    }
}

/// In-memory wiring of everything [`AppState`] needs.
pub struct TestApp {
    pub users: Arc<InMemoryUserRepository>,
    pub points: Arc<InMemoryUserPointRepository>,
    pub threads: Arc<InMemoryThreadRepository>,
    pub poster: Arc<RecordingPoster>,
    pub orchestrator: Arc<FakeOrchestrator>,
    pub conversation: Arc<ConversationService>,
    pub jobs: Arc<JobService>,
    pub sheets: Option<Arc<SheetService>>,
    /// Held so queued job ids have somewhere to go.
    pub _job_receiver: mpsc::Receiver<JobId>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_assistant_reply("How can I help?")
    }

    pub fn with_assistant_reply(reply: &str) -> Self {
        let users = Arc::new(InMemoryUserRepository::default());
        let points = Arc::new(InMemoryUserPointRepository::new(users.clone()));
        let threads = Arc::new(InMemoryThreadRepository::default());
        let poster = Arc::new(RecordingPoster::default());
        let orchestrator = Arc::new(FakeOrchestrator::default());

        let conversation = Arc::new(ConversationService::new(
            Arc::new(FakeAssistant { reply: reply.to_owned() }),
            threads.clone(),
            Arc::new(InMemoryMessageRepository::default()),
            poster.clone(),
            ConversationSettings {
                assistant_id: "asst-detect".to_owned(),
                poll_interval: Duration::from_millis(1),
                run_timeout: Duration::from_secs(1),
            },
        ));

        let (queue, job_receiver) = ChannelJobQueue::bounded(16);
        let jobs = Arc::new(JobService::new(
            orchestrator.clone(),
            Arc::new(InMemoryUiPathJobRepository::default()),
            Arc::new(queue),
            process_keys(),
        ));

        Self {
            users,
            points,
            threads,
            poster,
            orchestrator,
            conversation,
            jobs,
            sheets: None,
            _job_receiver: job_receiver,
        }
    }

    pub fn with_sheets(mut self, server: &MockServer) -> Self {
        let client =
            SheetsClient::new(Arc::new(StaticToken::new("ya29.test")), server.base_url(), server.base_url());
        self.sheets = Some(Arc::new(SheetService::new(client, "shared-folder")));
        self
    }

    pub fn state(&self) -> AppState {
        self.state_with_dispatcher(EventDispatcher::new())
    }

    pub fn state_with_dispatcher(&self, dispatcher: EventDispatcher) -> AppState {
        AppState {
            users: self.users.clone(),
            points: self.points.clone(),
            tokens: Arc::new(
                AuthTokens::new(
                    "access-secret-access-secret-0123",
                    "refresh-secret-refresh-secret-01",
                    chrono::Duration::minutes(15),
                    chrono::Duration::hours(24),
                )
                .expect("test token makers"),
            ),
            poster: self.poster.clone(),
            signing_secret: SecretString::from(SIGNING_SECRET.to_owned()),
            dispatcher: Arc::new(dispatcher),
            conversation: self.conversation.clone(),
            jobs: self.jobs.clone(),
            sheets: self.sheets.clone(),
        }
    }
}

pub async fn read_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}
