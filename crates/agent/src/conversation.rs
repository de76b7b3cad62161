use std::{sync::Arc, time::Duration};

use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};

use hyperbot_core::{
    config::AzureOpenAiConfig,
    domain::thread::{AssistantThread, ThreadId, ThreadMessage, ThreadStatus},
    validation::detect_action,
};
use hyperbot_db::repositories::{MessageRepository, RepositoryError, ThreadRepository};
use hyperbot_slack::{SlackApiError, SlackPoster};

use crate::assistant::{
    AssistantApi, AssistantError, AssistantMessage, RUN_STATUS_COMPLETED, RUN_STATUS_IN_PROGRESS,
    RUN_STATUS_QUEUED,
};

#[derive(Debug, Error)]
pub enum ConversationError {
    #[error(transparent)]
    Assistant(#[from] AssistantError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Slack(#[from] SlackApiError),
    #[error("assistant run `{run_id}` on thread `{thread_id}` did not finish in time")]
    RunTimedOut { thread_id: String, run_id: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversationSettings {
    pub assistant_id: String,
    pub poll_interval: Duration,
    pub run_timeout: Duration,
}

impl ConversationSettings {
    pub fn from_config(config: &AzureOpenAiConfig) -> Self {
        Self {
            assistant_id: config.assistant_id_detect_action.clone(),
            poll_interval: Duration::from_millis(config.run_poll_interval_ms),
            run_timeout: Duration::from_secs(config.run_timeout_secs),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddMessageOutcome {
    pub message_id: String,
    /// Detected action token, empty when the assistant named none.
    pub action: String,
}

pub struct ConversationService {
    assistant: Arc<dyn AssistantApi>,
    threads: Arc<dyn ThreadRepository>,
    messages: Arc<dyn MessageRepository>,
    poster: Arc<dyn SlackPoster>,
    settings: ConversationSettings,
}

impl ConversationService {
    pub fn new(
        assistant: Arc<dyn AssistantApi>,
        threads: Arc<dyn ThreadRepository>,
        messages: Arc<dyn MessageRepository>,
        poster: Arc<dyn SlackPoster>,
        settings: ConversationSettings,
    ) -> Self {
        Self { assistant, threads, messages, poster, settings }
    }

    /// Sends `text` into the user's open thread, runs the detect-action
    /// assistant, relays its replies to `channel_id` and returns the action.
    pub async fn add_and_run_message(
        &self,
        channel_id: &str,
        slack_user_id: &str,
        text: &str,
    ) -> Result<AddMessageOutcome, ConversationError> {
        let thread_id = self.open_thread(channel_id, slack_user_id).await?;

        let message_id = self.assistant.create_message(&thread_id.0, text).await?;
        self.messages
            .create(ThreadMessage {
                id: message_id.clone(),
                thread_id: thread_id.clone(),
                role: "user".to_owned(),
                content: text.to_owned(),
                created_at: Utc::now(),
            })
            .await?;

        let run_id = self.assistant.create_run(&thread_id.0, &self.settings.assistant_id).await?;
        info!(
            event_name = "agent.run.created",
            thread_id = %thread_id,
            run_id = %run_id,
            channel_id,
            "assistant run created"
        );

        let status = self.wait_for_run(&thread_id, &run_id).await?;
        if status != RUN_STATUS_COMPLETED {
            warn!(
                event_name = "agent.run.unsuccessful",
                thread_id = %thread_id,
                run_id = %run_id,
                status = %status,
                "assistant run finished without completing"
            );
            return Ok(AddMessageOutcome { message_id, action: String::new() });
        }

        let listed = self.assistant.list_messages(&thread_id.0).await?;
        let mut action = String::new();
        for reply in first_consecutive_assistant_messages(&listed) {
            let Some(text) = reply.first_text().filter(|text| !text.is_empty()) else {
                continue;
            };
            action = detect_action(text);
            self.poster.send_message(Some(channel_id), text).await?;
            let stored = self
                .messages
                .create(ThreadMessage {
                    id: reply.id.clone(),
                    thread_id: thread_id.clone(),
                    role: reply.role.clone(),
                    content: text.to_owned(),
                    created_at: Utc::now(),
                })
                .await;
            // A reply can be listed again by a later run; the first copy stays.
            match stored {
                Ok(()) | Err(RepositoryError::Conflict(_)) => {}
                Err(error) => return Err(error.into()),
            }
        }

        info!(
            event_name = "agent.run.completed",
            thread_id = %thread_id,
            run_id = %run_id,
            action = %action,
            "assistant run completed"
        );
        Ok(AddMessageOutcome { message_id, action })
    }

    pub async fn close_thread(&self, thread_id: &ThreadId) -> Result<(), ConversationError> {
        self.update_thread_status(thread_id, ThreadStatus::Closed).await
    }

    pub async fn update_thread_status(
        &self,
        thread_id: &ThreadId,
        status: ThreadStatus,
    ) -> Result<(), ConversationError> {
        self.threads.update_status(thread_id, status).await?;
        info!(
            event_name = "agent.thread.status_updated",
            thread_id = %thread_id,
            status = status.as_str(),
            "assistant thread status updated"
        );
        Ok(())
    }

    /// Latest open thread of (channel, user), if any.
    pub async fn current_thread(
        &self,
        channel_id: &str,
        slack_user_id: &str,
    ) -> Result<Option<AssistantThread>, ConversationError> {
        Ok(self.threads.latest_open(channel_id, slack_user_id).await?)
    }

    async fn open_thread(
        &self,
        channel_id: &str,
        slack_user_id: &str,
    ) -> Result<ThreadId, ConversationError> {
        if let Some(thread) = self.threads.latest_open(channel_id, slack_user_id).await? {
            return Ok(thread.id);
        }

        let thread_id = ThreadId(self.assistant.create_thread().await?);
        self.threads
            .create(AssistantThread::open(thread_id.clone(), channel_id, slack_user_id, Utc::now()))
            .await?;
        info!(
            event_name = "agent.thread.created",
            thread_id = %thread_id,
            channel_id,
            slack_user_id,
            "assistant thread created"
        );
        Ok(thread_id)
    }

    async fn wait_for_run(&self, thread_id: &ThreadId, run_id: &str) -> Result<String, ConversationError> {
        let poll = async {
            loop {
                tokio::time::sleep(self.settings.poll_interval).await;
                let status = self.assistant.get_run(&thread_id.0, run_id).await?;
                if status != RUN_STATUS_QUEUED && status != RUN_STATUS_IN_PROGRESS {
                    return Ok::<_, ConversationError>(status);
                }
            }
        };

        match tokio::time::timeout(self.settings.run_timeout, poll).await {
            Ok(result) => result,
            Err(_) => Err(ConversationError::RunTimedOut {
                thread_id: thread_id.0.clone(),
                run_id: run_id.to_owned(),
            }),
        }
    }
}

/// Leading run of assistant messages, skipping anything before the first one.
pub fn first_consecutive_assistant_messages(messages: &[AssistantMessage]) -> Vec<&AssistantMessage> {
    let mut collected = Vec::new();
    for message in messages {
        if message.role == "assistant" {
            collected.push(message);
        } else if !collected.is_empty() {
            break;
        }
    }
    collected
}
