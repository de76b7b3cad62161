//! Slack-facing services behind the event dispatcher: mention replies, the
//! assistant conversation, and the form submissions that start UiPath jobs
//! or Sheets work.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use hyperbot_agent::{ActionRouter, ConversationError, ConversationService};
use hyperbot_core::domain::leave::hour_code;
use hyperbot_core::domain::thread::ThreadId;
use hyperbot_core::domain::uipath::{
    FillBuddyInput, GreetingInput, LeaveRequestInput, SheetProcessInput,
};
use hyperbot_core::validation::{
    extract_sheet_id, is_valid_email, is_valid_sheet_link, parse_form_date,
};
use hyperbot_sheets::SheetService;
use hyperbot_slack::blocks::{notice_message, MessageBuilder, MessageTemplate};
use hyperbot_slack::commands::mention_reply;
use hyperbot_slack::events::{
    BlockActionEvent, BlockActionHandler, BlockActionService, EventHandlerError, MentionHandler,
    MentionService, MessageEvent, MessageHandler, MessageService, SlashCommandHandler,
};
use hyperbot_slack::forms::*;
use hyperbot_slack::{EventContext, EventDispatcher, SlackPoster};
use hyperbot_uipath::JobService;

/// How long a conversation stays open after the assistant proposes closing it.
pub const CLOSE_THREAD_DELAY: Duration = Duration::from_secs(60);

pub fn dispatcher(
    conversation: Arc<ConversationService>,
    jobs: Arc<JobService>,
    sheets: Option<Arc<SheetService>>,
    poster: Arc<dyn SlackPoster>,
    close_delay: Duration,
) -> EventDispatcher {
    let closer = Arc::new(ThreadCloser::new(conversation.clone(), close_delay));

    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(SlashCommandHandler::default());
    dispatcher.register(MentionHandler::new(MentionResponder { poster: poster.clone() }));
    dispatcher.register(MessageHandler::new(ConversationResponder {
        conversation,
        router: ActionRouter::new(),
        closer: closer.clone(),
    }));
    dispatcher.register(BlockActionHandler::new(FormSubmissions { jobs, sheets, poster, closer }));
    dispatcher
}

pub struct MentionResponder {
    poster: Arc<dyn SlackPoster>,
}

#[async_trait]
impl MentionService for MentionResponder {
    async fn handle_mention(
        &self,
        event: &MessageEvent,
        _ctx: &EventContext,
    ) -> Result<Option<MessageTemplate>, EventHandlerError> {
        let user_name = self
            .poster
            .user_name(&event.user_id)
            .await
            .map_err(|error| EventHandlerError::Mention(error.to_string()))?;
        Ok(Some(mention_reply(&event.text, &user_name, Utc::now())))
    }
}

/// Closes assistant threads after a grace period unless the user asks to
/// keep talking. At most one close is pending per (channel, user).
pub struct ThreadCloser {
    conversation: Arc<ConversationService>,
    delay: Duration,
    pending: Mutex<HashMap<(String, String), JoinHandle<()>>>,
}

impl ThreadCloser {
    pub fn new(conversation: Arc<ConversationService>, delay: Duration) -> Self {
        Self { conversation, delay, pending: Mutex::new(HashMap::new()) }
    }

    pub async fn schedule(&self, channel_id: &str, user_id: &str, thread_id: ThreadId) {
        let conversation = self.conversation.clone();
        let delay = self.delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match conversation.close_thread(&thread_id).await {
                Ok(()) => info!(
                    event_name = "bot.thread.closed",
                    thread_id = %thread_id,
                    "assistant thread closed after grace period"
                ),
                Err(error) => warn!(
                    event_name = "bot.thread.close_failed",
                    thread_id = %thread_id,
                    error = %error,
                    "assistant thread could not be closed"
                ),
            }
        });

        let key = (channel_id.to_owned(), user_id.to_owned());
        let mut pending = self.pending.lock().await;
        pending.retain(|_, scheduled| !scheduled.is_finished());
        if let Some(previous) = pending.insert(key, handle) {
            previous.abort();
        }
    }

    /// Returns whether a close was still pending.
    pub async fn cancel(&self, channel_id: &str, user_id: &str) -> bool {
        let key = (channel_id.to_owned(), user_id.to_owned());
        match self.pending.lock().await.remove(&key) {
            Some(handle) => {
                let was_pending = !handle.is_finished();
                handle.abort();
                was_pending
            }
            None => false,
        }
    }
}

pub struct ConversationResponder {
    conversation: Arc<ConversationService>,
    router: ActionRouter,
    closer: Arc<ThreadCloser>,
}

#[async_trait]
impl MessageService for ConversationResponder {
    async fn handle_message(
        &self,
        event: &MessageEvent,
        ctx: &EventContext,
    ) -> Result<Option<MessageTemplate>, EventHandlerError> {
        let conversation_failed =
            |error: ConversationError| EventHandlerError::Message(error.to_string());

        let outcome = self
            .conversation
            .add_and_run_message(&event.channel_id, &event.user_id, &event.text)
            .await
            .map_err(conversation_failed)?;
        let Some(form) = self.router.route(&outcome.action) else {
            return Ok(None);
        };

        if form == Form::ConfirmContinueThread {
            let thread = self
                .conversation
                .current_thread(&event.channel_id, &event.user_id)
                .await
                .map_err(conversation_failed)?;
            if let Some(thread) = thread {
                self.closer.schedule(&event.channel_id, &event.user_id, thread.id).await;
            }
        }

        info!(
            event_name = "bot.form.sent",
            correlation_id = %ctx.correlation_id,
            action = %outcome.action,
            channel_id = %event.channel_id,
            "form sent for detected action"
        );
        Ok(Some(form.template()))
    }
}

pub struct FormSubmissions {
    jobs: Arc<JobService>,
    sheets: Option<Arc<SheetService>>,
    poster: Arc<dyn SlackPoster>,
    closer: Arc<ThreadCloser>,
}

type Reply = Result<Option<MessageTemplate>, EventHandlerError>;

fn rejected(text: &str) -> Reply {
    Ok(Some(notice_message(text)))
}

fn failed(error: impl std::fmt::Display) -> EventHandlerError {
    EventHandlerError::BlockAction(error.to_string())
}

#[async_trait]
impl BlockActionService for FormSubmissions {
    async fn handle_block_action(&self, event: &BlockActionEvent, ctx: &EventContext) -> Reply {
        let Some(action_id) = event.primary_action_id() else {
            return Ok(None);
        };
        info!(
            event_name = "bot.form.submitted",
            correlation_id = %ctx.correlation_id,
            action_id,
            channel_id = %event.channel_id,
            "form submission received"
        );

        match action_id {
            SUBMIT_CANDIDATE_FILE => self.candidate_file(event).await,
            SUBMIT_WELCOME_NEW_EMPLOYEE => self.welcome_new_employee(event).await,
            SUBMIT_CREATE_BUDDY => self.create_buddy(event).await,
            SUBMIT_INTEGRATE_TRAINING | SUBMIT_PRE_ONBOARD_EMAIL => {
                self.sheet_process(event, action_id).await
            }
            SUBMIT_CREATE_LEAVE_REQUEST => self.leave_request(event).await,
            CONTINUE_THREAD => self.continue_thread(event).await,
            // Feedback answers and unknown buttons need no reply.
            _ => Ok(None),
        }
    }
}

impl FormSubmissions {
    async fn candidate_file(&self, event: &BlockActionEvent) -> Reply {
        let link = event.text_value(CANDIDATE_FILE_BLOCK, CANDIDATE_FILE_INPUT);
        // The sheet is read directly, so its id must be extractable too.
        if !is_valid_sheet_link(&link) || extract_sheet_id(&link).is_err() {
            return rejected("Invalid candidate file link");
        }
        let Some(sheets) = &self.sheets else {
            return rejected("Google Sheets integration is not configured");
        };

        let received = MessageBuilder::new(format!("Received candidate sheet link: {link}"))
            .section(|section| {
                section.mrkdwn(format!("Received candidate sheet link: {link}"));
            })
            .build();
        self.poster.post_message(&event.channel_id, &received).await.map_err(failed)?;

        let created = sheets.handle_candidate_file(&link).await.map_err(failed)?;
        let text = format!("File skill: {}", created.spreadsheet_url);
        Ok(Some(
            MessageBuilder::new(text.clone())
                .section(|section| {
                    section.mrkdwn(text);
                })
                .build(),
        ))
    }

    async fn welcome_new_employee(&self, event: &BlockActionEvent) -> Reply {
        let skill_file = event.text_value(SKILL_FILE_BLOCK, SKILL_FILE_INPUT);
        let personal_email = event.text_value(PERSONAL_EMAIL_BLOCK, PERSONAL_EMAIL_INPUT);
        if !is_valid_sheet_link(&skill_file) {
            return rejected("Invalid skill file link");
        }
        if !is_valid_email(&personal_email) {
            return rejected("Invalid personal email");
        }

        self.jobs
            .create_greeting_job(&GreetingInput { skill_file, personal_email }, &event.channel_id)
            .await
            .map_err(failed)?;
        Ok(None)
    }

    async fn create_buddy(&self, event: &BlockActionEvent) -> Reply {
        let input_sheet = event.text_value(TRANSFORMATION_INPUT_BLOCK, TRANSFORMATION_INPUT_INPUT);
        let output_sheet = event.text_value(TRANSFORMATION_OUTPUT_BLOCK, TRANSFORMATION_OUTPUT_INPUT);
        if !is_valid_sheet_link(&input_sheet) {
            return rejected("Invalid transformation input file link");
        }
        if !is_valid_sheet_link(&output_sheet) {
            return rejected("Invalid transformation output file link");
        }

        self.jobs
            .create_buddy_job(&FillBuddyInput { input_sheet, output_sheet }, &event.channel_id)
            .await
            .map_err(failed)?;
        Ok(None)
    }

    async fn sheet_process(&self, event: &BlockActionEvent, action_id: &str) -> Reply {
        let sheet_url = event.text_value(SHEET_URL_BLOCK, SHEET_URL_INPUT);
        let sheet_name = event.text_value(SHEET_NAME_BLOCK, SHEET_NAME_INPUT);
        if !is_valid_sheet_link(&sheet_url) {
            return rejected("Invalid skill file link");
        }
        if sheet_name.is_empty() {
            return rejected("Sheet name is required");
        }

        let input = SheetProcessInput { sheet_url, sheet_name };
        let started = if action_id == SUBMIT_INTEGRATE_TRAINING {
            self.jobs.create_integrate_training_job(&input, &event.channel_id).await
        } else {
            self.jobs.create_pre_onboard_email_job(&input, &event.channel_id).await
        };
        started.map_err(failed)?;
        Ok(None)
    }

    async fn leave_request(&self, event: &BlockActionEvent) -> Reply {
        let start_date = event.selected_date(DATE_PICKERS_BLOCK, REQUEST_DATE_FROM_INPUT);
        let end_date = event.selected_date(DATE_PICKERS_BLOCK, REQUEST_DATE_TO_INPUT);
        let hour_from = event.selected_time(TIME_PICKERS_BLOCK, HOUR_FROM_INPUT);
        let hour_to = event.selected_time(TIME_PICKERS_BLOCK, HOUR_TO_INPUT);
        let description = event.text_value(DESCRIPTION_BLOCK, DESCRIPTION_INPUT);
        let working_time = event.selected_option(LEAVE_TYPE_BLOCK, WORKING_TIME_INPUT);
        let leave_type = event.selected_option(LEAVE_TYPE_BLOCK, LEAVE_TYPE_INPUT);
        let work_email = event.text_value(WORKER_EMAIL_BLOCK, WORKER_EMAIL_INPUT);

        let fields = [
            &start_date,
            &end_date,
            &hour_from,
            &hour_to,
            &description,
            &working_time,
            &leave_type,
            &work_email,
        ];
        if fields.iter().any(|field| field.is_empty()) {
            return rejected("All fields are required");
        }

        let Ok(request_date_from) = parse_form_date(&start_date) else {
            return rejected("Invalid start date format");
        };
        let Ok(request_date_to) = parse_form_date(&end_date) else {
            return rejected("Invalid end date format");
        };
        let Ok(calendar_id) = working_time.parse::<i64>() else {
            return rejected("Invalid working time");
        };
        let Ok(holiday_status_id) = leave_type.parse::<i64>() else {
            return rejected("Invalid leave type");
        };

        let input = LeaveRequestInput {
            request_date_from,
            request_date_to,
            description,
            calendar_id,
            holiday_status_id,
            hour_from: hour_code(&hour_from),
            hour_to: hour_code(&hour_to),
            work_email,
        };
        self.jobs.create_leave_request_job(&input, &event.channel_id).await.map_err(failed)?;
        Ok(None)
    }

    async fn continue_thread(&self, event: &BlockActionEvent) -> Reply {
        if self.closer.cancel(&event.channel_id, &event.user_id).await {
            rejected("Got it, this conversation stays open.")
        } else {
            rejected("This conversation was already closed. Send a new message to start another one.")
        }
    }
}
