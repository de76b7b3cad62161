use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::blocks::{
    Attachment, Block, CheckboxesElement, Element, MessageBuilder, MessageTemplate, OptionObject,
    TextObject,
};

pub const HELLO_COMMAND: &str = "/hello";
pub const CHATBOT_FEEDBACK_COMMAND: &str = "/was-chatbot-useful";
pub const FEEDBACK_ANSWER_ACTION: &str = "answer";

const GREETING_COLOR: &str = "#4af030";
const SERVICE_COLOR: &str = "#3d3d3d";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlashCommandPayload {
    pub command: String,
    pub text: String,
    pub channel_id: String,
    pub user_id: String,
    pub user_name: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandRouteError {
    #[error("unknown slash command: {0}")]
    UnknownCommand(String),
}

#[derive(Clone, Debug, Default)]
pub struct CommandRouter;

impl CommandRouter {
    pub fn new() -> Self {
        Self
    }

    pub fn route(&self, payload: &SlashCommandPayload) -> Result<MessageTemplate, CommandRouteError> {
        self.route_at(payload, Utc::now())
    }

    pub fn route_at(
        &self,
        payload: &SlashCommandPayload,
        now: DateTime<Utc>,
    ) -> Result<MessageTemplate, CommandRouteError> {
        match payload.command.trim() {
            HELLO_COMMAND => Ok(hello_message(&payload.text, &payload.user_name, now)),
            CHATBOT_FEEDBACK_COMMAND => Ok(chatbot_feedback_message()),
            other => Err(CommandRouteError::UnknownCommand(other.to_owned())),
        }
    }
}

fn context_attachment(initializer: &str, now: DateTime<Utc>) -> Attachment {
    Attachment::new()
        .field("Date", now.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .field("Initializer", initializer)
}

pub fn hello_message(text: &str, user_name: &str, now: DateTime<Utc>) -> MessageTemplate {
    let greeting = format!("Hello {text}");
    MessageBuilder::new(greeting.clone())
        .attachment(context_attachment(user_name, now).text(greeting).color(GREETING_COLOR))
        .build()
}

pub fn chatbot_feedback_message() -> MessageTemplate {
    let question = Block::Section {
        block_id: None,
        text: Some(TextObject::mrkdwn("Did you think this chatbot was helpful?")),
        fields: Vec::new(),
        accessory: Some(Element::Checkboxes(
            CheckboxesElement::new(FEEDBACK_ANSWER_ACTION)
                .option(OptionObject::new("Yes", "yes").description("Did you Enjoy it?"))
                .option(OptionObject::new("No", "no").description("Did you Dislike it?")),
        )),
    };

    MessageBuilder::new("Rate the tutorial")
        .attachment(Attachment::new().block(question).text("Rate the tutorial").color(GREETING_COLOR))
        .build()
}

/// Reply to an `@bot` mention. `user_name` is the Slack handle of the author.
pub fn mention_reply(text: &str, user_name: &str, now: DateTime<Utc>) -> MessageTemplate {
    let attachment = context_attachment(user_name, now);
    let attachment = if text.to_lowercase().contains("hello") {
        attachment.text(format!("Hello {user_name}")).pretext("Greetings").color(GREETING_COLOR)
    } else {
        attachment
            .text(format!("How can I help you {user_name}?"))
            .pretext("How can I be of service")
            .color(SERVICE_COLOR)
    };

    let fallback = attachment.text.clone().unwrap_or_default();
    MessageBuilder::new(fallback).attachment(attachment).build()
}
