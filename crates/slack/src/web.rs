//! Slack Web API client for the handful of methods the bot calls.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::blocks::{notice_message, MessageTemplate};

pub const DEFAULT_API_BASE_URL: &str = "https://slack.com/api";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SlackApiError {
    #[error("slack request failed: {0}")]
    Http(String),
    #[error("slack api `{method}` returned error `{code}`")]
    Api { method: String, code: String },
    #[error("slack response for `{method}` could not be decoded: {detail}")]
    Decode { method: String, detail: String },
}

/// Outbound side of the bot: everything that writes to Slack goes through here.
#[async_trait]
pub trait SlackPoster: Send + Sync {
    fn default_channel(&self) -> &str;

    /// Posts a message and returns its `ts`.
    async fn post_message(
        &self,
        channel: &str,
        message: &MessageTemplate,
    ) -> Result<String, SlackApiError>;

    async fn user_name(&self, user_id: &str) -> Result<String, SlackApiError>;

    /// Posts `text` as an attachment pretext, to `channel` or the default channel.
    async fn send_message(&self, channel: Option<&str>, text: &str) -> Result<String, SlackApiError> {
        let channel = channel
            .map(str::trim)
            .filter(|channel| !channel.is_empty())
            .unwrap_or_else(|| self.default_channel())
            .to_owned();
        self.post_message(&channel, &notice_message(text)).await
    }
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

#[derive(Clone)]
pub struct SlackWebClient {
    http: Client,
    base_url: String,
    bot_token: SecretString,
    app_token: SecretString,
    default_channel: String,
}

impl SlackWebClient {
    pub fn new(
        base_url: impl Into<String>,
        bot_token: SecretString,
        app_token: SecretString,
        default_channel: impl Into<String>,
    ) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            bot_token,
            app_token,
            default_channel: default_channel.into(),
        }
    }

    pub fn from_config(config: &hyperbot_core::config::SlackConfig) -> Self {
        Self::new(
            config.api_base_url.clone(),
            config.bot_token.clone(),
            config.app_token.clone(),
            config.default_channel.clone(),
        )
    }

    /// Requests a Socket Mode websocket URL with the app-level token.
    pub async fn open_connection(&self) -> Result<String, SlackApiError> {
        let request = self.http.post(self.url("apps.connections.open"));
        let body = self.call("apps.connections.open", &self.app_token, request).await?;
        string_field(&body, "apps.connections.open", "url")
    }

    /// Returns the bot user id the token belongs to.
    pub async fn auth_test(&self) -> Result<String, SlackApiError> {
        let request = self.http.post(self.url("auth.test"));
        let body = self.call("auth.test", &self.bot_token, request).await?;
        string_field(&body, "auth.test", "user_id")
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{method}", self.base_url)
    }

    async fn call(
        &self,
        method: &str,
        token: &SecretString,
        request: RequestBuilder,
    ) -> Result<Map<String, Value>, SlackApiError> {
        let response = request
            .bearer_auth(token.expose_secret())
            .send()
            .await
            .map_err(|error| SlackApiError::Http(error.to_string()))?;
        let envelope = response.json::<ApiEnvelope>().await.map_err(|error| {
            SlackApiError::Decode { method: method.to_owned(), detail: error.to_string() }
        })?;

        if !envelope.ok {
            return Err(SlackApiError::Api {
                method: method.to_owned(),
                code: envelope.error.unwrap_or_else(|| "unknown_error".to_owned()),
            });
        }

        debug!(event_name = "slack.web.call_ok", method, "slack api call succeeded");
        Ok(envelope.rest)
    }
}

fn string_field(
    body: &Map<String, Value>,
    method: &str,
    field: &str,
) -> Result<String, SlackApiError> {
    body.get(field).and_then(Value::as_str).map(str::to_owned).ok_or_else(|| {
        SlackApiError::Decode { method: method.to_owned(), detail: format!("missing `{field}`") }
    })
}

pub(crate) fn post_message_body(channel: &str, message: &MessageTemplate) -> Value {
    let mut body = json!({ "channel": channel, "text": message.fallback_text });
    if !message.blocks.is_empty() {
        body["blocks"] = json!(message.blocks);
    }
    if !message.attachments.is_empty() {
        body["attachments"] = json!(message.attachments);
    }
    body
}

#[async_trait]
impl SlackPoster for SlackWebClient {
    fn default_channel(&self) -> &str {
        &self.default_channel
    }

    async fn post_message(
        &self,
        channel: &str,
        message: &MessageTemplate,
    ) -> Result<String, SlackApiError> {
        let request =
            self.http.post(self.url("chat.postMessage")).json(&post_message_body(channel, message));
        let body = self.call("chat.postMessage", &self.bot_token, request).await?;
        Ok(body.get("ts").and_then(Value::as_str).unwrap_or_default().to_owned())
    }

    async fn user_name(&self, user_id: &str) -> Result<String, SlackApiError> {
        let request = self.http.get(self.url("users.info")).query(&[("user", user_id)]);
        let body = self.call("users.info", &self.bot_token, request).await?;
        body.get("user")
            .and_then(|user| user.get("name"))
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| SlackApiError::Decode {
                method: "users.info".to_owned(),
                detail: "missing `user.name`".to_owned(),
            })
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use secrecy::SecretString;
    use serde_json::json;

    use super::{SlackApiError, SlackPoster, SlackWebClient};
    use crate::blocks::MessageTemplate;

    fn client(server: &MockServer) -> SlackWebClient {
        SlackWebClient::new(
            server.base_url(),
            SecretString::from("xoxb-test"),
            SecretString::from("xapp-test"),
            "C-DEFAULT",
        )
    }

    #[tokio::test]
    async fn post_message_sends_bot_token_and_returns_ts() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/chat.postMessage")
                    .header("authorization", "Bearer xoxb-test")
                    .json_body(json!({ "channel": "C1", "text": "hello" }));
                then.status(200).json_body(json!({ "ok": true, "ts": "1730000000.0001" }));
            })
            .await;

        let ts = client(&server)
            .post_message("C1", &MessageTemplate::text("hello"))
            .await
            .expect("posted");

        mock.assert_async().await;
        assert_eq!(ts, "1730000000.0001");
    }

    #[tokio::test]
    async fn send_message_falls_back_to_default_channel() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/chat.postMessage").json_body(json!({
                    "channel": "C-DEFAULT",
                    "text": "deploy finished",
                    "attachments": [{ "pretext": "deploy finished" }],
                }));
                then.status(200).json_body(json!({ "ok": true, "ts": "1" }));
            })
            .await;

        client(&server).send_message(Some("  "), "deploy finished").await.expect("sent");

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn not_ok_response_is_an_api_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat.postMessage");
                then.status(200).json_body(json!({ "ok": false, "error": "channel_not_found" }));
            })
            .await;

        let error = client(&server)
            .post_message("C404", &MessageTemplate::text("hi"))
            .await
            .expect_err("api error");

        assert_eq!(
            error,
            SlackApiError::Api {
                method: "chat.postMessage".to_owned(),
                code: "channel_not_found".to_owned()
            }
        );
    }

    #[tokio::test]
    async fn user_name_reads_users_info() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/users.info").query_param("user", "U1");
                then.status(200)
                    .json_body(json!({ "ok": true, "user": { "id": "U1", "name": "alice" } }));
            })
            .await;

        let name = client(&server).user_name("U1").await.expect("user");

        assert_eq!(name, "alice");
    }

    #[tokio::test]
    async fn open_connection_uses_app_token() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/apps.connections.open")
                    .header("authorization", "Bearer xapp-test");
                then.status(200).json_body(json!({ "ok": true, "url": "wss://socket.test/link" }));
            })
            .await;

        let url = client(&server).open_connection().await.expect("url");

        mock.assert_async().await;
        assert_eq!(url, "wss://socket.test/link");
    }
}
