//! Azure OpenAI assistants REST client (threads, messages, runs, files).

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

use hyperbot_core::config::AzureOpenAiConfig;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AssistantError {
    #[error("assistant request to `{path}` failed: {detail}")]
    Http { path: String, detail: String },
    #[error("assistant endpoint `{path}` returned unexpected status code {status}")]
    Status { path: String, status: u16 },
    #[error("assistant response from `{path}` could not be decoded: {detail}")]
    Decode { path: String, detail: String },
}

pub const RUN_STATUS_QUEUED: &str = "queued";
pub const RUN_STATUS_IN_PROGRESS: &str = "in_progress";
pub const RUN_STATUS_COMPLETED: &str = "completed";

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct MessageText {
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub annotations: Vec<Value>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct MessageContent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<MessageText>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct AssistantMessage {
    pub id: String,
    pub role: String,
    #[serde(default)]
    pub content: Vec<MessageContent>,
}

impl AssistantMessage {
    /// First `text` content part, if any.
    pub fn first_text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|content| content.kind == "text")
            .and_then(|content| content.text.as_ref())
            .map(|text| text.value.as_str())
    }
}

#[derive(Deserialize)]
struct IdResponse {
    id: String,
}

#[derive(Deserialize)]
struct RunResponse {
    status: String,
}

#[derive(Deserialize)]
struct MessageList {
    #[serde(default)]
    data: Vec<AssistantMessage>,
}

/// Seam over the assistants API so the conversation flow can run against fakes.
#[async_trait]
pub trait AssistantApi: Send + Sync {
    async fn create_thread(&self) -> Result<String, AssistantError>;
    async fn create_message(&self, thread_id: &str, content: &str) -> Result<String, AssistantError>;
    async fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<String, AssistantError>;
    /// Returns the run status (`queued`, `in_progress`, `completed`, ...).
    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<String, AssistantError>;
    /// Messages newest first, as the API lists them.
    async fn list_messages(&self, thread_id: &str) -> Result<Vec<AssistantMessage>, AssistantError>;
    async fn get_file_content(&self, file_id: &str) -> Result<Vec<u8>, AssistantError>;
    async fn get_file_information(
        &self,
        file_id: &str,
    ) -> Result<Map<String, Value>, AssistantError>;
}

#[derive(Clone)]
pub struct AssistantClient {
    http: Client,
    endpoint: String,
    api_key: SecretString,
    api_version: String,
}

impl AssistantClient {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: SecretString,
        api_version: impl Into<String>,
    ) -> Self {
        Self {
            http: Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_owned(),
            api_key,
            api_version: api_version.into(),
        }
    }

    pub fn from_config(config: &AzureOpenAiConfig) -> Self {
        Self::new(config.endpoint.clone(), config.api_key.clone(), config.api_version.clone())
    }

    fn url(&self, path: &str) -> String {
        format!("{}/openai/{path}?api-version={}", self.endpoint, self.api_version)
    }

    async fn send(&self, path: &str, request: RequestBuilder) -> Result<reqwest::Response, AssistantError> {
        let response = request
            .header("api-key", self.api_key.expose_secret())
            .send()
            .await
            .map_err(|error| AssistantError::Http { path: path.to_owned(), detail: error.to_string() })?;

        if response.status() != StatusCode::OK {
            return Err(AssistantError::Status {
                path: path.to_owned(),
                status: response.status().as_u16(),
            });
        }
        Ok(response)
    }

    async fn post_json<T: DeserializeOwned>(&self, path: &str, body: Value) -> Result<T, AssistantError> {
        let response = self.send(path, self.http.post(self.url(path)).json(&body)).await?;
        decode(path, response).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, AssistantError> {
        let response = self.send(path, self.http.get(self.url(path))).await?;
        decode(path, response).await
    }
}

async fn decode<T: DeserializeOwned>(path: &str, response: reqwest::Response) -> Result<T, AssistantError> {
    response
        .json::<T>()
        .await
        .map_err(|error| AssistantError::Decode { path: path.to_owned(), detail: error.to_string() })
}

#[async_trait]
impl AssistantApi for AssistantClient {
    async fn create_thread(&self) -> Result<String, AssistantError> {
        let created: IdResponse = self.post_json("threads", json!({})).await?;
        Ok(created.id)
    }

    async fn create_message(&self, thread_id: &str, content: &str) -> Result<String, AssistantError> {
        let path = format!("threads/{thread_id}/messages");
        let created: IdResponse =
            self.post_json(&path, json!({ "role": "user", "content": content })).await?;
        Ok(created.id)
    }

    async fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<String, AssistantError> {
        let path = format!("threads/{thread_id}/runs");
        let created: IdResponse =
            self.post_json(&path, json!({ "assistant_id": assistant_id })).await?;
        Ok(created.id)
    }

    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<String, AssistantError> {
        let run: RunResponse = self.get_json(&format!("threads/{thread_id}/runs/{run_id}")).await?;
        Ok(run.status)
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<AssistantMessage>, AssistantError> {
        let list: MessageList = self.get_json(&format!("threads/{thread_id}/messages")).await?;
        Ok(list.data)
    }

    async fn get_file_content(&self, file_id: &str) -> Result<Vec<u8>, AssistantError> {
        let path = format!("files/{file_id}/content");
        let response = self.send(&path, self.http.get(self.url(&path))).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|error| AssistantError::Decode { path, detail: error.to_string() })?;
        Ok(bytes.to_vec())
    }

    async fn get_file_information(
        &self,
        file_id: &str,
    ) -> Result<Map<String, Value>, AssistantError> {
        self.get_json(&format!("files/{file_id}")).await
    }
}
