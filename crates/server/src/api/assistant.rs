use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use hyperbot_core::errors::{ApplicationError, DomainError};

use super::{ApiError, AppState};

/// Slack user id recorded for conversations started over HTTP.
pub const API_USER_ID: &str = "http-api";

#[derive(Debug, Deserialize)]
pub struct AddMessageRequest {
    pub channel_id: String,
    pub message: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AddMessageResponse {
    pub message: String,
    pub action: String,
}

pub async fn add_message(
    State(state): State<AppState>,
    payload: Result<Json<AddMessageRequest>, JsonRejection>,
) -> Result<Json<AddMessageResponse>, ApiError> {
    let Json(input) = payload?;
    if input.channel_id.trim().is_empty() {
        return Err(DomainError::InvalidInput("channel_id is required".to_owned()).into());
    }
    if input.message.trim().is_empty() {
        return Err(DomainError::InvalidInput("message is required".to_owned()).into());
    }
    let user_id = input
        .user_id
        .as_deref()
        .map(str::trim)
        .filter(|user| !user.is_empty())
        .unwrap_or(API_USER_ID);

    let outcome = state
        .conversation
        .add_and_run_message(input.channel_id.trim(), user_id, &input.message)
        .await
        .map_err(|error| ApplicationError::Integration(error.to_string()))?;
    Ok(Json(AddMessageResponse { message: outcome.message_id, action: outcome.action }))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    use crate::api::router;
    use crate::test_support::{read_json, TestApp};

    #[tokio::test]
    async fn add_message_returns_message_id_and_detected_action() {
        let app = TestApp::with_assistant_reply("Sure, please fill the form (action: create_buddy)");

        let response = router(app.state())
            .oneshot(
                Request::post("/ai-assistant/add-message")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        json!({ "channel_id": "C1", "message": "I need a buddy" }).to_string(),
                    ))
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["message"], "msg-user-1");
        assert_eq!(body["action"], "create_buddy");
        let posted = app.poster.posted().await;
        assert_eq!(posted[0].0, "C1");
    }

    #[tokio::test]
    async fn missing_channel_is_bad_request() {
        let app = TestApp::new();

        let response = router(app.state())
            .oneshot(
                Request::post("/ai-assistant/add-message")
                    .header("content-type", "application/json")
                    .body(Body::from(json!({ "channel_id": " ", "message": "hi" }).to_string()))
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(read_json(response).await["error"], "channel_id is required");
    }
}
