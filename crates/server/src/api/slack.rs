use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::Utc;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use hyperbot_core::errors::ApplicationError;
use hyperbot_core::signing;
use hyperbot_slack::payload::parse_interaction;
use hyperbot_slack::socket::deliver;
use hyperbot_slack::{EventContext, SlackEnvelope};

use super::{ApiError, AppState};

pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";
pub const SIGNATURE_HEADER: &str = "x-slack-signature";

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub channel_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct InteractionForm {
    payload: String,
}

pub async fn send_message(
    State(state): State<AppState>,
    payload: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(input) = payload?;
    if input.message.trim().is_empty() {
        return Err(ApiError::bad_request("message is required"));
    }

    state
        .poster
        .send_message(input.channel_id.as_deref(), &input.message)
        .await
        .map_err(|error| ApplicationError::Integration(error.to_string()))?;
    Ok(Json(json!({ "message": "Message sent to Slack" })))
}

/// Interactive-component callback delivered over HTTP. The request is
/// acknowledged as soon as it is verified; handling continues in the
/// background and replies go to the originating channel.
pub async fn interactions(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let secret = state.signing_secret.expose_secret();
    if secret.is_empty() {
        return Err(ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "slack signing secret is not configured",
        ));
    }

    let timestamp = header_value(&headers, TIMESTAMP_HEADER);
    let signature = header_value(&headers, SIGNATURE_HEADER);
    if let Err(error) = signing::verify(secret, timestamp, &body, signature, Utc::now().timestamp()) {
        warn!(
            event_name = "ingress.slack.signature_rejected",
            correlation_id = "http",
            error = %error,
            "slack interaction signature rejected"
        );
        return Err(ApiError::unauthorized(error.to_string()));
    }

    let form: InteractionForm = serde_urlencoded::from_bytes(&body)
        .map_err(|error| ApiError::bad_request(format!("invalid interaction body: {error}")))?;
    let payload: Value = serde_json::from_str(&form.payload)
        .map_err(|error| ApiError::bad_request(format!("invalid interaction payload: {error}")))?;

    let envelope = SlackEnvelope {
        envelope_id: format!("interaction-{}", Uuid::new_v4()),
        event: parse_interaction(&payload),
    };
    info!(
        event_name = "ingress.slack.interaction_received",
        correlation_id = %envelope.envelope_id,
        event_type = ?envelope.event.event_type(),
        "slack interaction received"
    );

    let dispatcher = state.dispatcher.clone();
    let poster = state.poster.clone();
    tokio::spawn(async move {
        let ctx = EventContext { correlation_id: envelope.envelope_id.clone() };
        deliver(&dispatcher, poster.as_ref(), &envelope, &ctx).await;
    });
    Ok(StatusCode::OK)
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers.get(name).and_then(|value| value.to_str().ok()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::Utc;
    use serde_json::json;
    use tower::ServiceExt;

    use hyperbot_core::signing::sign;

    use crate::api::router;
    use crate::test_support::{read_json, TestApp, SIGNING_SECRET};

    fn interaction_request(body: &str, signature: Option<String>) -> Request<Body> {
        let timestamp = Utc::now().timestamp().to_string();
        let signature = signature
            .unwrap_or_else(|| sign(SIGNING_SECRET, &timestamp, body.as_bytes()).expect("signed"));
        Request::post("/slack/interactions")
            .header("content-type", "application/x-www-form-urlencoded")
            .header("x-slack-request-timestamp", timestamp)
            .header("x-slack-signature", signature)
            .body(Body::from(body.to_owned()))
            .expect("request")
    }

    #[tokio::test]
    async fn send_message_posts_to_default_channel() {
        let app = TestApp::new();

        let response = router(app.state())
            .oneshot(
                Request::post("/slack/send-message")
                    .header("content-type", "application/json")
                    .body(Body::from(json!({ "message": "deploy finished" }).to_string()))
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_json(response).await["message"], "Message sent to Slack");
        let posted = app.poster.posted().await;
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].0, "C-DEFAULT");
    }

    #[tokio::test]
    async fn blank_message_is_rejected() {
        let app = TestApp::new();

        let response = router(app.state())
            .oneshot(
                Request::post("/slack/send-message")
                    .header("content-type", "application/json")
                    .body(Body::from(json!({ "message": "  " }).to_string()))
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(app.poster.posted().await.is_empty());
    }

    #[tokio::test]
    async fn signed_interaction_is_acknowledged() {
        let app = TestApp::new();
        let payload = json!({
            "type": "block_actions",
            "user": { "id": "U1", "name": "linh" },
            "channel": { "id": "C1" },
            "actions": [{ "action_id": "answer", "block_id": "feedback", "value": "yes" }]
        });
        let body = serde_urlencoded::to_string([("payload", payload.to_string())]).expect("encoded");

        let response =
            router(app.state()).oneshot(interaction_request(&body, None)).await.expect("response");

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn forged_signature_is_unauthorized() {
        let app = TestApp::new();
        let body = "payload=%7B%7D";

        let response = router(app.state())
            .oneshot(interaction_request(body, Some("v0=deadbeef".to_owned())))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn body_without_payload_field_is_bad_request() {
        let app = TestApp::new();

        let response = router(app.state())
            .oneshot(interaction_request("token=abc", None))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
