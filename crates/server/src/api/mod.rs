//! HTTP surface of the server: the user API plus thin endpoints over the
//! Slack, assistant, Sheets and UiPath integrations.

mod assistant;
mod auth;
mod sheets;
mod slack;
mod uipath;
mod users;

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use secrecy::SecretString;
use serde::Serialize;
use tracing::warn;

use hyperbot_agent::ConversationService;
use hyperbot_core::errors::{ApplicationError, DomainError, InterfaceError};
use hyperbot_db::repositories::{UserPointRepository, UserRepository};
use hyperbot_db::RepositoryError;
use hyperbot_sheets::SheetService;
use hyperbot_slack::{EventDispatcher, SlackPoster};
use hyperbot_uipath::JobService;

pub use auth::{AdminUser, AuthTokens, AuthUser};

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepository>,
    pub points: Arc<dyn UserPointRepository>,
    pub tokens: Arc<AuthTokens>,
    pub poster: Arc<dyn SlackPoster>,
    pub signing_secret: SecretString,
    pub dispatcher: Arc<EventDispatcher>,
    pub conversation: Arc<ConversationService>,
    pub jobs: Arc<JobService>,
    /// `None` when no Google credentials are configured.
    pub sheets: Option<Arc<SheetService>>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/users", post(users::create_user).get(users::list_users))
        .route("/users/login", post(users::login))
        .route("/users/me", get(users::read_me))
        .route("/users/update-me", put(users::update_me))
        .route("/users/{id}", get(users::read_user).delete(users::delete_user))
        .route("/users/{id}/points", post(users::create_point))
        .route("/slack/send-message", post(slack::send_message))
        .route("/slack/interactions", post(slack::interactions))
        .route("/ai-assistant/add-message", post(assistant::add_message))
        .route("/sheets/candidate-offer", post(sheets::read_candidate_offer))
        .route("/sheets/shared-drive", post(sheets::create_in_shared_drive))
        .route("/sheets/candidate-file", post(sheets::handle_candidate_file))
        .route("/uipath/greeting", post(uipath::greeting))
        .route("/uipath/jobs/{id}", get(uipath::job_details))
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Every failed request answers `{"error": "..."}` with the mapped status.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}

impl From<InterfaceError> for ApiError {
    fn from(error: InterfaceError) -> Self {
        let status = match &error {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            InterfaceError::Forbidden { .. } => StatusCode::FORBIDDEN,
            InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
            InterfaceError::Conflict { .. } => StatusCode::CONFLICT,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            warn!(
                event_name = "api.request.failed",
                correlation_id = error.correlation_id(),
                status = status.as_u16(),
                error = %error,
                "request failed"
            );
        }
        Self::new(status, error.message())
    }
}

impl From<ApplicationError> for ApiError {
    fn from(error: ApplicationError) -> Self {
        InterfaceError::from(error).into()
    }
}

impl From<DomainError> for ApiError {
    fn from(error: DomainError) -> Self {
        ApplicationError::from(error).into()
    }
}

impl From<RepositoryError> for ApiError {
    fn from(error: RepositoryError) -> Self {
        let mapped = match error {
            RepositoryError::NotFound(detail) => ApplicationError::NotFound(detail),
            RepositoryError::Conflict(detail) => ApplicationError::Conflict(detail),
            other => ApplicationError::Persistence(other.to_string()),
        };
        mapped.into()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}
