//! Liveness and readiness probe.
//!
//! The database check doubles as a backlog probe: it counts UiPath jobs the
//! worker still has to poll, which is the first number to look at when Slack
//! stops receiving job results.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use hyperbot_db::DbPool;
use serde::Serialize;

const UNFINISHED_JOBS_QUERY: &str =
    "SELECT COUNT(*) FROM uipath_jobs WHERE state NOT IN ('Successful', 'Faulted', 'Stopped')";

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    Ready,
    Degraded,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DatabaseHealth {
    pub status: Readiness,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unfinished_jobs: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: Readiness,
    pub service: &'static str,
    pub version: &'static str,
    pub database: DatabaseHealth,
    pub checked_at: String,
}

pub fn router(db_pool: DbPool) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { db_pool })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_health(&state.db_pool).await;
    let status = database.status.clone();
    let status_code =
        if status == Readiness::Ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };

    let payload = HealthResponse {
        status,
        service: "hyperbot-server",
        version: env!("CARGO_PKG_VERSION"),
        database,
        checked_at: Utc::now().to_rfc3339(),
    };
    (status_code, Json(payload))
}

async fn database_health(pool: &DbPool) -> DatabaseHealth {
    match sqlx::query_scalar::<_, i64>(UNFINISHED_JOBS_QUERY).fetch_one(pool).await {
        Ok(count) => DatabaseHealth {
            status: Readiness::Ready,
            detail: "database query succeeded".to_owned(),
            unfinished_jobs: Some(count),
        },
        Err(error) => {
            tracing::warn!(
                event_name = "system.health.database_degraded",
                correlation_id = "health",
                error = %error,
                "health probe could not query the database"
            );
            DatabaseHealth {
                status: Readiness::Degraded,
                detail: format!("database query failed: {error}"),
                unfinished_jobs: None,
            }
        }
    }
}
