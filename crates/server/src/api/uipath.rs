use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use hyperbot_core::domain::uipath::{GreetingInput, JobId, UiPathJob};
use hyperbot_core::errors::ApplicationError;
use hyperbot_core::validation::{is_valid_email, is_valid_sheet_link};
use hyperbot_uipath::{JobDetails, UiPathError};

use super::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct GreetingRequest {
    pub skill_file: String,
    pub personal_email: String,
    #[serde(default)]
    pub channel_id: Option<String>,
}

pub async fn greeting(
    State(state): State<AppState>,
    payload: Result<Json<GreetingRequest>, JsonRejection>,
) -> Result<Json<UiPathJob>, ApiError> {
    let Json(input) = payload?;
    let skill_file = input.skill_file.trim();
    let personal_email = input.personal_email.trim();
    if !is_valid_sheet_link(skill_file) {
        return Err(ApiError::bad_request("Invalid skill file link"));
    }
    if !is_valid_email(personal_email) {
        return Err(ApiError::bad_request("Invalid personal email"));
    }

    let channel = input
        .channel_id
        .as_deref()
        .map(str::trim)
        .filter(|channel| !channel.is_empty())
        .unwrap_or_else(|| state.poster.default_channel())
        .to_owned();
    let job = state
        .jobs
        .create_greeting_job(
            &GreetingInput {
                skill_file: skill_file.to_owned(),
                personal_email: personal_email.to_owned(),
            },
            &channel,
        )
        .await
        .map_err(uipath_error)?;
    Ok(Json(job))
}

pub async fn job_details(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<JobDetails>, ApiError> {
    let Path(id) = path?;
    let details = state.jobs.job_details(JobId(id)).await.map_err(uipath_error)?;
    Ok(Json(details))
}

fn uipath_error(error: UiPathError) -> ApiError {
    match error {
        UiPathError::UnknownJob(_) | UiPathError::Status(404) => ApiError::not_found(error.to_string()),
        UiPathError::Repository(inner) => inner.into(),
        other => ApplicationError::Integration(other.to_string()).into(),
    }
}
