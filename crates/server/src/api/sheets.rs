use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use hyperbot_core::domain::sheet::CandidateOffer;
use hyperbot_core::errors::{ApplicationError, DomainError};
use hyperbot_sheets::{CreatedSpreadsheet, SheetService, SheetsError};

use super::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct SheetUrlRequest {
    pub sheet_url: String,
}

#[derive(Debug, Deserialize)]
pub struct SheetNameRequest {
    pub sheet_name: String,
}

pub async fn read_candidate_offer(
    State(state): State<AppState>,
    payload: Result<Json<SheetUrlRequest>, JsonRejection>,
) -> Result<Json<Vec<CandidateOffer>>, ApiError> {
    let Json(input) = payload?;
    let sheets = sheet_service(&state)?;
    let offers = sheets.read_candidate_offer(input.sheet_url.trim()).await.map_err(sheets_error)?;
    Ok(Json(offers))
}

pub async fn create_in_shared_drive(
    State(state): State<AppState>,
    payload: Result<Json<SheetNameRequest>, JsonRejection>,
) -> Result<Json<CreatedSpreadsheet>, ApiError> {
    let Json(input) = payload?;
    let title = input.sheet_name.trim();
    if title.is_empty() {
        return Err(DomainError::InvalidInput("sheet_name is required".to_owned()).into());
    }
    let sheets = sheet_service(&state)?;
    let created = sheets.create_sheet_in_shared_drive(title).await.map_err(sheets_error)?;
    Ok(Json(created))
}

pub async fn handle_candidate_file(
    State(state): State<AppState>,
    payload: Result<Json<SheetUrlRequest>, JsonRejection>,
) -> Result<Json<CreatedSpreadsheet>, ApiError> {
    let Json(input) = payload?;
    let sheets = sheet_service(&state)?;
    let created = sheets.handle_candidate_file(input.sheet_url.trim()).await.map_err(sheets_error)?;
    Ok(Json(created))
}

fn sheet_service(state: &AppState) -> Result<&Arc<SheetService>, ApiError> {
    state.sheets.as_ref().ok_or_else(|| {
        ApplicationError::Integration("google sheets integration is not configured".to_owned()).into()
    })
}

fn sheets_error(error: SheetsError) -> ApiError {
    match error {
        SheetsError::InvalidLink(_) => ApiError::bad_request(error.to_string()),
        other => ApplicationError::Integration(other.to_string()).into(),
    }
}
