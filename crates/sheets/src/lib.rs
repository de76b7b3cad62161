//! Google Sheets and Drive access for the candidate-offer workflow.

pub mod client;
pub mod credentials;
pub mod service;
pub mod token;

pub use client::{CreatedSpreadsheet, SheetsClient};
pub use credentials::ServiceAccountKey;
pub use service::SheetService;
pub use token::{AccessTokenSource, ServiceAccountTokenProvider, StaticToken};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SheetsError {
    #[error("failed to read credentials file `{path}`: {detail}")]
    Credentials { path: String, detail: String },
    #[error("failed to sign token assertion: {0}")]
    Signing(String),
    #[error("google request to `{endpoint}` failed: {detail}")]
    Http { endpoint: String, detail: String },
    #[error("google endpoint `{endpoint}` returned status {status}: {body}")]
    Status { endpoint: String, status: u16, body: String },
    #[error("google response from `{endpoint}` could not be decoded: {detail}")]
    Decode { endpoint: String, detail: String },
    #[error("invalid sheet link: {0}")]
    InvalidLink(String),
}
