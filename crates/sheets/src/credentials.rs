use std::path::Path;

use secrecy::SecretString;
use serde::Deserialize;

use crate::SheetsError;

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// The fields of a Google service-account JSON key the token exchange needs.
#[derive(Clone, Debug, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: SecretString,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_owned()
}

impl ServiceAccountKey {
    pub fn from_json(raw: &str) -> Result<Self, SheetsError> {
        serde_json::from_str(raw).map_err(|error| SheetsError::Credentials {
            path: "<inline>".to_owned(),
            detail: error.to_string(),
        })
    }

    pub async fn from_file(path: &Path) -> Result<Self, SheetsError> {
        let credentials_error = |detail: String| SheetsError::Credentials {
            path: path.display().to_string(),
            detail,
        };
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|error| credentials_error(error.to_string()))?;
        serde_json::from_str(&raw).map_err(|error| credentials_error(error.to_string()))
    }
}
