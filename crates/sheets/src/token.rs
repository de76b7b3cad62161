//! OAuth2 access tokens for Google APIs via the service-account JWT bearer flow.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::credentials::ServiceAccountKey;
use crate::SheetsError;

pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
// Tokens are refreshed this long before Google says they expire.
const EXPIRY_MARGIN_SECS: i64 = 60;

#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn access_token(&self) -> Result<SecretString, SheetsError>;
}

/// A fixed bearer token.
pub struct StaticToken(SecretString);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }
}

#[async_trait]
impl AccessTokenSource for StaticToken {
    async fn access_token(&self) -> Result<SecretString, SheetsError> {
        Ok(self.0.clone())
    }
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: String,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    ASSERTION_LIFETIME_SECS
}

struct CachedToken {
    token: SecretString,
    expires_at: DateTime<Utc>,
}

pub struct ServiceAccountTokenProvider {
    http: Client,
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    scopes: Vec<String>,
    cache: Mutex<Option<CachedToken>>,
}

impl ServiceAccountTokenProvider {
    /// Provider scoped for spreadsheets and drive access.
    pub fn new(key: ServiceAccountKey) -> Result<Self, SheetsError> {
        Self::with_scopes(key, &[SHEETS_SCOPE, DRIVE_SCOPE])
    }

    pub fn with_scopes(key: ServiceAccountKey, scopes: &[&str]) -> Result<Self, SheetsError> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.expose_secret().as_bytes())
            .map_err(|error| SheetsError::Signing(error.to_string()))?;
        Ok(Self {
            http: Client::new(),
            key,
            encoding_key,
            scopes: scopes.iter().map(|scope| (*scope).to_owned()).collect(),
            cache: Mutex::new(None),
        })
    }

    pub(crate) fn assertion(&self, now: DateTime<Utc>) -> Result<String, SheetsError> {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();
        let claims = AssertionClaims {
            iss: &self.key.client_email,
            scope: self.scopes.join(" "),
            aud: &self.key.token_uri,
            iat: now.timestamp(),
            exp: now.timestamp() + ASSERTION_LIFETIME_SECS,
        };
        encode(&header, &claims, &self.encoding_key)
            .map_err(|error| SheetsError::Signing(error.to_string()))
    }

    async fn exchange(&self, now: DateTime<Utc>) -> Result<CachedToken, SheetsError> {
        let endpoint = self.key.token_uri.clone();
        let assertion = self.assertion(now)?;
        let response = self
            .http
            .post(&endpoint)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|error| SheetsError::Http { endpoint: endpoint.clone(), detail: error.to_string() })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SheetsError::Status { endpoint, status, body });
        }

        let token = response
            .json::<TokenResponse>()
            .await
            .map_err(|error| SheetsError::Decode { endpoint, detail: error.to_string() })?;
        debug!(
            event_name = "sheets.token.exchanged",
            expires_in = token.expires_in,
            "google access token exchanged"
        );
        Ok(CachedToken {
            token: SecretString::from(token.access_token),
            expires_at: now + Duration::seconds(token.expires_in),
        })
    }
}

#[async_trait]
impl AccessTokenSource for ServiceAccountTokenProvider {
    async fn access_token(&self) -> Result<SecretString, SheetsError> {
        let now = Utc::now();
        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.as_ref() {
            if cached.expires_at - Duration::seconds(EXPIRY_MARGIN_SECS) > now {
                return Ok(cached.token.clone());
            }
        }

        let fresh = self.exchange(now).await?;
        let token = fresh.token.clone();
        *cache = Some(fresh);
        Ok(token)
    }
}
