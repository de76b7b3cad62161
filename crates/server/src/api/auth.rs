use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::Duration;
use secrecy::ExposeSecret;
use serde::Serialize;

use hyperbot_core::auth::{TokenError, TokenMaker, TokenPayload};
use hyperbot_core::config::AuthConfig;
use hyperbot_core::domain::user::{User, UserRole};

use super::{ApiError, AppState};

pub const AUTHORIZATION_TYPE_BEARER: &str = "bearer";
// Ten years; keeps chrono's duration arithmetic in range for any configured value.
const MAX_TOKEN_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Access and refresh token makers with their lifetimes.
#[derive(Clone, Debug)]
pub struct AuthTokens {
    access: TokenMaker,
    refresh: TokenMaker,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct IssuedTokens {
    pub access_token: String,
    pub refresh_token: String,
}

impl AuthTokens {
    pub fn new(
        access_secret: &str,
        refresh_secret: &str,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Result<Self, TokenError> {
        Ok(Self {
            access: TokenMaker::new(access_secret)?,
            refresh: TokenMaker::new(refresh_secret)?,
            access_ttl,
            refresh_ttl,
        })
    }

    pub fn from_config(config: &AuthConfig) -> Result<Self, TokenError> {
        Self::new(
            config.access_token_secret.expose_secret(),
            config.refresh_token_secret.expose_secret(),
            ttl(config.access_token_duration_secs),
            ttl(config.refresh_token_duration_secs),
        )
    }

    pub fn issue(&self, user: &User) -> Result<IssuedTokens, TokenError> {
        let (access_token, _) =
            self.access.create_token(user.id, &user.username, user.role, self.access_ttl)?;
        let (refresh_token, _) =
            self.refresh.create_token(user.id, &user.username, user.role, self.refresh_ttl)?;
        Ok(IssuedTokens { access_token, refresh_token })
    }

    pub fn verify_access(&self, token: &str) -> Result<TokenPayload, TokenError> {
        self.access.verify_token(token)
    }
}

fn ttl(secs: u64) -> Duration {
    Duration::seconds(secs.min(MAX_TOKEN_TTL_SECS) as i64)
}

/// Caller authenticated by a `Bearer` access token.
#[derive(Clone, Debug)]
pub struct AuthUser(pub TokenPayload);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| ApiError::unauthorized("authorization header is not provided"))?;

        let mut fields = header.split_whitespace();
        let (Some(kind), Some(token), None) = (fields.next(), fields.next(), fields.next()) else {
            return Err(ApiError::unauthorized("invalid authorization header format"));
        };
        if !kind.eq_ignore_ascii_case(AUTHORIZATION_TYPE_BEARER) {
            return Err(ApiError::unauthorized(format!("unsupported authorization type {kind}")));
        }

        let payload = state
            .tokens
            .verify_access(token)
            .map_err(|error| ApiError::unauthorized(error.to_string()))?;
        Ok(Self(payload))
    }
}

/// An [`AuthUser`] whose token carries the admin role.
#[derive(Clone, Debug)]
pub struct AdminUser(pub TokenPayload);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let AuthUser(payload) = AuthUser::from_request_parts(parts, state).await?;
        if payload.role != UserRole::Admin {
            return Err(ApiError::forbidden("permission denied"));
        }
        Ok(Self(payload))
    }
}
