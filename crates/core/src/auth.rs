//! Access/refresh token issuing and password hashing for the user API.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::user::{UserId, UserRole};

pub const MIN_SECRET_KEY_SIZE: usize = 32;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("invalid key size: must be at least {MIN_SECRET_KEY_SIZE} characters")]
    InvalidKeySize,
    #[error("token is expired")]
    Expired,
    #[error("token is invalid")]
    Invalid,
    #[error("token signing failed: {0}")]
    Signing(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPayload {
    pub id: Uuid,
    pub user_id: UserId,
    pub username: String,
    pub role: UserRole,
    pub issued_at: DateTime<Utc>,
    pub expired_at: DateTime<Utc>,
}

impl TokenPayload {
    pub fn new(user_id: UserId, username: &str, role: UserRole, duration: Duration) -> Self {
        let issued_at = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            username: username.to_owned(),
            role,
            issued_at,
            expired_at: issued_at + duration,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expired_at
    }
}

/// HS256 token maker. Expiry lives in the payload's `expired_at` rather than
/// the registered `exp` claim, so it is checked here after the signature.
#[derive(Clone)]
pub struct TokenMaker {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for TokenMaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenMaker").finish_non_exhaustive()
    }
}

impl TokenMaker {
    pub fn new(secret: &str) -> Result<Self, TokenError> {
        if secret.len() < MIN_SECRET_KEY_SIZE {
            return Err(TokenError::InvalidKeySize);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims.clear();
        validation.validate_exp = false;

        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        })
    }

    pub fn create_token(
        &self,
        user_id: UserId,
        username: &str,
        role: UserRole,
        duration: Duration,
    ) -> Result<(String, TokenPayload), TokenError> {
        let payload = TokenPayload::new(user_id, username, role, duration);
        let token = encode(&Header::new(Algorithm::HS256), &payload, &self.encoding)
            .map_err(|error| TokenError::Signing(error.to_string()))?;
        Ok((token, payload))
    }

    pub fn verify_token(&self, token: &str) -> Result<TokenPayload, TokenError> {
        let data = decode::<TokenPayload>(token, &self.decoding, &self.validation)
            .map_err(|_| TokenError::Invalid)?;
        if data.claims.is_expired_at(Utc::now()) {
            return Err(TokenError::Expired);
        }
        Ok(data.claims)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PasswordError {
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error("password does not match")]
    Mismatch,
}

pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|error| PasswordError::Hash(error.to_string()))
}

pub fn verify_password(hashed: &str, password: &str) -> Result<(), PasswordError> {
    let parsed = PasswordHash::new(hashed).map_err(|error| PasswordError::Hash(error.to_string()))?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| PasswordError::Mismatch)
}
