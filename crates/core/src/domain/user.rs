use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    User,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "user" => Some(Self::User),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub full_name: String,
    #[serde(skip_serializing)]
    pub hashed_password: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a user; the id is assigned by storage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub full_name: String,
    pub hashed_password: String,
    pub role: UserRole,
}

impl NewUser {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.username.trim().is_empty() {
            return Err(DomainError::InvalidInput("username is required".to_owned()));
        }
        if self.full_name.trim().is_empty() {
            return Err(DomainError::InvalidInput("full_name is required".to_owned()));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserListQuery {
    pub page: u32,
    pub per_page: u32,
    pub username: Option<String>,
}

impl UserListQuery {
    pub const MIN_PER_PAGE: u32 = 5;
    pub const MAX_PER_PAGE: u32 = 10;

    pub fn new(page: u32, per_page: u32, username: Option<String>) -> Result<Self, DomainError> {
        if page < 1 {
            return Err(DomainError::InvalidInput("page must be at least 1".to_owned()));
        }
        if !(Self::MIN_PER_PAGE..=Self::MAX_PER_PAGE).contains(&per_page) {
            return Err(DomainError::InvalidInput(format!(
                "per_page must be between {} and {}",
                Self::MIN_PER_PAGE,
                Self::MAX_PER_PAGE
            )));
        }
        let username = username.filter(|value| !value.trim().is_empty());
        Ok(Self { page, per_page, username })
    }

    /// Rows to skip; widened so the largest `page` still fits.
    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.per_page)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPoint {
    pub id: i64,
    pub user_id: UserId,
    pub order_id: String,
    pub point: i64,
    pub expiry_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewUserPoint {
    pub user_id: UserId,
    pub order_id: String,
    pub point: i64,
    pub expiry_time: DateTime<Utc>,
}

impl NewUserPoint {
    pub const VALIDITY_DAYS: i64 = 365;

    /// Points expire one year after they are granted.
    pub fn granted_at(
        user_id: UserId,
        order_id: impl Into<String>,
        point: i64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            order_id: order_id.into(),
            point,
            expiry_time: now + Duration::days(Self::VALIDITY_DAYS),
        }
    }
}
