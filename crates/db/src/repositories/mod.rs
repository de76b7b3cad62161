use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use hyperbot_core::domain::thread::{AssistantThread, ThreadId, ThreadMessage, ThreadStatus};
use hyperbot_core::domain::uipath::{JobId, JobState, UiPathJob};
use hyperbot_core::domain::user::{NewUser, NewUserPoint, User, UserId, UserListQuery, UserPoint};

pub mod memory;
pub mod thread;
pub mod uipath_job;
pub mod user;
pub mod user_point;

pub use memory::{
    InMemoryMessageRepository, InMemoryThreadRepository, InMemoryUiPathJobRepository,
    InMemoryUserPointRepository, InMemoryUserRepository,
};
pub use thread::{SqlMessageRepository, SqlThreadRepository};
pub use uipath_job::SqlUiPathJobRepository;
pub use user::SqlUserRepository;
pub use user_point::SqlUserPointRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Maps SQLite constraint failures onto `Conflict`/`NotFound`; everything
    /// else stays a database error.
    pub(crate) fn from_write(error: sqlx::Error, context: &str) -> Self {
        if let sqlx::Error::Database(db) = &error {
            if db.is_unique_violation() {
                return Self::Conflict(context.to_owned());
            }
            if db.is_foreign_key_violation() {
                return Self::NotFound(context.to_owned());
            }
        }
        Self::Database(error)
    }
}

pub(crate) fn decode<T>(result: Result<T, sqlx::Error>) -> Result<T, RepositoryError> {
    result.map_err(|e| RepositoryError::Decode(e.to_string()))
}

pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("invalid timestamp `{value}`: {e}")))
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: NewUser) -> Result<User, RepositoryError>;
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError>;
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError>;
    async fn update(&self, user: User) -> Result<User, RepositoryError>;
    async fn delete(&self, id: UserId) -> Result<(), RepositoryError>;
    async fn list(&self, query: &UserListQuery) -> Result<(Vec<User>, i64), RepositoryError>;
}

#[async_trait]
pub trait UserPointRepository: Send + Sync {
    async fn create(&self, point: NewUserPoint) -> Result<UserPoint, RepositoryError>;
    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<UserPoint>, RepositoryError>;
}

#[async_trait]
pub trait ThreadRepository: Send + Sync {
    async fn create(&self, thread: AssistantThread) -> Result<(), RepositoryError>;
    async fn find_by_id(&self, id: &ThreadId) -> Result<Option<AssistantThread>, RepositoryError>;
    async fn latest_open(
        &self,
        channel_id: &str,
        slack_user_id: &str,
    ) -> Result<Option<AssistantThread>, RepositoryError>;
    async fn update_status(&self, id: &ThreadId, status: ThreadStatus)
        -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn create(&self, message: ThreadMessage) -> Result<(), RepositoryError>;
    async fn list_for_thread(
        &self,
        thread_id: &ThreadId,
    ) -> Result<Vec<ThreadMessage>, RepositoryError>;
}

#[async_trait]
pub trait UiPathJobRepository: Send + Sync {
    async fn create(&self, job: UiPathJob) -> Result<(), RepositoryError>;
    async fn find_by_id(&self, job_id: JobId) -> Result<Option<UiPathJob>, RepositoryError>;
    async fn update_state(
        &self,
        job_id: JobId,
        state: &JobState,
        output: Option<&str>,
        error: Option<&str>,
    ) -> Result<UiPathJob, RepositoryError>;
    async fn list_unfinished(&self) -> Result<Vec<UiPathJob>, RepositoryError>;
}
