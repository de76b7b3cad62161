pub mod auth;
pub mod config;
pub mod domain;
pub mod errors;
pub mod signing;
pub mod validation;

pub use domain::thread::{AssistantThread, ThreadId, ThreadMessage, ThreadStatus};
pub use domain::uipath::{JobId, JobOutcome, JobState, JobType, UiPathJob};
pub use domain::user::{User, UserId, UserPoint, UserRole};
pub use errors::{ApplicationError, DomainError, InterfaceError};
