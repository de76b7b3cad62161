//! UiPath Orchestrator integration: triggering robot jobs and tracking them to
//! a terminal state.

pub mod client;
pub mod queue;
pub mod service;
pub mod worker;

pub use client::{JobDetails, Orchestrator, StartedJob, UiPathClient, UiPathError};
pub use queue::{ChannelJobQueue, JobQueue, QueueError};
pub use service::JobService;
pub use worker::{terminal_message, JobWorker};
