use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;

use hyperbot_core::domain::thread::{AssistantThread, ThreadId, ThreadMessage, ThreadStatus};
use hyperbot_core::domain::uipath::{JobId, JobState, UiPathJob};
use hyperbot_core::domain::user::{NewUser, NewUserPoint, User, UserId, UserListQuery, UserPoint};

use super::{
    MessageRepository, RepositoryError, ThreadRepository, UiPathJobRepository,
    UserPointRepository, UserRepository,
};

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<i64, User>>,
}

impl InMemoryUserRepository {
    pub async fn contains(&self, id: UserId) -> bool {
        self.users.read().await.contains_key(&id.0)
    }
}

#[async_trait::async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, user: NewUser) -> Result<User, RepositoryError> {
        let mut users = self.users.write().await;
        if users.values().any(|existing| existing.username == user.username) {
            return Err(RepositoryError::Conflict(format!("username `{}`", user.username)));
        }
        let id = users.keys().max().copied().unwrap_or(0) + 1;
        let now = Utc::now();
        let created = User {
            id: UserId(id),
            username: user.username,
            full_name: user.full_name,
            hashed_password: user.hashed_password,
            role: user.role,
            created_at: now,
            updated_at: now,
        };
        users.insert(id, created.clone());
        Ok(created)
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.users.read().await.get(&id.0).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        let users = self.users.read().await;
        Ok(users.values().find(|user| user.username == username).cloned())
    }

    async fn update(&self, mut user: User) -> Result<User, RepositoryError> {
        let mut users = self.users.write().await;
        let Some(existing) = users.get_mut(&user.id.0) else {
            return Err(RepositoryError::NotFound(format!("user {}", user.id)));
        };
        user.updated_at = Utc::now();
        *existing = user.clone();
        Ok(user)
    }

    async fn delete(&self, id: UserId) -> Result<(), RepositoryError> {
        match self.users.write().await.remove(&id.0) {
            Some(_) => Ok(()),
            None => Err(RepositoryError::NotFound(format!("user {id}"))),
        }
    }

    async fn list(&self, query: &UserListQuery) -> Result<(Vec<User>, i64), RepositoryError> {
        let users = self.users.read().await;
        let mut matching: Vec<User> = users
            .values()
            .filter(|user| query.username.as_deref().map_or(true, |name| user.username == name))
            .cloned()
            .collect();
        matching.sort_by_key(|user| user.id.0);

        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(usize::try_from(query.offset()).unwrap_or(usize::MAX))
            .take(query.per_page as usize)
            .collect();
        Ok((page, total))
    }
}

/// Point store that checks user existence against a shared user repository,
/// matching the foreign key of the SQL schema.
pub struct InMemoryUserPointRepository {
    users: std::sync::Arc<InMemoryUserRepository>,
    points: RwLock<Vec<UserPoint>>,
}

impl InMemoryUserPointRepository {
    pub fn new(users: std::sync::Arc<InMemoryUserRepository>) -> Self {
        Self { users, points: RwLock::new(Vec::new()) }
    }
}

#[async_trait::async_trait]
impl UserPointRepository for InMemoryUserPointRepository {
    async fn create(&self, point: NewUserPoint) -> Result<UserPoint, RepositoryError> {
        if !self.users.contains(point.user_id).await {
            return Err(RepositoryError::NotFound(format!("user {}", point.user_id)));
        }
        let mut points = self.points.write().await;
        if points.iter().any(|existing| existing.order_id == point.order_id) {
            return Err(RepositoryError::Conflict(format!(
                "order `{}` already has points",
                point.order_id
            )));
        }
        let created = UserPoint {
            id: points.len() as i64 + 1,
            user_id: point.user_id,
            order_id: point.order_id,
            point: point.point,
            expiry_time: point.expiry_time,
            created_at: Utc::now(),
        };
        points.push(created.clone());
        Ok(created)
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<UserPoint>, RepositoryError> {
        let points = self.points.read().await;
        Ok(points.iter().filter(|point| point.user_id == user_id).cloned().collect())
    }
}

#[derive(Default)]
pub struct InMemoryThreadRepository {
    threads: RwLock<Vec<AssistantThread>>,
}

#[async_trait::async_trait]
impl ThreadRepository for InMemoryThreadRepository {
    async fn create(&self, thread: AssistantThread) -> Result<(), RepositoryError> {
        let mut threads = self.threads.write().await;
        if threads.iter().any(|existing| existing.id == thread.id) {
            return Err(RepositoryError::Conflict(format!("thread {}", thread.id)));
        }
        threads.push(thread);
        Ok(())
    }

    async fn find_by_id(&self, id: &ThreadId) -> Result<Option<AssistantThread>, RepositoryError> {
        let threads = self.threads.read().await;
        Ok(threads.iter().find(|thread| &thread.id == id).cloned())
    }

    async fn latest_open(
        &self,
        channel_id: &str,
        slack_user_id: &str,
    ) -> Result<Option<AssistantThread>, RepositoryError> {
        let threads = self.threads.read().await;
        // Later inserts win ties on created_at, like the rowid ordering in SQL.
        Ok(threads
            .iter()
            .enumerate()
            .filter(|(_, thread)| {
                thread.channel_id == channel_id
                    && thread.slack_user_id == slack_user_id
                    && thread.status == ThreadStatus::Open
            })
            .max_by_key(|(index, thread)| (thread.created_at, *index))
            .map(|(_, thread)| thread.clone()))
    }

    async fn update_status(
        &self,
        id: &ThreadId,
        status: ThreadStatus,
    ) -> Result<(), RepositoryError> {
        let mut threads = self.threads.write().await;
        let Some(thread) = threads.iter_mut().find(|thread| &thread.id == id) else {
            return Err(RepositoryError::NotFound(format!("thread {id}")));
        };
        thread.status = status;
        thread.updated_at = Utc::now();
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryMessageRepository {
    messages: RwLock<Vec<ThreadMessage>>,
}

#[async_trait::async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn create(&self, message: ThreadMessage) -> Result<(), RepositoryError> {
        self.messages.write().await.push(message);
        Ok(())
    }

    async fn list_for_thread(
        &self,
        thread_id: &ThreadId,
    ) -> Result<Vec<ThreadMessage>, RepositoryError> {
        let messages = self.messages.read().await;
        Ok(messages.iter().filter(|message| &message.thread_id == thread_id).cloned().collect())
    }
}

#[derive(Default)]
pub struct InMemoryUiPathJobRepository {
    jobs: RwLock<HashMap<i64, UiPathJob>>,
}

#[async_trait::async_trait]
impl UiPathJobRepository for InMemoryUiPathJobRepository {
    async fn create(&self, job: UiPathJob) -> Result<(), RepositoryError> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.job_id.0) {
            return Err(RepositoryError::Conflict(format!("job {}", job.job_id)));
        }
        jobs.insert(job.job_id.0, job);
        Ok(())
    }

    async fn find_by_id(&self, job_id: JobId) -> Result<Option<UiPathJob>, RepositoryError> {
        Ok(self.jobs.read().await.get(&job_id.0).cloned())
    }

    async fn update_state(
        &self,
        job_id: JobId,
        state: &JobState,
        output: Option<&str>,
        error: Option<&str>,
    ) -> Result<UiPathJob, RepositoryError> {
        let mut jobs = self.jobs.write().await;
        let Some(job) = jobs.get_mut(&job_id.0) else {
            return Err(RepositoryError::NotFound(format!("job {job_id}")));
        };
        job.state = state.clone();
        if let Some(output) = output {
            job.output = Some(output.to_owned());
        }
        if let Some(error) = error {
            job.error = Some(error.to_owned());
        }
        job.updated_at = Utc::now();
        Ok(job.clone())
    }

    async fn list_unfinished(&self) -> Result<Vec<UiPathJob>, RepositoryError> {
        let jobs = self.jobs.read().await;
        let mut unfinished: Vec<UiPathJob> =
            jobs.values().filter(|job| !job.state.is_terminal()).cloned().collect();
        unfinished.sort_by_key(|job| (job.created_at, job.job_id.0));
        Ok(unfinished)
    }
}
