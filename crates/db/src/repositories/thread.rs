use sqlx::Row;

use hyperbot_core::domain::thread::{AssistantThread, ThreadId, ThreadMessage, ThreadStatus};

use super::{decode, parse_timestamp, MessageRepository, RepositoryError, ThreadRepository};
use crate::DbPool;

pub struct SqlThreadRepository {
    pool: DbPool,
}

impl SqlThreadRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_thread(row: &sqlx::sqlite::SqliteRow) -> Result<AssistantThread, RepositoryError> {
    let status: String = decode(row.try_get("status"))?;
    let created_at: String = decode(row.try_get("created_at"))?;
    let updated_at: String = decode(row.try_get("updated_at"))?;

    Ok(AssistantThread {
        id: ThreadId(decode(row.try_get("id"))?),
        channel_id: decode(row.try_get("channel_id"))?,
        slack_user_id: decode(row.try_get("slack_user_id"))?,
        status: ThreadStatus::parse(&status)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown thread status `{status}`")))?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

#[async_trait::async_trait]
impl ThreadRepository for SqlThreadRepository {
    async fn create(&self, thread: AssistantThread) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO assistant_threads (id, channel_id, slack_user_id, status, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&thread.id.0)
        .bind(&thread.channel_id)
        .bind(&thread.slack_user_id)
        .bind(thread.status.as_str())
        .bind(thread.created_at.to_rfc3339())
        .bind(thread.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, &format!("thread {}", thread.id)))?;

        Ok(())
    }

    async fn find_by_id(&self, id: &ThreadId) -> Result<Option<AssistantThread>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, channel_id, slack_user_id, status, created_at, updated_at
             FROM assistant_threads WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_thread).transpose()
    }

    async fn latest_open(
        &self,
        channel_id: &str,
        slack_user_id: &str,
    ) -> Result<Option<AssistantThread>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, channel_id, slack_user_id, status, created_at, updated_at
             FROM assistant_threads
             WHERE channel_id = ? AND slack_user_id = ? AND status = 'open'
             ORDER BY created_at DESC, rowid DESC
             LIMIT 1",
        )
        .bind(channel_id)
        .bind(slack_user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_thread).transpose()
    }

    async fn update_status(
        &self,
        id: &ThreadId,
        status: ThreadStatus,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE assistant_threads SET status = ?, updated_at = ? WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(&id.0)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("thread {id}")));
        }
        Ok(())
    }
}

pub struct SqlMessageRepository {
    pool: DbPool,
}

impl SqlMessageRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Result<ThreadMessage, RepositoryError> {
    let created_at: String = decode(row.try_get("created_at"))?;

    Ok(ThreadMessage {
        id: decode(row.try_get("id"))?,
        thread_id: ThreadId(decode(row.try_get("thread_id"))?),
        role: decode(row.try_get("role"))?,
        content: decode(row.try_get("content"))?,
        created_at: parse_timestamp(&created_at)?,
    })
}

#[async_trait::async_trait]
impl MessageRepository for SqlMessageRepository {
    async fn create(&self, message: ThreadMessage) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO thread_messages (id, thread_id, role, content, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&message.id)
        .bind(&message.thread_id.0)
        .bind(&message.role)
        .bind(&message.content)
        .bind(message.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, &format!("thread {}", message.thread_id)))?;

        Ok(())
    }

    async fn list_for_thread(
        &self,
        thread_id: &ThreadId,
    ) -> Result<Vec<ThreadMessage>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, thread_id, role, content, created_at
             FROM thread_messages WHERE thread_id = ? ORDER BY created_at ASC, rowid ASC",
        )
        .bind(&thread_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_message).collect()
    }
}
