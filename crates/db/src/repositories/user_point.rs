use chrono::Utc;
use sqlx::Row;

use hyperbot_core::domain::user::{NewUserPoint, UserId, UserPoint};

use super::{decode, parse_timestamp, RepositoryError, UserPointRepository};
use crate::DbPool;

pub struct SqlUserPointRepository {
    pool: DbPool,
}

impl SqlUserPointRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_point(row: &sqlx::sqlite::SqliteRow) -> Result<UserPoint, RepositoryError> {
    let expiry_time: String = decode(row.try_get("expiry_time"))?;
    let created_at: String = decode(row.try_get("created_at"))?;

    Ok(UserPoint {
        id: decode(row.try_get("id"))?,
        user_id: UserId(decode(row.try_get("user_id"))?),
        order_id: decode(row.try_get("order_id"))?,
        point: decode(row.try_get("point"))?,
        expiry_time: parse_timestamp(&expiry_time)?,
        created_at: parse_timestamp(&created_at)?,
    })
}

#[async_trait::async_trait]
impl UserPointRepository for SqlUserPointRepository {
    async fn create(&self, point: NewUserPoint) -> Result<UserPoint, RepositoryError> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO user_points (user_id, order_id, point, expiry_time, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(point.user_id.0)
        .bind(&point.order_id)
        .bind(point.point)
        .bind(point.expiry_time.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| match RepositoryError::from_write(e, "") {
            RepositoryError::Conflict(_) => {
                RepositoryError::Conflict(format!("order `{}` already has points", point.order_id))
            }
            RepositoryError::NotFound(_) => {
                RepositoryError::NotFound(format!("user {}", point.user_id))
            }
            other => other,
        })?;

        Ok(UserPoint {
            id: result.last_insert_rowid(),
            user_id: point.user_id,
            order_id: point.order_id,
            point: point.point,
            expiry_time: point.expiry_time,
            created_at: now,
        })
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<UserPoint>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, user_id, order_id, point, expiry_time, created_at
             FROM user_points WHERE user_id = ? ORDER BY id ASC",
        )
        .bind(user_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_point).collect()
    }
}
