use chrono::Utc;
use sqlx::Row;

use hyperbot_core::domain::user::{NewUser, User, UserId, UserListQuery, UserRole};

use super::{decode, parse_timestamp, RepositoryError, UserRepository};
use crate::DbPool;

const USER_COLUMNS: &str = "id, username, full_name, hashed_password, role, created_at, updated_at";

pub struct SqlUserRepository {
    pool: DbPool,
}

impl SqlUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> Result<User, RepositoryError> {
    let id: i64 = decode(row.try_get("id"))?;
    let role: String = decode(row.try_get("role"))?;
    let created_at: String = decode(row.try_get("created_at"))?;
    let updated_at: String = decode(row.try_get("updated_at"))?;

    Ok(User {
        id: UserId(id),
        username: decode(row.try_get("username"))?,
        full_name: decode(row.try_get("full_name"))?,
        hashed_password: decode(row.try_get("hashed_password"))?,
        role: UserRole::parse(&role)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown user role `{role}`")))?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

#[async_trait::async_trait]
impl UserRepository for SqlUserRepository {
    async fn create(&self, user: NewUser) -> Result<User, RepositoryError> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO users (username, full_name, hashed_password, role, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.username)
        .bind(&user.full_name)
        .bind(&user.hashed_password)
        .bind(user.role.as_str())
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, &format!("username `{}`", user.username)))?;

        Ok(User {
            id: UserId(result.last_insert_rowid()),
            username: user.username,
            full_name: user.full_name,
            hashed_password: user.hashed_password,
            role: user.role,
            created_at: now,
            updated_at: now,
        })
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_user).transpose()
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?"))
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_user).transpose()
    }

    async fn update(&self, mut user: User) -> Result<User, RepositoryError> {
        user.updated_at = Utc::now();
        let result = sqlx::query(
            "UPDATE users
             SET full_name = ?, hashed_password = ?, role = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&user.full_name)
        .bind(&user.hashed_password)
        .bind(user.role.as_str())
        .bind(user.updated_at.to_rfc3339())
        .bind(user.id.0)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("user {}", user.id)));
        }
        Ok(user)
    }

    async fn delete(&self, id: UserId) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("DELETE FROM users WHERE id = ?").bind(id.0).execute(&self.pool).await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("user {id}")));
        }
        Ok(())
    }

    async fn list(&self, query: &UserListQuery) -> Result<(Vec<User>, i64), RepositoryError> {
        let (rows, total) = match query.username.as_deref() {
            Some(username) => {
                let total: i64 = sqlx::query("SELECT COUNT(*) AS count FROM users WHERE username = ?")
                    .bind(username)
                    .fetch_one(&self.pool)
                    .await?
                    .try_get("count")?;
                let rows = sqlx::query(&format!(
                    "SELECT {USER_COLUMNS} FROM users WHERE username = ?
                     ORDER BY id ASC LIMIT ? OFFSET ?"
                ))
                .bind(username)
                .bind(query.per_page)
                .bind(query.offset())
                .fetch_all(&self.pool)
                .await?;
                (rows, total)
            }
            None => {
                let total: i64 = sqlx::query("SELECT COUNT(*) AS count FROM users")
                    .fetch_one(&self.pool)
                    .await?
                    .try_get("count")?;
                let rows = sqlx::query(&format!(
                    "SELECT {USER_COLUMNS} FROM users ORDER BY id ASC LIMIT ? OFFSET ?"
                ))
                .bind(query.per_page)
                .bind(query.offset())
                .fetch_all(&self.pool)
                .await?;
                (rows, total)
            }
        };

        let users = rows.iter().map(row_to_user).collect::<Result<Vec<_>, _>>()?;
        Ok((users, total))
    }
}
