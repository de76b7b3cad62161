use chrono::Utc;
use sqlx::Row;

use hyperbot_core::domain::uipath::{JobId, JobState, JobType, UiPathJob};

use super::{decode, parse_timestamp, RepositoryError, UiPathJobRepository};
use crate::DbPool;

const JOB_COLUMNS: &str =
    "job_id, state, error, output, slack_channel, job_type, created_at, updated_at";

pub struct SqlUiPathJobRepository {
    pool: DbPool,
}

impl SqlUiPathJobRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_job(row: &sqlx::sqlite::SqliteRow) -> Result<UiPathJob, RepositoryError> {
    let state: String = decode(row.try_get("state"))?;
    let job_type: String = decode(row.try_get("job_type"))?;
    let created_at: String = decode(row.try_get("created_at"))?;
    let updated_at: String = decode(row.try_get("updated_at"))?;

    Ok(UiPathJob {
        job_id: JobId(decode(row.try_get("job_id"))?),
        state: JobState::parse(&state),
        error: decode(row.try_get("error"))?,
        output: decode(row.try_get("output"))?,
        slack_channel: decode(row.try_get("slack_channel"))?,
        job_type: JobType::parse(&job_type)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown job type `{job_type}`")))?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

#[async_trait::async_trait]
impl UiPathJobRepository for SqlUiPathJobRepository {
    async fn create(&self, job: UiPathJob) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO uipath_jobs (job_id, state, error, output, slack_channel, job_type,
                                      created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(job.job_id.0)
        .bind(job.state.as_str())
        .bind(&job.error)
        .bind(&job.output)
        .bind(&job.slack_channel)
        .bind(job.job_type.as_str())
        .bind(job.created_at.to_rfc3339())
        .bind(job.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, &format!("job {}", job.job_id)))?;

        Ok(())
    }

    async fn find_by_id(&self, job_id: JobId) -> Result<Option<UiPathJob>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {JOB_COLUMNS} FROM uipath_jobs WHERE job_id = ?"))
            .bind(job_id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_job).transpose()
    }

    // Output and error are only overwritten when a new value is supplied.
    async fn update_state(
        &self,
        job_id: JobId,
        state: &JobState,
        output: Option<&str>,
        error: Option<&str>,
    ) -> Result<UiPathJob, RepositoryError> {
        let result = sqlx::query(
            "UPDATE uipath_jobs
             SET state = ?, output = COALESCE(?, output), error = COALESCE(?, error), updated_at = ?
             WHERE job_id = ?",
        )
        .bind(state.as_str())
        .bind(output)
        .bind(error)
        .bind(Utc::now().to_rfc3339())
        .bind(job_id.0)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("job {job_id}")));
        }

        self.find_by_id(job_id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("job {job_id}")))
    }

    async fn list_unfinished(&self) -> Result<Vec<UiPathJob>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM uipath_jobs
             WHERE state NOT IN ('Successful', 'Faulted', 'Stopped')
             ORDER BY created_at ASC, job_id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_job).collect()
    }
}
