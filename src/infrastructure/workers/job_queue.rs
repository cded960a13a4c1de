use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::any::AnyRow;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::entities::{Job, JobStatus};
use crate::domain::ports::task_queue::TaskQueue;
use crate::{
    infrastructure::http::middleware::error::{ApiError, ApiResult},
    infrastructure::persistence::Database,
};

const DEFAULT_LOCK_TIMEOUT_SECS: i64 = 300;

/// SQLite implementation of the TaskQueue
#[derive(Clone)]
pub struct SqliteTaskQueue {
    db: Database,
    lock_timeout: chrono::Duration,
}

impl SqliteTaskQueue {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            lock_timeout: chrono::Duration::seconds(DEFAULT_LOCK_TIMEOUT_SECS),
        }
    }

    /// How long a claimed job stays invisible before another fetch may
    /// reclaim it.
    pub fn with_lock_timeout(mut self, lock_timeout: chrono::Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    /// Jobs whose lock expired were claimed by a worker that never reported
    /// back. Each expiry counts as an attempt.
    async fn reclaim_expired(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Any>,
        now: &str,
    ) -> ApiResult<()> {
        let dead = sqlx::query(
            "UPDATE jobs
             SET status = 'dead_lettered', attempts = attempts + 1,
                 last_error = 'Lock expired', locked_until = NULL, updated_at = ?
             WHERE status = 'processing' AND locked_until < ? AND attempts + 1 >= max_attempts",
        )
        .bind(now)
        .bind(now)
        .execute(&mut **tx)
        .await?;

        let retried = sqlx::query(
            "UPDATE jobs
             SET status = 'pending', attempts = attempts + 1,
                 last_error = 'Lock expired', locked_until = NULL, updated_at = ?
             WHERE status = 'processing' AND locked_until < ?",
        )
        .bind(now)
        .bind(now)
        .execute(&mut **tx)
        .await?;

        if dead.rows_affected() + retried.rows_affected() > 0 {
            tracing::warn!(
                "Reclaimed {} expired job locks ({} dead-lettered)",
                dead.rows_affected() + retried.rows_affected(),
                dead.rows_affected()
            );
        }

        Ok(())
    }
}

fn parse_date_col(row: &AnyRow, col: &str) -> ApiResult<DateTime<Utc>> {
    let s: String = row.try_get(col)?;
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| sqlx::Error::Decode(Box::new(e)).into())
}

fn job_from_row(row: &AnyRow) -> ApiResult<Job> {
    let status_str: String = row.try_get("status")?;
    let payload_str: String = row.try_get("payload")?;
    let payload: Value = serde_json::from_str(&payload_str).unwrap_or(Value::Null);

    Ok(Job {
        id: row.try_get("id")?,
        job_type: row.try_get("job_type")?,
        payload,
        status: JobStatus::from(status_str),
        run_at: parse_date_col(row, "run_at")?,
        created_at: parse_date_col(row, "created_at")?,
        updated_at: parse_date_col(row, "updated_at")?,
        attempts: row.try_get("attempts")?,
        max_attempts: row.try_get("max_attempts")?,
        // NULL does not decode as Option<String> through AnyRow
        last_error: row.try_get("last_error").ok(),
    })
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

#[async_trait]
impl TaskQueue for SqliteTaskQueue {
    async fn enqueue(
        &self,
        job_type: &str,
        payload: Value,
        max_attempts: i32,
    ) -> ApiResult<String> {
        self.enqueue_at(job_type, payload, Utc::now(), max_attempts)
            .await
    }

    async fn enqueue_at(
        &self,
        job_type: &str,
        payload: Value,
        run_at: DateTime<Utc>,
        max_attempts: i32,
    ) -> ApiResult<String> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let payload_str = serde_json::to_string(&payload).map_err(|e| {
            ApiError::Internal(
                crate::domain::errors::ErrorCode::QueueError,
                format!("Failed to encode job payload: {}", e),
            )
        })?;

        sqlx::query(
            "INSERT INTO jobs (id, job_type, payload, status, run_at, created_at, updated_at, max_attempts)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(job_type)
        .bind(&payload_str)
        .bind(JobStatus::Pending.to_string())
        .bind(run_at.to_rfc3339())
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .bind(max_attempts.max(1))
        .execute(self.db.pool())
        .await?;

        Ok(id)
    }

    async fn fetch_jobs(&self, job_types: &[&str], limit: i64) -> ApiResult<Vec<Job>> {
        if job_types.is_empty() || limit <= 0 {
            return Ok(Vec::new());
        }

        let now = Utc::now();
        let now_str = now.to_rfc3339();
        let locked_until = (now + self.lock_timeout).to_rfc3339();

        // Transaction to ensure atomic fetch-and-lock
        let mut tx = self.db.pool().begin().await?;

        self.reclaim_expired(&mut tx, &now_str).await?;

        let select = format!(
            "SELECT id FROM jobs
             WHERE status = 'pending' AND run_at <= ? AND job_type IN ({})
             ORDER BY run_at ASC, created_at ASC
             LIMIT ?",
            placeholders(job_types.len())
        );
        let mut query = sqlx::query(&select).bind(&now_str);
        for job_type in job_types {
            query = query.bind(*job_type);
        }
        let candidates = query.bind(limit).fetch_all(&mut *tx).await?;

        let mut claimed = Vec::with_capacity(candidates.len());
        for row in candidates {
            let id: String = row.try_get("id")?;

            // Another worker may have claimed the same row; only the one that
            // flips it from pending owns it.
            let result = sqlx::query(
                "UPDATE jobs
                 SET status = 'processing', updated_at = ?, locked_until = ?
                 WHERE id = ? AND status = 'pending'",
            )
            .bind(&now_str)
            .bind(&locked_until)
            .bind(&id)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 1 {
                claimed.push(id);
            }
        }

        let mut jobs = Vec::with_capacity(claimed.len());
        for id in &claimed {
            let row = sqlx::query(
                "SELECT id, job_type, payload, status,
                        CAST(run_at AS TEXT) as run_at,
                        CAST(created_at AS TEXT) as created_at,
                        CAST(updated_at AS TEXT) as updated_at,
                        attempts, max_attempts, last_error
                 FROM jobs WHERE id = ?",
            )
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
            jobs.push(job_from_row(&row)?);
        }

        tx.commit().await?;

        Ok(jobs)
    }

    async fn complete_job(&self, job_id: &str) -> ApiResult<()> {
        sqlx::query(
            "UPDATE jobs
             SET status = 'completed', locked_until = NULL, updated_at = ?
             WHERE id = ?",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(job_id)
        .execute(self.db.pool())
        .await?;

        Ok(())
    }

    async fn fail_job(&self, job_id: &str, error: &str) -> ApiResult<()> {
        let now = Utc::now();

        let row = sqlx::query("SELECT attempts, max_attempts FROM jobs WHERE id = ?")
            .bind(job_id)
            .fetch_one(self.db.pool())
            .await?;

        let attempts: i32 = row.try_get("attempts")?;
        let max_attempts: i32 = row.try_get("max_attempts")?;
        let new_attempts = attempts + 1;

        if new_attempts < max_attempts {
            // Exponential backoff: 2^attempts * 30 seconds
            let backoff_seconds = 30i64 << attempts.clamp(0, 16);
            let next_run = now + chrono::Duration::seconds(backoff_seconds);

            sqlx::query(
                "UPDATE jobs
                 SET status = 'pending', attempts = ?, last_error = ?, run_at = ?,
                     locked_until = NULL, updated_at = ?
                 WHERE id = ?",
            )
            .bind(new_attempts)
            .bind(error)
            .bind(next_run.to_rfc3339())
            .bind(now.to_rfc3339())
            .bind(job_id)
            .execute(self.db.pool())
            .await?;
        } else {
            tracing::warn!("Job {} exhausted {} attempts: {}", job_id, max_attempts, error);
            self.dead_letter_job(job_id, error).await?;
        }

        Ok(())
    }

    async fn dead_letter_job(&self, job_id: &str, error: &str) -> ApiResult<()> {
        sqlx::query(
            "UPDATE jobs
             SET status = 'dead_lettered', attempts = attempts + 1, last_error = ?,
                 locked_until = NULL, updated_at = ?
             WHERE id = ?",
        )
        .bind(error)
        .bind(Utc::now().to_rfc3339())
        .bind(job_id)
        .execute(self.db.pool())
        .await?;

        metrics::counter!("jobs_dead_lettered_total").increment(1);

        Ok(())
    }

    async fn has_active_job(&self, job_type: &str) -> ApiResult<bool> {
        let row = sqlx::query(
            "SELECT COUNT(*) as count FROM jobs
             WHERE job_type = ? AND status IN ('pending', 'processing')",
        )
        .bind(job_type)
        .fetch_one(self.db.pool())
        .await?;

        let count: i64 = row.try_get("count")?;
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders(1), "?");
        assert_eq!(placeholders(3), "?, ?, ?");
    }
}
