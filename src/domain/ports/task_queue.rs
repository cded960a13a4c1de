use crate::domain::entities::Job;
use crate::infrastructure::http::middleware::error::ApiResult;
use async_trait::async_trait;
use serde_json::Value;

#[async_trait]
pub trait TaskQueue: Send + Sync {
    async fn enqueue(&self, job_type: &str, payload: Value, max_attempts: i32)
        -> ApiResult<String>;
    async fn enqueue_at(
        &self,
        job_type: &str,
        payload: Value,
        run_at: chrono::DateTime<chrono::Utc>,
        max_attempts: i32,
    ) -> ApiResult<String>;

    /// Claim up to `limit` due jobs of the given types. Claimed jobs stay
    /// invisible to other callers until completed, failed, or their lock
    /// expires.
    async fn fetch_jobs(&self, job_types: &[&str], limit: i64) -> ApiResult<Vec<Job>>;

    async fn complete_job(&self, job_id: &str) -> ApiResult<()>;

    /// Transient failure: retry with backoff, dead-letter once attempts run out.
    async fn fail_job(&self, job_id: &str, error: &str) -> ApiResult<()>;

    /// Non-retriable failure: move straight to the dead-letter state.
    async fn dead_letter_job(&self, job_id: &str, error: &str) -> ApiResult<()>;

    /// Whether a job of this type is waiting or running.
    async fn has_active_job(&self, job_type: &str) -> ApiResult<bool>;
}
