use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::application::services::{SessionService, TemplateProcessor};
use crate::domain::entities::{
    Job, JOB_CLEANUP_RATE_LIMITER, JOB_CLEANUP_SESSIONS, JOB_PROCESS_TEMPLATE,
};
use crate::domain::ports::runtime::TimeService;
use crate::domain::ports::task_queue::TaskQueue;
use crate::shared::rate_limiter::LoginRateLimiter;

const HANDLED_JOB_TYPES: [&str; 3] = [
    JOB_PROCESS_TEMPLATE,
    JOB_CLEANUP_SESSIONS,
    JOB_CLEANUP_RATE_LIMITER,
];

/// Runs template processing and the self-rescheduling maintenance jobs.
/// `send_email` jobs belong to the [`super::SendWorker`].
pub struct JobProcessor {
    queue: Arc<dyn TaskQueue>,
    template_processor: TemplateProcessor,
    session_service: SessionService,
    rate_limiter: LoginRateLimiter,
    time_service: Arc<dyn TimeService>,
}

impl JobProcessor {
    pub fn new(
        queue: Arc<dyn TaskQueue>,
        template_processor: TemplateProcessor,
        session_service: SessionService,
        rate_limiter: LoginRateLimiter,
        time_service: Arc<dyn TimeService>,
    ) -> Self {
        Self {
            queue,
            template_processor,
            session_service,
            rate_limiter,
            time_service,
        }
    }

    pub async fn run(&self) {
        info!("Starting JobProcessor...");
        loop {
            match self.process_next().await {
                Ok(Some(_)) => continue,
                Ok(None) => {
                    self.time_service.sleep(Duration::from_secs(1)).await;
                }
                Err(e) => {
                    error!("Error processing job: {}", e);
                    self.time_service.sleep(Duration::from_secs(5)).await;
                }
            }
        }
    }

    pub async fn process_next(&self) -> Result<Option<()>, String> {
        let job = self
            .queue
            .fetch_jobs(&HANDLED_JOB_TYPES, 1)
            .await
            .map_err(|e| e.to_string())?
            .pop();

        let Some(job) = job else {
            return Ok(None);
        };

        info!("Processing job {} (type: {})", job.id, job.job_type);

        match self.execute_job(&job).await {
            Ok(_) => {
                if let Err(e) = self.queue.complete_job(&job.id).await {
                    error!("Failed to mark job {} as completed: {}", job.id, e);
                }
            }
            Err(e) => {
                error!("Job {} failed: {}", job.id, e);
                if let Err(retry_err) = self.queue.fail_job(&job.id, &e).await {
                    error!("Failed to mark job {} as failed: {}", job.id, retry_err);
                }
            }
        }

        Ok(Some(()))
    }

    async fn execute_job(&self, job: &Job) -> Result<(), String> {
        match job.job_type.as_str() {
            JOB_PROCESS_TEMPLATE => self.handle_process_template(&job.payload).await,
            JOB_CLEANUP_SESSIONS => self.handle_cleanup_sessions().await,
            JOB_CLEANUP_RATE_LIMITER => self.handle_cleanup_rate_limiter().await,
            _ => Err(format!("Unknown job type: {}", job.job_type)),
        }
    }

    async fn handle_process_template(&self, payload: &Value) -> Result<(), String> {
        let template_id = payload["template_id"]
            .as_str()
            .ok_or("Missing 'template_id' in job payload")?;

        self.template_processor
            .process(template_id)
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }

    async fn handle_cleanup_sessions(&self) -> Result<(), String> {
        let count = self
            .session_service
            .cleanup_expired_sessions()
            .await
            .map_err(|e| format!("Failed to cleanup sessions: {}", e))?;
        if count > 0 {
            info!("Cleaned up {} expired sessions", count);
        }

        let next_run = Utc::now() + chrono::Duration::hours(1);
        self.queue
            .enqueue_at(JOB_CLEANUP_SESSIONS, Value::Null, next_run, 3)
            .await
            .map_err(|e| e.to_string())?;
        Ok(())
    }

    async fn handle_cleanup_rate_limiter(&self) -> Result<(), String> {
        let removed = self.rate_limiter.cleanup().await;
        if removed > 0 {
            info!("Dropped {} idle login rate limiter entries", removed);
        }

        let next_run = Utc::now() + chrono::Duration::minutes(15);
        self.queue
            .enqueue_at(JOB_CLEANUP_RATE_LIMITER, Value::Null, next_run, 3)
            .await
            .map_err(|e| e.to_string())?;
        Ok(())
    }
}
