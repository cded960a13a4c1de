use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::application::services::{BatchReport, EmailDispatcher};
use crate::domain::entities::JOB_SEND_EMAIL;
use crate::domain::ports::runtime::TimeService;
use crate::domain::ports::task_queue::TaskQueue;
use crate::infrastructure::http::middleware::error::ApiResult;

const IDLE_POLL_INTERVAL: Duration = Duration::from_secs(1);
const ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Claims `send_email` jobs in batches and hands them to the dispatcher.
pub struct SendWorker {
    queue: Arc<dyn TaskQueue>,
    dispatcher: EmailDispatcher,
    time_service: Arc<dyn TimeService>,
    batch_size: i64,
}

impl SendWorker {
    pub fn new(
        queue: Arc<dyn TaskQueue>,
        dispatcher: EmailDispatcher,
        time_service: Arc<dyn TimeService>,
        batch_size: i64,
    ) -> Self {
        Self {
            queue,
            dispatcher,
            time_service,
            batch_size: batch_size.max(1),
        }
    }

    pub async fn run(&self) {
        info!("Starting SendWorker (batch size {})...", self.batch_size);
        loop {
            match self.run_once().await {
                Ok(Some(_)) => continue,
                Ok(None) => self.time_service.sleep(IDLE_POLL_INTERVAL).await,
                Err(e) => {
                    error!("Failed to fetch send jobs: {}", e);
                    self.time_service.sleep(ERROR_BACKOFF).await;
                }
            }
        }
    }

    /// Claim and dispatch one batch. `None` when the queue had nothing due.
    pub async fn run_once(&self) -> ApiResult<Option<BatchReport>> {
        let jobs = self
            .queue
            .fetch_jobs(&[JOB_SEND_EMAIL], self.batch_size)
            .await?;

        if jobs.is_empty() {
            return Ok(None);
        }

        Ok(Some(self.dispatcher.dispatch_batch(jobs).await))
    }
}
