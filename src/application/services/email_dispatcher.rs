use crate::application::services::template_fields::render;
use crate::domain::entities::{
    EmailEvent, EmailEventStatus, Job, OutboundEmail, RenderedEmail, Template, TemplateStatus,
};
use crate::domain::errors::ErrorCode;
use crate::domain::ports::email_event_repository::EmailEventRepository;
use crate::domain::ports::file_storage::FileStorage;
use crate::domain::ports::mail_transport::MailTransport;
use crate::domain::ports::runtime::TimeService;
use crate::domain::ports::task_queue::TaskQueue;
use crate::domain::ports::template_repository::TemplateRepository;
use crate::infrastructure::http::middleware::error::{ApiError, ApiResult};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Outcome counts of one dispatched batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchReport {
    /// Sent and marked completed
    pub processed: usize,
    /// Dead-lettered
    pub failed: usize,
    /// Left on the queue for redrive
    pub deferred: usize,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.processed + self.failed + self.deferred
    }

    pub fn outstanding(&self) -> usize {
        self.deferred
    }
}

/// Template body loaded once per batch.
struct CachedTemplate {
    status: TemplateStatus,
    html: String,
}

enum Outcome {
    Sent,
    Rejected(String),
    Deferred(String),
}

/// Sends claimed `send_email` jobs one at a time, pausing `send_delay`
/// between sends to stay under the configured rate.
#[derive(Clone)]
pub struct EmailDispatcher {
    template_repo: Arc<dyn TemplateRepository>,
    storage: Arc<dyn FileStorage>,
    transport: Arc<dyn MailTransport>,
    queue: Arc<dyn TaskQueue>,
    event_repo: Arc<dyn EmailEventRepository>,
    time_service: Arc<dyn TimeService>,
    send_delay: Duration,
}

impl EmailDispatcher {
    pub fn new(
        template_repo: Arc<dyn TemplateRepository>,
        storage: Arc<dyn FileStorage>,
        transport: Arc<dyn MailTransport>,
        queue: Arc<dyn TaskQueue>,
        event_repo: Arc<dyn EmailEventRepository>,
        time_service: Arc<dyn TimeService>,
        send_delay: Duration,
    ) -> Self {
        Self {
            template_repo,
            storage,
            transport,
            queue,
            event_repo,
            time_service,
            send_delay,
        }
    }

    pub async fn dispatch_batch(&self, jobs: Vec<Job>) -> BatchReport {
        let mut report = BatchReport::default();
        let mut cache: HashMap<String, CachedTemplate> = HashMap::new();

        for (index, job) in jobs.iter().enumerate() {
            if index > 0 {
                self.time_service.sleep(self.send_delay).await;
            }

            match self.dispatch_one(job, &mut cache).await {
                Outcome::Sent => report.processed += 1,
                Outcome::Rejected(_) => report.failed += 1,
                Outcome::Deferred(_) => report.deferred += 1,
            }
        }

        if !jobs.is_empty() {
            tracing::info!(
                "Dispatched {} email job(s) via {}: {} sent, {} failed, {} deferred",
                report.total(),
                self.transport.provider_name(),
                report.processed,
                report.failed,
                report.deferred
            );
        }

        report
    }

    async fn dispatch_one(&self, job: &Job, cache: &mut HashMap<String, CachedTemplate>) -> Outcome {
        let email: OutboundEmail = match serde_json::from_value(job.payload.clone()) {
            Ok(email) => email,
            Err(e) => {
                let reason = format!("Malformed send_email payload: {}", e);
                tracing::error!("Job {}: {}", job.id, reason);
                self.dead_letter(job, &reason).await;
                metrics::counter!("emails_rejected_total").increment(1);
                return Outcome::Rejected(reason);
            }
        };

        let result = match self.render_email(&email, cache).await {
            Ok(rendered) => self.transport.send(&rendered).await,
            Err(e) => Err(e),
        };

        let outcome = match result {
            Ok(()) => {
                if let Err(e) = self.queue.complete_job(&job.id).await {
                    tracing::error!("Failed to mark job {} as completed: {}", job.id, e);
                }
                metrics::counter!("emails_sent_total").increment(1);
                Outcome::Sent
            }
            Err(e) if e.is_user_error() => {
                tracing::warn!("Email job {} to {} rejected: {}", job.id, email.to, e);
                self.dead_letter(job, &e.to_string()).await;
                metrics::counter!("emails_rejected_total").increment(1);
                Outcome::Rejected(e.to_string())
            }
            Err(e) => {
                tracing::warn!("Email job {} to {} deferred: {}", job.id, email.to, e);
                if let Err(queue_err) = self.queue.fail_job(&job.id, &e.to_string()).await {
                    tracing::error!("Failed to mark job {} as failed: {}", job.id, queue_err);
                }
                // fail_job dead-letters once attempts run out
                if job.attempts + 1 >= job.max_attempts {
                    metrics::counter!("emails_rejected_total").increment(1);
                    Outcome::Rejected(format!(
                        "Gave up after {} attempts: {}",
                        job.max_attempts, e
                    ))
                } else {
                    metrics::counter!("emails_deferred_total").increment(1);
                    Outcome::Deferred(e.to_string())
                }
            }
        };

        let (status, detail) = match &outcome {
            Outcome::Sent => (EmailEventStatus::Sent, None),
            Outcome::Rejected(reason) => (EmailEventStatus::Rejected, Some(reason.clone())),
            Outcome::Deferred(reason) => (EmailEventStatus::Deferred, Some(reason.clone())),
        };
        self.record(job, &email, status, detail).await;

        outcome
    }

    async fn render_email(
        &self,
        email: &OutboundEmail,
        cache: &mut HashMap<String, CachedTemplate>,
    ) -> ApiResult<RenderedEmail> {
        if !cache.contains_key(&email.template_id) {
            let loaded = self.load_template(&email.template_id).await?;
            cache.insert(email.template_id.clone(), loaded);
        }
        let cached = cache
            .get(&email.template_id)
            .ok_or_else(|| ApiError::internal("Template cache miss"))?;

        if cached.status != TemplateStatus::InService {
            return Err(ApiError::BadRequest(
                ErrorCode::TemplateNotInService,
                format!("Template {} is {}", email.template_id, cached.status),
            ));
        }

        Ok(RenderedEmail {
            to: email.to.clone(),
            subject: render(&email.subject, &email.fields, false)?,
            html_body: render(&cached.html, &email.fields, true)?,
        })
    }

    async fn load_template(&self, template_id: &str) -> ApiResult<CachedTemplate> {
        let template = self
            .template_repo
            .get_template(template_id)
            .await?
            .ok_or_else(|| {
                ApiError::NotFound(
                    ErrorCode::TemplateNotFound,
                    format!("Template {} not found", template_id),
                )
            })?;

        if template.status != TemplateStatus::InService {
            return Ok(CachedTemplate {
                status: template.status,
                html: String::new(),
            });
        }

        // A missing body for an in-service template is a storage fault, not
        // something the sender caused.
        let bytes = self
            .storage
            .read(&Template::html_key(template_id))
            .await
            .map_err(|e| ApiError::storage(e.to_string()))?;
        let html = String::from_utf8(bytes)
            .map_err(|_| ApiError::storage(format!("Template {} HTML is not UTF-8", template_id)))?;

        Ok(CachedTemplate {
            status: template.status,
            html,
        })
    }

    async fn dead_letter(&self, job: &Job, reason: &str) {
        if let Err(e) = self.queue.dead_letter_job(&job.id, reason).await {
            tracing::error!("Failed to dead-letter job {}: {}", job.id, e);
        }
    }

    async fn record(
        &self,
        job: &Job,
        email: &OutboundEmail,
        status: EmailEventStatus,
        detail: Option<String>,
    ) {
        let event = EmailEvent::new(
            email.template_id.clone(),
            Some(job.id.clone()),
            email.to.clone(),
            email.subject.clone(),
            status,
            detail,
        );
        if let Err(e) = self.event_repo.record_event(&event).await {
            tracing::warn!("Failed to record {} event for job {}: {}", status, job.id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_totals() {
        let report = BatchReport {
            processed: 3,
            failed: 1,
            deferred: 2,
        };
        assert_eq!(report.total(), 6);
        assert_eq!(report.outstanding(), 2);
    }
}
