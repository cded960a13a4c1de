use async_trait::async_trait;
use mailcast::domain::entities::{RenderedEmail, TemplateStatus};
use mailcast::domain::errors::ErrorCode;
use mailcast::domain::ports::file_storage::FileStorage;
use mailcast::domain::ports::mail_transport::MailTransport;
use mailcast::domain::ports::runtime::TimeService;
use mailcast::domain::ports::template_repository::TemplateRepository;
use mailcast::infrastructure::http::middleware::{ApiError, ApiResult};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Mail transport that keeps every delivered message in memory.
///
/// Recipients in `rejected` fail with a permanent (user-caused) error,
/// recipients in `unavailable` with a transient one.
#[derive(Default)]
pub struct RecordingMailTransport {
    sent: Mutex<Vec<RenderedEmail>>,
    rejected: Mutex<HashSet<String>>,
    unavailable: Mutex<HashSet<String>>,
}

impl RecordingMailTransport {
    pub fn reject(&self, recipient: &str) {
        self.rejected.lock().unwrap().insert(recipient.to_string());
    }

    pub fn make_unavailable(&self, recipient: &str) {
        self.unavailable.lock().unwrap().insert(recipient.to_string());
    }

    pub fn restore(&self, recipient: &str) {
        self.unavailable.lock().unwrap().remove(recipient);
    }

    pub fn sent(&self) -> Vec<RenderedEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailTransport for RecordingMailTransport {
    async fn send(&self, email: &RenderedEmail) -> ApiResult<()> {
        if self.rejected.lock().unwrap().contains(&email.to) {
            return Err(ApiError::BadRequest(
                ErrorCode::DeliveryRejected,
                format!("550 mailbox {} unavailable", email.to),
            ));
        }
        if self.unavailable.lock().unwrap().contains(&email.to) {
            return Err(ApiError::Internal(
                ErrorCode::DeliveryError,
                "421 service not available".to_string(),
            ));
        }

        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "recording"
    }
}

/// Records requested pauses and returns immediately.
#[derive(Default)]
pub struct RecordingTimeService {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingTimeService {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl TimeService for RecordingTimeService {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

/// Storage whose every operation fails, counting the calls it receives.
#[derive(Default)]
pub struct FailingFileStorage {
    calls: AtomicUsize,
}

impl FailingFileStorage {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn fail<T>(&self, key: &str) -> ApiResult<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ApiError::storage(format!(
            "bucket mailcast-private unreachable reading {}",
            key
        )))
    }
}

#[async_trait]
impl FileStorage for FailingFileStorage {
    async fn save(&self, key: &str, _content: &[u8]) -> ApiResult<()> {
        self.fail(key)
    }

    async fn read(&self, key: &str) -> ApiResult<Vec<u8>> {
        self.fail(key)
    }

    async fn delete(&self, key: &str) -> ApiResult<()> {
        self.fail(key)
    }

    async fn exists(&self, key: &str) -> ApiResult<bool> {
        self.fail(key)
    }

    fn public_url(&self, key: &str) -> String {
        format!("http://unreachable.invalid/{}", key)
    }
}

/// Local storage that flips the template to `status` while its processed
/// HTML is being written, as a concurrent management call would.
pub struct StatusChangingStorage {
    pub inner: Arc<dyn FileStorage>,
    pub templates: Arc<dyn TemplateRepository>,
    pub status: TemplateStatus,
}

#[async_trait]
impl FileStorage for StatusChangingStorage {
    async fn save(&self, key: &str, content: &[u8]) -> ApiResult<()> {
        if let Some(id) = key
            .strip_prefix("templates/")
            .and_then(|rest| rest.strip_suffix("/template.html"))
        {
            self.templates.update_template_status(id, self.status).await?;
        }
        self.inner.save(key, content).await
    }

    async fn read(&self, key: &str) -> ApiResult<Vec<u8>> {
        self.inner.read(key).await
    }

    async fn delete(&self, key: &str) -> ApiResult<()> {
        self.inner.delete(key).await
    }

    async fn exists(&self, key: &str) -> ApiResult<bool> {
        self.inner.exists(key).await
    }

    fn public_url(&self, key: &str) -> String {
        self.inner.public_url(key)
    }
}
