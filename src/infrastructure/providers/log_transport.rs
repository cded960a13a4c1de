use crate::domain::entities::RenderedEmail;
use crate::domain::ports::mail_transport::MailTransport;
use crate::infrastructure::http::middleware::error::ApiResult;
use async_trait::async_trait;

/// Fallback transport when no SMTP relay is configured: logs instead of sending.
#[derive(Clone, Default)]
pub struct LogMailTransport;

#[async_trait]
impl MailTransport for LogMailTransport {
    async fn send(&self, email: &RenderedEmail) -> ApiResult<()> {
        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            bytes = email.html_body.len(),
            "SMTP not configured, email logged instead of sent"
        );
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "log"
    }
}
