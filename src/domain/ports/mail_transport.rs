use crate::domain::entities::RenderedEmail;
use crate::infrastructure::http::middleware::error::ApiResult;
use async_trait::async_trait;

/// Pluggable outbound mail delivery.
///
/// Errors must be classified: user-caused errors (rejected recipient,
/// malformed address) are never retried, internal errors are.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, email: &RenderedEmail) -> ApiResult<()>;

    /// Provider name for logging
    fn provider_name(&self) -> &'static str;
}
