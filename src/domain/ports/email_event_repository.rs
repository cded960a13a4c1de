use crate::domain::entities::{EmailEvent, EmailEventStatus};
use crate::infrastructure::http::middleware::error::ApiResult;
use async_trait::async_trait;

#[async_trait]
pub trait EmailEventRepository: Send + Sync {
    async fn record_event(&self, event: &EmailEvent) -> ApiResult<()>;
    async fn list_events_for_template(
        &self,
        template_id: &str,
        status: Option<EmailEventStatus>,
        limit: i64,
        offset: i64,
    ) -> ApiResult<Vec<EmailEvent>>;
    async fn count_events_for_template(
        &self,
        template_id: &str,
        status: Option<EmailEventStatus>,
    ) -> ApiResult<i64>;
}
