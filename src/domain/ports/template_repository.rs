use crate::domain::entities::{Template, TemplateStatus};
use crate::infrastructure::http::middleware::error::ApiResult;
use async_trait::async_trait;

#[async_trait]
pub trait TemplateRepository: Send + Sync {
    async fn create_template(&self, template: &Template) -> ApiResult<()>;
    async fn get_template(&self, id: &str) -> ApiResult<Option<Template>>;

    /// Templates ordered newest first. `None` lists everything except deleted
    /// templates.
    async fn list_templates(
        &self,
        status: Option<TemplateStatus>,
        limit: i64,
        offset: i64,
    ) -> ApiResult<Vec<Template>>;
    async fn count_templates(&self, status: Option<TemplateStatus>) -> ApiResult<i64>;

    async fn update_template_status(&self, id: &str, status: TemplateStatus) -> ApiResult<()>;
    /// Moves the template to `to` only while it is still in `from`. Returns
    /// whether the row changed.
    async fn transition_template_status(
        &self,
        id: &str,
        from: TemplateStatus,
        to: TemplateStatus,
    ) -> ApiResult<bool>;
    async fn update_template_api_key(&self, id: &str, api_key_encrypted: &str) -> ApiResult<()>;
}
