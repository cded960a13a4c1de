use crate::application::services::template_service::{page_bounds, validate_template_id};
use crate::domain::entities::{EmailEventListResponse, EmailEventStatus, PaginationMetadata};
use crate::domain::errors::ErrorCode;
use crate::domain::ports::email_event_repository::EmailEventRepository;
use crate::domain::ports::template_repository::TemplateRepository;
use crate::infrastructure::http::middleware::error::{ApiError, ApiResult};
use std::sync::Arc;

#[derive(Clone)]
pub struct EmailEventService {
    event_repo: Arc<dyn EmailEventRepository>,
    template_repo: Arc<dyn TemplateRepository>,
}

impl EmailEventService {
    pub fn new(
        event_repo: Arc<dyn EmailEventRepository>,
        template_repo: Arc<dyn TemplateRepository>,
    ) -> Self {
        Self {
            event_repo,
            template_repo,
        }
    }

    /// Delivery log of a template, newest first. Logs of deleted templates
    /// stay readable.
    pub async fn list_for_template(
        &self,
        template_id: &str,
        status: Option<EmailEventStatus>,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> ApiResult<EmailEventListResponse> {
        let template_id = validate_template_id(template_id)?;
        let (limit, offset) = page_bounds(limit, offset);

        if self.template_repo.get_template(template_id).await?.is_none() {
            return Err(ApiError::NotFound(
                ErrorCode::TemplateNotFound,
                format!("Template {} not found", template_id),
            ));
        }

        let events = self
            .event_repo
            .list_events_for_template(template_id, status, limit, offset)
            .await?;
        let total = self
            .event_repo
            .count_events_for_template(template_id, status)
            .await?;

        Ok(EmailEventListResponse {
            events,
            pagination: PaginationMetadata {
                total,
                limit,
                offset,
            },
        })
    }
}
