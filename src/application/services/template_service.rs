use crate::application::services::template_fields::extract_placeholders;
use crate::domain::entities::{
    PaginationMetadata, Template, TemplateApiKeyResponse, TemplateListResponse, TemplateStatus,
    UploadTemplateResponse, JOB_PROCESS_TEMPLATE,
};
use crate::domain::errors::ErrorCode;
use crate::domain::ports::file_storage::FileStorage;
use crate::domain::ports::task_queue::TaskQueue;
use crate::domain::ports::template_repository::TemplateRepository;
use crate::infrastructure::http::middleware::error::{ApiError, ApiResult};
use crate::shared::utils::api_keys::{constant_time_eq, generate_api_key, is_well_formed_api_key};
use crate::shared::utils::encryption::KeyCipher;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

pub const MAX_TEMPLATE_NAME_LENGTH: usize = 200;
pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Path and header template ids must be UUIDs; anything else is rejected
/// before a repository or storage call is made.
pub fn validate_template_id(id: &str) -> ApiResult<&str> {
    let id = id.trim();
    if id.is_empty() {
        return Err(ApiError::bad_request("Template id is required"));
    }
    Uuid::parse_str(id).map_err(|_| ApiError::bad_request(format!("Invalid template id '{}'", id)))?;
    Ok(id)
}

pub fn page_bounds(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = offset.unwrap_or(0).max(0);
    (limit, offset)
}

fn template_not_found(id: &str) -> ApiError {
    ApiError::NotFound(
        ErrorCode::TemplateNotFound,
        format!("Template {} not found", id),
    )
}

#[derive(Clone)]
pub struct TemplateService {
    template_repo: Arc<dyn TemplateRepository>,
    storage: Arc<dyn FileStorage>,
    queue: Arc<dyn TaskQueue>,
    cipher: KeyCipher,
}

impl TemplateService {
    pub fn new(
        template_repo: Arc<dyn TemplateRepository>,
        storage: Arc<dyn FileStorage>,
        queue: Arc<dyn TaskQueue>,
        cipher: KeyCipher,
    ) -> Self {
        Self {
            template_repo,
            storage,
            queue,
            cipher,
        }
    }

    /// Store a new template and queue its image extraction.
    ///
    /// The returned response carries the plaintext API key.
    pub async fn upload(
        &self,
        name: &str,
        html: &str,
        declared_fields: &[String],
    ) -> ApiResult<UploadTemplateResponse> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ApiError::bad_request("Template name is required"));
        }
        if name.chars().count() > MAX_TEMPLATE_NAME_LENGTH {
            return Err(ApiError::bad_request(format!(
                "Template name must be at most {} characters",
                MAX_TEMPLATE_NAME_LENGTH
            )));
        }
        if html.trim().is_empty() {
            return Err(ApiError::bad_request("Template HTML is required"));
        }

        let fields = merge_fields(declared_fields, &extract_placeholders(html))?;

        let api_key = generate_api_key();
        let template = Template::new(name.to_string(), fields, self.cipher.encrypt(&api_key)?);

        self.template_repo.create_template(&template).await?;

        if let Err(e) = self.store_and_enqueue(&template.id, html).await {
            self.disable_after_failure(&template.id).await;
            return Err(e);
        }

        tracing::info!(
            "Template {} ('{}') uploaded with {} field(s)",
            template.id,
            template.name,
            template.fields.len()
        );

        Ok(UploadTemplateResponse { template, api_key })
    }

    async fn store_and_enqueue(&self, template_id: &str, html: &str) -> ApiResult<()> {
        self.storage
            .save(&Template::source_key(template_id), html.as_bytes())
            .await?;

        // Processing is a single linear pass; a failure disables the template
        // instead of retrying.
        self.queue
            .enqueue(
                JOB_PROCESS_TEMPLATE,
                json!({ "template_id": template_id }),
                1,
            )
            .await?;

        Ok(())
    }

    async fn disable_after_failure(&self, template_id: &str) {
        if let Err(e) = self
            .template_repo
            .update_template_status(template_id, TemplateStatus::Disabled)
            .await
        {
            tracing::error!("Failed to disable template {}: {}", template_id, e);
        }
    }

    pub async fn list(
        &self,
        status: Option<TemplateStatus>,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> ApiResult<TemplateListResponse> {
        let (limit, offset) = page_bounds(limit, offset);

        let templates = self
            .template_repo
            .list_templates(status, limit, offset)
            .await?;
        let total = self.template_repo.count_templates(status).await?;

        Ok(TemplateListResponse {
            templates,
            pagination: PaginationMetadata {
                total,
                limit,
                offset,
            },
        })
    }

    /// Metadata of a template that has not been deleted.
    pub async fn get(&self, id: &str) -> ApiResult<Template> {
        let id = validate_template_id(id)?;

        match self.template_repo.get_template(id).await? {
            Some(template) if template.status != TemplateStatus::Deleted => Ok(template),
            _ => Err(template_not_found(id)),
        }
    }

    pub async fn delete(&self, id: &str) -> ApiResult<()> {
        let template = self.get(id).await?;

        self.template_repo
            .update_template_status(&template.id, TemplateStatus::Deleted)
            .await?;

        tracing::info!("Template {} deleted", template.id);
        Ok(())
    }

    pub async fn reveal_api_key(&self, id: &str) -> ApiResult<TemplateApiKeyResponse> {
        let template = self.get(id).await?;
        let api_key = self.cipher.decrypt(&template.api_key_encrypted)?;

        Ok(TemplateApiKeyResponse {
            template_id: template.id,
            api_key,
        })
    }

    /// Replace the template's key; the previous key stops working immediately.
    pub async fn rotate_api_key(&self, id: &str) -> ApiResult<TemplateApiKeyResponse> {
        let template = self.get(id).await?;

        let api_key = generate_api_key();
        let encrypted = self.cipher.encrypt(&api_key)?;
        self.template_repo
            .update_template_api_key(&template.id, &encrypted)
            .await?;

        tracing::info!("API key rotated for template {}", template.id);

        Ok(TemplateApiKeyResponse {
            template_id: template.id,
            api_key,
        })
    }

    /// Processed HTML body as used at send time.
    pub async fn get_html(&self, id: &str) -> ApiResult<String> {
        let template = self.get(id).await?;
        if !template.is_in_service() {
            return Err(ApiError::BadRequest(
                ErrorCode::TemplateNotInService,
                format!("Template {} is {}", template.id, template.status),
            ));
        }

        let bytes = self
            .storage
            .read(&Template::html_key(&template.id))
            .await
            .map_err(|e| ApiError::storage(e.to_string()))?;

        String::from_utf8(bytes)
            .map_err(|_| ApiError::storage(format!("Template {} HTML is not UTF-8", template.id)))
    }

    /// Resolve the template a sender authenticates against.
    ///
    /// Unknown ids, deleted templates and wrong keys are indistinguishable
    /// to the caller.
    pub async fn verify_api_key(&self, template_id: &str, api_key: &str) -> ApiResult<Template> {
        let invalid = || ApiError::Unauthorized(ErrorCode::InvalidApiKey);

        let template_id = validate_template_id(template_id).map_err(|_| invalid())?;
        if !is_well_formed_api_key(api_key) {
            return Err(invalid());
        }

        let template = match self.template_repo.get_template(template_id).await? {
            Some(template) if template.status != TemplateStatus::Deleted => template,
            _ => return Err(invalid()),
        };

        let stored = self.cipher.decrypt(&template.api_key_encrypted)?;
        if !constant_time_eq(&stored, api_key) {
            return Err(invalid());
        }

        Ok(template)
    }
}

/// Declared fields keep their order; placeholders found only in the HTML
/// are appended.
fn merge_fields(declared: &[String], discovered: &[String]) -> ApiResult<Vec<String>> {
    let mut fields: Vec<String> = Vec::new();

    for name in declared {
        let name = name.trim();
        if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(ApiError::bad_request(format!("Invalid field name '{}'", name)));
        }
        if !fields.iter().any(|f| f == name) {
            fields.push(name.to_string());
        }
    }

    for name in discovered {
        if !fields.contains(name) {
            fields.push(name.clone());
        }
    }

    Ok(fields)
}
