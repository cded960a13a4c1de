use crate::application::services::template_fields::{
    extract_placeholders, missing_fields, missing_fields_error,
};
use crate::domain::entities::{
    EmailEvent, EmailEventStatus, OutboundEmail, SendBatchRequest, SendEmailRequest,
    SendEmailResponse, Template, JOB_SEND_EMAIL,
};
use crate::domain::errors::ErrorCode;
use crate::domain::ports::email_event_repository::EmailEventRepository;
use crate::domain::ports::task_queue::TaskQueue;
use crate::infrastructure::http::middleware::error::{ApiError, ApiResult};
use crate::shared::utils::email_validator::validate_and_normalize_email;
use std::collections::HashMap;
use std::sync::Arc;

/// Validates send requests against a template and queues one `send_email`
/// job per recipient.
#[derive(Clone)]
pub struct SendService {
    queue: Arc<dyn TaskQueue>,
    event_repo: Arc<dyn EmailEventRepository>,
    max_send_attempts: i32,
    max_batch_recipients: usize,
}

impl SendService {
    pub fn new(
        queue: Arc<dyn TaskQueue>,
        event_repo: Arc<dyn EmailEventRepository>,
        max_send_attempts: i32,
        max_batch_recipients: usize,
    ) -> Self {
        Self {
            queue,
            event_repo,
            max_send_attempts,
            max_batch_recipients,
        }
    }

    pub async fn send(
        &self,
        template: &Template,
        request: SendEmailRequest,
    ) -> ApiResult<SendEmailResponse> {
        ensure_in_service(template)?;

        let email = build_outbound(template, &request.to, &request.subject, request.fields)?;
        let job_id = self.enqueue(&email).await?;

        Ok(SendEmailResponse {
            message: "Email queued".to_string(),
            job_ids: vec![job_id],
            queued: 1,
        })
    }

    /// Every recipient is validated before anything is queued; one bad
    /// recipient rejects the whole batch.
    pub async fn send_batch(
        &self,
        template: &Template,
        request: SendBatchRequest,
    ) -> ApiResult<SendEmailResponse> {
        ensure_in_service(template)?;

        if request.recipients.is_empty() {
            return Err(ApiError::bad_request("Batch must contain at least one recipient"));
        }
        if request.recipients.len() > self.max_batch_recipients {
            return Err(ApiError::bad_request(format!(
                "Batch exceeds the maximum of {} recipients",
                self.max_batch_recipients
            )));
        }

        let mut emails = Vec::with_capacity(request.recipients.len());
        for (index, recipient) in request.recipients.into_iter().enumerate() {
            let subject = recipient.subject.unwrap_or_else(|| request.subject.clone());
            let email = build_outbound(template, &recipient.to, &subject, recipient.fields)
                .map_err(|e| with_recipient_index(index, e))?;
            emails.push(email);
        }

        let mut job_ids = Vec::with_capacity(emails.len());
        for email in &emails {
            job_ids.push(self.enqueue(email).await?);
        }

        tracing::info!(
            "Queued batch of {} email(s) for template {}",
            job_ids.len(),
            template.id
        );

        Ok(SendEmailResponse {
            message: format!("{} emails queued", job_ids.len()),
            queued: job_ids.len(),
            job_ids,
        })
    }

    async fn enqueue(&self, email: &OutboundEmail) -> ApiResult<String> {
        let payload = serde_json::to_value(email).map_err(|e| {
            ApiError::Internal(ErrorCode::QueueError, format!("Failed to encode email: {}", e))
        })?;

        let job_id = self
            .queue
            .enqueue(JOB_SEND_EMAIL, payload, self.max_send_attempts)
            .await
            .map_err(|e| ApiError::Internal(ErrorCode::QueueError, e.to_string()))?;

        let event = EmailEvent::new(
            email.template_id.clone(),
            Some(job_id.clone()),
            email.to.clone(),
            email.subject.clone(),
            EmailEventStatus::Queued,
            None,
        );
        // The job is already queued; a lost log entry must not make the
        // caller resend.
        if let Err(e) = self.event_repo.record_event(&event).await {
            tracing::warn!("Failed to record queued event for job {}: {}", job_id, e);
        }

        Ok(job_id)
    }
}

fn ensure_in_service(template: &Template) -> ApiResult<()> {
    if template.is_in_service() {
        Ok(())
    } else {
        Err(ApiError::BadRequest(
            ErrorCode::TemplateNotInService,
            format!("Template {} is {}", template.id, template.status),
        ))
    }
}

fn build_outbound(
    template: &Template,
    to: &str,
    subject: &str,
    fields: HashMap<String, String>,
) -> ApiResult<OutboundEmail> {
    let to = validate_and_normalize_email(to)?;

    let subject = subject.trim();
    if subject.is_empty() {
        return Err(ApiError::bad_request("Subject is required"));
    }

    let mut required = template.fields.clone();
    for name in extract_placeholders(subject) {
        if !required.contains(&name) {
            required.push(name);
        }
    }
    let missing = missing_fields(&required, &fields);
    if !missing.is_empty() {
        return Err(missing_fields_error(&missing));
    }

    Ok(OutboundEmail {
        template_id: template.id.clone(),
        to,
        subject: subject.to_string(),
        fields,
    })
}

fn with_recipient_index(index: usize, err: ApiError) -> ApiError {
    match err {
        ApiError::BadRequest(code, msg) => {
            ApiError::BadRequest(code, format!("recipients[{}]: {}", index, msg))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::TemplateStatus;

    fn template() -> Template {
        let mut template = Template::new("Promo".into(), vec!["name".into()], "enc".into());
        template.status = TemplateStatus::InService;
        template
    }

    fn fields(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_build_outbound_normalizes_recipient() {
        let email = build_outbound(
            &template(),
            " Reader@Example.com ",
            " Hello ",
            fields(&[("name", "Ann")]),
        )
        .unwrap();
        assert_eq!(email.to, "reader@example.com");
        assert_eq!(email.subject, "Hello");
    }

    #[test]
    fn test_subject_placeholders_are_required() {
        let err = build_outbound(
            &template(),
            "reader@example.com",
            "Hi {{ first }}",
            fields(&[("name", "Ann")]),
        )
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::MissingTemplateFields);
        assert!(err.to_string().contains("first"));
    }

    #[test]
    fn test_validation_errors() {
        let err = build_outbound(&template(), "nope", "Hi", fields(&[("name", "A")])).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidRecipient);

        let err =
            build_outbound(&template(), "a@example.com", "  ", fields(&[("name", "A")])).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidRequest);
    }

    #[test]
    fn test_not_in_service_rejected() {
        let mut t = template();
        t.status = TemplateStatus::Processing;
        assert_eq!(
            ensure_in_service(&t).unwrap_err().code(),
            ErrorCode::TemplateNotInService
        );
    }

    #[test]
    fn test_recipient_index_prefix_keeps_code() {
        let err = with_recipient_index(
            3,
            ApiError::BadRequest(ErrorCode::InvalidRecipient, "bad".into()),
        );
        assert_eq!(err.code(), ErrorCode::InvalidRecipient);
        assert!(err.to_string().contains("recipients[3]: bad"));
    }
}
