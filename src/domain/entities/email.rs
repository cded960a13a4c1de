use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Payload of a queued `send_email` job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutboundEmail {
    pub template_id: String,
    pub to: String,
    pub subject: String,
    #[serde(default)]
    pub fields: HashMap<String, String>,
}

/// A fully rendered message ready for the mail transport.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedEmail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

#[derive(Debug, Deserialize)]
pub struct SendEmailRequest {
    pub to: String,
    pub subject: String,
    #[serde(default)]
    pub fields: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct BatchRecipient {
    pub to: String,
    /// Overrides the batch subject for this recipient
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub fields: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct SendBatchRequest {
    pub subject: String,
    pub recipients: Vec<BatchRecipient>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendEmailResponse {
    pub message: String,
    pub job_ids: Vec<String>,
    pub queued: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EmailEventStatus {
    Queued,
    Sent,
    /// Transient failure, job left on the queue for another attempt
    Deferred,
    /// Non-retriable failure, job dead-lettered
    Rejected,
}

impl EmailEventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailEventStatus::Queued => "queued",
            EmailEventStatus::Sent => "sent",
            EmailEventStatus::Deferred => "deferred",
            EmailEventStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for EmailEventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmailEventStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(EmailEventStatus::Queued),
            "sent" => Ok(EmailEventStatus::Sent),
            "deferred" => Ok(EmailEventStatus::Deferred),
            "rejected" => Ok(EmailEventStatus::Rejected),
            other => Err(format!("Unknown email event status: {}", other)),
        }
    }
}

/// One entry of a template's delivery log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmailEvent {
    pub id: String,
    pub template_id: String,
    pub job_id: Option<String>,
    pub recipient: String,
    pub subject: String,
    pub status: EmailEventStatus,
    pub detail: Option<String>,
    pub created_at: String,
}

impl EmailEvent {
    pub fn new(
        template_id: String,
        job_id: Option<String>,
        recipient: String,
        subject: String,
        status: EmailEventStatus,
        detail: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            template_id,
            job_id,
            recipient,
            subject,
            status,
            detail,
            created_at: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EmailEventListResponse {
    pub events: Vec<EmailEvent>,
    pub pagination: super::template::PaginationMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outbound_email_fields_default_to_empty() {
        let email: OutboundEmail = serde_json::from_str(
            r#"{"template_id":"t1","to":"a@example.com","subject":"Hi"}"#,
        )
        .unwrap();
        assert!(email.fields.is_empty());
    }

    #[test]
    fn test_event_status_parse() {
        assert_eq!("sent".parse::<EmailEventStatus>().unwrap(), EmailEventStatus::Sent);
        assert_eq!(
            "rejected".parse::<EmailEventStatus>().unwrap(),
            EmailEventStatus::Rejected
        );
        assert!("bounced".parse::<EmailEventStatus>().is_err());
    }
}
