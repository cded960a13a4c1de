use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Storage prefix of every extracted image; the only part of storage served
/// under `/assets`.
pub const IMAGE_ROOT: &str = "images";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TemplateStatus {
    /// Uploaded, image extraction not finished yet
    Processing,
    InService,
    /// Processing failed
    Disabled,
    Deleted,
}

impl TemplateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateStatus::Processing => "processing",
            TemplateStatus::InService => "in_service",
            TemplateStatus::Disabled => "disabled",
            TemplateStatus::Deleted => "deleted",
        }
    }
}

impl fmt::Display for TemplateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemplateStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(TemplateStatus::Processing),
            "in_service" => Ok(TemplateStatus::InService),
            "disabled" => Ok(TemplateStatus::Disabled),
            "deleted" => Ok(TemplateStatus::Deleted),
            other => Err(format!("Unknown template status: {}", other)),
        }
    }
}

/// Template metadata. The HTML body lives in file storage under
/// [`Template::source_key`] / [`Template::html_key`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Template {
    pub id: String,
    pub name: String,
    pub status: TemplateStatus,
    pub fields: Vec<String>,
    #[serde(skip_serializing, default)]
    pub api_key_encrypted: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Template {
    pub fn new(name: String, fields: Vec<String>, api_key_encrypted: String) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            status: TemplateStatus::Processing,
            fields,
            api_key_encrypted,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn is_in_service(&self) -> bool {
        self.status == TemplateStatus::InService
    }

    /// Storage key of the HTML exactly as uploaded.
    pub fn source_key(id: &str) -> String {
        format!("templates/{}/source.html", id)
    }

    /// Storage key of the processed HTML used at send time.
    pub fn html_key(id: &str) -> String {
        format!("templates/{}/template.html", id)
    }

    /// Extracted images live outside `templates/` so they can be served
    /// publicly without exposing the HTML bodies.
    pub fn image_prefix(id: &str) -> String {
        format!("{}/{}", IMAGE_ROOT, id)
    }
}

#[derive(Debug, Deserialize)]
pub struct UploadTemplateRequest {
    pub name: String,
    pub html: String,
    #[serde(default)]
    pub fields: Vec<String>,
}

/// Upload response; the only place besides the reveal endpoint where the
/// plaintext API key is returned.
#[derive(Debug, Serialize)]
pub struct UploadTemplateResponse {
    #[serde(flatten)]
    pub template: Template,
    pub api_key: String,
}

#[derive(Debug, Serialize)]
pub struct TemplateApiKeyResponse {
    pub template_id: String,
    pub api_key: String,
}

#[derive(Debug, Serialize)]
pub struct TemplateListResponse {
    pub templates: Vec<Template>,
    pub pagination: PaginationMetadata,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct PaginationMetadata {
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_template_starts_processing() {
        let template = Template::new("Welcome".into(), vec!["name".into()], "enc".into());
        assert_eq!(template.status, TemplateStatus::Processing);
        assert!(!template.is_in_service());
        assert!(Uuid::parse_str(&template.id).is_ok());
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            TemplateStatus::Processing,
            TemplateStatus::InService,
            TemplateStatus::Disabled,
            TemplateStatus::Deleted,
        ] {
            assert_eq!(status.as_str().parse::<TemplateStatus>().unwrap(), status);
        }
        assert!("archived".parse::<TemplateStatus>().is_err());
    }

    #[test]
    fn test_encrypted_key_never_serialized() {
        let template = Template::new("Welcome".into(), vec![], "ciphertext".into());
        let json = serde_json::to_string(&template).unwrap();
        assert!(!json.contains("ciphertext"));
        assert!(!json.contains("api_key"));
        assert!(json.contains("\"status\":\"processing\""));
    }

    #[test]
    fn test_storage_keys() {
        assert_eq!(Template::source_key("abc"), "templates/abc/source.html");
        assert_eq!(Template::html_key("abc"), "templates/abc/template.html");
        assert_eq!(Template::image_prefix("abc"), "images/abc");
    }
}
