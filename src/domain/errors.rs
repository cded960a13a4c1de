use serde::{Deserialize, Serialize};
use std::fmt;

/// Machine-readable error codes returned in every error body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidRequest,
    MissingTemplateFields,
    InvalidRecipient,
    Unauthorized,
    InvalidApiKey,
    Forbidden,
    TemplateNotFound,
    TemplateNotInService,
    NotFound,
    Conflict,
    RateLimited,
    DeliveryRejected,
    StorageError,
    QueueError,
    DeliveryError,
    EncryptionError,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidRequest => "INVALID_REQUEST",
            ErrorCode::MissingTemplateFields => "MISSING_TEMPLATE_FIELDS",
            ErrorCode::InvalidRecipient => "INVALID_RECIPIENT",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::InvalidApiKey => "INVALID_API_KEY",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::TemplateNotFound => "TEMPLATE_NOT_FOUND",
            ErrorCode::TemplateNotInService => "TEMPLATE_NOT_IN_SERVICE",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::Conflict => "CONFLICT",
            ErrorCode::RateLimited => "RATE_LIMITED",
            ErrorCode::DeliveryRejected => "DELIVERY_REJECTED",
            ErrorCode::StorageError => "STORAGE_ERROR",
            ErrorCode::QueueError => "QUEUE_ERROR",
            ErrorCode::DeliveryError => "DELIVERY_ERROR",
            ErrorCode::EncryptionError => "ENCRYPTION_ERROR",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }

    /// True when the failure was caused by the caller's input (4xx class).
    /// A send job failing with a user-caused code is never retried.
    pub fn is_user_error(&self) -> bool {
        !matches!(
            self,
            ErrorCode::StorageError
                | ErrorCode::QueueError
                | ErrorCode::DeliveryError
                | ErrorCode::EncryptionError
                | ErrorCode::InternalError
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
