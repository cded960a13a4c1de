use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

use crate::domain::errors::ErrorCode;

const INTERNAL_MESSAGE: &str = "Internal server error";

#[derive(Debug)]
pub enum ApiError {
    BadRequest(ErrorCode, String),
    Unauthorized(ErrorCode),
    Forbidden(String),
    NotFound(ErrorCode, String),
    Conflict(String),
    TooManyRequests(String),
    Internal(ErrorCode, String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        ApiError::BadRequest(ErrorCode::InvalidRequest, msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ApiError::NotFound(ErrorCode::NotFound, msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        ApiError::Internal(ErrorCode::InternalError, msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        ApiError::Internal(ErrorCode::StorageError, msg.into())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            ApiError::BadRequest(code, _) => *code,
            ApiError::Unauthorized(code) => *code,
            ApiError::Forbidden(_) => ErrorCode::Forbidden,
            ApiError::NotFound(code, _) => *code,
            ApiError::Conflict(_) => ErrorCode::Conflict,
            ApiError::TooManyRequests(_) => ErrorCode::RateLimited,
            ApiError::Internal(code, _) => *code,
        }
    }

    /// User-caused failures map to 4xx responses and are not retried by the
    /// send worker.
    pub fn is_user_error(&self) -> bool {
        !matches!(self, ApiError::Internal(..)) && self.code().is_user_error()
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(..) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(..) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(..) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(code, msg) => write!(f, "Bad request ({}): {}", code, msg),
            ApiError::Unauthorized(code) => write!(f, "Unauthorized ({})", code),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound(code, msg) => write!(f, "Not found ({}): {}", code, msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::TooManyRequests(msg) => write!(f, "Too many requests: {}", msg),
            ApiError::Internal(code, msg) => write!(f, "Internal error ({}): {}", code, msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let message = match self {
            ApiError::BadRequest(_, msg) => msg,
            ApiError::Unauthorized(_) => "Unauthorized".to_string(),
            ApiError::Forbidden(msg) => msg,
            ApiError::NotFound(_, msg) => msg,
            ApiError::Conflict(msg) => msg,
            ApiError::TooManyRequests(msg) => msg,
            ApiError::Internal(_, detail) => {
                // Detail stays in the logs only
                tracing::error!(code = %code, "{}", detail);
                INTERNAL_MESSAGE.to_string()
            }
        };

        let body = Json(json!({
            "message": message,
            "code": code,
        }));

        (status, body).into_response()
    }
}

// Convert from sqlx errors
impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::not_found("Resource not found"),
            sqlx::Error::Database(db_err) => {
                let message = db_err.message();
                if message.contains("UNIQUE") || message.contains("unique") {
                    ApiError::Conflict("Resource already exists".to_string())
                } else {
                    ApiError::internal(format!("Database error: {}", message))
                }
            }
            other => ApiError::internal(format!("Database error: {}", other)),
        }
    }
}

// Convert from argon2 errors
impl From<argon2::password_hash::Error> for ApiError {
    fn from(_: argon2::password_hash::Error) -> Self {
        ApiError::internal("Password hashing error")
    }
}

impl From<crate::shared::utils::encryption::EncryptionError> for ApiError {
    fn from(err: crate::shared::utils::encryption::EncryptionError) -> Self {
        ApiError::Internal(ErrorCode::EncryptionError, err.to_string())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
