use crate::domain::errors::ErrorCode;
use crate::infrastructure::http::middleware::error::{ApiError, ApiResult};

/// Validate a recipient or login address and normalize it for storage.
pub fn validate_and_normalize_email(email: &str) -> ApiResult<String> {
    let trimmed = email.trim();

    if !email_address::EmailAddress::is_valid(trimmed) {
        return Err(ApiError::BadRequest(
            ErrorCode::InvalidRecipient,
            format!("Invalid email address '{}'", trimmed),
        ));
    }

    // email_address accepts dotless domains; mail relays do not
    let domain = trimmed.rsplit_once('@').map(|(_, d)| d).unwrap_or_default();
    if !domain.contains('.') {
        return Err(ApiError::BadRequest(
            ErrorCode::InvalidRecipient,
            format!("Invalid email address '{}': domain must include a TLD", trimmed),
        ));
    }

    Ok(trimmed.to_lowercase())
}
