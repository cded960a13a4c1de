use axum::{
    extract::{Request, State},
    http::header::{HeaderMap, AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use base64::{engine::general_purpose, Engine as _};

use crate::domain::entities::Template;
use crate::domain::errors::ErrorCode;
use crate::infrastructure::http::middleware::auth::AppState;
use crate::infrastructure::http::middleware::error::ApiError;

pub const TEMPLATE_ID_HEADER: &str = "X-Template-Id";
pub const API_KEY_HEADER: &str = "X-Api-Key";

/// Template a send request authenticated against.
#[derive(Debug, Clone)]
pub struct AuthenticatedTemplate(pub Template);

/// Extract `(template_id, api_key)` from request headers.
/// Supports two methods:
/// 1. Custom headers: X-Template-Id and X-Api-Key
/// 2. HTTP Basic Auth: Authorization: Basic <base64(template_id:api_key)>
pub(crate) fn extract_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    if let (Some(template_id), Some(api_key)) =
        (headers.get(TEMPLATE_ID_HEADER), headers.get(API_KEY_HEADER))
    {
        if let (Ok(id), Ok(key)) = (template_id.to_str(), api_key.to_str()) {
            return Some((id.trim().to_string(), key.trim().to_string()));
        }
    }

    let auth_str = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let encoded = auth_str.strip_prefix("Basic ")?;
    let decoded = general_purpose::STANDARD.decode(encoded.trim()).ok()?;
    let decoded_str = String::from_utf8(decoded).ok()?;
    let (id, key) = decoded_str.split_once(':')?;

    Some((id.to_string(), key.to_string()))
}

/// Resolve the sending template from its API key and store it in the
/// request extensions.
pub async fn api_key_auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let (template_id, api_key) = extract_credentials(request.headers())
        .ok_or(ApiError::Unauthorized(ErrorCode::InvalidApiKey))?;

    let template = match state
        .template_service
        .verify_api_key(&template_id, &api_key)
        .await
    {
        Ok(template) => template,
        Err(e) => {
            tracing::debug!("API key authentication failed for template {}", template_id);
            return Err(e);
        }
    };

    request
        .extensions_mut()
        .insert(AuthenticatedTemplate(template));

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_from_custom_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(TEMPLATE_ID_HEADER, HeaderValue::from_static("tid"));
        headers.insert(API_KEY_HEADER, HeaderValue::from_static(" key "));

        assert_eq!(
            extract_credentials(&headers),
            Some(("tid".to_string(), "key".to_string()))
        );
    }

    #[test]
    fn test_extract_from_basic_auth() {
        let mut headers = HeaderMap::new();
        let encoded = general_purpose::STANDARD.encode("tid:key");
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Basic {}", encoded)).unwrap(),
        );

        assert_eq!(
            extract_credentials(&headers),
            Some(("tid".to_string(), "key".to_string()))
        );
    }

    #[test]
    fn test_custom_headers_take_priority() {
        let mut headers = HeaderMap::new();
        headers.insert(TEMPLATE_ID_HEADER, HeaderValue::from_static("header-id"));
        headers.insert(API_KEY_HEADER, HeaderValue::from_static("header-key"));
        let encoded = general_purpose::STANDARD.encode("basic-id:basic-key");
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Basic {}", encoded)).unwrap(),
        );

        assert_eq!(
            extract_credentials(&headers),
            Some(("header-id".to_string(), "header-key".to_string()))
        );
    }

    #[test]
    fn test_missing_or_malformed_credentials() {
        assert_eq!(extract_credentials(&HeaderMap::new()), None);

        let mut headers = HeaderMap::new();
        headers.insert(TEMPLATE_ID_HEADER, HeaderValue::from_static("only-id"));
        assert_eq!(extract_credentials(&headers), None);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic !!!"));
        assert_eq!(extract_credentials(&headers), None);

        let mut headers = HeaderMap::new();
        let encoded = general_purpose::STANDARD.encode("no-colon");
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Basic {}", encoded)).unwrap(),
        );
        assert_eq!(extract_credentials(&headers), None);
    }
}
