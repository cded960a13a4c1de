use crate::application::services::{
    AuthService, EmailEventService, SendService, TemplateService,
};
use crate::domain::entities::{Session, User};
use crate::domain::errors::ErrorCode;
use crate::infrastructure::http::middleware::error::ApiError;
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use std::path::PathBuf;

#[derive(Clone)]
pub struct AppState {
    pub template_service: TemplateService,
    pub send_service: SendService,
    pub email_event_service: EmailEventService,
    pub auth_service: AuthService,
    /// Storage root; only its `images/` prefix is served, under `/assets/images`
    pub storage_path: PathBuf,
    pub cors_allowed_origin: String,
    pub max_upload_bytes: usize,
}

/// Management user resolved from a bearer session.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user: User,
    pub session: Session,
    pub token: String,
}

pub(crate) fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Extract and validate the session token from the Authorization header.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(&request)
        .ok_or(ApiError::Unauthorized(ErrorCode::Unauthorized))?
        .to_string();

    let (user, session) = state.auth_service.authenticate(&token).await?;

    request
        .extensions_mut()
        .insert(AuthenticatedUser { user, session, token });

    Ok(next.run(request).await)
}
