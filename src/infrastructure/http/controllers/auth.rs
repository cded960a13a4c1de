use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Extension, Json,
};

use crate::domain::entities::{LoginRequest, LoginResponse, SessionResponse};
use crate::infrastructure::http::controllers::json_body;
use crate::infrastructure::http::middleware::{ApiResult, AppState, AuthenticatedUser};

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<LoginResponse>> {
    let request = json_body(payload)?;
    let response = state
        .auth_service
        .login(&request.email, &request.password)
        .await?;

    Ok(Json(response))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
) -> ApiResult<StatusCode> {
    state.auth_service.logout(&auth_user.token).await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_session(
    Extension(auth_user): Extension<AuthenticatedUser>,
) -> ApiResult<Json<SessionResponse>> {
    Ok(Json(SessionResponse {
        user: auth_user.user,
        expires_at: auth_user.session.expires_at,
        created_at: auth_user.session.created_at,
    }))
}
