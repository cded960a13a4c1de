use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Extension, Json,
};

use crate::domain::entities::{SendBatchRequest, SendEmailRequest, SendEmailResponse};
use crate::infrastructure::http::controllers::json_body;
use crate::infrastructure::http::middleware::{ApiResult, AppState, AuthenticatedTemplate};

pub async fn send_email(
    State(state): State<AppState>,
    Extension(AuthenticatedTemplate(template)): Extension<AuthenticatedTemplate>,
    payload: Result<Json<SendEmailRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<SendEmailResponse>)> {
    let request = json_body(payload)?;
    let response = state.send_service.send(&template, request).await?;

    Ok((StatusCode::ACCEPTED, Json(response)))
}

pub async fn send_batch(
    State(state): State<AppState>,
    Extension(AuthenticatedTemplate(template)): Extension<AuthenticatedTemplate>,
    payload: Result<Json<SendBatchRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<SendEmailResponse>)> {
    let request = json_body(payload)?;
    let response = state.send_service.send_batch(&template, request).await?;

    Ok((StatusCode::ACCEPTED, Json(response)))
}
