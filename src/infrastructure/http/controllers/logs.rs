use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    Json,
};
use serde::Deserialize;

use crate::domain::entities::{EmailEventListResponse, EmailEventStatus};
use crate::infrastructure::http::controllers::query_params;
use crate::infrastructure::http::middleware::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct TemplateLogsQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn get_template_logs(
    State(state): State<AppState>,
    Path(id): Path<String>,
    query: Result<Query<TemplateLogsQuery>, QueryRejection>,
) -> ApiResult<Json<EmailEventListResponse>> {
    let params = query_params(query)?;
    let status = params
        .status
        .as_deref()
        .map(str::parse::<EmailEventStatus>)
        .transpose()
        .map_err(ApiError::bad_request)?;

    let response = state
        .email_event_service
        .list_for_template(&id, status, params.limit, params.offset)
        .await?;

    Ok(Json(response))
}
