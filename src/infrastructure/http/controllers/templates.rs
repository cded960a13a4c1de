use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::Html,
    Json,
};
use serde::Deserialize;

use crate::domain::entities::{
    Template, TemplateApiKeyResponse, TemplateListResponse, TemplateStatus,
    UploadTemplateRequest, UploadTemplateResponse,
};
use crate::infrastructure::http::controllers::{json_body, query_params};
use crate::infrastructure::http::middleware::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct ListTemplatesQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn upload_template(
    State(state): State<AppState>,
    payload: Result<Json<UploadTemplateRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<UploadTemplateResponse>)> {
    let request = json_body(payload)?;
    let response = state
        .template_service
        .upload(&request.name, &request.html, &request.fields)
        .await?;

    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn list_templates(
    State(state): State<AppState>,
    query: Result<Query<ListTemplatesQuery>, QueryRejection>,
) -> ApiResult<Json<TemplateListResponse>> {
    let params = query_params(query)?;
    let status = params
        .status
        .as_deref()
        .map(str::parse::<TemplateStatus>)
        .transpose()
        .map_err(ApiError::bad_request)?;

    let response = state
        .template_service
        .list(status, params.limit, params.offset)
        .await?;

    Ok(Json(response))
}

pub async fn get_template(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Template>> {
    Ok(Json(state.template_service.get(&id).await?))
}

pub async fn delete_template(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.template_service.delete(&id).await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_template_api_key(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<TemplateApiKeyResponse>> {
    Ok(Json(state.template_service.reveal_api_key(&id).await?))
}

pub async fn rotate_template_api_key(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<TemplateApiKeyResponse>> {
    Ok(Json(state.template_service.rotate_api_key(&id).await?))
}

pub async fn get_template_html(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Html<String>> {
    Ok(Html(state.template_service.get_html(&id).await?))
}
