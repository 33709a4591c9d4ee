use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;
use uuid::Uuid;
use vestry_api_types::{FormCreateRequest, FormUpdateRequest, SubmissionStatusRequest};

use crate::application::forms::{CreateFormCommand, UpdateFormCommand};
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::middleware::TenantContext;
use crate::infra::http::api::state::ApiState;

use super::clamp_limit;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionQuery {
    pub form_id: Option<Uuid>,
    pub status: Option<String>,
    pub limit: Option<u32>,
}

pub async fn list_forms(
    State(state): State<ApiState>,
    Extension(ctx): Extension<TenantContext>,
) -> Result<impl IntoResponse, ApiError> {
    let forms = state.forms.list_forms(ctx.tenant_id).await?;
    Ok(Json(forms))
}

pub async fn create_form(
    State(state): State<ApiState>,
    Extension(ctx): Extension<TenantContext>,
    Json(payload): Json<FormCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let command = CreateFormCommand {
        key: payload.key,
        name: payload.name,
        schema: payload.schema,
    };
    let form = state
        .forms
        .create_form(ctx.tenant_id, ctx.actor(), command)
        .await?;
    Ok((StatusCode::CREATED, Json(form)))
}

pub async fn update_form(
    State(state): State<ApiState>,
    Extension(ctx): Extension<TenantContext>,
    Path(id): Path<Uuid>,
    Json(payload): Json<FormUpdateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let command = UpdateFormCommand {
        name: payload.name,
        schema: payload.schema,
        is_active: payload.is_active,
    };
    let form = state
        .forms
        .update_form(ctx.tenant_id, ctx.actor(), id, command)
        .await?;
    Ok(Json(form))
}

pub async fn list_submissions(
    State(state): State<ApiState>,
    Extension(ctx): Extension<TenantContext>,
    Query(query): Query<SubmissionQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let submissions = state
        .forms
        .list_submissions(
            ctx.tenant_id,
            query.form_id,
            query.status.as_deref(),
            clamp_limit(query.limit),
        )
        .await?;
    Ok(Json(submissions))
}

pub async fn update_submission_status(
    State(state): State<ApiState>,
    Extension(ctx): Extension<TenantContext>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SubmissionStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let submission = state
        .forms
        .update_submission_status(ctx.tenant_id, ctx.actor(), id, &payload.status)
        .await?;
    Ok(Json(submission))
}
