use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use uuid::Uuid;
use vestry_api_types::{
    DraftSaveRequest, PageCreateRequest, PageUpdateRequest, PublishRequest, RollbackRequest,
};

use crate::application::website::{CreatePageCommand, SaveDraftCommand, UpdatePageCommand};
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::middleware::TenantContext;
use crate::infra::http::api::state::ApiState;

pub async fn list_pages(
    State(state): State<ApiState>,
    Extension(ctx): Extension<TenantContext>,
) -> Result<impl IntoResponse, ApiError> {
    let pages = state.website.list_pages(ctx.tenant_id).await?;
    Ok(Json(pages))
}

pub async fn create_page(
    State(state): State<ApiState>,
    Extension(ctx): Extension<TenantContext>,
    Json(payload): Json<PageCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let command = CreatePageCommand {
        title: payload.title,
        slug: payload.slug,
    };
    let page = state
        .website
        .create_page(ctx.tenant_id, ctx.actor(), command)
        .await?;
    Ok((StatusCode::CREATED, Json(page)))
}

pub async fn get_page(
    State(state): State<ApiState>,
    Extension(ctx): Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state.website.get_page(ctx.tenant_id, id).await?;
    Ok(Json(page))
}

pub async fn update_page(
    State(state): State<ApiState>,
    Extension(ctx): Extension<TenantContext>,
    Path(id): Path<Uuid>,
    Json(payload): Json<PageUpdateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let command = UpdatePageCommand {
        title: payload.title,
        slug: payload.slug,
    };
    let page = state
        .website
        .update_page(ctx.tenant_id, ctx.actor(), id, command)
        .await?;
    Ok(Json(page))
}

pub async fn list_revisions(
    State(state): State<ApiState>,
    Extension(ctx): Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let revisions = state.website.list_revisions(ctx.tenant_id, id).await?;
    Ok(Json(revisions))
}

pub async fn save_draft(
    State(state): State<ApiState>,
    Extension(ctx): Extension<TenantContext>,
    Path(id): Path<Uuid>,
    Json(payload): Json<DraftSaveRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let command = SaveDraftCommand {
        content: payload.content,
        seo: payload.seo,
        title: payload.title,
        change_summary: payload.change_summary,
    };
    let saved = state
        .website
        .save_draft(ctx.tenant_id, ctx.actor(), id, command)
        .await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

pub async fn publish_page(
    State(state): State<ApiState>,
    Extension(ctx): Extension<TenantContext>,
    Path(id): Path<Uuid>,
    payload: Option<Json<PublishRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = payload.map(|Json(body)| body).unwrap_or_default();
    let revision = state
        .website
        .publish_page(ctx.tenant_id, ctx.actor(), id, payload.change_summary)
        .await?;
    Ok(Json(revision))
}

pub async fn rollback_page(
    State(state): State<ApiState>,
    Extension(ctx): Extension<TenantContext>,
    Path(id): Path<Uuid>,
    payload: Option<Json<RollbackRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = payload.map(|Json(body)| body).unwrap_or_default();
    let revision = state
        .website
        .rollback_page(ctx.tenant_id, ctx.actor(), id, payload.revision_id)
        .await?;
    Ok(Json(revision))
}
