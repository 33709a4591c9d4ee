use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::application::templates::templates;
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::middleware::TenantContext;
use crate::infra::http::api::state::ApiState;

use super::{LimitQuery, clamp_limit};

pub async fn get_website(
    State(state): State<ApiState>,
    Extension(ctx): Extension<TenantContext>,
) -> Result<impl IntoResponse, ApiError> {
    let overview = state.website.website_overview(ctx.tenant_id).await?;
    Ok(Json(overview))
}

pub async fn list_templates() -> impl IntoResponse {
    Json(templates())
}

pub async fn apply_template(
    State(state): State<ApiState>,
    Extension(ctx): Extension<TenantContext>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let website = state
        .website
        .apply_template(ctx.tenant_id, ctx.actor(), &key)
        .await?;
    Ok(Json(website))
}

pub async fn list_audit_logs(
    State(state): State<ApiState>,
    Extension(ctx): Extension<TenantContext>,
    Query(query): Query<LimitQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let logs = state
        .website
        .list_audit_logs(ctx.tenant_id, clamp_limit(query.limit))
        .await?;
    Ok(Json(logs))
}

pub async fn create_preview_token(
    State(state): State<ApiState>,
    Extension(ctx): Extension<TenantContext>,
) -> Result<impl IntoResponse, ApiError> {
    let token = state
        .site
        .create_preview_token(ctx.tenant_id, ctx.actor())
        .await?;
    Ok((StatusCode::CREATED, Json(token)))
}
