use axum::Json;
use axum::extract::{Extension, State};
use axum::response::IntoResponse;
use serde_json::{Map, Value};
use vestry_api_types::ThemePatchRequest;

use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::middleware::TenantContext;
use crate::infra::http::api::state::ApiState;

pub async fn get_theme(
    State(state): State<ApiState>,
    Extension(ctx): Extension<TenantContext>,
) -> Result<impl IntoResponse, ApiError> {
    let theme = state.website.get_theme(ctx.tenant_id).await?;
    Ok(Json(theme))
}

pub async fn update_theme(
    State(state): State<ApiState>,
    Extension(ctx): Extension<TenantContext>,
    Json(payload): Json<ThemePatchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let revision = state
        .website
        .update_theme(
            ctx.tenant_id,
            ctx.actor(),
            payload.theme,
            payload.change_summary,
        )
        .await?;
    Ok(Json(revision))
}

pub async fn list_theme_revisions(
    State(state): State<ApiState>,
    Extension(ctx): Extension<TenantContext>,
) -> Result<impl IntoResponse, ApiError> {
    let revisions = state.website.list_theme_revisions(ctx.tenant_id).await?;
    Ok(Json(revisions))
}

pub async fn get_seo(
    State(state): State<ApiState>,
    Extension(ctx): Extension<TenantContext>,
) -> Result<impl IntoResponse, ApiError> {
    let seo = state.website.get_global_seo(ctx.tenant_id).await?;
    Ok(Json(seo))
}

pub async fn update_seo(
    State(state): State<ApiState>,
    Extension(ctx): Extension<TenantContext>,
    Json(patch): Json<Map<String, Value>>,
) -> Result<impl IntoResponse, ApiError> {
    let seo = state
        .website
        .update_global_seo(ctx.tenant_id, ctx.actor(), patch)
        .await?;
    Ok(Json(seo))
}
