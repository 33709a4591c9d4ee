use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use uuid::Uuid;
use vestry_api_types::{AssetCreateRequest, AssetUpdateRequest};

use crate::application::website::{CreateAssetCommand, UpdateAssetCommand};
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::middleware::TenantContext;
use crate::infra::http::api::state::ApiState;

pub async fn list_assets(
    State(state): State<ApiState>,
    Extension(ctx): Extension<TenantContext>,
) -> Result<impl IntoResponse, ApiError> {
    let assets = state.website.list_assets(ctx.tenant_id).await?;
    Ok(Json(assets))
}

pub async fn create_asset(
    State(state): State<ApiState>,
    Extension(ctx): Extension<TenantContext>,
    Json(payload): Json<AssetCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let command = CreateAssetCommand {
        name: payload.name,
        url: payload.url,
        storage_key: payload.storage_key,
        mime_type: payload.mime_type,
        size_bytes: payload.size,
        alt_text: payload.alt_text,
    };
    let asset = state
        .website
        .create_asset(ctx.tenant_id, ctx.actor(), command)
        .await?;
    Ok((StatusCode::CREATED, Json(asset)))
}

pub async fn update_asset(
    State(state): State<ApiState>,
    Extension(ctx): Extension<TenantContext>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssetUpdateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let command = UpdateAssetCommand {
        name: payload.name,
        alt_text: payload.alt_text,
    };
    let asset = state
        .website
        .update_asset(ctx.tenant_id, ctx.actor(), id, command)
        .await?;
    Ok(Json(asset))
}

pub async fn delete_asset(
    State(state): State<ApiState>,
    Extension(ctx): Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .website
        .delete_asset(ctx.tenant_id, ctx.actor(), id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
