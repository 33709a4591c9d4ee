use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use uuid::Uuid;
use vestry_api_types::{DomainCreateRequest, DomainRoutingRequest};

use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::middleware::TenantContext;
use crate::infra::http::api::state::ApiState;

pub async fn list_domains(
    State(state): State<ApiState>,
    Extension(ctx): Extension<TenantContext>,
) -> Result<impl IntoResponse, ApiError> {
    let domains = state.domains.list_domains(ctx.tenant_id).await?;
    Ok(Json(domains))
}

pub async fn add_domain(
    State(state): State<ApiState>,
    Extension(ctx): Extension<TenantContext>,
    Json(payload): Json<DomainCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let domain = state
        .domains
        .add_domain(ctx.tenant_id, ctx.actor(), &payload.hostname)
        .await?;
    Ok((StatusCode::CREATED, Json(domain)))
}

pub async fn delete_domain(
    State(state): State<ApiState>,
    Extension(ctx): Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .domains
        .delete_domain(ctx.tenant_id, ctx.actor(), id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn verify_domain(
    State(state): State<ApiState>,
    Extension(ctx): Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let check = state
        .domains
        .verify_domain(ctx.tenant_id, ctx.actor(), id)
        .await?;
    Ok(Json(check))
}

pub async fn health_check_domains(
    State(state): State<ApiState>,
    Extension(ctx): Extension<TenantContext>,
) -> Result<impl IntoResponse, ApiError> {
    let checks = state
        .domains
        .health_check_domains(ctx.tenant_id, ctx.actor())
        .await?;
    Ok(Json(checks))
}

pub async fn set_primary_domain(
    State(state): State<ApiState>,
    Extension(ctx): Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let domain = state
        .domains
        .set_primary_domain(ctx.tenant_id, ctx.actor(), id)
        .await?;
    Ok(Json(domain))
}

pub async fn update_domain_routing(
    State(state): State<ApiState>,
    Extension(ctx): Extension<TenantContext>,
    Path(id): Path<Uuid>,
    Json(payload): Json<DomainRoutingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let domain = state
        .domains
        .update_domain_routing(
            ctx.tenant_id,
            ctx.actor(),
            id,
            payload.redirect_to_canonical,
            payload.canonical_url.as_deref(),
        )
        .await?;
    Ok(Json(domain))
}
