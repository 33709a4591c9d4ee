use axum::body::Body;
use axum::http::{HeaderMap, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use super::error::ApiError;

pub const TENANT_HEADER: &str = "x-tenant-id";
pub const ACTOR_HEADER: &str = "x-actor-email";

/// Caller identity forwarded by the upstream gateway.
#[derive(Debug, Clone)]
pub struct TenantContext {
    pub tenant_id: Uuid,
    pub actor_email: Option<String>,
}

impl TenantContext {
    pub fn actor(&self) -> Option<&str> {
        self.actor_email.as_deref()
    }
}

pub async fn require_tenant(mut request: Request<Body>, next: Next) -> Response {
    let context = match tenant_context(request.headers()) {
        Ok(context) => context,
        Err(err) => return err.into_response(),
    };

    request.extensions_mut().insert(context.clone());
    let mut response = next.run(request).await;
    response.extensions_mut().insert(context);
    response
}

fn tenant_context(headers: &HeaderMap) -> Result<TenantContext, ApiError> {
    let raw = headers
        .get(TENANT_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ApiError::unauthorized("missing X-Tenant-Id header"))?;
    let tenant_id = Uuid::parse_str(raw)
        .map_err(|_| ApiError::unauthorized("X-Tenant-Id must be a UUID"))?;

    let actor_email = headers
        .get(ACTOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string);

    Ok(TenantContext {
        tenant_id,
        actor_email,
    })
}
