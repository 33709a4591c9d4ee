use axum::Json;
use axum::extract::{Extension, Query, State};
use axum::response::IntoResponse;
use serde::Deserialize;

use crate::domain::types::AnalyticsRange;
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::middleware::TenantContext;
use crate::infra::http::api::state::ApiState;

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub range: Option<String>,
}

pub async fn analytics_summary(
    State(state): State<ApiState>,
    Extension(ctx): Extension<TenantContext>,
    Query(query): Query<SummaryQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let range = AnalyticsRange::parse(query.range.as_deref());
    let summary = state
        .analytics
        .analytics_summary(ctx.tenant_id, range)
        .await?;
    Ok(Json(summary))
}
