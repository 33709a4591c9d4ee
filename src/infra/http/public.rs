use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, State},
    http::{
        HeaderMap, HeaderValue, StatusCode, Uri,
        header::{CACHE_CONTROL, CONTENT_TYPE, HOST, LOCATION},
    },
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use vestry_api_types::{AnalyticsEventRequest, FormSubmitRequest};

use crate::{
    application::{
        analytics::{AnalyticsEventInput, AnalyticsService},
        fingerprint::ClientInfo,
        forms::{FormService, FormSubmission},
        public::{PublicSiteService, Routed, sitemap::SitemapService},
    },
    config::TrustedProxies,
    infra::db::PostgresRepositories,
};

use super::{
    RouterState,
    api::error::ApiError,
    db_health_response,
    middleware::{log_responses, public_rate_limit, set_client_info},
    rate_limit::PublicRateLimiter,
};

const FORWARDED_HOST_HEADER: &str = "x-forwarded-host";

#[derive(Clone)]
pub struct HttpState {
    pub site: Arc<PublicSiteService>,
    pub sitemap: Arc<SitemapService>,
    pub forms: Arc<FormService>,
    pub analytics: Arc<AnalyticsService>,
    pub db: Arc<PostgresRepositories>,
    pub rate_limiter: PublicRateLimiter,
    pub trusted_proxies: TrustedProxies,
}

pub fn build_public_router(state: RouterState) -> Router<RouterState> {
    let limiter = state.http.rate_limiter.clone();
    let proxies = state.http.trusted_proxies.clone();

    let limited = Router::new()
        .route("/_site", get(site))
        .route("/_site/pages/{slug}", get(site_page))
        .route("/_preview/{token}", get(preview))
        .route("/sitemap.xml", get(sitemap))
        .route("/robots.txt", get(robots_txt))
        .route("/_forms/{key}", post(submit_form))
        .route("/_events", post(record_event))
        .layer(middleware::from_fn_with_state(limiter, public_rate_limit));

    Router::new()
        .merge(limited)
        .route("/_health/db", get(public_health))
        .with_state(state)
        .layer(middleware::from_fn_with_state(proxies, set_client_info))
        .layer(middleware::from_fn(log_responses))
}

/// Host the visitor asked for; a proxy's forwarded host wins.
fn request_host(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get(FORWARDED_HOST_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .or_else(|| headers.get(HOST).and_then(|value| value.to_str().ok()))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::bad_request("Host header required", None))
}

/// `308` to the canonical origin, keeping the requested path and query.
fn redirect_response(target: &str, uri: &Uri) -> Response {
    let mut location = format!("{}{}", target.trim_end_matches('/'), uri.path());
    if let Some(query) = uri.query() {
        location.push('?');
        location.push_str(query);
    }

    match HeaderValue::from_str(&location) {
        Ok(value) => {
            let mut response = StatusCode::PERMANENT_REDIRECT.into_response();
            response.headers_mut().insert(LOCATION, value);
            response
        }
        Err(_) => ApiError::bad_request("Invalid canonical redirect target", Some(location))
            .into_response(),
    }
}

fn routed_response<T: serde::Serialize>(routed: Routed<T>, uri: &Uri) -> Response {
    match routed {
        Routed::Redirect(target) => redirect_response(&target, uri),
        Routed::Content(content) => Json(content).into_response(),
    }
}

async fn site(
    State(state): State<HttpState>,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Response, ApiError> {
    let host = request_host(&headers)?;
    let routed = state.site.render_site(&host).await?;
    Ok(routed_response(routed, &uri))
}

async fn site_page(
    State(state): State<HttpState>,
    Path(slug): Path<String>,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Response, ApiError> {
    let host = request_host(&headers)?;
    let routed = state.site.render_page(&host, &slug).await?;
    Ok(routed_response(routed, &uri))
}

async fn preview(
    State(state): State<HttpState>,
    Path(token): Path<String>,
) -> Result<Response, ApiError> {
    let site = state.site.render_preview(&token).await?;
    let mut response = Json(site).into_response();
    response
        .headers_mut()
        .insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    Ok(response)
}

async fn sitemap(
    State(state): State<HttpState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let host = request_host(&headers)?;
    let body = state.sitemap.sitemap_xml(&host).await?;
    Ok((
        [(CONTENT_TYPE, HeaderValue::from_static("application/xml"))],
        body,
    )
        .into_response())
}

async fn robots_txt(
    State(state): State<HttpState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let host = request_host(&headers)?;
    let body = state.sitemap.robots_txt(&host).await?;
    Ok((
        [(
            CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        )],
        body,
    )
        .into_response())
}

async fn submit_form(
    State(state): State<HttpState>,
    Path(key): Path<String>,
    Extension(client): Extension<ClientInfo>,
    headers: HeaderMap,
    Json(payload): Json<FormSubmitRequest>,
) -> Result<Response, ApiError> {
    let host = request_host(&headers)?;
    let submission = FormSubmission {
        fields: payload.fields,
        source: payload.source,
    };
    let receipt = state.forms.submit(&host, &key, submission, &client).await?;
    Ok((StatusCode::CREATED, Json(receipt)).into_response())
}

async fn record_event(
    State(state): State<HttpState>,
    Extension(client): Extension<ClientInfo>,
    headers: HeaderMap,
    Json(payload): Json<AnalyticsEventRequest>,
) -> Result<Response, ApiError> {
    let host = request_host(&headers)?;
    let input = AnalyticsEventInput {
        page_path: payload.page_path,
        event_type: payload.event_type,
        source: payload.source,
        payload: payload.payload,
    };
    state.analytics.record_event(&host, input, &client).await?;
    Ok(StatusCode::ACCEPTED.into_response())
}

async fn public_health(State(state): State<HttpState>) -> Response {
    db_health_response(state.db.health_check().await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forwarded_host_takes_precedence() {
        let mut headers = HeaderMap::new();
        headers.insert(HOST, HeaderValue::from_static("internal:8080"));
        headers.insert(
            FORWARDED_HOST_HEADER,
            HeaderValue::from_static("grace.org, proxy.local"),
        );
        assert_eq!(request_host(&headers).ok().as_deref(), Some("grace.org"));
    }

    #[test]
    fn missing_host_is_rejected() {
        let error = request_host(&HeaderMap::new()).unwrap_err();
        assert_eq!(error.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn redirect_keeps_path_and_query() {
        let uri: Uri = "/_site/pages/about?ref=mail".parse().unwrap();
        let response = redirect_response("https://www.grace.org/", &uri);
        assert_eq!(response.status(), StatusCode::PERMANENT_REDIRECT);
        assert_eq!(
            response
                .headers()
                .get(LOCATION)
                .and_then(|value| value.to_str().ok()),
            Some("https://www.grace.org/_site/pages/about?ref=mail")
        );
    }
}
