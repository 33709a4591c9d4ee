use std::net::{IpAddr, SocketAddr};
use std::time::Instant;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, HeaderValue, Request, header::USER_AGENT},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{error, warn};
use uuid::Uuid;

use crate::application::{error::ErrorReport, fingerprint::ClientInfo};
use crate::config::TrustedProxies;

use super::api::error::ApiError;
use super::api::middleware::TenantContext;
use super::rate_limit::{PublicRateLimiter, RateDecision};

const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
}

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty() && value.len() <= 128)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let ctx = RequestContext {
        request_id: request_id.clone(),
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response.extensions_mut().insert(ctx);
    response
}

/// Attach the caller's IP and user agent for hashing and rate limiting.
///
/// Forwarding headers are honoured only when the connecting peer is a trusted
/// proxy; otherwise the peer address identifies the client.
pub async fn set_client_info(
    State(proxies): State<TrustedProxies>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    let client = client_info(request.headers(), peer, &proxies);
    request.extensions_mut().insert(client);
    next.run(request).await
}

fn client_info(headers: &HeaderMap, peer: Option<IpAddr>, proxies: &TrustedProxies) -> ClientInfo {
    let forwarded = peer
        .filter(|peer| proxies.trusts(*peer))
        .and_then(|_| forwarded_client(headers, proxies));
    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string);

    ClientInfo {
        ip: forwarded.or(peer).map(|ip| ip.to_string()),
        user_agent,
    }
}

/// Nearest hop in `X-Forwarded-For` that is not itself a trusted proxy,
/// falling back to `X-Real-IP`. Unparseable entries end the walk.
fn forwarded_client(headers: &HeaderMap, proxies: &TrustedProxies) -> Option<IpAddr> {
    let chain = headers
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .collect::<Vec<_>>();

    let mut nearest = None;
    for hop in chain.iter().rev() {
        let Ok(ip) = hop.parse::<IpAddr>() else {
            break;
        };
        nearest = Some(ip);
        if !proxies.trusts(ip) {
            break;
        }
    }

    nearest.or_else(|| {
        headers
            .get("x-real-ip")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse().ok())
    })
}

pub async fn public_rate_limit(
    State(limiter): State<PublicRateLimiter>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let key = request
        .extensions()
        .get::<ClientInfo>()
        .and_then(|client| client.ip.clone())
        .unwrap_or_else(|| "unknown".to_string());

    match limiter.check(&key) {
        RateDecision::Allowed { .. } => next.run(request).await,
        RateDecision::Limited { retry_after_secs } => {
            metrics::counter!("vestry_public_rate_limited_total").increment(1);
            ApiError::rate_limited(retry_after_secs).into_response()
        }
    }
}

pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();

    let mut response = next.run(request).await;
    let status = response.status();
    let elapsed = start.elapsed();
    metrics::histogram!("vestry_http_request_ms").record(elapsed.as_secs_f64() * 1000.0);

    if status.is_client_error() || status.is_server_error() {
        let elapsed_ms = elapsed.as_millis();
        let tenant_id = response
            .extensions()
            .get::<TenantContext>()
            .map(|ctx| ctx.tenant_id.to_string())
            .unwrap_or_default();
        let report = response.extensions_mut().remove::<ErrorReport>();
        let (source, messages) = match report {
            Some(report) => (report.source, report.messages),
            None => ("unknown", Vec::new()),
        };
        let detail = messages
            .first()
            .cloned()
            .unwrap_or_else(|| "no diagnostic available".to_string());

        if status.is_server_error() {
            error!(
                target = "vestry::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                tenant_id = tenant_id,
                "request failed",
            );
        } else {
            warn!(
                target = "vestry::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                tenant_id = tenant_id,
                "client request error",
            );
        }
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(value: &str) -> IpAddr {
        value.parse().unwrap()
    }

    fn proxies(entries: &[&str]) -> TrustedProxies {
        TrustedProxies::parse(entries).unwrap()
    }

    #[test]
    fn forwarded_headers_from_untrusted_peers_are_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9"));
        headers.insert("x-real-ip", HeaderValue::from_static("203.0.113.10"));
        headers.insert(USER_AGENT, HeaderValue::from_static("curl/8"));

        let client = client_info(&headers, Some(ip("198.51.100.4")), &proxies(&[]));
        assert_eq!(client.ip.as_deref(), Some("198.51.100.4"));
        assert_eq!(client.user_agent.as_deref(), Some("curl/8"));
    }

    #[test]
    fn trusted_proxy_reports_the_nearest_untrusted_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("1.2.3.4, 203.0.113.9, 10.0.0.2"),
        );

        let client = client_info(&headers, Some(ip("10.0.0.1")), &proxies(&["10.0.0.0/8"]));
        assert_eq!(client.ip.as_deref(), Some("203.0.113.9"));
    }

    #[test]
    fn trusted_proxy_without_forwarding_falls_back_to_real_ip_then_peer() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("203.0.113.10"));
        let trusted = proxies(&["10.0.0.1"]);

        let client = client_info(&headers, Some(ip("10.0.0.1")), &trusted);
        assert_eq!(client.ip.as_deref(), Some("203.0.113.10"));

        let client = client_info(&HeaderMap::new(), Some(ip("10.0.0.1")), &trusted);
        assert_eq!(client.ip.as_deref(), Some("10.0.0.1"));
    }

    #[test]
    fn unknown_peer_yields_no_address() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9"));
        let client = client_info(&headers, None, &proxies(&["0.0.0.0/0"]));
        assert!(client.ip.is_none());
    }
}
