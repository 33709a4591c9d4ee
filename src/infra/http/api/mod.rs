pub mod error;
pub mod handlers;
pub mod middleware;
pub mod state;

pub use state::ApiState;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, patch, post},
};

use crate::infra::http::RouterState;
use crate::infra::http::middleware::log_responses;

pub const API_PREFIX: &str = "/api/v1/website";

pub fn build_api_router(state: RouterState) -> Router<RouterState> {
    let routes = Router::new()
        .route("/", get(handlers::get_website))
        .route("/templates", get(handlers::list_templates))
        .route("/templates/{key}/apply", post(handlers::apply_template))
        .route("/audit", get(handlers::list_audit_logs))
        .route("/preview", post(handlers::create_preview_token))
        .route(
            "/pages",
            get(handlers::list_pages).post(handlers::create_page),
        )
        .route(
            "/pages/{id}",
            get(handlers::get_page).patch(handlers::update_page),
        )
        .route("/pages/{id}/revisions", get(handlers::list_revisions))
        .route("/pages/{id}/draft", post(handlers::save_draft))
        .route("/pages/{id}/publish", post(handlers::publish_page))
        .route("/pages/{id}/rollback", post(handlers::rollback_page))
        .route(
            "/theme",
            get(handlers::get_theme).patch(handlers::update_theme),
        )
        .route("/theme/revisions", get(handlers::list_theme_revisions))
        .route("/seo", get(handlers::get_seo).patch(handlers::update_seo))
        .route(
            "/assets",
            get(handlers::list_assets).post(handlers::create_asset),
        )
        .route(
            "/assets/{id}",
            patch(handlers::update_asset).delete(handlers::delete_asset),
        )
        .route(
            "/forms",
            get(handlers::list_forms).post(handlers::create_form),
        )
        .route("/forms/{id}", patch(handlers::update_form))
        .route("/submissions", get(handlers::list_submissions))
        .route(
            "/submissions/{id}",
            patch(handlers::update_submission_status),
        )
        .route(
            "/domains",
            get(handlers::list_domains).post(handlers::add_domain),
        )
        .route(
            "/domains/health-check",
            post(handlers::health_check_domains),
        )
        .route("/domains/{id}", axum::routing::delete(handlers::delete_domain))
        .route("/domains/{id}/verify", post(handlers::verify_domain))
        .route("/domains/{id}/primary", post(handlers::set_primary_domain))
        .route(
            "/domains/{id}/routing",
            patch(handlers::update_domain_routing),
        )
        .route("/analytics", get(handlers::analytics_summary));

    Router::new()
        .nest(API_PREFIX, routes)
        .with_state(state)
        .layer(axum_middleware::from_fn(middleware::require_tenant))
        .layer(axum_middleware::from_fn(log_responses))
}
