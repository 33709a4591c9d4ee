use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "vestry_website_created_total",
            Unit::Count,
            "Total number of websites bootstrapped for tenants."
        );
        describe_counter!(
            "vestry_page_publish_total",
            Unit::Count,
            "Total number of page revisions published."
        );
        describe_counter!(
            "vestry_page_rollback_total",
            Unit::Count,
            "Total number of page rollbacks."
        );
        describe_counter!(
            "vestry_theme_publish_total",
            Unit::Count,
            "Total number of theme revisions published."
        );
        describe_counter!(
            "vestry_template_apply_total",
            Unit::Count,
            "Total number of starter templates applied."
        );
        describe_counter!(
            "vestry_form_submission_total",
            Unit::Count,
            "Total number of accepted public form submissions."
        );
        describe_counter!(
            "vestry_form_quarantined_total",
            Unit::Count,
            "Total number of form submissions quarantined by the spam score."
        );
        describe_counter!(
            "vestry_form_rate_limited_total",
            Unit::Count,
            "Total number of form submissions rejected by the per-client limit."
        );
        describe_counter!(
            "vestry_domain_check_total",
            Unit::Count,
            "Total number of custom-domain DNS checks."
        );
        describe_counter!(
            "vestry_public_rate_limited_total",
            Unit::Count,
            "Total number of public requests rejected by the per-client rate limiter."
        );
        describe_histogram!(
            "vestry_http_request_ms",
            Unit::Milliseconds,
            "HTTP request latency in milliseconds."
        );
    });
}
