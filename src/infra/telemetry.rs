use std::sync::Once;

use metrics::{Unit, describe_counter};
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
            "bottega_http_requests_total",
            Unit::Count,
            "Total number of HTTP requests handled."
        );
        describe_counter!(
            "bottega_http_error_pages_total",
            Unit::Count,
            "Total number of requests answered with the generic error page."
        );
        describe_counter!(
            "bottega_auth_lookup_failures_total",
            Unit::Count,
            "Total number of user lookups that failed at the store."
        );
        describe_counter!(
            "bottega_csrf_rejections_total",
            Unit::Count,
            "Total number of mutating requests rejected for a missing or invalid CSRF token."
        );
        describe_counter!(
            "bottega_access_log_dropped_total",
            Unit::Count,
            "Total number of access log lines dropped because the writer queue was full."
        );
    });
}
