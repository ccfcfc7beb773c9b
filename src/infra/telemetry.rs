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
            "shelfrate_cache_hit_total",
            Unit::Count,
            "Book views served from the cache, labelled by key kind."
        );
        describe_counter!(
            "shelfrate_cache_miss_total",
            Unit::Count,
            "Book view lookups that fell through to the database."
        );
        describe_counter!(
            "shelfrate_cache_store_total",
            Unit::Count,
            "Book views written to the cache after a miss."
        );
        describe_counter!(
            "shelfrate_cache_invalidate_total",
            Unit::Count,
            "Cache entries removed after a committed bookmark or rating write."
        );
        describe_counter!(
            "shelfrate_cache_invalidate_failed_total",
            Unit::Count,
            "Cache deletions that failed and were left to expire by ttl."
        );
        describe_counter!(
            "shelfrate_cache_fill_skipped_total",
            Unit::Count,
            "Computed views not cached because a write invalidated them meanwhile."
        );
    });
}
