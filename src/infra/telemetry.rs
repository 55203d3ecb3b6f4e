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
            "folio_sync_upsert_total",
            Unit::Count,
            "Total number of post rows written by incremental sync."
        );
        describe_counter!(
            "folio_sync_delete_total",
            Unit::Count,
            "Total number of post rows removed by incremental sync."
        );
        describe_counter!(
            "folio_sync_full_resync_total",
            Unit::Count,
            "Total number of completed full resyncs."
        );
        describe_counter!(
            "folio_webhook_rejected_total",
            Unit::Count,
            "Total number of webhook deliveries rejected before sync."
        );
        describe_counter!(
            "folio_post_cache_hit_total",
            Unit::Count,
            "Total number of read-path post cache hits."
        );
        describe_counter!(
            "folio_post_cache_miss_total",
            Unit::Count,
            "Total number of read-path post cache misses."
        );
    });
}
