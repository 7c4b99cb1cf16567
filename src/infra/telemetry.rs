use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use tracing::level_filters::LevelFilter;
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
        .with_default_directive(LevelFilter::from(logging.level).into())
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
            "strati_cache_memory_hit_total",
            Unit::Count,
            "Total number of memory-tier cache hits."
        );
        describe_counter!(
            "strati_cache_memory_miss_total",
            Unit::Count,
            "Total number of memory-tier cache misses."
        );
        describe_counter!(
            "strati_cache_memory_evict_total",
            Unit::Count,
            "Total number of memory-tier evictions due to capacity."
        );
        describe_counter!(
            "strati_cache_disk_hit_total",
            Unit::Count,
            "Total number of disk-tier cache hits."
        );
        describe_counter!(
            "strati_cache_disk_miss_total",
            Unit::Count,
            "Total number of disk-tier cache misses."
        );
        describe_counter!(
            "strati_cache_disk_expired_total",
            Unit::Count,
            "Total number of disk-tier entries dropped by lazy expiry."
        );
        describe_gauge!(
            "strati_cache_event_queue_len",
            Unit::Count,
            "Current number of pending invalidation events in the queue."
        );
        describe_histogram!(
            "strati_cache_consume_ms",
            Unit::Milliseconds,
            "Invalidation consumption latency in milliseconds."
        );
    });
}
