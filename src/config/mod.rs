//! Configuration layer: typed settings with layered precedence (defaults → file → env).

use std::num::NonZeroUsize;
use std::path::Path;

use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;


const ENV_PREFIX: &str = "STRATI";

// Capacity and batching defaults
const DEFAULT_MEMORY_CAPACITY: usize = 100;
const DEFAULT_CONSUME_BATCH_LIMIT: usize = 100;

// TTL table (milliseconds). Chat history is deliberately absent: message
// history is immutable once delivered and never expires.
const DEFAULT_PROFILE_TTL_MS: i64 = 5 * 60 * 1000;
const DEFAULT_BLOCKLIST_TTL_MS: i64 = 5 * 60 * 1000;
const DEFAULT_FEED_TTL_MS: i64 = 10 * 60 * 1000;
const DEFAULT_STORIES_TTL_MS: i64 = 30 * 60 * 1000;
const DEFAULT_INBOX_TTL_MS: i64 = 10 * 60 * 1000;
const DEFAULT_NOTIFICATION_TTL_MS: i64 = 60 * 60 * 1000;
const DEFAULT_MEDIA_TTL_MS: i64 = 20 * 60 * 60 * 1000;
const DEFAULT_MEDIA_EXPIRY_BUFFER_MS: i64 = 60 * 60 * 1000;
const DEFAULT_REPOPULATE_TTL_MS: i64 = 60 * 60 * 1000;
const DEFAULT_DAILY_CLEANUP_INTERVAL_MS: i64 = 24 * 60 * 60 * 1000;

// Fetch limits and retained sizes
const DEFAULT_FEED_DELTA_LIMIT: usize = 20;
const DEFAULT_FEED_FULL_LIMIT: usize = 50;
const DEFAULT_FEED_RETAIN: usize = 100;
const DEFAULT_STORIES_LIMIT: usize = 50;
const DEFAULT_NOTIFICATION_DELTA_LIMIT: usize = 20;
const DEFAULT_NOTIFICATION_FULL_LIMIT: usize = 50;
const DEFAULT_NOTIFICATION_RETAIN: usize = 50;
const DEFAULT_CHAT_PAGE_LIMIT: usize = 100;
const DEFAULT_CHAT_RETAIN: usize = 100;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

/// Root settings for the cache layer.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub cache: CacheSettings,
    pub logging: LoggingSettings,
}

impl Settings {
    /// Load settings with layered precedence: built-in defaults, then an
    /// optional TOML file, then `STRATI_*` environment variables
    /// (`STRATI_CACHE__FEED_TTL_MS=60000`).
    pub fn load(config_file: Option<&Path>) -> Result<Self, SettingsError> {
        let mut builder = Config::builder();
        if let Some(path) = config_file {
            builder = builder.add_source(File::from(path));
        }
        let config = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;
        Ok(config.try_deserialize()?)
    }
}

/// Tunables for the cache tiers and the domain-cache sync protocol.
///
/// The TTL table is part of the crate's external contract: changing a
/// default changes how stale every client is allowed to be.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Maximum entries held by the shared memory tier.
    pub memory_capacity: usize,
    /// TTL applied when a disk hit re-populates the memory tier.
    pub repopulate_ttl_ms: i64,

    /// Profile envelope TTL.
    pub profile_ttl_ms: i64,
    /// Blocked-users list TTL (user metadata).
    pub blocklist_ttl_ms: i64,
    /// Feed envelope TTL.
    pub feed_ttl_ms: i64,
    /// Per-user stories TTL.
    pub stories_ttl_ms: i64,
    /// Inbox envelope TTL.
    pub inbox_ttl_ms: i64,
    /// Notification envelope TTL.
    pub notification_ttl_ms: i64,
    /// Signed media URL TTL.
    pub media_ttl_ms: i64,
    /// Regenerate a signed URL when it expires within this buffer.
    pub media_expiry_buffer_ms: i64,
    /// Minimum interval between disk-tier cleanup sweeps.
    pub daily_cleanup_interval_ms: i64,

    /// Maximum records fetched by a feed delta sync.
    pub feed_delta_limit: usize,
    /// Maximum records fetched by a full feed refresh.
    pub feed_full_limit: usize,
    /// Maximum feed items retained in an envelope.
    pub feed_retain: usize,
    /// Maximum stories fetched per user.
    pub stories_limit: usize,
    /// Maximum records fetched by a notification delta sync.
    pub notification_delta_limit: usize,
    /// Maximum records fetched by a full notification refresh.
    pub notification_full_limit: usize,
    /// Maximum notifications retained in an envelope.
    pub notification_retain: usize,
    /// Messages fetched on a full chat history load.
    pub chat_page_limit: usize,
    /// Messages retained per chat.
    pub chat_retain: usize,

    /// Maximum invalidation events per consumption batch.
    pub consume_batch_limit: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
            repopulate_ttl_ms: DEFAULT_REPOPULATE_TTL_MS,
            profile_ttl_ms: DEFAULT_PROFILE_TTL_MS,
            blocklist_ttl_ms: DEFAULT_BLOCKLIST_TTL_MS,
            feed_ttl_ms: DEFAULT_FEED_TTL_MS,
            stories_ttl_ms: DEFAULT_STORIES_TTL_MS,
            inbox_ttl_ms: DEFAULT_INBOX_TTL_MS,
            notification_ttl_ms: DEFAULT_NOTIFICATION_TTL_MS,
            media_ttl_ms: DEFAULT_MEDIA_TTL_MS,
            media_expiry_buffer_ms: DEFAULT_MEDIA_EXPIRY_BUFFER_MS,
            daily_cleanup_interval_ms: DEFAULT_DAILY_CLEANUP_INTERVAL_MS,
            feed_delta_limit: DEFAULT_FEED_DELTA_LIMIT,
            feed_full_limit: DEFAULT_FEED_FULL_LIMIT,
            feed_retain: DEFAULT_FEED_RETAIN,
            stories_limit: DEFAULT_STORIES_LIMIT,
            notification_delta_limit: DEFAULT_NOTIFICATION_DELTA_LIMIT,
            notification_full_limit: DEFAULT_NOTIFICATION_FULL_LIMIT,
            notification_retain: DEFAULT_NOTIFICATION_RETAIN,
            chat_page_limit: DEFAULT_CHAT_PAGE_LIMIT,
            chat_retain: DEFAULT_CHAT_RETAIN,
            consume_batch_limit: DEFAULT_CONSUME_BATCH_LIMIT,
        }
    }
}

impl CacheSettings {
    /// Memory capacity as `NonZeroUsize`, clamping to 1 if zero.
    pub fn memory_capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.memory_capacity).unwrap_or(NonZeroUsize::MIN)
    }
}

/// Log verbosity for the installed subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

/// Output shape for the installed subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: LogLevel,
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
        }
    }
}
