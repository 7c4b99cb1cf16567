use serde::{Deserialize, Serialize};

/// Role tag carried on a cached profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileRole {
    Member,
    Moderator,
    Admin,
}

/// What a notification item is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Like,
    Match,
    Message,
    System,
}

/// Where a sync result came from.
///
/// `Cache` means the envelope was served unchanged, `CacheFresh` means a
/// non-empty delta was merged into it, `Fresh` means a full refetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncSource {
    #[serde(rename = "fresh")]
    Fresh,
    #[serde(rename = "cache")]
    Cache,
    #[serde(rename = "cache+fresh")]
    CacheFresh,
}

impl std::fmt::Display for SyncSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            SyncSource::Fresh => "fresh",
            SyncSource::Cache => "cache",
            SyncSource::CacheFresh => "cache+fresh",
        };
        f.write_str(label)
    }
}
