use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::infra::error::InfraError;

use super::PersistentStore;

/// Filesystem-backed store: one JSON file per key under a root directory.
///
/// Cache keys contain characters that are not portable across filesystems
/// (`:` in the namespace separators, `/` in storage object paths), so each
/// key is escaped into a flat file name. The escaping is reversible, which
/// keeps `all_keys` exact.
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, InfraError> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(escape_key(key))
    }
}

#[async_trait]
impl PersistentStore for FsStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>, InfraError> {
        match fs::read_to_string(self.path_for(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), InfraError> {
        // Write-then-rename so a crash never leaves a half-written entry
        // under the real key.
        let target = self.path_for(key);
        // Append rather than set the extension: escaped keys may already
        // carry one (media object paths end in ".jpg" and the like).
        let mut staging = target.clone().into_os_string();
        staging.push(".tmp");
        let staging = PathBuf::from(staging);
        fs::write(&staging, value).await?;
        fs::rename(&staging, &target).await?;
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<(), InfraError> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn all_keys(&self) -> Result<Vec<String>, InfraError> {
        let mut keys = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(".tmp") {
                continue;
            }
            match unescape_key(&name) {
                Some(key) => keys.push(key),
                None => {
                    tracing::warn!(file = %name, "Skipping unrecognized file in store root");
                }
            }
        }
        Ok(keys)
    }

    async fn remove_many(&self, keys: &[String]) -> Result<(), InfraError> {
        for key in keys {
            self.remove_item(key).await?;
        }
        Ok(())
    }
}

/// Escape a cache key into a portable file name.
///
/// Alphanumerics, `.`, `_` and `-` pass through; every other byte becomes
/// `%XX`. `%` itself is escaped so the mapping is bijective.
fn escape_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'.' | b'_' | b'-' => {
                out.push(byte as char);
            }
            _ => {
                out.push('%');
                out.push_str(&format!("{byte:02X}"));
            }
        }
    }
    out
}

fn unescape_key(name: &str) -> Option<String> {
    let mut bytes = Vec::with_capacity(name.len());
    let mut chars = name.bytes();
    while let Some(byte) = chars.next() {
        if byte == b'%' {
            let hi = chars.next()?;
            let lo = chars.next()?;
            let hex = [hi, lo];
            let hex = std::str::from_utf8(&hex).ok()?;
            bytes.push(u8::from_str_radix(hex, 16).ok()?);
        } else {
            bytes.push(byte);
        }
    }
    String::from_utf8(bytes).ok()
}
