//! Identity persistence across runs.
//!
//! Entries expire after a retention window (a week by default); expiry only
//! happens here, never inside the deduplicator.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::error::Result;

pub const DEFAULT_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

pub trait IdentityStore: Send + Sync {
    fn exists(&self, key: &str) -> bool;

    fn set(&self, key: &str, ttl: Duration);

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

type Expiries = HashMap<String, DateTime<Utc>>;

fn expiry_after(ttl: Duration) -> DateTime<Utc> {
    let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
    Utc::now().checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn live(entries: &Expiries, key: &str) -> bool {
    entries.get(key).is_some_and(|expires| *expires > Utc::now())
}

/// Keeps identities only for the life of the process.
#[derive(Default)]
pub struct MemoryIdentityStore {
    entries: Mutex<Expiries>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn exists(&self, key: &str) -> bool {
        self.entries
            .lock()
            .map(|entries| live(&entries, key))
            .unwrap_or(false)
    }

    fn set(&self, key: &str, ttl: Duration) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), expiry_after(ttl));
        }
    }
}

/// JSON file of `identity -> expiry` pairs, rewritten on flush.
pub struct FileIdentityStore {
    path: PathBuf,
    entries: Mutex<Expiries>,
}

impl FileIdentityStore {
    /// Loads the file if present and drops expired entries.
    /// A corrupt file is logged and treated as empty.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let mut entries: Expiries = if path.exists() {
            let content = fs::read_to_string(&path)?;
            serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!("⚠️  Ignoring unreadable seen-store {:?}: {}", path, e);
                Expiries::new()
            })
        } else {
            Expiries::new()
        };

        let before = entries.len();
        let now = Utc::now();
        entries.retain(|_, expires| *expires > now);
        info!(
            "📂 Seen-store {:?}: {} live identities ({} expired)",
            path,
            entries.len(),
            before - entries.len()
        );

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl IdentityStore for FileIdentityStore {
    fn exists(&self, key: &str) -> bool {
        self.entries
            .lock()
            .map(|entries| live(&entries, key))
            .unwrap_or(false)
    }

    fn set(&self, key: &str, ttl: Duration) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), expiry_after(ttl));
        }
    }

    fn flush(&self) -> Result<()> {
        let json = {
            let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            serde_json::to_string_pretty(&*entries)?
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_memory_store_set_then_exists() {
        let store = MemoryIdentityStore::new();
        assert!(!store.exists("acme::intern"));
        store.set("acme::intern", DEFAULT_TTL);
        assert!(store.exists("acme::intern"));
    }

    #[test]
    fn test_zero_ttl_is_never_live() {
        let store = MemoryIdentityStore::new();
        store.set("acme::intern", Duration::ZERO);
        assert!(!store.exists("acme::intern"));
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state").join("seen.json");

        let store = FileIdentityStore::open(&path).unwrap();
        store.set("acme::junior_engineer", DEFAULT_TTL);
        store.flush().unwrap();

        let reopened = FileIdentityStore::open(&path).unwrap();
        assert!(reopened.exists("acme::junior_engineer"));
        assert_eq!(reopened.len(), 1);
    }

    #[test]
    fn test_file_store_evicts_expired_on_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("seen.json");
        let past = Utc::now() - chrono::Duration::days(8);
        let future = Utc::now() + chrono::Duration::days(1);
        let content = serde_json::json!({
            "old::entry": past,
            "fresh::entry": future,
        });
        fs::write(&path, content.to_string()).unwrap();

        let store = FileIdentityStore::open(&path).unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.exists("fresh::entry"));
        assert!(!store.exists("old::entry"));
    }

    #[test]
    fn test_corrupt_file_treated_as_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("seen.json");
        fs::write(&path, "not json").unwrap();

        let store = FileIdentityStore::open(&path).unwrap();
        assert!(store.is_empty());
    }
}
