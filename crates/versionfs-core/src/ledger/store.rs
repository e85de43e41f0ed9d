//! Persistence for explicit version counters.

use crate::{SnapshotError, SnapshotResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::debug;

/// Counter record for one logical path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub version: u64,
    /// The logical path, kept for inspection only; records are keyed by digest.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
}

/// Key-value store of counter records.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Read a record. `None` if absent.
    async fn read(&self, key: &str) -> SnapshotResult<Option<VersionRecord>>;

    /// Write a record, replacing any previous one.
    async fn write(&self, key: &str, record: &VersionRecord) -> SnapshotResult<()>;

    /// Remove a record. Absent keys are not an error.
    async fn remove(&self, key: &str) -> SnapshotResult<()>;
}

/// One `<key>.json` file per record.
#[derive(Debug, Clone)]
pub struct JsonCounterStore {
    base_path: PathBuf,
}

impl JsonCounterStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn key_to_path(&self, key: &str) -> SnapshotResult<PathBuf> {
        if key.is_empty()
            || key.contains('/')
            || key.contains('\\')
            || key == "."
            || key == ".."
        {
            return Err(SnapshotError::invalid_path(format!(
                "invalid ledger key: {key}"
            )));
        }
        Ok(self.base_path.join(format!("{key}.json")))
    }
}

#[async_trait]
impl CounterStore for JsonCounterStore {
    async fn read(&self, key: &str) -> SnapshotResult<Option<VersionRecord>> {
        let path = self.key_to_path(key)?;
        debug!(path = %path.display(), "Reading version record");

        match fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SnapshotError::Io(e)),
        }
    }

    async fn write(&self, key: &str, record: &VersionRecord) -> SnapshotResult<()> {
        let path = self.key_to_path(key)?;
        debug!(path = %path.display(), version = record.version, "Writing version record");

        fs::create_dir_all(&self.base_path).await?;
        let content = serde_json::to_string_pretty(record)?;

        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, &content).await?;
        fs::rename(&temp_path, &path).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> SnapshotResult<()> {
        let path = self.key_to_path(key)?;
        debug!(path = %path.display(), "Removing version record");

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SnapshotError::Io(e)),
        }
    }
}

/// In-memory records, for tests.
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    records: RwLock<HashMap<String, VersionRecord>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn read(&self, key: &str) -> SnapshotResult<Option<VersionRecord>> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn write(&self, key: &str, record: &VersionRecord) -> SnapshotResult<()> {
        self.records
            .write()
            .await
            .insert(key.to_string(), record.clone());
        Ok(())
    }

    async fn remove(&self, key: &str) -> SnapshotResult<()> {
        self.records.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(version: u64) -> VersionRecord {
        VersionRecord {
            version,
            path: "docs/a.txt".to_string(),
        }
    }

    #[tokio::test]
    async fn json_store_persists_across_instances() {
        let dir = TempDir::new().unwrap();
        JsonCounterStore::new(dir.path().join("ledger"))
            .write("abc123", &record(4))
            .await
            .unwrap();

        let reopened = JsonCounterStore::new(dir.path().join("ledger"));
        assert_eq!(reopened.read("abc123").await.unwrap(), Some(record(4)));
        assert!(dir.path().join("ledger/abc123.json").exists());
        assert!(!dir.path().join("ledger/abc123.json.tmp").exists());
    }

    #[tokio::test]
    async fn json_store_reads_bare_version() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("k.json"), r#"{"version": 9}"#).unwrap();
        let store = JsonCounterStore::new(dir.path());
        assert_eq!(store.read("k").await.unwrap().unwrap().version, 9);
    }

    #[tokio::test]
    async fn json_store_remove_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = JsonCounterStore::new(dir.path());
        store.write("k", &record(1)).await.unwrap();
        store.remove("k").await.unwrap();
        store.remove("k").await.unwrap();
        assert_eq!(store.read("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn json_store_rejects_traversal() {
        let dir = TempDir::new().unwrap();
        let store = JsonCounterStore::new(dir.path());
        assert!(store.read("../escape").await.is_err());
        assert!(store.write("", &record(1)).await.is_err());
    }

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemoryCounterStore::new();
        assert!(store.is_empty().await);
        store.write("k", &record(2)).await.unwrap();
        assert_eq!(store.read("k").await.unwrap(), Some(record(2)));
        assert_eq!(store.len().await, 1);
        store.remove("k").await.unwrap();
        assert!(store.is_empty().await);
    }
}
