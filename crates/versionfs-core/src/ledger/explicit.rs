use super::{CounterStore, VersionLedger, VersionRecord};
use crate::address::PathAddressing;
use crate::config::LedgerKind;
use crate::{LogicalPath, SnapshotError, SnapshotResult};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Version numbers kept as counter records next to the history.
///
/// A crash between a backup and the counter update leaves the counter one
/// behind; [`VersionLedger::reconcile`] repairs it from the tool's count.
#[derive(Clone)]
pub struct ExplicitLedger {
    addressing: PathAddressing,
    store: Arc<dyn CounterStore>,
}

impl ExplicitLedger {
    pub fn new(addressing: PathAddressing, store: Arc<dyn CounterStore>) -> Self {
        Self { addressing, store }
    }

    fn key(&self, path: &LogicalPath) -> String {
        self.addressing.scratch_key(path)
    }
}

#[async_trait]
impl VersionLedger for ExplicitLedger {
    fn kind(&self) -> LedgerKind {
        LedgerKind::Explicit
    }

    async fn has_snapshot(&self, path: &LogicalPath) -> SnapshotResult<bool> {
        Ok(self.store.read(&self.key(path)).await?.is_some())
    }

    async fn version(&self, path: &LogicalPath) -> SnapshotResult<u64> {
        match self.store.read(&self.key(path)).await? {
            Some(record) if record.version > 0 => Ok(record.version),
            _ => Err(SnapshotError::no_snapshot_info(path.to_string())),
        }
    }

    async fn set_version(&self, path: &LogicalPath, version: u64) -> SnapshotResult<()> {
        debug!(path = %path, version, "Recording version");
        let record = VersionRecord {
            version,
            path: path.as_str().to_string(),
        };
        self.store.write(&self.key(path), &record).await
    }

    async fn remove(&self, path: &LogicalPath) -> SnapshotResult<()> {
        self.store.remove(&self.key(path)).await
    }
}
