use super::VersionLedger;
use crate::address::PathAddressing;
use crate::config::LedgerKind;
use crate::tool::RdiffBackup;
use crate::{LogicalPath, SnapshotError, SnapshotResult};
use async_trait::async_trait;

/// Version numbers read back from rdiff-backup's own history.
///
/// Nothing is persisted: the version of a path is the number of increments
/// in its snapshot directory.
#[derive(Debug, Clone)]
pub struct DerivedLedger {
    addressing: PathAddressing,
    tool: RdiffBackup,
}

impl DerivedLedger {
    pub fn new(addressing: PathAddressing, tool: RdiffBackup) -> Self {
        Self { addressing, tool }
    }
}

#[async_trait]
impl VersionLedger for DerivedLedger {
    fn kind(&self) -> LedgerKind {
        LedgerKind::Derived
    }

    async fn has_snapshot(&self, path: &LogicalPath) -> SnapshotResult<bool> {
        Ok(tokio::fs::try_exists(self.addressing.snapshot_dir(path)).await?)
    }

    async fn version(&self, path: &LogicalPath) -> SnapshotResult<u64> {
        if !self.has_snapshot(path).await? {
            return Err(SnapshotError::no_snapshot_info(path.to_string()));
        }
        let increments = self
            .tool
            .increments(&self.addressing.snapshot_dir(path))
            .await?;
        if increments.is_empty() {
            return Err(SnapshotError::no_snapshot_info(path.to_string()));
        }
        Ok(increments.len() as u64)
    }

    async fn set_version(&self, _path: &LogicalPath, _version: u64) -> SnapshotResult<()> {
        Ok(())
    }

    async fn remove(&self, _path: &LogicalPath) -> SnapshotResult<()> {
        Ok(())
    }

    // The tool already counted the new increment.
    async fn advance(&self, path: &LogicalPath) -> SnapshotResult<u64> {
        self.version(path).await
    }

    async fn relocate(&self, _src: &LogicalPath, _dst: &LogicalPath) -> SnapshotResult<()> {
        Ok(())
    }
}
