//! Per-path version numbering.
//!
//! Two strategies sit behind [`VersionLedger`]: [`DerivedLedger`] counts the
//! increments rdiff-backup reports, [`ExplicitLedger`] keeps its own counter
//! in a [`CounterStore`].

mod derived;
mod explicit;
mod store;

pub use derived::DerivedLedger;
pub use explicit::ExplicitLedger;
pub use store::{CounterStore, JsonCounterStore, MemoryCounterStore, VersionRecord};

use crate::config::LedgerKind;
use crate::{LogicalPath, SnapshotResult};
use async_trait::async_trait;
use tracing::warn;

/// Tracks the current version number of each path.
#[async_trait]
pub trait VersionLedger: Send + Sync {
    fn kind(&self) -> LedgerKind;

    async fn has_snapshot(&self, path: &LogicalPath) -> SnapshotResult<bool>;

    /// Current version. Fails with `NoSnapshotInfo` if the path has no history.
    async fn version(&self, path: &LogicalPath) -> SnapshotResult<u64>;

    async fn set_version(&self, path: &LogicalPath, version: u64) -> SnapshotResult<()>;

    async fn remove(&self, path: &LogicalPath) -> SnapshotResult<()>;

    /// Record one more version and return it.
    async fn advance(&self, path: &LogicalPath) -> SnapshotResult<u64> {
        let current = match self.version(path).await {
            Ok(version) => version,
            Err(e) if e.is_no_snapshot_info() => 0,
            Err(e) => return Err(e),
        };
        let next = current + 1;
        self.set_version(path, next).await?;
        Ok(next)
    }

    /// Carry the counter of `src` over to `dst`.
    async fn relocate(&self, src: &LogicalPath, dst: &LogicalPath) -> SnapshotResult<()> {
        if self.has_snapshot(src).await? {
            let version = self.version(src).await?;
            self.set_version(dst, version).await?;
            self.remove(src).await?;
        }
        Ok(())
    }

    /// Reset the counter to `count`, the number of increments the tool holds.
    async fn reconcile(&self, path: &LogicalPath, count: u64) -> SnapshotResult<u64> {
        match self.version(path).await {
            Ok(version) if version == count => return Ok(count),
            Ok(version) => {
                warn!(path = %path, recorded = version, actual = count, "Version counter out of step with history");
            }
            Err(e) if e.is_no_snapshot_info() => {}
            Err(e) => return Err(e),
        }
        if count == 0 {
            self.remove(path).await?;
        } else {
            self.set_version(path, count).await?;
        }
        Ok(count)
    }
}
