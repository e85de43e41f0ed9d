//! Turning a file's current content into a new increment.

use crate::address::PathAddressing;
use crate::config::{StagingMode, VersioningConfig};
use crate::fs::FileSystem;
use crate::ledger::VersionLedger;
use crate::scratch::ScratchDir;
use crate::tool::RdiffBackup;
use crate::{LogicalPath, SnapshotError, SnapshotResult};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::{debug, info, warn};

/// Result of a snapshot request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOutcome {
    /// A new increment was recorded.
    Created { version: u64 },
    /// Another snapshot was in flight; nothing happened.
    Skipped,
}

/// Bounded retry used by closing handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

/// Owns every mutation of snapshot history.
///
/// At most one snapshot runs at a time per coordinator. A request arriving
/// while another is in flight returns [`SnapshotOutcome::Skipped`] at once
/// instead of queueing. Deleting, moving and pruning history share the same
/// gate but wait for it.
pub struct SnapshotCoordinator {
    fs: Arc<dyn FileSystem>,
    addressing: PathAddressing,
    ledger: Arc<dyn VersionLedger>,
    tool: RdiffBackup,
    scratch_dir: PathBuf,
    staging: StagingMode,
    clock: Option<AtomicI64>,
    gate: Semaphore,
    retry: RetryPolicy,
}

impl SnapshotCoordinator {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        addressing: PathAddressing,
        ledger: Arc<dyn VersionLedger>,
        tool: RdiffBackup,
        scratch_dir: PathBuf,
        config: &VersioningConfig,
    ) -> Self {
        Self {
            fs,
            addressing,
            ledger,
            tool,
            scratch_dir,
            staging: config.staging,
            clock: config.fixed_clock.map(AtomicI64::new),
            gate: Semaphore::new(1),
            retry: RetryPolicy {
                interval: config.snapshot_interval(),
                max_attempts: config.max_snapshot_attempts,
            },
        }
    }

    pub fn fs(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    pub fn addressing(&self) -> &PathAddressing {
        &self.addressing
    }

    pub fn ledger(&self) -> &Arc<dyn VersionLedger> {
        &self.ledger
    }

    pub fn tool(&self) -> &RdiffBackup {
        &self.tool
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    fn next_time(&self) -> Option<i64> {
        self.clock
            .as_ref()
            .map(|clock| clock.fetch_add(1, Ordering::SeqCst))
    }

    /// Record the current content of `path` as a new version.
    pub async fn snapshot(&self, path: &LogicalPath) -> SnapshotResult<SnapshotOutcome> {
        let Ok(_permit) = self.gate.try_acquire() else {
            debug!(path = %path, "Snapshot already in flight, skipping");
            return Ok(SnapshotOutcome::Skipped);
        };

        if !self.fs.is_file(path).await {
            return Err(SnapshotError::file_not_found(path.to_string()));
        }

        let snapshot_dir = self.addressing.snapshot_dir(path);
        let fresh = !tokio::fs::try_exists(&snapshot_dir).await?;
        if fresh {
            if let Some(parent) = snapshot_dir.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let stage = ScratchDir::create(&self.scratch_dir, "stage").await?;
        self.stage(&self.fs.sys_path(path), &stage.datafile()).await?;

        let current_time = self.next_time();
        debug!(path = %path, dir = %snapshot_dir.display(), ?current_time, "Backing up");
        if let Err(e) = self
            .tool
            .backup(stage.path(), &snapshot_dir, &self.scratch_dir, current_time)
            .await
        {
            if fresh {
                discard_dir(&snapshot_dir).await;
            }
            return Err(e);
        }
        drop(stage);

        let version = self.ledger.advance(path).await?;
        info!(path = %path, version, "Snapshot created");
        Ok(SnapshotOutcome::Created { version })
    }

    async fn stage(&self, source: &Path, target: &Path) -> SnapshotResult<()> {
        if self.staging == StagingMode::HardLink {
            match tokio::fs::hard_link(source, target).await {
                Ok(()) => return Ok(()),
                Err(e) => debug!(error = %e, "Hard link failed, copying instead"),
            }
        }
        tokio::fs::copy(source, target).await?;
        Ok(())
    }

    /// Wait for any in-flight snapshot, then keep new ones out until the
    /// permit is dropped.
    pub async fn hold_history(&self) -> SnapshotResult<SemaphorePermit<'_>> {
        self.gate
            .acquire()
            .await
            .map_err(|_| SnapshotError::operation_failed("snapshot gate closed"))
    }

    /// Remove the history of `path`, if any.
    pub async fn delete_history(&self, path: &LogicalPath) -> SnapshotResult<()> {
        let _permit = self.hold_history().await?;
        self.discard_history(path).await
    }

    /// Make the history of `src` the history of `dst`, replacing what `dst` had.
    pub async fn move_history(&self, src: &LogicalPath, dst: &LogicalPath) -> SnapshotResult<()> {
        if src == dst {
            return Ok(());
        }
        let _permit = self.hold_history().await?;
        self.discard_history(dst).await?;

        let from = self.addressing.snapshot_dir(src);
        if tokio::fs::try_exists(&from).await? {
            let to = self.addressing.snapshot_dir(dst);
            tokio::fs::rename(&from, &to).await?;
            debug!(src = %src, dst = %dst, "History moved");
        }
        self.ledger.relocate(src, dst).await
    }

    // Caller holds the gate.
    async fn discard_history(&self, path: &LogicalPath) -> SnapshotResult<()> {
        let snapshot_dir = self.addressing.snapshot_dir(path);
        match tokio::fs::remove_dir_all(&snapshot_dir).await {
            Ok(()) => debug!(path = %path, "History removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(SnapshotError::Io(e)),
        }
        self.ledger.remove(path).await
    }
}

async fn discard_dir(dir: &Path) {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(dir = %dir.display(), error = %e, "Failed to discard partial history"),
    }
}
