//! Reading and pruning recorded versions.

use crate::config::{LedgerKind, NumberingPolicy};
use crate::coordinator::SnapshotCoordinator;
use crate::fs::OpenMode;
use crate::handle::VersionedFile;
use crate::scratch::{ScratchDir, DATAFILE};
use crate::tool::{format_tool_time, is_tool_time, Increment, TOOL_TIME_FORMAT};
use crate::{LogicalPath, SnapshotError, SnapshotResult};
use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

/// One recorded version of a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionInfo {
    pub version: u64,
    pub timestamp: DateTime<Utc>,
    /// Size of the increment in bytes, as the tool reports it.
    pub size: u64,
}

/// Where pruning stops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PruneBoundary {
    /// Keep this version and everything newer.
    Version(u64),
    /// Local time in `%Y-%m-%dT%H:%M:%S`; increments older than it go.
    Timestamp(String),
}

impl FromStr for PruneBoundary {
    type Err = SnapshotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
            return s
                .parse::<u64>()
                .map(PruneBoundary::Version)
                .map_err(|_| SnapshotError::invalid_version(format!("{s} is out of range")));
        }
        if is_tool_time(s) {
            return Ok(PruneBoundary::Timestamp(s.to_string()));
        }
        Err(SnapshotError::invalid_version(format!(
            "'{s}' is neither a version number nor a time like {TOOL_TIME_FORMAT}"
        )))
    }
}

impl From<u64> for PruneBoundary {
    fn from(version: u64) -> Self {
        PruneBoundary::Version(version)
    }
}

impl fmt::Display for PruneBoundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PruneBoundary::Version(v) => write!(f, "version {v}"),
            PruneBoundary::Timestamp(t) => f.write_str(t),
        }
    }
}

/// Format a version timestamp the way prune boundaries are written.
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp
        .with_timezone(&Local)
        .format(TOOL_TIME_FORMAT)
        .to_string()
}

/// Read side of the history, plus pruning.
pub struct HistoryAccess {
    coordinator: Arc<SnapshotCoordinator>,
    numbering: NumberingPolicy,
}

impl HistoryAccess {
    pub fn new(coordinator: Arc<SnapshotCoordinator>, numbering: NumberingPolicy) -> Self {
        Self {
            coordinator,
            numbering,
        }
    }

    /// Increments of `path`, oldest first. Empty if it has no history.
    pub async fn increments(&self, path: &LogicalPath) -> SnapshotResult<Vec<Increment>> {
        let dir = self.coordinator.addressing().snapshot_dir(path);
        if !tokio::fs::try_exists(&dir).await? {
            return Ok(Vec::new());
        }
        self.coordinator.tool().increments(&dir).await
    }

    /// Number of the oldest increment minus one.
    ///
    /// Always 0 unless pruned numbers are preserved by an explicit ledger.
    async fn offset(&self, path: &LogicalPath, count: usize) -> SnapshotResult<u64> {
        let ledger = self.coordinator.ledger();
        if self.numbering != NumberingPolicy::Preserve || ledger.kind() != LedgerKind::Explicit {
            return Ok(0);
        }
        match ledger.version(path).await {
            Ok(version) => Ok(version.saturating_sub(count as u64)),
            Err(e) if e.is_no_snapshot_info() => Ok(0),
            Err(e) => Err(e),
        }
    }

    pub async fn list_versions(&self, path: &LogicalPath) -> SnapshotResult<Vec<VersionInfo>> {
        let increments = self.increments(path).await?;
        if increments.is_empty() {
            return Ok(Vec::new());
        }

        let dir = self.coordinator.addressing().snapshot_dir(path);
        let sizes = self.coordinator.tool().increment_sizes(&dir).await?;
        let offset = self.offset(path, increments.len()).await?;

        Ok(increments
            .iter()
            .enumerate()
            .map(|(i, increment)| VersionInfo {
                version: offset + i as u64 + 1,
                timestamp: increment.timestamp(),
                size: sizes.get(i).copied().unwrap_or(0),
            })
            .collect())
    }

    /// Open a read-only handle on `version` of `path`.
    ///
    /// The current version reads the live file; older ones are restored into
    /// scratch space that is deleted with the handle.
    pub async fn open_version(
        &self,
        path: &LogicalPath,
        version: u64,
    ) -> SnapshotResult<VersionedFile> {
        let increments = self.increments(path).await?;
        let offset = self.offset(path, increments.len()).await?;
        let current = offset + increments.len() as u64;
        if increments.is_empty() || version <= offset || version > current {
            return Err(SnapshotError::version_not_found(path.to_string(), version));
        }

        let coordinator = self.coordinator.clone();
        if version == current {
            let file = coordinator.fs().open(path, OpenMode::Read).await?;
            return Ok(VersionedFile::new(
                file,
                path.clone(),
                OpenMode::Read,
                coordinator,
                false,
            ));
        }

        let increment = &increments[(version - offset - 1) as usize];
        let scratch = ScratchDir::create(coordinator.scratch_dir(), "restore").await?;
        let target = scratch.path().join("snapshot");
        debug!(path = %path, version, time = increment.time, "Restoring version");
        coordinator
            .tool()
            .restore_as_of(
                &increment.time.to_string(),
                &coordinator.addressing().snapshot_dir(path),
                &target,
            )
            .await?;

        let file = tokio::fs::File::open(target.join(DATAFILE)).await.map_err(|e| {
            SnapshotError::operation_failed(format!("restored copy of {path} unreadable: {e}"))
        })?;
        Ok(VersionedFile::scratch_backed(
            file,
            path.clone(),
            coordinator,
            scratch,
        ))
    }

    /// Drop every version older than `boundary`. Returns how many remain.
    pub async fn remove_versions_before(
        &self,
        path: &LogicalPath,
        boundary: PruneBoundary,
    ) -> SnapshotResult<u64> {
        let fs = self.coordinator.fs();
        if !fs.exists(path).await {
            return Err(SnapshotError::file_not_found(path.to_string()));
        }
        if !fs.is_file(path).await {
            return Err(SnapshotError::operation_failed(format!("{path} is not a file")));
        }

        let _permit = self.coordinator.hold_history().await?;
        let increments = self.increments(path).await?;
        let timestamp = match &boundary {
            PruneBoundary::Version(version) => {
                let offset = self.offset(path, increments.len()).await?;
                let current = offset + increments.len() as u64;
                if *version <= 1 || *version > current {
                    return Err(SnapshotError::invalid_version(format!(
                        "{version} is outside 2..={current} for {path}"
                    )));
                }
                if *version <= offset {
                    return Err(SnapshotError::invalid_version(format!(
                        "version {version} of {path} was already pruned"
                    )));
                }
                format_tool_time(increments[(*version - offset - 1) as usize].time)?
            }
            PruneBoundary::Timestamp(timestamp) => {
                if increments.is_empty() {
                    return Err(SnapshotError::operation_failed(format!(
                        "{path} has no history to prune"
                    )));
                }
                timestamp.clone()
            }
        };

        let dir = self.coordinator.addressing().snapshot_dir(path);
        self.coordinator
            .tool()
            .remove_older_than(&timestamp, &dir, self.coordinator.scratch_dir())
            .await?;

        let remaining = self.coordinator.tool().increments(&dir).await?.len() as u64;
        if self.numbering == NumberingPolicy::Compact {
            self.coordinator.ledger().set_version(path, remaining).await?;
        }
        info!(path = %path, %boundary, remaining, "Pruned history");
        Ok(remaining)
    }
}
