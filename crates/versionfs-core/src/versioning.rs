//! The versioned filesystem facade.

use crate::address::PathAddressing;
use crate::config::{LedgerKind, NumberingPolicy, StorageLayout, VersioningConfig};
use crate::coordinator::{SnapshotCoordinator, SnapshotOutcome};
use crate::filter::{HiddenFs, ListOptions};
use crate::fs::{DirEntry, FileSystem, OpenMode, OsFs};
use crate::handle::VersionedFile;
use crate::history::{HistoryAccess, PruneBoundary, VersionInfo};
use crate::ledger::{
    CounterStore, DerivedLedger, ExplicitLedger, JsonCounterStore, VersionLedger,
};
use crate::tool::{ProcessRunner, RdiffBackup, StderrClassifier, ToolRunner};
use crate::{LogicalPath, SnapshotError, SnapshotResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A file in the listing returned by [`VersioningFs::list_files`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListedFile {
    pub path: LogicalPath,
    /// Current version, `None` if never snapshotted.
    pub version: Option<u64>,
    pub modified: Option<DateTime<Utc>>,
    pub size: u64,
}

/// Builder for [`VersioningFs`].
pub struct VersioningFsBuilder<F> {
    root: PathBuf,
    fs: F,
    config: VersioningConfig,
    runner: Option<Arc<dyn ToolRunner>>,
    counter_store: Option<Arc<dyn CounterStore>>,
}

impl<F: FileSystem + 'static> VersioningFsBuilder<F> {
    /// Start from a file store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>, fs: F) -> Self {
        Self {
            root: root.into(),
            fs,
            config: VersioningConfig::default(),
            runner: None,
            counter_store: None,
        }
    }

    pub fn config(mut self, config: VersioningConfig) -> Self {
        self.config = config;
        self
    }

    /// Run the tool through `runner` instead of spawning `config.tool`.
    pub fn with_runner(mut self, runner: Arc<dyn ToolRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    /// Keep explicit ledger records in `store` instead of `ledger_dir`.
    pub fn with_counter_store(mut self, store: Arc<dyn CounterStore>) -> Self {
        self.counter_store = Some(store);
        self
    }

    pub async fn build(self) -> SnapshotResult<VersioningFs<F>> {
        let config = self.config;
        config.validate()?;

        tokio::fs::create_dir_all(&self.root).await?;
        let root = tokio::fs::canonicalize(&self.root).await?;
        let layout = config.layout(&root);
        tokio::fs::create_dir_all(&layout.backup_dir).await?;
        tokio::fs::create_dir_all(&layout.scratch_dir).await?;

        let addressing = PathAddressing::new(&layout.backup_dir);
        let runner = self
            .runner
            .unwrap_or_else(|| Arc::new(ProcessRunner::new(&config.tool)));
        let classifier = StderrClassifier::default().with_benign(config.benign_stderr.clone());
        let tool = RdiffBackup::new(runner, classifier);

        let ledger: Arc<dyn VersionLedger> = match config.ledger {
            LedgerKind::Derived => Arc::new(DerivedLedger::new(addressing.clone(), tool.clone())),
            LedgerKind::Explicit => {
                let store = self
                    .counter_store
                    .unwrap_or_else(|| Arc::new(JsonCounterStore::new(&layout.ledger_dir)));
                Arc::new(ExplicitLedger::new(addressing.clone(), store))
            }
        };
        if config.numbering == NumberingPolicy::Preserve && config.ledger == LedgerKind::Derived {
            warn!("Preserved numbering needs the explicit ledger; versions will be compacted");
        }

        let fs = Arc::new(HiddenFs::new(self.fs, layout.hidden.clone()));
        let coordinator = Arc::new(SnapshotCoordinator::new(
            fs.clone(),
            addressing,
            ledger,
            tool,
            layout.scratch_dir.clone(),
            &config,
        ));
        let history = HistoryAccess::new(coordinator.clone(), config.numbering);

        info!(
            root = %root.display(),
            backups = %layout.backup_dir.display(),
            ledger = ?config.ledger,
            "Versioning filesystem ready"
        );

        Ok(VersioningFs {
            root,
            config,
            layout,
            fs,
            coordinator,
            history,
        })
    }
}

/// A filesystem where every write to a file becomes a recorded version.
pub struct VersioningFs<F = OsFs> {
    root: PathBuf,
    config: VersioningConfig,
    layout: StorageLayout,
    fs: Arc<HiddenFs<F>>,
    coordinator: Arc<SnapshotCoordinator>,
    history: HistoryAccess,
}

impl VersioningFs<OsFs> {
    /// Version the host directory `root`.
    pub async fn new(root: impl Into<PathBuf>, config: VersioningConfig) -> SnapshotResult<Self> {
        Self::builder(root).config(config).build().await
    }

    pub fn builder(root: impl Into<PathBuf>) -> VersioningFsBuilder<OsFs> {
        let root = root.into();
        VersioningFsBuilder::new(root.clone(), OsFs::new(root))
    }
}

impl<F: FileSystem + 'static> VersioningFs<F> {
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &VersioningConfig {
        &self.config
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    /// Normalize `path` and refuse the hidden storage areas.
    fn resolve(&self, path: &str) -> SnapshotResult<LogicalPath> {
        let path = LogicalPath::new(path)?;
        if self.fs.is_hidden(&path) {
            return Err(SnapshotError::invalid_path(format!("{path} is reserved")));
        }
        Ok(path)
    }

    fn refuse_storage_holder(&self, dir: &LogicalPath) -> SnapshotResult<()> {
        if self.fs.holds_hidden(dir) {
            return Err(SnapshotError::operation_failed(format!(
                "{dir} holds versioning storage"
            )));
        }
        Ok(())
    }

    fn resolve_file(&self, path: &str) -> SnapshotResult<LogicalPath> {
        let path = self.resolve(path)?;
        if path.is_root() {
            return Err(SnapshotError::invalid_path("the root is not a file"));
        }
        Ok(path)
    }

    /// Open a file. Write-mode handles snapshot on close.
    pub async fn open(&self, path: &str, mode: OpenMode) -> SnapshotResult<VersionedFile> {
        self.open_with(path, mode, true).await
    }

    /// Open a file, choosing whether closing a written handle snapshots it.
    pub async fn open_with(
        &self,
        path: &str,
        mode: OpenMode,
        take_snapshot: bool,
    ) -> SnapshotResult<VersionedFile> {
        let path = self.resolve_file(path)?;
        let file = self.fs.open(&path, mode).await?;
        Ok(VersionedFile::new(
            file,
            path,
            mode,
            self.coordinator.clone(),
            take_snapshot && mode.is_write(),
        ))
    }

    /// Open a read-only handle on a recorded version.
    pub async fn open_version(&self, path: &str, version: u64) -> SnapshotResult<VersionedFile> {
        let path = self.resolve_file(path)?;
        self.history.open_version(&path, version).await
    }

    /// Current version. Fails with `NoSnapshotInfo` if never snapshotted.
    pub async fn version(&self, path: &str) -> SnapshotResult<u64> {
        let path = self.resolve_file(path)?;
        self.coordinator.ledger().version(&path).await
    }

    pub async fn has_snapshot(&self, path: &str) -> SnapshotResult<bool> {
        let path = self.resolve_file(path)?;
        self.coordinator.ledger().has_snapshot(&path).await
    }

    pub async fn list_versions(&self, path: &str) -> SnapshotResult<Vec<VersionInfo>> {
        let path = self.resolve_file(path)?;
        self.history.list_versions(&path).await
    }

    /// Drop versions older than `boundary`. Returns how many remain.
    pub async fn remove_versions_before(
        &self,
        path: &str,
        boundary: PruneBoundary,
    ) -> SnapshotResult<u64> {
        let path = self.resolve_file(path)?;
        self.history.remove_versions_before(&path, boundary).await
    }

    /// Snapshot `path` now, without going through a handle.
    pub async fn snapshot(&self, path: &str) -> SnapshotResult<SnapshotOutcome> {
        let path = self.resolve_file(path)?;
        self.coordinator.snapshot(&path).await
    }

    /// Align the version counter of `path` with the increments on disk.
    pub async fn reconcile(&self, path: &str) -> SnapshotResult<u64> {
        let path = self.resolve_file(path)?;
        let count = self.history.increments(&path).await?.len() as u64;
        self.coordinator.ledger().reconcile(&path, count).await
    }

    /// Remove a file, then its history.
    pub async fn remove(&self, path: &str) -> SnapshotResult<()> {
        let path = self.resolve_file(path)?;
        if !self.fs.is_file(&path).await {
            if self.fs.is_dir(&path).await {
                return Err(SnapshotError::operation_failed(format!("{path} is a directory")));
            }
            return Err(SnapshotError::file_not_found(path.to_string()));
        }

        self.fs.remove(&path).await?;
        if let Err(e) = self.coordinator.delete_history(&path).await {
            warn!(path = %path, error = %e, "File removed but its history was not");
            return Err(e);
        }
        debug!(path = %path, "Removed file and history");
        Ok(())
    }

    /// Remove a directory and the history of every file under it.
    pub async fn remove_dir(&self, path: &str, recursive: bool) -> SnapshotResult<()> {
        let path = self.resolve(path)?;
        if path.is_root() {
            return Err(SnapshotError::invalid_path("refusing to remove the root"));
        }
        if !self.fs.is_dir(&path).await {
            return Err(SnapshotError::file_not_found(path.to_string()));
        }
        self.refuse_storage_holder(&path)?;

        let files = if recursive {
            self.fs.walk_files(&path).await?
        } else {
            Vec::new()
        };
        self.fs.remove_dir(&path, recursive).await?;

        let mut first_error = None;
        for file in &files {
            if let Err(e) = self.coordinator.delete_history(file).await {
                warn!(path = %file, error = %e, "File removed but its history was not");
                first_error.get_or_insert(e);
            }
        }
        debug!(path = %path, files = files.len(), "Removed directory");
        first_error.map_or(Ok(()), Err)
    }

    /// Move a file; its history follows it and replaces any at `dst`.
    pub async fn move_file(&self, src: &str, dst: &str, overwrite: bool) -> SnapshotResult<()> {
        let src = self.resolve_file(src)?;
        let dst = self.resolve_file(dst)?;
        if src == dst {
            return Ok(());
        }
        self.fs.move_file(&src, &dst, overwrite).await?;
        self.coordinator.move_history(&src, &dst).await
    }

    /// Move a directory; the history of every file under it follows.
    pub async fn move_dir(&self, src: &str, dst: &str) -> SnapshotResult<()> {
        let src = self.resolve(src)?;
        let dst = self.resolve(dst)?;
        if src.is_root() || dst.starts_with(&src) {
            return Err(SnapshotError::invalid_path(format!(
                "cannot move {src} into {dst}"
            )));
        }
        self.refuse_storage_holder(&src)?;

        let files = self.fs.walk_files(&src).await?;
        self.fs.move_dir(&src, &dst).await?;

        let mut first_error = None;
        for file in &files {
            let Some(moved) = file.rebase(&src, &dst) else {
                continue;
            };
            if let Err(e) = self.coordinator.move_history(file, &moved).await {
                warn!(src = %file, dst = %moved, error = %e, "File moved but its history was not");
                first_error.get_or_insert(e);
            }
        }
        debug!(src = %src, dst = %dst, files = files.len(), "Moved directory");
        first_error.map_or(Ok(()), Err)
    }

    /// Move a file or directory. Never overwrites.
    pub async fn rename(&self, src: &str, dst: &str) -> SnapshotResult<()> {
        let resolved = self.resolve(src)?;
        if self.fs.is_dir(&resolved).await {
            self.move_dir(src, dst).await
        } else {
            self.move_file(src, dst, false).await
        }
    }

    pub async fn make_dir(&self, path: &str, recursive: bool) -> SnapshotResult<()> {
        let path = self.resolve(path)?;
        self.fs.make_dir(&path, recursive).await
    }

    pub async fn exists(&self, path: &str) -> SnapshotResult<bool> {
        let path = self.resolve(path)?;
        Ok(self.fs.exists(&path).await)
    }

    pub async fn is_dir(&self, path: &str) -> SnapshotResult<bool> {
        let path = self.resolve(path)?;
        Ok(self.fs.is_dir(&path).await)
    }

    pub async fn is_file(&self, path: &str) -> SnapshotResult<bool> {
        let path = self.resolve(path)?;
        Ok(self.fs.is_file(&path).await)
    }

    pub async fn is_dir_empty(&self, path: &str) -> SnapshotResult<bool> {
        let path = self.resolve(path)?;
        self.fs.is_dir_empty(&path).await
    }

    pub async fn list_dir(&self, path: &str, options: ListOptions) -> SnapshotResult<Vec<DirEntry>> {
        let path = self.resolve(path)?;
        self.fs.list_dir_with(&path, options).await
    }

    pub async fn walk_files(&self, path: &str) -> SnapshotResult<Vec<LogicalPath>> {
        let path = self.resolve(path)?;
        self.fs.walk_files(&path).await
    }

    pub async fn walk_dirs(&self, path: &str) -> SnapshotResult<Vec<LogicalPath>> {
        let path = self.resolve(path)?;
        self.fs.walk_dirs(&path).await
    }

    /// Every visible file with its current version.
    pub async fn list_files(&self) -> SnapshotResult<Vec<ListedFile>> {
        let mut listed = Vec::new();
        for path in self.fs.walk_files(&LogicalPath::root()).await? {
            let metadata = self.fs.metadata(&path).await?;
            let version = match self.coordinator.ledger().version(&path).await {
                Ok(version) => Some(version),
                Err(e) if e.is_no_snapshot_info() => None,
                Err(e) => return Err(e),
            };
            listed.push(ListedFile {
                path,
                version,
                modified: metadata.modified,
                size: metadata.len,
            });
        }
        Ok(listed)
    }
}
