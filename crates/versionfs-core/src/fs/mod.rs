//! The plain file store underneath the versioning layer.
//!
//! [`FileSystem`] is the capability set the overlay consumes. [`OsFs`] is the
//! host-directory implementation; [`crate::HiddenFs`] decorates any
//! implementation to hide storage areas.

mod os;

pub use os::OsFs;

use crate::{LogicalPath, SnapshotResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tokio::fs::{File, OpenOptions};

/// Mode for opening a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Read only.
    Read,
    /// Create or truncate, write only.
    Write,
    /// Create if missing, append.
    Append,
    /// Read and write an existing file.
    ReadWrite,
}

impl OpenMode {
    /// Whether handles in this mode can mutate the file.
    pub fn is_write(self) -> bool {
        !matches!(self, OpenMode::Read)
    }

    /// Parse a classic `fopen`-style mode string (`"rb"`, `"w"`, `"a+"`, ...).
    pub fn parse(mode: &str) -> Option<Self> {
        let plus = mode.contains('+');
        match mode.trim_end_matches(['b', 't', '+']) {
            "r" if plus => Some(OpenMode::ReadWrite),
            "r" => Some(OpenMode::Read),
            "w" => Some(OpenMode::Write),
            "a" => Some(OpenMode::Append),
            _ => None,
        }
    }

    pub(crate) fn options(self) -> OpenOptions {
        let mut options = OpenOptions::new();
        match self {
            OpenMode::Read => {
                options.read(true);
            }
            OpenMode::Write => {
                options.write(true).create(true).truncate(true);
            }
            OpenMode::Append => {
                options.append(true).create(true);
            }
            OpenMode::ReadWrite => {
                options.read(true).write(true);
            }
        }
        options
    }
}

/// An entry returned by a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub path: LogicalPath,
    pub is_dir: bool,
}

/// Which entries a walk reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkKind {
    Files,
    Dirs,
}

/// Metadata for a file or directory.
#[derive(Debug, Clone)]
pub struct FileMetadata {
    pub len: u64,
    pub is_dir: bool,
    pub modified: Option<DateTime<Utc>>,
}

/// Primitive operations of the underlying file store.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Open a file.
    async fn open(&self, path: &LogicalPath, mode: OpenMode) -> SnapshotResult<File>;

    /// Remove a file.
    async fn remove(&self, path: &LogicalPath) -> SnapshotResult<()>;

    /// Move a file. Fails if `dst` exists and `overwrite` is false.
    async fn move_file(
        &self,
        src: &LogicalPath,
        dst: &LogicalPath,
        overwrite: bool,
    ) -> SnapshotResult<()>;

    /// Move a directory and everything under it. `dst` must not exist.
    async fn move_dir(&self, src: &LogicalPath, dst: &LogicalPath) -> SnapshotResult<()>;

    /// Create a directory.
    async fn make_dir(&self, path: &LogicalPath, recursive: bool) -> SnapshotResult<()>;

    /// Remove a directory; `recursive` removes its contents too.
    async fn remove_dir(&self, path: &LogicalPath, recursive: bool) -> SnapshotResult<()>;

    async fn exists(&self, path: &LogicalPath) -> bool;

    async fn is_dir(&self, path: &LogicalPath) -> bool;

    async fn is_file(&self, path: &LogicalPath) -> bool;

    /// True if the directory has no entries at all.
    async fn is_dir_empty(&self, path: &LogicalPath) -> SnapshotResult<bool>;

    /// Entries directly under `path`, sorted by name.
    async fn list_dir(&self, path: &LogicalPath) -> SnapshotResult<Vec<DirEntry>>;

    /// Every entry of `kind` under `root` (excluding `root`), recursively,
    /// sorted. Subtrees at or under a `skip` prefix are not entered.
    async fn walk(
        &self,
        root: &LogicalPath,
        kind: WalkKind,
        skip: &[LogicalPath],
    ) -> SnapshotResult<Vec<LogicalPath>>;

    /// Every file under `root`, recursively, sorted.
    async fn walk_files(&self, root: &LogicalPath) -> SnapshotResult<Vec<LogicalPath>> {
        self.walk(root, WalkKind::Files, &[]).await
    }

    /// Every directory under `root` (excluding `root`), recursively, sorted.
    async fn walk_dirs(&self, root: &LogicalPath) -> SnapshotResult<Vec<LogicalPath>> {
        self.walk(root, WalkKind::Dirs, &[]).await
    }

    async fn metadata(&self, path: &LogicalPath) -> SnapshotResult<FileMetadata>;

    /// Absolute host location of `path`.
    fn sys_path(&self, path: &LogicalPath) -> PathBuf;
}
