//! Hides storage areas from listings.

use crate::fs::{DirEntry, FileMetadata, FileSystem, OpenMode, WalkKind};
use crate::{LogicalPath, SnapshotResult};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs::File;

/// Options for [`HiddenFs::list_dir_with`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ListOptions {
    /// Include hidden storage entries.
    pub hidden: bool,
}

/// A [`FileSystem`] decorator that hides a set of reserved prefixes.
///
/// Only listing and walking filter. Every other call passes through
/// unchanged; rejecting hidden paths is up to the caller.
#[derive(Debug, Clone)]
pub struct HiddenFs<F> {
    inner: F,
    hidden: Vec<LogicalPath>,
}

impl<F: FileSystem> HiddenFs<F> {
    pub fn new(inner: F, hidden: Vec<LogicalPath>) -> Self {
        Self { inner, hidden }
    }

    pub fn inner(&self) -> &F {
        &self.inner
    }

    pub fn hidden(&self) -> &[LogicalPath] {
        &self.hidden
    }

    /// True if `path` is a hidden prefix or lies under one.
    pub fn is_hidden(&self, path: &LogicalPath) -> bool {
        self.hidden.iter().any(|prefix| path.starts_with(prefix))
    }

    /// True if `path` is a directory with hidden storage somewhere below it.
    pub fn holds_hidden(&self, path: &LogicalPath) -> bool {
        self.hidden
            .iter()
            .any(|prefix| prefix != path && prefix.starts_with(path))
    }

    /// List a directory, optionally including hidden entries.
    pub async fn list_dir_with(
        &self,
        path: &LogicalPath,
        options: ListOptions,
    ) -> SnapshotResult<Vec<DirEntry>> {
        let entries = self.inner.list_dir(path).await?;
        if options.hidden {
            return Ok(entries);
        }
        Ok(entries
            .into_iter()
            .filter(|entry| !self.is_hidden(&entry.path))
            .collect())
    }
}

#[async_trait]
impl<F: FileSystem> FileSystem for HiddenFs<F> {
    async fn open(&self, path: &LogicalPath, mode: OpenMode) -> SnapshotResult<File> {
        self.inner.open(path, mode).await
    }

    async fn remove(&self, path: &LogicalPath) -> SnapshotResult<()> {
        self.inner.remove(path).await
    }

    async fn move_file(
        &self,
        src: &LogicalPath,
        dst: &LogicalPath,
        overwrite: bool,
    ) -> SnapshotResult<()> {
        self.inner.move_file(src, dst, overwrite).await
    }

    async fn move_dir(&self, src: &LogicalPath, dst: &LogicalPath) -> SnapshotResult<()> {
        self.inner.move_dir(src, dst).await
    }

    async fn make_dir(&self, path: &LogicalPath, recursive: bool) -> SnapshotResult<()> {
        self.inner.make_dir(path, recursive).await
    }

    async fn remove_dir(&self, path: &LogicalPath, recursive: bool) -> SnapshotResult<()> {
        self.inner.remove_dir(path, recursive).await
    }

    async fn exists(&self, path: &LogicalPath) -> bool {
        self.inner.exists(path).await
    }

    async fn is_dir(&self, path: &LogicalPath) -> bool {
        self.inner.is_dir(path).await
    }

    async fn is_file(&self, path: &LogicalPath) -> bool {
        self.inner.is_file(path).await
    }

    // Hidden entries count: a directory holding only storage is not empty.
    async fn is_dir_empty(&self, path: &LogicalPath) -> SnapshotResult<bool> {
        self.inner.is_dir_empty(path).await
    }

    async fn list_dir(&self, path: &LogicalPath) -> SnapshotResult<Vec<DirEntry>> {
        self.list_dir_with(path, ListOptions::default()).await
    }

    async fn walk(
        &self,
        root: &LogicalPath,
        kind: WalkKind,
        skip: &[LogicalPath],
    ) -> SnapshotResult<Vec<LogicalPath>> {
        let mut skip = skip.to_vec();
        skip.extend(self.hidden.iter().cloned());
        self.inner.walk(root, kind, &skip).await
    }

    async fn metadata(&self, path: &LogicalPath) -> SnapshotResult<FileMetadata> {
        self.inner.metadata(path).await
    }

    fn sys_path(&self, path: &LogicalPath) -> PathBuf {
        self.inner.sys_path(path)
    }
}
