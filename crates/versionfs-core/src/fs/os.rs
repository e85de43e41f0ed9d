//! Host-directory file store.

use super::{DirEntry, FileMetadata, FileSystem, OpenMode, WalkKind};
use crate::{LogicalPath, SnapshotError, SnapshotResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tracing::debug;
use walkdir::WalkDir;

/// A [`FileSystem`] rooted at a directory on the host.
#[derive(Debug, Clone)]
pub struct OsFs {
    root: PathBuf,
}

impl OsFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn host(&self, path: &LogicalPath) -> PathBuf {
        path.to_host_path(&self.root)
    }
}

fn is_skipped(path: &Path, base: &Path, skip: &[LogicalPath]) -> bool {
    !skip.is_empty()
        && LogicalPath::from_host_path(path, base)
            .map(|logical| skip.iter().any(|prefix| logical.starts_with(prefix)))
            .unwrap_or(false)
}

fn not_found(err: std::io::Error, path: &LogicalPath) -> SnapshotError {
    if err.kind() == ErrorKind::NotFound {
        SnapshotError::file_not_found(path.to_string())
    } else {
        SnapshotError::Io(err)
    }
}

#[async_trait]
impl FileSystem for OsFs {
    async fn open(&self, path: &LogicalPath, mode: OpenMode) -> SnapshotResult<File> {
        if path.is_root() {
            return Err(SnapshotError::invalid_path("cannot open the root as a file"));
        }
        let host = self.host(path);
        debug!(path = %path, ?mode, "Opening file");
        mode.options()
            .open(&host)
            .await
            .map_err(|e| not_found(e, path))
    }

    async fn remove(&self, path: &LogicalPath) -> SnapshotResult<()> {
        fs::remove_file(self.host(path))
            .await
            .map_err(|e| not_found(e, path))
    }

    async fn move_file(
        &self,
        src: &LogicalPath,
        dst: &LogicalPath,
        overwrite: bool,
    ) -> SnapshotResult<()> {
        let from = self.host(src);
        let to = self.host(dst);
        if !fs::metadata(&from).await.map_err(|e| not_found(e, src))?.is_file() {
            return Err(SnapshotError::operation_failed(format!("{src} is not a file")));
        }
        if !overwrite && fs::try_exists(&to).await? {
            return Err(SnapshotError::operation_failed(format!("{dst} already exists")));
        }
        fs::rename(&from, &to).await?;
        Ok(())
    }

    async fn move_dir(&self, src: &LogicalPath, dst: &LogicalPath) -> SnapshotResult<()> {
        let from = self.host(src);
        let to = self.host(dst);
        if !fs::metadata(&from).await.map_err(|e| not_found(e, src))?.is_dir() {
            return Err(SnapshotError::operation_failed(format!("{src} is not a directory")));
        }
        if fs::try_exists(&to).await? {
            return Err(SnapshotError::operation_failed(format!("{dst} already exists")));
        }
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::rename(&from, &to).await?;
        Ok(())
    }

    async fn make_dir(&self, path: &LogicalPath, recursive: bool) -> SnapshotResult<()> {
        let host = self.host(path);
        if recursive {
            fs::create_dir_all(&host).await?;
        } else {
            fs::create_dir(&host).await?;
        }
        Ok(())
    }

    async fn remove_dir(&self, path: &LogicalPath, recursive: bool) -> SnapshotResult<()> {
        let host = self.host(path);
        let result = if recursive {
            fs::remove_dir_all(&host).await
        } else {
            fs::remove_dir(&host).await
        };
        result.map_err(|e| not_found(e, path))
    }

    async fn exists(&self, path: &LogicalPath) -> bool {
        fs::try_exists(self.host(path)).await.unwrap_or(false)
    }

    async fn is_dir(&self, path: &LogicalPath) -> bool {
        fs::metadata(self.host(path))
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    async fn is_file(&self, path: &LogicalPath) -> bool {
        fs::metadata(self.host(path))
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }

    async fn is_dir_empty(&self, path: &LogicalPath) -> SnapshotResult<bool> {
        let mut entries = fs::read_dir(self.host(path))
            .await
            .map_err(|e| not_found(e, path))?;
        Ok(entries.next_entry().await?.is_none())
    }

    async fn list_dir(&self, path: &LogicalPath) -> SnapshotResult<Vec<DirEntry>> {
        let mut entries = Vec::new();
        let mut dir = fs::read_dir(self.host(path))
            .await
            .map_err(|e| not_found(e, path))?;

        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                debug!(entry = ?entry.path(), "Skipping non UTF-8 entry");
                continue;
            };
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            entries.push(DirEntry {
                path: path.join(name)?,
                is_dir,
            });
        }

        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    async fn walk(
        &self,
        root: &LogicalPath,
        kind: WalkKind,
        skip: &[LogicalPath],
    ) -> SnapshotResult<Vec<LogicalPath>> {
        let base = self.root.clone();
        let start = self.host(root);
        if !fs::try_exists(&start).await? {
            return Err(SnapshotError::file_not_found(root.to_string()));
        }
        let skip = skip.to_vec();

        tokio::task::spawn_blocking(move || -> SnapshotResult<Vec<LogicalPath>> {
            let mut found = Vec::new();
            let entries = WalkDir::new(&start)
                .min_depth(1)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|entry| !is_skipped(entry.path(), &base, &skip));
            for entry in entries {
                let entry = entry.map_err(|e| {
                    SnapshotError::Io(
                        e.into_io_error()
                            .unwrap_or_else(|| std::io::Error::other("filesystem loop")),
                    )
                })?;
                let wanted = match kind {
                    WalkKind::Files => entry.file_type().is_file(),
                    WalkKind::Dirs => entry.file_type().is_dir(),
                };
                if wanted {
                    found.push(LogicalPath::from_host_path(entry.path(), &base)?);
                }
            }
            Ok(found)
        })
        .await
        .map_err(|e| SnapshotError::operation_failed(format!("walk task failed: {e}")))?
    }

    async fn metadata(&self, path: &LogicalPath) -> SnapshotResult<FileMetadata> {
        let meta = fs::metadata(self.host(path))
            .await
            .map_err(|e| not_found(e, path))?;
        Ok(FileMetadata {
            len: meta.len(),
            is_dir: meta.is_dir(),
            modified: meta.modified().ok().map(DateTime::<Utc>::from),
        })
    }

    fn sys_path(&self, path: &LogicalPath) -> PathBuf {
        self.host(path)
    }
}
