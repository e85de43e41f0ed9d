//! File handles that snapshot on close.

use crate::coordinator::{SnapshotCoordinator, SnapshotOutcome};
use crate::fs::OpenMode;
use crate::scratch::ScratchDir;
use crate::{LogicalPath, SnapshotError, SnapshotResult};
use std::io::{self, SeekFrom};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncSeek, AsyncWrite, AsyncWriteExt, ReadBuf};
use tracing::{debug, warn};

/// An open file in the versioned namespace.
///
/// Reads, writes and seeks go straight to the underlying file. Any successful
/// write marks the handle dirty; [`VersionedFile::close`] then records a new
/// version. Handles for historical versions read a restored copy that is
/// deleted when the handle goes away.
///
/// Dropping a dirty handle without calling `close` loses the snapshot.
pub struct VersionedFile {
    file: Option<File>,
    path: LogicalPath,
    mode: OpenMode,
    coordinator: Arc<SnapshotCoordinator>,
    dirty: bool,
    take_snapshot: bool,
    scratch: Option<ScratchDir>,
    closed: bool,
}

impl VersionedFile {
    pub(crate) fn new(
        file: File,
        path: LogicalPath,
        mode: OpenMode,
        coordinator: Arc<SnapshotCoordinator>,
        take_snapshot: bool,
    ) -> Self {
        Self {
            file: Some(file),
            path,
            mode,
            coordinator,
            dirty: false,
            take_snapshot,
            scratch: None,
            closed: false,
        }
    }

    /// A read-only handle over a restored copy owned by `scratch`.
    pub(crate) fn scratch_backed(
        file: File,
        path: LogicalPath,
        coordinator: Arc<SnapshotCoordinator>,
        scratch: ScratchDir,
    ) -> Self {
        let mut handle = Self::new(file, path, OpenMode::Read, coordinator, false);
        handle.scratch = Some(scratch);
        handle
    }

    pub fn path(&self) -> &LogicalPath {
        &self.path
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_scratch_backed(&self) -> bool {
        self.scratch.is_some()
    }

    /// Flush and release the file, then snapshot it if it was written.
    ///
    /// Returns `None` when no snapshot was due. `Ok(Some(Created))` means the
    /// new version is recorded.
    pub async fn close(mut self) -> SnapshotResult<Option<SnapshotOutcome>> {
        self.closed = true;
        if let Some(mut file) = self.file.take() {
            if self.mode.is_write() {
                file.flush().await?;
                file.sync_all().await?;
            }
        }

        let outcome = if self.dirty && self.take_snapshot {
            Some(self.snapshot_with_retry().await?)
        } else {
            None
        };

        self.scratch.take();
        Ok(outcome)
    }

    async fn snapshot_with_retry(&self) -> SnapshotResult<SnapshotOutcome> {
        let policy = self.coordinator.retry_policy();
        let mut last = String::new();

        for attempt in 1..=policy.max_attempts {
            match self.coordinator.snapshot(&self.path).await {
                Ok(outcome @ SnapshotOutcome::Created { .. }) => return Ok(outcome),
                Ok(SnapshotOutcome::Skipped) => {
                    last = "another snapshot was in flight".to_string();
                }
                Err(SnapshotError::TooSoon(message)) => last = message,
                Err(e) => return Err(e),
            }

            if attempt < policy.max_attempts {
                debug!(path = %self.path, attempt, reason = %last, "Snapshot deferred, retrying");
                tokio::time::sleep(policy.interval).await;
            }
        }

        warn!(path = %self.path, attempts = policy.max_attempts, "Giving up on snapshot");
        Err(SnapshotError::RetriesExhausted {
            path: self.path.to_string(),
            attempts: policy.max_attempts,
            last,
        })
    }
}

fn closed() -> io::Error {
    io::Error::other("file handle already closed")
}

impl AsyncRead for VersionedFile {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut().file.as_mut() {
            Some(file) => Pin::new(file).poll_read(cx, buf),
            None => Poll::Ready(Err(closed())),
        }
    }
}

impl AsyncWrite for VersionedFile {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        if !this.mode.is_write() {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "handle is read-only",
            )));
        }
        let Some(file) = this.file.as_mut() else {
            return Poll::Ready(Err(closed()));
        };
        let result = Pin::new(file).poll_write(cx, buf);
        if let Poll::Ready(Ok(n)) = &result {
            if *n > 0 {
                this.dirty = true;
            }
        }
        result
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut().file.as_mut() {
            Some(file) => Pin::new(file).poll_flush(cx),
            None => Poll::Ready(Ok(())),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut().file.as_mut() {
            Some(file) => Pin::new(file).poll_shutdown(cx),
            None => Poll::Ready(Ok(())),
        }
    }
}

impl AsyncSeek for VersionedFile {
    fn start_seek(self: Pin<&mut Self>, position: SeekFrom) -> io::Result<()> {
        match self.get_mut().file.as_mut() {
            Some(file) => Pin::new(file).start_seek(position),
            None => Err(closed()),
        }
    }

    fn poll_complete(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<u64>> {
        match self.get_mut().file.as_mut() {
            Some(file) => Pin::new(file).poll_complete(cx),
            None => Poll::Ready(Err(closed())),
        }
    }
}

impl Drop for VersionedFile {
    fn drop(&mut self) {
        if !self.closed && self.dirty && self.take_snapshot {
            warn!(path = %self.path, "Written handle dropped without close, no snapshot taken");
        }
    }
}

impl std::fmt::Debug for VersionedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionedFile")
            .field("path", &self.path)
            .field("mode", &self.mode)
            .field("dirty", &self.dirty)
            .field("take_snapshot", &self.take_snapshot)
            .field("scratch", &self.scratch)
            .finish()
    }
}
