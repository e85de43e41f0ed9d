//! Private scratch directories for staging and restores.

use std::path::{Path, PathBuf};
use tracing::{trace, warn};
use uuid::Uuid;

/// Name of the single file a staging or restored tree holds.
pub const DATAFILE: &str = "datafile";

/// A uniquely named directory removed when dropped.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    /// Create `<parent>/<prefix>-<uuid>`.
    pub async fn create(parent: &Path, prefix: &str) -> std::io::Result<Self> {
        let path = parent.join(format!("{}-{}", prefix, Uuid::new_v4()));
        tokio::fs::create_dir_all(&path).await?;
        trace!(path = %path.display(), "Created scratch directory");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `<dir>/datafile`.
    pub fn datafile(&self) -> PathBuf {
        self.path.join(DATAFILE)
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => trace!(path = %self.path.display(), "Removed scratch directory"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to remove scratch directory")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn removed_on_drop() {
        let parent = TempDir::new().unwrap();
        let scratch = ScratchDir::create(parent.path(), "stage").await.unwrap();
        std::fs::write(scratch.datafile(), "data").unwrap();

        let path = scratch.path().to_path_buf();
        assert!(path.file_name().unwrap().to_str().unwrap().starts_with("stage-"));
        assert!(path.join(DATAFILE).exists());

        drop(scratch);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn names_are_unique() {
        let parent = TempDir::new().unwrap();
        let a = ScratchDir::create(parent.path(), "restore").await.unwrap();
        let b = ScratchDir::create(parent.path(), "restore").await.unwrap();
        assert_ne!(a.path(), b.path());
    }
}
