//! Deterministic addressing of snapshot storage.
//!
//! Every logical path owns one snapshot directory named by the SHA-256 digest
//! of its normalized form. Renames only move that directory; the tool's
//! history inside it is never touched, and path length or odd characters in
//! user names never reach the backup tree.
//!
//! Digest collisions are not detected at runtime.

use crate::LogicalPath;
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};

/// Fixed-length digest of a normalized logical path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SnapshotKey(String);

impl SnapshotKey {
    /// Digest a logical path.
    pub fn of(path: &LogicalPath) -> Self {
        Self(format!("{:x}", Sha256::digest(path.as_str().as_bytes())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SnapshotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Maps logical paths to snapshot directories and scratch keys.
#[derive(Debug, Clone)]
pub struct PathAddressing {
    backup_dir: PathBuf,
}

impl PathAddressing {
    pub fn new(backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            backup_dir: backup_dir.into(),
        }
    }

    /// Directory holding every snapshot directory.
    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    pub fn snapshot_key(&self, path: &LogicalPath) -> SnapshotKey {
        SnapshotKey::of(path)
    }

    /// The tool repository for `path`.
    pub fn snapshot_dir(&self, path: &LogicalPath) -> PathBuf {
        self.backup_dir.join(SnapshotKey::of(path).as_str())
    }

    /// Key for per-path records kept outside the tool repository.
    pub fn scratch_key(&self, path: &LogicalPath) -> String {
        SnapshotKey::of(path).0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lp(s: &str) -> LogicalPath {
        LogicalPath::new(s).unwrap()
    }

    #[test]
    fn key_is_sha256_hex() {
        let key = SnapshotKey::of(&lp("/abc"));
        assert_eq!(key.as_str().len(), 64);
        assert_eq!(
            key.as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn equivalent_paths_share_a_directory() {
        let addressing = PathAddressing::new("/backups");
        assert_eq!(
            addressing.snapshot_dir(&lp("/a/./b.txt")),
            addressing.snapshot_dir(&lp("a/b.txt"))
        );
    }

    #[test]
    fn distinct_paths_get_distinct_keys() {
        let addressing = PathAddressing::new("/backups");
        assert_ne!(
            addressing.snapshot_key(&lp("a/b.txt")),
            addressing.snapshot_key(&lp("a/c.txt"))
        );
        assert_ne!(
            addressing.scratch_key(&lp("upper.txt")),
            addressing.scratch_key(&lp("UPPER.txt"))
        );
    }

    #[test]
    fn snapshot_dir_lives_under_backup_dir() {
        let addressing = PathAddressing::new("/backups");
        let dir = addressing.snapshot_dir(&lp("deep/nested/file.bin"));
        assert_eq!(dir.parent(), Some(Path::new("/backups")));
        assert_eq!(
            dir.file_name().and_then(|n| n.to_str()),
            Some(addressing.scratch_key(&lp("deep/nested/file.bin")).as_str())
        );
    }

    #[test]
    fn key_is_stable() {
        let first = SnapshotKey::of(&lp("stable/path"));
        let second = SnapshotKey::of(&lp("stable/path"));
        assert_eq!(first, second);
    }
}
