//! Logical paths in the user-visible namespace.
//!
//! A [`LogicalPath`] is root-relative and `/`-separated. Normalization drops
//! leading separators, `.` segments and empty segments, and resolves `..`
//! without ever leaving the root. The empty path is the root itself.

use crate::{SnapshotError, SnapshotResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// A normalized, root-relative path identifying a user file or directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LogicalPath(String);

impl LogicalPath {
    /// The root of the namespace.
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Normalize a path.
    ///
    /// Fails with [`SnapshotError::InvalidPath`] if `..` would climb above the
    /// root or the path contains a NUL byte.
    pub fn new(path: &str) -> SnapshotResult<Self> {
        if path.contains('\0') {
            return Err(SnapshotError::invalid_path(format!(
                "'{}' contains a NUL byte",
                path.escape_default()
            )));
        }

        let mut segments: Vec<&str> = Vec::new();
        for segment in path.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    if segments.pop().is_none() {
                        return Err(SnapshotError::invalid_path(format!(
                            "'{path}' escapes the root"
                        )));
                    }
                }
                other => segments.push(other),
            }
        }

        Ok(Self(segments.join("/")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the path's segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// First segment, used to decide visibility.
    pub fn first_segment(&self) -> Option<&str> {
        self.segments().next()
    }

    /// Last segment.
    pub fn file_name(&self) -> Option<&str> {
        self.segments().last()
    }

    /// Parent path; `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(idx) => Some(Self(self.0[..idx].to_string())),
            None => Some(Self::root()),
        }
    }

    /// Append a relative path.
    pub fn join(&self, child: &str) -> SnapshotResult<Self> {
        if self.is_root() {
            Self::new(child)
        } else {
            Self::new(&format!("{}/{}", self.0, child))
        }
    }

    /// True if `self` equals `prefix` or lies under it, on a segment boundary.
    pub fn starts_with(&self, prefix: &LogicalPath) -> bool {
        if prefix.is_root() || self.0 == prefix.0 {
            return true;
        }
        self.0.starts_with(&prefix.0) && self.0.as_bytes().get(prefix.0.len()) == Some(&b'/')
    }

    /// Replace the directory prefix `from` with `to`.
    ///
    /// Returns `None` when `self` is not under `from`.
    pub fn rebase(&self, from: &LogicalPath, to: &LogicalPath) -> Option<Self> {
        if !self.starts_with(from) {
            return None;
        }
        let rest = self.0[from.0.len()..].trim_start_matches('/');
        if rest.is_empty() {
            Some(to.clone())
        } else if to.is_root() {
            Some(Self(rest.to_string()))
        } else {
            Some(Self(format!("{}/{}", to.0, rest)))
        }
    }

    /// Resolve against a directory on the host.
    pub fn to_host_path(&self, root: &Path) -> PathBuf {
        let mut path = root.to_path_buf();
        for segment in self.segments() {
            path.push(segment);
        }
        path
    }

    /// Build a logical path from a host path under `root`.
    pub fn from_host_path(path: &Path, root: &Path) -> SnapshotResult<Self> {
        let relative = path.strip_prefix(root).map_err(|_| {
            SnapshotError::invalid_path(format!(
                "{} is not under {}",
                path.display(),
                root.display()
            ))
        })?;
        let relative = relative.to_str().ok_or_else(|| {
            SnapshotError::invalid_path(format!("{} is not valid UTF-8", relative.display()))
        })?;
        Self::new(relative)
    }
}

impl fmt::Display for LogicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.0)
    }
}

impl FromStr for LogicalPath {
    type Err = SnapshotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for LogicalPath {
    type Error = SnapshotError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<LogicalPath> for String {
    fn from(path: LogicalPath) -> Self {
        path.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_separators_and_dots() {
        let path = LogicalPath::new("/docs//./reports/../notes/todo.txt").unwrap();
        assert_eq!(path.as_str(), "docs/notes/todo.txt");
        assert_eq!(path.to_string(), "/docs/notes/todo.txt");
    }

    #[test]
    fn equivalent_spellings_compare_equal() {
        let a = LogicalPath::new("a/b.txt").unwrap();
        let b = LogicalPath::new("/a/./b.txt").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_escape_above_root() {
        let err = LogicalPath::new("../etc/passwd").unwrap_err();
        assert!(matches!(err, SnapshotError::InvalidPath(_)));
        assert!(LogicalPath::new("a/../../b").is_err());
    }

    #[test]
    fn root_and_parent() {
        let root = LogicalPath::new("/").unwrap();
        assert!(root.is_root());
        assert_eq!(root.parent(), None);

        let file = LogicalPath::new("a/b/c.txt").unwrap();
        assert_eq!(file.parent().unwrap().as_str(), "a/b");
        assert_eq!(file.file_name(), Some("c.txt"));
        assert_eq!(LogicalPath::new("top").unwrap().parent(), Some(LogicalPath::root()));
    }

    #[test]
    fn starts_with_respects_segment_boundaries() {
        let dir = LogicalPath::new("photos").unwrap();
        assert!(LogicalPath::new("photos/cat.jpg").unwrap().starts_with(&dir));
        assert!(!LogicalPath::new("photos2/cat.jpg").unwrap().starts_with(&dir));
        assert!(dir.starts_with(&LogicalPath::root()));
    }

    #[test]
    fn rebase_moves_prefix() {
        let from = LogicalPath::new("old").unwrap();
        let to = LogicalPath::new("new/place").unwrap();
        let file = LogicalPath::new("old/sub/file.txt").unwrap();

        assert_eq!(
            file.rebase(&from, &to).unwrap().as_str(),
            "new/place/sub/file.txt"
        );
        assert_eq!(file.rebase(&to, &from), None);
        assert_eq!(
            file.rebase(&from, &LogicalPath::root()).unwrap().as_str(),
            "sub/file.txt"
        );
    }

    #[test]
    fn host_path_round_trip() {
        let root = Path::new("/srv/files");
        let path = LogicalPath::new("a/b.txt").unwrap();
        let host = path.to_host_path(root);
        assert_eq!(host, PathBuf::from("/srv/files/a/b.txt"));
        assert_eq!(LogicalPath::from_host_path(&host, root).unwrap(), path);
    }

    #[test]
    fn join_normalizes() {
        let dir = LogicalPath::new("a").unwrap();
        assert_eq!(dir.join("./b/c").unwrap().as_str(), "a/b/c");
        assert_eq!(LogicalPath::root().join("x").unwrap().as_str(), "x");
    }
}
