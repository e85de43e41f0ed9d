//! Versioning configuration.

use crate::{LogicalPath, SnapshotError, SnapshotResult};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Default name of the config file looked up in the root.
pub const CONFIG_FILE_NAME: &str = "versionfs.json";

/// How the current version of a path is tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerKind {
    /// Count the increments rdiff-backup reports.
    #[default]
    Derived,
    /// Keep a counter record per path.
    Explicit,
}

/// What pruning does to version numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberingPolicy {
    /// Remaining increments are renumbered 1..N.
    #[default]
    Compact,
    /// Numbers keep their gaps. Only meaningful with the explicit ledger.
    Preserve,
}

/// How the live file is presented to rdiff-backup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StagingMode {
    #[default]
    Copy,
    /// Hard-link, falling back to a copy across devices.
    HardLink,
}

/// Configuration for a versioning filesystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VersioningConfig {
    /// Snapshot directories. Relative paths are resolved against the root and hidden.
    pub backup_dir: PathBuf,

    /// Staging and restored copies.
    pub scratch_dir: PathBuf,

    /// Explicit ledger records.
    pub ledger_dir: PathBuf,

    /// The rdiff-backup executable.
    pub tool: PathBuf,

    pub ledger: LedgerKind,

    pub numbering: NumberingPolicy,

    pub staging: StagingMode,

    /// Minimum spacing rdiff-backup enforces between backups of one target.
    pub snapshot_interval_ms: u64,

    /// Attempts made by a closing handle before giving up.
    pub max_snapshot_attempts: u32,

    /// Extra stderr prefixes that do not count as failures.
    pub benign_stderr: Vec<String>,

    /// Start of a fake clock passed as `--current-time`, one second per backup.
    /// Only for tests.
    pub fixed_clock: Option<i64>,
}

impl Default for VersioningConfig {
    fn default() -> Self {
        Self {
            backup_dir: PathBuf::from(".versionfs/backups"),
            scratch_dir: PathBuf::from(".versionfs/scratch"),
            ledger_dir: PathBuf::from(".versionfs/ledger"),
            tool: PathBuf::from("rdiff-backup"),
            ledger: LedgerKind::Derived,
            numbering: NumberingPolicy::Compact,
            staging: StagingMode::Copy,
            snapshot_interval_ms: 1000,
            max_snapshot_attempts: 3,
            benign_stderr: Vec::new(),
            fixed_clock: None,
        }
    }
}

/// Storage directories resolved against a root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    pub backup_dir: PathBuf,
    pub scratch_dir: PathBuf,
    pub ledger_dir: PathBuf,
    /// Root-relative prefixes that listings skip and paths may not reach.
    pub hidden: Vec<LogicalPath>,
}

impl VersioningConfig {
    /// Load a config file. Missing keys fall back to defaults.
    pub async fn load(path: &Path) -> SnapshotResult<Self> {
        debug!(path = %path.display(), "Loading versioning config");
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            SnapshotError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `versionfs.json` from `root` if present, otherwise defaults.
    pub async fn discover(root: &Path) -> SnapshotResult<Self> {
        let candidate = root.join(CONFIG_FILE_NAME);
        if tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
            Self::load(&candidate).await
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> SnapshotResult<()> {
        if self.max_snapshot_attempts == 0 {
            return Err(SnapshotError::Config(
                "max_snapshot_attempts must be at least 1".to_string(),
            ));
        }
        for (name, dir) in [
            ("backup_dir", &self.backup_dir),
            ("scratch_dir", &self.scratch_dir),
            ("ledger_dir", &self.ledger_dir),
        ] {
            if dir.as_os_str().is_empty() {
                return Err(SnapshotError::Config(format!("{name} must not be empty")));
            }
            if dir.components().all(|c| matches!(c, Component::CurDir)) {
                return Err(SnapshotError::Config(format!(
                    "{name} must not be the root itself"
                )));
            }
            if dir.components().any(|c| matches!(c, Component::ParentDir)) {
                return Err(SnapshotError::Config(format!(
                    "{name} must not contain '..': {}",
                    dir.display()
                )));
            }
        }
        Ok(())
    }

    pub fn snapshot_interval(&self) -> Duration {
        Duration::from_millis(self.snapshot_interval_ms)
    }

    /// Resolve storage directories against `root`.
    ///
    /// A storage directory inside the root is reserved up to its first
    /// dot-directory (`.versionfs/backups` reserves `.versionfs`), or as a
    /// whole when it has none. The config file name is always reserved.
    pub fn layout(&self, root: &Path) -> StorageLayout {
        let resolve = |dir: &Path| -> PathBuf {
            if dir.is_absolute() {
                dir.to_path_buf()
            } else {
                root.join(dir)
            }
        };
        let backup_dir = resolve(&self.backup_dir);
        let scratch_dir = resolve(&self.scratch_dir);
        let ledger_dir = resolve(&self.ledger_dir);

        let mut hidden: Vec<LogicalPath> = Vec::new();
        for dir in [&backup_dir, &scratch_dir, &ledger_dir] {
            let Some(prefix) = reserved_prefix(dir, root) else {
                continue;
            };
            if hidden.iter().any(|h| prefix.starts_with(h)) {
                continue;
            }
            hidden.retain(|h| !h.starts_with(&prefix));
            hidden.push(prefix);
        }
        if let Ok(config_file) = LogicalPath::new(CONFIG_FILE_NAME) {
            hidden.push(config_file);
        }

        StorageLayout {
            backup_dir,
            scratch_dir,
            ledger_dir,
            hidden,
        }
    }
}

fn reserved_prefix(dir: &Path, root: &Path) -> Option<LogicalPath> {
    let inside = dir.strip_prefix(root).ok()?.to_str()?;
    let full = LogicalPath::new(inside).ok()?;
    if full.is_root() {
        return None;
    }

    let mut prefix = LogicalPath::root();
    for segment in full.segments() {
        prefix = prefix.join(segment).ok()?;
        if segment.starts_with('.') {
            return Some(prefix);
        }
    }
    Some(full)
}
