//! Versioning overlay for a file store.
//!
//! Every write to a file becomes an rdiff-backup increment. Older versions
//! can be listed, read back and pruned, and history follows files across
//! moves and is removed with them.
//!
//! # Example
//!
//! ```no_run
//! use versionfs_core::{OpenMode, VersioningConfig, VersioningFs};
//! use tokio::io::AsyncWriteExt;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let vfs = VersioningFs::new("/srv/files", VersioningConfig::default()).await?;
//!
//! let mut file = vfs.open("notes.txt", OpenMode::Write).await?;
//! file.write_all(b"first draft").await?;
//! file.close().await?;
//!
//! assert_eq!(vfs.version("notes.txt").await?, 1);
//! let old = vfs.open_version("notes.txt", 1).await?;
//! # drop(old);
//! # Ok(())
//! # }
//! ```

mod address;
mod config;
mod coordinator;
mod error;
mod filter;
mod handle;
mod history;
mod path;
mod scratch;
mod versioning;

pub mod fs;
pub mod ledger;
pub mod tool;

pub use address::{PathAddressing, SnapshotKey};
pub use config::{
    LedgerKind, NumberingPolicy, StagingMode, StorageLayout, VersioningConfig, CONFIG_FILE_NAME,
};
pub use coordinator::{RetryPolicy, SnapshotCoordinator, SnapshotOutcome};
pub use error::{SnapshotError, SnapshotResult};
pub use filter::{HiddenFs, ListOptions};
pub use fs::{DirEntry, FileMetadata, FileSystem, OpenMode, OsFs, WalkKind};
pub use handle::VersionedFile;
pub use history::{format_timestamp, HistoryAccess, PruneBoundary, VersionInfo};
pub use path::LogicalPath;
pub use scratch::{ScratchDir, DATAFILE};
pub use versioning::{ListedFile, VersioningFs, VersioningFsBuilder};
