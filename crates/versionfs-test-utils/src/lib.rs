//! Testing utilities for versionfs.
//!
//! - **Fake tool**: [`FakeRdiffBackup`] emulates `rdiff-backup` on disk
//! - **Scripted runner**: [`ScriptedRunner`] records calls, injects failures
//!   and can hold a backup mid-flight
//! - **Fixtures**: [`TestRoot`] wires a versioned temp dir to the runner
//!
//! ```rust,ignore
//! use versionfs_test_utils::TestRoot;
//!
//! #[tokio::test]
//! async fn test_versions() {
//!     let root = TestRoot::new().await;
//!     root.write("a.txt", b"one").await.unwrap();
//!     assert_eq!(root.vfs().version("a.txt").await.unwrap(), 1);
//! }
//! ```

pub mod fake;
pub mod fixtures;
pub mod scripted;

pub use fake::{FakeRdiffBackup, TOO_SOON_STDERR};
pub use fixtures::{read_file, read_version, write_file, TestRoot, TestRootBuilder, CLOCK_START};
pub use scripted::{BackupGate, ScriptedRunner, ToolExecution};
