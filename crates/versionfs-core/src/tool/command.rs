//! rdiff-backup argument grammar.

use std::ffi::OsString;
use std::path::PathBuf;

/// One invocation of the snapshot tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCommand {
    /// Back up `source` into the repository `destination`.
    Backup {
        source: PathBuf,
        destination: PathBuf,
        tempdir: PathBuf,
        /// Override for the tool's clock, in epoch seconds.
        current_time: Option<i64>,
    },
    /// List increments of a repository.
    ListIncrements { repository: PathBuf },
    /// Tabular size listing of a repository.
    ListIncrementSizes { repository: PathBuf },
    /// Restore the state as of `timestamp` into `target`, which must not exist.
    RestoreAsOf {
        timestamp: String,
        repository: PathBuf,
        target: PathBuf,
    },
    /// Drop increments older than `timestamp`.
    RemoveOlderThan {
        timestamp: String,
        repository: PathBuf,
        tempdir: PathBuf,
    },
}

impl ToolCommand {
    /// Short name used in errors and logs.
    pub fn name(&self) -> &'static str {
        match self {
            ToolCommand::Backup { .. } => "backup",
            ToolCommand::ListIncrements { .. } => "list-increments",
            ToolCommand::ListIncrementSizes { .. } => "list-increment-sizes",
            ToolCommand::RestoreAsOf { .. } => "restore",
            ToolCommand::RemoveOlderThan { .. } => "remove-older-than",
        }
    }

    /// Command line arguments, excluding the program.
    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();
        match self {
            ToolCommand::Backup {
                source,
                destination,
                tempdir,
                current_time,
            } => {
                args.extend(
                    [
                        "--parsable-output",
                        "--no-eas",
                        "--no-file-statistics",
                        "--no-acls",
                    ]
                    .map(OsString::from),
                );
                if let Some(time) = current_time {
                    args.push("--current-time".into());
                    args.push(time.to_string().into());
                }
                args.push("--tempdir".into());
                args.push(tempdir.into());
                args.push(source.into());
                args.push(destination.into());
            }
            ToolCommand::ListIncrements { repository } => {
                args.push("--parsable-output".into());
                args.push("-l".into());
                args.push(repository.into());
            }
            ToolCommand::ListIncrementSizes { repository } => {
                args.push("--parsable-output".into());
                args.push("--list-increment-sizes".into());
                args.push(repository.into());
            }
            ToolCommand::RestoreAsOf {
                timestamp,
                repository,
                target,
            } => {
                args.push("--restore-as-of".into());
                args.push(timestamp.into());
                args.push(repository.into());
                args.push(target.into());
            }
            ToolCommand::RemoveOlderThan {
                timestamp,
                repository,
                tempdir,
            } => {
                args.push("--parsable-output".into());
                args.push("--force".into());
                args.push("--remove-older-than".into());
                args.push(timestamp.into());
                args.push("--tempdir".into());
                args.push(tempdir.into());
                args.push(repository.into());
            }
        }
        args
    }
}
