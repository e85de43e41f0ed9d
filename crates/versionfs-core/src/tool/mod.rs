//! The rdiff-backup protocol.
//!
//! [`ToolCommand`] is the argument grammar, [`ToolRunner`] executes it and
//! [`RdiffBackup`] turns the output into typed results, using a
//! [`StderrClassifier`] to decide what counts as failure.

mod classify;
mod command;
mod parse;
mod runner;

pub use classify::{StderrClassifier, StderrVerdict, CASE_WARNING};
pub use command::ToolCommand;
pub use parse::{
    format_tool_time, is_tool_time, parse_increment_sizes, parse_increments, parse_size,
    Increment, TOOL_TIME_FORMAT,
};
pub use runner::{ProcessRunner, ToolOutput, ToolRunner};

use crate::{SnapshotError, SnapshotResult};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Typed client for the snapshot tool.
#[derive(Clone)]
pub struct RdiffBackup {
    runner: Arc<dyn ToolRunner>,
    classifier: StderrClassifier,
}

impl std::fmt::Debug for RdiffBackup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RdiffBackup")
            .field("classifier", &self.classifier)
            .finish_non_exhaustive()
    }
}

impl RdiffBackup {
    pub fn new(runner: Arc<dyn ToolRunner>, classifier: StderrClassifier) -> Self {
        Self { runner, classifier }
    }

    async fn exec(&self, command: &ToolCommand) -> SnapshotResult<(ToolOutput, StderrVerdict)> {
        debug!(command = command.name(), "Running rdiff-backup");
        let output = self
            .runner
            .run(&command.args())
            .await
            .map_err(|e| SnapshotError::tool(command.name(), e.to_string()))?;
        let verdict = self.classifier.classify(&output.stderr, output.success);
        if verdict != StderrVerdict::Clean {
            debug!(
                command = command.name(),
                exit_code = output.exit_code,
                stderr = %output.stderr.trim(),
                "rdiff-backup reported a problem"
            );
        }
        Ok((output, verdict))
    }

    /// Record `source` as a new increment of `destination`.
    pub async fn backup(
        &self,
        source: &Path,
        destination: &Path,
        tempdir: &Path,
        current_time: Option<i64>,
    ) -> SnapshotResult<()> {
        let command = ToolCommand::Backup {
            source: source.to_path_buf(),
            destination: destination.to_path_buf(),
            tempdir: tempdir.to_path_buf(),
            current_time,
        };
        match self.exec(&command).await?.1 {
            StderrVerdict::Clean => Ok(()),
            StderrVerdict::TooSoon(message) => Err(SnapshotError::TooSoon(message)),
            StderrVerdict::Fatal(message) => Err(SnapshotError::tool(command.name(), message)),
        }
    }

    /// Increments of a repository, oldest first.
    pub async fn increments(&self, repository: &Path) -> SnapshotResult<Vec<Increment>> {
        let command = ToolCommand::ListIncrements {
            repository: repository.to_path_buf(),
        };
        let (output, verdict) = self.exec(&command).await?;
        match verdict {
            StderrVerdict::Clean => parse_increments(&output.stdout),
            StderrVerdict::TooSoon(message) | StderrVerdict::Fatal(message) => {
                Err(SnapshotError::tool(command.name(), message))
            }
        }
    }

    /// Increment sizes in bytes, oldest first.
    pub async fn increment_sizes(&self, repository: &Path) -> SnapshotResult<Vec<u64>> {
        let command = ToolCommand::ListIncrementSizes {
            repository: repository.to_path_buf(),
        };
        let (output, verdict) = self.exec(&command).await?;
        match verdict {
            StderrVerdict::Clean => parse_increment_sizes(&output.stdout),
            StderrVerdict::TooSoon(message) | StderrVerdict::Fatal(message) => {
                Err(SnapshotError::tool(command.name(), message))
            }
        }
    }

    /// Materialize the repository state as of `timestamp` at `target`.
    pub async fn restore_as_of(
        &self,
        timestamp: &str,
        repository: &Path,
        target: &Path,
    ) -> SnapshotResult<()> {
        let command = ToolCommand::RestoreAsOf {
            timestamp: timestamp.to_string(),
            repository: repository.to_path_buf(),
            target: target.to_path_buf(),
        };
        self.mutate(&command).await
    }

    /// Drop every increment older than `timestamp`.
    pub async fn remove_older_than(
        &self,
        timestamp: &str,
        repository: &Path,
        tempdir: &Path,
    ) -> SnapshotResult<()> {
        let command = ToolCommand::RemoveOlderThan {
            timestamp: timestamp.to_string(),
            repository: repository.to_path_buf(),
            tempdir: tempdir.to_path_buf(),
        };
        self.mutate(&command).await
    }

    async fn mutate(&self, command: &ToolCommand) -> SnapshotResult<()> {
        let (_, verdict) = self.exec(command).await.map_err(|e| {
            warn!(command = command.name(), error = %e, "rdiff-backup could not run");
            SnapshotError::operation_failed(e.to_string())
        })?;
        match verdict {
            StderrVerdict::Clean => Ok(()),
            StderrVerdict::TooSoon(message) | StderrVerdict::Fatal(message) => Err(
                SnapshotError::operation_failed(format!("{}: {}", command.name(), message)),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::ffi::OsString;
    use std::sync::Mutex;

    /// Replays one canned output and records the arguments.
    struct Canned {
        output: ToolOutput,
        calls: Mutex<Vec<Vec<OsString>>>,
    }

    impl Canned {
        fn new(output: ToolOutput) -> Arc<Self> {
            Arc::new(Self {
                output,
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ToolRunner for Canned {
        async fn run(&self, args: &[OsString]) -> std::io::Result<ToolOutput> {
            self.calls.lock().unwrap().push(args.to_vec());
            Ok(self.output.clone())
        }
    }

    fn client(output: ToolOutput) -> (Arc<Canned>, RdiffBackup) {
        let runner = Canned::new(output);
        let tool = RdiffBackup::new(runner.clone(), StderrClassifier::default());
        (runner, tool)
    }

    #[tokio::test]
    async fn backup_maps_too_soon() {
        let (_, tool) = client(ToolOutput::failed("Fatal Error: Time of Last backup is not in the past", 1));
        let err = tool
            .backup(Path::new("s"), Path::new("d"), Path::new("t"), None)
            .await
            .unwrap_err();
        assert!(err.is_too_soon());
    }

    #[tokio::test]
    async fn backup_maps_other_errors_to_tool() {
        let (_, tool) = client(ToolOutput::failed("Fatal Error: disk full", 1));
        let err = tool
            .backup(Path::new("s"), Path::new("d"), Path::new("t"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, SnapshotError::Tool { .. }));
    }

    #[tokio::test]
    async fn benign_warning_is_success() {
        let mut output = ToolOutput::ok("");
        output.stderr = format!("{CASE_WARNING} sensitivity of /tmp\n");
        let (runner, tool) = client(output);
        tool.backup(Path::new("s"), Path::new("d"), Path::new("t"), Some(5))
            .await
            .unwrap();
        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].contains(&OsString::from("--current-time")));
    }

    #[tokio::test]
    async fn listing_is_parsed() {
        let (_, tool) = client(ToolOutput::ok("20 directory\n10 directory\n"));
        let increments = tool.increments(Path::new("d")).await.unwrap();
        assert_eq!(increments.len(), 2);
        assert_eq!(increments[0].time, 10);
    }

    #[tokio::test]
    async fn restore_failure_is_operation_failed() {
        let (_, tool) = client(ToolOutput::failed("Fatal Error: no such increment", 1));
        let err = tool
            .restore_as_of("10", Path::new("d"), Path::new("out"))
            .await
            .unwrap_err();
        assert!(matches!(err, SnapshotError::OperationFailed(_)));
    }
}
