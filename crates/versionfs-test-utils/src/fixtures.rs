//! A versioned root in a temporary directory.

use crate::fake::FakeRdiffBackup;
use crate::scripted::ScriptedRunner;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use versionfs_core::ledger::CounterStore;
use versionfs_core::{
    LedgerKind, NumberingPolicy, OpenMode, SnapshotOutcome, SnapshotResult, VersioningConfig,
    VersioningFs,
};

/// Start of the fake clock handed to the tool, one second per backup.
pub const CLOCK_START: i64 = 1_700_000_000;

/// Builder for [`TestRoot`].
pub struct TestRootBuilder {
    config: VersioningConfig,
    fake: FakeRdiffBackup,
    counter_store: Option<Arc<dyn CounterStore>>,
}

impl TestRootBuilder {
    pub fn ledger(mut self, kind: LedgerKind) -> Self {
        self.config.ledger = kind;
        self
    }

    pub fn numbering(mut self, numbering: NumberingPolicy) -> Self {
        self.config.numbering = numbering;
        self
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_snapshot_attempts = attempts;
        self
    }

    /// Run against the wall clock instead of the fake one.
    pub fn real_clock(mut self) -> Self {
        self.config.fixed_clock = None;
        self
    }

    pub fn case_warning(mut self) -> Self {
        self.fake = self.fake.with_case_warning();
        self
    }

    pub fn counter_store(mut self, store: Arc<dyn CounterStore>) -> Self {
        self.counter_store = Some(store);
        self
    }

    pub fn config(mut self, edit: impl FnOnce(&mut VersioningConfig)) -> Self {
        edit(&mut self.config);
        self
    }

    pub async fn build(self) -> TestRoot {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let runner = ScriptedRunner::new().with_fake(self.fake);

        let mut builder = VersioningFs::builder(dir.path())
            .config(self.config)
            .with_runner(Arc::new(runner.clone()));
        if let Some(store) = self.counter_store {
            builder = builder.with_counter_store(store);
        }
        let vfs = builder
            .build()
            .await
            .expect("Failed to open versioning filesystem");

        TestRoot { dir, vfs, runner }
    }
}

/// A [`VersioningFs`] over a temp dir, driven by a [`ScriptedRunner`].
pub struct TestRoot {
    dir: TempDir,
    vfs: VersioningFs,
    runner: ScriptedRunner,
}

impl TestRoot {
    /// Defaults for tests: fake clock, 10ms retry interval, derived ledger.
    pub fn builder() -> TestRootBuilder {
        TestRootBuilder {
            config: VersioningConfig {
                fixed_clock: Some(CLOCK_START),
                snapshot_interval_ms: 10,
                ..Default::default()
            },
            fake: FakeRdiffBackup::new(),
            counter_store: None,
        }
    }

    pub async fn new() -> Self {
        Self::builder().build().await
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn vfs(&self) -> &VersioningFs {
        &self.vfs
    }

    pub fn runner(&self) -> &ScriptedRunner {
        &self.runner
    }

    /// Split into parts, for moving the filesystem into a task.
    pub fn into_parts(self) -> (TempDir, VersioningFs, ScriptedRunner) {
        (self.dir, self.vfs, self.runner)
    }

    /// Write `content` to `path` through a handle and close it.
    pub async fn write(&self, path: &str, content: &[u8]) -> SnapshotResult<Option<SnapshotOutcome>> {
        write_file(&self.vfs, path, content).await
    }

    pub async fn read(&self, path: &str) -> SnapshotResult<Vec<u8>> {
        read_file(&self.vfs, path).await
    }

    pub async fn read_version(&self, path: &str, version: u64) -> SnapshotResult<Vec<u8>> {
        read_version(&self.vfs, path, version).await
    }
}

pub async fn write_file(
    vfs: &VersioningFs,
    path: &str,
    content: &[u8],
) -> SnapshotResult<Option<SnapshotOutcome>> {
    let mut file = vfs.open(path, OpenMode::Write).await?;
    file.write_all(content).await?;
    file.close().await
}

pub async fn read_file(vfs: &VersioningFs, path: &str) -> SnapshotResult<Vec<u8>> {
    let mut file = vfs.open(path, OpenMode::Read).await?;
    let mut content = Vec::new();
    file.read_to_end(&mut content).await?;
    file.close().await?;
    Ok(content)
}

pub async fn read_version(vfs: &VersioningFs, path: &str, version: u64) -> SnapshotResult<Vec<u8>> {
    let mut file = vfs.open_version(path, version).await?;
    let mut content = Vec::new();
    file.read_to_end(&mut content).await?;
    file.close().await?;
    Ok(content)
}
