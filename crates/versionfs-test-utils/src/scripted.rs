//! A recording tool runner with scripted failures.

use crate::fake::FakeRdiffBackup;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::ffi::OsString;
use std::io;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use versionfs_core::tool::{ToolOutput, ToolRunner};

/// Holds the next backup inside the runner until released.
///
/// `entered` fires once the backup has started; the backup then waits for
/// `release`. Only the first backup after arming is held.
#[derive(Debug, Default)]
pub struct BackupGate {
    pub entered: Notify,
    pub release: Notify,
}

impl BackupGate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

/// A recorded tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolExecution {
    pub args: Vec<String>,
}

impl ToolExecution {
    /// True for backup runs.
    pub fn is_backup(&self) -> bool {
        !self.args.iter().any(|a| {
            matches!(
                a.as_str(),
                "-l" | "--list-increment-sizes" | "--restore-as-of" | "--remove-older-than"
            )
        })
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.args.iter().any(|a| a == flag)
    }
}

/// Delegates to [`FakeRdiffBackup`], recording every call.
///
/// Queued backup overrides replace the next backups' results without
/// touching the repository, e.g. to simulate the one-second refusal.
#[derive(Clone, Default)]
pub struct ScriptedRunner {
    fake: FakeRdiffBackup,
    executions: Arc<Mutex<Vec<ToolExecution>>>,
    backup_overrides: Arc<Mutex<VecDeque<ToolOutput>>>,
    gate: Arc<Mutex<Option<Arc<BackupGate>>>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fake(mut self, fake: FakeRdiffBackup) -> Self {
        self.fake = fake;
        self
    }

    /// Make the next backup return `output` instead of running.
    pub fn push_backup_override(&self, output: ToolOutput) {
        self.backup_overrides.lock().unwrap().push_back(output);
    }

    /// Hold the next backup on `gate`.
    pub fn arm_gate(&self, gate: Arc<BackupGate>) {
        *self.gate.lock().unwrap() = Some(gate);
    }

    pub fn executions(&self) -> Vec<ToolExecution> {
        self.executions.lock().unwrap().clone()
    }

    pub fn backup_count(&self) -> usize {
        self.executions
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.is_backup())
            .count()
    }

    pub fn clear(&self) {
        self.executions.lock().unwrap().clear();
    }
}

#[async_trait]
impl ToolRunner for ScriptedRunner {
    async fn run(&self, args: &[OsString]) -> io::Result<ToolOutput> {
        let execution = ToolExecution {
            args: args
                .iter()
                .map(|a| a.to_string_lossy().into_owned())
                .collect(),
        };
        let is_backup = execution.is_backup();
        self.executions.lock().unwrap().push(execution);

        if is_backup {
            let gate = self.gate.lock().unwrap().take();
            if let Some(gate) = gate {
                gate.entered.notify_one();
                gate.release.notified().await;
            }

            let scripted = self.backup_overrides.lock().unwrap().pop_front();
            if let Some(output) = scripted {
                return Ok(output);
            }
        }

        self.fake.run(args).await
    }
}
