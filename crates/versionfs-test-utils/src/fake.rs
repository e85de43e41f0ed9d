//! An in-process stand-in for the `rdiff-backup` binary.
//!
//! [`FakeRdiffBackup`] understands the argument grammar versionfs emits and
//! keeps each increment as a full copy under
//! `<repository>/rdiff-backup-data/increments/<epoch>/`. It reproduces the
//! behaviour versionfs relies on: one increment per second at most, newest
//! increment never pruned, restore targets that must not exist, and the
//! tabular size listing.

use async_trait::async_trait;
use chrono::{Local, NaiveDateTime, TimeZone, Utc};
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use versionfs_core::tool::{ToolOutput, ToolRunner, CASE_WARNING, TOOL_TIME_FORMAT};

/// Stderr of a backup inside the one-second window, as the real tool prints it.
pub const TOO_SOON_STDERR: &str = "Fatal Error: Time of Last backup is not in the past.  This is probably caused by running two backups in less than a second.  Wait a second and try again.";

const DATA_DIR: &str = "rdiff-backup-data";
const INCREMENTS_DIR: &str = "increments";

/// Fake `rdiff-backup` operating on real directories.
#[derive(Debug, Clone, Default)]
pub struct FakeRdiffBackup {
    case_warning: bool,
}

impl FakeRdiffBackup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also print the benign case-sensitivity warning on every run.
    pub fn with_case_warning(mut self) -> Self {
        self.case_warning = true;
        self
    }

    fn increments_dir(repository: &Path) -> PathBuf {
        repository.join(DATA_DIR).join(INCREMENTS_DIR)
    }

    /// Epochs of the increments in `repository`, oldest first.
    pub fn increment_times(repository: &Path) -> io::Result<Vec<i64>> {
        let mut times = Vec::new();
        for entry in std::fs::read_dir(Self::increments_dir(repository))? {
            let entry = entry?;
            if let Some(time) = entry.file_name().to_str().and_then(|n| n.parse().ok()) {
                times.push(time);
            }
        }
        times.sort_unstable();
        Ok(times)
    }

    fn finish(&self, mut output: ToolOutput) -> ToolOutput {
        if self.case_warning {
            output.stderr = format!("{CASE_WARNING} sensitivity of destination\n{}", output.stderr);
        }
        output
    }

    fn backup(&self, args: &[String]) -> io::Result<ToolOutput> {
        let [.., source, destination] = args else {
            return Ok(usage());
        };
        let (source, destination) = (Path::new(source), Path::new(destination));
        let time = match flag_value(args, "--current-time") {
            Some(value) => match value.parse::<i64>() {
                Ok(time) => time,
                Err(_) => return Ok(fatal(format!("Bad time string {value}"))),
            },
            None => Utc::now().timestamp(),
        };

        let existing = if Self::increments_dir(destination).exists() {
            Self::increment_times(destination)?
        } else {
            Vec::new()
        };
        if existing.last().is_some_and(|last| time <= *last) {
            return Ok(fatal(TOO_SOON_STDERR));
        }

        let target = Self::increments_dir(destination).join(time.to_string());
        std::fs::create_dir_all(&target)?;
        copy_files(source, &target)?;
        Ok(ToolOutput::ok(""))
    }

    fn list(&self, repository: &Path) -> io::Result<ToolOutput> {
        if !Self::increments_dir(repository).exists() {
            return Ok(not_a_repository(repository));
        }
        let stdout: String = Self::increment_times(repository)?
            .into_iter()
            .map(|t| format!("{t} directory\n"))
            .collect();
        Ok(ToolOutput::ok(stdout))
    }

    fn sizes(&self, repository: &Path) -> io::Result<ToolOutput> {
        if !Self::increments_dir(repository).exists() {
            return Ok(not_a_repository(repository));
        }
        let times = Self::increment_times(repository)?;

        let mut rows = Vec::new();
        let mut cumulative = 0u64;
        for (i, time) in times.iter().enumerate() {
            let size = dir_size(&Self::increments_dir(repository).join(time.to_string()))?;
            cumulative += size;
            let when = Local
                .timestamp_opt(*time, 0)
                .single()
                .map(|t| t.format("%a %b %e %H:%M:%S %Y").to_string())
                .unwrap_or_default();
            let suffix = if i + 1 == times.len() {
                "   (current mirror)"
            } else {
                ""
            };
            rows.push(format!(
                "{when} {:>12} {:>17}{suffix}",
                human(size),
                human(cumulative)
            ));
        }
        rows.reverse();

        let mut stdout = String::from(
            "        Time                       Size        Cumulative size\n\
             -----------------------------------------------------------------------------\n",
        );
        for row in rows {
            stdout.push_str(&row);
            stdout.push('\n');
        }
        Ok(ToolOutput::ok(stdout))
    }

    fn restore(&self, args: &[String]) -> io::Result<ToolOutput> {
        let (Some(when), [.., repository, target]) = (flag_value(args, "--restore-as-of"), args)
        else {
            return Ok(usage());
        };
        let (repository, target) = (Path::new(repository), Path::new(target));
        let Some(when) = parse_time(when) else {
            return Ok(fatal(format!("Bad time string {when}")));
        };
        if !Self::increments_dir(repository).exists() {
            return Ok(not_a_repository(repository));
        }
        if target.exists() {
            return Ok(fatal(format!(
                "Restore target {} already exists, specify --force to overwrite.",
                target.display()
            )));
        }

        let Some(time) = Self::increment_times(repository)?
            .into_iter()
            .filter(|t| *t <= when)
            .last()
        else {
            return Ok(fatal(format!("No increments found older than {when}")));
        };

        std::fs::create_dir_all(target)?;
        copy_files(
            &Self::increments_dir(repository).join(time.to_string()),
            target,
        )?;
        Ok(ToolOutput::ok(""))
    }

    fn prune(&self, args: &[String]) -> io::Result<ToolOutput> {
        let (Some(when), Some(repository)) = (flag_value(args, "--remove-older-than"), args.last())
        else {
            return Ok(usage());
        };
        let repository = Path::new(repository);
        let Some(when) = parse_time(when) else {
            return Ok(fatal(format!("Bad time string {when}")));
        };
        if !Self::increments_dir(repository).exists() {
            return Ok(not_a_repository(repository));
        }

        let times = Self::increment_times(repository)?;
        let newest = times.last().copied();
        let doomed: Vec<i64> = times
            .into_iter()
            .filter(|t| *t < when && Some(*t) != newest)
            .collect();

        if doomed.is_empty() {
            return Ok(ToolOutput::ok("No increments older than the given time found.\n"));
        }
        if doomed.len() > 1 && !args.iter().any(|a| a == "--force") {
            return Ok(fatal("Found multiple increments to remove, use --force"));
        }
        for time in doomed {
            std::fs::remove_dir_all(Self::increments_dir(repository).join(time.to_string()))?;
        }
        Ok(ToolOutput::ok(""))
    }
}

#[async_trait]
impl ToolRunner for FakeRdiffBackup {
    async fn run(&self, args: &[OsString]) -> io::Result<ToolOutput> {
        let args: Vec<String> = args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        let has = |flag: &str| args.iter().any(|a| a == flag);

        let output = if has("-l") {
            match args.last() {
                Some(repository) => self.list(Path::new(repository))?,
                None => usage(),
            }
        } else if has("--list-increment-sizes") {
            match args.last() {
                Some(repository) => self.sizes(Path::new(repository))?,
                None => usage(),
            }
        } else if has("--restore-as-of") {
            self.restore(&args)?
        } else if has("--remove-older-than") {
            self.prune(&args)?
        } else {
            self.backup(&args)?
        };
        Ok(self.finish(output))
    }
}

fn fatal(message: impl Into<String>) -> ToolOutput {
    ToolOutput::failed(format!("{}\n", message.into()), 1)
}

fn usage() -> ToolOutput {
    fatal("Fatal Error: bad command line")
}

fn not_a_repository(path: &Path) -> ToolOutput {
    fatal(format!(
        "Fatal Error: {} does not appear to be an rdiff-backup repository",
        path.display()
    ))
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

/// Epoch seconds or local `%Y-%m-%dT%H:%M:%S`.
fn parse_time(value: &str) -> Option<i64> {
    if let Ok(epoch) = value.parse::<i64>() {
        return Some(epoch);
    }
    let naive = NaiveDateTime::parse_from_str(value, TOOL_TIME_FORMAT).ok()?;
    Local
        .from_local_datetime(&naive)
        .single()
        .map(|t| t.timestamp())
}

fn copy_files(from: &Path, to: &Path) -> io::Result<()> {
    for entry in std::fs::read_dir(from)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            std::fs::copy(entry.path(), to.join(entry.file_name()))?;
        }
    }
    Ok(())
}

fn dir_size(dir: &Path) -> io::Result<u64> {
    let mut total = 0;
    for entry in std::fs::read_dir(dir)? {
        total += entry?.metadata()?.len();
    }
    Ok(total)
}

fn human(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} bytes")
    } else {
        format!("{:.2} KB", bytes as f64 / 1024.0)
    }
}
