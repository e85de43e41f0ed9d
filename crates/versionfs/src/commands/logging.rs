//! Logging initialization.
//!
//! Logs go to stderr so that stdout stays clean for `download`. With
//! `--log-file` they are appended to `versionfs.log` in the user state dir.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing_subscriber::fmt::writer::BoxMakeWriter;

/// Initialize logging. Returns the log file path when logging to a file.
pub fn init_logging(verbose: bool, to_file: bool) -> Option<PathBuf> {
    let level = match (verbose, to_file) {
        (true, _) => "debug",
        (false, true) => "info",
        (false, false) => "warn",
    };
    let filter = format!("versionfs={level},versionfs_core={level}");

    let log_file = to_file.then(log_file_path);
    let file = match log_file.as_deref().map(open_append) {
        Some(Ok(file)) => Some(file),
        Some(Err(e)) => {
            eprintln!("Warning: Could not open log file: {e}");
            None
        }
        None => None,
    };

    let (writer, ansi, log_file) = match file {
        Some(file) => (BoxMakeWriter::new(file), false, log_file),
        None => (BoxMakeWriter::new(std::io::stderr), true, None),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(ansi)
        .with_writer(writer)
        .init();

    log_file
}

fn open_append(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Where `--log-file` writes.
pub fn log_file_path() -> PathBuf {
    dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(std::env::temp_dir)
        .join("versionfs")
        .join("versionfs.log")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_is_namespaced() {
        let path = log_file_path();
        assert!(path.ends_with("versionfs/versionfs.log"));
    }
}
