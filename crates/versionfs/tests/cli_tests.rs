//! CLI integration tests.
//!
//! These only exercise paths that never spawn rdiff-backup.

use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn versionfs(root: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_versionfs"))
        .arg("--root")
        .arg(root)
        .args(args)
        .output()
        .expect("Failed to execute versionfs")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_help_lists_commands() {
    let output = Command::new(env!("CARGO_BIN_EXE_versionfs"))
        .arg("--help")
        .output()
        .expect("Failed to execute versionfs");

    assert!(output.status.success());
    let help = stdout(&output);
    for command in ["upload", "download", "list", "history", "prune", "rm", "mv"] {
        assert!(help.contains(command), "missing {command} in help");
    }
}

#[test]
fn test_config_shows_defaults() {
    let dir = TempDir::new().unwrap();
    let output = versionfs(dir.path(), &["config"]);
    assert!(output.status.success());

    let config: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(config["tool"], "rdiff-backup");
    assert_eq!(config["max_snapshot_attempts"], 3);
    // Showing the config does not create the store.
    assert!(!dir.path().join(".versionfs").exists());
}

#[test]
fn test_config_is_discovered_in_root() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("versionfs.json"),
        r#"{ "max_snapshot_attempts": 5, "ledger": "explicit" }"#,
    )
    .unwrap();

    let output = versionfs(dir.path(), &["config"]);
    assert!(output.status.success());
    let config: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(config["max_snapshot_attempts"], 5);
    assert_eq!(config["ledger"], "explicit");
}

#[test]
fn test_missing_config_file_fails() {
    let dir = TempDir::new().unwrap();
    let output = versionfs(dir.path(), &["--config", "nope.json", "config"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("failed to load config"));
}

#[test]
fn test_list_and_history_of_untracked_files() {
    let dir = TempDir::new().unwrap();
    let output = versionfs(dir.path(), &["list"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("No files found."));

    std::fs::write(dir.path().join("plain.txt"), "plain").unwrap();
    let output = versionfs(dir.path(), &["list"]);
    let listing = stdout(&output);
    assert!(listing.contains("plain.txt"));
    assert!(!listing.contains(".versionfs"));

    let output = versionfs(dir.path(), &["history", "plain.txt"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("No versions recorded"));
}

#[test]
fn test_download_current_content() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("a.txt"), "hello").unwrap();

    let output = versionfs(dir.path(), &["download", "a.txt"]);
    assert!(output.status.success());
    assert_eq!(output.stdout, b"hello");

    let target = dir.path().join("copy.txt");
    let output = versionfs(
        dir.path(),
        &["download", "a.txt", "--output", target.to_str().unwrap()],
    );
    assert!(output.status.success());
    assert_eq!(std::fs::read(&target).unwrap(), b"hello");
}

#[test]
fn test_failures_exit_non_zero() {
    let dir = TempDir::new().unwrap();

    let output = versionfs(dir.path(), &["rm", "ghost.txt"]);
    assert!(!output.status.success());

    let output = versionfs(dir.path(), &["download", "a.txt", "--version", "1"]);
    assert!(!output.status.success());

    let output = versionfs(dir.path(), &["prune", "a.txt", "not-a-boundary"]);
    assert!(!output.status.success());
}

#[test]
fn test_upload_without_tool_fails() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("versionfs.json"),
        r#"{ "tool": "/nonexistent/rdiff-backup", "max_snapshot_attempts": 1 }"#,
    )
    .unwrap();
    let source = dir.path().join("source.txt");
    std::fs::write(&source, "data").unwrap();

    let output = versionfs(
        dir.path(),
        &["upload", source.to_str().unwrap(), "--name", "stored.txt"],
    );
    assert!(!output.status.success());
}

#[test]
fn test_mkdir_mv_and_rm_untracked() {
    let dir = TempDir::new().unwrap();
    assert!(versionfs(dir.path(), &["mkdir", "a/b", "--parents"]).status.success());
    std::fs::write(dir.path().join("a/b/f.txt"), "f").unwrap();

    assert!(versionfs(dir.path(), &["mv", "a", "c"]).status.success());
    assert!(dir.path().join("c/b/f.txt").is_file());

    assert!(!versionfs(dir.path(), &["rm", "c"]).status.success());
    assert!(versionfs(dir.path(), &["rm", "c", "--recursive"]).status.success());
    assert!(!dir.path().join("c").exists());
}
