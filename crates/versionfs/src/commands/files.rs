//! File command handlers: upload, download, list, rm, mv, mkdir.

use anyhow::Context;
use bytesize::ByteSize;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use versionfs_core::{LogicalPath, OpenMode, SnapshotOutcome, VersioningFs};

/// Store the contents of a local file under `name`, creating a new version.
pub async fn handle_upload(
    vfs: &VersioningFs,
    file: &Path,
    name: Option<String>,
) -> anyhow::Result<()> {
    let name = match name {
        Some(name) => name,
        None => file
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .with_context(|| format!("cannot derive a name from {}", file.display()))?,
    };
    let content = tokio::fs::read(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;

    if let Some(parent) = LogicalPath::new(&name)?.parent() {
        if !parent.is_root() {
            vfs.make_dir(parent.as_str(), true).await?;
        }
    }

    let mut handle = vfs.open(&name, OpenMode::Write).await?;
    handle
        .write_all(&content)
        .await
        .with_context(|| format!("failed to write {name}"))?;
    match handle.close().await? {
        Some(SnapshotOutcome::Created { version }) => {
            println!("Uploaded {name} ({}), version {version}", ByteSize(content.len() as u64))
        }
        _ => println!("Uploaded {name} ({})", ByteSize(content.len() as u64)),
    }
    Ok(())
}

/// Write the current or a historical version of `name` to `output` or stdout.
pub async fn handle_download(
    vfs: &VersioningFs,
    name: &str,
    version: Option<u64>,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut handle = match version {
        Some(version) => vfs.open_version(name, version).await?,
        None => vfs.open(name, OpenMode::Read).await?,
    };
    let mut content = Vec::new();
    handle
        .read_to_end(&mut content)
        .await
        .with_context(|| format!("failed to read {name}"))?;
    handle.close().await?;

    match output {
        Some(path) => {
            tokio::fs::write(&path, &content)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!(
                "Wrote {} to {}",
                ByteSize(content.len() as u64),
                path.display()
            );
        }
        None => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(&content).await?;
            stdout.flush().await?;
        }
    }
    Ok(())
}

/// List every file with its current version.
pub async fn handle_list(vfs: &VersioningFs, json: bool) -> anyhow::Result<()> {
    let files = vfs.list_files().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&files)?);
        return Ok(());
    }

    if files.is_empty() {
        println!("No files found.");
        return Ok(());
    }

    println!("{:<40} {:>8} {:>12} {:<20}", "NAME", "VERSION", "SIZE", "MODIFIED");
    println!("{}", "-".repeat(83));
    for file in files {
        let version = file
            .version
            .map(|v| v.to_string())
            .unwrap_or_else(|| "-".to_string());
        let modified = file
            .modified
            .map(|m| {
                m.with_timezone(&chrono::Local)
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string()
            })
            .unwrap_or_default();
        println!(
            "{:<40} {:>8} {:>12} {:<20}",
            file.path.as_str(),
            version,
            ByteSize(file.size).to_string(),
            modified
        );
    }
    Ok(())
}

/// Remove a file, or a directory with `recursive`, along with its history.
pub async fn handle_remove(vfs: &VersioningFs, name: &str, recursive: bool) -> anyhow::Result<()> {
    if vfs.is_dir(name).await? {
        vfs.remove_dir(name, recursive)
            .await
            .with_context(|| format!("failed to remove directory {name}"))?;
    } else {
        vfs.remove(name)
            .await
            .with_context(|| format!("failed to remove {name}"))?;
    }
    println!("Removed {name}");
    Ok(())
}

/// Move a file or directory, carrying its history.
pub async fn handle_move(vfs: &VersioningFs, src: &str, dst: &str, force: bool) -> anyhow::Result<()> {
    if vfs.is_dir(src).await? {
        vfs.move_dir(src, dst).await?;
    } else {
        vfs.move_file(src, dst, force).await?;
    }
    println!("Moved {src} -> {dst}");
    Ok(())
}

/// Create a directory.
pub async fn handle_mkdir(vfs: &VersioningFs, name: &str, parents: bool) -> anyhow::Result<()> {
    vfs.make_dir(name, parents)
        .await
        .with_context(|| format!("failed to create directory {name}"))?;
    Ok(())
}
