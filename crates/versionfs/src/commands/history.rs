//! History command handlers: history, prune, reconcile.

use bytesize::ByteSize;
use versionfs_core::{PruneBoundary, VersioningFs};

/// Show the recorded versions of a file.
pub async fn handle_history(vfs: &VersioningFs, name: &str, json: bool) -> anyhow::Result<()> {
    let versions = vfs.list_versions(name).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&versions)?);
        return Ok(());
    }

    if versions.is_empty() {
        println!("No versions recorded for {name}.");
        return Ok(());
    }

    println!("{:>8} {:<20} {:>12}", "VERSION", "TIMESTAMP", "SIZE");
    println!("{}", "-".repeat(42));
    for info in versions {
        println!(
            "{:>8} {:<20} {:>12}",
            info.version,
            info.timestamp
                .with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
            ByteSize(info.size).to_string()
        );
    }
    Ok(())
}

/// Drop versions older than a version number or a tool timestamp.
pub async fn handle_prune(vfs: &VersioningFs, name: &str, boundary: &str) -> anyhow::Result<()> {
    let boundary: PruneBoundary = boundary.parse()?;
    let remaining = vfs.remove_versions_before(name, boundary.clone()).await?;
    println!("Pruned {name} before {boundary}: {remaining} versions remain");
    Ok(())
}

/// Re-derive a file's counter from the tool's listing.
pub async fn handle_reconcile(vfs: &VersioningFs, name: &str) -> anyhow::Result<()> {
    let version = vfs.reconcile(name).await?;
    println!("{name}: version {version}");
    Ok(())
}
