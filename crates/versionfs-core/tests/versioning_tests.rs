//! Version counting, reading back and visibility.

use std::path::PathBuf;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use versionfs_core::{ListOptions, OpenMode, SnapshotError, SnapshotOutcome};
use versionfs_test_utils::{TestRoot, CLOCK_START};

fn scratch_entries(root: &TestRoot) -> usize {
    std::fs::read_dir(&root.vfs().layout().scratch_dir)
        .unwrap()
        .count()
}

#[tokio::test]
async fn test_no_version_before_first_snapshot() {
    let root = TestRoot::new().await;
    std::fs::write(root.path().join("plain.txt"), "untracked").unwrap();

    let err = root.vfs().version("plain.txt").await.unwrap_err();
    assert!(err.is_no_snapshot_info());
    assert!(!root.vfs().has_snapshot("plain.txt").await.unwrap());
    assert!(root.vfs().list_versions("plain.txt").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_first_close_records_version_one() {
    let root = TestRoot::new().await;

    let outcome = root.write("notes.txt", b"hello").await.unwrap();
    assert_eq!(outcome, Some(SnapshotOutcome::Created { version: 1 }));
    assert_eq!(root.vfs().version("notes.txt").await.unwrap(), 1);
    assert!(root.vfs().has_snapshot("notes.txt").await.unwrap());
}

#[tokio::test]
async fn test_each_close_adds_a_version() {
    let root = TestRoot::new().await;
    for i in 1..=4u64 {
        let outcome = root
            .write("doc.txt", format!("revision {i}").as_bytes())
            .await
            .unwrap();
        assert_eq!(outcome, Some(SnapshotOutcome::Created { version: i }));
    }

    assert_eq!(root.vfs().version("doc.txt").await.unwrap(), 4);
    let versions = root.vfs().list_versions("doc.txt").await.unwrap();
    assert_eq!(versions.len(), 4);
    for (i, info) in versions.iter().enumerate() {
        assert_eq!(info.version, i as u64 + 1);
        assert_eq!(info.size, "revision 1".len() as u64);
    }
    assert!(versions.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    assert_eq!(versions[0].timestamp.timestamp(), CLOCK_START);
}

#[tokio::test]
async fn test_read_only_handles_do_not_snapshot() {
    let root = TestRoot::new().await;
    root.write("a.txt", b"one").await.unwrap();

    let mut file = root.vfs().open("a.txt", OpenMode::Read).await.unwrap();
    let mut content = String::new();
    file.read_to_string(&mut content).await.unwrap();
    assert!(!file.is_dirty());
    assert_eq!(file.close().await.unwrap(), None);

    // Opened for writing but never written.
    let file = root.vfs().open("a.txt", OpenMode::Append).await.unwrap();
    assert_eq!(file.close().await.unwrap(), None);

    assert_eq!(root.vfs().version("a.txt").await.unwrap(), 1);
    assert_eq!(root.runner().backup_count(), 1);
}

#[tokio::test]
async fn test_open_without_snapshot() {
    let root = TestRoot::new().await;
    let mut file = root
        .vfs()
        .open_with("quiet.txt", OpenMode::Write, false)
        .await
        .unwrap();
    file.write_all(b"no history").await.unwrap();
    assert!(file.is_dirty());
    assert_eq!(file.close().await.unwrap(), None);

    assert!(root.vfs().version("quiet.txt").await.unwrap_err().is_no_snapshot_info());
    assert_eq!(root.read("quiet.txt").await.unwrap(), b"no history");
}

#[tokio::test]
async fn test_historical_versions_read_back_exactly() {
    let root = TestRoot::new().await;
    let contents: [&[u8]; 3] = [b"alpha", b"beta\nwith lines\n", b"gamma \x00 binary"];
    for content in contents {
        root.write("data.bin", content).await.unwrap();
    }

    for (i, expected) in contents.iter().enumerate() {
        let actual = root.read_version("data.bin", i as u64 + 1).await.unwrap();
        assert_eq!(&actual, expected, "version {}", i + 1);
    }
}

#[tokio::test]
async fn test_reading_history_is_idempotent() {
    let root = TestRoot::new().await;
    root.write("a.txt", b"first").await.unwrap();
    root.write("a.txt", b"second").await.unwrap();
    let backups = root.runner().backup_count();

    let once = root.read_version("a.txt", 1).await.unwrap();
    let twice = root.read_version("a.txt", 1).await.unwrap();
    assert_eq!(once, twice);
    assert_eq!(once, b"first");

    assert_eq!(root.vfs().version("a.txt").await.unwrap(), 2);
    assert_eq!(root.runner().backup_count(), backups);
}

#[tokio::test]
async fn test_current_version_reads_live_file() {
    let root = TestRoot::new().await;
    root.write("a.txt", b"one").await.unwrap();
    root.write("a.txt", b"two").await.unwrap();

    let file = root.vfs().open_version("a.txt", 2).await.unwrap();
    assert!(!file.is_scratch_backed());
    file.close().await.unwrap();

    let file = root.vfs().open_version("a.txt", 1).await.unwrap();
    assert!(file.is_scratch_backed());
    file.close().await.unwrap();
}

#[tokio::test]
async fn test_out_of_range_versions_are_not_found() {
    let root = TestRoot::new().await;
    root.write("a.txt", b"one").await.unwrap();
    root.write("a.txt", b"two").await.unwrap();

    for version in [0, 3, 100] {
        let err = root.vfs().open_version("a.txt", version).await.unwrap_err();
        assert!(
            matches!(err, SnapshotError::VersionNotFound { version: v, .. } if v == version),
            "version {version}: {err}"
        );
    }

    std::fs::write(root.path().join("fresh.txt"), "x").unwrap();
    let err = root.vfs().open_version("fresh.txt", 1).await.unwrap_err();
    assert!(err.is_version_not_found());
}

#[tokio::test]
async fn test_historical_handles_are_read_only() {
    let root = TestRoot::new().await;
    root.write("a.txt", b"one").await.unwrap();
    root.write("a.txt", b"two").await.unwrap();

    let mut file = root.vfs().open_version("a.txt", 1).await.unwrap();
    let err = file.write_all(b"nope").await.unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::PermissionDenied);
    file.close().await.unwrap();
    assert_eq!(root.vfs().version("a.txt").await.unwrap(), 2);
}

#[tokio::test]
async fn test_scratch_space_is_released() {
    let root = TestRoot::new().await;
    root.write("a.txt", b"one").await.unwrap();
    root.write("a.txt", b"two").await.unwrap();
    assert_eq!(scratch_entries(&root), 0, "staging left behind");

    let file = root.vfs().open_version("a.txt", 1).await.unwrap();
    assert_eq!(scratch_entries(&root), 1);
    file.close().await.unwrap();
    assert_eq!(scratch_entries(&root), 0);

    // Dropping without close releases it too.
    let file = root.vfs().open_version("a.txt", 1).await.unwrap();
    drop(file);
    assert_eq!(scratch_entries(&root), 0);
}

#[tokio::test]
async fn test_missing_file_cannot_be_opened_or_snapshotted() {
    let root = TestRoot::new().await;
    let err = root.vfs().open("ghost.txt", OpenMode::Read).await.unwrap_err();
    assert!(matches!(err, SnapshotError::FileNotFound(_)));

    let err = root.vfs().snapshot("ghost.txt").await.unwrap_err();
    assert!(matches!(err, SnapshotError::FileNotFound(_)));
    assert_eq!(root.runner().backup_count(), 0);
}

#[tokio::test]
async fn test_equivalent_spellings_share_history() {
    let root = TestRoot::new().await;
    root.vfs().make_dir("docs", false).await.unwrap();
    root.write("/docs/./a.txt", b"one").await.unwrap();
    root.write("docs//a.txt", b"two").await.unwrap();

    assert_eq!(root.vfs().version("docs/a.txt").await.unwrap(), 2);
}

#[tokio::test]
async fn test_storage_is_hidden_and_unreachable() {
    let root = TestRoot::new().await;
    root.write("visible.txt", b"x").await.unwrap();

    let names: Vec<String> = root
        .vfs()
        .list_dir("/", ListOptions::default())
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.path.to_string())
        .collect();
    assert_eq!(names, vec!["/visible.txt"]);

    let all = root
        .vfs()
        .list_dir("/", ListOptions { hidden: true })
        .await
        .unwrap();
    assert_eq!(all.len(), 2);

    let walked = root.vfs().walk_files("/").await.unwrap();
    assert_eq!(walked.len(), 1);
    assert!(!root.vfs().is_dir_empty("/").await.unwrap());

    let err = root
        .vfs()
        .open(".versionfs/backups/anything", OpenMode::Write)
        .await
        .unwrap_err();
    assert!(matches!(err, SnapshotError::InvalidPath(_)));
    assert!(root.vfs().remove_dir(".versionfs", true).await.is_err());
    assert!(root.vfs().exists(".versionfs").await.is_err());
}

#[tokio::test]
async fn test_nested_storage_leaves_its_parent_usable() {
    let root = TestRoot::builder()
        .config(|c| c.backup_dir = PathBuf::from("data/.bk"))
        .build()
        .await;
    root.write("data/report.txt", b"r1").await.unwrap();
    root.write("data/report.txt", b"r2").await.unwrap();

    let vfs = root.vfs();
    assert_eq!(vfs.version("data/report.txt").await.unwrap(), 2);
    assert_eq!(root.read_version("data/report.txt", 1).await.unwrap(), b"r1");

    let listed: Vec<String> = vfs
        .list_files()
        .await
        .unwrap()
        .into_iter()
        .map(|f| f.path.as_str().to_string())
        .collect();
    assert_eq!(listed, vec!["data/report.txt"]);
    let names: Vec<String> = vfs
        .list_dir("data", ListOptions::default())
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.path.as_str().to_string())
        .collect();
    assert_eq!(names, vec!["data/report.txt"]);

    let err = vfs.open("data/.bk/x", OpenMode::Write).await.unwrap_err();
    assert!(matches!(err, SnapshotError::InvalidPath(_)));
    assert!(matches!(
        vfs.remove_dir("data", true).await.unwrap_err(),
        SnapshotError::OperationFailed(_)
    ));
    assert!(matches!(
        vfs.move_dir("data", "elsewhere").await.unwrap_err(),
        SnapshotError::OperationFailed(_)
    ));
    assert!(vfs.is_file("data/report.txt").await.unwrap());
}

#[tokio::test]
async fn test_config_file_is_reserved() {
    let root = TestRoot::new().await;
    std::fs::write(root.path().join("versionfs.json"), "{}").unwrap();
    root.write("a.txt", b"a").await.unwrap();

    let listed: Vec<String> = root
        .vfs()
        .list_files()
        .await
        .unwrap()
        .into_iter()
        .map(|f| f.path.as_str().to_string())
        .collect();
    assert_eq!(listed, vec!["a.txt"]);

    let err = root
        .vfs()
        .open("versionfs.json", OpenMode::Write)
        .await
        .unwrap_err();
    assert!(matches!(err, SnapshotError::InvalidPath(_)));
}

#[tokio::test]
async fn test_paths_escaping_root_are_rejected() {
    let root = TestRoot::new().await;
    let err = root.vfs().open("../outside.txt", OpenMode::Write).await.unwrap_err();
    assert!(matches!(err, SnapshotError::InvalidPath(_)));
}

#[tokio::test]
async fn test_list_files_reports_versions() {
    let root = TestRoot::new().await;
    root.write("tracked.txt", b"12345").await.unwrap();
    root.write("tracked.txt", b"123").await.unwrap();
    std::fs::write(root.path().join("untracked.txt"), "u").unwrap();

    let files = root.vfs().list_files().await.unwrap();
    assert_eq!(files.len(), 2);
    assert_eq!(files[0].path.as_str(), "tracked.txt");
    assert_eq!(files[0].version, Some(2));
    assert_eq!(files[0].size, 3);
    assert_eq!(files[1].path.as_str(), "untracked.txt");
    assert_eq!(files[1].version, None);
}

#[tokio::test]
async fn test_benign_warnings_do_not_fail() {
    let root = TestRoot::builder().case_warning().build().await;
    root.write("a.txt", b"one").await.unwrap();
    root.write("a.txt", b"two").await.unwrap();

    assert_eq!(root.vfs().version("a.txt").await.unwrap(), 2);
    assert_eq!(root.read_version("a.txt", 1).await.unwrap(), b"one");
}

#[tokio::test]
async fn test_hard_link_staging() {
    let root = TestRoot::builder()
        .config(|c| c.staging = versionfs_core::StagingMode::HardLink)
        .build()
        .await;
    root.write("a.txt", b"linked").await.unwrap();
    root.write("a.txt", b"relinked").await.unwrap();

    assert_eq!(root.read_version("a.txt", 1).await.unwrap(), b"linked");
    assert_eq!(root.read("a.txt").await.unwrap(), b"relinked");
}
