use mrclean::actions::{ActionStatus, ExecutorConfig, PlanExecutor};
use mrclean::duplicates::{DuplicateFinder, FinderConfig, GroupKey};
use mrclean::plan::{build_plan, ActionKind, PlanOptions};
use mrclean::scanner::hardlink::same_inode;
use mrclean::scanner::{FileKind, InodeKey, WalkerConfig};
use std::fs::{self, File};
use std::io::Write;
use tempfile::tempdir;

fn finder_with(walker: WalkerConfig) -> DuplicateFinder {
    DuplicateFinder::new(FinderConfig::default().with_walker_config(walker)).unwrap()
}

#[test]
fn test_hardlinks_to_same_file_free_nothing() {
    let dir = tempdir().unwrap();
    let original = dir.path().join("original.txt");
    let hardlink = dir.path().join("hardlink.txt");

    File::create(&original)
        .unwrap()
        .write_all(b"identical content")
        .unwrap();

    if let Err(e) = fs::hard_link(&original, &hardlink) {
        eprintln!("Skipping hardlink test: failed to create hardlink: {}", e);
        return;
    }

    let finder = finder_with(WalkerConfig::default());
    let report = finder.scan(&[dir.path().to_str().unwrap()]).unwrap();
    let result = finder.find_in_report(&report).unwrap();

    assert_eq!(result.summary.total_files, 2);
    assert_eq!(result.groups.len(), 1);
    if InodeKey::is_supported() {
        assert!(matches!(result.groups[0].key(), GroupKey::Hardlink(_)));
        assert_eq!(result.summary.reclaimable_bytes, 0);
        assert_eq!(result.fingerprints.stats.full_hashed, 0);
    }
}

#[test]
fn test_hardlink_plan_applied_then_nothing_left_to_link() {
    let dir = tempdir().unwrap();
    let keeper = dir.path().join("a.bin");
    let copy = dir.path().join("b.bin");
    fs::write(&keeper, b"hardlink me please").unwrap();
    fs::write(&copy, b"hardlink me please").unwrap();
    filetime::set_file_mtime(&keeper, filetime::FileTime::from_unix_time(1_000, 0)).unwrap();

    let finder = finder_with(WalkerConfig::default());
    let report = finder.scan(&[dir.path().to_str().unwrap()]).unwrap();
    let result = finder.find_in_report(&report).unwrap();
    let plan = build_plan(&result.groups, ActionKind::Hardlink, &PlanOptions::default()).unwrap();

    assert_eq!(plan.len(), 1);
    assert_eq!(plan.actions[0].destination(), keeper.to_str());

    let outcome = PlanExecutor::new(ExecutorConfig::default())
        .execute(&plan, false)
        .unwrap();
    assert_eq!(outcome.results[0].status, ActionStatus::Applied);
    assert_eq!(fs::read(&copy).unwrap(), b"hardlink me please");

    if InodeKey::is_supported() {
        let a = fs::metadata(&keeper).unwrap();
        let b = fs::metadata(&copy).unwrap();
        assert!(same_inode(&a, &b));

        // A second pass sees the links and plans nothing.
        let report = finder.scan(&[dir.path().to_str().unwrap()]).unwrap();
        let result = finder.find_in_report(&report).unwrap();
        let again =
            build_plan(&result.groups, ActionKind::Hardlink, &PlanOptions::default()).unwrap();
        assert!(again.is_empty());
    }
}

#[test]
fn test_hardlink_shortcut_disabled_hashes_links() {
    let dir = tempdir().unwrap();
    let original = dir.path().join("one.txt");
    fs::write(&original, b"linked").unwrap();
    if fs::hard_link(&original, dir.path().join("two.txt")).is_err() {
        return;
    }

    let config = FinderConfig::default().with_fingerprint_config(
        mrclean::duplicates::FingerprintConfig::default().with_hardlink_shortcut(false),
    );
    let finder = DuplicateFinder::new(config).unwrap();
    let report = finder.scan(&[dir.path().to_str().unwrap()]).unwrap();
    let result = finder.find_in_report(&report).unwrap();

    assert_eq!(result.groups.len(), 1);
    assert!(matches!(result.groups[0].key(), GroupKey::Content(_)));
}

#[cfg(unix)]
#[test]
fn test_symlinks_not_followed_by_default() {
    let dir = tempdir().unwrap();
    let original = dir.path().join("original.txt");
    let symlink = dir.path().join("symlink.txt");
    fs::write(&original, b"content").unwrap();
    std::os::unix::fs::symlink(&original, &symlink).unwrap();

    let finder = finder_with(WalkerConfig::default());
    let report = finder.scan(&[dir.path().to_str().unwrap()]).unwrap();
    let result = finder.find_in_report(&report).unwrap();

    assert_eq!(report.files.len(), 2);
    assert_eq!(
        report
            .files
            .iter()
            .filter(|f| f.kind == FileKind::Symlink)
            .count(),
        1
    );
    assert_eq!(result.summary.total_files, 1);
    assert!(result.groups.is_empty());
}

#[cfg(unix)]
#[test]
fn test_symlinks_followed_when_enabled() {
    let dir = tempdir().unwrap();
    let original = dir.path().join("original.txt");
    let symlink = dir.path().join("symlink.txt");
    fs::write(&original, b"content").unwrap();
    std::os::unix::fs::symlink(&original, &symlink).unwrap();

    let finder = finder_with(WalkerConfig::default().with_follow_symlinks(true));
    let report = finder.scan(&[dir.path().to_str().unwrap()]).unwrap();
    let result = finder.find_in_report(&report).unwrap();

    // Both paths name one file, so only one of them is fingerprinted.
    assert!(report.files.iter().all(|f| f.kind == FileKind::Regular));
    assert_eq!(report.files.len(), 2);
    assert_eq!(result.summary.total_files, 1);
    assert_eq!(result.fingerprints.stats.aliased_records, 1);
    assert!(result.groups.is_empty());
}
