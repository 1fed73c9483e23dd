use filetime::{set_file_mtime, FileTime};
use mrclean::duplicates::{DuplicateFinder, FinderConfig};
use mrclean::scanner::{FileKind, ScanReport, WalkerConfig};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tempfile::tempdir;

fn write_file(path: &Path, content: &[u8]) {
    File::create(path).unwrap().write_all(content).unwrap();
}

fn canonical(path: &Path) -> String {
    path.to_str().unwrap().to_string()
}

fn finder() -> DuplicateFinder {
    DuplicateFinder::new(FinderConfig::default()).unwrap()
}

#[test]
fn test_scan_empty_directory() {
    let dir = tempdir().unwrap();
    let finder = finder();

    let report = finder.scan(&[dir.path().to_str().unwrap()]).unwrap();
    let result = finder.find_in_report(&report).unwrap();

    assert!(report.files.is_empty());
    assert!(report.errors.is_empty());
    assert!(result.groups.is_empty());
    assert_eq!(result.summary.total_files, 0);
}

#[test]
fn test_scan_unique_files() {
    let dir = tempdir().unwrap();
    write_file(&dir.path().join("a.txt"), b"content a");
    write_file(&dir.path().join("b.txt"), b"content b");
    write_file(&dir.path().join("c.txt"), b"content c");

    let finder = finder();
    let report = finder.scan(&[dir.path().to_str().unwrap()]).unwrap();
    let result = finder.find_in_report(&report).unwrap();

    assert_eq!(report.summary.files, 3);
    assert!(result.groups.is_empty());
    assert_eq!(result.summary.unique_files, 3);
    assert_eq!(result.summary.duplicate_groups, 0);
}

#[test]
fn test_older_file_is_keeper() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a.txt");
    let b = dir.path().join("b.txt");
    write_file(&a, b"0123456789");
    write_file(&b, b"0123456789");
    set_file_mtime(&a, FileTime::from_unix_time(1_600_000_000, 0)).unwrap();
    set_file_mtime(&b, FileTime::from_unix_time(1_700_000_000, 0)).unwrap();

    let finder = finder();
    let report = finder.scan(&[dir.path().to_str().unwrap()]).unwrap();
    let result = finder.find_in_report(&report).unwrap();

    assert_eq!(result.groups.len(), 1);
    let group = &result.groups[0];
    assert_eq!(group.size_bytes(), 10);
    assert_eq!(group.keeper().canonical_path, canonical(&a));
    assert_eq!(group.candidates().len(), 1);
    assert_eq!(group.candidates()[0].canonical_path, canonical(&b));
    assert_eq!(result.summary.reclaimable_bytes, 10);
}

#[test]
fn test_newer_name_order_does_not_matter() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a.txt");
    let z = dir.path().join("z.txt");
    write_file(&a, b"same bytes");
    write_file(&z, b"same bytes");
    set_file_mtime(&a, FileTime::from_unix_time(1_700_000_000, 0)).unwrap();
    set_file_mtime(&z, FileTime::from_unix_time(1_500_000_000, 0)).unwrap();

    let finder = finder();
    let report = finder.scan(&[dir.path().to_str().unwrap()]).unwrap();
    let result = finder.find_in_report(&report).unwrap();

    assert_eq!(result.groups[0].keeper().canonical_path, canonical(&z));
}

#[test]
fn test_different_size_file_not_grouped() {
    let dir = tempdir().unwrap();
    write_file(&dir.path().join("one.bin"), b"duplicate");
    write_file(&dir.path().join("two.bin"), b"duplicate");
    write_file(&dir.path().join("three.bin"), b"duplicate, but longer");

    let finder = finder();
    let report = finder.scan(&[dir.path().to_str().unwrap()]).unwrap();
    let result = finder.find_in_report(&report).unwrap();

    assert_eq!(result.groups.len(), 1);
    assert_eq!(result.groups[0].len(), 2);
    assert_eq!(result.summary.total_files, 3);
    assert_eq!(result.summary.unique_files, 1);
    assert_eq!(result.summary.duplicate_files, 1);
}

#[test]
fn test_same_size_different_content() {
    let dir = tempdir().unwrap();
    write_file(&dir.path().join("x.txt"), b"aaaa");
    write_file(&dir.path().join("y.txt"), b"bbbb");

    let finder = finder();
    let report = finder.scan(&[dir.path().to_str().unwrap()]).unwrap();
    let result = finder.find_in_report(&report).unwrap();

    assert!(result.groups.is_empty());
}

#[test]
fn test_scan_nested_directories() {
    let dir = tempdir().unwrap();
    let sub = dir.path().join("subdir");
    let deeper = sub.join("deeper");
    fs::create_dir_all(&deeper).unwrap();

    write_file(&dir.path().join("a.txt"), b"nested duplicate");
    write_file(&sub.join("b.txt"), b"nested duplicate");
    write_file(&deeper.join("c.txt"), b"nested duplicate");

    let finder = finder();
    let report = finder.scan(&[dir.path().to_str().unwrap()]).unwrap();
    let result = finder.find_in_report(&report).unwrap();

    assert_eq!(result.groups.len(), 1);
    assert_eq!(result.groups[0].len(), 3);
    assert_eq!(result.groups[0].duplicate_count(), 2);
}

#[test]
fn test_groups_sorted_largest_first() {
    let dir = tempdir().unwrap();
    write_file(&dir.path().join("small1"), b"ab");
    write_file(&dir.path().join("small2"), b"ab");
    write_file(&dir.path().join("large1"), &[7u8; 5000]);
    write_file(&dir.path().join("large2"), &[7u8; 5000]);

    let finder = finder();
    let report = finder.scan(&[dir.path().to_str().unwrap()]).unwrap();
    let result = finder.find_in_report(&report).unwrap();

    assert_eq!(result.groups.len(), 2);
    assert_eq!(result.groups[0].size_bytes(), 5000);
    assert_eq!(result.groups[1].size_bytes(), 2);
}

#[test]
fn test_large_files_beyond_quick_hash_window() {
    let dir = tempdir().unwrap();
    let first = vec![0u8; 200 * 1024];
    let mut third = first.clone();
    // Same prefix, different tail.
    *third.last_mut().unwrap() = 1;
    write_file(&dir.path().join("first.bin"), &first);
    write_file(&dir.path().join("second.bin"), &first);
    write_file(&dir.path().join("third.bin"), &third);

    let finder = finder();
    let report = finder.scan(&[dir.path().to_str().unwrap()]).unwrap();
    let result = finder.find_in_report(&report).unwrap();

    assert_eq!(result.groups.len(), 1);
    let paths: Vec<_> = result.groups[0]
        .members()
        .map(|m| m.canonical_path.clone())
        .collect();
    assert!(paths.iter().all(|p| !p.ends_with("third.bin")));
}

#[test]
fn test_exclude_pattern_prunes_files() {
    let dir = tempdir().unwrap();
    let cache = dir.path().join("cache");
    fs::create_dir(&cache).unwrap();
    write_file(&dir.path().join("keep.txt"), b"same");
    write_file(&cache.join("copy.txt"), b"same");
    write_file(&dir.path().join("scratch.tmp"), b"same");

    let config = FinderConfig::default().with_walker_config(
        WalkerConfig::default().with_exclude(vec!["cache/".to_string(), "*.tmp".to_string()]),
    );
    let finder = DuplicateFinder::new(config).unwrap();
    let report = finder.scan(&[dir.path().to_str().unwrap()]).unwrap();

    assert_eq!(report.files.len(), 1);
    assert!(report.files[0].os_path.ends_with("keep.txt"));
}

#[test]
fn test_missing_root_recorded_and_walk_continues() {
    let dir = tempdir().unwrap();
    write_file(&dir.path().join("a.txt"), b"content");
    let elsewhere = tempdir().unwrap();
    let missing = elsewhere.path().join("does-not-exist");

    let finder = finder();
    let report = finder
        .scan(&[missing.to_str().unwrap(), dir.path().to_str().unwrap()])
        .unwrap();

    assert_eq!(report.files.len(), 1);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].input.as_deref(), missing.to_str());
}

#[test]
fn test_saved_report_feeds_dedupe() {
    let dir = tempdir().unwrap();
    let data = dir.path().join("data");
    fs::create_dir(&data).unwrap();
    write_file(&data.join("a.txt"), b"report content");
    write_file(&data.join("b.txt"), b"report content");

    let finder = finder();
    let report = finder.scan(&[data.to_str().unwrap()]).unwrap();
    let report_path = dir.path().join("scan_report.json");
    report.save(&report_path).unwrap();

    let (loaded, digest) = ScanReport::load(&report_path).unwrap();
    assert_eq!(loaded, report);
    assert_eq!(digest.len(), 64);
    assert_eq!(digest, report.digest().unwrap());

    let from_walk = finder.find_in_report(&report).unwrap();
    let from_file = finder.find_in_report(&loaded).unwrap();
    assert_eq!(from_walk.groups, from_file.groups);
}

#[cfg(unix)]
#[test]
fn test_symlinks_listed_not_hashed() {
    let dir = tempdir().unwrap();
    let target = dir.path().join("target.txt");
    write_file(&target, b"linked content");
    std::os::unix::fs::symlink(&target, dir.path().join("link.txt")).unwrap();

    let finder = finder();
    let report = finder.scan(&[dir.path().to_str().unwrap()]).unwrap();
    let result = finder.find_in_report(&report).unwrap();

    let link = report
        .files
        .iter()
        .find(|f| f.os_path.ends_with("link.txt"))
        .unwrap();
    assert_eq!(link.kind, FileKind::Symlink);
    assert!(result.groups.is_empty());
    assert_eq!(result.fingerprints.skipped.len(), 1);
    assert_eq!(result.summary.skipped, 1);
}

#[cfg(unix)]
#[test]
fn test_unreadable_file_excluded_from_groups() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    let locked = dir.path().join("locked.txt");
    write_file(&dir.path().join("open1.txt"), b"permission test");
    write_file(&dir.path().join("open2.txt"), b"permission test");
    write_file(&locked, b"permission test");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

    // Root can read anything; nothing to assert in that case.
    if File::open(&locked).is_ok() {
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();
        return;
    }

    let finder = finder();
    let report = finder.scan(&[dir.path().to_str().unwrap()]).unwrap();
    let result = finder.find_in_report(&report).unwrap();

    fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();

    assert_eq!(result.groups.len(), 1);
    assert_eq!(result.groups[0].len(), 2);
    assert_eq!(result.fingerprints.errors.len(), 1);
    assert_eq!(result.summary.hash_errors, 1);
}
