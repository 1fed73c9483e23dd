use filetime::{set_file_mtime, FileTime};
use mrclean::actions::{ActionStatus, ExecutorConfig, PlanExecutor};
use mrclean::duplicates::{DuplicateFinder, FindResult, FinderConfig};
use mrclean::plan::{build_plan, ActionKind, CleanupPlan, PlanOptions};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tempfile::tempdir;
use walkdir::WalkDir;

/// Relative path -> file content, `None` for directories.
fn snapshot(root: &Path) -> BTreeMap<String, Option<Vec<u8>>> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .map(|entry| entry.unwrap())
        .map(|entry| {
            let rel = entry
                .path()
                .strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .into_owned();
            let content = if entry.file_type().is_file() {
                Some(fs::read(entry.path()).unwrap())
            } else {
                None
            };
            (rel, content)
        })
        .collect()
}

fn find(root: &Path) -> FindResult {
    let finder = DuplicateFinder::new(FinderConfig::default()).unwrap();
    let report = finder.scan(&[root.to_str().unwrap()]).unwrap();
    finder.find_in_report(&report).unwrap()
}

fn executor() -> PlanExecutor {
    PlanExecutor::new(ExecutorConfig::default())
}

fn ab_fixture(root: &Path) {
    fs::write(root.join("a.txt"), b"0123456789").unwrap();
    fs::write(root.join("b.txt"), b"0123456789").unwrap();
    set_file_mtime(root.join("a.txt"), FileTime::from_unix_time(1_600_000_000, 0)).unwrap();
    set_file_mtime(root.join("b.txt"), FileTime::from_unix_time(1_700_000_000, 0)).unwrap();
}

// ====== Delete Scenario Tests ======

#[test]
fn test_delete_scenario_end_to_end() {
    let dir = tempdir().unwrap();
    ab_fixture(dir.path());
    let a = dir.path().join("a.txt");
    let b = dir.path().join("b.txt");

    let result = find(dir.path());
    let plan = build_plan(&result.groups, ActionKind::Delete, &PlanOptions::default()).unwrap();

    assert_eq!(plan.len(), 1);
    let action = &plan.actions[0];
    assert_eq!(action.kind(), ActionKind::Delete);
    assert_eq!(action.path, b.to_str().unwrap());
    assert_eq!(action.size_bytes, 10);
    assert_eq!(action.reason, format!("duplicate-of:{}", a.to_str().unwrap()));

    let dry = executor().execute(&plan, true).unwrap();
    assert!(dry.dry_run);
    assert_eq!(dry.results[0].status, ActionStatus::SkippedDryRun);
    assert!(b.exists());

    let applied = executor().execute(&plan, false).unwrap();
    assert_eq!(applied.results[0].status, ActionStatus::Applied);
    assert_eq!(applied.summary.applied, 1);
    assert!(!b.exists());
    assert_eq!(fs::read(&a).unwrap(), b"0123456789");
}

#[test]
fn test_rerun_reports_missing_source() {
    let dir = tempdir().unwrap();
    ab_fixture(dir.path());

    let result = find(dir.path());
    let plan = build_plan(&result.groups, ActionKind::Delete, &PlanOptions::default()).unwrap();

    let first = executor().execute(&plan, false).unwrap();
    assert!(first.all_succeeded());

    let second = executor().execute(&plan, false).unwrap();
    assert_eq!(second.results[0].status, ActionStatus::Failed);
    let detail = second.results[0].error_detail.as_deref().unwrap();
    assert!(detail.contains("source no longer exists"), "{detail}");
    assert_eq!(second.summary.failed, 1);
    assert!(dir.path().join("a.txt").exists());
}

#[test]
fn test_dry_run_leaves_tree_unchanged() {
    let dir = tempdir().unwrap();
    let data = dir.path().join("data");
    fs::create_dir_all(data.join("nested")).unwrap();
    fs::write(data.join("one.txt"), b"repeat").unwrap();
    fs::write(data.join("two.txt"), b"repeat").unwrap();
    fs::write(data.join("nested/three.txt"), b"repeat").unwrap();
    fs::write(data.join("unique.txt"), b"only one").unwrap();

    let result = find(&data);
    let before = snapshot(dir.path());

    for kind in [ActionKind::Delete, ActionKind::Move, ActionKind::Hardlink] {
        let options = PlanOptions::default()
            .with_roots(vec![data.to_str().unwrap().to_string()])
            .with_destination_root(dir.path().join("quarantine").to_str().unwrap());
        let plan = build_plan(&result.groups, kind, &options).unwrap();
        assert_eq!(plan.len(), 2);

        let report = executor().execute(&plan, true).unwrap();
        assert_eq!(report.summary.skipped, 2);
        assert_eq!(report.summary.applied, 0);
    }

    assert_eq!(snapshot(dir.path()), before);
}

#[test]
fn test_modified_file_not_deleted() {
    let dir = tempdir().unwrap();
    ab_fixture(dir.path());
    let b = dir.path().join("b.txt");

    let result = find(dir.path());
    let plan = build_plan(&result.groups, ActionKind::Delete, &PlanOptions::default()).unwrap();

    fs::write(&b, b"edited after planning").unwrap();

    let report = executor().execute(&plan, false).unwrap();
    assert_eq!(report.results[0].status, ActionStatus::Failed);
    assert!(b.exists());
}

// ====== Move Scenario Tests ======

#[test]
fn test_move_collision_gets_suffix() {
    let dir = tempdir().unwrap();
    let data = dir.path().join("data");
    let quarantine = dir.path().join("quarantine");
    fs::create_dir_all(&data).unwrap();
    ab_fixture(&data);

    let result = find(&data);
    let options = PlanOptions::default()
        .with_roots(vec![data.to_str().unwrap().to_string()])
        .with_destination_root(quarantine.to_str().unwrap());
    let plan = build_plan(&result.groups, ActionKind::Move, &options).unwrap();

    let planned = quarantine.join("b.txt");
    assert_eq!(plan.actions[0].destination(), planned.to_str());

    // Something else lands at the planned destination after planning.
    fs::create_dir_all(&quarantine).unwrap();
    fs::write(&planned, b"occupant").unwrap();

    let report = executor().execute(&plan, false).unwrap();
    let moved = quarantine.join("b (1).txt");
    assert_eq!(report.results[0].status, ActionStatus::Applied);
    assert_eq!(report.results[0].destination.as_deref(), moved.to_str());
    assert_eq!(fs::read(&moved).unwrap(), b"0123456789");
    assert_eq!(fs::read(&planned).unwrap(), b"occupant");
    assert!(!data.join("b.txt").exists());
    assert!(data.join("a.txt").exists());
}

#[test]
fn test_move_mirrors_layout() {
    let dir = tempdir().unwrap();
    let data = dir.path().join("data");
    let quarantine = dir.path().join("quarantine");
    fs::create_dir_all(data.join("photos/2020")).unwrap();
    fs::write(data.join("keep.jpg"), b"jpeg bytes").unwrap();
    fs::write(data.join("photos/2020/copy.jpg"), b"jpeg bytes").unwrap();
    set_file_mtime(data.join("keep.jpg"), FileTime::from_unix_time(1_000_000, 0)).unwrap();

    let result = find(&data);
    let options = PlanOptions::default()
        .with_roots(vec![data.to_str().unwrap().to_string()])
        .with_destination_root(quarantine.to_str().unwrap());
    let plan = build_plan(&result.groups, ActionKind::Move, &options).unwrap();

    let report = executor().execute(&plan, false).unwrap();
    assert!(report.all_succeeded());
    assert!(quarantine.join("photos/2020/copy.jpg").exists());
    // Destination matched the plan, so it is not repeated in the result.
    assert!(report.results[0].destination.is_none());
}

// ====== Failure Handling Tests ======

#[test]
fn test_failures_do_not_stop_later_actions() {
    let dir = tempdir().unwrap();
    for name in ["a.txt", "b.txt", "c.txt"] {
        fs::write(dir.path().join(name), b"triplicate").unwrap();
    }
    set_file_mtime(dir.path().join("a.txt"), FileTime::from_unix_time(1_000, 0)).unwrap();

    let result = find(dir.path());
    let plan = build_plan(&result.groups, ActionKind::Delete, &PlanOptions::default()).unwrap();
    assert_eq!(plan.len(), 2);

    fs::remove_file(dir.path().join("b.txt")).unwrap();

    let report = executor().execute(&plan, false).unwrap();
    assert_eq!(report.results.len(), 2);
    assert_eq!(report.results[0].status, ActionStatus::Failed);
    assert_eq!(report.results[1].status, ActionStatus::Applied);
    assert!(!report.all_succeeded());
    assert!(!dir.path().join("c.txt").exists());
}

#[test]
fn test_interrupted_execution_stops_between_actions() {
    let dir = tempdir().unwrap();
    ab_fixture(dir.path());

    let result = find(dir.path());
    let plan = build_plan(&result.groups, ActionKind::Delete, &PlanOptions::default()).unwrap();

    let flag = Arc::new(AtomicBool::new(true));
    let report = PlanExecutor::new(ExecutorConfig::default().with_shutdown_flag(flag))
        .execute(&plan, false)
        .unwrap();

    assert!(report.interrupted);
    assert!(report.results.is_empty());
    assert!(dir.path().join("b.txt").exists());
}

#[test]
fn test_tampered_plan_rejected_before_mutation() {
    let dir = tempdir().unwrap();
    ab_fixture(dir.path());

    let result = find(dir.path());
    let mut plan: CleanupPlan =
        build_plan(&result.groups, ActionKind::Delete, &PlanOptions::default()).unwrap();
    plan.actions[0].path = dir.path().join("a.txt").to_str().unwrap().to_string();

    assert!(executor().execute(&plan, false).is_err());
    assert!(dir.path().join("a.txt").exists());
    assert!(dir.path().join("b.txt").exists());
}
