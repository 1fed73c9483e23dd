use chrono::{TimeZone, Utc};
use mrclean::actions::{ExecutionReport, ExecutorConfig, PlanExecutor};
use mrclean::duplicates::{DuplicateFinder, FinderConfig};
use mrclean::output::DuplicateReport;
use mrclean::plan::{build_plan, ActionKind, CleanupPlan, PlanOptions, PLAN_VERSION};
use std::fs;
use tempfile::tempdir;

#[test]
fn test_plan_file_round_trip() {
    let dir = tempdir().unwrap();
    let data = dir.path().join("data");
    fs::create_dir(&data).unwrap();
    for name in ["a.txt", "b.txt", "c.txt"] {
        fs::write(data.join(name), b"round trip").unwrap();
    }

    let finder = DuplicateFinder::new(FinderConfig::default()).unwrap();
    let scan = finder.scan(&[data.to_str().unwrap()]).unwrap();
    let result = finder.find_in_report(&scan).unwrap();
    let digest = scan.digest().unwrap();

    let options = PlanOptions::default()
        .with_roots(scan.root_paths())
        .with_source_report_digest(digest.clone())
        .with_destination_root(dir.path().join("moved").to_str().unwrap())
        .with_generated_at(Utc.timestamp_opt(1_700_000_000, 0).unwrap());
    let plan = build_plan(&result.groups, ActionKind::Move, &options).unwrap();

    let plan_path = dir.path().join("cleanup_plan.json");
    plan.save(&plan_path).unwrap();
    let loaded = CleanupPlan::load(&plan_path).unwrap();

    assert_eq!(loaded, plan);
    assert_eq!(loaded.version, PLAN_VERSION);
    assert_eq!(loaded.source_report_digest, digest);
    assert_eq!(loaded.actions.len(), 2);
    assert!(loaded.validate().is_ok());

    let raw: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&plan_path).unwrap()).unwrap();
    assert_eq!(raw["generated_at"], "2023-11-14T22:13:20Z");
    assert_eq!(raw["actions"][0]["kind"], "move");
    assert!(raw["actions"][0]["destination"].is_string());
    assert_eq!(raw["actions"][0]["action_id"].as_str().unwrap().len(), 16);
}

#[test]
fn test_edited_plan_with_removed_action_still_runs() {
    let dir = tempdir().unwrap();
    for name in ["a.txt", "b.txt", "c.txt"] {
        fs::write(dir.path().join(name), b"review me").unwrap();
    }

    let finder = DuplicateFinder::new(FinderConfig::default()).unwrap();
    let scan = finder.scan(&[dir.path().to_str().unwrap()]).unwrap();
    let result = finder.find_in_report(&scan).unwrap();
    let plan = build_plan(&result.groups, ActionKind::Delete, &PlanOptions::default()).unwrap();

    // A user drops one action by editing the JSON.
    let plan_path = dir.path().join("plan.json");
    plan.save(&plan_path).unwrap();
    let mut value: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&plan_path).unwrap()).unwrap();
    let spared = value["actions"][1]["path"].as_str().unwrap().to_string();
    value["actions"].as_array_mut().unwrap().remove(1);
    fs::write(&plan_path, serde_json::to_string_pretty(&value).unwrap()).unwrap();

    let edited = CleanupPlan::load(&plan_path).unwrap();
    let report = PlanExecutor::new(ExecutorConfig::default())
        .execute(&edited, false)
        .unwrap();

    assert_eq!(report.results.len(), 1);
    assert!(report.all_succeeded());
    assert!(std::path::Path::new(&spared).exists());
}

#[test]
fn test_plan_with_unknown_version_not_loaded() {
    let dir = tempdir().unwrap();
    let plan_path = dir.path().join("plan.json");
    fs::write(
        &plan_path,
        r#"{"version": 99, "generated_at": "2024-01-01T00:00:00Z", "source_report_digest": "", "actions": []}"#,
    )
    .unwrap();

    let err = CleanupPlan::load(&plan_path).unwrap_err();
    assert!(format!("{err:#}").contains("99"));
}

#[test]
fn test_duplicate_report_contents() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.txt"), b"report me").unwrap();
    fs::write(dir.path().join("b.txt"), b"report me").unwrap();
    fs::write(dir.path().join("solo.txt"), b"just one").unwrap();

    let finder = DuplicateFinder::new(FinderConfig::default()).unwrap();
    let scan = finder.scan(&[dir.path().to_str().unwrap()]).unwrap();
    let result = finder.find_in_report(&scan).unwrap();

    let out = tempdir().unwrap();
    let report_path = out.path().join("duplicates_report.json");
    DuplicateReport::new(&scan.root_paths(), &result)
        .save(&report_path)
        .unwrap();

    let raw: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(raw["summary"]["files"], 3);
    assert_eq!(raw["summary"]["duplicate_groups"], 1);
    assert_eq!(raw["summary"]["duplicate_files"], 1);
    assert_eq!(raw["summary"]["reclaimable_bytes"], 9);
    assert_eq!(raw["groups"][0]["size_bytes"], 9);
    assert!(raw["groups"][0]["hash"]
        .as_str()
        .unwrap()
        .starts_with("blake3:"));
    assert_eq!(raw["groups"][0]["candidates"].as_array().unwrap().len(), 1);
}

#[test]
fn test_execution_report_saved() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.txt"), b"exec report").unwrap();
    fs::write(dir.path().join("b.txt"), b"exec report").unwrap();

    let finder = DuplicateFinder::new(FinderConfig::default()).unwrap();
    let scan = finder.scan(&[dir.path().to_str().unwrap()]).unwrap();
    let result = finder.find_in_report(&scan).unwrap();
    let plan = build_plan(&result.groups, ActionKind::Delete, &PlanOptions::default()).unwrap();

    let report: ExecutionReport = PlanExecutor::new(ExecutorConfig::default())
        .execute(&plan, true)
        .unwrap();
    let out = tempdir().unwrap();
    let path = out.path().join("execution_report.json");
    report.save(&path).unwrap();

    let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["plan_version"], PLAN_VERSION);
    assert_eq!(raw["dry_run"], true);
    assert_eq!(raw["interrupted"], false);
    assert_eq!(raw["results"][0]["status"], "skipped_dry_run");
    assert_eq!(raw["results"][0]["action_id"], plan.actions[0].action_id.as_str());
    assert_eq!(raw["summary"]["skipped"], 1);
}
