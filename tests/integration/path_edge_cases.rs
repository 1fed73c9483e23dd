use mrclean::duplicates::{DuplicateFinder, FindResult, FinderConfig};
use mrclean::plan::{build_plan, ActionKind, CleanupPlan, PlanOptions};
use mrclean::scanner::{normalize, PathStyle};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tempfile::tempdir;
use unicode_normalization::UnicodeNormalization;

fn find(root: &Path) -> FindResult {
    let finder = DuplicateFinder::new(FinderConfig::default()).unwrap();
    let report = finder.scan(&[root.to_str().unwrap()]).unwrap();
    finder.find_in_report(&report).unwrap()
}

#[test]
fn test_paths_with_quotes() {
    let dir = tempdir().unwrap();

    // Windows does not allow double quotes in filenames.
    if cfg!(not(windows)) {
        let quote_name = "file_with_\"quote\".txt";
        File::create(dir.path().join(quote_name))
            .unwrap()
            .write_all(b"content")
            .unwrap();
        File::create(dir.path().join("duplicate.txt"))
            .unwrap()
            .write_all(b"content")
            .unwrap();

        let result = find(dir.path());
        assert_eq!(result.groups.len(), 1);
        assert!(result.groups[0]
            .members()
            .any(|f| f.canonical_path.contains('"')));

        // Quotes survive a plan JSON round trip.
        let plan = build_plan(&result.groups, ActionKind::Delete, &PlanOptions::default()).unwrap();
        let reloaded = CleanupPlan::from_json(&plan.to_json().unwrap()).unwrap();
        assert_eq!(reloaded, plan);
    }
}

#[test]
fn test_paths_with_newlines() {
    let dir = tempdir().unwrap();

    // Windows does not allow newlines in filenames.
    if cfg!(not(windows)) {
        File::create(dir.path().join("file_with\nnewline.txt"))
            .unwrap()
            .write_all(b"content")
            .unwrap();
        File::create(dir.path().join("duplicate.txt"))
            .unwrap()
            .write_all(b"content")
            .unwrap();

        let result = find(dir.path());
        assert_eq!(result.groups.len(), 1);
        assert!(result.groups[0]
            .members()
            .any(|f| f.canonical_path.contains('\n')));
    }
}

#[test]
fn test_paths_with_spaces_and_parentheses() {
    let dir = tempdir().unwrap();
    let data = dir.path().join("my data");
    let quarantine = dir.path().join("quarantine (old)");
    fs::create_dir(&data).unwrap();
    fs::write(data.join("report (final).pdf"), b"pdf").unwrap();
    fs::write(data.join("report (final) copy.pdf"), b"pdf").unwrap();

    let result = find(&data);
    assert_eq!(result.groups.len(), 1);

    let options = PlanOptions::default()
        .with_roots(vec![data.to_str().unwrap().to_string()])
        .with_destination_root(quarantine.to_str().unwrap());
    let plan = build_plan(&result.groups, ActionKind::Move, &options).unwrap();
    let destination = plan.actions[0].destination().unwrap();
    assert!(destination.starts_with(quarantine.to_str().unwrap()));
    assert!(destination.ends_with(".pdf"));
}

#[test]
fn test_extremely_long_paths() {
    let dir = tempdir().unwrap();

    let mut current_path = dir.path().to_path_buf();
    let folder_name = "a".repeat(50);

    // 6 levels of 50-char folders = 300+ chars.
    for i in 0..6 {
        current_path = current_path.join(format!("{}_{}", i, folder_name));
        if let Err(e) = fs::create_dir(&current_path) {
            eprintln!(
                "Skipping extremely long path test: failed to create dir: {}",
                e
            );
            return;
        }
    }

    let file_path = current_path.join("file.txt");
    if let Err(e) = File::create(&file_path).and_then(|mut f| f.write_all(b"content")) {
        eprintln!(
            "Skipping extremely long path test: failed to create file: {}",
            e
        );
        return;
    }
    fs::write(dir.path().join("duplicate.txt"), b"content").unwrap();

    let result = find(dir.path());
    assert_eq!(result.groups.len(), 1);
    assert!(result.groups[0]
        .members()
        .any(|f| f.canonical_path.len() > 300));
}

#[test]
fn test_unicode_nfd_names() {
    let dir = tempdir().unwrap();

    let name_nfc = "café_test.txt";
    let name_nfd = "cafe\u{0301}_test.txt";
    assert_ne!(name_nfc, name_nfd);
    assert_eq!(name_nfc, name_nfd.nfc().collect::<String>());

    fs::write(dir.path().join(name_nfc), b"content").unwrap();
    let _ = fs::write(dir.path().join(name_nfd), b"content");

    // Normalizing filesystems store both names as one file.
    let file_count = fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|ft| ft.is_file()).unwrap_or(false))
        .count();
    if file_count == 1 {
        fs::write(dir.path().join("other_file.txt"), b"content").unwrap();
    }

    let result = find(dir.path());
    assert_eq!(result.groups.len(), 1);
    assert_eq!(result.groups[0].len(), 2);
}

#[test]
fn test_windows_and_wsl_inputs_share_identity() {
    let windows = normalize(r"C:\Users\me\Photos");
    let forward = normalize("C:/Users/me/Photos/");
    let wsl = normalize("/mnt/c/Users/me/Photos");

    assert_eq!(windows.style, PathStyle::Windows);
    assert_eq!(wsl.style, PathStyle::Posix);
    assert_eq!(windows.canonical_path, forward.canonical_path);
    if cfg!(not(windows)) {
        assert_eq!(windows.canonical_path, wsl.canonical_path);
        assert_eq!(
            windows.display_for("/mnt/c/Users/me/Photos/2020/a.jpg"),
            r"C:\Users\me\Photos\2020\a.jpg"
        );
    }
}
