//! Scan report: the persisted result of a walk.
//!
//! A scan report lists every file found under the roots with its size and
//! timestamps, plus the errors hit along the way. `dedupe --from-report`
//! feeds a saved report back through [`ScanReport::records`] instead of
//! walking again, and the SHA-256 of the report bytes becomes the cleanup
//! plan's `source_report_digest`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::path_utils::{NormalizedPath, PathStyle};
use super::{FileKind, FileRecord, ScanError, Walker};
use crate::output::write_atomic;

/// Current scan report format version.
pub const SCAN_REPORT_VERSION: u32 = 1;

/// Default file name for `scan --out`.
pub const DEFAULT_SCAN_REPORT: &str = "scan_report.json";

/// One root as supplied by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRoot {
    /// Input exactly as typed
    pub input: String,
    /// Canonical path
    pub os_path: String,
    /// Style the input was written in
    pub style: PathStyle,
}

/// One file entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportFile {
    /// Display path
    pub path: String,
    /// Canonical path
    pub os_path: String,
    /// Size in bytes
    pub size_bytes: u64,
    /// Modification time
    pub mtime: DateTime<Utc>,
    /// Access time
    pub atime: DateTime<Utc>,
    /// Status change time
    pub ctime: DateTime<Utc>,
    /// Device id, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<u64>,
    /// Inode number, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inode: Option<u64>,
    /// Entry kind; omitted for regular files
    #[serde(default, skip_serializing_if = "FileKind::is_regular")]
    pub kind: FileKind,
}

impl From<&FileRecord> for ReportFile {
    fn from(record: &FileRecord) -> Self {
        Self {
            path: record.display_path.clone(),
            os_path: record.canonical_path.clone(),
            size_bytes: record.size_bytes,
            mtime: record.mtime,
            atime: record.atime,
            ctime: record.ctime,
            device_id: record.device_id,
            inode: record.inode,
            kind: record.kind,
        }
    }
}

impl From<&ReportFile> for FileRecord {
    fn from(file: &ReportFile) -> Self {
        Self {
            canonical_path: file.os_path.clone(),
            display_path: file.path.clone(),
            size_bytes: file.size_bytes,
            mtime: file.mtime,
            atime: file.atime,
            ctime: file.ctime,
            device_id: file.device_id,
            inode: file.inode,
            kind: file.kind,
        }
    }
}

/// One error entry. Root failures carry `input`, entry failures `path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportError {
    /// Root input that failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    /// Display path of the entry that failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Canonical path, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_path: Option<String>,
    /// Error message
    pub error: String,
}

/// Totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ReportSummary {
    /// Number of file entries
    pub files: usize,
    /// Number of error entries
    pub errors: usize,
}

/// A complete scan report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanReport {
    /// Format version
    pub version: u32,
    /// When the walk ran
    pub generated_at: DateTime<Utc>,
    /// Roots as supplied
    pub roots: Vec<ReportRoot>,
    /// Files found
    pub files: Vec<ReportFile>,
    /// Failures
    pub errors: Vec<ReportError>,
    /// Totals
    pub summary: ReportSummary,
}

impl ScanReport {
    /// Drain a walker into a report.
    #[must_use]
    pub fn collect(walker: Walker) -> Self {
        let roots: Vec<NormalizedPath> = walker.roots().to_vec();
        let mut files = Vec::new();
        let mut errors = Vec::new();

        for result in walker.walk() {
            match result {
                Ok(record) => files.push(ReportFile::from(&record)),
                Err(err) => errors.push(report_error(&roots, &err)),
            }
        }

        log::info!(
            "Scan complete: {} files, {} errors",
            files.len(),
            errors.len()
        );

        Self::new(roots, files, errors)
    }

    /// Build a report from parts, computing the summary.
    #[must_use]
    pub fn new(roots: Vec<NormalizedPath>, files: Vec<ReportFile>, errors: Vec<ReportError>) -> Self {
        let summary = ReportSummary {
            files: files.len(),
            errors: errors.len(),
        };
        Self {
            version: SCAN_REPORT_VERSION,
            generated_at: Utc::now(),
            roots: roots
                .into_iter()
                .map(|r| ReportRoot {
                    input: r.original,
                    os_path: r.canonical_path,
                    style: r.style,
                })
                .collect(),
            files,
            errors,
            summary,
        }
    }

    /// The files as records, in report order.
    pub fn records(&self) -> impl Iterator<Item = FileRecord> + '_ {
        self.files.iter().map(FileRecord::from)
    }

    /// Canonical root paths.
    #[must_use]
    pub fn root_paths(&self) -> Vec<String> {
        self.roots.iter().map(|r| r.os_path.clone()).collect()
    }

    /// Pretty JSON, exactly as [`save`](Self::save) writes it.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize scan report")
    }

    /// SHA-256 (hex) of the serialized report.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn digest(&self) -> Result<String> {
        Ok(digest_bytes(self.to_json()?.as_bytes()))
    }

    /// Write the report atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the report cannot be serialized or written.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        write_atomic(path, json.as_bytes())
            .with_context(|| format!("Failed to write scan report: {}", path.display()))
    }

    /// Load a report and the SHA-256 digest of its bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if its
    /// version is unsupported.
    pub fn load(path: &Path) -> Result<(Self, String)> {
        let bytes = fs::read(path)
            .with_context(|| format!("Failed to read scan report: {}", path.display()))?;
        let report: Self = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse scan report: {}", path.display()))?;

        if report.version != SCAN_REPORT_VERSION {
            anyhow::bail!(
                "Unsupported scan report version {} (expected {})",
                report.version,
                SCAN_REPORT_VERSION
            );
        }

        log::debug!(
            "Loaded scan report {} ({} files)",
            path.display(),
            report.files.len()
        );
        Ok((report, digest_bytes(&bytes)))
    }
}

/// SHA-256 of `bytes` as lowercase hex.
#[must_use]
pub fn digest_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn report_error(roots: &[NormalizedPath], err: &ScanError) -> ReportError {
    let os_path = err.path();
    let root = os_path
        .as_deref()
        .and_then(|p| roots.iter().find(|r| r.canonical_path == p));

    match root {
        Some(root) => ReportError {
            input: Some(root.original.clone()),
            path: None,
            os_path,
            error: err.to_string(),
        },
        None => ReportError {
            input: None,
            path: os_path.as_deref().map(|p| display_under(roots, p)),
            os_path,
            error: err.to_string(),
        },
    }
}

/// Render `canonical` in the style of the root that contains it.
fn display_under(roots: &[NormalizedPath], canonical: &str) -> String {
    roots
        .iter()
        .find(|r| super::path_utils::is_within(canonical, &r.canonical_path))
        .map_or_else(|| canonical.to_string(), |r| r.display_for(canonical))
}
