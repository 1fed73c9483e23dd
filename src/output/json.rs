//! Duplicate report: the machine-readable result of `dedupe`.
//!
//! # Output Schema
//!
//! ```json
//! {
//!   "version": 1,
//!   "generated_at": "2024-05-01T12:00:00Z",
//!   "roots": ["/data"],
//!   "groups": [
//!     {
//!       "hash": "blake3:abc123...",
//!       "size_bytes": 1024,
//!       "keeper": { "path": "/data/a.txt", "os_path": "/data/a.txt", "mtime": "..." },
//!       "candidates": [ { "path": "/data/b.txt", "os_path": "/data/b.txt", "mtime": "..." } ]
//!     }
//!   ],
//!   "errors": [ { "path": "/data/locked", "error": "Permission denied: /data/locked" } ],
//!   "skipped": [ { "path": "/data/link", "os_path": "/data/link", "kind": "symlink" } ],
//!   "summary": {
//!     "files": 3,
//!     "unique_files": 1,
//!     "duplicate_groups": 1,
//!     "duplicate_files": 1,
//!     "reclaimable_bytes": 1024,
//!     "errors": 1
//!   }
//! }
//! ```

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::duplicates::{DuplicateGroup, FindResult, SkippedFile};
use crate::scanner::FileRecord;

use super::write_atomic;

/// Current duplicate report format version.
pub const DUPLICATES_REPORT_VERSION: u32 = 1;

/// Default file name for `dedupe --out`.
pub const DEFAULT_DUPLICATES_REPORT: &str = "duplicates_report.json";

/// One group member.
///
/// Field names follow the scan report: `path` is the display path,
/// `os_path` the canonical path.
#[derive(Debug, Clone, Serialize)]
pub struct ReportMember {
    /// Path as shown to the user
    pub path: String,
    /// Canonical path
    pub os_path: String,
    /// Last modification time
    pub mtime: DateTime<Utc>,
}

impl From<&FileRecord> for ReportMember {
    fn from(record: &FileRecord) -> Self {
        Self {
            path: record.display_path.clone(),
            os_path: record.canonical_path.clone(),
            mtime: record.mtime,
        }
    }
}

/// A duplicate group in report form.
#[derive(Debug, Clone, Serialize)]
pub struct ReportGroup {
    /// Group key (`blake3:<hex>` or `inode:<dev>:<ino>`)
    pub hash: String,
    /// Size of each member
    pub size_bytes: u64,
    /// The retained file
    pub keeper: ReportMember,
    /// Files proposed for cleanup
    pub candidates: Vec<ReportMember>,
}

impl From<&DuplicateGroup> for ReportGroup {
    fn from(group: &DuplicateGroup) -> Self {
        Self {
            hash: group.key().to_string(),
            size_bytes: group.size_bytes(),
            keeper: group.keeper().into(),
            candidates: group.candidates().iter().map(ReportMember::from).collect(),
        }
    }
}

/// A file that could not be fingerprinted.
#[derive(Debug, Clone, Serialize)]
pub struct ReportHashError {
    /// Canonical path
    pub os_path: String,
    /// What went wrong
    pub error: String,
}

/// Totals.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReportTotals {
    /// Regular files fingerprinted
    pub files: usize,
    /// Files in no group
    pub unique_files: usize,
    /// Number of groups
    pub duplicate_groups: usize,
    /// Candidates across all groups
    pub duplicate_files: usize,
    /// Bytes freed by removing every candidate
    pub reclaimable_bytes: u64,
    /// Files that failed to hash
    pub errors: usize,
}

/// Complete duplicate report.
#[derive(Debug, Clone, Serialize)]
pub struct DuplicateReport {
    /// Format version
    pub version: u32,
    /// When the report was produced
    pub generated_at: DateTime<Utc>,
    /// Canonical roots that were scanned
    pub roots: Vec<String>,
    /// Duplicate groups, largest files first
    pub groups: Vec<ReportGroup>,
    /// Per-file hashing failures
    pub errors: Vec<ReportHashError>,
    /// Entries that were not hashed (symlinks, special files)
    pub skipped: Vec<SkippedFile>,
    /// Totals
    pub summary: ReportTotals,
}

impl DuplicateReport {
    /// Build a report from a detection result.
    #[must_use]
    pub fn new(roots: &[String], result: &FindResult) -> Self {
        let summary = &result.summary;
        Self {
            version: DUPLICATES_REPORT_VERSION,
            generated_at: Utc::now(),
            roots: roots.to_vec(),
            groups: result.groups.iter().map(ReportGroup::from).collect(),
            errors: result
                .fingerprints
                .errors
                .iter()
                .map(|err| ReportHashError {
                    os_path: err.path().to_string(),
                    error: err.to_string(),
                })
                .collect(),
            skipped: result.fingerprints.skipped.clone(),
            summary: ReportTotals {
                files: summary.total_files,
                unique_files: summary.unique_files,
                duplicate_groups: summary.duplicate_groups,
                duplicate_files: summary.duplicate_files,
                reclaimable_bytes: summary.reclaimable_bytes,
                errors: summary.hash_errors,
            },
        }
    }

    /// Serialize to pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write JSON to a writer, followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        let json = self.to_json_pretty()?;
        writer.write_all(json.as_bytes())?;
        writer.write_all(b"\n")?;
        Ok(())
    }

    /// Write the report atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the report cannot be serialized or written.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = self.to_json_pretty().context("Failed to serialize duplicate report")?;
        write_atomic(path, json.as_bytes())
            .with_context(|| format!("Failed to write duplicate report: {}", path.display()))
    }
}
