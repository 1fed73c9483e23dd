//! End-to-end duplicate detection: records in, duplicate groups out.
//!
//! # Overview
//!
//! [`DuplicateFinder`] wires the pieces together:
//!
//! 1. **Scan** - walk the roots into a [`ScanReport`] (or load one)
//! 2. **Fingerprint** - size, quick hash, full hash ([`FingerprintEngine`])
//! 3. **Group** - collect matches and pick keepers ([`group`])
//!
//! Per-file failures never stop the pipeline; they are carried in the
//! result. Only a shutdown request or an internal inconsistency turns into
//! a [`FinderError`].
//!
//! # Example
//!
//! ```no_run
//! use mrclean::duplicates::{DuplicateFinder, FinderConfig};
//!
//! let finder = DuplicateFinder::new(FinderConfig::default())?;
//! let report = finder.scan(&["/srv/photos"])?;
//! let result = finder.find_in_report(&report)?;
//! for group in &result.groups {
//!     println!("keep {} ({} copies)", group.keeper().display_path, group.duplicate_count());
//! }
//! # Ok::<(), mrclean::duplicates::FinderError>(())
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytesize::ByteSize;

use crate::progress::ProgressCallback;
use crate::scanner::{FileRecord, ScanReport, Walker, WalkerConfig};

use super::fingerprint::{FingerprintConfig, FingerprintEngine, FingerprintError, FingerprintSet};
use super::groups::{group, DuplicateGroup, GroupError};

/// Configuration for the duplicate finder.
#[derive(Debug, Clone, Default)]
pub struct FinderConfig {
    /// Fingerprint engine settings
    pub fingerprint: FingerprintConfig,
    /// Walker settings for live scans
    pub walker: WalkerConfig,
}

impl FinderConfig {
    /// Set the fingerprint engine configuration.
    #[must_use]
    pub fn with_fingerprint_config(mut self, config: FingerprintConfig) -> Self {
        self.fingerprint = config;
        self
    }

    /// Set the walker configuration.
    #[must_use]
    pub fn with_walker_config(mut self, config: WalkerConfig) -> Self {
        self.walker = config;
        self
    }

    /// Set the shutdown flag for graceful termination.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.fingerprint.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.fingerprint.progress_callback = Some(callback);
        self
    }
}

/// Totals from one detection run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupeSummary {
    /// Regular files fingerprinted
    pub total_files: usize,
    /// Bytes across those files
    pub total_bytes: u64,
    /// Files not in any group
    pub unique_files: usize,
    /// Number of duplicate groups
    pub duplicate_groups: usize,
    /// Candidates across all groups
    pub duplicate_files: usize,
    /// Bytes freed by removing every candidate
    pub reclaimable_bytes: u64,
    /// Files that failed to hash
    pub hash_errors: usize,
    /// Non-regular entries skipped
    pub skipped: usize,
    /// Wall-clock time
    pub duration: Duration,
}

impl DedupeSummary {
    /// Share of scanned bytes held by candidates, in percent.
    #[must_use]
    pub fn wasted_percentage(&self) -> f64 {
        if self.total_bytes == 0 {
            0.0
        } else {
            (self.reclaimable_bytes as f64 / self.total_bytes as f64) * 100.0
        }
    }

    /// Human-readable reclaimable size.
    #[must_use]
    pub fn reclaimable_display(&self) -> String {
        ByteSize::b(self.reclaimable_bytes).to_string()
    }
}

/// Groups plus everything needed to report on them.
#[derive(Debug)]
pub struct FindResult {
    /// Duplicate groups, largest files first
    pub groups: Vec<DuplicateGroup>,
    /// Per-file fingerprints, errors and skipped entries
    pub fingerprints: FingerprintSet,
    /// Totals
    pub summary: DedupeSummary,
}

/// Errors that stop a detection run.
#[derive(thiserror::Error, Debug)]
pub enum FinderError {
    /// The run was interrupted by user (Ctrl+C or shutdown signal).
    #[error("Scan interrupted by user")]
    Interrupted,

    /// The fingerprint engine could not start.
    #[error(transparent)]
    Fingerprint(#[from] FingerprintError),

    /// Grouping produced an inconsistent result.
    #[error(transparent)]
    Group(#[from] GroupError),
}

/// Duplicate finder that orchestrates scanning, fingerprinting and grouping.
#[derive(Debug)]
pub struct DuplicateFinder {
    config: FinderConfig,
    engine: FingerprintEngine,
}

impl DuplicateFinder {
    /// Create a finder.
    ///
    /// # Errors
    ///
    /// Returns an error if the hashing thread pool cannot be built.
    pub fn new(config: FinderConfig) -> Result<Self, FinderError> {
        let engine = FingerprintEngine::new(config.fingerprint.clone())?;
        Ok(Self { config, engine })
    }

    /// The finder configuration.
    #[must_use]
    pub fn config(&self) -> &FinderConfig {
        &self.config
    }

    fn is_shutdown_requested(&self) -> bool {
        self.config
            .fingerprint
            .shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Walk `roots` into a scan report.
    ///
    /// # Errors
    ///
    /// Returns [`FinderError::Interrupted`] if shutdown was requested.
    pub fn scan<S: AsRef<str>>(&self, roots: &[S]) -> Result<ScanReport, FinderError> {
        let mut walker = Walker::new(roots, self.config.walker.clone());
        if let Some(flag) = &self.config.fingerprint.shutdown_flag {
            walker = walker.with_shutdown_flag(Arc::clone(flag));
        }

        if let Some(ref callback) = self.config.fingerprint.progress_callback {
            callback.on_phase_start("walking", 0);
            callback.on_message(&format!("Walking {} root(s)", walker.roots().len()));
        }

        let report = ScanReport::collect(walker);

        if let Some(ref callback) = self.config.fingerprint.progress_callback {
            callback.on_phase_end("walking");
        }

        if self.is_shutdown_requested() {
            return Err(FinderError::Interrupted);
        }
        Ok(report)
    }

    /// Find duplicates among the files of a scan report.
    ///
    /// # Errors
    ///
    /// See [`find_in_records`](Self::find_in_records).
    pub fn find_in_report(&self, report: &ScanReport) -> Result<FindResult, FinderError> {
        self.find_in_records(report.records())
    }

    /// Find duplicates among arbitrary records.
    ///
    /// # Errors
    ///
    /// Returns [`FinderError::Interrupted`] on shutdown, or
    /// [`FinderError::Group`] if grouping fails its consistency checks.
    pub fn find_in_records<I>(&self, records: I) -> Result<FindResult, FinderError>
    where
        I: IntoIterator<Item = FileRecord>,
    {
        let start = Instant::now();
        let fingerprints = self.engine.fingerprint(records);
        if fingerprints.interrupted || self.is_shutdown_requested() {
            return Err(FinderError::Interrupted);
        }

        let groups = group(&fingerprints)?;

        let grouped: usize = groups.iter().map(DuplicateGroup::len).sum();
        let summary = DedupeSummary {
            total_files: fingerprints.len(),
            total_bytes: fingerprints.total_bytes(),
            unique_files: fingerprints.len().saturating_sub(grouped),
            duplicate_groups: groups.len(),
            duplicate_files: groups.iter().map(DuplicateGroup::duplicate_count).sum(),
            reclaimable_bytes: groups.iter().map(DuplicateGroup::wasted_space).sum(),
            hash_errors: fingerprints.errors.len(),
            skipped: fingerprints.skipped.len(),
            duration: start.elapsed(),
        };

        log::info!(
            "Found {} duplicate groups ({} files, {} reclaimable) in {:.2?}",
            summary.duplicate_groups,
            summary.duplicate_files,
            summary.reclaimable_display(),
            summary.duration
        );

        Ok(FindResult {
            groups,
            fingerprints,
            summary,
        })
    }
}
