//! Fingerprint engine: size, quick hash and full hash per file.
//!
//! # Overview
//!
//! Fingerprinting reads as little as possible:
//!
//! 1. **Size** (metadata only): files of a unique size stop here.
//! 2. **Quick hash**: BLAKE3 of the leading window, only for files that
//!    share a size.
//! 3. **Full hash**: BLAKE3 of the whole file, only for files that share
//!    both size and quick hash.
//!
//! Paths that point at one inode are read once: the first link (by path)
//! is hashed and the other links inherit its hashes. A set of links with
//! nothing else of its size or quick hash is never read in full; its
//! members are fingerprinted by inode identity instead.
//!
//! A file reached under two spellings (a symlinked directory, or roots
//! given both relative and absolute) is one file, not two links: such
//! records are collapsed onto the spelling that is not behind a symlink.
//!
//! Zero-byte files all have the same content and get the empty-input hash
//! without touching the disk.
//!
//! Hashing runs on a bounded rayon pool. Results land in a `BTreeMap`
//! keyed by canonical path, so thread scheduling never affects the output.
//!
//! # Example
//!
//! ```no_run
//! use mrclean::duplicates::{FingerprintConfig, FingerprintEngine};
//! use mrclean::scanner::{Walker, WalkerConfig};
//!
//! let engine = FingerprintEngine::new(FingerprintConfig::default())?;
//! let records = Walker::new(&["."], WalkerConfig::default())
//!     .walk()
//!     .filter_map(Result::ok);
//! let set = engine.fingerprint(records);
//! println!("{} files fingerprinted, {} errors", set.len(), set.errors.len());
//! # Ok::<(), mrclean::duplicates::FingerprintError>(())
//! ```

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;

use crate::progress::ProgressCallback;
use crate::scanner::hardlink::{partition_links, LinkSet};
use crate::scanner::path_utils;
use crate::scanner::{
    FileKind, FileRecord, Hash, HashError, Hasher, InodeKey, CHUNK_BYTES, QUICK_HASH_BYTES,
};

use super::groups::group_by_size;

/// Content fingerprint of one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprint {
    /// File size in bytes
    pub size_bytes: u64,
    /// Hash of the leading window, when computed
    pub quick_hash: Option<Hash>,
    /// Hash of the whole file, when computed
    pub full_hash: Option<Hash>,
    /// Inode identity, when the file was matched by link rather than content
    pub hardlink: Option<InodeKey>,
}

impl Fingerprint {
    /// A fingerprint carrying only the size.
    #[must_use]
    pub const fn size_only(size_bytes: u64) -> Self {
        Self {
            size_bytes,
            quick_hash: None,
            full_hash: None,
            hardlink: None,
        }
    }
}

/// A record together with its fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerprintedFile {
    /// The scanned file
    pub record: FileRecord,
    /// What is known about its content
    pub fingerprint: Fingerprint,
}

/// An entry that was not fingerprinted because it is not a regular file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
    /// Display path
    pub path: String,
    /// Canonical path
    pub os_path: String,
    /// Entry kind
    pub kind: FileKind,
}

impl From<&FileRecord> for SkippedFile {
    fn from(record: &FileRecord) -> Self {
        Self {
            path: record.display_path.clone(),
            os_path: record.canonical_path.clone(),
            kind: record.kind,
        }
    }
}

/// Counters from one fingerprinting pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FingerprintStats {
    /// Records received
    pub input_records: usize,
    /// Records dropped because their path was already seen
    pub repeated_records: usize,
    /// Records dropped because they name an already-recorded file
    pub aliased_records: usize,
    /// Regular files fingerprinted
    pub regular_files: usize,
    /// Files eliminated by size alone
    pub size_unique: usize,
    /// Zero-byte files
    pub empty_files: usize,
    /// Quick hashes read from disk
    pub quick_hashed: usize,
    /// Full hashes read from disk
    pub full_hashed: usize,
    /// Full hashes taken from the quick hash (file fits in the window)
    pub full_from_quick: usize,
    /// Paths that inherited hashes from another link to the same inode
    pub inherited: usize,
    /// Paths fingerprinted by inode identity alone
    pub hardlink_shortcuts: usize,
    /// Bytes read while hashing
    pub bytes_read: u64,
    /// Paths excluded because hashing failed
    pub failed: usize,
}

/// Output of [`FingerprintEngine::fingerprint`].
#[derive(Debug, Default)]
pub struct FingerprintSet {
    /// Successfully fingerprinted files keyed by canonical path
    pub files: BTreeMap<String, FingerprintedFile>,
    /// Files that could not be hashed; excluded from `files`
    pub errors: Vec<HashError>,
    /// Symlinks and special files
    pub skipped: Vec<SkippedFile>,
    /// Counters
    pub stats: FingerprintStats,
    /// Whether shutdown cut the pass short
    pub interrupted: bool,
}

impl FingerprintSet {
    /// Fingerprint for a canonical path.
    #[must_use]
    pub fn get(&self, canonical_path: &str) -> Option<&Fingerprint> {
        self.files.get(canonical_path).map(|f| &f.fingerprint)
    }

    /// Number of fingerprinted files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether no file was fingerprinted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Total bytes across fingerprinted files.
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.files.values().map(|f| f.record.size_bytes).sum()
    }

    fn update(&mut self, canonical_path: &str, apply: impl FnOnce(&mut Fingerprint)) {
        if let Some(file) = self.files.get_mut(canonical_path) {
            apply(&mut file.fingerprint);
        }
    }
}

/// Errors that prevent the engine from starting.
#[derive(thiserror::Error, Debug)]
pub enum FingerprintError {
    /// The hashing thread pool could not be created.
    #[error("Failed to build hashing thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Configuration for the fingerprint engine.
#[derive(Clone)]
pub struct FingerprintConfig {
    /// Number of hashing threads. Default is 4 to limit disk contention.
    pub io_threads: usize,
    /// Quick-hash window in bytes.
    pub quick_hash_bytes: usize,
    /// Streaming chunk size in bytes.
    pub chunk_bytes: usize,
    /// Read each inode once and match otherwise-unique link sets by identity.
    pub hardlink_shortcut: bool,
    /// Optional shutdown flag for graceful termination.
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback for reporting.
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for FingerprintConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FingerprintConfig")
            .field("io_threads", &self.io_threads)
            .field("quick_hash_bytes", &self.quick_hash_bytes)
            .field("chunk_bytes", &self.chunk_bytes)
            .field("hardlink_shortcut", &self.hardlink_shortcut)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self {
            io_threads: 4,
            quick_hash_bytes: QUICK_HASH_BYTES,
            chunk_bytes: CHUNK_BYTES,
            hardlink_shortcut: true,
            shutdown_flag: None,
            progress_callback: None,
        }
    }
}

impl FingerprintConfig {
    /// Set the number of hashing threads (at least one).
    #[must_use]
    pub fn with_io_threads(mut self, threads: usize) -> Self {
        self.io_threads = threads.max(1);
        self
    }

    /// Set the quick-hash window (at least one byte).
    #[must_use]
    pub fn with_quick_hash_bytes(mut self, bytes: usize) -> Self {
        self.quick_hash_bytes = bytes.max(1);
        self
    }

    /// Set the streaming chunk size (at least one byte).
    #[must_use]
    pub fn with_chunk_bytes(mut self, bytes: usize) -> Self {
        self.chunk_bytes = bytes.max(1);
        self
    }

    /// Enable or disable the hardlink shortcut.
    #[must_use]
    pub fn with_hardlink_shortcut(mut self, enabled: bool) -> Self {
        self.hardlink_shortcut = enabled;
        self
    }

    /// Set the shutdown flag for graceful termination.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }
}

enum HashOutcome {
    Hashed(Hash),
    Failed(HashError),
    Abandoned,
}

/// BLAKE3 of zero bytes.
#[must_use]
pub fn empty_hash() -> Hash {
    *blake3::hash(&[]).as_bytes()
}

/// Drop records that reach an already-recorded file under another path.
///
/// Only paths sharing an inode are resolved. Among spellings of one real
/// location, the one equal to that location wins, else the smallest path.
/// Separate hardlinks resolve to different locations and are kept.
fn collapse_aliases(set: &mut FingerprintSet) {
    let mut by_inode: BTreeMap<InodeKey, Vec<String>> = BTreeMap::new();
    for (path, file) in &set.files {
        if let Some(key) = file.record.inode_key() {
            by_inode.entry(key).or_default().push(path.clone());
        }
    }

    for paths in by_inode.into_values().filter(|paths| paths.len() > 1) {
        let mut by_location: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for path in paths {
            if let Some(real) = path_utils::resolve_real(&path) {
                by_location.entry(real).or_default().push(path);
            }
        }

        for (real, spellings) in by_location {
            if spellings.len() < 2 {
                continue;
            }
            let kept = spellings
                .iter()
                .find(|path| **path == real)
                .unwrap_or(&spellings[0])
                .clone();
            for alias in spellings.into_iter().filter(|path| *path != kept) {
                log::debug!("{alias} is {kept} under another path, dropping it");
                set.files.remove(&alias);
                set.stats.aliased_records += 1;
            }
        }
    }

    if set.stats.aliased_records > 0 {
        log::info!(
            "Dropped {} record(s) naming a file already seen under another path",
            set.stats.aliased_records
        );
    }
}

/// Computes fingerprints on a bounded thread pool.
pub struct FingerprintEngine {
    config: FingerprintConfig,
    hasher: Hasher,
    pool: rayon::ThreadPool,
}

impl std::fmt::Debug for FingerprintEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FingerprintEngine")
            .field("config", &self.config)
            .field("threads", &self.pool.current_num_threads())
            .finish()
    }
}

impl FingerprintEngine {
    /// Create an engine and its thread pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread pool cannot be built.
    pub fn new(config: FingerprintConfig) -> Result<Self, FingerprintError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.io_threads.max(1))
            .thread_name(|idx| format!("mrclean-hash-{idx}"))
            .build()?;

        let mut hasher = Hasher::new()
            .with_quick_hash_bytes(config.quick_hash_bytes)
            .with_chunk_bytes(config.chunk_bytes);
        if let Some(flag) = &config.shutdown_flag {
            hasher = hasher.with_shutdown_flag(Arc::clone(flag));
        }

        Ok(Self {
            config,
            hasher,
            pool,
        })
    }

    /// The engine configuration.
    #[must_use]
    pub fn config(&self) -> &FingerprintConfig {
        &self.config
    }

    /// Fingerprint a sequence of records.
    ///
    /// Never fails as a whole: unreadable files become entries in
    /// [`FingerprintSet::errors`] and are left out of [`FingerprintSet::files`].
    pub fn fingerprint<I>(&self, records: I) -> FingerprintSet
    where
        I: IntoIterator<Item = FileRecord>,
    {
        let mut set = FingerprintSet::default();

        for record in records {
            if self.config.is_shutdown_requested() {
                set.interrupted = true;
                break;
            }
            set.stats.input_records += 1;

            if !record.kind.is_regular() {
                log::debug!("Skipping {} entry: {}", record.kind, record.canonical_path);
                set.skipped.push(SkippedFile::from(&record));
                continue;
            }

            match set.files.entry(record.canonical_path.clone()) {
                Entry::Occupied(_) => {
                    set.stats.repeated_records += 1;
                    log::debug!("Ignoring repeated record: {}", record.canonical_path);
                }
                Entry::Vacant(slot) => {
                    slot.insert(FingerprintedFile {
                        fingerprint: Fingerprint::size_only(record.size_bytes),
                        record,
                    });
                }
            }
        }

        if set.interrupted {
            log::info!("Fingerprinting interrupted while reading records");
            return set;
        }

        collapse_aliases(&mut set);
        set.stats.regular_files = set.files.len();

        // Phase 1: size buckets
        let (buckets, size_stats) = group_by_size(set.files.values().map(|f| f.record.clone()));
        set.stats.size_unique = size_stats.eliminated_unique;
        set.stats.empty_files = size_stats.empty_files;

        let mut quick_jobs: Vec<(u64, LinkSet)> = Vec::new();
        for (size, members) in buckets {
            if size == 0 {
                let hash = empty_hash();
                for member in &members {
                    set.update(&member.canonical_path, |fp| fp.full_hash = Some(hash));
                }
                continue;
            }

            let units = partition_links(members, self.config.hardlink_shortcut);
            if let [only] = units.as_slice() {
                self.assign_hardlink(&mut set, only);
                continue;
            }
            quick_jobs.extend(units.into_iter().map(|unit| (size, unit)));
        }

        // Phase 2: quick hash
        let quick_results = self.hash_units("quick_hash", quick_jobs, |hasher, record| {
            hasher.quick_hash(&record.os_path(), record.size_bytes)
        });

        let mut sub_buckets: BTreeMap<(u64, Hash), Vec<LinkSet>> = BTreeMap::new();
        for (size, unit, outcome) in quick_results {
            match outcome {
                HashOutcome::Hashed(hash) => {
                    set.stats.quick_hashed += 1;
                    set.stats.bytes_read += size.min(self.hasher.quick_hash_bytes() as u64);
                    for member in unit.members() {
                        set.update(&member.canonical_path, |fp| fp.quick_hash = Some(hash));
                    }
                    sub_buckets.entry((size, hash)).or_default().push(unit);
                }
                HashOutcome::Failed(err) => self.record_failure(&mut set, &unit, err),
                HashOutcome::Abandoned => set.interrupted = true,
            }
        }

        log::info!(
            "Phase 2 complete: {} quick hashes, {} candidate buckets",
            set.stats.quick_hashed,
            sub_buckets.values().filter(|units| units.len() > 1).count()
        );

        if set.interrupted || self.config.is_shutdown_requested() {
            set.interrupted = true;
            log::info!("Fingerprinting interrupted during quick hashing");
            return set;
        }

        // Phase 3: full hash
        let window = self.hasher.quick_hash_bytes() as u64;
        let mut full_jobs: Vec<(u64, LinkSet)> = Vec::new();
        for ((size, quick), units) in sub_buckets {
            if let [only] = units.as_slice() {
                if only.is_linked() {
                    self.assign_hardlink(&mut set, only);
                }
                continue;
            }

            if size <= window {
                // The window covered the whole file.
                for unit in &units {
                    self.assign_full_hash(&mut set, unit, quick);
                    set.stats.full_from_quick += unit.len();
                }
                continue;
            }
            full_jobs.extend(units.into_iter().map(|unit| (size, unit)));
        }

        let full_results = self.hash_units("full_hash", full_jobs, |hasher, record| {
            hasher.full_hash(&record.os_path(), record.size_bytes)
        });

        for (size, unit, outcome) in full_results {
            match outcome {
                HashOutcome::Hashed(hash) => {
                    set.stats.full_hashed += 1;
                    set.stats.bytes_read += size;
                    self.assign_full_hash(&mut set, &unit, hash);
                }
                HashOutcome::Failed(err) => self.record_failure(&mut set, &unit, err),
                HashOutcome::Abandoned => set.interrupted = true,
            }
        }

        log::info!(
            "Phase 3 complete: {} full hashes ({} from quick hash), {} inherited by links, {} failed",
            set.stats.full_hashed,
            set.stats.full_from_quick,
            set.stats.inherited,
            set.stats.failed
        );

        set
    }

    fn hash_units<F>(
        &self,
        phase: &str,
        jobs: Vec<(u64, LinkSet)>,
        op: F,
    ) -> Vec<(u64, LinkSet, HashOutcome)>
    where
        F: Fn(&Hasher, &FileRecord) -> Result<Hash, HashError> + Sync,
    {
        if jobs.is_empty() {
            return Vec::new();
        }

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_start(phase, jobs.len());
        }
        log::info!("{}: hashing {} files", phase, jobs.len());

        let results = self.pool.install(|| {
            jobs.into_par_iter()
                .enumerate()
                .map(|(idx, (size, unit))| {
                    if self.config.is_shutdown_requested() {
                        return (size, unit, HashOutcome::Abandoned);
                    }

                    let representative = unit.representative();
                    if let Some(ref callback) = self.config.progress_callback {
                        callback.on_progress(idx + 1, &representative.display_path);
                    }

                    let outcome = match op(&self.hasher, representative) {
                        Ok(hash) => {
                            log::trace!("{} {}", phase, representative.canonical_path);
                            HashOutcome::Hashed(hash)
                        }
                        Err(e) if e.is_interrupted() => HashOutcome::Abandoned,
                        Err(e) => {
                            log::warn!("Failed to hash {}: {}", representative.display_path, e);
                            HashOutcome::Failed(e)
                        }
                    };

                    if let Some(ref callback) = self.config.progress_callback {
                        callback.on_item_completed(size);
                    }
                    (size, unit, outcome)
                })
                .collect()
        });

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_end(phase);
        }
        results
    }

    fn assign_full_hash(&self, set: &mut FingerprintSet, unit: &LinkSet, hash: Hash) {
        set.stats.inherited += unit.len() - 1;
        for member in unit.members() {
            set.update(&member.canonical_path, |fp| fp.full_hash = Some(hash));
        }
    }

    fn assign_hardlink(&self, set: &mut FingerprintSet, unit: &LinkSet) {
        let Some(key) = unit.key() else {
            return;
        };
        if !unit.is_linked() {
            return;
        }
        log::debug!(
            "{} links to {} matched by identity",
            unit.len(),
            unit.representative().canonical_path
        );
        set.stats.hardlink_shortcuts += unit.len();
        for member in unit.members() {
            set.update(&member.canonical_path, |fp| fp.hardlink = Some(key));
        }
    }

    fn record_failure(&self, set: &mut FingerprintSet, unit: &LinkSet, err: HashError) {
        let representative = unit.representative().canonical_path.clone();
        for member in unit.members() {
            set.files.remove(&member.canonical_path);
            set.stats.failed += 1;
            if member.canonical_path != representative {
                set.errors.push(HashError::LinkedUnreadable {
                    path: member.canonical_path.clone(),
                    representative: representative.clone(),
                });
            }
        }
        set.errors.push(err);
    }
}
