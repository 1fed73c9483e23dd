//! Directory walker implementation using jwalk for parallel traversal.
//!
//! # Overview
//!
//! [`Walker`] turns a list of user-supplied roots into a lazy, single-use
//! sequence of [`FileRecord`]s. Directories are read in parallel by
//! [`jwalk`], children are visited in sorted order, and every failure is
//! yielded as a [`ScanError`] so one bad entry never stops the walk.
//!
//! # Features
//!
//! - Roots resolved to canonical form (Windows drive paths included)
//! - Nested or repeated roots are skipped so no file is produced twice
//! - Gitignore-style exclusions via the `ignore` crate; excluded
//!   directories are pruned before they are read
//! - Symlinks reported as [`FileKind::Symlink`] unless followed
//! - Graceful shutdown via atomic flag
//!
//! # Example
//!
//! ```no_run
//! use mrclean::scanner::{Walker, WalkerConfig};
//!
//! let walker = Walker::new(&["~/Downloads", r"D:\Archive"], WalkerConfig::default());
//! let files: Vec<_> = walker.walk().filter_map(Result::ok).collect();
//! println!("Found {} files", files.len());
//! ```

use std::fs;
use std::iter;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use jwalk::WalkDir;

use super::path_utils::{self, NormalizedPath};
use super::{FileKind, FileRecord, ScanError, WalkerConfig};

type RecordIter = Box<dyn Iterator<Item = Result<FileRecord, ScanError>>>;

/// Directory walker over one or more roots.
#[derive(Debug)]
pub struct Walker {
    /// Roots in canonical form
    roots: Vec<NormalizedPath>,
    /// Walker configuration
    config: WalkerConfig,
    /// Optional shutdown flag for graceful termination
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Walker {
    /// Create a walker over raw user-supplied roots.
    #[must_use]
    pub fn new<S: AsRef<str>>(roots: &[S], config: WalkerConfig) -> Self {
        let roots = roots
            .iter()
            .map(|r| path_utils::normalize(r.as_ref()))
            .collect();
        Self::from_normalized(roots, config)
    }

    /// Create a walker over already-normalized roots.
    #[must_use]
    pub fn from_normalized(roots: Vec<NormalizedPath>, config: WalkerConfig) -> Self {
        Self {
            roots,
            config,
            shutdown_flag: None,
        }
    }

    /// Stop producing records once `flag` is set.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// The roots as supplied, normalized.
    #[must_use]
    pub fn roots(&self) -> &[NormalizedPath] {
        &self.roots
    }

    /// Consume the walker and yield records lazily.
    ///
    /// Missing roots produce a [`ScanError::NotFound`] and the walk moves on
    /// to the next root. A root that is a regular file yields that one file.
    pub fn walk(self) -> impl Iterator<Item = Result<FileRecord, ScanError>> {
        let Self {
            roots,
            config,
            shutdown_flag,
        } = self;

        let per_root_flag = shutdown_flag.clone();
        effective_roots(roots)
            .into_iter()
            .flat_map(move |root| walk_root(root, &config, per_root_flag.clone()))
            .take_while(move |_| {
                let stop = shutdown_flag
                    .as_ref()
                    .is_some_and(|f| f.load(Ordering::SeqCst));
                if stop {
                    log::debug!("Walker: Shutdown requested, stopping iteration");
                }
                !stop
            })
    }
}

/// Drop roots that repeat or lie inside another root.
///
/// Roots are compared by their resolved location, so a symlinked spelling
/// of a directory overlaps the directory itself. Missing roots compare by
/// their canonical path.
fn effective_roots(roots: Vec<NormalizedPath>) -> Vec<NormalizedPath> {
    let mut ordered: Vec<(String, NormalizedPath)> = roots
        .into_iter()
        .map(|root| {
            let location = path_utils::resolve_real(&root.canonical_path)
                .unwrap_or_else(|| root.canonical_path.clone());
            (location, root)
        })
        .collect();
    ordered.sort_by(|(a, _), (b, _)| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));

    let mut kept: Vec<(String, NormalizedPath)> = Vec::with_capacity(ordered.len());
    for (location, root) in ordered {
        if let Some((_, outer)) = kept
            .iter()
            .find(|(outer, _)| path_utils::is_within(&location, outer))
        {
            log::info!(
                "Skipping root {} (already covered by {})",
                root.original,
                outer.original
            );
            continue;
        }
        kept.push((location, root));
    }
    kept.into_iter().map(|(_, root)| root).collect()
}

fn walk_root(
    root: NormalizedPath,
    config: &WalkerConfig,
    shutdown_flag: Option<Arc<AtomicBool>>,
) -> RecordIter {
    let root_path = root.os_path();
    let metadata = match fs::metadata(&root_path) {
        Ok(m) => m,
        Err(e) => {
            log::warn!("Cannot read root {}: {}", root.original, e);
            return Box::new(iter::once(Err(ScanError::from_io(&root.canonical_path, e))));
        }
    };

    if !metadata.is_dir() {
        let follow = config.follow_symlinks;
        return Box::new(iter::once(record_for(&root, &root_path, follow)));
    }

    log::debug!("Walking root {}", root.canonical_path);
    let exclusions = build_exclusions(&root_path, &config.exclude).map(Arc::new);
    let prune_root = root_path.clone();
    let follow = config.follow_symlinks;

    let walk_dir = WalkDir::new(&root_path)
        .follow_links(follow)
        .skip_hidden(config.skip_hidden)
        .process_read_dir(move |_depth, _path, _read_dir_state, children| {
            if let Some(gi) = &exclusions {
                children.retain(|child| match child {
                    Ok(entry) => {
                        let excluded =
                            is_excluded(gi, &prune_root, &entry.path(), entry.file_type().is_dir());
                        if excluded {
                            log::trace!("Excluding: {}", entry.path().display());
                        }
                        !excluded
                    }
                    Err(_) => true,
                });
            }
            // Sort children for deterministic output
            children.sort_by(|a, b| match (a, b) {
                (Ok(a), Ok(b)) => a.file_name().cmp(b.file_name()),
                (Ok(_), Err(_)) => std::cmp::Ordering::Less,
                (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
                (Err(_), Err(_)) => std::cmp::Ordering::Equal,
            });
        });

    Box::new(
        walk_dir
            .into_iter()
            .take_while(move |_| {
                !shutdown_flag
                    .as_ref()
                    .is_some_and(|f| f.load(Ordering::SeqCst))
            })
            .filter_map(move |entry_result| match entry_result {
                Ok(entry) => {
                    if entry.depth == 0 || entry.file_type().is_dir() {
                        return None;
                    }
                    Some(record_for(&root, &entry.path(), follow))
                }
                Err(e) => {
                    let path = e.path().map(|p| p.to_string_lossy().into_owned());
                    log::warn!("Walker error: {}", e);
                    Some(Err(ScanError::Walk {
                        path,
                        message: e.to_string(),
                    }))
                }
            }),
    )
}

/// Build the exclusion matcher for one root.
fn build_exclusions(root: &Path, patterns: &[String]) -> Option<Gitignore> {
    if patterns.is_empty() {
        return None;
    }

    let mut builder = GitignoreBuilder::new(root);
    for pattern in patterns {
        if let Err(e) = builder.add_line(None, pattern) {
            log::warn!("Invalid exclude pattern '{}': {}", pattern, e);
        }
    }

    match builder.build() {
        Ok(gitignore) if gitignore.is_empty() => None,
        Ok(gitignore) => Some(gitignore),
        Err(e) => {
            log::warn!("Failed to build exclude patterns: {}", e);
            None
        }
    }
}

fn is_excluded(gitignore: &Gitignore, root: &Path, path: &Path, is_dir: bool) -> bool {
    let relative = path.strip_prefix(root).unwrap_or(path);
    gitignore.matched(relative, is_dir).is_ignore()
}

/// Stat one entry and turn it into a record.
fn record_for(root: &NormalizedPath, path: &Path, follow: bool) -> Result<FileRecord, ScanError> {
    let canonical = path_utils::to_canonical(path)
        .ok_or_else(|| ScanError::NonUtf8Path(PathBuf::from(path)))?;

    let metadata = if follow {
        fs::metadata(path)
    } else {
        fs::symlink_metadata(path)
    }
    .map_err(|e| {
        log::warn!("Cannot stat {}: {}", canonical, e);
        ScanError::from_io(&canonical, e)
    })?;

    let display = root.display_for(&canonical);
    let record = FileRecord::from_metadata(canonical, display, &metadata);
    if record.kind != FileKind::Regular {
        log::trace!("Non-regular entry ({}): {}", record.kind, record.canonical_path);
    }
    Ok(record)
}
