//! Size bucketing, duplicate groups and keeper selection.
//!
//! # Overview
//!
//! Two groupings live here:
//!
//! - [`group_by_size`]: the metadata-only first pass of fingerprinting.
//!   Files of different sizes can never be duplicates, so singleton sizes
//!   are eliminated before any byte is read.
//! - [`group`]: the final pass over a [`FingerprintSet`], collecting files
//!   that share a content hash (or an inode) into [`DuplicateGroup`]s and
//!   picking the file to keep.
//!
//! ## Keeper policy
//!
//! The keeper is the file with the earliest modification time. Ties are
//! broken by the lexicographically smallest canonical path, then by the
//! shallowest path. The policy is a total order over records, so the result
//! never depends on input order.
//!
//! # Example
//!
//! ```
//! use mrclean::duplicates::group_by_size;
//! use mrclean::scanner::FileRecord;
//! use chrono::Utc;
//!
//! let now = Utc::now();
//! let files = vec![
//!     FileRecord::new("/a.txt", 100, now),
//!     FileRecord::new("/b.txt", 100, now),
//!     FileRecord::new("/c.txt", 200, now),
//! ];
//!
//! let (buckets, stats) = group_by_size(files);
//! assert_eq!(buckets.len(), 1);
//! assert_eq!(buckets[&100].len(), 2);
//! assert_eq!(stats.eliminated_unique, 1);
//! ```

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::scanner::{hash_to_hex, FileRecord, Hash, InodeKey};

use super::fingerprint::FingerprintSet;

/// Statistics from the size bucketing pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupingStats {
    /// Total number of files processed
    pub total_files: usize,
    /// Total size of all files in bytes
    pub total_size: u64,
    /// Number of distinct sizes
    pub unique_sizes: usize,
    /// Files in buckets of 2+
    pub potential_duplicates: usize,
    /// Files eliminated as the only one of their size
    pub eliminated_unique: usize,
    /// Zero-byte files seen
    pub empty_files: usize,
    /// Buckets with 2+ files
    pub size_buckets: usize,
}

impl GroupingStats {
    /// Percentage of files eliminated by size alone.
    #[must_use]
    pub fn elimination_rate(&self) -> f64 {
        if self.total_files == 0 {
            0.0
        } else {
            (self.eliminated_unique as f64 / self.total_files as f64) * 100.0
        }
    }
}

/// Bucket files by exact size, keeping only buckets of two or more.
///
/// Buckets are ordered by size; files within a bucket keep input order.
/// No file I/O is performed.
#[must_use]
pub fn group_by_size(
    files: impl IntoIterator<Item = FileRecord>,
) -> (BTreeMap<u64, Vec<FileRecord>>, GroupingStats) {
    let mut all: BTreeMap<u64, Vec<FileRecord>> = BTreeMap::new();
    let mut stats = GroupingStats::default();

    for file in files {
        stats.total_files += 1;
        stats.total_size += file.size_bytes;
        if file.size_bytes == 0 {
            stats.empty_files += 1;
        }
        all.entry(file.size_bytes).or_default().push(file);
    }

    stats.unique_sizes = all.len();

    let buckets: BTreeMap<u64, Vec<FileRecord>> = all
        .into_iter()
        .filter(|(size, files)| {
            if files.len() == 1 {
                stats.eliminated_unique += 1;
                log::trace!("Unique size {}: {}", size, files[0].canonical_path);
                false
            } else {
                stats.potential_duplicates += files.len();
                stats.size_buckets += 1;
                log::debug!("Size bucket {} bytes: {} files", size, files.len());
                true
            }
        })
        .collect();

    log::info!(
        "Phase 1 complete: {} files → {} potential duplicates ({:.1}% eliminated)",
        stats.total_files,
        stats.potential_duplicates,
        stats.elimination_rate()
    );

    (buckets, stats)
}

/// What the members of a group have in common.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GroupKey {
    /// Identical full content hash.
    Content(Hash),
    /// Links to one inode that nothing else matched.
    Hardlink(InodeKey),
}

impl std::fmt::Display for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Content(hash) => write!(f, "blake3:{}", hash_to_hex(hash)),
            Self::Hardlink(key) => write!(f, "{key}"),
        }
    }
}

/// Inconsistencies that make a set of groups unsafe to plan from.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum GroupError {
    /// A group would have a keeper and no candidates.
    #[error("Duplicate group {key} has a single member: {path}")]
    SingletonGroup {
        /// Group key
        key: String,
        /// The lone member
        path: String,
    },

    /// A group was built from no members.
    #[error("Duplicate group {0} has no members")]
    EmptyGroup(String),

    /// Group members disagree on size.
    #[error("Duplicate group {key} mixes sizes {first} and {other} ({path})")]
    MixedSizes {
        /// Group key
        key: String,
        /// Size of the first member
        first: u64,
        /// Conflicting size
        other: u64,
        /// Member with the conflicting size
        path: String,
    },

    /// A path appears more than once.
    #[error("File appears in more than one group slot: {0}")]
    DuplicateMember(String),
}

/// Order two records by keeper preference; the smaller one is kept.
#[must_use]
pub fn keeper_order(a: &FileRecord, b: &FileRecord) -> Ordering {
    a.mtime
        .cmp(&b.mtime)
        .then_with(|| a.canonical_path.cmp(&b.canonical_path))
        .then_with(|| a.depth().cmp(&b.depth()))
}

/// Index of the record the keeper policy retains.
#[must_use]
pub fn select_keeper(members: &[FileRecord]) -> Option<usize> {
    members
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| keeper_order(a, b))
        .map(|(idx, _)| idx)
}

/// Confirmed duplicate group: one keeper, one or more candidates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    key: GroupKey,
    size_bytes: u64,
    keeper: FileRecord,
    candidates: Vec<FileRecord>,
}

impl DuplicateGroup {
    /// Build a group, selecting the keeper.
    ///
    /// # Errors
    ///
    /// Fails for fewer than two members, mixed sizes, or a repeated path.
    pub fn from_members(key: GroupKey, mut members: Vec<FileRecord>) -> Result<Self, GroupError> {
        let keeper_idx = select_keeper(&members).ok_or_else(|| GroupError::EmptyGroup(key.to_string()))?;
        let keeper = members.swap_remove(keeper_idx);

        if members.is_empty() {
            return Err(GroupError::SingletonGroup {
                key: key.to_string(),
                path: keeper.canonical_path,
            });
        }

        members.sort_by(|a, b| a.canonical_path.cmp(&b.canonical_path));

        if let Some(other) = members.iter().find(|m| m.size_bytes != keeper.size_bytes) {
            return Err(GroupError::MixedSizes {
                key: key.to_string(),
                first: keeper.size_bytes,
                other: other.size_bytes,
                path: other.canonical_path.clone(),
            });
        }

        let repeated = members
            .windows(2)
            .find(|w| w[0].canonical_path == w[1].canonical_path)
            .map(|w| w[0].canonical_path.clone())
            .or_else(|| {
                members
                    .iter()
                    .find(|m| m.canonical_path == keeper.canonical_path)
                    .map(|m| m.canonical_path.clone())
            });
        if let Some(path) = repeated {
            return Err(GroupError::DuplicateMember(path));
        }

        Ok(Self {
            key,
            size_bytes: keeper.size_bytes,
            keeper,
            candidates: members,
        })
    }

    /// What the members share.
    #[must_use]
    pub fn key(&self) -> GroupKey {
        self.key
    }

    /// Size of each member.
    #[must_use]
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// The retained file.
    #[must_use]
    pub fn keeper(&self) -> &FileRecord {
        &self.keeper
    }

    /// Files proposed for cleanup, sorted by canonical path.
    #[must_use]
    pub fn candidates(&self) -> &[FileRecord] {
        &self.candidates
    }

    /// Keeper first, then candidates.
    pub fn members(&self) -> impl Iterator<Item = &FileRecord> {
        std::iter::once(&self.keeper).chain(self.candidates.iter())
    }

    /// Number of files in the group.
    #[must_use]
    pub fn len(&self) -> usize {
        self.candidates.len() + 1
    }

    /// Always `false`: a group holds at least two files.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Number of candidates.
    #[must_use]
    pub fn duplicate_count(&self) -> usize {
        self.candidates.len()
    }

    /// Bytes freed by removing every candidate.
    ///
    /// Links to the keeper's own inode free nothing and are not counted.
    #[must_use]
    pub fn wasted_space(&self) -> u64 {
        let keeper_inode = self.keeper.inode_key();
        self.candidates
            .iter()
            .filter(|c| keeper_inode.is_none() || c.inode_key() != keeper_inode)
            .map(|c| c.size_bytes)
            .sum()
    }
}

/// Collect fingerprinted files into duplicate groups.
///
/// Files are keyed by full hash, or by inode identity when they joined
/// through the hardlink shortcut. Keys held by a single file are unique
/// files, not groups. Groups are sorted by size descending, then keeper path.
///
/// # Errors
///
/// Returns a [`GroupError`] if any group fails its consistency checks.
pub fn group(set: &FingerprintSet) -> Result<Vec<DuplicateGroup>, GroupError> {
    let mut by_key: BTreeMap<GroupKey, Vec<FileRecord>> = BTreeMap::new();

    for file in set.files.values() {
        let key = file
            .fingerprint
            .full_hash
            .map(GroupKey::Content)
            .or_else(|| file.fingerprint.hardlink.map(GroupKey::Hardlink));
        if let Some(key) = key {
            by_key.entry(key).or_default().push(file.record.clone());
        }
    }

    let mut groups = Vec::new();
    for (key, members) in by_key {
        if members.len() < 2 {
            log::trace!("Unique after full hash: {}", members[0].canonical_path);
            continue;
        }
        groups.push(DuplicateGroup::from_members(key, members)?);
    }

    groups.sort_by(|a, b| {
        b.size_bytes
            .cmp(&a.size_bytes)
            .then_with(|| a.keeper.canonical_path.cmp(&b.keeper.canonical_path))
    });

    log::info!(
        "Grouping complete: {} duplicate groups, {} candidates",
        groups.len(),
        groups.iter().map(DuplicateGroup::duplicate_count).sum::<usize>()
    );

    Ok(groups)
}
