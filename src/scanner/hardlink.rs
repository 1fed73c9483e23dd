//! Hardlink identity and link-set partitioning.
//!
//! # Overview
//!
//! Hardlinks are multiple directory entries pointing to the same inode.
//! They are known-identical without reading a byte, so the fingerprint
//! engine hashes one representative per inode and lets the other links
//! inherit its hashes.
//!
//! # Platform Support
//!
//! - **Unix**: `(device_id, inode)` from file metadata
//! - **Other**: no identity; every file is its own link set
//!
//! # Example
//!
//! ```
//! use mrclean::scanner::hardlink::{partition_links, InodeKey};
//! use mrclean::scanner::FileRecord;
//! use chrono::Utc;
//!
//! let now = Utc::now();
//! let records = vec![
//!     FileRecord::new("/a", 10, now).with_identity(1, 100),
//!     FileRecord::new("/b", 10, now).with_identity(1, 100),
//!     FileRecord::new("/c", 10, now).with_identity(1, 200),
//! ];
//! let sets = partition_links(records, true);
//! assert_eq!(sets.len(), 2);
//! assert_eq!(sets[0].key(), Some(InodeKey::new(1, 100)));
//! ```

use std::collections::BTreeMap;
use std::fs::Metadata;

use super::FileRecord;

/// `(device_id, inode)` pair identifying the data behind a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InodeKey {
    /// Device holding the inode
    pub device_id: u64,
    /// Inode number
    pub inode: u64,
}

impl InodeKey {
    /// Create a key from its parts.
    #[must_use]
    pub const fn new(device_id: u64, inode: u64) -> Self {
        Self { device_id, inode }
    }

    /// Read the key from file metadata.
    ///
    /// Returns `None` where the platform does not expose inode identity.
    #[cfg(unix)]
    #[must_use]
    pub fn from_metadata(metadata: &Metadata) -> Option<Self> {
        use std::os::unix::fs::MetadataExt;
        Some(Self::new(metadata.dev(), metadata.ino()))
    }

    /// Read the key from file metadata.
    ///
    /// Returns `None` where the platform does not expose inode identity.
    #[cfg(not(unix))]
    #[must_use]
    pub fn from_metadata(_metadata: &Metadata) -> Option<Self> {
        None
    }

    /// Whether inode identity is available on this platform.
    #[must_use]
    pub const fn is_supported() -> bool {
        cfg!(unix)
    }
}

impl std::fmt::Display for InodeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "inode:{}:{}", self.device_id, self.inode)
    }
}

/// Whether two metadata values describe the same inode.
///
/// Always `false` where identity is unavailable.
#[must_use]
pub fn same_inode(a: &Metadata, b: &Metadata) -> bool {
    match (InodeKey::from_metadata(a), InodeKey::from_metadata(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Records that share one inode, in path order.
///
/// Never empty. The first member is the representative that gets read.
#[derive(Debug, Clone)]
pub struct LinkSet {
    key: Option<InodeKey>,
    members: Vec<FileRecord>,
}

impl LinkSet {
    fn single(record: FileRecord) -> Self {
        Self {
            key: None,
            members: vec![record],
        }
    }

    /// The shared inode identity, if the set was formed by identity.
    #[must_use]
    pub fn key(&self) -> Option<InodeKey> {
        self.key
    }

    /// The member whose content is read on behalf of the set.
    #[must_use]
    pub fn representative(&self) -> &FileRecord {
        &self.members[0]
    }

    /// All members in path order.
    #[must_use]
    pub fn members(&self) -> &[FileRecord] {
        &self.members
    }

    /// Number of paths in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Always `false`; present for API symmetry with `len`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Whether more than one path shares this inode.
    #[must_use]
    pub fn is_linked(&self) -> bool {
        self.members.len() > 1
    }
}

/// Partition records into link sets.
///
/// With `enabled` off, or for records without identity, every record is its
/// own set. Sets are returned ordered by representative path.
#[must_use]
pub fn partition_links(records: Vec<FileRecord>, enabled: bool) -> Vec<LinkSet> {
    if !enabled {
        let mut sets: Vec<LinkSet> = records.into_iter().map(LinkSet::single).collect();
        sets.sort_by(|a, b| {
            a.representative()
                .canonical_path
                .cmp(&b.representative().canonical_path)
        });
        return sets;
    }

    let mut by_inode: BTreeMap<InodeKey, Vec<FileRecord>> = BTreeMap::new();
    let mut sets = Vec::new();

    for record in records {
        match record.inode_key() {
            Some(key) => by_inode.entry(key).or_default().push(record),
            None => sets.push(LinkSet::single(record)),
        }
    }

    for (key, mut members) in by_inode {
        members.sort_by(|a, b| a.canonical_path.cmp(&b.canonical_path));
        sets.push(LinkSet {
            key: Some(key),
            members,
        });
    }

    sets.sort_by(|a, b| {
        a.representative()
            .canonical_path
            .cmp(&b.representative().canonical_path)
    });
    sets
}
