//! Scanner module: file discovery, path identity and content hashing.
//!
//! This module provides:
//! - Path normalization across Windows/WSL/POSIX spellings
//! - A lazy directory walker producing [`FileRecord`]s
//! - JSON scan reports that can stand in for a live walk
//! - Quick and full BLAKE3 content hashing
//! - `(device_id, inode)` hardlink identity
//!
//! # Architecture
//!
//! - [`path_utils`]: canonical path form and display conversion
//! - [`walker`]: directory traversal and record production
//! - [`report`]: scan report model and persistence
//! - [`hasher`]: streaming BLAKE3 hashing
//! - [`hardlink`]: inode identity and link-set partitioning
//!
//! # Example
//!
//! ```no_run
//! use mrclean::scanner::{Walker, WalkerConfig};
//!
//! let config = WalkerConfig::default().with_exclude(vec!["*.tmp".to_string()]);
//! let walker = Walker::new(&["/srv/media"], config);
//! for record in walker.walk() {
//!     match record {
//!         Ok(file) => println!("{}: {} bytes", file.display_path, file.size_bytes),
//!         Err(e) => eprintln!("Warning: {e}"),
//!     }
//! }
//! ```

pub mod hardlink;
pub mod hasher;
pub mod path_utils;
pub mod report;
pub mod walker;

use std::fs::Metadata;
use std::io;
use std::path::PathBuf;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use hardlink::InodeKey;
pub use hasher::{hash_to_hex, hex_to_hash, Hash, Hasher, CHUNK_BYTES, QUICK_HASH_BYTES};
pub use path_utils::{normalize, NormalizedPath, PathStyle};
pub use report::ScanReport;
pub use walker::Walker;

/// What kind of filesystem entry a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    /// A regular file. Only these are ever hashed.
    #[default]
    Regular,
    /// A symbolic link that was not followed.
    Symlink,
    /// Sockets, FIFOs, devices.
    Other,
}

impl FileKind {
    /// Classify a metadata value.
    #[must_use]
    pub fn from_metadata(metadata: &Metadata) -> Self {
        let file_type = metadata.file_type();
        if file_type.is_file() {
            Self::Regular
        } else if file_type.is_symlink() {
            Self::Symlink
        } else {
            Self::Other
        }
    }

    /// Whether this is [`FileKind::Regular`].
    #[must_use]
    pub fn is_regular(&self) -> bool {
        matches!(self, Self::Regular)
    }
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Regular => write!(f, "regular"),
            Self::Symlink => write!(f, "symlink"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Immutable snapshot of one filesystem entry at scan time.
///
/// `canonical_path` is the engine's identity for the file; `display_path`
/// is the same path rendered in the style the user typed the root in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Canonical `/`-separated path
    pub canonical_path: String,
    /// User-facing path
    pub display_path: String,
    /// File size in bytes
    pub size_bytes: u64,
    /// Last modification time
    pub mtime: DateTime<Utc>,
    /// Last access time
    pub atime: DateTime<Utc>,
    /// Status change time (creation time where ctime is unavailable)
    pub ctime: DateTime<Utc>,
    /// Device holding the file, when known
    pub device_id: Option<u64>,
    /// Inode number, when known
    pub inode: Option<u64>,
    /// Entry kind
    pub kind: FileKind,
}

impl FileRecord {
    /// Create a regular-file record with all timestamps set to `mtime`.
    #[must_use]
    pub fn new(canonical_path: impl Into<String>, size_bytes: u64, mtime: DateTime<Utc>) -> Self {
        let canonical_path = canonical_path.into();
        Self {
            display_path: canonical_path.clone(),
            canonical_path,
            size_bytes,
            mtime,
            atime: mtime,
            ctime: mtime,
            device_id: None,
            inode: None,
            kind: FileKind::Regular,
        }
    }

    /// Build a record from filesystem metadata.
    #[must_use]
    pub fn from_metadata(canonical_path: String, display_path: String, metadata: &Metadata) -> Self {
        let identity = InodeKey::from_metadata(metadata);
        Self {
            canonical_path,
            display_path,
            size_bytes: metadata.len(),
            mtime: to_utc(metadata.modified()),
            atime: to_utc(metadata.accessed()),
            ctime: change_time(metadata),
            device_id: identity.map(|key| key.device_id),
            inode: identity.map(|key| key.inode),
            kind: FileKind::from_metadata(metadata),
        }
    }

    /// Set the user-facing path.
    #[must_use]
    pub fn with_display_path(mut self, display_path: impl Into<String>) -> Self {
        self.display_path = display_path.into();
        self
    }

    /// Set the hardlink identity.
    #[must_use]
    pub fn with_identity(mut self, device_id: u64, inode: u64) -> Self {
        self.device_id = Some(device_id);
        self.inode = Some(inode);
        self
    }

    /// Set the entry kind.
    #[must_use]
    pub fn with_kind(mut self, kind: FileKind) -> Self {
        self.kind = kind;
        self
    }

    /// The canonical path as an OS path.
    #[must_use]
    pub fn os_path(&self) -> PathBuf {
        PathBuf::from(&self.canonical_path)
    }

    /// Number of components in the canonical path.
    #[must_use]
    pub fn depth(&self) -> usize {
        path_utils::path_depth(&self.canonical_path)
    }

    /// The `(device_id, inode)` identity, if both halves are known.
    #[must_use]
    pub fn inode_key(&self) -> Option<InodeKey> {
        Some(InodeKey::new(self.device_id?, self.inode?))
    }
}

fn to_utc(time: io::Result<SystemTime>) -> DateTime<Utc> {
    time.map(DateTime::<Utc>::from)
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

#[cfg(unix)]
fn change_time(metadata: &Metadata) -> DateTime<Utc> {
    use std::os::unix::fs::MetadataExt;

    let nanos = u32::try_from(metadata.ctime_nsec()).unwrap_or(0);
    DateTime::from_timestamp(metadata.ctime(), nanos).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

#[cfg(not(unix))]
fn change_time(metadata: &Metadata) -> DateTime<Utc> {
    to_utc(metadata.created())
}

/// Configuration for directory walking.
#[derive(Debug, Clone, Default)]
pub struct WalkerConfig {
    /// Follow symbolic links. When off, links are reported as
    /// [`FileKind::Symlink`] records and never hashed.
    pub follow_symlinks: bool,

    /// Skip hidden files and directories (names starting with `.`).
    pub skip_hidden: bool,

    /// Gitignore-style patterns matched relative to each root.
    /// Matching directories are pruned.
    pub exclude: Vec<String>,
}

impl WalkerConfig {
    /// Set the symlink policy.
    #[must_use]
    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Skip or include hidden entries.
    #[must_use]
    pub fn with_skip_hidden(mut self, skip: bool) -> Self {
        self.skip_hidden = skip;
        self
    }

    /// Set the exclusion patterns.
    #[must_use]
    pub fn with_exclude(mut self, patterns: Vec<String>) -> Self {
        self.exclude = patterns;
        self
    }
}

/// Errors raised while resolving roots or reading entries during a walk.
///
/// None of these abort the walk; they are recorded and the next entry or
/// root is processed.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The path does not exist.
    #[error("path does not exist: {0}")]
    NotFound(String),

    /// The path could not be represented as UTF-8.
    #[error("Path is not valid UTF-8: {}", .0.display())]
    NonUtf8Path(PathBuf),

    /// The directory walker reported a failure.
    #[error("Walk error at {}: {message}", path.as_deref().unwrap_or("<unknown>"))]
    Walk {
        /// Path where the error occurred, when known
        path: Option<String>,
        /// Description from the walker
        message: String,
    },

    /// An I/O error occurred while accessing a file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: String,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl ScanError {
    /// Classify an I/O error for `path`.
    #[must_use]
    pub fn from_io(path: &str, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_string()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_string()),
            _ => Self::Io {
                path: path.to_string(),
                source: err,
            },
        }
    }

    /// The path the error refers to, if any.
    #[must_use]
    pub fn path(&self) -> Option<String> {
        match self {
            Self::PermissionDenied(p) | Self::NotFound(p) | Self::Io { path: p, .. } => {
                Some(p.clone())
            }
            Self::NonUtf8Path(p) => Some(p.to_string_lossy().into_owned()),
            Self::Walk { path, .. } => path.clone(),
        }
    }
}

/// Errors that can occur while hashing a file.
///
/// A file that fails to hash is excluded from grouping; the pass continues.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The file disappeared between scan and hash.
    #[error("File not found: {0}")]
    NotFound(String),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The file no longer has the size recorded at scan time.
    #[error("File changed during hashing: {path} (expected {expected} bytes, read {actual})")]
    SizeChanged {
        /// File path
        path: String,
        /// Bytes expected from the record
        expected: u64,
        /// Bytes actually read
        actual: u64,
    },

    /// Another link to the same inode failed to hash.
    #[error("Hard link of unreadable file {representative}: {path}")]
    LinkedUnreadable {
        /// This link's path
        path: String,
        /// The link that was actually read
        representative: String,
    },

    /// Hashing stopped because shutdown was requested.
    #[error("Hashing interrupted: {0}")]
    Interrupted(String),

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: String,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl HashError {
    /// Classify an I/O error for `path`.
    #[must_use]
    pub fn from_io(path: &str, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_string()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_string()),
            _ => Self::Io {
                path: path.to_string(),
                source: err,
            },
        }
    }

    /// The file the error refers to.
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::NotFound(p)
            | Self::PermissionDenied(p)
            | Self::Interrupted(p)
            | Self::SizeChanged { path: p, .. }
            | Self::LinkedUnreadable { path: p, .. }
            | Self::Io { path: p, .. } => p,
        }
    }

    /// Whether hashing was abandoned rather than failed.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted(_))
    }
}
