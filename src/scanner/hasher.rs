//! BLAKE3 file hasher with streaming support.
//!
//! # Overview
//!
//! Two hashes are computed per file, both BLAKE3:
//!
//! - **quick hash**: the leading window of the file (64 KiB by default),
//!   a cheap pre-filter for files of equal size
//! - **full hash**: the whole file, streamed in fixed-size chunks so memory
//!   stays bounded regardless of file size
//!
//! Both reads verify that the file still has the size recorded at scan time;
//! a file that grew or shrank is reported as [`HashError::SizeChanged`].
//! For files no larger than the window, the quick hash equals the full hash.
//!
//! # Example
//!
//! ```no_run
//! use mrclean::scanner::{hash_to_hex, Hasher};
//! use std::path::Path;
//!
//! let hasher = Hasher::new();
//! let hash = hasher.full_hash(Path::new("photo.jpg"), 2_048_000)?;
//! println!("{}", hash_to_hex(&hash));
//! # Ok::<(), mrclean::scanner::HashError>(())
//! ```

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::HashError;

/// 32-byte BLAKE3 digest.
pub type Hash = [u8; 32];

/// Default quick-hash window (64 KiB).
pub const QUICK_HASH_BYTES: usize = 64 * 1024;

/// Default streaming chunk size (128 KiB).
pub const CHUNK_BYTES: usize = 128 * 1024;

/// Streaming BLAKE3 hasher.
///
/// Cheap to clone; the shutdown flag is shared.
#[derive(Debug, Clone)]
pub struct Hasher {
    quick_hash_bytes: usize,
    chunk_bytes: usize,
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher {
    /// Create a hasher with the default window and chunk sizes.
    #[must_use]
    pub fn new() -> Self {
        Self {
            quick_hash_bytes: QUICK_HASH_BYTES,
            chunk_bytes: CHUNK_BYTES,
            shutdown_flag: None,
        }
    }

    /// Set the quick-hash window. Zero is clamped to one byte.
    #[must_use]
    pub fn with_quick_hash_bytes(mut self, bytes: usize) -> Self {
        self.quick_hash_bytes = bytes.max(1);
        self
    }

    /// Set the streaming chunk size. Zero is clamped to one byte.
    #[must_use]
    pub fn with_chunk_bytes(mut self, bytes: usize) -> Self {
        self.chunk_bytes = bytes.max(1);
        self
    }

    /// Abort reads between chunks once `flag` is set.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// The configured quick-hash window.
    #[must_use]
    pub fn quick_hash_bytes(&self) -> usize {
        self.quick_hash_bytes
    }

    /// Hash the leading window of a file of `expected_size` bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, if it is shorter than
    /// recorded (or any other length, when it fits in the window), or if
    /// shutdown is requested mid-read.
    pub fn quick_hash(&self, path: &Path, expected_size: u64) -> Result<Hash, HashError> {
        let window = self.quick_hash_bytes as u64;
        if expected_size <= window {
            // The window covers the whole file, so growth must be caught here.
            return self.full_hash(path, expected_size);
        }
        self.stream(path, window, window)
    }

    /// Hash the whole content of a file of `expected_size` bytes.
    ///
    /// One byte past the expected size is requested so that a file that grew
    /// since the scan is detected.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, if its length differs
    /// from `expected_size`, or if shutdown is requested mid-read.
    pub fn full_hash(&self, path: &Path, expected_size: u64) -> Result<Hash, HashError> {
        self.stream(path, expected_size.saturating_add(1), expected_size)
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    fn stream(&self, path: &Path, limit: u64, expected: u64) -> Result<Hash, HashError> {
        let display = path.to_string_lossy();
        let file = File::open(path).map_err(|e| HashError::from_io(&display, e))?;
        let mut reader = file.take(limit);

        let buf_len = usize::try_from(limit)
            .unwrap_or(usize::MAX)
            .clamp(1, self.chunk_bytes);
        let mut buffer = vec![0u8; buf_len];
        let mut hasher = blake3::Hasher::new();
        let mut total: u64 = 0;

        loop {
            if self.is_shutdown_requested() {
                return Err(HashError::Interrupted(display.into_owned()));
            }
            let read = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(HashError::from_io(&display, e)),
            };
            hasher.update(&buffer[..read]);
            total += read as u64;
        }

        if total != expected {
            return Err(HashError::SizeChanged {
                path: display.into_owned(),
                expected,
                actual: total,
            });
        }

        log::trace!("Hashed {} bytes of {}", total, display);
        Ok(*hasher.finalize().as_bytes())
    }
}

/// Render a hash as lowercase hex.
#[must_use]
pub fn hash_to_hex(hash: &Hash) -> String {
    blake3::Hash::from_bytes(*hash).to_hex().to_string()
}

/// Parse a 64-character hex string back into a hash.
#[must_use]
pub fn hex_to_hash(hex: &str) -> Option<Hash> {
    blake3::Hash::from_hex(hex).ok().map(|h| *h.as_bytes())
}
