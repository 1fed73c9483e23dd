//! Layered application configuration.
//!
//! Sources, lowest priority first:
//!
//! 1. built-in defaults
//! 2. TOML file: `--config FILE`, else `<config dir>/mrclean/config.toml`
//! 3. `MRCLEAN_*` environment variables (e.g. `MRCLEAN_IO_THREADS=8`)
//! 4. CLI flags, applied by the command layer
//!
//! ```toml
//! io_threads = 8
//! quick_hash_bytes = 65536
//! chunk_bytes = 131072
//! hardlink_shortcut = true
//! follow_symlinks = false
//! exclude = ["node_modules/", "*.tmp"]
//! use_trash = true
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::duplicates::FingerprintConfig;
use crate::scanner::{WalkerConfig, CHUNK_BYTES, QUICK_HASH_BYTES};

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "MRCLEAN_";

/// Smallest accepted quick-hash window and read chunk.
pub const MIN_BLOCK_BYTES: usize = 4096;

/// Upper bound for `io_threads`.
pub const MAX_IO_THREADS: usize = 256;

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Hashing threads
    pub io_threads: usize,
    /// Bytes read for the quick hash
    pub quick_hash_bytes: usize,
    /// Read size for the full hash
    pub chunk_bytes: usize,
    /// Group otherwise-unique hardlink sets by inode
    pub hardlink_shortcut: bool,
    /// Follow symbolic links while walking
    pub follow_symlinks: bool,
    /// Gitignore-style exclusion patterns
    pub exclude: Vec<String>,
    /// Send deletions to the system trash
    pub use_trash: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            io_threads: 4,
            quick_hash_bytes: QUICK_HASH_BYTES,
            chunk_bytes: CHUNK_BYTES,
            hardlink_shortcut: true,
            follow_symlinks: false,
            exclude: Vec::new(),
            use_trash: false,
        }
    }
}

impl Config {
    /// Load the layered configuration.
    ///
    /// `explicit` must exist when given; the default path is optional.
    ///
    /// # Errors
    ///
    /// Returns an error for a missing explicit file or invalid values.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let file = match explicit {
            Some(path) => {
                if !path.is_file() {
                    anyhow::bail!("Config file not found: {}", path.display());
                }
                Some(path.to_path_buf())
            }
            None => Self::default_path(),
        };

        if let Some(ref path) = file {
            log::debug!("Reading configuration from {}", path.display());
        }

        let config: Self = Self::figment(file.as_deref())
            .extract()
            .context("Invalid configuration")?;
        Ok(config.sanitized())
    }

    /// The provider stack for `file` (skipped if `None` or absent).
    #[must_use]
    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = file {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX))
    }

    /// `<platform config dir>/mrclean/config.toml`.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "mrclean").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Clamp out-of-range values.
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        if self.io_threads == 0 || self.io_threads > MAX_IO_THREADS {
            let clamped = self.io_threads.clamp(1, MAX_IO_THREADS);
            log::warn!("io_threads = {} out of range, using {clamped}", self.io_threads);
            self.io_threads = clamped;
        }
        if self.quick_hash_bytes < MIN_BLOCK_BYTES {
            log::warn!(
                "quick_hash_bytes = {} too small, using {MIN_BLOCK_BYTES}",
                self.quick_hash_bytes
            );
            self.quick_hash_bytes = MIN_BLOCK_BYTES;
        }
        if self.chunk_bytes < MIN_BLOCK_BYTES {
            log::warn!("chunk_bytes = {} too small, using {MIN_BLOCK_BYTES}", self.chunk_bytes);
            self.chunk_bytes = MIN_BLOCK_BYTES;
        }
        self
    }

    /// Fingerprint engine settings (without shutdown flag or progress).
    #[must_use]
    pub fn fingerprint_config(&self) -> FingerprintConfig {
        FingerprintConfig::default()
            .with_io_threads(self.io_threads)
            .with_quick_hash_bytes(self.quick_hash_bytes)
            .with_chunk_bytes(self.chunk_bytes)
            .with_hardlink_shortcut(self.hardlink_shortcut)
    }

    /// Walker settings.
    #[must_use]
    pub fn walker_config(&self) -> WalkerConfig {
        WalkerConfig::default()
            .with_follow_symlinks(self.follow_symlinks)
            .with_exclude(self.exclude.clone())
    }
}
