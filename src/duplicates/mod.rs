//! Duplicate detection module.
//!
//! This module provides functionality for:
//! - Size bucketing (Phase 1)
//! - Quick hash comparison (Phase 2)
//! - Full hash comparison (Phase 3)
//! - Duplicate groups and keeper selection

pub mod finder;
pub mod fingerprint;
pub mod groups;

pub use finder::{DedupeSummary, DuplicateFinder, FindResult, FinderConfig, FinderError};
pub use fingerprint::{
    Fingerprint, FingerprintConfig, FingerprintEngine, FingerprintError, FingerprintSet,
    FingerprintStats, FingerprintedFile, SkippedFile,
};
pub use groups::{
    group, group_by_size, keeper_order, select_keeper, DuplicateGroup, GroupError, GroupKey,
    GroupingStats,
};
