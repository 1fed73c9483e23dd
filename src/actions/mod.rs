//! Plan execution.
//!
//! This module applies a [`CleanupPlan`](crate::plan::CleanupPlan) to the
//! live filesystem:
//! - Dry-run mode that reports every action without touching disk
//! - Per-action precondition checks against the planned state
//! - Delete (permanent or to the system trash), move, and hardlink replace
//! - Continue-on-error with one result per attempted action
//!
//! ```no_run
//! use mrclean::actions::{ExecutorConfig, PlanExecutor};
//! use mrclean::plan::CleanupPlan;
//! use std::path::Path;
//!
//! let plan = CleanupPlan::load(Path::new("cleanup_plan.json"))?;
//! let executor = PlanExecutor::new(ExecutorConfig::default());
//!
//! let preview = executor.execute(&plan, true)?;
//! assert_eq!(preview.summary.applied, 0);
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod executor;
pub mod ops;
pub mod result;

pub use executor::{ExecutorConfig, PlanExecutor};
pub use result::{
    ActionStatus, ExecutionReport, ExecutionResult, ExecutionSummary, DEFAULT_EXECUTION_REPORT,
};

use std::io;

use thiserror::Error;

/// Why a single action was not applied.
///
/// Precondition variants mean the filesystem no longer matches the plan;
/// the rest are failures of the mutation itself.
#[derive(Debug, Error)]
pub enum ActionError {
    /// The file to act on is gone.
    #[error("source no longer exists: {0}")]
    SourceMissing(String),

    /// The file to act on is now a directory, symlink or special file.
    #[error("source is not a regular file: {0}")]
    NotARegularFile(String),

    /// The file to act on changed size since planning.
    #[error("source size changed: {path} (planned {expected} bytes, found {actual})")]
    SizeChanged {
        /// Source path
        path: String,
        /// Planned size
        expected: u64,
        /// Current size
        actual: u64,
    },

    /// The hardlink target is gone.
    #[error("link target no longer exists: {0}")]
    TargetMissing(String),

    /// The hardlink target is not a regular file.
    #[error("link target is not a regular file: {0}")]
    TargetNotRegular(String),

    /// The hardlink target changed size since planning.
    #[error("link target size changed: {path} (planned {expected} bytes, found {actual})")]
    TargetSizeChanged {
        /// Target path
        path: String,
        /// Planned size
        expected: u64,
        /// Current size
        actual: u64,
    },

    /// Source and target are already the same inode.
    #[error("already linked: {path} and {target} share an inode")]
    AlreadyLinked {
        /// Source path
        path: String,
        /// Target path
        target: String,
    },

    /// The temporary name used while replacing a file is taken.
    #[error("temporary link path already exists: {0}")]
    StagingExists(String),

    /// No collision-free destination could be found.
    #[error("no free destination near: {0}")]
    DestinationUnavailable(String),

    /// The OS refused access.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// A filesystem call failed.
    #[error("{operation} failed for {path}: {source}")]
    Execution {
        /// What was being attempted
        operation: &'static str,
        /// Path involved
        path: String,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Sending the file to the trash failed.
    #[error("trash operation failed for {path}: {message}")]
    TrashFailed {
        /// Source path
        path: String,
        /// Error reported by the platform trash
        message: String,
    },
}

impl ActionError {
    /// Map an I/O error from `operation` on `path`.
    pub(crate) fn from_io(operation: &'static str, path: &str, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_string()),
            _ => Self::Execution {
                operation,
                path: path.to_string(),
                source: err,
            },
        }
    }

    /// Whether the filesystem no longer matched the plan.
    #[must_use]
    pub fn is_precondition(&self) -> bool {
        !matches!(
            self,
            Self::Execution { .. } | Self::TrashFailed { .. } | Self::PermissionDenied(_)
        )
    }

    /// The path the error is about.
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::SourceMissing(p)
            | Self::NotARegularFile(p)
            | Self::TargetMissing(p)
            | Self::TargetNotRegular(p)
            | Self::StagingExists(p)
            | Self::DestinationUnavailable(p)
            | Self::PermissionDenied(p)
            | Self::SizeChanged { path: p, .. }
            | Self::TargetSizeChanged { path: p, .. }
            | Self::AlreadyLinked { path: p, .. }
            | Self::Execution { path: p, .. }
            | Self::TrashFailed { path: p, .. } => p,
        }
    }
}
