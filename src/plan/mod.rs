//! Cleanup plans: the reviewable hand-off between detection and execution.
//!
//! A plan lists one action per duplicate candidate. It is built from
//! duplicate groups without touching the filesystem, saved as JSON for
//! review, and later applied by the executor, which trusts nothing but the
//! plan file.
//!
//! # Features
//!
//! * **Deterministic**: the same groups and options always produce the same
//!   actions, ids and destinations.
//! * **Stable ids**: each action id is a digest of kind, path and
//!   destination, so an edited action no longer matches its id.
//! * **Atomic persistence**: plans are written to a temporary sibling and
//!   renamed into place.
//!
//! # Architecture
//!
//! * [`data`]: plan and action model, validation
//! * [`builder`]: groups → plan
//! * [`io`]: JSON load/save

pub mod builder;
pub mod data;
pub mod io;

pub use builder::{build_plan, mirror_destination, suffixed_path, PlanOptions};
pub use data::{ActionKind, ActionOp, CleanupAction, CleanupPlan, PLAN_VERSION};

/// Default file name for `dedupe --plan`.
pub const DEFAULT_PLAN_FILE: &str = "cleanup_plan.json";

/// A plan that is unsafe to build or execute.
///
/// Raised before any filesystem mutation; never partially applied.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// The plan was written by an incompatible version.
    #[error("Unsupported plan version {found} (expected {expected})")]
    UnsupportedVersion {
        /// Version in the file
        found: u32,
        /// Version this build understands
        expected: u32,
    },

    /// Two actions share an id.
    #[error("Duplicate action id: {0}")]
    DuplicateActionId(String),

    /// Two actions target the same path.
    #[error("More than one action for path: {0}")]
    DuplicatePath(String),

    /// An action has no path.
    #[error("Action {0} has an empty path")]
    EmptyPath(String),

    /// A move or hardlink has no destination.
    #[error("Action {0} has an empty destination")]
    EmptyDestination(String),

    /// An action's destination is its own path.
    #[error("Action {action_id} points at itself: {path}")]
    SelfReferential {
        /// Offending action
        action_id: String,
        /// Its path
        path: String,
    },

    /// An action id does not match its content.
    #[error("Action id {action_id} does not match its content (expected {expected})")]
    ActionIdMismatch {
        /// Id in the plan
        action_id: String,
        /// Id computed from kind, path and destination
        expected: String,
    },

    /// A file that another action depends on is itself scheduled.
    #[error("Action {action_id} depends on {path}, which is also scheduled for cleanup")]
    KeeperScheduled {
        /// Dependent action
        action_id: String,
        /// The keeper or link target
        path: String,
    },

    /// `move` was requested without a destination root.
    #[error("Move actions require a destination root")]
    MissingDestinationRoot,
}
