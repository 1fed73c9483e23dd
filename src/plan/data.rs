//! Data structures for cleanup plans.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::PlanError;

/// Current version of the plan file format.
pub const PLAN_VERSION: u32 = 1;

/// Prefix of the `reason` field for duplicate cleanup.
pub const DUPLICATE_OF: &str = "duplicate-of:";

/// The kind of mutation an action performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Remove the file.
    Delete,
    /// Relocate the file under a destination root.
    Move,
    /// Replace the file with a hard link to the keeper.
    Hardlink,
}

impl ActionKind {
    /// Lowercase name, as used in plan files.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Delete => "delete",
            Self::Move => "move",
            Self::Hardlink => "hardlink",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "delete" => Ok(Self::Delete),
            "move" => Ok(Self::Move),
            "hardlink" | "link" => Ok(Self::Hardlink),
            other => Err(format!("unknown action kind: {other}")),
        }
    }
}

/// What an action does, with the data each kind needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ActionOp {
    /// Remove `path`.
    Delete,
    /// Rename `path` to `destination`.
    Move {
        /// Planned destination (canonical)
        destination: String,
    },
    /// Replace `path` with a hard link to `target`.
    Hardlink {
        /// The keeper (canonical)
        target: String,
    },
}

impl ActionOp {
    /// The kind tag.
    #[must_use]
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Delete => ActionKind::Delete,
            Self::Move { .. } => ActionKind::Move,
            Self::Hardlink { .. } => ActionKind::Hardlink,
        }
    }

    /// The move destination or link target.
    #[must_use]
    pub fn destination(&self) -> Option<&str> {
        match self {
            Self::Delete => None,
            Self::Move { destination } => Some(destination),
            Self::Hardlink { target } => Some(target),
        }
    }
}

/// One proposed mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupAction {
    /// Stable digest of kind, path and destination
    pub action_id: String,
    /// What to do
    #[serde(flatten)]
    pub op: ActionOp,
    /// File to act on (canonical)
    pub path: String,
    /// Size the file had when planned
    pub size_bytes: u64,
    /// Why the action exists, e.g. `duplicate-of:/data/a.txt`
    pub reason: String,
}

impl CleanupAction {
    /// Create an action, deriving its id.
    #[must_use]
    pub fn new(op: ActionOp, path: impl Into<String>, size_bytes: u64, reason: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            action_id: action_id(&op, &path),
            op,
            path,
            size_bytes,
            reason: reason.into(),
        }
    }

    /// The action kind.
    #[must_use]
    pub fn kind(&self) -> ActionKind {
        self.op.kind()
    }

    /// The move destination or link target.
    #[must_use]
    pub fn destination(&self) -> Option<&str> {
        self.op.destination()
    }

    /// The keeper named in a `duplicate-of:` reason.
    #[must_use]
    pub fn keeper(&self) -> Option<&str> {
        self.reason.strip_prefix(DUPLICATE_OF)
    }
}

/// Stable id: first 16 hex digits of BLAKE3 over kind, path and destination.
#[must_use]
pub fn action_id(op: &ActionOp, path: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(op.kind().as_str().as_bytes());
    hasher.update(&[0]);
    hasher.update(path.as_bytes());
    hasher.update(&[0]);
    hasher.update(op.destination().unwrap_or("").as_bytes());
    let hex = hasher.finalize().to_hex();
    hex[..16].to_string()
}

/// A persisted, reviewable list of actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupPlan {
    /// Format version.
    pub version: u32,
    /// When the plan was built.
    pub generated_at: DateTime<Utc>,
    /// SHA-256 of the scan report the plan was derived from.
    pub source_report_digest: String,
    /// Canonical roots of that scan.
    #[serde(default)]
    pub roots: Vec<String>,
    /// Actions, applied in order.
    pub actions: Vec<CleanupAction>,
}

impl CleanupPlan {
    /// Create a plan at the current version.
    #[must_use]
    pub fn new(
        generated_at: DateTime<Utc>,
        source_report_digest: impl Into<String>,
        roots: Vec<String>,
        actions: Vec<CleanupAction>,
    ) -> Self {
        Self {
            version: PLAN_VERSION,
            generated_at,
            source_report_digest: source_report_digest.into(),
            roots,
            actions,
        }
    }

    /// Number of actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether the plan has no actions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Sum of planned sizes.
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.actions.iter().map(|a| a.size_bytes).sum()
    }

    /// Check the plan is internally consistent.
    ///
    /// # Errors
    ///
    /// Returns the first [`PlanError`] found.
    pub fn validate(&self) -> Result<(), PlanError> {
        if self.version != PLAN_VERSION {
            return Err(PlanError::UnsupportedVersion {
                found: self.version,
                expected: PLAN_VERSION,
            });
        }

        let mut ids = HashSet::with_capacity(self.actions.len());
        let mut paths = HashSet::with_capacity(self.actions.len());

        for action in &self.actions {
            if action.path.is_empty() {
                return Err(PlanError::EmptyPath(action.action_id.clone()));
            }
            if !paths.insert(action.path.as_str()) {
                return Err(PlanError::DuplicatePath(action.path.clone()));
            }
            if !ids.insert(action.action_id.as_str()) {
                return Err(PlanError::DuplicateActionId(action.action_id.clone()));
            }

            if let Some(destination) = action.destination() {
                if destination.is_empty() {
                    return Err(PlanError::EmptyDestination(action.action_id.clone()));
                }
                if destination == action.path {
                    return Err(PlanError::SelfReferential {
                        action_id: action.action_id.clone(),
                        path: action.path.clone(),
                    });
                }
            }

            let expected = action_id(&action.op, &action.path);
            if expected != action.action_id {
                return Err(PlanError::ActionIdMismatch {
                    action_id: action.action_id.clone(),
                    expected,
                });
            }
        }

        for action in &self.actions {
            let link_target = match &action.op {
                ActionOp::Hardlink { target } => Some(target.as_str()),
                _ => None,
            };
            for dependency in [action.keeper(), link_target].into_iter().flatten() {
                if paths.contains(dependency) {
                    return Err(PlanError::KeeperScheduled {
                        action_id: action.action_id.clone(),
                        path: dependency.to_string(),
                    });
                }
            }
        }

        Ok(())
    }
}
