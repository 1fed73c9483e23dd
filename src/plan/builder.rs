//! Turn duplicate groups into a cleanup plan.
//!
//! The builder is pure: it reads nothing from disk, so the same groups and
//! options always produce byte-identical plans (with `generated_at` pinned).

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::duplicates::DuplicateGroup;
use crate::scanner::path_utils;

use super::data::{ActionKind, ActionOp, CleanupAction, CleanupPlan, DUPLICATE_OF};
use super::PlanError;

/// Inputs to [`build_plan`] beyond the groups themselves.
#[derive(Debug, Clone, Default)]
pub struct PlanOptions {
    /// Canonical root that `move` destinations are mirrored under
    pub destination_root: Option<String>,
    /// Canonical scan roots, used to compute mirrored relative paths
    pub roots: Vec<String>,
    /// Digest of the scan report the groups came from
    pub source_report_digest: String,
    /// Timestamp to stamp on the plan (now when unset)
    pub generated_at: Option<DateTime<Utc>>,
}

impl PlanOptions {
    /// Set the destination root for `move`.
    #[must_use]
    pub fn with_destination_root(mut self, root: impl Into<String>) -> Self {
        self.destination_root = Some(root.into());
        self
    }

    /// Set the scan roots.
    #[must_use]
    pub fn with_roots(mut self, roots: Vec<String>) -> Self {
        self.roots = roots;
        self
    }

    /// Set the source report digest.
    #[must_use]
    pub fn with_source_report_digest(mut self, digest: impl Into<String>) -> Self {
        self.source_report_digest = digest.into();
        self
    }

    /// Pin the plan timestamp.
    #[must_use]
    pub fn with_generated_at(mut self, at: DateTime<Utc>) -> Self {
        self.generated_at = Some(at);
        self
    }
}

/// Build a plan with one `kind` action per candidate.
///
/// Keepers never receive an action. Actions are sorted by path. For
/// `move`, destinations mirror each candidate's position below its scan
/// root, and collisions with member paths or earlier destinations get a
/// `name (n).ext` suffix. Candidates already linked to their keeper are
/// left out of `hardlink` plans.
///
/// # Errors
///
/// Returns [`PlanError::MissingDestinationRoot`] for `move` without a
/// destination root, or any error from [`CleanupPlan::validate`].
pub fn build_plan(
    groups: &[DuplicateGroup],
    kind: ActionKind,
    options: &PlanOptions,
) -> Result<CleanupPlan, PlanError> {
    let destination_root = match (kind, options.destination_root.as_deref()) {
        (ActionKind::Move, None) => return Err(PlanError::MissingDestinationRoot),
        (ActionKind::Move, Some(root)) if root.is_empty() => {
            return Err(PlanError::MissingDestinationRoot)
        }
        (_, root) => root,
    };

    let mut pending: Vec<(&DuplicateGroup, usize)> = groups
        .iter()
        .flat_map(|group| (0..group.candidates().len()).map(move |idx| (group, idx)))
        .collect();
    pending.sort_by(|(ga, ia), (gb, ib)| {
        ga.candidates()[*ia]
            .canonical_path
            .cmp(&gb.candidates()[*ib].canonical_path)
    });

    let mut taken: HashSet<String> = groups
        .iter()
        .flat_map(DuplicateGroup::members)
        .map(|record| record.canonical_path.clone())
        .collect();

    let mut actions = Vec::with_capacity(pending.len());
    for (group, idx) in pending {
        let keeper = group.keeper();
        let candidate = &group.candidates()[idx];
        let reason = format!("{DUPLICATE_OF}{}", keeper.canonical_path);

        let op = match kind {
            ActionKind::Delete => ActionOp::Delete,
            ActionKind::Move => {
                let root = destination_root.unwrap_or_default();
                let planned = mirror_destination(&candidate.canonical_path, &options.roots, root);
                let destination = free_name(&planned, &taken);
                taken.insert(destination.clone());
                ActionOp::Move { destination }
            }
            ActionKind::Hardlink => {
                if candidate.inode_key().is_some() && candidate.inode_key() == keeper.inode_key() {
                    log::debug!(
                        "No hardlink action for {}: already linked to {}",
                        candidate.canonical_path,
                        keeper.canonical_path
                    );
                    continue;
                }
                ActionOp::Hardlink {
                    target: keeper.canonical_path.clone(),
                }
            }
        };

        actions.push(CleanupAction::new(
            op,
            candidate.canonical_path.clone(),
            candidate.size_bytes,
            reason,
        ));
    }

    let plan = CleanupPlan::new(
        options.generated_at.unwrap_or_else(Utc::now),
        options.source_report_digest.clone(),
        options.roots.clone(),
        actions,
    );
    plan.validate()?;

    log::info!(
        "Planned {} {} action(s) across {} group(s)",
        plan.len(),
        kind,
        groups.len()
    );
    Ok(plan)
}

/// Where `path` lands under `destination_root`.
///
/// The path is taken relative to the longest matching root; a path outside
/// every root keeps its full absolute layout below the destination.
#[must_use]
pub fn mirror_destination(path: &str, roots: &[String], destination_root: &str) -> String {
    let relative = roots
        .iter()
        .filter_map(|root| {
            path_utils::relative_to(path, root)
                .filter(|rel| !rel.is_empty())
                .map(|rel| (root.len(), rel))
        })
        .max_by_key(|(len, _)| *len)
        .map_or_else(|| path.trim_start_matches('/'), |(_, rel)| rel);

    path_utils::join(destination_root, relative)
}

/// `name.ext` → `name (n).ext`; dotfiles and extensionless names get the
/// suffix at the end.
#[must_use]
pub fn suffixed_path(path: &str, n: u32) -> String {
    let (dir, name) = match path.rfind('/') {
        Some(idx) => path.split_at(idx + 1),
        None => ("", path),
    };
    match name.rfind('.') {
        Some(dot) if dot > 0 => {
            let (stem, ext) = name.split_at(dot);
            format!("{dir}{stem} ({n}){ext}")
        }
        _ => format!("{dir}{name} ({n})"),
    }
}

fn free_name(planned: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(planned) {
        return planned.to_string();
    }
    (1u32..)
        .map(|n| suffixed_path(planned, n))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| planned.to_string())
}
