//! Per-action outcomes and the execution report.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::output::write_atomic;

/// Default file name for `clean --report`.
pub const DEFAULT_EXECUTION_REPORT: &str = "execution_report.json";

/// What happened to one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    /// The mutation was performed.
    Applied,
    /// Dry run: nothing was done.
    SkippedDryRun,
    /// A precondition or the mutation failed.
    Failed,
}

/// Outcome of one attempted action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// The action this result belongs to
    pub action_id: String,
    /// Outcome
    pub status: ActionStatus,
    /// Why it failed; present iff `status` is `failed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    /// Where a move actually landed, when it differs from the plan
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
}

impl ExecutionResult {
    /// An applied action.
    #[must_use]
    pub fn applied(action_id: impl Into<String>, destination: Option<String>) -> Self {
        Self {
            action_id: action_id.into(),
            status: ActionStatus::Applied,
            error_detail: None,
            destination,
        }
    }

    /// A dry-run entry.
    #[must_use]
    pub fn skipped(action_id: impl Into<String>) -> Self {
        Self {
            action_id: action_id.into(),
            status: ActionStatus::SkippedDryRun,
            error_detail: None,
            destination: None,
        }
    }

    /// A failed action.
    #[must_use]
    pub fn failed(action_id: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            action_id: action_id.into(),
            status: ActionStatus::Failed,
            error_detail: Some(detail.into()),
            destination: None,
        }
    }
}

/// Counts by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    /// Applied actions
    pub applied: usize,
    /// Dry-run entries
    pub skipped: usize,
    /// Failed actions
    pub failed: usize,
}

impl ExecutionSummary {
    /// Tally a result list.
    #[must_use]
    pub fn from_results(results: &[ExecutionResult]) -> Self {
        results.iter().fold(Self::default(), |mut acc, r| {
            match r.status {
                ActionStatus::Applied => acc.applied += 1,
                ActionStatus::SkippedDryRun => acc.skipped += 1,
                ActionStatus::Failed => acc.failed += 1,
            }
            acc
        })
    }
}

/// Everything `clean` did, in plan order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReport {
    /// Version of the executed plan
    pub plan_version: u32,
    /// When execution started
    pub executed_at: DateTime<Utc>,
    /// Whether this was a dry run
    pub dry_run: bool,
    /// Whether cancellation stopped execution early
    pub interrupted: bool,
    /// One result per attempted action
    pub results: Vec<ExecutionResult>,
    /// Counts by status
    pub summary: ExecutionSummary,
}

impl ExecutionReport {
    /// Build a report, tallying the summary.
    #[must_use]
    pub fn new(
        plan_version: u32,
        executed_at: DateTime<Utc>,
        dry_run: bool,
        interrupted: bool,
        results: Vec<ExecutionResult>,
    ) -> Self {
        Self {
            plan_version,
            executed_at,
            dry_run,
            interrupted,
            summary: ExecutionSummary::from_results(&results),
            results,
        }
    }

    /// No action failed.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.summary.failed == 0
    }

    /// Result for an action id.
    #[must_use]
    pub fn result_for(&self, action_id: &str) -> Option<&ExecutionResult> {
        self.results.iter().find(|r| r.action_id == action_id)
    }

    /// Serialize to pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize execution report")
    }

    /// Write the report atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the report cannot be serialized or written.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        write_atomic(path, json.as_bytes())
            .with_context(|| format!("Failed to write execution report: {}", path.display()))
    }
}
