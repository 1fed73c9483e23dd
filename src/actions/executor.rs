//! Apply a cleanup plan to the filesystem.
//!
//! # Overview
//!
//! [`PlanExecutor::execute`] validates the plan, then either reports every
//! action as `skipped_dry_run` without touching the filesystem, or applies
//! the actions one at a time in plan order. Each action re-checks its
//! preconditions first; a failure is recorded and execution moves on.
//!
//! Cancellation is checked between actions only, so an action is either
//! fully applied or not started.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;

use crate::plan::{ActionOp, CleanupAction, CleanupPlan, PlanError};
use crate::progress::ProgressCallback;

use super::ops;
use super::result::{ExecutionReport, ExecutionResult};
use super::ActionError;

/// Configuration for the plan executor.
#[derive(Clone, Default)]
pub struct ExecutorConfig {
    /// Send deletions to the system trash instead of removing them
    pub use_trash: bool,
    /// Shutdown flag for graceful termination
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Progress callback
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for ExecutorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorConfig")
            .field("use_trash", &self.use_trash)
            .field("shutdown_flag", &self.shutdown_flag.is_some())
            .field("progress_callback", &self.progress_callback.is_some())
            .finish()
    }
}

impl ExecutorConfig {
    /// Enable or disable trash for deletions.
    #[must_use]
    pub fn with_trash(mut self, use_trash: bool) -> Self {
        self.use_trash = use_trash;
        self
    }

    /// Set the shutdown flag for graceful termination.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }
}

/// Sequential, continue-on-error plan executor.
#[derive(Debug, Default)]
pub struct PlanExecutor {
    config: ExecutorConfig,
}

impl PlanExecutor {
    /// Create an executor.
    #[must_use]
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    fn is_shutdown_requested(&self) -> bool {
        self.config
            .shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Execute `plan`.
    ///
    /// With `dry_run`, every action is reported as `skipped_dry_run` and the
    /// filesystem is never accessed.
    ///
    /// # Errors
    ///
    /// Returns a [`PlanError`] if the plan fails validation; nothing has
    /// been touched in that case. Per-action failures are not errors; they
    /// are recorded in the report.
    pub fn execute(&self, plan: &CleanupPlan, dry_run: bool) -> Result<ExecutionReport, PlanError> {
        plan.validate()?;
        let executed_at = Utc::now();

        if dry_run {
            let results = plan
                .actions
                .iter()
                .map(|action| {
                    log::debug!("Would {} {}", action.kind(), action.path);
                    ExecutionResult::skipped(&action.action_id)
                })
                .collect();
            log::info!("Dry run: {} action(s) not applied", plan.len());
            return Ok(ExecutionReport::new(plan.version, executed_at, true, false, results));
        }

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_start("execute", plan.len());
        }

        let mut results = Vec::with_capacity(plan.len());
        let mut interrupted = false;

        for (idx, action) in plan.actions.iter().enumerate() {
            if self.is_shutdown_requested() {
                log::warn!(
                    "Execution interrupted after {} of {} action(s)",
                    results.len(),
                    plan.len()
                );
                interrupted = true;
                break;
            }

            if let Some(ref callback) = self.config.progress_callback {
                callback.on_progress(idx + 1, &action.path);
            }

            let result = match self.apply(action) {
                Ok(landed) => {
                    if let Some(ref callback) = self.config.progress_callback {
                        callback.on_item_completed(action.size_bytes);
                    }
                    ExecutionResult::applied(&action.action_id, landed)
                }
                Err(err) => {
                    if err.is_precondition() {
                        log::warn!("Skipping {} {}: {err}", action.kind(), action.path);
                    } else {
                        log::error!("Failed to {} {}: {err}", action.kind(), action.path);
                    }
                    ExecutionResult::failed(&action.action_id, err.to_string())
                }
            };
            results.push(result);
        }

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_end("execute");
        }

        let report = ExecutionReport::new(plan.version, executed_at, false, interrupted, results);
        log::info!(
            "Execution complete: {} applied, {} failed",
            report.summary.applied,
            report.summary.failed
        );
        Ok(report)
    }

    /// Apply one action. Returns the landed destination when a move had to
    /// pick a different name than planned.
    fn apply(&self, action: &CleanupAction) -> Result<Option<String>, ActionError> {
        let path = std::path::Path::new(&action.path);
        let source = ops::check_source(path, &action.path, action.size_bytes)?;

        match &action.op {
            ActionOp::Delete => {
                ops::delete_file(path, &action.path, self.config.use_trash)?;
                Ok(None)
            }
            ActionOp::Move { destination } => {
                let landed = ops::free_destination(destination)?;
                ops::move_file(
                    path,
                    &action.path,
                    std::path::Path::new(&landed),
                    action.size_bytes,
                )?;
                Ok((landed != *destination).then_some(landed))
            }
            ActionOp::Hardlink { target } => {
                let target_path = std::path::Path::new(target);
                let target_meta = ops::check_target(target_path, target, action.size_bytes)?;
                ops::hardlink_file(path, &action.path, target_path, &source, &target_meta)?;
                Ok(None)
            }
        }
    }
}
