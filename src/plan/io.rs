//! I/O operations for cleanup plans.

use std::path::Path;

use anyhow::{Context, Result};

use crate::output::write_atomic;
use crate::plan::data::{CleanupPlan, PLAN_VERSION};

impl CleanupPlan {
    /// Serialize to pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize cleanup plan")
    }

    /// Parse a plan from JSON, checking only its version.
    ///
    /// Full consistency checks are left to [`CleanupPlan::validate`], which
    /// the executor always runs.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed JSON or an unsupported version.
    pub fn from_json(json: &str) -> Result<Self> {
        let plan: Self = serde_json::from_str(json).context("Failed to parse cleanup plan")?;
        if plan.version != PLAN_VERSION {
            anyhow::bail!(
                "Unsupported plan version: {}. Current version is {}.",
                plan.version,
                PLAN_VERSION
            );
        }
        Ok(plan)
    }

    /// Write the plan atomically (temporary sibling + rename).
    ///
    /// # Errors
    ///
    /// Returns an error if the plan cannot be serialized or written.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        write_atomic(path, json.as_bytes())
            .with_context(|| format!("Failed to write cleanup plan: {}", path.display()))?;
        log::debug!("Saved plan with {} action(s) to {}", self.len(), path.display());
        Ok(())
    }

    /// Load a plan from a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read cleanup plan: {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("Invalid cleanup plan: {}", path.display()))
    }
}
