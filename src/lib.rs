//! mrclean - duplicate detection and dry-run-first cleanup.
//!
//! The pipeline runs in stages, each returning a new value:
//!
//! 1. [`scanner`]: walk roots into [`FileRecord`](scanner::FileRecord)s,
//!    or load them from a saved [`ScanReport`](scanner::ScanReport)
//! 2. [`duplicates`]: fingerprint (size, quick hash, full hash) and group
//!    identical files, selecting a keeper per group
//! 3. [`plan`]: turn groups into a reviewable, persisted
//!    [`CleanupPlan`](plan::CleanupPlan)
//! 4. [`actions`]: apply a plan, or dry-run it, one action at a time

pub mod actions;
pub mod cli;
pub mod commands;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod logging;
pub mod output;
pub mod plan;
pub mod progress;
pub mod scanner;
pub mod signal;

use std::sync::Arc;

use anyhow::Result;

use crate::cli::{Cli, Commands};
use crate::commands::RunContext;
use crate::config::Config;
use crate::error::ExitCode;
use crate::progress::Progress;

/// Run a parsed command line.
///
/// # Errors
///
/// Returns an error for setup failures (configuration, signal handler,
/// unreadable inputs) and interrupted scans. Per-file and per-action
/// failures are reported through the returned [`ExitCode`] instead.
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    if cli.no_color {
        yansi::disable();
    }
    logging::init_logging(cli.verbose, cli.quiet);

    let shutdown = signal::install_handler()?;
    let config = Config::load(cli.config.as_deref())?;
    log::debug!("Effective configuration: {config:?}");

    let ctx = RunContext {
        config,
        shutdown,
        progress: Arc::new(Progress::new(cli.quiet)),
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Scan(ref args) => commands::run_scan(args, &ctx),
        Commands::Dedupe(ref args) => commands::run_dedupe(args, &ctx),
        Commands::Clean(ref args) => commands::run_clean(args, &ctx),
    }
}
