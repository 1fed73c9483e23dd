//! Subcommand handlers: wire CLI arguments and configuration to the engine.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use bytesize::ByteSize;
use yansi::Paint;

use crate::actions::{ActionStatus, ExecutionReport, ExecutorConfig, PlanExecutor};
use crate::cli::{CleanArgs, DedupeArgs, ScanArgs, WalkArgs};
use crate::config::Config;
use crate::duplicates::{DuplicateFinder, FindResult, FinderConfig};
use crate::error::ExitCode;
use crate::output::DuplicateReport;
use crate::plan::{build_plan, ActionKind, CleanupPlan, PlanOptions};
use crate::progress::ProgressCallback;
use crate::scanner::{normalize, ScanReport, WalkerConfig};
use crate::signal::ShutdownHandler;

/// Shared state for one invocation.
#[derive(Clone)]
pub struct RunContext {
    /// Effective configuration
    pub config: Config,
    /// Ctrl+C flag
    pub shutdown: ShutdownHandler,
    /// Progress renderer
    pub progress: Arc<dyn ProgressCallback>,
    /// Suppress summaries
    pub quiet: bool,
}

impl RunContext {
    fn walker_config(&self, args: &WalkArgs) -> WalkerConfig {
        let mut exclude = self.config.exclude.clone();
        exclude.extend(args.exclude.iter().cloned());
        self.config
            .walker_config()
            .with_follow_symlinks(args.follow_symlinks || self.config.follow_symlinks)
            .with_skip_hidden(args.skip_hidden)
            .with_exclude(exclude)
    }

    fn finder(&self, config: Config, walk: &WalkArgs) -> Result<DuplicateFinder> {
        let finder_config = FinderConfig::default()
            .with_fingerprint_config(config.fingerprint_config())
            .with_walker_config(self.walker_config(walk))
            .with_shutdown_flag(self.shutdown.get_flag())
            .with_progress_callback(Arc::clone(&self.progress));
        DuplicateFinder::new(finder_config).context("Failed to start the fingerprint engine")
    }
}

/// `mrclean scan`: walk roots and save a scan report.
///
/// # Errors
///
/// Returns an error if the walk is interrupted or the report cannot be
/// written.
pub fn run_scan(args: &ScanArgs, ctx: &RunContext) -> Result<ExitCode> {
    let finder = ctx.finder(ctx.config.clone(), &args.walk)?;
    let report = finder.scan(&args.paths)?;
    report.save(&args.out)?;

    if !ctx.quiet {
        let bytes: u64 = report.files.iter().map(|f| f.size_bytes).sum();
        println!(
            "{} {} files ({}) under {} root(s)",
            "Scanned".green().bold(),
            report.summary.files,
            ByteSize::b(bytes),
            report.roots.len()
        );
        print_errors(report.summary.errors);
        println!("Scan report written to {}", args.out.display());
    }

    Ok(if report.errors.is_empty() {
        ExitCode::Success
    } else {
        ExitCode::PartialFailure
    })
}

/// `mrclean dedupe`: find duplicates, write the duplicate report and plan.
///
/// # Errors
///
/// Returns an error on interruption, an unreadable report, an inconsistent
/// plan, or a failed write.
pub fn run_dedupe(args: &DedupeArgs, ctx: &RunContext) -> Result<ExitCode> {
    let mut config = ctx.config.clone();
    if let Some(threads) = args.io_threads {
        config.io_threads = threads;
    }
    if let Some(window) = args.quick_hash_size {
        config.quick_hash_bytes = window;
    }
    if args.no_hardlink_shortcut {
        config.hardlink_shortcut = false;
    }
    let config = config.sanitized();

    let finder = ctx.finder(config, &args.walk)?;

    let (scan, digest) = match args.from_report {
        Some(ref path) => ScanReport::load(path)?,
        None => {
            let scan = finder.scan(&args.paths)?;
            let digest = scan.digest()?;
            (scan, digest)
        }
    };
    if !scan.errors.is_empty() {
        log::warn!("Scan report lists {} error(s)", scan.errors.len());
    }

    let result = finder.find_in_report(&scan)?;
    let roots = scan.root_paths();
    DuplicateReport::new(&roots, &result).save(&args.out)?;

    let kind = ActionKind::from(args.action);
    let mut options = PlanOptions::default()
        .with_roots(roots)
        .with_source_report_digest(digest);
    if let Some(ref destination) = args.move_to {
        options = options.with_destination_root(normalize(destination).canonical_path);
    }
    let plan = build_plan(&result.groups, kind, &options).context("Failed to build cleanup plan")?;
    plan.save(&args.plan)?;

    if !ctx.quiet {
        print_dedupe_summary(&result, &plan, kind, &args.out, &args.plan);
    }

    let failures = result.summary.hash_errors + scan.errors.len();
    Ok(if failures == 0 {
        ExitCode::Success
    } else {
        ExitCode::PartialFailure
    })
}

/// `mrclean clean`: apply or dry-run a plan and save the execution report.
///
/// # Errors
///
/// Returns an error if the plan cannot be loaded, fails validation, or the
/// report cannot be written.
pub fn run_clean(args: &CleanArgs, ctx: &RunContext) -> Result<ExitCode> {
    let plan = CleanupPlan::load(&args.plan)?;
    log::info!(
        "Loaded plan with {} action(s) generated at {}",
        plan.len(),
        plan.generated_at
    );

    let executor = PlanExecutor::new(
        ExecutorConfig::default()
            .with_trash(args.trash || ctx.config.use_trash)
            .with_shutdown_flag(ctx.shutdown.get_flag())
            .with_progress_callback(Arc::clone(&ctx.progress)),
    );
    let report = executor
        .execute(&plan, args.dry_run)
        .with_context(|| format!("Refusing to execute {}", args.plan.display()))?;
    report.save(&args.report)?;

    if !ctx.quiet {
        print_execution(&plan, &report, &args.report);
    }

    Ok(if report.interrupted {
        ExitCode::Interrupted
    } else if report.all_succeeded() {
        ExitCode::Success
    } else {
        ExitCode::PartialFailure
    })
}

fn print_errors(count: usize) {
    if count > 0 {
        println!("{} {count} path(s) could not be read", "Warning:".yellow().bold());
    }
}

fn print_dedupe_summary(
    result: &FindResult,
    plan: &CleanupPlan,
    kind: ActionKind,
    report_path: &Path,
    plan_path: &Path,
) {
    let summary = &result.summary;
    println!(
        "{} {} duplicate group(s), {} duplicate file(s), {} reclaimable ({:.1}% of {})",
        "Found".green().bold(),
        summary.duplicate_groups,
        summary.duplicate_files,
        summary.reclaimable_display().bold(),
        summary.wasted_percentage(),
        ByteSize::b(summary.total_bytes)
    );
    for group in result.groups.iter().take(10) {
        println!(
            "  {} {} ({} copies)",
            ByteSize::b(group.size_bytes()).cyan(),
            group.keeper().display_path,
            group.duplicate_count()
        );
    }
    if result.groups.len() > 10 {
        println!("  ... and {} more", result.groups.len() - 10);
    }
    print_errors(summary.hash_errors);
    if summary.skipped > 0 {
        println!("Skipped {} symlink(s) or special file(s)", summary.skipped);
    }
    println!("Duplicate report written to {}", report_path.display());
    println!(
        "Plan with {} {kind} action(s) written to {}; review it, then run `mrclean clean {}`",
        plan.len(),
        plan_path.display(),
        plan_path.display()
    );
}

fn print_execution(plan: &CleanupPlan, report: &ExecutionReport, report_path: &Path) {
    for (action, result) in plan.actions.iter().zip(&report.results) {
        match result.status {
            ActionStatus::SkippedDryRun => {
                let target = action
                    .destination()
                    .map(|d| format!(" -> {d}"))
                    .unwrap_or_default();
                println!("  {} {}{target}", action.kind().yellow(), action.path);
            }
            ActionStatus::Applied => {
                let target = result
                    .destination
                    .as_deref()
                    .or(action.destination())
                    .map(|d| format!(" -> {d}"))
                    .unwrap_or_default();
                println!("  {} {}{target}", action.kind().green(), action.path);
            }
            ActionStatus::Failed => println!(
                "  {} {}: {}",
                "failed".red().bold(),
                action.path,
                result.error_detail.as_deref().unwrap_or("unknown error")
            ),
        }
    }

    let summary = &report.summary;
    if report.dry_run {
        println!(
            "{} {} action(s) would free {}; nothing was changed",
            "Dry run:".yellow().bold(),
            summary.skipped,
            ByteSize::b(plan.total_bytes())
        );
    } else {
        println!(
            "{} {} applied, {} failed",
            "Done:".green().bold(),
            summary.applied,
            summary.failed
        );
    }
    if report.interrupted {
        println!(
            "{} stopped after {} of {} action(s)",
            "Interrupted:".red().bold(),
            report.results.len(),
            plan.len()
        );
    }
    println!("Execution report written to {}", report_path.display());
}
