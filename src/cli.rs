//! Command-line interface definitions.
//!
//! # Example
//!
//! ```bash
//! # Walk two roots and save the scan report
//! mrclean scan ~/Photos 'D:\Backup' --out scan_report.json
//!
//! # Find duplicates in a saved report and plan moves into a quarantine
//! mrclean dedupe --from-report scan_report.json --action move --move-to /srv/quarantine
//!
//! # Review, then apply
//! mrclean clean cleanup_plan.json --dry-run
//! mrclean clean cleanup_plan.json
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::actions::DEFAULT_EXECUTION_REPORT;
use crate::output::DEFAULT_DUPLICATES_REPORT;
use crate::plan::{ActionKind, DEFAULT_PLAN_FILE};
use crate::scanner::report::DEFAULT_SCAN_REPORT;

/// Find duplicate files and clean them up through reviewable plans.
///
/// `scan` records what is on disk, `dedupe` finds identical content and
/// writes a cleanup plan, `clean` applies (or dry-runs) that plan.
#[derive(Debug, Parser)]
#[command(name = "mrclean")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Print errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Configuration file (default: <config dir>/mrclean/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Walk roots and save a scan report
    Scan(ScanArgs),
    /// Find duplicates and write a duplicate report and cleanup plan
    Dedupe(DedupeArgs),
    /// Apply a cleanup plan
    Clean(CleanArgs),
}

/// Walker options shared by `scan` and `dedupe`.
#[derive(Debug, Clone, Default, Args)]
pub struct WalkArgs {
    /// Gitignore-style pattern to exclude (repeatable)
    #[arg(short, long, value_name = "GLOB")]
    pub exclude: Vec<String>,

    /// Follow symbolic links
    #[arg(long)]
    pub follow_symlinks: bool,

    /// Skip hidden files and directories
    #[arg(long)]
    pub skip_hidden: bool,
}

/// Arguments for `scan`.
#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Roots to walk (POSIX or Windows drive paths)
    #[arg(value_name = "PATH", required = true)]
    pub paths: Vec<String>,

    /// Where to write the scan report
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_SCAN_REPORT)]
    pub out: PathBuf,

    #[command(flatten)]
    pub walk: WalkArgs,
}

/// Arguments for `dedupe`.
#[derive(Debug, Args)]
pub struct DedupeArgs {
    /// Roots to walk
    #[arg(value_name = "PATH", required_unless_present = "from_report")]
    pub paths: Vec<String>,

    /// Use a saved scan report instead of walking
    #[arg(long, value_name = "FILE", conflicts_with = "paths")]
    pub from_report: Option<PathBuf>,

    /// Where to write the duplicate report
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_DUPLICATES_REPORT)]
    pub out: PathBuf,

    /// Where to write the cleanup plan
    #[arg(long, value_name = "FILE", default_value = DEFAULT_PLAN_FILE)]
    pub plan: PathBuf,

    /// Action planned for each duplicate
    #[arg(long, value_enum, default_value_t = ActionArg::Delete)]
    pub action: ActionArg,

    /// Destination root for `--action move`
    #[arg(long, value_name = "DIR", required_if_eq("action", "move"))]
    pub move_to: Option<String>,

    /// Hashing threads
    #[arg(long, value_name = "N")]
    pub io_threads: Option<usize>,

    /// Quick-hash window (e.g. 64KiB)
    #[arg(long, value_name = "SIZE", value_parser = parse_window)]
    pub quick_hash_size: Option<usize>,

    /// Hash every file on its own, even hardlinks to one inode
    #[arg(long)]
    pub no_hardlink_shortcut: bool,

    #[command(flatten)]
    pub walk: WalkArgs,
}

/// Arguments for `clean`.
#[derive(Debug, Args)]
pub struct CleanArgs {
    /// Cleanup plan to apply
    #[arg(value_name = "PLAN")]
    pub plan: PathBuf,

    /// Report what would happen without touching the filesystem
    #[arg(long)]
    pub dry_run: bool,

    /// Where to write the execution report
    #[arg(long, value_name = "FILE", default_value = DEFAULT_EXECUTION_REPORT)]
    pub report: PathBuf,

    /// Send deleted files to the system trash
    #[arg(long)]
    pub trash: bool,
}

/// `--action` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ActionArg {
    /// Remove duplicates
    Delete,
    /// Move duplicates under `--move-to`
    Move,
    /// Replace duplicates with hard links to the keeper
    Hardlink,
}

impl From<ActionArg> for ActionKind {
    fn from(arg: ActionArg) -> Self {
        match arg {
            ActionArg::Delete => Self::Delete,
            ActionArg::Move => Self::Move,
            ActionArg::Hardlink => Self::Hardlink,
        }
    }
}

/// Parse a human-readable size string into bytes.
///
/// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB. Case-insensitive.
/// Numbers without suffix are bytes.
///
/// ```
/// use mrclean::cli::parse_size;
///
/// assert_eq!(parse_size("4096").unwrap(), 4096);
/// assert_eq!(parse_size("64KiB").unwrap(), 65_536);
/// assert_eq!(parse_size("1MB").unwrap(), 1_000_000);
/// ```
///
/// # Errors
///
/// Returns an error for an empty string, a malformed number, or an unknown
/// suffix.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Size cannot be empty".to_string());
    }

    let (num_str, suffix) = match s.find(|c: char| !c.is_ascii_digit() && c != '.') {
        Some(idx) => (&s[..idx], s[idx..].trim().to_uppercase()),
        None => (s, String::new()),
    };

    let num: f64 = num_str
        .parse()
        .map_err(|_| format!("Invalid number: '{num_str}'"))?;

    let multiplier: u64 = match suffix.as_str() {
        "" | "B" => 1,
        "KB" | "K" => 1_000,
        "KIB" => 1_024,
        "MB" | "M" => 1_000_000,
        "MIB" => 1_048_576,
        "GB" | "G" => 1_000_000_000,
        "GIB" => 1_073_741_824,
        _ => return Err(format!("Unknown size suffix: '{suffix}'")),
    };

    let bytes = num * multiplier as f64;
    if !bytes.is_finite() || bytes >= u64::MAX as f64 {
        return Err(format!("Size too large: '{s}'"));
    }
    Ok(bytes as u64)
}

/// Parse a read-window size: a [`parse_size`] value of at least one byte
/// that fits in memory on this platform.
///
/// # Errors
///
/// Returns an error for anything [`parse_size`] rejects, for zero, and for
/// sizes beyond `usize`.
pub fn parse_window(s: &str) -> Result<usize, String> {
    let bytes = parse_size(s)?;
    if bytes == 0 {
        return Err("Window must be at least 1 byte".to_string());
    }
    usize::try_from(bytes).map_err(|_| format!("Window too large for this platform: '{}'", s.trim()))
}
