//! Progress reporting for long-running phases.
//!
//! Engine components report through [`ProgressCallback`]; the CLI renders
//! those reports with [`Progress`], an `indicatif` implementation. Phases:
//!
//! | Phase | Reported by | Unit |
//! |---|---|---|
//! | `walking` | `DuplicateFinder::scan` | spinner |
//! | `quick_hash` | fingerprint engine | files |
//! | `full_hash` | fingerprint engine | files |
//! | `execute` | plan executor | actions |

use std::sync::Mutex;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Receives progress updates from the engine.
pub trait ProgressCallback: Send + Sync {
    /// A phase started with `total` items (0 when unknown).
    fn on_phase_start(&self, phase: &str, total: usize);

    /// Item `current` (1-based) is being processed.
    fn on_progress(&self, current: usize, path: &str);

    /// An item of `bytes` bytes finished.
    fn on_item_completed(&self, _bytes: u64) {}

    /// A phase finished.
    fn on_phase_end(&self, phase: &str);

    /// Free-form status text.
    fn on_message(&self, _message: &str) {}
}

/// Terminal progress bars, one per active phase.
pub struct Progress {
    multi: MultiProgress,
    active: Mutex<Option<(String, ProgressBar)>>,
    quiet: bool,
}

impl Progress {
    /// Create a reporter. With `quiet`, nothing is drawn.
    ///
    /// ```
    /// use mrclean::progress::Progress;
    ///
    /// let progress = Progress::new(true);
    /// ```
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            multi: MultiProgress::new(),
            active: Mutex::new(None),
            quiet,
        }
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed_precise}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
    }

    fn bar_style(color: &str) -> ProgressStyle {
        let template = format!(
            "[{{elapsed_precise}}] [{{bar:40.{color}/blue}}] {{pos}}/{{len}} ({{percent}}%) {{msg}} (ETA: {{eta}})"
        );
        ProgressStyle::with_template(&template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█>-")
    }

    fn label(phase: &str) -> &str {
        match phase {
            "walking" => "Walking",
            "quick_hash" => "Quick hashing",
            "full_hash" => "Full hashing",
            "execute" => "Applying plan",
            other => other,
        }
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(active) = self.active.lock() {
            if let Some((_, ref pb)) = *active {
                f(pb);
            }
        }
    }
}

impl ProgressCallback for Progress {
    fn on_phase_start(&self, phase: &str, total: usize) {
        if self.quiet {
            return;
        }

        let pb = if total == 0 {
            let pb = self.multi.add(ProgressBar::new_spinner());
            pb.set_style(Self::spinner_style());
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        } else {
            let color = if phase == "full_hash" { "green" } else { "cyan" };
            let pb = self.multi.add(ProgressBar::new(total as u64));
            pb.set_style(Self::bar_style(color));
            pb
        };
        pb.set_message(Self::label(phase).to_string());

        if let Ok(mut active) = self.active.lock() {
            if let Some((_, previous)) = active.take() {
                previous.finish_and_clear();
            }
            *active = Some((phase.to_string(), pb));
        }
    }

    fn on_progress(&self, current: usize, path: &str) {
        if self.quiet {
            return;
        }
        self.with_bar(|pb| {
            pb.set_position(current as u64);
            pb.set_message(truncate_path(path, 30));
        });
    }

    fn on_phase_end(&self, phase: &str) {
        if self.quiet {
            return;
        }
        if let Ok(mut active) = self.active.lock() {
            if active.as_ref().is_some_and(|(name, _)| name == phase) {
                if let Some((_, pb)) = active.take() {
                    pb.finish_with_message(format!("{} complete", Self::label(phase)));
                }
            }
        }
    }

    fn on_message(&self, message: &str) {
        if self.quiet {
            return;
        }
        self.with_bar(|pb| pb.set_message(message.to_string()));
    }
}

/// Shorten a path to its file name when it does not fit.
fn truncate_path(path: &str, max_len: usize) -> String {
    if path.chars().count() <= max_len {
        return path.to_string();
    }

    let file_name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    let len = file_name.chars().count();
    if len + 4 > max_len {
        let tail: String = file_name.chars().skip(len.saturating_sub(max_len - 3)).collect();
        return format!("...{tail}");
    }

    format!(".../{file_name}")
}
