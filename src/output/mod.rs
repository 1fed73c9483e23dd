//! Report writers.
//!
//! - [`json`]: the duplicate report written by `dedupe --out`
//! - [`write_atomic`]: temp-file-and-rename persistence shared by every
//!   report, plan and execution record
//!
//! # Example
//!
//! ```no_run
//! use mrclean::duplicates::{DuplicateFinder, FinderConfig};
//! use mrclean::output::json::DuplicateReport;
//! use std::path::Path;
//!
//! let finder = DuplicateFinder::new(FinderConfig::default())?;
//! let scan = finder.scan(&["/srv/photos"])?;
//! let result = finder.find_in_report(&scan)?;
//!
//! let report = DuplicateReport::new(&scan.root_paths(), &result);
//! report.save(Path::new("duplicates_report.json"))?;
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod json;

pub use json::{DuplicateReport, DEFAULT_DUPLICATES_REPORT};

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Write `bytes` to `path` so readers see either the old or the new file.
///
/// The data goes to a hidden sibling first, is synced, then renamed over
/// `path`. The sibling is removed if any step fails.
///
/// # Errors
///
/// Returns the underlying I/O error.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp = temp_sibling(path);

    let result = (|| {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.flush()?;
        file.sync_all()?;
        drop(file);
        fs::rename(&tmp, path)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map_or_else(|| "output".into(), |n| n.to_string_lossy().into_owned());
    path.with_file_name(format!(".{name}.tmp-{}", std::process::id()))
}
