//! Path normalization for mixed Windows/POSIX environments.
//!
//! Every path the engine works with is reduced to one canonical form before
//! it is hashed, grouped or compared:
//!
//! - separators are `/`
//! - redundant `.` components and repeated separators are removed
//! - a Windows drive path (`C:\Users\me`) is rewritten to its WSL mount
//!   form (`/mnt/c/Users/me`) on POSIX hosts
//! - `~` is expanded to the home directory
//! - relative paths are made absolute against the working directory
//!
//! The style the user typed (`windows` or `posix`) is remembered so paths
//! can be rendered back in that style at the reporting boundary.
//!
//! # Example
//!
//! ```
//! use mrclean::scanner::path_utils::{normalize, PathStyle};
//!
//! let root = normalize("/srv/data/./photos/");
//! assert_eq!(root.canonical_path, "/srv/data/photos");
//! assert_eq!(root.style, PathStyle::Posix);
//! ```

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use unicode_normalization::{is_nfc, UnicodeNormalization};

const WSL_MOUNT_PREFIX: &str = "/mnt/";

/// How a path was written by the user, and how it is displayed back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PathStyle {
    /// Drive-letter paths such as `C:\Users\me`.
    Windows,
    /// Everything else.
    #[default]
    Posix,
}

impl std::fmt::Display for PathStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Windows => write!(f, "windows"),
            Self::Posix => write!(f, "posix"),
        }
    }
}

/// A user-supplied path resolved to the engine's canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedPath {
    /// The input exactly as supplied (trimmed).
    pub original: String,
    /// Canonical `/`-separated path used for all engine-internal identity.
    pub canonical_path: String,
    /// Style used when rendering paths under this root for the user.
    pub style: PathStyle,
}

impl NormalizedPath {
    /// Render a canonical path in this root's display style.
    #[must_use]
    pub fn display_for(&self, canonical: &str) -> String {
        display_as(canonical, self.style)
    }

    /// The canonical path as an OS path.
    #[must_use]
    pub fn os_path(&self) -> PathBuf {
        PathBuf::from(&self.canonical_path)
    }
}

/// Resolve a raw user path into its canonical form and display style.
#[must_use]
pub fn normalize(raw: &str) -> NormalizedPath {
    let cleaned = raw.trim();

    if is_windows_path(cleaned) {
        let canonical = if cfg!(windows) {
            clean_path(&cleaned.replace('\\', "/"))
        } else {
            clean_path(&windows_to_wsl(cleaned))
        };
        return NormalizedPath {
            original: cleaned.to_string(),
            canonical_path: canonical,
            style: PathStyle::Windows,
        };
    }

    let expanded = expand_home(cleaned);
    let separated = if cfg!(windows) {
        expanded.replace('\\', "/")
    } else {
        expanded.into_owned()
    };

    NormalizedPath {
        original: cleaned.to_string(),
        canonical_path: clean_path(&absolutize(&separated)),
        style: PathStyle::Posix,
    }
}

/// Anchor a relative path at the working directory.
///
/// `..` components are left alone. The path is returned unchanged if the
/// working directory cannot be read.
#[must_use]
pub fn absolutize(path: &str) -> Cow<'_, str> {
    if Path::new(path).is_absolute() || path.starts_with('/') {
        return Cow::Borrowed(path);
    }
    match std::path::absolute(path) {
        Ok(abs) => match to_canonical(&abs) {
            Some(abs) => Cow::Owned(abs),
            None => Cow::Borrowed(path),
        },
        Err(e) => {
            log::warn!("Cannot resolve relative path {path}: {e}");
            Cow::Borrowed(path)
        }
    }
}

/// The path with every symlink resolved, when it exists.
///
/// Two spellings of one existing location resolve to the same string.
#[must_use]
pub fn resolve_real(canonical: &str) -> Option<String> {
    std::fs::canonicalize(canonical)
        .ok()
        .and_then(|real| to_canonical(&real))
}

/// Render a canonical path in the given style.
#[must_use]
pub fn display_as(canonical: &str, style: PathStyle) -> String {
    match style {
        PathStyle::Posix => canonical.to_string(),
        PathStyle::Windows if cfg!(windows) => canonical.replace('/', "\\"),
        PathStyle::Windows => wsl_to_windows(canonical),
    }
}

/// Whether `raw` starts with a drive letter followed by a separator.
#[must_use]
pub fn is_windows_path(raw: &str) -> bool {
    matches!(
        raw.as_bytes(),
        [drive, b':', b'\\' | b'/', ..] if drive.is_ascii_alphabetic()
    )
}

/// The drive letter of a `/mnt/<drive>` compatibility mount path.
fn wsl_drive(raw: &str) -> Option<char> {
    let rest = raw.strip_prefix(WSL_MOUNT_PREFIX)?;
    match rest.as_bytes() {
        [drive] | [drive, b'/', ..] if drive.is_ascii_alphabetic() => Some(char::from(*drive)),
        _ => None,
    }
}

/// Whether `raw` lives under a `/mnt/<drive>` compatibility mount.
#[must_use]
pub fn is_wsl_mount_path(raw: &str) -> bool {
    wsl_drive(raw).is_some()
}

/// Rewrite `C:\a\b` as `/mnt/c/a/b`.
#[must_use]
pub fn windows_to_wsl(raw: &str) -> String {
    let drive = raw
        .chars()
        .next()
        .map_or('c', |c| c.to_ascii_lowercase());
    let remainder = raw
        .get(2..)
        .unwrap_or("")
        .trim_start_matches(['\\', '/'])
        .replace('\\', "/");

    if remainder.is_empty() {
        format!("/mnt/{drive}")
    } else {
        format!("/mnt/{drive}/{remainder}")
    }
}

/// Rewrite `/mnt/c/a/b` as `C:\a\b`. Other paths are returned unchanged.
#[must_use]
pub fn wsl_to_windows(raw: &str) -> String {
    let Some(drive) = wsl_drive(raw) else {
        return raw.to_string();
    };
    let drive = drive.to_ascii_uppercase();
    let remainder = raw[WSL_MOUNT_PREFIX.len() + 1..]
        .trim_start_matches('/')
        .replace('/', "\\");

    if remainder.is_empty() {
        format!("{drive}:\\")
    } else {
        format!("{drive}:\\{remainder}")
    }
}

/// Lexically clean a `/`-separated path.
///
/// `..` components are kept: resolving them without touching the
/// filesystem would be wrong in the presence of symlinks.
#[must_use]
pub fn clean_path(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }

    let absolute = path.starts_with('/');
    let parts: Vec<&str> = path
        .split('/')
        .filter(|part| !part.is_empty() && *part != ".")
        .collect();

    match (absolute, parts.is_empty()) {
        (true, true) => "/".to_string(),
        (true, false) => format!("/{}", parts.join("/")),
        (false, true) => ".".to_string(),
        (false, false) => parts.join("/"),
    }
}

/// Expand a leading `~` to the current user's home directory.
#[must_use]
pub fn expand_home(raw: &str) -> Cow<'_, str> {
    let rest = if raw == "~" {
        ""
    } else if let Some(rest) = raw.strip_prefix("~/") {
        rest
    } else {
        return Cow::Borrowed(raw);
    };

    let home = directories::BaseDirs::new()
        .and_then(|dirs| dirs.home_dir().to_str().map(str::to_string));

    match home {
        Some(home) if rest.is_empty() => Cow::Owned(home),
        Some(home) => Cow::Owned(format!("{}/{}", home.trim_end_matches('/'), rest)),
        None => Cow::Borrowed(raw),
    }
}

/// Convert an OS path produced by the walker into canonical form.
///
/// Returns `None` for paths that are not valid UTF-8; those cannot be
/// represented in reports or plans.
#[must_use]
pub fn to_canonical(path: &Path) -> Option<String> {
    let s = path.to_str()?;
    if cfg!(windows) {
        Some(s.replace('\\', "/"))
    } else {
        Some(s.to_string())
    }
}

/// Number of non-empty components in a canonical path.
#[must_use]
pub fn path_depth(canonical: &str) -> usize {
    canonical.split('/').filter(|c| !c.is_empty()).count()
}

/// The part of `path` below `root`, if `path` is `root` or lies beneath it.
///
/// Comparison is component-wise: `/data2` is not inside `/data`.
#[must_use]
pub fn relative_to<'a>(path: &'a str, root: &str) -> Option<&'a str> {
    let root = root.trim_end_matches('/');
    if root.is_empty() {
        return path.strip_prefix('/');
    }
    let rest = path.strip_prefix(root)?;
    if rest.is_empty() {
        Some("")
    } else {
        rest.strip_prefix('/')
    }
}

/// Whether `path` is `root` or lies beneath it, comparing NFC forms.
#[must_use]
pub fn is_within(path: &str, root: &str) -> bool {
    let path = normalize_nfc(path);
    let root = normalize_nfc(root);
    relative_to(&path, &root).is_some()
}

/// NFC-normalize a path string, borrowing when it is already NFC.
#[must_use]
pub fn normalize_nfc(s: &str) -> Cow<'_, str> {
    if is_nfc(s) {
        Cow::Borrowed(s)
    } else {
        Cow::Owned(s.nfc().collect())
    }
}

/// Join a canonical directory and a relative `/`-separated tail.
#[must_use]
pub fn join(dir: &str, tail: &str) -> String {
    let tail = tail.trim_start_matches('/');
    if tail.is_empty() {
        return dir.to_string();
    }
    if dir.ends_with('/') {
        format!("{dir}{tail}")
    } else {
        format!("{dir}/{tail}")
    }
}
