//! Filesystem primitives behind each action kind.
//!
//! Every function takes the canonical path string alongside the OS path so
//! errors name files the way plans do.

use std::fs::{self, Metadata};
use std::io;
use std::path::{Path, PathBuf};

use crate::plan::suffixed_path;
use crate::scanner::hardlink::same_inode;

use super::ActionError;

/// Highest `name (n).ext` suffix tried before giving up.
pub const MAX_COLLISION_SUFFIX: u32 = 10_000;

#[cfg(windows)]
const CROSS_DEVICE: i32 = 17;
#[cfg(not(windows))]
const CROSS_DEVICE: i32 = 18;

/// Confirm the source still matches the plan.
///
/// Symlinks are not followed: a file replaced by a link is not the file
/// that was planned.
///
/// # Errors
///
/// `SourceMissing`, `NotARegularFile` or `SizeChanged` when the file
/// drifted; an I/O error if it cannot be inspected.
pub fn check_source(path: &Path, display: &str, expected_size: u64) -> Result<Metadata, ActionError> {
    let metadata = fs::symlink_metadata(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => ActionError::SourceMissing(display.to_string()),
        _ => ActionError::from_io("inspect", display, e),
    })?;

    if !metadata.file_type().is_file() {
        return Err(ActionError::NotARegularFile(display.to_string()));
    }
    if metadata.len() != expected_size {
        return Err(ActionError::SizeChanged {
            path: display.to_string(),
            expected: expected_size,
            actual: metadata.len(),
        });
    }
    Ok(metadata)
}

/// Confirm a hardlink target is still the planned keeper.
///
/// # Errors
///
/// `TargetMissing`, `TargetNotRegular` or `TargetSizeChanged` when the
/// target drifted.
pub fn check_target(path: &Path, display: &str, expected_size: u64) -> Result<Metadata, ActionError> {
    let metadata = fs::symlink_metadata(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => ActionError::TargetMissing(display.to_string()),
        _ => ActionError::from_io("inspect", display, e),
    })?;

    if !metadata.file_type().is_file() {
        return Err(ActionError::TargetNotRegular(display.to_string()));
    }
    if metadata.len() != expected_size {
        return Err(ActionError::TargetSizeChanged {
            path: display.to_string(),
            expected: expected_size,
            actual: metadata.len(),
        });
    }
    Ok(metadata)
}

/// Remove a file, or send it to the system trash.
///
/// # Errors
///
/// `TrashFailed` or an I/O error.
pub fn delete_file(path: &Path, display: &str, use_trash: bool) -> Result<(), ActionError> {
    if use_trash {
        trash::delete(path).map_err(|e| {
            log::error!("Trash operation failed for {display}: {e}");
            ActionError::TrashFailed {
                path: display.to_string(),
                message: e.to_string(),
            }
        })?;
        log::info!("Moved to trash: {display}");
    } else {
        fs::remove_file(path).map_err(|e| ActionError::from_io("delete", display, e))?;
        log::info!("Deleted: {display}");
    }
    Ok(())
}

fn exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// The planned destination, or the first free `name (n).ext` beside it.
///
/// # Errors
///
/// `DestinationUnavailable` if every suffix up to
/// [`MAX_COLLISION_SUFFIX`] is taken.
pub fn free_destination(planned: &str) -> Result<String, ActionError> {
    if !exists(Path::new(planned)) {
        return Ok(planned.to_string());
    }
    (1..=MAX_COLLISION_SUFFIX)
        .map(|n| suffixed_path(planned, n))
        .find(|candidate| !exists(Path::new(candidate)))
        .ok_or_else(|| ActionError::DestinationUnavailable(planned.to_string()))
}

fn is_cross_device(err: &io::Error) -> bool {
    err.raw_os_error() == Some(CROSS_DEVICE)
}

/// Move a file, creating missing parent directories.
///
/// Falls back to copy, length check, then remove when `rename` cannot
/// cross filesystems. A failed fallback leaves the source in place.
///
/// # Errors
///
/// An I/O error from any step.
pub fn move_file(source: &Path, display: &str, destination: &Path, expected_size: u64) -> Result<(), ActionError> {
    let dest_display = destination.to_string_lossy();
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| ActionError::from_io("create directory", &parent.to_string_lossy(), e))?;
    }

    match fs::rename(source, destination) {
        Ok(()) => {}
        Err(e) if is_cross_device(&e) => {
            log::debug!("{display} is on another device than {dest_display}, copying");
            copy_then_remove(source, display, destination, expected_size)?;
        }
        Err(e) => return Err(ActionError::from_io("move", display, e)),
    }

    log::info!("Moved: {display} -> {dest_display}");
    Ok(())
}

fn copy_then_remove(source: &Path, display: &str, destination: &Path, expected_size: u64) -> Result<(), ActionError> {
    let copied = fs::copy(source, destination).map_err(|e| {
        let _ = fs::remove_file(destination);
        ActionError::from_io("copy", display, e)
    })?;

    if copied != expected_size {
        let _ = fs::remove_file(destination);
        return Err(ActionError::Execution {
            operation: "copy",
            path: display.to_string(),
            source: io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("copied {copied} of {expected_size} bytes"),
            ),
        });
    }

    if let Err(e) = fs::remove_file(source) {
        let _ = fs::remove_file(destination);
        return Err(ActionError::from_io("remove after copy", display, e));
    }
    Ok(())
}

/// Temporary sibling used while replacing `path` with a link.
#[must_use]
pub fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map_or_else(String::new, |n| n.to_string_lossy().into_owned());
    path.with_file_name(format!(".{name}.mrclean-link"))
}

/// Replace `path` with a hard link to `target`.
///
/// The link is created under [`staging_path`] and renamed over `path`, so
/// `path` always names either the old file or the link.
///
/// # Errors
///
/// `AlreadyLinked` if both are one inode, `StagingExists` if the temporary
/// name is taken, or an I/O error.
pub fn hardlink_file(
    path: &Path,
    display: &str,
    target: &Path,
    source_meta: &Metadata,
    target_meta: &Metadata,
) -> Result<(), ActionError> {
    let target_display = target.to_string_lossy();
    if same_inode(source_meta, target_meta) {
        return Err(ActionError::AlreadyLinked {
            path: display.to_string(),
            target: target_display.into_owned(),
        });
    }

    let staging = staging_path(path);
    if exists(&staging) {
        return Err(ActionError::StagingExists(staging.to_string_lossy().into_owned()));
    }

    fs::hard_link(target, &staging).map_err(|e| ActionError::from_io("link", display, e))?;

    if let Err(e) = fs::rename(&staging, path) {
        let _ = fs::remove_file(&staging);
        return Err(ActionError::from_io("replace", display, e));
    }

    log::info!("Linked: {display} -> {target_display}");
    Ok(())
}
