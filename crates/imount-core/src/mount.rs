//! Mount state and mount-point housekeeping.
//!
//! Nothing here remembers whether something is mounted. Every check asks
//! the filesystem again.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// Whether a mount point currently has a filesystem attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MountState {
    Mounted,
    Unmounted,
}

impl MountState {
    pub fn probe(path: &Path) -> Self {
        if is_mounted(path) {
            Self::Mounted
        } else {
            Self::Unmounted
        }
    }
}

/// True when `path` is the root of a distinct mounted filesystem.
///
/// `path` is a mount point if it is a real directory (not a symlink) whose
/// device differs from its parent's, or whose inode equals its parent's
/// (the filesystem root). Missing or unreadable paths are not mounted.
#[cfg(unix)]
pub fn is_mounted(path: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    let Ok(meta) = fs::symlink_metadata(path) else {
        return false;
    };
    if meta.file_type().is_symlink() {
        return false;
    }
    let Ok(parent) = fs::symlink_metadata(path.join("..")) else {
        return false;
    };
    meta.dev() != parent.dev() || meta.ino() == parent.ino()
}

#[cfg(not(unix))]
pub fn is_mounted(_path: &Path) -> bool {
    false
}

/// Create the mount directory (and parents) if needed.
pub async fn ensure_mount_point(path: &Path) -> io::Result<()> {
    tokio::fs::create_dir_all(path).await
}

/// Folder-safe version of an app's display name.
///
/// A trailing ` (bundle.id)` suffix is dropped first, then every character
/// that is not alphanumeric, `-` or `_` becomes `_`.
pub fn safe_name(display_name: &str) -> String {
    let base = display_name
        .split('(')
        .next()
        .unwrap_or(display_name)
        .trim();
    let base = if base.is_empty() { display_name.trim() } else { base };
    base.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// `<apps_root>/<safe_name(name)>`
pub fn app_mount_point(apps_root: &Path, name: &str) -> PathBuf {
    apps_root.join(safe_name(name))
}

/// One row of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

impl DirEntry {
    /// `[DIR]  name` / `[FILE] name`
    pub fn label(&self) -> String {
        let prefix = if self.is_dir { "[DIR] " } else { "[FILE]" };
        format!("{} {}", prefix, self.name)
    }
}

/// Sorted listing of `path`. Dotfiles are skipped unless `show_hidden`.
pub fn list_directory(path: &Path, show_hidden: bool) -> io::Result<Vec<DirEntry>> {
    let mut entries = Vec::new();
    for item in fs::read_dir(path)? {
        let item = item?;
        let name = item.file_name().to_string_lossy().into_owned();
        if !show_hidden && name.starts_with('.') {
            continue;
        }
        // Follows symlinks, so a link to a directory lists as a directory.
        let is_dir = fs::metadata(item.path()).map(|m| m.is_dir()).unwrap_or(false);
        entries.push(DirEntry { name, is_dir });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}
