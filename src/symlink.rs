//! Symlink creation for install steps

use crate::error::{PourError, Result};
use std::fs;
use std::os::unix::fs as unix_fs;
use std::path::{Component, Path, PathBuf};

/// Lexically normalize a path, resolving `.` and `..` without touching the filesystem
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // Keep leading `..` on relative paths, drop it at the root
                match out.components().next_back() {
                    Some(Component::Normal(_)) => {
                        out.pop();
                    }
                    Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                    _ => out.push(".."),
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Text stored in the link: relative to the link's directory when possible
fn link_contents(target: &Path, link: &Path) -> PathBuf {
    link.parent()
        .filter(|_| target.is_absolute() && link.is_absolute())
        .and_then(|dir| pathdiff::diff_paths(target, dir))
        .unwrap_or_else(|| target.to_path_buf())
}

/// Create a symlink at `link` pointing to `target`.
///
/// `link` must not exist in any form, including a dangling symlink.
/// `target` must exist when the link is created.
pub fn create_symlink(target: &Path, link: &Path) -> Result<PathBuf> {
    if link.symlink_metadata().is_ok() {
        return Err(PourError::PathExists {
            path: link.to_path_buf(),
        });
    }
    if !target.exists() {
        return Err(PourError::MissingTarget {
            path: target.to_path_buf(),
        });
    }

    let contents = link_contents(target, link);
    unix_fs::symlink(&contents, link).map_err(|e| PourError::fs(link, e))?;
    tracing::debug!("Linked {} -> {}", link.display(), contents.display());

    Ok(contents)
}

/// Does `link` resolve (lexically) to `target`?
pub fn points_to(link: &Path, target: &Path) -> bool {
    let Ok(contents) = fs::read_link(link) else {
        return false;
    };
    let resolved = match link.parent() {
        Some(dir) if contents.is_relative() => dir.join(&contents),
        _ => contents,
    };
    normalize_path(&resolved) == normalize_path(target)
}
