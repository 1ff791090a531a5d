//! Archive extraction into a temporary staging directory.
//!
//! Prebuilt archives usually wrap their contents in a single top-level
//! directory named after the release:
//! ```text
//! embree-2.7.0.x86_64.macosx.tar.gz
//!   embree-2.7.0.x86_64.macosx/
//!     lib/libembree.2.dylib
//!     include/embree2/rtcore.h
//! ```
//! When that is the case the wrapper directory becomes the staging root, so
//! recipe patterns are written as `lib/...` and `include/*`.
//!
//! The staging directory is removed when the returned [`Staging`] is dropped.

use crate::error::{PourError, Result};
use flate2::read::GzDecoder;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use tar::Archive;
use tempfile::TempDir;

/// An extracted archive, deleted on drop
#[derive(Debug)]
pub struct Staging {
    _dir: TempDir,
    root: PathBuf,
}

impl Staging {
    /// Directory recipe patterns are matched against
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    TarGz,
    Tar,
}

fn detect_format(path: &Path) -> Option<Format> {
    let name = path.file_name()?.to_string_lossy().to_ascii_lowercase();
    if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        Some(Format::TarGz)
    } else if name.ends_with(".tar") {
        Some(Format::Tar)
    } else {
        None
    }
}

/// Unpack `archive_path` into a fresh temporary directory
pub fn extract_archive(archive_path: &Path) -> Result<Staging> {
    let format = detect_format(archive_path).ok_or_else(|| {
        PourError::InvalidRecipe(format!(
            "unsupported archive format: {}",
            archive_path.display()
        ))
    })?;

    let dir = tempfile::Builder::new()
        .prefix("pour-staging-")
        .tempdir()
        .map_err(|e| PourError::fs(std::env::temp_dir(), e))?;

    let file = fs::File::open(archive_path).map_err(|e| PourError::fs(archive_path, e))?;
    let reader: Box<dyn Read> = match format {
        Format::TarGz => Box::new(GzDecoder::new(file)),
        Format::Tar => Box::new(file),
    };

    let mut archive = Archive::new(reader);
    archive.set_preserve_permissions(true);
    archive
        .unpack(dir.path())
        .map_err(|e| PourError::fs(archive_path, e))?;

    let root = staging_root(dir.path())?;
    tracing::debug!(
        "Extracted {} to {}",
        archive_path.display(),
        root.display()
    );

    Ok(Staging { _dir: dir, root })
}

/// Descend into a lone top-level directory
fn staging_root(dir: &Path) -> Result<PathBuf> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| PourError::fs(dir, e))? {
        entries.push(entry.map_err(|e| PourError::fs(dir, e))?);
    }

    match entries.as_slice() {
        [only] => {
            let file_type = only.file_type().map_err(|e| PourError::fs(only.path(), e))?;
            if file_type.is_dir() {
                Ok(only.path())
            } else {
                Ok(dir.to_path_buf())
            }
        }
        _ => Ok(dir.to_path_buf()),
    }
}
