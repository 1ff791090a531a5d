//! Executes a recipe's install steps against a staged archive.
//!
//! The evaluator is the only part of `pour` that writes into a keg. Steps run
//! strictly in declaration order and the first failure stops the run:
//!
//! ```text
//! staging/                          keg (<prefix>/Cellar/foo/2.0)
//!   lib/libfoo.2.dylib   --copy-->   lib/libfoo.2.dylib
//!   include/foo.h        --copy-->   include/foo.h
//!                        symlink     lib/libfoo.dylib -> libfoo.2.dylib
//! ```
//!
//! Nothing is rolled back. Files written by steps that completed before a
//! failure stay on disk, and the error says which step failed.
//!
//! Copies never replace existing files unless the step (or the caller) asks
//! for it, and symlinks never replace anything.

use crate::error::{PourError, Result};
use crate::recipe::{InstallRecipe, InstallStep, LocatedPath, Location};
use crate::symlink;
use glob::MatchOptions;
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::os::unix::fs as unix_fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Resolves recipe locations to directories inside one keg
#[derive(Debug, Clone)]
pub struct Destinations {
    root: PathBuf,
}

impl Destinations {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dir(&self, location: Location) -> PathBuf {
        match location.subdir() {
            Some(sub) => self.root.join(sub),
            None => self.root.clone(),
        }
    }

    pub fn resolve(&self, path: &LocatedPath) -> PathBuf {
        let dir = self.dir(path.location());
        if path.relative().as_os_str().is_empty() {
            dir
        } else {
            dir.join(path.relative())
        }
    }

    /// Create every destination directory the recipe copies into
    pub fn prepare(&self, recipe: &InstallRecipe) -> Result<()> {
        for step in recipe.steps() {
            if let InstallStep::Copy { into, .. } = step {
                let dir = self.dir(*into);
                fs::create_dir_all(&dir).map_err(|e| PourError::fs(&dir, e))?;
            }
        }
        Ok(())
    }
}

/// What a single completed step did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Copied {
        description: String,
        files: Vec<PathBuf>,
    },
    Linked {
        description: String,
        link: PathBuf,
        target: PathBuf,
    },
}

impl StepOutcome {
    pub fn description(&self) -> &str {
        match self {
            StepOutcome::Copied { description, .. } | StepOutcome::Linked { description, .. } => {
                description
            }
        }
    }

    pub fn is_empty_copy(&self) -> bool {
        matches!(self, StepOutcome::Copied { files, .. } if files.is_empty())
    }
}

/// Per-step results of a successful run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub steps: Vec<StepOutcome>,
}

impl InstallReport {
    /// Every path created, in creation order
    pub fn files(&self) -> Vec<&Path> {
        self.steps
            .iter()
            .flat_map(|step| match step {
                StepOutcome::Copied { files, .. } => files.iter().map(PathBuf::as_path).collect(),
                StepOutcome::Linked { link, .. } => vec![link.as_path()],
            })
            .collect()
    }

    /// Copy steps whose pattern matched nothing
    pub fn empty_copies(&self) -> Vec<&StepOutcome> {
        self.steps.iter().filter(|s| s.is_empty_copy()).collect()
    }

    pub fn has_empty_copies(&self) -> bool {
        self.steps.iter().any(StepOutcome::is_empty_copy)
    }
}

/// Run every step of `recipe` in order.
///
/// `force_overwrite` lets copy steps replace existing files even when the
/// step itself does not ask for it. Symlink steps are unaffected.
pub fn execute(
    recipe: &InstallRecipe,
    staging_root: &Path,
    destinations: &Destinations,
    force_overwrite: bool,
) -> Result<InstallReport> {
    let mut report = InstallReport::default();

    for (index, step) in recipe.steps().iter().enumerate() {
        let description = step.describe();
        info!("[{}/{}] {}", index + 1, recipe.steps().len(), description);

        let outcome = run_step(step, staging_root, destinations, force_overwrite).map_err(|e| {
            PourError::Step {
                index: index + 1,
                description: description.clone(),
                source: Box::new(e),
            }
        })?;

        let outcome = match outcome {
            Executed::Copied(files) => {
                if files.is_empty() {
                    warn!("{}: pattern matched no files", description);
                }
                StepOutcome::Copied { description, files }
            }
            Executed::Linked { link, target } => StepOutcome::Linked {
                description,
                link,
                target,
            },
        };
        report.steps.push(outcome);
    }

    Ok(report)
}

enum Executed {
    Copied(Vec<PathBuf>),
    Linked { link: PathBuf, target: PathBuf },
}

fn run_step(
    step: &InstallStep,
    staging_root: &Path,
    destinations: &Destinations,
    force_overwrite: bool,
) -> Result<Executed> {
    match step {
        InstallStep::Copy {
            pattern,
            into,
            overwrite,
        } => {
            let dest = destinations.dir(*into);
            let files = copy_matching(staging_root, pattern, &dest, *overwrite || force_overwrite)?;
            Ok(Executed::Copied(files))
        }
        InstallStep::Symlink { target, link } => {
            let target = destinations.resolve(target);
            let link = destinations.resolve(link);
            symlink::create_symlink(&target, &link)?;
            Ok(Executed::Linked { link, target })
        }
    }
}

/// Copy everything under `staging_root` matching `pattern` into `destination_dir`.
///
/// Matched files keep their file name; matched directories are copied with
/// their contents. Dotfiles only match when the pattern names them
/// explicitly. All destinations are checked for conflicts before the first
/// byte is written. Returns the files created, which is empty when nothing
/// matched.
pub fn copy_matching(
    staging_root: &Path,
    pattern: &str,
    destination_dir: &Path,
    overwrite: bool,
) -> Result<Vec<PathBuf>> {
    if !destination_dir.is_dir() {
        return Err(PourError::fs(
            destination_dir,
            io::Error::new(
                io::ErrorKind::NotFound,
                "destination directory does not exist",
            ),
        ));
    }

    let plan = plan_copies(staging_root, pattern, destination_dir)?;

    for (_, dest) in &plan {
        if let Some(path) = occupied(dest, destination_dir, overwrite) {
            return Err(PourError::Conflict { path });
        }
    }

    let mut created = Vec::with_capacity(plan.len());
    for (src, dest) in plan {
        copy_entry(&src, &dest, overwrite)?;
        debug!("Copied {} -> {}", src.display(), dest.display());
        created.push(dest);
    }

    Ok(created)
}

/// Expand the glob and pair every file to copy with its destination
fn plan_copies(
    staging_root: &Path,
    pattern: &str,
    destination_dir: &Path,
) -> Result<Vec<(PathBuf, PathBuf)>> {
    let root = staging_root.to_str().ok_or_else(|| {
        PourError::InvalidRecipe(format!(
            "staging path is not valid UTF-8: {}",
            staging_root.display()
        ))
    })?;
    let full_pattern = format!(
        "{}/{}",
        glob::Pattern::escape(root.trim_end_matches('/')),
        pattern.trim_start_matches("./")
    );
    let options = MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: true,
    };

    let mut plan = Vec::new();
    let mut planned = HashSet::new();
    let mut push = |src: PathBuf, dest: PathBuf| {
        if !planned.insert(dest.clone()) {
            return Err(PourError::Conflict { path: dest });
        }
        plan.push((src, dest));
        Ok(())
    };
    for entry in glob::glob_with(&full_pattern, options)? {
        let src = entry.map_err(|e| {
            let path = e.path().to_path_buf();
            PourError::fs(path, e.into_error())
        })?;
        let Some(name) = src.file_name() else {
            continue;
        };
        let dest = destination_dir.join(name);

        let meta = src.symlink_metadata().map_err(|e| PourError::fs(&src, e))?;
        if meta.is_dir() {
            for item in WalkDir::new(&src).min_depth(1).sort_by_file_name() {
                let item = item.map_err(|e| {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| src.clone());
                    PourError::fs(path, e.into())
                })?;
                if item.file_type().is_dir() {
                    continue;
                }
                let rel = item
                    .path()
                    .strip_prefix(&src)
                    .map_err(|e| PourError::Other(e.into()))?;
                push(item.path().to_path_buf(), dest.join(rel))?;
            }
        } else {
            push(src, dest)?;
        }
    }

    // A matched file cannot also be the parent of another match
    for (_, dest) in &plan {
        let parent = dest
            .ancestors()
            .skip(1)
            .take_while(|dir| *dir != destination_dir)
            .find(|dir| planned.contains(*dir));
        if let Some(dir) = parent {
            return Err(PourError::Conflict {
                path: dir.to_path_buf(),
            });
        }
    }

    Ok(plan)
}

/// The path that blocks writing `dest`, if any.
///
/// Any ancestor between `destination_dir` and `dest` that exists but is not a
/// directory blocks it, as does a real directory at `dest` itself. An
/// existing file or link at `dest` only blocks when not overwriting.
fn occupied(dest: &Path, destination_dir: &Path, overwrite: bool) -> Option<PathBuf> {
    let blocked_parent = dest
        .ancestors()
        .skip(1)
        .take_while(|dir| *dir != destination_dir)
        .find(|dir| dir.symlink_metadata().is_ok() && !dir.is_dir());
    if let Some(dir) = blocked_parent {
        return Some(dir.to_path_buf());
    }

    let meta = dest.symlink_metadata().ok()?;
    if !overwrite || meta.is_dir() {
        Some(dest.to_path_buf())
    } else {
        None
    }
}

/// Copy one file, recreating symlinks rather than following them.
///
/// The destination is always created fresh; when overwriting, the old entry
/// is removed first.
fn copy_entry(src: &Path, dest: &Path, overwrite: bool) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| PourError::fs(parent, e))?;
    }

    if overwrite && dest.symlink_metadata().is_ok() {
        fs::remove_file(dest).map_err(|e| PourError::fs(dest, e))?;
    }

    let meta = src.symlink_metadata().map_err(|e| PourError::fs(src, e))?;
    if meta.file_type().is_symlink() {
        let contents = fs::read_link(src).map_err(|e| PourError::fs(src, e))?;
        return unix_fs::symlink(&contents, dest).map_err(|e| already_there(dest, e));
    }

    let mut reader = File::open(src).map_err(|e| PourError::fs(src, e))?;
    let mut writer = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(dest)
        .map_err(|e| already_there(dest, e))?;
    io::copy(&mut reader, &mut writer).map_err(|e| PourError::fs(dest, e))?;
    writer
        .set_permissions(meta.permissions())
        .map_err(|e| PourError::fs(dest, e))?;

    Ok(())
}

/// Something appeared at `dest` after planning
fn already_there(dest: &Path, e: io::Error) -> PourError {
    if e.kind() == io::ErrorKind::AlreadyExists {
        PourError::Conflict {
            path: dest.to_path_buf(),
        }
    } else {
        PourError::fs(dest, e)
    }
}
