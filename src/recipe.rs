//! Install recipes: the declarative description of one package.
//!
//! A recipe names a package, points at a prebuilt archive and its SHA-256
//! digest, and lists the file operations that lay the archive out in a keg:
//!
//! ```json
//! {
//!   "name": "embree",
//!   "homepage": "http://embree.github.io/",
//!   "url": "https://github.com/embree/embree/releases/download/v2.7.0/embree-2.7.0.x86_64.macosx.tar.gz",
//!   "sha256": "9f5c6b2e...",
//!   "steps": [
//!     { "op": "copy", "pattern": "lib/libembree.2.dylib", "into": "lib" },
//!     { "op": "copy", "pattern": "include/*", "into": "include" },
//!     { "op": "symlink", "target": "lib/libembree.2.dylib", "link": "lib/libembree.dylib" }
//!   ]
//! }
//! ```
//!
//! Recipes are validated once when they are built and cannot be modified
//! afterwards. Use [`RecipeDraft`] to assemble one field by field.

use crate::error::{PourError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Archive extensions stripped before looking for a version in a file name
const ARCHIVE_EXTENSIONS: &[&str] = &[
    ".tar.gz", ".tgz", ".tar.bz2", ".tbz", ".tar.xz", ".txz", ".tar", ".zip",
];

/// A conventional destination directory inside a keg
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    Prefix,
    Bin,
    Sbin,
    Lib,
    Libexec,
    Include,
    Share,
    Etc,
}

impl Location {
    pub const ALL: [Location; 8] = [
        Location::Prefix,
        Location::Bin,
        Location::Sbin,
        Location::Lib,
        Location::Libexec,
        Location::Include,
        Location::Share,
        Location::Etc,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Location::Prefix => "prefix",
            Location::Bin => "bin",
            Location::Sbin => "sbin",
            Location::Lib => "lib",
            Location::Libexec => "libexec",
            Location::Include => "include",
            Location::Share => "share",
            Location::Etc => "etc",
        }
    }

    /// Directory below the keg root, `None` for the keg root itself
    pub fn subdir(self) -> Option<&'static str> {
        match self {
            Location::Prefix => None,
            other => Some(other.name()),
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|loc| loc.name() == name)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A path relative to a [`Location`], written as `lib/libfoo.dylib`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LocatedPath {
    location: Location,
    relative: PathBuf,
}

impl LocatedPath {
    pub fn new(location: Location, relative: impl Into<PathBuf>) -> Result<Self> {
        let relative = relative.into();
        check_relative(&relative)?;
        Ok(Self { location, relative })
    }

    pub fn location(&self) -> Location {
        self.location
    }

    pub fn relative(&self) -> &Path {
        &self.relative
    }
}

impl fmt::Display for LocatedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.relative.as_os_str().is_empty() {
            write!(f, "{}", self.location)
        } else {
            write!(f, "{}/{}", self.location, self.relative.display())
        }
    }
}

impl TryFrom<String> for LocatedPath {
    type Error = PourError;

    fn try_from(value: String) -> Result<Self> {
        let (head, rest) = value.split_once('/').unwrap_or((value.as_str(), ""));
        let location = Location::from_name(head).ok_or_else(|| {
            PourError::InvalidRecipe(format!(
                "'{}' does not start with a known location (bin, lib, include, ...)",
                value
            ))
        })?;
        LocatedPath::new(location, rest.trim_start_matches('/'))
    }
}

impl From<LocatedPath> for String {
    fn from(value: LocatedPath) -> Self {
        value.to_string()
    }
}

/// Reject absolute paths and anything that climbs out with `..`
fn check_relative(path: &Path) -> Result<()> {
    for component in path.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => {
                return Err(PourError::InvalidRecipe(format!(
                    "path must stay inside its location: {}",
                    path.display()
                )));
            }
        }
    }
    Ok(())
}

/// A SHA-256 digest, stored as lowercase hex
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Checksum(String);

impl Checksum {
    pub const HEX_LEN: usize = 64;

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compare against a hex digest, ignoring case
    pub fn matches(&self, hex: &str) -> bool {
        self.0.eq_ignore_ascii_case(hex)
    }
}

impl TryFrom<String> for Checksum {
    type Error = PourError;

    fn try_from(value: String) -> Result<Self> {
        let value = value.trim();
        if value.len() != Self::HEX_LEN {
            return Err(PourError::InvalidRecipe(format!(
                "sha256 must be {} hex characters, got {}",
                Self::HEX_LEN,
                value.len()
            )));
        }
        if !value.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(PourError::InvalidRecipe(format!(
                "sha256 contains non-hex characters: {}",
                value
            )));
        }
        Ok(Checksum(value.to_ascii_lowercase()))
    }
}

impl TryFrom<&str> for Checksum {
    type Error = PourError;

    fn try_from(value: &str) -> Result<Self> {
        Checksum::try_from(value.to_string())
    }
}

impl From<Checksum> for String {
    fn from(value: Checksum) -> Self {
        value.0
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One file operation of a recipe's install procedure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum InstallStep {
    /// Copy everything matching `pattern` (relative to the staging root) into `into`
    Copy {
        pattern: String,
        into: Location,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        overwrite: bool,
    },
    /// Create a symlink at `link` pointing to `target`
    Symlink {
        target: LocatedPath,
        link: LocatedPath,
    },
}

impl InstallStep {
    pub fn copy(pattern: impl Into<String>, into: Location) -> Self {
        InstallStep::Copy {
            pattern: pattern.into(),
            into,
            overwrite: false,
        }
    }

    pub fn symlink(target: LocatedPath, link: LocatedPath) -> Self {
        InstallStep::Symlink { target, link }
    }

    /// Short human-readable form used in logs and error messages
    pub fn describe(&self) -> String {
        match self {
            InstallStep::Copy { pattern, into, .. } => format!("copy {} -> {}", pattern, into),
            InstallStep::Symlink { target, link } => format!("symlink {} -> {}", link, target),
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            InstallStep::Copy { pattern, .. } => {
                if pattern.trim().is_empty() {
                    return Err(PourError::InvalidRecipe("empty copy pattern".to_string()));
                }
                check_relative(Path::new(pattern))?;
                // A trailing `**` only matches directories, which drops the files beside them
                if pattern.trim_end_matches('/').rsplit('/').next() == Some("**") {
                    return Err(PourError::InvalidRecipe(format!(
                        "pattern {} ends in **; use {}/* or name the files",
                        pattern,
                        pattern.trim_end_matches('/').trim_end_matches("**").trim_end_matches('/')
                    )));
                }
                glob::Pattern::new(pattern)?;
                Ok(())
            }
            InstallStep::Symlink { link, .. } => {
                if link.relative().as_os_str().is_empty() {
                    return Err(PourError::InvalidRecipe(format!(
                        "symlink must name a path inside {}, not the directory itself",
                        link.location()
                    )));
                }
                Ok(())
            }
        }
    }
}

/// Unvalidated recipe fields, as authored
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecipeDraft {
    pub name: String,
    #[serde(default)]
    pub desc: Option<String>,
    #[serde(default)]
    pub homepage: Option<String>,
    pub url: String,
    pub sha256: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub steps: Vec<InstallStep>,
}

/// A validated, immutable install recipe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RecipeDraft")]
pub struct InstallRecipe {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    desc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    homepage: Option<String>,
    url: String,
    sha256: Checksum,
    version: String,
    steps: Vec<InstallStep>,
}

impl TryFrom<RecipeDraft> for InstallRecipe {
    type Error = PourError;

    fn try_from(draft: RecipeDraft) -> Result<Self> {
        draft.build()
    }
}

impl RecipeDraft {
    pub fn build(self) -> Result<InstallRecipe> {
        validate_name(&self.name)?;

        if let Some(homepage) = &self.homepage {
            url::Url::parse(homepage).map_err(|e| {
                PourError::InvalidRecipe(format!("homepage '{}' is not a URL: {}", homepage, e))
            })?;
        }

        let source = url::Url::parse(&self.url).map_err(|e| {
            PourError::InvalidRecipe(format!("url '{}' is not a URL: {}", self.url, e))
        })?;
        if !matches!(source.scheme(), "http" | "https" | "file") {
            return Err(PourError::InvalidRecipe(format!(
                "unsupported url scheme '{}'",
                source.scheme()
            )));
        }

        let sha256 = Checksum::try_from(self.sha256)?;

        let version = match self.version {
            Some(v) if !v.trim().is_empty() => v.trim().to_string(),
            _ => version_from_url(&self.url).ok_or_else(|| {
                PourError::InvalidRecipe(format!(
                    "cannot infer a version from '{}', declare one explicitly",
                    self.url
                ))
            })?,
        };

        if self.steps.is_empty() {
            return Err(PourError::InvalidRecipe(format!(
                "recipe '{}' has no install steps",
                self.name
            )));
        }
        for step in &self.steps {
            step.validate()?;
        }

        Ok(InstallRecipe {
            name: self.name,
            desc: self.desc,
            homepage: self.homepage,
            url: self.url,
            sha256,
            version,
            steps: self.steps,
        })
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(PourError::InvalidRecipe("recipe name is empty".to_string()));
    }
    let allowed = |c: char| c.is_ascii_alphanumeric() || "@._+-".contains(c);
    if !name.chars().all(allowed) || name.starts_with('.') {
        return Err(PourError::InvalidRecipe(format!(
            "invalid recipe name: {}",
            name
        )));
    }
    Ok(())
}

impl InstallRecipe {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn desc(&self) -> Option<&str> {
        self.desc.as_deref()
    }

    pub fn homepage(&self) -> Option<&str> {
        self.homepage.as_deref()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn sha256(&self) -> &Checksum {
        &self.sha256
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn steps(&self) -> &[InstallStep] {
        &self.steps
    }

    /// Last path segment of the source url
    pub fn archive_file_name(&self) -> String {
        url::Url::parse(&self.url)
            .ok()
            .and_then(|u| {
                u.path_segments()
                    .and_then(|mut segments| segments.next_back().map(str::to_string))
            })
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| format!("{}-{}.tar.gz", self.name, self.version))
    }

    /// File name used for the archive in the download cache
    pub fn cache_file_name(&self) -> String {
        format!(
            "{}--{}--{}",
            self.name,
            self.version,
            self.archive_file_name()
        )
    }
}

/// Guess a version from a download url.
///
/// Looks at the archive's file name first (`embree-2.7.0.x86_64.macosx.tar.gz`
/// gives `2.7.0`), then at `/v1.2.3/` style path segments.
pub fn version_from_url(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let file_name = segments.pop()?;

    let stem = ARCHIVE_EXTENSIONS
        .iter()
        .find_map(|ext| file_name.strip_suffix(ext))
        .unwrap_or(file_name);

    for sep in ['-', '_'] {
        if let Some(version) = stem.split(sep).skip(1).find_map(leading_version) {
            return Some(version);
        }
    }

    segments.iter().rev().copied().find_map(|segment| {
        let candidate = segment.strip_prefix('v').unwrap_or(segment);
        leading_version(candidate).filter(|v| v.len() == candidate.len())
    })
}

/// Take the dot-separated run at the start of `segment` that looks like a version
fn leading_version(segment: &str) -> Option<String> {
    let segment = segment
        .strip_prefix('v')
        .filter(|rest| rest.starts_with(|c: char| c.is_ascii_digit()))
        .unwrap_or(segment);

    let parts: Vec<&str> = segment
        .split('.')
        .take_while(|part| part.starts_with(|c: char| c.is_ascii_digit()))
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("."))
    }
}
