//! Install receipts.
//!
//! Every successful install leaves an `INSTALL_RECEIPT.json` in the keg
//! recording where the package came from and which paths the recipe created:
//! ```text
//! <prefix>/Cellar/embree/2.7.0/
//!   INSTALL_RECEIPT.json
//!   include/
//!   lib/
//! ```
//! The receipt is written last, so a keg without one is a failed or
//! interrupted install.

use crate::error::{PourError, Result};
use crate::evaluator::InstallReport;
use crate::recipe::InstallRecipe;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const RECEIPT_FILE: &str = "INSTALL_RECEIPT.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub url: String,
    pub sha256: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallReceipt {
    pub name: String,
    pub version: String,
    pub installed_by: String,
    pub time: i64,
    pub source: SourceInfo,
    /// Paths created by the recipe, relative to the keg
    #[serde(default)]
    pub files: Vec<PathBuf>,
}

impl InstallReceipt {
    pub fn new(recipe: &InstallRecipe, keg: &Path, report: &InstallReport) -> Self {
        let mut files: Vec<PathBuf> = report
            .files()
            .into_iter()
            .map(|path| path.strip_prefix(keg).unwrap_or(path).to_path_buf())
            .collect();
        files.sort();
        files.dedup();

        Self {
            name: recipe.name().to_string(),
            version: recipe.version().to_string(),
            installed_by: format!("pour/{}", env!("CARGO_PKG_VERSION")),
            time: chrono::Utc::now().timestamp(),
            source: SourceInfo {
                url: recipe.url().to_string(),
                sha256: recipe.sha256().to_string(),
            },
            files,
        }
    }

    pub fn path(keg: &Path) -> PathBuf {
        keg.join(RECEIPT_FILE)
    }

    pub fn read(keg: &Path) -> Result<Self> {
        let path = Self::path(keg);
        let contents = fs::read_to_string(&path).map_err(|e| PourError::fs(&path, e))?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn write(&self, keg: &Path) -> Result<()> {
        let path = Self::path(keg);
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json).map_err(|e| PourError::fs(&path, e))
    }

    /// Install time formatted for display
    pub fn installed_at(&self) -> String {
        chrono::DateTime::from_timestamp(self.time, 0)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| self.time.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::StepOutcome;
    use crate::recipe::{InstallStep, Location, RecipeDraft};
    use tempfile::TempDir;

    fn recipe() -> InstallRecipe {
        RecipeDraft {
            name: "foo".to_string(),
            url: "https://example.com/foo-2.0.tar.gz".to_string(),
            sha256: "a".repeat(64),
            steps: vec![InstallStep::copy("lib/*", Location::Lib)],
            ..Default::default()
        }
        .build()
        .unwrap()
    }

    #[test]
    fn test_receipt_round_trip() {
        let keg = TempDir::new().unwrap();
        let report = InstallReport {
            steps: vec![
                StepOutcome::Copied {
                    description: "copy lib/* -> lib".to_string(),
                    files: vec![keg.path().join("lib/libfoo.2.dylib")],
                },
                StepOutcome::Linked {
                    description: "symlink".to_string(),
                    link: keg.path().join("lib/libfoo.dylib"),
                    target: keg.path().join("lib/libfoo.2.dylib"),
                },
            ],
        };

        let receipt = InstallReceipt::new(&recipe(), keg.path(), &report);
        assert_eq!(
            receipt.files,
            vec![
                PathBuf::from("lib/libfoo.2.dylib"),
                PathBuf::from("lib/libfoo.dylib")
            ]
        );
        assert!(receipt.installed_by.starts_with("pour/"));

        receipt.write(keg.path()).unwrap();
        let read = InstallReceipt::read(keg.path()).unwrap();
        assert_eq!(read, receipt);
        assert_eq!(read.source.sha256, "a".repeat(64));
    }

    #[test]
    fn test_installed_at_format() {
        let receipt = InstallReceipt {
            name: "foo".to_string(),
            version: "1.0".to_string(),
            installed_by: "pour/0.1.0".to_string(),
            time: 0,
            source: SourceInfo {
                url: "https://example.com/foo-1.0.tar.gz".to_string(),
                sha256: "0".repeat(64),
            },
            files: vec![],
        };
        assert_eq!(receipt.installed_at(), "1970-01-01 00:00:00 UTC");
    }
}
