//! Reading kegs that are already in the Cellar

use crate::error::{PourError, Result};
use crate::receipt::InstallReceipt;
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

/// One `<cellar>/<name>/<version>` directory
#[derive(Debug, Clone)]
pub struct Keg {
    pub name: String,
    pub version: String,
    pub path: PathBuf,
    /// `None` when the install never finished
    pub receipt: Option<InstallReceipt>,
}

impl Keg {
    fn from_path(name: String, version: String, path: PathBuf) -> Self {
        let receipt = InstallReceipt::read(&path).ok();
        Self {
            name,
            version,
            path,
            receipt,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.receipt.is_some()
    }
}

fn visible_entries(dir: &Path) -> Result<Vec<fs::DirEntry>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| PourError::fs(dir, e))? {
        let entry = entry.map_err(|e| PourError::fs(dir, e))?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        if entry.path().is_dir() {
            entries.push(entry);
        }
    }
    Ok(entries)
}

/// All kegs in the Cellar, sorted by name then newest version first
pub fn list_kegs(cellar: &Path) -> Result<Vec<Keg>> {
    if !cellar.exists() {
        return Ok(vec![]);
    }

    let mut kegs = Vec::new();
    for formula in visible_entries(cellar)? {
        let name = formula.file_name().to_string_lossy().to_string();
        for version in visible_entries(&formula.path())? {
            kegs.push(Keg::from_path(
                name.clone(),
                version.file_name().to_string_lossy().to_string(),
                version.path(),
            ));
        }
    }

    kegs.sort_by(|a, b| {
        a.name
            .cmp(&b.name)
            .then_with(|| compare_versions(&b.version, &a.version))
    });
    Ok(kegs)
}

/// Order version strings the way `info` lists kegs.
///
/// Dot-separated components compare by their leading number, missing
/// components count as zero, and a `-suffix` (`1.0-rc1`) sorts before the
/// plain release. Anything still tied falls back to string order.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let (a_release, a_pre) = split_prerelease(a);
    let (b_release, b_pre) = split_prerelease(b);

    let a_nums: Vec<u64> = a_release.split('.').map(leading_number).collect();
    let b_nums: Vec<u64> = b_release.split('.').map(leading_number).collect();
    let width = a_nums.len().max(b_nums.len());

    (0..width)
        .map(|i| {
            let x = a_nums.get(i).copied().unwrap_or(0);
            let y = b_nums.get(i).copied().unwrap_or(0);
            x.cmp(&y)
        })
        .find(|ord| ord.is_ne())
        .unwrap_or(Ordering::Equal)
        .then_with(|| match (a_pre, b_pre) {
            (Some(x), Some(y)) => x.cmp(y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.cmp(b))
}

fn split_prerelease(version: &str) -> (&str, Option<&str>) {
    match version.split_once('-') {
        Some((release, pre)) => (release, Some(pre)),
        None => (version, None),
    }
}

fn leading_number(component: &str) -> u64 {
    let end = component
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(component.len());
    component[..end].parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_compare_versions() {
        assert_eq!(compare_versions("2.10.0", "2.9.1"), Ordering::Greater);
        assert_eq!(compare_versions("1.0", "1.0.0"), Ordering::Less);
        assert_eq!(compare_versions("2.7.0", "2.7.0"), Ordering::Equal);
    }

    #[test]
    fn test_prerelease_sorts_before_release() {
        assert_eq!(compare_versions("1.0-rc1", "1.0"), Ordering::Less);
        assert_eq!(compare_versions("1.0", "1.0-rc1"), Ordering::Greater);
        assert_eq!(compare_versions("1.0-rc2", "1.0-rc1"), Ordering::Greater);
        assert_eq!(compare_versions("1.1-rc1", "1.0"), Ordering::Greater);
        assert_eq!(compare_versions("2.7.0_1", "2.7.0"), Ordering::Greater);
    }

    #[test]
    fn test_list_kegs() {
        let dir = TempDir::new().unwrap();
        let cellar = dir.path().join("Cellar");
        fs::create_dir_all(cellar.join("foo/1.0")).unwrap();
        fs::create_dir_all(cellar.join("foo/1.10")).unwrap();
        fs::create_dir_all(cellar.join("bar/0.1")).unwrap();
        fs::create_dir_all(cellar.join(".hidden/1.0")).unwrap();

        let kegs = list_kegs(&cellar).unwrap();
        let names: Vec<_> = kegs
            .iter()
            .map(|k| format!("{}@{}", k.name, k.version))
            .collect();
        assert_eq!(names, vec!["bar@0.1", "foo@1.10", "foo@1.0"]);
        assert!(kegs.iter().all(|k| !k.is_complete()));
    }

    #[test]
    fn test_missing_cellar_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(list_kegs(&dir.path().join("Cellar")).unwrap().is_empty());
    }
}
