//! Resolved paths for a `pour` run.
//!
//! Defaults can be overridden by environment variables, which can in turn be
//! overridden by command-line flags:
//!
//! | Setting | Flag       | Environment                          | Default                          |
//! |---------|------------|--------------------------------------|----------------------------------|
//! | prefix  | `--prefix` | `POUR_PREFIX`, then `HOMEBREW_PREFIX` | `/opt/homebrew` or `/usr/local` |
//! | cache   |            | `POUR_CACHE`                         | `$HOME/.cache/pour/downloads`    |

use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub prefix: PathBuf,
    pub cache: PathBuf,
}

impl Config {
    /// Resolve from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve using `lookup` in place of the process environment
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let prefix = non_empty("POUR_PREFIX")
            .or_else(|| non_empty("HOMEBREW_PREFIX"))
            .map(PathBuf::from)
            .unwrap_or_else(default_prefix);

        let cache = non_empty("POUR_CACHE")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                let home = non_empty("HOME").unwrap_or_else(|| ".".to_string());
                PathBuf::from(home).join(".cache/pour/downloads")
            });

        Self { prefix, cache }
    }

    pub fn with_prefix(mut self, prefix: Option<PathBuf>) -> Self {
        if let Some(prefix) = prefix {
            self.prefix = prefix;
        }
        self
    }

    pub fn cellar(&self) -> PathBuf {
        self.prefix.join("Cellar")
    }

    /// Install root for one version of a package
    pub fn keg_path(&self, name: &str, version: &str) -> PathBuf {
        self.cellar().join(name).join(version)
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache
    }
}

/// Architecture-dependent prefix used when nothing is configured
fn default_prefix() -> PathBuf {
    #[cfg(target_arch = "aarch64")]
    {
        PathBuf::from("/opt/homebrew")
    }
    #[cfg(not(target_arch = "aarch64"))]
    {
        PathBuf::from("/usr/local")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[("HOME", "/home/me")]));
        assert!(
            config.prefix == Path::new("/opt/homebrew") || config.prefix == Path::new("/usr/local")
        );
        assert_eq!(config.cache, PathBuf::from("/home/me/.cache/pour/downloads"));
    }

    #[test]
    fn test_pour_prefix_beats_homebrew_prefix() {
        let config = Config::from_lookup(lookup(&[
            ("POUR_PREFIX", "/tmp/pour"),
            ("HOMEBREW_PREFIX", "/opt/homebrew"),
        ]));
        assert_eq!(config.prefix, PathBuf::from("/tmp/pour"));

        let config = Config::from_lookup(lookup(&[("HOMEBREW_PREFIX", "/opt/brew")]));
        assert_eq!(config.prefix, PathBuf::from("/opt/brew"));
    }

    #[test]
    fn test_empty_values_ignored() {
        let config = Config::from_lookup(lookup(&[("POUR_PREFIX", ""), ("POUR_CACHE", "")]));
        assert_ne!(config.prefix, PathBuf::from(""));
        assert_ne!(config.cache, PathBuf::from(""));
    }

    #[test]
    fn test_flag_overrides_env() {
        let config = Config::from_lookup(lookup(&[("POUR_PREFIX", "/tmp/pour")]))
            .with_prefix(Some(PathBuf::from("/srv/pour")));
        assert_eq!(config.prefix, PathBuf::from("/srv/pour"));
        assert_eq!(
            config.keg_path("embree", "2.7.0"),
            PathBuf::from("/srv/pour/Cellar/embree/2.7.0")
        );
    }
}
