//! Install location defaults
//!
//! The install prefix defaults to `$HOME/dealii-candi`. Paths given on the
//! command line may start with `~`, which is expanded here because candi is
//! often driven from scripts that quote their arguments.

use std::path::{Path, PathBuf};

use crate::config::defaults::DEFAULT_PREFIX_DIR;

/// Home-relative directories used by candi
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandiDirs {
    home_dir: PathBuf,
}

impl CandiDirs {
    /// Resolve from the current user's home directory
    ///
    /// Falls back to the working directory when no home directory is known.
    #[must_use]
    pub fn new() -> Self {
        Self::with_home(dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// Use `home_dir` as the home directory
    #[must_use]
    pub fn with_home(home_dir: impl Into<PathBuf>) -> Self {
        Self {
            home_dir: home_dir.into(),
        }
    }

    #[must_use]
    pub fn home_dir(&self) -> &Path {
        &self.home_dir
    }

    /// `$HOME/dealii-candi`
    #[must_use]
    pub fn default_prefix(&self) -> PathBuf {
        self.home_dir.join(DEFAULT_PREFIX_DIR)
    }

    /// Expand a leading `~` or `~/` against the home directory
    #[must_use]
    pub fn expand(&self, path: &Path) -> PathBuf {
        match path.strip_prefix("~") {
            Ok(rest) => self.home_dir.join(rest),
            Err(_) => path.to_path_buf(),
        }
    }
}

impl Default for CandiDirs {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prefix_under_home() {
        let dirs = CandiDirs::with_home("/home/ada");
        assert_eq!(dirs.default_prefix(), PathBuf::from("/home/ada/dealii-candi"));
    }

    #[test]
    fn test_expand_tilde() {
        let dirs = CandiDirs::with_home("/home/ada");
        assert_eq!(dirs.expand(Path::new("~/opt")), PathBuf::from("/home/ada/opt"));
        assert_eq!(dirs.expand(Path::new("~")), PathBuf::from("/home/ada"));
        assert_eq!(dirs.expand(Path::new("/opt/candi")), PathBuf::from("/opt/candi"));
        assert_eq!(dirs.expand(Path::new("~ada/x")), PathBuf::from("~ada/x"));
    }

    #[test]
    fn test_new_is_not_empty() {
        assert!(!CandiDirs::new().default_prefix().as_os_str().is_empty());
    }
}
