//! Cross-platform application paths

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Name given to the brain every tool uses by default.
pub const CURRENT_BRAIN: &str = "current.borg.json";

#[derive(Debug, Clone)]
pub struct AppPaths {
    data_dir: PathBuf,
}

impl AppPaths {
    /// Per-user data directory (`~/.local/share/borg` on Linux), created if needed.
    pub fn new() -> io::Result<Self> {
        let base = dirs::data_dir().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "could not determine data directory")
        })?;
        Self::at(base.join("borg"))
    }

    /// Use `data_dir` instead of the per-user default.
    pub fn at(data_dir: impl Into<PathBuf>) -> io::Result<Self> {
        let paths = Self {
            data_dir: data_dir.into(),
        };
        fs::create_dir_all(paths.brains_dir())?;
        Ok(paths)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn brains_dir(&self) -> PathBuf {
        self.data_dir.join("brains")
    }

    pub fn current_brain(&self) -> PathBuf {
        self.brains_dir().join(CURRENT_BRAIN)
    }

    pub fn gateway_config_file(&self) -> PathBuf {
        self.data_dir.join("borgd.json")
    }

    pub fn client_config_file(&self) -> PathBuf {
        self.data_dir.join("client.json")
    }

    /// Resolve a brain name given on the command line.
    ///
    /// `current` is the default brain; an existing path is used as-is; anything else names
    /// a file inside the brains directory.
    pub fn resolve_brain(&self, target: &str) -> PathBuf {
        if target == "current" {
            return self.current_brain();
        }
        let as_path = PathBuf::from(target);
        if as_path.exists() {
            as_path
        } else {
            self.brains_dir().join(target)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_under_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let paths = AppPaths::at(dir.path()).unwrap();
        assert!(paths.brains_dir().is_dir());
        assert_eq!(paths.resolve_brain("current"), dir.path().join("brains").join(CURRENT_BRAIN));
        assert_eq!(paths.resolve_brain("old.borg"), dir.path().join("brains").join("old.borg"));

        let explicit = dir.path().join("elsewhere.json");
        fs::write(&explicit, "{}").unwrap();
        assert_eq!(paths.resolve_brain(explicit.to_str().unwrap()), explicit);
    }
}
