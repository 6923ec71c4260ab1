use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use tempfile::TempDir;

/// Private scratch directory for one submission
///
/// The name is unique per acquisition, so concurrent submissions never see
/// each other's files. The directory and everything staged inside it are
/// removed when the workspace is dropped, on every pipeline exit path.
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Creates a fresh workspace under `root`, falling back to the system
    /// temp directory when no root is configured
    pub fn acquire(root: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("gavel-");
        let dir = match root {
            Some(root) => {
                fs::create_dir_all(root).map_err(|e| {
                    anyhow!("Failed to create workspace root {}: {}", root.display(), e)
                })?;
                builder.tempdir_in(root)
            }
            None => builder.tempdir(),
        }
        .map_err(|e| anyhow!("Failed to create workspace directory: {}", e))?;
        log::debug!("Workspace created at {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Writes `contents` under the given file name and returns the full path
    pub fn stage(&self, name: &str, contents: &[u8]) -> Result<PathBuf> {
        let path = self.dir.path().join(name);
        fs::write(&path, contents)
            .map_err(|e| anyhow!("Failed to stage {} in workspace: {}", name, e))?;
        Ok(path)
    }
}
