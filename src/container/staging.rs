//! Private staging area holding encoded blocks until `write`.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::RabError;

const STAGING_PREFIX: &str = "_RAB_";

/// A private temporary directory, removed when dropped or closed
#[derive(Debug)]
pub struct StagingArea {
    dir: TempDir,
    next_block: usize,
}

impl StagingArea {
    /// Create a staging directory under `root`, or the system temp dir
    pub fn create(root: Option<&Path>) -> Result<Self, RabError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(STAGING_PREFIX);
        let dir = match root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };
        log::debug!("Created staging area {}", dir.path().display());
        Ok(Self { dir, next_block: 0 })
    }

    /// Location of the staging directory
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write one block to its own file and return its path
    pub fn stage(&mut self, bytes: &[u8]) -> Result<PathBuf, RabError> {
        let path = self.dir.path().join(format!("block-{:06}", self.next_block));
        let mut file = File::create(&path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        self.next_block += 1;
        Ok(path)
    }

    /// Remove the staging directory, reporting failures
    pub fn close(self) -> Result<(), RabError> {
        let path = self.dir.path().to_path_buf();
        self.dir.close()?;
        log::debug!("Removed staging area {}", path.display());
        Ok(())
    }
}
