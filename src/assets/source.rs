//! Bundled acoustic model sources

use std::io::Read;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Supplier of bundled acoustic model files
///
/// Implementations list file names and open them for copying into the
/// model directory.
pub trait AssetSource: Send + Sync {
    /// Human readable description for logs
    fn describe(&self) -> String;

    /// File names of the acoustic model
    ///
    /// # Errors
    ///
    /// Returns an asset error if the listing fails
    fn list(&self) -> Result<Vec<String>>;

    /// Open one file from [`AssetSource::list`]
    ///
    /// # Errors
    ///
    /// Returns an asset error if the file cannot be opened
    fn open(&self, name: &str) -> Result<Box<dyn Read + Send>>;

    /// Copy every file that is missing from `target`
    ///
    /// Existing files are left untouched. Returns the number of copied files.
    ///
    /// # Errors
    ///
    /// Returns an asset error if the target cannot be written or a source
    /// file cannot be read
    fn materialize(&self, target: &Path) -> Result<usize> {
        std::fs::create_dir_all(target).map_err(|e| Error::asset(target, &e))?;

        let mut copied = 0;
        for name in self.list()? {
            let to = target.join(&name);
            if to.exists() {
                tracing::trace!(file = %to.display(), "asset present, skipping");
                continue;
            }

            let mut reader = self.open(&name)?;
            // Partial copies never appear under the final name
            let mut partial =
                tempfile::NamedTempFile::new_in(target).map_err(|e| Error::asset(target, &e))?;
            std::io::copy(&mut reader, &mut partial).map_err(|e| Error::asset(&to, &e))?;
            partial
                .as_file()
                .sync_all()
                .map_err(|e| Error::asset(&to, &e))?;
            partial.persist(&to).map_err(|e| Error::asset(&to, &e.error))?;
            copied += 1;
        }

        tracing::debug!(source = %self.describe(), target = %target.display(), copied, "acoustic model materialized");
        Ok(copied)
    }
}

/// Acoustic model shipped as a plain directory of files
#[derive(Debug, Clone)]
pub struct DirAssetSource {
    root: PathBuf,
}

impl DirAssetSource {
    /// Use the files directly under `root`
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory the files are read from
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl AssetSource for DirAssetSource {
    fn describe(&self) -> String {
        self.root.display().to_string()
    }

    fn list(&self) -> Result<Vec<String>> {
        let entries = std::fs::read_dir(&self.root).map_err(|e| Error::asset(&self.root, &e))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::asset(&self.root, &e))?;
            if entry.path().is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    fn open(&self, name: &str) -> Result<Box<dyn Read + Send>> {
        let path = self.root.join(name);
        let file = std::fs::File::open(&path).map_err(|e| Error::asset(&path, &e))?;
        Ok(Box::new(file))
    }
}
