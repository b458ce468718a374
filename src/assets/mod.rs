//! Model asset layout
//!
//! Resolves where the wake word engine finds its acoustic model, dictionary
//! and log output, and materializes bundled acoustic model files on first use.
//!
//! ```text
//! <data_root>/<package>/<language>/<version>/
//!     hmm/<sample_rate_hz>/   acoustic model
//!     lm/lm.dic               pronunciation dictionary
//!     lm/lm.jsgf              legacy grammar
//!     pocketsphinx.log        engine log
//!     raw/                    raw audio capture
//! ```

mod source;

use std::path::{Path, PathBuf};

pub use source::{AssetSource, DirAssetSource};

use crate::{Error, Result};

/// Layout schema version, bumped on breaking layout changes
pub const MODEL_SCHEMA_VERSION: u32 = 1;

/// Absolute paths for one (package, language, sample rate) model set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPaths {
    base_dir: PathBuf,
    acoustic_model: PathBuf,
    dictionary: PathBuf,
    grammar: PathBuf,
    log_file: PathBuf,
    raw_log_dir: PathBuf,
    sample_rate_hz: u32,
}

impl ModelPaths {
    /// Resolve the layout under `data_root`
    #[must_use]
    pub fn new(data_root: &Path, package_id: &str, language: &str, sample_rate_hz: u32) -> Self {
        let base_dir = data_root
            .join(package_id)
            .join(language)
            .join(MODEL_SCHEMA_VERSION.to_string());

        Self {
            acoustic_model: base_dir.join("hmm").join(sample_rate_hz.to_string()),
            dictionary: base_dir.join("lm").join("lm.dic"),
            grammar: base_dir.join("lm").join("lm.jsgf"),
            log_file: base_dir.join("pocketsphinx.log"),
            raw_log_dir: base_dir.join("raw"),
            base_dir,
            sample_rate_hz,
        }
    }

    /// Versioned base directory
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Acoustic model directory
    #[must_use]
    pub fn acoustic_model(&self) -> &Path {
        &self.acoustic_model
    }

    /// Pronunciation dictionary file
    #[must_use]
    pub fn dictionary(&self) -> &Path {
        &self.dictionary
    }

    /// Legacy JSGF grammar file
    #[must_use]
    pub fn grammar(&self) -> &Path {
        &self.grammar
    }

    /// Engine log file
    #[must_use]
    pub fn log_file(&self) -> &Path {
        &self.log_file
    }

    /// Raw audio capture directory
    #[must_use]
    pub fn raw_log_dir(&self) -> &Path {
        &self.raw_log_dir
    }

    /// Sample rate the acoustic model is built for
    #[must_use]
    pub const fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    /// Delete the dictionary file
    ///
    /// Returns `false` if there was nothing to delete.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be removed
    pub fn delete_dictionary(&self) -> Result<bool> {
        remove_file(&self.dictionary)
    }

    /// Delete the engine log file
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be removed
    pub fn delete_log_file(&self) -> Result<bool> {
        remove_file(&self.log_file)
    }

    /// Delete the legacy grammar file
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be removed
    pub fn delete_grammar(&self) -> Result<bool> {
        remove_file(&self.grammar)
    }

    /// Create the raw audio directory if missing
    ///
    /// Returns `true` if the directory was created.
    ///
    /// # Errors
    ///
    /// Returns an asset error if the directory cannot be created
    pub fn create_raw_log_dir(&self) -> Result<bool> {
        if self.raw_log_dir.is_dir() {
            return Ok(false);
        }
        std::fs::create_dir_all(&self.raw_log_dir).map_err(|e| Error::asset(&self.raw_log_dir, &e))?;
        Ok(true)
    }

    /// Remove everything inside the raw audio directory, keeping the directory
    ///
    /// Returns the number of removed entries.
    ///
    /// # Errors
    ///
    /// Returns an asset error if the directory cannot be read or an entry
    /// cannot be removed
    pub fn clean_raw_log_dir(&self) -> Result<usize> {
        let entries = match std::fs::read_dir(&self.raw_log_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(Error::asset(&self.raw_log_dir, &e)),
        };

        let mut removed = 0;
        for entry in entries {
            let path = entry.map_err(|e| Error::asset(&self.raw_log_dir, &e))?.path();
            let result = if path.is_dir() {
                std::fs::remove_dir_all(&path)
            } else {
                std::fs::remove_file(&path)
            };
            result.map_err(|e| Error::asset(&path, &e))?;
            removed += 1;
        }

        tracing::debug!(dir = %self.raw_log_dir.display(), removed, "raw log directory cleaned");
        Ok(removed)
    }

    /// Check that the acoustic model and dictionary can be read
    ///
    /// # Errors
    ///
    /// Returns an engine configuration error naming the unreadable path
    pub fn verify_readable(&self) -> Result<()> {
        verify_model_files(&self.acoustic_model, &self.dictionary)
    }
}

/// Check that an acoustic model directory and a dictionary file can be read
///
/// # Errors
///
/// Returns an engine configuration error naming the unreadable path
pub fn verify_model_files(acoustic_model: &Path, dictionary: &Path) -> Result<()> {
    std::fs::read_dir(acoustic_model).map_err(|e| {
        Error::EngineConfig(format!(
            "acoustic model {} unreadable: {e}",
            acoustic_model.display()
        ))
    })?;
    std::fs::File::open(dictionary).map_err(|e| {
        Error::EngineConfig(format!(
            "dictionary {} unreadable: {e}",
            dictionary.display()
        ))
    })?;
    Ok(())
}

fn remove_file(path: &Path) -> Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "removed");
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::asset(path, &e)),
    }
}
