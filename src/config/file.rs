//! TOML configuration file loading
//!
//! Supports `~/.config/wakeword-handoff/config.toml` as a persistent config
//! source. All fields are optional; the file is a partial overlay on top of
//! the built-in defaults.
//!
//! ```toml
//! [wake]
//! phrase = "умный дом"
//! keyword_threshold = 1e-5
//! rearm_delay_ms = 300
//!
//! [models]
//! language = "ru"
//! sample_rate_hz = 16000
//!
//! [[keyphrases]]
//! word = "умный"
//! phonemes = "uu m n ay j"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;
use crate::keyphrase::KeyphraseEntry;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HandoffConfigFile {
    /// Wake word spotting
    #[serde(default)]
    pub wake: WakeFileConfig,

    /// Model asset locations
    #[serde(default)]
    pub models: ModelsFileConfig,

    /// Dictation recognizer
    #[serde(default)]
    pub dictation: DictationFileConfig,

    /// Pronunciation dictionary, replaces the built-in one when present
    #[serde(default)]
    pub keyphrases: Option<Vec<KeyphraseEntry>>,
}

/// Wake word configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WakeFileConfig {
    /// Phrase the spotter listens for
    pub phrase: Option<String>,

    /// Keyword acceptance threshold
    pub keyword_threshold: Option<f32>,

    /// Keyphrase search name
    pub search: Option<String>,

    /// Delay before wake listening resumes after dictation
    pub rearm_delay_ms: Option<u64>,

    /// Engine-side noise removal
    pub remove_noise: Option<bool>,

    /// Require partials to contain the wake phrase
    pub strict_partial_match: Option<bool>,
}

/// Model asset configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelsFileConfig {
    /// Root directory for materialized models
    pub data_dir: Option<PathBuf>,

    /// Directory holding the bundled acoustic model
    pub bundled_dir: Option<PathBuf>,

    /// Package identity used in the model layout
    pub package: Option<String>,

    /// Language tag (e.g. "ru")
    pub language: Option<String>,

    /// Acoustic model sample rate
    pub sample_rate_hz: Option<u32>,
}

/// Dictation configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DictationFileConfig {
    /// Language tag passed to the recognizer
    pub language: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `HandoffConfigFile::default()` if the file doesn't exist or can't
/// be parsed.
pub fn load_config_file() -> HandoffConfigFile {
    let Some(path) = config_file_path() else {
        return HandoffConfigFile::default();
    };

    if !path.exists() {
        return HandoffConfigFile::default();
    }

    match load_config_file_from(&path) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to load config file, using defaults"
            );
            HandoffConfigFile::default()
        }
    }
}

/// Load and parse a specific config file
///
/// # Errors
///
/// Returns an I/O error if the file cannot be read and a TOML error if it
/// cannot be parsed
pub fn load_config_file_from(path: &Path) -> Result<HandoffConfigFile> {
    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str(&content)?;
    tracing::info!(path = %path.display(), "loaded config file");
    Ok(config)
}

/// Return the config file path: `~/.config/wakeword-handoff/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| {
        d.config_dir()
            .join("wakeword-handoff")
            .join("config.toml")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_is_default() {
        let config: HandoffConfigFile = toml::from_str("").unwrap();
        assert!(config.wake.phrase.is_none());
        assert!(config.keyphrases.is_none());
    }

    #[test]
    fn test_partial_overlay() {
        let config: HandoffConfigFile = toml::from_str(
            r#"
            [wake]
            phrase = "привет дом"
            rearm_delay_ms = 500

            [[keyphrases]]
            word = "привет"
            phonemes = "p r i v e t"
            "#,
        )
        .unwrap();

        assert_eq!(config.wake.phrase.as_deref(), Some("привет дом"));
        assert_eq!(config.wake.rearm_delay_ms, Some(500));
        assert!(config.wake.keyword_threshold.is_none());
        assert_eq!(config.keyphrases.unwrap()[0].word, "привет");
    }

    #[test]
    fn test_unknown_field_rejected() {
        let parsed: std::result::Result<HandoffConfigFile, _> =
            toml::from_str("[wake]\nthreshold = 0.1\n");
        assert!(parsed.is_err());
    }

    #[test]
    fn test_load_from_reports_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[wake\n").unwrap();

        let err = load_config_file_from(&path).unwrap_err();
        assert!(matches!(err, crate::Error::Toml(_)));
    }
}
