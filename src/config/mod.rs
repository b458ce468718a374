//! Configuration management for the wake word handoff
//!
//! Values resolve as env (`HANDOFF_*`) > TOML file > built-in default.

pub mod file;

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::assets::ModelPaths;
use crate::engine::DictationRequest;
use crate::keyphrase::KeyphraseSpec;
use crate::{Error, Result};

use file::HandoffConfigFile;

/// Default wake phrase
pub const DEFAULT_WAKE_PHRASE: &str = "умный дом";

/// Default keyword acceptance threshold
pub const DEFAULT_KEYWORD_THRESHOLD: f32 = 1e-5;

/// Default acoustic model sample rate
pub const DEFAULT_SAMPLE_RATE_HZ: u32 = 16_000;

/// Default pause between a dictation result and wake listening resuming
pub const DEFAULT_REARM_DELAY: Duration = Duration::from_millis(300);

/// Default keyphrase search name
pub const DEFAULT_SEARCH_NAME: &str = "kws";

/// Default model language
pub const DEFAULT_LANGUAGE: &str = "ru";

/// Default package identity used in the model layout
pub const DEFAULT_PACKAGE_ID: &str = "dev.omni.handoff";

/// Built-in pronunciations for the default wake phrase
pub const DEFAULT_KEYPHRASES: &[(&str, &str)] = &[("умный", "uu m n ay j"), ("дом", "d oo m")];

/// Wake word handoff configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Wake word spotting
    pub wake: WakeConfig,

    /// Model asset locations
    pub models: ModelConfig,

    /// Dictation recognizer
    pub dictation: DictationConfig,

    /// Pronunciations written to the engine dictionary
    pub keyphrases: KeyphraseSpec,
}

/// Wake word spotting configuration
#[derive(Debug, Clone)]
pub struct WakeConfig {
    /// Phrase the spotter listens for
    pub phrase: String,

    /// Keyword acceptance threshold, passed through to the engine
    pub keyword_threshold: f32,

    /// Name of the keyphrase search
    pub search_name: String,

    /// Pause before wake listening resumes after a dictation result
    pub rearm_delay: Duration,

    /// Engine-side noise removal
    pub remove_noise: bool,

    /// Only hand off on partials containing the wake phrase
    ///
    /// When off, any non-empty partial hypothesis triggers dictation.
    pub strict_partial_match: bool,
}

impl Default for WakeConfig {
    fn default() -> Self {
        Self {
            phrase: DEFAULT_WAKE_PHRASE.to_string(),
            keyword_threshold: DEFAULT_KEYWORD_THRESHOLD,
            search_name: DEFAULT_SEARCH_NAME.to_string(),
            rearm_delay: DEFAULT_REARM_DELAY,
            remove_noise: false,
            strict_partial_match: false,
        }
    }
}

/// Model asset configuration
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Root under which models are materialized
    pub data_root: PathBuf,

    /// Directory holding the bundled acoustic model files
    pub bundled_dir: PathBuf,

    /// Package identity
    pub package_id: String,

    /// Language tag
    pub language: String,

    /// Acoustic model sample rate
    pub sample_rate_hz: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            data_root: default_data_root(),
            bundled_dir: default_bundled_dir(DEFAULT_LANGUAGE),
            package_id: DEFAULT_PACKAGE_ID.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            sample_rate_hz: DEFAULT_SAMPLE_RATE_HZ,
        }
    }
}

impl ModelConfig {
    /// Resolve the on-disk layout
    #[must_use]
    pub fn paths(&self) -> ModelPaths {
        ModelPaths::new(
            &self.data_root,
            &self.package_id,
            &self.language,
            self.sample_rate_hz,
        )
    }
}

/// Dictation recognizer configuration
#[derive(Debug, Clone, Default)]
pub struct DictationConfig {
    /// Language tag for the recognizer, its own default when unset
    pub language: Option<String>,
}

/// Default model root: `~/.local/share/wakeword-handoff` on Linux
fn default_data_root() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from(".local/share/wakeword-handoff"),
        |d| d.data_dir().join("wakeword-handoff"),
    )
}

/// Default bundled model directory: `models/<language>/hmm`
fn default_bundled_dir(language: &str) -> PathBuf {
    Path::new("models").join(language).join("hmm")
}

fn default_keyphrases() -> KeyphraseSpec {
    DEFAULT_KEYPHRASES.iter().copied().collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            wake: WakeConfig::default(),
            models: ModelConfig::default(),
            dictation: DictationConfig::default(),
            keyphrases: default_keyphrases(),
        }
    }
}

impl Config {
    /// Load from the standard config file and the process environment
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the merged values fail validation
    pub fn load() -> Result<Self> {
        let fc = file::load_config_file();
        let config = Self::from_sources(fc, |key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load from an explicit config file and the process environment
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or the merged
    /// values fail validation
    pub fn load_from(path: &Path) -> Result<Self> {
        let fc = file::load_config_file_from(path)?;
        let config = Self::from_sources(fc, |key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Merge a parsed config file with environment lookups (env > toml > default)
    #[must_use]
    pub fn from_sources(fc: HandoffConfigFile, env: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = WakeConfig::default();

        // Wake config (env > toml > default)
        let wake = WakeConfig {
            phrase: env("HANDOFF_WAKE_PHRASE")
                .or(fc.wake.phrase)
                .unwrap_or(defaults.phrase),
            keyword_threshold: parse_env(&env, "HANDOFF_KEYWORD_THRESHOLD")
                .or(fc.wake.keyword_threshold)
                .unwrap_or(defaults.keyword_threshold),
            search_name: env("HANDOFF_SEARCH")
                .or(fc.wake.search)
                .unwrap_or(defaults.search_name),
            rearm_delay: parse_env(&env, "HANDOFF_REARM_DELAY_MS")
                .or(fc.wake.rearm_delay_ms)
                .map_or(defaults.rearm_delay, Duration::from_millis),
            remove_noise: env("HANDOFF_REMOVE_NOISE")
                .map(|v| is_truthy(&v))
                .or(fc.wake.remove_noise)
                .unwrap_or(defaults.remove_noise),
            strict_partial_match: env("HANDOFF_STRICT_PARTIAL")
                .map(|v| is_truthy(&v))
                .or(fc.wake.strict_partial_match)
                .unwrap_or(defaults.strict_partial_match),
        };

        // Model config (env > toml > default)
        let language = env("HANDOFF_LANGUAGE")
            .or(fc.models.language)
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());
        let models = ModelConfig {
            data_root: env("HANDOFF_DATA_DIR")
                .map(PathBuf::from)
                .or(fc.models.data_dir)
                .unwrap_or_else(default_data_root),
            bundled_dir: env("HANDOFF_MODEL_DIR")
                .map(PathBuf::from)
                .or(fc.models.bundled_dir)
                .unwrap_or_else(|| default_bundled_dir(&language)),
            package_id: env("HANDOFF_PACKAGE")
                .or(fc.models.package)
                .unwrap_or_else(|| DEFAULT_PACKAGE_ID.to_string()),
            sample_rate_hz: parse_env(&env, "HANDOFF_SAMPLE_RATE")
                .or(fc.models.sample_rate_hz)
                .unwrap_or(DEFAULT_SAMPLE_RATE_HZ),
            language,
        };

        let dictation = DictationConfig {
            language: env("HANDOFF_DICTATION_LANGUAGE").or(fc.dictation.language),
        };

        // A configured dictionary replaces the built-in one wholesale
        let keyphrases = fc.keyphrases.map_or_else(default_keyphrases, |entries| {
            entries.into_iter().map(|e| (e.word, e.phonemes)).collect()
        });

        Self {
            wake,
            models,
            dictation,
            keyphrases,
        }
    }

    /// Check values the engines would otherwise reject at startup
    ///
    /// # Errors
    ///
    /// Returns a configuration error describing the first invalid value
    pub fn validate(&self) -> Result<()> {
        let threshold = self.wake.keyword_threshold;
        if !threshold.is_finite() || threshold <= 0.0 || threshold > 1.0 {
            return Err(Error::Config(format!(
                "keyword threshold must be in (0, 1], got {threshold}"
            )));
        }

        if self.models.sample_rate_hz == 0 {
            return Err(Error::Config("sample rate must be positive".to_string()));
        }

        if self.wake.phrase.trim().is_empty() {
            return Err(Error::Config("wake phrase is empty".to_string()));
        }

        if self.wake.search_name.trim().is_empty() {
            return Err(Error::Config("search name is empty".to_string()));
        }

        let missing = self.keyphrases.missing_words(&self.wake.phrase);
        if !missing.is_empty() {
            return Err(Error::Config(format!(
                "wake phrase words missing from dictionary: {}",
                missing.join(", ")
            )));
        }

        Ok(())
    }

    /// Resolved model layout
    #[must_use]
    pub fn model_paths(&self) -> ModelPaths {
        self.models.paths()
    }

    /// Request sent with every dictation attempt
    #[must_use]
    pub fn dictation_request(&self) -> DictationRequest {
        let request = DictationRequest::free_form(&self.models.package_id);
        match &self.dictation.language {
            Some(language) => request.with_language(language),
            None => request,
        }
    }
}

fn parse_env<T: std::str::FromStr>(env: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = env(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparseable environment value");
            None
        }
    }
}

fn is_truthy(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_sources(HandoffConfigFile::default(), env_of(&[]));
        assert_eq!(config.wake.phrase, "умный дом");
        assert!((config.wake.keyword_threshold - 1e-5).abs() < f32::EPSILON);
        assert_eq!(config.wake.rearm_delay, Duration::from_millis(300));
        assert_eq!(config.wake.search_name, "kws");
        assert!(!config.wake.strict_partial_match);
        assert_eq!(config.models.sample_rate_hz, 16_000);
        assert_eq!(config.keyphrases.len(), 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides_toml() {
        let fc: HandoffConfigFile = toml::from_str(
            r#"
            [wake]
            rearm_delay_ms = 500
            strict_partial_match = true

            [models]
            sample_rate_hz = 8000
            "#,
        )
        .unwrap();
        let config = Config::from_sources(
            fc,
            env_of(&[("HANDOFF_REARM_DELAY_MS", "50"), ("HANDOFF_LANGUAGE", "en")]),
        );

        assert_eq!(config.wake.rearm_delay, Duration::from_millis(50));
        assert!(config.wake.strict_partial_match);
        assert_eq!(config.models.sample_rate_hz, 8000);
        assert_eq!(config.models.language, "en");
        assert_eq!(config.models.bundled_dir, Path::new("models/en/hmm"));
    }

    #[test]
    fn test_unparseable_env_falls_through() {
        let config = Config::from_sources(
            HandoffConfigFile::default(),
            env_of(&[("HANDOFF_SAMPLE_RATE", "fast")]),
        );
        assert_eq!(config.models.sample_rate_hz, DEFAULT_SAMPLE_RATE_HZ);
    }

    #[test]
    fn test_keyphrases_replace_defaults_and_lowercase() {
        let fc: HandoffConfigFile = toml::from_str(
            r#"
            [wake]
            phrase = "Hey Robot"

            [[keyphrases]]
            word = "HEY"
            phonemes = "hh ey"

            [[keyphrases]]
            word = "robot"
            phonemes = "r ow b aa t"
            "#,
        )
        .unwrap();
        let config = Config::from_sources(fc, env_of(&[]));

        assert_eq!(config.keyphrases.to_dictionary(), "hey\thh ey\nrobot\tr ow b aa t\n");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.wake.keyword_threshold = 0.0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = Config::default();
        config.wake.keyword_threshold = f32::NAN;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.models.sample_rate_hz = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.wake.phrase = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_reports_missing_words() {
        let mut config = Config::default();
        config.wake.phrase = "умный холодильник".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("холодильник"));
    }

    #[test]
    fn test_dictation_request() {
        let mut config = Config::default();
        assert_eq!(config.dictation_request().language, None);
        assert_eq!(config.dictation_request().calling_package, DEFAULT_PACKAGE_ID);

        config.dictation.language = Some("ru-RU".to_string());
        assert_eq!(config.dictation_request().language.as_deref(), Some("ru-RU"));
    }
}
