//! Keyphrase pronunciation dictionary
//!
//! The wake word engine reads a line-oriented dictionary with one
//! `<word>\t<phonemes>` entry per line. Words are lower-cased on insertion.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A single dictionary entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyphraseEntry {
    /// Lower-cased word
    pub word: String,
    /// Space separated phoneme sequence
    pub phonemes: String,
}

/// Ordered set of pronunciations handed to the wake word engine
///
/// Repeated words are kept; the dictionary format allows them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyphraseSpec {
    entries: Vec<KeyphraseEntry>,
}

impl KeyphraseSpec {
    /// Create an empty spec
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append a pronunciation
    pub fn add(&mut self, word: impl AsRef<str>, phonemes: impl Into<String>) -> &mut Self {
        self.entries.push(KeyphraseEntry {
            word: word.as_ref().to_lowercase(),
            phonemes: phonemes.into(),
        });
        self
    }

    /// Entries in insertion order
    #[must_use]
    pub fn entries(&self) -> &[KeyphraseEntry] {
        &self.entries
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a pronunciation exists for `word` (case-insensitive)
    #[must_use]
    pub fn contains_word(&self, word: &str) -> bool {
        let word = word.to_lowercase();
        self.entries.iter().any(|e| e.word == word)
    }

    /// Words of `phrase` that have no pronunciation
    #[must_use]
    pub fn missing_words<'a>(&self, phrase: &'a str) -> Vec<&'a str> {
        phrase
            .split_whitespace()
            .filter(|w| !self.contains_word(w))
            .collect()
    }

    /// Render the dictionary file contents
    #[must_use]
    pub fn to_dictionary(&self) -> String {
        self.to_string()
    }

    /// Write the dictionary to `path` unless it already holds the same content
    ///
    /// Returns `true` when the file was written.
    ///
    /// # Errors
    ///
    /// Returns an asset error if the parent directory or file cannot be written
    pub fn write_to(&self, path: &Path) -> Result<bool> {
        let content = self.to_dictionary();

        if let Ok(existing) = std::fs::read_to_string(path)
            && existing == content
        {
            tracing::debug!(path = %path.display(), "dictionary up to date");
            return Ok(false);
        }

        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| {
                Error::Asset(format!("cannot create directory {}: {e}", dir.display()))
            })?;
        }

        std::fs::write(path, content).map_err(|e| Error::asset(path, &e))?;
        tracing::debug!(path = %path.display(), entries = self.len(), "dictionary written");
        Ok(true)
    }
}

impl fmt::Display for KeyphraseSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "{}\t{}", entry.word, entry.phonemes)?;
        }
        Ok(())
    }
}

impl<W: AsRef<str>, P: Into<String>> FromIterator<(W, P)> for KeyphraseSpec {
    fn from_iter<I: IntoIterator<Item = (W, P)>>(iter: I) -> Self {
        let mut spec = Self::new();
        for (word, phonemes) in iter {
            spec.add(word, phonemes);
        }
        spec
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dictionary_format() {
        let mut spec = KeyphraseSpec::new();
        spec.add("умный", "uu m n ay j").add("дом", "d oo m");

        assert_eq!(spec.to_dictionary(), "умный\tuu m n ay j\nдом\td oo m\n");
    }

    #[test]
    fn test_words_lowercased() {
        let mut spec = KeyphraseSpec::new();
        spec.add("УМНЫЙ", "uu m n ay j").add("Hello", "hh ah l ow");

        assert_eq!(spec.entries()[0].word, "умный");
        assert_eq!(spec.entries()[1].word, "hello");
        assert!(spec.contains_word("HELLO"));
    }

    #[test]
    fn test_duplicates_kept() {
        let spec: KeyphraseSpec = [("дом", "d oo m"), ("Дом", "d o m")].into_iter().collect();

        assert_eq!(spec.len(), 2);
        assert_eq!(spec.to_dictionary(), "дом\td oo m\nдом\td o m\n");
    }

    #[test]
    fn test_missing_words() {
        let spec: KeyphraseSpec = [("умный", "uu m n ay j")].into_iter().collect();

        assert_eq!(spec.missing_words("Умный дом"), vec!["дом"]);
        assert!(spec.missing_words("умный").is_empty());
    }

    #[test]
    fn test_empty_spec_renders_nothing() {
        assert_eq!(KeyphraseSpec::new().to_dictionary(), "");
    }

    #[test]
    fn test_write_to_skips_identical_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lm").join("lm.dic");
        let spec: KeyphraseSpec = [("дом", "d oo m")].into_iter().collect();

        assert!(spec.write_to(&path).unwrap());
        assert!(!spec.write_to(&path).unwrap());

        let changed: KeyphraseSpec = [("дом", "d o m")].into_iter().collect();
        assert!(changed.write_to(&path).unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "дом\td o m\n");
    }
}
