//! Speech engine adapters
//!
//! The keyword spotter and the dictation recognizer are external components.
//! This module defines the contracts the handoff drives them through, plus a
//! simulated pair used by the developer harness and tests.

pub mod dictation;
pub mod simulated;
pub mod wake;

use std::fmt;

pub use dictation::{
    DictationEngine, DictationRequest, LanguageModel, RecognitionErrorKind, RecognitionListener,
    Recognizer, RecognizerFactory,
};
pub use wake::{WakeEngineSetup, WakeEvents, WakeWordEngine, WakeWordEngineFactory};

/// Which engine a session belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineKind {
    /// Always-on keyword spotter
    Wake,
    /// On-demand dictation recognizer
    Dictation,
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wake => write!(f, "wake"),
            Self::Dictation => write!(f, "dictation"),
        }
    }
}

/// A listening session as tracked by the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecognitionSession {
    /// Engine the session runs on
    pub engine: EngineKind,
    /// Whether the engine has been told to listen
    pub active: bool,
}

impl RecognitionSession {
    /// An active session on `engine`
    #[must_use]
    pub const fn active(engine: EngineKind) -> Self {
        Self {
            engine,
            active: true,
        }
    }
}
