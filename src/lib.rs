//! Wakeword Handoff - wake phrase to dictation coordinator
//!
//! This library coordinates two speech engines that share one microphone:
//! - A low-power keyword spotter that listens for a fixed wake phrase
//! - An on-demand dictation recognizer that transcribes what follows
//!
//! The two never listen at the same time. A wake phrase cancels the spotter
//! and starts dictation; the dictation result re-arms the spotter after a
//! short delay.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                    HandoffHandle                     │
//! │  prepare │ request_dictation │ bind │ unbind │ watch │
//! └─────────────────────────┬────────────────────────────┘
//!                           │ Event queue (mpsc)
//! ┌─────────────────────────▼────────────────────────────┐
//! │             Handoff runtime (one task)               │
//! │     Coordinator (reducer)  →  Commands → Engines     │
//! └───────┬──────────────────────────────────┬───────────┘
//!         │ spawn_blocking                   │
//! ┌───────▼─────────────┐         ┌──────────▼───────────┐
//! │ Preparation         │         │ EngineSlots          │
//! │ assets, dictionary  │         │ wake │ dictation     │
//! └─────────────────────┘         └──────────────────────┘
//! ```

pub mod assets;
pub mod config;
pub mod engine;
pub mod error;
pub mod handoff;
pub mod keyphrase;

pub use assets::{AssetSource, DirAssetSource, MODEL_SCHEMA_VERSION, ModelPaths};
pub use config::Config;
pub use engine::{
    DictationEngine, DictationRequest, EngineKind, RecognitionErrorKind, RecognitionListener,
    RecognitionSession, Recognizer, RecognizerFactory, WakeEngineSetup, WakeEvents,
    WakeWordEngine, WakeWordEngineFactory,
};
pub use error::{Error, Result};
pub use handoff::{
    HandoffBuilder, HandoffEvent, HandoffEvents, HandoffHandle, HandoffState, Snapshot,
    StartupFailure, Status,
};
pub use keyphrase::{KeyphraseEntry, KeyphraseSpec};
