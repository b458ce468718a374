//! Wake word engine adapter contract
//!
//! The keyword spotter itself is opaque. Adapters wrap it behind
//! [`WakeWordEngine`] and report what it hears through [`WakeEvents`].

use std::path::PathBuf;

use tokio::sync::mpsc;

use crate::Result;
use crate::assets::ModelPaths;
use crate::handoff::Event;
use crate::keyphrase::KeyphraseSpec;

/// Everything a spotter needs to load its model
#[derive(Debug, Clone)]
pub struct WakeEngineSetup {
    /// Acoustic model directory
    pub acoustic_model: PathBuf,
    /// Pronunciation dictionary file
    pub dictionary: PathBuf,
    /// Keyword acceptance threshold
    pub keyword_threshold: f32,
    /// Model sample rate
    pub sample_rate_hz: u32,
    /// Whether the engine should run its own noise removal
    pub remove_noise: bool,
    /// Engine log output
    pub log_file: PathBuf,
    /// Raw audio capture directory
    pub raw_log_dir: PathBuf,
}

impl WakeEngineSetup {
    /// Build a setup from resolved model paths
    #[must_use]
    pub fn from_paths(paths: &ModelPaths, keyword_threshold: f32, remove_noise: bool) -> Self {
        Self {
            acoustic_model: paths.acoustic_model().to_path_buf(),
            dictionary: paths.dictionary().to_path_buf(),
            keyword_threshold,
            sample_rate_hz: paths.sample_rate_hz(),
            remove_noise,
            log_file: paths.log_file().to_path_buf(),
            raw_log_dir: paths.raw_log_dir().to_path_buf(),
        }
    }
}

/// Event emitter handed to a wake word engine
///
/// Events land on the handoff queue. Dropping the emitter (on
/// [`WakeWordEngine::shutdown`]) disconnects the engine from the coordinator.
#[derive(Debug, Clone)]
pub struct WakeEvents {
    tx: mpsc::UnboundedSender<Event>,
}

impl WakeEvents {
    /// Wrap a handoff queue sender
    #[must_use]
    pub const fn new(tx: mpsc::UnboundedSender<Event>) -> Self {
        Self { tx }
    }

    /// The spotter produced a partial hypothesis (or none)
    pub fn partial_result(&self, hypothesis: Option<String>) {
        self.emit(Event::WakePartial { hypothesis });
    }

    /// The spotter detected speech onset
    pub fn beginning_of_speech(&self) {
        self.emit(Event::WakeBegin);
    }

    /// The spotter detected end of speech
    pub fn end_of_speech(&self) {
        self.emit(Event::WakeEnd);
    }

    fn emit(&self, event: Event) {
        if self.tx.send(event).is_err() {
            tracing::debug!("handoff queue closed, dropping wake event");
        }
    }
}

/// A configured keyword spotter
///
/// One instance supports a single listening session at a time. `cancel` and
/// `shutdown` must be safe to call when nothing is running.
pub trait WakeWordEngine: Send {
    /// Register a keyphrase search under `name`
    ///
    /// # Errors
    ///
    /// Returns an engine configuration error if the phrase is rejected
    fn add_keyphrase_search(&mut self, name: &str, phrase: &str) -> Result<()>;

    /// Begin passive listening on a registered search
    ///
    /// # Errors
    ///
    /// Returns a wake word error if the search is unknown or audio cannot start
    fn start_listening(&mut self, search: &str) -> Result<()>;

    /// Stop listening without emitting a result
    fn cancel(&mut self);

    /// Whether a listening session is running
    fn is_listening(&self) -> bool;

    /// Stop, release resources and drop the event emitter
    fn shutdown(&mut self);
}

/// Builds wake word engines from model assets
pub trait WakeWordEngineFactory: Send + Sync {
    /// Load the spotter
    ///
    /// Runs on a blocking worker; may perform filesystem I/O.
    ///
    /// # Errors
    ///
    /// Returns an engine configuration error if the acoustic model or
    /// dictionary cannot be read or the parameters are rejected
    fn configure(
        &self,
        setup: &WakeEngineSetup,
        keyphrases: &KeyphraseSpec,
        events: WakeEvents,
    ) -> Result<Box<dyn WakeWordEngine>>;
}
