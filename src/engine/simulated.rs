//! Simulated speech engines
//!
//! A shared [`Microphone`] routes spoken text to whichever engine holds it.
//! The spotter fires when the text contains one of its keyphrases; the
//! recognizer answers ready → begin → end → result. The microphone counts
//! overlapping claims so tests can check that the two engines never listen
//! at the same time.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use super::dictation::{
    DictationRequest, RecognitionErrorKind, RecognitionListener, Recognizer, RecognizerFactory,
};
use super::wake::{WakeEngineSetup, WakeEvents, WakeWordEngine, WakeWordEngineFactory};
use super::EngineKind;
use crate::assets::verify_model_files;
use crate::keyphrase::KeyphraseSpec;
use crate::{Error, Result};

#[derive(Debug, Default)]
struct MicState {
    holder: Option<EngineKind>,
    wake: Option<(String, WakeEvents)>,
    dictation: Option<RecognitionListener>,
    overlaps: usize,
    claims: Vec<EngineKind>,
}

/// Shared audio input for the simulated engines
#[derive(Debug, Clone, Default)]
pub struct Microphone {
    state: Arc<Mutex<MicState>>,
}

impl Microphone {
    /// Create an idle microphone
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine currently listening
    #[must_use]
    pub fn holder(&self) -> Option<EngineKind> {
        self.lock().holder
    }

    /// Number of times an engine claimed the microphone while the other held it
    #[must_use]
    pub fn overlaps(&self) -> usize {
        self.lock().overlaps
    }

    /// Every claim in order
    #[must_use]
    pub fn claims(&self) -> Vec<EngineKind> {
        self.lock().claims.clone()
    }

    /// Speak `text` into the microphone
    ///
    /// Returns the engine that heard it, if any.
    pub fn say(&self, text: &str) -> Option<EngineKind> {
        let mut state = self.lock();
        match state.holder {
            Some(EngineKind::Wake) => {
                let (phrase, events) = state.wake.clone()?;
                drop(state);

                let heard = text.trim().to_lowercase();
                events.beginning_of_speech();
                if heard.contains(&phrase) {
                    tracing::debug!(hypothesis = %heard, "keyphrase spotted");
                    events.partial_result(Some(heard));
                }
                events.end_of_speech();
                Some(EngineKind::Wake)
            }
            Some(EngineKind::Dictation) => {
                let listener = state.dictation.take()?;
                state.holder = None;
                drop(state);

                listener.beginning_of_speech();
                listener.end_of_speech();
                let text = text.trim();
                if text.is_empty() {
                    listener.results(Vec::new());
                } else {
                    listener.results(vec![text.to_string()]);
                }
                Some(EngineKind::Dictation)
            }
            None => {
                tracing::debug!(text, "nobody listening");
                None
            }
        }
    }

    /// Speak something the recognizer cannot make sense of
    ///
    /// The recognizer reports one empty hypothesis. Returns `false` if
    /// dictation was not listening.
    pub fn mumble(&self) -> bool {
        let mut state = self.lock();
        if state.holder != Some(EngineKind::Dictation) {
            return false;
        }
        state.holder = None;
        let Some(listener) = state.dictation.take() else {
            return false;
        };
        drop(state);

        listener.beginning_of_speech();
        listener.end_of_speech();
        listener.results(vec![String::new()]);
        true
    }

    /// Make the listening recognizer fail with `kind`
    ///
    /// Returns `false` if dictation was not listening.
    pub fn fail(&self, kind: RecognitionErrorKind) -> bool {
        let mut state = self.lock();
        if state.holder != Some(EngineKind::Dictation) {
            return false;
        }
        state.holder = None;
        let Some(listener) = state.dictation.take() else {
            return false;
        };
        drop(state);

        listener.error(kind);
        true
    }

    fn claim(kind: EngineKind, state: &mut MicState) {
        if let Some(current) = state.holder
            && current != kind
        {
            tracing::warn!(holder = %current, claimant = %kind, "microphone claimed while in use");
            state.overlaps += 1;
        }
        state.holder = Some(kind);
        state.claims.push(kind);
    }

    fn claim_wake(&self, phrase: String, events: WakeEvents) {
        let mut state = self.lock();
        Self::claim(EngineKind::Wake, &mut state);
        state.wake = Some((phrase, events));
    }

    fn claim_dictation(&self, listener: RecognitionListener) {
        let mut state = self.lock();
        Self::claim(EngineKind::Dictation, &mut state);
        state.dictation = Some(listener);
    }

    fn release(&self, kind: EngineKind) {
        let mut state = self.lock();
        match kind {
            EngineKind::Wake => state.wake = None,
            EngineKind::Dictation => state.dictation = None,
        }
        if state.holder == Some(kind) {
            state.holder = None;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MicState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Keyword spotter listening on a [`Microphone`]
#[derive(Debug)]
pub struct SimulatedWakeEngine {
    mic: Microphone,
    keyphrases: KeyphraseSpec,
    searches: HashMap<String, String>,
    events: Option<WakeEvents>,
    listening: bool,
}

impl WakeWordEngine for SimulatedWakeEngine {
    fn add_keyphrase_search(&mut self, name: &str, phrase: &str) -> Result<()> {
        let missing = self.keyphrases.missing_words(phrase);
        if !missing.is_empty() {
            return Err(Error::EngineConfig(format!(
                "keyphrase \"{phrase}\" has words missing from the dictionary: {}",
                missing.join(", ")
            )));
        }
        self.searches.insert(name.to_string(), phrase.to_lowercase());
        Ok(())
    }

    fn start_listening(&mut self, search: &str) -> Result<()> {
        let events = self
            .events
            .clone()
            .ok_or_else(|| Error::WakeWord("engine shut down".to_string()))?;
        let phrase = self
            .searches
            .get(search)
            .cloned()
            .ok_or_else(|| Error::WakeWord(format!("unknown search: {search}")))?;

        self.mic.claim_wake(phrase, events);
        self.listening = true;
        tracing::trace!(search, "spotter listening");
        Ok(())
    }

    fn cancel(&mut self) {
        if self.listening {
            self.mic.release(EngineKind::Wake);
            self.listening = false;
            tracing::trace!("spotter cancelled");
        }
    }

    fn is_listening(&self) -> bool {
        self.listening
    }

    fn shutdown(&mut self) {
        self.cancel();
        self.events = None;
    }
}

/// Builds [`SimulatedWakeEngine`]s after checking the model assets exist
#[derive(Debug, Clone)]
pub struct SimulatedWakeFactory {
    mic: Microphone,
}

impl SimulatedWakeFactory {
    /// Spotters created by this factory listen on `mic`
    #[must_use]
    pub const fn new(mic: Microphone) -> Self {
        Self { mic }
    }
}

impl WakeWordEngineFactory for SimulatedWakeFactory {
    fn configure(
        &self,
        setup: &WakeEngineSetup,
        keyphrases: &KeyphraseSpec,
        events: WakeEvents,
    ) -> Result<Box<dyn WakeWordEngine>> {
        if !setup.keyword_threshold.is_finite() || setup.keyword_threshold <= 0.0 {
            return Err(Error::EngineConfig(format!(
                "invalid keyword threshold {}",
                setup.keyword_threshold
            )));
        }
        verify_model_files(&setup.acoustic_model, &setup.dictionary)?;

        tracing::debug!(
            model = %setup.acoustic_model.display(),
            threshold = setup.keyword_threshold,
            "simulated spotter configured"
        );

        Ok(Box::new(SimulatedWakeEngine {
            mic: self.mic.clone(),
            keyphrases: keyphrases.clone(),
            searches: HashMap::new(),
            events: Some(events),
            listening: false,
        }))
    }
}

/// Recognizer instance listening on a [`Microphone`]
#[derive(Debug)]
pub struct SimulatedRecognizer {
    mic: Microphone,
    listener: RecognitionListener,
}

impl Recognizer for SimulatedRecognizer {
    fn start_listening(&mut self, _request: &DictationRequest) -> Result<()> {
        self.mic.claim_dictation(self.listener.clone());
        self.listener.ready_for_speech();
        Ok(())
    }

    fn cancel(&mut self) {
        self.mic.release(EngineKind::Dictation);
    }

    fn destroy(&mut self) {
        self.mic.release(EngineKind::Dictation);
    }
}

/// Creates [`SimulatedRecognizer`]s
#[derive(Debug, Clone)]
pub struct SimulatedRecognizerFactory {
    mic: Microphone,
}

impl SimulatedRecognizerFactory {
    /// Recognizers created by this factory listen on `mic`
    #[must_use]
    pub const fn new(mic: Microphone) -> Self {
        Self { mic }
    }
}

impl RecognizerFactory for SimulatedRecognizerFactory {
    fn create(&self, listener: RecognitionListener) -> Result<Box<dyn Recognizer>> {
        Ok(Box::new(SimulatedRecognizer {
            mic: self.mic.clone(),
            listener,
        }))
    }
}
