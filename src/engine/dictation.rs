//! Dictation engine adapter
//!
//! Wraps an opaque on-demand recognizer. The underlying [`Recognizer`] is
//! created on `start` and destroyed after every terminal result or cancel, so
//! its resources never outlive a single attempt.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;

use crate::Result;
use crate::handoff::Event;

/// Attempt id meaning "no attempt outstanding"
const NO_ATTEMPT: u64 = 0;

/// Language model hint passed to the recognizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LanguageModel {
    /// Free-form dictation
    #[default]
    FreeForm,
}

/// Parameters of one dictation attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictationRequest {
    /// Identity of the calling application
    pub calling_package: String,
    /// Language model hint
    pub language_model: LanguageModel,
    /// BCP 47 language tag, recognizer default when `None`
    pub language: Option<String>,
}

impl DictationRequest {
    /// Free-form request for `calling_package`
    #[must_use]
    pub fn free_form(calling_package: impl Into<String>) -> Self {
        Self {
            calling_package: calling_package.into(),
            language_model: LanguageModel::FreeForm,
            language: None,
        }
    }

    /// Set the language tag
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

/// Why a recognizer gave up on an attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecognitionErrorKind {
    /// Speech heard but nothing matched
    NoMatch,
    /// No speech before the recognizer timed out
    SpeechTimeout,
    /// Audio capture failed
    Audio,
    /// Network or server failure
    Network,
    /// Recognizer busy with another client
    Busy,
    /// Client side failure (bad request, start refused)
    Client,
    /// Anything else
    Other,
}

impl fmt::Display for RecognitionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoMatch => write!(f, "no match"),
            Self::SpeechTimeout => write!(f, "speech timeout"),
            Self::Audio => write!(f, "audio"),
            Self::Network => write!(f, "network"),
            Self::Busy => write!(f, "busy"),
            Self::Client => write!(f, "client"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Callback surface handed to one recognizer instance
///
/// Emissions for an attempt that is no longer live are dropped, so each
/// attempt yields at most one terminal result and nothing after a cancel.
#[derive(Debug, Clone)]
pub struct RecognitionListener {
    attempt: u64,
    live: Arc<AtomicU64>,
    tx: mpsc::UnboundedSender<Event>,
}

impl RecognitionListener {
    /// Whether the attempt can still emit
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire) == self.attempt
    }

    /// Recognizer is ready for the user to speak
    pub fn ready_for_speech(&self) {
        self.lifecycle(Event::DictationReady);
    }

    /// User started speaking
    pub fn beginning_of_speech(&self) {
        self.lifecycle(Event::DictationBegin);
    }

    /// User stopped speaking
    pub fn end_of_speech(&self) {
        self.lifecycle(Event::DictationEnd);
    }

    /// Final hypotheses, best first
    ///
    /// An empty list is reported as an absent result.
    pub fn results(&self, matches: Vec<String>) {
        let text = matches.into_iter().next();
        self.finish(text);
    }

    /// The attempt failed
    pub fn error(&self, kind: RecognitionErrorKind) {
        tracing::debug!(attempt = self.attempt, error = %kind, "dictation attempt failed");
        self.finish(None);
    }

    fn lifecycle(&self, event: Event) {
        if !self.is_live() {
            tracing::trace!(attempt = self.attempt, ?event, "stale dictation event dropped");
            return;
        }
        self.send(event);
    }

    fn finish(&self, text: Option<String>) {
        if self
            .live
            .compare_exchange(self.attempt, NO_ATTEMPT, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!(attempt = self.attempt, "terminal result for finished attempt dropped");
            return;
        }
        match &text {
            Some(t) => tracing::debug!(attempt = self.attempt, text = %t, "dictation result"),
            None => tracing::debug!(attempt = self.attempt, "dictation result (none)"),
        }
        self.send(Event::DictationResult(text));
    }

    fn send(&self, event: Event) {
        if self.tx.send(event).is_err() {
            tracing::debug!("handoff queue closed, dropping dictation event");
        }
    }
}

/// One underlying recognizer instance
pub trait Recognizer: Send {
    /// Begin listening for one utterance
    ///
    /// # Errors
    ///
    /// Returns a recognition error if the recognizer refuses to start
    fn start_listening(&mut self, request: &DictationRequest) -> Result<()>;

    /// Abort the current utterance
    fn cancel(&mut self);

    /// Release all resources; the instance is not used afterwards
    fn destroy(&mut self);
}

/// Creates recognizer instances bound to a listener
pub trait RecognizerFactory: Send + Sync {
    /// Create a recognizer reporting to `listener`
    ///
    /// # Errors
    ///
    /// Returns a recognition error if no recognizer is available
    fn create(&self, listener: RecognitionListener) -> Result<Box<dyn Recognizer>>;
}

/// On-demand dictation with a one-attempt recognizer lifetime
pub struct DictationEngine {
    factory: Arc<dyn RecognizerFactory>,
    request: DictationRequest,
    tx: Option<mpsc::UnboundedSender<Event>>,
    live: Arc<AtomicU64>,
    next_attempt: u64,
    recognizer: Option<Box<dyn Recognizer>>,
}

impl fmt::Debug for DictationEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DictationEngine")
            .field("request", &self.request)
            .field("connected", &self.tx.is_some())
            .field("live_attempt", &self.live.load(Ordering::Acquire))
            .field("has_recognizer", &self.recognizer.is_some())
            .finish_non_exhaustive()
    }
}

impl DictationEngine {
    /// Create an engine that reports to the handoff queue
    #[must_use]
    pub fn new(
        factory: Arc<dyn RecognizerFactory>,
        request: DictationRequest,
        tx: mpsc::UnboundedSender<Event>,
    ) -> Self {
        Self {
            factory,
            request,
            tx: Some(tx),
            live: Arc::new(AtomicU64::new(NO_ATTEMPT)),
            next_attempt: NO_ATTEMPT + 1,
            recognizer: None,
        }
    }

    /// Whether an attempt is outstanding
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.live.load(Ordering::Acquire) != NO_ATTEMPT
    }

    /// Whether an underlying recognizer instance exists
    #[must_use]
    pub const fn has_recognizer(&self) -> bool {
        self.recognizer.is_some()
    }

    /// Start a new attempt
    ///
    /// An attempt still outstanding is cancelled first. Failures to create or
    /// start the recognizer are reported as an absent result.
    pub fn start(&mut self) {
        let Some(tx) = self.tx.clone() else {
            tracing::debug!("dictation engine shut down, ignoring start");
            return;
        };

        if self.recognizer.is_some() {
            tracing::debug!("dictation restarted before previous attempt finished");
            self.cancel();
        }

        let attempt = self.next_attempt;
        self.next_attempt += 1;

        let listener = RecognitionListener {
            attempt,
            live: Arc::clone(&self.live),
            tx,
        };
        self.live.store(attempt, Ordering::Release);

        tracing::debug!(attempt, "creating speech recognizer");
        let mut recognizer = match self.factory.create(listener.clone()) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(attempt, error = %e, "speech recognizer unavailable");
                listener.error(RecognitionErrorKind::Client);
                return;
            }
        };

        if let Err(e) = recognizer.start_listening(&self.request) {
            tracing::warn!(attempt, error = %e, "speech recognizer refused to start");
            recognizer.destroy();
            listener.error(RecognitionErrorKind::Client);
            return;
        }

        self.recognizer = Some(recognizer);
    }

    /// Abort the outstanding attempt, suppressing any further events from it
    pub fn cancel(&mut self) {
        let attempt = self.live.swap(NO_ATTEMPT, Ordering::AcqRel);
        if let Some(mut recognizer) = self.recognizer.take() {
            tracing::debug!(attempt, "cancelling speech recognizer");
            recognizer.cancel();
            recognizer.destroy();
        }
    }

    /// Destroy the recognizer instance after its terminal result
    pub fn release(&mut self) {
        if let Some(mut recognizer) = self.recognizer.take() {
            tracing::debug!("destroying speech recognizer");
            if self.is_started() {
                self.live.store(NO_ATTEMPT, Ordering::Release);
                recognizer.cancel();
            }
            recognizer.destroy();
        }
    }

    /// Cancel everything and disconnect from the handoff queue
    pub fn shutdown(&mut self) {
        self.cancel();
        self.tx = None;
    }
}

impl Drop for DictationEngine {
    fn drop(&mut self) {
        if self.recognizer.is_some() {
            tracing::debug!("dictation engine dropped with live recognizer");
            self.cancel();
        }
    }
}
