//! Queue events, caller events and runtime commands

use std::fmt;
use std::time::Duration;

use crate::Error;

/// Everything that can arrive on the handoff queue
///
/// Engine callbacks, caller commands, preparation outcomes and timer expiry
/// all land here and are processed strictly in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Caller or bind hook asked for preparation
    Prepare,
    /// Wake engine constructed and installed
    WakeReady,
    /// Preparation failed
    WakeFailed(StartupFailure),
    /// Spotter accepted a start on its search
    WakeStarted,
    /// Spotter refused to start listening
    WakeStartFailed(StartupFailure),
    /// Spotter detected speech onset
    WakeBegin,
    /// Spotter detected end of speech
    WakeEnd,
    /// Spotter produced a partial hypothesis
    WakePartial {
        /// Decoded text, `None` when the spotter has no hypothesis
        hypothesis: Option<String>,
    },
    /// Caller asked for dictation without a wake phrase
    RequestDictation,
    /// Recognizer ready for speech
    DictationReady,
    /// User started speaking
    DictationBegin,
    /// User stopped speaking
    DictationEnd,
    /// Terminal result of a dictation attempt
    DictationResult(Option<String>),
    /// A scheduled re-arm came due
    RearmElapsed(RearmToken),
    /// Unbind or shutdown
    Teardown,
}

/// Events surfaced to the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandoffEvent {
    /// Startup progress
    Status(Status),
    /// Dictation is ready for the user to speak
    ReadyForSpeech,
    /// User started speaking
    BeginningOfSpeech,
    /// User stopped speaking
    EndOfSpeech,
    /// Dictation finished
    ///
    /// `None` means the attempt failed; `Some("")` means it finished without
    /// recognizing anything meaningful.
    Result(Option<String>),
}

/// Startup and listening status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    /// Assets and wake engine are being prepared
    Preparing,
    /// Wake listening armed
    Ready,
    /// Preparation failed; call `prepare` again to retry
    Failed(StartupFailure),
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Preparing => write!(f, "Preparing"),
            Self::Ready => write!(f, "Ready"),
            Self::Failed(failure) => write!(f, "Error: {failure}"),
        }
    }
}

/// Category of a startup failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Model or dictionary files missing or unwritable
    Asset,
    /// Engine rejected its configuration
    EngineConfig,
    /// Anything else
    Other,
}

/// Why preparation failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupFailure {
    /// Failure category
    pub kind: FailureKind,
    /// Human readable detail
    pub message: String,
}

impl fmt::Display for StartupFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<&Error> for StartupFailure {
    fn from(err: &Error) -> Self {
        let kind = match err {
            Error::Asset(_) | Error::Io(_) => FailureKind::Asset,
            Error::EngineConfig(_) | Error::WakeWord(_) => FailureKind::EngineConfig,
            _ => FailureKind::Other,
        };
        Self {
            kind,
            message: err.to_string(),
        }
    }
}

/// Identity of one scheduled re-arm
///
/// Only the most recently issued token is honoured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RearmToken(pub(crate) u64);

/// Side effects requested by the coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run asset and engine preparation on a worker
    Prepare,
    /// Start wake listening
    StartWake,
    /// Cancel wake listening
    CancelWake,
    /// Start a dictation attempt
    StartDictation,
    /// Cancel the dictation attempt
    CancelDictation,
    /// Destroy the recognizer after its terminal result
    ReleaseDictation,
    /// Post [`Event::RearmElapsed`] after `delay`
    ScheduleRearm {
        /// Token the timer reports back
        token: RearmToken,
        /// Delay before re-arming
        delay: Duration,
    },
    /// Drop the pending re-arm timer
    CancelRearm,
    /// Release both engines
    ReleaseEngines,
    /// Surface an event to the caller
    Notify(HandoffEvent),
}
