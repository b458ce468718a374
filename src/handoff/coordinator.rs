//! Handoff reducer
//!
//! [`Coordinator::handle`] consumes one queue event and returns the side
//! effects the runtime must perform, in order. It never touches an engine
//! itself, which keeps every transition testable without a runtime.

use std::time::Duration;

use super::event::{Command, Event, HandoffEvent, RearmToken, StartupFailure, Status};
use super::state::HandoffState;
use crate::engine::{EngineKind, RecognitionSession};

/// Pure state machine for the wake/dictation handoff
#[derive(Debug, Clone)]
pub struct Coordinator {
    state: HandoffState,
    session: Option<RecognitionSession>,
    rearm: Option<RearmToken>,
    next_token: u64,
    rearm_delay: Duration,
    required_phrase: Option<String>,
}

impl Coordinator {
    /// Create a coordinator that re-arms wake listening after `rearm_delay`
    #[must_use]
    pub const fn new(rearm_delay: Duration) -> Self {
        Self {
            state: HandoffState::Unprepared,
            session: None,
            rearm: None,
            next_token: 0,
            rearm_delay,
            required_phrase: None,
        }
    }

    /// Only trigger on partials that contain `phrase` (case-insensitive)
    #[must_use]
    pub fn with_required_phrase(mut self, phrase: &str) -> Self {
        self.required_phrase = Some(phrase.to_lowercase());
        self
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> HandoffState {
        self.state
    }

    /// Currently active listening session, if any
    #[must_use]
    pub const fn session(&self) -> Option<RecognitionSession> {
        self.session
    }

    /// Whether a re-arm is scheduled
    #[must_use]
    pub const fn rearm_pending(&self) -> bool {
        self.rearm.is_some()
    }

    /// Apply one event and return the commands to run
    pub fn handle(&mut self, event: Event) -> Vec<Command> {
        let before = self.state;
        let commands = match event {
            Event::Prepare => self.on_prepare(),
            Event::WakeReady => self.on_wake_ready(),
            Event::WakeFailed(failure) => {
                if self.state == HandoffState::Preparing {
                    tracing::warn!(error = %failure, "wake engine preparation failed");
                    self.state = HandoffState::Error;
                    vec![Command::Notify(HandoffEvent::Status(Status::Failed(failure)))]
                } else {
                    tracing::debug!(state = %self.state, error = %failure, "late preparation failure ignored");
                    Vec::new()
                }
            }
            Event::WakeStarted => {
                if self.state.is_wake_listening() {
                    vec![Command::Notify(HandoffEvent::Status(Status::Ready))]
                } else {
                    tracing::debug!(state = %self.state, "stale wake start ignored");
                    Vec::new()
                }
            }
            Event::WakeStartFailed(failure) => self.on_wake_start_failed(failure),
            Event::WakeBegin => {
                tracing::trace!("wake: beginning of speech");
                Vec::new()
            }
            Event::WakeEnd => {
                tracing::trace!("wake: end of speech");
                Vec::new()
            }
            Event::WakePartial { hypothesis } => self.on_wake_partial(hypothesis),
            Event::RequestDictation => {
                if self.state.accepts_trigger() {
                    tracing::debug!("dictation requested by caller");
                    self.begin_dictation()
                } else {
                    tracing::debug!(state = %self.state, "dictation request ignored");
                    Vec::new()
                }
            }
            Event::DictationReady => self.relay(HandoffEvent::ReadyForSpeech),
            Event::DictationBegin => self.relay(HandoffEvent::BeginningOfSpeech),
            Event::DictationEnd => self.relay(HandoffEvent::EndOfSpeech),
            Event::DictationResult(text) => self.on_dictation_result(text),
            Event::RearmElapsed(token) => self.on_rearm(token),
            Event::Teardown => self.teardown(),
        };

        if before != self.state {
            tracing::debug!(from = %before, to = %self.state, "handoff transition");
        }
        commands
    }

    fn on_prepare(&mut self) -> Vec<Command> {
        if self.state.accepts_prepare() {
            self.state = HandoffState::Preparing;
            return vec![
                Command::Notify(HandoffEvent::Status(Status::Preparing)),
                Command::Prepare,
            ];
        }
        if self.state.is_destroyed() {
            tracing::warn!("prepare after teardown ignored");
        } else {
            tracing::debug!(state = %self.state, "prepare ignored");
        }
        Vec::new()
    }

    fn on_wake_ready(&mut self) -> Vec<Command> {
        if self.state != HandoffState::Preparing {
            tracing::debug!(state = %self.state, "late wake engine ignored");
            return Vec::new();
        }
        tracing::info!("wake engine ready");
        self.state = HandoffState::Idle {
            wake_listening: false,
        };
        self.start_wake()
    }

    fn on_wake_start_failed(&mut self, failure: StartupFailure) -> Vec<Command> {
        if !self.state.is_wake_listening() {
            tracing::debug!(state = %self.state, error = %failure, "stale wake start failure ignored");
            return Vec::new();
        }
        tracing::warn!(error = %failure, "wake listening failed to start");
        self.state = HandoffState::Error;
        self.session = None;
        vec![Command::Notify(HandoffEvent::Status(Status::Failed(failure)))]
    }

    fn on_wake_partial(&mut self, hypothesis: Option<String>) -> Vec<Command> {
        let Some(text) = hypothesis.filter(|t| !t.trim().is_empty()) else {
            return Vec::new();
        };
        if !self.state.is_wake_listening() {
            tracing::debug!(state = %self.state, hypothesis = %text, "partial while not listening ignored");
            return Vec::new();
        }
        if let Some(phrase) = &self.required_phrase
            && !text.to_lowercase().contains(phrase.as_str())
        {
            tracing::debug!(hypothesis = %text, "partial without wake phrase ignored");
            return Vec::new();
        }
        tracing::info!(hypothesis = %text, "wake phrase detected");
        self.begin_dictation()
    }

    fn on_dictation_result(&mut self, text: Option<String>) -> Vec<Command> {
        if self.state != HandoffState::Transcribing {
            tracing::debug!(state = %self.state, "stale dictation result ignored");
            return Vec::new();
        }

        self.state = HandoffState::Idle {
            wake_listening: false,
        };
        self.session = None;

        self.next_token += 1;
        let token = RearmToken(self.next_token);
        self.rearm = Some(token);

        vec![
            Command::ReleaseDictation,
            Command::Notify(HandoffEvent::Result(text)),
            Command::ScheduleRearm {
                token,
                delay: self.rearm_delay,
            },
        ]
    }

    fn on_rearm(&mut self, token: RearmToken) -> Vec<Command> {
        if self.rearm != Some(token) {
            tracing::debug!(token = token.0, "stale re-arm ignored");
            return Vec::new();
        }
        self.rearm = None;
        if self.state
            != (HandoffState::Idle {
                wake_listening: false,
            })
        {
            tracing::debug!(state = %self.state, "re-arm outside idle ignored");
            return Vec::new();
        }
        self.start_wake()
    }

    fn start_wake(&mut self) -> Vec<Command> {
        self.state = HandoffState::Idle {
            wake_listening: true,
        };
        self.session = Some(RecognitionSession::active(EngineKind::Wake));
        vec![Command::StartWake]
    }

    fn begin_dictation(&mut self) -> Vec<Command> {
        let mut commands = Vec::with_capacity(3);
        if self.rearm.take().is_some() {
            commands.push(Command::CancelRearm);
        }
        commands.push(Command::CancelWake);
        commands.push(Command::StartDictation);

        self.state = HandoffState::Transcribing;
        self.session = Some(RecognitionSession::active(EngineKind::Dictation));
        commands
    }

    fn relay(&self, event: HandoffEvent) -> Vec<Command> {
        if self.state == HandoffState::Transcribing {
            vec![Command::Notify(event)]
        } else {
            tracing::debug!(state = %self.state, ?event, "dictation event outside transcription ignored");
            Vec::new()
        }
    }

    fn teardown(&mut self) -> Vec<Command> {
        if self.state.is_destroyed() {
            tracing::debug!("teardown repeated");
            return Vec::new();
        }

        let mut commands = Vec::with_capacity(4);
        if self.rearm.take().is_some() {
            commands.push(Command::CancelRearm);
        }
        commands.extend([
            Command::CancelWake,
            Command::CancelDictation,
            Command::ReleaseEngines,
        ]);

        self.state = HandoffState::Destroyed;
        self.session = None;
        commands
    }
}
