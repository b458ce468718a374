//! Handoff states
//!
//! ```text
//! Unprepared ─prepare─▶ Preparing ─ready─▶ Idle ─trigger─▶ Transcribing
//!                          │  ▲              ▲                 │
//!                        fail │              └─────result──────┘
//!                          ▼  │ prepare
//!                          Error
//!
//! any ─teardown─▶ Destroyed
//! ```

use std::fmt;

/// Where the handoff is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandoffState {
    /// Nothing prepared yet
    Unprepared,
    /// Assets and wake engine being prepared on a worker
    Preparing,
    /// Between dictations
    Idle {
        /// Whether the spotter is listening (false while a re-arm is pending)
        wake_listening: bool,
    },
    /// A dictation attempt is running
    Transcribing,
    /// Preparation failed
    Error,
    /// Torn down
    Destroyed,
}

impl fmt::Display for HandoffState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unprepared => write!(f, "Unprepared"),
            Self::Preparing => write!(f, "Preparing"),
            Self::Idle {
                wake_listening: true,
            } => write!(f, "Idle(WakeListening)"),
            Self::Idle {
                wake_listening: false,
            } => write!(f, "Idle(Rearming)"),
            Self::Transcribing => write!(f, "Transcribing"),
            Self::Error => write!(f, "Error"),
            Self::Destroyed => write!(f, "Destroyed"),
        }
    }
}

impl HandoffState {
    /// Whether `prepare` starts a new preparation from here
    #[must_use]
    pub const fn accepts_prepare(&self) -> bool {
        matches!(self, Self::Unprepared | Self::Error)
    }

    /// Whether a dictation can be triggered from here
    #[must_use]
    pub const fn accepts_trigger(&self) -> bool {
        matches!(self, Self::Idle { .. })
    }

    /// Whether the spotter is expected to be listening
    #[must_use]
    pub const fn is_wake_listening(&self) -> bool {
        matches!(
            self,
            Self::Idle {
                wake_listening: true
            }
        )
    }

    /// Whether the handoff has been torn down
    #[must_use]
    pub const fn is_destroyed(&self) -> bool {
        matches!(self, Self::Destroyed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display() {
        assert_eq!(HandoffState::Unprepared.to_string(), "Unprepared");
        assert_eq!(
            HandoffState::Idle {
                wake_listening: true
            }
            .to_string(),
            "Idle(WakeListening)"
        );
        assert_eq!(
            HandoffState::Idle {
                wake_listening: false
            }
            .to_string(),
            "Idle(Rearming)"
        );
        assert_eq!(HandoffState::Destroyed.to_string(), "Destroyed");
    }

    #[test]
    fn test_prepare_accepted_only_before_start_or_after_failure() {
        assert!(HandoffState::Unprepared.accepts_prepare());
        assert!(HandoffState::Error.accepts_prepare());
        assert!(!HandoffState::Preparing.accepts_prepare());
        assert!(!HandoffState::Transcribing.accepts_prepare());
        assert!(!HandoffState::Destroyed.accepts_prepare());
        assert!(
            !HandoffState::Idle {
                wake_listening: true
            }
            .accepts_prepare()
        );
    }

    #[test]
    fn test_trigger_accepted_only_when_idle() {
        assert!(
            HandoffState::Idle {
                wake_listening: false
            }
            .accepts_trigger()
        );
        assert!(!HandoffState::Transcribing.accepts_trigger());
        assert!(!HandoffState::Preparing.accepts_trigger());
        assert!(!HandoffState::Error.accepts_trigger());
    }
}
