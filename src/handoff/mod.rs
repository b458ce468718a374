//! Wake phrase to dictation handoff
//!
//! The spotter and the dictation recognizer share one microphone and must
//! never listen at the same time. Everything that can change which engine
//! listens arrives as an [`Event`] on a single queue; the [`Coordinator`]
//! turns each event into [`Command`]s and the [`Handoff`] runtime executes
//! them. Wake listening is always cancelled before dictation starts, and it
//! resumes a short, cancellable delay after each dictation result.

mod coordinator;
mod event;
mod prepare;
mod runtime;
mod slots;
mod state;

pub use coordinator::Coordinator;
pub use event::{Command, Event, FailureKind, HandoffEvent, RearmToken, StartupFailure, Status};
pub use prepare::Preparation;
pub use runtime::{Handoff, HandoffBuilder, HandoffEvents, HandoffHandle, Snapshot};
pub use slots::EngineSlots;
pub use state::HandoffState;
