//! Shared test utilities

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use wakeword_handoff::engine::simulated::{
    Microphone, SimulatedRecognizerFactory, SimulatedWakeFactory,
};
use wakeword_handoff::{
    Config, HandoffBuilder, HandoffEvent, HandoffEvents, HandoffHandle, HandoffState, Snapshot,
};

/// How long a test waits for an event before failing
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Temporary model directories plus a shared simulated microphone
pub struct Fixture {
    pub dir: TempDir,
    pub mic: Microphone,
    pub config: Config,
}

impl Fixture {
    /// Fixture with a bundled acoustic model in place
    #[must_use]
    pub fn new() -> Self {
        let fixture = Self::without_bundle();
        fixture.install_bundle();
        fixture
    }

    /// Fixture whose bundled model directory does not exist yet
    #[must_use]
    pub fn without_bundle() -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");

        let mut config = Config::default();
        config.models.data_root = dir.path().join("data");
        config.models.bundled_dir = dir.path().join("bundled");

        Self {
            dir,
            mic: Microphone::new(),
            config,
        }
    }

    /// Write the bundled acoustic model files
    pub fn install_bundle(&self) {
        let bundled = self.bundled_dir();
        std::fs::create_dir_all(&bundled).expect("failed to create bundle dir");
        for name in ["feat.params", "mdef", "means", "variances"] {
            std::fs::write(bundled.join(name), name).expect("failed to write bundle file");
        }
    }

    #[must_use]
    pub fn bundled_dir(&self) -> PathBuf {
        self.config.models.bundled_dir.clone()
    }

    /// Start a handoff on the simulated engines
    #[must_use]
    pub fn spawn(&self) -> (HandoffHandle, HandoffEvents) {
        HandoffBuilder::new(
            self.config.clone(),
            Arc::new(SimulatedWakeFactory::new(self.mic.clone())),
            Arc::new(SimulatedRecognizerFactory::new(self.mic.clone())),
        )
        .spawn()
    }
}

/// Receive the next caller event or fail
pub async fn next_event(events: &mut HandoffEvents) -> HandoffEvent {
    tokio::time::timeout(EVENT_TIMEOUT, events.recv())
        .await
        .expect("timed out waiting for handoff event")
        .expect("handoff event stream closed")
}

/// Receive events until `expected` arrives, returning everything seen before it
pub async fn events_until(events: &mut HandoffEvents, expected: &HandoffEvent) -> Vec<HandoffEvent> {
    let mut seen = Vec::new();
    loop {
        let event = next_event(events).await;
        if &event == expected {
            return seen;
        }
        seen.push(event);
    }
}

/// Wait until the handoff reaches `state`
pub async fn wait_state(handle: &HandoffHandle, state: HandoffState) -> Snapshot {
    tokio::time::timeout(EVENT_TIMEOUT, handle.wait_for(|s| s.state == state))
        .await
        .expect("timed out waiting for handoff state")
        .expect("handoff stopped")
}

pub const WAKE_LISTENING: HandoffState = HandoffState::Idle {
    wake_listening: true,
};

pub const REARMING: HandoffState = HandoffState::Idle {
    wake_listening: false,
};
