//! Handoff runtime
//!
//! A single task drains the handoff queue, feeds every event through the
//! [`Coordinator`] and executes the returned commands against the engines.
//! Preparation is the only work that leaves the task; it runs on a blocking
//! worker and reports back through the same queue.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::coordinator::Coordinator;
use super::event::{Command, Event, HandoffEvent, RearmToken, StartupFailure};
use super::prepare::Preparation;
use super::slots::EngineSlots;
use super::state::HandoffState;
use crate::assets::{AssetSource, DirAssetSource};
use crate::config::Config;
use crate::engine::{
    DictationEngine, RecognitionSession, RecognizerFactory, WakeEvents, WakeWordEngineFactory,
};
use crate::{Error, Result};

/// Receiver for events surfaced to the caller
pub type HandoffEvents = mpsc::UnboundedReceiver<HandoffEvent>;

/// Observable handoff state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    /// Lifecycle state
    pub state: HandoffState,
    /// Active listening session, if any
    pub session: Option<RecognitionSession>,
    /// Whether a re-arm is scheduled
    pub rearm_pending: bool,
}

impl Snapshot {
    fn of(coordinator: &Coordinator) -> Self {
        Self {
            state: coordinator.state(),
            session: coordinator.session(),
            rearm_pending: coordinator.rearm_pending(),
        }
    }
}

/// Configuration for building a handoff runtime
pub struct HandoffBuilder {
    config: Config,
    assets: Option<Arc<dyn AssetSource>>,
    wake_factory: Arc<dyn WakeWordEngineFactory>,
    recognizer_factory: Arc<dyn RecognizerFactory>,
}

impl HandoffBuilder {
    /// Create a new handoff builder
    #[must_use]
    pub fn new(
        config: Config,
        wake_factory: Arc<dyn WakeWordEngineFactory>,
        recognizer_factory: Arc<dyn RecognizerFactory>,
    ) -> Self {
        Self {
            config,
            assets: None,
            wake_factory,
            recognizer_factory,
        }
    }

    /// Set where bundled acoustic model files come from
    ///
    /// Defaults to the configured bundled model directory.
    #[must_use]
    pub fn assets(mut self, assets: Arc<dyn AssetSource>) -> Self {
        self.assets = Some(assets);
        self
    }

    /// Build the runtime without starting it
    #[must_use]
    pub fn build(self) -> (Handoff, HandoffHandle, HandoffEvents) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let assets: Arc<dyn AssetSource> = match self.assets {
            Some(assets) => assets,
            None => Arc::new(DirAssetSource::new(self.config.models.bundled_dir.clone())),
        };
        let preparation = Preparation::new(&self.config, assets, self.wake_factory);

        let dictation = DictationEngine::new(
            self.recognizer_factory,
            self.config.dictation_request(),
            tx.clone(),
        );
        let slots = Arc::new(EngineSlots::new(dictation));

        let mut coordinator = Coordinator::new(self.config.wake.rearm_delay);
        if self.config.wake.strict_partial_match {
            coordinator = coordinator.with_required_phrase(&self.config.wake.phrase);
        }
        let (snapshot_tx, snapshot_rx) = watch::channel(Snapshot::of(&coordinator));

        let handle = HandoffHandle {
            tx: tx.clone(),
            slots: Arc::clone(&slots),
            snapshot: snapshot_rx,
            _lifeline: Arc::new(Lifeline { tx: tx.clone() }),
        };

        let handoff = Handoff {
            coordinator,
            rx,
            tx,
            slots,
            preparation,
            search_name: self.config.wake.search_name,
            events: events_tx,
            snapshot: snapshot_tx,
            rearm_timer: None,
        };

        (handoff, handle, events_rx)
    }

    /// Build the runtime and run it in a background task
    #[must_use]
    pub fn spawn(self) -> (HandoffHandle, HandoffEvents) {
        let (handoff, handle, events) = self.build();
        let _task = handoff.spawn();
        (handle, events)
    }
}

/// The runtime task state
pub struct Handoff {
    coordinator: Coordinator,
    rx: mpsc::UnboundedReceiver<Event>,
    tx: mpsc::UnboundedSender<Event>,
    slots: Arc<EngineSlots>,
    preparation: Preparation,
    search_name: String,
    events: mpsc::UnboundedSender<HandoffEvent>,
    snapshot: watch::Sender<Snapshot>,
    rearm_timer: Option<JoinHandle<()>>,
}

impl Handoff {
    /// Drain the queue until teardown
    pub async fn run(mut self) {
        tracing::info!(
            search = %self.search_name,
            model = %self.preparation.paths().base_dir().display(),
            "handoff runtime started"
        );

        while let Some(event) = self.rx.recv().await {
            self.dispatch(event);
            self.publish();

            if self.coordinator.state().is_destroyed() {
                break;
            }
        }

        self.cancel_rearm();
        self.slots.release_all();
        tracing::info!("handoff runtime stopped");
    }

    /// Run in a background task
    #[must_use]
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Reduce one queue event, feeding engine outcomes straight back in
    ///
    /// Outcomes are handled before the next queue event so no other event
    /// can observe a start the engine has not confirmed.
    fn dispatch(&mut self, event: Event) {
        let mut pending = VecDeque::from([event]);
        while let Some(event) = pending.pop_front() {
            tracing::trace!(?event, "handoff event");
            for command in self.coordinator.handle(event) {
                pending.extend(self.execute(command));
            }
        }
    }

    fn execute(&mut self, command: Command) -> Option<Event> {
        match command {
            Command::Prepare => self.spawn_preparation(),
            Command::StartWake => {
                match self
                    .slots
                    .with_wake(|wake| wake.start_listening(&self.search_name))
                {
                    Some(Ok(())) => {
                        tracing::debug!(search = %self.search_name, "wake listening");
                        return Some(Event::WakeStarted);
                    }
                    Some(Err(e)) => {
                        tracing::error!(error = %e, "wake listening failed to start");
                        return Some(Event::WakeStartFailed(StartupFailure::from(&e)));
                    }
                    None => tracing::debug!("no wake engine, start ignored"),
                }
            }
            Command::CancelWake => {
                let cancelled = self.slots.with_wake(|wake| {
                    wake.cancel();
                });
                if cancelled.is_none() {
                    tracing::debug!("no wake engine, cancel ignored");
                }
            }
            Command::StartDictation => {
                if self.slots.with_dictation(DictationEngine::start).is_none() {
                    tracing::debug!("dictation engine released, reporting absent result");
                    return Some(Event::DictationResult(None));
                }
            }
            Command::CancelDictation => {
                self.slots.with_dictation(DictationEngine::cancel);
            }
            Command::ReleaseDictation => {
                self.slots.with_dictation(DictationEngine::release);
            }
            Command::ScheduleRearm { token, delay } => self.schedule_rearm(token, delay),
            Command::CancelRearm => self.cancel_rearm(),
            Command::ReleaseEngines => {
                self.cancel_rearm();
                self.slots.release_all();
            }
            Command::Notify(event) => {
                if self.events.send(event).is_err() {
                    tracing::debug!("caller stopped listening for handoff events");
                }
            }
        }
        None
    }

    fn spawn_preparation(&self) {
        let job = self.preparation.clone();
        let slots = Arc::clone(&self.slots);
        let tx = self.tx.clone();

        tracing::info!("preparing wake engine");
        tokio::task::spawn_blocking(move || {
            let outcome = match job.run(WakeEvents::new(tx.clone())) {
                Ok(engine) => match slots.install_wake(engine) {
                    Ok(()) => Event::WakeReady,
                    Err(mut engine) => {
                        tracing::debug!("handoff torn down during preparation, discarding engine");
                        engine.shutdown();
                        return;
                    }
                },
                Err(e) => {
                    tracing::error!(error = %e, "wake engine preparation failed");
                    Event::WakeFailed(StartupFailure::from(&e))
                }
            };
            if tx.send(outcome).is_err() {
                tracing::debug!("handoff queue closed before preparation finished");
            }
        });
    }

    fn schedule_rearm(&mut self, token: RearmToken, delay: std::time::Duration) {
        self.cancel_rearm();
        let tx = self.tx.clone();
        self.rearm_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if tx.send(Event::RearmElapsed(token)).is_err() {
                tracing::debug!(token = token.0, "handoff stopped before re-arm fired");
            }
        }));
        tracing::debug!(?delay, "wake re-arm scheduled");
    }

    fn cancel_rearm(&mut self) {
        if let Some(timer) = self.rearm_timer.take() {
            timer.abort();
        }
    }

    fn publish(&self) {
        let next = Snapshot::of(&self.coordinator);
        self.snapshot.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}

/// Sends teardown when the last caller handle is dropped
struct Lifeline {
    tx: mpsc::UnboundedSender<Event>,
}

impl Drop for Lifeline {
    fn drop(&mut self) {
        if self.tx.send(Event::Teardown).is_ok() {
            tracing::debug!("last handoff handle dropped, tearing down");
        } else {
            tracing::debug!("last handoff handle dropped after runtime stopped");
        }
    }
}

/// Caller-side handle to a running handoff
///
/// Cheap to clone. Dropping the last clone tears the handoff down.
#[derive(Clone)]
pub struct HandoffHandle {
    tx: mpsc::UnboundedSender<Event>,
    slots: Arc<EngineSlots>,
    snapshot: watch::Receiver<Snapshot>,
    _lifeline: Arc<Lifeline>,
}

impl std::fmt::Debug for HandoffHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandoffHandle")
            .field("snapshot", &*self.snapshot.borrow())
            .finish_non_exhaustive()
    }
}

impl HandoffHandle {
    fn send(&self, event: Event) -> Result<()> {
        self.tx.send(event).map_err(|_| Error::Closed)
    }

    /// Prepare assets and the wake engine, then start wake listening
    ///
    /// Ignored unless the handoff is unprepared or failed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] if the runtime has stopped
    pub fn prepare(&self) -> Result<()> {
        self.send(Event::Prepare)
    }

    /// Lifecycle hook for a client binding; same as [`Self::prepare`]
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] if the runtime has stopped
    pub fn bind(&self) -> Result<()> {
        tracing::debug!("client bound");
        self.prepare()
    }

    /// Start dictation without waiting for the wake phrase
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] if the runtime has stopped
    pub fn request_dictation(&self) -> Result<()> {
        self.send(Event::RequestDictation)
    }

    /// Tear down both engines
    ///
    /// Repeated calls, including those after the runtime has stopped, do
    /// nothing.
    ///
    /// # Errors
    ///
    /// Never fails; the `Result` matches the other commands
    pub fn shutdown(&self) -> Result<()> {
        if self.tx.send(Event::Teardown).is_err() {
            tracing::debug!("handoff already torn down");
        }
        Ok(())
    }

    /// Lifecycle hook for the client going away
    ///
    /// Releases the dictation engine on the calling thread before queueing
    /// teardown. Like [`Self::shutdown`], harmless once torn down.
    ///
    /// # Errors
    ///
    /// Never fails; the `Result` matches the other commands
    pub fn unbind(&self) -> Result<()> {
        if self.slots.release_dictation() {
            tracing::debug!("dictation engine released on unbind");
        }
        self.shutdown()
    }

    /// Current state
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        *self.snapshot.borrow()
    }

    /// Subscribe to state changes
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<Snapshot> {
        self.snapshot.clone()
    }

    /// Wait until the state satisfies `predicate`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] if the runtime stops first
    pub async fn wait_for(
        &self,
        mut predicate: impl FnMut(&Snapshot) -> bool,
    ) -> Result<Snapshot> {
        let mut rx = self.snapshot.clone();
        let snapshot = rx
            .wait_for(&mut predicate)
            .await
            .map_err(|_| Error::Closed)?;
        Ok(*snapshot)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::engine::EngineKind;
    use crate::engine::simulated::{Microphone, SimulatedRecognizerFactory, SimulatedWakeFactory};
    use crate::engine::{WakeEngineSetup, WakeWordEngine};
    use crate::handoff::{FailureKind, Status};
    use crate::keyphrase::KeyphraseSpec;

    fn runtime(dir: &std::path::Path, mic: &Microphone) -> (HandoffHandle, HandoffEvents) {
        runtime_with(dir, mic, Arc::new(SimulatedWakeFactory::new(mic.clone())))
    }

    fn runtime_with(
        dir: &std::path::Path,
        mic: &Microphone,
        wake_factory: Arc<dyn WakeWordEngineFactory>,
    ) -> (HandoffHandle, HandoffEvents) {
        let bundled = dir.join("bundled");
        std::fs::create_dir_all(&bundled).unwrap();
        std::fs::write(bundled.join("mdef"), "mdef").unwrap();

        let mut config = Config::default();
        config.models.data_root = dir.join("data");
        config.models.bundled_dir = bundled;
        config.wake.rearm_delay = Duration::from_millis(10);

        HandoffBuilder::new(
            config,
            wake_factory,
            Arc::new(SimulatedRecognizerFactory::new(mic.clone())),
        )
        .spawn()
    }

    /// Spotter that loads fine but cannot open the audio source
    struct DeafWake;

    impl WakeWordEngine for DeafWake {
        fn add_keyphrase_search(&mut self, _name: &str, _phrase: &str) -> Result<()> {
            Ok(())
        }

        fn start_listening(&mut self, _search: &str) -> Result<()> {
            Err(Error::WakeWord("audio source unavailable".to_string()))
        }

        fn cancel(&mut self) {}

        fn is_listening(&self) -> bool {
            false
        }

        fn shutdown(&mut self) {}
    }

    struct DeafWakeFactory;

    impl WakeWordEngineFactory for DeafWakeFactory {
        fn configure(
            &self,
            _setup: &WakeEngineSetup,
            _keyphrases: &KeyphraseSpec,
            _events: WakeEvents,
        ) -> Result<Box<dyn WakeWordEngine>> {
            Ok(Box::new(DeafWake))
        }
    }

    #[tokio::test]
    async fn test_prepare_arms_wake() {
        let dir = tempfile::tempdir().unwrap();
        let mic = Microphone::new();
        let (handle, mut events) = runtime(dir.path(), &mic);

        handle.prepare().unwrap();
        let snapshot = handle
            .wait_for(|s| s.state.is_wake_listening())
            .await
            .unwrap();

        assert_eq!(
            snapshot.session,
            Some(RecognitionSession::active(EngineKind::Wake))
        );
        assert_eq!(events.recv().await, Some(HandoffEvent::Status(Status::Preparing)));
        assert_eq!(events.recv().await, Some(HandoffEvent::Status(Status::Ready)));
        assert_eq!(mic.holder(), Some(EngineKind::Wake));
    }

    #[tokio::test]
    async fn test_wake_start_failure_is_not_reported_ready() {
        let dir = tempfile::tempdir().unwrap();
        let mic = Microphone::new();
        let (handle, mut events) = runtime_with(dir.path(), &mic, Arc::new(DeafWakeFactory));

        handle.prepare().unwrap();
        let snapshot = handle
            .wait_for(|s| s.state == HandoffState::Error)
            .await
            .unwrap();
        assert_eq!(snapshot.session, None);

        assert_eq!(events.recv().await, Some(HandoffEvent::Status(Status::Preparing)));
        match events.recv().await {
            Some(HandoffEvent::Status(Status::Failed(failure))) => {
                assert_eq!(failure.kind, FailureKind::EngineConfig);
                assert!(failure.message.contains("audio source unavailable"));
            }
            other => panic!("expected startup failure, got {other:?}"),
        }
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dropping_last_handle_tears_down() {
        let dir = tempfile::tempdir().unwrap();
        let mic = Microphone::new();
        let (handle, _events) = runtime(dir.path(), &mic);

        handle.prepare().unwrap();
        handle
            .wait_for(|s| s.state.is_wake_listening())
            .await
            .unwrap();

        let mut watch = handle.watch();
        let clone = handle.clone();
        drop(handle);
        assert!(!watch.borrow().state.is_destroyed());

        drop(clone);
        let snapshot = watch.wait_for(|s| s.state.is_destroyed()).await.unwrap();
        assert_eq!(snapshot.session, None);
        assert_eq!(mic.holder(), None);
    }
}
