//! Engine ownership
//!
//! The runtime is the only owner of live engines. They sit behind one lock
//! because `unbind` releases dictation from the caller's thread and the
//! preparation worker installs the wake engine from a blocking thread.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::engine::{DictationEngine, WakeWordEngine};

struct Slots {
    wake: Option<Box<dyn WakeWordEngine>>,
    dictation: Option<DictationEngine>,
    closed: bool,
}

/// At most one live wake engine and one live dictation engine
pub struct EngineSlots {
    inner: Mutex<Slots>,
}

impl std::fmt::Debug for EngineSlots {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slots = self.lock();
        f.debug_struct("EngineSlots")
            .field("wake", &slots.wake.is_some())
            .field("dictation", &slots.dictation)
            .field("closed", &slots.closed)
            .finish()
    }
}

impl EngineSlots {
    /// Slots holding `dictation` and no wake engine yet
    #[must_use]
    pub fn new(dictation: DictationEngine) -> Self {
        Self {
            inner: Mutex::new(Slots {
                wake: None,
                dictation: Some(dictation),
                closed: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Install a freshly configured wake engine
    ///
    /// A previous engine is shut down first. After [`Self::release_all`] the
    /// slots refuse new engines and hand them back to the caller.
    ///
    /// # Errors
    ///
    /// Returns the engine unchanged when the slots are closed
    pub fn install_wake(
        &self,
        engine: Box<dyn WakeWordEngine>,
    ) -> std::result::Result<(), Box<dyn WakeWordEngine>> {
        let mut slots = self.lock();
        if slots.closed {
            return Err(engine);
        }
        if let Some(mut old) = slots.wake.replace(engine) {
            tracing::debug!("replacing previous wake engine");
            old.shutdown();
        }
        Ok(())
    }

    /// Run `f` against the wake engine, if one is installed
    pub fn with_wake<R>(&self, f: impl FnOnce(&mut dyn WakeWordEngine) -> R) -> Option<R> {
        let mut slots = self.lock();
        slots.wake.as_mut().map(|wake| f(wake.as_mut()))
    }

    /// Run `f` against the dictation engine, if it has not been released
    pub fn with_dictation<R>(&self, f: impl FnOnce(&mut DictationEngine) -> R) -> Option<R> {
        let mut slots = self.lock();
        slots.dictation.as_mut().map(f)
    }

    /// Shut down and drop the dictation engine
    ///
    /// Returns whether an engine was released.
    pub fn release_dictation(&self) -> bool {
        let engine = self.lock().dictation.take();
        engine.is_some_and(|mut engine| {
            engine.shutdown();
            true
        })
    }

    /// Shut down both engines and refuse further installs
    pub fn release_all(&self) {
        let (wake, dictation) = {
            let mut slots = self.lock();
            slots.closed = true;
            (slots.wake.take(), slots.dictation.take())
        };
        if let Some(mut wake) = wake {
            tracing::debug!("shutting down wake engine");
            wake.shutdown();
        }
        if let Some(mut dictation) = dictation {
            tracing::debug!("shutting down dictation engine");
            dictation.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::sync::mpsc;

    use super::*;
    use crate::Result;
    use crate::engine::{DictationRequest, RecognitionListener, Recognizer, RecognizerFactory};

    struct CountingWake {
        shutdowns: Arc<AtomicUsize>,
        listening: bool,
    }

    impl WakeWordEngine for CountingWake {
        fn add_keyphrase_search(&mut self, _name: &str, _phrase: &str) -> Result<()> {
            Ok(())
        }

        fn start_listening(&mut self, _search: &str) -> Result<()> {
            self.listening = true;
            Ok(())
        }

        fn cancel(&mut self) {
            self.listening = false;
        }

        fn is_listening(&self) -> bool {
            self.listening
        }

        fn shutdown(&mut self) {
            self.listening = false;
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct NoRecognizer;

    impl RecognizerFactory for NoRecognizer {
        fn create(&self, _listener: RecognitionListener) -> Result<Box<dyn Recognizer>> {
            Err(crate::Error::Recognition("unavailable".to_string()))
        }
    }

    fn slots() -> EngineSlots {
        let (tx, _rx) = mpsc::unbounded_channel();
        EngineSlots::new(DictationEngine::new(
            Arc::new(NoRecognizer),
            DictationRequest::free_form("com.example"),
            tx,
        ))
    }

    fn wake(shutdowns: &Arc<AtomicUsize>) -> Box<dyn WakeWordEngine> {
        Box::new(CountingWake {
            shutdowns: Arc::clone(shutdowns),
            listening: false,
        })
    }

    #[test]
    fn test_absent_engine_is_noop() {
        let slots = slots();
        assert!(slots.with_wake(|w| w.start_listening("kws")).is_none());
        assert!(slots.with_wake(|w| w.is_listening()).is_none());
    }

    #[test]
    fn test_install_replaces_and_shuts_down_previous() {
        let shutdowns = Arc::new(AtomicUsize::new(0));
        let slots = slots();
        assert!(slots.install_wake(wake(&shutdowns)).is_ok());
        assert!(slots.install_wake(wake(&shutdowns)).is_ok());
        assert_eq!(shutdowns.load(Ordering::SeqCst), 1);

        slots.with_wake(|w| w.start_listening("kws")).unwrap().unwrap();
        assert_eq!(slots.with_wake(|w| w.is_listening()), Some(true));
    }

    #[test]
    fn test_closed_slots_refuse_install() {
        let shutdowns = Arc::new(AtomicUsize::new(0));
        let slots = slots();
        slots.install_wake(wake(&shutdowns)).ok();

        slots.release_all();
        assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
        assert!(slots.with_dictation(|d| d.is_started()).is_none());

        let refused = slots.install_wake(wake(&shutdowns));
        assert!(refused.is_err());
        assert!(slots.with_wake(|w| w.is_listening()).is_none());

        slots.release_all();
        assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_release_dictation_once() {
        let slots = slots();
        assert!(slots.release_dictation());
        assert!(!slots.release_dictation());
        assert_eq!(slots.with_dictation(|d| d.is_started()), None);
    }
}
