//! Wake engine preparation
//!
//! Everything here does blocking filesystem work and runs on a
//! `spawn_blocking` worker, never on the runtime task.

use std::sync::Arc;

use crate::Result;
use crate::assets::{AssetSource, ModelPaths};
use crate::config::Config;
use crate::engine::{WakeEngineSetup, WakeEvents, WakeWordEngine, WakeWordEngineFactory};
use crate::keyphrase::KeyphraseSpec;

/// One preparation job, owning its own copy of the inputs
#[derive(Clone)]
pub struct Preparation {
    paths: ModelPaths,
    keyphrases: KeyphraseSpec,
    setup: WakeEngineSetup,
    search_name: String,
    wake_phrase: String,
    assets: Arc<dyn AssetSource>,
    factory: Arc<dyn WakeWordEngineFactory>,
}

impl std::fmt::Debug for Preparation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Preparation")
            .field("paths", &self.paths)
            .field("assets", &self.assets.describe())
            .field("search_name", &self.search_name)
            .field("wake_phrase", &self.wake_phrase)
            .finish_non_exhaustive()
    }
}

impl Preparation {
    /// Build a preparation job from configuration
    #[must_use]
    pub fn new(
        config: &Config,
        assets: Arc<dyn AssetSource>,
        factory: Arc<dyn WakeWordEngineFactory>,
    ) -> Self {
        let paths = config.model_paths();
        let setup = WakeEngineSetup::from_paths(
            &paths,
            config.wake.keyword_threshold,
            config.wake.remove_noise,
        );
        Self {
            paths,
            keyphrases: config.keyphrases.clone(),
            setup,
            search_name: config.wake.search_name.clone(),
            wake_phrase: config.wake.phrase.clone(),
            assets,
            factory,
        }
    }

    /// Resolved model layout
    #[must_use]
    pub const fn paths(&self) -> &ModelPaths {
        &self.paths
    }

    /// Materialize assets and construct a listening-ready wake engine
    ///
    /// # Errors
    ///
    /// Returns an asset error when model files cannot be copied or the
    /// dictionary cannot be written, and an engine configuration error when
    /// the engine rejects its setup or the keyphrase search
    pub fn run(&self, events: WakeEvents) -> Result<Box<dyn WakeWordEngine>> {
        let copied = self.assets.materialize(self.paths.acoustic_model())?;
        let written = self.keyphrases.write_to(self.paths.dictionary())?;
        self.paths.create_raw_log_dir()?;
        tracing::info!(
            base = %self.paths.base_dir().display(),
            copied,
            dictionary_written = written,
            "model assets ready"
        );

        let mut engine = self
            .factory
            .configure(&self.setup, &self.keyphrases, events)?;

        if let Err(e) = engine.add_keyphrase_search(&self.search_name, &self.wake_phrase) {
            engine.shutdown();
            return Err(e);
        }

        tracing::debug!(
            search = %self.search_name,
            phrase = %self.wake_phrase,
            threshold = self.setup.keyword_threshold,
            "keyphrase search registered"
        );
        Ok(engine)
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;
    use crate::Error;
    use crate::assets::DirAssetSource;
    use crate::engine::simulated::{Microphone, SimulatedWakeFactory};

    fn bundled(dir: &std::path::Path) -> Arc<dyn AssetSource> {
        let src = dir.join("bundled");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("mdef"), "mdef").unwrap();
        std::fs::write(src.join("means"), "means").unwrap();
        Arc::new(DirAssetSource::new(src))
    }

    fn config(dir: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.models.data_root = dir.join("data");
        config
    }

    #[test]
    fn test_prepare_materializes_and_configures() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let mic = Microphone::new();
        let job = Preparation::new(
            &config,
            bundled(dir.path()),
            Arc::new(SimulatedWakeFactory::new(mic)),
        );

        let (tx, _rx) = mpsc::unbounded_channel();
        let mut engine = job.run(WakeEvents::new(tx)).unwrap();

        let paths = job.paths();
        assert!(paths.acoustic_model().join("mdef").is_file());
        assert_eq!(
            std::fs::read_to_string(paths.dictionary()).unwrap(),
            "умный\tuu m n ay j\nдом\td oo m\n"
        );
        assert!(paths.raw_log_dir().is_dir());
        assert!(engine.start_listening("kws").is_ok());
        engine.shutdown();
    }

    #[test]
    fn test_prepare_twice_reuses_assets() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let assets = bundled(dir.path());
        let factory: Arc<dyn WakeWordEngineFactory> =
            Arc::new(SimulatedWakeFactory::new(Microphone::new()));
        let job = Preparation::new(&config, assets, factory);

        let (tx, _rx) = mpsc::unbounded_channel();
        job.run(WakeEvents::new(tx.clone())).unwrap().shutdown();
        job.run(WakeEvents::new(tx)).unwrap().shutdown();
    }

    #[test]
    fn test_missing_bundle_is_asset_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let job = Preparation::new(
            &config,
            Arc::new(DirAssetSource::new(dir.path().join("nowhere"))),
            Arc::new(SimulatedWakeFactory::new(Microphone::new())),
        );

        let (tx, _rx) = mpsc::unbounded_channel();
        let err = job.run(WakeEvents::new(tx)).err().unwrap();
        assert!(matches!(err, Error::Asset(_)));
    }

    #[test]
    fn test_unknown_phrase_word_is_engine_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.wake.phrase = "умный холодильник".to_string();
        let job = Preparation::new(
            &config,
            bundled(dir.path()),
            Arc::new(SimulatedWakeFactory::new(Microphone::new())),
        );

        let (tx, _rx) = mpsc::unbounded_channel();
        let err = job.run(WakeEvents::new(tx)).err().unwrap();
        assert!(matches!(err, Error::EngineConfig(_)));
    }
}
