//! Lazy pipeline construction
//!
//! [`PipelineFactory`] owns at most one pipeline handle. The first
//! [`get`](PipelineFactory::get) builds it; later calls hand out the same
//! handle until [`reset`](PipelineFactory::reset) drops it, for example after
//! a device change. Construction prefers local model files and fetches them
//! when missing; if the fetch fails the engine streams from the hub instead.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use crate::config::SpeechConfig;
use crate::error::SpeechError;
use crate::models::ModelStore;
use crate::ports::{PipelineBuilder, SpeechPipeline};
use crate::providers::{KokoroEngine, ModelSource};
use crate::types::Settings;

/// Owner of the lazily built pipeline handle
pub struct PipelineFactory {
    settings: Settings,
    builder: Box<dyn PipelineBuilder>,
    pipeline: Option<Arc<dyn SpeechPipeline>>,
}

impl fmt::Debug for PipelineFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineFactory")
            .field("settings", &self.settings)
            .field("initialized", &self.is_initialized())
            .finish_non_exhaustive()
    }
}

impl PipelineFactory {
    /// Create a factory; nothing is built until the first `get`
    #[must_use]
    pub fn new(settings: Settings, builder: Box<dyn PipelineBuilder>) -> Self {
        Self {
            settings,
            builder,
            pipeline: None,
        }
    }

    /// Factory building Kokoro engine pipelines from `config`
    pub fn kokoro(settings: Settings, config: &SpeechConfig) -> Result<Self, SpeechError> {
        Ok(Self::new(
            settings,
            Box::new(KokoroPipelineBuilder::new(config)?),
        ))
    }

    /// Session settings pipelines are built with
    #[must_use]
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The cached pipeline, building it on first use
    pub async fn get(&mut self) -> Result<Arc<dyn SpeechPipeline>, SpeechError> {
        if let Some(pipeline) = &self.pipeline {
            return Ok(Arc::clone(pipeline));
        }

        let pipeline = self.builder.build(&self.settings).await?;
        info!(pipeline = %pipeline.description(), "Pipeline ready");
        self.pipeline = Some(Arc::clone(&pipeline));
        Ok(pipeline)
    }

    /// Drop the cached pipeline so the next `get` rebuilds it
    pub fn reset(&mut self) {
        if self.pipeline.take().is_some() {
            debug!("Pipeline reset");
        }
    }

    /// Whether a pipeline is currently cached
    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.pipeline.is_some()
    }
}

/// Builds [`KokoroEngine`] pipelines, preferring local model files
#[derive(Debug, Clone)]
pub struct KokoroPipelineBuilder {
    config: SpeechConfig,
    store: ModelStore,
}

impl KokoroPipelineBuilder {
    /// Create a builder using the model store described by `config`
    pub fn new(config: &SpeechConfig) -> Result<Self, SpeechError> {
        Ok(Self {
            config: config.clone(),
            store: ModelStore::new(config)?,
        })
    }

    /// The model store consulted during construction
    #[must_use]
    pub const fn store(&self) -> &ModelStore {
        &self.store
    }

    /// Make sure local files are present, fetching them if needed
    ///
    /// Returns whether local files can be used. Certificate failures are
    /// returned as errors since the remote fallback would hit them again.
    async fn prepare_local(&self) -> Result<bool, SpeechError> {
        if self.store.models_exist() {
            return Ok(true);
        }

        match self.store.ensure_required().await {
            Ok(()) => Ok(true),
            Err(err @ SpeechError::Certificate { .. }) => Err(err),
            Err(err) => {
                warn!(error = %err, "Model download failed, using remote model");
                Ok(false)
            },
        }
    }

    fn local_source(&self) -> Result<ModelSource, SpeechError> {
        let paths = self.store.paths();
        for path in [&paths.config, &paths.weights] {
            if !path.exists() {
                return Err(SpeechError::ModelFileNotFound(path.clone()));
            }
        }
        Ok(ModelSource::Local {
            config: paths.config.clone(),
            weights: paths.weights.clone(),
        })
    }
}

#[async_trait]
impl PipelineBuilder for KokoroPipelineBuilder {
    #[instrument(skip(self, settings), fields(lang = %settings.language().code()))]
    async fn build(&self, settings: &Settings) -> Result<Arc<dyn SpeechPipeline>, SpeechError> {
        let source = if self.prepare_local().await? {
            self.local_source()?
        } else {
            ModelSource::Remote {
                repo_id: self.store.repo_id().to_string(),
            }
        };

        debug!(source = ?source, device = ?settings.device(), "Building Kokoro pipeline");
        Ok(Arc::new(KokoroEngine::new(
            &self.config,
            settings.language(),
            settings.device(),
            source,
        )))
    }
}
