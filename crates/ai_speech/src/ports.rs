//! Port definitions for speech synthesis
//!
//! The inference engine is opaque to this crate: anything that turns text
//! segments into audio implements [`SpeechPipeline`], and a
//! [`PipelineBuilder`] knows how to construct one for a set of session
//! settings.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::SpeechError;
use crate::types::{Settings, SynthesisRequest, SynthesisResult};

/// Port for a constructed text-to-speech pipeline
///
/// # Example
///
/// ```ignore
/// use ai_speech::{SpeechPipeline, SynthesisRequest};
///
/// async fn total_samples(
///     pipeline: &dyn SpeechPipeline,
///     request: &SynthesisRequest,
/// ) -> Result<usize, SpeechError> {
///     let segments = pipeline.run(request).await?;
///     Ok(segments.iter().map(|s| s.audio.len()).sum())
/// }
/// ```
#[async_trait]
pub trait SpeechPipeline: Send + Sync {
    /// Synthesize every segment of the request, in order
    ///
    /// # Errors
    ///
    /// Returns `SpeechError` if the engine fails or returns malformed output.
    async fn run(&self, request: &SynthesisRequest) -> Result<Vec<SynthesisResult>, SpeechError>;

    /// Human-readable description of the loaded model
    fn description(&self) -> String;
}

/// Port for constructing pipelines
#[async_trait]
pub trait PipelineBuilder: Send + Sync {
    /// Build a pipeline for the given session settings
    ///
    /// # Errors
    ///
    /// Returns `SpeechError` if model files are missing or cannot be fetched.
    async fn build(&self, settings: &Settings) -> Result<Arc<dyn SpeechPipeline>, SpeechError>;
}
