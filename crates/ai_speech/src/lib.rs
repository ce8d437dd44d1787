//! AI Speech - Kokoro text-to-speech synthesis
//!
//! Provides the synthesis pipeline and everything around it:
//! - `Announcer` - validate input, synthesize, write audio files
//! - `PipelineFactory` - lazily build and cache the engine handle
//! - `ModelStore` - local model layout and on-demand download
//! - `AudioWriter` - WAV output, MP3 through ffmpeg or LAME
//!
//! # Architecture
//!
//! This crate follows the ports & adapters pattern:
//! - `ports` module defines the traits (ports)
//! - `providers` module contains the Kokoro engine adapter
//!
//! # Example
//!
//! ```ignore
//! use ai_speech::{Announcer, Settings, SpeechConfig, SynthesisOptions};
//!
//! let config = SpeechConfig::load(None)?;
//! let mut announcer = Announcer::kokoro(Settings::new(), &config)?;
//!
//! let waveform = announcer.synthesize("Hello world", &SynthesisOptions::new()).await?;
//! println!("{} samples", waveform.len());
//! ```

pub mod announcer;
pub mod audio;
pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod ports;
pub mod providers;
pub mod retry;
pub mod types;

pub use announcer::Announcer;
pub use audio::AudioWriter;
pub use config::SpeechConfig;
pub use error::SpeechError;
pub use models::{ModelInfo, ModelPaths, ModelStore};
pub use pipeline::{KokoroPipelineBuilder, PipelineFactory};
pub use ports::{PipelineBuilder, SpeechPipeline};
pub use providers::{KokoroEngine, ModelSource};
pub use retry::{RetryConfig, Retryable};
pub use types::{
    Settings, SynthesisOptions, SynthesisRequest, SynthesisResult, VoiceInput, Waveform,
};
