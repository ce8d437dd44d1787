//! High-level synthesis API
//!
//! # Example
//!
//! ```ignore
//! use ai_speech::{Announcer, Settings, SpeechConfig, SynthesisOptions};
//!
//! let config = SpeechConfig::load(None)?;
//! let mut announcer = Announcer::kokoro(Settings::new(), &config)?;
//! announcer
//!     .synthesize_to_file("Hello world", "out.wav".as_ref(), &SynthesisOptions::new(), None, None)
//!     .await?;
//! ```

use std::path::{Path, PathBuf};

use domain::{InputText, OutputFormat, SafePath, SampleRate, Speed};
use tracing::{debug, instrument};

use crate::audio::AudioWriter;
use crate::config::SpeechConfig;
use crate::error::SpeechError;
use crate::models::ModelStore;
use crate::pipeline::PipelineFactory;
use crate::types::{Settings, SynthesisOptions, SynthesisRequest, SynthesisResult, VoiceInput, Waveform};

/// Text-to-speech front end: validates input, runs the pipeline, writes files
#[derive(Debug)]
pub struct Announcer {
    factory: PipelineFactory,
    writer: AudioWriter,
    store: Option<ModelStore>,
}

impl Announcer {
    /// Assemble an announcer from its parts
    ///
    /// `store` is used to resolve voice names to local voice files; without
    /// one, names are passed to the engine unchanged.
    #[must_use]
    pub const fn new(factory: PipelineFactory, writer: AudioWriter, store: Option<ModelStore>) -> Self {
        Self {
            factory,
            writer,
            store,
        }
    }

    /// Announcer backed by the Kokoro engine and the configured model store
    pub fn kokoro(settings: Settings, config: &SpeechConfig) -> Result<Self, SpeechError> {
        config.validate().map_err(SpeechError::Configuration)?;
        Ok(Self::new(
            PipelineFactory::kokoro(settings, config)?,
            AudioWriter::new(config),
            Some(ModelStore::new(config)?),
        ))
    }

    /// Session settings
    #[must_use]
    pub const fn settings(&self) -> &Settings {
        self.factory.settings()
    }

    /// Drop the cached pipeline; the next call rebuilds it
    pub fn reset(&mut self) {
        self.factory.reset();
    }

    /// Synthesize `text` and return each segment's result in order
    ///
    /// Text and speed are validated before the pipeline is built.
    #[instrument(skip(self, text, options), fields(text_len = text.len()))]
    pub async fn synthesize_segments(
        &mut self,
        text: &str,
        options: &SynthesisOptions,
    ) -> Result<Vec<SynthesisResult>, SpeechError> {
        let text = InputText::new(text)?;
        let speed = match options.speed {
            Some(value) => Speed::new(value)?,
            None => self.settings().speed(),
        };

        let pipeline = self.factory.get().await?;

        let voice = options
            .voice
            .as_ref()
            .unwrap_or_else(|| self.settings().voice());
        let request = SynthesisRequest {
            text: text.into_inner(),
            voice: self.resolve_voice(voice),
            speed,
            split_pattern: options
                .split_pattern
                .clone()
                .unwrap_or_else(|| self.settings().split_pattern().clone()),
        };

        debug!(voice = %request.voice.label(), speed = speed.value(), "Running pipeline");
        pipeline.run(&request).await
    }

    /// Synthesize `text` into one waveform; no segments yields an empty waveform
    pub async fn synthesize(
        &mut self,
        text: &str,
        options: &SynthesisOptions,
    ) -> Result<Waveform, SpeechError> {
        let segments = self.synthesize_segments(text, options).await?;
        Ok(segments
            .into_iter()
            .flat_map(|segment| segment.audio)
            .collect())
    }

    /// Synthesize `text` and write it to `out`
    ///
    /// The output path, sample rate and format are validated before any
    /// synthesis happens. `sample_rate` defaults to the session rate and
    /// `format` to the one implied by the file extension.
    #[instrument(skip(self, text, options), fields(out = %out.display()))]
    pub async fn synthesize_to_file(
        &mut self,
        text: &str,
        out: &Path,
        options: &SynthesisOptions,
        sample_rate: Option<u32>,
        format: Option<&str>,
    ) -> Result<PathBuf, SpeechError> {
        let target = SafePath::output(out, "Output file")?;
        let sample_rate = match sample_rate {
            Some(rate) => SampleRate::new(rate)?,
            None => self.settings().sample_rate(),
        };
        let format = format.map(OutputFormat::parse).transpose()?;

        let waveform = self.synthesize(text, options).await?;
        self.writer
            .write(&waveform, target.as_path(), sample_rate, format)
            .await
    }

    /// Prefer a local voice file for bare voice names
    ///
    /// A name, or a bare `<name>.pt` file name, resolves to `voices/<name>.pt`
    /// when it is not itself an existing path, the local models are installed
    /// and that file exists. Anything else is returned unchanged.
    #[must_use]
    pub fn resolve_voice(&self, voice: &VoiceInput) -> VoiceInput {
        let Some(store) = &self.store else {
            return voice.clone();
        };
        let bare = match voice {
            VoiceInput::Name(name) => Some(Path::new(name.as_str())),
            VoiceInput::File(path) if path.file_name() == Some(path.as_os_str()) => {
                Some(path.as_path())
            },
            _ => None,
        };

        if let Some(bare) = bare.filter(|bare| !bare.exists()) {
            if store.models_exist() {
                let local = store.voice_path(&bare.to_string_lossy());
                if local.exists() {
                    return VoiceInput::File(local);
                }
            }
        }
        voice.clone()
    }
}
