//! Types for speech synthesis
//!
//! Session settings, per-call options, and the request/result records that
//! flow through a `SpeechPipeline`.

use std::path::PathBuf;
use std::sync::LazyLock;

use domain::{Device, LanguageCode, SampleRate, Speed, VoiceName};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Mono audio samples in `[-1.0, 1.0]`
pub type Waveform = Vec<f32>;

/// Default split pattern: one segment per run of newlines
pub const DEFAULT_SPLIT_PATTERN: &str = r"\n+";

#[allow(clippy::expect_used)]
static DEFAULT_SPLIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(DEFAULT_SPLIT_PATTERN).expect("default split pattern is valid"));

/// Voice to condition synthesis on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceInput {
    /// A named voice, resolved by the engine or the local model store
    Name(VoiceName),
    /// A voice tensor file on disk
    File(PathBuf),
    /// A voice tensor already in memory
    Tensor(Vec<f32>),
}

impl VoiceInput {
    /// Interpret a validated voice: `.pt` paths become files, the rest names
    #[must_use]
    pub fn from_name(voice: VoiceName) -> Self {
        if voice.is_voice_file() {
            Self::File(PathBuf::from(voice.as_str()))
        } else {
            Self::Name(voice)
        }
    }

    /// Short label for logs and user output
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Name(name) => name.to_string(),
            Self::File(path) => path.display().to_string(),
            Self::Tensor(values) => format!("<tensor: {} values>", values.len()),
        }
    }
}

impl Default for VoiceInput {
    fn default() -> Self {
        Self::Name(VoiceName::default())
    }
}

impl From<VoiceName> for VoiceInput {
    fn from(voice: VoiceName) -> Self {
        Self::from_name(voice)
    }
}

/// Immutable session settings
///
/// Built once per session. Per-call overrides go through
/// [`SynthesisOptions`] instead of mutating the settings.
#[derive(Debug, Clone)]
pub struct Settings {
    language: LanguageCode,
    voice: VoiceInput,
    speed: Speed,
    split_pattern: Regex,
    sample_rate: SampleRate,
    device: Option<Device>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            language: LanguageCode::default(),
            voice: VoiceInput::default(),
            speed: Speed::default(),
            split_pattern: DEFAULT_SPLIT.clone(),
            sample_rate: SampleRate::default(),
            device: None,
        }
    }
}

impl Settings {
    /// Settings with all defaults (`a`, `af_heart`, 1.0x, `\n+`, 24000 Hz, auto device)
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the language
    #[must_use]
    pub fn with_language(mut self, language: LanguageCode) -> Self {
        self.language = language;
        self
    }

    /// Set the default voice
    #[must_use]
    pub fn with_voice(mut self, voice: impl Into<VoiceInput>) -> Self {
        self.voice = voice.into();
        self
    }

    /// Set the default speed
    #[must_use]
    pub fn with_speed(mut self, speed: Speed) -> Self {
        self.speed = speed;
        self
    }

    /// Set the segment split pattern
    #[must_use]
    pub fn with_split_pattern(mut self, pattern: Regex) -> Self {
        self.split_pattern = pattern;
        self
    }

    /// Set the default output sample rate
    #[must_use]
    pub fn with_sample_rate(mut self, sample_rate: SampleRate) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Set the compute device (`None` lets the engine pick)
    #[must_use]
    pub fn with_device(mut self, device: Option<Device>) -> Self {
        self.device = device;
        self
    }

    /// Language the pipeline is built for
    #[must_use]
    pub const fn language(&self) -> LanguageCode {
        self.language
    }

    /// Default voice
    #[must_use]
    pub const fn voice(&self) -> &VoiceInput {
        &self.voice
    }

    /// Default speed
    #[must_use]
    pub const fn speed(&self) -> Speed {
        self.speed
    }

    /// Segment split pattern
    #[must_use]
    pub const fn split_pattern(&self) -> &Regex {
        &self.split_pattern
    }

    /// Default output sample rate
    #[must_use]
    pub const fn sample_rate(&self) -> SampleRate {
        self.sample_rate
    }

    /// Requested compute device, if any
    #[must_use]
    pub const fn device(&self) -> Option<Device> {
        self.device
    }
}

/// Per-call overrides of the session settings
#[derive(Debug, Clone, Default)]
pub struct SynthesisOptions {
    /// Voice to use instead of the session voice
    pub voice: Option<VoiceInput>,
    /// Speed to use instead of the session speed (validated at call time)
    pub speed: Option<f32>,
    /// Split pattern to use instead of the session pattern
    pub split_pattern: Option<Regex>,
}

impl SynthesisOptions {
    /// No overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the voice
    #[must_use]
    pub fn with_voice(mut self, voice: impl Into<VoiceInput>) -> Self {
        self.voice = Some(voice.into());
        self
    }

    /// Override the speed
    #[must_use]
    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = Some(speed);
        self
    }

    /// Override the split pattern
    #[must_use]
    pub fn with_split_pattern(mut self, pattern: Regex) -> Self {
        self.split_pattern = Some(pattern);
        self
    }
}

/// A fully resolved request handed to a pipeline
#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    /// Validated input text
    pub text: String,
    /// Resolved voice
    pub voice: VoiceInput,
    /// Validated speed
    pub speed: Speed,
    /// Pattern separating independently synthesized segments
    pub split_pattern: Regex,
}

impl SynthesisRequest {
    /// Text segments in order, trimmed, with empty pieces dropped
    #[must_use]
    pub fn segments(&self) -> Vec<&str> {
        self.split_pattern
            .split(&self.text)
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .collect()
    }
}

/// Output of one synthesized text segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisResult {
    /// Text the segment was produced from
    pub graphemes: String,
    /// Phoneme string the engine pronounced
    pub phonemes: String,
    /// Mono samples at the model's native rate
    pub audio: Waveform,
}

impl SynthesisResult {
    /// Create a segment result
    #[must_use]
    pub fn new(graphemes: impl Into<String>, phonemes: impl Into<String>, audio: Waveform) -> Self {
        Self {
            graphemes: graphemes.into(),
            phonemes: phonemes.into(),
            audio,
        }
    }
}
