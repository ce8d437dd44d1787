//! Configuration for speech synthesis and model management

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::retry::RetryConfig;

/// Name of the optional configuration file looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "kokoro-announce.toml";

/// Prefix of environment variable overrides (`KOKORO_ANNOUNCE_FFMPEG_PATH`, ...)
pub const ENV_PREFIX: &str = "KOKORO_ANNOUNCE";

/// Remote repository holding the Kokoro weights and voices
pub const DEFAULT_REPO_ID: &str = "hexgrad/Kokoro-82M";

/// Configuration for the speech services
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechConfig {
    /// Root of the local model store (default: `models/` next to the executable)
    #[serde(default)]
    pub models_dir: Option<PathBuf>,

    /// Remote repository to fetch model files from
    #[serde(default = "default_repo_id")]
    pub repo_id: String,

    /// Base URL of the model hub
    #[serde(default = "default_hub_endpoint")]
    pub hub_endpoint: String,

    /// Inference engine executable
    #[serde(default = "default_engine_path")]
    pub engine_path: PathBuf,

    /// Extra environment variables passed to the engine process
    #[serde(default)]
    pub engine_env: BTreeMap<String, String>,

    /// FFmpeg executable used for MP3 encoding
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// MP3 bitrate in kbps
    #[serde(default = "default_mp3_bitrate")]
    pub mp3_bitrate: u32,

    /// Timeout for the encoder availability probe in milliseconds
    #[serde(default = "default_encoder_probe_timeout_ms")]
    pub encoder_probe_timeout_ms: u64,

    /// Timeout for a single MP3 encode in milliseconds
    #[serde(default = "default_encoder_timeout_ms")]
    pub encoder_timeout_ms: u64,

    /// Timeout for a single model file download in milliseconds
    #[serde(default = "default_download_timeout_ms")]
    pub download_timeout_ms: u64,

    /// Retry policy for model downloads
    #[serde(default)]
    pub fetch_retry: RetryConfig,
}

fn default_repo_id() -> String {
    DEFAULT_REPO_ID.to_string()
}

fn default_hub_endpoint() -> String {
    "https://huggingface.co".to_string()
}

fn default_engine_path() -> PathBuf {
    PathBuf::from("kokoro-engine")
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

const fn default_mp3_bitrate() -> u32 {
    192
}

const fn default_encoder_probe_timeout_ms() -> u64 {
    5_000
}

const fn default_encoder_timeout_ms() -> u64 {
    300_000 // 5 minutes
}

const fn default_download_timeout_ms() -> u64 {
    600_000 // 10 minutes, the weights are ~300MB
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            models_dir: None,
            repo_id: default_repo_id(),
            hub_endpoint: default_hub_endpoint(),
            engine_path: default_engine_path(),
            engine_env: BTreeMap::new(),
            ffmpeg_path: default_ffmpeg_path(),
            mp3_bitrate: default_mp3_bitrate(),
            encoder_probe_timeout_ms: default_encoder_probe_timeout_ms(),
            encoder_timeout_ms: default_encoder_timeout_ms(),
            download_timeout_ms: default_download_timeout_ms(),
            fetch_retry: RetryConfig::default(),
        }
    }
}

impl SpeechConfig {
    /// Load configuration from defaults, an optional file and the environment
    ///
    /// Without an explicit `path`, `kokoro-announce.toml` in the working
    /// directory is used when present. Environment variables override both,
    /// e.g. `KOKORO_ANNOUNCE_FFMPEG_PATH` or `KOKORO_ANNOUNCE_FETCH_RETRY__MAX_RETRIES`.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(CONFIG_FILE_NAME).required(false),
        };

        let builder = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.repo_id.trim().is_empty() {
            return Err("Repository id must not be empty".to_string());
        }

        if !(self.hub_endpoint.starts_with("http://") || self.hub_endpoint.starts_with("https://"))
        {
            return Err(format!(
                "Hub endpoint must be an http(s) URL, got '{}'",
                self.hub_endpoint
            ));
        }

        if self.mp3_bitrate == 0 {
            return Err("MP3 bitrate must be greater than 0".to_string());
        }

        if self.encoder_probe_timeout_ms == 0 || self.encoder_timeout_ms == 0 {
            return Err("Encoder timeouts must be greater than 0".to_string());
        }

        if self.download_timeout_ms == 0 {
            return Err("Download timeout must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Effective models directory
    ///
    /// Falls back to `models/` next to the executable, or `./models` when the
    /// executable location is unknown.
    #[must_use]
    pub fn models_dir(&self) -> PathBuf {
        self.models_dir.clone().unwrap_or_else(|| {
            domain::bundle_dir().map_or_else(|| PathBuf::from("models"), |dir| dir.join("models"))
        })
    }
}
