//! Kokoro engine adapter
//!
//! Implements `SpeechPipeline` by driving an external Kokoro inference engine
//! as a child process, one process per synthesis call.
//!
//! # Protocol
//!
//! Arguments: `--lang <code>`, then either `--config <config.json> --model
//! <weights>` for local files or `--repo-id <repo>` to let the engine fetch
//! from the hub, plus `--device <device>` when one was requested.
//!
//! stdin receives one JSON document:
//!
//! ```json
//! {"segments": ["Hello world"], "voice": {"name": "af_heart"}, "speed": 1.0}
//! ```
//!
//! stdout yields one JSON object per synthesized segment, in order:
//!
//! ```json
//! {"graphemes": "Hello world", "phonemes": "həlˈoʊ wˈɜɹld", "audio": "<base64 f32le>"}
//! ```

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use domain::{Device, LanguageCode};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, error, instrument};

use crate::config::SpeechConfig;
use crate::error::SpeechError;
use crate::ports::SpeechPipeline;
use crate::types::{SynthesisRequest, SynthesisResult, VoiceInput};

/// Where the engine loads the model from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    /// Local configuration and weights files
    Local {
        /// `config.json`
        config: PathBuf,
        /// `kokoro-v1_0.pth`
        weights: PathBuf,
    },
    /// Stream from the remote repository
    Remote {
        /// Repository id such as `hexgrad/Kokoro-82M`
        repo_id: String,
    },
}

/// Kokoro pipeline backed by an engine subprocess
#[derive(Debug, Clone)]
pub struct KokoroEngine {
    executable: PathBuf,
    env: BTreeMap<String, String>,
    language: LanguageCode,
    device: Option<Device>,
    source: ModelSource,
}

#[derive(Serialize)]
struct EngineRequest<'a> {
    segments: Vec<&'a str>,
    voice: &'a VoiceInput,
    speed: f32,
}

#[derive(Deserialize)]
struct EngineFrame {
    graphemes: String,
    phonemes: String,
    audio: String,
}

impl KokoroEngine {
    /// Create an engine handle bound to a language, device and model source
    #[must_use]
    pub fn new(
        config: &SpeechConfig,
        language: LanguageCode,
        device: Option<Device>,
        source: ModelSource,
    ) -> Self {
        Self {
            executable: config.engine_path.clone(),
            env: config.engine_env.clone(),
            language,
            device,
            source,
        }
    }

    /// Model source this engine was built with
    #[must_use]
    pub const fn source(&self) -> &ModelSource {
        &self.source
    }

    /// Command-line arguments passed to the engine
    #[must_use]
    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["--lang".into(), self.language.code().into()];
        match &self.source {
            ModelSource::Local { config, weights } => {
                args.extend([
                    "--config".into(),
                    config.as_os_str().to_owned(),
                    "--model".into(),
                    weights.as_os_str().to_owned(),
                ]);
            },
            ModelSource::Remote { repo_id } => {
                args.extend(["--repo-id".into(), repo_id.into()]);
            },
        }
        if let Some(device) = self.device {
            args.extend(["--device".into(), device.to_string().into()]);
        }
        args
    }

    #[instrument(skip(self, payload), fields(engine = %self.executable.display(), bytes = payload.len()))]
    async fn run_engine(&self, payload: &[u8]) -> Result<Vec<u8>, SpeechError> {
        let mut cmd = Command::new(&self.executable);
        cmd.args(self.args())
            .envs(&self.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("Running engine: {:?}", cmd);

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SpeechError::NotAvailable(format!(
                    "Kokoro engine not found at '{}'. Install it or set engine_path.",
                    self.executable.display()
                ))
            } else {
                SpeechError::Synthesis(format!("Failed to start engine: {e}"))
            }
        })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(payload).await.map_err(|e| {
                SpeechError::Synthesis(format!("Failed to write to engine stdin: {e}"))
            })?;
            // stdin is dropped here, closing it
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| SpeechError::Synthesis(format!("Failed to wait for engine: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!("Engine failed: {}", stderr.trim());
            return Err(SpeechError::Synthesis(format!(
                "Engine exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(output.stdout)
    }
}

#[async_trait]
impl SpeechPipeline for KokoroEngine {
    #[instrument(skip(self, request), fields(voice = %request.voice.label(), speed = request.speed.value()))]
    async fn run(&self, request: &SynthesisRequest) -> Result<Vec<SynthesisResult>, SpeechError> {
        let segments = request.segments();
        if segments.is_empty() {
            return Ok(Vec::new());
        }

        let payload = serde_json::to_vec(&EngineRequest {
            segments,
            voice: &request.voice,
            speed: request.speed.value(),
        })
        .map_err(|e| SpeechError::Synthesis(format!("Failed to encode request: {e}")))?;

        let stdout = self.run_engine(&payload).await?;
        let results = decode_frames(&stdout)?;
        debug!(segments = results.len(), "Engine finished");
        Ok(results)
    }

    fn description(&self) -> String {
        match &self.source {
            ModelSource::Local { weights, .. } => {
                format!("Kokoro-82M (local: {})", weights.display())
            },
            ModelSource::Remote { repo_id } => format!("Kokoro-82M (remote: {repo_id})"),
        }
    }
}

/// Parse the engine's line-delimited JSON output
pub fn decode_frames(stdout: &[u8]) -> Result<Vec<SynthesisResult>, SpeechError> {
    let text = std::str::from_utf8(stdout)
        .map_err(|e| SpeechError::InvalidResponse(format!("Engine output is not UTF-8: {e}")))?;

    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(index, line)| {
            let frame: EngineFrame = serde_json::from_str(line).map_err(|e| {
                SpeechError::InvalidResponse(format!("Malformed engine frame {index}: {e}"))
            })?;
            Ok(SynthesisResult {
                audio: decode_audio(&frame.audio)?,
                graphemes: frame.graphemes,
                phonemes: frame.phonemes,
            })
        })
        .collect()
}

/// Decode base64 little-endian `f32` samples
pub fn decode_audio(encoded: &str) -> Result<Vec<f32>, SpeechError> {
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| SpeechError::InvalidResponse(format!("Invalid audio encoding: {e}")))?;

    if bytes.len() % 4 != 0 {
        return Err(SpeechError::InvalidResponse(format!(
            "Audio length {} is not a multiple of 4 bytes",
            bytes.len()
        )));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}
