//! Local model store
//!
//! Layout under the models directory:
//!
//! ```text
//! models/
//! ├── kokoro-82m/
//! │   ├── config.json
//! │   └── kokoro-v1_0.pth
//! └── voices/
//!     └── <voice>.pt
//! ```
//!
//! Missing files are fetched from the model hub as
//! `<endpoint>/<repo>/resolve/main/<file>`. Each download streams into
//! `<dest>.download.tmp` and is renamed into place once complete.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use domain::{STOCK_VOICES, VOICE_FILE_EXTENSION};
use reqwest::StatusCode;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

use crate::config::SpeechConfig;
use crate::error::SpeechError;
use crate::retry::{RetryConfig, with_retry};

/// Directory holding the base model files
pub const MODEL_DIR_NAME: &str = "kokoro-82m";
/// Model configuration file
pub const CONFIG_FILE: &str = "config.json";
/// Model weights file
pub const WEIGHTS_FILE: &str = "kokoro-v1_0.pth";
/// Directory holding voice tensors (same name locally and in the repository)
pub const VOICES_DIR_NAME: &str = "voices";
/// Voice that must be present for the local model to count as installed
pub const REQUIRED_VOICE: &str = "af_heart";

const DOWNLOAD_SUFFIX: &str = ".download.tmp";

/// Paths of the files in a models directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPaths {
    /// Root of the store
    pub models_dir: PathBuf,
    /// `kokoro-82m/config.json`
    pub config: PathBuf,
    /// `kokoro-82m/kokoro-v1_0.pth`
    pub weights: PathBuf,
    /// `voices/`
    pub voices_dir: PathBuf,
}

impl ModelPaths {
    /// Lay out paths under `models_dir`
    #[must_use]
    pub fn new(models_dir: impl Into<PathBuf>) -> Self {
        let models_dir = models_dir.into();
        let model_dir = models_dir.join(MODEL_DIR_NAME);
        Self {
            config: model_dir.join(CONFIG_FILE),
            weights: model_dir.join(WEIGHTS_FILE),
            voices_dir: models_dir.join(VOICES_DIR_NAME),
            models_dir,
        }
    }

    /// Path of a voice file; `.pt` is appended when missing
    #[must_use]
    pub fn voice(&self, name: &str) -> PathBuf {
        if Path::new(name)
            .extension()
            .is_some_and(|ext| ext == VOICE_FILE_EXTENSION)
        {
            self.voices_dir.join(name)
        } else {
            self.voices_dir.join(format!("{name}.{VOICE_FILE_EXTENSION}"))
        }
    }

    /// Files that must exist for local synthesis
    #[must_use]
    pub fn required_files(&self) -> [PathBuf; 3] {
        [
            self.config.clone(),
            self.weights.clone(),
            self.voice(REQUIRED_VOICE),
        ]
    }

    /// Whether every required file exists
    #[must_use]
    pub fn models_exist(&self) -> bool {
        self.required_files().iter().all(|path| path.exists())
    }
}

/// Status of one model file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileInfo {
    /// Where the file is expected
    pub path: PathBuf,
    /// Whether it exists
    pub exists: bool,
    /// Size in MB rounded to two decimals, when it exists
    pub size_mb: Option<f64>,
}

impl FileInfo {
    fn probe(path: &Path) -> Self {
        let size_mb = std::fs::metadata(path).ok().map(|meta| megabytes(meta.len()));
        Self {
            path: path.to_path_buf(),
            exists: size_mb.is_some(),
            size_mb,
        }
    }
}

/// Inventory of the local model store
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo {
    /// Model configuration file
    pub config: FileInfo,
    /// Model weights
    pub model: FileInfo,
    /// Installed voice names, sorted
    pub available_voices: Vec<String>,
}

/// Local model store with on-demand download
#[derive(Debug, Clone)]
pub struct ModelStore {
    paths: ModelPaths,
    client: reqwest::Client,
    repo_id: String,
    hub_endpoint: String,
    retry: RetryConfig,
}

impl ModelStore {
    /// Create a store rooted at the configured models directory
    pub fn new(config: &SpeechConfig) -> Result<Self, SpeechError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.download_timeout_ms))
            .user_agent(concat!("kokoro-announce/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SpeechError::Configuration(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            paths: ModelPaths::new(config.models_dir()),
            client,
            repo_id: config.repo_id.clone(),
            hub_endpoint: config.hub_endpoint.trim_end_matches('/').to_string(),
            retry: config.fetch_retry.clone(),
        })
    }

    /// File layout of this store
    #[must_use]
    pub const fn paths(&self) -> &ModelPaths {
        &self.paths
    }

    /// Remote repository files are fetched from
    #[must_use]
    pub fn repo_id(&self) -> &str {
        &self.repo_id
    }

    /// Local path of a voice file
    #[must_use]
    pub fn voice_path(&self, name: &str) -> PathBuf {
        self.paths.voice(name)
    }

    /// Whether every required file exists locally
    #[must_use]
    pub fn models_exist(&self) -> bool {
        self.paths.models_exist()
    }

    /// Names of installed voices, sorted
    #[must_use]
    pub fn available_voices(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.paths.voices_dir) else {
            return Vec::new();
        };

        let mut voices: Vec<String> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path
                        .extension()
                        .is_some_and(|ext| ext == VOICE_FILE_EXTENSION)
            })
            .filter_map(|path| {
                path.file_stem()
                    .and_then(|stem| stem.to_str())
                    .map(str::to_string)
            })
            .collect();
        voices.sort();
        voices
    }

    /// Existence and size of the model files plus the installed voices
    #[must_use]
    pub fn info(&self) -> ModelInfo {
        ModelInfo {
            config: FileInfo::probe(&self.paths.config),
            model: FileInfo::probe(&self.paths.weights),
            available_voices: self.available_voices(),
        }
    }

    /// URL of a file in the remote repository
    #[must_use]
    pub fn file_url(&self, file: &str) -> String {
        format!("{}/{}/resolve/main/{file}", self.hub_endpoint, self.repo_id)
    }

    /// Fetch the files required for local synthesis, skipping present ones
    #[instrument(skip(self), fields(models_dir = %self.paths.models_dir.display()))]
    pub async fn ensure_required(&self) -> Result<(), SpeechError> {
        if self.models_exist() {
            debug!("Local models already present");
            return Ok(());
        }

        info!("Downloading Kokoro model files (~313 MB)");
        self.fetch_base_model().await?;
        self.fetch_voice(REQUIRED_VOICE).await?;
        info!("Models downloaded");
        Ok(())
    }

    /// Fetch the base model and the full stock voice catalogue
    ///
    /// Returns the number of files downloaded; files already present are kept.
    #[instrument(skip(self), fields(models_dir = %self.paths.models_dir.display()))]
    pub async fn download_all(&self) -> Result<usize, SpeechError> {
        let mut downloaded = self.fetch_base_model().await?;

        let total = STOCK_VOICES.len();
        for (index, (voice, group)) in STOCK_VOICES.iter().enumerate() {
            info!(voice, group, "[{}/{total}] {voice}.pt", index + 1);
            if self.fetch_voice(voice).await? {
                downloaded += 1;
            }
        }

        if !self.voice_path(REQUIRED_VOICE).exists() {
            return Err(SpeechError::ModelFileNotFound(self.voice_path(REQUIRED_VOICE)));
        }

        info!(downloaded, voices = total, "Model download complete");
        Ok(downloaded)
    }

    async fn fetch_base_model(&self) -> Result<usize, SpeechError> {
        let mut downloaded = 0;
        for (file, dest) in [
            (CONFIG_FILE, &self.paths.config),
            (WEIGHTS_FILE, &self.paths.weights),
        ] {
            if self.fetch_missing(file, dest).await? {
                downloaded += 1;
            }
        }
        Ok(downloaded)
    }

    async fn fetch_voice(&self, voice: &str) -> Result<bool, SpeechError> {
        let remote = format!("{VOICES_DIR_NAME}/{voice}.{VOICE_FILE_EXTENSION}");
        self.fetch_missing(&remote, &self.voice_path(voice)).await
    }

    async fn fetch_missing(&self, file: &str, dest: &Path) -> Result<bool, SpeechError> {
        if dest.exists() {
            debug!(file, "Already present, skipping");
            return Ok(false);
        }
        self.download_file(file, dest).await?;
        Ok(true)
    }

    /// Download one repository file to `dest`, retrying transient failures
    #[instrument(skip(self, dest), fields(dest = %dest.display()))]
    pub async fn download_file(&self, file: &str, dest: &Path) -> Result<(), SpeechError> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let outcome = with_retry(&self.retry, || self.download_once(file, dest)).await;
        debug!(
            file,
            attempts = outcome.attempts,
            elapsed_ms = u64::try_from(outcome.total_duration.as_millis()).unwrap_or(u64::MAX),
            ok = outcome.result.is_ok(),
            "Download finished"
        );
        outcome.into_result()
    }

    async fn download_once(&self, file: &str, dest: &Path) -> Result<(), SpeechError> {
        let url = self.file_url(file);
        debug!(url = %url, "Fetching");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.request_error(file, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SpeechError::NetworkFetch {
                repo: self.repo_id.clone(),
                file: file.to_string(),
                reason: format!("HTTP {status}"),
                retryable: status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS,
            });
        }

        let temp_path = download_temp_path(dest);
        let result = self.stream_to(response, file, &temp_path, dest).await;
        if result.is_err() {
            if let Err(e) = tokio::fs::remove_file(&temp_path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %temp_path.display(), error = %e, "Failed to remove partial download");
                }
            }
        }
        result
    }

    async fn stream_to(
        &self,
        mut response: reqwest::Response,
        file: &str,
        temp_path: &Path,
        dest: &Path,
    ) -> Result<(), SpeechError> {
        let mut out = tokio::fs::File::create(temp_path).await?;
        let mut bytes = 0u64;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| self.request_error(file, &e))?
        {
            out.write_all(&chunk).await?;
            bytes += chunk.len() as u64;
        }
        out.flush().await?;
        drop(out);

        tokio::fs::rename(temp_path, dest).await?;
        debug!(file, bytes, "Saved");
        Ok(())
    }

    fn request_error(&self, file: &str, err: &reqwest::Error) -> SpeechError {
        let reason = error_chain(err);
        if is_certificate_error(err) {
            SpeechError::Certificate {
                repo: self.repo_id.clone(),
                file: file.to_string(),
                reason,
            }
        } else {
            SpeechError::NetworkFetch {
                repo: self.repo_id.clone(),
                file: file.to_string(),
                reason,
                retryable: err.is_connect() || err.is_timeout() || err.is_body(),
            }
        }
    }
}

fn download_temp_path(dest: &Path) -> PathBuf {
    let mut name = OsString::from(dest.as_os_str());
    name.push(DOWNLOAD_SUFFIX);
    PathBuf::from(name)
}

/// Whether any error in the source chain is a TLS certificate failure
fn is_certificate_error(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        let message = e.to_string().to_lowercase();
        if message.contains("certificate") || message.contains("unknownissuer") {
            return true;
        }
        current = e.source();
    }
    false
}

fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut current = err.source();
    while let Some(e) = current {
        message.push_str(": ");
        message.push_str(&e.to_string());
        current = e.source();
    }
    message
}

#[allow(clippy::cast_precision_loss)]
fn megabytes(bytes: u64) -> f64 {
    (bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(dir: &Path) -> ModelStore {
        ModelStore::new(&SpeechConfig {
            models_dir: Some(dir.to_path_buf()),
            ..Default::default()
        })
        .unwrap()
    }

    fn install(paths: &ModelPaths) {
        std::fs::create_dir_all(paths.config.parent().unwrap()).unwrap();
        std::fs::create_dir_all(&paths.voices_dir).unwrap();
        std::fs::write(&paths.config, "{}").unwrap();
        std::fs::write(&paths.weights, vec![0u8; 1024 * 1024]).unwrap();
        std::fs::write(paths.voice(REQUIRED_VOICE), b"voice").unwrap();
    }

    #[test]
    fn layout() {
        let paths = ModelPaths::new("/opt/models");
        assert_eq!(paths.config, PathBuf::from("/opt/models/kokoro-82m/config.json"));
        assert_eq!(paths.weights, PathBuf::from("/opt/models/kokoro-82m/kokoro-v1_0.pth"));
        assert_eq!(paths.voices_dir, PathBuf::from("/opt/models/voices"));
    }

    #[test]
    fn voice_path_appends_extension_once() {
        let paths = ModelPaths::new("m");
        assert_eq!(paths.voice("af_heart"), PathBuf::from("m/voices/af_heart.pt"));
        assert_eq!(paths.voice("af_heart.pt"), PathBuf::from("m/voices/af_heart.pt"));
    }

    #[test]
    fn models_exist_requires_all_files() {
        let dir = TempDir::new().unwrap();
        let store = store_in(dir.path());
        assert!(!store.models_exist());

        install(store.paths());
        assert!(store.models_exist());

        std::fs::remove_file(store.voice_path(REQUIRED_VOICE)).unwrap();
        assert!(!store.models_exist());
    }

    #[test]
    fn available_voices_sorted_pt_stems() {
        let dir = TempDir::new().unwrap();
        let store = store_in(dir.path());
        let voices = &store.paths().voices_dir;
        std::fs::create_dir_all(voices).unwrap();
        for name in ["bm_lewis.pt", "af_heart.pt", "notes.txt", "am_adam.pt"] {
            std::fs::write(voices.join(name), b"x").unwrap();
        }

        assert_eq!(store.available_voices(), vec!["af_heart", "am_adam", "bm_lewis"]);
    }

    #[test]
    fn available_voices_empty_without_dir() {
        let dir = TempDir::new().unwrap();
        assert!(store_in(dir.path()).available_voices().is_empty());
    }

    #[test]
    fn info_reports_sizes() {
        let dir = TempDir::new().unwrap();
        let store = store_in(dir.path());

        let missing = store.info();
        assert!(!missing.config.exists);
        assert_eq!(missing.model.size_mb, None);

        install(store.paths());
        let info = store.info();
        assert!(info.model.exists);
        assert_eq!(info.model.size_mb, Some(1.0));
        assert_eq!(info.config.size_mb, Some(0.0));
        assert_eq!(info.available_voices, vec!["af_heart"]);
    }

    #[test]
    fn file_url_format() {
        let store = ModelStore::new(&SpeechConfig {
            hub_endpoint: "https://mirror.example.com/".into(),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(
            store.file_url("voices/af_heart.pt"),
            "https://mirror.example.com/hexgrad/Kokoro-82M/resolve/main/voices/af_heart.pt"
        );
    }

    #[test]
    fn temp_path_keeps_full_name() {
        assert_eq!(
            download_temp_path(Path::new("m/kokoro-82m/kokoro-v1_0.pth")),
            PathBuf::from("m/kokoro-82m/kokoro-v1_0.pth.download.tmp")
        );
    }

    #[test]
    fn megabytes_rounds_to_two_decimals() {
        assert!((megabytes(1_572_864) - 1.5).abs() < f64::EPSILON);
        assert!((megabytes(328_204_000) - 313.0).abs() < 0.01);
    }

    #[derive(Debug)]
    struct Wrapped(&'static str, Option<Box<Wrapped>>);

    impl std::fmt::Display for Wrapped {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(self.0)
        }
    }

    impl std::error::Error for Wrapped {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            self.1.as_deref().map(|e| e as &(dyn std::error::Error + 'static))
        }
    }

    #[test]
    fn certificate_errors_detected_through_chain() {
        let err = Wrapped(
            "error sending request",
            Some(Box::new(Wrapped("invalid peer certificate: UnknownIssuer", None))),
        );
        assert!(is_certificate_error(&err));
        assert_eq!(
            error_chain(&err),
            "error sending request: invalid peer certificate: UnknownIssuer"
        );

        let plain = Wrapped("connection refused", None);
        assert!(!is_certificate_error(&plain));
    }
}
