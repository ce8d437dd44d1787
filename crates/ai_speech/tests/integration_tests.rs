//! Integration tests for ai_speech crate
//!
//! Tests model downloads against a mocked hub and the synthesize-to-file flow
//! with a stub pipeline.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use ai_speech::models::REQUIRED_VOICE;
use ai_speech::{
    Announcer, AudioWriter, ModelStore, PipelineBuilder, PipelineFactory, RetryConfig, Settings,
    SpeechConfig, SpeechError, SpeechPipeline, SynthesisOptions, SynthesisRequest,
    SynthesisResult, VoiceInput,
};
use async_trait::async_trait;
use domain::{LanguageCode, VoiceName};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const REPO_PATH: &str = "/hexgrad/Kokoro-82M/resolve/main";

/// Create a test configuration pointing to mock server
fn test_config(hub: &str, models_dir: &Path) -> SpeechConfig {
    SpeechConfig {
        models_dir: Some(models_dir.to_path_buf()),
        hub_endpoint: hub.to_string(),
        download_timeout_ms: 5_000,
        fetch_retry: RetryConfig::new(3, 1),
        ..Default::default()
    }
}

async fn mock_file(server: &MockServer, file: &str, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path(format!("{REPO_PATH}/{file}")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .mount(server)
        .await;
}

// ============ Model download ============

#[tokio::test]
async fn ensure_required_downloads_missing_files() {
    let server = MockServer::start().await;
    mock_file(&server, "config.json", br#"{"n_token": 178}"#).await;
    mock_file(&server, "kokoro-v1_0.pth", &[7u8; 4096]).await;
    mock_file(&server, "voices/af_heart.pt", b"voice-tensor").await;

    let dir = TempDir::new().unwrap();
    let store = ModelStore::new(&test_config(&server.uri(), dir.path())).unwrap();
    assert!(!store.models_exist());

    store.ensure_required().await.unwrap();

    assert!(store.models_exist());
    assert_eq!(std::fs::read(&store.paths().weights).unwrap().len(), 4096);
    assert_eq!(
        std::fs::read(store.voice_path(REQUIRED_VOICE)).unwrap(),
        b"voice-tensor"
    );
    assert_eq!(store.available_voices(), vec!["af_heart"]);
}

#[tokio::test]
async fn ensure_required_skips_when_present() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let store = ModelStore::new(&test_config(&server.uri(), dir.path())).unwrap();
    let paths = store.paths();
    std::fs::create_dir_all(paths.config.parent().unwrap()).unwrap();
    std::fs::create_dir_all(&paths.voices_dir).unwrap();
    std::fs::write(&paths.config, "{}").unwrap();
    std::fs::write(&paths.weights, "w").unwrap();
    std::fs::write(paths.voice(REQUIRED_VOICE), "v").unwrap();

    store.ensure_required().await.unwrap();
}

#[tokio::test]
async fn download_retries_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{REPO_PATH}/config.json")))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    mock_file(&server, "config.json", b"{}").await;

    let dir = TempDir::new().unwrap();
    let store = ModelStore::new(&test_config(&server.uri(), dir.path())).unwrap();
    let dest = store.paths().config.clone();

    store.download_file("config.json", &dest).await.unwrap();

    assert_eq!(std::fs::read_to_string(&dest).unwrap(), "{}");
}

#[tokio::test]
async fn download_gives_up_after_max_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(4)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let store = ModelStore::new(&test_config(&server.uri(), dir.path())).unwrap();
    let dest = store.paths().config.clone();

    let err = store.download_file("config.json", &dest).await.unwrap_err();

    assert!(matches!(err, SpeechError::NetworkFetch { retryable: true, .. }));
    assert!(!dest.exists());
}

#[tokio::test]
async fn download_does_not_retry_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let store = ModelStore::new(&test_config(&server.uri(), dir.path())).unwrap();
    let dest = store.voice_path("xx_missing");

    let err = store.download_file("voices/xx_missing.pt", &dest).await.unwrap_err();

    assert!(err.to_string().contains("404"));
    assert!(!dest.exists());
    let leftovers: Vec<_> = std::fs::read_dir(&store.paths().voices_dir)
        .unwrap()
        .collect();
    assert!(leftovers.is_empty());
}

#[tokio::test]
async fn download_all_fetches_stock_catalogue() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"data".to_vec()))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let store = ModelStore::new(&test_config(&server.uri(), dir.path())).unwrap();

    let downloaded = store.download_all().await.unwrap();

    assert_eq!(downloaded, 34);
    assert_eq!(store.available_voices().len(), 32);
    assert!(store.models_exist());

    // A second run finds everything in place
    assert_eq!(store.download_all().await.unwrap(), 0);
}

// ============ Synthesis flow ============

/// Emits 0.1s of a constant tone per segment at 24 kHz
struct TonePipeline;

#[async_trait]
impl SpeechPipeline for TonePipeline {
    async fn run(&self, request: &SynthesisRequest) -> Result<Vec<SynthesisResult>, SpeechError> {
        Ok(request
            .segments()
            .into_iter()
            .map(|segment| SynthesisResult::new(segment, segment.to_lowercase(), vec![0.3; 2400]))
            .collect())
    }

    fn description(&self) -> String {
        "tone".to_string()
    }
}

struct ToneBuilder(Arc<AtomicUsize>);

#[async_trait]
impl PipelineBuilder for ToneBuilder {
    async fn build(&self, _settings: &Settings) -> Result<Arc<dyn SpeechPipeline>, SpeechError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(TonePipeline))
    }
}

fn tone_announcer(settings: Settings) -> (Announcer, Arc<AtomicUsize>) {
    let builds = Arc::new(AtomicUsize::new(0));
    let factory = PipelineFactory::new(settings, Box::new(ToneBuilder(Arc::clone(&builds))));
    (Announcer::new(factory, AudioWriter::default(), None), builds)
}

#[tokio::test]
async fn hello_world_to_wav() {
    let settings = Settings::new()
        .with_language(LanguageCode::AmericanEnglish)
        .with_voice(VoiceName::parse("af_heart").unwrap());
    let (mut announcer, _) = tone_announcer(settings);
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("out.wav");

    let written = announcer
        .synthesize_to_file("Hello world", &out, &SynthesisOptions::new(), None, None)
        .await
        .unwrap();

    assert!(written.ends_with("out.wav"));
    let reader = hound::WavReader::open(&written).unwrap();
    assert_eq!(reader.spec().sample_rate, 24000);
    assert!(reader.duration() > 0);
}

#[tokio::test]
async fn segments_carry_graphemes_and_phonemes() {
    let (mut announcer, _) = tone_announcer(Settings::new());

    let segments = announcer
        .synthesize_segments("One\nTwo", &SynthesisOptions::new())
        .await
        .unwrap();

    assert_eq!(segments.len(), 2);
    assert_eq!(segments[0].graphemes, "One");
    assert_eq!(segments[1].phonemes, "two");
}

#[tokio::test]
async fn empty_text_never_builds_pipeline() {
    let (mut announcer, builds) = tone_announcer(Settings::new());

    assert!(announcer.synthesize("", &SynthesisOptions::new()).await.is_err());
    assert!(announcer.synthesize("  \n ", &SynthesisOptions::new()).await.is_err());
    assert_eq!(builds.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn pipeline_reused_until_reset() {
    let (mut announcer, builds) = tone_announcer(Settings::new());
    let options = SynthesisOptions::new().with_voice(VoiceInput::Tensor(vec![0.0; 4]));

    announcer.synthesize("a", &options).await.unwrap();
    announcer.synthesize("b", &options).await.unwrap();
    assert_eq!(builds.load(Ordering::SeqCst), 1);

    announcer.reset();
    announcer.synthesize("c", &options).await.unwrap();
    assert_eq!(builds.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn traversal_output_rejected_before_write() {
    let (mut announcer, builds) = tone_announcer(Settings::new());

    let err = announcer
        .synthesize_to_file(
            "Hello",
            Path::new("../../../../../../../../etc/passwd"),
            &SynthesisOptions::new(),
            None,
            None,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, SpeechError::Validation(_)));
    assert_eq!(builds.load(Ordering::SeqCst), 0);
}

#[cfg(not(feature = "lame"))]
#[tokio::test]
async fn mp3_without_encoder_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let config = SpeechConfig {
        ffmpeg_path: dir.path().join("missing-ffmpeg"),
        ..Default::default()
    };
    let builds = Arc::new(AtomicUsize::new(0));
    let factory = PipelineFactory::new(Settings::new(), Box::new(ToneBuilder(Arc::clone(&builds))));
    let mut announcer = Announcer::new(factory, AudioWriter::new(&config), None);
    let out = dir.path().join("out.mp3");

    let err = announcer
        .synthesize_to_file("Hello", &out, &SynthesisOptions::new(), None, Some("mp3"))
        .await
        .unwrap_err();

    assert!(matches!(err, SpeechError::EncodingUnavailable(_)));
    assert!(!out.exists());
}
