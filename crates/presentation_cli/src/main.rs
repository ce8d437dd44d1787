//! kokoro-announce
//!
//! Offline text-to-speech from the command line using Kokoro-82M.

#![allow(clippy::print_stdout, clippy::print_stderr)]

mod listing;
mod request;

use std::path::PathBuf;
use std::process::ExitCode;

use ai_speech::{Announcer, ModelStore, Settings, SpeechConfig, SpeechError, SynthesisOptions};
use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::request::{SynthesisJob, validate_args};

/// Characters of input shown before synthesis starts
const PREVIEW_CHARS: usize = 50;

/// Kokoro TTS - high-quality offline text-to-speech synthesis
#[allow(clippy::struct_excessive_bools)]
#[derive(Parser, Debug)]
#[command(name = "kokoro-announce")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "Examples:
  kokoro-announce --text \"Hello world\" --out hello.wav
  kokoro-announce --text-file script.txt --voice am_adam --speed 1.2
  kokoro-announce --text \"Bonjour\" --lang f --voice ff_siwis --out french.mp3
  kokoro-announce --list-voices")]
pub struct Cli {
    /// Text to synthesize
    #[arg(short, long, conflicts_with = "text_file")]
    pub text: Option<String>,

    /// Read text from a UTF-8 file
    #[arg(short = 'f', long)]
    pub text_file: Option<PathBuf>,

    /// Output file path
    #[arg(short, long, default_value = "output.wav")]
    pub out: PathBuf,

    /// Output format: wav or mp3 (default: inferred from --out extension)
    #[arg(long)]
    pub format: Option<String>,

    /// Audio sample rate in Hz: 8000, 16000, 22050, 24000, 44100 or 48000
    #[arg(short = 'r', long, default_value_t = 24000)]
    pub sample_rate: u32,

    /// Voice name, or a path to a .pt voice file
    #[arg(short, long, default_value = "af_heart")]
    pub voice: String,

    /// Language code: a=American, b=British, e=Spanish, f=French
    #[arg(short, long, default_value = "a")]
    pub lang: String,

    /// Playback speed, 0.25 to 4.0
    #[arg(short, long, default_value_t = 1.0, allow_negative_numbers = true)]
    pub speed: f32,

    /// Compute device: cpu, cuda, cuda:N or mps (default: auto)
    #[arg(short, long)]
    pub device: Option<String>,

    /// List installed voices
    #[arg(long)]
    pub list_voices: bool,

    /// List supported languages
    #[arg(long)]
    pub list_languages: bool,

    /// Show the status of the local model files
    #[arg(long)]
    pub model_info: bool,

    /// Download the model and every stock voice
    #[arg(long)]
    pub download_models: bool,

    /// Configuration file (default: ./kokoro-announce.toml if present)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Verbosity level; also prints the full error chain
    #[arg(long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    const fn is_informational(&self) -> bool {
        self.list_voices || self.list_languages || self.model_info || self.download_models
    }
}

/// Determine log filter level from verbosity count
const fn log_filter_from_verbosity(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn init_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_filter_from_verbosity(verbose)));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(&err, cli.verbose > 0);
            ExitCode::FAILURE
        },
    }
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    if cli.is_informational() {
        return run_informational(cli).await;
    }

    let job = validate_args(cli)?;
    let config = load_config(cli)?;
    synthesize(&job, &config, cli.verbose > 0).await
}

fn load_config(cli: &Cli) -> anyhow::Result<SpeechConfig> {
    SpeechConfig::load(cli.config.as_deref()).context("Failed to load configuration")
}

async fn run_informational(cli: &Cli) -> anyhow::Result<()> {
    if cli.list_languages {
        println!("{}", listing::languages_table());
    }

    if !(cli.list_voices || cli.model_info || cli.download_models) {
        return Ok(());
    }

    let config = load_config(cli)?;
    let store = ModelStore::new(&config)?;

    if cli.download_models {
        println!("Downloading {} into {}", store.repo_id(), config.models_dir().display());
        let fetched = store.download_all().await?;
        println!("Downloaded {fetched} file(s)");
    }
    if cli.list_voices {
        println!("{}", listing::list_voices(&store));
    }
    if cli.model_info {
        println!("{}", listing::model_info(&store)?);
    }
    Ok(())
}

async fn synthesize(job: &SynthesisJob, config: &SpeechConfig, verbose: bool) -> anyhow::Result<()> {
    println!("Synthesizing: '{}'", job.text.preview(PREVIEW_CHARS));
    if verbose {
        println!("  Voice: {}", job.voice.as_str());
        println!("  Language: {}", job.language.name());
        println!("  Speed: {}x", job.speed.value());
        println!("  Sample rate: {} Hz", job.sample_rate.value());
        println!("  Format: {}", job.format.extension().to_uppercase());
        println!("  Output: {}", job.out.display());
    }

    let settings = Settings::new()
        .with_language(job.language)
        .with_voice(job.voice.clone())
        .with_speed(job.speed)
        .with_sample_rate(job.sample_rate)
        .with_device(job.device);
    let mut announcer = Announcer::kokoro(settings, config)?;

    let written = announcer
        .synthesize_to_file(
            job.text.as_str(),
            &job.out,
            &SynthesisOptions::new(),
            Some(job.sample_rate.value()),
            Some(job.format.extension()),
        )
        .await?;

    println!("Wrote {}", written.display());
    Ok(())
}

/// Render a failure: one `[ERROR]` line, remediation hints, and the cause chain when verbose
fn report(err: &anyhow::Error, verbose: bool) {
    eprintln!("[ERROR] {err}");

    if let Some(hint) = err
        .downcast_ref::<SpeechError>()
        .and_then(SpeechError::remediation)
    {
        eprintln!("{hint}");
    }

    if verbose {
        for cause in err.chain().skip(1) {
            eprintln!("  caused by: {cause}");
        }
    }
}
