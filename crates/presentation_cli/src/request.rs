//! Argument validation
//!
//! Turns raw command-line values into a [`SynthesisJob`]. Checks run in a
//! fixed order (voice, language, speed, device, sample rate, format, text,
//! output path) so the first problem reported is predictable.

use std::path::{Path, PathBuf};

use domain::{
    Device, DomainError, InputText, LanguageCode, OutputFormat, SafePath, SampleRate, Speed,
    VoiceName,
};

use crate::Cli;

/// Everything needed for one synthesis run, already validated
#[derive(Debug, Clone)]
pub struct SynthesisJob {
    pub text: InputText,
    pub out: PathBuf,
    pub format: OutputFormat,
    pub sample_rate: SampleRate,
    pub voice: VoiceName,
    pub language: LanguageCode,
    pub speed: Speed,
    pub device: Option<Device>,
}

/// Validate the synthesis arguments of `cli`
pub fn validate_args(cli: &Cli) -> Result<SynthesisJob, DomainError> {
    let voice = VoiceName::parse(&cli.voice)?;
    let language = LanguageCode::parse(&cli.lang)?;
    let speed = Speed::new(cli.speed)?;
    let device = Device::parse_optional(cli.device.as_deref())?;
    let sample_rate = SampleRate::new(cli.sample_rate)?;
    let explicit_format = cli.format.as_deref().map(OutputFormat::parse).transpose()?;

    let text = read_text(cli.text.as_deref(), cli.text_file.as_deref())?;
    let out = SafePath::output(&cli.out, "Output file")?.into_path_buf();

    Ok(SynthesisJob {
        text,
        format: explicit_format.unwrap_or_else(|| output_format_for(&out)),
        out,
        sample_rate,
        voice,
        language,
        speed,
        device,
    })
}

fn read_text(text: Option<&str>, text_file: Option<&Path>) -> Result<InputText, DomainError> {
    match (text, text_file) {
        (Some(text), _) => InputText::new(text),
        (None, Some(path)) => InputText::from_file(&SafePath::input(path, "Text file")?),
        (None, None) => Err(DomainError::MissingInput(
            "Either --text or --text-file is required \
             (unless using --list-voices, --list-languages, --model-info or --download-models)"
                .to_string(),
        )),
    }
}

/// Format implied by the output extension, WAV when there is none we know
pub fn output_format_for(path: &Path) -> OutputFormat {
    OutputFormat::from_extension(path).unwrap_or(OutputFormat::Wav)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["kokoro-announce"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    fn field(err: &DomainError) -> Option<&'static str> {
        err.field()
    }

    #[test]
    fn defaults_produce_wav_job() {
        let job = validate_args(&cli(&["--text", "Hello world"])).unwrap();

        assert_eq!(job.text.as_str(), "Hello world");
        assert_eq!(job.format, OutputFormat::Wav);
        assert_eq!(job.sample_rate.value(), 24000);
        assert_eq!(job.voice.as_str(), "af_heart");
        assert_eq!(job.language, LanguageCode::AmericanEnglish);
        assert!((job.speed.value() - 1.0).abs() < f32::EPSILON);
        assert!(job.device.is_none());
        assert!(job.out.ends_with("output.wav"));
    }

    #[test]
    fn format_inferred_from_extension() {
        let job = validate_args(&cli(&["-t", "Hi", "-o", "clip.MP3"])).unwrap();
        assert_eq!(job.format, OutputFormat::Mp3);

        let job = validate_args(&cli(&["-t", "Hi", "-o", "clip.ogg"])).unwrap();
        assert_eq!(job.format, OutputFormat::Wav);
    }

    #[test]
    fn explicit_format_wins() {
        let job = validate_args(&cli(&["-t", "Hi", "-o", "clip.wav", "--format", "mp3"])).unwrap();
        assert_eq!(job.format, OutputFormat::Mp3);
    }

    #[test]
    fn voice_checked_before_speed() {
        let err = validate_args(&cli(&["-t", "Hi", "-v", "Heart", "-s", "9"])).unwrap_err();
        assert_eq!(field(&err), Some("voice name"));
    }

    #[test]
    fn speed_checked_before_text() {
        let err = validate_args(&cli(&["-s", "0.1"])).unwrap_err();
        assert_eq!(field(&err), Some("speed"));
    }

    #[test]
    fn rejects_each_bad_field() {
        let cases: [(&[&str], &str); 5] = [
            (&["-t", "Hi", "-l", "j"], "language code"),
            (&["-t", "Hi", "-d", "tpu"], "device"),
            (&["-t", "Hi", "-r", "12345"], "sample rate"),
            (&["-t", "Hi", "--format", "flac"], "output format"),
            (&["-t", "   "], "text"),
        ];

        for (args, expected) in cases {
            let err = validate_args(&cli(args)).unwrap_err();
            assert_eq!(field(&err), Some(expected), "args: {args:?}");
        }
    }

    #[test]
    fn missing_text_is_an_error() {
        let err = validate_args(&cli(&[])).unwrap_err();
        assert!(matches!(err, DomainError::MissingInput(_)));
        assert!(err.to_string().contains("--text"));
    }

    #[test]
    fn reads_text_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("script.txt");
        std::fs::write(&path, "  Bonjour le monde \n").unwrap();
        let path = path.to_string_lossy().into_owned();

        let job = validate_args(&cli(&["-f", &path, "-l", "f", "-v", "ff_siwis"])).unwrap();

        assert_eq!(job.text.as_str(), "Bonjour le monde");
        assert_eq!(job.language, LanguageCode::French);
    }

    #[test]
    fn non_utf8_text_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("latin1.txt");
        std::fs::write(&path, [0x48, 0xE9, 0xFF, 0x6F]).unwrap();
        let path = path.to_string_lossy().into_owned();

        let err = validate_args(&cli(&["-f", &path])).unwrap_err();
        assert!(matches!(err, DomainError::InvalidEncoding { .. }));
    }

    #[test]
    fn missing_text_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.txt").to_string_lossy().into_owned();

        let err = validate_args(&cli(&["-f", &path])).unwrap_err();
        assert!(matches!(err, DomainError::FileNotFound { .. }));
    }

    #[test]
    fn traversal_output_is_rejected() {
        let err = validate_args(&cli(&[
            "-t",
            "Hi",
            "-o",
            "../../../../../../../../../etc/passwd",
        ]))
        .unwrap_err();
        assert!(err.is_path_error());
    }
}
