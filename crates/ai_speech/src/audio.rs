//! Audio file output
//!
//! WAV is written in-process with `hound`. MP3 goes through ffmpeg when it is
//! installed; builds with the `lame` feature fall back to an in-process LAME
//! encoder otherwise. Without either, MP3 output fails instead of silently
//! producing a WAV.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use domain::{OutputFormat, SampleRate};
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use crate::config::SpeechConfig;
use crate::error::SpeechError;

/// Writes waveforms to WAV or MP3 files
#[derive(Debug, Clone)]
pub struct AudioWriter {
    ffmpeg_path: PathBuf,
    bitrate_kbps: u32,
    probe_timeout: Duration,
    encode_timeout: Duration,
}

impl Default for AudioWriter {
    fn default() -> Self {
        Self::new(&SpeechConfig::default())
    }
}

impl AudioWriter {
    /// Create a writer using the encoder settings from `config`
    #[must_use]
    pub fn new(config: &SpeechConfig) -> Self {
        Self {
            ffmpeg_path: config.ffmpeg_path.clone(),
            bitrate_kbps: config.mp3_bitrate,
            probe_timeout: Duration::from_millis(config.encoder_probe_timeout_ms),
            encode_timeout: Duration::from_millis(config.encoder_timeout_ms),
        }
    }

    /// Write `waveform` to `path`
    ///
    /// Without an explicit `format` it is inferred from the file extension,
    /// defaulting to WAV. Missing parent directories are created.
    #[instrument(skip(self, waveform), fields(samples = waveform.len(), path = %path.display()))]
    pub async fn write(
        &self,
        waveform: &[f32],
        path: &Path,
        sample_rate: SampleRate,
        format: Option<OutputFormat>,
    ) -> Result<PathBuf, SpeechError> {
        let format = format
            .or_else(|| OutputFormat::from_extension(path))
            .unwrap_or_default();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        match format {
            OutputFormat::Wav => Self::write_wav(waveform, path, sample_rate)?,
            OutputFormat::Mp3 => self.write_mp3(waveform, path, sample_rate).await?,
        }

        info!(format = %format, sample_rate = sample_rate.value(), "Wrote audio file");
        Ok(path.to_path_buf())
    }

    /// Write a 16-bit mono PCM WAV file
    pub fn write_wav(
        waveform: &[f32],
        path: &Path,
        sample_rate: SampleRate,
    ) -> Result<(), SpeechError> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: sample_rate.value(),
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut writer = hound::WavWriter::create(path, spec).map_err(wav_error)?;
        for &sample in waveform {
            writer.write_sample(to_pcm16(sample)).map_err(wav_error)?;
        }
        writer.finalize().map_err(wav_error)
    }

    /// Whether the configured ffmpeg responds to `-version` within the probe timeout
    #[instrument(skip(self), fields(ffmpeg = %self.ffmpeg_path.display()))]
    pub async fn ffmpeg_available(&self) -> bool {
        let probe = Command::new(&self.ffmpeg_path)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status();

        match tokio::time::timeout(self.probe_timeout, probe).await {
            Ok(Ok(status)) => status.success(),
            Ok(Err(e)) => {
                debug!(error = %e, "ffmpeg probe failed");
                false
            },
            Err(_) => {
                warn!(timeout_ms = duration_ms(self.probe_timeout), "ffmpeg probe timed out");
                false
            },
        }
    }

    /// Whether any MP3 encoding path is usable
    pub async fn mp3_supported(&self) -> bool {
        cfg!(feature = "lame") || self.ffmpeg_available().await
    }

    async fn write_mp3(
        &self,
        waveform: &[f32],
        path: &Path,
        sample_rate: SampleRate,
    ) -> Result<(), SpeechError> {
        if self.ffmpeg_available().await {
            return self.encode_with_ffmpeg(waveform, path, sample_rate).await;
        }
        self.encode_without_ffmpeg(waveform, path, sample_rate)
    }

    /// Stage a WAV in a temp file and transcode it with ffmpeg
    ///
    /// The staging file is removed when `staging` drops, on every path.
    async fn encode_with_ffmpeg(
        &self,
        waveform: &[f32],
        path: &Path,
        sample_rate: SampleRate,
    ) -> Result<(), SpeechError> {
        let staging = tempfile::Builder::new()
            .prefix("kokoro-announce-")
            .suffix(".wav")
            .tempfile()?;
        Self::write_wav(waveform, staging.path(), sample_rate)?;

        let bitrate = format!("{}k", self.bitrate_kbps);
        let mut cmd = Command::new(&self.ffmpeg_path);
        cmd.arg("-y")
            .arg("-i")
            .arg(staging.path())
            .args(["-b:a", bitrate.as_str(), "-q:a", "2"])
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("Running ffmpeg: {:?}", cmd);

        let child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SpeechError::EncodingUnavailable(format!(
                    "MP3 encoding requires ffmpeg, which was not found at '{}'",
                    self.ffmpeg_path.display()
                ))
            } else {
                SpeechError::Encoding(format!("Failed to run ffmpeg: {e}"))
            }
        })?;

        let output = tokio::time::timeout(self.encode_timeout, child.wait_with_output())
            .await
            .map_err(|_| SpeechError::Timeout {
                operation: "ffmpeg",
                timeout_ms: duration_ms(self.encode_timeout),
            })?
            .map_err(|e| SpeechError::Encoding(format!("Failed to wait for ffmpeg: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SpeechError::Encoding(format!(
                "ffmpeg exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(())
    }

    #[cfg(not(feature = "lame"))]
    fn encode_without_ffmpeg(
        &self,
        _waveform: &[f32],
        _path: &Path,
        _sample_rate: SampleRate,
    ) -> Result<(), SpeechError> {
        Err(SpeechError::EncodingUnavailable(format!(
            "MP3 encoding requires ffmpeg, which was not found at '{}'",
            self.ffmpeg_path.display()
        )))
    }

    #[cfg(feature = "lame")]
    fn encode_without_ffmpeg(
        &self,
        waveform: &[f32],
        path: &Path,
        sample_rate: SampleRate,
    ) -> Result<(), SpeechError> {
        use mp3lame_encoder::{Builder, FlushNoGap, MonoPcm, Quality};

        warn!("ffmpeg not found, falling back to built-in LAME encoder");

        let mut builder = Builder::new()
            .ok_or_else(|| SpeechError::Encoding("Failed to initialize LAME".to_string()))?;
        builder.set_num_channels(1).map_err(lame_error)?;
        builder
            .set_sample_rate(sample_rate.value())
            .map_err(lame_error)?;
        builder
            .set_brate(lame_bitrate(self.bitrate_kbps)?)
            .map_err(lame_error)?;
        builder.set_quality(Quality::Best).map_err(lame_error)?;
        let mut encoder = builder.build().map_err(lame_error)?;

        let pcm: Vec<i16> = waveform.iter().copied().map(to_pcm16).collect();
        let mut mp3 = Vec::with_capacity(mp3lame_encoder::max_required_buffer_size(pcm.len()));
        encoder
            .encode_to_vec(MonoPcm(&pcm), &mut mp3)
            .map_err(lame_error)?;
        encoder
            .flush_to_vec::<FlushNoGap>(&mut mp3)
            .map_err(lame_error)?;

        std::fs::write(path, mp3)?;
        Ok(())
    }
}

#[cfg(feature = "lame")]
fn lame_bitrate(kbps: u32) -> Result<mp3lame_encoder::Bitrate, SpeechError> {
    use mp3lame_encoder::Bitrate;

    match kbps {
        96 => Ok(Bitrate::Kbps96),
        128 => Ok(Bitrate::Kbps128),
        160 => Ok(Bitrate::Kbps160),
        192 => Ok(Bitrate::Kbps192),
        224 => Ok(Bitrate::Kbps224),
        256 => Ok(Bitrate::Kbps256),
        320 => Ok(Bitrate::Kbps320),
        other => Err(SpeechError::Configuration(format!(
            "Unsupported MP3 bitrate for LAME: {other}kbps"
        ))),
    }
}

#[cfg(feature = "lame")]
fn lame_error(e: impl std::fmt::Debug) -> SpeechError {
    SpeechError::Encoding(format!("LAME: {e:?}"))
}

fn wav_error(e: hound::Error) -> SpeechError {
    SpeechError::Encoding(format!("WAV write failed: {e}"))
}

/// Convert a float sample to 16-bit PCM, clipping out-of-range values
#[allow(clippy::cast_possible_truncation)]
fn to_pcm16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16
}

#[allow(clippy::cast_possible_truncation)]
fn duration_ms(duration: Duration) -> u64 {
    duration.as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn rate(value: u32) -> SampleRate {
        SampleRate::new(value).unwrap()
    }

    #[allow(clippy::cast_precision_loss)]
    fn sine(samples: usize) -> Vec<f32> {
        (0..samples)
            .map(|i| (i as f32 * 0.05).sin() * 0.5)
            .collect()
    }

    fn writer_without_ffmpeg(dir: &TempDir) -> AudioWriter {
        AudioWriter::new(&SpeechConfig {
            ffmpeg_path: dir.path().join("no-such-ffmpeg"),
            encoder_probe_timeout_ms: 1_000,
            ..Default::default()
        })
    }

    #[test]
    fn pcm_conversion_clips() {
        assert_eq!(to_pcm16(0.0), 0);
        assert_eq!(to_pcm16(1.0), i16::MAX);
        assert_eq!(to_pcm16(2.5), i16::MAX);
        assert_eq!(to_pcm16(-3.0), -i16::MAX);
        assert_eq!(to_pcm16(f32::NAN), 0);
    }

    #[tokio::test]
    async fn writes_wav_with_requested_rate() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.wav");

        let written = AudioWriter::default()
            .write(&sine(2400), &path, rate(22050), None)
            .await
            .unwrap();

        assert_eq!(written, path);
        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, 22050);
        assert_eq!(reader.spec().channels, 1);
        assert_eq!(reader.spec().bits_per_sample, 16);
        assert_eq!(reader.duration(), 2400);
    }

    #[tokio::test]
    async fn zero_length_waveform_is_valid_wav() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("silence.wav");

        AudioWriter::default()
            .write(&[], &path, rate(24000), Some(OutputFormat::Wav))
            .await
            .unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, 24000);
        assert_eq!(reader.duration(), 0);
    }

    #[tokio::test]
    async fn unknown_extension_defaults_to_wav() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("announcement.audio");

        AudioWriter::default()
            .write(&sine(100), &path, rate(16000), None)
            .await
            .unwrap();

        assert!(hound::WavReader::open(&path).is_ok());
    }

    #[tokio::test]
    async fn creates_missing_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/deeper/out.wav");

        AudioWriter::default()
            .write(&sine(10), &path, rate(8000), None)
            .await
            .unwrap();

        assert!(path.is_file());
    }

    #[tokio::test]
    async fn missing_ffmpeg_is_detected() {
        let dir = TempDir::new().unwrap();
        assert!(!writer_without_ffmpeg(&dir).ffmpeg_available().await);
    }

    #[cfg(not(feature = "lame"))]
    #[tokio::test]
    async fn mp3_without_encoder_fails_and_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let writer = writer_without_ffmpeg(&dir);
        let path = dir.path().join("out.mp3");

        assert!(!writer.mp3_supported().await);
        let err = writer
            .write(&sine(100), &path, rate(24000), None)
            .await
            .unwrap_err();

        assert!(matches!(err, SpeechError::EncodingUnavailable(_)));
        assert!(err.to_string().contains("ffmpeg"));
        assert!(!path.exists());
    }

    #[cfg(feature = "lame")]
    #[tokio::test]
    async fn mp3_falls_back_to_lame() {
        let dir = TempDir::new().unwrap();
        let writer = writer_without_ffmpeg(&dir);
        let path = dir.path().join("out.mp3");

        assert!(writer.mp3_supported().await);
        writer
            .write(&sine(24000), &path, rate(24000), None)
            .await
            .unwrap();

        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }

    #[tokio::test]
    async fn mp3_with_ffmpeg_when_installed() {
        let writer = AudioWriter::default();
        if !writer.ffmpeg_available().await {
            return;
        }

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.mp3");
        writer
            .write(&sine(24000), &path, rate(24000), Some(OutputFormat::Mp3))
            .await
            .unwrap();

        assert!(std::fs::metadata(&path).unwrap().len() > 0);
        assert!(hound::WavReader::open(&path).is_err());
    }

    #[cfg(unix)]
    mod fake_ffmpeg {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        /// Install a shell script standing in for ffmpeg; `-version` always succeeds
        fn script_writer(dir: &TempDir, body: &str) -> AudioWriter {
            let path = dir.path().join("fake-ffmpeg");
            std::fs::write(
                &path,
                format!("#!/bin/sh\nif [ \"$1\" = \"-version\" ]; then exit 0; fi\n{body}\n"),
            )
            .unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();

            AudioWriter::new(&SpeechConfig {
                ffmpeg_path: path,
                mp3_bitrate: 128,
                ..Default::default()
            })
        }

        #[tokio::test]
        async fn encoder_failure_carries_stderr_and_removes_staging_file() {
            let dir = TempDir::new().unwrap();
            let record = dir.path().join("staged-path");
            let writer = script_writer(
                &dir,
                &format!(
                    "echo \"$3\" > '{}'\necho 'bad codec' >&2\nexit 3",
                    record.display()
                ),
            );
            let path = dir.path().join("out.mp3");

            assert!(writer.ffmpeg_available().await);
            let err = writer
                .write(&sine(100), &path, rate(24000), None)
                .await
                .unwrap_err();

            assert!(
                matches!(&err, SpeechError::Encoding(message) if message.contains("bad codec")),
                "{err:?}"
            );
            let staged = std::fs::read_to_string(&record).unwrap();
            assert!(staged.trim().ends_with(".wav"));
            assert!(!Path::new(staged.trim()).exists());
            assert!(!path.exists());
        }

        #[tokio::test]
        async fn encoder_receives_staged_wav_and_bitrate() {
            let dir = TempDir::new().unwrap();
            let args = dir.path().join("args");
            let writer = script_writer(
                &dir,
                &format!(
                    "echo \"$@\" > '{}'\ncp \"$3\" \"$8\"",
                    args.display()
                ),
            );
            let path = dir.path().join("out.mp3");

            writer
                .write(&sine(240), &path, rate(16000), None)
                .await
                .unwrap();

            let args = std::fs::read_to_string(&args).unwrap();
            assert!(args.starts_with("-y -i "), "{args}");
            assert!(args.contains(" -b:a 128k -q:a 2 "), "{args}");
            // The fake encoder copied the staged WAV through unchanged
            let reader = hound::WavReader::open(&path).unwrap();
            assert_eq!(reader.spec().sample_rate, 16000);
            assert_eq!(reader.duration(), 240);
        }
    }
}
