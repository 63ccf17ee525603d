use serde::Deserialize;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::{Arc, OnceLock};

use super::{ExtractError, ExtractHints, RawSegment, SourceExtractor};
use crate::segment::{TextSegment, TextSource};

/// Turns a media file into a mono 16 kHz PCM WAV file
#[cfg_attr(test, mockall::automock)]
pub trait AudioDecoder: Send + Sync {
    fn decode(&self, media_path: &Path, output_path: &Path) -> Result<(), ExtractError>;
}

/// Output of a transcription capability
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Transcription {
    #[serde(default)]
    pub segments: Vec<RawSegment>,
}

/// Speech-to-text over a decoded audio file
#[cfg_attr(test, mockall::automock)]
pub trait Transcriber: Send + Sync {
    /// Whether the model/tool can be used at all
    fn is_available(&self) -> bool;

    fn transcribe(&self, audio_path: &Path, language: &str) -> Result<Transcription, ExtractError>;
}

/// Audio decoding through the ffmpeg binary
pub struct FfmpegDecoder {
    ffmpeg_path: String,
}

impl FfmpegDecoder {
    pub fn new(ffmpeg_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }
}

impl AudioDecoder for FfmpegDecoder {
    fn decode(&self, media_path: &Path, output_path: &Path) -> Result<(), ExtractError> {
        tracing::debug!("Decoding audio track of {}", media_path.display());

        let output = Command::new(&self.ffmpeg_path)
            .args([
                "-y",
                "-i", &media_path.to_string_lossy(),
                "-vn", // No video
                "-acodec", "pcm_s16le",
                "-ar", "16000",
                "-ac", "1",
                &output_path.to_string_lossy(),
            ])
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractError::DecodingFailed(error.trim().to_string()));
        }

        Ok(())
    }
}

/// Transcription through the `whisper` command line tool
pub struct WhisperCli {
    whisper_path: String,
    model: String,
    available: OnceLock<bool>,
}

impl WhisperCli {
    pub fn new(whisper_path: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            whisper_path: whisper_path.into(),
            model: model.into(),
            available: OnceLock::new(),
        }
    }
}

impl Transcriber for WhisperCli {
    fn is_available(&self) -> bool {
        *self.available.get_or_init(|| {
            Command::new(&self.whisper_path)
                .arg("--help")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .map(|status| status.success())
                .unwrap_or(false)
        })
    }

    fn transcribe(&self, audio_path: &Path, language: &str) -> Result<Transcription, ExtractError> {
        let out_dir = tempfile::tempdir()?;

        tracing::info!(model = %self.model, language, "Running whisper");

        let output = Command::new(&self.whisper_path)
            .args([
                &*audio_path.to_string_lossy(),
                "--model", &self.model,
                "--language", language,
                "--output_format", "json",
                "--output_dir", &out_dir.path().to_string_lossy(),
                "--verbose", "False",
            ])
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractError::TranscriptionFailed(error.trim().to_string()));
        }

        let stem = audio_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio".to_string());
        let json = fs_err::read_to_string(out_dir.path().join(format!("{}.json", stem)))?;

        serde_json::from_str(&json)
            .map_err(|e| ExtractError::TranscriptionFailed(format!("unreadable whisper output: {}", e)))
    }
}

/// Speech recognition over a video's audio track.
///
/// Speech recognition is best-effort: an unavailable transcriber or any
/// decode/transcribe failure yields no segments.
pub struct AsrExtractor {
    decoder: Arc<dyn AudioDecoder>,
    transcriber: Arc<dyn Transcriber>,
    language: String,
}

impl AsrExtractor {
    pub fn new(
        decoder: Arc<dyn AudioDecoder>,
        transcriber: Arc<dyn Transcriber>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            decoder,
            transcriber,
            language: language.into(),
        }
    }

    fn run(&self, media_path: &Path) -> Result<Vec<TextSegment>, ExtractError> {
        let audio = tempfile::Builder::new()
            .prefix("textgetter_")
            .suffix(".wav")
            .tempfile()?;

        self.decoder.decode(media_path, audio.path())?;
        let transcription = self.transcriber.transcribe(audio.path(), &self.language)?;

        Ok(transcription
            .segments
            .into_iter()
            .filter_map(|raw| raw.into_segment(TextSource::SpeechRecognition))
            .collect())
    }
}

impl SourceExtractor for AsrExtractor {
    fn source(&self) -> TextSource {
        TextSource::SpeechRecognition
    }

    fn extract(&self, media_path: &Path, _hints: &ExtractHints) -> Vec<TextSegment> {
        if !self.transcriber.is_available() {
            tracing::warn!("Speech recognition unavailable, skipping ASR");
            return Vec::new();
        }

        match self.run(media_path) {
            Ok(segments) => {
                tracing::info!(segments = segments.len(), "Speech recognition finished");
                segments
            }
            Err(e) => {
                tracing::warn!(error = %e, "Speech recognition failed, continuing without ASR");
                Vec::new()
            }
        }
    }
}
