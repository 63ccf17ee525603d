//! Source extractors turn media (or its sidecar files) into text segments.
//!
//! Extractors never fail the pipeline: a missing capability or unreadable
//! input yields an empty segment list and a warning.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod asr;
pub mod screen_text;
pub mod subtitle;

pub use asr::{AsrExtractor, AudioDecoder, FfmpegDecoder, Transcriber, Transcription, WhisperCli};
pub use screen_text::{ScreenTextExtractor, TextRecognizer};
pub use subtitle::SubtitleExtractor;

use crate::segment::{TextSegment, TextSource};

/// Extra inputs an extractor may use besides the media file
#[derive(Debug, Clone, Default)]
pub struct ExtractHints {
    /// Explicit caption file; sidecar discovery is used when absent
    pub subtitle_path: Option<PathBuf>,
}

impl ExtractHints {
    pub fn with_subtitle(path: impl Into<PathBuf>) -> Self {
        Self {
            subtitle_path: Some(path.into()),
        }
    }
}

/// A text source over one media file
#[cfg_attr(test, mockall::automock)]
pub trait SourceExtractor: Send + Sync {
    /// Provenance tag given to every produced segment
    fn source(&self) -> TextSource;

    /// Extract segments; "nothing found" is an empty list, not an error
    fn extract(&self, media_path: &Path, hints: &ExtractHints) -> Vec<TextSegment>;
}

/// Untagged `(start, end, text)` triple as reported by an external capability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSegment {
    #[serde(default)]
    pub start: f64,
    #[serde(default)]
    pub end: f64,
    #[serde(default)]
    pub text: String,
}

impl RawSegment {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }

    pub fn into_segment(self, source: TextSource) -> Option<TextSegment> {
        TextSegment::new(source, self.start, self.end, &self.text)
    }
}

/// Errors raised inside extractor capabilities; always downgraded by the caller
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("audio decoding failed: {0}")]
    DecodingFailed(String),
    #[error("transcription failed: {0}")]
    TranscriptionFailed(String),
    #[error("text recognition failed: {0}")]
    RecognitionFailed(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Video extensions that carry an audio track worth transcribing
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "webm", "mov", "avi", "flv", "m4v"];

/// Still images: subtitles and screen text only
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif"];

fn lowercase_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

pub fn is_video(path: &Path) -> bool {
    lowercase_extension(path)
        .map(|ext| VIDEO_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

pub fn is_image(path: &Path) -> bool {
    lowercase_extension(path)
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}
