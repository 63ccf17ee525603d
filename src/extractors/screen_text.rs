use std::path::Path;
use std::sync::Arc;

use super::{ExtractError, ExtractHints, RawSegment, SourceExtractor};
use crate::segment::{TextSegment, TextSource};

/// Optical text recognition over sampled video frames
#[cfg_attr(test, mockall::automock)]
pub trait TextRecognizer: Send + Sync {
    fn is_available(&self) -> bool;

    /// Recognise on-screen text, sampling one frame every `interval_secs`
    fn recognize(&self, media_path: &Path, interval_secs: f64) -> Result<Vec<RawSegment>, ExtractError>;
}

/// On-screen text, lowest authority of all sources
pub struct ScreenTextExtractor {
    recognizer: Arc<dyn TextRecognizer>,
    interval_secs: f64,
}

impl ScreenTextExtractor {
    pub fn new(recognizer: Arc<dyn TextRecognizer>, interval_secs: f64) -> Self {
        Self {
            recognizer,
            interval_secs,
        }
    }
}

impl SourceExtractor for ScreenTextExtractor {
    fn source(&self) -> TextSource {
        TextSource::ScreenText
    }

    fn extract(&self, media_path: &Path, _hints: &ExtractHints) -> Vec<TextSegment> {
        if !self.recognizer.is_available() {
            tracing::warn!("Text recognition unavailable, skipping screen text");
            return Vec::new();
        }

        match self.recognizer.recognize(media_path, self.interval_secs) {
            Ok(raw) => raw
                .into_iter()
                .filter_map(|r| r.into_segment(TextSource::ScreenText))
                .collect(),
            Err(e) => {
                tracing::warn!(error = %e, "Text recognition failed");
                Vec::new()
            }
        }
    }
}
