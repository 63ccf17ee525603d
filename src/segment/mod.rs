use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Origin of a piece of extracted text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextSource {
    /// Caption files (sidecar or downloaded)
    #[serde(rename = "subtitle")]
    Subtitle,

    /// Speech recognition over the audio track
    #[serde(rename = "asr")]
    SpeechRecognition,

    /// Text recognised on screen
    #[serde(rename = "ocr")]
    ScreenText,
}

impl TextSource {
    pub const ALL: [TextSource; 3] = [
        TextSource::Subtitle,
        TextSource::SpeechRecognition,
        TextSource::ScreenText,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TextSource::Subtitle => "subtitle",
            TextSource::SpeechRecognition => "asr",
            TextSource::ScreenText => "ocr",
        }
    }

    /// Authority used when two sources report the same line. Higher wins.
    pub fn priority(&self) -> u8 {
        match self {
            TextSource::Subtitle => 3,
            TextSource::SpeechRecognition => 2,
            TextSource::ScreenText => 1,
        }
    }
}

impl fmt::Display for TextSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A span of recognised text anchored in the media timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextSegment {
    pub source: TextSource,

    /// Start time in seconds
    pub start_time: f64,

    /// End time in seconds
    pub end_time: f64,

    pub text: String,

    /// Confidence score (0.0 to 1.0)
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

fn default_confidence() -> f64 {
    1.0
}

impl TextSegment {
    /// Build a segment, returning `None` when the text is blank after trimming.
    pub fn new(source: TextSource, start_time: f64, end_time: f64, text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        Some(Self {
            source,
            start_time: start_time.max(0.0),
            end_time: end_time.max(0.0),
            text: text.to_string(),
            confidence: default_confidence(),
        })
    }

    /// Length of the text in characters, not bytes
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// Per-source totals over the retained segments
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceStats {
    pub segment_count: usize,
    pub char_count: usize,
}

/// Source statistics keyed by source name.
///
/// A pipeline run that never reached its extractors (missing media) reports
/// the reason under `error` instead of any source entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergeStats {
    #[serde(flatten)]
    pub sources: BTreeMap<String, SourceStats>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MergeStats {
    pub fn get(&self, source: TextSource) -> Option<&SourceStats> {
        self.sources.get(source.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty() && self.error.is_none()
    }
}

/// Ordered, deduplicated transcript produced by one pipeline run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedResult {
    pub full_text: String,
    pub segments: Vec<TextSegment>,
    pub stats: MergeStats,
}

impl MergedResult {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Empty result carrying the reason the pipeline produced nothing
    pub fn with_error(message: impl Into<String>) -> Self {
        Self {
            stats: MergeStats {
                error: Some(message.into()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}
