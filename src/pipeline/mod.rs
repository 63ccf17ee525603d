//! Runs the enabled source extractors over one media file and merges their
//! output. Extractors run one after another on the calling thread; callers
//! on an async runtime should drive [`ExtractPipeline::run`] from a blocking
//! task.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use crate::config::{Config, ExtractConfig};
use crate::extractors::{
    is_video, AsrExtractor, ExtractHints, FfmpegDecoder, ScreenTextExtractor, SourceExtractor,
    SubtitleExtractor, TextRecognizer, WhisperCli,
};
use crate::merge::merge;
use crate::segment::{MergedResult, TextSegment};

/// Marker stored in the stats of a run whose media file was missing
pub const MISSING_MEDIA_MARKER: &str = "file not found";

/// Which extractors a run uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum ExtractMode {
    /// Captions only; speech recognition never runs
    SubtitleFirst,
    /// Captions, then speech recognition for video
    #[default]
    Full,
    /// Speech recognition only
    AsrOnly,
}

impl ExtractMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractMode::SubtitleFirst => "subtitle_first",
            ExtractMode::Full => "full",
            ExtractMode::AsrOnly => "asr_only",
        }
    }

    fn runs_subtitles(&self) -> bool {
        !matches!(self, ExtractMode::AsrOnly)
    }

    fn runs_asr(&self) -> bool {
        matches!(self, ExtractMode::Full | ExtractMode::AsrOnly)
    }
}

impl fmt::Display for ExtractMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExtractMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "subtitle_first" => Ok(ExtractMode::SubtitleFirst),
            "full" => Ok(ExtractMode::Full),
            "asr_only" => Ok(ExtractMode::AsrOnly),
            _ => Err(format!("Invalid extract mode: {}", s)),
        }
    }
}

/// Named phases reported through the progress callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    Subtitle,
    Asr,
    Ocr,
    Merge,
}

impl PipelineStage {
    pub const ALL: [PipelineStage; 4] = [
        PipelineStage::Subtitle,
        PipelineStage::Asr,
        PipelineStage::Ocr,
        PipelineStage::Merge,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Subtitle => "subtitle",
            PipelineStage::Asr => "asr",
            PipelineStage::Ocr => "ocr",
            PipelineStage::Merge => "merge",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stage-level progress callback: `(stage, 0)` on entry, `(stage, 100)` on exit
pub type ProgressFn<'a> = &'a (dyn Fn(PipelineStage, u8) + Send + Sync);

/// Subtitle → speech recognition → (screen text) → merge
pub struct ExtractPipeline {
    subtitle: Arc<dyn SourceExtractor>,
    asr: Arc<dyn SourceExtractor>,
    screen_text: Option<Arc<dyn SourceExtractor>>,
}

impl ExtractPipeline {
    pub fn new(subtitle: Arc<dyn SourceExtractor>, asr: Arc<dyn SourceExtractor>) -> Self {
        Self {
            subtitle,
            asr,
            screen_text: None,
        }
    }

    /// Pipeline backed by the caption parser, ffmpeg and the whisper CLI
    pub fn from_config(config: &Config) -> Self {
        let asr = AsrExtractor::new(
            Arc::new(FfmpegDecoder::new(&config.tools.ffmpeg)),
            Arc::new(WhisperCli::new(&config.tools.whisper, &config.extract.asr_model)),
            &config.extract.language,
        );

        Self::new(Arc::new(SubtitleExtractor::new()), Arc::new(asr))
    }

    /// Add an on-screen text source, used for video in `full` mode
    pub fn with_screen_text(mut self, extractor: Arc<dyn SourceExtractor>) -> Self {
        self.screen_text = Some(extractor);
        self
    }

    /// Wire a [`TextRecognizer`] sampling frames every `extract.ocr_interval` seconds
    pub fn with_recognizer(self, recognizer: Arc<dyn TextRecognizer>, config: &ExtractConfig) -> Self {
        self.with_screen_text(Arc::new(ScreenTextExtractor::new(recognizer, config.ocr_interval)))
    }

    pub fn has_screen_text(&self) -> bool {
        self.screen_text.is_some()
    }

    /// Run the extractors enabled by `mode` and merge their segments.
    ///
    /// A missing media file is not an error here: the result is empty and
    /// carries [`MISSING_MEDIA_MARKER`] in its stats.
    pub fn run(
        &self,
        media_path: &Path,
        subtitle_path: Option<&Path>,
        mode: ExtractMode,
        on_progress: Option<ProgressFn<'_>>,
    ) -> MergedResult {
        if !media_path.exists() {
            tracing::warn!(media = %media_path.display(), "Media file missing at extraction time");
            return MergedResult::with_error(MISSING_MEDIA_MARKER);
        }

        let report = |stage: PipelineStage, pct: u8| {
            if let Some(callback) = on_progress {
                callback(stage, pct);
            }
        };

        let hints = ExtractHints {
            subtitle_path: subtitle_path.map(Path::to_path_buf),
        };
        let video = is_video(media_path);
        let mut segments: Vec<TextSegment> = Vec::new();

        tracing::info!(mode = %mode, video, media = %media_path.display(), "Running extraction pipeline");

        if mode.runs_subtitles() {
            report(PipelineStage::Subtitle, 0);
            segments.extend(self.subtitle.extract(media_path, &hints));
            report(PipelineStage::Subtitle, 100);
        }

        if video && mode.runs_asr() {
            report(PipelineStage::Asr, 0);
            segments.extend(self.asr.extract(media_path, &hints));
            report(PipelineStage::Asr, 100);
        }

        if let Some(screen_text) = &self.screen_text {
            if video && mode == ExtractMode::Full {
                report(PipelineStage::Ocr, 0);
                segments.extend(screen_text.extract(media_path, &hints));
                report(PipelineStage::Ocr, 100);
            }
        }

        report(PipelineStage::Merge, 0);
        let result = merge(segments);
        report(PipelineStage::Merge, 100);

        tracing::info!(segments = result.segments.len(), "Extraction pipeline finished");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::MockSourceExtractor;
    use crate::segment::TextSource;
    use std::sync::Mutex;

    fn never_called() -> Arc<dyn SourceExtractor> {
        let mut mock = MockSourceExtractor::new();
        mock.expect_extract().times(0);
        mock.expect_source().return_const(TextSource::Subtitle);
        Arc::new(mock)
    }

    fn returning(source: TextSource, start: f64, text: &'static str) -> Arc<dyn SourceExtractor> {
        let mut mock = MockSourceExtractor::new();
        mock.expect_source().return_const(source);
        mock.expect_extract()
            .times(1)
            .returning(move |_, _| TextSegment::new(source, start, start + 1.0, text).into_iter().collect());
        Arc::new(mock)
    }

    fn media(dir: &tempfile::TempDir, name: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, b"media").unwrap();
        path
    }

    #[test]
    fn test_asr_only_on_image_runs_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let image = media(&dir, "cover.png");

        let pipeline = ExtractPipeline::new(never_called(), never_called());
        let result = pipeline.run(&image, None, ExtractMode::AsrOnly, None);

        assert!(result.segments.is_empty());
        assert!(result.stats.is_empty());
        assert_eq!(result.full_text, "");
    }

    #[test]
    fn test_full_mode_on_video_runs_both_and_merges() {
        let dir = tempfile::tempdir().unwrap();
        let video = media(&dir, "clip.mp4");

        let pipeline = ExtractPipeline::new(
            returning(TextSource::Subtitle, 1.0, "hello world"),
            returning(TextSource::SpeechRecognition, 1.2, "hello world"),
        );
        let result = pipeline.run(&video, None, ExtractMode::Full, None);

        assert_eq!(result.segments.len(), 1);
        assert_eq!(result.segments[0].source, TextSource::Subtitle);
    }

    #[test]
    fn test_subtitle_first_never_runs_asr() {
        let dir = tempfile::tempdir().unwrap();
        let video = media(&dir, "clip.mkv");

        let pipeline = ExtractPipeline::new(returning(TextSource::Subtitle, 0.0, "caption"), never_called());
        let result = pipeline.run(&video, None, ExtractMode::SubtitleFirst, None);

        assert_eq!(result.segments.len(), 1);
    }

    #[test]
    fn test_full_mode_on_image_skips_asr() {
        let dir = tempfile::tempdir().unwrap();
        let image = media(&dir, "poster.jpg");

        let pipeline = ExtractPipeline::new(returning(TextSource::Subtitle, 0.0, "caption"), never_called());
        let result = pipeline.run(&image, None, ExtractMode::Full, None);

        assert_eq!(result.segments.len(), 1);
    }

    #[test]
    fn test_missing_media_is_empty_result_with_marker() {
        let pipeline = ExtractPipeline::new(never_called(), never_called());
        let result = pipeline.run(Path::new("/nonexistent/clip.mp4"), None, ExtractMode::Full, None);

        assert!(result.segments.is_empty());
        assert_eq!(result.stats.error.as_deref(), Some(MISSING_MEDIA_MARKER));
    }

    #[test]
    fn test_progress_reported_per_stage() {
        let dir = tempfile::tempdir().unwrap();
        let video = media(&dir, "clip.mp4");

        let events = Mutex::new(Vec::new());
        let record = |stage: PipelineStage, pct: u8| events.lock().unwrap().push((stage, pct));

        let pipeline = ExtractPipeline::new(
            returning(TextSource::Subtitle, 0.0, "a"),
            returning(TextSource::SpeechRecognition, 5.0, "b"),
        );
        pipeline.run(&video, None, ExtractMode::Full, Some(&record));

        assert_eq!(
            events.into_inner().unwrap(),
            vec![
                (PipelineStage::Subtitle, 0),
                (PipelineStage::Subtitle, 100),
                (PipelineStage::Asr, 0),
                (PipelineStage::Asr, 100),
                (PipelineStage::Merge, 0),
                (PipelineStage::Merge, 100),
            ]
        );
    }

    #[test]
    fn test_screen_text_only_in_full_mode() {
        let dir = tempfile::tempdir().unwrap();
        let video = media(&dir, "clip.mp4");

        let pipeline = ExtractPipeline::new(
            returning(TextSource::Subtitle, 0.0, "spoken words"),
            returning(TextSource::SpeechRecognition, 10.0, "more words"),
        )
        .with_screen_text(returning(TextSource::ScreenText, 20.0, "ON SCREEN"));
        let result = pipeline.run(&video, None, ExtractMode::Full, None);
        assert_eq!(result.segments.len(), 3);

        let pipeline = ExtractPipeline::new(never_called(), returning(TextSource::SpeechRecognition, 1.0, "x"))
            .with_screen_text(never_called());
        pipeline.run(&video, None, ExtractMode::AsrOnly, None);
    }

    #[test]
    fn test_recognizer_uses_configured_interval() {
        use crate::extractors::screen_text::MockTextRecognizer;
        use crate::extractors::RawSegment;

        let dir = tempfile::tempdir().unwrap();
        let video = media(&dir, "lecture.webm");

        let mut config = Config::default();
        config.extract.ocr_interval = 2.5;

        let mut recognizer = MockTextRecognizer::new();
        recognizer.expect_is_available().return_const(true);
        recognizer
            .expect_recognize()
            .withf(|_, interval| *interval == 2.5)
            .times(1)
            .returning(|_, _| Ok(vec![RawSegment::new(30.0, 32.0, "SLIDE TITLE")]));

        let pipeline = ExtractPipeline::new(
            returning(TextSource::Subtitle, 0.0, "welcome"),
            returning(TextSource::SpeechRecognition, 10.0, "today we cover"),
        )
        .with_recognizer(Arc::new(recognizer), &config.extract);
        assert!(pipeline.has_screen_text());

        let result = pipeline.run(&video, None, ExtractMode::Full, None);
        assert_eq!(result.segments.len(), 3);
        assert_eq!(result.segments[2].source, TextSource::ScreenText);
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("asr_only".parse::<ExtractMode>(), Ok(ExtractMode::AsrOnly));
        assert!("fast".parse::<ExtractMode>().is_err());
        assert_eq!(ExtractMode::default(), ExtractMode::Full);
        assert_eq!(serde_json::to_string(&ExtractMode::SubtitleFirst).unwrap(), "\"subtitle_first\"");
    }
}
