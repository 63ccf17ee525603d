use std::path::{Path, PathBuf};

use super::{ExtractHints, SourceExtractor};
use crate::segment::{TextSegment, TextSource};

const CAPTION_EXTENSIONS: &[&str] = &["srt", "vtt"];

/// Reads SRT/WebVTT caption files next to (or explicitly given for) the media
#[derive(Debug, Clone, Default)]
pub struct SubtitleExtractor;

impl SubtitleExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Find a caption file for `media_path` by naming convention.
    ///
    /// Tries `<stem>.srt`, `<stem>.vtt`, then language-tagged files such as
    /// `<stem>.zh-Hans.vtt`, then any caption file in the same directory.
    pub fn discover_sidecar(media_path: &Path) -> Option<PathBuf> {
        let dir = media_path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
        let stem = media_path.file_stem()?.to_string_lossy().into_owned();

        for ext in CAPTION_EXTENSIONS {
            let candidate = dir.join(format!("{}.{}", stem, ext));
            if candidate.is_file() {
                return Some(candidate);
            }
        }

        let mut captions: Vec<PathBuf> = std::fs::read_dir(dir)
            .ok()?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && caption_extension(p).is_some())
            .collect();
        captions.sort();

        let tagged_prefix = format!("{}.", stem);
        for ext in CAPTION_EXTENSIONS {
            let tagged = captions.iter().find(|p| {
                caption_extension(p).as_deref() == Some(*ext)
                    && p.file_name()
                        .map(|n| n.to_string_lossy().starts_with(&tagged_prefix))
                        .unwrap_or(false)
            });
            if let Some(found) = tagged {
                return Some(found.clone());
            }
        }

        for ext in CAPTION_EXTENSIONS {
            if let Some(found) = captions.iter().find(|p| caption_extension(p).as_deref() == Some(*ext)) {
                return Some(found.clone());
            }
        }

        None
    }

    /// Parse a caption file by extension; unreadable or unknown files give nothing
    pub fn parse_file(path: &Path) -> Vec<TextSegment> {
        let Some(ext) = caption_extension(path) else {
            tracing::debug!(path = %path.display(), "Not a caption file");
            return Vec::new();
        };

        let bytes = match fs_err::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read caption file");
                return Vec::new();
            }
        };
        let content = String::from_utf8_lossy(&bytes);

        match ext.as_str() {
            "srt" => parse_srt(&content),
            _ => parse_vtt(&content),
        }
    }
}

impl SourceExtractor for SubtitleExtractor {
    fn source(&self) -> TextSource {
        TextSource::Subtitle
    }

    fn extract(&self, media_path: &Path, hints: &ExtractHints) -> Vec<TextSegment> {
        let caption = match &hints.subtitle_path {
            Some(path) => Some(path.clone()),
            None => Self::discover_sidecar(media_path),
        };

        match caption {
            Some(path) => {
                let segments = Self::parse_file(&path);
                tracing::info!(
                    path = %path.display(),
                    segments = segments.len(),
                    "Parsed caption file"
                );
                segments
            }
            None => {
                tracing::debug!(media = %media_path.display(), "No caption file found");
                Vec::new()
            }
        }
    }
}

fn caption_extension(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    CAPTION_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// Parse SubRip content. Blocks without a timing line or text are skipped.
pub fn parse_srt(content: &str) -> Vec<TextSegment> {
    parse_cues(content)
}

/// Parse WebVTT content. Header, NOTE and STYLE blocks carry no timing line
/// and fall out naturally.
pub fn parse_vtt(content: &str) -> Vec<TextSegment> {
    parse_cues(content)
}

fn parse_cues(content: &str) -> Vec<TextSegment> {
    let content = content.trim_start_matches('\u{feff}').replace("\r\n", "\n");

    split_blocks(&content)
        .into_iter()
        .filter_map(|block| parse_block(&block))
        .collect()
}

fn split_blocks(content: &str) -> Vec<Vec<&str>> {
    let mut blocks = Vec::new();
    let mut current = Vec::new();

    for line in content.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line.trim());
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }

    blocks
}

fn parse_block(lines: &[&str]) -> Option<TextSegment> {
    if lines.len() < 2 {
        return None;
    }

    // timing is on the first line, or the second after an index / cue id
    let timing_index = lines.iter().take(2).position(|l| l.contains("-->"))?;
    let (start, end) = parse_timing_line(lines[timing_index])?;

    let text = lines[timing_index + 1..]
        .iter()
        .map(|line| strip_tags(line))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    TextSegment::new(TextSource::Subtitle, start, end, &text)
}

fn parse_timing_line(line: &str) -> Option<(f64, f64)> {
    let (start, rest) = line.split_once("-->")?;
    let end = rest.split_whitespace().next()?;
    Some((parse_timestamp(start.trim())?, parse_timestamp(end)?))
}

/// `HH:MM:SS,mmm`, `HH:MM:SS.mmm` or `MM:SS.mmm` to seconds
pub fn parse_timestamp(value: &str) -> Option<f64> {
    let (clock, fraction) = match value.find([',', '.']) {
        Some(idx) => (&value[..idx], &value[idx + 1..]),
        None => (value, ""),
    };

    let parts: Vec<&str> = clock.split(':').collect();
    let (hours, minutes, seconds) = match parts.as_slice() {
        [h, m, s] => (parse_digits(h)?, parse_digits(m)?, parse_digits(s)?),
        [m, s] => (0, parse_digits(m)?, parse_digits(s)?),
        _ => return None,
    };
    if minutes >= 60 || seconds >= 60 {
        return None;
    }

    let fraction = if fraction.is_empty() {
        0.0
    } else {
        let digits = parse_digits(fraction)?;
        digits as f64 / 10f64.powi(fraction.len() as i32)
    };

    let whole = hours
        .checked_mul(3600)?
        .checked_add(minutes * 60 + seconds)?;
    Some(whole as f64 + fraction)
}

fn parse_digits(value: &str) -> Option<u64> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

/// Remove `<...>` markup such as `<i>`, `<c.colorE5E5E5>` or inline timestamps
fn strip_tags(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut in_tag = false;

    for c in line.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }

    out.trim().to_string()
}
