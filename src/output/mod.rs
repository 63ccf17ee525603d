use anyhow::Result;
use clap::ValueEnum;
use std::fmt;
use std::path::Path;

use crate::merge::PARAGRAPH_SEPARATOR;
use crate::segment::MergedResult;
use crate::utils::format_timestamp;

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Plain text
    #[default]
    Text,
    /// Markdown with a title heading
    Markdown,
    /// Full result with segments and stats
    Json,
    /// SRT subtitle format
    Srt,
    /// WebVTT format
    Vtt,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Text => "txt",
            OutputFormat::Markdown => "md",
            OutputFormat::Json => "json",
            OutputFormat::Srt => "srt",
            OutputFormat::Vtt => "vtt",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Markdown => write!(f, "markdown"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Srt => write!(f, "srt"),
            OutputFormat::Vtt => write!(f, "vtt"),
        }
    }
}

/// Render a transcript; `title` is used by the markdown heading
pub fn render(result: &MergedResult, title: Option<&str>, format: OutputFormat) -> Result<String> {
    let content = match format {
        OutputFormat::Text => result.full_text.clone(),
        OutputFormat::Markdown => format_as_markdown(result, title),
        OutputFormat::Json => serde_json::to_string_pretty(result)?,
        OutputFormat::Srt => format_as_srt(result),
        OutputFormat::Vtt => format_as_vtt(result),
    };
    Ok(content)
}

/// Save rendered output to file
pub async fn save_to_file(content: &str, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs_err::tokio::create_dir_all(parent).await?;
    }
    fs_err::tokio::write(path, content).await?;
    Ok(())
}

fn format_as_markdown(result: &MergedResult, title: Option<&str>) -> String {
    let mut out = String::new();
    if let Some(title) = title.filter(|t| !t.trim().is_empty()) {
        out.push_str("# ");
        out.push_str(title.trim());
        out.push_str(PARAGRAPH_SEPARATOR);
    }
    out.push_str(&result.full_text);
    out.push('\n');
    out
}

fn format_as_srt(result: &MergedResult) -> String {
    let mut out = String::new();
    for (index, segment) in result.segments.iter().enumerate() {
        out.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            index + 1,
            format_timestamp(segment.start_time, ','),
            format_timestamp(segment.end_time, ','),
            segment.text
        ));
    }
    out
}

fn format_as_vtt(result: &MergedResult) -> String {
    let mut out = String::from("WEBVTT\n\n");
    for segment in &result.segments {
        out.push_str(&format!(
            "{} --> {}\n{}\n\n",
            format_timestamp(segment.start_time, '.'),
            format_timestamp(segment.end_time, '.'),
            segment.text
        ));
    }
    out
}
