use serde_json::Value;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use super::{Fetcher, MediaResource, Platform, Resolution};

#[derive(Debug, thiserror::Error)]
pub enum YtDlpError {
    #[error("yt-dlp is not installed (https://github.com/yt-dlp/yt-dlp)")]
    NotInstalled,
    #[error("{0}")]
    Failed(String),
    #[error("unreadable yt-dlp output: {0}")]
    Output(String),
}

/// Thin async wrapper around the `yt-dlp` binary
#[derive(Debug, Clone)]
pub struct YtDlp {
    path: String,
}

impl YtDlp {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    pub async fn is_available(&self) -> bool {
        Command::new(&self.path)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false)
    }

    /// Page metadata without downloading anything
    pub async fn dump_json(&self, url: &str) -> Result<Value, YtDlpError> {
        tracing::debug!("Fetching video info for: {}", url);

        let output = Command::new(&self.path)
            .args(["--dump-json", "--no-playlist", "--no-warnings", url])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|_| YtDlpError::NotInstalled)?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(YtDlpError::Failed(error.trim().to_string()));
        }

        serde_json::from_slice(&output.stdout).map_err(|e| YtDlpError::Output(e.to_string()))
    }

    /// Download the video as `<dir>/video.<ext>` together with any captions
    /// in `sub_langs`
    pub async fn download(&self, url: &str, dir: &Path, sub_langs: &[String]) -> Result<(), YtDlpError> {
        let template = dir.join("video.%(ext)s");
        let langs = sub_langs.join(",");

        tracing::debug!(url, dir = %dir.display(), "Downloading with yt-dlp");

        let output = Command::new(&self.path)
            .args([
                "--output", &template.to_string_lossy(),
                "--write-subs",
                "--write-auto-subs",
                "--sub-langs", &langs,
                "--sub-format", "vtt/srt/best",
                "--no-playlist",
                "--concurrent-fragments", "4",
                "--quiet",
                "--no-warnings",
                url,
            ])
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|_| YtDlpError::NotInstalled)?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(YtDlpError::Failed(error.trim().to_string()));
        }

        Ok(())
    }

    /// Resolution for a site page that yt-dlp knows how to fetch
    pub async fn resolve_page(&self, platform: Platform, url: &str) -> Resolution {
        if !self.is_available().await {
            return Resolution::failed(platform, url, YtDlpError::NotInstalled.to_string());
        }

        let info = match self.dump_json(url).await {
            Ok(info) => info,
            Err(e) => return Resolution::failed(platform, url, format!("parse failed: {}", e)),
        };

        page_resolution(platform, url, &info)
    }
}

/// Map yt-dlp's info document onto a resolution
pub fn page_resolution(platform: Platform, url: &str, info: &Value) -> Resolution {
    if !info.is_object() {
        return Resolution::failed(platform, url, "could not fetch video info");
    }

    let id = info["id"].as_str().unwrap_or_default();
    let title = info["title"]
        .as_str()
        .filter(|t| !t.is_empty())
        .unwrap_or(id);
    let author = info["uploader"]
        .as_str()
        .or_else(|| info["creator"].as_str())
        .unwrap_or_default();
    let duration = info["duration"].as_f64();

    let mut media = MediaResource::remote(url, Fetcher::YtDlp);
    media.duration_secs = duration;

    let mut resolution = Resolution::new(platform, url)
        .with_metadata("title", title)
        .with_metadata("author", author)
        .with_metadata("id", id)
        .with_metadata("duration", duration.map(Value::from).unwrap_or(Value::Null))
        .with_media(media);

    if let Some(display_id) = info["display_id"].as_str() {
        resolution = resolution.with_metadata("displayId", display_id);
    }

    resolution
}
