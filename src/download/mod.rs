//! Fetching remote media into a task's working directory.

use async_trait::async_trait;
use fs_err::tokio as fs;
use futures_util::StreamExt;
use reqwest::Client;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::platforms::ytdlp::YtDlpError;
use crate::platforms::{Fetcher, MediaLocator, YtDlp};

/// File stem every download is written under
pub const MEDIA_STEM: &str = "video";

/// Preferred containers when several `video.*` files exist
const PREFERRED_EXTENSIONS: &[&str] = &["mp4", "mkv", "webm", "flv", "m4a"];

/// Sidecar files that are never the media itself
const CAPTION_EXTENSIONS: &[&str] = &["srt", "vtt", "ass", "ssa", "json", "part"];

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("{0}")]
    YtDlp(#[from] YtDlpError),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server responded with {0}")]
    Status(reqwest::StatusCode),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("nothing to download for a local file")]
    LocalFile,
}

/// Download capability: writes media (and any caption sidecars) into `dest_dir`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Downloader: Send + Sync {
    async fn download(&self, locator: &MediaLocator, dest_dir: &Path) -> Result<(), DownloadError>;
}

/// yt-dlp for site pages, streamed HTTP for plain media links
pub struct MediaDownloader {
    yt_dlp: YtDlp,
    client: Client,
    sub_langs: Vec<String>,
}

impl MediaDownloader {
    pub fn new(yt_dlp: YtDlp, sub_langs: Vec<String>) -> Self {
        Self {
            yt_dlp,
            client: Client::new(),
            sub_langs,
        }
    }

    async fn fetch_http(&self, url: &str, dest_dir: &Path) -> Result<(), DownloadError> {
        let ext = Url::parse(url)
            .ok()
            .and_then(|u| {
                u.path_segments()
                    .and_then(|mut segments| segments.next_back().map(str::to_string))
            })
            .and_then(|name| {
                Path::new(&name)
                    .extension()
                    .map(|e| e.to_string_lossy().to_lowercase())
            })
            .unwrap_or_else(|| "mp4".to_string());

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(DownloadError::Status(response.status()));
        }

        let target = dest_dir.join(format!("{}.{}", MEDIA_STEM, ext));
        let mut file = fs::File::create(&target).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        tracing::debug!(bytes = written, target = %target.display(), "HTTP download finished");
        Ok(())
    }
}

#[async_trait]
impl Downloader for MediaDownloader {
    async fn download(&self, locator: &MediaLocator, dest_dir: &Path) -> Result<(), DownloadError> {
        fs::create_dir_all(dest_dir).await?;

        match locator {
            MediaLocator::Local(_) => Err(DownloadError::LocalFile),
            MediaLocator::Remote {
                url,
                fetcher: Fetcher::YtDlp,
            } => Ok(self.yt_dlp.download(url, dest_dir, &self.sub_langs).await?),
            MediaLocator::Remote {
                url,
                fetcher: Fetcher::Http,
            } => self.fetch_http(url, dest_dir).await,
        }
    }
}

/// Pick the downloaded media file out of a task directory
pub fn locate_media(dir: &Path) -> Option<PathBuf> {
    let prefix = format!("{}.", MEDIA_STEM);
    let mut candidates: Vec<PathBuf> = fs_err::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with(&prefix))
                .unwrap_or(false)
        })
        .collect();
    candidates.sort();

    let extension = |path: &PathBuf| {
        path.extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    };

    candidates
        .iter()
        .find(|path| PREFERRED_EXTENSIONS.contains(&extension(path).as_str()))
        .or_else(|| {
            candidates
                .iter()
                .find(|path| !CAPTION_EXTENSIONS.contains(&extension(path).as_str()))
        })
        .cloned()
}
