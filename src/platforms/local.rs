use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use super::{MediaResource, MediaType, Platform, PlatformResolver, Resolution};
use crate::extractors::{is_image, is_video};

const FILE_SCHEME: &str = "file://";

/// `file://` input or a path to an existing file
pub fn looks_local(input: &str) -> bool {
    let input = input.trim();
    if input.starts_with(FILE_SCHEME) {
        return true;
    }

    Path::new(input).is_file()
}

fn to_path(input: &str) -> PathBuf {
    let input = input.trim();
    let raw = input.strip_prefix(FILE_SCHEME).unwrap_or(input);
    let path = PathBuf::from(raw);
    path.canonicalize().unwrap_or(path)
}

/// Local video and image files
pub struct LocalFileResolver {
    ffprobe_path: String,
}

impl LocalFileResolver {
    pub fn new(ffprobe_path: impl Into<String>) -> Self {
        Self {
            ffprobe_path: ffprobe_path.into(),
        }
    }

    /// Container duration through ffprobe; `None` when ffprobe is missing or fails
    async fn probe_duration(&self, path: &Path) -> Option<f64> {
        let output = Command::new(&self.ffprobe_path)
            .args([
                "-v", "quiet",
                "-print_format", "json",
                "-show_format",
                &path.to_string_lossy(),
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .output()
            .await
            .ok()?;

        if !output.status.success() {
            return None;
        }

        let info: serde_json::Value = serde_json::from_slice(&output.stdout).ok()?;
        info["format"]["duration"]
            .as_str()
            .and_then(|d| d.parse::<f64>().ok())
    }
}

#[async_trait]
impl PlatformResolver for LocalFileResolver {
    fn platform(&self) -> Platform {
        Platform::Local
    }

    fn priority(&self) -> u32 {
        100
    }

    fn supports(&self, input: &str) -> bool {
        looks_local(input)
    }

    async fn resolve(&self, input: &str) -> Resolution {
        let path = to_path(input);

        if !path.is_file() {
            return Resolution::failed(Platform::Local, input, "file not found");
        }

        let media_type = if is_video(&path) {
            MediaType::Video
        } else if is_image(&path) {
            MediaType::Image
        } else {
            let ext = path
                .extension()
                .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
                .unwrap_or_default();
            return Resolution::failed(Platform::Local, input, format!("unsupported format: {}", ext));
        };

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut media = MediaResource::local(&path, media_type);
        let mut resolution = Resolution::new(Platform::Local, input).with_metadata("filename", filename);

        if media_type == MediaType::Video {
            if let Some(duration) = self.probe_duration(&path).await {
                media.duration_secs = Some(duration);
                resolution = resolution.with_metadata("duration", duration);
            }
        }

        tracing::debug!(path = %path.display(), ?media_type, "Resolved local file");
        resolution.with_media(media)
    }

    fn describe(&self) -> &'static str {
        "Local files (mp4, mkv, webm, mov, avi, flv, m4v, jpg, png, webp, gif)"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> LocalFileResolver {
        LocalFileResolver::new("ffprobe-not-installed-for-tests")
    }

    #[tokio::test]
    async fn test_video_and_image() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("talk.MP4");
        let image = dir.path().join("slide.png");
        std::fs::write(&video, b"v").unwrap();
        std::fs::write(&image, b"i").unwrap();

        let resolution = resolver().resolve(&video.to_string_lossy()).await;
        assert!(resolution.error.is_none());
        assert_eq!(resolution.media[0].media_type, MediaType::Video);
        assert_eq!(resolution.metadata["filename"], "talk.MP4");

        let input = format!("file://{}", image.display());
        let resolution = resolver().resolve(&input).await;
        assert_eq!(resolution.media[0].media_type, MediaType::Image);
        assert!(resolution.media[0].local_path().is_some());
    }

    #[tokio::test]
    async fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("notes.txt");
        std::fs::write(&doc, b"t").unwrap();

        let resolution = resolver().resolve(&doc.to_string_lossy()).await;
        assert_eq!(resolution.error.as_deref(), Some("unsupported format: .txt"));
        assert!(resolution.media.is_empty());
    }

    #[tokio::test]
    async fn test_missing_file() {
        let resolution = resolver().resolve("file:///definitely/not/here.mp4").await;
        assert_eq!(resolution.error.as_deref(), Some("file not found"));
    }

    #[test]
    fn test_looks_local() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(looks_local(&file.path().to_string_lossy()));
        assert!(looks_local("file:///nowhere.mp4"));
        assert!(!looks_local("https://youtu.be/abc"));
        assert!(!looks_local("/no/such/file.mp4"));
    }
}
