use async_trait::async_trait;
use std::path::Path;
use url::Url;

use super::{Fetcher, MediaResource, MediaType, Platform, PlatformResolver, Resolution};
use crate::extractors::{IMAGE_EXTENSIONS, VIDEO_EXTENSIONS};

/// Plain http(s) links to a media file
pub struct DirectResolver;

impl DirectResolver {
    pub fn new() -> Self {
        Self
    }

    fn media_type(url: &Url) -> Option<MediaType> {
        let filename = url.path_segments()?.last()?;
        let ext = Path::new(filename).extension()?.to_str()?.to_lowercase();

        if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaType::Video)
        } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaType::Image)
        } else {
            None
        }
    }

    fn title(url: &Url) -> Option<String> {
        let filename = url.path_segments()?.last().filter(|name| !name.is_empty())?;
        let stem = Path::new(filename).file_stem()?.to_string_lossy();
        Some(stem.replace(['_', '-'], " "))
    }
}

impl Default for DirectResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlatformResolver for DirectResolver {
    fn platform(&self) -> Platform {
        Platform::Direct
    }

    fn priority(&self) -> u32 {
        10
    }

    fn supports(&self, input: &str) -> bool {
        match Url::parse(input.trim()) {
            Ok(url) => matches!(url.scheme(), "http" | "https") && Self::media_type(&url).is_some(),
            Err(_) => false,
        }
    }

    async fn resolve(&self, input: &str) -> Resolution {
        let input = input.trim();
        let url = match Url::parse(input) {
            Ok(url) => url,
            Err(_) => return Resolution::failed(Platform::Direct, input, format!("invalid URL: {}", input)),
        };

        let Some(media_type) = Self::media_type(&url) else {
            return Resolution::failed(Platform::Direct, input, "URL does not point to a media file");
        };

        let mut media = MediaResource::remote(input, Fetcher::Http);
        media.media_type = media_type;

        let mut resolution = Resolution::new(Platform::Direct, input).with_media(media);
        if let Some(title) = Self::title(&url) {
            resolution = resolution.with_metadata("title", title);
        }
        if let Some(host) = url.host_str() {
            resolution = resolution.with_metadata("host", host.trim_start_matches("www."));
        }

        resolution
    }

    fn describe(&self) -> &'static str {
        "Direct media URLs (http/https links to video or image files)"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::MediaLocator;

    #[test]
    fn test_supports_media_urls_only() {
        let resolver = DirectResolver::new();
        assert!(resolver.supports("https://cdn.example.com/media/talk.mp4"));
        assert!(resolver.supports("http://example.com/a/b/poster.JPG?size=large"));
        assert!(!resolver.supports("https://example.com/page.html"));
        assert!(!resolver.supports("ftp://example.com/talk.mp4"));
        assert!(!resolver.supports("talk.mp4"));
    }

    #[tokio::test]
    async fn test_resolve() {
        let resolution = DirectResolver::new()
            .resolve("https://www.example.com/videos/my_first-talk.webm")
            .await;

        assert!(resolution.error.is_none());
        assert_eq!(resolution.platform, Platform::Direct);
        assert_eq!(resolution.metadata["title"], "my first talk");
        assert_eq!(resolution.metadata["host"], "example.com");
        assert_eq!(
            resolution.media[0].locator,
            MediaLocator::Remote {
                url: "https://www.example.com/videos/my_first-talk.webm".to_string(),
                fetcher: Fetcher::Http,
            }
        );
    }
}
