use async_trait::async_trait;

use super::{Platform, PlatformResolver, Resolution, YtDlp};

/// YouTube pages, fetched with yt-dlp
pub struct YoutubeResolver {
    yt_dlp: YtDlp,
}

impl YoutubeResolver {
    pub fn new(yt_dlp: YtDlp) -> Self {
        Self { yt_dlp }
    }
}

#[async_trait]
impl PlatformResolver for YoutubeResolver {
    fn platform(&self) -> Platform {
        Platform::Youtube
    }

    fn priority(&self) -> u32 {
        80
    }

    fn supports(&self, input: &str) -> bool {
        let url = input.trim().to_lowercase();
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return false;
        }

        url.contains("youtube.com/watch")
            || url.contains("youtu.be/")
            || url.contains("youtube.com/shorts/")
            || url.contains("youtube.com/embed/")
    }

    async fn resolve(&self, input: &str) -> Resolution {
        self.yt_dlp.resolve_page(Platform::Youtube, input.trim()).await
    }

    fn describe(&self) -> &'static str {
        "YouTube (youtube.com, youtu.be, shorts)"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supports() {
        let resolver = YoutubeResolver::new(YtDlp::new("yt-dlp"));
        assert!(resolver.supports("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(resolver.supports("https://youtu.be/dQw4w9WgXcQ"));
        assert!(resolver.supports("https://youtube.com/shorts/abc"));
        assert!(resolver.supports("HTTPS://WWW.YOUTUBE.COM/embed/abc"));
        assert!(!resolver.supports("https://www.youtube.com/@channel"));
        assert!(!resolver.supports("https://www.bilibili.com/video/BV1"));
    }
}
