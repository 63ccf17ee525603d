use async_trait::async_trait;

use super::{Platform, PlatformResolver, Resolution, YtDlp};

const HOSTS: &[&str] = &["bilibili.com", "b23.tv", "bili22.com", "bili33.com"];

/// Bilibili videos, including b23.tv short links
pub struct BilibiliResolver {
    yt_dlp: YtDlp,
}

impl BilibiliResolver {
    pub fn new(yt_dlp: YtDlp) -> Self {
        Self { yt_dlp }
    }
}

#[async_trait]
impl PlatformResolver for BilibiliResolver {
    fn platform(&self) -> Platform {
        Platform::Bilibili
    }

    fn priority(&self) -> u32 {
        90
    }

    fn supports(&self, input: &str) -> bool {
        let input = input.trim().to_lowercase();
        if input.is_empty() || input.starts_with("file://") {
            return false;
        }

        HOSTS.iter().any(|host| input.contains(host))
    }

    async fn resolve(&self, input: &str) -> Resolution {
        self.yt_dlp.resolve_page(Platform::Bilibili, input.trim()).await
    }

    fn describe(&self) -> &'static str {
        "Bilibili (bilibili.com, b23.tv)"
    }
}
