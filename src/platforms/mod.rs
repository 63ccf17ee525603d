use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub mod bilibili;
pub mod direct;
pub mod local;
pub mod youtube;
pub mod ytdlp;

pub use bilibili::BilibiliResolver;
pub use direct::DirectResolver;
pub use local::LocalFileResolver;
pub use youtube::YoutubeResolver;
pub use ytdlp::YtDlp;

use crate::config::Config;
use crate::tasks::Metadata;

/// Source platform of a task's input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Local,
    Bilibili,
    Youtube,
    Direct,
    #[default]
    Unknown,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Local => "local",
            Platform::Bilibili => "bilibili",
            Platform::Youtube => "youtube",
            Platform::Direct => "direct",
            Platform::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Platform::Local),
            "bilibili" => Ok(Platform::Bilibili),
            "youtube" => Ok(Platform::Youtube),
            "direct" => Ok(Platform::Direct),
            "unknown" => Ok(Platform::Unknown),
            _ => Err(format!("Invalid platform: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Video,
    Image,
}

/// Tool that knows how to fetch a remote locator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fetcher {
    /// Site page handled by yt-dlp, which also pulls captions
    YtDlp,
    /// Plain media file over HTTP
    Http,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MediaLocator {
    Local(PathBuf),
    Remote { url: String, fetcher: Fetcher },
}

/// One video or image found by resolution
#[derive(Debug, Clone, PartialEq)]
pub struct MediaResource {
    pub locator: MediaLocator,
    pub media_type: MediaType,
    pub duration_secs: Option<f64>,
}

impl MediaResource {
    pub fn local(path: impl Into<PathBuf>, media_type: MediaType) -> Self {
        Self {
            locator: MediaLocator::Local(path.into()),
            media_type,
            duration_secs: None,
        }
    }

    pub fn remote(url: impl Into<String>, fetcher: Fetcher) -> Self {
        Self {
            locator: MediaLocator::Remote {
                url: url.into(),
                fetcher,
            },
            media_type: MediaType::Video,
            duration_secs: None,
        }
    }

    pub fn local_path(&self) -> Option<&Path> {
        match &self.locator {
            MediaLocator::Local(path) => Some(path),
            MediaLocator::Remote { .. } => None,
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self.locator, MediaLocator::Remote { .. })
    }
}

/// Outcome of resolving one input string.
///
/// A resolver that recognised the input but could not use it reports this
/// through `error` rather than failing.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub platform: Platform,
    pub media: Vec<MediaResource>,
    pub metadata: Metadata,
    pub input: String,
    pub error: Option<String>,
}

impl Resolution {
    pub fn new(platform: Platform, input: impl Into<String>) -> Self {
        Self {
            platform,
            media: Vec::new(),
            metadata: Metadata::new(),
            input: input.into(),
            error: None,
        }
    }

    pub fn failed(platform: Platform, input: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(platform, input)
        }
    }

    pub fn with_media(mut self, media: MediaResource) -> Self {
        self.media.push(media);
        self
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// No resolver accepts the input
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct UnsupportedInput {
    pub message: String,
    pub platform: Option<Platform>,
}

impl UnsupportedInput {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            platform: None,
        }
    }
}

/// One platform adapter
#[async_trait]
pub trait PlatformResolver: Send + Sync {
    fn platform(&self) -> Platform;

    /// Higher runs first
    fn priority(&self) -> u32;

    fn supports(&self, input: &str) -> bool;

    async fn resolve(&self, input: &str) -> Resolution;

    /// Human readable description for `platforms`
    fn describe(&self) -> &'static str;
}

/// Input resolution capability used by the executor
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InputResolver: Send + Sync {
    async fn resolve(&self, input: &str) -> Result<Resolution, UnsupportedInput>;
}

/// Registry for dispatching input to the first matching resolver
pub struct ResolverRegistry {
    resolvers: Vec<Box<dyn PlatformResolver>>,
}

impl ResolverRegistry {
    pub fn new() -> Self {
        Self {
            resolvers: Vec::new(),
        }
    }

    /// Registry with every built-in resolver
    pub fn with_defaults(config: &Config) -> Self {
        let yt_dlp = YtDlp::new(&config.tools.yt_dlp);

        let mut registry = Self::new();
        registry.register(Box::new(LocalFileResolver::new(&config.tools.ffprobe)));
        registry.register(Box::new(BilibiliResolver::new(yt_dlp.clone())));
        registry.register(Box::new(YoutubeResolver::new(yt_dlp)));
        registry.register(Box::new(DirectResolver::new()));
        registry
    }

    /// Register a resolver, keeping the list ordered by descending priority
    pub fn register(&mut self, resolver: Box<dyn PlatformResolver>) {
        self.resolvers.push(resolver);
        self.resolvers.sort_by_key(|r| std::cmp::Reverse(r.priority()));
    }

    pub fn find(&self, input: &str) -> Option<&dyn PlatformResolver> {
        self.resolvers
            .iter()
            .find(|resolver| resolver.supports(input))
            .map(|boxed| boxed.as_ref())
    }

    pub fn list_platforms(&self) -> Vec<(Platform, &'static str)> {
        self.resolvers
            .iter()
            .map(|resolver| (resolver.platform(), resolver.describe()))
            .collect()
    }
}

impl Default for ResolverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InputResolver for ResolverRegistry {
    async fn resolve(&self, input: &str) -> Result<Resolution, UnsupportedInput> {
        let input = input.trim();

        match self.find(input) {
            Some(resolver) => {
                tracing::debug!(platform = %resolver.platform(), "Resolving input");
                Ok(resolver.resolve(input).await)
            }
            None if local::looks_local(input) => Err(UnsupportedInput {
                message: "cannot handle local file".to_string(),
                platform: Some(Platform::Local),
            }),
            None => {
                let shown: String = input.chars().take(80).collect();
                Err(UnsupportedInput::new(format!("unsupported link: {}...", shown)))
            }
        }
    }
}
