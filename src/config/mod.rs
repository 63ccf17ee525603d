use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::pipeline::ExtractMode;

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "TEXTGETTER_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where tasks, results and the media cache live
    pub storage: StorageConfig,

    /// Extraction defaults
    pub extract: ExtractConfig,

    /// External executables
    pub tools: ToolsConfig,

    /// Background execution
    pub worker: WorkerConfig,

    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,

    /// Defaults to `<data_dir>/cache`
    pub cache_dir: Option<PathBuf>,

    /// Days a task's cache directory survives `cleanup`
    pub retention_days: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    pub default_mode: ExtractMode,

    /// Language passed to speech recognition
    pub language: String,

    /// Whisper model size
    pub asr_model: String,

    /// Seconds between sampled frames for screen text
    pub ocr_interval: f64,

    /// Caption languages requested from yt-dlp
    pub subtitle_langs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub yt_dlp: String,
    pub ffmpeg: String,
    pub ffprobe: String,
    pub whisper: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub max_concurrent_tasks: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human readable output
    pub json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            extract: ExtractConfig::default(),
            tools: ToolsConfig::default(),
            worker: WorkerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            cache_dir: None,
            retention_days: 7,
        }
    }
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            default_mode: ExtractMode::Full,
            language: "zh".to_string(),
            asr_model: "base".to_string(),
            ocr_interval: 1.0,
            subtitle_langs: ["zh", "zh-Hans", "zh-CN", "en"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            yt_dlp: "yt-dlp".to_string(),
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
            whisper: "whisper".to_string(),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 2,
        }
    }
}

impl Config {
    /// Load configuration from file or create default.
    ///
    /// Lookup order: `explicit`, `./config.yaml`, the user config directory.
    pub async fn load(explicit: Option<&Path>) -> Result<Self> {
        let config_path = Self::config_path(explicit)?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Self::default();
            config.save_to(&config_path)?;
            tracing::info!(path = %config_path.display(), "Wrote default configuration");
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs_err::read_to_string(path).context("Failed to read config file")?;

        let config: Config = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;

        fs_err::write(path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    pub fn config_path(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            return Ok(path.to_path_buf());
        }

        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir().context("Could not determine config directory")?;

        Ok(config_dir.join("textgetter").join("config.yaml"))
    }

    /// Point storage at another data directory
    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.storage.data_dir = data_dir.into();
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.storage.data_dir
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.storage
            .cache_dir
            .clone()
            .unwrap_or_else(|| self.storage.data_dir.join("cache"))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.storage.retention_days == 0 {
            anyhow::bail!("storage.retention_days must be at least 1");
        }

        if self.worker.max_concurrent_tasks == 0 {
            anyhow::bail!("worker.max_concurrent_tasks must be at least 1");
        }

        if !(self.extract.ocr_interval > 0.0) {
            anyhow::bail!("extract.ocr_interval must be positive");
        }

        if self.extract.language.trim().is_empty() {
            anyhow::bail!("extract.language must not be empty");
        }

        Ok(())
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Data Dir: {}", self.storage.data_dir.display());
        println!("  Cache Dir: {}", self.cache_dir().display());
        println!("  Retention: {} days", self.storage.retention_days);
        println!("  Default Mode: {}", self.extract.default_mode);
        println!("  Language: {}", self.extract.language);
        println!("  ASR Model: {}", self.extract.asr_model);
        println!("  Subtitle Languages: {}", self.extract.subtitle_langs.join(", "));
        println!("  Max Concurrent Tasks: {}", self.worker.max_concurrent_tasks);
        println!("  JSON Logs: {}", self.logging.json);
    }
}
