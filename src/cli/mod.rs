use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::CONFIG_ENV;
use crate::output::OutputFormat;
use crate::pipeline::ExtractMode;
use crate::platforms::Platform;
use crate::tasks::TaskStatus;

#[derive(Parser)]
#[command(
    name = "textgetter",
    about = "TextGetter - Extract transcripts from videos and images by merging captions and speech recognition",
    version,
    long_about = "Extract the text of a video or image from local files, Bilibili, YouTube and direct media links. Captions, speech recognition and on-screen text are merged into one de-duplicated transcript, tracked as a task that can be listed, exported and cleaned up later."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file
    #[arg(long, global = true, env = CONFIG_ENV, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Override storage.data_dir
    #[arg(long, global = true, env = "TEXTGETTER_DATA_DIR", value_name = "DIR")]
    pub data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract text from a URL or local file and wait for the transcript
    Extract {
        /// Local file, Bilibili/YouTube link or direct media URL
        #[arg(value_name = "URL_OR_FILE")]
        input: String,

        /// Which extractors to run (defaults to extract.default_mode)
        #[arg(short, long, value_enum)]
        mode: Option<ExtractMode>,

        /// Output file path (prints to console if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Create a pending task without running it
    Submit {
        #[arg(value_name = "URL_OR_FILE")]
        input: String,

        #[arg(short, long, value_enum)]
        mode: Option<ExtractMode>,
    },

    /// Execute tasks through the background worker
    Run {
        /// Task ids to execute
        #[arg(value_name = "TASK_ID", required_unless_present = "pending")]
        task_ids: Vec<String>,

        /// Execute every pending task
        #[arg(long)]
        pending: bool,
    },

    /// Show a task's status, progress and metadata
    Show {
        #[arg(value_name = "TASK_ID")]
        task_id: String,
    },

    /// List tasks, newest first
    List {
        #[arg(long, value_enum)]
        platform: Option<Platform>,

        #[arg(long, value_enum)]
        status: Option<TaskStatus>,

        #[arg(long, default_value = "20")]
        limit: usize,

        #[arg(long, default_value = "0")]
        offset: usize,
    },

    /// Cancel a task that has not finished
    Cancel {
        #[arg(value_name = "TASK_ID")]
        task_id: String,
    },

    /// Delete a task, its transcript and its cached media
    Delete {
        #[arg(value_name = "TASK_ID")]
        task_id: String,
    },

    /// Write a completed task's transcript
    Export {
        #[arg(value_name = "TASK_ID")]
        task_id: String,

        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Output file path (prints to console if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Remove cached media older than storage.retention_days
    Cleanup,

    /// Show or locate the configuration
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },

    /// List supported platforms
    Platforms,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_extract() {
        let cli = Cli::try_parse_from([
            "textgetter",
            "extract",
            "https://b23.tv/abc",
            "--mode",
            "subtitle_first",
            "--format",
            "srt",
        ])
        .unwrap();

        match cli.command {
            Commands::Extract { input, mode, format, .. } => {
                assert_eq!(input, "https://b23.tv/abc");
                assert_eq!(mode, Some(ExtractMode::SubtitleFirst));
                assert_eq!(format, OutputFormat::Srt);
            }
            _ => panic!("expected extract"),
        }
    }

    #[test]
    fn test_run_requires_ids_or_pending() {
        assert!(Cli::try_parse_from(["textgetter", "run"]).is_err());
        assert!(Cli::try_parse_from(["textgetter", "run", "--pending"]).is_ok());
    }

    #[test]
    fn test_list_filters() {
        let cli = Cli::try_parse_from(["textgetter", "list", "--platform", "bilibili", "--status", "failed"]).unwrap();
        match cli.command {
            Commands::List { platform, status, limit, .. } => {
                assert_eq!(platform, Some(Platform::Bilibili));
                assert_eq!(status, Some(TaskStatus::Failed));
                assert_eq!(limit, 20);
            }
            _ => panic!("expected list"),
        }
    }
}
