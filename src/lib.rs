//! TextGetter - extract transcripts from videos and images
//!
//! Captions, speech recognition and on-screen text are gathered from local
//! files, Bilibili, YouTube and direct media links, then merged into one
//! de-duplicated transcript per task.

pub mod cli;
pub mod config;
pub mod download;
pub mod executor;
pub mod extractors;
pub mod merge;
pub mod output;
pub mod pipeline;
pub mod platforms;
pub mod segment;
pub mod storage;
pub mod tasks;
pub mod utils;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use executor::{TaskExecutor, TaskQueue, TaskWorker};
pub use output::OutputFormat;
pub use pipeline::{ExtractMode, ExtractPipeline};
pub use segment::{MergedResult, TextSegment, TextSource};
pub use tasks::{FileTaskStore, Task, TaskId, TaskService, TaskStatus};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Error types for task commands
#[derive(thiserror::Error, Debug)]
pub enum TextGetterError {
    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("Task {id} is already {status}")]
    TaskFinished { id: TaskId, status: TaskStatus },

    #[error("Invalid task id: {0}")]
    InvalidTaskId(String),

    #[error("No result for task {0}")]
    ResultNotFound(TaskId),

    #[error("Task queue is closed")]
    QueueClosed,

    #[error(transparent)]
    Repository(#[from] tasks::RepositoryError),
}
