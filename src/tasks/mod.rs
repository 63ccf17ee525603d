//! Task records: the durable unit of work tracked from input to transcript.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub mod repository;
pub mod service;
pub mod store;

pub use repository::{
    RepositoryError, ResultRepository, StatusUpdate, TaskFilter, TaskPage, TaskRepository, UpdateOutcome,
};
pub use service::{parse_task_id, TaskDetail, TaskService};
pub use store::FileTaskStore;

use crate::pipeline::ExtractMode;
use crate::platforms::Platform;
use crate::segment::MergedResult;

/// Opaque platform-provided key/value data (title, author, duration, ...)
pub type Metadata = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Lifecycle states, in forward order, followed by the terminal failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Created,
    Pending,
    Parsing,
    Downloading,
    Extracting,
    Merging,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Created => "created",
            TaskStatus::Pending => "pending",
            TaskStatus::Parsing => "parsing",
            TaskStatus::Downloading => "downloading",
            TaskStatus::Extracting => "extracting",
            TaskStatus::Merging => "merging",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    /// No transition leaves a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(TaskStatus::Created),
            "pending" => Ok(TaskStatus::Pending),
            "parsing" => Ok(TaskStatus::Parsing),
            "downloading" => Ok(TaskStatus::Downloading),
            "extracting" => Ok(TaskStatus::Extracting),
            "merging" => Ok(TaskStatus::Merging),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            "cancelled" => Ok(TaskStatus::Cancelled),
            _ => Err(format!("Invalid task status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Pending,
    Running,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageProgress {
    pub status: StageStatus,
    pub progress: u8,
}

impl StageProgress {
    pub fn pending() -> Self {
        Self {
            status: StageStatus::Pending,
            progress: 0,
        }
    }

    pub fn running(progress: u8) -> Self {
        Self {
            status: StageStatus::Running,
            progress: progress.min(100),
        }
    }

    pub fn done() -> Self {
        Self {
            status: StageStatus::Done,
            progress: 100,
        }
    }
}

/// Stage name to progress
pub type StageMap = BTreeMap<String, StageProgress>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub input: String,
    pub platform: Platform,
    #[serde(default)]
    pub mode: ExtractMode,
    pub status: TaskStatus,
    pub progress: u8,
    #[serde(default)]
    pub stage_progress: StageMap,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// New task, queued for background execution
    pub fn new(input: impl Into<String>, mode: ExtractMode) -> Self {
        let now = Utc::now();
        Self {
            id: TaskId::new(),
            input: input.into(),
            platform: Platform::Unknown,
            mode,
            status: TaskStatus::Pending,
            progress: 0,
            stage_progress: StageMap::new(),
            error: None,
            metadata: Metadata::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Apply one batched status change.
    ///
    /// Progress never moves backwards, stage entries are merged into the
    /// existing map, and an error is only recorded by a transition to
    /// `failed`. Returns `false` without touching anything when the task is
    /// already terminal.
    pub fn apply(&mut self, update: StatusUpdate) -> bool {
        if self.is_terminal() {
            return false;
        }

        self.status = update.status;
        if let Some(progress) = update.progress {
            self.progress = self.progress.max(progress.min(100));
        }
        self.stage_progress.extend(update.stages);
        if update.status == TaskStatus::Failed {
            self.error = update.error.or_else(|| Some("unknown error".to_string()));
        }
        self.updated_at = Utc::now();
        true
    }

    /// Record the outcome of input resolution
    pub fn resolve(&mut self, platform: Platform, metadata: Metadata) -> bool {
        if self.is_terminal() {
            return false;
        }

        self.platform = platform;
        self.metadata = metadata;
        self.updated_at = Utc::now();
        true
    }

    /// Title from platform metadata, falling back to the file name
    pub fn title(&self) -> Option<&str> {
        ["title", "filename"]
            .iter()
            .find_map(|key| self.metadata.get(*key).and_then(|v| v.as_str()))
            .filter(|s| !s.is_empty())
    }
}

/// A persisted transcript, created once when its task completes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResult {
    pub task_id: TaskId,
    #[serde(flatten)]
    pub result: MergedResult,
    pub created_at: DateTime<Utc>,
}

impl TaskResult {
    pub fn new(task_id: TaskId, result: MergedResult) -> Self {
        Self {
            task_id,
            result,
            created_at: Utc::now(),
        }
    }
}
