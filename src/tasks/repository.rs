use async_trait::async_trait;

use super::{Metadata, StageMap, StageProgress, Task, TaskId, TaskResult, TaskStatus};
use crate::platforms::Platform;
use crate::segment::MergedResult;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("storage failed: {0}")]
    Storage(#[from] std::io::Error),
    #[error("corrupt record {id}: {message}")]
    Corrupt { id: String, message: String },
    #[error("not found: {0}")]
    NotFound(TaskId),
    #[error("already exists: {0}")]
    AlreadyExists(TaskId),
}

/// Whether a guarded write landed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Applied,
    /// The task had already reached this terminal state; nothing was written
    Terminal(TaskStatus),
}

impl UpdateOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, UpdateOutcome::Applied)
    }
}

/// Fields committed together by one status transition
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub status: TaskStatus,
    pub progress: Option<u8>,
    pub stages: StageMap,
    pub error: Option<String>,
}

impl StatusUpdate {
    pub fn new(status: TaskStatus) -> Self {
        Self {
            status,
            progress: None,
            stages: StageMap::new(),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(TaskStatus::Failed)
        }
    }

    pub fn progress(mut self, progress: u8) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn stage(mut self, name: &str, progress: StageProgress) -> Self {
        self.stages.insert(name.to_string(), progress);
        self
    }
}

/// Listing filters and pagination
#[derive(Debug, Clone, PartialEq)]
pub struct TaskFilter {
    pub platform: Option<Platform>,
    pub status: Option<TaskStatus>,
    pub limit: usize,
    pub offset: usize,
}

impl Default for TaskFilter {
    fn default() -> Self {
        Self {
            platform: None,
            status: None,
            limit: 50,
            offset: 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TaskPage {
    pub items: Vec<Task>,
    /// Matches before pagination
    pub total: usize,
}

/// Durable task records.
///
/// Every write is one atomic commit. Writes against a task that is already
/// terminal are refused with [`UpdateOutcome::Terminal`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn create(&self, task: &Task) -> Result<(), RepositoryError>;

    async fn get(&self, id: &TaskId) -> Result<Option<Task>, RepositoryError>;

    async fn update_status(&self, id: &TaskId, update: StatusUpdate) -> Result<UpdateOutcome, RepositoryError>;

    /// Store the platform and metadata found while resolving the input
    async fn update_resolution(
        &self,
        id: &TaskId,
        platform: Platform,
        metadata: Metadata,
    ) -> Result<UpdateOutcome, RepositoryError>;

    /// Newest first
    async fn list(&self, filter: &TaskFilter) -> Result<TaskPage, RepositoryError>;

    async fn delete(&self, id: &TaskId) -> Result<bool, RepositoryError>;
}

/// Completed transcripts, one per task, never updated
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResultRepository: Send + Sync {
    async fn save(&self, id: &TaskId, result: &MergedResult) -> Result<(), RepositoryError>;

    async fn get(&self, id: &TaskId) -> Result<Option<TaskResult>, RepositoryError>;

    async fn delete(&self, id: &TaskId) -> Result<bool, RepositoryError>;
}
