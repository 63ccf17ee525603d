use std::sync::Arc;

use super::repository::{
    RepositoryError, ResultRepository, StatusUpdate, TaskFilter, TaskPage, TaskRepository, UpdateOutcome,
};
use super::{Task, TaskId, TaskResult, TaskStatus};
use crate::executor::TaskQueue;
use crate::output::{render, OutputFormat};
use crate::pipeline::ExtractMode;
use crate::storage::Workspace;
use crate::TextGetterError;

/// A task together with its transcript, once completed
#[derive(Debug, Clone)]
pub struct TaskDetail {
    pub task: Task,
    pub result: Option<TaskResult>,
}

pub fn parse_task_id(value: &str) -> Result<TaskId, TextGetterError> {
    value
        .parse()
        .map_err(|_| TextGetterError::InvalidTaskId(value.to_string()))
}

/// Task operations exposed to the command line
pub struct TaskService {
    tasks: Arc<dyn TaskRepository>,
    results: Arc<dyn ResultRepository>,
    workspace: Workspace,
    queue: Option<TaskQueue>,
}

impl TaskService {
    pub fn new(tasks: Arc<dyn TaskRepository>, results: Arc<dyn ResultRepository>, workspace: Workspace) -> Self {
        Self {
            tasks,
            results,
            workspace,
            queue: None,
        }
    }

    /// Hand created tasks to a background worker
    pub fn with_queue(mut self, queue: TaskQueue) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Persist a new pending task and enqueue it when a worker is attached
    pub async fn create(&self, input: &str, mode: ExtractMode) -> Result<Task, TextGetterError> {
        let task = Task::new(input.trim(), mode);
        self.tasks.create(&task).await?;
        tracing::info!(task_id = %task.id, mode = %mode, "Task created");

        if let Some(queue) = &self.queue {
            queue
                .enqueue(task.id)
                .await
                .map_err(|_| TextGetterError::QueueClosed)?;
        }

        Ok(task)
    }

    pub async fn get(&self, id: &TaskId) -> Result<TaskDetail, TextGetterError> {
        let task = self
            .tasks
            .get(id)
            .await?
            .ok_or(TextGetterError::TaskNotFound(*id))?;

        let result = if task.status == TaskStatus::Completed {
            self.results.get(id).await?
        } else {
            None
        };

        Ok(TaskDetail { task, result })
    }

    /// Mark a non-terminal task cancelled
    pub async fn cancel(&self, id: &TaskId) -> Result<Task, TextGetterError> {
        let outcome = self
            .tasks
            .update_status(id, StatusUpdate::new(TaskStatus::Cancelled))
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound(id) => TextGetterError::TaskNotFound(id),
                other => other.into(),
            })?;

        if let UpdateOutcome::Terminal(status) = outcome {
            return Err(TextGetterError::TaskFinished { id: *id, status });
        }

        tracing::info!(task_id = %id, "Task cancelled");
        Ok(self.get(id).await?.task)
    }

    pub async fn list(&self, filter: &TaskFilter) -> Result<TaskPage, TextGetterError> {
        Ok(self.tasks.list(filter).await?)
    }

    /// Remove the task, its result and its cache directory
    pub async fn delete(&self, id: &TaskId) -> Result<(), TextGetterError> {
        if !self.tasks.delete(id).await? {
            return Err(TextGetterError::TaskNotFound(*id));
        }
        self.results.delete(id).await?;

        if let Err(e) = self.workspace.cleanup_task(id).await {
            tracing::warn!(task_id = %id, error = %e, "Failed to remove task cache");
        }

        tracing::info!(task_id = %id, "Task deleted");
        Ok(())
    }

    /// Render a completed task's transcript
    pub async fn export(&self, id: &TaskId, format: OutputFormat) -> crate::Result<String> {
        let detail = self.get(id).await?;
        let result = detail.result.ok_or(TextGetterError::ResultNotFound(*id))?;
        render(&result.result, detail.task.title(), format)
    }
}
