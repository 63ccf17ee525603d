use async_trait::async_trait;
use fs_err::tokio as fs;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use super::repository::{
    RepositoryError, ResultRepository, StatusUpdate, TaskFilter, TaskPage, TaskRepository, UpdateOutcome,
};
use super::{Metadata, Task, TaskId, TaskResult};
use crate::platforms::Platform;
use crate::segment::MergedResult;

/// Task and result records as JSON documents under a data directory.
///
/// ```text
/// <root>/tasks/<id>.json
/// <root>/results/<id>.json
/// ```
///
/// Read-modify-write cycles are serialised by one lock, so the terminal-state
/// guard holds for every writer sharing this store.
pub struct FileTaskStore {
    tasks_dir: PathBuf,
    results_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileTaskStore {
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let root = root.as_ref();
        let tasks_dir = root.join("tasks");
        let results_dir = root.join("results");

        fs::create_dir_all(&tasks_dir).await?;
        fs::create_dir_all(&results_dir).await?;

        tracing::debug!(root = %root.display(), "Opened task store");

        Ok(Self {
            tasks_dir,
            results_dir,
            write_lock: Mutex::new(()),
        })
    }

    fn task_path(&self, id: &TaskId) -> PathBuf {
        self.tasks_dir.join(format!("{}.json", id))
    }

    fn result_path(&self, id: &TaskId) -> PathBuf {
        self.results_dir.join(format!("{}.json", id))
    }

    async fn load_task(&self, id: &TaskId) -> Result<Option<Task>, RepositoryError> {
        read_json(&self.task_path(id), &id.to_string()).await
    }

    async fn modify<F>(&self, id: &TaskId, change: F) -> Result<UpdateOutcome, RepositoryError>
    where
        F: FnOnce(&mut Task) -> bool + Send,
    {
        let _guard = self.write_lock.lock().await;

        let mut task = self
            .load_task(id)
            .await?
            .ok_or(RepositoryError::NotFound(*id))?;

        if !change(&mut task) {
            return Ok(UpdateOutcome::Terminal(task.status));
        }

        write_json(&self.task_path(id), &task).await?;
        Ok(UpdateOutcome::Applied)
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path, id: &str) -> Result<Option<T>, RepositoryError> {
    let content = match fs::read(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    serde_json::from_slice(&content)
        .map(Some)
        .map_err(|e| RepositoryError::Corrupt {
            id: id.to_string(),
            message: e.to_string(),
        })
}

/// Write through a temp file and rename so readers never see half a document
async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), RepositoryError> {
    let content = serde_json::to_vec_pretty(value).map_err(|e| RepositoryError::Corrupt {
        id: path.display().to_string(),
        message: e.to_string(),
    })?;

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, content).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

async fn remove(path: &Path) -> Result<bool, RepositoryError> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl TaskRepository for FileTaskStore {
    async fn create(&self, task: &Task) -> Result<(), RepositoryError> {
        let _guard = self.write_lock.lock().await;

        let path = self.task_path(&task.id);
        if fs::metadata(&path).await.is_ok() {
            return Err(RepositoryError::AlreadyExists(task.id));
        }

        write_json(&path, task).await
    }

    async fn get(&self, id: &TaskId) -> Result<Option<Task>, RepositoryError> {
        self.load_task(id).await
    }

    async fn update_status(&self, id: &TaskId, update: StatusUpdate) -> Result<UpdateOutcome, RepositoryError> {
        self.modify(id, move |task| task.apply(update)).await
    }

    async fn update_resolution(
        &self,
        id: &TaskId,
        platform: Platform,
        metadata: Metadata,
    ) -> Result<UpdateOutcome, RepositoryError> {
        self.modify(id, move |task| task.resolve(platform, metadata)).await
    }

    async fn list(&self, filter: &TaskFilter) -> Result<TaskPage, RepositoryError> {
        let mut entries = fs::read_dir(&self.tasks_dir).await?;
        let mut matching = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            let name = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
            let task: Task = match read_json(&path, &name).await {
                Ok(Some(task)) => task,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unreadable task record");
                    continue;
                }
            };

            let platform_ok = filter.platform.map_or(true, |p| task.platform == p);
            let status_ok = filter.status.map_or(true, |s| task.status == s);
            if platform_ok && status_ok {
                matching.push(task);
            }
        }

        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        let total = matching.len();
        let items = matching
            .into_iter()
            .skip(filter.offset)
            .take(filter.limit)
            .collect();

        Ok(TaskPage { items, total })
    }

    async fn delete(&self, id: &TaskId) -> Result<bool, RepositoryError> {
        let _guard = self.write_lock.lock().await;
        remove(&self.task_path(id)).await
    }
}

#[async_trait]
impl ResultRepository for FileTaskStore {
    async fn save(&self, id: &TaskId, result: &MergedResult) -> Result<(), RepositoryError> {
        let _guard = self.write_lock.lock().await;

        let path = self.result_path(id);
        if fs::metadata(&path).await.is_ok() {
            return Err(RepositoryError::AlreadyExists(*id));
        }

        write_json(&path, &TaskResult::new(*id, result.clone())).await
    }

    async fn get(&self, id: &TaskId) -> Result<Option<TaskResult>, RepositoryError> {
        read_json(&self.result_path(id), &id.to_string()).await
    }

    async fn delete(&self, id: &TaskId) -> Result<bool, RepositoryError> {
        let _guard = self.write_lock.lock().await;
        remove(&self.result_path(id)).await
    }
}
