use chrono::{DateTime, Duration, Utc};
use fs_err::tokio as fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::tasks::TaskId;

/// Per-task scratch directories under the cache root
#[derive(Debug, Clone)]
pub struct Workspace {
    cache_root: PathBuf,
}

impl Workspace {
    pub fn new(cache_root: impl Into<PathBuf>) -> Self {
        Self {
            cache_root: cache_root.into(),
        }
    }

    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    /// Path of a task's directory, without creating it
    pub fn task_path(&self, id: &TaskId) -> PathBuf {
        self.cache_root.join(id.to_string())
    }

    /// Get or create a task's working directory
    pub async fn task_dir(&self, id: &TaskId) -> std::io::Result<PathBuf> {
        let path = self.task_path(id);
        fs::create_dir_all(&path).await?;
        Ok(path)
    }

    /// Remove a task's directory and everything in it
    pub async fn cleanup_task(&self, id: &TaskId) -> std::io::Result<bool> {
        match fs::remove_dir_all(self.task_path(id)).await {
            Ok(()) => {
                tracing::debug!(task_id = %id, "Removed task cache");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Remove task directories last modified before the retention window.
    /// Returns how many were removed.
    pub async fn purge_expired(&self, retention_days: u32) -> std::io::Result<usize> {
        let cutoff = Utc::now() - Duration::days(i64::from(retention_days));
        self.purge_older_than(cutoff).await
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> std::io::Result<usize> {
        let mut entries = match fs::read_dir(&self.cache_root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_dir() {
                continue;
            }

            let modified: DateTime<Utc> = metadata.modified()?.into();
            if modified < cutoff {
                fs::remove_dir_all(entry.path()).await?;
                tracing::info!(dir = %entry.path().display(), "Purged expired cache directory");
                removed += 1;
            }
        }

        Ok(removed)
    }
}
