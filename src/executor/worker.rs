use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::Instrument;

use super::TaskExecutor;
use crate::tasks::TaskId;

const QUEUE_CAPACITY: usize = 256;

#[derive(Debug, thiserror::Error)]
#[error("task queue is closed")]
pub struct QueueClosed;

/// Sending half of the worker queue
#[derive(Clone)]
pub struct TaskQueue {
    sender: mpsc::Sender<TaskId>,
}

impl TaskQueue {
    pub fn new() -> (Self, mpsc::Receiver<TaskId>) {
        let (sender, receiver) = mpsc::channel(QUEUE_CAPACITY);
        (Self { sender }, receiver)
    }

    pub async fn enqueue(&self, id: TaskId) -> Result<(), QueueClosed> {
        self.sender.send(id).await.map_err(|_| QueueClosed)
    }
}

/// Ids with a run outstanding
#[derive(Clone, Default)]
struct InFlight(Arc<Mutex<HashSet<TaskId>>>);

/// Releases its id when dropped
struct Claim {
    id: TaskId,
    set: InFlight,
}

impl InFlight {
    fn try_claim(&self, id: TaskId) -> Option<Claim> {
        let mut ids = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if !ids.insert(id) {
            return None;
        }
        Some(Claim { id, set: self.clone() })
    }
}

impl Drop for Claim {
    fn drop(&mut self) {
        let mut ids = self.set.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        ids.remove(&self.id);
    }
}

/// Runs queued tasks in the background, at most `max_concurrent` at a time
pub struct TaskWorker {
    receiver: mpsc::Receiver<TaskId>,
    executor: Arc<TaskExecutor>,
    permits: Arc<Semaphore>,
    in_flight: InFlight,
}

impl TaskWorker {
    pub fn new(receiver: mpsc::Receiver<TaskId>, executor: Arc<TaskExecutor>, max_concurrent: usize) -> Self {
        Self {
            receiver,
            executor,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            in_flight: InFlight::default(),
        }
    }

    /// Process ids until every [`TaskQueue`] is dropped, then wait for the
    /// outstanding runs
    pub async fn run(mut self) {
        tracing::info!("Task worker started");
        let mut running = JoinSet::new();

        loop {
            tokio::select! {
                message = self.receiver.recv() => {
                    let Some(id) = message else { break };
                    self.spawn(&mut running, id);
                }
                Some(joined) = running.join_next(), if !running.is_empty() => {
                    if let Err(e) = joined {
                        tracing::error!(error = %e, "Task run panicked");
                    }
                }
            }
        }

        while let Some(joined) = running.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Task run panicked");
            }
        }
        tracing::info!("Task worker stopped: queue closed");
    }

    fn spawn(&self, running: &mut JoinSet<()>, id: TaskId) {
        let Some(claim) = self.in_flight.try_claim(id) else {
            tracing::debug!(task_id = %id, "Task already running, ignoring duplicate");
            return;
        };

        let executor = self.executor.clone();
        let permits = self.permits.clone();
        let span = tracing::info_span!("task", task_id = %id);

        running.spawn(
            async move {
                let _claim = claim;
                let Ok(_permit) = permits.acquire_owned().await else {
                    return;
                };

                if let Err(e) = executor.execute(&id).await {
                    tracing::error!(error = %e, "Task execution failed");
                }
            }
            .instrument(span),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::MockDownloader;
    use crate::extractors::{MockSourceExtractor, SourceExtractor};
    use crate::pipeline::{ExtractMode, ExtractPipeline};
    use crate::platforms::{MediaResource, MediaType, MockInputResolver, Platform, Resolution};
    use crate::segment::{TextSegment, TextSource};
    use crate::storage::Workspace;
    use crate::tasks::{FileTaskStore, Task, TaskRepository, TaskStatus};

    #[test]
    fn test_in_flight_claims() {
        let in_flight = InFlight::default();
        let id = TaskId::new();

        let claim = in_flight.try_claim(id);
        assert!(claim.is_some());
        assert!(in_flight.try_claim(id).is_none());
        assert!(in_flight.try_claim(TaskId::new()).is_some());

        drop(claim);
        assert!(in_flight.try_claim(id).is_some());
    }

    #[tokio::test]
    async fn test_enqueue_after_close() {
        let (queue, receiver) = TaskQueue::new();
        drop(receiver);
        assert!(queue.enqueue(TaskId::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_worker_drains_queue() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileTaskStore::open(dir.path()).await.unwrap());
        let media = dir.path().join("clip.mp4");
        std::fs::write(&media, b"media").unwrap();

        let mut resolver = MockInputResolver::new();
        let path = media.clone();
        resolver.expect_resolve().returning(move |input| {
            Ok(Resolution::new(Platform::Local, input).with_media(MediaResource::local(&path, MediaType::Video)))
        });

        let mut subtitle = MockSourceExtractor::new();
        subtitle.expect_extract().returning(|_, _| {
            TextSegment::new(TextSource::Subtitle, 0.0, 1.0, "line").into_iter().collect()
        });
        let mut asr = MockSourceExtractor::new();
        asr.expect_extract().returning(|_, _| Vec::new());
        let subtitle: Arc<dyn SourceExtractor> = Arc::new(subtitle);
        let asr: Arc<dyn SourceExtractor> = Arc::new(asr);

        let executor = Arc::new(TaskExecutor::new(
            store.clone(),
            store.clone(),
            Arc::new(resolver),
            Arc::new(MockDownloader::new()),
            Arc::new(ExtractPipeline::new(subtitle, asr)),
            Workspace::new(dir.path().join("cache")),
        ));

        let (queue, receiver) = TaskQueue::new();
        let mut ids = Vec::new();
        for _ in 0..3 {
            let task = Task::new(media.to_string_lossy(), ExtractMode::Full);
            store.create(&task).await.unwrap();
            queue.enqueue(task.id).await.unwrap();
            ids.push(task.id);
        }
        drop(queue);

        TaskWorker::new(receiver, executor, 2).run().await;

        for id in ids {
            let task = TaskRepository::get(store.as_ref(), &id).await.unwrap().unwrap();
            assert_eq!(task.status, TaskStatus::Completed);
        }
    }
}
