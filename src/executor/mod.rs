//! Drives one task from `pending` to a terminal state.
//!
//! Every transition is one guarded write through the [`TaskRepository`]. When
//! the store reports the task already terminal (typically a concurrent
//! cancel), execution stops without writing anything further.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;

pub mod worker;

pub use worker::{TaskQueue, TaskWorker};

use crate::config::Config;
use crate::download::{locate_media, Downloader, MediaDownloader};
use crate::pipeline::{ExtractMode, ExtractPipeline, PipelineStage};
use crate::platforms::{InputResolver, MediaResource, ResolverRegistry, YtDlp};
use crate::segment::MergedResult;
use crate::storage::Workspace;
use crate::tasks::{
    RepositoryError, ResultRepository, StageProgress, StatusUpdate, TaskId, TaskRepository, TaskStatus,
    UpdateOutcome,
};

/// Overall progress on entering each status
const PARSING_PROGRESS: u8 = 5;
const DOWNLOADING_PROGRESS: u8 = 10;
const EXTRACTING_PROGRESS: u8 = 15;
const MERGING_PROGRESS: u8 = 95;
const COMPLETED_PROGRESS: u8 = 100;

#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
    #[error("extraction crashed: {0}")]
    Fault(String),
}

/// Overall progress inside the extracting band for a pipeline stage event
fn extracting_progress(stage: PipelineStage, pct: u8) -> u8 {
    let (start, end) = match stage {
        PipelineStage::Subtitle => (15u32, 30u32),
        PipelineStage::Asr => (30, 75),
        PipelineStage::Ocr => (75, 88),
        PipelineStage::Merge => (88, 90),
    };
    (start + (end - start) * u32::from(pct.min(100)) / 100) as u8
}

fn stage_progress(pct: u8) -> StageProgress {
    if pct >= 100 {
        StageProgress::done()
    } else {
        StageProgress::running(pct)
    }
}

pub struct TaskExecutor {
    tasks: Arc<dyn TaskRepository>,
    results: Arc<dyn ResultRepository>,
    resolver: Arc<dyn InputResolver>,
    downloader: Arc<dyn Downloader>,
    pipeline: Arc<ExtractPipeline>,
    workspace: Workspace,
}

impl TaskExecutor {
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        results: Arc<dyn ResultRepository>,
        resolver: Arc<dyn InputResolver>,
        downloader: Arc<dyn Downloader>,
        pipeline: Arc<ExtractPipeline>,
        workspace: Workspace,
    ) -> Self {
        Self {
            tasks,
            results,
            resolver,
            downloader,
            pipeline,
            workspace,
        }
    }

    /// Executor wired with the built-in resolvers, downloader and pipeline
    pub fn from_config(
        config: &Config,
        tasks: Arc<dyn TaskRepository>,
        results: Arc<dyn ResultRepository>,
    ) -> Self {
        let downloader = MediaDownloader::new(
            YtDlp::new(&config.tools.yt_dlp),
            config.extract.subtitle_langs.clone(),
        );

        Self::new(
            tasks,
            results,
            Arc::new(ResolverRegistry::with_defaults(config)),
            Arc::new(downloader),
            Arc::new(ExtractPipeline::from_config(config)),
            Workspace::new(config.cache_dir()),
        )
    }

    /// Run a task to a terminal state.
    ///
    /// Resolution and acquisition failures end as a `failed` task and return
    /// `Ok`. Unexpected faults also mark the task failed, then surface as `Err`.
    pub async fn execute(&self, id: &TaskId) -> Result<(), ExecutorError> {
        match self.run(id).await {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::error!(task_id = %id, error = %e, "Task execution fault");
                if let Err(update_err) = self.tasks.update_status(id, StatusUpdate::failed(e.to_string())).await {
                    tracing::error!(task_id = %id, error = %update_err, "Failed to record task failure");
                }
                Err(e)
            }
        }
    }

    async fn run(&self, id: &TaskId) -> Result<(), ExecutorError> {
        let Some(task) = self.tasks.get(id).await? else {
            tracing::warn!(task_id = %id, "Task not found, nothing to execute");
            return Ok(());
        };

        if task.is_terminal() {
            tracing::debug!(task_id = %id, status = %task.status, "Task already finished, skipping");
            return Ok(());
        }

        // PARSING
        let update = StatusUpdate::new(TaskStatus::Parsing)
            .progress(PARSING_PROGRESS)
            .stage("parsing", StageProgress::running(0));
        if !self.advance(id, update).await? {
            return Ok(());
        }

        let resolution = match self.resolver.resolve(&task.input).await {
            Ok(resolution) => resolution,
            Err(unsupported) => return self.fail(id, unsupported.message).await,
        };
        if let Some(error) = resolution.error {
            return self.fail(id, error).await;
        }
        let Some(media) = resolution.media.into_iter().next() else {
            return self.fail(id, "no media found").await;
        };

        tracing::info!(task_id = %id, platform = %resolution.platform, "Input resolved");
        if !self.record(
            self.tasks
                .update_resolution(id, resolution.platform, resolution.metadata)
                .await?,
        ) {
            return Ok(());
        }

        // DOWNLOADING
        let update = StatusUpdate::new(TaskStatus::Downloading)
            .progress(DOWNLOADING_PROGRESS)
            .stage("parsing", StageProgress::done())
            .stage("downloading", StageProgress::running(0));
        if !self.advance(id, update).await? {
            return Ok(());
        }

        let media_path = match self.acquire(id, &media).await {
            Ok(path) => path,
            Err(message) => return self.fail(id, message).await,
        };
        let Some(media_path) = media_path.filter(|path| path.exists()) else {
            return self.fail(id, "media unavailable").await;
        };

        // EXTRACTING
        let mut stages = vec![PipelineStage::Subtitle, PipelineStage::Asr];
        if self.pipeline.has_screen_text() {
            stages.push(PipelineStage::Ocr);
        }
        stages.push(PipelineStage::Merge);

        let mut update = StatusUpdate::new(TaskStatus::Extracting)
            .progress(EXTRACTING_PROGRESS)
            .stage("downloading", StageProgress::done());
        for stage in &stages {
            update = update.stage(stage.as_str(), StageProgress::pending());
        }
        if !self.advance(id, update).await? {
            return Ok(());
        }

        let Some(merged) = self.extract(id, media_path, task.mode).await? else {
            return Ok(());
        };

        // MERGING
        let update = StatusUpdate::new(TaskStatus::Merging).progress(MERGING_PROGRESS);
        if !self.advance(id, update).await? {
            return Ok(());
        }

        self.results.save(id, &merged).await?;

        let mut update = StatusUpdate::new(TaskStatus::Completed)
            .progress(COMPLETED_PROGRESS)
            .stage("parsing", StageProgress::done())
            .stage("downloading", StageProgress::done());
        for stage in &stages {
            update = update.stage(stage.as_str(), StageProgress::done());
        }
        if !self.advance(id, update).await? {
            // a cancelled task exposes no result
            self.results.delete(id).await?;
            return Ok(());
        }

        tracing::info!(task_id = %id, segments = merged.segments.len(), "Task completed");

        if media.is_remote() {
            if let Err(e) = self.workspace.cleanup_task(id).await {
                tracing::warn!(task_id = %id, error = %e, "Failed to remove task cache");
            }
        }

        Ok(())
    }

    /// Local media is used in place; remote media is downloaded into the
    /// task's workspace. The error string is the task's failure message.
    async fn acquire(&self, id: &TaskId, media: &MediaResource) -> Result<Option<PathBuf>, String> {
        if let Some(path) = media.local_path() {
            return Ok(Some(path.to_path_buf()));
        }

        let dir = self
            .workspace
            .task_dir(id)
            .await
            .map_err(|e| format!("download failed: {}", e))?;

        tracing::info!(task_id = %id, dir = %dir.display(), "Downloading media");
        self.downloader
            .download(&media.locator, &dir)
            .await
            .map_err(|e| format!("download failed: {}", e))?;

        Ok(locate_media(&dir))
    }

    /// Run the pipeline on a blocking thread, persisting its stage events as
    /// they arrive. `None` means the task went terminal while extracting.
    async fn extract(
        &self,
        id: &TaskId,
        media_path: PathBuf,
        mode: ExtractMode,
    ) -> Result<Option<MergedResult>, ExecutorError> {
        let (tx, mut rx) = mpsc::unbounded_channel::<(PipelineStage, u8)>();
        let pipeline = self.pipeline.clone();

        let mut handle = tokio::task::spawn_blocking(move || {
            let report = move |stage: PipelineStage, pct: u8| {
                let _ = tx.send((stage, pct));
            };
            pipeline.run(Path::new(&media_path), None, mode, Some(&report))
        });

        let mut stopped = false;
        let joined = loop {
            tokio::select! {
                Some((stage, pct)) = rx.recv() => {
                    if !stopped && !self.report_stage(id, stage, pct).await? {
                        stopped = true;
                    }
                }
                joined = &mut handle => break joined,
            }
        };

        while let Ok((stage, pct)) = rx.try_recv() {
            if !stopped && !self.report_stage(id, stage, pct).await? {
                stopped = true;
            }
        }

        let merged = joined.map_err(|e| ExecutorError::Fault(e.to_string()))?;
        if stopped {
            tracing::info!(task_id = %id, "Discarding extraction result of a finished task");
            return Ok(None);
        }

        Ok(Some(merged))
    }

    async fn report_stage(&self, id: &TaskId, stage: PipelineStage, pct: u8) -> Result<bool, ExecutorError> {
        tracing::debug!(task_id = %id, stage = %stage, pct, "Pipeline progress");
        let update = StatusUpdate::new(TaskStatus::Extracting)
            .progress(extracting_progress(stage, pct))
            .stage(stage.as_str(), stage_progress(pct));
        self.advance(id, update).await
    }

    /// Persist a transition; `false` when the task is already terminal
    async fn advance(&self, id: &TaskId, update: StatusUpdate) -> Result<bool, ExecutorError> {
        let status = update.status;
        let outcome = self.tasks.update_status(id, update).await?;
        if outcome.is_applied() {
            tracing::debug!(task_id = %id, status = %status, "Task status transition");
        }
        Ok(self.record(outcome))
    }

    fn record(&self, outcome: UpdateOutcome) -> bool {
        match outcome {
            UpdateOutcome::Applied => true,
            UpdateOutcome::Terminal(status) => {
                tracing::info!(status = %status, "Task already terminal, stopping");
                false
            }
        }
    }

    async fn fail(&self, id: &TaskId, message: impl Into<String>) -> Result<(), ExecutorError> {
        let message = message.into();
        tracing::warn!(task_id = %id, error = %message, "Task failed");
        self.tasks.update_status(id, StatusUpdate::failed(message)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::{DownloadError, MockDownloader};
    use crate::extractors::{ExtractHints, MockSourceExtractor, SourceExtractor};
    use crate::platforms::{Fetcher, MediaType, MockInputResolver, Platform, Resolution, UnsupportedInput};
    use crate::segment::{TextSegment, TextSource};
    use crate::tasks::repository::{MockResultRepository, MockTaskRepository};
    use crate::tasks::{FileTaskStore, StageStatus, Task};
    use mockall::predicate::eq;

    fn extractor(source: TextSource, text: &'static str) -> Arc<dyn SourceExtractor> {
        let mut mock = MockSourceExtractor::new();
        mock.expect_source().return_const(source);
        mock.expect_extract()
            .returning(move |_, _| TextSegment::new(source, 1.0, 2.0, text).into_iter().collect());
        Arc::new(mock)
    }

    struct Crashing;

    impl SourceExtractor for Crashing {
        fn source(&self) -> TextSource {
            TextSource::Subtitle
        }

        fn extract(&self, _media_path: &Path, _hints: &ExtractHints) -> Vec<TextSegment> {
            panic!("decoder exploded")
        }
    }

    fn idle_pipeline() -> Arc<ExtractPipeline> {
        let mut never = MockSourceExtractor::new();
        never.expect_extract().times(0);
        let never: Arc<dyn SourceExtractor> = Arc::new(never);
        Arc::new(ExtractPipeline::new(never.clone(), never))
    }

    fn idle_downloader() -> MockDownloader {
        let mut downloader = MockDownloader::new();
        downloader.expect_download().times(0);
        downloader
    }

    fn executor(
        tasks: Arc<dyn TaskRepository>,
        results: Arc<dyn ResultRepository>,
        resolver: MockInputResolver,
        downloader: MockDownloader,
        pipeline: Arc<ExtractPipeline>,
        cache: &Path,
    ) -> TaskExecutor {
        TaskExecutor::new(
            tasks,
            results,
            Arc::new(resolver),
            Arc::new(downloader),
            pipeline,
            Workspace::new(cache),
        )
    }

    fn local_resolution(path: &Path) -> Resolution {
        Resolution::new(Platform::Local, path.to_string_lossy())
            .with_metadata("filename", "clip.mp4")
            .with_media(MediaResource::local(path, MediaType::Video))
    }

    fn task_in(status: TaskStatus) -> Task {
        let mut task = Task::new("https://www.bilibili.com/video/BV1", ExtractMode::Full);
        task.status = status;
        task
    }

    #[tokio::test]
    async fn test_terminal_task_is_a_no_op() {
        let task = task_in(TaskStatus::Completed);
        let id = task.id;

        let mut tasks = MockTaskRepository::new();
        tasks.expect_get().with(eq(id)).returning(move |_| Ok(Some(task.clone())));
        tasks.expect_update_status().times(0);
        tasks.expect_update_resolution().times(0);

        let mut results = MockResultRepository::new();
        results.expect_save().times(0);

        let mut resolver = MockInputResolver::new();
        resolver.expect_resolve().times(0);

        let dir = tempfile::tempdir().unwrap();
        let executor = executor(
            Arc::new(tasks),
            Arc::new(results),
            resolver,
            idle_downloader(),
            idle_pipeline(),
            dir.path(),
        );

        assert!(executor.execute(&id).await.is_ok());
    }

    #[tokio::test]
    async fn test_resolution_failure_fails_without_resetting_progress() {
        let task = task_in(TaskStatus::Pending);
        let id = task.id;

        let mut tasks = MockTaskRepository::new();
        tasks.expect_get().returning(move |_| Ok(Some(task.clone())));
        tasks.expect_update_status()
            .withf(|_, update| update.status == TaskStatus::Parsing && update.progress == Some(5))
            .times(1)
            .returning(|_, _| Ok(UpdateOutcome::Applied));
        tasks.expect_update_status()
            .withf(|_, update| {
                update.status == TaskStatus::Failed
                    && update.progress.is_none()
                    && update.error.as_deref() == Some("unsupported link: ftp://nope...")
            })
            .times(1)
            .returning(|_, _| Ok(UpdateOutcome::Applied));
        tasks.expect_update_resolution().times(0);

        let mut resolver = MockInputResolver::new();
        resolver
            .expect_resolve()
            .returning(|_| Err(UnsupportedInput::new("unsupported link: ftp://nope...")));

        let dir = tempfile::tempdir().unwrap();
        let executor = executor(
            Arc::new(tasks),
            Arc::new(MockResultRepository::new()),
            resolver,
            idle_downloader(),
            idle_pipeline(),
            dir.path(),
        );

        assert!(executor.execute(&id).await.is_ok());
    }

    #[tokio::test]
    async fn test_resolution_error_field_fails_task() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileTaskStore::open(dir.path()).await.unwrap());
        let task = Task::new("/gone.mp4", ExtractMode::Full);
        store.create(&task).await.unwrap();

        let mut resolver = MockInputResolver::new();
        resolver
            .expect_resolve()
            .returning(|input| Ok(Resolution::failed(Platform::Local, input, "file not found")));

        let executor = executor(
            store.clone(),
            store.clone(),
            resolver,
            idle_downloader(),
            idle_pipeline(),
            &dir.path().join("cache"),
        );
        executor.execute(&task.id).await.unwrap();

        let task = TaskRepository::get(store.as_ref(), &task.id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.error.as_deref(), Some("file not found"));
        assert_eq!(task.progress, 5);
    }

    #[tokio::test]
    async fn test_download_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileTaskStore::open(dir.path()).await.unwrap());
        let task = Task::new("https://b23.tv/x", ExtractMode::Full);
        store.create(&task).await.unwrap();

        let mut resolver = MockInputResolver::new();
        resolver.expect_resolve().returning(|input| {
            Ok(Resolution::new(Platform::Bilibili, input)
                .with_metadata("title", "demo")
                .with_media(MediaResource::remote(input, Fetcher::YtDlp)))
        });

        let mut downloader = MockDownloader::new();
        downloader
            .expect_download()
            .times(1)
            .returning(|_, _| Err(DownloadError::Status(reqwest::StatusCode::FORBIDDEN)));

        let executor = executor(
            store.clone(),
            store.clone(),
            resolver,
            downloader,
            idle_pipeline(),
            &dir.path().join("cache"),
        );
        executor.execute(&task.id).await.unwrap();

        let task = TaskRepository::get(store.as_ref(), &task.id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert!(task.error.unwrap().starts_with("download failed"));
        assert_eq!(task.platform, Platform::Bilibili);
        assert_eq!(task.metadata["title"], "demo");
        assert_eq!(task.progress, 10);
    }

    #[tokio::test]
    async fn test_download_without_media_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileTaskStore::open(dir.path()).await.unwrap());
        let task = Task::new("https://youtu.be/x", ExtractMode::Full);
        store.create(&task).await.unwrap();

        let mut resolver = MockInputResolver::new();
        resolver.expect_resolve().returning(|input| {
            Ok(Resolution::new(Platform::Youtube, input).with_media(MediaResource::remote(input, Fetcher::YtDlp)))
        });

        // reports success but only leaves a caption behind
        let mut downloader = MockDownloader::new();
        downloader.expect_download().returning(|_, dir| {
            std::fs::write(dir.join("video.en.vtt"), b"WEBVTT")?;
            Ok(())
        });

        let executor = executor(
            store.clone(),
            store.clone(),
            resolver,
            downloader,
            idle_pipeline(),
            &dir.path().join("cache"),
        );
        executor.execute(&task.id).await.unwrap();

        let task = TaskRepository::get(store.as_ref(), &task.id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.error.as_deref(), Some("media unavailable"));
    }

    #[tokio::test]
    async fn test_local_file_runs_to_completion() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileTaskStore::open(dir.path()).await.unwrap());
        let media = dir.path().join("clip.mp4");
        std::fs::write(&media, b"media").unwrap();

        let task = Task::new(media.to_string_lossy(), ExtractMode::Full);
        store.create(&task).await.unwrap();

        let mut resolver = MockInputResolver::new();
        let resolved = local_resolution(&media);
        resolver.expect_resolve().returning(move |_| Ok(resolved.clone()));

        let pipeline = Arc::new(ExtractPipeline::new(
            extractor(TextSource::Subtitle, "hello there"),
            extractor(TextSource::SpeechRecognition, "hello there"),
        ));

        // local inputs never touch the task cache
        let cached = dir.path().join("cache").join(task.id.to_string());
        std::fs::create_dir_all(&cached).unwrap();

        let executor = executor(
            store.clone(),
            store.clone(),
            resolver,
            idle_downloader(),
            pipeline,
            &dir.path().join("cache"),
        );
        executor.execute(&task.id).await.unwrap();
        assert!(cached.exists());

        let task = TaskRepository::get(store.as_ref(), &task.id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.progress, 100);
        assert!(task.error.is_none());
        assert_eq!(task.platform, Platform::Local);
        for stage in ["parsing", "downloading", "subtitle", "asr", "merge"] {
            assert_eq!(task.stage_progress[stage].status, StageStatus::Done, "{}", stage);
        }

        let result = ResultRepository::get(store.as_ref(), &task.id).await.unwrap().unwrap();
        assert_eq!(result.result.full_text, "hello there");
        assert_eq!(result.result.segments[0].source, TextSource::Subtitle);
    }

    #[tokio::test]
    async fn test_remote_download_cache_removed_after_completion() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileTaskStore::open(dir.path()).await.unwrap());
        let task = Task::new("https://example.com/media/talk.mp4", ExtractMode::Full);
        store.create(&task).await.unwrap();

        let mut resolver = MockInputResolver::new();
        resolver.expect_resolve().returning(|input| {
            Ok(Resolution::new(Platform::Direct, input).with_media(MediaResource::remote(input, Fetcher::Http)))
        });

        let mut downloader = MockDownloader::new();
        downloader.expect_download().times(1).returning(|_, dir| {
            std::fs::write(dir.join("video.mp4"), b"media")?;
            Ok(())
        });

        let pipeline = Arc::new(ExtractPipeline::new(
            extractor(TextSource::Subtitle, "remote caption"),
            extractor(TextSource::SpeechRecognition, "spoken words"),
        ));

        let cache = dir.path().join("cache");
        let executor = executor(store.clone(), store.clone(), resolver, downloader, pipeline, &cache);
        executor.execute(&task.id).await.unwrap();

        let task = TaskRepository::get(store.as_ref(), &task.id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(!cache.join(task.id.to_string()).exists());

        let result = ResultRepository::get(store.as_ref(), &task.id).await.unwrap().unwrap();
        assert_eq!(result.result.segments.len(), 2);
    }

    #[tokio::test]
    async fn test_cancel_during_extraction_discards_result() {
        let task = task_in(TaskStatus::Pending);
        let id = task.id;
        let dir = tempfile::tempdir().unwrap();
        let media = dir.path().join("clip.mp4");
        std::fs::write(&media, b"media").unwrap();

        let mut tasks = MockTaskRepository::new();
        tasks.expect_get().returning(move |_| Ok(Some(task.clone())));
        tasks.expect_update_resolution().returning(|_, _, _| Ok(UpdateOutcome::Applied));
        tasks.expect_update_status().returning(|_, update| {
            Ok(match (update.status, update.progress) {
                (TaskStatus::Parsing, _) | (TaskStatus::Downloading, _) => UpdateOutcome::Applied,
                (TaskStatus::Extracting, Some(15)) if update.stages.contains_key("downloading") => {
                    UpdateOutcome::Applied
                }
                _ => UpdateOutcome::Terminal(TaskStatus::Cancelled),
            })
        });

        let mut results = MockResultRepository::new();
        results.expect_save().times(0);
        results.expect_delete().times(0);

        let mut resolver = MockInputResolver::new();
        let resolved = local_resolution(&media);
        resolver.expect_resolve().returning(move |_| Ok(resolved.clone()));

        let pipeline = Arc::new(ExtractPipeline::new(
            extractor(TextSource::Subtitle, "a"),
            extractor(TextSource::SpeechRecognition, "b"),
        ));

        let executor = executor(
            Arc::new(tasks),
            Arc::new(results),
            resolver,
            idle_downloader(),
            pipeline,
            dir.path(),
        );
        assert!(executor.execute(&id).await.is_ok());
    }

    #[tokio::test]
    async fn test_refused_completion_deletes_result() {
        let task = task_in(TaskStatus::Pending);
        let id = task.id;
        let dir = tempfile::tempdir().unwrap();
        let media = dir.path().join("clip.mp4");
        std::fs::write(&media, b"media").unwrap();

        let mut tasks = MockTaskRepository::new();
        tasks.expect_get().returning(move |_| Ok(Some(task.clone())));
        tasks.expect_update_resolution().returning(|_, _, _| Ok(UpdateOutcome::Applied));
        tasks.expect_update_status().returning(|_, update| {
            Ok(if update.status == TaskStatus::Completed {
                UpdateOutcome::Terminal(TaskStatus::Cancelled)
            } else {
                UpdateOutcome::Applied
            })
        });

        let mut results = MockResultRepository::new();
        results.expect_save().times(1).returning(|_, _| Ok(()));
        results.expect_delete().with(eq(id)).times(1).returning(|_| Ok(true));

        let mut resolver = MockInputResolver::new();
        let resolved = local_resolution(&media);
        resolver.expect_resolve().returning(move |_| Ok(resolved.clone()));

        let pipeline = Arc::new(ExtractPipeline::new(
            extractor(TextSource::Subtitle, "a"),
            extractor(TextSource::SpeechRecognition, "b"),
        ));

        let executor = executor(
            Arc::new(tasks),
            Arc::new(results),
            resolver,
            idle_downloader(),
            pipeline,
            dir.path(),
        );
        assert!(executor.execute(&id).await.is_ok());
    }

    #[tokio::test]
    async fn test_extraction_fault_fails_task_and_surfaces() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileTaskStore::open(dir.path()).await.unwrap());
        let media = dir.path().join("clip.mp4");
        std::fs::write(&media, b"media").unwrap();

        let task = Task::new(media.to_string_lossy(), ExtractMode::SubtitleFirst);
        store.create(&task).await.unwrap();

        let mut resolver = MockInputResolver::new();
        let resolved = local_resolution(&media);
        resolver.expect_resolve().returning(move |_| Ok(resolved.clone()));

        let mut never = MockSourceExtractor::new();
        never.expect_extract().times(0);
        let pipeline = Arc::new(ExtractPipeline::new(Arc::new(Crashing), Arc::new(never)));

        let executor = executor(
            store.clone(),
            store.clone(),
            resolver,
            idle_downloader(),
            pipeline,
            &dir.path().join("cache"),
        );
        let result = executor.execute(&task.id).await;
        assert!(matches!(result, Err(ExecutorError::Fault(_))));

        let task = TaskRepository::get(store.as_ref(), &task.id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert!(task.error.unwrap().starts_with("extraction crashed"));
        assert!(ResultRepository::get(store.as_ref(), &task.id).await.unwrap().is_none());
    }

    #[test]
    fn test_extracting_progress_band() {
        assert_eq!(extracting_progress(PipelineStage::Subtitle, 0), 15);
        assert_eq!(extracting_progress(PipelineStage::Asr, 100), 75);
        assert_eq!(extracting_progress(PipelineStage::Merge, 100), 90);
        assert!(PipelineStage::ALL
            .iter()
            .all(|stage| (15..=90).contains(&extracting_progress(*stage, 50))));
    }
}
