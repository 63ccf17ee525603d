use anyhow::Result;
use clap::Parser;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use textgetter::cli::{Cli, Commands};
use textgetter::config::Config;
use textgetter::executor::{TaskExecutor, TaskQueue, TaskWorker};
use textgetter::output::{self, OutputFormat};
use textgetter::platforms::ResolverRegistry;
use textgetter::storage::Workspace;
use textgetter::tasks::{parse_task_id, FileTaskStore, Task, TaskFilter, TaskId, TaskService, TaskStatus};
use textgetter::utils;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

fn init_tracing(verbose: bool, json: bool) {
    let default_filter = if verbose { "textgetter=debug" } else { "textgetter=info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Store, service and (optionally) a running background worker
struct App {
    config: Config,
    store: Arc<FileTaskStore>,
    workspace: Workspace,
}

impl App {
    async fn open(config: Config) -> Result<Self> {
        let store = Arc::new(FileTaskStore::open(config.data_dir()).await?);
        let workspace = Workspace::new(config.cache_dir());
        Ok(Self {
            config,
            store,
            workspace,
        })
    }

    fn service(&self) -> TaskService {
        TaskService::new(self.store.clone(), self.store.clone(), self.workspace.clone())
    }

    /// Service whose created tasks go straight to a freshly spawned worker
    fn service_with_worker(&self) -> (TaskService, TaskQueue, tokio::task::JoinHandle<()>) {
        let executor = Arc::new(TaskExecutor::from_config(
            &self.config,
            self.store.clone(),
            self.store.clone(),
        ));
        let (queue, receiver) = TaskQueue::new();
        let worker = TaskWorker::new(receiver, executor, self.config.worker.max_concurrent_tasks);
        let handle = tokio::spawn(worker.run());

        (self.service().with_queue(queue.clone()), queue, handle)
    }
}

fn progress_bar(quiet: bool, length: u64) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }

    let progress = ProgressBar::new(length);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    progress
}

/// Poll the store until the task reaches a terminal state
async fn wait_for(service: &TaskService, id: &TaskId, quiet: bool) -> Result<Task> {
    let progress = progress_bar(quiet, 100);

    loop {
        let task = service.get(id).await?.task;
        progress.set_position(u64::from(task.progress));
        progress.set_message(task.status.to_string());

        if task.is_terminal() {
            progress.finish_with_message(task.status.to_string());
            return Ok(task);
        }

        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

async fn emit(content: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            output::save_to_file(content, path).await?;
            println!("Transcript saved to: {}", path.display());
        }
        None => println!("{}", content),
    }
    Ok(())
}

fn status_label(status: TaskStatus) -> console::StyledObject<&'static str> {
    let label = style(status.as_str());
    match status {
        TaskStatus::Completed => label.green(),
        TaskStatus::Failed => label.red(),
        TaskStatus::Cancelled => label.yellow(),
        _ => label.cyan(),
    }
}

fn print_task(task: &Task) {
    println!("{} {}", style("Task").bold(), task.id);
    println!("  Input:    {}", task.input);
    println!("  Platform: {}", task.platform);
    println!("  Mode:     {}", task.mode);
    println!("  Status:   {} ({}%)", status_label(task.status), task.progress);
    if let Some(title) = task.title() {
        println!("  Title:    {}", title);
    }
    if let Some(duration) = task.metadata.get("duration").and_then(|d| d.as_f64()) {
        println!("  Duration: {}", utils::format_duration(duration));
    }
    for (stage, progress) in &task.stage_progress {
        println!("  - {:<12} {:?} {}%", stage, progress.status, progress.progress);
    }
    if let Some(error) = &task.error {
        println!("  Error:    {}", style(error).red());
    }
    println!("  Created:  {}", task.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).await?;
    if let Some(data_dir) = &cli.data_dir {
        config = config.with_data_dir(data_dir);
    }

    init_tracing(cli.verbose, config.logging.json);

    // Check for external tools (non-fatal)
    if matches!(cli.command, Commands::Extract { .. } | Commands::Run { .. }) {
        let missing_deps = utils::check_dependencies(&config.tools).await;
        if !missing_deps.is_empty() {
            eprintln!("⚠️  Dependency check warnings:");
            for dep in missing_deps {
                eprintln!("   • {}", dep);
            }
            eprintln!("   (Continuing anyway - some sources may be skipped)");
        }
    }

    match cli.command {
        Commands::Extract {
            input,
            mode,
            output,
            format,
        } => {
            let app = App::open(config).await?;
            let (service, queue, worker) = app.service_with_worker();
            drop(queue);

            let mode = mode.unwrap_or(app.config.extract.default_mode);
            let task = service.create(&input, mode).await?;
            tracing::info!(task_id = %task.id, "Starting extraction for: {}", input);

            let task = wait_for(&service, &task.id, cli.quiet).await?;
            let content = match task.status {
                TaskStatus::Completed => Some(service.export(&task.id, format).await?),
                _ => None,
            };
            drop(service);
            worker.await?;

            match content {
                Some(content) => emit(&content, output.as_deref()).await?,
                None => anyhow::bail!(
                    "Task {} {}: {}",
                    task.id,
                    task.status,
                    task.error.unwrap_or_default()
                ),
            }
        }
        Commands::Submit { input, mode } => {
            let app = App::open(config).await?;
            let mode = mode.unwrap_or(app.config.extract.default_mode);
            let task = app.service().create(&input, mode).await?;
            println!("{}", task.id);
        }
        Commands::Run { task_ids, pending } => {
            let app = App::open(config).await?;

            let mut ids = task_ids
                .iter()
                .map(|id| parse_task_id(id))
                .collect::<Result<Vec<_>, _>>()?;
            if pending {
                let filter = TaskFilter {
                    status: Some(TaskStatus::Pending),
                    limit: usize::MAX,
                    ..Default::default()
                };
                ids.extend(app.service().list(&filter).await?.items.iter().map(|t| t.id));
            }

            let (service, queue, worker) = app.service_with_worker();
            for id in &ids {
                queue.enqueue(*id).await?;
            }
            drop(queue);
            drop(service);
            worker.await?;

            let service = app.service();
            for id in &ids {
                let task = service.get(id).await?.task;
                println!("{}  {}", task.id, status_label(task.status));
            }
        }
        Commands::Show { task_id } => {
            let app = App::open(config).await?;
            let detail = app.service().get(&parse_task_id(&task_id)?).await?;
            print_task(&detail.task);
            if let Some(result) = detail.result {
                println!("  Segments: {}", result.result.segments.len());
                for (source, stats) in &result.result.stats.sources {
                    println!("    {:<10} {} segments, {} chars", source, stats.segment_count, stats.char_count);
                }
            }
        }
        Commands::List {
            platform,
            status,
            limit,
            offset,
        } => {
            let app = App::open(config).await?;
            let page = app
                .service()
                .list(&TaskFilter {
                    platform,
                    status,
                    limit,
                    offset,
                })
                .await?;

            for task in &page.items {
                println!(
                    "{}  {:<10} {:>3}%  {:<9} {}",
                    task.id,
                    status_label(task.status),
                    task.progress,
                    task.platform,
                    utils::truncate(task.title().unwrap_or(&task.input), 60)
                );
            }
            println!("{} of {} tasks", page.items.len(), page.total);
        }
        Commands::Cancel { task_id } => {
            let app = App::open(config).await?;
            let task = app.service().cancel(&parse_task_id(&task_id)?).await?;
            println!("{}  {}", task.id, status_label(task.status));
        }
        Commands::Delete { task_id } => {
            let app = App::open(config).await?;
            let id = parse_task_id(&task_id)?;
            app.service().delete(&id).await?;
            println!("Deleted {}", id);
        }
        Commands::Export {
            task_id,
            format,
            output,
        } => {
            let app = App::open(config).await?;
            let content = app.service().export(&parse_task_id(&task_id)?, format).await?;
            emit(&content, output.as_deref()).await?;
        }
        Commands::Cleanup => {
            let workspace = Workspace::new(config.cache_dir());
            let removed = workspace.purge_expired(config.storage.retention_days).await?;
            println!(
                "Removed {} cache director{} older than {} days",
                removed,
                if removed == 1 { "y" } else { "ies" },
                config.storage.retention_days
            );
        }
        Commands::Config { show } => {
            if show {
                config.display();
            } else {
                println!("Configuration file:");
                println!("  {}", Config::config_path(cli.config.as_deref())?.display());
                println!("Edit it and run `textgetter config --show` to check the result.");
            }
        }
        Commands::Platforms => {
            println!("Supported platforms:");
            for (platform, description) in ResolverRegistry::with_defaults(&config).list_platforms() {
                println!("  • {:<9} {}", platform, description);
            }
            println!("Output formats: {}", [
                OutputFormat::Text,
                OutputFormat::Markdown,
                OutputFormat::Json,
                OutputFormat::Srt,
                OutputFormat::Vtt,
            ]
            .map(|f| f.to_string())
            .join(", "));
        }
    }

    Ok(())
}
