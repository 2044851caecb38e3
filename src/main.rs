// Demo runner: pushes a simulated batch of files through a process queue
// and logs admission and outcome events as they happen.

use std::path::PathBuf;
use std::time::Duration;
use anyhow::Context;
use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use image_process_queue_lib::{BatchTracker, ProcessQueue, QueueConfig, Task, ToolKind};

#[derive(Parser, Debug)]
#[command(name = "image-process-queue", version, about = "Run a simulated image batch through a bounded queue")]
struct Args {
    /// Tool whose concurrency cap to use (convert, metadata-removal, base64, background-removal)
    #[arg(short, long, default_value = "convert")]
    tool: ToolKind,

    /// Number of simulated files
    #[arg(short, long, default_value_t = 8)]
    files: usize,

    /// Base processing time per file in milliseconds
    #[arg(short, long, default_value_t = 200)]
    delay_ms: u64,

    /// Make every Nth file fail
    #[arg(long)]
    fail_every: Option<usize>,

    /// Override the tool's concurrency cap
    #[arg(short, long)]
    concurrency: Option<usize>,

    /// JSON file with per-tool concurrency caps
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(false)
        .with_ansi(true)
        .compact()
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => QueueConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => QueueConfig::default(),
    };
    if let Some(cap) = args.concurrency {
        config.set_concurrency(args.tool, cap);
    }

    let queue = ProcessQueue::<String>::from_config(&config, args.tool)?;
    let tracker = BatchTracker::new(args.files);
    info!(
        "Processing {} files with {} (concurrency {})",
        args.files,
        args.tool,
        queue.max_concurrent()
    );

    for index in 0..args.files {
        let name = format!("image-{:03}.png", index + 1);
        let should_fail = args.fail_every.is_some_and(|n| n > 0 && (index + 1) % n == 0);
        // Stagger durations so completions do not arrive in submission order.
        let delay = Duration::from_millis(args.delay_ms + (index as u64 % 3) * args.delay_ms / 2);
        let tool = args.tool;

        let file = name.clone();
        let task = Task::new(move || async move {
            tokio::time::sleep(delay).await;
            if should_fail {
                anyhow::bail!("{} could not process {}", tool, file);
            }
            Ok(format!("{}.{}", file, tool))
        })
        .with_label(name.clone())
        .on_complete(|output| info!("✓ {}", output))
        .on_error(|error| warn!("✗ {}", error))
        .on_progress(move |processing, waiting| {
            debug!("{}: processing {}, waiting {}", name, processing, waiting);
        });

        queue.enqueue(tracker.track(task));
    }

    let status = queue.status();
    info!("Queued - processing: {}, waiting: {}", status.processing, status.waiting);

    queue.wait_idle().await;

    let progress = tracker.progress();
    info!(
        "Finished: {} completed, {} failed ({}%)",
        progress.completed_tasks, progress.failed_tasks, progress.progress_percentage
    );
    for (file, error) in tracker.failed_tasks() {
        warn!("Failed: {} - {}", file, error);
    }

    Ok(())
}
