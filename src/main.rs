use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use guideline_ingest::api;
use guideline_ingest::cli::{Cli, Command};
use guideline_ingest::config::IngestConfig;
use guideline_ingest::openai::OpenAiClient;
use guideline_ingest::pipeline::{ClientPool, PipelineExecutor};
use guideline_ingest::queue::{
    LocalQueue, QueueMonitor, QueueReceiver, WorkQueue, WorkerPool, WorkerRegistry,
};
use guideline_ingest::service::{ExecutionMode, JobService};
use guideline_ingest::state_machine::JobStatus;
use guideline_ingest::store::{FileJobStore, JobStore};

struct Components {
    service: Arc<JobService>,
    store: Arc<dyn JobStore>,
    queue: Arc<dyn WorkQueue>,
    executor: Arc<PipelineExecutor>,
    registry: WorkerRegistry,
    receiver: QueueReceiver,
}

async fn build(config: &IngestConfig) -> Result<Components> {
    let store: Arc<dyn JobStore> = Arc::new(
        FileJobStore::open(&config.data_dir)
            .await
            .with_context(|| format!("failed to open {}", config.data_dir.display()))?,
    );
    if config.api_key.is_empty() {
        warn!("OPENAI_API_KEY is not set; every pipeline run will fail");
    }
    let client = Arc::new(OpenAiClient::from_config(config)?);
    let executor = Arc::new(PipelineExecutor::new(
        Arc::clone(&store),
        ClientPool::new(client, config.max_concurrent_runs),
        config.stage_timeout(),
    ));

    let (queue, receiver) = LocalQueue::new();
    let queue: Arc<dyn WorkQueue> = Arc::new(queue);
    let registry = WorkerRegistry::new(config.worker_stale_after());
    let monitor = QueueMonitor::new(
        Arc::clone(&queue),
        Arc::new(registry.clone()),
        Arc::clone(&store),
        config.probe_timeout(),
        config.recent_jobs_limit,
    );
    let service = Arc::new(JobService::new(
        Arc::clone(&store),
        Arc::clone(&queue),
        Arc::clone(&executor),
        monitor,
    ));

    Ok(Components {
        service,
        store,
        queue,
        executor,
        registry,
        receiver,
    })
}

/// Put jobs left pending by an earlier process back on the queue.
async fn requeue_pending(store: &dyn JobStore, queue: &dyn WorkQueue) -> Result<usize> {
    let mut requeued = 0;
    for job in store.recent(usize::MAX).await? {
        if job.status == JobStatus::Pending {
            queue.enqueue(job.id).await?;
            requeued += 1;
        }
    }
    Ok(requeued)
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "guideline_ingest=debug,info"
    } else {
        "guideline_ingest=info,warn"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = IngestConfig::load_from(&cli.config)?;
    if let Some(model) = cli.model {
        config.model = model;
    }
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    let components = build(&config).await?;

    match cli.command {
        Command::Serve { bind, workers } => {
            let addr: SocketAddr = bind
                .unwrap_or_else(|| config.bind_addr.clone())
                .parse()
                .context("invalid bind address")?;
            let worker_count = workers.unwrap_or(config.worker_count);

            let requeued =
                requeue_pending(components.store.as_ref(), components.queue.as_ref()).await?;
            if requeued > 0 {
                info!(requeued, "requeued pending jobs from a previous run");
            }

            let pool = WorkerPool::spawn(
                worker_count,
                Arc::new(components.receiver),
                components.executor,
                components.registry,
                config.worker_heartbeat(),
            );
            api::serve(components.service, addr).await?;
            info!("shutting down workers");
            pool.shutdown().await;
        }
        Command::Submit { inline } => {
            let mode = if inline {
                ExecutionMode::Inline
            } else {
                ExecutionMode::Queued
            };
            let job = components.service.submit(mode).await?;
            let view = components.service.status(job.id).await?;
            println!("{}", serde_json::to_string_pretty(&view)?);
            if !inline && job.status == JobStatus::Pending {
                eprintln!("Job {} is pending; `serve` will pick it up.", job.id);
            }
        }
        Command::Status { id } => {
            let view = components.service.status(id).await?;
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
        Command::Process { id } => {
            let report = components.service.process(id).await;
            println!("{report:?}");
            let view = components.service.status(id).await?;
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
    }

    Ok(())
}
