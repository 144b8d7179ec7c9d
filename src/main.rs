use anyhow::Context;
use clap::{Parser, ValueEnum};
use magic_folder::archive::retention::RetentionTask;
use magic_folder::config::{self, Settings};
use magic_folder::lock::service::DistributedLock;
use magic_folder::membership::client::HttpConnector;
use magic_folder::membership::retry::RetryPolicy;
use magic_folder::membership::service::MembershipService;
use magic_folder::tasks::input::InputTask;
use magic_folder::tasks::output::OutputTask;
use magic_folder::tasks::scheduler::Scheduler;
use magic_folder::transport::TransportClient;
use magic_folder::transport::http::HttpTransport;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "magic-folder")]
#[command(about = "Moves files between local folders and a message service, as one node of a farm")]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "magic-folder.yaml", env = "MAGIC_FOLDER_CONFIG")]
    config: PathBuf,

    /// Override farm.node_id from the configuration (0 = single mode)
    #[arg(long)]
    node_id: Option<u32>,

    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let settings = match config::load(&cli.config, cli.node_id) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!("Invalid configuration {}: {}", cli.config.display(), e);
            std::process::exit(1);
        }
    };

    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(settings.worker_threads)
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?
        .block_on(run(settings))
}

async fn run(settings: Settings) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();

    // 1. Farm lock (single mode without a node id):
    let lock = match (settings.farm.local_node_id(), settings.farm.self_address()) {
        (Some(node_id), Some(self_address)) => {
            let membership = MembershipService::new(
                self_address,
                settings.farm.members.clone(),
                Arc::new(HttpConnector::new(settings.farm.rpc_timeout())),
                RetryPolicy::with_backoff_unit(settings.farm.retry_backoff()),
                shutdown.clone(),
            );
            Arc::new(DistributedLock::farm(node_id, membership))
        }
        _ => Arc::new(DistributedLock::single()),
    };

    let joined = lock.join(shutdown.clone()).await?;
    if let Some(node_id) = lock.node_id() {
        tracing::info!("{} joined the farm, {} peers reachable", node_id, joined);
    }

    // 2. Message service client:
    let transport: Arc<dyn TransportClient> = Arc::new(HttpTransport::new(
        &settings.transport.base_url,
        settings.transport.timeout(),
    ));

    // 3. Cycles:
    let mut scheduler = Scheduler::new(shutdown.clone());

    for (index, pipeline) in settings.pipelines.iter().enumerate() {
        let hooks = pipeline.post_process.hooks();

        if let Some(folders) = pipeline.input_folders() {
            tracing::info!("Pipeline {} reads {}", index, folders.input.display());
            let task = InputTask::new(
                format!("input[{}]", index),
                folders,
                lock.clone(),
                transport.clone(),
                hooks.clone(),
                shutdown.clone(),
            );
            scheduler.spawn(Arc::new(task), pipeline.input_interval());
        }

        if let Some(folder) = &pipeline.output_folder {
            tracing::info!("Pipeline {} writes {}", index, folder.display());
            let task = OutputTask::new(
                format!("output[{}]", index),
                folder.clone(),
                pipeline.message_types.clone(),
                pipeline.extension.clone(),
                lock.clone(),
                transport.clone(),
                hooks.on_received.clone(),
                shutdown.clone(),
            );
            scheduler.spawn(Arc::new(task), pipeline.output_interval());
        }
    }

    if settings.retention.days > 0 {
        let task = RetentionTask::new(
            settings.retention_folders(),
            settings.retention.days,
            settings.retention.backup_folder.clone(),
            lock.clone(),
        );
        tracing::info!(
            "Retention of {} days over {} folders",
            settings.retention.days,
            task.folders().len()
        );
        scheduler.spawn(Arc::new(task), settings.retention.interval());
    }

    // 4. Spawn farm stats reporter:
    if let Some(membership) = lock.membership().cloned() {
        let stats_shutdown = shutdown.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            loop {
                tokio::select! {
                    _ = stats_shutdown.cancelled() => break,
                    _ = interval.tick() => {}
                }
                tracing::info!("Farm stats: {} reachable peers", membership.peer_count());
                for peer in membership.peers() {
                    tracing::debug!("  - {}", peer.address);
                }
            }
        });
    }

    tracing::info!("{} cycles scheduled", scheduler.task_count());
    tracing::info!("Press Ctrl+C to shutdown");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    tracing::info!("Shutting down, waiting for running cycles");
    shutdown.cancel();
    scheduler.join().await;

    Ok(())
}
