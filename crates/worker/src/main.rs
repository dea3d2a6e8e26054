mod consumer;
mod metrics;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};

use aurora_publisher_core::{
    load_config, validate_config, Collaborators, Dispatcher, HgPushLog, PatternCache, Publisher,
    SanitizedConfig, TaskclusterIndex, TaskclusterQueue, TreeherderClient,
};

use consumer::PulseConsumer;

/// Default config file, read when present
const DEFAULT_CONFIG_PATH: &str = "config.json";

/// Noisy dependencies capped at warn
const QUIET_CRATES: &str = "hyper=warn,reqwest=warn,lapin=warn,pinky_swear=warn";

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn default_filter(verbose: bool) -> EnvFilter {
    let level = if verbose { "debug" } else { "info" };
    EnvFilter::new(format!("{},{}", level, QUIET_CRATES))
}

async fn run() -> Result<()> {
    // Initialize logging. The level is raised once the config says whether
    // verbose mode is on, unless RUST_LOG is set.
    let env_filter = EnvFilter::try_from_default_env().ok();
    let from_env = env_filter.is_some();
    let (filter, filter_handle) =
        reload::Layer::new(env_filter.unwrap_or_else(|| default_filter(false)));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = match std::env::var("AURORA_PUBLISHER_CONFIG") {
        Ok(path) => Some(PathBuf::from(path)),
        Err(_) => Some(PathBuf::from(DEFAULT_CONFIG_PATH)).filter(|path| path.exists()),
    };

    // Load configuration
    match &config_path {
        Some(path) => info!("Loading configuration from {:?}", path),
        None => info!("No configuration file, using environment and defaults"),
    }
    let config = load_config(config_path.as_deref())
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    validate_config(&config).context("Configuration validation failed")?;

    if config.verbose && !from_env {
        filter_handle
            .reload(default_filter(true))
            .context("Failed to switch to verbose logging")?;
    }

    info!("Configuration loaded successfully");
    info!(
        "Effective configuration: {}",
        serde_json::to_string(&SanitizedConfig::from(&config)).unwrap_or_default()
    );

    let config = Arc::new(config);

    // Create collaborators
    let collaborators = Collaborators {
        index: Arc::new(
            TaskclusterIndex::new(&config).context("Failed to create Taskcluster index client")?,
        ),
        queue: Arc::new(
            TaskclusterQueue::new(&config).context("Failed to create Taskcluster queue client")?,
        ),
        dashboard: Arc::new(
            TreeherderClient::new(&config.services).context("Failed to create Treeherder client")?,
        ),
        push_log: Arc::new(
            HgPushLog::new(&config.services).context("Failed to create hg push log client")?,
        ),
    };
    info!(
        "Using Taskcluster at {}, Treeherder at {}, hg at {}",
        config.services.taskcluster_root_url,
        config.services.treeherder_url,
        config.services.hg_url
    );

    let patterns = PatternCache::new();
    let publisher = Arc::new(
        Publisher::new(Arc::clone(&config), collaborators, &patterns)
            .context("Failed to create publisher")?,
    );
    let dispatcher = Dispatcher::new(publisher);

    // Start metrics endpoint if enabled
    let metrics_handle = if config.metrics.enabled {
        let port = config.metrics.port;
        Some(tokio::spawn(async move {
            if let Err(e) = metrics::serve(port).await {
                error!("{:#}", e);
            }
        }))
    } else {
        info!("Metrics endpoint disabled");
        None
    };

    let consumer = PulseConsumer::connect(&config.pulse)
        .await
        .context("Failed to set up Pulse consumer")?;

    metrics::CONSUMER_RUNNING.set(1);
    let result = consumer.run(&dispatcher, shutdown_signal()).await;
    metrics::CONSUMER_RUNNING.set(0);

    if let Some(handle) = metrics_handle {
        handle.abort();
    }

    result?;
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
