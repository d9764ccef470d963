use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use blobgate_core::{
    load_config, select_credential, validate_config, AzureBlobStore, BlobStore, ComputeClient,
    Config, ConnectionString, ContainerInstanceClient, CredentialProvider, EventOrchestrator,
    TriggerDispatcher,
};
use blobgate_server::{api::create_router, state::AppState};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Config file picked up from the working directory when `BLOBGATE_CONFIG` is unset
const DEFAULT_CONFIG_FILE: &str = "blobgate.toml";

/// Resource manager endpoint used when no trigger is configured
const DEFAULT_MANAGEMENT_ENDPOINT: &str = "https://management.azure.com";

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// `BLOBGATE_CONFIG` if set, otherwise `blobgate.toml` when present.
fn config_path() -> Option<PathBuf> {
    match std::env::var("BLOBGATE_CONFIG") {
        Ok(path) => Some(PathBuf::from(path)),
        Err(_) => {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            default.exists().then_some(default)
        }
    }
}

fn build_store(config: &Config, credential: &CredentialProvider) -> Result<Option<Arc<dyn BlobStore>>> {
    let Some(raw) = config
        .storage
        .connection_string
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    else {
        warn!("No storage connection configured, events will fail until one is set");
        return Ok(None);
    };

    let connection = ConnectionString::parse(raw).context("Invalid storage connection string")?;
    let store = AzureBlobStore::new(
        connection,
        credential.clone(),
        Duration::from_secs(config.storage.request_timeout_secs),
    )
    .context("Failed to create blob store")?;

    info!(auth = store.auth_kind(), "Blob store initialized");
    Ok(Some(Arc::new(store)))
}

fn build_compute(config: &Config, credential: &CredentialProvider) -> Result<Arc<dyn ComputeClient>> {
    let (endpoint, timeout_secs) = match &config.trigger {
        Some(trigger) => {
            info!(
                resource_group = %trigger.resource_group,
                container_group = %trigger.container_group_name,
                "Trigger configured"
            );
            (trigger.management_endpoint.as_str(), trigger.timeout_secs)
        }
        None => {
            warn!("No trigger configured, ready jobs cannot be started");
            (DEFAULT_MANAGEMENT_ENDPOINT, 30)
        }
    };

    let client = ContainerInstanceClient::new(endpoint, credential.clone(), Duration::from_secs(timeout_secs))
        .context("Failed to create container instance client")?;
    Ok(Arc::new(client))
}

async fn run() -> Result<()> {
    // Load configuration first so the log format can follow it
    let config_path = config_path();
    let loaded = load_config(config_path.as_deref());
    init_tracing(loaded.as_ref().map(|c| c.logging.json).unwrap_or(false));

    let config = loaded.with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;

    info!(version = VERSION, config_file = ?config_path, "Configuration loaded successfully");
    info!(
        timeout_secs = config.poll.timeout_secs,
        interval_secs = config.poll.interval_secs,
        "Default poll policy"
    );

    let credential =
        select_credential(&config.credential).context("Failed to set up credential")?;
    info!(credential = credential.kind(), "Credential selected");

    let store = build_store(&config, &credential)?;
    let compute = build_compute(&config, &credential)?;
    let dispatcher = TriggerDispatcher::from_config(compute, config.trigger.as_ref());

    // Cancelled on shutdown; outstanding gates resolve as timed out
    let shutdown = CancellationToken::new();
    let tracker = TaskTracker::new();

    let orchestrator = Arc::new(EventOrchestrator::new(
        &config,
        store,
        dispatcher,
        shutdown.clone(),
    ));

    let state = Arc::new(AppState::new(config.clone(), orchestrator, tracker.clone()));
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let signal_token = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!("Shutdown signal received, cancelling in-flight gates");
            signal_token.cancel();
        })
        .await
        .context("Server error")?;

    // Wait for background event handling to record its outcomes
    tracker.close();
    info!(pending = tracker.len(), "Waiting for in-flight events");
    tracker.wait().await;

    info!("Server stopped");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
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
