use std::sync::Arc;

use falkordb_coordinator::constants::COORDINATOR_LOG_FILE;
use falkordb_coordinator::health::start_server;
use falkordb_coordinator::health::HealthState;
use falkordb_coordinator::metrics::init_metrics;
use falkordb_coordinator::CoordinatorConfig;
use falkordb_coordinator::Dependencies;
use falkordb_coordinator::LifecycleController;
use falkordb_coordinator::LogFormat;
use falkordb_coordinator::LoggingConfig;
use falkordb_coordinator::NetworkError;
use falkordb_coordinator::NodeStatus;
use falkordb_coordinator::Result;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::Registry;

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() {
    let config = match CoordinatorConfig::new().and_then(CoordinatorConfig::validate) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("invalid configuration: {e}");
            std::process::exit(e.kind().exit_code());
        }
    };

    // Initializing Logs
    let guard = match init_observability(&config.logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("cannot initialize logging: {e}");
            std::process::exit(e.kind().exit_code());
        }
    };

    let code = match run(config).await {
        Ok(()) => {
            info!("coordinator stopped cleanly");
            0
        }
        Err(e) => {
            error!(kind = ?e.kind(), "coordinator failed: {e}");
            e.kind().exit_code()
        }
    };

    // Flush the non-blocking writer before exiting
    drop(guard);
    std::process::exit(code);
}

async fn run(config: CoordinatorConfig) -> Result<()> {
    let config = Arc::new(config);
    info!("starting node {} in {:?} mode", config.node.name, config.node.topology);
    init_metrics();

    // Initializing Shutdown Signal
    let (graceful_tx, graceful_rx) = watch::channel(());
    tokio::spawn(async move {
        if let Err(e) = graceful_shutdown(graceful_tx).await {
            error!("Failed to shutdown: {:?}", e);
        }
    });

    let deps = Dependencies::from_config(&config)?;
    let status = Arc::new(NodeStatus::new());

    // The health server outlives the drain so probes keep answering
    let (health_tx, health_rx) = watch::channel(());
    let health = config.health.enabled.then(|| {
        let state = HealthState::from_config(&config, status.clone(), deps.admin.clone(), deps.monitor.clone());
        tokio::spawn(start_server(config.health.port, state, health_rx))
    });

    let result = LifecycleController::new(config.clone(), deps, status).run(graceful_rx).await;

    let _ = health_tx.send(());
    if let Some(handle) = health {
        let _ = handle.await;
    }
    result
}

async fn graceful_shutdown(graceful_tx: watch::Sender<()>) -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected.");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
    }

    graceful_tx.send(()).map_err(|e| {
        error!("Failed to send shutdown signal: {}", e);
        NetworkError::SignalSendFailed(format!("Failed to send shutdown signal: {}", e))
    })?;
    Ok(())
}

/// File and stdout layers. `RUST_LOG` wins over `logging.level`.
fn init_observability(logging: &LoggingConfig) -> Result<WorkerGuard> {
    std::fs::create_dir_all(&logging.log_dir)?;
    let file = tracing_appender::rolling::never(&logging.log_dir, COORDINATOR_LOG_FILE);
    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = match logging.format {
        LogFormat::Json => vec![
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(filter())
                .boxed(),
            tracing_subscriber::fmt::layer().json().with_filter(filter()).boxed(),
        ],
        LogFormat::Text => vec![
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking)
                .with_filter(filter())
                .boxed(),
            tracing_subscriber::fmt::layer().with_filter(filter()).boxed(),
        ],
    };
    tracing_subscriber::registry().with(layers).init();

    Ok(guard)
}
