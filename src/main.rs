//! netrenderd — render slave daemon.
//!
//! Connects to the configured master and processes render jobs until
//! shut down. The CLI client lives in the `netrender` binary of the
//! `netrender-cli` crate.

use tokio::sync::watch;
use tracing_subscriber::{fmt, EnvFilter};

use netrender_core::config::NetConfig;
use netrender_core::error::NetError;
use netrender_slave::SlaveRunner;

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Slave error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from file and environment
fn load_configuration() -> Result<NetConfig, NetError> {
    if let Ok(path) = std::env::var("NETRENDER_CONFIG") {
        return NetConfig::load_file(&path);
    }
    let env = std::env::var("NETRENDER_ENV").unwrap_or_else(|_| "development".to_string());
    NetConfig::load(&env)
}

/// Initialize tracing/logging
fn init_logging(config: &NetConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt().pretty().with_env_filter(filter).with_target(true).init();
        }
    }
}

async fn run(config: NetConfig) -> Result<(), NetError> {
    tracing::info!("Starting netrenderd v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        master = %config.master.base_url(),
        path = %config.slave.path,
        "Slave configuration loaded"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received, stopping slave...");
        let _ = shutdown_tx.send(true);
    });

    let runner = SlaveRunner::new(&config);
    runner.run(shutdown_rx).await?;

    tracing::info!("Slave stopped");
    Ok(())
}

/// Wait for ctrl-c or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
