//! socksgate - SOCKS5 proxy front end
//!
//! This binary accepts SOCKS5 clients, negotiates the authentication method,
//! dials the requested destination and relays traffic transparently until
//! either side closes.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use socksgate::{config, Config, Listener, Result};

#[derive(Parser)]
#[command(name = "socksgate")]
#[command(version)]
#[command(about = "SOCKS5 proxy front end")]
struct Cli {
    /// Path to configuration file (defaults apply without one)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override listen address
    #[arg(long)]
    listen_address: Option<String>,

    /// Override listen port
    #[arg(long)]
    listen_port: Option<u16>,

    /// Enable verbose/debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration, or fall back to defaults plus env overrides.
    let mut config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => {
            let mut config = Config::default();
            config::apply_env_overrides(&mut config);
            config
                .validate()
                .map_err(socksgate::ProxyError::Config)?;
            config
        }
    };

    // Initialize logging
    // Priority: --verbose flag, then RUST_LOG env var, then config level
    let log_level = if cli.verbose {
        "debug".to_string()
    } else {
        std::env::var("RUST_LOG").unwrap_or_else(|_| config.logging.level.clone())
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&log_level))
        .init();

    info!("Starting socksgate v{}", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &cli.config {
        info!("Loaded configuration from {:?}", path);
    }

    // Apply CLI overrides
    if let Some(addr) = cli.listen_address {
        config.server.listen_address = addr;
    }
    if let Some(port) = cli.listen_port {
        config.server.listen_port = port;
    }

    let config = Arc::new(config);

    // Create shutdown channel
    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);

    let listener = Listener::bind(Arc::clone(&config), shutdown_rx).await?;
    let stats = listener.stats();

    info!(
        "Proxy ready: listening on {}:{}",
        config.server.listen_address, config.server.listen_port
    );

    // Spawn the listener task
    let listener_handle = tokio::spawn(async move {
        if let Err(e) = listener.run().await {
            error!("Listener error: {}", e);
        }
    });

    // Wait for shutdown signal
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = async {
            #[cfg(unix)]
            {
                let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
                    .expect("Failed to install SIGTERM handler");
                sigterm.recv().await;
            }
            #[cfg(not(unix))]
            {
                std::future::pending::<()>().await;
            }
        } => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    // Send shutdown signal
    let _ = shutdown_tx.send(());

    // Wait for listener to finish
    let _ = listener_handle.await;

    info!(
        "Shutdown complete. Total connections handled: {}",
        stats
            .connections_accepted
            .load(std::sync::atomic::Ordering::Relaxed)
    );

    Ok(())
}
