//! TCP listener for inbound client connections

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::{broadcast, Semaphore};

use socksgate_proto::Negotiator;

use super::connection::Connection;
use crate::config::Config;
use crate::dialer::Dialer;
use crate::error::{ProxyError, Result};

/// Listener statistics
#[derive(Debug, Default)]
pub struct ListenerStats {
    /// Total connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub connections_active: AtomicU64,
    /// Connections rejected due to limit
    pub connections_rejected: AtomicU64,
}

/// TCP listener that accepts inbound client connections
pub struct Listener {
    /// TCP listener
    listener: TcpListener,
    /// Configuration
    config: Arc<Config>,
    /// Method negotiator shared by every connection (read-only after startup)
    negotiator: Negotiator,
    /// Outbound dialer
    dialer: Dialer,
    /// Statistics
    stats: Arc<ListenerStats>,
    /// Shutdown signal receiver
    shutdown_rx: broadcast::Receiver<()>,
    /// Connection limit semaphore (None = unlimited)
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl Listener {
    /// Bind to the configured address and create a new listener.
    pub async fn bind(config: Arc<Config>, shutdown_rx: broadcast::Receiver<()>) -> Result<Self> {
        let addr = format!(
            "{}:{}",
            config.server.listen_address, config.server.listen_port
        );

        let listener = TcpListener::bind(&addr).await?;

        let negotiator = Negotiator::new(config.auth.preference().map_err(ProxyError::Config)?);
        let dialer = Dialer::new(Duration::from_secs(config.server.connect_timeout_secs));

        // Create connection limit semaphore (0 = unlimited)
        let connection_semaphore = if config.server.max_connections > 0 {
            info!(
                "Listening on {} (max {} connections)",
                addr, config.server.max_connections
            );
            Some(Arc::new(Semaphore::new(config.server.max_connections)))
        } else {
            info!("Listening on {} (unlimited connections)", addr);
            None
        };

        Ok(Self {
            listener,
            config,
            negotiator,
            dialer,
            stats: Arc::new(ListenerStats::default()),
            shutdown_rx,
            connection_semaphore,
        })
    }

    /// Get listener statistics
    pub fn stats(&self) -> Arc<ListenerStats> {
        Arc::clone(&self.stats)
    }

    /// Get the local address the listener is bound to.
    ///
    /// This is useful when binding to port 0 to get an OS-assigned port.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Run the accept loop
    pub async fn run(mut self) -> Result<()> {
        loop {
            tokio::select! {
                // Accept new connections
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            // Try to acquire a connection permit if limiting is enabled
                            let permit = if let Some(ref semaphore) = self.connection_semaphore {
                                match semaphore.clone().try_acquire_owned() {
                                    Ok(permit) => Some(permit),
                                    Err(_) => {
                                        warn!(
                                            "Connection from {} rejected: max connections ({}) reached",
                                            addr,
                                            self.config.server.max_connections
                                        );
                                        self.stats.connections_rejected.fetch_add(1, Ordering::Relaxed);
                                        drop(stream);
                                        continue;
                                    }
                                }
                            } else {
                                None
                            };

                            debug!("Accepted connection from {}", addr);
                            self.stats.connections_accepted.fetch_add(1, Ordering::Relaxed);
                            self.stats.connections_active.fetch_add(1, Ordering::Relaxed);

                            let connection =
                                Connection::new(stream, addr, self.negotiator.clone(), self.dialer);
                            let stats = Arc::clone(&self.stats);

                            tokio::spawn(async move {
                                // Hold permit for connection lifetime
                                let _permit = permit;

                                if let Err(e) = connection.handle().await {
                                    warn!("Connection from {} error: {}", addr, e);
                                }
                                stats.connections_active.fetch_sub(1, Ordering::Relaxed);
                                debug!("Connection from {} closed", addr);
                            });
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                            // Brief delay before retrying
                            tokio::time::sleep(Duration::from_millis(100)).await;
                        }
                    }
                }

                // Shutdown signal
                _ = self.shutdown_rx.recv() => {
                    info!("Shutdown signal received, stopping listener");
                    break;
                }
            }
        }

        info!(
            "Listener stopped. Total: {}, Active: {}, Rejected: {}",
            self.stats.connections_accepted.load(Ordering::Relaxed),
            self.stats.connections_active.load(Ordering::Relaxed),
            self.stats.connections_rejected.load(Ordering::Relaxed)
        );

        Ok(())
    }
}
