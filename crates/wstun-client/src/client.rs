// ============================================
// File: crates/wstun-client/src/client.rs
// ============================================
//! # Client Orchestrator
//!
//! ## Creation Reason
//! Wires configuration, the WebSocket connection, the multiplexer and the
//! session together and runs them until the tunnel goes away.
//!
//! ## Main Functionality
//! - `Client::run`: resolve endpoint, dial, serve with the Linux adapters
//! - `Client::serve`: serve an established connection with any adapters
//! - Ctrl-C triggers the same orderly close as a dropped connection
//!
//! ## Client Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Client                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  1. Endpoint::resolve  (auth file, strip URL userinfo)      │
//! │  2. WebSocketConnection::connect                            │
//! │  3. Multiplexer::start ──► reader task, writer task         │
//! │  4. Session::run       ──► init / addroute / extensions     │
//! │         ▲                                                   │
//! │         └── Ctrl-C / peer close / I/O error: begin_close    │
//! │  5. Session teardown   (down hook, routes, interface)       │
//! │  6. Multiplexer::stop  (close connection, join tasks)       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Creating interfaces and routes requires root or CAP_NET_ADMIN
//! - The connection is closed only after session teardown finished
//!
//! ## Last Modified
//! v0.1.0 - Initial client orchestrator

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use wstun_transport::traits::{Connection, DeviceProvider, RouteTable};
use wstun_transport::WebSocketConnection;

use crate::config::ClientConfig;
use crate::endpoint::Endpoint;
use crate::error::{ClientError, Result};
use crate::services::multiplexer::{CloseReason, Multiplexer};
use crate::services::registry::CommandRegistry;
use crate::services::session::Session;

// ============================================
// Client
// ============================================

/// The tunnel client.
pub struct Client {
    config: ClientConfig,
    registry: CommandRegistry,
}

impl Client {
    /// Creates a client.
    ///
    /// # Arguments
    /// * `config` - Validated client configuration
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            registry: CommandRegistry::new(),
        }
    }

    /// Adds extension commands.
    #[must_use]
    pub fn with_registry(mut self, registry: CommandRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Dials the configured endpoint and serves it until it closes or
    /// Ctrl-C is pressed.
    ///
    /// # Errors
    /// - `ConfigInvalid` / `AuthFile` for a bad endpoint or credentials
    /// - `Transport` if the connection cannot be established
    /// - `SessionFailed` if a command failed fatally
    pub async fn run(self) -> Result<CloseReason> {
        info!("Starting wstun client v{}", env!("CARGO_PKG_VERSION"));

        let raw_url = self
            .config
            .connection
            .url
            .as_deref()
            .ok_or_else(|| ClientError::config_invalid("connection.url", "no endpoint configured"))?;
        let endpoint =
            Endpoint::resolve(raw_url, self.config.connection.auth_file.as_deref().map(Path::new))
                .await?;
        endpoint.log_warnings();

        let authorization = endpoint.authorization();
        let conn = WebSocketConnection::connect(endpoint.url(), authorization.as_deref()).await?;
        info!("Connected to {}", endpoint.url());

        let (provider, routes) = system_adapters()?;
        self.serve(Arc::new(conn), provider, routes, wait_for_ctrl_c())
            .await
    }

    /// Serves an established connection.
    ///
    /// # Arguments
    /// * `conn` - Connection to the peer; closed before this returns
    /// * `provider` - Allocates the tunnel interface
    /// * `routes` - Route table adapter
    /// * `shutdown` - Resolves when the client should stop
    ///
    /// # Errors
    /// Returns `SessionFailed` if a command failed fatally.
    pub async fn serve<F>(
        self,
        conn: Arc<dyn Connection>,
        provider: Arc<dyn DeviceProvider>,
        routes: Arc<dyn RouteTable>,
        shutdown: F,
    ) -> Result<CloseReason>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (mux, commands) = Multiplexer::start(conn, self.config.multiplexer());

        let mut session = Session::new(Arc::clone(&mux), provider, routes)
            .with_options(self.config.session_options())
            .with_hooks(self.config.hooks())
            .with_registry(self.registry);

        let watcher = {
            let mux = Arc::clone(&mux);
            tokio::spawn(async move {
                shutdown.await;
                mux.begin_close(CloseReason::Shutdown);
            })
        };

        let outcome = session.run(commands).await;

        watcher.abort();
        mux.stop().await;

        let stats = mux.stats();
        info!(
            commands_in = stats.commands_in,
            packets_in = stats.packets_in,
            packets_out = stats.packets_out,
            packets_dropped = stats.packets_dropped,
            "Client stopped"
        );

        outcome.map_err(ClientError::from)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("default_gateway", &self.config.tunnel.default_gateway)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

/// Waits for Ctrl-C. Never resolves if the handler cannot be installed.
async fn wait_for_ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal"),
        Err(e) => {
            warn!("Cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(target_os = "linux")]
#[allow(clippy::unnecessary_wraps)]
fn system_adapters() -> Result<(Arc<dyn DeviceProvider>, Arc<dyn RouteTable>)> {
    use wstun_transport::{LinuxDeviceProvider, LinuxRouteTable};

    let provider: Arc<dyn DeviceProvider> = Arc::new(LinuxDeviceProvider);
    let routes: Arc<dyn RouteTable> = Arc::new(LinuxRouteTable);
    Ok((provider, routes))
}

#[cfg(not(target_os = "linux"))]
fn system_adapters() -> Result<(Arc<dyn DeviceProvider>, Arc<dyn RouteTable>)> {
    Err(ClientError::config_invalid(
        "platform",
        "TUN/TAP support is only available on Linux",
    ))
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use wstun_transport::{MockConnection, MockDeviceProvider, MockRouteTable};

    #[tokio::test]
    async fn test_run_without_url_is_config_error() {
        let err = Client::new(ClientConfig::default()).run().await.unwrap_err();
        assert!(err.is_config_error());
    }

    #[tokio::test]
    async fn test_serve_until_shutdown() {
        let conn = Arc::new(MockConnection::new());
        let provider = Arc::new(MockDeviceProvider::new());
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();

        let client = Client::new(ClientConfig::default());
        let serving = tokio::spawn(client.serve(
            conn.clone(),
            provider.clone(),
            Arc::new(MockRouteTable::new()),
            async move {
                let _ = stop_rx.await;
            },
        ));

        conn.inject_text("init TUN 10.8.0.2/24 1400");
        while provider.devices().is_empty() {
            tokio::task::yield_now().await;
        }
        stop_tx.send(()).unwrap();

        let reason = serving.await.unwrap().unwrap();
        assert_eq!(reason, CloseReason::Shutdown);
        assert_eq!(conn.close_count(), 1);
        assert_eq!(provider.last_device().unwrap().close_count(), 1);
    }

    #[tokio::test]
    async fn test_serve_reports_fatal_init() {
        let conn = Arc::new(MockConnection::new());
        conn.inject_text("init TUN 10.8.0.2/24 not-a-number");

        let result = Client::new(ClientConfig::default())
            .serve(
                conn.clone(),
                Arc::new(MockDeviceProvider::new()),
                Arc::new(MockRouteTable::new()),
                std::future::pending(),
            )
            .await;

        assert!(matches!(result, Err(ClientError::SessionFailed(_))));
        assert_eq!(conn.close_count(), 1);
    }
}
