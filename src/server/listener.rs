//! Push server listener
//!
//! Binds the TCP listener and serves the [`routes`](super::routes) with
//! `axum::serve`. Shutdown ends every open event stream so the graceful
//! drain can finish.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;

use super::config::PushServerConfig;
use super::routes::{self, AppState};
use crate::error::Result;
use crate::hub::LogStreamHub;
use crate::orchestrator::PushOrchestrator;

/// SSE push server
pub struct PushServer {
    state: Arc<AppState>,
}

impl PushServer {
    /// Create a server over a running orchestrator and hub
    pub fn new(
        config: PushServerConfig,
        orchestrator: Arc<PushOrchestrator>,
        hub: Arc<LogStreamHub>,
    ) -> Self {
        Self {
            state: Arc::new(AppState::new(config, orchestrator, hub)),
        }
    }

    /// Get the orchestrator
    pub fn orchestrator(&self) -> &Arc<PushOrchestrator> {
        &self.state.orchestrator
    }

    /// Get the hub
    pub fn hub(&self) -> &Arc<LogStreamHub> {
        &self.state.hub
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.state.config.bind_addr
    }

    /// Routes for embedding in a larger axum app
    pub fn router(&self) -> Router {
        routes::router(Arc::clone(&self.state))
    }

    /// Run the server
    ///
    /// This method blocks until the server is shut down.
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.state.config.bind_addr).await?;
        self.serve(listener, std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.state.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    ///
    /// Starts the hub sweep for the lifetime of the call. The orchestrator is
    /// left running; stop it separately.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(addr = %addr, "Push server listening");

        self.state.shutdown.send_replace(false);
        let sweep_handle = self.state.hub.spawn_sweep_task();

        let state = Arc::clone(&self.state);
        let result = axum::serve(listener, self.router())
            .tcp_nodelay(self.state.config.tcp_nodelay)
            .with_graceful_shutdown(async move {
                shutdown.await;
                tracing::info!("Shutdown signal received");
                state.shutdown.send_replace(true);
            })
            .await;

        sweep_handle.abort();
        tracing::info!(addr = %addr, "Push server stopped");

        Ok(result?)
    }
}
