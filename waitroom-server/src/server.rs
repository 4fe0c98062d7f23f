//! HTTP server lifecycle

use crate::api::build_router;
use crate::state::AppState;
use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use waitroom_core::config::MetricsConfig;
use waitroom_core::shutdown::ShutdownCoordinator;

/// Queue API server
pub struct WaitroomServer {
    state: Arc<AppState>,
    shutdown: Arc<ShutdownCoordinator>,
}

impl WaitroomServer {
    pub fn new(state: Arc<AppState>, shutdown: Arc<ShutdownCoordinator>) -> Self {
        Self { state, shutdown }
    }

    /// Bind `addr` and serve until shutdown
    pub async fn run(self, addr: SocketAddr) -> Result<()> {
        let listener =
            TcpListener::bind(addr).await.with_context(|| format!("Failed to bind {}", addr))?;
        self.serve(listener).await
    }

    /// Serve on an already-bound listener until shutdown.
    ///
    /// In-flight requests are allowed to finish once shutdown is signalled.
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let router = build_router(self.state);
        info!(addr = %listener.local_addr()?, "Queue API listening");

        let shutdown = self.shutdown;
        axum::serve(listener, router)
            .with_graceful_shutdown(async move { shutdown.wait_for_shutdown().await })
            .await?;

        info!("Queue API stopped");
        Ok(())
    }
}

/// Install the Prometheus recorder and scrape endpoint if enabled
pub fn install_metrics_exporter(config: &MetricsConfig) -> Result<()> {
    waitroom_core::metrics::init_metrics();

    if config.enabled {
        PrometheusBuilder::new()
            .with_http_listener(config.bind_address)
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!(addr = %config.bind_address, "Prometheus exporter listening");
    }

    Ok(())
}
