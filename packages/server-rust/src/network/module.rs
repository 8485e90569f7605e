//! HTTP server lifecycle: `new()` wires state, `start()` binds, `serve()`
//! accepts requests until the shutdown future resolves.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::config::NetworkConfig;
use super::handlers::{
    chainhook_handler, health_handler, liveness_handler, readiness_handler, status_handler,
    AppState,
};
use super::middleware::build_http_layers;
use super::shutdown::ShutdownController;
use crate::monitoring::MonitoringOrchestrator;
use crate::service::pipeline::ChainhookPipeline;

pub struct NetworkModule {
    config: NetworkConfig,
    listener: Option<TcpListener>,
    shutdown: Arc<ShutdownController>,
    pipeline: Arc<ChainhookPipeline>,
    monitor: Arc<MonitoringOrchestrator>,
}

impl NetworkModule {
    #[must_use]
    pub fn new(
        config: NetworkConfig,
        pipeline: Arc<ChainhookPipeline>,
        monitor: Arc<MonitoringOrchestrator>,
    ) -> Self {
        Self {
            config,
            listener: None,
            shutdown: Arc::new(ShutdownController::new()),
            pipeline,
            monitor,
        }
    }

    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.shutdown)
    }

    /// Routes:
    /// - `POST /chainhook` -- webhook intake
    /// - `GET /health`, `/health/live`, `/health/ready`
    /// - `GET /status` -- monitoring and pipeline metrics
    pub fn build_router(&self) -> Router {
        let state = AppState {
            shutdown: Arc::clone(&self.shutdown),
            config: Arc::new(self.config.clone()),
            pipeline: Arc::clone(&self.pipeline),
            monitor: Arc::clone(&self.monitor),
            start_time: Instant::now(),
        };

        Router::new()
            .route("/chainhook", post(chainhook_handler))
            .route("/health", get(health_handler))
            .route("/health/live", get(liveness_handler))
            .route("/health/ready", get(readiness_handler))
            .route("/status", get(status_handler))
            // The tower-http limit below replaces axum's 2 MB default.
            .layer(DefaultBodyLimit::disable())
            .layer(build_http_layers(&self.config))
            .with_state(state)
    }

    /// Binds the listener and returns the bound port.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        let port = listener.local_addr()?.port();
        info!(host = %self.config.host, port, "listener bound");

        self.listener = Some(listener);
        Ok(port)
    }

    /// Serves until `shutdown` resolves, then refuses new webhooks and waits
    /// up to `drain_timeout` for in-flight ones.
    ///
    /// # Errors
    ///
    /// Fails if `start()` was not called, or on a fatal I/O error.
    pub async fn serve(
        mut self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let listener = self
            .listener
            .take()
            .context("start() must be called before serve()")?;
        let router = self.build_router();
        let controller = Arc::clone(&self.shutdown);

        controller.set_ready();
        info!("serving HTTP");

        let drain_ctrl = Arc::clone(&controller);
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown.await;
                drain_ctrl.trigger_shutdown();
            })
            .await?;

        controller.trigger_shutdown();
        if controller.wait_for_drain(self.config.drain_timeout).await {
            info!("in-flight requests drained");
        } else {
            warn!(
                remaining = controller.in_flight_count(),
                "drain timeout expired with requests in flight"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::handlers::test_support::test_state;
    use crate::network::HealthState;

    async fn module() -> NetworkModule {
        let state = test_state(None).await;
        NetworkModule::new(NetworkConfig::default(), state.pipeline, state.monitor)
    }

    #[tokio::test]
    async fn router_builds() {
        let _router = module().await.build_router();
    }

    #[tokio::test]
    async fn start_binds_ephemeral_port() {
        let mut module = module().await;
        let port = module.start().await.unwrap();
        assert!(port > 0);
        assert!(module.listener.is_some());
    }

    #[tokio::test]
    async fn serve_without_start_fails() {
        let module = module().await;
        let err = module.serve(std::future::ready(())).await.unwrap_err();
        assert!(err.to_string().contains("start()"));
    }

    #[tokio::test]
    async fn serve_stops_on_signal() {
        let mut module = module().await;
        module.start().await.unwrap();
        let controller = module.shutdown_controller();

        module.serve(std::future::ready(())).await.unwrap();
        assert_eq!(controller.health_state(), HealthState::Stopped);
    }
}
