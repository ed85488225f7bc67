//! Server lifecycle with deferred startup.
//!
//! `new()` assembles state, `start()` binds the listener, `serve()` accepts
//! requests until the shutdown future resolves and then drains running
//! invocations.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::config::NetworkConfig;
use super::handlers::{
    health_handler, invoke_handler, liveness_handler, readiness_handler, AppState,
    ServiceDirectory,
};
use super::middleware::with_http_layers;
use super::shutdown::ShutdownController;

/// How long `serve()` waits for running invocations after shutdown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

pub struct NetworkModule {
    config: NetworkConfig,
    listener: Option<TcpListener>,
    services: Arc<ServiceDirectory>,
    shutdown: Arc<ShutdownController>,
}

impl NetworkModule {
    #[must_use]
    pub fn new(config: NetworkConfig, services: ServiceDirectory) -> Self {
        Self {
            config,
            listener: None,
            services: Arc::new(services),
            shutdown: Arc::new(ShutdownController::new()),
        }
    }

    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.shutdown)
    }

    /// Routes:
    /// - `GET /health`, `GET /health/live`, `GET /health/ready`
    /// - `POST /services/{service}/operations/{method}`
    pub fn build_router(&self) -> Router {
        let state = AppState {
            services: Arc::clone(&self.services),
            shutdown: Arc::clone(&self.shutdown),
            config: Arc::new(self.config.clone()),
            start_time: Instant::now(),
        };
        router(state, &self.config)
    }

    /// Binds the listener and returns the bound port (useful with port 0).
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let port = listener.local_addr()?.port();
        info!(host = %self.config.host, port, "listener bound");
        self.listener = Some(listener);
        Ok(port)
    }

    /// Serves until `shutdown` resolves, then drains.
    ///
    /// # Errors
    ///
    /// Returns an error if `start()` was not called or the server fails.
    pub async fn serve(
        mut self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let listener = self
            .listener
            .take()
            .ok_or_else(|| anyhow::anyhow!("start() must be called before serve()"))?;
        let router = self.build_router();
        let controller = Arc::clone(&self.shutdown);

        controller.mark_ready();
        info!(services = self.services.len(), "gateway ready");

        let draining = Arc::clone(&controller);
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown.await;
                draining.begin_drain();
            })
            .await?;

        if controller.drained_within(DRAIN_TIMEOUT).await {
            info!("no remote calls left running");
        } else {
            warn!(
                running = controller.running(),
                "gave up waiting for remote calls to finish"
            );
        }
        Ok(())
    }
}

fn router(state: AppState, config: &NetworkConfig) -> Router {
    let routes = Router::new()
        .route("/health", get(health_handler))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .route("/services/{service}/operations/{method}", post(invoke_handler));
    with_http_layers(routes, config).with_state(state)
}
