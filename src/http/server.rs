//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router from the endpoint factory
//! - Wire up middleware (request ID, tracing)
//! - Bind server to listener
//! - Stop accepting and drain on shutdown

use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::config::GatewayConfig;
use crate::gateway::{EndpointFactory, Gateway};
use crate::http::request::MakeRequestUuid;
use crate::routing::{bind_routes, RouteError};

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
}

impl HttpServer {
    /// Bind every endpoint `factory` serves. Fails on a nil factory or a
    /// bad path template.
    pub fn new(config: GatewayConfig, factory: Arc<dyn EndpointFactory>) -> Result<Self, RouteError> {
        let gateway = Arc::new(Gateway::new(&config, factory));
        let router = Self::build_router(gateway)?;
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(gateway: Arc<Gateway>) -> Result<Router, RouteError> {
        Ok(bind_routes(gateway)?
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid)))
    }

    /// The fully layered router, for serving it some other way.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires, then drain.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.address,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Draining in-flight requests");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}
