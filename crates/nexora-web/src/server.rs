//! Main web server setup and startup.
//!
//! [`WebServer`] composes the Axum router, registers all routes, and starts
//! the HTTP listener.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use nexora_auth_engine::{IdentityVerifier, IntegrationManager};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{BASE_PATH, WebConfig, api};

/// The Nexora integrations web server.
pub struct WebServer {
    config: WebConfig,
    state: Arc<AppState>,
}

impl WebServer {
    pub fn new(
        config: WebConfig,
        manager: Arc<IntegrationManager>,
        identity: Arc<dyn IdentityVerifier>,
    ) -> Self {
        let state = Arc::new(AppState {
            manager,
            identity,
            config: config.clone(),
        });
        Self { config, state }
    }

    /// Return the `host:port` string this server will bind to.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.config.bind_addr, self.config.port)
    }

    /// Build the Axum router with all routes registered.
    pub fn router(&self) -> Router {
        let route = |suffix: &str| format!("{BASE_PATH}{suffix}");

        Router::new()
            .route(BASE_PATH, get(api::health))
            .route(&route("/"), get(api::health))
            .route(&route("/connections"), get(api::connections))
            .route(&route("/{provider}/start"), get(api::start))
            .route(&route("/{provider}/callback"), get(api::callback))
            .route(&route("/{provider}/disconnect"), post(api::disconnect))
            .route(&route("/{provider}/projects"), get(api::projects))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(Arc::clone(&self.state))
    }

    /// Start the server and block until it is shut down.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP listener cannot be bound.
    pub async fn start(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = self.addr();
        let router = self.router();

        tracing::info!(
            addr = %addr,
            providers = self.state.manager.registry().len(),
            "starting web server"
        );

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("web server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
