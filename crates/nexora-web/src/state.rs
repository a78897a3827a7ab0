//! Shared application state for the web server.
//!
//! [`AppState`] is wrapped in an `Arc` and shared across all request
//! handlers.  Everything in it is read-only after startup.

use std::sync::Arc;

use nexora_auth_engine::{IdentityVerifier, IntegrationManager};

use crate::WebConfig;

/// Shared state accessible from every Axum handler.
#[derive(Clone)]
pub struct AppState {
    /// Orchestrates flows, credentials and project listing.
    pub manager: Arc<IntegrationManager>,

    /// Resolves bearer tokens to user ids.
    pub identity: Arc<dyn IdentityVerifier>,

    /// Web server configuration.
    pub config: WebConfig,
}
