//! HTTP surface for Nexora integrations.
//!
//! All routes live under [`BASE_PATH`]:
//!
//! | Method | Path                    | Auth   | Response                          |
//! |--------|-------------------------|--------|-----------------------------------|
//! | GET    | `/`                     | none   | `{"status": ...}`                 |
//! | GET    | `/connections`          | bearer | `{"integrations": [...]}`         |
//! | GET    | `/{provider}/start`     | bearer | `{"url": ...}`                    |
//! | GET    | `/{provider}/callback`  | none   | `302` back to the frontend        |
//! | POST   | `/{provider}/disconnect`| bearer | `{"success": true}`               |
//! | GET    | `/{provider}/projects`  | bearer | `{"projects": [...]}`             |
//!
//! Errors on bearer routes are JSON `{"error": message}` bodies.  The
//! callback never returns an error body; it always redirects.

pub mod api;
pub mod error;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use server::WebServer;
pub use state::AppState;

/// Mount point of the integrations API.
pub const BASE_PATH: &str = "/api/integrations";

/// Web server configuration.
#[derive(Debug, Clone)]
pub struct WebConfig {
    /// The address to bind the HTTP server to.
    pub bind_addr: String,
    /// The port to listen on.
    pub port: u16,
    /// Where the browser is sent after an OAuth callback.
    pub frontend_url: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".into(),
            port: 3001,
            frontend_url: "http://localhost:3000".into(),
        }
    }
}
