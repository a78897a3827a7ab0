//! OAuth integration engine for Nexora.
//!
//! This crate connects a user's account to third-party services and lets
//! the application list the resources behind each connection:
//!
//! - **Provider contract** ([`IntegrationProvider`]) with bundled GitHub,
//!   Notion and Slack implementations
//! - **Callback state** ([`StateCodec`]), optionally HMAC-signed
//! - **Orchestration** ([`IntegrationManager`]): start, callback,
//!   disconnect, project listing
//! - **Caller identity** ([`IdentityVerifier`]) for the HTTP surface
//!
//! Access tokens are encrypted with [`nexora_vault::TokenCipher`] before
//! they reach a [`nexora_vault::CredentialStore`].
//!
//! # Architecture
//!
//! ```text
//! IntegrationManager
//! ├── ProviderRegistry   (id → IntegrationProvider)
//! ├── StateCodec         (redirect state)
//! ├── TokenCipher        (token encryption)
//! └── CredentialStore    (per-user credentials)
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use nexora_auth_engine::provider::http_client;
//! use nexora_auth_engine::{
//!     IntegrationManager, OAuthClientConfig, ProviderRegistry, ProvidersConfig, StateCodec,
//! };
//! use nexora_vault::{MemoryCredentialStore, TokenCipher};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let providers = ProvidersConfig {
//!     github: Some(OAuthClientConfig {
//!         client_id: "gh-client".into(),
//!         client_secret: "gh-secret".into(),
//!         redirect_uri: "http://localhost:3001/api/integrations/github/callback".into(),
//!     }),
//!     ..Default::default()
//! };
//!
//! let registry = ProviderRegistry::from_config(&providers, http_client(Duration::from_secs(15))?);
//! let manager = IntegrationManager::new(
//!     registry,
//!     Arc::new(MemoryCredentialStore::new()),
//!     TokenCipher::new(&[0u8; 32])?,
//!     StateCodec::signed(b"state-secret"),
//! );
//!
//! let url = manager.start_flow("user-1", "github")?;
//! println!("send the browser to {url}");
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod identity;
pub mod manager;
pub mod provider;
pub mod providers;
pub mod registry;
pub mod state;

// Re-export key types at the crate root for convenience.
pub use error::{AuthEngineError, Result};
pub use identity::{IdentityVerifier, StaticTokenVerifier, bearer_token};
pub use manager::{CallbackParams, ConnectionSummary, IntegrationManager, callback_redirect};
pub use provider::{
    IntegrationProvider, NormalizedProject, OAuthClientConfig, ProjectKind, ProviderEndpoints,
    ProviderIdentity, RawCredential,
};
pub use providers::{GitHubProvider, NotionProvider, ProvidersConfig, SlackProvider};
pub use registry::ProviderRegistry;
pub use state::{OAuthState, StateCodec};
