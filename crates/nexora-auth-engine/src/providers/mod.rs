//! Bundled integration providers.
//!
//! Each module implements [`IntegrationProvider`](crate::provider::IntegrationProvider)
//! for one vendor.  [`ProvidersConfig`] carries the OAuth client
//! registrations loaded at startup; only complete registrations are turned
//! into providers.

pub mod github;
pub mod notion;
pub mod slack;

use serde::{Deserialize, Serialize};

pub use github::GitHubProvider;
pub use notion::NotionProvider;
pub use slack::SlackProvider;

use crate::provider::OAuthClientConfig;

/// OAuth client registrations for the bundled providers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub github: Option<OAuthClientConfig>,
    pub notion: Option<OAuthClientConfig>,
    pub slack: Option<OAuthClientConfig>,
}
