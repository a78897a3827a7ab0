//! Registry of the providers available to this process.
//!
//! Built once at startup and handed to the
//! [`IntegrationManager`](crate::manager::IntegrationManager); read-only
//! afterwards.  New providers are added with [`ProviderRegistry::register`]
//! without touching the manager.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{AuthEngineError, Result};
use crate::provider::{IntegrationProvider, OAuthClientConfig, ProviderIdentity};
use crate::providers::{
    GitHubProvider, NotionProvider, ProvidersConfig, SlackProvider, github, notion, slack,
};

/// Provider id → implementation.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Arc<dyn IntegrationProvider>>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the bundled providers whose client registration is complete.
    ///
    /// Incomplete registrations are skipped with a warning; the process can
    /// still serve the remaining providers.
    pub fn from_config(config: &ProvidersConfig, client: reqwest::Client) -> Self {
        let mut registry = Self::new();

        if let Some(cfg) = usable(github::ID, &config.github) {
            registry.register(Arc::new(GitHubProvider::new(cfg.clone(), client.clone())));
        }
        if let Some(cfg) = usable(notion::ID, &config.notion) {
            registry.register(Arc::new(NotionProvider::new(cfg.clone(), client.clone())));
        }
        if let Some(cfg) = usable(slack::ID, &config.slack) {
            registry.register(Arc::new(SlackProvider::new(cfg.clone(), client)));
        }

        registry
    }

    /// Add a provider, replacing any previous one with the same id.
    pub fn register(&mut self, provider: Arc<dyn IntegrationProvider>) -> &mut Self {
        let id = provider.id().to_string();
        if self.providers.insert(id.clone(), provider).is_some() {
            tracing::warn!(provider = %id, "replaced existing provider registration");
        } else {
            tracing::info!(provider = %id, "registered provider");
        }
        self
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, provider: Arc<dyn IntegrationProvider>) -> Self {
        self.register(provider);
        self
    }

    /// Look up a provider by id.
    ///
    /// # Errors
    ///
    /// Returns [`AuthEngineError::ProviderNotFound`] if `id` is unregistered.
    pub fn get(&self, id: &str) -> Result<Arc<dyn IntegrationProvider>> {
        self.providers
            .get(id)
            .cloned()
            .ok_or_else(|| AuthEngineError::ProviderNotFound {
                provider: id.to_string(),
            })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.providers.contains_key(id)
    }

    /// Identities of all registered providers, ordered by id.
    pub fn identities(&self) -> impl Iterator<Item = &ProviderIdentity> {
        self.providers.values().map(|p| p.identity())
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

fn usable<'a>(id: &str, entry: &'a Option<OAuthClientConfig>) -> Option<&'a OAuthClientConfig> {
    let cfg = entry.as_ref().filter(|c| c.is_complete());
    if cfg.is_none() {
        tracing::warn!(provider = id, "provider not configured, skipping");
    }
    cfg
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
