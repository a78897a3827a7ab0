//! The integration orchestrator.
//!
//! [`IntegrationManager`] drives the per-user connection lifecycle:
//!
//! ```text
//! Disconnected ──start_flow──▶ (state in flight) ──handle_callback──▶ Connected
//!      ▲                                                                  │
//!      └──────────────────────────── disconnect ◀─────────────────────────┘
//! ```
//!
//! Nothing is persisted while a flow is pending; a browser that never
//! returns leaves the pair disconnected.  A second successful callback
//! re-enters `Connected`, merging the new credential over the old one.
//!
//! The manager holds no mutable state of its own.  Concurrent callbacks and
//! disconnects for the same pair race at the store, which is
//! last-write-wins.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use nexora_vault::{ConnectionStatus, Credential, CredentialStore, TokenCipher};
use serde::{Deserialize, Serialize};

use crate::error::{AuthEngineError, Result};
use crate::provider::{IntegrationProvider, NormalizedProject};
use crate::registry::ProviderRegistry;
use crate::state::{OAuthState, StateCodec};

/// Query parameters the vendor appends to the callback redirect.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Set by the vendor when the user denied consent.
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// One row of the per-user connections overview.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSummary {
    pub id: String,
    pub name: String,
    pub status: ConnectionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// IntegrationManager
// ---------------------------------------------------------------------------

/// Coordinates providers, state, encryption and credential storage.
pub struct IntegrationManager {
    registry: ProviderRegistry,
    store: Arc<dyn CredentialStore>,
    cipher: TokenCipher,
    states: StateCodec,
}

impl std::fmt::Debug for IntegrationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntegrationManager")
            .field("registry", &self.registry)
            .field("states", &self.states)
            .finish_non_exhaustive()
    }
}

impl IntegrationManager {
    pub fn new(
        registry: ProviderRegistry,
        store: Arc<dyn CredentialStore>,
        cipher: TokenCipher,
        states: StateCodec,
    ) -> Self {
        Self {
            registry,
            store,
            cipher,
            states,
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Begin a connection: mint a state for `(user_id, provider_id)` and
    /// return the vendor consent URL carrying it.
    ///
    /// # Errors
    ///
    /// Returns [`AuthEngineError::ProviderNotFound`] for an unregistered
    /// provider.
    pub fn start_flow(&self, user_id: &str, provider_id: &str) -> Result<String> {
        let provider = self.registry.get(provider_id)?;
        let state = self.states.encode(&OAuthState::new(user_id, provider_id))?;
        let url = provider.authorization_url(&state)?;

        tracing::info!(provider = provider_id, user_id = user_id, "oauth flow started");
        Ok(url)
    }

    /// Complete a connection from the vendor redirect.
    ///
    /// On success the access token is encrypted and merged into the user's
    /// credential together with the vendor metadata.  No credential is
    /// written on any failure path.
    ///
    /// # Errors
    ///
    /// - [`AuthEngineError::ProviderNotFound`] for an unregistered provider.
    /// - [`AuthEngineError::OAuthExchangeFailed`] if the vendor reported an
    ///   error, no code was returned, or the exchange was rejected.
    /// - [`AuthEngineError::InvalidState`] if the state is missing, invalid,
    ///   or was issued for a different provider.
    pub async fn handle_callback(
        &self,
        provider_id: &str,
        params: &CallbackParams,
    ) -> Result<OAuthState> {
        let provider = self.registry.get(provider_id)?;

        if let Some(error) = params.error.as_deref().filter(|e| !e.is_empty()) {
            let reason = params
                .error_description
                .as_deref()
                .filter(|d| !d.is_empty())
                .unwrap_or(error);
            return Err(AuthEngineError::OAuthExchangeFailed {
                provider: provider_id.to_string(),
                reason: reason.to_string(),
            });
        }

        let state = self.states.decode(params.state.as_deref().unwrap_or_default())?;
        if state.provider_id != provider_id {
            return Err(AuthEngineError::InvalidState {
                reason: format!(
                    "state was issued for {}, not {provider_id}",
                    state.provider_id
                ),
            });
        }

        let code = params
            .code
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| AuthEngineError::OAuthExchangeFailed {
                provider: provider_id.to_string(),
                reason: "No authorization code returned from provider".into(),
            })?;

        let raw = provider.exchange_code(code).await?;
        let token = self.cipher.encrypt(&raw.access_token)?;
        let credential = Credential::connected(token, raw.metadata);
        self.store
            .upsert(&state.user_id, provider_id, &credential)
            .await?;

        tracing::info!(provider = provider_id, user_id = %state.user_id, "integration connected");
        Ok(state)
    }

    /// Remove the user's credential for `provider_id`.
    ///
    /// The provider's revocation hook is called first, best-effort; its
    /// failure is logged and does not block the local delete.  Disconnecting
    /// a pair with no credential succeeds, and so does disconnecting a
    /// provider that is no longer registered: its stored record is deleted
    /// without a revocation attempt.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the delete fails.
    pub async fn disconnect(&self, user_id: &str, provider_id: &str) -> Result<()> {
        match self.registry.get(provider_id) {
            Ok(provider) => self.revoke(user_id, provider.as_ref()).await,
            Err(_) => {
                tracing::debug!(
                    provider = provider_id,
                    "provider not registered, skipping revocation"
                );
            }
        }

        self.store.delete(user_id, provider_id).await?;
        tracing::info!(provider = provider_id, user_id = user_id, "integration disconnected");
        Ok(())
    }

    /// Best-effort vendor revocation of the stored token, if any.
    async fn revoke(&self, user_id: &str, provider: &dyn IntegrationProvider) {
        let provider_id = provider.identity().id.as_str();
        let token = match self.store.get(user_id, provider_id).await {
            Ok(Some(credential)) => match self.cipher.decrypt(&credential.token) {
                Ok(token) => token,
                Err(e) => {
                    tracing::warn!(
                        provider = provider_id,
                        error = %e,
                        "stored token unreadable, skipping revocation"
                    );
                    return;
                }
            },
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(
                    provider = provider_id,
                    error = %e,
                    "could not load credential before delete"
                );
                return;
            }
        };

        if let Err(e) = provider.disconnect(&token).await {
            tracing::warn!(provider = provider_id, error = %e, "vendor revocation failed");
        }
    }

    /// Fetch the user's projects from the vendor.  Never cached.
    ///
    /// # Errors
    ///
    /// - [`AuthEngineError::ProviderNotFound`] for an unregistered provider.
    /// - [`AuthEngineError::NotConnected`] if no credential is stored; no
    ///   vendor call is made in that case.
    /// - [`AuthEngineError::DecryptionFailed`] if the stored token is
    ///   unreadable.
    /// - [`AuthEngineError::ProjectFetchFailed`] if the vendor call fails.
    pub async fn list_projects(
        &self,
        user_id: &str,
        provider_id: &str,
    ) -> Result<Vec<NormalizedProject>> {
        let provider = self.registry.get(provider_id)?;
        let credential = self
            .store
            .get(user_id, provider_id)
            .await?
            .ok_or_else(|| AuthEngineError::NotConnected {
                provider: provider_id.to_string(),
            })?;

        let token = self.cipher.decrypt(&credential.token)?;
        let projects = provider.list_projects(&token).await?;

        tracing::debug!(provider = provider_id, count = projects.len(), "projects listed");
        Ok(projects)
    }

    /// Every registered provider with the user's connection status.
    pub async fn connections(&self, user_id: &str) -> Result<Vec<ConnectionSummary>> {
        let stored = self.store.list(user_id).await?;

        Ok(self
            .registry
            .identities()
            .map(|identity| {
                let credential = stored
                    .iter()
                    .find(|(provider, _)| *provider == identity.id)
                    .map(|(_, c)| c);
                ConnectionSummary {
                    id: identity.id.clone(),
                    name: identity.name.clone(),
                    status: credential
                        .map(|c| c.status)
                        .unwrap_or(ConnectionStatus::Disconnected),
                    connected_at: credential.map(|c| c.connected_at),
                }
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Callback redirect
// ---------------------------------------------------------------------------

/// Build the browser redirect that ends a callback.
///
/// ```text
/// success: {frontend}/?view=integrations&status=success&provider={id}
/// failure: {frontend}/?view=integrations&status=error&message={message}
/// ```
pub fn callback_redirect(
    frontend_url: &str,
    provider_id: &str,
    outcome: &Result<OAuthState>,
) -> String {
    let base = frontend_url.trim_end_matches('/');
    match outcome {
        Ok(_) => format!(
            "{base}/?view=integrations&status=success&provider={}",
            encode(provider_id)
        ),
        Err(e) => format!(
            "{base}/?view=integrations&status=error&message={}",
            encode(&e.to_string())
        ),
    }
}

fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
