//! The provider contract shared by every integration.
//!
//! An [`IntegrationProvider`] encodes one vendor's OAuth dialect and its
//! rules for turning vendor resources into [`NormalizedProject`]s.  The
//! three capabilities that talk to the vendor default to
//! [`AuthEngineError::NotImplemented`]; a provider that reaches those
//! defaults at runtime was registered before it was finished.
//! [`IntegrationProvider::disconnect`] defaults to a successful no-op:
//! disconnecting deletes the local credential only and does not revoke the
//! token at the vendor.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AuthEngineError, Result};

/// User agent sent on every vendor request.
pub const USER_AGENT: &str = concat!("Nexora-App/", env!("CARGO_PKG_VERSION"));

/// Default bound on a single vendor HTTP call.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// OAuth client registration for one provider, as loaded from configuration.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct OAuthClientConfig {
    /// The OAuth client ID.
    pub client_id: String,

    /// The OAuth client secret.
    pub client_secret: String,

    /// The redirect URI registered with the vendor (our callback endpoint).
    pub redirect_uri: String,
}

impl std::fmt::Debug for OAuthClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthClientConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .finish()
    }
}

impl OAuthClientConfig {
    /// A registration is usable once both client id and secret are set.
    pub fn is_complete(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }
}

/// Immutable per-provider identity, built once at startup.
#[derive(Clone, Debug)]
pub struct ProviderIdentity {
    /// Stable identifier used in routes and storage keys (e.g. `github`).
    pub id: String,

    /// Human-readable name (e.g. `GitHub`).
    pub name: String,

    /// OAuth client registration.
    pub client: OAuthClientConfig,
}

impl ProviderIdentity {
    pub fn new(id: &str, name: &str, client: OAuthClientConfig) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            client,
        }
    }
}

/// Vendor endpoint URLs.  Overridable so tests can point at a mock server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEndpoints {
    /// The consent-screen URL the browser is sent to.
    pub authorize_url: String,

    /// The code-for-token exchange endpoint.
    pub token_url: String,

    /// Base URL for listing calls, without a trailing slash.
    pub api_base_url: String,
}

impl ProviderEndpoints {
    /// Point every endpoint at `base` (e.g. a wiremock URI), keeping the
    /// vendor's paths.
    pub fn rebased(&self, base: &str) -> Result<Self> {
        let base = base.trim_end_matches('/');
        let path = |url: &str| -> Result<String> {
            let parsed = url::Url::parse(url)?;
            Ok(format!("{base}{}", parsed.path().trim_end_matches('/')))
        };
        Ok(Self {
            authorize_url: path(&self.authorize_url)?,
            token_url: path(&self.token_url)?,
            api_base_url: path(&self.api_base_url)?,
        })
    }
}

/// Build the shared HTTP client used for all vendor calls.
///
/// # Errors
///
/// Returns [`AuthEngineError::InvalidConfig`] if the TLS backend cannot be
/// initialised.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|e| AuthEngineError::InvalidConfig {
            reason: format!("failed to build HTTP client: {e}"),
        })
}

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// What a successful code exchange yields.
#[derive(Clone)]
pub struct RawCredential {
    /// The plaintext access token.  Encrypt before persisting.
    pub access_token: String,

    /// Vendor metadata to store alongside the token (camelCase keys).
    pub metadata: Map<String, Value>,
}

impl std::fmt::Debug for RawCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawCredential")
            .field("access_token", &"<redacted>")
            .field("metadata", &self.metadata)
            .finish()
    }
}

impl RawCredential {
    pub fn new(access_token: String) -> Self {
        Self {
            access_token,
            metadata: Map::new(),
        }
    }

    /// Attach a metadata field if the vendor supplied it.
    pub fn with(mut self, key: &str, value: Option<impl Into<Value>>) -> Self {
        if let Some(value) = value {
            self.metadata.insert(key.to_string(), value.into());
        }
        self
    }
}

/// The kind of remote resource a project was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectKind {
    Repo,
    Database,
    Channel,
}

/// A provider-agnostic view of a remote repo, database, or channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedProject {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(rename = "type")]
    pub kind: ProjectKind,
    /// ISO-8601 timestamp of the last activity, when the vendor reports one.
    pub last_activity: Option<String>,
    /// The provider the project came from.
    pub integration_id: String,
}

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

/// The capability set every integration provider implements.
#[async_trait]
pub trait IntegrationProvider: Send + Sync {
    /// The provider's static identity.
    fn identity(&self) -> &ProviderIdentity;

    /// Shorthand for `identity().id`.
    fn id(&self) -> &str {
        &self.identity().id
    }

    /// Build the vendor consent URL carrying `state` verbatim.
    fn authorization_url(&self, _state: &str) -> Result<String> {
        Err(not_implemented(self.id(), "authorization_url"))
    }

    /// Exchange an authorization code for an access token.
    async fn exchange_code(&self, _code: &str) -> Result<RawCredential> {
        Err(not_implemented(self.id(), "exchange_code"))
    }

    /// Fetch the vendor's resources and normalize them.
    async fn list_projects(&self, _access_token: &str) -> Result<Vec<NormalizedProject>> {
        Err(not_implemented(self.id(), "list_projects"))
    }

    /// Revoke the token at the vendor.  The default does nothing.
    async fn disconnect(&self, _access_token: &str) -> Result<()> {
        Ok(())
    }
}

fn not_implemented(provider: &str, capability: &'static str) -> AuthEngineError {
    AuthEngineError::NotImplemented {
        provider: provider.to_string(),
        capability,
    }
}

// ---------------------------------------------------------------------------
// Shared vendor-call helpers
// ---------------------------------------------------------------------------

/// Which half of the contract a vendor call belongs to, for error mapping.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Stage {
    Exchange,
    Listing,
}

impl Stage {
    pub(crate) fn fail(self, provider: &str, reason: impl Into<String>) -> AuthEngineError {
        let provider = provider.to_string();
        let reason = reason.into();
        match self {
            Self::Exchange => AuthEngineError::OAuthExchangeFailed { provider, reason },
            Self::Listing => AuthEngineError::ProjectFetchFailed { provider, reason },
        }
    }

    /// Map a transport error: timeouts and refused connections mean the
    /// vendor is unreachable, anything else fails the stage.
    pub(crate) fn transport(self, provider: &str, err: reqwest::Error) -> AuthEngineError {
        if err.is_timeout() || err.is_connect() {
            AuthEngineError::ProviderUnreachable {
                provider: provider.to_string(),
                reason: err.to_string(),
            }
        } else {
            self.fail(provider, err.to_string())
        }
    }
}

/// Read a vendor response body as JSON, tolerating an empty or non-JSON body.
pub(crate) async fn read_json(
    response: reqwest::Response,
    provider: &str,
    stage: Stage,
) -> Result<Value> {
    let text = response
        .text()
        .await
        .map_err(|e| stage.transport(provider, e))?;
    Ok(serde_json::from_str(&text).unwrap_or(Value::Null))
}

/// The first non-empty string among `candidates`.
pub(crate) fn first_non_empty<'a>(
    candidates: impl IntoIterator<Item = Option<&'a str>>,
) -> Option<&'a str> {
    candidates.into_iter().flatten().find(|s| !s.is_empty())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    struct Bare {
        identity: ProviderIdentity,
    }

    #[async_trait]
    impl IntegrationProvider for Bare {
        fn identity(&self) -> &ProviderIdentity {
            &self.identity
        }
    }

    fn bare() -> Bare {
        Bare {
            identity: ProviderIdentity::new("bare", "Bare", OAuthClientConfig::default()),
        }
    }

    #[tokio::test]
    async fn unimplemented_capabilities_name_themselves() {
        let p = bare();

        let err = p.authorization_url("s").unwrap_err();
        assert!(matches!(
            err,
            AuthEngineError::NotImplemented { capability: "authorization_url", .. }
        ));

        let err = p.exchange_code("c").await.unwrap_err();
        assert!(matches!(
            err,
            AuthEngineError::NotImplemented { capability: "exchange_code", .. }
        ));

        let err = p.list_projects("t").await.unwrap_err();
        assert_eq!(err.to_string(), "bare does not implement list_projects");
    }

    #[tokio::test]
    async fn default_disconnect_is_local_only_noop() {
        assert!(bare().disconnect("any-token").await.is_ok());
    }

    #[test]
    fn raw_credential_skips_absent_metadata() {
        let raw = RawCredential::new("tok".into())
            .with("scope", Some("repo"))
            .with("teamId", None::<String>);
        assert_eq!(raw.metadata.len(), 1);
        assert_eq!(raw.metadata["scope"], "repo");
    }

    #[test]
    fn secrets_are_redacted_in_debug() {
        let raw = RawCredential::new("gho_secret".into());
        assert!(!format!("{raw:?}").contains("gho_secret"));

        let cfg = OAuthClientConfig {
            client_id: "id".into(),
            client_secret: "shh".into(),
            redirect_uri: "http://localhost/cb".into(),
        };
        assert!(!format!("{cfg:?}").contains("shh"));
    }

    #[test]
    fn client_config_completeness() {
        let mut cfg = OAuthClientConfig::default();
        assert!(!cfg.is_complete());
        cfg.client_id = "id".into();
        cfg.client_secret = "secret".into();
        assert!(cfg.is_complete());
    }

    #[test]
    fn project_serializes_with_type_tag() {
        let project = NormalizedProject {
            id: "C1".into(),
            name: "#general".into(),
            description: Some("chat".into()),
            url: None,
            kind: ProjectKind::Channel,
            last_activity: None,
            integration_id: "slack".into(),
        };
        let json = serde_json::to_value(&project).unwrap();
        assert_eq!(json["type"], "channel");
        assert_eq!(json["integrationId"], "slack");
        assert!(json.get("url").is_none());
    }

    #[test]
    fn endpoints_rebase_keeps_paths() {
        let endpoints = ProviderEndpoints {
            authorize_url: "https://slack.com/oauth/v2/authorize".into(),
            token_url: "https://slack.com/api/oauth.v2.access".into(),
            api_base_url: "https://slack.com/api".into(),
        };
        let rebased = endpoints.rebased("http://127.0.0.1:9999/").unwrap();
        assert_eq!(rebased.authorize_url, "http://127.0.0.1:9999/oauth/v2/authorize");
        assert_eq!(rebased.token_url, "http://127.0.0.1:9999/api/oauth.v2.access");
        assert_eq!(rebased.api_base_url, "http://127.0.0.1:9999/api");
    }

    #[test]
    fn first_non_empty_skips_blank() {
        assert_eq!(first_non_empty([Some(""), None, Some("x")]), Some("x"));
        assert_eq!(first_non_empty([Some(""), None]), None);
    }
}
