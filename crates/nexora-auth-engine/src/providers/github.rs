//! GitHub OAuth App integration.
//!
//! - Consent: `https://github.com/login/oauth/authorize` with scope
//!   `repo read:user`.
//! - Exchange: JSON body, `Accept: application/json`.  GitHub answers
//!   `200 OK` even for a rejected code, so the body's `error` field is the
//!   only reliable failure signal.
//! - Projects: the user's repositories, most recently updated first.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use url::Url;

use crate::error::Result;
use crate::provider::{
    IntegrationProvider, NormalizedProject, OAuthClientConfig, ProjectKind, ProviderEndpoints,
    ProviderIdentity, RawCredential, Stage, USER_AGENT, first_non_empty, read_json,
};

pub const ID: &str = "github";
pub const NAME: &str = "GitHub";
pub const SCOPE: &str = "repo read:user";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    token_type: Option<String>,
    scope: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Repo {
    id: u64,
    name: String,
    description: Option<String>,
    html_url: Option<String>,
    updated_at: Option<String>,
}

impl From<Repo> for NormalizedProject {
    fn from(repo: Repo) -> Self {
        Self {
            id: repo.id.to_string(),
            name: repo.name,
            description: repo.description,
            url: repo.html_url,
            kind: ProjectKind::Repo,
            last_activity: repo.updated_at,
            integration_id: ID.to_string(),
        }
    }
}

/// GitHub provider.
pub struct GitHubProvider {
    identity: ProviderIdentity,
    endpoints: ProviderEndpoints,
    client: reqwest::Client,
}

impl GitHubProvider {
    pub fn new(config: OAuthClientConfig, client: reqwest::Client) -> Self {
        Self {
            identity: ProviderIdentity::new(ID, NAME, config),
            endpoints: Self::default_endpoints(),
            client,
        }
    }

    pub fn default_endpoints() -> ProviderEndpoints {
        ProviderEndpoints {
            authorize_url: "https://github.com/login/oauth/authorize".into(),
            token_url: "https://github.com/login/oauth/access_token".into(),
            api_base_url: "https://api.github.com".into(),
        }
    }

    /// Override vendor endpoints (GitHub Enterprise, tests).
    pub fn with_endpoints(mut self, endpoints: ProviderEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }
}

#[async_trait]
impl IntegrationProvider for GitHubProvider {
    fn identity(&self) -> &ProviderIdentity {
        &self.identity
    }

    fn authorization_url(&self, state: &str) -> Result<String> {
        let client = &self.identity.client;
        let url = Url::parse_with_params(
            &self.endpoints.authorize_url,
            &[
                ("client_id", client.client_id.as_str()),
                ("redirect_uri", client.redirect_uri.as_str()),
                ("scope", SCOPE),
                ("state", state),
            ],
        )?;
        Ok(url.into())
    }

    async fn exchange_code(&self, code: &str) -> Result<RawCredential> {
        let client = &self.identity.client;
        tracing::debug!(
            provider = ID,
            token_url = %self.endpoints.token_url,
            "exchanging authorization code"
        );

        let response = self
            .client
            .post(&self.endpoints.token_url)
            .header("Accept", "application/json")
            .json(&json!({
                "client_id": client.client_id,
                "client_secret": client.client_secret,
                "code": code,
                "redirect_uri": client.redirect_uri,
            }))
            .send()
            .await
            .map_err(|e| Stage::Exchange.transport(ID, e))?;

        let status = response.status();
        let body = read_json(response, ID, Stage::Exchange).await?;
        let parsed: TokenResponse = serde_json::from_value(body).map_err(|_| {
            Stage::Exchange.fail(ID, format!("unexpected token response (HTTP {status})"))
        })?;

        if let Some(reason) = first_non_empty([
            parsed.error_description.as_deref(),
            parsed.error.as_deref(),
        ]) {
            return Err(Stage::Exchange.fail(ID, reason));
        }
        if !status.is_success() {
            return Err(Stage::Exchange.fail(ID, format!("HTTP {status}")));
        }

        let access_token = parsed
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Stage::Exchange.fail(ID, "response did not include an access token"))?;

        Ok(RawCredential::new(access_token)
            .with("tokenType", parsed.token_type)
            .with("scope", parsed.scope))
    }

    async fn list_projects(&self, access_token: &str) -> Result<Vec<NormalizedProject>> {
        let url = format!(
            "{}/user/repos?sort=updated&per_page=100",
            self.endpoints.api_base_url
        );
        tracing::debug!(provider = ID, "listing repositories");

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {access_token}"))
            .header("Accept", "application/vnd.github.v3+json")
            .header("User-Agent", USER_AGENT)
            .send()
            .await
            .map_err(|e| Stage::Listing.transport(ID, e))?;

        let status = response.status();
        let body = read_json(response, ID, Stage::Listing).await?;

        if !status.is_success() {
            let reason = first_non_empty([body.get("message").and_then(|m| m.as_str())])
                .unwrap_or("Failed to fetch GitHub repos");
            return Err(Stage::Listing.fail(ID, reason));
        }

        let repos: Vec<Repo> = serde_json::from_value(body)
            .map_err(|e| Stage::Listing.fail(ID, format!("unexpected repository payload: {e}")))?;

        Ok(repos.into_iter().map(NormalizedProject::from).collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
