//! Notion public integration.
//!
//! - Consent: `https://api.notion.com/v1/oauth/authorize` with
//!   `response_type=code&owner=user`; Notion has no scope parameter.
//! - Exchange: JSON body authenticated with HTTP Basic
//!   (`client_id:client_secret`).
//! - Projects: databases shared with the integration, via the search API.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use url::Url;

use crate::error::Result;
use crate::provider::{
    IntegrationProvider, NormalizedProject, OAuthClientConfig, ProjectKind, ProviderEndpoints,
    ProviderIdentity, RawCredential, Stage, first_non_empty, read_json,
};

pub const ID: &str = "notion";
pub const NAME: &str = "Notion";

/// Pinned API version sent with every data request.
pub const NOTION_VERSION: &str = "2022-06-28";

const UNTITLED: &str = "Untitled Database";
const DESCRIPTION: &str = "Notion Database";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    workspace_id: Option<String>,
    workspace_name: Option<String>,
    workspace_icon: Option<String>,
    bot_id: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<Database>,
}

#[derive(Debug, Deserialize)]
struct RichText {
    plain_text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Database {
    id: String,
    #[serde(default)]
    title: Vec<RichText>,
    url: Option<String>,
    last_edited_time: Option<String>,
}

impl From<Database> for NormalizedProject {
    fn from(db: Database) -> Self {
        let name = db
            .title
            .into_iter()
            .next()
            .and_then(|span| span.plain_text)
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| UNTITLED.to_string());

        Self {
            id: db.id,
            name,
            description: Some(DESCRIPTION.to_string()),
            url: db.url,
            kind: ProjectKind::Database,
            last_activity: db.last_edited_time,
            integration_id: ID.to_string(),
        }
    }
}

/// Notion provider.
pub struct NotionProvider {
    identity: ProviderIdentity,
    endpoints: ProviderEndpoints,
    client: reqwest::Client,
}

impl NotionProvider {
    pub fn new(config: OAuthClientConfig, client: reqwest::Client) -> Self {
        Self {
            identity: ProviderIdentity::new(ID, NAME, config),
            endpoints: Self::default_endpoints(),
            client,
        }
    }

    pub fn default_endpoints() -> ProviderEndpoints {
        ProviderEndpoints {
            authorize_url: "https://api.notion.com/v1/oauth/authorize".into(),
            token_url: "https://api.notion.com/v1/oauth/token".into(),
            api_base_url: "https://api.notion.com/v1".into(),
        }
    }

    pub fn with_endpoints(mut self, endpoints: ProviderEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }
}

#[async_trait]
impl IntegrationProvider for NotionProvider {
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
                ("response_type", "code"),
                ("owner", "user"),
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
            .basic_auth(&client.client_id, Some(&client.client_secret))
            .json(&json!({
                "grant_type": "authorization_code",
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
            .with("workspaceId", parsed.workspace_id)
            .with("workspaceName", parsed.workspace_name)
            .with("workspaceIcon", parsed.workspace_icon)
            .with("botId", parsed.bot_id))
    }

    async fn list_projects(&self, access_token: &str) -> Result<Vec<NormalizedProject>> {
        let url = format!("{}/search", self.endpoints.api_base_url);
        tracing::debug!(provider = ID, "searching databases");

        let response = self
            .client
            .post(&url)
            .bearer_auth(access_token)
            .header("Notion-Version", NOTION_VERSION)
            .json(&json!({
                "filter": { "property": "object", "value": "database" },
                "page_size": 100,
            }))
            .send()
            .await
            .map_err(|e| Stage::Listing.transport(ID, e))?;

        let status = response.status();
        let body = read_json(response, ID, Stage::Listing).await?;

        if !status.is_success() {
            let reason = first_non_empty([body.get("message").and_then(Value::as_str)])
                .unwrap_or("Failed to fetch Notion databases");
            return Err(Stage::Listing.fail(ID, reason));
        }

        let search: SearchResponse = serde_json::from_value(body)
            .map_err(|e| Stage::Listing.fail(ID, format!("unexpected search payload: {e}")))?;

        Ok(search.results.into_iter().map(NormalizedProject::from).collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
