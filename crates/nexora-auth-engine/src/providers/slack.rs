//! Slack (OAuth v2) integration.
//!
//! Slack reports most failures as `200 OK` with `{"ok": false, "error": ...}`,
//! so every response is checked for `ok` regardless of HTTP status.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat};
use serde::Deserialize;
use url::Url;

use crate::error::Result;
use crate::provider::{
    IntegrationProvider, NormalizedProject, OAuthClientConfig, ProjectKind, ProviderEndpoints,
    ProviderIdentity, RawCredential, Stage, first_non_empty, read_json,
};

pub const ID: &str = "slack";
pub const NAME: &str = "Slack";
pub const SCOPE: &str = "channels:read,groups:read,users:read";

const DEFAULT_DESCRIPTION: &str = "Slack Channel";

#[derive(Debug, Deserialize)]
struct Named {
    id: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    ok: bool,
    error: Option<String>,
    access_token: Option<String>,
    team: Option<Named>,
    authed_user: Option<Named>,
}

#[derive(Debug, Deserialize)]
struct TextValue {
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Channel {
    id: String,
    name: String,
    topic: Option<TextValue>,
    purpose: Option<TextValue>,
    /// Unix seconds.
    updated: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ConversationsResponse {
    #[serde(default)]
    ok: bool,
    error: Option<String>,
    #[serde(default)]
    channels: Vec<Channel>,
}

impl From<Channel> for NormalizedProject {
    fn from(channel: Channel) -> Self {
        let description = first_non_empty([
            channel.topic.as_ref().and_then(|t| t.value.as_deref()),
            channel.purpose.as_ref().and_then(|p| p.value.as_deref()),
        ])
        .unwrap_or(DEFAULT_DESCRIPTION)
        .to_string();

        let last_activity = channel
            .updated
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .map(|ts| ts.to_rfc3339_opts(SecondsFormat::Millis, true));

        Self {
            id: channel.id,
            name: format!("#{}", channel.name),
            description: Some(description),
            url: None,
            kind: ProjectKind::Channel,
            last_activity,
            integration_id: ID.to_string(),
        }
    }
}

/// Slack provider.
pub struct SlackProvider {
    identity: ProviderIdentity,
    endpoints: ProviderEndpoints,
    client: reqwest::Client,
}

impl SlackProvider {
    pub fn new(config: OAuthClientConfig, client: reqwest::Client) -> Self {
        Self {
            identity: ProviderIdentity::new(ID, NAME, config),
            endpoints: Self::default_endpoints(),
            client,
        }
    }

    pub fn default_endpoints() -> ProviderEndpoints {
        ProviderEndpoints {
            authorize_url: "https://slack.com/oauth/v2/authorize".into(),
            token_url: "https://slack.com/api/oauth.v2.access".into(),
            api_base_url: "https://slack.com/api".into(),
        }
    }

    pub fn with_endpoints(mut self, endpoints: ProviderEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }
}

#[async_trait]
impl IntegrationProvider for SlackProvider {
    fn identity(&self) -> &ProviderIdentity {
        &self.identity
    }

    fn authorization_url(&self, state: &str) -> Result<String> {
        let client = &self.identity.client;
        let url = Url::parse_with_params(
            &self.endpoints.authorize_url,
            &[
                ("client_id", client.client_id.as_str()),
                ("scope", SCOPE),
                ("redirect_uri", client.redirect_uri.as_str()),
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
            .form(&[
                ("client_id", client.client_id.as_str()),
                ("client_secret", client.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", client.redirect_uri.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Stage::Exchange.transport(ID, e))?;

        let status = response.status();
        let body = read_json(response, ID, Stage::Exchange).await?;
        let parsed: TokenResponse = serde_json::from_value(body).map_err(|_| {
            Stage::Exchange.fail(ID, format!("unexpected token response (HTTP {status})"))
        })?;

        if !parsed.ok {
            let reason = first_non_empty([parsed.error.as_deref()]).unwrap_or("unknown_error");
            return Err(Stage::Exchange.fail(ID, reason));
        }

        let access_token = parsed
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Stage::Exchange.fail(ID, "response did not include an access token"))?;

        let (team_id, team_name) = parsed
            .team
            .map(|t| (t.id, t.name))
            .unwrap_or_default();

        Ok(RawCredential::new(access_token)
            .with("teamId", team_id)
            .with("teamName", team_name)
            .with("authedUser", parsed.authed_user.and_then(|u| u.id)))
    }

    async fn list_projects(&self, access_token: &str) -> Result<Vec<NormalizedProject>> {
        let url = format!(
            "{}/conversations.list?types=public_channel,private_channel",
            self.endpoints.api_base_url
        );
        tracing::debug!(provider = ID, "listing conversations");

        let response = self
            .client
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| Stage::Listing.transport(ID, e))?;

        let status = response.status();
        let body = read_json(response, ID, Stage::Listing).await?;
        let parsed: Option<ConversationsResponse> = serde_json::from_value(body).ok();

        match parsed {
            Some(list) if list.ok && status.is_success() => {
                Ok(list.channels.into_iter().map(NormalizedProject::from).collect())
            }
            Some(list) => {
                let reason = first_non_empty([list.error.as_deref()])
                    .map(str::to_string)
                    .unwrap_or_else(|| {
                        if status.is_success() {
                            "Failed to fetch Slack channels".to_string()
                        } else {
                            format!("Failed to fetch Slack channels (HTTP {status})")
                        }
                    });
                Err(Stage::Listing.fail(ID, reason))
            }
            None => Err(Stage::Listing.fail(
                ID,
                format!("Failed to fetch Slack channels (HTTP {status})"),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
