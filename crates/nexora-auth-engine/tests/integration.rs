//! Integration tests for the auth engine against mocked vendor APIs.
//!
//! Every provider is pointed at a local `wiremock` server, so these tests
//! exercise the real request shapes, response parsing and error mapping
//! without network access.

use std::sync::Arc;
use std::time::Duration;

use nexora_auth_engine::provider::{USER_AGENT, http_client};
use nexora_auth_engine::{
    AuthEngineError, CallbackParams, GitHubProvider, IntegrationManager, IntegrationProvider,
    NotionProvider, OAuthClientConfig, OAuthState, ProjectKind, ProviderRegistry, SlackProvider,
    StateCodec, callback_redirect,
};
use nexora_vault::{CredentialStore, MemoryCredentialStore, TokenCipher};
use serde_json::json;
use wiremock::matchers::{
    basic_auth, bearer_token, body_partial_json, body_string_contains, header, method, path,
    query_param,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

const KEY: [u8; 32] = [42u8; 32];
const FRONTEND: &str = "http://localhost:3000";

fn client_config(id: &str) -> OAuthClientConfig {
    OAuthClientConfig {
        client_id: format!("{id}-client-id"),
        client_secret: format!("{id}-client-secret"),
        redirect_uri: format!("http://localhost:3001/api/integrations/{id}/callback"),
    }
}

struct Fixture {
    server: MockServer,
    manager: IntegrationManager,
    store: Arc<MemoryCredentialStore>,
}

async fn fixture_with_timeout(timeout: Duration) -> Fixture {
    let server = MockServer::start().await;
    let client = http_client(timeout).unwrap();
    let base = server.uri();

    let github = GitHubProvider::new(client_config("github"), client.clone())
        .with_endpoints(GitHubProvider::default_endpoints().rebased(&base).unwrap());
    let notion = NotionProvider::new(client_config("notion"), client.clone())
        .with_endpoints(NotionProvider::default_endpoints().rebased(&base).unwrap());
    let slack = SlackProvider::new(client_config("slack"), client)
        .with_endpoints(SlackProvider::default_endpoints().rebased(&base).unwrap());

    let registry = ProviderRegistry::new()
        .with(Arc::new(github))
        .with(Arc::new(notion))
        .with(Arc::new(slack));

    let store = Arc::new(MemoryCredentialStore::new());
    let manager = IntegrationManager::new(
        registry,
        store.clone(),
        TokenCipher::new(&KEY).unwrap(),
        StateCodec::unsigned(),
    );

    Fixture {
        server,
        manager,
        store,
    }
}

async fn fixture() -> Fixture {
    fixture_with_timeout(Duration::from_secs(5)).await
}

fn query_value(url: &str, key: &str) -> Option<String> {
    url::Url::parse(url)
        .unwrap()
        .query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

fn issued_state(f: &Fixture, user: &str, provider: &str) -> String {
    let url = f.manager.start_flow(user, provider).unwrap();
    query_value(&url, "state").unwrap()
}

fn callback(code: &str, state: &str) -> CallbackParams {
    CallbackParams {
        code: Some(code.to_string()),
        state: Some(state.to_string()),
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Start flow
// ---------------------------------------------------------------------------

#[tokio::test]
async fn start_flow_url_carries_client_id_and_state() {
    let f = fixture().await;
    let url = f.manager.start_flow("u1", "github").unwrap();

    assert_eq!(query_value(&url, "client_id").as_deref(), Some("github-client-id"));
    let state = query_value(&url, "state").unwrap();
    assert_eq!(
        StateCodec::unsigned().decode(&state).unwrap(),
        OAuthState::new("u1", "github")
    );
}

#[tokio::test]
async fn start_flow_unknown_provider_is_not_found() {
    let f = fixture().await;
    let err = f.manager.start_flow("u1", "jira").unwrap_err();
    assert!(matches!(err, AuthEngineError::ProviderNotFound { .. }));
}

// ---------------------------------------------------------------------------
// Callback
// ---------------------------------------------------------------------------

#[tokio::test]
async fn github_callback_stores_encrypted_token() {
    let f = fixture().await;
    Mock::given(method("POST"))
        .and(path("/login/oauth/access_token"))
        .and(header("accept", "application/json"))
        .and(body_partial_json(json!({
            "client_id": "github-client-id",
            "client_secret": "github-client-secret",
            "code": "good-code",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "abc",
            "token_type": "bearer",
            "scope": "repo"
        })))
        .expect(1)
        .mount(&f.server)
        .await;

    let state = issued_state(&f, "u1", "github");
    let outcome = f
        .manager
        .handle_callback("github", &callback("good-code", &state))
        .await;
    let redirect = callback_redirect(FRONTEND, "github", &outcome);
    assert!(redirect.contains("status=success&provider=github"), "{redirect}");

    let stored = f.store.get("u1", "github").await.unwrap().unwrap();
    let cipher = TokenCipher::new(&KEY).unwrap();
    assert_eq!(cipher.decrypt(&stored.token).unwrap(), "abc");
    assert_eq!(stored.metadata["tokenType"], "bearer");
    assert_eq!(stored.metadata["scope"], "repo");
    assert!(!stored.metadata.contains_key("access_token"));
    assert!(!stored.metadata.contains_key("accessToken"));
}

#[tokio::test]
async fn github_rejected_code_redirects_with_vendor_message() {
    let f = fixture().await;
    Mock::given(method("POST"))
        .and(path("/login/oauth/access_token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "error": "bad_verification_code" })),
        )
        .mount(&f.server)
        .await;

    let state = issued_state(&f, "u1", "github");
    let outcome = f
        .manager
        .handle_callback("github", &callback("stale-code", &state))
        .await;

    assert!(matches!(outcome, Err(AuthEngineError::OAuthExchangeFailed { .. })));
    let redirect = callback_redirect(FRONTEND, "github", &outcome);
    assert!(
        redirect.contains("status=error&message=bad_verification_code"),
        "{redirect}"
    );
    assert!(f.store.is_empty().await);
}

#[tokio::test]
async fn github_response_without_token_is_rejected() {
    let f = fixture().await;
    Mock::given(method("POST"))
        .and(path("/login/oauth/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "scope": "repo" })))
        .mount(&f.server)
        .await;

    let state = issued_state(&f, "u1", "github");
    let err = f
        .manager
        .handle_callback("github", &callback("code", &state))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthEngineError::OAuthExchangeFailed { .. }));
    assert!(f.store.is_empty().await);
}

#[tokio::test]
async fn forged_state_never_reaches_vendor() {
    let f = fixture().await;
    Mock::given(method("POST"))
        .and(path("/login/oauth/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": "x" })))
        .expect(0)
        .mount(&f.server)
        .await;

    let issued_for_slack = issued_state(&f, "u1", "slack");
    for state in ["", "%%%", "bm90IGpzb24", issued_for_slack.as_str()] {
        let outcome = f
            .manager
            .handle_callback("github", &callback("code", state))
            .await;
        assert!(
            matches!(outcome, Err(AuthEngineError::InvalidState { .. })),
            "{state:?}: {outcome:?}"
        );
        let redirect = callback_redirect(FRONTEND, "github", &outcome);
        assert!(
            redirect.starts_with("http://localhost:3000/?view=integrations&status=error&message="),
            "{redirect}"
        );
    }
    assert!(f.store.is_empty().await);
}

#[tokio::test]
async fn notion_exchange_uses_basic_auth() {
    let f = fixture().await;
    Mock::given(method("POST"))
        .and(path("/v1/oauth/token"))
        .and(basic_auth("notion-client-id", "notion-client-secret"))
        .and(body_partial_json(json!({
            "grant_type": "authorization_code",
            "code": "n-code",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "secret_notion",
            "workspace_id": "ws-1",
            "workspace_name": "Acme",
            "workspace_icon": null,
            "bot_id": "bot-1"
        })))
        .expect(1)
        .mount(&f.server)
        .await;

    let state = issued_state(&f, "u2", "notion");
    f.manager
        .handle_callback("notion", &callback("n-code", &state))
        .await
        .unwrap();

    let stored = f.store.get("u2", "notion").await.unwrap().unwrap();
    assert_eq!(stored.metadata["workspaceId"], "ws-1");
    assert_eq!(stored.metadata["workspaceName"], "Acme");
    assert_eq!(stored.metadata["botId"], "bot-1");
}

#[tokio::test]
async fn notion_error_description_is_preserved() {
    let f = fixture().await;
    Mock::given(method("POST"))
        .and(path("/v1/oauth/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Invalid code."
        })))
        .mount(&f.server)
        .await;

    let state = issued_state(&f, "u2", "notion");
    let err = f
        .manager
        .handle_callback("notion", &callback("n-code", &state))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Invalid code.");
}

#[tokio::test]
async fn slack_exchange_is_form_encoded() {
    let f = fixture().await;
    Mock::given(method("POST"))
        .and(path("/api/oauth.v2.access"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("code=s-code"))
        .and(body_string_contains("client_id=slack-client-id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "access_token": "xoxb-1",
            "team": { "id": "T1", "name": "Acme" },
            "authed_user": { "id": "U1" }
        })))
        .expect(1)
        .mount(&f.server)
        .await;

    let state = issued_state(&f, "u3", "slack");
    f.manager
        .handle_callback("slack", &callback("s-code", &state))
        .await
        .unwrap();

    let stored = f.store.get("u3", "slack").await.unwrap().unwrap();
    assert_eq!(stored.metadata["teamId"], "T1");
    assert_eq!(stored.metadata["teamName"], "Acme");
    assert_eq!(stored.metadata["authedUser"], "U1");
}

#[tokio::test]
async fn slack_ok_false_fails_exchange() {
    let f = fixture().await;
    Mock::given(method("POST"))
        .and(path("/api/oauth.v2.access"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "ok": false, "error": "invalid_code" })),
        )
        .mount(&f.server)
        .await;

    let state = issued_state(&f, "u3", "slack");
    let err = f
        .manager
        .handle_callback("slack", &callback("s-code", &state))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "invalid_code");
    assert!(f.store.is_empty().await);
}

// ---------------------------------------------------------------------------
// Project listing
// ---------------------------------------------------------------------------

async fn connect(f: &Fixture, user: &str, provider: &str, token: &str) {
    let cipher = TokenCipher::new(&KEY).unwrap();
    let credential =
        nexora_vault::Credential::connected(cipher.encrypt(token).unwrap(), Default::default());
    f.store.upsert(user, provider, &credential).await.unwrap();
}

#[tokio::test]
async fn slack_channels_are_normalized() {
    let f = fixture().await;
    connect(&f, "u1", "slack", "xoxb-token").await;

    Mock::given(method("GET"))
        .and(path("/api/conversations.list"))
        .and(query_param("types", "public_channel,private_channel"))
        .and(bearer_token("xoxb-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "channels": [
                {
                "id": "C1",
                "name": "general",
                "topic": { "value": "chat" },
                "updated": 1_700_000_000
            }
            ]
        })))
        .mount(&f.server)
        .await;

    let projects = f.manager.list_projects("u1", "slack").await.unwrap();
    assert_eq!(projects.len(), 1);
    let p = &projects[0];
    assert_eq!(p.id, "C1");
    assert_eq!(p.name, "#general");
    assert_eq!(p.description.as_deref(), Some("chat"));
    assert_eq!(p.kind, ProjectKind::Channel);
    assert_eq!(p.last_activity.as_deref(), Some("2023-11-14T22:13:20.000Z"));

    let json = serde_json::to_value(p).unwrap();
    assert_eq!(json["type"], "channel");
    assert_eq!(json["lastActivity"], "2023-11-14T22:13:20.000Z");
}

#[tokio::test]
async fn slack_listing_ok_false_is_project_fetch_failure() {
    let f = fixture().await;
    connect(&f, "u1", "slack", "xoxb-token").await;
    Mock::given(method("GET"))
        .and(path("/api/conversations.list"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "ok": false, "error": "invalid_auth" })),
        )
        .mount(&f.server)
        .await;

    let err = f.manager.list_projects("u1", "slack").await.unwrap_err();
    assert!(matches!(err, AuthEngineError::ProjectFetchFailed { .. }));
    assert_eq!(err.to_string(), "invalid_auth");
}

#[tokio::test]
async fn github_repos_are_listed_with_vendor_headers() {
    let f = fixture().await;
    connect(&f, "u1", "github", "gho_abc").await;
    Mock::given(method("GET"))
        .and(path("/user/repos"))
        .and(query_param("sort", "updated"))
        .and(query_param("per_page", "100"))
        .and(bearer_token("gho_abc"))
        .and(header("accept", "application/vnd.github.v3+json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": 1,
                "name": "nexora",
                "description": "Workspace",
                "html_url": "https://github.com/acme/nexora",
                "updated_at": "2024-03-01T12:00:00Z"
            }
        ])))
        .mount(&f.server)
        .await;

    let projects = f.manager.list_projects("u1", "github").await.unwrap();
    assert_eq!(projects[0].id, "1");
    assert_eq!(projects[0].url.as_deref(), Some("https://github.com/acme/nexora"));
    assert_eq!(projects[0].kind, ProjectKind::Repo);
}

#[tokio::test]
async fn github_listing_sends_user_agent_with_any_client() {
    let server = MockServer::start().await;
    let github = GitHubProvider::new(client_config("github"), reqwest::Client::new())
        .with_endpoints(
            GitHubProvider::default_endpoints()
                .rebased(&server.uri())
                .unwrap(),
        );
    Mock::given(method("GET"))
        .and(path("/user/repos"))
        .and(header("user-agent", USER_AGENT))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let projects = github.list_projects("gho_abc").await.unwrap();
    assert!(projects.is_empty());
}

#[tokio::test]
async fn github_listing_error_carries_vendor_message() {
    let f = fixture().await;
    connect(&f, "u1", "github", "revoked").await;
    Mock::given(method("GET"))
        .and(path("/user/repos"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "message": "Bad credentials" })),
        )
        .mount(&f.server)
        .await;

    let err = f.manager.list_projects("u1", "github").await.unwrap_err();
    assert!(matches!(err, AuthEngineError::ProjectFetchFailed { .. }));
    assert_eq!(err.to_string(), "Bad credentials");
}

#[tokio::test]
async fn notion_search_filters_databases() {
    let f = fixture().await;
    connect(&f, "u1", "notion", "secret_n").await;
    Mock::given(method("POST"))
        .and(path("/v1/search"))
        .and(bearer_token("secret_n"))
        .and(header("notion-version", "2022-06-28"))
        .and(body_partial_json(json!({
            "filter": { "property": "object", "value": "database" },
            "page_size": 100
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {
                "id": "d1",
                "title": [{ "plain_text": "Roadmap" }],
                "url": "https://notion.so/d1"
            },
                { "id": "d2", "title": [] }
            ]
        })))
        .mount(&f.server)
        .await;

    let projects = f.manager.list_projects("u1", "notion").await.unwrap();
    let names: Vec<_> = projects.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Roadmap", "Untitled Database"]);
    assert!(projects.iter().all(|p| p.kind == ProjectKind::Database));
}

#[tokio::test]
async fn notion_listing_failure_without_message_is_generic() {
    let f = fixture().await;
    connect(&f, "u1", "notion", "secret_n").await;
    Mock::given(method("POST"))
        .and(path("/v1/search"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .mount(&f.server)
        .await;

    let err = f.manager.list_projects("u1", "notion").await.unwrap_err();
    assert_eq!(err.to_string(), "Failed to fetch Notion databases");
}

#[tokio::test]
async fn not_connected_listing_makes_no_vendor_call() {
    let f = fixture().await;
    Mock::given(method("GET"))
        .and(path("/user/repos"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&f.server)
        .await;

    let err = f.manager.list_projects("u1", "github").await.unwrap_err();
    assert!(matches!(err, AuthEngineError::NotConnected { .. }));
}

#[tokio::test]
async fn slow_vendor_is_unreachable() {
    let f = fixture_with_timeout(Duration::from_millis(200)).await;
    connect(&f, "u1", "github", "gho_abc").await;
    Mock::given(method("GET"))
        .and(path("/user/repos"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([]))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&f.server)
        .await;

    let err = f.manager.list_projects("u1", "github").await.unwrap_err();
    assert!(
        matches!(err, AuthEngineError::ProviderUnreachable { .. }),
        "{err:?}"
    );
}

// ---------------------------------------------------------------------------
// Disconnect and overview
// ---------------------------------------------------------------------------

#[tokio::test]
async fn disconnect_is_local_only_and_idempotent() {
    let f = fixture().await;
    connect(&f, "u1", "github", "gho_abc").await;
    connect(&f, "u1", "slack", "xoxb").await;

    let overview = f.manager.connections("u1").await.unwrap();
    let connected: Vec<_> = overview
        .iter()
        .filter(|c| c.status == nexora_vault::ConnectionStatus::Connected)
        .map(|c| c.id.as_str())
        .collect();
    assert_eq!(connected, vec!["github", "slack"]);

    f.manager.disconnect("u1", "github").await.unwrap();
    f.manager.disconnect("u1", "github").await.unwrap();

    assert!(f.store.get("u1", "github").await.unwrap().is_none());
    assert!(f.store.get("u1", "slack").await.unwrap().is_some());
    // No vendor endpoint was mounted; a revocation call would have 404'd
    // and been logged, but the bundled providers make none.
    assert!(f.server.received_requests().await.unwrap_or_default().is_empty());
}
