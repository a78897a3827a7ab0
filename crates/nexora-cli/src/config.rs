//! Service configuration.
//!
//! Loaded once at startup in three layers, later layers winning:
//!
//! 1. `.env` (via `dotenvy`, loaded by `main`)
//! 2. the TOML file given by `--config`, if it exists
//! 3. environment variables
//!
//! ```toml
//! frontend_url = "https://app.example.com"
//! encryption_key = "<64 hex chars>"
//! state_secret = "<random string>"
//! database = "data/nexora.db"
//!
//! [server]
//! bind = "0.0.0.0"
//! port = 3001
//!
//! [providers.github]
//! client_id = "..."
//! client_secret = "..."
//! redirect_uri = "https://api.example.com/api/integrations/github/callback"
//!
//! [api_tokens]
//! "dev-token" = "user-1"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use nexora_auth_engine::provider::DEFAULT_REQUEST_TIMEOUT_SECS;
use nexora_auth_engine::{OAuthClientConfig, ProvidersConfig, StateCodec};
use nexora_vault::TokenCipher;
use nexora_web::WebConfig;
use serde::Deserialize;

/// `[server]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let web = WebConfig::default();
        Self {
            bind: web.bind_addr,
            port: web.port,
        }
    }
}

/// The full service configuration.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,

    /// Where the browser lands after an OAuth callback.
    pub frontend_url: String,

    /// 64 hex chars, or exactly 32 raw bytes for keys carried over from an
    /// existing deployment.
    pub encryption_key: Option<String>,

    /// Enables HMAC-signed callback state when set.
    pub state_secret: Option<String>,

    /// SQLite database path.  Credentials are kept in memory when absent.
    pub database: Option<PathBuf>,

    /// Bound on each vendor HTTP call.
    pub request_timeout_secs: u64,

    pub providers: ProvidersConfig,

    /// Bearer token → user id.
    pub api_tokens: BTreeMap<String, String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            frontend_url: WebConfig::default().frontend_url,
            encryption_key: None,
            state_secret: None,
            database: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            providers: ProvidersConfig::default(),
            api_tokens: BTreeMap::new(),
        }
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("AppConfig")
            .field("server", &self.server)
            .field("frontend_url", &self.frontend_url)
            .field("encryption_key", &redact(&self.encryption_key))
            .field("state_secret", &redact(&self.state_secret))
            .field("database", &self.database)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("providers", &self.providers)
            .field("api_tokens", &self.api_tokens.len())
            .finish()
    }
}

impl AppConfig {
    /// Read `path` if it exists, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env(crate::helpers::env_non_empty)?;
        Ok(config)
    }

    /// Parse the TOML file at `path`, or return defaults if it is absent.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;

        tracing::info!(path = %path.display(), "configuration loaded from file");
        Ok(config)
    }

    /// Overlay values from `lookup` (normally the process environment).
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = lookup("NEXORA_BIND") {
            self.server.bind = v;
        }
        if let Some(v) = lookup("NEXORA_PORT") {
            self.server.port = v
                .parse()
                .with_context(|| format!("NEXORA_PORT is not a port number: {v}"))?;
        }
        if let Some(v) = lookup("FRONTEND_URL") {
            self.frontend_url = v;
        }
        if let Some(v) = lookup("ENCRYPTION_KEY") {
            self.encryption_key = Some(v);
        }
        if let Some(v) = lookup("STATE_SECRET") {
            self.state_secret = Some(v);
        }
        if let Some(v) = lookup("NEXORA_DATABASE") {
            self.database = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("NEXORA_API_TOKENS") {
            self.api_tokens.extend(parse_api_tokens(&v)?);
        }

        overlay_provider(&mut self.providers.github, "GITHUB", &lookup);
        overlay_provider(&mut self.providers.notion, "NOTION", &lookup);
        overlay_provider(&mut self.providers.slack, "SLACK", &lookup);
        Ok(())
    }

    /// Build the token cipher.
    ///
    /// # Errors
    ///
    /// Fails if no key is configured or the key has the wrong shape.
    pub fn cipher(&self) -> Result<TokenCipher> {
        let Some(key) = self.encryption_key.as_deref() else {
            bail!("ENCRYPTION_KEY is not set; generate one with `nexora gen-key`");
        };
        TokenCipher::from_config_str(key).context("invalid ENCRYPTION_KEY")
    }

    pub fn state_codec(&self) -> StateCodec {
        match self.state_secret.as_deref().filter(|s| !s.is_empty()) {
            Some(secret) => StateCodec::signed(secret.as_bytes()),
            None => StateCodec::unsigned(),
        }
    }

    pub fn web_config(&self) -> WebConfig {
        WebConfig {
            bind_addr: self.server.bind.clone(),
            port: self.server.port,
            frontend_url: self.frontend_url.clone(),
        }
    }
}

/// Parse `token:user[,token:user...]`.
fn parse_api_tokens(raw: &str) -> Result<Vec<(String, String)>> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once(':') {
            Some((token, user)) if !token.is_empty() && !user.is_empty() => {
                Ok((token.to_string(), user.to_string()))
            }
            _ => bail!("NEXORA_API_TOKENS entries must look like token:user"),
        })
        .collect()
}

fn overlay_provider(
    slot: &mut Option<OAuthClientConfig>,
    prefix: &str,
    lookup: &impl Fn(&str) -> Option<String>,
) {
    let client_id = lookup(&format!("{prefix}_CLIENT_ID"));
    let client_secret = lookup(&format!("{prefix}_CLIENT_SECRET"));
    let redirect_uri = lookup(&format!("{prefix}_REDIRECT_URI"));
    if client_id.is_none() && client_secret.is_none() && redirect_uri.is_none() {
        return;
    }

    let entry = slot.get_or_insert_with(OAuthClientConfig::default);
    if let Some(v) = client_id {
        entry.client_id = v;
    }
    if let Some(v) = client_secret {
        entry.client_secret = v;
    }
    if let Some(v) = redirect_uri {
        entry.redirect_uri = v;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.bind, "127.0.0.1");
        assert_eq!(config.server.port, 3001);
        assert_eq!(config.frontend_url, "http://localhost:3000");
        assert_eq!(config.request_timeout_secs, 15);
        assert!(config.providers.github.is_none());
        assert!(!config.state_codec().is_signed());
    }

    #[test]
    fn parses_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nexora.toml");
        std::fs::write(
            &path,
            r#"
frontend_url = "https://app.example.com"
encryption_key = "a_very_secret_key_32_characters!"
database = "data/nexora.db"

[server]
port = 8080

[providers.github]
client_id = "gh"
client_secret = "gh-secret"
redirect_uri = "https://api.example.com/api/integrations/github/callback"

[api_tokens]
"dev-token" = "user-1"
"#,
        )
        .unwrap();

        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.frontend_url, "https://app.example.com");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.bind, "127.0.0.1");
        assert_eq!(config.database.as_deref(), Some(Path::new("data/nexora.db")));
        assert_eq!(config.providers.github.as_ref().unwrap().client_id, "gh");
        assert!(config.providers.slack.is_none());
        assert_eq!(config.api_tokens["dev-token"], "user-1");
        assert!(config.cipher().is_ok());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::from_file(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.server.port, 3001);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "server = 12").unwrap();
        assert!(AppConfig::from_file(&path).is_err());
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = AppConfig {
            frontend_url: "https://from-file".into(),
            ..Default::default()
        };
        config
            .apply_env(env(&[
                ("FRONTEND_URL", "https://from-env"),
                ("NEXORA_PORT", "9000"),
                ("STATE_SECRET", "s3cret"),
                ("SLACK_CLIENT_ID", "sl"),
                ("SLACK_CLIENT_SECRET", "sl-secret"),
                ("NEXORA_API_TOKENS", "t1:alice, t2:bob"),
            ]))
            .unwrap();

        assert_eq!(config.frontend_url, "https://from-env");
        assert_eq!(config.server.port, 9000);
        assert!(config.state_codec().is_signed());
        let slack = config.providers.slack.as_ref().unwrap();
        assert_eq!(slack.client_id, "sl");
        assert!(slack.is_complete());
        assert!(config.providers.github.is_none());
        assert_eq!(config.api_tokens.len(), 2);
        assert_eq!(config.api_tokens["t2"], "bob");
    }

    #[test]
    fn env_patches_single_provider_field() {
        let mut config = AppConfig::default();
        config.providers.github = Some(OAuthClientConfig {
            client_id: "file-id".into(),
            client_secret: "file-secret".into(),
            redirect_uri: "https://file/cb".into(),
        });
        config
            .apply_env(env(&[("GITHUB_REDIRECT_URI", "https://env/cb")]))
            .unwrap();

        let github = config.providers.github.unwrap();
        assert_eq!(github.client_id, "file-id");
        assert_eq!(github.redirect_uri, "https://env/cb");
    }

    #[test]
    fn bad_env_values_are_rejected() {
        let mut config = AppConfig::default();
        assert!(config.apply_env(env(&[("NEXORA_PORT", "http")])).is_err());
        assert!(
            config
                .apply_env(env(&[("NEXORA_API_TOKENS", "no-separator")]))
                .is_err()
        );
    }

    #[test]
    fn missing_or_bad_key_is_a_startup_error() {
        let config = AppConfig::default();
        let err = config.cipher().unwrap_err();
        assert!(err.to_string().contains("ENCRYPTION_KEY"));

        let config = AppConfig {
            encryption_key: Some("too-short".into()),
            ..Default::default()
        };
        assert!(config.cipher().is_err());
    }

    #[test]
    fn debug_redacts_secrets() {
        let config = AppConfig {
            encryption_key: Some("a_very_secret_key_32_characters!".into()),
            state_secret: Some("hmac-secret".into()),
            ..Default::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("a_very_secret_key"));
        assert!(!debug.contains("hmac-secret"));
    }

    #[test]
    fn web_config_mirrors_server_section() {
        let mut config = AppConfig::default();
        config.server.bind = "0.0.0.0".into();
        let web = config.web_config();
        assert_eq!(web.bind_addr, "0.0.0.0");
        assert_eq!(web.frontend_url, "http://localhost:3000");
    }
}
