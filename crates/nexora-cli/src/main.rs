//! CLI entry point for Nexora.
//!
//! This binary provides the `nexora` command with subcommands for serving
//! the integrations API, checking configuration, and generating keys.

mod cli;
mod config;
mod helpers;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use nexora_auth_engine::provider::http_client;
use nexora_auth_engine::{IntegrationManager, ProviderRegistry, StaticTokenVerifier};
use nexora_vault::{CredentialStore, MemoryCredentialStore, SqliteCredentialStore};
use nexora_web::WebServer;

use crate::cli::{Cli, Commands};
use crate::config::AppConfig;
use crate::helpers::init_tracing;

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { bind, port } => {
            init_tracing(&cli.log_level);
            cmd_serve(&cli.config, bind, port).await
        }
        Commands::Check => cmd_check(&cli.config),
        Commands::GenKey => cmd_gen_key(),
    }
}

// ---------------------------------------------------------------------------
// Subcommand: serve
// ---------------------------------------------------------------------------

async fn cmd_serve(
    config_path: &std::path::Path,
    bind: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    info!("starting Nexora integrations service");

    let mut config = AppConfig::load(config_path)?;
    if let Some(bind) = bind {
        config.server.bind = bind;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let cipher = config.cipher()?;
    let store = open_store(&config)?;

    let client = http_client(Duration::from_secs(config.request_timeout_secs))
        .context("failed to build HTTP client")?;
    let registry = ProviderRegistry::from_config(&config.providers, client);
    if registry.is_empty() {
        tracing::warn!("no providers configured; starting a connection will return 404");
    }

    if config.api_tokens.is_empty() {
        tracing::warn!("no API tokens configured; every authenticated route will return 401");
    }
    let identity = StaticTokenVerifier::new(&config.api_tokens);

    let states = config.state_codec();
    if !states.is_signed() {
        tracing::warn!("STATE_SECRET not set; callback state is unsigned");
    }

    let manager = IntegrationManager::new(registry, store, cipher, states);
    let server = WebServer::new(config.web_config(), Arc::new(manager), Arc::new(identity));

    server.start().await.map_err(|e| anyhow::anyhow!(e))?;
    Ok(())
}

fn open_store(config: &AppConfig) -> Result<Arc<dyn CredentialStore>> {
    match &config.database {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            let store = SqliteCredentialStore::open(path)
                .with_context(|| format!("failed to open database {}", path.display()))?;
            info!(path = %path.display(), "credential store initialized");
            Ok(Arc::new(store))
        }
        None => {
            tracing::warn!("no database configured; credentials are kept in memory only");
            Ok(Arc::new(MemoryCredentialStore::new()))
        }
    }
}

// ---------------------------------------------------------------------------
// Subcommand: check
// ---------------------------------------------------------------------------

fn cmd_check(config_path: &std::path::Path) -> Result<()> {
    let config = AppConfig::load(config_path)?;

    println!();
    println!("  Nexora v{}", env!("CARGO_PKG_VERSION"));
    println!();

    let key = match config.cipher() {
        Ok(_) => "ok".to_string(),
        Err(e) => format!("ERROR: {e:#}"),
    };
    println!("  Encryption key:   {key}");
    println!(
        "  State signing:    {}",
        if config.state_codec().is_signed() { "enabled" } else { "disabled" }
    );
    println!(
        "  Credential store: {}",
        config
            .database
            .as_ref()
            .map(|p| format!("sqlite ({})", p.display()))
            .unwrap_or_else(|| "memory".to_string())
    );
    println!("  Listen address:   {}:{}", config.server.bind, config.server.port);
    println!("  Frontend URL:     {}", config.frontend_url);
    println!("  API tokens:       {}", config.api_tokens.len());
    println!();
    println!("  Providers:");

    let providers = [
        ("github", &config.providers.github),
        ("notion", &config.providers.notion),
        ("slack", &config.providers.slack),
    ];
    for (id, entry) in providers {
        let status = match entry {
            Some(c) if c.is_complete() => format!("enabled   -> {}", c.redirect_uri),
            Some(_) => "incomplete (client id and secret required)".to_string(),
            None => "not configured".to_string(),
        };
        println!("    {id:<8} {status}");
    }
    println!();

    config.cipher().map(|_| ())
}

// ---------------------------------------------------------------------------
// Subcommand: gen-key
// ---------------------------------------------------------------------------

fn cmd_gen_key() -> Result<()> {
    let key = nexora_vault::cipher::generate_key_hex().context("failed to generate key")?;
    println!("{key}");
    Ok(())
}
