//! CLI argument definitions for Nexora.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! dispatching subcommands.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Nexora -- third-party integrations service.
#[derive(Parser)]
#[command(
    name = "nexora",
    version,
    about = "Nexora -- OAuth integrations service",
    long_about = "Connects user accounts to GitHub, Notion and Slack over OAuth, stores \
                  the resulting tokens encrypted, and lists the projects behind them."
)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, short, global = true, default_value = "config/nexora.toml")]
    pub config: PathBuf,

    /// Default log level when `RUST_LOG` is not set.
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the integrations HTTP server.
    Serve {
        /// Address to bind the HTTP server to (overrides configuration).
        #[arg(long)]
        bind: Option<String>,

        /// Port to listen on (overrides configuration).
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Validate configuration and show which providers are enabled.
    Check,

    /// Print a fresh 256-bit encryption key as hex.
    GenKey,
}
