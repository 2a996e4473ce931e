//! CLI commands for the orchestration engine.
//!
//! Available commands:
//! - `init` - Generate a new configuration file (TOML or YAML)
//! - `validate` - Validate configuration file syntax and semantics
//! - `run` - Start the orchestration server
//! - `version` - Show version and build information
//!
//! # Example
//!
//! ```bash
//! oauth2-orchestrator init
//! oauth2-orchestrator validate
//! oauth2-orchestrator run
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

// ============================================================================
// CLI Definition
// ============================================================================

/// OAuth2/OIDC orchestration engine fronting a Hydra-compatible authorization server
#[derive(Debug, Parser)]
#[command(name = "oauth2-orchestrator")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, default_value = "oauth2-orchestrator.toml")]
    pub config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Initialize a new configuration file
    Init {
        /// Output format (toml or yaml)
        #[arg(long, default_value = "toml")]
        format: String,

        /// Force overwrite existing file
        #[arg(short = 'f', long)]
        force: bool,
    },

    /// Validate configuration file
    Validate,

    /// Run the orchestration server
    Run {
        /// Override listen host
        #[arg(long)]
        host: Option<String>,

        /// Override listen port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Show version and build information
    Version,
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

// ============================================================================
// Config Generation
// ============================================================================

/// Generate default configuration
///
/// Returns a configuration template in either TOML or YAML format.
pub fn generate_config(format: &str) -> String {
    let config = r#"# OAuth2 Orchestration Engine Configuration

[server]
host = "127.0.0.1"
port = 3000

[oauth]
admin_base_url = "http://hydra:4445"
public_base_url = "http://hydra:4444"
refresh_token_expiry_hours = 1

[oauth.clients.web]
secret = "changeme"
redirect_uri = "https://app.example.com/callback"

[oauth.credentials_reset_settings]
request_count = 5
request_ttl_minutes = 10

[rate_limit]
enabled = true
requests_per_second = 100
burst_size = 50

[audit]
enabled = true
stdout = true

[tracing]
enabled = false
service_name = "oauth2-orchestrator"
"#;

    if format == "yaml" {
        r#"# OAuth2 Orchestration Engine Configuration

server:
  host: "127.0.0.1"
  port: 3000

oauth:
  admin_base_url: "http://hydra:4445"
  public_base_url: "http://hydra:4444"
  refresh_token_expiry_hours: 1
  clients:
    web:
      secret: "changeme"
      redirect_uri: "https://app.example.com/callback"
  credentials_reset_settings:
    request_count: 5
    request_ttl_minutes: 10

rate_limit:
  enabled: true
  requests_per_second: 100
  burst_size: 50

audit:
  enabled: true
  stdout: true

tracing:
  enabled: false
  service_name: "oauth2-orchestrator"
"#
        .to_string()
    } else {
        config.to_string()
    }
}
