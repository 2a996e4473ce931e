//! Configuration types and parsing for the orchestration engine.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Configuration error type
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Main configuration struct
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Upstream Hydra-compatible authorization server + per-client
    /// credentials and rotation policy
    pub oauth: OAuthConfig,

    /// Ambient per-client HTTP rate limiting
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Audit logging configuration
    #[serde(default)]
    pub audit: AuditConfig,

    /// OpenTelemetry tracing configuration
    #[serde(default)]
    pub tracing: TracingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Enable TLS
    #[serde(default)]
    pub tls: Option<TlsConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            tls: None,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

/// TLS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    /// Path to server certificate (PEM format)
    pub cert_path: PathBuf,
    /// Path to server private key (PEM format)
    pub key_path: PathBuf,
}

/// Per-client secret and registered redirect URI. `secret` is expected to
/// be resolved ahead of time from an external secret store; this type only
/// carries its final value, not how it got there.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthClientConfig {
    pub secret: String,
    pub redirect_uri: String,
}

/// `{request_count, request_ttl_minutes}` governing verification-token
/// issuance per email address.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CredentialsResetSettings {
    #[serde(default = "default_request_count")]
    pub request_count: u32,
    #[serde(default = "default_request_ttl_minutes")]
    pub request_ttl_minutes: i64,
}

impl Default for CredentialsResetSettings {
    fn default() -> Self {
        Self {
            request_count: default_request_count(),
            request_ttl_minutes: default_request_ttl_minutes(),
        }
    }
}

fn default_request_count() -> u32 {
    5
}

fn default_request_ttl_minutes() -> i64 {
    10
}

/// OAuth2/OIDC orchestration configuration: where the upstream server
/// lives, which clients we act on behalf of, and how long sessions live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthConfig {
    /// Base URL for the Hydra-compatible admin API
    pub admin_base_url: String,

    /// Base URL for the Hydra-compatible public API
    pub public_base_url: String,

    /// Registered OAuth2 clients, keyed by client_id
    pub clients: HashMap<String, OAuthClientConfig>,

    /// Rate limiting for client-credentials verification tokens
    #[serde(default)]
    pub credentials_reset_settings: CredentialsResetSettings,

    /// How long a minted session (and its refresh token) stays valid
    #[serde(default = "default_refresh_token_expiry_hours")]
    pub refresh_token_expiry_hours: i64,
}

fn default_refresh_token_expiry_hours() -> i64 {
    1
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Enable rate limiting
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Requests per second
    #[serde(default = "default_rps")]
    pub requests_per_second: u32,

    /// Burst size
    #[serde(default = "default_burst")]
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_second: default_rps(),
            burst_size: default_burst(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_rps() -> u32 {
    100
}

fn default_burst() -> u32 {
    50
}

/// Audit logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Enable audit logging
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Log file path
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Log to stdout
    #[serde(default = "default_true")]
    pub stdout: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            file: None,
            stdout: true,
        }
    }
}

/// OpenTelemetry tracing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TracingConfig {
    /// Enable OpenTelemetry distributed tracing
    #[serde(default)]
    pub enabled: bool,

    /// Service name for traces
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// OTLP exporter endpoint (e.g., "http://localhost:4317" for gRPC)
    /// If not set, traces are only logged locally
    pub otlp_endpoint: Option<String>,

    /// Sample rate (0.0 to 1.0, default: 1.0 = sample all)
    #[serde(default = "default_sample_rate")]
    pub sample_rate: f64,

    /// Prometheus exporter bind address for `/metrics`, e.g. "0.0.0.0:9090"
    pub metrics_addr: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            service_name: default_service_name(),
            otlp_endpoint: None,
            sample_rate: default_sample_rate(),
            metrics_addr: None,
        }
    }
}

fn default_service_name() -> String {
    "oauth2-orchestrator".to_string()
}

fn default_sample_rate() -> f64 {
    1.0
}

impl Config {
    /// Load configuration from a file. Dispatches on extension: `.yaml`/
    /// `.yml` via `serde_yaml`, everything else via `toml`.
    pub fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;

        let config: Config = if path.extension().map(|e| e == "yaml" || e == "yml").unwrap_or(false) {
            serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?
        } else {
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.oauth.admin_base_url.is_empty() {
            return Err(ConfigError::Validation(
                "oauth.admin_base_url must be set".to_string(),
            ));
        }
        if self.oauth.public_base_url.is_empty() {
            return Err(ConfigError::Validation(
                "oauth.public_base_url must be set".to_string(),
            ));
        }
        if self.oauth.clients.is_empty() {
            return Err(ConfigError::Validation(
                "at least one client must be configured under oauth.clients".to_string(),
            ));
        }
        for (client_id, client) in &self.oauth.clients {
            if client.secret.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "client '{client_id}' is missing a secret"
                )));
            }
            if client.redirect_uri.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "client '{client_id}' is missing a redirect_uri"
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_config() -> Config {
        let mut clients = HashMap::new();
        clients.insert(
            "web".to_string(),
            OAuthClientConfig {
                secret: "s3cr3t".to_string(),
                redirect_uri: "https://app/cb".to_string(),
            },
        );
        Config {
            server: ServerConfig::default(),
            oauth: OAuthConfig {
                admin_base_url: "http://hydra:4445".to_string(),
                public_base_url: "http://hydra:4444".to_string(),
                clients,
                credentials_reset_settings: CredentialsResetSettings::default(),
                refresh_token_expiry_hours: 720,
            },
            rate_limit: RateLimitConfig::default(),
            audit: AuditConfig::default(),
            tracing: TracingConfig::default(),
        }
    }

    #[test]
    fn minimal_config_validates() {
        assert!(minimal_config().validate().is_ok());
    }

    #[test]
    fn missing_clients_fails_validation() {
        let mut config = minimal_config();
        config.oauth.clients.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_admin_base_url_fails_validation() {
        let mut config = minimal_config();
        config.oauth.admin_base_url.clear();
        assert!(config.validate().is_err());
    }
}
