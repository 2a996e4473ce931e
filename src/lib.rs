//! An OAuth2/OIDC orchestration layer in front of a Hydra-compatible
//! authorization server.
//!
//! This crate owns the server-side lifecycle of the Authorization Code +
//! PKCE flow: accepting login and consent challenges, exchanging
//! authorization codes for token bundles, introspecting access tokens,
//! transparently rotating them using stored refresh tokens, issuing
//! rate-limited client-credentials verification tokens, and revoking
//! sessions.

pub mod audit;
pub mod cache;
pub mod cli;
pub mod config;
pub mod facade;
pub mod gate;
pub mod model;
pub mod observability;
pub mod orchestrator;
pub mod rate_limit;
pub mod server;
pub mod upstream;

pub mod mocks;

pub use config::Config;

/// Result type alias for orchestrator operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type, unifying every module-local error kind.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Cache error: {0}")]
    Cache(#[from] cache::CacheError),

    #[error("Upstream error: {0}")]
    Upstream(#[from] upstream::UpstreamError),

    #[error("Orchestrator error: {0}")]
    Orchestrator(#[from] orchestrator::OrchestratorError),

    #[error("Server error: {0}")]
    Server(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}
