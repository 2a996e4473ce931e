//! OAuth2/OIDC orchestration engine fronting a Hydra-compatible
//! authorization server.

use std::collections::HashMap;
use std::sync::Arc;

use oauth2_orchestrator::{
    audit::AuditLogger,
    cache::InMemorySessionCache,
    cli::{generate_config, Cli, Commands},
    config::Config,
    observability::{init_tracing, metrics as obs_metrics},
    orchestrator::{ClientConfig, CredentialsResetSettings, OrchestratorConfig, TokenOrchestrator},
    rate_limit::RateLimitService,
    server::{self, AppState},
    upstream::HydraClient,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse_args();

    match cli.command {
        Commands::Init { format, force } => {
            let filename = if format == "yaml" {
                "oauth2-orchestrator.yaml"
            } else {
                "oauth2-orchestrator.toml"
            };

            let path = std::path::Path::new(filename);
            if path.exists() && !force {
                eprintln!(
                    "Error: {} already exists. Use --force to overwrite.",
                    filename
                );
                std::process::exit(1);
            }

            let config = generate_config(&format);
            std::fs::write(filename, config)?;
            println!("Created configuration file: {}", filename);
        }

        Commands::Validate => match Config::from_file(&cli.config) {
            Ok(_) => {
                println!("Configuration is valid: {}", cli.config.display());
            }
            Err(e) => {
                eprintln!("Configuration error: {}", e);
                std::process::exit(1);
            }
        },

        Commands::Run { host, port } => {
            let mut config = Config::from_file(&cli.config)?;

            init_tracing(cli.verbose, &config.tracing);

            if let Some(h) = host {
                config.server.host = h;
            }
            if let Some(p) = port {
                config.server.port = p;
            }

            let metrics_handle = if config.tracing.metrics_addr.is_some() {
                match obs_metrics::install_recorder() {
                    Ok(handle) => Some(handle),
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to install Prometheus recorder");
                        None
                    }
                }
            } else {
                None
            };

            let cache = InMemorySessionCache::shared();
            let upstream = Arc::new(HydraClient::new(
                config.oauth.admin_base_url.clone(),
                config.oauth.public_base_url.clone(),
            ));

            let clients: HashMap<String, ClientConfig> = config
                .oauth
                .clients
                .iter()
                .map(|(id, c)| {
                    (
                        id.clone(),
                        ClientConfig {
                            secret: c.secret.clone(),
                            redirect_uri: c.redirect_uri.clone(),
                        },
                    )
                })
                .collect();

            let orchestrator_config = OrchestratorConfig {
                clients,
                credentials_reset_settings: CredentialsResetSettings {
                    request_count: config.oauth.credentials_reset_settings.request_count,
                    request_ttl_minutes: config.oauth.credentials_reset_settings.request_ttl_minutes,
                },
                refresh_token_expiry_hours: config.oauth.refresh_token_expiry_hours,
            };

            let orchestrator = Arc::new(TokenOrchestrator::new(cache, upstream, orchestrator_config));

            let rate_limiter = RateLimitService::new(&config.rate_limit);
            let audit_logger = Arc::new(AuditLogger::new(&config.audit)?);

            let state = Arc::new(AppState {
                config,
                orchestrator,
                rate_limiter,
                audit_logger,
                metrics_handle,
            });

            server::run(state).await?;
        }

        Commands::Version => {
            println!("oauth2-orchestrator {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
