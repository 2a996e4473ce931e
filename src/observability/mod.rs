//! Observability: tracing, OTLP export, and Prometheus metrics for the
//! orchestration engine.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::TracingConfig;

/// Initialize tracing/logging, optionally layering in OTLP export when
/// `config.otlp_endpoint` is set.
pub fn init_tracing(verbose: bool, config: &TracingConfig) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let otel_layer = if config.enabled {
        config.otlp_endpoint.as_ref().and_then(|endpoint| {
            build_otlp_tracer(endpoint, &config.service_name)
                .map_err(|e| tracing::error!(error = %e, "failed to build OTLP tracer"))
                .ok()
                .map(|tracer| tracing_opentelemetry::layer().with_tracer(tracer))
        })
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(otel_layer)
        .init();
}

fn build_otlp_tracer(
    endpoint: &str,
    service_name: &str,
) -> Result<opentelemetry_sdk::trace::Tracer, opentelemetry::trace::TraceError> {
    use opentelemetry_otlp::WithExportConfig;

    opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint),
        )
        .with_trace_config(opentelemetry_sdk::trace::config().with_resource(
            opentelemetry_sdk::Resource::new(vec![opentelemetry::KeyValue::new(
                "service.name",
                service_name.to_string(),
            )]),
        ))
        .install_batch(opentelemetry_sdk::runtime::Tokio)
}

/// Prometheus exposition for the orchestration engine, replacing a
/// hand-rolled text formatter with the `metrics`/`metrics-exporter-prometheus`
/// ecosystem crates.
pub mod metrics {
    use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

    /// Install the global Prometheus recorder. Call once at startup; the
    /// returned handle's `render()` backs the `/metrics` endpoint.
    pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
        PrometheusBuilder::new().install_recorder()
    }

    pub fn record_login_accepted() {
        ::metrics::counter!("oauth2_orchestrator_logins_accepted_total").increment(1);
    }

    pub fn record_consent_accepted() {
        ::metrics::counter!("oauth2_orchestrator_consents_accepted_total").increment(1);
    }

    pub fn record_token_exchanged() {
        ::metrics::counter!("oauth2_orchestrator_tokens_exchanged_total").increment(1);
    }

    pub fn record_token_rotated() {
        ::metrics::counter!("oauth2_orchestrator_tokens_rotated_total").increment(1);
    }

    pub fn record_verification_token_issued() {
        ::metrics::counter!("oauth2_orchestrator_verification_tokens_issued_total").increment(1);
    }

    pub fn record_rate_limited() {
        ::metrics::counter!("oauth2_orchestrator_rate_limited_total").increment(1);
    }

    pub fn record_revoked() {
        ::metrics::counter!("oauth2_orchestrator_revocations_total").increment(1);
    }

    pub fn record_upstream_error() {
        ::metrics::counter!("oauth2_orchestrator_upstream_errors_total").increment(1);
    }
}
