//! Axum server wiring: application state, router assembly, and the
//! top-level `run` entry point for the orchestration engine.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Extension, State},
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::trace::TraceLayer;

use crate::audit::AuditLogger;
use crate::config::Config;
use crate::facade;
use crate::gate::auth_gate;
use crate::model::UserProfile;
use crate::orchestrator::TokenOrchestrator;
use crate::rate_limit::RateLimitService;

/// Application state shared across handlers.
pub struct AppState {
    pub config: Config,
    pub orchestrator: Arc<TokenOrchestrator>,
    pub rate_limiter: RateLimitService,
    pub audit_logger: Arc<AuditLogger>,
    pub metrics_handle: Option<PrometheusHandle>,
}

#[derive(serde::Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let body = state
        .metrics_handle
        .as_ref()
        .map(|h| h.render())
        .unwrap_or_default();
    ([("content-type", "text/plain; version=0.0.4")], body)
}

/// Demo gate-protected route: echoes back the profile the Authentication
/// Gate resolved via introspection.
async fn whoami(Extension(profile): Extension<UserProfile>) -> Json<UserProfile> {
    Json(profile)
}

/// Ambient per-client HTTP throttle, applied ahead of both the facade and
/// the gate-protected routes so a 429 looks the same regardless of which
/// side of the auth gate rejected the request.
async fn rate_limit_gate(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !state.rate_limiter.check("default", None) {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(serde_json::json!({ "message": "rate limit exceeded" })),
        )
            .into_response();
    }
    next.run(request).await
}

/// Build the application router: the facade's JSON endpoints, one
/// gate-protected demo route, `/health`, and `/metrics`.
pub fn build_router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/v1/me", get(whoami))
        .layer(middleware::from_fn_with_state(
            state.orchestrator.clone(),
            auth_gate,
        ))
        .with_state(state.orchestrator.clone());

    let api = facade::router(state.orchestrator.clone(), state.audit_logger.clone())
        .merge(protected)
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit_gate));

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .with_state(state.clone())
        .merge(api)
        .layer(TraceLayer::new_for_http())
}

/// Run the server.
pub async fn run(state: Arc<AppState>) -> Result<(), crate::Error> {
    let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("oauth2-orchestrator listening on {}", addr);

    let app = build_router(state);
    axum::serve(listener, app)
        .await
        .map_err(|e| crate::Error::Server(e.to_string()))
}
