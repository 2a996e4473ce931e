//! Service Facade: an axum JSON/HTTP surface standing in for the source's
//! gRPC service (`grpcserver/grpchandler.go`), one route per RPC operation.
//! See DESIGN.md for why HTTP/JSON was chosen over introducing a tonic
//! stack.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audit::AuditLogger;
use crate::model::{ClientTokenBundle, IntrospectResult, IntrospectVerificationResult, TokenBundle, TokenType, UserProfile};
use crate::observability::metrics;
use crate::orchestrator::{OrchestratorError, TokenOrchestrator};

/// State shared by every facade handler: the orchestrator plus the audit
/// sink, so each RPC can record its own event without threading a logger
/// through every call signature.
#[derive(Clone)]
pub struct FacadeState {
    pub orchestrator: Arc<TokenOrchestrator>,
    pub audit: Arc<AuditLogger>,
}

/// Wire error mapping for the facade, per spec §7.
#[derive(Debug)]
pub struct AppError(OrchestratorError);

impl From<OrchestratorError> for AppError {
    fn from(e: OrchestratorError) -> Self {
        AppError(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            OrchestratorError::EmailLimitReached => StatusCode::TOO_MANY_REQUESTS,
            OrchestratorError::Transport(_) => {
                metrics::record_upstream_error();
                StatusCode::INTERNAL_SERVER_ERROR
            }
            OrchestratorError::InvalidLoginChallenge
            | OrchestratorError::InvalidConsentChallenge
            | OrchestratorError::BadExchange
            | OrchestratorError::UnauthorisedExchange
            | OrchestratorError::ExchangeFailed
            | OrchestratorError::TokenExpired
            | OrchestratorError::SessionNotFound
            | OrchestratorError::SessionExpired
            | OrchestratorError::AccessTokenExpired
            | OrchestratorError::JwksLookupFailed
            | OrchestratorError::InvalidUserId => StatusCode::UNAUTHORIZED,
        };

        let body = serde_json::json!({ "message": self.0.to_string() });
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct UserProfileRequest {
    id: Uuid,
    email: String,
    name: String,
}

impl From<UserProfileRequest> for UserProfile {
    fn from(r: UserProfileRequest) -> Self {
        UserProfile {
            id: r.id,
            email: r.email,
            name: r.name,
        }
    }
}

#[derive(Debug, Serialize)]
struct RedirectResponse {
    redirect_to: String,
}

#[derive(Debug, Deserialize)]
struct AcceptLoginBody {
    login_challenge: String,
    user_profile: UserProfileRequest,
}

async fn accept_login(
    State(state): State<FacadeState>,
    Json(body): Json<AcceptLoginBody>,
) -> Result<Json<RedirectResponse>, AppError> {
    let redirect_to = state
        .orchestrator
        .accept(&body.login_challenge, &body.user_profile.into())
        .await
        .map_err(|e| {
            state.audit.log_error(&e.to_string());
            e
        })?;
    // client_id isn't resolved until consent/exchange; the challenge is the
    // best available correlation key at this point in the flow.
    state.audit.log_login_accepted(&body.login_challenge);
    metrics::record_login_accepted();
    Ok(Json(RedirectResponse { redirect_to }))
}

#[derive(Debug, Deserialize)]
struct AcceptConsentBody {
    consent_challenge: String,
}

async fn accept_consent(
    State(state): State<FacadeState>,
    Json(body): Json<AcceptConsentBody>,
) -> Result<Json<RedirectResponse>, AppError> {
    let redirect_to = state
        .orchestrator
        .accept_consent(&body.consent_challenge)
        .await
        .map_err(|e| {
            state.audit.log_error(&e.to_string());
            e
        })?;
    state.audit.log_consent_accepted();
    metrics::record_consent_accepted();
    Ok(Json(RedirectResponse { redirect_to }))
}

#[derive(Debug, Deserialize)]
struct ExchangeTokenBody {
    code: String,
    redirect_uri: String,
    client_id: String,
    code_verifier: String,
}

async fn exchange_token(
    State(state): State<FacadeState>,
    Json(body): Json<ExchangeTokenBody>,
) -> Result<Json<TokenBundle>, AppError> {
    let bundle = state
        .orchestrator
        .exchange_token(&body.code, &body.redirect_uri, &body.client_id, &body.code_verifier)
        .await
        .map_err(|e| {
            state.audit.log_error(&e.to_string());
            e
        })?;
    state
        .audit
        .log_token_exchanged(&bundle.session_id, &body.client_id);
    metrics::record_token_exchanged();
    Ok(Json(bundle))
}

#[derive(Debug, Deserialize)]
struct IntrospectBody {
    access_token: String,
    session_id: String,
}

async fn introspect(
    State(state): State<FacadeState>,
    Json(body): Json<IntrospectBody>,
) -> Result<Json<IntrospectResult>, AppError> {
    let result = state
        .orchestrator
        .introspect_token(&body.access_token, &body.session_id, TokenType::AccessToken)
        .await
        .map_err(|e| {
            state.audit.log_error(&e.to_string());
            e
        })?;
    state
        .audit
        .log_token_introspected(&body.session_id, result.active);
    if result.is_rotated {
        state.audit.log_token_rotated(&body.session_id);
        metrics::record_token_rotated();
    }
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
struct GenerateVerificationTokenBody {
    email: String,
    client_id: String,
}

async fn generate_verification_token(
    State(state): State<FacadeState>,
    Json(body): Json<GenerateVerificationTokenBody>,
) -> Result<Json<ClientTokenBundle>, AppError> {
    let bundle = state
        .orchestrator
        .access_for_client_token(&body.email, &body.client_id)
        .await
        .map_err(|e| {
            if matches!(e, OrchestratorError::EmailLimitReached) {
                state.audit.log_rate_limited(&body.email);
                metrics::record_rate_limited();
            } else {
                state.audit.log_error(&e.to_string());
            }
            e
        })?;
    state
        .audit
        .log_verification_token_issued(&body.email, &body.client_id);
    metrics::record_verification_token_issued();
    Ok(Json(bundle))
}

#[derive(Debug, Deserialize)]
struct IntrospectVerificationTokenBody {
    access_token: String,
}

async fn introspect_verification_token(
    State(state): State<FacadeState>,
    Json(body): Json<IntrospectVerificationTokenBody>,
) -> Result<Json<IntrospectVerificationResult>, AppError> {
    let result = state
        .orchestrator
        .introspect_response(&body.access_token)
        .await
        .map_err(|e| {
            state.audit.log_error(&e.to_string());
            e
        })?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
struct GenerateRefreshTokenBody {
    access_token: String,
    session_id: String,
}

async fn generate_refresh_token(
    State(state): State<FacadeState>,
    Json(body): Json<GenerateRefreshTokenBody>,
) -> Result<Json<TokenBundle>, AppError> {
    let bundle = state
        .orchestrator
        .fetch_refresh_token(&body.access_token, &body.session_id)
        .await
        .map_err(|e| {
            state.audit.log_error(&e.to_string());
            e
        })?;
    state.audit.log_token_rotated(&body.session_id);
    metrics::record_token_rotated();
    Ok(Json(bundle))
}

#[derive(Debug, Deserialize)]
struct RevokeAccessTokenBody {
    access_token: String,
    session_id: String,
    client_id: String,
}

async fn revoke_access_token(
    State(state): State<FacadeState>,
    Json(body): Json<RevokeAccessTokenBody>,
) -> Result<StatusCode, AppError> {
    state
        .orchestrator
        .revoke_access_token(&body.access_token, &body.session_id, &body.client_id)
        .await
        .map_err(|e| {
            state.audit.log_error(&e.to_string());
            e
        })?;
    state.audit.log_token_revoked(&body.session_id);
    metrics::record_revoked();
    Ok(StatusCode::NO_CONTENT)
}

/// One route per RPC operation of `grpchandler.go`, mounted under `/v1`.
pub fn router(orchestrator: Arc<TokenOrchestrator>, audit: Arc<AuditLogger>) -> Router {
    let state = FacadeState { orchestrator, audit };
    Router::new()
        .route("/v1/login/accept", post(accept_login))
        .route("/v1/consent/accept", post(accept_consent))
        .route("/v1/tokens/exchange", post(exchange_token))
        .route("/v1/tokens/introspect", post(introspect))
        .route("/v1/tokens/refresh", post(generate_refresh_token))
        .route("/v1/tokens/revoke", post(revoke_access_token))
        .route("/v1/verification-tokens", post(generate_verification_token))
        .route(
            "/v1/verification-tokens/introspect",
            post(introspect_verification_token),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemorySessionCache;
    use crate::mocks::MockUpstreamClient;
    use crate::orchestrator::{ClientConfig, CredentialsResetSettings, OrchestratorConfig};
    use axum::body::Body;
    use axum::http::Request;
    use std::collections::HashMap;
    use tower::ServiceExt;

    fn test_orchestrator() -> Arc<TokenOrchestrator> {
        let mut clients = HashMap::new();
        clients.insert(
            "web".to_string(),
            ClientConfig {
                secret: "s3cr3t".to_string(),
                redirect_uri: "https://app/cb".to_string(),
            },
        );
        let config = OrchestratorConfig {
            clients,
            credentials_reset_settings: CredentialsResetSettings {
                request_count: 5,
                request_ttl_minutes: 10,
            },
            refresh_token_expiry_hours: 1,
        };
        Arc::new(TokenOrchestrator::new(
            InMemorySessionCache::shared(),
            Arc::new(MockUpstreamClient::new()),
            config,
        ))
    }

    #[tokio::test]
    async fn exchange_token_round_trips_through_http() {
        let app = router(test_orchestrator(), Arc::new(AuditLogger::disabled()));

        let body = serde_json::json!({
            "code": "abc",
            "redirect_uri": "https://app/cb",
            "client_id": "web",
            "code_verifier": "verifier"
        });

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/tokens/exchange")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn revoke_returns_no_content() {
        let app = router(test_orchestrator(), Arc::new(AuditLogger::disabled()));
        let body = serde_json::json!({
            "access_token": "A",
            "session_id": "S",
            "client_id": "web"
        });

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/tokens/revoke")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }
}
