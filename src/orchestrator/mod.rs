//! Token Orchestrator: the protocol-bearing state machine coordinating the
//! session cache and the upstream client across the Authorization Code +
//! PKCE flow, transparent token rotation, rate-limited verification tokens,
//! and revocation.
//!
//! Method-for-method grounded on
//! `examples/original_source/token-management-service/domain/oauth2.go`
//! (see DESIGN.md); re-expressed in idiomatic async Rust rather than
//! transliterated.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use uuid::Uuid;

use crate::cache::{unix_now, CacheError, SessionCache};
use crate::model::{
    ClientTokenBundle, EmailRequestCount, IdTokenClaims, IntrospectResult,
    IntrospectVerificationResult, TokenBundle, TokenType, UserProfile,
};
use crate::upstream::{TokenGrant, UpstreamClient, UpstreamError};

/// Single well-known hash key holding the per-email rate-limit counters
/// (`redisEmailCountKey` in the source).
const EMAIL_COUNT_HASH_KEY: &str = "redisEmailCountKey";

/// Orchestrator-internal error taxonomy; see spec §7 for the wire mapping.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("invalid login challenge")]
    InvalidLoginChallenge,

    #[error("invalid consent challenge")]
    InvalidConsentChallenge,

    #[error("bad token exchange request")]
    BadExchange,

    #[error("unauthorised token exchange")]
    UnauthorisedExchange,

    #[error("token exchange failed")]
    ExchangeFailed,

    #[error("token expired")]
    TokenExpired,

    #[error("session not found")]
    SessionNotFound,

    #[error("session expired")]
    SessionExpired,

    #[error("access token expired")]
    AccessTokenExpired,

    #[error("email rate limit reached")]
    EmailLimitReached,

    /// ID-token header/claims decode failure, or a `kid` that doesn't
    /// exist in the upstream JWKS. Rendered the same as any other
    /// introspect-path failure (generic auth-header error), matching the
    /// original's `err != nil` branch inside `Introspect`.
    #[error("invalid id token")]
    JwksLookupFailed,

    /// A successfully introspected ID token whose user profile carries an
    /// invalid subject ID. Rendered distinctly by the gate ("missing
    /// userID"), matching the original's separate, subsequent
    /// `uuid.Parse(introspect.IDToken.UserProfile.ID)` check.
    #[error("invalid user id")]
    InvalidUserId,

    #[error("transport error: {0}")]
    Transport(String),
}

impl From<UpstreamError> for OrchestratorError {
    fn from(e: UpstreamError) -> Self {
        match e {
            UpstreamError::InvalidLoginChallenge => OrchestratorError::InvalidLoginChallenge,
            UpstreamError::InvalidConsentChallenge => OrchestratorError::InvalidConsentChallenge,
            UpstreamError::BadExchange => OrchestratorError::BadExchange,
            UpstreamError::UnauthorisedExchange => OrchestratorError::UnauthorisedExchange,
            UpstreamError::ExchangeFailed => OrchestratorError::ExchangeFailed,
            UpstreamError::TokenExpired => OrchestratorError::TokenExpired,
            UpstreamError::InvalidIdToken => OrchestratorError::JwksLookupFailed,
            UpstreamError::Transport(msg) => OrchestratorError::Transport(msg),
        }
    }
}

/// Per-client secret and registered redirect URI, resolved from the
/// external secret store ahead of orchestrator construction (spec §6).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub secret: String,
    pub redirect_uri: String,
}

/// `{request_count, request_ttl_minutes}` governing verification-token
/// issuance per email address.
#[derive(Debug, Clone, Copy)]
pub struct CredentialsResetSettings {
    pub request_count: u32,
    pub request_ttl_minutes: i64,
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub clients: HashMap<String, ClientConfig>,
    pub credentials_reset_settings: CredentialsResetSettings,
    pub refresh_token_expiry_hours: i64,
}

impl OrchestratorConfig {
    fn client(&self, client_id: &str) -> Result<&ClientConfig, OrchestratorError> {
        self.clients
            .get(client_id)
            .ok_or_else(|| OrchestratorError::Transport(format!("unknown client {client_id}")))
    }

    fn request_ttl(&self) -> Duration {
        Duration::from_secs((self.credentials_reset_settings.request_ttl_minutes * 60).max(0) as u64)
    }

    fn refresh_token_ttl(&self) -> Duration {
        Duration::from_secs((self.refresh_token_expiry_hours * 3600).max(0) as u64)
    }
}

/// Mint a locally-opaque session ID: 32 cryptographically random bytes,
/// base64url encoded without padding (43 characters). Fails the request
/// rather than silently falling back to an empty string on RNG failure —
/// the source's bug, fixed here per spec §9.
fn mint_session_id() -> Result<String, OrchestratorError> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| OrchestratorError::Transport(format!("failed to mint session id: {e}")))?;
    Ok(base64::Engine::encode(
        &base64::engine::general_purpose::URL_SAFE_NO_PAD,
        bytes,
    ))
}

fn format_rfc1123(dt: chrono::DateTime<Utc>) -> String {
    dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Decode an ID token's claims without verifying its signature; only the
/// `kid` header is trusted, and only after round-tripping it against the
/// upstream JWKS endpoint (spec §9, Open Question (c)).
fn decode_id_token(id_token: &str) -> Result<(String, IdTokenClaims), OrchestratorError> {
    let header = jsonwebtoken::decode_header(id_token)
        .map_err(|_| OrchestratorError::JwksLookupFailed)?;
    let kid = header.kid.ok_or(OrchestratorError::JwksLookupFailed)?;

    let mut validation = jsonwebtoken::Validation::new(header.alg);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.required_spec_claims.clear();

    let data = jsonwebtoken::decode::<IdTokenClaims>(
        id_token,
        &jsonwebtoken::DecodingKey::from_secret(&[]),
        &validation,
    )
    .map_err(|_| OrchestratorError::JwksLookupFailed)?;

    Ok((kid, data.claims))
}

/// The stateful coordinator implementing the flows of spec §4.3.
pub struct TokenOrchestrator {
    cache: Arc<dyn SessionCache>,
    upstream: Arc<dyn UpstreamClient>,
    config: OrchestratorConfig,
}

impl TokenOrchestrator {
    pub fn new(
        cache: Arc<dyn SessionCache>,
        upstream: Arc<dyn UpstreamClient>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            cache,
            upstream,
            config,
        }
    }

    /// `Accept(login_challenge, user_profile) -> {redirect_to}`
    pub async fn accept(
        &self,
        login_challenge: &str,
        profile: &UserProfile,
    ) -> Result<String, OrchestratorError> {
        let result = self.upstream.accept_login(login_challenge, profile).await;
        tracing::debug!(
            method = "accept",
            email = %profile.email,
            outcome = if result.is_ok() { "ok" } else { "error" },
            "login accept"
        );
        Ok(result?)
    }

    /// `AcceptConsent(consent_challenge) -> {redirect_to}`
    pub async fn accept_consent(
        &self,
        consent_challenge: &str,
    ) -> Result<String, OrchestratorError> {
        let details = self.upstream.get_consent(consent_challenge).await?;
        let redirect = self
            .upstream
            .accept_consent(consent_challenge, &details, &details.context)
            .await;
        tracing::debug!(
            method = "accept_consent",
            outcome = if redirect.is_ok() { "ok" } else { "error" },
            "consent accept"
        );
        Ok(redirect?)
    }

    /// `ExchangeToken(code, redirect_uri, client_id, code_verifier) -> TokenBundle`
    pub async fn exchange_token(
        &self,
        code: &str,
        redirect_uri: &str,
        client_id: &str,
        code_verifier: &str,
    ) -> Result<TokenBundle, OrchestratorError> {
        let client = self.config.client(client_id)?;
        let response = self
            .upstream
            .exchange_token(
                TokenGrant::AuthorizationCode {
                    code,
                    redirect_uri,
                    code_verifier,
                },
                client_id,
                &client.secret,
            )
            .await?;

        let refresh_token = response.refresh_token.ok_or_else(|| {
            OrchestratorError::Transport("token exchange returned no refresh_token".to_string())
        })?;

        let session_id = mint_session_id()?;
        let expires_at = format_rfc1123(Utc::now() + ChronoDuration::seconds(response.expires_in));

        let bundle = TokenBundle {
            access_token: response.access_token,
            refresh_token,
            id_token: response.id_token,
            expires_in: response.expires_in,
            expires_at,
            session_id: session_id.clone(),
        };

        self.cache
            .put_bundle(&session_id, bundle.clone(), self.config.refresh_token_ttl())
            .await;

        tracing::info!(
            method = "exchange_token",
            client_id,
            session_id = %bundle.session_id,
            outcome = "ok",
            "token exchanged"
        );
        Ok(bundle)
    }

    /// `IntrospectToken(token, session_id, token_type) -> IntrospectResult`
    ///
    /// Called with `token_type = AccessToken` initially; recurses into
    /// `RefreshToken` when the access token has gone inactive, rotating
    /// transparently and reporting the rotation to the caller.
    pub async fn introspect_token(
        &self,
        token: &str,
        session_id: &str,
        token_type: TokenType,
    ) -> Result<IntrospectResult, OrchestratorError> {
        let bundle = match self.cache.get_bundle(session_id).await {
            Ok(bundle) => bundle,
            Err(CacheError::NotFound) => return Err(OrchestratorError::SessionNotFound),
            Err(CacheError::Transport(e)) => return Err(OrchestratorError::Transport(e)),
        };

        if token != bundle.access_token && token != bundle.refresh_token {
            return Err(OrchestratorError::SessionNotFound);
        }

        let mut result = self.upstream.introspect(token).await?;

        if result.active {
            if let Some(id_token) = &bundle.id_token {
                let (kid, claims) = decode_id_token(id_token)?;
                if !self.upstream.jwks_key_exists(&kid).await? {
                    return Err(OrchestratorError::JwksLookupFailed);
                }
                result.user_info = Some(claims);
            }
            return Ok(result);
        }

        match token_type {
            TokenType::RefreshToken => Err(OrchestratorError::SessionExpired),
            TokenType::AccessToken => {
                // Boxed: an unboxed recursive call here would give the
                // future an infinite size.
                let refresh_result = Box::pin(self.introspect_token(
                    &bundle.refresh_token,
                    session_id,
                    TokenType::RefreshToken,
                ))
                .await;

                match refresh_result {
                    Ok(mut refresh_result) if refresh_result.active => {
                        let rotated_client_id = refresh_result.client_id.clone().unwrap_or_default();
                        let rotated = self
                            .access_for_refresh_token(
                                &bundle.refresh_token,
                                &rotated_client_id,
                                session_id,
                            )
                            .await?;

                        refresh_result.is_rotated = true;
                        refresh_result.new_access_token = Some(rotated.access_token.clone());
                        refresh_result.new_access_token_expiry =
                            Some(crate::cache::unix_now() + rotated.expires_in);
                        refresh_result.token_type = Some("access_token".to_string());

                        tracing::info!(
                            method = "introspect_token",
                            client_id = rotated_client_id,
                            session_id,
                            outcome = "rotated",
                            "access token rotated transparently"
                        );
                        Ok(refresh_result)
                    }
                    Ok(_) => Err(OrchestratorError::SessionExpired),
                    Err(e) => Err(e),
                }
            }
        }
    }

    /// `AccessForRefreshToken(refresh_token, client_id, existing_session_id) -> TokenBundle`
    pub async fn access_for_refresh_token(
        &self,
        refresh_token: &str,
        client_id: &str,
        existing_session_id: &str,
    ) -> Result<TokenBundle, OrchestratorError> {
        let client = self.config.client(client_id)?;
        let response = self
            .upstream
            .exchange_token(
                TokenGrant::RefreshToken {
                    refresh_token,
                    redirect_uri: &client.redirect_uri,
                },
                client_id,
                &client.secret,
            )
            .await?;

        let expires_at = format_rfc1123(Utc::now() + ChronoDuration::seconds(response.expires_in));
        let bundle = TokenBundle {
            access_token: response.access_token,
            refresh_token: response.refresh_token.unwrap_or_else(|| refresh_token.to_string()),
            id_token: response.id_token,
            expires_in: response.expires_in,
            expires_at,
            session_id: existing_session_id.to_string(),
        };

        self.cache
            .put_bundle(existing_session_id, bundle.clone(), self.config.refresh_token_ttl())
            .await;

        Ok(bundle)
    }

    /// `AccessForClientToken(email, client_id) -> ClientTokenBundle`
    ///
    /// Rate-limited verification-token issuance; see Testable Properties 4
    /// and 5.
    pub async fn access_for_client_token(
        &self,
        email: &str,
        client_id: &str,
    ) -> Result<ClientTokenBundle, OrchestratorError> {
        let now = unix_now();
        let ttl_secs = self.config.credentials_reset_settings.request_ttl_minutes * 60;
        let request_count = self.config.credentials_reset_settings.request_count;

        let existing = self
            .cache
            .hget(EMAIL_COUNT_HASH_KEY, email)
            .await
            .and_then(|raw| serde_json::from_str::<EmailRequestCount>(&raw).ok());

        let next = match existing {
            None => EmailRequestCount {
                count: 1,
                expires_at: now + ttl_secs,
            },
            Some(rec) if rec.expires_at < now => EmailRequestCount {
                count: 1,
                expires_at: now + ttl_secs,
            },
            Some(rec) if rec.count < request_count => EmailRequestCount {
                count: rec.count + 1,
                expires_at: rec.expires_at,
            },
            Some(_) => return Err(OrchestratorError::EmailLimitReached),
        };

        let encoded = serde_json::to_string(&next)
            .map_err(|e| OrchestratorError::Transport(e.to_string()))?;
        self.cache
            .hset(EMAIL_COUNT_HASH_KEY, email, encoded)
            .await;

        let client = self.config.client(client_id)?;
        let response = self
            .upstream
            .exchange_token(
                TokenGrant::ClientCredentials { scope: "api" },
                client_id,
                &client.secret,
            )
            .await?;

        let expires_at = format_rfc1123(Utc::now() + ChronoDuration::seconds(ttl_secs));
        let bundle = ClientTokenBundle {
            access_token: response.access_token.clone(),
            expires_in: ttl_secs,
            expires_at,
            scope: response.scope.unwrap_or_else(|| "api".to_string()),
            token_type: response.token_type.unwrap_or_else(|| "bearer".to_string()),
            email: email.to_string(),
        };

        self.cache
            .put_client_token(&response.access_token, bundle.clone(), self.config.request_ttl())
            .await;

        tracing::info!(
            method = "access_for_client_token",
            client_id,
            email,
            outcome = "ok",
            "verification token issued"
        );
        Ok(bundle)
    }

    /// `IntrospectResponse(access_token, AccessToken) -> IntrospectVerificationResult`
    ///
    /// Verification-token validation path: cache-miss is a deliberate
    /// denial-by-default rather than an upstream round-trip (Open Question
    /// (b) in DESIGN.md).
    pub async fn introspect_response(
        &self,
        access_token: &str,
    ) -> Result<IntrospectVerificationResult, OrchestratorError> {
        let stored = match self.cache.get_client_token(access_token).await {
            Ok(stored) => stored,
            Err(_) => return Err(OrchestratorError::AccessTokenExpired),
        };

        if stored.access_token != access_token {
            return Err(OrchestratorError::AccessTokenExpired);
        }

        let response = self.upstream.introspect(access_token).await?;

        Ok(IntrospectVerificationResult {
            active: response.active,
            email: stored.email,
            client_id: response.client_id,
        })
    }

    /// `FetchRefreshToken(access_token, session_id) -> TokenBundle`
    ///
    /// Composite of introspect (to discover `client_id`) + a forced
    /// `AccessForRefreshToken` rotation.
    pub async fn fetch_refresh_token(
        &self,
        access_token: &str,
        session_id: &str,
    ) -> Result<TokenBundle, OrchestratorError> {
        let bundle = match self.cache.get_bundle(session_id).await {
            Ok(bundle) => bundle,
            Err(CacheError::NotFound) => return Err(OrchestratorError::SessionNotFound),
            Err(CacheError::Transport(e)) => return Err(OrchestratorError::Transport(e)),
        };

        let introspected = self.upstream.introspect(access_token).await?;
        let client_id = introspected.client_id.unwrap_or_default();

        self.access_for_refresh_token(&bundle.refresh_token, &client_id, session_id)
            .await
    }

    /// `RevokeAccessToken(access_token, session_id, client_id) -> Ok | Error`
    pub async fn revoke_access_token(
        &self,
        access_token: &str,
        session_id: &str,
        client_id: &str,
    ) -> Result<(), OrchestratorError> {
        self.cache.delete_bundle(session_id).await;

        let client = self.config.client(client_id)?;
        self.upstream
            .revoke(access_token, client_id, &client.secret)
            .await?;

        tracing::info!(
            method = "revoke_access_token",
            client_id,
            session_id,
            outcome = "ok",
            "session revoked"
        );
        Ok(())
    }
}

/// Validate the `user_info.id` claim, as required by the Authentication
/// Gate (spec §4.4 step 5). Mirrors the original's separate, subsequent
/// `uuid.Parse(introspect.IDToken.UserProfile.ID)` check made only after
/// `Introspect` already succeeded: here the ID arrives pre-parsed as a
/// `Uuid` by serde, so the nil UUID is the only remaining way to observe
/// an "invalid id" that a parse failure would have caught upstream.
pub fn parse_user_id(claims: &IdTokenClaims) -> Result<Uuid, OrchestratorError> {
    if claims.user_profile.id.is_nil() {
        return Err(OrchestratorError::InvalidUserId);
    }
    Ok(claims.user_profile.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemorySessionCache;
    use crate::mocks::MockUpstreamClient;

    fn test_config() -> OrchestratorConfig {
        let mut clients = HashMap::new();
        clients.insert(
            "web".to_string(),
            ClientConfig {
                secret: "s3cr3t".to_string(),
                redirect_uri: "https://app/cb".to_string(),
            },
        );
        OrchestratorConfig {
            clients,
            credentials_reset_settings: CredentialsResetSettings {
                request_count: 5,
                request_ttl_minutes: 10,
            },
            refresh_token_expiry_hours: 1,
        }
    }

    #[tokio::test]
    async fn exchange_token_mints_session_and_writes_bundle() {
        let cache = Arc::new(InMemorySessionCache::new());
        let upstream = Arc::new(MockUpstreamClient::new());
        upstream.queue_token_response(crate::upstream::TokenResponse {
            access_token: "A".into(),
            refresh_token: Some("R".into()),
            id_token: Some("eyJhbGciOiJIUzI1NiJ9.e30.invalid".into()),
            expires_in: 3600,
            scope: None,
            token_type: None,
        });

        let orchestrator = TokenOrchestrator::new(cache.clone(), upstream, test_config());
        let bundle = orchestrator
            .exchange_token("c", "https://app/cb", "web", "v")
            .await
            .unwrap();

        assert_eq!(bundle.access_token, "A");
        assert_eq!(bundle.refresh_token, "R");
        assert_eq!(bundle.session_id.len(), 43);

        let stored = cache.get_bundle(&bundle.session_id).await.unwrap();
        assert_eq!(stored.access_token, "A");
    }

    #[tokio::test]
    async fn introspect_mismatch_is_session_not_found_without_upstream_call() {
        let cache = Arc::new(InMemorySessionCache::new());
        cache
            .put_bundle(
                "S",
                TokenBundle {
                    access_token: "A".into(),
                    refresh_token: "R".into(),
                    id_token: None,
                    expires_in: 3600,
                    expires_at: "x".into(),
                    session_id: "S".into(),
                },
                Duration::from_secs(3600),
            )
            .await;
        let upstream = Arc::new(MockUpstreamClient::new());

        let orchestrator = TokenOrchestrator::new(cache, upstream.clone(), test_config());
        let result = orchestrator
            .introspect_token("not-a-or-r", "S", TokenType::AccessToken)
            .await;

        assert!(matches!(result, Err(OrchestratorError::SessionNotFound)));
        assert_eq!(upstream.introspect_call_count(), 0);
    }

    #[tokio::test]
    async fn revoke_deletes_bundle_and_calls_upstream_once() {
        let cache = Arc::new(InMemorySessionCache::new());
        cache
            .put_bundle(
                "S",
                TokenBundle {
                    access_token: "A".into(),
                    refresh_token: "R".into(),
                    id_token: None,
                    expires_in: 3600,
                    expires_at: "x".into(),
                    session_id: "S".into(),
                },
                Duration::from_secs(3600),
            )
            .await;
        let upstream = Arc::new(MockUpstreamClient::new());

        let orchestrator = TokenOrchestrator::new(cache.clone(), upstream.clone(), test_config());
        orchestrator
            .revoke_access_token("A", "S", "web")
            .await
            .unwrap();

        assert!(matches!(
            cache.get_bundle("S").await,
            Err(CacheError::NotFound)
        ));
        assert_eq!(upstream.revoke_call_count(), 1);
    }

    #[test]
    fn parse_user_id_rejects_the_nil_uuid() {
        let claims = IdTokenClaims {
            sub: "sub".into(),
            user_profile: UserProfile {
                id: Uuid::nil(),
                email: "user@example.com".into(),
                name: "Test User".into(),
            },
            at_hash: None,
        };

        assert!(matches!(
            parse_user_id(&claims),
            Err(OrchestratorError::InvalidUserId)
        ));
    }

    #[test]
    fn parse_user_id_accepts_a_real_uuid() {
        let id = Uuid::new_v4();
        let claims = IdTokenClaims {
            sub: "sub".into(),
            user_profile: UserProfile {
                id,
                email: "user@example.com".into(),
                name: "Test User".into(),
            },
            at_hash: None,
        };

        assert_eq!(parse_user_id(&claims).unwrap(), id);
    }

    #[tokio::test]
    async fn email_rate_limit_caps_at_request_count() {
        let cache = Arc::new(InMemorySessionCache::new());
        let upstream = Arc::new(MockUpstreamClient::new());
        for _ in 0..5 {
            upstream.queue_token_response(crate::upstream::TokenResponse {
                access_token: format!("CT{}", rand::random::<u32>()),
                refresh_token: None,
                id_token: None,
                expires_in: 600,
                scope: Some("api".into()),
                token_type: Some("bearer".into()),
            });
        }

        let orchestrator = TokenOrchestrator::new(cache, upstream, test_config());

        for _ in 0..5 {
            orchestrator
                .access_for_client_token("u@x", "web")
                .await
                .unwrap();
        }

        let sixth = orchestrator.access_for_client_token("u@x", "web").await;
        assert!(matches!(sixth, Err(OrchestratorError::EmailLimitReached)));
    }
}
