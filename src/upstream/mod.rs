//! Upstream Client: a typed wrapper over the Hydra-compatible authorization
//! server's admin and public APIs.
//!
//! Endpoint paths, HTTP methods, and the classification of non-2xx
//! responses below are bit-exact with
//! `examples/original_source/token-management-service/domain/oauth2.go` and
//! `grpcserver/grpchandler.go` (see DESIGN.md).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::{IntrospectResult, UserProfile};

const TOKEN_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Classified upstream failures. Each variant corresponds 1:1 to a row of
/// the classification table in spec §4.2; `OrchestratorError` converts
/// these without adding information.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
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

    #[error("invalid id token")]
    InvalidIdToken,

    #[error("upstream transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            UpstreamError::Transport("upstream request timed out".to_string())
        } else {
            UpstreamError::Transport(e.to_string())
        }
    }
}

/// `{subject, remember, remember_for, acr, Context}` — the capitalized
/// `Context` field name is required by the upstream server's session-data
/// convention and must be preserved bit-exact.
#[derive(Debug, Serialize)]
struct AcceptLoginRequest<'a> {
    subject: &'a str,
    remember: bool,
    remember_for: i64,
    acr: &'a str,
    #[serde(rename = "Context")]
    context: &'a UserProfile,
}

#[derive(Debug, Deserialize)]
struct RedirectResponse {
    redirect_to: String,
}

/// Audience/scope pulled from the pending consent request, mirrored back
/// unchanged into the accept payload. `context` carries the user profile
/// forward from the login session, the way the upstream server echoes it
/// back on the consent request.
#[derive(Debug, Clone, Deserialize)]
pub struct ConsentDetails {
    #[serde(default)]
    pub requested_access_token_audience: Vec<String>,
    #[serde(default)]
    pub requested_scope: Vec<String>,
    pub context: UserProfile,
}

#[derive(Debug, Serialize)]
struct ConsentSession<'a> {
    id_token: &'a UserProfile,
}

#[derive(Debug, Serialize)]
struct AcceptConsentRequest<'a> {
    grant_access_token_audience: &'a [String],
    grant_scope: &'a [String],
    remember: bool,
    remember_for: i64,
    session: ConsentSession<'a>,
}

/// The grant-specific parameters for `POST /oauth2/token`. `client_id` and
/// `client_secret` are supplied separately and sent as HTTP Basic auth.
pub enum TokenGrant<'a> {
    AuthorizationCode {
        code: &'a str,
        redirect_uri: &'a str,
        code_verifier: &'a str,
    },
    RefreshToken {
        refresh_token: &'a str,
        redirect_uri: &'a str,
    },
    ClientCredentials {
        scope: &'a str,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    pub expires_in: i64,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Thin typed wrapper over HTTP calls to the OAuth2 authorization server.
/// Separated from the orchestrator behind a trait so the orchestrator can
/// be tested with in-memory fakes (`mocks::MockUpstreamClient`).
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    async fn accept_login(
        &self,
        login_challenge: &str,
        profile: &UserProfile,
    ) -> Result<String, UpstreamError>;

    async fn get_consent(&self, consent_challenge: &str) -> Result<ConsentDetails, UpstreamError>;

    async fn accept_consent(
        &self,
        consent_challenge: &str,
        details: &ConsentDetails,
        profile: &UserProfile,
    ) -> Result<String, UpstreamError>;

    async fn exchange_token(
        &self,
        grant: TokenGrant<'_>,
        client_id: &str,
        client_secret: &str,
    ) -> Result<TokenResponse, UpstreamError>;

    async fn introspect(&self, token: &str) -> Result<IntrospectResult, UpstreamError>;

    async fn revoke(
        &self,
        token: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Result<(), UpstreamError>;

    async fn jwks_key_exists(&self, kid: &str) -> Result<bool, UpstreamError>;
}

/// Production `UpstreamClient` talking to a real Hydra-compatible server.
pub struct HydraClient {
    http: reqwest::Client,
    /// Base URL for the admin API (login/consent accept, introspect).
    admin_base_url: String,
    /// Base URL for the public API (token, revoke, JWKS).
    public_base_url: String,
}

impl HydraClient {
    pub fn new(admin_base_url: impl Into<String>, public_base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(TOKEN_REQUEST_TIMEOUT_SECS))
                .build()
                .expect("reqwest client builds with static config"),
            admin_base_url: admin_base_url.into(),
            public_base_url: public_base_url.into(),
        }
    }
}

#[async_trait]
impl UpstreamClient for HydraClient {
    async fn accept_login(
        &self,
        login_challenge: &str,
        profile: &UserProfile,
    ) -> Result<String, UpstreamError> {
        let url = format!(
            "{}/oauth2/auth/requests/login/accept",
            self.admin_base_url
        );
        let response = self
            .http
            .put(url)
            .query(&[("login_challenge", login_challenge)])
            .json(&AcceptLoginRequest {
                subject: &profile.id.to_string(),
                remember: false,
                remember_for: 0,
                acr: "1",
                context: profile,
            })
            .send()
            .await?;

        let status = response.status();
        if status == 401 || status == 404 || status == 500 {
            return Err(UpstreamError::InvalidLoginChallenge);
        }
        if !status.is_success() {
            return Err(UpstreamError::InvalidLoginChallenge);
        }

        let body: RedirectResponse = response.json().await?;
        Ok(body.redirect_to)
    }

    async fn get_consent(&self, consent_challenge: &str) -> Result<ConsentDetails, UpstreamError> {
        let url = format!("{}/oauth2/auth/requests/consent", self.admin_base_url);
        let response = self
            .http
            .get(url)
            .query(&[("consent_challenge", consent_challenge)])
            .send()
            .await?;

        if response.status().as_u16() >= 300 {
            return Err(UpstreamError::InvalidConsentChallenge);
        }

        Ok(response.json().await?)
    }

    async fn accept_consent(
        &self,
        consent_challenge: &str,
        details: &ConsentDetails,
        profile: &UserProfile,
    ) -> Result<String, UpstreamError> {
        let url = format!(
            "{}/oauth2/auth/requests/consent/accept",
            self.admin_base_url
        );
        let response = self
            .http
            .put(url)
            .query(&[("consent_challenge", consent_challenge)])
            .json(&AcceptConsentRequest {
                grant_access_token_audience: &details.requested_access_token_audience,
                grant_scope: &details.requested_scope,
                remember: true,
                remember_for: 1,
                session: ConsentSession { id_token: profile },
            })
            .send()
            .await?;

        if response.status().as_u16() >= 300 {
            return Err(UpstreamError::InvalidConsentChallenge);
        }

        let body: RedirectResponse = response.json().await?;
        Ok(body.redirect_to)
    }

    async fn exchange_token(
        &self,
        grant: TokenGrant<'_>,
        client_id: &str,
        client_secret: &str,
    ) -> Result<TokenResponse, UpstreamError> {
        let url = format!("{}/oauth2/token", self.public_base_url);
        let mut form: Vec<(&str, &str)> = Vec::new();
        match &grant {
            TokenGrant::AuthorizationCode {
                code,
                redirect_uri,
                code_verifier,
            } => {
                form.push(("grant_type", "authorization_code"));
                form.push(("code", code));
                form.push(("redirect_uri", redirect_uri));
                form.push(("code_verifier", code_verifier));
            }
            TokenGrant::RefreshToken {
                refresh_token,
                redirect_uri,
            } => {
                form.push(("grant_type", "refresh_token"));
                form.push(("refresh_token", refresh_token));
                form.push(("redirect_uri", redirect_uri));
            }
            TokenGrant::ClientCredentials { scope } => {
                form.push(("grant_type", "client_credentials"));
                form.push(("scope", scope));
            }
        }

        let response = self
            .http
            .post(url)
            .basic_auth(client_id, Some(client_secret))
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if status == 400 {
            return Err(UpstreamError::BadExchange);
        }
        if status == 401 {
            return Err(UpstreamError::UnauthorisedExchange);
        }
        if status == 500 {
            return Err(UpstreamError::ExchangeFailed);
        }
        if !status.is_success() {
            return Err(UpstreamError::ExchangeFailed);
        }

        Ok(response.json().await?)
    }

    async fn introspect(&self, token: &str) -> Result<IntrospectResult, UpstreamError> {
        let url = format!("{}/oauth2/introspect", self.public_base_url);
        let response = self
            .http
            .post(url)
            .form(&[("token", token)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            // Table §4.2: 401 -> TokenExpired; >=400 classified the same.
            return Err(UpstreamError::TokenExpired);
        }

        Ok(response.json().await?)
    }

    async fn revoke(
        &self,
        token: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Result<(), UpstreamError> {
        let url = format!("{}/oauth2/revoke", self.public_base_url);
        let response = self
            .http
            .post(url)
            .basic_auth(client_id, Some(client_secret))
            .form(&[("token", token)])
            .send()
            .await?;

        let status = response.status();
        // Always read the body to completion regardless of outcome
        // (Open Question (a) in DESIGN.md).
        let body = response.text().await.unwrap_or_default();
        drop(body);

        if status == 200 {
            return Ok(());
        }
        if status == 400 {
            return Err(UpstreamError::BadExchange);
        }
        if status == 401 {
            return Err(UpstreamError::UnauthorisedExchange);
        }
        Err(UpstreamError::ExchangeFailed)
    }

    async fn jwks_key_exists(&self, kid: &str) -> Result<bool, UpstreamError> {
        // Hydra only exposes per-kid JWKS lookups on the admin API, not the
        // public one (examples/original_source/.../oauth2.go:837).
        let url = format!(
            "{}/keys/hydra.openid.id-token/{}",
            self.admin_base_url, kid
        );
        let response = self.http.get(url).send().await?;
        Ok(response.status().is_success())
    }
}
