//! Mock implementations for testing
//!
//! This module provides a queue-of-results fake for `UpstreamClient` so
//! orchestrator tests can exercise the state machine without a real Hydra
//! instance.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::model::{IntrospectResult, UserProfile};
use crate::upstream::{ConsentDetails, TokenGrant, TokenResponse, UpstreamClient, UpstreamError};

// ============================================================================
// MockUpstreamClient
// ============================================================================

/// A mock upstream client that returns pre-configured responses in order.
/// An empty queue yields a permissive default rather than panicking, so
/// tests only need to queue the responses they actually care about.
#[derive(Clone)]
pub struct MockUpstreamClient {
    login_redirects: Arc<Mutex<VecDeque<Result<String, UpstreamError>>>>,
    consent_details: Arc<Mutex<VecDeque<Result<ConsentDetails, UpstreamError>>>>,
    consent_redirects: Arc<Mutex<VecDeque<Result<String, UpstreamError>>>>,
    token_responses: Arc<Mutex<VecDeque<Result<TokenResponse, UpstreamError>>>>,
    introspect_results: Arc<Mutex<VecDeque<Result<IntrospectResult, UpstreamError>>>>,
    revoke_results: Arc<Mutex<VecDeque<Result<(), UpstreamError>>>>,
    jwks_results: Arc<Mutex<VecDeque<Result<bool, UpstreamError>>>>,
    introspect_calls: Arc<Mutex<usize>>,
    revoke_calls: Arc<Mutex<usize>>,
}

impl MockUpstreamClient {
    /// Create a mock upstream client with no queued responses.
    pub fn new() -> Self {
        Self {
            login_redirects: Arc::new(Mutex::new(VecDeque::new())),
            consent_details: Arc::new(Mutex::new(VecDeque::new())),
            consent_redirects: Arc::new(Mutex::new(VecDeque::new())),
            token_responses: Arc::new(Mutex::new(VecDeque::new())),
            introspect_results: Arc::new(Mutex::new(VecDeque::new())),
            revoke_results: Arc::new(Mutex::new(VecDeque::new())),
            jwks_results: Arc::new(Mutex::new(VecDeque::new())),
            introspect_calls: Arc::new(Mutex::new(0)),
            revoke_calls: Arc::new(Mutex::new(0)),
        }
    }

    pub fn queue_login_redirect(&self, redirect_to: impl Into<String>) {
        self.login_redirects
            .lock()
            .unwrap()
            .push_back(Ok(redirect_to.into()));
    }

    pub fn queue_consent_details(&self, details: ConsentDetails) {
        self.consent_details.lock().unwrap().push_back(Ok(details));
    }

    pub fn queue_consent_redirect(&self, redirect_to: impl Into<String>) {
        self.consent_redirects
            .lock()
            .unwrap()
            .push_back(Ok(redirect_to.into()));
    }

    pub fn queue_token_response(&self, response: TokenResponse) {
        self.token_responses.lock().unwrap().push_back(Ok(response));
    }

    pub fn queue_token_error(&self, error: UpstreamError) {
        self.token_responses.lock().unwrap().push_back(Err(error));
    }

    pub fn queue_introspect_result(&self, result: IntrospectResult) {
        self.introspect_results.lock().unwrap().push_back(Ok(result));
    }

    pub fn queue_introspect_error(&self, error: UpstreamError) {
        self.introspect_results.lock().unwrap().push_back(Err(error));
    }

    pub fn queue_revoke_error(&self, error: UpstreamError) {
        self.revoke_results.lock().unwrap().push_back(Err(error));
    }

    pub fn queue_jwks_result(&self, exists: bool) {
        self.jwks_results.lock().unwrap().push_back(Ok(exists));
    }

    /// Number of `introspect()` calls observed so far.
    pub fn introspect_call_count(&self) -> usize {
        *self.introspect_calls.lock().unwrap()
    }

    /// Number of `revoke()` calls observed so far.
    pub fn revoke_call_count(&self) -> usize {
        *self.revoke_calls.lock().unwrap()
    }
}

impl Default for MockUpstreamClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UpstreamClient for MockUpstreamClient {
    async fn accept_login(
        &self,
        _login_challenge: &str,
        _profile: &UserProfile,
    ) -> Result<String, UpstreamError> {
        self.login_redirects
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("https://login.example/redirect".to_string()))
    }

    async fn get_consent(&self, _consent_challenge: &str) -> Result<ConsentDetails, UpstreamError> {
        self.consent_details.lock().unwrap().pop_front().unwrap_or_else(|| {
            Ok(ConsentDetails {
                requested_access_token_audience: vec![],
                requested_scope: vec!["openid".to_string()],
                context: UserProfile {
                    id: uuid::Uuid::nil(),
                    email: "mock@example.com".to_string(),
                    name: "Mock User".to_string(),
                },
            })
        })
    }

    async fn accept_consent(
        &self,
        _consent_challenge: &str,
        _details: &ConsentDetails,
        _profile: &UserProfile,
    ) -> Result<String, UpstreamError> {
        self.consent_redirects
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("https://consent.example/redirect".to_string()))
    }

    async fn exchange_token(
        &self,
        _grant: TokenGrant<'_>,
        _client_id: &str,
        _client_secret: &str,
    ) -> Result<TokenResponse, UpstreamError> {
        self.token_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Ok(TokenResponse {
                    access_token: "mock-access-token".to_string(),
                    refresh_token: Some("mock-refresh-token".to_string()),
                    id_token: None,
                    expires_in: 3600,
                    scope: Some("openid".to_string()),
                    token_type: Some("bearer".to_string()),
                })
            })
    }

    async fn introspect(&self, _token: &str) -> Result<IntrospectResult, UpstreamError> {
        *self.introspect_calls.lock().unwrap() += 1;
        self.introspect_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Ok(IntrospectResult {
                    active: true,
                    sub: None,
                    aud: vec![],
                    exp: None,
                    iat: None,
                    iss: None,
                    nbf: None,
                    scope: None,
                    client_id: Some("web".to_string()),
                    token_type: None,
                    token_use: None,
                    username: None,
                    user_info: None,
                    is_rotated: false,
                    new_access_token: None,
                    new_access_token_expiry: None,
                })
            })
    }

    async fn revoke(
        &self,
        _token: &str,
        _client_id: &str,
        _client_secret: &str,
    ) -> Result<(), UpstreamError> {
        *self.revoke_calls.lock().unwrap() += 1;
        self.revoke_results.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }

    async fn jwks_key_exists(&self, _kid: &str) -> Result<bool, UpstreamError> {
        self.jwks_results.lock().unwrap().pop_front().unwrap_or(Ok(true))
    }
}

// ============================================================================
// Tests
// ============================================================================
