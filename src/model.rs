//! Shared data types for the orchestration engine.
//!
//! These mirror the wire format of the upstream Hydra-compatible
//! authorization server and the cache encoding used between requests; field
//! names are bit-exact where interop matters (see `upstream` and
//! `orchestrator`).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity payload carried through login/consent into the upstream
/// server's session, and decoded back out of the ID token on introspect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub name: String,
}

/// Access + refresh + optional ID token, bound to a locally minted
/// `session_id`. Persisted per session in the cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenBundle {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    pub expires_in: i64,
    /// RFC1123 formatted expiry, e.g. `Mon, 02 Jan 2006 15:04:05 MST`.
    pub expires_at: String,
    pub session_id: String,
}

/// Short-lived client-credentials token issued for out-of-band email
/// flows. Keyed in the cache by its own `access_token`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientTokenBundle {
    pub access_token: String,
    pub expires_in: i64,
    pub expires_at: String,
    pub scope: String,
    pub token_type: String,
    pub email: String,
}

/// One entry per email, stored as a hash field under a single well-known
/// hash key. `expires_at` is application-maintained, not TTL-based: the
/// reset policy is "reset on expiry to 1, otherwise increment up to N".
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EmailRequestCount {
    pub count: u32,
    pub expires_at: i64,
}

/// Claims carried by the ID token. Parsed without signature verification;
/// only the `kid` header is used downstream (see `upstream::jwks_key_exists`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdTokenClaims {
    pub sub: String,
    #[serde(rename = "user_profile")]
    pub user_profile: UserProfile,
    #[serde(default)]
    pub at_hash: Option<String>,
}

/// Which side of the bundle a caller is introspecting. The orchestrator's
/// `IntrospectToken` state machine is called with `AccessToken` initially
/// and recurses into `RefreshToken` on a dead access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    AccessToken,
    RefreshToken,
}

/// Superset of the upstream introspect response. The last three fields are
/// set only when transparent rotation occurred.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntrospectResult {
    pub active: bool,
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub aud: Vec<String>,
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default)]
    pub iss: Option<String>,
    #[serde(default)]
    pub nbf: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub token_use: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub user_info: Option<IdTokenClaims>,
    #[serde(default)]
    pub is_rotated: bool,
    #[serde(default)]
    pub new_access_token: Option<String>,
    #[serde(default)]
    pub new_access_token_expiry: Option<i64>,
}

/// Result of the verification-token introspection path
/// (`IntrospectResponse` in the distilled spec).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntrospectVerificationResult {
    pub active: bool,
    pub email: String,
    pub client_id: Option<String>,
}
