//! Authentication Gate: axum middleware that authenticates inbound requests
//! against the orchestrator instead of verifying tokens locally.
//!
//! Header/cookie precedence and the cookie regex are bit-exact with
//! `examples/original_source/service-utils/middlewares/authentication/authmiddleware.go`
//! (see DESIGN.md); re-expressed as an axum `from_fn_with_state` layer the
//! way `server::auth_middleware` does for its own provider.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use regex::Regex;

use crate::model::{TokenType, UserProfile};
use crate::orchestrator::{parse_user_id, TokenOrchestrator};

const SESSION_HEADER: &str = "session";
const BEARER_PREFIX: &str = "Bearer ";

fn unauthorized(message: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(serde_json::json!({ "message": message }))).into_response()
}

/// Extracted from either the `Authorization`/`Session` header pair or the
/// `Cookie` header; headers take priority when both are present.
struct Credentials {
    token: String,
    session_id: String,
}

fn credentials_from_headers<B>(request: &Request<B>) -> Result<Option<Credentials>, Response> {
    let auth_header = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    if let Some(auth_header) = auth_header {
        let token = auth_header.strip_prefix(BEARER_PREFIX).map(str::to_string);
        let session_id = request
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        return match (token, session_id) {
            (Some(token), Some(session_id)) if !session_id.is_empty() => {
                Ok(Some(Credentials { token, session_id }))
            }
            _ => Err(unauthorized("missing/invalid authentication headers")),
        };
    }

    Ok(None)
}

fn credentials_from_cookies<B>(request: &Request<B>) -> Option<Credentials> {
    let cookie_header = request
        .headers()
        .get(axum::http::header::COOKIE)
        .and_then(|v| v.to_str().ok())?;

    let pair = Regex::new(r"\w+=(.+)").expect("static pattern is valid");
    let mut token = None;
    let mut session_id = None;

    for cookie in cookie_header.split("; ") {
        let Some(captures) = pair.captures(cookie) else {
            continue;
        };
        let value = captures.get(1).map(|m| m.as_str().to_string());
        if cookie.starts_with("access_token") {
            token = value;
        } else if cookie.starts_with("session") {
            session_id = cookie
                .strip_prefix("session=")
                .map(str::to_string)
                .or(value);
        }
    }

    match (token, session_id) {
        (Some(token), Some(session_id)) => Some(Credentials { token, session_id }),
        _ => None,
    }
}

/// Axum middleware: authenticates via the orchestrator's `IntrospectToken`
/// and, on transparent rotation, sets the refreshed `access_token` cookie.
/// Never mutates the `session` cookie.
pub async fn auth_gate(
    State(orchestrator): State<Arc<TokenOrchestrator>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let credentials = match credentials_from_headers(&request) {
        Ok(Some(creds)) => creds,
        Ok(None) => match credentials_from_cookies(&request) {
            Some(creds) => creds,
            None => return unauthorized("missing/invalid authentication headers"),
        },
        Err(response) => return response,
    };

    let result = orchestrator
        .introspect_token(&credentials.token, &credentials.session_id, TokenType::AccessToken)
        .await;

    let result = match result {
        Ok(result) => result,
        Err(_) => return unauthorized("missing/invalid authentication headers"),
    };

    let Some(claims) = result.user_info else {
        return unauthorized("missing user profile");
    };

    let user_id = match parse_user_id(&claims) {
        Ok(id) => id,
        Err(_) => return unauthorized("missing userID"),
    };

    let profile = UserProfile {
        id: user_id,
        email: claims.user_profile.email,
        name: claims.user_profile.name,
    };

    request.extensions_mut().insert(profile);

    let mut response = next.run(request).await;

    if result.is_rotated {
        if let (Some(new_access_token), Some(expiry)) =
            (result.new_access_token, result.new_access_token_expiry)
        {
            let cookie = format!("access_token={new_access_token}; Path=/; Max-Age={expiry}");
            if let Ok(value) = HeaderValue::from_str(&cookie) {
                response.headers_mut().append(axum::http::header::SET_COOKIE, value);
            }
        }
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request as HttpRequest;

    #[test]
    fn cookie_parsing_prefers_access_token_and_session_prefixes() {
        let request = HttpRequest::builder()
            .header("cookie", "access_token=abc123; session=sess-1")
            .body(Body::empty())
            .unwrap();

        let creds = credentials_from_cookies(&request).unwrap();
        assert_eq!(creds.token, "abc123");
        assert_eq!(creds.session_id, "sess-1");
    }

    #[test]
    fn missing_session_header_is_rejected_even_with_bearer_token() {
        let request = HttpRequest::builder()
            .header("authorization", "Bearer abc123")
            .body(Body::empty())
            .unwrap();

        let result = credentials_from_headers(&request);
        assert!(result.is_err());
    }

    #[test]
    fn header_pair_is_extracted_when_both_present() {
        let request = HttpRequest::builder()
            .header("authorization", "Bearer abc123")
            .header("session", "sess-1")
            .body(Body::empty())
            .unwrap();

        let creds = credentials_from_headers(&request).unwrap().unwrap();
        assert_eq!(creds.token, "abc123");
        assert_eq!(creds.session_id, "sess-1");
    }
}
