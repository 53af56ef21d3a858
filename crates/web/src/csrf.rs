//! CSRF protection using a double-submit cookie.
//!
//! Every response carries an `es4c_csrf` cookie. Forms echo its value in a
//! hidden `csrf_token` field (scripts may use the `X-CSRF-Token` header
//! instead); a POST whose submitted token does not match the cookie is
//! rejected with 403.

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderValue, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use es4c_core::tokens::generate_opaque_token;
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::cookie_value;

const CSRF_COOKIE_NAME: &str = "es4c_csrf";
const CSRF_HEADER_NAME: &str = "x-csrf-token";
const CSRF_FORM_FIELD: &str = "csrf_token";
const MAX_FORM_BYTES: usize = 64 * 1024;

/// The token of the current request, for embedding in rendered forms.
#[derive(Debug, Clone)]
pub struct CsrfToken(pub String);

/// Hash a CSRF token for comparison (prevents timing attacks).
fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn tokens_match(cookie: &str, submitted: &str) -> bool {
    hash_token(cookie) == hash_token(submitted)
}

/// Paths that skip CSRF validation.
const CSRF_EXEMPT_PREFIXES: &[&str] = &["/health"];

fn is_csrf_exempt(path: &str) -> bool {
    CSRF_EXEMPT_PREFIXES.iter().any(|p| path.starts_with(p))
}

/// Pull `csrf_token` out of a urlencoded form body.
fn form_token(body: &Bytes) -> Option<String> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(body).ok()?;
    pairs
        .into_iter()
        .find(|(name, _)| name == CSRF_FORM_FIELD)
        .map(|(_, value)| value)
}

fn reject(reason: &'static str) -> Response {
    (StatusCode::FORBIDDEN, reason).into_response()
}

/// CSRF middleware.
///
/// Makes the request's token available to handlers as a [`CsrfToken`]
/// extension, validates POST requests, and issues the cookie when the
/// client does not have one yet.
pub async fn csrf_middleware(req: Request<Body>, next: Next) -> Response {
    let path = req.uri().path().to_string();
    if is_csrf_exempt(&path) {
        return next.run(req).await;
    }

    let cookie_token = cookie_value(req.headers(), CSRF_COOKIE_NAME);
    let mut req = req;

    if req.method() == Method::POST {
        let Some(cookie) = cookie_token.clone() else {
            warn!(path = %path, "CSRF cookie missing");
            return reject("CSRF token missing");
        };
        let header_token = req
            .headers()
            .get(CSRF_HEADER_NAME)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let (parts, body) = req.into_parts();
        let bytes = match axum::body::to_bytes(body, MAX_FORM_BYTES).await {
            Ok(b) => b,
            Err(_) => return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response(),
        };
        let submitted = header_token.or_else(|| form_token(&bytes));
        match submitted {
            Some(submitted) if tokens_match(&cookie, &submitted) => {}
            Some(_) => {
                warn!(path = %path, "CSRF token mismatch");
                return reject("CSRF token mismatch");
            }
            None => {
                warn!(path = %path, "CSRF token not submitted");
                return reject("CSRF token missing");
            }
        }
        req = Request::from_parts(parts, Body::from(bytes));
    }

    let (token, issued) = match cookie_token {
        Some(token) => (token, false),
        None => (generate_opaque_token(), true),
    };
    req.extensions_mut().insert(CsrfToken(token.clone()));

    let mut response = next.run(req).await;
    if issued {
        let cookie = format!("{CSRF_COOKIE_NAME}={token}; Path=/; SameSite=Lax; Max-Age=86400");
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }
    response
}
