//! Login sessions, password hashing, and the login/logout handlers.

use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use askama::Template;
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
    Extension, Form,
};
use chrono::{Duration, Utc};
use tracing::{info, warn};

use es4c_core::db::repository::{AccountRepository, SessionRepository};
use es4c_core::error::{Es4cError, Result};
use es4c_core::http::client_ip;
use es4c_core::models::account::Account;
use es4c_core::models::session::WebSession;
use es4c_core::tokens::generate_opaque_token;

use crate::csrf::CsrfToken;
use crate::{cookie_value, render, AppState};

pub(crate) const SESSION_COOKIE_NAME: &str = "es4c_session";

/// Paths reachable without logging in.
const PUBLIC_PATHS: &[&str] = &["/health", "/login/", "/register/"];

/// Staff-only paths.
const ADMIN_PREFIX: &str = "/admin/";

fn is_public_path(path: &str) -> bool {
    PUBLIC_PATHS.iter().any(|p| path.starts_with(p))
}

/// The logged-in account, inserted into request extensions by [`auth_middleware`].
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub account: Account,
    pub session_token: String,
}

/// Hash a password using argon2.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = argon2::password_hash::SaltString::generate(&mut rand::thread_rng());
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Es4cError::Auth(format!("password hashing failed: {e}")))
}

/// Verify a password against a stored hash.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

fn request_ip(headers: &HeaderMap) -> Option<String> {
    client_ip(
        headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()),
        headers.get("x-real-ip").and_then(|v| v.to_str().ok()),
    )
}

/// Resolve the session cookie into a live session and an active account.
/// Expired sessions and sessions of inactive accounts are deleted.
async fn current_user(state: &AppState, headers: &HeaderMap) -> Option<CurrentUser> {
    let token = cookie_value(headers, SESSION_COOKIE_NAME)?;
    let session = state.repo.get_session(&token).await.ok().flatten()?;
    if session.is_expired(Utc::now()) {
        let _ = state.repo.delete_session(&token).await;
        return None;
    }
    match state.repo.get_account(session.account_id).await {
        Ok(Some(account)) if account.is_active => Some(CurrentUser {
            account,
            session_token: token,
        }),
        Ok(_) => {
            let _ = state.repo.delete_session(&token).await;
            None
        }
        Err(e) => {
            warn!(error = %e, "failed to load session account");
            None
        }
    }
}

/// Authentication middleware.
///
/// Public paths pass through (with the user attached when logged in), other
/// paths redirect anonymous visitors to the login page, and `/admin/` pages
/// answer 403 for accounts without staff rights.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let path = req.uri().path().to_string();
    let user = current_user(&state, req.headers()).await;

    match user {
        Some(user) => {
            if path.starts_with(ADMIN_PREFIX) && !user.account.can_administer() {
                warn!(username = %user.account.username, path = %path, "admin page refused");
                return (StatusCode::FORBIDDEN, "Forbidden").into_response();
            }
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        None if is_public_path(&path) => next.run(req).await,
        None => Redirect::to("/login/").into_response(),
    }
}

/// Start a session for `account` and build its cookie.
pub(crate) async fn start_session(
    state: &AppState,
    account: &Account,
    headers: &HeaderMap,
) -> Result<String> {
    let now = Utc::now();
    let session = WebSession {
        token: generate_opaque_token(),
        account_id: account.id,
        created_at: now,
        expires_at: now + Duration::hours(state.config.web.session_hours),
        ip_address: request_ip(headers),
    };
    state.repo.create_session(&session).await?;
    Ok(format!(
        "{SESSION_COOKIE_NAME}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        session.token,
        state.config.web.session_hours * 3600
    ))
}

/// Redirect to `location`, setting the session cookie.
pub(crate) fn redirect_with_cookie(cookie: String, location: &str) -> Response {
    (
        StatusCode::SEE_OTHER,
        [
            (header::SET_COOKIE, cookie),
            (header::LOCATION, location.to_string()),
        ],
    )
        .into_response()
}

// -- Templates --

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub csrf_token: String,
    pub username: String,
    pub error: Option<String>,
}

#[derive(serde::Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

// -- Handlers --

/// GET /login/
pub async fn login_page(
    Extension(csrf): Extension<CsrfToken>,
    user: Option<Extension<CurrentUser>>,
) -> Response {
    if user.is_some() {
        return Redirect::to("/").into_response();
    }
    render(&LoginTemplate {
        csrf_token: csrf.0,
        username: String::new(),
        error: None,
    })
}

/// POST /login/
pub async fn login_submit(
    State(state): State<Arc<AppState>>,
    Extension(csrf): Extension<CsrfToken>,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> Response {
    let failed = |message: &str| {
        render(&LoginTemplate {
            csrf_token: csrf.0.clone(),
            username: form.username.clone(),
            error: Some(message.to_string()),
        })
    };

    let account = match state.repo.get_account_by_username(&form.username).await {
        Ok(account) => account,
        Err(e) => {
            warn!(error = %e, "account lookup failed during login");
            return failed("Internal error");
        }
    };

    let account = match account {
        Some(a) if a.is_active && verify_password(&form.password, &a.password_hash) => a,
        _ => {
            warn!(username = %form.username, ip = ?request_ip(&headers), "failed login attempt");
            return failed("Invalid username or password");
        }
    };

    match start_session(&state, &account, &headers).await {
        Ok(cookie) => {
            info!(username = %account.username, "user logged in");
            redirect_with_cookie(cookie, "/")
        }
        Err(e) => {
            warn!(error = %e, "failed to create session");
            failed("Internal error")
        }
    }
}

/// POST /logout/
pub async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Response {
    if let Err(e) = state.repo.delete_session(&user.session_token).await {
        warn!(error = %e, "failed to delete session");
    }
    info!(username = %user.account.username, "user logged out");

    let cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    redirect_with_cookie(cookie, "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_password() {
        let hash = hash_password("Correct#Horse9").unwrap();
        assert!(verify_password("Correct#Horse9", &hash));
        assert!(!verify_password("wrong-password", &hash));
    }

    #[test]
    fn verify_password_with_invalid_hash() {
        assert!(!verify_password("password", "not-a-valid-hash"));
    }

    #[test]
    fn public_paths() {
        assert!(is_public_path("/health"));
        assert!(is_public_path("/login/"));
        assert!(is_public_path("/register/"));
        assert!(!is_public_path("/"));
        assert!(!is_public_path("/verify-email/"));
        assert!(!is_public_path("/admin/"));
    }

    #[test]
    fn request_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.9, 10.0.0.1".parse().unwrap());
        headers.insert("x-real-ip", "10.0.0.2".parse().unwrap());
        assert_eq!(request_ip(&headers), Some("203.0.113.9".to_string()));
    }
}
