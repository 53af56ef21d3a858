//! ES4C web front end: self-service registration, email verification, and
//! account management, plus a small staff-only admin area.
//!
//! Directory changes are never made here. Every handler that changes an
//! account publishes a job for the directory workers after the local write.

use std::sync::Arc;

use askama::Template;
use axum::{
    extract::Query,
    http::{header, HeaderMap, StatusCode},
    middleware,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Extension, Router,
};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use es4c_core::config::Es4cConfig;
use es4c_core::db::sqlite::SqliteRepository;
use es4c_core::models::job::SyncJob;
use es4c_queue::JobPublisher;

pub mod account;
pub mod admin;
pub mod auth;
pub mod csrf;
pub mod mail;

use auth::CurrentUser;
use mail::Mailer;

/// Shared application state for all routes.
pub struct AppState {
    pub repo: SqliteRepository,
    pub publisher: Arc<dyn JobPublisher>,
    pub mailer: Arc<dyn Mailer>,
    pub config: Es4cConfig,
}

/// Build the router with all routes and middleware.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/", get(index))
        .route("/login/", get(auth::login_page).post(auth::login_submit))
        .route("/logout/", post(auth::logout))
        .route(
            "/register/",
            get(account::register_page).post(account::register_submit),
        )
        .route(
            "/verify-email/",
            get(account::verify_page).post(account::verify_submit),
        )
        .route("/verify-email/:token/", get(account::verify_link))
        .route(
            "/change-user/",
            get(account::change_user_page).post(account::change_user_submit),
        )
        .route(
            "/change-password/",
            get(account::change_password_page).post(account::change_password_submit),
        )
        .route("/admin/", get(admin::list_accounts))
        .route(
            "/admin/new/",
            get(admin::new_account_page).post(admin::create_account),
        )
        .route(
            "/admin/:id/",
            get(admin::edit_account_page).post(admin::update_account),
        )
        .route("/admin/:id/delete/", post(admin::delete_account))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ))
        .layer(middleware::from_fn(csrf::csrf_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Render a template, answering 500 when rendering fails.
pub(crate) fn render<T: Template>(template: &T) -> Response {
    match template.render() {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!(error = %e, "template rendering failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
        }
    }
}

/// Value of the cookie `name` from the request headers.
pub(crate) fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .map(str::trim)
        .find_map(|c| c.strip_prefix(prefix.as_str()))
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Publish a directory job. The local change is already committed, so a
/// failure here is logged and not undone.
pub(crate) async fn publish(state: &AppState, job: SyncJob) {
    let task = job.kind();
    let username = job.username().to_string();
    match state.publisher.enqueue(job).await {
        Ok(id) => info!(job_id = %id, task = %task, username = %username, "directory job published"),
        Err(e) => error!(task = %task, username = %username, error = %e, "failed to publish directory job"),
    }
}

async fn health() -> &'static str {
    "ok"
}

#[derive(serde::Deserialize, Default)]
struct IndexQuery {
    #[serde(default)]
    notice: String,
}

fn notice_text(key: &str) -> Option<&'static str> {
    match key {
        "password-changed" => Some("Password changed successfully"),
        "details-updated" => Some("Your details were updated"),
        _ => None,
    }
}

#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate {
    csrf_token: String,
    username: String,
    full_name: String,
    email: String,
    is_verified: bool,
    can_administer: bool,
    notice: Option<String>,
}

async fn index(
    Extension(user): Extension<CurrentUser>,
    Extension(csrf): Extension<csrf::CsrfToken>,
    Query(query): Query<IndexQuery>,
) -> Response {
    let account = &user.account;
    render(&IndexTemplate {
        csrf_token: csrf.0,
        username: account.username.clone(),
        full_name: account.full_name(),
        email: account.email.clone(),
        is_verified: account.is_verified,
        can_administer: account.can_administer(),
        notice: notice_text(&query.notice).map(str::to_string),
    })
}
