//! Self-service account pages: registration, email verification, and
//! profile/password changes.

use std::sync::Arc;

use askama::Template;
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
    Extension, Form,
};
use tracing::{error, info, warn};

use es4c_core::db::repository::{AccountRepository, SessionRepository};
use es4c_core::models::account::NewAccount;
use es4c_core::models::job::SyncJob;
use es4c_core::tokens::generate_verification_token;
use es4c_core::validation::{
    validate_email, validate_first_name, validate_last_name, validate_password,
    validate_password_match, validate_username, FieldErrors,
};

use crate::auth::{hash_password, redirect_with_cookie, start_session, CurrentUser};
use crate::csrf::CsrfToken;
use crate::mail::verification_mail;
use crate::{publish, render, AppState};

// -- Registration --

#[derive(Debug, Default, Clone, serde::Deserialize)]
pub struct RegistrationForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub password_1: String,
    #[serde(default)]
    pub password_2: String,
}

#[derive(Template)]
#[template(path = "register.html")]
struct RegisterTemplate {
    csrf_token: String,
    form: RegistrationForm,
    errors: FieldErrors,
    error: Option<String>,
}

/// Check the two password fields against the policy for `email`. The
/// confirmation is only compared once the first password is acceptable.
pub(crate) fn check_new_password(
    errors: &mut FieldErrors,
    password_1: &str,
    password_2: &str,
    email: &str,
) {
    match validate_password(password_1, email) {
        Ok(()) => errors.check("password_2", validate_password_match(password_1, password_2)),
        Err(e) => errors.add("password_1", e.to_string()),
    }
}

/// Field checks for a new account, including uniqueness.
pub(crate) async fn validate_registration(
    state: &AppState,
    form: &RegistrationForm,
) -> es4c_core::error::Result<FieldErrors> {
    let mut errors = FieldErrors::new();

    errors.check("username", validate_username(&form.username));
    if !errors.has("username")
        && state
            .repo
            .get_account_by_username(&form.username)
            .await?
            .is_some()
    {
        errors.add("username", "A user with that username already exists.");
    }

    errors.check(
        "email",
        validate_email(&form.email, &state.config.web.allowed_email_domains),
    );
    if !errors.has("email") && state.repo.get_account_by_email(&form.email).await?.is_some() {
        errors.add("email", "A user with that email already exists.");
    }

    errors.check("first_name", validate_first_name(&form.first_name));
    errors.check("last_name", validate_last_name(&form.last_name));

    // An invalid email does not take part in the containment check.
    let email = if errors.has("email") { "" } else { form.email.as_str() };
    check_new_password(&mut errors, &form.password_1, &form.password_2, email);
    Ok(errors)
}

fn register_form(
    csrf: &CsrfToken,
    form: RegistrationForm,
    errors: FieldErrors,
    error: Option<&str>,
) -> Response {
    render(&RegisterTemplate {
        csrf_token: csrf.0.clone(),
        form: RegistrationForm {
            password_1: String::new(),
            password_2: String::new(),
            ..form
        },
        errors,
        error: error.map(str::to_string),
    })
}

/// GET /register/
pub async fn register_page(
    Extension(csrf): Extension<CsrfToken>,
    user: Option<Extension<CurrentUser>>,
) -> Response {
    if user.is_some() {
        return Redirect::to("/").into_response();
    }
    register_form(&csrf, RegistrationForm::default(), FieldErrors::new(), None)
}

/// POST /register/
///
/// Saves the account unverified, mails the verification token, queues the
/// (disabled) directory account, and logs the new user in.
pub async fn register_submit(
    State(state): State<Arc<AppState>>,
    Extension(csrf): Extension<CsrfToken>,
    user: Option<Extension<CurrentUser>>,
    headers: HeaderMap,
    Form(form): Form<RegistrationForm>,
) -> Response {
    if user.is_some() {
        return Redirect::to("/").into_response();
    }

    let errors = match validate_registration(&state, &form).await {
        Ok(errors) => errors,
        Err(e) => {
            error!(error = %e, "registration lookup failed");
            return register_form(&csrf, form, FieldErrors::new(), Some("Internal error"));
        }
    };
    if !errors.is_empty() {
        return register_form(&csrf, form, errors, None);
    }

    let password_hash = match hash_password(&form.password_1) {
        Ok(h) => h,
        Err(e) => {
            error!(error = %e, "password hashing failed");
            return register_form(&csrf, form, FieldErrors::new(), Some("Internal error"));
        }
    };

    let account = match state
        .repo
        .create_account(&NewAccount {
            username: form.username.clone(),
            email: form.email.clone(),
            first_name: form.first_name.clone(),
            last_name: form.last_name.clone(),
            password_hash,
            verification_token: generate_verification_token(),
            is_verified: false,
            is_staff: false,
            is_superuser: false,
        })
        .await
    {
        Ok(account) => account,
        Err(e) => {
            error!(username = %form.username, error = %e, "failed to save account");
            return register_form(
                &csrf,
                form,
                FieldErrors::new(),
                Some("The account could not be created. Please try again."),
            );
        }
    };

    let sent = match verification_mail(&account, &state.config.es4c.host_fqdn) {
        Ok(mail) => state.mailer.send(&mail).await,
        Err(e) => Err(e),
    };
    if let Err(e) = sent {
        error!(username = %account.username, error = %e, "verification email failed, removing account");
        if let Err(e) = state.repo.delete_account(account.id).await {
            error!(username = %account.username, error = %e, "failed to remove unverifiable account");
        }
        return register_form(
            &csrf,
            form,
            FieldErrors::new(),
            Some("We could not send the verification email. Please try again later."),
        );
    }

    publish(
        &state,
        SyncJob::create_user(
            &account.username,
            &form.password_1,
            &account.first_name,
            &account.last_name,
        ),
    )
    .await;
    info!(username = %account.username, "account registered");

    match start_session(&state, &account, &headers).await {
        Ok(cookie) => redirect_with_cookie(cookie, "/verify-email/"),
        Err(e) => {
            warn!(error = %e, "failed to log in new account");
            Redirect::to("/login/").into_response()
        }
    }
}

// -- Email verification --

#[derive(Template)]
#[template(path = "verify/verify.html")]
struct VerifyTemplate {
    csrf_token: String,
    email: String,
}

#[derive(Template)]
#[template(path = "verify/successful.html")]
struct VerifiedTemplate;

#[derive(Template)]
#[template(path = "verify/invalid.html")]
struct InvalidTokenTemplate;

#[derive(Template)]
#[template(path = "verify/already_verified.html")]
struct AlreadyVerifiedTemplate;

#[derive(serde::Deserialize)]
pub struct VerifyForm {
    #[serde(default)]
    pub token: String,
}

/// GET /verify-email/
pub async fn verify_page(
    Extension(user): Extension<CurrentUser>,
    Extension(csrf): Extension<CsrfToken>,
) -> Response {
    if user.account.is_verified {
        return render(&AlreadyVerifiedTemplate);
    }
    render(&VerifyTemplate {
        csrf_token: csrf.0,
        email: user.account.email,
    })
}

/// POST /verify-email/
pub async fn verify_submit(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Form(form): Form<VerifyForm>,
) -> Response {
    verify(&state, &user, form.token.trim()).await
}

/// GET /verify-email/:token/
pub async fn verify_link(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(token): Path<String>,
) -> Response {
    verify(&state, &user, &token).await
}

async fn verify(state: &AppState, user: &CurrentUser, token: &str) -> Response {
    let account = &user.account;
    if account.is_verified {
        return render(&AlreadyVerifiedTemplate);
    }
    if token.is_empty() || token != account.verification_token {
        warn!(username = %account.username, "invalid verification token");
        return render(&InvalidTokenTemplate);
    }

    match state.repo.mark_verified(account.id).await {
        Ok(true) => {
            info!(username = %account.username, "email verified");
            publish(
                state,
                SyncJob::EnableAccount {
                    username: account.username.clone(),
                },
            )
            .await;
            render(&VerifiedTemplate)
        }
        // verified concurrently by another request
        Ok(false) => render(&AlreadyVerifiedTemplate),
        Err(e) => {
            error!(username = %account.username, error = %e, "failed to mark account verified");
            render(&InvalidTokenTemplate)
        }
    }
}

// -- Profile --

#[derive(Debug, Default, Clone, serde::Deserialize)]
pub struct ChangeUserForm {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

#[derive(Template)]
#[template(path = "change_user.html")]
struct ChangeUserTemplate {
    csrf_token: String,
    form: ChangeUserForm,
    errors: FieldErrors,
}

/// GET /change-user/
pub async fn change_user_page(
    Extension(user): Extension<CurrentUser>,
    Extension(csrf): Extension<CsrfToken>,
) -> Response {
    render(&ChangeUserTemplate {
        csrf_token: csrf.0,
        form: ChangeUserForm {
            first_name: user.account.first_name,
            last_name: user.account.last_name,
        },
        errors: FieldErrors::new(),
    })
}

/// POST /change-user/
pub async fn change_user_submit(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Extension(csrf): Extension<CsrfToken>,
    Form(form): Form<ChangeUserForm>,
) -> Response {
    let mut errors = FieldErrors::new();
    errors.check("first_name", validate_first_name(&form.first_name));
    errors.check("last_name", validate_last_name(&form.last_name));
    if !errors.is_empty() {
        return render(&ChangeUserTemplate {
            csrf_token: csrf.0,
            form,
            errors,
        });
    }

    let account = &user.account;
    if let Err(e) = state
        .repo
        .update_account_names(account.id, &form.first_name, &form.last_name)
        .await
    {
        error!(username = %account.username, error = %e, "failed to update names");
        errors.add("first_name", "Your details could not be saved. Please try again.");
        return render(&ChangeUserTemplate {
            csrf_token: csrf.0,
            form,
            errors,
        });
    }

    publish(
        &state,
        SyncJob::update_names(&account.username, &form.first_name, &form.last_name),
    )
    .await;
    Redirect::to("/?notice=details-updated").into_response()
}

// -- Password --

#[derive(Debug, Default, serde::Deserialize)]
pub struct ChangePasswordForm {
    #[serde(default)]
    pub password_1: String,
    #[serde(default)]
    pub password_2: String,
}

#[derive(Template)]
#[template(path = "change_password.html")]
struct ChangePasswordTemplate {
    csrf_token: String,
    errors: FieldErrors,
    error: Option<String>,
}

/// GET /change-password/
pub async fn change_password_page(Extension(csrf): Extension<CsrfToken>) -> Response {
    render(&ChangePasswordTemplate {
        csrf_token: csrf.0,
        errors: FieldErrors::new(),
        error: None,
    })
}

/// POST /change-password/
///
/// The current session stays valid; every other session of the account is
/// dropped.
pub async fn change_password_submit(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Extension(csrf): Extension<CsrfToken>,
    Form(form): Form<ChangePasswordForm>,
) -> Response {
    let account = &user.account;
    let failed = |errors: FieldErrors| {
        render(&ChangePasswordTemplate {
            csrf_token: csrf.0.clone(),
            errors,
            error: Some("Please correct the error below".to_string()),
        })
    };

    let mut errors = FieldErrors::new();
    check_new_password(&mut errors, &form.password_1, &form.password_2, &account.email);
    if !errors.is_empty() {
        return failed(errors);
    }

    let saved = match hash_password(&form.password_1) {
        Ok(hash) => state.repo.update_password_hash(account.id, &hash).await,
        Err(e) => Err(e),
    };
    if let Err(e) = saved {
        error!(username = %account.username, error = %e, "failed to save password");
        return failed(FieldErrors::new());
    }

    match state
        .repo
        .delete_other_sessions(account.id, &user.session_token)
        .await
    {
        Ok(dropped) => info!(username = %account.username, dropped, "password changed"),
        Err(e) => warn!(username = %account.username, error = %e, "failed to drop other sessions"),
    }

    publish(
        &state,
        SyncJob::UpdateUserPassword {
            username: account.username.clone(),
            password: form.password_1.clone(),
        },
    )
    .await;
    Redirect::to("/?notice=password-changed").into_response()
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use es4c_core::db::repository::{AccountRepository, SessionRepository};

    use crate::auth::verify_password;
    use crate::testing::*;

    use super::*;

    fn registration<'a>(username: &'a str, email: &'a str) -> Vec<(&'a str, &'a str)> {
        vec![
            ("username", username),
            ("email", email),
            ("first_name", "José"),
            ("last_name", "Ñúñez"),
            ("password_1", PASSWORD),
            ("password_2", PASSWORD),
        ]
    }

    #[tokio::test]
    async fn register_creates_account_mails_token_and_queues_user() {
        let app = TestApp::new().await;
        let response = app
            .post("/register/", None, &registration("jnunez", "jnunez@example.edu"))
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response).as_deref(), Some("/verify-email/"));
        assert!(session_cookie(&response).is_some());

        let account = app
            .state
            .repo
            .get_account_by_username("jnunez")
            .await
            .unwrap()
            .unwrap();
        assert!(!account.is_verified);
        assert_eq!(account.verification_token.len(), 8);
        assert!(verify_password(PASSWORD, &account.password_hash));

        let sent = app.mailer.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "jnunez@example.edu");
        assert!(sent[0].html_body.contains(&account.verification_token));

        assert_eq!(
            app.jobs(),
            vec![SyncJob::create_user("jnunez", PASSWORD, "José", "Ñúñez")]
        );
    }

    #[tokio::test]
    async fn register_rejects_foreign_domain_and_weak_password() {
        let app = TestApp::new().await;
        let mut fields = registration("jdoe", "jdoe@elsewhere.com");
        fields[4] = ("password_1", "short");
        let response = app.post("/register/", None, &fields).await;
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("Email domain must be one of the following: example.edu"));
        assert!(html.contains("Password must be at least 10 characters long."));
        assert!(app.jobs().is_empty());
        assert!(app.mailer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn register_rejects_password_containing_email_parts() {
        let app = TestApp::new().await;
        let mut fields = registration("jdoe", "jdoe@example.edu");
        fields[4] = ("password_1", "Xjdoe#12345");
        fields[5] = ("password_2", "Xjdoe#12345");
        let html = body_text(app.post("/register/", None, &fields).await).await;
        assert!(html.contains("Password must not contain email or username."));
    }

    #[tokio::test]
    async fn register_rejects_mismatched_passwords() {
        let app = TestApp::new().await;
        let mut fields = registration("jdoe", "jdoe@example.edu");
        fields[5] = ("password_2", "Different#Pass42");
        let html = body_text(app.post("/register/", None, &fields).await).await;
        assert!(html.contains("Passwords do not match."));
        assert!(app
            .state
            .repo
            .get_account_by_username("jdoe")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn register_rejects_taken_username() {
        let app = TestApp::new().await;
        app.account("jdoe", false).await;
        let html = body_text(
            app.post("/register/", None, &registration("jdoe", "other@example.edu"))
                .await,
        )
        .await;
        assert!(html.contains("A user with that username already exists."));
        assert!(app.jobs().is_empty());
    }

    #[tokio::test]
    async fn register_rejects_names_that_fold_onto_an_existing_account() {
        let app = TestApp::new().await;
        let response = app
            .post("/register/", None, &registration("jdoe", "jdoe@example.edu"))
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let html = body_text(
            app.post("/register/", None, &registration("JDoe", "jdoe2@example.edu"))
                .await,
        )
        .await;
        assert!(html.contains("A user with that username already exists."));

        let html = body_text(
            app.post("/register/", None, &registration("jdoé", "jdoe3@example.edu"))
                .await,
        )
        .await;
        assert!(html.contains("Username may only contain ASCII"));

        assert_eq!(app.state.repo.list_accounts().await.unwrap().len(), 1);
        assert_eq!(
            app.jobs(),
            vec![SyncJob::create_user("jdoe", PASSWORD, "José", "Ñúñez")]
        );
    }

    #[tokio::test]
    async fn register_removes_account_when_mail_fails() {
        let app = TestApp::new().await;
        *app.mailer.fail.lock().unwrap() = true;
        let response = app
            .post("/register/", None, &registration("jdoe", "jdoe@example.edu"))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response)
            .await
            .contains("We could not send the verification email"));
        assert!(app
            .state
            .repo
            .get_account_by_username("jdoe")
            .await
            .unwrap()
            .is_none());
        assert!(app.jobs().is_empty());
    }

    #[tokio::test]
    async fn register_redirects_logged_in_users() {
        let app = TestApp::new().await;
        let (_, session) = app.account("jdoe", false).await;
        let response = app.get("/register/", Some(&session)).await;
        assert_eq!(location(&response).as_deref(), Some("/"));
    }

    #[tokio::test]
    async fn verify_link_enables_account_once() {
        let app = TestApp::new().await;
        let (account, session) = app.account("jdoe", false).await;
        let uri = format!("/verify-email/{}/", account.verification_token);

        let html = body_text(app.get(&uri, Some(&session)).await).await;
        assert!(html.contains("Email verified"));
        assert!(
            app.state
                .repo
                .get_account(account.id)
                .await
                .unwrap()
                .unwrap()
                .is_verified
        );

        let html = body_text(app.get(&uri, Some(&session)).await).await;
        assert!(html.contains("already verified"));
        assert_eq!(
            app.jobs(),
            vec![SyncJob::EnableAccount {
                username: "jdoe".into()
            }]
        );
    }

    #[tokio::test]
    async fn verify_form_accepts_token_field() {
        let app = TestApp::new().await;
        let (account, session) = app.account("jdoe", false).await;
        let html = body_text(
            app.post(
                "/verify-email/",
                Some(&session),
                &[("token", account.verification_token.as_str())],
            )
            .await,
        )
        .await;
        assert!(html.contains("Email verified"));
        assert_eq!(app.jobs().len(), 1);
    }

    #[tokio::test]
    async fn wrong_token_changes_nothing() {
        let app = TestApp::new().await;
        let (account, session) = app.account("jdoe", false).await;
        let html = body_text(app.get("/verify-email/not-it/", Some(&session)).await).await;
        assert!(html.contains("Invalid verification token"));
        assert!(
            !app.state
                .repo
                .get_account(account.id)
                .await
                .unwrap()
                .unwrap()
                .is_verified
        );
        assert!(app.jobs().is_empty());
    }

    #[tokio::test]
    async fn verify_requires_login() {
        let app = TestApp::new().await;
        let response = app.get("/verify-email/12345678/", None).await;
        assert_eq!(location(&response).as_deref(), Some("/login/"));
    }

    #[tokio::test]
    async fn change_user_saves_and_queues_attribute_update() {
        let app = TestApp::new().await;
        let (account, session) = app.account("jdoe", false).await;
        let response = app
            .post(
                "/change-user/",
                Some(&session),
                &[("first_name", "Jane"), ("last_name", "Roe")],
            )
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let saved = app.state.repo.get_account(account.id).await.unwrap().unwrap();
        assert_eq!(saved.full_name(), "Jane Roe");
        assert_eq!(app.jobs(), vec![SyncJob::update_names("jdoe", "Jane", "Roe")]);
    }

    #[tokio::test]
    async fn change_user_requires_names() {
        let app = TestApp::new().await;
        let (_, session) = app.account("jdoe", false).await;
        let response = app
            .post(
                "/change-user/",
                Some(&session),
                &[("first_name", ""), ("last_name", "Roe")],
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(app.jobs().is_empty());
    }

    #[tokio::test]
    async fn change_password_updates_hash_and_drops_other_sessions() {
        let app = TestApp::new().await;
        let (account, session) = app.account("jdoe", false).await;
        let other = crate::auth::start_session(&app.state, &account, &HeaderMap::new())
            .await
            .unwrap();
        let other = other
            .strip_prefix("es4c_session=")
            .and_then(|c| c.split(';').next())
            .unwrap()
            .to_string();

        let response = app
            .post(
                "/change-password/",
                Some(&session),
                &[("password_1", "Brand#New123"), ("password_2", "Brand#New123")],
            )
            .await;
        assert_eq!(location(&response).as_deref(), Some("/?notice=password-changed"));

        let saved = app.state.repo.get_account(account.id).await.unwrap().unwrap();
        assert!(verify_password("Brand#New123", &saved.password_hash));
        assert!(app.state.repo.get_session(&session).await.unwrap().is_some());
        assert!(app.state.repo.get_session(&other).await.unwrap().is_none());
        assert_eq!(
            app.jobs(),
            vec![SyncJob::UpdateUserPassword {
                username: "jdoe".into(),
                password: "Brand#New123".into()
            }]
        );
    }

    #[tokio::test]
    async fn change_password_checks_policy_against_account_email() {
        let app = TestApp::new().await;
        let (_, session) = app.account("jdoe", false).await;
        let html = body_text(
            app.post(
                "/change-password/",
                Some(&session),
                &[("password_1", "Xexample.edu1"), ("password_2", "Xexample.edu1")],
            )
            .await,
        )
        .await;
        assert!(html.contains("Password must not contain email or username."));
        assert!(app.jobs().is_empty());
    }

    #[tokio::test]
    async fn login_and_logout_round() {
        let app = TestApp::new().await;
        app.account("jdoe", false).await;

        let response = app
            .post("/login/", None, &[("username", "jdoe"), ("password", PASSWORD)])
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let session = session_cookie(&response).unwrap();
        assert_eq!(app.get("/", Some(&session)).await.status(), StatusCode::OK);

        let response = app.get("/logout/", Some(&session)).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert!(app.state.repo.get_session(&session).await.unwrap().is_some());

        let response = app.post("/logout/", Some(&session), &[]).await;
        assert_eq!(location(&response).as_deref(), Some("/"));
        assert!(app.state.repo.get_session(&session).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn login_rejects_bad_password_and_inactive_accounts() {
        let app = TestApp::new().await;
        let (account, _) = app.account("jdoe", false).await;

        let html = body_text(
            app.post("/login/", None, &[("username", "jdoe"), ("password", "nope")])
                .await,
        )
        .await;
        assert!(html.contains("Invalid username or password"));

        app.state
            .repo
            .update_account_flags(
                account.id,
                es4c_core::db::repository::AccountFlags {
                    is_verified: false,
                    is_staff: false,
                    is_superuser: false,
                    is_active: false,
                },
            )
            .await
            .unwrap();
        let response = app
            .post("/login/", None, &[("username", "jdoe"), ("password", PASSWORD)])
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(session_cookie(&response).is_none());
    }

    #[tokio::test]
    async fn expired_session_redirects_to_login() {
        use chrono::{Duration, Utc};
        use es4c_core::models::session::WebSession;

        let app = TestApp::new().await;
        let (account, _) = app.account("jdoe", false).await;
        let now = Utc::now();
        app.state
            .repo
            .create_session(&WebSession {
                token: "stale".into(),
                account_id: account.id,
                created_at: now - Duration::hours(48),
                expires_at: now - Duration::hours(24),
                ip_address: None,
            })
            .await
            .unwrap();

        let response = app.get("/", Some("stale")).await;
        assert_eq!(location(&response).as_deref(), Some("/login/"));
        assert!(app.state.repo.get_session("stale").await.unwrap().is_none());
    }
}
