//! Staff-only account administration.
//!
//! Every change is mirrored to the directory through a job, the same way
//! the self-service pages do it.

use std::sync::Arc;

use askama::Template;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Extension, Form,
};
use tracing::{error, info, warn};

use es4c_core::db::repository::{AccountFlags, AccountRepository};
use es4c_core::models::account::{Account, NewAccount};
use es4c_core::models::job::SyncJob;
use es4c_core::tokens::generate_verification_token;
use es4c_core::validation::{validate_first_name, validate_last_name, FieldErrors};

use crate::account::{validate_registration, RegistrationForm};
use crate::auth::{hash_password, CurrentUser};
use crate::csrf::CsrfToken;
use crate::{publish, render, AppState};

struct AccountRow {
    id: i64,
    username: String,
    full_name: String,
    email: String,
    is_verified: bool,
    is_active: bool,
    is_staff: bool,
    date_joined: String,
}

impl AccountRow {
    fn from_model(account: &Account) -> Self {
        Self {
            id: account.id,
            username: account.username.clone(),
            full_name: account.full_name(),
            email: account.email.clone(),
            is_verified: account.is_verified,
            is_active: account.is_active,
            is_staff: account.is_staff || account.is_superuser,
            date_joined: account.date_joined.format("%Y-%m-%d %H:%M").to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "admin/list.html")]
struct AccountListTemplate {
    csrf_token: String,
    accounts: Vec<AccountRow>,
}

/// Checkbox fields arrive as `on` when ticked and are absent otherwise.
#[derive(Debug, Default, serde::Deserialize)]
pub struct NewAccountForm {
    #[serde(flatten)]
    pub account: RegistrationForm,
    #[serde(default)]
    pub is_staff: Option<String>,
    #[serde(default)]
    pub is_superuser: Option<String>,
}

#[derive(Template)]
#[template(path = "admin/new.html")]
struct NewAccountTemplate {
    csrf_token: String,
    form: RegistrationForm,
    is_staff: bool,
    is_superuser: bool,
    errors: FieldErrors,
    error: Option<String>,
}

#[derive(Debug, Default, serde::Deserialize)]
pub struct EditAccountForm {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub is_verified: Option<String>,
    #[serde(default)]
    pub is_staff: Option<String>,
    #[serde(default)]
    pub is_superuser: Option<String>,
    #[serde(default)]
    pub is_active: Option<String>,
}

impl EditAccountForm {
    fn flags(&self) -> AccountFlags {
        AccountFlags {
            is_verified: self.is_verified.is_some(),
            is_staff: self.is_staff.is_some(),
            is_superuser: self.is_superuser.is_some(),
            is_active: self.is_active.is_some(),
        }
    }
}

#[derive(Template)]
#[template(path = "admin/edit.html")]
struct EditAccountTemplate {
    csrf_token: String,
    id: i64,
    username: String,
    email: String,
    first_name: String,
    last_name: String,
    flags: AccountFlags,
    errors: FieldErrors,
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Account not found").into_response()
}

fn internal_error() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
}

/// GET /admin/
pub async fn list_accounts(
    State(state): State<Arc<AppState>>,
    Extension(csrf): Extension<CsrfToken>,
) -> Response {
    match state.repo.list_accounts().await {
        Ok(accounts) => render(&AccountListTemplate {
            csrf_token: csrf.0,
            accounts: accounts.iter().map(AccountRow::from_model).collect(),
        }),
        Err(e) => {
            error!(error = %e, "failed to list accounts");
            internal_error()
        }
    }
}

/// GET /admin/new/
pub async fn new_account_page(Extension(csrf): Extension<CsrfToken>) -> Response {
    render(&NewAccountTemplate {
        csrf_token: csrf.0,
        form: RegistrationForm::default(),
        is_staff: false,
        is_superuser: false,
        errors: FieldErrors::new(),
        error: None,
    })
}

/// POST /admin/new/
///
/// Accounts created here are verified from the start, so the directory
/// account is created and enabled straight away.
pub async fn create_account(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<CurrentUser>,
    Extension(csrf): Extension<CsrfToken>,
    Form(form): Form<NewAccountForm>,
) -> Response {
    let is_staff = form.is_staff.is_some();
    let is_superuser = form.is_superuser.is_some();
    let rerender = |errors: FieldErrors, error: Option<&str>| {
        render(&NewAccountTemplate {
            csrf_token: csrf.0.clone(),
            form: RegistrationForm {
                password_1: String::new(),
                password_2: String::new(),
                ..form.account.clone()
            },
            is_staff,
            is_superuser,
            errors,
            error: error.map(str::to_string),
        })
    };

    let fields = &form.account;
    match validate_registration(&state, fields).await {
        Ok(errors) if errors.is_empty() => {}
        Ok(errors) => return rerender(errors, None),
        Err(e) => {
            error!(error = %e, "account lookup failed");
            return rerender(FieldErrors::new(), Some("Internal error"));
        }
    }

    let password_hash = match hash_password(&fields.password_1) {
        Ok(h) => h,
        Err(e) => {
            error!(error = %e, "password hashing failed");
            return rerender(FieldErrors::new(), Some("Internal error"));
        }
    };

    let created = state
        .repo
        .create_account(&NewAccount {
            username: fields.username.clone(),
            email: fields.email.clone(),
            first_name: fields.first_name.clone(),
            last_name: fields.last_name.clone(),
            password_hash,
            verification_token: generate_verification_token(),
            is_verified: true,
            is_staff,
            is_superuser,
        })
        .await;
    let account = match created {
        Ok(account) => account,
        Err(e) => {
            error!(username = %fields.username, error = %e, "failed to save account");
            return rerender(
                FieldErrors::new(),
                Some("The account could not be created. Please try again."),
            );
        }
    };

    info!(admin = %admin.account.username, username = %account.username, "account created by admin");
    publish(
        &state,
        SyncJob::create_user(
            &account.username,
            &fields.password_1,
            &account.first_name,
            &account.last_name,
        ),
    )
    .await;
    publish(
        &state,
        SyncJob::EnableAccount {
            username: account.username.clone(),
        },
    )
    .await;
    Redirect::to("/admin/").into_response()
}

/// GET /admin/:id/
pub async fn edit_account_page(
    State(state): State<Arc<AppState>>,
    Extension(csrf): Extension<CsrfToken>,
    Path(id): Path<i64>,
) -> Response {
    let account = match state.repo.get_account(id).await {
        Ok(Some(a)) => a,
        Ok(None) => return not_found(),
        Err(e) => {
            error!(id, error = %e, "failed to load account");
            return internal_error();
        }
    };
    render(&EditAccountTemplate {
        csrf_token: csrf.0,
        id: account.id,
        flags: AccountFlags {
            is_verified: account.is_verified,
            is_staff: account.is_staff,
            is_superuser: account.is_superuser,
            is_active: account.is_active,
        },
        username: account.username,
        email: account.email,
        first_name: account.first_name,
        last_name: account.last_name,
        errors: FieldErrors::new(),
    })
}

/// POST /admin/:id/
pub async fn update_account(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<CurrentUser>,
    Extension(csrf): Extension<CsrfToken>,
    Path(id): Path<i64>,
    Form(form): Form<EditAccountForm>,
) -> Response {
    let account = match state.repo.get_account(id).await {
        Ok(Some(a)) => a,
        Ok(None) => return not_found(),
        Err(e) => {
            error!(id, error = %e, "failed to load account");
            return internal_error();
        }
    };

    let mut errors = FieldErrors::new();
    errors.check("first_name", validate_first_name(&form.first_name));
    errors.check("last_name", validate_last_name(&form.last_name));
    if !errors.is_empty() {
        return render(&EditAccountTemplate {
            csrf_token: csrf.0,
            id,
            username: account.username,
            email: account.email,
            first_name: form.first_name.clone(),
            last_name: form.last_name.clone(),
            flags: form.flags(),
            errors,
        });
    }

    let saved = async {
        state
            .repo
            .update_account_names(id, &form.first_name, &form.last_name)
            .await?;
        state.repo.update_account_flags(id, form.flags()).await
    }
    .await;
    if let Err(e) = saved {
        error!(username = %account.username, error = %e, "failed to update account");
        return internal_error();
    }

    info!(admin = %admin.account.username, username = %account.username, "account updated by admin");
    publish(
        &state,
        SyncJob::update_names(&account.username, &form.first_name, &form.last_name),
    )
    .await;
    Redirect::to("/admin/").into_response()
}

/// POST /admin/:id/delete/
pub async fn delete_account(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Response {
    if id == admin.account.id {
        warn!(username = %admin.account.username, "refused to delete own account");
        return (StatusCode::BAD_REQUEST, "You cannot delete your own account").into_response();
    }
    let account = match state.repo.get_account(id).await {
        Ok(Some(a)) => a,
        Ok(None) => return not_found(),
        Err(e) => {
            error!(id, error = %e, "failed to load account");
            return internal_error();
        }
    };
    if let Err(e) = state.repo.delete_account(id).await {
        error!(username = %account.username, error = %e, "failed to delete account");
        return internal_error();
    }

    info!(admin = %admin.account.username, username = %account.username, "account deleted by admin");
    publish(
        &state,
        SyncJob::DeleteUser {
            username: account.username,
        },
    )
    .await;
    Redirect::to("/admin/").into_response()
}
