//! The synchronization tasks a worker runs, one per job kind.
//!
//! Every task normalizes the username first and turns every directory failure
//! into a [`JobOutcome`]; nothing here returns an error or retries.

use es4c_core::config::DirectoryConfig;
use es4c_core::models::job::{AttributeMap, JobAction, JobOutcome, SyncJob, TaskKind};
use es4c_core::normalize::normalize;
use tracing::{error, info, warn};

use crate::client::DirectoryClient;
use crate::models::NewDirectoryUser;

/// Values used when a `create_user` job does not supply them.
#[derive(Debug, Clone)]
pub struct ProvisioningDefaults {
    pub login_shell: String,
    /// Parent of the per-user home directory.
    pub home_prefix: String,
}

impl Default for ProvisioningDefaults {
    fn default() -> Self {
        Self {
            login_shell: "/bin/bash".to_string(),
            home_prefix: "/home".to_string(),
        }
    }
}

impl ProvisioningDefaults {
    pub fn from_config(config: &DirectoryConfig) -> Self {
        Self {
            login_shell: config.login_shell.clone(),
            home_prefix: config.home_prefix.clone(),
        }
    }

    pub fn unix_home(&self, username: &str) -> String {
        format!("{}/{}", self.home_prefix.trim_end_matches('/'), username)
    }
}

fn failed(username: &str, task: TaskKind, message: impl ToString) -> JobOutcome {
    let outcome = JobOutcome::Error {
        username: username.to_string(),
        task,
        message: message.to_string(),
    };
    error!(username, task = %task, "{outcome}");
    outcome
}

fn succeeded(username: &str, action: JobAction) -> JobOutcome {
    let outcome = JobOutcome::Success {
        username: username.to_string(),
        action,
    };
    info!(username, "{outcome}");
    outcome
}

/// Run one job against the directory.
pub async fn run_job(
    client: &dyn DirectoryClient,
    defaults: &ProvisioningDefaults,
    job: &SyncJob,
) -> JobOutcome {
    match job {
        SyncJob::CreateUser {
            username,
            password,
            attributes,
        } => create_user(client, defaults, username, password, attributes).await,
        SyncJob::EnableAccount { username } => enable_account(client, username).await,
        SyncJob::UpdateUserAttributes {
            username,
            attributes,
        } => update_user_attributes(client, username, attributes).await,
        SyncJob::UpdateUserPassword { username, password } => {
            update_user_password(client, username, password).await
        }
        SyncJob::DeleteUser { username } => delete_user(client, username).await,
    }
}

/// Create the user when it does not exist yet, then disable it until the
/// account is verified.
///
/// Recognized attributes: `first_name`, `last_name`, `login_shell`, `unix_home`.
pub async fn create_user(
    client: &dyn DirectoryClient,
    defaults: &ProvisioningDefaults,
    username: &str,
    password: &str,
    attributes: &AttributeMap,
) -> JobOutcome {
    let task = TaskKind::CreateUser;
    let username = normalize(username);
    if username.is_empty() {
        return failed(&username, task, "username is empty after normalization");
    }

    match client.find_user(&username).await {
        Ok(Some(_)) => {
            let outcome = JobOutcome::AlreadyExists {
                username: username.clone(),
            };
            info!(username = %username, "{outcome}");
            return outcome;
        }
        Ok(None) => {}
        Err(e) => return failed(&username, task, e),
    }

    let value = |key: &str| attributes.get(key).map(|v| normalize(v));
    let user = NewDirectoryUser {
        given_name: value("first_name").unwrap_or_default(),
        surname: value("last_name").unwrap_or_default(),
        login_shell: value("login_shell").unwrap_or_else(|| defaults.login_shell.clone()),
        unix_home: value("unix_home").unwrap_or_else(|| defaults.unix_home(&username)),
        password: password.to_string(),
        username: username.clone(),
    };

    if let Err(e) = client.create_user(&user).await {
        return failed(&username, task, e);
    }
    if let Err(e) = client.disable_account(&username).await {
        warn!(username = %username, "created user is still enabled");
        return failed(
            &username,
            task,
            format!("created but could not be disabled: {e}"),
        );
    }
    succeeded(&username, JobAction::Created)
}

/// Clear the disabled flag. The entry is not looked up first.
pub async fn enable_account(client: &dyn DirectoryClient, username: &str) -> JobOutcome {
    let username = normalize(username);
    match client.enable_account(&username).await {
        Ok(()) => succeeded(&username, JobAction::Enabled),
        Err(e) => failed(&username, TaskKind::EnableAccount, e),
    }
}

/// Replace each attribute, in name order. A failure stops the loop and keeps
/// the attributes already written.
pub async fn update_user_attributes(
    client: &dyn DirectoryClient,
    username: &str,
    attributes: &AttributeMap,
) -> JobOutcome {
    let task = TaskKind::UpdateUserAttributes;
    let username = normalize(username);

    let entry = match client.find_user(&username).await {
        Ok(Some(entry)) => entry,
        Ok(None) => {
            let outcome = JobOutcome::NotFound {
                username: username.clone(),
            };
            warn!(username = %username, "{outcome}");
            return outcome;
        }
        Err(e) => return failed(&username, task, e),
    };

    let mut applied = Vec::with_capacity(attributes.len());
    for (name, value) in attributes {
        if let Err(e) = client
            .replace_attribute(&entry.dn, name, &normalize(value))
            .await
        {
            let message = if applied.is_empty() {
                e.to_string()
            } else {
                format!("{e} (already applied: {})", applied.join(", "))
            };
            return failed(&username, task, message);
        }
        applied.push(name.clone());
    }
    succeeded(&username, JobAction::Updated { attributes: applied })
}

pub async fn update_user_password(
    client: &dyn DirectoryClient,
    username: &str,
    password: &str,
) -> JobOutcome {
    let username = normalize(username);
    match client.set_password(&username, password).await {
        Ok(()) => succeeded(&username, JobAction::PasswordUpdated),
        Err(e) => failed(&username, TaskKind::UpdateUserPassword, e),
    }
}

pub async fn delete_user(client: &dyn DirectoryClient, username: &str) -> JobOutcome {
    let username = normalize(username);
    match client.delete_user(&username).await {
        Ok(()) => succeeded(&username, JobAction::Deleted),
        Err(e) => failed(&username, TaskKind::DeleteUser, e),
    }
}
