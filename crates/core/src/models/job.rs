//! Synchronization jobs exchanged between the web tier and directory workers,
//! and the outcomes workers record for them.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Attribute names mapped to their new values.
pub type AttributeMap = BTreeMap<String, String>;

/// The task a job asks a worker to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskKind {
    #[serde(rename = "tasks.create_user")]
    CreateUser,
    #[serde(rename = "tasks.enable_account")]
    EnableAccount,
    #[serde(rename = "tasks.update_user_attributes")]
    UpdateUserAttributes,
    #[serde(rename = "tasks.update_user_password")]
    UpdateUserPassword,
    #[serde(rename = "tasks.delete_user")]
    DeleteUser,
}

impl TaskKind {
    pub fn name(&self) -> &'static str {
        match self {
            TaskKind::CreateUser => "tasks.create_user",
            TaskKind::EnableAccount => "tasks.enable_account",
            TaskKind::UpdateUserAttributes => "tasks.update_user_attributes",
            TaskKind::UpdateUserPassword => "tasks.update_user_password",
            TaskKind::DeleteUser => "tasks.delete_user",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One account-lifecycle operation for the directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "task", content = "args")]
pub enum SyncJob {
    #[serde(rename = "tasks.create_user")]
    CreateUser {
        username: String,
        password: String,
        #[serde(default)]
        attributes: AttributeMap,
    },
    #[serde(rename = "tasks.enable_account")]
    EnableAccount { username: String },
    #[serde(rename = "tasks.update_user_attributes")]
    UpdateUserAttributes {
        username: String,
        attributes: AttributeMap,
    },
    #[serde(rename = "tasks.update_user_password")]
    UpdateUserPassword { username: String, password: String },
    #[serde(rename = "tasks.delete_user")]
    DeleteUser { username: String },
}

impl SyncJob {
    /// Build a `create_user` job carrying the account names.
    pub fn create_user(username: &str, password: &str, first_name: &str, last_name: &str) -> Self {
        let mut attributes = AttributeMap::new();
        attributes.insert("first_name".to_string(), first_name.to_string());
        attributes.insert("last_name".to_string(), last_name.to_string());
        SyncJob::CreateUser {
            username: username.to_string(),
            password: password.to_string(),
            attributes,
        }
    }

    /// Build an `update_user_attributes` job setting `givenName` and `sn`.
    pub fn update_names(username: &str, first_name: &str, last_name: &str) -> Self {
        let mut attributes = AttributeMap::new();
        attributes.insert("givenName".to_string(), first_name.to_string());
        attributes.insert("sn".to_string(), last_name.to_string());
        SyncJob::UpdateUserAttributes {
            username: username.to_string(),
            attributes,
        }
    }

    pub fn kind(&self) -> TaskKind {
        match self {
            SyncJob::CreateUser { .. } => TaskKind::CreateUser,
            SyncJob::EnableAccount { .. } => TaskKind::EnableAccount,
            SyncJob::UpdateUserAttributes { .. } => TaskKind::UpdateUserAttributes,
            SyncJob::UpdateUserPassword { .. } => TaskKind::UpdateUserPassword,
            SyncJob::DeleteUser { .. } => TaskKind::DeleteUser,
        }
    }

    pub fn username(&self) -> &str {
        match self {
            SyncJob::CreateUser { username, .. }
            | SyncJob::EnableAccount { username }
            | SyncJob::UpdateUserAttributes { username, .. }
            | SyncJob::UpdateUserPassword { username, .. }
            | SyncJob::DeleteUser { username } => username,
        }
    }
}

/// A job as it travels through the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEnvelope {
    pub id: Uuid,
    pub enqueued_at: DateTime<Utc>,
    #[serde(flatten)]
    pub job: SyncJob,
}

impl JobEnvelope {
    pub fn new(job: SyncJob) -> Self {
        Self {
            id: Uuid::new_v4(),
            enqueued_at: Utc::now(),
            job,
        }
    }
}

/// What a successful task did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobAction {
    Created,
    Enabled,
    Updated { attributes: Vec<String> },
    PasswordUpdated,
    Deleted,
}

/// The recorded result of running a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    Success { username: String, action: JobAction },
    AlreadyExists { username: String },
    NotFound { username: String },
    Error {
        username: String,
        task: TaskKind,
        message: String,
    },
}

impl JobOutcome {
    pub fn is_error(&self) -> bool {
        matches!(self, JobOutcome::Error { .. })
    }
}

impl fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobOutcome::Success { username, action } => match action {
                JobAction::Created => write!(f, "User {username} created"),
                JobAction::Enabled => write!(f, "Account {username} enabled"),
                JobAction::Updated { .. } => write!(f, "User {username} updated"),
                JobAction::PasswordUpdated => write!(f, "Password updated for {username}"),
                JobAction::Deleted => write!(f, "User {username} deleted"),
            },
            JobOutcome::AlreadyExists { username } => write!(f, "User {username} already exists"),
            JobOutcome::NotFound { username } => write!(f, "User {username} does not exist"),
            JobOutcome::Error {
                username,
                task,
                message,
            } => match task {
                TaskKind::CreateUser => write!(f, "Error creating user {username}: {message}"),
                TaskKind::EnableAccount => {
                    write!(f, "Error enabling account {username}: {message}")
                }
                TaskKind::UpdateUserAttributes => {
                    write!(f, "Error updating user {username}: {message}")
                }
                TaskKind::UpdateUserPassword => {
                    write!(f, "Error updating password for {username}: {message}")
                }
                TaskKind::DeleteUser => write!(f, "Error deleting user {username}: {message}"),
            },
        }
    }
}
