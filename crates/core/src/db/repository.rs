use async_trait::async_trait;

use crate::error::Result;
use crate::models::{
    account::{Account, NewAccount},
    session::WebSession,
};

/// Admin-editable account flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountFlags {
    pub is_verified: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub is_active: bool,
}

#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Insert an account. Fails with a database error when the username,
    /// email, or verification token is already taken.
    async fn create_account(&self, account: &NewAccount) -> Result<Account>;
    async fn get_account(&self, id: i64) -> Result<Option<Account>>;
    async fn get_account_by_username(&self, username: &str) -> Result<Option<Account>>;
    async fn get_account_by_email(&self, email: &str) -> Result<Option<Account>>;
    async fn list_accounts(&self) -> Result<Vec<Account>>;
    async fn update_account_names(&self, id: i64, first_name: &str, last_name: &str)
        -> Result<bool>;
    async fn update_account_flags(&self, id: i64, flags: AccountFlags) -> Result<bool>;
    async fn update_password_hash(&self, id: i64, password_hash: &str) -> Result<bool>;
    /// Mark the account verified. Returns false when it already was (or does not exist).
    async fn mark_verified(&self, id: i64) -> Result<bool>;
    async fn delete_account(&self, id: i64) -> Result<bool>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create_session(&self, session: &WebSession) -> Result<()>;
    async fn get_session(&self, token: &str) -> Result<Option<WebSession>>;
    async fn delete_session(&self, token: &str) -> Result<bool>;
    /// Delete every session of an account except `keep_token`.
    async fn delete_other_sessions(&self, account_id: i64, keep_token: &str) -> Result<u64>;
    async fn delete_expired_sessions(&self) -> Result<u64>;
}

