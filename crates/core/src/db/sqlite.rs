use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use crate::error::Result;
use crate::models::{
    account::{Account, NewAccount},
    session::WebSession,
};

use super::repository::{AccountFlags, AccountRepository, SessionRepository};

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const ACCOUNT_COLUMNS: &str = "id, username, email, first_name, last_name, password_hash, \
     verification_token, is_verified, is_admin, is_staff, is_superuser, is_active, date_joined";

#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.format(DATE_FORMAT).to_string()
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    NaiveDateTime::parse_from_str(s, DATE_FORMAT)
        .unwrap_or_default()
        .and_utc()
}

fn row_to_account(r: &SqliteRow) -> Account {
    let joined: String = r.get("date_joined");
    Account {
        id: r.get("id"),
        username: r.get("username"),
        email: r.get("email"),
        first_name: r.get("first_name"),
        last_name: r.get("last_name"),
        password_hash: r.get("password_hash"),
        verification_token: r.get("verification_token"),
        is_verified: r.get("is_verified"),
        is_admin: r.get("is_admin"),
        is_staff: r.get("is_staff"),
        is_superuser: r.get("is_superuser"),
        is_active: r.get("is_active"),
        date_joined: parse_datetime(&joined),
    }
}

#[async_trait]
impl AccountRepository for SqliteRepository {
    async fn create_account(&self, account: &NewAccount) -> Result<Account> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO accounts (username, email, first_name, last_name, password_hash, \
             verification_token, is_verified, is_admin, is_staff, is_superuser, is_active, date_joined) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 1, ?11)",
        )
        .bind(&account.username)
        .bind(&account.email)
        .bind(&account.first_name)
        .bind(&account.last_name)
        .bind(&account.password_hash)
        .bind(&account.verification_token)
        .bind(account.is_verified)
        .bind(account.is_superuser)
        .bind(account.is_staff)
        .bind(account.is_superuser)
        .bind(format_datetime(&now))
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        Ok(Account {
            id,
            username: account.username.clone(),
            email: account.email.clone(),
            first_name: account.first_name.clone(),
            last_name: account.last_name.clone(),
            password_hash: account.password_hash.clone(),
            verification_token: account.verification_token.clone(),
            is_verified: account.is_verified,
            is_admin: account.is_superuser,
            is_staff: account.is_staff,
            is_superuser: account.is_superuser,
            is_active: true,
            date_joined: parse_datetime(&format_datetime(&now)),
        })
    }

    async fn get_account(&self, id: i64) -> Result<Option<Account>> {
        let row = sqlx::query(&format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_account))
    }

    async fn get_account_by_username(&self, username: &str) -> Result<Option<Account>> {
        let row = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE username = ?1 COLLATE NOCASE"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(row_to_account))
    }

    async fn get_account_by_email(&self, email: &str) -> Result<Option<Account>> {
        let row = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = ?1 COLLATE NOCASE"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(row_to_account))
    }

    async fn list_accounts(&self) -> Result<Vec<Account>> {
        let rows = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts ORDER BY username"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(row_to_account).collect())
    }

    async fn update_account_names(
        &self,
        id: i64,
        first_name: &str,
        last_name: &str,
    ) -> Result<bool> {
        let result = sqlx::query("UPDATE accounts SET first_name = ?1, last_name = ?2 WHERE id = ?3")
            .bind(first_name)
            .bind(last_name)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn update_account_flags(&self, id: i64, flags: AccountFlags) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE accounts SET is_verified = ?1, is_staff = ?2, is_superuser = ?3, \
             is_admin = ?3, is_active = ?4 WHERE id = ?5",
        )
        .bind(flags.is_verified)
        .bind(flags.is_staff)
        .bind(flags.is_superuser)
        .bind(flags.is_active)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn update_password_hash(&self, id: i64, password_hash: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE accounts SET password_hash = ?1 WHERE id = ?2")
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_verified(&self, id: i64) -> Result<bool> {
        let result =
            sqlx::query("UPDATE accounts SET is_verified = 1 WHERE id = ?1 AND is_verified = 0")
                .bind(id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_account(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl SessionRepository for SqliteRepository {
    async fn create_session(&self, session: &WebSession) -> Result<()> {
        sqlx::query(
            "INSERT INTO web_sessions (token, account_id, created_at, expires_at, ip_address) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&session.token)
        .bind(session.account_id)
        .bind(format_datetime(&session.created_at))
        .bind(format_datetime(&session.expires_at))
        .bind(&session.ip_address)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_session(&self, token: &str) -> Result<Option<WebSession>> {
        let row = sqlx::query(
            "SELECT token, account_id, created_at, expires_at, ip_address \
             FROM web_sessions WHERE token = ?1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| {
            let created: String = r.get("created_at");
            let expires: String = r.get("expires_at");
            WebSession {
                token: r.get("token"),
                account_id: r.get("account_id"),
                created_at: parse_datetime(&created),
                expires_at: parse_datetime(&expires),
                ip_address: r.get("ip_address"),
            }
        }))
    }

    async fn delete_session(&self, token: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM web_sessions WHERE token = ?1")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_other_sessions(&self, account_id: i64, keep_token: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM web_sessions WHERE account_id = ?1 AND token != ?2")
            .bind(account_id)
            .bind(keep_token)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_expired_sessions(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM web_sessions WHERE expires_at < datetime('now')")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
