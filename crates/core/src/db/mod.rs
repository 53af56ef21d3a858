pub mod repository;
pub mod sqlite;

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::error::Result;

pub enum DatabasePool {
    Sqlite(SqlitePool),
}

impl DatabasePool {
    /// Open (creating if needed) a SQLite database file and run migrations.
    pub async fn new_sqlite(path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(path)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        Self::run_migrations(&pool).await?;
        Ok(DatabasePool::Sqlite(pool))
    }

    /// Create an in-memory SQLite database and run migrations. Useful for testing.
    ///
    /// Every connection to `:memory:` is its own database, so the pool holds exactly one
    /// connection for its whole lifetime.
    pub async fn new_sqlite_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Self::run_migrations(&pool).await?;
        Ok(DatabasePool::Sqlite(pool))
    }

    pub fn into_repository(self) -> sqlite::SqliteRepository {
        match self {
            DatabasePool::Sqlite(pool) => sqlite::SqliteRepository::new(pool),
        }
    }

    async fn run_migrations(pool: &SqlitePool) -> Result<()> {
        let migrations: &[&str] =
            &[include_str!("../../../../migrations/sqlite/001_initial_schema.sql")];

        let mut applied = 0usize;
        for migration_sql in migrations {
            for statement in migration_sql.split(';') {
                let trimmed = statement.trim();
                if trimmed.is_empty() || trimmed.lines().all(|l| l.trim_start().starts_with("--")) {
                    continue;
                }
                sqlx::query(trimmed).execute(pool).await?;
                applied += 1;
            }
        }
        tracing::debug!(statements = applied, "database migrations applied");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_pool_runs_migrations() {
        let repo = DatabasePool::new_sqlite_memory()
            .await
            .unwrap()
            .into_repository();
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM accounts")
            .fetch_one(repo.pool())
            .await
            .unwrap();
        assert_eq!(count.0, 0);
    }

    #[tokio::test]
    async fn file_pool_is_created_and_reopened() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("es4c.db");
        let url = format!("sqlite://{}", path.display());
        DatabasePool::new_sqlite(&url).await.unwrap();
        assert!(path.exists());
        // migrations are idempotent
        DatabasePool::new_sqlite(&url).await.unwrap();
    }
}
