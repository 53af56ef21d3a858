pub mod enqueue;
pub mod init;
pub mod job_status;
pub mod serve;
pub mod superuser;
pub mod test_directory;
pub mod worker;

use std::path::Path;

use es4c_core::config::Es4cConfig;
use es4c_core::db::sqlite::SqliteRepository;
use es4c_core::db::DatabasePool;
use es4c_queue::RedisJobQueue;
use tracing::info;

/// Load and validate the configuration file, with environment overrides applied.
pub fn load_config(config_path: &str) -> anyhow::Result<Es4cConfig> {
    let config = Es4cConfig::load(Path::new(config_path))?;
    config.validate()?;
    info!(path = %config_path, "loaded configuration");
    Ok(config)
}

/// Open the accounts database, creating it and its directory when missing.
pub async fn open_repository(config: &Es4cConfig) -> anyhow::Result<SqliteRepository> {
    let path = &config.es4c.database.path;
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let pool = DatabasePool::new_sqlite(path).await?;
    info!(path = %path, "database ready");
    Ok(pool.into_repository())
}

/// Connect to the job broker after checking its settings.
pub async fn connect_queue(config: &Es4cConfig) -> anyhow::Result<RedisJobQueue> {
    config.validate_broker()?;
    let queue = RedisJobQueue::connect(&config.broker, &config.worker).await?;
    queue.ping().await?;
    info!(host = %config.broker.host, vhost = %config.broker.vhost, "connected to job broker");
    Ok(queue)
}
