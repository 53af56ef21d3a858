use std::sync::Arc;

use es4c_directory::{DirectoryClient, LdapDirectory, ProvisioningDefaults, Worker};
use tokio::sync::watch;
use tracing::{info, warn};

use super::serve::shutdown_signal;
use super::{connect_queue, load_config};

/// Run the `worker` command: consume directory jobs until CTRL+C.
///
/// `partitions` overrides `worker.partitions` from the configuration.
pub async fn run(config_path: &str, partitions: Vec<u32>) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;
    if !partitions.is_empty() {
        config.worker.partitions = partitions;
    }
    config.validate_directory()?;
    let queue = connect_queue(&config).await?;

    let directory = Arc::new(LdapDirectory::new(&config.directory));
    match directory.test_connection().await {
        Ok(()) => info!(server = %config.directory.server, "directory bind succeeded"),
        // Jobs reconnect on their own; a directory that is down now may be back later.
        Err(e) => warn!(server = %config.directory.server, error = %e, "directory bind failed"),
    }

    let worker = Worker::new(
        Arc::new(queue),
        directory,
        ProvisioningDefaults::from_config(&config.directory),
        config.worker.partitions.clone(),
    );
    println!(
        "ES4C worker {} consuming partitions {:?}",
        config.worker.consumer_name,
        worker.partitions()
    );

    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = tx.send(true);
    });

    worker.run(rx).await?;
    Ok(())
}
