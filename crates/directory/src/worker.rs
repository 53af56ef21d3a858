//! Directory worker: one sequential consumer per queue partition.

use std::sync::Arc;
use std::time::Duration;

use es4c_core::error::{Es4cError, Result};
use es4c_queue::{Delivery, JobSource, PartitionReader};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::client::DirectoryClient;
use crate::tasks::{run_job, ProvisioningDefaults};

const READ_RETRY_DELAY: Duration = Duration::from_secs(1);

pub struct Worker {
    source: Arc<dyn JobSource>,
    client: Arc<dyn DirectoryClient>,
    defaults: ProvisioningDefaults,
    partitions: Vec<u32>,
}

impl Worker {
    /// `partitions` limits the worker to a subset; empty means every partition.
    pub fn new(
        source: Arc<dyn JobSource>,
        client: Arc<dyn DirectoryClient>,
        defaults: ProvisioningDefaults,
        partitions: Vec<u32>,
    ) -> Self {
        let partitions = if partitions.is_empty() {
            (0..source.partitions()).collect()
        } else {
            partitions
        };
        Self {
            source,
            client,
            defaults,
            partitions,
        }
    }

    pub fn partitions(&self) -> &[u32] {
        &self.partitions
    }

    /// Consume until `shutdown` turns true. Each consumer finishes the job in
    /// hand before stopping; the directory connection is closed last.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<()> {
        let mut readers = Vec::with_capacity(self.partitions.len());
        for &partition in &self.partitions {
            readers.push(self.source.open_partition(partition).await?);
        }
        info!(partitions = ?self.partitions, "directory worker started");

        let mut handles = Vec::with_capacity(readers.len());
        for reader in readers {
            let consumer = Consumer {
                reader,
                client: self.client.clone(),
                defaults: self.defaults.clone(),
                shutdown: shutdown.clone(),
            };
            handles.push(tokio::spawn(consumer.run()));
        }

        let mut failure = None;
        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "partition consumer panicked");
                failure = Some(Es4cError::Queue(format!("consumer task failed: {e}")));
            }
        }

        if let Err(e) = self.client.close().await {
            warn!(error = %e, "failed to close directory connection");
        }
        info!("directory worker stopped");
        failure.map_or(Ok(()), Err)
    }
}

struct Consumer {
    reader: Box<dyn PartitionReader>,
    client: Arc<dyn DirectoryClient>,
    defaults: ProvisioningDefaults,
    shutdown: watch::Receiver<bool>,
}

impl Consumer {
    fn stopping(&self) -> bool {
        *self.shutdown.borrow()
    }

    async fn run(mut self) {
        let partition = self.reader.partition();
        while !self.stopping() {
            let mut shutdown = self.shutdown.clone();
            let batch = tokio::select! {
                batch = self.reader.next_batch() => batch,
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            };
            let batch = match batch {
                Ok(batch) => batch,
                Err(e) => {
                    error!(partition, error = %e, "failed to read jobs");
                    tokio::time::sleep(READ_RETRY_DELAY).await;
                    continue;
                }
            };
            for delivery in batch {
                if self.stopping() {
                    break;
                }
                self.handle(delivery).await;
            }
        }
        info!(partition, "partition consumer stopped");
    }

    async fn handle(&mut self, delivery: Delivery) {
        let partition = delivery.partition;
        let outcome = match &delivery.payload {
            Ok(envelope) => {
                info!(
                    partition,
                    job_id = %envelope.id,
                    task = %envelope.job.kind(),
                    username = %envelope.job.username(),
                    "processing job"
                );
                Some(run_job(self.client.as_ref(), &self.defaults, &envelope.job).await)
            }
            Err(reason) => {
                error!(partition, entry_id = %delivery.entry_id, reason = %reason, "discarding malformed job");
                None
            }
        };

        if let Err(e) = self.reader.complete(&delivery, outcome.as_ref()).await {
            // The entry stays pending and is redelivered when the consumer restarts.
            error!(partition, entry_id = %delivery.entry_id, error = %e, "failed to acknowledge job");
        }
    }
}
