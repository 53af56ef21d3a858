//! ES4C Queue: durable, at-least-once delivery of synchronization jobs.
//!
//! Jobs are routed to one of several partitions by a hash of the account's
//! username, and each partition is consumed in order by a single reader.

pub mod memory;
pub mod partition;
pub mod redis_queue;

use async_trait::async_trait;
use uuid::Uuid;

use es4c_core::error::Result;
use es4c_core::models::job::{JobEnvelope, JobOutcome, SyncJob};

pub use memory::InMemoryJobQueue;
pub use partition::partition_for;
pub use redis_queue::RedisJobQueue;

/// Consumer group shared by every directory worker.
pub const CONSUMER_GROUP: &str = "directory-workers";

/// Stream field holding the JSON job envelope.
pub const JOB_FIELD: &str = "job";

/// Web-tier side of the queue.
#[async_trait]
pub trait JobPublisher: Send + Sync {
    /// Append a job to its partition and return the job id.
    async fn enqueue(&self, job: SyncJob) -> Result<Uuid>;

    /// Outcome recorded for a job, while it is still retained.
    async fn fetch_result(&self, id: Uuid) -> Result<Option<JobOutcome>>;
}

/// One entry read from a partition.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub partition: u32,
    /// Stream entry id, used to acknowledge the entry.
    pub entry_id: String,
    /// The decoded envelope, or why it could not be decoded.
    pub payload: std::result::Result<JobEnvelope, String>,
}

/// Worker side of the queue.
#[async_trait]
pub trait JobSource: Send + Sync {
    fn partitions(&self) -> u32;

    /// Open an exclusive reader for one partition.
    async fn open_partition(&self, partition: u32) -> Result<Box<dyn PartitionReader>>;
}

/// Sequential reader of one partition.
///
/// A fresh reader first returns the entries it was handed before and never
/// acknowledged, then new ones.
#[async_trait]
pub trait PartitionReader: Send {
    fn partition(&self) -> u32;

    /// Next entries in order. Empty when nothing arrived within the poll interval.
    async fn next_batch(&mut self) -> Result<Vec<Delivery>>;

    /// Record the outcome (if any) and acknowledge the entry.
    async fn complete(&mut self, delivery: &Delivery, outcome: Option<&JobOutcome>) -> Result<()>;
}
