//! Process-local queue with the same delivery rules as the Redis one.
//! Used by tests and by single-process development setups.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use uuid::Uuid;

use es4c_core::error::{Es4cError, Result};
use es4c_core::models::job::{JobEnvelope, JobOutcome, SyncJob};

use crate::partition::partition_for;
use crate::{Delivery, JobPublisher, JobSource, PartitionReader};

#[derive(Default)]
struct PartitionState {
    next_seq: u64,
    entries: VecDeque<(u64, String)>,
    pending: BTreeMap<u64, String>,
}

struct Inner {
    partitions: u32,
    poll: Duration,
    streams: Mutex<HashMap<u32, PartitionState>>,
    results: Mutex<HashMap<Uuid, JobOutcome>>,
    published: Mutex<Vec<JobEnvelope>>,
    failing_completes: Mutex<u32>,
    notify: Notify,
}

#[derive(Clone)]
pub struct InMemoryJobQueue {
    inner: Arc<Inner>,
}

fn lock<T>(m: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    m.lock()
        .map_err(|_| Es4cError::Queue("in-memory queue lock poisoned".into()))
}

impl InMemoryJobQueue {
    pub fn new(partitions: u32) -> Self {
        Self::with_poll_interval(partitions, Duration::from_millis(50))
    }

    pub fn with_poll_interval(partitions: u32, poll: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                partitions: partitions.max(1),
                poll,
                streams: Mutex::new(HashMap::new()),
                results: Mutex::new(HashMap::new()),
                published: Mutex::new(Vec::new()),
                failing_completes: Mutex::new(0),
                notify: Notify::new(),
            }),
        }
    }

    /// Every envelope enqueued so far, in order.
    pub fn published(&self) -> Vec<JobEnvelope> {
        self.inner
            .published
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    /// The jobs enqueued so far, without their envelopes.
    pub fn jobs(&self) -> Vec<SyncJob> {
        self.published().into_iter().map(|e| e.job).collect()
    }

    /// Make the next `count` calls to `complete` fail before anything is
    /// recorded, as a broker outage would.
    pub fn fail_completes(&self, count: u32) -> Result<()> {
        *lock(&self.inner.failing_completes)? = count;
        Ok(())
    }

    /// Append a raw stream payload, bypassing serialization.
    pub fn push_raw(&self, partition: u32, payload: &str) -> Result<()> {
        self.append(partition, payload.to_string())
    }

    fn append(&self, partition: u32, payload: String) -> Result<()> {
        {
            let mut streams = lock(&self.inner.streams)?;
            let state = streams.entry(partition).or_default();
            let seq = state.next_seq;
            state.next_seq += 1;
            state.entries.push_back((seq, payload));
        }
        self.inner.notify.notify_waiters();
        Ok(())
    }
}

#[async_trait]
impl JobPublisher for InMemoryJobQueue {
    async fn enqueue(&self, job: SyncJob) -> Result<Uuid> {
        let envelope = JobEnvelope::new(job);
        let partition = partition_for(envelope.job.username(), self.inner.partitions);
        let payload = serde_json::to_string(&envelope)?;
        let id = envelope.id;
        lock(&self.inner.published)?.push(envelope);
        self.append(partition, payload)?;
        Ok(id)
    }

    async fn fetch_result(&self, id: Uuid) -> Result<Option<JobOutcome>> {
        Ok(lock(&self.inner.results)?.get(&id).cloned())
    }
}

#[async_trait]
impl JobSource for InMemoryJobQueue {
    fn partitions(&self) -> u32 {
        self.inner.partitions
    }

    async fn open_partition(&self, partition: u32) -> Result<Box<dyn PartitionReader>> {
        if partition >= self.inner.partitions {
            return Err(Es4cError::Queue(format!(
                "partition {partition} out of range (0..{})",
                self.inner.partitions
            )));
        }
        Ok(Box::new(InMemoryReader {
            inner: self.inner.clone(),
            partition,
            draining_pending: true,
        }))
    }
}

struct InMemoryReader {
    inner: Arc<Inner>,
    partition: u32,
    draining_pending: bool,
}

impl InMemoryReader {
    fn delivery(&self, seq: u64, payload: &str) -> Delivery {
        Delivery {
            partition: self.partition,
            entry_id: seq.to_string(),
            payload: serde_json::from_str(payload).map_err(|e| e.to_string()),
        }
    }

    fn take(&mut self) -> Result<Vec<Delivery>> {
        let mut streams = lock(&self.inner.streams)?;
        let state = streams.entry(self.partition).or_default();
        if self.draining_pending {
            self.draining_pending = false;
            if !state.pending.is_empty() {
                let pending: Vec<(u64, String)> = state
                    .pending
                    .iter()
                    .map(|(seq, p)| (*seq, p.clone()))
                    .collect();
                drop(streams);
                return Ok(pending.iter().map(|(s, p)| self.delivery(*s, p)).collect());
            }
        }
        let mut taken = Vec::new();
        while let Some((seq, payload)) = state.entries.pop_front() {
            state.pending.insert(seq, payload.clone());
            taken.push((seq, payload));
        }
        drop(streams);
        Ok(taken.iter().map(|(s, p)| self.delivery(*s, p)).collect())
    }
}

#[async_trait]
impl PartitionReader for InMemoryReader {
    fn partition(&self) -> u32 {
        self.partition
    }

    async fn next_batch(&mut self) -> Result<Vec<Delivery>> {
        let batch = self.take()?;
        if !batch.is_empty() {
            return Ok(batch);
        }
        let _ = tokio::time::timeout(self.inner.poll, self.inner.notify.notified()).await;
        self.take()
    }

    async fn complete(&mut self, delivery: &Delivery, outcome: Option<&JobOutcome>) -> Result<()> {
        {
            let mut failing = lock(&self.inner.failing_completes)?;
            if *failing > 0 {
                *failing -= 1;
                return Err(Es4cError::Queue("result store unavailable".into()));
            }
        }
        if let (Some(outcome), Ok(envelope)) = (outcome, &delivery.payload) {
            lock(&self.inner.results)?.insert(envelope.id, outcome.clone());
        }
        let seq: u64 = delivery
            .entry_id
            .parse()
            .map_err(|_| Es4cError::Queue(format!("bad entry id {}", delivery.entry_id)))?;
        let mut streams = lock(&self.inner.streams)?;
        if let Some(state) = streams.get_mut(&self.partition) {
            state.pending.remove(&seq);
        }
        Ok(())
    }
}
