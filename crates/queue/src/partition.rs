use sha2::{Digest, Sha256};

use es4c_core::normalize::routing_key;

/// Partition a username's jobs are routed to.
///
/// Stable across processes and releases: the first 8 bytes of the SHA-256 of
/// the routing key, big-endian, modulo `partitions`.
pub fn partition_for(username: &str, partitions: u32) -> u32 {
    let partitions = partitions.max(1);
    let digest = Sha256::digest(routing_key(username).as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(head) % u64::from(partitions)) as u32
}

pub fn stream_key(namespace: &str, partition: u32) -> String {
    format!("{namespace}:jobs:{partition}")
}

pub fn result_key(namespace: &str, id: &uuid::Uuid) -> String {
    format!("{namespace}:result:{id}")
}
