//! Worker id selection from a host fingerprint
//!
//! Tried in order: the first hardware address of a non-loopback interface,
//! then host name plus interface addresses, then process entropy. Each
//! fingerprint is hashed with SHA-256 and reduced modulo 1024.

use std::time::{SystemTime, UNIX_EPOCH};

use sha2::{Digest, Sha256};
use sysinfo::{Networks, System};
use tracing::{info, warn};

use super::snowflake::MAX_WORKER_ID;

/// Where a worker id came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerIdSource {
    HardwareAddress,
    HostIdentity,
    ProcessEntropy,
    Configured,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerIdentity {
    pub id: u16,
    pub source: WorkerIdSource,
}

/// Pick this process's worker id
pub fn detect_worker_id() -> WorkerIdentity {
    let networks = Networks::new_with_refreshed_list();
    let mut interfaces: Vec<_> = networks.list().iter().collect();
    interfaces.sort_by(|a, b| a.0.cmp(b.0));

    let identity = if let Some(mac) = interfaces
        .iter()
        .map(|(_, data)| data.mac_address().0)
        .find(|mac| mac.iter().any(|b| *b != 0))
    {
        WorkerIdentity {
            id: reduce(&mac),
            source: WorkerIdSource::HardwareAddress,
        }
    } else if let Some(host) = System::host_name() {
        let mut fingerprint = host.into_bytes();
        for (_, data) in &interfaces {
            for network in data.ip_networks() {
                if !network.addr.is_loopback() {
                    fingerprint.extend(network.addr.to_string().bytes());
                }
            }
        }
        WorkerIdentity {
            id: reduce(&fingerprint),
            source: WorkerIdSource::HostIdentity,
        }
    } else {
        warn!("no hardware address or host name, deriving worker id from process entropy");
        WorkerIdentity {
            id: reduce(&process_entropy()),
            source: WorkerIdSource::ProcessEntropy,
        }
    };

    info!(worker_id = identity.id, source = ?identity.source, "selected worker id");
    identity
}

fn process_entropy() -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend(std::process::id().to_le_bytes());
    for key in ["USER", "USERNAME", "HOSTNAME"] {
        if let Ok(value) = std::env::var(key) {
            bytes.extend(value.into_bytes());
        }
    }
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    bytes.extend(nanos.to_le_bytes());
    bytes
}

/// Hash a fingerprint into the worker id range
pub fn reduce(fingerprint: &[u8]) -> u16 {
    let digest = Sha256::digest(fingerprint);
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(head) % (u64::from(MAX_WORKER_ID) + 1)) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reduce_is_stable_and_in_range() {
        let a = reduce(b"00:1a:2b:3c:4d:5e");
        assert_eq!(a, reduce(b"00:1a:2b:3c:4d:5e"));
        assert!(a <= MAX_WORKER_ID);
        assert!(reduce(b"") <= MAX_WORKER_ID);
    }

    #[test]
    fn test_detected_id_in_range() {
        let identity = detect_worker_id();
        assert!(identity.id <= MAX_WORKER_ID);
        assert_ne!(identity.source, WorkerIdSource::Configured);
    }
}
