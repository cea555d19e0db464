use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use super::PeerUrl;

/// Short-lived record of peers whose last contact failed.
///
/// A peer is avoided while `now - last_failure < ttl`. Entries are overwritten
/// on each failure and simply age out; nothing is ever removed.
#[derive(Debug)]
pub struct DeadPeerCache {
    ttl: Duration,
    last_failure: Mutex<HashMap<PeerUrl, Instant>>,
}

impl DeadPeerCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            last_failure: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn mark_dead(&self, peer: &PeerUrl) {
        self.last_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(peer.clone(), Instant::now());
    }

    pub fn is_dead(&self, peer: &PeerUrl) -> bool {
        self.last_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(peer)
            .map(|failed_at| failed_at.elapsed() < self.ttl)
            .unwrap_or(false)
    }
}
