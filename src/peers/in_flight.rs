use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use super::PeerUrl;

/// Peers some task is currently working with.
///
/// Used for the peers our gossip workers are contacting and for the peers
/// whose notify we are processing. Never persisted.
#[derive(Clone, Debug, Default)]
pub struct InFlightSet {
    peers: Arc<Mutex<HashSet<PeerUrl>>>,
}

/// Membership in an [`InFlightSet`]; released on drop.
#[derive(Debug)]
pub struct InFlightGuard {
    peer: PeerUrl,
    peers: Arc<Mutex<HashSet<PeerUrl>>>,
}

impl InFlightSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `peer`, or `None` if someone already holds it.
    pub fn try_claim(&self, peer: &PeerUrl) -> Option<InFlightGuard> {
        let mut peers = self.peers.lock().unwrap_or_else(PoisonError::into_inner);
        if peers.insert(peer.clone()) {
            Some(InFlightGuard {
                peer: peer.clone(),
                peers: self.peers.clone(),
            })
        } else {
            None
        }
    }

    pub fn contains(&self, peer: &PeerUrl) -> bool {
        self.peers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(peer)
    }

    pub fn len(&self) -> usize {
        self.peers.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl InFlightGuard {
    pub fn peer(&self) -> &PeerUrl {
        &self.peer
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.peers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.peer);
    }
}
