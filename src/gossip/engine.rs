//! One gossip cycle: contact every known peer, learn their peers, contact
//! those too, until nobody new turns up.
use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

use super::messages::NotifyRequest;
use crate::error::Result;
use crate::node::FederationState;
use crate::peers::{InFlightGuard, PeerUrl};
use crate::queue::WorkQueue;
use crate::transport::PeerResult;

/// Delay before a candidate some other worker is contacting goes back in the queue
pub const DEFER_DELAY: Duration = Duration::from_millis(50);
/// Requeues allowed for one candidate before the cycle gives up on it
pub const MAX_DEFERRALS: u32 = 5;

/// What a finished cycle learned
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CycleOutcome {
    /// Working peer set, now persisted in the registry
    pub peers: BTreeSet<PeerUrl>,
    /// A peer answered with an address we had never seen
    pub discovered_new_peers: bool,
    /// `discovered_new_peers` or the cycle was started by an invalidation
    pub invalidated: bool,
    /// Peers that answered both calls
    pub contacted: usize,
    /// Peers whose contact failed and were marked dead
    pub failed: usize,
    /// Candidates skipped because they recently failed
    pub skipped_dead: usize,
}

#[derive(Clone, Debug)]
struct Candidate {
    peer: PeerUrl,
    deferrals: u32,
}

impl Candidate {
    fn new(peer: PeerUrl) -> Self {
        Self { peer, deferrals: 0 }
    }
}

#[derive(Debug, Default)]
struct CycleState {
    peers: BTreeSet<PeerUrl>,
    /// Queued or being processed
    to_check: HashSet<PeerUrl>,
    attempted: HashSet<PeerUrl>,
    discovered_new_peers: bool,
    contacted: usize,
    failed: usize,
    skipped_dead: usize,
}

enum Decision {
    Skip,
    Busy,
    Contact(InFlightGuard),
}

struct Cycle {
    node: Arc<FederationState>,
    queue: WorkQueue<Candidate>,
    state: Mutex<CycleState>,
}

/// Run one full cycle and persist every peer it saw.
#[instrument(skip(node), level = "info")]
pub async fn run_cycle(node: Arc<FederationState>, invalidated: bool) -> Result<CycleOutcome> {
    let peers = node.registry.list_peers()?;
    let own_url = node.settings.node_url.clone();
    let workers = node.settings.federation.workers.max(1);
    info!(
        "Starting gossip cycle over {} known peers with {} workers",
        peers.len(),
        workers
    );

    let cycle = Arc::new(Cycle {
        node: node.clone(),
        queue: WorkQueue::new(),
        state: Mutex::new(CycleState {
            to_check: peers.iter().cloned().collect(),
            attempted: HashSet::from([own_url]),
            peers: peers.clone(),
            ..Default::default()
        }),
    });
    for peer in peers {
        // Fresh queue, cannot be closed yet
        let _ = cycle.queue.put(Candidate::new(peer));
    }

    let mut pool = JoinSet::new();
    for worker_id in 0..workers {
        let cycle = cycle.clone();
        pool.spawn(async move { cycle.work(worker_id).await });
    }

    cycle.queue.join().await;
    cycle.queue.close();
    while let Some(res) = pool.join_next().await {
        if let Err(e) = res {
            error!("Gossip worker failed: {}", e);
        }
    }

    let state = cycle.lock();
    let discovered: Vec<PeerUrl> = state.peers.iter().cloned().collect();
    let inserted = node.registry.insert_peers(&discovered)?;

    let outcome = CycleOutcome {
        peers: state.peers.clone(),
        discovered_new_peers: state.discovered_new_peers,
        invalidated: invalidated || state.discovered_new_peers,
        contacted: state.contacted,
        failed: state.failed,
        skipped_dead: state.skipped_dead,
    };
    info!(
        "Gossip cycle finished: {} peers known ({} new in registry), {} contacted, {} failed, {} skipped as dead",
        outcome.peers.len(),
        inserted,
        outcome.contacted,
        outcome.failed,
        outcome.skipped_dead
    );
    Ok(outcome)
}

impl Cycle {
    fn lock(&self) -> MutexGuard<'_, CycleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn work(&self, worker_id: usize) {
        while let Some(candidate) = self.queue.get().await {
            self.process(candidate).await;
        }
        debug!("Gossip worker {} exiting", worker_id);
    }

    /// Handle one queue item; marks it done exactly once on every path.
    async fn process(&self, candidate: Candidate) {
        let decision = {
            let mut state = self.lock();
            let peer = &candidate.peer;
            if self.node.dead_peers.is_dead(peer) {
                debug!("Skipping dead peer {}", peer);
                state.to_check.remove(peer);
                state.skipped_dead += 1;
                Decision::Skip
            } else if state.attempted.contains(peer) {
                state.to_check.remove(peer);
                Decision::Skip
            } else {
                match self.node.contacting.try_claim(peer) {
                    Some(guard) => Decision::Contact(guard),
                    None => Decision::Busy,
                }
            }
        };

        match decision {
            Decision::Skip => self.queue.task_done(),
            Decision::Busy => self.defer(candidate).await,
            Decision::Contact(guard) => {
                self.contact(guard).await;
                self.queue.task_done();
            }
        }
    }

    /// Another worker holds this peer: put it back a little later instead of
    /// racing on it.
    async fn defer(&self, candidate: Candidate) {
        if candidate.deferrals >= MAX_DEFERRALS {
            warn!(
                "Peer {} stayed busy through {} deferrals, leaving it for the next cycle",
                candidate.peer, candidate.deferrals
            );
            self.lock().to_check.remove(&candidate.peer);
            self.queue.task_done();
            return;
        }

        debug!("Avoiding race on peer {}", candidate.peer);
        tokio::time::sleep(DEFER_DELAY).await;
        let retry = Candidate {
            peer: candidate.peer,
            deferrals: candidate.deferrals + 1,
        };
        // Requeue before acknowledging so join() cannot observe an empty queue
        if let Err(dropped) = self.queue.put(retry) {
            debug!("Queue closed, dropping deferred peer {}", dropped.peer);
            self.lock().to_check.remove(&dropped.peer);
        }
        self.queue.task_done();
    }

    async fn contact(&self, guard: InFlightGuard) {
        let peer = guard.peer().clone();
        let request = NotifyRequest {
            self_url: self.node.settings.node_url.clone(),
            peers: self.lock().peers.iter().cloned().collect(),
        };

        info!("Contacting peer {}", peer);
        let exchanged = self.exchange(&peer, &request).await;

        let mut state = self.lock();
        match exchanged {
            Ok(their_peers) => {
                self.node.mark_connected();
                state.contacted += 1;
                for reported in their_peers {
                    let unseen = state.peers.insert(reported.clone());
                    if !state.to_check.contains(&reported)
                        && !self.node.contacting.contains(&reported)
                        && !state.attempted.contains(&reported)
                    {
                        if unseen {
                            state.discovered_new_peers = true;
                        }
                        debug!("{} introduced us to {}", peer, reported);
                        state.to_check.insert(reported.clone());
                        // Still inside the cycle, the queue is open
                        let _ = self.queue.put(Candidate::new(reported));
                    }
                }
            }
            Err(e) => {
                warn!("Peer contact error for {}: {}", peer, e);
                self.node.dead_peers.mark_dead(&peer);
                state.failed += 1;
            }
        }

        state.attempted.insert(peer.clone());
        state.to_check.remove(&peer);
        drop(state);
        drop(guard);
    }

    async fn exchange(&self, peer: &PeerUrl, request: &NotifyRequest) -> PeerResult<Vec<PeerUrl>> {
        self.node.client.notify(peer, request).await?;
        self.node.client.fetch_peers(peer).await
    }
}
