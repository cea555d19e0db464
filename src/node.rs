//! The long-lived federation service instance.
//!
//! All process-wide state lives in one [`FederationState`], shared by the
//! HTTP handlers and every gossip or search worker.
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::error::Result;
use crate::gossip::messages::{Organization, PeersResponse, ServiceInfo};
use crate::gossip::{self, NotifyOutcome, RefreshState};
use crate::peers::{DeadPeerCache, InFlightSet, PeerRegistry, PeerUrl, SqlitePeerRegistry};
use crate::search::{self, AggregateResponse};
use crate::settings::{self, Settings, APP_NAME, APP_VERSION};
use crate::transport::{HttpPeerClient, PeerClient};

#[derive(Debug)]
pub struct FederationState {
    pub settings: Settings,
    pub registry: Arc<dyn PeerRegistry>,
    pub client: Arc<dyn PeerClient>,
    pub dead_peers: DeadPeerCache,
    /// Peers our own gossip workers are talking to
    pub contacting: InFlightSet,
    /// Peers whose notify we are processing
    pub notifying: InFlightSet,
    pub refresh: Arc<RefreshState>,
    connected_to_network: AtomicBool,
}

impl FederationState {
    /// Some peer answered a gossip exchange at least once
    pub fn mark_connected(&self) {
        self.connected_to_network.store(true, Ordering::Relaxed);
    }

    pub fn is_connected(&self) -> bool {
        self.connected_to_network.load(Ordering::Relaxed)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeStatus {
    pub name: String,
    pub version: String,
    pub node_url: PeerUrl,
    pub connected_to_network: bool,
    pub known_peers: usize,
    pub refresh_cycles: u64,
}

#[derive(Clone, Debug)]
pub struct FederationNode {
    state: Arc<FederationState>,
}

impl FederationNode {
    /// Node backed by the on-disk registry and the HTTP client
    pub fn new(settings: Settings) -> Result<Self> {
        let registry = SqlitePeerRegistry::open(&settings.database, &settings.seed_peers())?;
        let client = HttpPeerClient::new(&settings)?;
        Ok(Self::with_parts(settings, Arc::new(registry), Arc::new(client)))
    }

    pub fn with_parts(
        settings: Settings,
        registry: Arc<dyn PeerRegistry>,
        client: Arc<dyn PeerClient>,
    ) -> Self {
        info!(
            "[{}] Federation node ready (registry of record: {})",
            settings.node_url, settings.registry_url
        );
        let state = FederationState {
            dead_peers: DeadPeerCache::new(settings.federation.dead_peer_ttl),
            refresh: Arc::new(RefreshState::new(settings.federation.staleness_window)),
            settings,
            registry,
            client,
            contacting: InFlightSet::new(),
            notifying: InFlightSet::new(),
            connected_to_network: AtomicBool::new(false),
        };
        Self {
            state: Arc::new(state),
        }
    }

    pub fn state(&self) -> &Arc<FederationState> {
        &self.state
    }

    pub fn settings(&self) -> &Settings {
        &self.state.settings
    }

    /// Run a gossip cycle if the registry is stale or invalidated and no
    /// cycle is running. Returns whether this call ran one.
    ///
    /// The cycle runs on its own task: a caller going away cannot cancel it
    /// halfway. Failures are logged; callers go on with the peers we have.
    pub async fn ensure_fresh(&self) -> bool {
        let Some(ticket) = self.state.refresh.try_begin() else {
            return false;
        };

        let state = self.state.clone();
        let cycle = tokio::spawn(async move {
            let outcome = gossip::run_cycle(state, ticket.was_invalidated()).await;
            match &outcome {
                Ok(outcome) => ticket.complete(outcome.discovered_new_peers),
                Err(_) => drop(ticket),
            }
            outcome
        });

        match cycle.await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                error!("Gossip cycle failed: {}", e);
                false
            }
            Err(e) => {
                error!("Gossip cycle task failed: {}", e);
                false
            }
        }
    }

    /// Known peers, refreshed first if due
    #[instrument(skip(self), level = "debug")]
    pub async fn get_peers(&self) -> Result<PeersResponse> {
        self.ensure_fresh().await;
        let peers = self.state.registry.list_peers()?;
        let last_updated = self.state.refresh.last_updated().timestamp_millis() as f64 / 1000.0;
        Ok(PeersResponse {
            peers: peers.into_iter().collect(),
            last_updated,
        })
    }

    /// Force a gossip cycle now (unless one is already running)
    pub async fn refresh_now(&self) -> bool {
        self.state.refresh.invalidate();
        self.ensure_fresh().await
    }

    /// Handle a raw notify body from another node
    pub async fn handle_notify(&self, body: &[u8]) -> Result<NotifyOutcome> {
        let request = gossip::parse_notify(body)?;
        gossip::handle_notify(&self.state, request).await
    }

    /// Fan a search out to every known peer, refreshing the peer set first if due
    pub async fn search(&self, search_path: &str, body: Bytes) -> Result<AggregateResponse> {
        search::validate_search_path(search_path)?;
        self.ensure_fresh().await;
        let peers: BTreeSet<PeerUrl> = self.state.registry.list_peers()?;
        search::federated_search(self.state.clone(), peers, search_path, body).await
    }

    /// Our GA4GH service-info. `update_peers` lets a page load refresh the
    /// peer list; it is ignored outside federation mode.
    pub async fn service_info(&self, update_peers: bool) -> ServiceInfo {
        if update_peers && self.state.settings.federation_mode {
            self.ensure_fresh().await;
        }
        ServiceInfo {
            id: self.state.settings.service_id.clone(),
            name: "Starling Federation".to_string(),
            service_type: Some(settings::service_type()),
            description: Some(
                "Peer discovery and federated search for a Starling node.".to_string(),
            ),
            organization: Some(Organization {
                name: "Starling".to_string(),
                url: self.state.settings.node_url.to_string(),
            }),
            contact_url: None,
            version: Some(APP_VERSION.to_string()),
        }
    }

    /// Announce ourselves to the network right after startup
    pub async fn post_start_hook(&self) -> Result<()> {
        if self.state.settings.federation_mode {
            self.ensure_fresh().await;
        }
        let known = self.state.registry.list_peers()?.len();
        info!(
            "[{}] Post-start hook finished, {} peers known",
            self.state.settings.node_url, known
        );
        Ok(())
    }

    pub fn status(&self) -> Result<NodeStatus> {
        Ok(NodeStatus {
            name: APP_NAME.to_string(),
            version: APP_VERSION.to_string(),
            node_url: self.state.settings.node_url.clone(),
            connected_to_network: self.state.is_connected(),
            known_peers: self.state.registry.list_peers()?.len(),
            refresh_cycles: self.state.refresh.cycles(),
        })
    }
}
