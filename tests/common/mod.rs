//! Scripted in-memory network shared by the integration tests
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;

use starling::error::PeerError;
use starling::gossip::{NotifyRequest, ServiceInfo};
use starling::node::FederationNode;
use starling::peers::{PeerUrl, SqlitePeerRegistry};
use starling::settings::{self, Settings};
use starling::transport::{PeerClient, PeerResult};

pub fn peer(raw: &str) -> PeerUrl {
    PeerUrl::parse(raw).unwrap()
}

/// How a scripted peer behaves
#[derive(Clone, Debug)]
pub struct MockPeer {
    pub peers: Vec<PeerUrl>,
    pub service_type: Option<String>,
    pub search: Option<Value>,
    pub failure: Option<PeerError>,
    pub delay: Option<Duration>,
}

impl MockPeer {
    /// A healthy federation node reporting `peers`
    pub fn node(peers: &[&str]) -> Self {
        Self {
            peers: peers.iter().map(|raw| peer(raw)).collect(),
            service_type: Some(settings::service_type()),
            search: None,
            failure: None,
            delay: None,
        }
    }

    pub fn down() -> Self {
        Self::node(&[]).failing(PeerError::Connection("connection refused".to_string()))
    }

    pub fn failing(mut self, failure: PeerError) -> Self {
        self.failure = Some(failure);
        self
    }

    pub fn with_type(mut self, service_type: &str) -> Self {
        self.service_type = Some(service_type.to_string());
        self
    }

    /// Reachable, but its service-info carries no usable `type`
    pub fn untyped(mut self) -> Self {
        self.service_type = None;
        self
    }

    pub fn with_search(mut self, answer: Value) -> Self {
        self.search = Some(answer);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Call {
    Notify,
    FetchPeers,
    ServiceInfo,
    Search,
}

#[derive(Debug, Default)]
pub struct MockNetwork {
    peers: Mutex<HashMap<PeerUrl, MockPeer>>,
    calls: Mutex<HashMap<(Call, PeerUrl), usize>>,
    notifications: Mutex<Vec<(PeerUrl, NotifyRequest)>>,
}

impl MockNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add(&self, url: &str, mock: MockPeer) {
        self.peers.lock().unwrap().insert(peer(url), mock);
    }

    pub fn calls(&self, call: Call, url: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(&(call, peer(url)))
            .copied()
            .unwrap_or(0)
    }

    pub fn total_calls(&self, call: Call) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|((kind, _), _)| *kind == call)
            .map(|(_, count)| *count)
            .sum()
    }

    /// Notify bodies received by `url`
    pub fn notifications_to(&self, url: &str) -> Vec<NotifyRequest> {
        let target = peer(url);
        self.notifications
            .lock()
            .unwrap()
            .iter()
            .filter(|(to, _)| *to == target)
            .map(|(_, request)| request.clone())
            .collect()
    }

    /// Record the call, wait out the scripted delay and hand back the script
    async fn answer(&self, call: Call, url: &PeerUrl) -> PeerResult<MockPeer> {
        *self.calls.lock().unwrap().entry((call, url.clone())).or_insert(0) += 1;
        let mock = self.peers.lock().unwrap().get(url).cloned();
        let Some(mock) = mock else {
            return Err(PeerError::Connection(format!("no route to {}", url)));
        };
        if let Some(delay) = mock.delay {
            tokio::time::sleep(delay).await;
        }
        match &mock.failure {
            Some(failure) => Err(failure.clone()),
            None => Ok(mock),
        }
    }
}

#[async_trait]
impl PeerClient for MockNetwork {
    async fn notify(&self, peer: &PeerUrl, request: &NotifyRequest) -> PeerResult<()> {
        self.answer(Call::Notify, peer).await?;
        self.notifications
            .lock()
            .unwrap()
            .push((peer.clone(), request.clone()));
        Ok(())
    }

    async fn fetch_peers(&self, peer: &PeerUrl) -> PeerResult<Vec<PeerUrl>> {
        Ok(self.answer(Call::FetchPeers, peer).await?.peers)
    }

    async fn service_info(&self, peer: &PeerUrl, _update_peers: bool) -> PeerResult<ServiceInfo> {
        let mock = self.answer(Call::ServiceInfo, peer).await?;
        Ok(ServiceInfo {
            id: format!("{}service-info", peer),
            name: "mock".to_string(),
            service_type: mock.service_type,
            description: None,
            organization: None,
            contact_url: None,
            version: None,
        })
    }

    async fn search(&self, peer: &PeerUrl, _search_path: &str, _body: Bytes) -> PeerResult<Value> {
        let mock = self.answer(Call::Search, peer).await?;
        mock.search.ok_or_else(|| PeerError::BadStatus(404))
    }
}

pub const NODE: &str = "http://node.example.org/";
pub const REGISTRY: &str = "http://registry.example.org/";

pub fn test_settings() -> Settings {
    let mut settings = Settings::for_node(peer(NODE), peer(REGISTRY));
    settings.federation.workers = 4;
    settings.federation.peer_timeout = Duration::from_secs(5);
    settings
}

/// Node with an in-memory registry talking to `network`
pub fn mock_node(settings: Settings, network: &Arc<MockNetwork>) -> FederationNode {
    let registry = SqlitePeerRegistry::open_in_memory(&settings.seed_peers()).unwrap();
    FederationNode::with_parts(settings, Arc::new(registry), network.clone())
}

pub fn known_peers(node: &FederationNode) -> Vec<String> {
    node.state()
        .registry
        .list_peers()
        .unwrap()
        .into_iter()
        .map(|peer| peer.to_string())
        .collect()
}
