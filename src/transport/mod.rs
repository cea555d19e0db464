//! Outbound calls to other nodes.
//!
//! The gossip and search engines only talk to peers through [`PeerClient`],
//! so the HTTP stack can be swapped out (tests use a scripted in-memory one).
pub mod http;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;

use crate::error::PeerError;
use crate::gossip::messages::{NotifyRequest, ServiceInfo};
use crate::peers::PeerUrl;

pub use http::HttpPeerClient;

pub type PeerResult<T> = std::result::Result<T, PeerError>;

#[async_trait]
pub trait PeerClient: Send + Sync + std::fmt::Debug {
    /// Announce ourselves and our peers to `peer`
    async fn notify(&self, peer: &PeerUrl, request: &NotifyRequest) -> PeerResult<()>;

    /// Read `peer`'s own peer list
    async fn fetch_peers(&self, peer: &PeerUrl) -> PeerResult<Vec<PeerUrl>>;

    /// Read `peer`'s service-info; `update_peers = false` must not trigger a
    /// refresh on the other side.
    async fn service_info(&self, peer: &PeerUrl, update_peers: bool) -> PeerResult<ServiceInfo>;

    /// Forward a search body to `peer` and return its JSON answer
    async fn search(&self, peer: &PeerUrl, search_path: &str, body: Bytes) -> PeerResult<Value>;
}
