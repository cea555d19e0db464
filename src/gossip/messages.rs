//! JSON bodies exchanged between peers
use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::peers::PeerUrl;

/// `POST {peer}/peers`: a node announcing itself and the peers it knows.
///
/// `self` must be a valid address; unusable entries in `peers` are dropped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyRequest {
    #[serde(rename = "self")]
    pub self_url: PeerUrl,
    #[serde(deserialize_with = "lenient_peer_list")]
    pub peers: Vec<PeerUrl>,
}

/// `GET {peer}/peers`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PeersResponse {
    pub peers: Vec<PeerUrl>,
    /// Unix seconds of the last completed refresh
    pub last_updated: f64,
}

/// Lenient form of [`PeersResponse`] used when reading another node's list:
/// one bad entry must not discard the rest.
#[derive(Clone, Debug, Deserialize)]
pub struct RawPeersResponse {
    #[serde(deserialize_with = "lenient_peer_list")]
    pub peers: Vec<PeerUrl>,
}

impl RawPeersResponse {
    pub fn into_peers(self) -> Vec<PeerUrl> {
        self.peers
    }
}

/// Keep the entries of a JSON peer list that are valid addresses
pub fn parse_peer_list(raw: Vec<Value>) -> Vec<PeerUrl> {
    raw.into_iter()
        .filter_map(|entry| match entry.as_str().map(PeerUrl::parse) {
            Some(Ok(peer)) => Some(peer),
            Some(Err(e)) => {
                debug!("Dropping malformed peer address {}: {}", entry, e);
                None
            }
            None => {
                debug!("Dropping non-string peer entry {}", entry);
                None
            }
        })
        .collect()
}

/// The list itself must be an array; its entries are filtered
fn lenient_peer_list<'de, D>(deserializer: D) -> Result<Vec<PeerUrl>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<Value>::deserialize(deserializer)?;
    Ok(parse_peer_list(raw))
}

/// A field of the wrong shape reads as absent
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| serde_json::from_value(value).ok()))
}

fn lenient_or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    Ok(lenient(deserializer)?.unwrap_or_default())
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub name: String,
    pub url: String,
}

/// GA4GH service-info document.
///
/// Reading a peer's document never fails on its fields: a missing or
/// non-string `type` just means the peer does not speak our protocol.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub name: String,
    #[serde(
        default,
        rename = "type",
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub service_type: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub organization: Option<Organization>,
    #[serde(
        default,
        rename = "contactUrl",
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub contact_url: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub version: Option<String>,
}

impl ServiceInfo {
    /// Whether the document advertises the given protocol tag
    pub fn speaks(&self, protocol_tag: &str) -> bool {
        self.service_type
            .as_deref()
            .is_some_and(|service_type| service_type.contains(protocol_tag))
    }
}
