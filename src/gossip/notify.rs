//! Inbound half of gossip: another node announcing itself and its peers.
use std::collections::HashSet;

use tracing::{debug, info, instrument, warn};

use super::messages::NotifyRequest;
use crate::api_error;
use crate::error::Result;
use crate::node::FederationState;
use crate::settings;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NotifyOutcome {
    /// Processed; counts of peers that proved compatible and that were new to us
    Accepted { verified: usize, inserted: usize },
    /// A notify from the same sender is already being processed
    Duplicate,
}

/// Parse a notify body; anything but `{"self": url, "peers": [url, ...]}` is rejected.
pub fn parse_notify(body: &[u8]) -> Result<NotifyRequest> {
    serde_json::from_slice(body).map_err(|e| api_error!("Malformed notify body: {}", e))
}

/// Verify and record the peers a node told us about.
///
/// A referenced peer is only added once its service-info shows it speaks
/// our protocol. Unreachable peers are marked dead and otherwise ignored.
#[instrument(skip(node, request), fields(sender = %request.self_url), level = "info")]
pub async fn handle_notify(
    node: &FederationState,
    request: NotifyRequest,
) -> Result<NotifyOutcome> {
    let Some(_notifying) = node.notifying.try_claim(&request.self_url) else {
        debug!("Notify from {} already in flight, acknowledging", request.self_url);
        return Ok(NotifyOutcome::Duplicate);
    };

    let protocol_tag = settings::protocol_tag();
    let mut attempted = HashSet::from([node.settings.node_url.clone()]);
    let mut verified = 0;
    let mut inserted = 0;

    for peer in request.peers {
        if !attempted.insert(peer.clone()) {
            continue;
        }
        if node.dead_peers.is_dead(&peer) {
            debug!("Not verifying recently dead peer {}", peer);
            continue;
        }

        match node.client.service_info(&peer, false).await {
            Ok(info) if info.speaks(&protocol_tag) => {
                verified += 1;
                if node.registry.insert_peer(&peer)? {
                    info!("Learned new peer {} from {}", peer, request.self_url);
                    node.refresh.invalidate();
                    inserted += 1;
                }
            }
            Ok(info) => {
                debug!(
                    "Peer {} is reachable but is a '{}' service, ignoring",
                    peer,
                    info.service_type.as_deref().unwrap_or("untyped")
                );
            }
            Err(e) => {
                warn!(
                    "Error when processing notify from {}: peer {} failed: {}",
                    request.self_url, peer, e
                );
                node.dead_peers.mark_dead(&peer);
            }
        }
    }

    Ok(NotifyOutcome::Accepted { verified, inserted })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_notify_rejects_garbage() {
        assert!(parse_notify(b"not json").is_err());
        assert!(parse_notify(br#"{"self": "http://a.example.org/"}"#).is_err());
        assert!(parse_notify(br#"{"self": "nope", "peers": []}"#).is_err());

        let request =
            parse_notify(br#"{"self": "http://a.example.org/", "peers": ["http://b.example.org/"]}"#)
                .unwrap();
        assert_eq!(request.peers.len(), 1);
    }

    #[test]
    fn test_parse_error_is_client_error() {
        let err = parse_notify(b"{}").unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }
}
