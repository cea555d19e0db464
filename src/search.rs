//! Federated search: send one query to every known peer and merge what
//! comes back.
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

use crate::api_error;
use crate::error::Result;
use crate::node::FederationState;
use crate::peers::PeerUrl;
use crate::queue::WorkQueue;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerCounts {
    pub responded: usize,
    pub total: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AggregateResponse {
    pub results: Vec<Value>,
    pub peers: PeerCounts,
}

/// Search paths are relative API paths: letters, digits, `-`, `_` and `/`.
pub fn validate_search_path(search_path: &str) -> Result<&str> {
    let trimmed = search_path.trim_start_matches('/');
    let valid = !trimmed.is_empty()
        && !trimmed.split('/').any(|segment| segment == "..")
        && trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '/'));
    if valid {
        Ok(trimmed)
    } else {
        Err(api_error!("Invalid search path '{}'", search_path))
    }
}

/// Fan `body` out to every peer; peers that fail count as not responding.
#[instrument(skip(node, peers, body), level = "info")]
pub async fn federated_search(
    node: Arc<FederationState>,
    peers: BTreeSet<PeerUrl>,
    search_path: &str,
    body: Bytes,
) -> Result<AggregateResponse> {
    let search_path: Arc<str> = Arc::from(validate_search_path(search_path)?);
    let total = peers.len();
    let queue: Arc<WorkQueue<PeerUrl>> = Arc::new(WorkQueue::new());
    for peer in peers {
        let _ = queue.put(peer);
    }

    let responses: Arc<Mutex<Vec<Option<Value>>>> = Arc::new(Mutex::new(Vec::with_capacity(total)));
    let mut pool = JoinSet::new();
    for _ in 0..node.settings.federation.workers.max(1) {
        let node = node.clone();
        let queue = queue.clone();
        let responses = responses.clone();
        let search_path = search_path.clone();
        let body = body.clone();
        pool.spawn(async move {
            while let Some(peer) = queue.get().await {
                let answer = match node.client.search(&peer, &search_path, body.clone()).await {
                    Ok(value) => Some(value),
                    Err(e) => {
                        warn!("Connection issue or timeout with peer {}: {}", peer, e);
                        None
                    }
                };
                responses
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(answer);
                queue.task_done();
            }
        });
    }

    queue.join().await;
    queue.close();
    while let Some(res) = pool.join_next().await {
        if let Err(e) = res {
            error!("Search worker failed: {}", e);
        }
    }

    let responses = std::mem::take(&mut *responses.lock().unwrap_or_else(PoisonError::into_inner));
    let aggregate = aggregate(responses, total)?;
    info!(
        "Search on {} answered by {}/{} peers with {} results",
        search_path,
        aggregate.peers.responded,
        aggregate.peers.total,
        aggregate.results.len()
    );
    Ok(aggregate)
}

/// Merge peer answers (`None` = that peer failed).
///
/// Each answer's `results` keep their order; a successful answer without a
/// `results` array fails the whole search.
pub fn aggregate(responses: Vec<Option<Value>>, total: usize) -> Result<AggregateResponse> {
    let mut results = Vec::new();
    let mut responded = 0;
    for response in responses.into_iter().flatten() {
        match response {
            Value::Object(mut body) => match body.remove("results") {
                Some(Value::Array(items)) => {
                    responded += 1;
                    results.extend(items);
                }
                _ => return Err(api_error!("Peer response is missing a results array")),
            },
            other => {
                debug!("Unexpected peer response: {}", other);
                return Err(api_error!("Peer response is not a JSON object"));
            }
        }
    }
    Ok(AggregateResponse {
        results,
        peers: PeerCounts { responded, total },
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_aggregate_skips_failed_peers() {
        let responses = vec![
            Some(json!({"results": [1, 2]})),
            None,
            Some(json!({"results": [3]})),
        ];
        let aggregate = aggregate(responses, 3).unwrap();
        assert_eq!(aggregate.results, vec![json!(1), json!(2), json!(3)]);
        assert_eq!(aggregate.peers, PeerCounts { responded: 2, total: 3 });
    }

    #[test]
    fn test_aggregate_rejects_missing_results() {
        let responses = vec![Some(json!({"results": [1]})), Some(json!({"hits": []}))];
        assert!(aggregate(responses, 2).is_err());
        assert!(aggregate(vec![Some(json!([1, 2]))], 1).is_err());
        assert!(aggregate(vec![Some(json!({"results": "x"}))], 1).is_err());
    }

    #[test]
    fn test_aggregate_all_failed() {
        let aggregate = aggregate(vec![None, None], 2).unwrap();
        assert!(aggregate.results.is_empty());
        assert_eq!(aggregate.peers.responded, 0);
    }

    #[test]
    fn test_wire_shape() {
        let aggregate = aggregate(vec![Some(json!({"results": ["a"]}))], 1).unwrap();
        assert_eq!(
            serde_json::to_value(&aggregate).unwrap(),
            json!({"results": ["a"], "peers": {"responded": 1, "total": 1}})
        );
    }

    #[test]
    fn test_search_path_validation() {
        assert_eq!(validate_search_path("dataset-search").unwrap(), "dataset-search");
        assert_eq!(validate_search_path("/private/search_1").unwrap(), "private/search_1");
        assert!(validate_search_path("").is_err());
        assert!(validate_search_path("../secrets").is_err());
        assert!(validate_search_path("a?b=c").is_err());
    }
}
