mod common;

use std::time::Duration;

use axum::http::StatusCode;
use common::{
    known_peers, mock_node, peer, test_settings, Call, MockNetwork, MockPeer, NODE, REGISTRY,
};
use starling::gossip::NotifyOutcome;

const SENDER: &str = "http://sender.example.org/";
const GOOD: &str = "http://good.example.org/";
const BEACON: &str = "http://beacon.example.org/";
const GONE: &str = "http://gone.example.org/";

fn notify_body(peers: &[&str]) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({ "self": SENDER, "peers": peers })).unwrap()
}

#[tokio::test]
async fn test_only_compatible_peers_are_recorded() {
    let network = MockNetwork::new();
    network.add(GOOD, MockPeer::node(&[]));
    network.add(BEACON, MockPeer::node(&[]).with_type("org.ga4gh:beacon:1.0.0"));
    let node = mock_node(test_settings(), &network);

    let outcome = node
        .handle_notify(&notify_body(&[GOOD, BEACON, NODE]))
        .await
        .unwrap();

    assert_eq!(outcome, NotifyOutcome::Accepted { verified: 1, inserted: 1 });
    assert_eq!(known_peers(&node), vec![GOOD, NODE, REGISTRY]);
    // Our own address is never verified
    assert_eq!(network.calls(Call::ServiceInfo, NODE), 0);
    // Nor does a notify contact the sender itself
    assert_eq!(network.calls(Call::ServiceInfo, SENDER), 0);
    assert!(node.state().refresh.is_invalidated());
}

#[tokio::test]
async fn test_known_peers_do_not_invalidate() {
    let network = MockNetwork::new();
    network.add(REGISTRY, MockPeer::node(&[]));
    let node = mock_node(test_settings(), &network);

    let outcome = node
        .handle_notify(&notify_body(&[REGISTRY, REGISTRY]))
        .await
        .unwrap();

    assert_eq!(outcome, NotifyOutcome::Accepted { verified: 1, inserted: 0 });
    assert_eq!(network.calls(Call::ServiceInfo, REGISTRY), 1);
    assert!(!node.state().refresh.is_invalidated());
}

#[tokio::test]
async fn test_unreachable_peer_marked_dead() {
    let network = MockNetwork::new();
    network.add(GONE, MockPeer::down());
    let node = mock_node(test_settings(), &network);

    let outcome = node.handle_notify(&notify_body(&[GONE])).await.unwrap();
    assert_eq!(outcome, NotifyOutcome::Accepted { verified: 0, inserted: 0 });
    assert!(node.state().dead_peers.is_dead(&peer(GONE)));

    // Within the TTL the dead peer is not contacted again
    node.handle_notify(&notify_body(&[GONE])).await.unwrap();
    assert_eq!(network.calls(Call::ServiceInfo, GONE), 1);
    assert!(!known_peers(&node).contains(&GONE.to_string()));
}

#[tokio::test]
async fn test_untyped_peer_is_a_mismatch_not_a_failure() {
    let network = MockNetwork::new();
    network.add(BEACON, MockPeer::node(&[]).untyped());
    let node = mock_node(test_settings(), &network);

    let outcome = node.handle_notify(&notify_body(&[BEACON])).await.unwrap();

    assert_eq!(outcome, NotifyOutcome::Accepted { verified: 0, inserted: 0 });
    assert!(!known_peers(&node).contains(&BEACON.to_string()));
    assert!(!node.state().dead_peers.is_dead(&peer(BEACON)));

    // Still reachable, so the next notify checks it again
    node.handle_notify(&notify_body(&[BEACON])).await.unwrap();
    assert_eq!(network.calls(Call::ServiceInfo, BEACON), 2);
}

#[tokio::test(start_paused = true)]
async fn test_dead_peer_checked_again_after_ttl() {
    let network = MockNetwork::new();
    network.add(GONE, MockPeer::down());
    let node = mock_node(test_settings(), &network);

    node.handle_notify(&notify_body(&[GONE])).await.unwrap();
    assert_eq!(network.calls(Call::ServiceInfo, GONE), 1);

    tokio::time::advance(Duration::from_secs(29)).await;
    node.handle_notify(&notify_body(&[GONE])).await.unwrap();
    assert_eq!(network.calls(Call::ServiceInfo, GONE), 1);

    // Back up once the TTL has passed
    network.add(GONE, MockPeer::node(&[]));
    tokio::time::advance(Duration::from_secs(2)).await;
    let outcome = node.handle_notify(&notify_body(&[GONE])).await.unwrap();
    assert_eq!(outcome, NotifyOutcome::Accepted { verified: 1, inserted: 1 });
    assert_eq!(network.calls(Call::ServiceInfo, GONE), 2);
}

#[tokio::test]
async fn test_bad_peer_entries_are_dropped() {
    let network = MockNetwork::new();
    network.add(GOOD, MockPeer::node(&[]));
    let node = mock_node(test_settings(), &network);

    let body = serde_json::json!({ "self": SENDER, "peers": ["not a url", 42, GOOD] });
    let outcome = node
        .handle_notify(&serde_json::to_vec(&body).unwrap())
        .await
        .unwrap();

    assert_eq!(outcome, NotifyOutcome::Accepted { verified: 1, inserted: 1 });
    assert_eq!(known_peers(&node), vec![GOOD, NODE, REGISTRY]);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_notify_from_one_sender_verified_once() {
    let network = MockNetwork::new();
    network.add(GOOD, MockPeer::node(&[]).with_delay(Duration::from_millis(100)));
    let node = mock_node(test_settings(), &network);

    let body = notify_body(&[GOOD]);
    let (first, second) = tokio::join!(node.handle_notify(&body), node.handle_notify(&body));

    let mut outcomes = vec![first.unwrap(), second.unwrap()];
    outcomes.sort_by_key(|outcome| matches!(outcome, NotifyOutcome::Duplicate));
    assert_eq!(
        outcomes,
        vec![
            NotifyOutcome::Accepted { verified: 1, inserted: 1 },
            NotifyOutcome::Duplicate
        ]
    );
    assert_eq!(network.calls(Call::ServiceInfo, GOOD), 1);
    assert!(node.state().notifying.is_empty());

    // Once finished, the same sender is processed again
    let again = node.handle_notify(&body).await.unwrap();
    assert_eq!(again, NotifyOutcome::Accepted { verified: 1, inserted: 0 });
}

#[tokio::test]
async fn test_malformed_notify_is_rejected() {
    let network = MockNetwork::new();
    let node = mock_node(test_settings(), &network);

    let bodies: [&[u8]; 5] = [
        b"not json",
        br#"{"peers": []}"#,
        br#"{"self": "http://sender.example.org/"}"#,
        br#"{"self": "ftp://sender.example.org/", "peers": []}"#,
        br#"{"self": "http://sender.example.org/", "peers": "http://good.example.org/"}"#,
    ];
    for body in bodies {
        let err = node.handle_notify(body).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
    assert_eq!(network.total_calls(Call::ServiceInfo), 0);
}
