mod common;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use common::{mock_node, test_settings, Call, MockNetwork, MockPeer, NODE, REGISTRY};
use starling::api;
use starling::node::FederationNode;
use starling::settings::protocol_tag;

fn router(node: &FederationNode) -> Router {
    api::api(node.clone())
}

async fn send(node: &FederationNode, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = router(node).oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn quiet_node() -> (FederationNode, std::sync::Arc<MockNetwork>) {
    let network = MockNetwork::new();
    network.add(
        REGISTRY,
        MockPeer::node(&[NODE, REGISTRY]).with_search(serde_json::json!({"results": ["r"]})),
    );
    network.add(NODE, MockPeer::node(&[]).with_search(serde_json::json!({"results": ["n"]})));
    (mock_node(test_settings(), &network), network)
}

#[tokio::test]
async fn test_health() {
    let (node, _) = quiet_node();
    let (status, body) = send(&node, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"OK");
}

#[tokio::test]
async fn test_service_info_without_refresh() {
    let (node, network) = quiet_node();
    let (status, body) = send(&node, get("/service-info?update_peers=false")).await;
    assert_eq!(status, StatusCode::OK);

    let info: Value = serde_json::from_slice(&body).unwrap();
    assert!(info["type"].as_str().unwrap().contains(&protocol_tag()));
    assert_eq!(network.total_calls(Call::Notify), 0);

    // Any value other than "true" disables the refresh too
    send(&node, get("/service-info?update_peers=no")).await;
    assert_eq!(network.total_calls(Call::Notify), 0);

    send(&node, get("/service-info")).await;
    assert_eq!(network.total_calls(Call::Notify), 1);
}

#[tokio::test]
async fn test_list_peers() {
    let (node, _) = quiet_node();
    let (status, body) = send(&node, get("/peers")).await;
    assert_eq!(status, StatusCode::OK);

    let peers: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(peers["peers"], serde_json::json!([NODE, REGISTRY]));
    assert!(peers["last_updated"].as_f64().unwrap() > 0.0);
}

#[tokio::test]
async fn test_malformed_notify_is_bad_request() {
    let (node, _) = quiet_node();
    let (status, body) = send(&node, post("/peers", "{\"self\": 12}")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let error: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["error"]["code"], 400);
    assert_eq!(error["error"]["type"], "api_error");
}

#[tokio::test]
async fn test_notify_accepted() {
    let (node, _) = quiet_node();
    let body = format!(r#"{{"self": "{}", "peers": ["{}"]}}"#, REGISTRY, REGISTRY);
    let (status, _) = send(&node, post("/peers", &body)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_search_aggregate() {
    let (node, _) = quiet_node();
    let (status, body) = send(&node, post("/search-aggregate/dataset-search", "{}")).await;
    assert_eq!(status, StatusCode::OK);

    let aggregate: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(aggregate["peers"]["responded"], 2);
    assert_eq!(aggregate["peers"]["total"], 2);
    assert_eq!(aggregate["results"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_search_aggregate_rejects_bad_path() {
    let (node, network) = quiet_node();
    let (status, _) = send(&node, post("/search-aggregate/a%3Fb", "{}")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(network.total_calls(Call::Search), 0);
}

#[tokio::test]
async fn test_private_hooks() {
    let (node, network) = quiet_node();
    let (status, _) = send(&node, post("/private/peers/refresh", "")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(network.calls(Call::Notify, REGISTRY), 1);

    let (status, _) = send(&node, get("/private/post-start-hook")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_about() {
    let (node, _) = quiet_node();
    let (status, body) = send(&node, get("/about")).await;
    assert_eq!(status, StatusCode::OK);

    let about: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(about["node_url"], NODE);
    assert_eq!(about["known_peers"], 2);
}

#[tokio::test]
async fn test_routes_nested_under_base_path() {
    let network = MockNetwork::new();
    let mut settings = test_settings();
    settings.base_path = "/federation".to_string();
    let node = mock_node(settings, &network);

    let (status, _) = send(&node, get("/federation/health")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&node, get("/health")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_federation_mode_off_serves_service_info_only() {
    let network = MockNetwork::new();
    network.add(REGISTRY, MockPeer::node(&[NODE, REGISTRY]));
    let mut settings = test_settings();
    settings.federation_mode = false;
    let node = mock_node(settings, &network);

    let (status, _) = send(&node, get("/service-info")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&node, get("/private/post-start-hook")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    for request in [
        get("/peers"),
        post("/peers", "{}"),
        post("/search-aggregate/dataset-search", "{}"),
        post("/private/peers/refresh", ""),
    ] {
        let (status, _) = send(&node, request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
    assert_eq!(network.total_calls(Call::Notify), 0);
}
