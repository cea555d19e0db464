mod base;
mod federation;

use std::borrow::Cow;

use axum::{
    error_handling::HandleErrorLayer, http::StatusCode, response::IntoResponse, routing, Router,
};
use tower::{BoxError, ServiceBuilder};
use tower_http::trace::TraceLayer;

pub mod paths;

use crate::node::FederationNode;

/// Build the HTTP API of a federation node, mounted under its base path
pub fn api(node: FederationNode) -> Router {
    let base_path = node.settings().base_path.clone();
    let api_timeout = node.settings().api_timeout;

    // Endpoints
    let mut routes = Router::new()
        .route(paths::base::HEALTH, routing::get(base::health))
        .route(paths::base::ABOUT, routing::get(base::about))
        .route(paths::SERVICE_INFO, routing::get(federation::service_info))
        .route(paths::private::POST_START_HOOK, routing::get(federation::post_start_hook));

    if node.settings().federation_mode {
        routes = routes
            // Gossip: read our peers, or notify us of yours
            .route(
                paths::PEERS,
                routing::get(federation::list_peers).post(federation::notify),
            )
            .route(paths::SEARCH_AGGREGATE, routing::post(federation::search_aggregate))
            .route(paths::private::REFRESH_PEERS, routing::post(federation::refresh_peers));
    }

    let routes = routes
        .layer(
            ServiceBuilder::new()
                // Handle errors from middleware
                .layer(HandleErrorLayer::new(handle_error))
                .load_shed()
                .timeout(api_timeout),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(node);

    if base_path.is_empty() {
        routes
    } else {
        Router::new().nest(&base_path, routes)
    }
}

async fn handle_error(error: BoxError) -> impl IntoResponse {
    if error.is::<tower::timeout::error::Elapsed>() {
        return (StatusCode::REQUEST_TIMEOUT, Cow::from("request timed out"));
    }

    if error.is::<tower::load_shed::error::Overloaded>() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Cow::from("service is overloaded, try again later"),
        );
    }

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Cow::from(format!("Unhandled internal error: {}", error)),
    )
}
