use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use serde::Deserialize;
use tracing::{event, instrument, Level};

use crate::error::Result;
use crate::gossip::{NotifyOutcome, PeersResponse, ServiceInfo};
use crate::node::FederationNode;
use crate::search::AggregateResponse;

#[derive(Debug, Deserialize)]
pub struct ServiceInfoQuery {
    update_peers: Option<String>,
}

impl ServiceInfoQuery {
    /// Anything but the literal `true` counts as false; absent means true
    fn update_peers(&self) -> bool {
        self.update_peers
            .as_deref()
            .map(|value| value == "true")
            .unwrap_or(true)
    }
}

#[instrument(skip(state), level = "debug")]
pub async fn service_info(
    Query(query): Query<ServiceInfoQuery>,
    State(state): State<FederationNode>,
) -> Json<ServiceInfo> {
    Json(state.service_info(query.update_peers()).await)
}

#[instrument(skip(state), level = "debug")]
pub async fn list_peers(State(state): State<FederationNode>) -> Result<Json<PeersResponse>> {
    state.get_peers().await.map(Json)
}

/// Another node announcing itself
#[instrument(skip(state, body), level = "debug")]
pub async fn notify(State(state): State<FederationNode>, body: Bytes) -> Result<StatusCode> {
    match state.handle_notify(&body).await {
        Ok(NotifyOutcome::Accepted { verified, inserted }) => {
            event!(
                Level::DEBUG,
                message = "Notify processed",
                verified = verified,
                inserted = inserted
            );
            Ok(StatusCode::OK)
        }
        Ok(NotifyOutcome::Duplicate) => Ok(StatusCode::OK),
        Err(err) => {
            event!(
                Level::WARN,
                message = "Rejected notify",
                err = format!("{}", err)
            );
            Err(err)
        }
    }
}

#[instrument(skip(state), level = "info")]
pub async fn refresh_peers(State(state): State<FederationNode>) -> StatusCode {
    state.refresh_now().await;
    StatusCode::NO_CONTENT
}

#[instrument(skip(state), level = "info")]
pub async fn post_start_hook(State(state): State<FederationNode>) -> Result<StatusCode> {
    state.post_start_hook().await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, body), level = "info")]
pub async fn search_aggregate(
    Path(search_path): Path<String>,
    State(state): State<FederationNode>,
    body: Bytes,
) -> Result<Json<AggregateResponse>> {
    state.search(&search_path, body).await.map(Json)
}
