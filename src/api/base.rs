use axum::extract::State;
use tracing::instrument;

use crate::error::Result;
use crate::node::{FederationNode, NodeStatus};

pub async fn health() -> &'static str {
    "OK"
}

#[instrument(skip(state))]
pub async fn about(State(state): State<FederationNode>) -> Result<axum::Json<NodeStatus>> {
    state.status().map(axum::Json)
}
