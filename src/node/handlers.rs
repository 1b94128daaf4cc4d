//! Node HTTP Surface
//!
//! Thin axum handlers over the replication engine and membership agent. The
//! public routes (`/set`, `/get`) route through placement; the `/internal/*`
//! routes are the peer-to-peer and controller-facing surface.

use crate::cluster::types::{Chunk, Entry};
use crate::error::Error;
use crate::node::agent::MembershipAgent;
use crate::node::engine::ReplicationEngine;
use crate::node::view::NetworkView;

use axum::extract::{Extension, Query};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use std::sync::Arc;

pub fn router(
    engine: Arc<ReplicationEngine>,
    agent: Arc<MembershipAgent>,
    view: Arc<NetworkView>,
) -> Router {
    Router::new()
        .route("/set", post(handle_set))
        .route("/get", get(handle_get))
        .route("/internal/set", post(handle_internal_set))
        .route("/internal/get", get(handle_internal_get))
        .route("/internal/getall", get(handle_get_all))
        .route("/internal/setchunk", post(handle_set_chunk))
        .route("/internal/healthcheck", get(handle_health_check))
        .route("/internal/networkupdate", get(handle_network_update))
        .route("/internal/catchup", post(handle_catchup))
        .layer(Extension(engine))
        .layer(Extension(agent))
        .layer(Extension(view))
}

#[derive(Debug, Deserialize)]
pub struct SetParams {
    #[serde(default)]
    key: String,
    #[serde(default)]
    value: String,
}

#[derive(Debug, Deserialize)]
pub struct GetParams {
    #[serde(default)]
    key: String,
}

/// Public write: fan out per placement, answer immediately with the current
/// write-delay estimate.
async fn handle_set(
    Extension(engine): Extension<Arc<ReplicationEngine>>,
    Query(params): Query<SetParams>,
) -> (StatusCode, String) {
    if params.key.is_empty() || params.value.is_empty() {
        return (StatusCode::BAD_REQUEST, "Invalid params".to_string());
    }

    tracing::debug!("Write request for key={}", params.key);

    let delay = engine.write(Entry {
        key: params.key,
        value: params.value,
    });

    (StatusCode::CREATED, format!("{}s", delay))
}

/// Public read with fallback across replicas.
async fn handle_get(
    Extension(engine): Extension<Arc<ReplicationEngine>>,
    Query(params): Query<GetParams>,
) -> (StatusCode, String) {
    if params.key.is_empty() {
        return (StatusCode::BAD_REQUEST, "Invalid params".to_string());
    }

    match engine.read(&params.key).await {
        Ok(entry) => (StatusCode::OK, entry.value),
        Err(Error::NotFound) => {
            tracing::debug!("No value found anywhere for key={}", params.key);
            (
                StatusCode::NOT_FOUND,
                "Failed to find a value, is the key correct?".to_string(),
            )
        }
        Err(e) => {
            tracing::error!("Read for key={} failed: {}", params.key, e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".to_string())
        }
    }
}

/// Internal write: local only, no fan-out. 406 when this node is not in the
/// entry's replica window.
async fn handle_internal_set(
    Extension(engine): Extension<Arc<ReplicationEngine>>,
    Query(params): Query<SetParams>,
) -> (StatusCode, String) {
    if params.key.is_empty() || params.value.is_empty() {
        return (StatusCode::BAD_REQUEST, "Invalid params".to_string());
    }

    match engine.local_write(Entry {
        key: params.key,
        value: params.value,
    }) {
        Ok(()) => (StatusCode::CREATED, "Success".to_string()),
        Err(Error::NotOwner) => (StatusCode::NOT_ACCEPTABLE, String::new()),
        Err(e) => {
            tracing::error!("Internal write failed: {}", e);
            (StatusCode::BAD_REQUEST, "Invalid params".to_string())
        }
    }
}

/// Internal read: local store only, serialized entry for the peer to parse.
async fn handle_internal_get(
    Extension(engine): Extension<Arc<ReplicationEngine>>,
    Query(params): Query<GetParams>,
) -> Result<Json<Entry>, StatusCode> {
    if params.key.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    match engine.local_read(&params.key) {
        Ok(entry) => Ok(Json(entry)),
        Err(Error::NotFound) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::error!("Internal read for key={} failed: {}", params.key, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Exports this node's full shard.
async fn handle_get_all(
    Extension(engine): Extension<Arc<ReplicationEngine>>,
) -> Result<Json<Chunk>, StatusCode> {
    match engine.local_chunk() {
        Ok(chunk) => Ok(Json(chunk)),
        Err(e) => {
            tracing::error!("Failed to export the local chunk: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Receives a chunk shipped by a rehashing peer. The chunk's owner field
/// must name this node; the entries are applied asynchronously.
async fn handle_set_chunk(
    Extension(engine): Extension<Arc<ReplicationEngine>>,
    Extension(view): Extension<Arc<NetworkView>>,
    Json(chunk): Json<Chunk>,
) -> StatusCode {
    if chunk.owner != view.self_id() {
        tracing::warn!(
            "Got a chunk addressed to node {}, but own ID is {}",
            chunk.owner,
            view.self_id()
        );
        return StatusCode::NOT_ACCEPTABLE;
    }

    tracing::info!("Received a chunk with {} entries", chunk.entries.len());

    tokio::spawn(async move {
        engine.local_write_chunk(chunk);
    });

    StatusCode::CREATED
}

async fn handle_health_check() -> StatusCode {
    StatusCode::OK
}

/// Membership change broadcast: re-download the list, rehash on a real diff.
/// The work runs detached; the notification itself is fire-and-forget and a
/// re-delivery is idempotent.
async fn handle_network_update(Extension(agent): Extension<Arc<MembershipAgent>>) -> StatusCode {
    tracing::info!("Network update notification received");

    tokio::spawn(async move {
        agent.on_network_update().await;
    });

    StatusCode::OK
}

/// Controller directive after a respawn: refill the shard from neighbours.
async fn handle_catchup(Extension(agent): Extension<Arc<MembershipAgent>>) -> StatusCode {
    tokio::spawn(async move {
        agent.on_catchup().await;
    });

    StatusCode::OK
}
