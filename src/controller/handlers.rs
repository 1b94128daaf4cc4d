//! Controller HTTP Surface
//!
//! Operator- and node-facing routes over the membership service. Every
//! response carries permissive CORS headers so the operator dashboard can be
//! served from anywhere.

use crate::cluster::types::Network;
use crate::controller::service::ControllerService;

use axum::extract::{Extension, Query};
use axum::http::{Method, StatusCode};
use axum::response::Html;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

pub fn router(service: Arc<ControllerService>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH])
        .allow_headers(Any);

    Router::new()
        .route("/network", get(handle_network))
        .route("/data", get(handle_data))
        .route("/addnode", post(handle_add_node))
        .route("/killnode", patch(handle_kill_node))
        .route("/rfupdate", patch(handle_rf_update))
        .layer(cors)
        .layer(Extension(service))
}

/// Serialized snapshot of the authoritative membership list.
async fn handle_network(
    Extension(service): Extension<Arc<ControllerService>>,
) -> Json<Network> {
    Json(service.snapshot().await)
}

/// Operator view: an HTML table of every entry in the cluster, grouped by
/// value, with the nodes holding each one and per-node entry counts.
async fn handle_data(Extension(service): Extension<Arc<ControllerService>>) -> Html<String> {
    let table = service.fetch_all_data().await;
    let num_nodes = service.snapshot().await.num_nodes;

    let mut body = String::from(
        "<table>\n<th>Value</th>\n<th>Key</th>\n<th>Owners</th>\n<tr></tr>",
    );
    let mut per_node = vec![0u32; num_nodes as usize];

    for info in table.values() {
        body.push_str(&format!(
            "\n<tr>\n<td>{}</td>\n<td>{}</td>\n<td>{:?}</td>\n</tr>",
            info.entry.value, info.entry.key, info.owners
        ));

        for &owner in &info.owners {
            if let Some(count) = per_node.get_mut(owner as usize) {
                *count += 1;
            }
        }
    }

    body.push_str("</table><br>");
    for (id, count) in per_node.iter().enumerate() {
        body.push_str(&format!("<span>Node {}: {} entries</span><br>", id, count));
    }

    Html(body)
}

#[derive(Debug, Deserialize)]
pub struct AddNodeParams {
    #[serde(default)]
    nodeurl: String,
}

/// Accepts a node for registration; verification and the eventual append
/// run asynchronously.
async fn handle_add_node(
    Extension(service): Extension<Arc<ControllerService>>,
    Query(params): Query<AddNodeParams>,
) -> (StatusCode, String) {
    if params.nodeurl.is_empty() {
        return (StatusCode::BAD_REQUEST, "Invalid params".to_string());
    }

    match service.add_node(params.nodeurl).await {
        Ok(()) => (StatusCode::CREATED, String::new()),
        Err(e) => {
            tracing::warn!("Rejecting addnode request: {}", e);
            (StatusCode::BAD_REQUEST, "Invalid params".to_string())
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct KillNodeParams {
    #[serde(rename = "nodeID", default)]
    node_id: String,
}

async fn handle_kill_node(
    Extension(service): Extension<Arc<ControllerService>>,
    Query(params): Query<KillNodeParams>,
) -> (StatusCode, String) {
    let Ok(id) = params.node_id.parse::<u32>() else {
        return (StatusCode::BAD_REQUEST, "Invalid params".to_string());
    };

    tracing::info!("Operator requested removal of node {}", id);
    service.kill_node(id);

    (StatusCode::NO_CONTENT, String::new())
}

#[derive(Debug, Deserialize)]
pub struct RfUpdateParams {
    #[serde(default)]
    rf: String,
}

async fn handle_rf_update(
    Extension(service): Extension<Arc<ControllerService>>,
    Query(params): Query<RfUpdateParams>,
) -> (StatusCode, String) {
    let Ok(rf) = params.rf.parse::<u32>() else {
        return (StatusCode::BAD_REQUEST, "Invalid params".to_string());
    };

    if service.update_rf(rf).await {
        (StatusCode::NO_CONTENT, String::new())
    } else {
        (
            StatusCode::NOT_ACCEPTABLE,
            "Replication factor is the same or invalid, nothing was changed".to_string(),
        )
    }
}
