//! Node Membership Agent
//!
//! Keeps the node's view of the cluster in step with the controller. Both
//! notification paths re-download the authoritative list rather than trusting
//! the notification payload, so a missed or duplicated notification is
//! harmless.

use crate::cluster::types::Network;
use crate::error::{Error, Result};
use crate::node::client::{NodeClient, THREE_TRIES};
use crate::node::engine::ReplicationEngine;
use crate::node::view::NetworkView;

use std::sync::Arc;
use std::time::Duration;

pub struct MembershipAgent {
    view: Arc<NetworkView>,
    engine: Arc<ReplicationEngine>,
    client: NodeClient,
    http: reqwest::Client,
    controller_url: String,
}

impl MembershipAgent {
    pub fn new(
        view: Arc<NetworkView>,
        engine: Arc<ReplicationEngine>,
        controller_url: String,
    ) -> Arc<Self> {
        Arc::new(Self {
            view,
            engine,
            client: NodeClient::new(),
            http: reqwest::Client::new(),
            controller_url,
        })
    }

    pub async fn download_network(&self) -> Result<Network> {
        let response = self
            .http
            .get(format!("{}/network", self.controller_url))
            .timeout(Duration::from_secs(5))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::Transport(format!(
                "controller answered {}",
                response.status()
            )));
        }

        Ok(response.json::<Network>().await?)
    }

    /// Initial view sync at process start. Failure is not fatal: the next
    /// membership notification re-downloads the list anyway.
    pub async fn bootstrap(&self) {
        let mut delay = Duration::from_millis(500);

        for _ in 0..THREE_TRIES {
            match self.download_network().await {
                Ok(network) => {
                    tracing::info!(
                        "Downloaded initial network: {} nodes, rf={}",
                        network.num_nodes,
                        network.replication_factor
                    );
                    self.view.adopt(network);
                    return;
                }
                Err(e) => {
                    tracing::warn!("Initial network download failed: {}", e);
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
            }
        }

        tracing::error!("Could not download the initial network; waiting for a broadcast");
    }

    /// Peer/controller notification that the membership changed. Re-download,
    /// and when the view actually differs, adopt it and rehash the shard.
    pub async fn on_network_update(&self) {
        let network = match self.download_network().await {
            Ok(network) => network,
            Err(e) => {
                tracing::error!("Failed to download network from controller: {}", e);
                return;
            }
        };

        if !self.view.differs_from(&network) {
            tracing::debug!("Network update notification, but no change detected");
            return;
        }

        tracing::info!("Network changed, rehashing local data");
        self.view.adopt(network);
        self.engine.rehash().await;
    }

    /// Controller directive after a respawn: refresh the view (no rehash —
    /// this node has nothing to redistribute yet) and pull the chunks of the
    /// 2(RF-1) neighbours that replicate the same window of ID space.
    pub async fn on_catchup(&self) {
        tracing::info!("Catchup requested, pulling chunks from adjacent nodes");

        match self.download_network().await {
            Ok(network) => {
                if self.view.differs_from(&network) {
                    self.view.adopt(network);
                }
            }
            Err(e) => tracing::error!("Failed to refresh network before catchup: {}", e),
        }

        let network = self.view.snapshot();
        let self_id = self.view.self_id();

        if network.num_nodes == 0 {
            return;
        }

        let neighbours = catchup_neighbours(self_id, network.num_nodes, network.replication_factor);
        tracing::info!("Asking nodes {:?} for their chunks", neighbours);

        for id in neighbours {
            let Some(node) = network.node_with_id(id) else {
                continue;
            };

            match self.client.fetch_chunk(&node.addr, THREE_TRIES).await {
                Ok(chunk) => self.engine.local_write_chunk(chunk),
                Err(e) => tracing::warn!("Failed to pull chunk from node {}: {}", id, e),
            }
        }
    }
}

/// The RF-1 nodes ahead of and the RF-1 nodes behind `self_id` in ID space,
/// wrap-around, deduplicated and excluding the node itself.
pub fn catchup_neighbours(self_id: u32, num_nodes: u32, replication_factor: u32) -> Vec<u32> {
    let n = i64::from(num_nodes);
    let window = i64::from(replication_factor.saturating_sub(1));
    let mut neighbours = Vec::new();

    for i in 0..window {
        let ahead = (i64::from(self_id) + 1 + i).rem_euclid(n) as u32;
        let behind = (i64::from(self_id) - 1 - i).rem_euclid(n) as u32;

        for id in [ahead, behind] {
            if id != self_id && !neighbours.contains(&id) {
                neighbours.push(id);
            }
        }
    }

    neighbours
}
