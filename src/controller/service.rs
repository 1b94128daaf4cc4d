//! Controller Membership Service
//!
//! Owns the authoritative `Network`. Every mutation happens under the single
//! membership mutex and ends in a broadcast; the nodes re-download the list
//! on notification, so a lost or duplicate broadcast only delays convergence.

use crate::cluster::types::{Chunk, Entry, Network, Node, NodeState};
use crate::controller::spawner::NodeSpawner;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};

pub const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(5);
pub const MAX_UNREACHABLE: Duration = Duration::from_secs(16);
pub const NEW_NODE_HEALTH_TRIES: u32 = 3;
pub const CATCHUP_NOTIFY_TRIES: u32 = 3;

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// One row of the operator's data view: an entry and every node that
/// reported holding it. Entries are grouped by value.
#[derive(Debug, Clone)]
pub struct EntryInfo {
    pub entry: Entry,
    pub owners: Vec<u32>,
}

pub struct ControllerService {
    network: Mutex<Network>,
    spawner: Arc<dyn NodeSpawner>,
    http: reqwest::Client,
}

impl ControllerService {
    pub fn new(initial: Network, spawner: Arc<dyn NodeSpawner>) -> Arc<Self> {
        Arc::new(Self {
            network: Mutex::new(initial),
            spawner,
            http: reqwest::Client::new(),
        })
    }

    pub async fn snapshot(&self) -> Network {
        self.network.lock().await.clone()
    }

    /// Spawns the periodic health monitor.
    pub fn start_monitor(self: Arc<Self>) {
        tokio::spawn(async move {
            self.monitor_loop().await;
        });
    }

    /// Registers a new node: launch the process, then verify health in the
    /// background before it ever appears in the broadcast list.
    pub async fn add_node(self: Arc<Self>, node_url: String) -> crate::error::Result<()> {
        let Some((host, port)) = split_addr_and_port(&node_url) else {
            return Err(crate::error::Error::Precondition(format!(
                "cannot parse node url {}",
                node_url
            )));
        };

        let tentative_id = self.network.lock().await.num_nodes;
        let node = Node {
            addr: node_url,
            id: tentative_id,
            state: NodeState::Starting,
        };

        if self.spawner.launch(&host, port, tentative_id) {
            let service = self.clone();
            tokio::spawn(async move {
                service.health_check_and_add(node).await;
            });
        }

        Ok(())
    }

    /// Probes the candidate until it answers, then appends it under the
    /// membership lock. A node that never becomes ready is discarded and the
    /// existing IDs are untouched.
    async fn health_check_and_add(self: Arc<Self>, mut node: Node) {
        tracing::info!("Verifying node {} is healthy before adding it", node.addr);

        let mut tries = 0;
        loop {
            if self.probe(&node.addr).await == NodeState::Ready {
                break;
            }

            tries += 1;
            if tries == NEW_NODE_HEALTH_TRIES {
                tracing::warn!(
                    "Node {} failed its health checks and will not be added",
                    node.addr
                );
                return;
            }

            tokio::time::sleep(HEALTH_CHECK_INTERVAL).await;
        }

        tracing::info!("Node {} passed its health check, adding it", node.addr);

        {
            let mut network = self.network.lock().await;
            // The ID is fixed at append time so list indices and IDs stay in
            // lockstep even when a removal ran while we were probing.
            node.id = network.nodes.len() as u32;
            node.state = NodeState::Ready;
            network.nodes.push(node);
            network.num_nodes += 1;
        }

        self.broadcast().await;
    }

    /// Accepts a new replication factor only when it actually changes and
    /// fits the current node count.
    pub async fn update_rf(&self, rf: u32) -> bool {
        {
            let mut network = self.network.lock().await;

            if rf == network.replication_factor || rf < 1 || rf > network.num_nodes {
                tracing::warn!("Ignoring same or invalid replication factor {}", rf);
                return false;
            }

            tracing::info!(
                "Changing replication factor from {} to {}",
                network.replication_factor,
                rf
            );
            network.replication_factor = rf;
        }

        self.broadcast().await;
        true
    }

    /// Operator request to drop a node; the removal itself runs detached.
    pub fn kill_node(self: Arc<Self>, id: u32) {
        tokio::spawn(async move {
            self.remove_node(id).await;
        });
    }

    /// Removes a node and compacts the list: every subsequent node shifts
    /// down one index and its ID decrements with it. This is what forces the
    /// survivors to rehash.
    pub async fn remove_node(&self, id: u32) {
        {
            let mut network = self.network.lock().await;

            let Some(index) = network.nodes.iter().position(|node| node.id == id) else {
                tracing::warn!("Cannot remove unknown node {}", id);
                return;
            };

            network.nodes.remove(index);
            for node in network.nodes.iter_mut().skip(index) {
                node.id -= 1;
            }
            network.num_nodes = network.num_nodes.saturating_sub(1);

            // A replication factor above the node count would ask placement
            // for more replicas than exist.
            if network.num_nodes > 0 && network.replication_factor > network.num_nodes {
                tracing::info!(
                    "Clamping replication factor from {} to {}",
                    network.replication_factor,
                    network.num_nodes
                );
                network.replication_factor = network.num_nodes;
            }

            tracing::info!("Network after removing node {}: {:?}", id, *network);
        }

        self.broadcast().await;
    }

    /// Fire-and-forget membership notification to every node in parallel.
    pub async fn broadcast(&self) {
        let nodes = self.network.lock().await.nodes.clone();

        for node in nodes {
            let http = self.http.clone();
            tokio::spawn(async move {
                let url = format!("{}/internal/networkupdate", node.addr);
                if let Err(e) = http.get(url).timeout(PROBE_TIMEOUT).send().await {
                    tracing::warn!(
                        "Failed to notify {} of the membership change: {}",
                        node.addr,
                        e
                    );
                }
            });
        }
    }

    /// Concurrently collects every node's chunk for the operator view.
    /// Unreachable nodes are skipped, not retried.
    pub async fn fetch_all_data(&self) -> HashMap<String, EntryInfo> {
        let nodes = self.network.lock().await.nodes.clone();
        if nodes.is_empty() {
            return HashMap::new();
        }

        let (tx, mut rx) = mpsc::channel::<Option<Chunk>>(nodes.len());

        for node in nodes {
            let http = self.http.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let chunk = fetch_chunk(&http, &node).await;
                let _ = tx.send(chunk).await;
            });
        }
        drop(tx);

        let mut chunks = Vec::new();
        while let Some(result) = rx.recv().await {
            if let Some(chunk) = result {
                chunks.push(chunk);
            }
        }

        aggregate_chunks(&chunks)
    }

    /// Health monitor: probes every non-dead node under the membership lock.
    /// A node that stops answering is marked unreachable and a replacement
    /// watcher is armed on the transition.
    async fn monitor_loop(self: Arc<Self>) {
        tracing::info!("Health monitor started");
        let mut interval = tokio::time::interval(HEALTH_CHECK_INTERVAL);

        loop {
            interval.tick().await;

            let mut network = self.network.lock().await;
            let mut watchers = Vec::new();

            for node in network.nodes.iter_mut() {
                if node.state == NodeState::Dead {
                    continue;
                }

                let observed = self.probe(&node.addr).await;

                if observed == NodeState::Unreachable && node.state != NodeState::Unreachable {
                    tracing::warn!("Node {} at {} failed its health check", node.id, node.addr);
                    watchers.push(node.id);
                }

                node.state = observed;
            }
            drop(network);

            for id in watchers {
                let service = self.clone();
                tokio::spawn(async move {
                    service.replace_after_timeout(id).await;
                });
            }
        }
    }

    /// Waits out the unreachability grace period, then declares the node
    /// dead and respawns it at the same address and ID. A spawner failure
    /// removes the node instead.
    async fn replace_after_timeout(self: Arc<Self>, id: u32) {
        tokio::time::sleep(MAX_UNREACHABLE).await;

        let mut network = self.network.lock().await;

        let Some(node) = network.nodes.iter_mut().find(|node| node.id == id) else {
            return;
        };
        if node.state != NodeState::Unreachable {
            return;
        }

        node.state = NodeState::Dead;
        let addr = node.addr.clone();
        tracing::warn!("Node {} stayed unreachable, spawning a replacement", id);

        let Some((host, port)) = split_addr_and_port(&addr) else {
            tracing::error!("Cannot parse address {} for replacement", addr);
            return;
        };

        if self.spawner.launch(&host, port, id) {
            if let Some(node) = network.nodes.iter_mut().find(|node| node.id == id) {
                node.state = NodeState::Starting;
            }
            drop(network);

            let service = self.clone();
            tokio::spawn(async move {
                service.notify_catchup(addr).await;
            });
        } else {
            drop(network);
            self.remove_node(id).await;
        }
    }

    /// Tells a freshly respawned node to pull its shard back from its
    /// neighbours. Spaced by the health interval so the node has time to
    /// come back up first.
    async fn notify_catchup(&self, addr: String) {
        for attempt in 0..CATCHUP_NOTIFY_TRIES {
            tokio::time::sleep(HEALTH_CHECK_INTERVAL).await;

            let url = format!("{}/internal/catchup", addr);
            match self.http.post(url).timeout(PROBE_TIMEOUT).send().await {
                Ok(_) => return,
                Err(e) => tracing::warn!(
                    "Failed to tell {} to catch up (try {}): {}",
                    addr,
                    attempt + 1,
                    e
                ),
            }
        }
    }

    async fn probe(&self, addr: &str) -> NodeState {
        let url = format!("{}/internal/healthcheck", addr);

        match self.http.get(url).timeout(PROBE_TIMEOUT).send().await {
            Ok(response) if response.status().is_success() => NodeState::Ready,
            Ok(response) => {
                tracing::warn!("Health check on {} answered {}", addr, response.status());
                NodeState::Unreachable
            }
            Err(e) => {
                tracing::warn!("Health check on {} failed: {}", addr, e);
                NodeState::Unreachable
            }
        }
    }
}

async fn fetch_chunk(http: &reqwest::Client, node: &Node) -> Option<Chunk> {
    let url = format!("{}/internal/getall", node.addr);

    let response = match http.get(url).timeout(PROBE_TIMEOUT).send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!("Failed to fetch data from node {}: {}", node.id, e);
            return None;
        }
    };

    if !response.status().is_success() {
        tracing::warn!("Node {} answered {} to a data fetch", node.id, response.status());
        return None;
    }

    match response.json::<Chunk>().await {
        Ok(chunk) => Some(chunk),
        Err(e) => {
            tracing::warn!("Failed to parse the chunk sent by node {}: {}", node.id, e);
            None
        }
    }
}

/// Groups chunk entries by value, collecting which nodes reported each one.
pub fn aggregate_chunks(chunks: &[Chunk]) -> HashMap<String, EntryInfo> {
    let mut table: HashMap<String, EntryInfo> = HashMap::new();

    for chunk in chunks {
        for entry in &chunk.entries {
            table
                .entry(entry.value.clone())
                .and_modify(|info| info.owners.push(chunk.owner))
                .or_insert_with(|| EntryInfo {
                    entry: entry.clone(),
                    owners: vec![chunk.owner],
                });
        }
    }

    table
}

/// Splits an HTTP base URL into host and explicit port.
pub fn split_addr_and_port(addr: &str) -> Option<(String, u16)> {
    let url = reqwest::Url::parse(addr).ok()?;
    let host = url.host_str()?.to_string();
    let port = url.port()?;

    Some((host, port))
}
