use serde::{Deserialize, Serialize};

/// A single key-value pair. Both strings are opaque to the cluster; neither
/// may be empty at the storage layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Entry {
    pub key: String,
    pub value: String,
}

/// An ordered batch of entries exchanged between nodes.
///
/// `owner` names the producing node when a chunk is exported and the intended
/// recipient when a chunk is shipped during rehash.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Chunk {
    pub entries: Vec<Entry>,
    pub owner: u32,
}

/// Lifecycle state of a node as last observed by the controller's health loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeState {
    /// Spawned but not yet confirmed healthy.
    Starting,
    /// Answered the most recent health probe.
    Ready,
    /// Missed a health probe; a replacement watcher is pending.
    Unreachable,
    /// Unreachable past the grace period. Terminal until replaced.
    Dead,
}

/// A single member of the cluster, identified by transport address and index.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Node {
    /// HTTP base URL of the node.
    pub addr: String,
    /// Index of the node in the authoritative list.
    #[serde(rename = "ID")]
    pub id: u32,
    pub state: NodeState,
}

impl Node {
    pub fn is_same_as(&self, other: &Node) -> bool {
        self.addr == other.addr && self.id == other.id
    }
}

/// The authoritative ordered list of nodes plus the replication factor.
///
/// Invariant: `nodes[i].id == i` for every i. The controller's removal path
/// re-establishes it by compacting the list and decrementing higher IDs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Network {
    pub nodes: Vec<Node>,
    pub num_nodes: u32,
    pub replication_factor: u32,
}

impl Network {
    pub fn node_with_id(&self, id: u32) -> Option<&Node> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn contains(&self, node: &Node) -> bool {
        self.nodes.iter().any(|current| current.is_same_as(node))
    }

    /// Compares this view against a freshly downloaded one. Any change in
    /// node count, replication factor or membership identity (Addr+ID)
    /// counts as different.
    pub fn differs_from(&self, downloaded: &Network) -> bool {
        if downloaded.num_nodes != self.num_nodes
            || downloaded.replication_factor != self.replication_factor
        {
            return true;
        }

        downloaded.nodes.iter().any(|node| !self.contains(node))
    }
}
