//! Node-Side Network View
//!
//! The node's copy of the authoritative membership list, plus its own ID.
//! Only the membership agent mutates it; everyone else reads snapshots.

use crate::cluster::types::{Network, Node};

use parking_lot::RwLock;

pub struct NetworkView {
    inner: RwLock<ViewState>,
}

struct ViewState {
    network: Network,
    self_id: u32,
}

impl NetworkView {
    pub fn new(self_id: u32) -> Self {
        Self {
            inner: RwLock::new(ViewState {
                network: Network::default(),
                self_id,
            }),
        }
    }

    pub fn snapshot(&self) -> Network {
        self.inner.read().network.clone()
    }

    pub fn self_id(&self) -> u32 {
        self.inner.read().self_id
    }

    pub fn node_with_id(&self, id: u32) -> Option<Node> {
        self.inner.read().network.node_with_id(id).cloned()
    }

    pub fn differs_from(&self, downloaded: &Network) -> bool {
        self.inner.read().network.differs_from(downloaded)
    }

    /// Replaces the view with a freshly downloaded network, re-syncing the
    /// node's own ID first: the address this node held under its old ID keeps
    /// its identity, whatever index the controller's compaction moved it to.
    pub fn adopt(&self, downloaded: Network) {
        let mut state = self.inner.write();

        let own_addr = state
            .network
            .node_with_id(state.self_id)
            .map(|node| node.addr.clone());

        if let Some(addr) = own_addr {
            if let Some(node) = downloaded.nodes.iter().find(|node| node.addr == addr) {
                if node.id != state.self_id {
                    tracing::info!("Own ID moved from {} to {}", state.self_id, node.id);
                }
                state.self_id = node.id;
            }
        }

        state.network = downloaded;
    }
}
