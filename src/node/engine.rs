//! Replication Engine
//!
//! The node-side data path: routes every write to the replica window derived
//! from the current view, serves reads from cache, local store or peers, and
//! re-distributes the local shard when the topology changes.

use crate::cluster::placement::replica_set;
use crate::cluster::types::{Chunk, Entry};
use crate::error::{Error, Result};
use crate::node::client::{NodeClient, SINGLE_TRY, THREE_TRIES};
use crate::node::view::NetworkView;
use crate::storage::cache::LruTtlCache;
use crate::storage::store::KvStore;
use crate::storage::writer::DurableWriter;

use std::collections::HashMap;
use std::sync::Arc;

pub struct ReplicationEngine {
    view: Arc<NetworkView>,
    store: Arc<KvStore>,
    writer: Arc<DurableWriter>,
    cache: Arc<LruTtlCache>,
    client: NodeClient,
}

impl ReplicationEngine {
    pub fn new(
        view: Arc<NetworkView>,
        store: Arc<KvStore>,
        writer: Arc<DurableWriter>,
        cache: Arc<LruTtlCache>,
    ) -> Arc<Self> {
        Arc::new(Self {
            view,
            store,
            writer,
            cache,
            client: NodeClient::new(),
        })
    }

    /// Client-facing write: applies locally when this node is in the window
    /// and dispatches one single-try forward per remote replica. Forwards are
    /// independent and unacknowledged; durability rests with each replica's
    /// own local path. Returns the current write-delay estimate immediately.
    pub fn write(&self, entry: Entry) -> u64 {
        let network = self.view.snapshot();
        let self_id = self.view.self_id();
        let replicas = replica_set(&entry.key, network.num_nodes, network.replication_factor);

        tracing::debug!("Entry {} will be written to nodes {:?}", entry.key, replicas);

        for id in replicas {
            if id == self_id {
                if let Err(e) = self.local_write(entry.clone()) {
                    tracing::warn!("Local write for key {} failed: {}", entry.key, e);
                }
            } else if let Some(node) = network.node_with_id(id) {
                let client = self.client.clone();
                let addr = node.addr.clone();
                let entry = entry.clone();

                tokio::spawn(async move {
                    if let Err(e) = client.send_entry(&addr, &entry, SINGLE_TRY).await {
                        tracing::warn!("Failed to forward key {} to {}: {}", entry.key, addr, e);
                    }
                });
            }
        }

        self.writer.approx_write_delay_secs()
    }

    /// Write without fan-out. Rejects entries whose replica window does not
    /// contain this node. The durable commit itself is asynchronous.
    pub fn local_write(&self, entry: Entry) -> Result<()> {
        if entry.key.is_empty() || entry.value.is_empty() {
            return Err(Error::Precondition(
                "cannot write an entry with an empty key or value".to_string(),
            ));
        }

        let network = self.view.snapshot();
        let replicas = replica_set(&entry.key, network.num_nodes, network.replication_factor);

        if !replicas.contains(&self.view.self_id()) {
            tracing::warn!(
                "Rejecting local write for key {}: node {} is not in its window {:?}",
                entry.key,
                self.view.self_id(),
                replicas
            );
            return Err(Error::NotOwner);
        }

        // A stale cached copy would otherwise outlive the overwrite.
        self.cache.update_value(&entry);
        self.writer.enqueue_write(entry);

        Ok(())
    }

    /// Routed read: cache, then the local store when this node is a replica,
    /// then each remaining replica in window order until one answers.
    pub async fn read(&self, key: &str) -> Result<Entry> {
        if key.is_empty() {
            return Err(Error::Precondition("cannot read an empty key".to_string()));
        }

        if let Some(entry) = self.cache.find(key) {
            return Ok(entry);
        }

        let network = self.view.snapshot();
        let self_id = self.view.self_id();
        let replicas = replica_set(key, network.num_nodes, network.replication_factor);

        if replicas.contains(&self_id) {
            match self.store.get(key) {
                Ok(Some(entry)) => {
                    self.cache.add(entry.clone());
                    return Ok(entry);
                }
                Ok(None) => {}
                Err(e) => tracing::error!("Local store read for key {} failed: {}", key, e),
            }
        }

        for id in replicas.into_iter().filter(|id| *id != self_id) {
            let Some(node) = network.node_with_id(id) else {
                continue;
            };

            match self.client.fetch_entry(&node.addr, key).await {
                Ok(Some(entry)) => return Ok(entry),
                Ok(None) => {
                    tracing::debug!("Node {} does not hold key {}", id, key);
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to fetch key {} from node {}, trying the next replica: {}",
                        key,
                        id,
                        e
                    );
                }
            }
        }

        Err(Error::NotFound)
    }

    /// Cache then store, no peer fallback.
    pub fn local_read(&self, key: &str) -> Result<Entry> {
        if let Some(entry) = self.cache.find(key) {
            return Ok(entry);
        }

        self.store.get(key)?.ok_or(Error::NotFound)
    }

    /// Everything this node currently holds, stamped with its own ID.
    pub fn local_chunk(&self) -> Result<Chunk> {
        Ok(Chunk {
            entries: self.store.scan_all()?,
            owner: self.view.self_id(),
        })
    }

    /// Applies an incoming chunk entry by entry through the local write path.
    /// Entries that no longer belong here are skipped, not fatal.
    pub fn local_write_chunk(&self, chunk: Chunk) {
        for entry in chunk.entries {
            let key = entry.key.clone();
            if let Err(e) = self.local_write(entry) {
                tracing::warn!("Skipping chunk entry {}: {}", key, e);
            }
        }
    }

    /// Re-derives ownership of every locally held entry under the current
    /// view. Entries are bucketed per new owner and shipped in bulk; entries
    /// whose window no longer contains this node are deleted locally. The
    /// keep-local decision is made before any chunk leaves, so a peer
    /// echoing entries back cannot race the delete.
    pub async fn rehash(&self) {
        let chunk = match self.local_chunk() {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::error!("Rehash aborted, could not snapshot the local shard: {}", e);
                return;
            }
        };

        let network = self.view.snapshot();
        let self_id = self.view.self_id();
        let mut outgoing: HashMap<u32, Chunk> = HashMap::new();

        for entry in chunk.entries {
            let replicas = replica_set(&entry.key, network.num_nodes, network.replication_factor);
            let keep_local = replicas.contains(&self_id);

            for id in replicas {
                if id == self_id {
                    continue;
                }
                outgoing
                    .entry(id)
                    .or_insert_with(|| Chunk {
                        entries: Vec::new(),
                        owner: id,
                    })
                    .entries
                    .push(entry.clone());
            }

            if !keep_local {
                self.cache.delete(&entry.key);
                self.writer.enqueue_delete(entry.key);
            }
        }

        for (id, chunk) in outgoing {
            let Some(node) = network.node_with_id(id) else {
                continue;
            };

            tracing::info!("Shipping {} rehashed entries to node {}", chunk.entries.len(), id);

            let client = self.client.clone();
            let addr = node.addr.clone();
            tokio::spawn(async move {
                if let Err(e) = client.send_chunk(&addr, &chunk, THREE_TRIES).await {
                    tracing::warn!("Failed to ship rehash chunk to {}: {}", addr, e);
                }
            });
        }

        self.cache.purge();
    }

    pub fn approx_write_delay_secs(&self) -> u64 {
        self.writer.approx_write_delay_secs()
    }
}
