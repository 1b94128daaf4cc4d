//! Placement Function
//!
//! Pure mapping from a key to the ordered set of node IDs that must hold it.
//! Every node computes the same window from the same `Network` view, so no
//! coordination is needed to route a key.
//!
//! ## Mechanism
//! - **Hashing**: FNV-1a over the key bytes, reduced modulo the node count.
//! - **Window**: the replica set is the contiguous wrap-around range
//!   `[h mod N, h mod N + 1, ..]` of `replication_factor` IDs, which keeps
//!   all replicas of a key adjacent in ID space and localizes rehashing.

const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

/// 64-bit FNV-1a over the key bytes.
pub fn fnv1a64(key: &str) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    for byte in key.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Ordered replica window for `key` over `num_nodes` nodes.
///
/// Returns `min(replication_factor, num_nodes)` distinct IDs so that a stale
/// replication factor larger than the shrunken cluster can never produce
/// duplicate window members.
pub fn replica_set(key: &str, num_nodes: u32, replication_factor: u32) -> Vec<u32> {
    if num_nodes == 0 {
        return Vec::new();
    }

    let start = (fnv1a64(key) % u64::from(num_nodes)) as u32;
    let count = replication_factor.min(num_nodes);

    (0..count).map(|offset| (start + offset) % num_nodes).collect()
}
