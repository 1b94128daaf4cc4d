#[cfg(test)]
mod tests {
    use crate::cluster::placement::replica_set;
    use crate::cluster::types::{Chunk, Entry, Network, Node, NodeState};
    use crate::error::Error;
    use crate::node::agent::catchup_neighbours;
    use crate::node::engine::ReplicationEngine;
    use crate::node::view::NetworkView;
    use crate::storage::cache::LruTtlCache;
    use crate::storage::store::KvStore;
    use crate::storage::writer::DurableWriter;

    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn entry(key: &str, value: &str) -> Entry {
        Entry {
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    fn make_network(addrs: &[&str], rf: u32) -> Network {
        let nodes = addrs
            .iter()
            .enumerate()
            .map(|(i, addr)| Node {
                addr: addr.to_string(),
                id: i as u32,
                state: NodeState::Ready,
            })
            .collect::<Vec<_>>();

        Network {
            num_nodes: nodes.len() as u32,
            replication_factor: rf,
            nodes,
        }
    }

    struct TestNode {
        view: Arc<NetworkView>,
        store: Arc<KvStore>,
        cache: Arc<LruTtlCache>,
        engine: Arc<ReplicationEngine>,
        _dir: TempDir,
    }

    /// Builds a full engine stack with the given view. Peer addresses use
    /// unroutable ports, so remote calls fail fast instead of hanging.
    fn make_node(self_id: u32, network: Network) -> TestNode {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let store = Arc::new(KvStore::open(dir.path()).expect("Failed to open store"));
        let writer = DurableWriter::new(store.clone());
        writer.clone().start();
        let cache = Arc::new(LruTtlCache::with_defaults());
        let view = Arc::new(NetworkView::new(self_id));
        view.adopt(network);

        let engine =
            ReplicationEngine::new(view.clone(), store.clone(), writer, cache.clone());

        TestNode {
            view,
            store,
            cache,
            engine,
            _dir: dir,
        }
    }

    /// First key of the form `key_<i>` whose replica window equals `want`.
    fn key_with_window(want: &[u32], num_nodes: u32, rf: u32) -> String {
        for i in 0..10_000 {
            let key = format!("key_{}", i);
            if replica_set(&key, num_nodes, rf) == want {
                return key;
            }
        }
        panic!("No key found with window {:?}", want);
    }

    async fn wait_for(mut check: impl FnMut() -> bool) {
        for _ in 0..100 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(30)).await;
        }
        panic!("Condition not reached before timeout");
    }

    // ============================================================
    // NETWORK VIEW TESTS
    // ============================================================

    #[test]
    fn test_view_initial_adopt_keeps_configured_id() {
        let view = NetworkView::new(2);
        view.adopt(make_network(&["http://a:5000", "http://b:5000", "http://c:5000"], 1));

        assert_eq!(view.self_id(), 2);
        assert_eq!(view.snapshot().num_nodes, 3);
    }

    #[test]
    fn test_view_resyncs_own_id_after_compaction() {
        let view = NetworkView::new(2);
        view.adopt(make_network(&["http://a:5000", "http://b:5000", "http://c:5000"], 1));

        // Node 1 was removed; this node's address now sits at index 1.
        view.adopt(make_network(&["http://a:5000", "http://c:5000"], 1));

        assert_eq!(view.self_id(), 1);
    }

    #[test]
    fn test_view_keeps_id_when_own_addr_missing() {
        let view = NetworkView::new(0);
        view.adopt(make_network(&["http://a:5000", "http://b:5000"], 1));

        // The downloaded list no longer contains this node at all.
        view.adopt(make_network(&["http://x:5000"], 1));

        assert_eq!(view.self_id(), 0);
    }

    #[test]
    fn test_view_diff_matches_network_diff() {
        let view = NetworkView::new(0);
        let network = make_network(&["http://a:5000", "http://b:5000"], 1);
        view.adopt(network.clone());

        assert!(!view.differs_from(&network));

        let mut changed = network;
        changed.replication_factor = 2;
        assert!(view.differs_from(&changed));
    }

    // ============================================================
    // REPLICATION ENGINE TESTS
    // ============================================================

    #[tokio::test]
    async fn test_single_node_write_read() {
        let node = make_node(0, make_network(&["http://localhost:5000"], 1));

        node.engine.local_write(entry("apple", "red")).unwrap();

        wait_for(|| node.store.get("apple").unwrap().is_some()).await;
        assert_eq!(node.engine.local_read("apple").unwrap().value, "red");
    }

    #[tokio::test]
    async fn test_single_node_routed_write_is_purely_local() {
        let node = make_node(0, make_network(&["http://localhost:5000"], 1));

        node.engine.write(entry("apple", "red"));

        wait_for(|| node.store.get("apple").unwrap().is_some()).await;
        assert_eq!(node.engine.read("apple").await.unwrap().value, "red");
    }

    #[tokio::test]
    async fn test_local_write_rejects_foreign_key() {
        // Two nodes, rf=1: every key has exactly one owner.
        let network = make_network(&["http://127.0.0.1:1", "http://127.0.0.1:1"], 1);
        let node = make_node(0, network);

        let foreign = key_with_window(&[1], 2, 1);

        assert!(matches!(
            node.engine.local_write(entry(&foreign, "v")),
            Err(Error::NotOwner)
        ));
        assert_eq!(node.store.get(&foreign).unwrap(), None);
    }

    #[tokio::test]
    async fn test_local_write_rejects_empty_fields() {
        let node = make_node(0, make_network(&["http://localhost:5000"], 1));

        assert!(matches!(
            node.engine.local_write(entry("", "v")),
            Err(Error::Precondition(_))
        ));
        assert!(matches!(
            node.engine.local_write(entry("k", "")),
            Err(Error::Precondition(_))
        ));
    }

    #[tokio::test]
    async fn test_read_miss_returns_not_found() {
        let node = make_node(0, make_network(&["http://localhost:5000"], 1));

        assert!(matches!(
            node.engine.read("missing").await,
            Err(Error::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_read_populates_cache_from_store() {
        let node = make_node(0, make_network(&["http://localhost:5000"], 1));

        node.engine.local_write(entry("apple", "red")).unwrap();
        wait_for(|| node.store.get("apple").unwrap().is_some()).await;

        assert!(node.cache.is_empty());
        node.engine.read("apple").await.unwrap();
        assert_eq!(node.cache.len(), 1);
    }

    #[tokio::test]
    async fn test_local_write_refreshes_cached_value() {
        let node = make_node(0, make_network(&["http://localhost:5000"], 1));

        node.cache.add(entry("apple", "stale"));
        node.engine.local_write(entry("apple", "fresh")).unwrap();

        assert_eq!(node.cache.find("apple").unwrap().value, "fresh");
    }

    #[tokio::test]
    async fn test_local_chunk_is_stamped_with_own_id() {
        let node = make_node(0, make_network(&["http://localhost:5000"], 1));

        node.engine.local_write(entry("apple", "red")).unwrap();
        wait_for(|| node.store.get("apple").unwrap().is_some()).await;

        let chunk = node.engine.local_chunk().unwrap();
        assert_eq!(chunk.owner, 0);
        assert_eq!(chunk.entries.len(), 1);
    }

    #[tokio::test]
    async fn test_local_write_chunk_skips_foreign_entries() {
        let network = make_network(&["http://127.0.0.1:1", "http://127.0.0.1:1"], 1);
        let node = make_node(0, network);

        let owned = key_with_window(&[0], 2, 1);
        let foreign = key_with_window(&[1], 2, 1);

        node.engine.local_write_chunk(Chunk {
            entries: vec![entry(&owned, "mine"), entry(&foreign, "theirs")],
            owner: 0,
        });

        wait_for(|| node.store.get(&owned).unwrap().is_some()).await;
        assert_eq!(node.store.get(&foreign).unwrap(), None);
    }

    // ============================================================
    // REHASH TESTS
    // ============================================================

    #[tokio::test]
    async fn test_rehash_keeps_owned_entries_and_purges_cache() {
        let node = make_node(0, make_network(&["http://localhost:5000"], 1));

        node.engine.local_write(entry("apple", "red")).unwrap();
        wait_for(|| node.store.get("apple").unwrap().is_some()).await;
        node.cache.add(entry("apple", "red"));

        node.engine.rehash().await;

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(node.store.get("apple").unwrap().is_some());
        assert!(node.cache.is_empty(), "rehash must purge the cache");
    }

    #[tokio::test]
    async fn test_rehash_deletes_disowned_entries() {
        // Start as the only node, then learn about a second node that owns
        // part of the key space. Entries moving there must vanish locally.
        let node = make_node(0, make_network(&["http://127.0.0.1:1"], 1));

        let moving = key_with_window(&[1], 2, 1);
        let staying = key_with_window(&[0], 2, 1);

        node.engine.local_write(entry(&moving, "v")).unwrap();
        node.engine.local_write(entry(&staying, "v")).unwrap();
        wait_for(|| node.store.get(&moving).unwrap().is_some()).await;
        wait_for(|| node.store.get(&staying).unwrap().is_some()).await;

        node.view
            .adopt(make_network(&["http://127.0.0.1:1", "http://127.0.0.1:1"], 1));
        node.engine.rehash().await;

        wait_for(|| node.store.get(&moving).unwrap().is_none()).await;
        assert!(node.store.get(&staying).unwrap().is_some());
    }

    // ============================================================
    // CATCHUP NEIGHBOUR TESTS
    // ============================================================

    #[test]
    fn test_catchup_neighbours_rf2() {
        // rf=2 on 5 nodes: one forward, one backward.
        assert_eq!(catchup_neighbours(2, 5, 2), vec![3, 1]);
    }

    #[test]
    fn test_catchup_neighbours_wrap_around() {
        assert_eq!(catchup_neighbours(0, 4, 2), vec![1, 3]);
        assert_eq!(catchup_neighbours(3, 4, 2), vec![0, 2]);
    }

    #[test]
    fn test_catchup_neighbours_rf1_is_empty() {
        // rf=1 means no peer replicates this node's window.
        assert!(catchup_neighbours(0, 4, 1).is_empty());
    }

    #[test]
    fn test_catchup_neighbours_exclude_self_and_duplicates() {
        // rf=3 on 3 nodes: the window wraps onto every other node once.
        let neighbours = catchup_neighbours(0, 3, 3);
        assert_eq!(neighbours.len(), 2);
        assert!(neighbours.contains(&1));
        assert!(neighbours.contains(&2));

        // Single node: nothing to ask.
        assert!(catchup_neighbours(0, 1, 3).is_empty());
    }
}
