#[cfg(test)]
mod tests {
    use crate::cluster::types::{Chunk, Entry, Network, Node, NodeState};
    use crate::controller::service::{
        aggregate_chunks, split_addr_and_port, ControllerService,
    };
    use crate::controller::spawner::NodeSpawner;

    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Records launch requests instead of starting processes.
    struct StubSpawner {
        calls: Mutex<Vec<(String, u16, u32)>>,
        result: bool,
    }

    impl StubSpawner {
        fn new(result: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                result,
            })
        }

        fn calls(&self) -> Vec<(String, u16, u32)> {
            self.calls.lock().clone()
        }
    }

    impl NodeSpawner for StubSpawner {
        fn launch(&self, host: &str, port: u16, id: u32) -> bool {
            self.calls.lock().push((host.to_string(), port, id));
            self.result
        }
    }

    fn make_network(count: u32, rf: u32) -> Network {
        let nodes = (0..count)
            .map(|i| Node {
                // Unroutable port so broadcasts fail fast in tests.
                addr: format!("http://127.0.0.1:1/{}", i),
                id: i,
                state: NodeState::Ready,
            })
            .collect::<Vec<_>>();

        Network {
            num_nodes: count,
            replication_factor: rf,
            nodes,
        }
    }

    fn make_service(count: u32, rf: u32) -> (Arc<ControllerService>, Arc<StubSpawner>) {
        let spawner = StubSpawner::new(true);
        let service = ControllerService::new(make_network(count, rf), spawner.clone());
        (service, spawner)
    }

    // ============================================================
    // MEMBERSHIP COMPACTION TESTS
    // ============================================================

    #[tokio::test]
    async fn test_remove_node_compacts_ids() {
        let (service, _spawner) = make_service(4, 1);

        service.remove_node(1).await;

        let network = service.snapshot().await;
        assert_eq!(network.num_nodes, 3);
        assert_eq!(network.nodes.len(), 3);
        for (index, node) in network.nodes.iter().enumerate() {
            assert_eq!(node.id, index as u32, "IDs must equal list indices");
        }

        // Order of the survivors is preserved.
        assert!(network.nodes[0].addr.ends_with("/0"));
        assert!(network.nodes[1].addr.ends_with("/2"));
        assert!(network.nodes[2].addr.ends_with("/3"));
    }

    #[tokio::test]
    async fn test_remove_last_node_leaves_empty_network() {
        let (service, _spawner) = make_service(1, 1);

        service.remove_node(0).await;

        let network = service.snapshot().await;
        assert_eq!(network.num_nodes, 0);
        assert!(network.nodes.is_empty());
    }

    #[tokio::test]
    async fn test_remove_node_clamps_replication_factor() {
        let (service, _spawner) = make_service(3, 3);

        service.remove_node(2).await;

        let network = service.snapshot().await;
        assert_eq!(network.num_nodes, 2);
        assert_eq!(network.replication_factor, 2);
    }

    #[tokio::test]
    async fn test_remove_unknown_node_is_a_noop() {
        let (service, _spawner) = make_service(2, 1);

        service.remove_node(9).await;

        assert_eq!(service.snapshot().await.num_nodes, 2);
    }

    #[tokio::test]
    async fn test_remove_every_node_one_by_one() {
        let (service, _spawner) = make_service(3, 1);

        // Always remove the head; the survivors shift down each time.
        service.remove_node(0).await;
        service.remove_node(0).await;
        service.remove_node(0).await;

        assert_eq!(service.snapshot().await.num_nodes, 0);
    }

    // ============================================================
    // REPLICATION FACTOR TESTS
    // ============================================================

    #[tokio::test]
    async fn test_update_rf_accepts_valid_change() {
        let (service, _spawner) = make_service(3, 1);

        assert!(service.update_rf(3).await);
        assert_eq!(service.snapshot().await.replication_factor, 3);
    }

    #[tokio::test]
    async fn test_update_rf_rejects_same_value() {
        let (service, _spawner) = make_service(3, 2);

        assert!(!service.update_rf(2).await);
    }

    #[tokio::test]
    async fn test_update_rf_rejects_out_of_range() {
        let (service, _spawner) = make_service(3, 1);

        assert!(!service.update_rf(0).await);
        assert!(!service.update_rf(4).await);
        assert_eq!(service.snapshot().await.replication_factor, 1);
    }

    // ============================================================
    // ADD NODE TESTS
    // ============================================================

    #[tokio::test]
    async fn test_add_node_launches_spawner_with_parsed_addr() {
        let (service, spawner) = make_service(2, 1);

        service
            .clone()
            .add_node("http://somehost:5002".to_string())
            .await
            .unwrap();

        let calls = spawner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], ("somehost".to_string(), 5002, 2));
    }

    #[tokio::test]
    async fn test_add_node_rejects_unparsable_url() {
        let (service, spawner) = make_service(1, 1);

        assert!(service.add_node("not a url".to_string()).await.is_err());
        assert!(spawner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_failed_launch_never_appends() {
        let spawner = StubSpawner::new(false);
        let service = ControllerService::new(make_network(1, 1), spawner.clone());

        service
            .clone()
            .add_node("http://somehost:5001".to_string())
            .await
            .unwrap();

        assert_eq!(spawner.calls().len(), 1);
        // The node is never verified, so the list is untouched.
        assert_eq!(service.snapshot().await.num_nodes, 1);
    }

    // ============================================================
    // DATA AGGREGATION TESTS
    // ============================================================

    #[test]
    fn test_aggregate_chunks_merges_owners_by_value() {
        let chunks = vec![
            Chunk {
                entries: vec![Entry {
                    key: "apple".to_string(),
                    value: "red".to_string(),
                }],
                owner: 0,
            },
            Chunk {
                entries: vec![Entry {
                    key: "apple".to_string(),
                    value: "red".to_string(),
                }],
                owner: 1,
            },
            Chunk {
                entries: vec![Entry {
                    key: "sky".to_string(),
                    value: "blue".to_string(),
                }],
                owner: 1,
            },
        ];

        let table = aggregate_chunks(&chunks);

        assert_eq!(table.len(), 2);
        assert_eq!(table["red"].owners, vec![0, 1]);
        assert_eq!(table["blue"].owners, vec![1]);
        assert_eq!(table["red"].entry.key, "apple");
    }

    #[test]
    fn test_aggregate_chunks_empty() {
        assert!(aggregate_chunks(&[]).is_empty());
    }

    // ============================================================
    // ADDRESS PARSING TESTS
    // ============================================================

    #[test]
    fn test_split_addr_and_port() {
        assert_eq!(
            split_addr_and_port("http://somehost:5000"),
            Some(("somehost".to_string(), 5000))
        );
        assert_eq!(
            split_addr_and_port("http://10.0.0.7:8000"),
            Some(("10.0.0.7".to_string(), 8000))
        );
    }

    #[test]
    fn test_split_addr_requires_explicit_port() {
        assert_eq!(split_addr_and_port("http://somehost"), None);
        assert_eq!(split_addr_and_port("nonsense"), None);
    }
}
