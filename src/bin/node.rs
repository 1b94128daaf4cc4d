use distributed_kv::node::agent::MembershipAgent;
use distributed_kv::node::engine::ReplicationEngine;
use distributed_kv::node::handlers;
use distributed_kv::node::view::NetworkView;
use distributed_kv::storage::cache::LruTtlCache;
use distributed_kv::storage::store::KvStore;
use distributed_kv::storage::writer::DurableWriter;

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

/// Storage node: persists a shard of the key space, replicates writes to its
/// peers and serves reads with fallback across replicas.
#[derive(Parser)]
#[command(name = "node")]
struct Cli {
    /// ID of this node, equal to its index in the controller's list
    #[arg(long)]
    id: u32,

    /// Base URL of the cluster controller
    #[arg(long, default_value = "http://localhost:8080")]
    controller: String,

    /// Port this node binds to
    #[arg(long, default_value_t = 8000)]
    port: u16,

    /// Directory holding this node's durable store
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let cli = Cli::parse();
    tracing::info!(
        "Starting node {} on port {}, controller at {}",
        cli.id,
        cli.port,
        cli.controller
    );

    let store_path = cli.data_dir.join(format!("kvstore-{}", cli.id));
    let store = Arc::new(KvStore::open(&store_path)?);

    let writer = DurableWriter::new(store.clone());
    writer.clone().start();

    let cache = Arc::new(LruTtlCache::with_defaults());
    let view = Arc::new(NetworkView::new(cli.id));

    let engine = ReplicationEngine::new(view.clone(), store, writer, cache);
    let agent = MembershipAgent::new(view.clone(), engine.clone(), cli.controller.clone());

    // Fetch the initial membership in the background so the HTTP surface
    // binds immediately; the controller's probes expect it up.
    let boot_agent = agent.clone();
    tokio::spawn(async move {
        boot_agent.bootstrap().await;
    });

    let app = handlers::router(engine, agent, view);

    let listen_addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;

    tracing::info!("Node listening on {}", listen_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
