use distributed_kv::cluster::types::{Network, Node, NodeState};
use distributed_kv::controller::handlers;
use distributed_kv::controller::service::ControllerService;
use distributed_kv::controller::spawner::{load_host_pool, NodeSpawner, ScriptSpawner};

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

const NODE_PORT: u16 = 5000;

/// Cluster controller: owns the authoritative node list, monitors node
/// health, replaces dead nodes and broadcasts membership changes.
#[derive(Parser)]
#[command(name = "controller")]
struct Cli {
    /// Number of nodes that replicate each entry
    #[arg(long, default_value_t = 1)]
    rf: u32,

    /// Number of nodes to deploy at startup; the replication factor must not
    /// exceed this
    #[arg(long, default_value_t = 1)]
    n: u32,

    /// Port this controller binds to
    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// Seed localhost node entries without spawning any process (for running
    /// the whole cluster by hand on one machine)
    #[arg(long)]
    debuglocal: bool,

    /// File holding the pool of deployable host names
    #[arg(long, default_value = "hosts.json")]
    hosts: PathBuf,

    /// Script invoked to start a node process on a host
    #[arg(long, default_value = "deploynode.sh")]
    deploy_script: PathBuf,

    /// URL nodes use to reach this controller
    #[arg(long)]
    advertise: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let cli = Cli::parse();

    if cli.rf < 1 || cli.rf > cli.n {
        anyhow::bail!("invalid config: replication factor must be between 1 and the node count");
    }

    let advertise = cli
        .advertise
        .clone()
        .unwrap_or_else(|| format!("http://localhost:{}", cli.port));

    let spawner: Arc<dyn NodeSpawner> =
        Arc::new(ScriptSpawner::new(cli.deploy_script.clone(), advertise));

    let mut network = Network {
        nodes: Vec::new(),
        num_nodes: 0,
        replication_factor: cli.rf,
    };

    if cli.debuglocal {
        for i in 0..cli.n {
            network.nodes.push(Node {
                addr: format!("http://localhost:{}", NODE_PORT + i as u16),
                id: i,
                state: NodeState::Starting,
            });
        }
    } else {
        let pool = load_host_pool(&cli.hosts)?;
        if (pool.hosts.len() as u32) < cli.n {
            anyhow::bail!("invalid config: hosts pool is smaller than the requested node count");
        }

        for i in 0..cli.n {
            network.nodes.push(Node {
                addr: format!("http://{}:{}", pool.hosts[i as usize], NODE_PORT),
                id: i,
                state: NodeState::Starting,
            });
        }
    }
    network.num_nodes = network.nodes.len() as u32;

    tracing::info!(
        "Starting controller on port {} with {} nodes, rf={}",
        cli.port,
        network.num_nodes,
        network.replication_factor
    );

    let service = ControllerService::new(network, spawner.clone());
    let app = handlers::router(service.clone());

    // Bind before deploying so booting nodes can fetch /network right away.
    let listen_addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;

    if !cli.debuglocal {
        for node in service.snapshot().await.nodes {
            tracing::info!("Deploying node {:?}", node);

            let Some((host, port)) =
                distributed_kv::controller::service::split_addr_and_port(&node.addr)
            else {
                anyhow::bail!("cannot parse node address {}", node.addr);
            };

            if !spawner.launch(&host, port, node.id) {
                anyhow::bail!("failed to deploy node {} during initialization", node.id);
            }
        }
    }

    service.clone().start_monitor();

    tracing::info!("Controller listening on {}", listen_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
