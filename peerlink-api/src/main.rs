use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use tonic::transport::Server;
use tracing::{info, warn};

use peerlink_core::config::Config;
use peerlink_core::core_bridge::query_handler;
use peerlink_core::core_identity::{self, FileIdentityStore};
use peerlink_core::core_router::{spawn_server, HandlerRegistry, QUERY_PATH};
use peerlink_core::logging::{init_logging_with_config, LogConfig};
use peerlink_core::metrics::init_metrics;
use peerlink_core::shutdown::{install_signal_handlers, ShutdownCoordinator};
use peerlink_core::{NodeManager, PeerIdentity, RpcBridge};

mod agent;
mod error;
mod proto;
mod services;

use agent::GrpcAgent;
use services::P2pNodeServiceImpl;

/// Peer-to-peer RPC bridge daemon: serves the node's gRPC facade and
/// forwards inbound overlay queries into the colocated agent service.
#[derive(Parser, Debug)]
#[command(name = "peerlink-api", version)]
struct Args {
    /// gRPC facade listen port
    #[arg(long)]
    port: u16,

    /// Loopback port of the agent service
    #[arg(long)]
    agent_port: u16,

    /// Configuration file (TOML); environment overrides apply on top
    #[arg(long)]
    config: Option<PathBuf>,

    /// Bootstrap relay multiaddress
    #[arg(long)]
    relay: Option<String>,

    /// Identity key file; omitted means an ephemeral identity
    #[arg(long)]
    identity: Option<PathBuf>,

    /// Node name carried in outbound query bodies
    #[arg(long)]
    node_name: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    config.grpc.port = args.port;
    config.grpc.agent_port = args.agent_port;
    if let Some(relay) = args.relay {
        config.node.relay_address = relay;
    }
    if let Some(identity) = args.identity {
        config.node.identity_path = Some(identity);
    }
    if let Some(name) = args.node_name {
        config.node.name = name;
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    config.validate()?;

    init_logging_with_config(LogConfig::try_from(&config.logging)?)?;
    init_metrics();
    if config.metrics.enabled {
        let addr = SocketAddr::new(config.metrics.bind_address, config.metrics.port);
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()?;
        info!(%addr, "Prometheus exporter listening");
    }

    let identity = match &config.node.identity_path {
        Some(path) => core_identity::get_or_create(&FileIdentityStore::new(path)),
        None => PeerIdentity::generate(),
    };
    info!(peer_id = %identity.peer_id(), name = %config.node.name, "Starting node");

    let (node, incoming) = NodeManager::start(identity, &config.node).await?;

    let agent = Arc::new(GrpcAgent::new(
        config.grpc.agent_address,
        config.grpc.agent_port,
        config.grpc.agent_timeout,
    ));
    let mut registry = HandlerRegistry::new();
    registry.register(QUERY_PATH, query_handler(agent, node.context().clone()));
    spawn_server(incoming, registry.freeze(), config.node.request_timeout);

    // Bootstrap is best-effort: without a relay reservation the node keeps
    // serving direct connections and outbound calls.
    let bootstrap = node.clone();
    tokio::spawn(async move {
        if let Err(e) = bootstrap.connect_to_relay().await {
            warn!("Relay bootstrap failed, no circuit address will be learned: {e}");
        }
    });

    let bridge = RpcBridge::new(node.clone(), config.node.call_timeout);
    let service = P2pNodeServiceImpl::new(bridge);

    let coordinator = Arc::new(ShutdownCoordinator::new());
    install_signal_handlers(coordinator.clone());

    let addr = SocketAddr::new(config.grpc.bind_address, config.grpc.port);
    info!(%addr, "gRPC facade listening");

    let shutdown = coordinator.clone();
    Server::builder()
        .add_service(proto::p2p_node_service_server::P2pNodeServiceServer::new(
            service,
        ))
        .serve_with_shutdown(addr, async move { shutdown.wait_for_shutdown().await })
        .await?;

    node.shutdown().await;
    info!("Shutdown complete");
    Ok(())
}
