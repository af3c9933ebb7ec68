//! Switchboard - signaling relay and sovereign RPC gateway for JoyNet

use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use switchboard::{
    config::Args,
    rpc::{
        spawn_probe_task, ChainDirectory, ConsensusProbe, FailoverController, NodeProber,
        NodeRegistry, NodeSelector, SelectorConfig, StreamValidator,
    },
    server::{self, AppState, SignalServices},
    signal::DEFAULT_MAX_CLIENTS,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing/logging
    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("switchboard={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Validate configuration
    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    let seeds = args.rpc_endpoint_list();

    // Print startup banner
    info!("======================================");
    info!("  Switchboard - JoyNet gateway");
    info!("======================================");
    info!("Node ID: {}", args.node_id);
    info!("Listen: {}", args.listen);
    info!(
        "Mode: {}",
        if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" }
    );
    info!(
        "Signal service: {}",
        if args.signal_enabled { "enabled" } else { "disabled" }
    );
    info!("RPC seeds: {} endpoint(s)", seeds.len());
    for (i, url) in seeds.iter().enumerate() {
        info!("  node-{}: {}", i, url);
    }
    info!("Fallback RPC: {}", args.rpc.fallback_rpc_url);
    info!("Consensus required: {}", args.rpc.consensus_required);
    info!("Max failover attempts: {}", args.rpc.max_failover_attempts);
    info!("======================================");

    // Signal services (connection registry, group table, relay)
    let signal = if args.signal_enabled {
        let max_clients = args.signal_max_clients.unwrap_or(DEFAULT_MAX_CLIENTS);
        Some(SignalServices::new(max_clients))
    } else {
        None
    };

    // Node registry and prober
    let registry = Arc::new(NodeRegistry::new());
    let prober = Arc::new(NodeProber::new(Duration::from_millis(
        args.rpc.probe_timeout_ms,
    )));

    // On-chain directory for consensus reads and stream validation
    let directory = if args.rpc.sovereign_rpc_address.is_some()
        || args.rpc.stream_validator_address.is_some()
    {
        let directory = Arc::new(ChainDirectory::new(
            args.rpc.fallback_rpc_url.clone(),
            args.rpc.sovereign_rpc_address.clone().unwrap_or_default(),
            args.rpc.stream_validator_address.clone(),
            Duration::from_millis(args.rpc.consensus_timeout_ms),
        ));
        info!(
            "Chain directory enabled (registry contract: {}, stream validator: {})",
            args.rpc.sovereign_rpc_address.as_deref().unwrap_or("none"),
            args.rpc
                .stream_validator_address
                .as_deref()
                .unwrap_or("none"),
        );
        Some(directory)
    } else {
        None
    };

    let consensus: Option<Arc<dyn ConsensusProbe>> =
        match (&directory, &args.rpc.sovereign_rpc_address) {
            (Some(directory), Some(_)) => Some(Arc::clone(directory) as Arc<dyn ConsensusProbe>),
            _ => None,
        };

    let streams: Option<Arc<dyn StreamValidator>> = directory
        .as_ref()
        .filter(|directory| directory.has_stream_validator())
        .map(|directory| Arc::clone(directory) as Arc<dyn StreamValidator>);

    // Node selector with bounded failover
    let failover = FailoverController::new(
        args.rpc.max_failover_attempts,
        args.rpc.fallback_rpc_url.clone(),
    );
    let selector = Arc::new(NodeSelector::new(
        SelectorConfig {
            seeds: seeds.clone(),
            consensus_required: args.rpc.consensus_required,
            consensus_timeout: Duration::from_millis(args.rpc.consensus_timeout_ms),
        },
        Arc::clone(&registry),
        Arc::clone(&prober),
        consensus,
        failover,
    ));

    // Background discovery keeps the registry warm between selections
    if !seeds.is_empty() {
        spawn_probe_task(
            Arc::clone(&prober),
            seeds.clone(),
            Arc::clone(&registry),
            Duration::from_secs(args.rpc.probe_interval_secs),
        );
    }

    // Create application state and run the server
    let state = Arc::new(AppState::new(args, signal, registry, selector, streams));

    if let Err(e) = server::run(state).await {
        error!("Server error: {:?}", e);
        std::process::exit(1);
    }

    Ok(())
}
