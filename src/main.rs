use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use idr::model::NodeId;
use idr::sim::{load_scenario, run_scenario};
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "routesim")]
#[command(about = "Run a routing scenario to quiescence and print the converged route tables")]
struct Args {
    #[arg(long)]
    scenario: PathBuf,
    /// Overrides the scenario's protocol (distance_vector, link_state, path_vector).
    #[arg(long)]
    protocol: Option<String>,
    #[arg(long, default_value_t = 1_000_000)]
    max_deliveries: u64,
    #[arg(long, default_value = "INFO")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level)?;

    let mut scenario = load_scenario(&args.scenario)?;
    if let Some(protocol) = args.protocol.as_deref() {
        let Some(engine) = idr::engines::EngineKind::from_str(protocol) else {
            anyhow::bail!("unknown protocol {protocol:?}");
        };
        scenario.engine = engine;
    }

    info!(
        "routesim start: nodes={} protocol={} events={}",
        scenario.node_count,
        scenario.engine.as_str(),
        scenario.events.len()
    );

    let network = run_scenario(&scenario, args.max_deliveries)?;

    info!(
        "quiesced: sent={} delivered={} dropped={}",
        network.messages_sent(),
        network.messages_delivered(),
        network.messages_dropped()
    );

    for node in 0..network.node_count() {
        println!("node {node} ({})", network.engine_name(node));
        for route in network.route_table(node).snapshot() {
            let next_hop = route
                .next_hop
                .map_or_else(|| "-".to_string(), |hop: NodeId| hop.to_string());
            println!(
                "  {:>4} via {:>4} cost {}",
                route.destination, next_hop, route.cost
            );
        }
    }

    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let level = level.parse::<Level>()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(true)
        .compact()
        .init();
    Ok(())
}
