use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::info;

use crate::engines::EngineKind;
use crate::model::cost::Cost;
use crate::model::NodeId;

use super::network::SimNetwork;

/// One timed symmetric link-cost event. A missing cost means the link is
/// removed (INFINITY).
#[derive(Debug, Clone)]
pub struct LinkEvent {
    pub time: f64,
    pub a: NodeId,
    pub b: NodeId,
    pub cost: Cost,
}

#[derive(Debug, Clone)]
pub struct Scenario {
    pub node_count: u32,
    pub engine: EngineKind,
    pub events: Vec<LinkEvent>,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(default)]
    time: f64,
    link: (NodeId, NodeId),
    cost: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RawScenario {
    nodes: u32,
    protocol: Option<String>,
    #[serde(default)]
    events: Vec<RawEvent>,
}

pub fn load_scenario(path: &Path) -> Result<Scenario> {
    let raw_text = fs::read_to_string(path)
        .with_context(|| format!("failed to read scenario file {}", path.display()))?;
    parse_scenario(&raw_text)
}

pub fn parse_scenario(raw_text: &str) -> Result<Scenario> {
    let raw: RawScenario =
        serde_yaml::from_str(raw_text).context("failed to parse scenario yaml")?;

    if raw.nodes == 0 {
        bail!("scenario needs at least one node");
    }

    let protocol = raw
        .protocol
        .unwrap_or_else(|| "distance_vector".to_string());
    let Some(engine) = EngineKind::from_str(&protocol) else {
        bail!("unknown protocol {protocol:?} (expected distance_vector, link_state or path_vector)");
    };

    let mut events = Vec::with_capacity(raw.events.len());
    let mut last_time = f64::NEG_INFINITY;
    for raw_event in raw.events {
        let (a, b) = raw_event.link;
        if a == b {
            bail!("event at t={} links node {a} to itself", raw_event.time);
        }
        if a >= raw.nodes || b >= raw.nodes {
            bail!(
                "event at t={} references node outside 0..{}",
                raw_event.time,
                raw.nodes
            );
        }
        if raw_event.time < last_time {
            bail!("events must be ordered by time (t={} follows t={last_time})", raw_event.time);
        }
        last_time = raw_event.time;
        events.push(LinkEvent {
            time: raw_event.time,
            a,
            b,
            cost: raw_event.cost.map_or(Cost::INFINITY, Cost::new),
        });
    }

    Ok(Scenario {
        node_count: raw.nodes,
        engine,
        events,
    })
}

/// Runs a scenario to completion: events sharing a timestamp are applied
/// as one batch, and the network is drained to quiescence after each
/// batch.
pub fn run_scenario(scenario: &Scenario, max_deliveries: u64) -> Result<SimNetwork> {
    let mut network = SimNetwork::with_engine(scenario.node_count, scenario.engine);

    let mut index = 0;
    while index < scenario.events.len() {
        let batch_time = scenario.events[index].time;
        while index < scenario.events.len() && scenario.events[index].time == batch_time {
            let event = &scenario.events[index];
            info!(
                "event t={}: link {}-{} cost {}",
                event.time, event.a, event.b, event.cost
            );
            network.set_link(event.a, event.b, event.cost);
            index += 1;
        }
        network
            .run_to_quiescence(max_deliveries)
            .with_context(|| format!("after event batch at t={batch_time}"))?;
    }

    Ok(network)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_scenario() {
        let scenario = parse_scenario(
            "nodes: 3\n\
             protocol: link_state\n\
             events:\n\
             - { time: 0.0, link: [0, 1], cost: 2 }\n\
             - { time: 1.0, link: [1, 2] }\n",
        )
        .expect("scenario should parse");

        assert_eq!(scenario.node_count, 3);
        assert_eq!(scenario.engine, EngineKind::LinkState);
        assert_eq!(scenario.events.len(), 2);
        assert_eq!(scenario.events[0].cost, Cost::new(2));
        assert_eq!(scenario.events[1].cost, Cost::INFINITY);
    }

    #[test]
    fn rejects_out_of_range_links_and_self_links() {
        assert!(parse_scenario("nodes: 2\nevents:\n- { link: [0, 2], cost: 1 }\n").is_err());
        assert!(parse_scenario("nodes: 2\nevents:\n- { link: [1, 1], cost: 1 }\n").is_err());
        assert!(parse_scenario("nodes: 0\n").is_err());
    }

    #[test]
    fn rejects_unordered_events() {
        let raw = "nodes: 2\nevents:\n\
                   - { time: 2.0, link: [0, 1], cost: 1 }\n\
                   - { time: 1.0, link: [0, 1], cost: 2 }\n";
        assert!(parse_scenario(raw).is_err());
    }

    #[test]
    fn runs_scenario_to_converged_tables() {
        let scenario = parse_scenario(
            "nodes: 3\n\
             protocol: dv\n\
             events:\n\
             - { time: 0.0, link: [0, 1], cost: 1 }\n\
             - { time: 0.0, link: [1, 2], cost: 1 }\n",
        )
        .expect("scenario should parse");

        let network = run_scenario(&scenario, 10_000).expect("scenario should run");
        assert_eq!(network.route_table(0).cost(2), Cost::new(2));
        assert_eq!(network.route_table(0).next_hop(2), Some(1));
    }
}
