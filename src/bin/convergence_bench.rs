use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use idr::compute::{compute_all_pairs, CostMatrix};
use idr::engines::EngineKind;
use idr::model::cost::Cost;
use idr::model::NodeId;
use idr::sim::SimNetwork;
use serde_json::{json, Value};

#[derive(Debug, Parser)]
#[command(name = "convergence_bench")]
#[command(about = "Benchmark engine convergence on seeded random topologies")]
struct Args {
    #[arg(long, default_value_t = 16)]
    nodes: u32,
    #[arg(long, default_value_t = 0.1)]
    density: f64,
    #[arg(long, default_value_t = 3)]
    seeds: usize,
    #[arg(long, default_value_t = 1)]
    start_seed: u64,
    #[arg(long, default_value_t = 1_000_000)]
    max_deliveries: u64,
    #[arg(long)]
    output_json: Option<PathBuf>,
}

#[derive(Debug, Clone)]
struct LcgRng {
    state: u64,
}

impl LcgRng {
    fn new(seed: u64) -> Self {
        Self { state: seed.max(1) }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1);
        self.state
    }

    fn next_f64(&mut self) -> f64 {
        let raw = self.next_u64() >> 11;
        (raw as f64) / ((1_u64 << 53) as f64)
    }

    fn range_u32(&mut self, low: u32, high: u32) -> u32 {
        low + (self.next_u64() % u64::from(high - low + 1)) as u32
    }
}

/// Ring backbone (keeps the topology connected) plus density-controlled
/// extra links, costs 1..=20.
fn generate_links(seed: u64, nodes: u32, density: f64) -> Vec<(NodeId, NodeId, Cost)> {
    let mut rng = LcgRng::new(seed);
    let mut links = Vec::new();

    if nodes >= 2 {
        for node in 0..nodes {
            let next = (node + 1) % nodes;
            if node < next || nodes > 2 {
                links.push((node.min(next), node.max(next), Cost::new(rng.range_u32(1, 20))));
            }
        }
    }

    let p = density.clamp(0.0, 1.0);
    for a in 0..nodes {
        for b in (a + 1)..nodes {
            if b == a + 1 || (a == 0 && b == nodes - 1) {
                continue;
            }
            if rng.next_f64() < p {
                links.push((a, b, Cost::new(rng.range_u32(1, 20))));
            }
        }
    }

    links
}

fn reference_matrix(nodes: u32, links: &[(NodeId, NodeId, Cost)]) -> CostMatrix {
    let mut matrix: CostMatrix = (0..nodes).map(|node| (node, BTreeMap::new())).collect();
    for (a, b, cost) in links {
        matrix.entry(*a).or_default().insert(*b, *cost);
        matrix.entry(*b).or_default().insert(*a, *cost);
    }
    matrix
}

fn bench_engine(
    kind: EngineKind,
    nodes: u32,
    links: &[(NodeId, NodeId, Cost)],
    max_deliveries: u64,
) -> Result<Value> {
    let start = Instant::now();
    let mut network = SimNetwork::with_engine(nodes, kind);
    for (a, b, cost) in links {
        network.set_link(*a, *b, *cost);
    }
    let deliveries = network.run_to_quiescence(max_deliveries)?;
    let runtime_ms = start.elapsed().as_secs_f64() * 1000.0;

    let reference = compute_all_pairs(&reference_matrix(nodes, links), nodes);
    let mut mismatches = 0_u64;
    for node in 0..nodes {
        for destination in 0..nodes {
            if node == destination {
                continue;
            }
            if network.route_table(node).cost(destination) != reference[&(node, destination)] {
                mismatches += 1;
            }
        }
    }

    Ok(json!({
        "engine": kind.as_str(),
        "runtime_ms": runtime_ms,
        "deliveries": deliveries,
        "sent": network.messages_sent(),
        "dropped": network.messages_dropped(),
        "mismatches": mismatches,
    }))
}

fn aggregate(seed_rows: &[Value]) -> Value {
    let mut buckets: BTreeMap<String, Vec<Value>> = BTreeMap::new();
    for row in seed_rows {
        if let Some(engines) = row.get("engines").and_then(Value::as_array) {
            for engine in engines {
                if let Some(name) = engine.get("engine").and_then(Value::as_str) {
                    buckets
                        .entry(name.to_string())
                        .or_default()
                        .push(engine.clone());
                }
            }
        }
    }

    let avg = |rows: &[Value], key: &str| -> f64 {
        let values: Vec<f64> = rows
            .iter()
            .filter_map(|row| row.get(key).and_then(Value::as_f64))
            .collect();
        if values.is_empty() {
            f64::NAN
        } else {
            values.iter().sum::<f64>() / values.len() as f64
        }
    };

    let mut out = Vec::new();
    for (name, rows) in buckets {
        out.push(json!({
            "engine": name,
            "runtime_ms": avg(&rows, "runtime_ms"),
            "deliveries": avg(&rows, "deliveries"),
            "sent": avg(&rows, "sent"),
            "mismatches": avg(&rows, "mismatches"),
        }));
    }
    Value::Array(out)
}

fn print_summary(aggregated: &Value) {
    println!("engine\truntime_ms\tdeliveries\tsent\tmismatches");
    if let Some(rows) = aggregated.as_array() {
        for row in rows {
            let name = row.get("engine").and_then(Value::as_str).unwrap_or("?");
            let runtime_ms = row
                .get("runtime_ms")
                .and_then(Value::as_f64)
                .unwrap_or(f64::NAN);
            let deliveries = row
                .get("deliveries")
                .and_then(Value::as_f64)
                .unwrap_or(f64::NAN);
            let sent = row.get("sent").and_then(Value::as_f64).unwrap_or(f64::NAN);
            let mismatches = row
                .get("mismatches")
                .and_then(Value::as_f64)
                .unwrap_or(f64::NAN);
            println!("{name}\t{runtime_ms:.4}\t{deliveries:.1}\t{sent:.1}\t{mismatches:.1}");
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut seed_rows = Vec::new();

    for idx in 0..args.seeds.max(1) {
        let seed = args.start_seed + idx as u64;
        let links = generate_links(seed, args.nodes.max(2), args.density);

        let mut engines = Vec::new();
        for kind in EngineKind::all() {
            engines.push(bench_engine(kind, args.nodes.max(2), &links, args.max_deliveries)?);
        }

        seed_rows.push(json!({
            "seed": seed,
            "nodes": args.nodes.max(2),
            "links": links.len(),
            "engines": engines,
        }));
    }

    let aggregated = aggregate(&seed_rows);
    print_summary(&aggregated);

    if let Some(path) = args.output_json {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let payload = json!({
            "config": {
                "nodes": args.nodes,
                "density": args.density,
                "seeds": args.seeds,
                "start_seed": args.start_seed,
                "max_deliveries": args.max_deliveries,
            },
            "runs": seed_rows,
            "aggregate": aggregated,
        });
        fs::write(path, serde_json::to_vec_pretty(&payload)?)?;
    }

    Ok(())
}
