use std::collections::{BTreeMap, VecDeque};

use anyhow::{bail, Result};
use serde_json::Value;
use tracing::debug;

use crate::engines::{EngineContext, EngineKind, EngineOutputs, RoutingEngine};
use crate::model::cost::Cost;
use crate::model::messages::ProtocolMessage;
use crate::model::routing::RouteTable;
use crate::model::NodeId;

struct SimNode {
    engine: Box<dyn RoutingEngine>,
    route_table: RouteTable,
}

struct InFlight {
    from: NodeId,
    to: NodeId,
    message: ProtocolMessage,
}

/// In-process multi-node harness: owns the topology, schedules events and
/// delivers messages FIFO. Each node runs one engine for its whole
/// lifetime and only ever observes its own context plus delivered
/// messages. Same event sequence in, same tables out.
pub struct SimNetwork {
    node_count: u32,
    nodes: Vec<SimNode>,
    links: BTreeMap<(NodeId, NodeId), Cost>,
    queue: VecDeque<InFlight>,
    now: f64,
    sent: u64,
    delivered: u64,
    dropped: u64,
}

impl SimNetwork {
    /// Creates `node_count` nodes with engines from `factory` and calls
    /// `start` on each against the (initially empty) topology.
    pub fn new<F>(node_count: u32, factory: F) -> Self
    where
        F: Fn(NodeId) -> Box<dyn RoutingEngine>,
    {
        let mut network = Self {
            node_count,
            nodes: (0..node_count)
                .map(|node| SimNode {
                    engine: factory(node),
                    route_table: RouteTable::default(),
                })
                .collect(),
            links: BTreeMap::new(),
            queue: VecDeque::new(),
            now: 0.0,
            sent: 0,
            delivered: 0,
            dropped: 0,
        };
        for node in 0..node_count {
            let ctx = network.context(node);
            let outputs = network.nodes[node as usize].engine.start(&ctx);
            network.apply_outputs(node, outputs);
        }
        network
    }

    pub fn with_engine(node_count: u32, kind: EngineKind) -> Self {
        Self::new(node_count, |_| kind.build())
    }

    pub fn node_count(&self) -> u32 {
        self.node_count
    }

    pub fn link_cost(&self, a: NodeId, b: NodeId) -> Cost {
        self.links
            .get(&link_key(a, b))
            .copied()
            .unwrap_or(Cost::INFINITY)
    }

    /// Sets the symmetric link cost between `a` and `b` and notifies both
    /// endpoints, lower node id first. `INFINITY` removes the link.
    pub fn set_link(&mut self, a: NodeId, b: NodeId, cost: Cost) {
        assert_ne!(a, b, "self-links are not part of the model");
        assert!(a < self.node_count && b < self.node_count);

        self.now += 1.0;
        if cost.is_finite() {
            self.links.insert(link_key(a, b), cost);
        } else {
            self.links.remove(&link_key(a, b));
        }

        let (first, second) = link_key(a, b);
        for (node, neighbor) in [(first, second), (second, first)] {
            let ctx = self.context(node);
            let outputs = self.nodes[node as usize]
                .engine
                .on_link_change(&ctx, neighbor, cost);
            self.apply_outputs(node, outputs);
        }
    }

    /// Delivers the oldest in-flight message. Returns `false` when the
    /// queue is empty. A message whose link has meanwhile failed is
    /// dropped without delivery.
    pub fn deliver_next(&mut self) -> bool {
        let Some(in_flight) = self.queue.pop_front() else {
            return false;
        };
        self.now += 1.0;

        if !self.link_cost(in_flight.from, in_flight.to).is_finite() {
            self.dropped += 1;
            debug!(
                "drop: {} -> {} (link down) seq={}",
                in_flight.from, in_flight.to, in_flight.message.seq
            );
            return true;
        }

        debug!(
            "deliver: {} -> {} kind={:?} seq={}",
            in_flight.from, in_flight.to, in_flight.message.kind, in_flight.message.seq
        );
        let ctx = self.context(in_flight.to);
        let outputs = self.nodes[in_flight.to as usize]
            .engine
            .on_message(&ctx, &in_flight.message);
        self.delivered += 1;
        self.apply_outputs(in_flight.to, outputs);
        true
    }

    /// Drains the in-flight queue, failing when `max_deliveries` is
    /// exceeded (guards non-terminating regressions). Returns the number
    /// of messages taken off the queue.
    pub fn run_to_quiescence(&mut self, max_deliveries: u64) -> Result<u64> {
        let mut taken = 0;
        while self.deliver_next() {
            taken += 1;
            if taken > max_deliveries {
                bail!("network did not quiesce within {max_deliveries} deliveries");
            }
        }
        Ok(taken)
    }

    pub fn pending_messages(&self) -> usize {
        self.queue.len()
    }

    pub fn route_table(&self, node: NodeId) -> &RouteTable {
        &self.nodes[node as usize].route_table
    }

    pub fn engine_name(&self, node: NodeId) -> &'static str {
        self.nodes[node as usize].engine.name()
    }

    pub fn engine_metrics(&self, node: NodeId) -> BTreeMap<String, Value> {
        self.nodes[node as usize].engine.metrics()
    }

    pub fn messages_sent(&self) -> u64 {
        self.sent
    }

    pub fn messages_delivered(&self) -> u64 {
        self.delivered
    }

    pub fn messages_dropped(&self) -> u64 {
        self.dropped
    }

    pub fn now(&self) -> f64 {
        self.now
    }

    fn context(&self, node: NodeId) -> EngineContext {
        let link_costs: BTreeMap<NodeId, Cost> = self
            .links
            .iter()
            .filter_map(|((a, b), cost)| {
                if *a == node {
                    Some((*b, *cost))
                } else if *b == node {
                    Some((*a, *cost))
                } else {
                    None
                }
            })
            .collect();
        EngineContext {
            node_id: node,
            node_count: self.node_count,
            now: self.now,
            link_costs,
        }
    }

    fn apply_outputs(&mut self, node: NodeId, outputs: EngineOutputs) {
        for route in outputs.route_updates {
            debug!(
                "route: node {} -> {} via {:?} cost {}",
                node, route.destination, route.next_hop, route.cost
            );
            self.nodes[node as usize].route_table.apply(route);
        }
        for (to, message) in outputs.outbound {
            self.sent += 1;
            self.queue.push_back(InFlight {
                from: node,
                to,
                message,
            });
        }
    }
}

fn link_key(a: NodeId, b: NodeId) -> (NodeId, NodeId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_nodes_learn_each_other() {
        let mut network = SimNetwork::with_engine(2, EngineKind::DistanceVector);
        network.set_link(0, 1, Cost::new(3));
        network.run_to_quiescence(100).expect("should converge");

        assert_eq!(network.route_table(0).cost(1), Cost::new(3));
        assert_eq!(network.route_table(0).next_hop(1), Some(1));
        assert_eq!(network.route_table(1).cost(0), Cost::new(3));
    }

    #[test]
    fn message_on_failed_link_is_dropped() {
        let mut network = SimNetwork::with_engine(2, EngineKind::DistanceVector);
        network.set_link(0, 1, Cost::new(1));
        // Cut the link while the initial advertisements are in flight.
        network.set_link(0, 1, Cost::INFINITY);
        network.run_to_quiescence(100).expect("should converge");

        assert!(network.messages_dropped() > 0);
        assert_eq!(network.route_table(0).cost(1), Cost::INFINITY);
    }

    #[test]
    fn quiescence_budget_is_enforced() {
        let mut network = SimNetwork::with_engine(3, EngineKind::LinkState);
        network.set_link(0, 1, Cost::new(1));
        network.set_link(1, 2, Cost::new(1));
        assert!(network.run_to_quiescence(1).is_err());
    }
}
