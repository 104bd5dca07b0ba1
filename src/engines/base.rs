use std::collections::BTreeMap;

use serde_json::Value;

use crate::model::cost::Cost;
use crate::model::messages::ProtocolMessage;
use crate::model::routing::Route;
use crate::model::NodeId;

/// Per-event view of the local node handed in by the harness: identity,
/// the closed node set, current direct-link costs and the simulated clock
/// (diagnostic only).
#[derive(Debug, Clone)]
pub struct EngineContext {
    pub node_id: NodeId,
    pub node_count: u32,
    pub now: f64,
    pub link_costs: BTreeMap<NodeId, Cost>,
}

impl EngineContext {
    /// All node identifiers in the fixed global iteration order.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> {
        0..self.node_count
    }

    /// Cost of the direct link to `node`; `INFINITY` for non-neighbors,
    /// `ZERO` for the local node itself.
    pub fn link_cost(&self, node: NodeId) -> Cost {
        if node == self.node_id {
            return Cost::ZERO;
        }
        self.link_costs.get(&node).copied().unwrap_or(Cost::INFINITY)
    }

    /// Directly-adjacent nodes (finite link cost, self excluded), ascending.
    pub fn neighbors(&self) -> impl Iterator<Item = (NodeId, Cost)> + '_ {
        self.link_costs
            .iter()
            .filter(|(node, cost)| **node != self.node_id && cost.is_finite())
            .map(|(node, cost)| (*node, *cost))
    }
}

/// External effects of one event: messages to adjacent nodes and route
/// updates for destinations whose (cost, next hop) actually changed.
#[derive(Debug, Default, Clone)]
pub struct EngineOutputs {
    pub outbound: Vec<(NodeId, ProtocolMessage)>,
    pub route_updates: Vec<Route>,
}

/// A routing protocol engine. Driven by exactly two external events; all
/// cross-node information arrives via delivered messages. Handlers run to
/// completion, are never re-entered, and never observe another node's
/// state directly.
pub trait RoutingEngine {
    fn name(&self) -> &'static str;

    /// Initializes engine state from the context's current link costs.
    fn start(&mut self, ctx: &EngineContext) -> EngineOutputs;

    fn on_link_change(&mut self, ctx: &EngineContext, neighbor: NodeId, new_cost: Cost)
        -> EngineOutputs;

    fn on_message(&mut self, ctx: &EngineContext, message: &ProtocolMessage) -> EngineOutputs;

    fn metrics(&self) -> BTreeMap<String, Value> {
        BTreeMap::new()
    }
}
