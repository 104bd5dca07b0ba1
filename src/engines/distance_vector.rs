use std::collections::BTreeMap;

use serde_json::{json, Value};

use crate::compute::{relax_distance_vectors, DvRelaxInput};
use crate::model::cost::Cost;
use crate::model::messages::{MessageKind, ProtocolMessage};
use crate::model::routing::Route;
use crate::model::NodeId;

use super::base::{EngineContext, EngineOutputs, RoutingEngine};

/// Bellman-Ford distance-vector engine, full-recompute variant: the local
/// vector is re-derived from the direct links and the last-received
/// neighbor vectors on every event, so cost increases are re-learned. No
/// split-horizon or poisoned-reverse suppression is applied; transient
/// count-to-infinity after a link failure is accepted behavior.
pub struct DistanceVectorEngine {
    msg_seq: u64,
    vector: BTreeMap<NodeId, Cost>,
    via: BTreeMap<NodeId, NodeId>,
    neighbor_vectors: BTreeMap<NodeId, BTreeMap<NodeId, Cost>>,
}

impl DistanceVectorEngine {
    pub fn new() -> Self {
        Self {
            msg_seq: 0,
            vector: BTreeMap::new(),
            via: BTreeMap::new(),
            neighbor_vectors: BTreeMap::new(),
        }
    }

    /// Re-runs the relaxation and commits the result. Returns whether the
    /// advertised vector changed; a via-only rewrite (equal cost, different
    /// winner) emits its route update without counting as a change.
    fn recompute(&mut self, ctx: &EngineContext) -> (bool, Vec<Route>) {
        let candidates = relax_distance_vectors(&DvRelaxInput {
            node_id: ctx.node_id,
            node_count: ctx.node_count,
            link_costs: &ctx.link_costs,
            neighbor_vectors: &self.neighbor_vectors,
        });

        let mut vector_changed = false;
        let mut route_updates = Vec::new();

        for (destination, (cost, next_hop)) in candidates {
            let stored_cost = self
                .vector
                .get(&destination)
                .copied()
                .unwrap_or(Cost::INFINITY);
            let stored_via = self.via.get(&destination).copied();

            if cost != stored_cost {
                self.vector.insert(destination, cost);
                self.commit_via(destination, next_hop);
                route_updates.push(Route {
                    destination,
                    next_hop,
                    cost,
                });
                vector_changed = true;
            } else if cost.is_finite() && stored_via != next_hop {
                self.commit_via(destination, next_hop);
                route_updates.push(Route {
                    destination,
                    next_hop,
                    cost,
                });
            }
        }

        (vector_changed, route_updates)
    }

    fn commit_via(&mut self, destination: NodeId, next_hop: Option<NodeId>) {
        match next_hop {
            Some(hop) => {
                self.via.insert(destination, hop);
            }
            None => {
                self.via.remove(&destination);
            }
        }
    }

    fn broadcast(&mut self, ctx: &EngineContext) -> Vec<(NodeId, ProtocolMessage)> {
        let entries: Vec<Value> = self
            .vector
            .iter()
            .map(|(destination, cost)| json!({"destination": destination, "cost": cost}))
            .collect();
        let mut payload = BTreeMap::new();
        payload.insert("entries".to_string(), Value::Array(entries));

        let mut outbound = Vec::new();
        for (neighbor, _) in ctx.neighbors() {
            outbound.push((neighbor, self.new_message(ctx, payload.clone())));
        }
        outbound
    }

    fn new_message(
        &mut self,
        ctx: &EngineContext,
        payload: BTreeMap<String, Value>,
    ) -> ProtocolMessage {
        self.msg_seq += 1;
        ProtocolMessage {
            protocol: self.name().to_string(),
            kind: MessageKind::DvUpdate,
            src_node_id: ctx.node_id,
            seq: self.msg_seq,
            payload,
            ts: ctx.now,
        }
    }

    fn parse_vector_entries(entries: &[Value]) -> BTreeMap<NodeId, Cost> {
        let mut parsed = BTreeMap::new();
        for item in entries {
            let Some(obj) = item.as_object() else {
                continue;
            };
            let Some(destination) = obj
                .get("destination")
                .and_then(Value::as_u64)
                .and_then(|v| NodeId::try_from(v).ok())
            else {
                continue;
            };
            let Some(cost) = obj
                .get("cost")
                .and_then(Value::as_u64)
                .and_then(|v| u32::try_from(v).ok())
            else {
                continue;
            };
            parsed.insert(destination, Cost::new(cost));
        }
        parsed
    }
}

impl Default for DistanceVectorEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RoutingEngine for DistanceVectorEngine {
    fn name(&self) -> &'static str {
        "distance_vector"
    }

    fn start(&mut self, ctx: &EngineContext) -> EngineOutputs {
        self.vector.insert(ctx.node_id, Cost::ZERO);
        for node in ctx.nodes() {
            if node != ctx.node_id {
                self.vector.insert(node, Cost::INFINITY);
            }
        }

        let mut outputs = EngineOutputs::default();
        let (changed, route_updates) = self.recompute(ctx);
        outputs.route_updates = route_updates;
        if changed {
            outputs.outbound = self.broadcast(ctx);
        }
        outputs
    }

    fn on_link_change(
        &mut self,
        ctx: &EngineContext,
        neighbor: NodeId,
        new_cost: Cost,
    ) -> EngineOutputs {
        debug_assert_eq!(ctx.link_cost(neighbor), new_cost);

        let mut outputs = EngineOutputs::default();
        let (changed, route_updates) = self.recompute(ctx);
        outputs.route_updates = route_updates;
        if changed {
            outputs.outbound = self.broadcast(ctx);
        }
        outputs
    }

    fn on_message(&mut self, ctx: &EngineContext, message: &ProtocolMessage) -> EngineOutputs {
        assert_ne!(message.src_node_id, ctx.node_id);

        let mut outputs = EngineOutputs::default();
        if message.kind != MessageKind::DvUpdate {
            return outputs;
        }

        let entries = message
            .payload
            .get("entries")
            .and_then(Value::as_array)
            .map_or_else(BTreeMap::new, |arr| Self::parse_vector_entries(arr));
        self.neighbor_vectors.insert(message.src_node_id, entries);

        let (changed, route_updates) = self.recompute(ctx);
        outputs.route_updates = route_updates;
        if changed {
            outputs.outbound = self.broadcast(ctx);
        }
        outputs
    }

    fn metrics(&self) -> BTreeMap<String, Value> {
        let mut out = BTreeMap::new();
        let vector: BTreeMap<String, Value> = self
            .vector
            .iter()
            .map(|(destination, cost)| (destination.to_string(), json!(cost)))
            .collect();
        out.insert("vector".to_string(), json!(vector));
        out.insert(
            "neighbor_vectors_tracked".to_string(),
            json!(self.neighbor_vectors.len()),
        );
        out
    }
}
