use std::collections::BTreeMap;

use serde_json::{json, Value};

use crate::compute::{relax_path_vectors, PathEntry, PvRelaxInput};
use crate::model::cost::Cost;
use crate::model::messages::{MessageKind, ProtocolMessage};
use crate::model::routing::Route;
use crate::model::NodeId;

use super::base::{EngineContext, EngineOutputs, RoutingEngine};

/// Path-vector engine: Bellman-Ford with explicit per-destination paths.
/// A neighbor whose advertised path already contains this node is never a
/// candidate, so accepted paths are loop-free by construction rather than
/// suppressed after the fact.
pub struct PathVectorEngine {
    msg_seq: u64,
    table: BTreeMap<NodeId, PathEntry>,
    neighbor_tables: BTreeMap<NodeId, BTreeMap<NodeId, PathEntry>>,
}

impl PathVectorEngine {
    pub fn new() -> Self {
        Self {
            msg_seq: 0,
            table: BTreeMap::new(),
            neighbor_tables: BTreeMap::new(),
        }
    }

    /// Re-runs the loop-aware relaxation and commits the result. A change
    /// is a cost change or, for reachable destinations, a first-hop
    /// change; both rewrite the stored path and re-advertise (the path is
    /// part of the advertisement, unlike the distance-vector case).
    fn relax(&mut self, ctx: &EngineContext) -> (bool, Vec<Route>) {
        let candidates = relax_path_vectors(&PvRelaxInput {
            node_id: ctx.node_id,
            node_count: ctx.node_count,
            link_costs: &ctx.link_costs,
            neighbor_entries: &self.neighbor_tables,
        });

        let mut changed = false;
        let mut route_updates = Vec::new();

        for (destination, (cost, next_hop)) in candidates {
            let stored = self.table.get(&destination);
            let stored_cost = stored.map_or(Cost::INFINITY, |entry| entry.cost);
            let stored_first_hop = stored.and_then(|entry| entry.path.first().copied());

            let changed_cost = cost != stored_cost;
            let changed_first_hop = stored_cost.is_finite() && stored_first_hop != next_hop;
            if !changed_cost && !changed_first_hop {
                continue;
            }
            changed = true;

            let path = match next_hop {
                None => Vec::new(),
                Some(via) => {
                    let mut path = vec![via];
                    if via != destination {
                        if let Some(entry) = self
                            .neighbor_tables
                            .get(&via)
                            .and_then(|entries| entries.get(&destination))
                        {
                            path.extend_from_slice(&entry.path);
                        }
                    }
                    path
                }
            };
            debug_assert!(!path.contains(&ctx.node_id));

            self.table.insert(destination, PathEntry { cost, path });
            route_updates.push(Route {
                destination,
                next_hop,
                cost,
            });
        }

        (changed, route_updates)
    }

    fn broadcast(&mut self, ctx: &EngineContext) -> Vec<(NodeId, ProtocolMessage)> {
        let entries: Vec<Value> = self
            .table
            .iter()
            .map(|(destination, entry)| {
                json!({
                    "destination": destination,
                    "cost": entry.cost,
                    "path": entry.path,
                })
            })
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
            kind: MessageKind::PvUpdate,
            src_node_id: ctx.node_id,
            seq: self.msg_seq,
            payload,
            ts: ctx.now,
        }
    }

    fn parse_table_entries(entries: &[Value]) -> BTreeMap<NodeId, PathEntry> {
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
            let path = obj
                .get("path")
                .and_then(Value::as_array)
                .map_or_else(Vec::new, |hops| {
                    hops.iter()
                        .filter_map(Value::as_u64)
                        .filter_map(|v| NodeId::try_from(v).ok())
                        .collect()
                });
            parsed.insert(
                destination,
                PathEntry {
                    cost: Cost::new(cost),
                    path,
                },
            );
        }
        parsed
    }
}

impl Default for PathVectorEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RoutingEngine for PathVectorEngine {
    fn name(&self) -> &'static str {
        "path_vector"
    }

    fn start(&mut self, ctx: &EngineContext) -> EngineOutputs {
        self.table.insert(
            ctx.node_id,
            PathEntry {
                cost: Cost::ZERO,
                path: Vec::new(),
            },
        );
        for node in ctx.nodes() {
            if node != ctx.node_id {
                self.table.insert(node, PathEntry::unreachable());
            }
        }

        let mut outputs = EngineOutputs::default();
        let (changed, route_updates) = self.relax(ctx);
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
        let (changed, route_updates) = self.relax(ctx);
        outputs.route_updates = route_updates;
        if changed {
            outputs.outbound = self.broadcast(ctx);
        }
        outputs
    }

    fn on_message(&mut self, ctx: &EngineContext, message: &ProtocolMessage) -> EngineOutputs {
        assert_ne!(message.src_node_id, ctx.node_id);

        let mut outputs = EngineOutputs::default();
        if message.kind != MessageKind::PvUpdate {
            return outputs;
        }

        let entries = message
            .payload
            .get("entries")
            .and_then(Value::as_array)
            .map_or_else(BTreeMap::new, |arr| Self::parse_table_entries(arr));
        self.neighbor_tables.insert(message.src_node_id, entries);

        let (changed, route_updates) = self.relax(ctx);
        outputs.route_updates = route_updates;
        if changed {
            outputs.outbound = self.broadcast(ctx);
        }
        outputs
    }

    fn metrics(&self) -> BTreeMap<String, Value> {
        let mut out = BTreeMap::new();
        let paths: BTreeMap<String, Value> = self
            .table
            .iter()
            .map(|(destination, entry)| (destination.to_string(), json!(entry.path)))
            .collect();
        out.insert("paths".to_string(), json!(paths));
        out.insert(
            "neighbor_tables_tracked".to_string(),
            json!(self.neighbor_tables.len()),
        );
        out
    }
}
