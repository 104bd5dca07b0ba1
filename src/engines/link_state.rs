use std::collections::BTreeMap;

use serde_json::{json, Value};

use crate::compute::{compute_spf, CostMatrix};
use crate::model::cost::Cost;
use crate::model::messages::{MessageKind, ProtocolMessage};
use crate::model::routing::Route;
use crate::model::NodeId;

use super::base::{EngineContext, EngineOutputs, RoutingEngine};

/// One origin's advertised link costs plus the version it was advertised
/// under. Absent destinations are INFINITY.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LinkStateRecord {
    version: u64,
    costs: BTreeMap<NodeId, Cost>,
}

/// Link-state engine: a versioned database of every origin's advertised
/// link costs, flooded to all neighbors, with the full shortest-path tree
/// recomputed by Dijkstra after any accepted update. A record is accepted
/// only when strictly newer than the stored version for its origin.
pub struct LinkStateEngine {
    msg_seq: u64,
    database: BTreeMap<NodeId, LinkStateRecord>,
    committed: BTreeMap<NodeId, (Cost, Option<NodeId>)>,
}

impl LinkStateEngine {
    pub fn new() -> Self {
        Self {
            msg_seq: 0,
            database: BTreeMap::new(),
            committed: BTreeMap::new(),
        }
    }

    fn local_version(&self, origin: NodeId) -> u64 {
        self.database
            .get(&origin)
            .map_or(0, |record| record.version)
    }

    /// Accepts a record iff its version is strictly newer.
    fn upsert_record(&mut self, origin: NodeId, version: u64, costs: BTreeMap<NodeId, Cost>) -> bool {
        if version <= self.local_version(origin) {
            return false;
        }
        self.database
            .insert(origin, LinkStateRecord { version, costs });
        true
    }

    /// Runs Dijkstra over the database and commits route changes. Only
    /// destinations whose (cost, via) differ from the committed view are
    /// pushed; self is skipped.
    fn recompute_routes(&mut self, ctx: &EngineContext) -> Vec<Route> {
        let matrix: CostMatrix = self
            .database
            .iter()
            .map(|(origin, record)| (*origin, record.costs.clone()))
            .collect();
        let result = compute_spf(&matrix, ctx.node_id, ctx.node_count);

        let mut route_updates = Vec::new();
        for destination in ctx.nodes() {
            if destination == ctx.node_id {
                continue;
            }
            let cost = result
                .dist
                .get(&destination)
                .copied()
                .unwrap_or(Cost::INFINITY);
            let next_hop = result.via.get(&destination).copied();
            let entry = (cost, next_hop);
            if self.committed.get(&destination) == Some(&entry) {
                continue;
            }
            self.committed.insert(destination, entry);
            route_updates.push(Route {
                destination,
                next_hop,
                cost,
            });
        }
        route_updates
    }

    /// Floods the entire versioned database to every current neighbor.
    fn flood(&mut self, ctx: &EngineContext) -> Vec<(NodeId, ProtocolMessage)> {
        let records: Vec<Value> = self
            .database
            .iter()
            .map(|(origin, record)| {
                let costs: Vec<Value> = record
                    .costs
                    .iter()
                    .map(|(destination, cost)| json!({"destination": destination, "cost": cost}))
                    .collect();
                json!({
                    "origin": origin,
                    "version": record.version,
                    "costs": costs,
                })
            })
            .collect();
        let mut payload = BTreeMap::new();
        payload.insert("records".to_string(), Value::Array(records));

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
            kind: MessageKind::LsDatabase,
            src_node_id: ctx.node_id,
            seq: self.msg_seq,
            payload,
            ts: ctx.now,
        }
    }

    fn parse_records(records: &[Value]) -> Vec<(NodeId, u64, BTreeMap<NodeId, Cost>)> {
        let mut parsed = Vec::new();
        for item in records {
            let Some(obj) = item.as_object() else {
                continue;
            };
            let Some(origin) = obj
                .get("origin")
                .and_then(Value::as_u64)
                .and_then(|v| NodeId::try_from(v).ok())
            else {
                continue;
            };
            let Some(version) = obj.get("version").and_then(Value::as_u64) else {
                continue;
            };
            let mut costs = BTreeMap::new();
            if let Some(entries) = obj.get("costs").and_then(Value::as_array) {
                for entry in entries {
                    let Some(entry) = entry.as_object() else {
                        continue;
                    };
                    let Some(destination) = entry
                        .get("destination")
                        .and_then(Value::as_u64)
                        .and_then(|v| NodeId::try_from(v).ok())
                    else {
                        continue;
                    };
                    let Some(cost) = entry
                        .get("cost")
                        .and_then(Value::as_u64)
                        .and_then(|v| u32::try_from(v).ok())
                    else {
                        continue;
                    };
                    costs.insert(destination, Cost::new(cost));
                }
            }
            parsed.push((origin, version, costs));
        }
        parsed
    }
}

impl Default for LinkStateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RoutingEngine for LinkStateEngine {
    fn name(&self) -> &'static str {
        "link_state"
    }

    fn start(&mut self, ctx: &EngineContext) -> EngineOutputs {
        let mut costs: BTreeMap<NodeId, Cost> = ctx.neighbors().collect();
        costs.insert(ctx.node_id, Cost::ZERO);
        self.database
            .insert(ctx.node_id, LinkStateRecord { version: 1, costs });

        let mut outputs = EngineOutputs::default();
        outputs.route_updates = self.recompute_routes(ctx);
        outputs.outbound = self.flood(ctx);
        outputs
    }

    fn on_link_change(
        &mut self,
        ctx: &EngineContext,
        neighbor: NodeId,
        new_cost: Cost,
    ) -> EngineOutputs {
        // A local link change always produces a new version and a flood.
        let record = self
            .database
            .get_mut(&ctx.node_id)
            .expect("local record is seeded at start");
        if new_cost.is_finite() {
            record.costs.insert(neighbor, new_cost);
        } else {
            record.costs.remove(&neighbor);
        }
        record.version += 1;

        let mut outputs = EngineOutputs::default();
        outputs.route_updates = self.recompute_routes(ctx);
        outputs.outbound = self.flood(ctx);
        outputs
    }

    fn on_message(&mut self, ctx: &EngineContext, message: &ProtocolMessage) -> EngineOutputs {
        assert_ne!(message.src_node_id, ctx.node_id);

        let mut outputs = EngineOutputs::default();
        if message.kind != MessageKind::LsDatabase {
            return outputs;
        }

        let records = message
            .payload
            .get("records")
            .and_then(Value::as_array)
            .map_or_else(Vec::new, |arr| Self::parse_records(arr));

        let mut accepted = false;
        for (origin, version, costs) in records {
            accepted |= self.upsert_record(origin, version, costs);
        }
        if !accepted {
            return outputs;
        }

        outputs.route_updates = self.recompute_routes(ctx);
        outputs.outbound = self.flood(ctx);
        outputs
    }

    fn metrics(&self) -> BTreeMap<String, Value> {
        let mut out = BTreeMap::new();
        let versions: BTreeMap<String, Value> = self
            .database
            .iter()
            .map(|(origin, record)| (origin.to_string(), json!(record.version)))
            .collect();
        out.insert("versions".to_string(), json!(versions));
        out.insert("database_size".to_string(), json!(self.database.len()));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(node_id: NodeId, node_count: u32, links: &[(NodeId, u32)]) -> EngineContext {
        EngineContext {
            node_id,
            node_count,
            now: 0.0,
            link_costs: links
                .iter()
                .map(|(node, cost)| (*node, Cost::new(*cost)))
                .collect(),
        }
    }

    fn database_message(src: NodeId, records: &[(NodeId, u64, &[(NodeId, u32)])]) -> ProtocolMessage {
        let records: Vec<Value> = records
            .iter()
            .map(|(origin, version, costs)| {
                let costs: Vec<Value> = costs
                    .iter()
                    .map(|(destination, cost)| json!({"destination": destination, "cost": cost}))
                    .collect();
                json!({"origin": origin, "version": version, "costs": costs})
            })
            .collect();
        let mut payload = BTreeMap::new();
        payload.insert("records".to_string(), Value::Array(records));
        ProtocolMessage {
            protocol: "link_state".to_string(),
            kind: MessageKind::LsDatabase,
            src_node_id: src,
            seq: 1,
            payload,
            ts: 0.0,
        }
    }

    #[test]
    fn start_installs_direct_routes_and_floods() {
        let mut engine = LinkStateEngine::new();
        let outputs = engine.start(&ctx(0, 3, &[(1, 1), (2, 4)]));

        assert!(outputs
            .route_updates
            .iter()
            .any(|route| route.destination == 1
                && route.next_hop == Some(1)
                && route.cost == Cost::new(1)));
        assert_eq!(outputs.outbound.len(), 2);
    }

    #[test]
    fn newer_record_is_accepted_and_reflooded() {
        let mut engine = LinkStateEngine::new();
        let context = ctx(0, 3, &[(1, 1)]);
        engine.start(&context);

        // Node 1 advertises a link to node 2.
        let outputs = engine.on_message(
            &context,
            &database_message(1, &[(1, 2, &[(0, 1), (2, 1)])]),
        );
        assert!(outputs
            .route_updates
            .iter()
            .any(|route| route.destination == 2
                && route.next_hop == Some(1)
                && route.cost == Cost::new(2)));
        assert_eq!(outputs.outbound.len(), 1);
    }

    #[test]
    fn stale_or_equal_version_is_rejected_silently() {
        let mut engine = LinkStateEngine::new();
        let context = ctx(0, 3, &[(1, 1)]);
        engine.start(&context);
        engine.on_message(
            &context,
            &database_message(1, &[(1, 3, &[(0, 1), (2, 1)])]),
        );

        for version in [3, 2] {
            let outputs = engine.on_message(
                &context,
                &database_message(1, &[(1, version, &[(0, 1), (2, 7)])]),
            );
            assert!(outputs.route_updates.is_empty());
            assert!(outputs.outbound.is_empty());
        }
    }

    #[test]
    fn local_link_change_bumps_version_and_floods() {
        let mut engine = LinkStateEngine::new();
        let mut context = ctx(0, 2, &[(1, 1)]);
        engine.start(&context);
        assert_eq!(engine.local_version(0), 1);

        context.link_costs.insert(1, Cost::new(5));
        let outputs = engine.on_link_change(&context, 1, Cost::new(5));
        assert_eq!(engine.local_version(0), 2);
        assert!(outputs
            .route_updates
            .iter()
            .any(|route| route.destination == 1 && route.cost == Cost::new(5)));
        assert_eq!(outputs.outbound.len(), 1);
    }

    #[test]
    fn failed_link_drops_route_to_infinity() {
        let mut engine = LinkStateEngine::new();
        let mut context = ctx(0, 2, &[(1, 1)]);
        engine.start(&context);

        context.link_costs.insert(1, Cost::INFINITY);
        let outputs = engine.on_link_change(&context, 1, Cost::INFINITY);
        assert!(outputs
            .route_updates
            .iter()
            .any(|route| route.destination == 1
                && route.next_hop.is_none()
                && route.cost == Cost::INFINITY));
        // No finite-cost neighbor remains to flood to.
        assert!(outputs.outbound.is_empty());
    }
}
