use std::collections::BTreeMap;

use crate::model::cost::Cost;
use crate::model::NodeId;

/// Full cost matrix: origin node -> (destination -> advertised cost).
/// Rows absent from the map are treated as all-INFINITY.
pub type CostMatrix = BTreeMap<NodeId, BTreeMap<NodeId, Cost>>;

/// Shortest-path tree rooted at a source: best cost and first hop per
/// destination. Unreachable destinations carry `Cost::INFINITY` and are
/// absent from `via`.
#[derive(Debug, Clone)]
pub struct SpfResult {
    pub dist: BTreeMap<NodeId, Cost>,
    pub via: BTreeMap<NodeId, NodeId>,
}

/// Inputs to the distance-vector relaxation.
#[derive(Debug, Clone)]
pub struct DvRelaxInput<'a> {
    pub node_id: NodeId,
    pub node_count: u32,
    pub link_costs: &'a BTreeMap<NodeId, Cost>,
    pub neighbor_vectors: &'a BTreeMap<NodeId, BTreeMap<NodeId, Cost>>,
}

/// Best (cost, next hop) per destination; `None` next hop when the
/// destination is unreachable.
pub type RelaxCandidates = BTreeMap<NodeId, (Cost, Option<NodeId>)>;

/// One advertised path-vector entry: cost plus the explicit node sequence
/// from the advertising origin to the destination (`path[0]` = first hop,
/// last element = destination). Empty path when unreachable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathEntry {
    pub cost: Cost,
    pub path: Vec<NodeId>,
}

impl PathEntry {
    pub fn unreachable() -> Self {
        PathEntry {
            cost: Cost::INFINITY,
            path: Vec::new(),
        }
    }
}

/// Inputs to the loop-aware path-vector relaxation.
#[derive(Debug, Clone)]
pub struct PvRelaxInput<'a> {
    pub node_id: NodeId,
    pub node_count: u32,
    pub link_costs: &'a BTreeMap<NodeId, Cost>,
    pub neighbor_entries: &'a BTreeMap<NodeId, BTreeMap<NodeId, PathEntry>>,
}
