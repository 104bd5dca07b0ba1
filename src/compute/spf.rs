use std::collections::{BTreeMap, BTreeSet};

use crate::model::cost::Cost;
use crate::model::NodeId;

use super::types::{CostMatrix, SpfResult};

/// Tree-growing Dijkstra over a full cost matrix.
///
/// Tentative costs start from the source's own row. Each round the
/// minimum-cost node not yet in the tree joins it (ties broken by the
/// fixed node order: the first minimum in ascending order wins) and every
/// non-tree node is relaxed through it. First hops derive from walking
/// predecessors back to the node adjacent to the source.
pub fn compute_spf(matrix: &CostMatrix, src: NodeId, node_count: u32) -> SpfResult {
    let mut dist: BTreeMap<NodeId, Cost> = (0..node_count)
        .map(|node| (node, row_cost(matrix, src, node)))
        .collect();
    dist.insert(src, Cost::ZERO);

    let mut predecessor: BTreeMap<NodeId, NodeId> =
        (0..node_count).map(|node| (node, src)).collect();
    let mut tree: BTreeSet<NodeId> = BTreeSet::from([src]);

    while (tree.len() as u32) < node_count {
        let mut selected: Option<(NodeId, Cost)> = None;
        for node in 0..node_count {
            if tree.contains(&node) {
                continue;
            }
            let cost = dist[&node];
            match selected {
                Some((_, best)) if cost >= best => {}
                _ => selected = Some((node, cost)),
            }
        }
        let Some((w, cost_w)) = selected else {
            break;
        };
        tree.insert(w);

        for x in 0..node_count {
            if tree.contains(&x) {
                continue;
            }
            let candidate = cost_w.saturating_add(row_cost(matrix, w, x));
            if candidate < dist[&x] {
                dist.insert(x, candidate);
                predecessor.insert(x, w);
            }
        }
    }

    let mut via = BTreeMap::new();
    for node in 0..node_count {
        if node == src || !dist[&node].is_finite() {
            continue;
        }
        let mut hop = node;
        while predecessor[&hop] != src {
            hop = predecessor[&hop];
        }
        via.insert(node, hop);
    }

    SpfResult { dist, via }
}

fn row_cost(matrix: &CostMatrix, origin: NodeId, destination: NodeId) -> Cost {
    matrix
        .get(&origin)
        .and_then(|row| row.get(&destination))
        .copied()
        .unwrap_or(Cost::INFINITY)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn matrix(rows: &[(NodeId, &[(NodeId, u32)])]) -> CostMatrix {
        rows.iter()
            .map(|(origin, links)| {
                (
                    *origin,
                    links
                        .iter()
                        .map(|(dest, cost)| (*dest, Cost::new(*cost)))
                        .collect(),
                )
            })
            .collect()
    }

    #[test]
    fn spf_follows_cheapest_multi_hop_path() {
        let m = matrix(&[
            (0, &[(1, 1), (2, 5)]),
            (1, &[(0, 1), (2, 1)]),
            (2, &[(0, 5), (1, 1)]),
        ]);
        let result = compute_spf(&m, 0, 3);
        assert_eq!(result.dist[&2], Cost::new(2));
        assert_eq!(result.via.get(&2).copied(), Some(1));
        assert_eq!(result.via.get(&1).copied(), Some(1));
    }

    #[test]
    fn spf_ties_prefer_first_node_in_order() {
        let m = matrix(&[
            (0, &[(1, 1), (2, 1)]),
            (1, &[(0, 1), (3, 1)]),
            (2, &[(0, 1), (3, 1)]),
            (3, &[(1, 1), (2, 1)]),
        ]);
        let result = compute_spf(&m, 0, 4);
        assert_eq!(result.dist[&3], Cost::new(2));
        assert_eq!(result.via.get(&3).copied(), Some(1));
    }

    #[test]
    fn spf_leaves_unreachable_nodes_without_via() {
        let m = matrix(&[(0, &[(1, 1)]), (1, &[(0, 1)])]);
        let result = compute_spf(&m, 0, 3);
        assert_eq!(result.dist[&2], Cost::INFINITY);
        assert!(!result.via.contains_key(&2));
    }

    #[test]
    fn spf_reaches_nodes_absent_from_the_source_row() {
        // Node 2 is unknown to the source's own row; it is still reached
        // transitively through node 1's advertised links.
        let m = matrix(&[(0, &[(1, 1)]), (1, &[(0, 1), (2, 2)]), (2, &[(1, 2)])]);
        let result = compute_spf(&m, 0, 3);
        assert_eq!(result.dist[&2], Cost::new(3));
        assert_eq!(result.via.get(&2).copied(), Some(1));
    }
}
