use std::collections::BTreeMap;

use crate::model::cost::Cost;
use crate::model::NodeId;

use super::types::CostMatrix;

/// Floyd-Warshall all-pairs shortest path costs over a direct-link
/// matrix. Serves as the independent reference the converged engines are
/// checked against.
pub fn compute_all_pairs(matrix: &CostMatrix, node_count: u32) -> BTreeMap<(NodeId, NodeId), Cost> {
    let mut dist: BTreeMap<(NodeId, NodeId), Cost> = BTreeMap::new();
    for a in 0..node_count {
        for b in 0..node_count {
            let cost = if a == b {
                Cost::ZERO
            } else {
                matrix
                    .get(&a)
                    .and_then(|row| row.get(&b))
                    .copied()
                    .unwrap_or(Cost::INFINITY)
            };
            dist.insert((a, b), cost);
        }
    }

    for k in 0..node_count {
        for a in 0..node_count {
            for b in 0..node_count {
                let through = dist[&(a, k)].saturating_add(dist[&(k, b)]);
                if through < dist[&(a, b)] {
                    dist.insert((a, b), through);
                }
            }
        }
    }

    dist
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn all_pairs_matches_hand_computed_chain() {
        let mut matrix: CostMatrix = BTreeMap::new();
        for (a, b, cost) in [(0, 1, 1), (1, 2, 1), (2, 3, 1)] {
            matrix
                .entry(a)
                .or_insert_with(BTreeMap::new)
                .insert(b, Cost::new(cost));
            matrix
                .entry(b)
                .or_insert_with(BTreeMap::new)
                .insert(a, Cost::new(cost));
        }

        let dist = compute_all_pairs(&matrix, 4);
        assert_eq!(dist[&(0, 3)], Cost::new(3));
        assert_eq!(dist[&(3, 0)], Cost::new(3));
        assert_eq!(dist[&(1, 1)], Cost::ZERO);
    }

    #[test]
    fn all_pairs_keeps_partitions_unreachable() {
        let matrix: CostMatrix = BTreeMap::from([
            (0, BTreeMap::from([(1, Cost::new(2))])),
            (1, BTreeMap::from([(0, Cost::new(2))])),
        ]);
        let dist = compute_all_pairs(&matrix, 3);
        assert_eq!(dist[&(0, 2)], Cost::INFINITY);
        assert_eq!(dist[&(2, 1)], Cost::INFINITY);
    }
}
