use std::collections::BTreeMap;

use crate::model::cost::Cost;
use crate::model::NodeId;

use super::types::{DvRelaxInput, PvRelaxInput, RelaxCandidates};

/// Bellman-Ford relaxation over the last-received neighbor vectors.
///
/// Per destination the scan seeds with the direct link and replaces only
/// on strictly lower cost, visiting neighbors in ascending node order: a
/// direct link wins cost ties against any advertised route, and among
/// advertising neighbors the first in the canonical order wins.
pub fn relax_distance_vectors(input: &DvRelaxInput<'_>) -> RelaxCandidates {
    let mut candidates = RelaxCandidates::new();

    for destination in 0..input.node_count {
        if destination == input.node_id {
            continue;
        }

        let direct = link_cost(input.link_costs, destination);
        let mut best = direct;
        let mut best_via = direct.is_finite().then_some(destination);

        for (neighbor, link) in input.link_costs {
            if *neighbor == input.node_id || *neighbor == destination || !link.is_finite() {
                continue;
            }
            let advertised = input
                .neighbor_vectors
                .get(neighbor)
                .and_then(|vector| vector.get(&destination))
                .copied()
                .unwrap_or(Cost::INFINITY);
            let candidate = link.saturating_add(advertised);
            if candidate < best {
                best = candidate;
                best_via = Some(*neighbor);
            }
        }

        candidates.insert(destination, (best, best_via));
    }

    candidates
}

/// Loop-aware variant: a neighbor is not a candidate for a destination if
/// its advertised path there already contains the relaxing node.
pub fn relax_path_vectors(input: &PvRelaxInput<'_>) -> RelaxCandidates {
    let mut candidates = RelaxCandidates::new();

    for destination in 0..input.node_count {
        if destination == input.node_id {
            continue;
        }

        let direct = link_cost(input.link_costs, destination);
        let mut best = direct;
        let mut best_via = direct.is_finite().then_some(destination);

        for (neighbor, link) in input.link_costs {
            if *neighbor == input.node_id || *neighbor == destination || !link.is_finite() {
                continue;
            }
            let Some(entry) = input
                .neighbor_entries
                .get(neighbor)
                .and_then(|entries| entries.get(&destination))
            else {
                continue;
            };
            let candidate = link.saturating_add(entry.cost);
            if candidate < best && !entry.path.contains(&input.node_id) {
                best = candidate;
                best_via = Some(*neighbor);
            }
        }

        candidates.insert(destination, (best, best_via));
    }

    candidates
}

fn link_cost(link_costs: &BTreeMap<NodeId, Cost>, node: NodeId) -> Cost {
    link_costs.get(&node).copied().unwrap_or(Cost::INFINITY)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::super::types::PathEntry;
    use super::*;

    #[test]
    fn direct_link_wins_cost_ties() {
        let link_costs = BTreeMap::from([(1, Cost::new(2)), (2, Cost::new(1))]);
        // Neighbor 2 advertises destination 1 at total cost 2, tying the
        // direct link.
        let neighbor_vectors = BTreeMap::from([(2, BTreeMap::from([(1, Cost::new(1))]))]);
        let input = DvRelaxInput {
            node_id: 0,
            node_count: 3,
            link_costs: &link_costs,
            neighbor_vectors: &neighbor_vectors,
        };

        let out = relax_distance_vectors(&input);
        assert_eq!(out.get(&1).copied(), Some((Cost::new(2), Some(1))));
    }

    #[test]
    fn first_neighbor_in_order_wins_ties() {
        let link_costs = BTreeMap::from([(1, Cost::new(1)), (2, Cost::new(1))]);
        let neighbor_vectors = BTreeMap::from([
            (1, BTreeMap::from([(3, Cost::new(4))])),
            (2, BTreeMap::from([(3, Cost::new(4))])),
        ]);
        let input = DvRelaxInput {
            node_id: 0,
            node_count: 4,
            link_costs: &link_costs,
            neighbor_vectors: &neighbor_vectors,
        };

        let out = relax_distance_vectors(&input);
        assert_eq!(out.get(&3).copied(), Some((Cost::new(5), Some(1))));
    }

    #[test]
    fn unreachable_destination_has_no_next_hop() {
        let link_costs = BTreeMap::from([(1, Cost::new(1))]);
        let neighbor_vectors = BTreeMap::new();
        let input = DvRelaxInput {
            node_id: 0,
            node_count: 3,
            link_costs: &link_costs,
            neighbor_vectors: &neighbor_vectors,
        };

        let out = relax_distance_vectors(&input);
        assert_eq!(out.get(&2).copied(), Some((Cost::INFINITY, None)));
    }

    #[test]
    fn path_containing_relaxing_node_is_rejected() {
        let link_costs = BTreeMap::from([(1, Cost::new(1))]);
        // Neighbor 1 reaches destination 2 through us: not a candidate,
        // even though the advertised cost is attractive.
        let neighbor_entries = BTreeMap::from([(
            1,
            BTreeMap::from([(
                2,
                PathEntry {
                    cost: Cost::new(1),
                    path: vec![0, 2],
                },
            )]),
        )]);
        let input = PvRelaxInput {
            node_id: 0,
            node_count: 3,
            link_costs: &link_costs,
            neighbor_entries: &neighbor_entries,
        };

        let out = relax_path_vectors(&input);
        assert_eq!(out.get(&2).copied(), Some((Cost::INFINITY, None)));
    }

    #[test]
    fn loop_free_path_is_accepted() {
        let link_costs = BTreeMap::from([(1, Cost::new(1))]);
        let neighbor_entries = BTreeMap::from([(
            1,
            BTreeMap::from([(
                2,
                PathEntry {
                    cost: Cost::new(1),
                    path: vec![2],
                },
            )]),
        )]);
        let input = PvRelaxInput {
            node_id: 0,
            node_count: 3,
            link_costs: &link_costs,
            neighbor_entries: &neighbor_entries,
        };

        let out = relax_path_vectors(&input);
        assert_eq!(out.get(&2).copied(), Some((Cost::new(2), Some(1))));
    }
}
