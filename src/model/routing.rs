use std::collections::BTreeMap;

use crate::model::cost::Cost;
use crate::model::NodeId;

/// Committed route-table entry. `next_hop` is `None` exactly when the
/// destination is unreachable (`cost == INFINITY`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub destination: NodeId,
    pub next_hop: Option<NodeId>,
    pub cost: Cost,
}

#[derive(Debug, Default)]
pub struct RouteTable {
    routes: BTreeMap<NodeId, Route>,
}

impl RouteTable {
    /// Commits a route update, returning whether the stored entry changed.
    pub fn apply(&mut self, route: Route) -> bool {
        let prev = self.routes.get(&route.destination);
        if prev == Some(&route) {
            return false;
        }
        self.routes.insert(route.destination, route);
        true
    }

    pub fn get(&self, destination: NodeId) -> Option<&Route> {
        self.routes.get(&destination)
    }

    pub fn next_hop(&self, destination: NodeId) -> Option<NodeId> {
        self.routes.get(&destination).and_then(|route| route.next_hop)
    }

    pub fn cost(&self, destination: NodeId) -> Cost {
        self.routes
            .get(&destination)
            .map_or(Cost::INFINITY, |route| route.cost)
    }

    pub fn snapshot(&self) -> Vec<Route> {
        self.routes.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_reports_changes_only() {
        let mut table = RouteTable::default();
        let route = Route {
            destination: 3,
            next_hop: Some(1),
            cost: Cost::new(2),
        };
        assert!(table.apply(route.clone()));
        assert!(!table.apply(route));
        assert!(table.apply(Route {
            destination: 3,
            next_hop: Some(2),
            cost: Cost::new(2),
        }));
        assert_eq!(table.next_hop(3), Some(2));
        assert_eq!(table.cost(3), Cost::new(2));
    }

    #[test]
    fn unknown_destination_is_unreachable() {
        let table = RouteTable::default();
        assert_eq!(table.cost(9), Cost::INFINITY);
        assert_eq!(table.next_hop(9), None);
    }
}
