pub mod base;
pub mod distance_vector;
pub mod link_state;
pub mod path_vector;

pub use base::{EngineContext, EngineOutputs, RoutingEngine};
pub use distance_vector::DistanceVectorEngine;
pub use link_state::LinkStateEngine;
pub use path_vector::PathVectorEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    DistanceVector,
    LinkState,
    PathVector,
}

impl EngineKind {
    pub fn from_str(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "distance_vector" | "distance-vector" | "dv" => Some(Self::DistanceVector),
            "link_state" | "link-state" | "ls" => Some(Self::LinkState),
            "path_vector" | "path-vector" | "pv" => Some(Self::PathVector),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::DistanceVector => "distance_vector",
            Self::LinkState => "link_state",
            Self::PathVector => "path_vector",
        }
    }

    pub fn all() -> [EngineKind; 3] {
        [Self::DistanceVector, Self::LinkState, Self::PathVector]
    }

    pub fn build(self) -> Box<dyn RoutingEngine> {
        match self {
            Self::DistanceVector => Box::new(DistanceVectorEngine::new()),
            Self::LinkState => Box::new(LinkStateEngine::new()),
            Self::PathVector => Box::new(PathVectorEngine::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_kind_parses_aliases() {
        assert_eq!(EngineKind::from_str("dv"), Some(EngineKind::DistanceVector));
        assert_eq!(
            EngineKind::from_str(" Link-State "),
            Some(EngineKind::LinkState)
        );
        assert_eq!(EngineKind::from_str("pv"), Some(EngineKind::PathVector));
        assert_eq!(EngineKind::from_str("ospf"), None);
    }

    #[test]
    fn engine_kind_builds_matching_engine() {
        for kind in EngineKind::all() {
            assert_eq!(kind.build().name(), kind.as_str());
        }
    }
}
