pub mod cost;
pub mod messages;
pub mod routing;

/// Node identifier. Nodes form a contiguous range `0..node_count` known to
/// every node, iterated in ascending order everywhere.
pub type NodeId = u32;
