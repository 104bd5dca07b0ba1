pub mod network;
pub mod scenario;

pub use network::SimNetwork;
pub use scenario::{load_scenario, parse_scenario, run_scenario, LinkEvent, Scenario};
