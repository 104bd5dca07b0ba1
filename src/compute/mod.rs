mod all_pairs;
mod relax;
mod spf;
mod types;

pub use all_pairs::compute_all_pairs;
pub use relax::{relax_distance_vectors, relax_path_vectors};
pub use spf::compute_spf;
pub use types::{CostMatrix, DvRelaxInput, PathEntry, PvRelaxInput, RelaxCandidates, SpfResult};
