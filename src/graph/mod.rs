//! Graph Builder (spec §4.B): turns the nodes/edges/strategies active on a date into an
//! in-memory snapshot the allocation engine walks.

mod builder;
mod hash;
mod snapshot;

pub use builder::GraphBuilder;
pub use hash::compute_graph_hash;
pub use snapshot::GraphSnapshot;
