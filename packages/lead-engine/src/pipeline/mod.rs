//! Lead pipeline.
//!
//! - [`dedup`]: raw results → unique leads
//! - [`scorer`]: fit / intent / timing scoring and ranking
//! - [`coordinator`]: phase sequencing, concurrency, deadline and error log

pub mod coordinator;
pub mod dedup;
pub mod scorer;

pub use coordinator::{Coordinator, RunOptions};
pub use dedup::{deduplicate, merge};
pub use scorer::{compare, rank, Scorer};
