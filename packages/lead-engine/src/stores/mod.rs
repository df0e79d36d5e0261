//! Lead store implementations.
//!
//! Available backends:
//! - `MemoryStore` - In-memory storage (always available)
//! - `SqliteStore` - SQLite file-based storage (requires `sqlite` feature)

use std::cmp::Ordering;

use crate::types::lead::Lead;

pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::MemoryStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

/// Store ordering: overall score descending, then id ascending.
pub(crate) fn by_overall_then_id(a: &Lead, b: &Lead) -> Ordering {
    let overall = |lead: &Lead| lead.score().map(|s| s.overall()).unwrap_or(0.0);
    overall(b)
        .total_cmp(&overall(a))
        .then_with(|| a.id().cmp(b.id()))
}
