//! Core trait abstractions for the lead engine.
//!
//! These traits define the seams applications implement to plug in data
//! providers and storage.

pub mod provider;
pub mod source;
pub mod store;

pub use provider::{CompanyQuery, EnrichmentData, EnrichmentProvider, SignalProvider};
pub use source::SourceAdapter;
pub use store::LeadStore;
