//! Pipeline agents.
//!
//! - [`search`]: industry search agents (fan-out over source adapters)
//! - [`enrichment`]: contacts, firmographics, tech stack
//! - [`validation`]: ideal-customer-profile rules
//! - [`timing`]: signal detection and recency-based urgency

pub mod enrichment;
pub mod search;
pub mod timing;
pub mod validation;

pub use enrichment::{apply_enrichment, EnrichmentAgent, EnrichmentOutcome};
pub use search::{IndustryProfile, IndustrySearchAgent, SearchAgent};
pub use timing::{score_timing, TimingAgent, TimingOutcome, UrgencyLevel};
pub use validation::{validate, ValidationAgent, ValidationOutcome};
