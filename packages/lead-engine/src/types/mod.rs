//! Data types for the lead engine.

pub mod config;
pub mod lead;
pub mod raw;
pub mod run;
pub mod score;
pub mod signal;

pub use config::{
    HttpEndpoint, IcpThresholds, LeadConfig, ProvidersConfig, RetryConfig, ScoringConfig,
    SizeBand, SourceEndpoint, SourceTarget, TimingConfig,
};
pub use lead::{
    canonical_company_name, CompanyIds, CompanyProfile, Contact, Industry, Lead, LeadKey,
    LeadStatus,
};
pub use raw::{normalize_query, RawLead, SearchCriteria, SourceQuery};
pub use run::{ActivityEntry, ErrorKind, ErrorRecord, Phase, RunRecorder, RunStats, WorkflowRun};
pub use score::{ScoreBreakdown, ScoreFactors, ScoreWeights};
pub use signal::{Signal, SignalKind};
