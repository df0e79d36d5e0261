//! Multi-Agent Lead Discovery Library
//!
//! Industry search agents fan out over data sources; their results are
//! deduplicated into unique leads, enriched, validated against an ideal
//! customer profile, analyzed for buying-signal timing, scored and ranked.
//!
//! # Pipeline
//!
//! ```text
//! Searching → Deduping → Enriching → Validating → TimingAnalysis → Scoring → Completed
//! ```
//!
//! Every outbound provider call goes through one [`ProviderGateway`]: a
//! shared TTL response cache, a per-provider rate limiter and a transient
//! retry loop. Agent failures are recorded on the run and absorbed; only
//! phase-wide failures abort it.
//!
//! # Usage
//!
//! ```rust,ignore
//! use lead_engine::{Coordinator, LeadConfig, MemoryStore, ProviderSet, RunOptions, SearchCriteria};
//!
//! let config = LeadConfig::from_env()?;
//! let providers = ProviderSet::from_config(&config.providers)?;
//! let coordinator = providers
//!     .install(Coordinator::new(config)?)
//!     .with_store(Arc::new(MemoryStore::new()));
//!
//! let run = coordinator
//!     .run(&SearchCriteria::new().with_region("Ohio"), RunOptions::new())
//!     .await?;
//! for lead in run.ranked().iter().take(10) {
//!     println!("{} {:.1}", lead.company().name, lead.score().unwrap().overall());
//! }
//! ```
//!
//! # Modules
//!
//! - [`types`] - Leads, signals, scores, run records and configuration
//! - [`traits`] - Provider and store seams
//! - [`gateway`] - Cache, rate limiting and retry around provider calls
//! - [`agents`] - Search, enrichment, validation and timing agents
//! - [`pipeline`] - Deduplication, scoring and the run coordinator
//! - [`providers`] - HTTP and file adapters built from configuration
//! - [`stores`] - Lead stores (MemoryStore, SqliteStore)
//! - [`export`] - CSV and JSON export
//! - [`testing`] - Mock implementations for testing

pub mod agents;
pub mod error;
pub mod export;
pub mod gateway;
pub mod pipeline;
pub mod providers;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use error::{
    ConfigError, FatalError, FatalReason, ProviderError, ProviderResult, SearchError, StoreError,
    StoreResult,
};
pub use traits::{
    provider::{CompanyQuery, EnrichmentData, EnrichmentProvider, SignalProvider},
    source::SourceAdapter,
    store::LeadStore,
};
pub use types::{
    config::{IcpThresholds, LeadConfig, ProvidersConfig, RetryConfig, TimingConfig},
    lead::{CompanyProfile, Contact, Industry, Lead, LeadKey, LeadStatus},
    raw::{RawLead, SearchCriteria, SourceQuery},
    run::{ErrorKind, ErrorRecord, Phase, RunStats, WorkflowRun},
    score::{ScoreBreakdown, ScoreFactors, ScoreWeights},
    signal::{Signal, SignalKind},
};

pub use agents::{
    EnrichmentAgent, IndustryProfile, IndustrySearchAgent, SearchAgent, TimingAgent,
    UrgencyLevel, ValidationAgent,
};
pub use export::ExportFormat;
pub use gateway::{ProviderGateway, RetryPolicy};
pub use pipeline::{Coordinator, RunOptions, Scorer};
pub use providers::{FileSource, HttpEnrichmentProvider, HttpSignalProvider, HttpSource, ProviderSet};

// Re-export stores
pub use stores::MemoryStore;

#[cfg(feature = "sqlite")]
pub use stores::SqliteStore;
