//! Provider adapters and wiring from configuration.
//!
//! - [`http`]: JSON-over-HTTP source, enrichment and signal adapters
//! - [`file`]: file-backed source for offline runs
//! - [`credentials`]: API keys read from the environment

pub mod credentials;
pub mod file;
pub mod http;

use std::sync::Arc;

use tracing::info;

use crate::agents::search::{IndustryProfile, IndustrySearchAgent, SearchAgent};
use crate::error::ConfigError;
use crate::gateway::ProviderGateway;
use crate::pipeline::coordinator::Coordinator;
use crate::traits::provider::{EnrichmentProvider, SignalProvider};
use crate::traits::source::SourceAdapter;
use crate::types::config::{ProvidersConfig, SourceTarget};
use crate::types::lead::Industry;

pub use credentials::ApiKey;
pub use file::FileSource;
pub use http::{classify_status, HttpEnrichmentProvider, HttpSignalProvider, HttpSource};

struct RoutedSource {
    industries: Vec<Industry>,
    adapter: Arc<dyn SourceAdapter>,
}

impl RoutedSource {
    fn serves(&self, industry: Industry) -> bool {
        self.industries.is_empty() || self.industries.contains(&industry)
    }
}

/// Every provider a run talks to, built from [`ProvidersConfig`].
#[derive(Default)]
pub struct ProviderSet {
    sources: Vec<RoutedSource>,
    enrichment: Vec<Arc<dyn EnrichmentProvider>>,
    signals: Option<Arc<dyn SignalProvider>>,
}

impl ProviderSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build adapters for every configured endpoint. API keys are read from
    /// the environment now, so a missing key fails before any run starts.
    pub fn from_config(config: &ProvidersConfig) -> Result<Self, ConfigError> {
        let timeout = std::time::Duration::from_secs(config.request_timeout_seconds.max(1));
        let mut set = Self::new();

        for endpoint in &config.sources {
            let adapter: Arc<dyn SourceAdapter> = match &endpoint.target {
                SourceTarget::Http { url, api_key_env } => {
                    let api_key = api_key_env
                        .as_deref()
                        .map(|var| ApiKey::from_env(var, &endpoint.name))
                        .transpose()?;
                    Arc::new(HttpSource::new(&endpoint.name, url, api_key, timeout)?)
                }
                SourceTarget::File { path } => Arc::new(FileSource::new(&endpoint.name, path)),
            };
            set = set.with_source(endpoint.industries.clone(), adapter);
        }
        for endpoint in &config.enrichment {
            set = set.with_enrichment(Arc::new(HttpEnrichmentProvider::from_config(endpoint, timeout)?));
        }
        if let Some(endpoint) = &config.signals {
            set = set.with_signals(Arc::new(HttpSignalProvider::from_config(endpoint, timeout)?));
        }

        info!(
            sources = set.sources.len(),
            enrichment = set.enrichment.len(),
            signals = set.signals.is_some(),
            "providers configured"
        );
        Ok(set)
    }

    /// Register a source for `industries` (empty means every industry).
    pub fn with_source(mut self, industries: Vec<Industry>, adapter: Arc<dyn SourceAdapter>) -> Self {
        self.sources.push(RoutedSource { industries, adapter });
        self
    }

    pub fn with_enrichment(mut self, provider: Arc<dyn EnrichmentProvider>) -> Self {
        self.enrichment.push(provider);
        self
    }

    pub fn with_signals(mut self, provider: Arc<dyn SignalProvider>) -> Self {
        self.signals = Some(provider);
        self
    }

    pub fn sources_for(&self, industry: Industry) -> Vec<Arc<dyn SourceAdapter>> {
        self.sources
            .iter()
            .filter(|s| s.serves(industry))
            .map(|s| Arc::clone(&s.adapter))
            .collect()
    }

    /// One search agent per industry variant, each over the sources that
    /// serve its industry.
    pub fn search_agents(&self, gateway: &ProviderGateway, max_results: usize) -> Vec<Arc<dyn SearchAgent>> {
        IndustryProfile::all()
            .into_iter()
            .map(|profile| {
                let sources = self.sources_for(profile.industry);
                let agent = IndustrySearchAgent::new(profile, gateway.clone())
                    .with_sources(sources)
                    .with_max_results(max_results);
                Arc::new(agent) as Arc<dyn SearchAgent>
            })
            .collect()
    }

    /// Attach every provider to `coordinator`, sharing its gateway.
    pub fn install(self, coordinator: Coordinator) -> Coordinator {
        let agents = self.search_agents(coordinator.gateway(), coordinator.config().max_results);
        let mut coordinator = coordinator.with_search_agents(agents);
        for provider in self.enrichment {
            coordinator = coordinator.with_enrichment_provider(provider);
        }
        if let Some(provider) = self.signals {
            coordinator = coordinator.with_signal_provider(provider);
        }
        coordinator
    }
}
