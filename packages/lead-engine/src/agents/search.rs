//! Search agents: one variant per industry vertical, composed over the
//! shared [`SourceAdapter`] contract.
//!
//! An agent expands the run's [`SearchCriteria`] into its own industry
//! queries, fans them out across every source it wraps, and returns whatever
//! came back up to its result cap. A failing source costs only its own
//! results; the agent fails only when every source query failed.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::error::{ProviderError, SearchError};
use crate::gateway::ProviderGateway;
use crate::traits::source::SourceAdapter;
use crate::types::lead::Industry;
use crate::types::raw::{RawLead, SearchCriteria, SourceQuery};

/// Capability: fetch raw candidate leads for one industry.
///
/// A call is finite and not restartable. Implementations must be
/// cancel-safe: the coordinator drops the future on timeout or deadline.
#[async_trait]
pub trait SearchAgent: Send + Sync {
    fn name(&self) -> &str;

    fn industry(&self) -> Industry;

    async fn search(&self, criteria: &SearchCriteria) -> Result<Vec<RawLead>, SearchError>;
}

/// Query templates for one vertical.
#[derive(Debug, Clone, PartialEq)]
pub struct IndustryProfile {
    pub industry: Industry,
    pub agent_name: String,
    pub query_templates: Vec<String>,
}

impl IndustryProfile {
    fn new(industry: Industry, agent_name: &str, templates: &[&str]) -> Self {
        Self {
            industry,
            agent_name: agent_name.to_string(),
            query_templates: templates.iter().map(|t| t.to_string()).collect(),
        }
    }

    pub fn banking() -> Self {
        Self::new(
            Industry::Banking,
            "banking_agent",
            &[
                "bank core banking system upgrade",
                "bank digital transformation",
                "bank cloud migration",
                "bank legacy modernization",
            ],
        )
    }

    pub fn insurance() -> Self {
        Self::new(
            Industry::Insurance,
            "insurance_agent",
            &[
                "insurance carrier core system modernization",
                "insurance company legacy system replacement",
                "P&C insurance digital transformation",
                "life insurance cloud migration",
                "insurance carrier hiring CTO CIO technology",
            ],
        )
    }

    pub fn energy() -> Self {
        Self::new(
            Industry::Energy,
            "energy_agent",
            &[
                "utility company smart grid modernization",
                "electric utility grid management system upgrade",
                "energy company digital transformation technology",
                "utility SCADA system replacement",
            ],
        )
    }

    pub fn government() -> Self {
        Self::new(
            Industry::Government,
            "government_agent",
            &[
                "federal agency IT modernization",
                "state government legacy system replacement",
                "government digital transformation initiative",
                "technology modernization fund RFP",
            ],
        )
    }

    /// The fixed registry of industry variants.
    pub fn all() -> Vec<Self> {
        vec![
            Self::banking(),
            Self::insurance(),
            Self::energy(),
            Self::government(),
        ]
    }

    pub fn for_industry(industry: Industry) -> Option<Self> {
        Self::all().into_iter().find(|p| p.industry == industry)
    }

    /// Expand criteria into this vertical's source queries.
    pub fn queries(&self, criteria: &SearchCriteria, limit: usize) -> Vec<SourceQuery> {
        let refinement = criteria
            .keywords
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        self.query_templates
            .iter()
            .map(|template| {
                let text = if refinement.is_empty() {
                    template.clone()
                } else {
                    format!("{template} {refinement}")
                };
                SourceQuery::new(self.industry, text, limit).with_regions(criteria.regions.clone())
            })
            .collect()
    }
}

/// A search agent for one industry, querying every wrapped source through
/// the shared gateway.
pub struct IndustrySearchAgent {
    profile: IndustryProfile,
    sources: Vec<Arc<dyn SourceAdapter>>,
    gateway: ProviderGateway,
    max_results: usize,
}

impl IndustrySearchAgent {
    pub fn new(profile: IndustryProfile, gateway: ProviderGateway) -> Self {
        Self {
            profile,
            sources: Vec::new(),
            gateway,
            max_results: 50,
        }
    }

    pub fn banking(gateway: ProviderGateway) -> Self {
        Self::new(IndustryProfile::banking(), gateway)
    }

    pub fn insurance(gateway: ProviderGateway) -> Self {
        Self::new(IndustryProfile::insurance(), gateway)
    }

    pub fn energy(gateway: ProviderGateway) -> Self {
        Self::new(IndustryProfile::energy(), gateway)
    }

    pub fn government(gateway: ProviderGateway) -> Self {
        Self::new(IndustryProfile::government(), gateway)
    }

    pub fn with_source(mut self, source: Arc<dyn SourceAdapter>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn with_sources(mut self, sources: impl IntoIterator<Item = Arc<dyn SourceAdapter>>) -> Self {
        self.sources.extend(sources);
        self
    }

    pub fn with_max_results(mut self, max: usize) -> Self {
        self.max_results = max;
        self
    }

    pub fn profile(&self) -> &IndustryProfile {
        &self.profile
    }

    async fn query_source(
        &self,
        source: &Arc<dyn SourceAdapter>,
        query: &SourceQuery,
    ) -> Result<Vec<RawLead>, ProviderError> {
        let key = query.cache_key();
        self.gateway
            .call(source.name(), &key, || source.fetch(query))
            .await
    }

    fn stamp(&self, mut raw: RawLead, source: &str) -> RawLead {
        if raw.industry == Industry::Unknown {
            raw.industry = self.profile.industry;
        }
        if raw.source.as_deref().map_or(true, |s| s.trim().is_empty()) {
            raw.source = Some(format!("{}:{source}", self.profile.agent_name));
        }
        raw
    }
}

#[async_trait]
impl SearchAgent for IndustrySearchAgent {
    fn name(&self) -> &str {
        &self.profile.agent_name
    }

    fn industry(&self) -> Industry {
        self.profile.industry
    }

    async fn search(&self, criteria: &SearchCriteria) -> Result<Vec<RawLead>, SearchError> {
        if self.sources.is_empty() {
            return Err(SearchError::NoSources {
                agent: self.name().to_string(),
            });
        }

        let cap = criteria
            .limit
            .map_or(self.max_results, |limit| limit.min(self.max_results));
        let queries = self.profile.queries(criteria, cap);

        let calls = self.sources.iter().flat_map(|source| {
            queries
                .iter()
                .map(move |query| async move { (source.name(), self.query_source(source, query).await) })
        });
        let outcomes = join_all(calls).await;

        let mut leads = Vec::new();
        let mut errors = Vec::new();
        for (source, outcome) in outcomes {
            match outcome {
                Ok(batch) => {
                    debug!(agent = %self.name(), source, results = batch.len(), "source query returned");
                    leads.extend(batch.into_iter().map(|raw| self.stamp(raw, source)));
                }
                Err(e) => {
                    warn!(agent = %self.name(), source, error = %e, "source query failed");
                    errors.push(e);
                }
            }
        }

        if !errors.is_empty() && errors.len() == self.sources.len() * queries.len() {
            return Err(SearchError::AllSourcesFailed {
                agent: self.name().to_string(),
                errors,
            });
        }

        leads.truncate(cap);
        info!(
            agent = %self.name(),
            results = leads.len(),
            failed_queries = errors.len(),
            "search complete"
        );
        Ok(leads)
    }
}
