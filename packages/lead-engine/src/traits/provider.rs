//! Enrichment and signal-detection provider traits.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderResult;
use crate::types::lead::{CompanyIds, Contact, Industry, Lead};
use crate::types::raw::normalize_query;
use crate::types::signal::Signal;

/// Identifies the company a provider is asked about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyQuery {
    pub company: String,
    pub industry: Industry,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

impl CompanyQuery {
    pub fn for_lead(lead: &Lead) -> Self {
        Self {
            company: lead.company().name.clone(),
            industry: lead.industry(),
            domain: lead.company().domain(),
        }
    }

    /// Normalized form used as the response-cache key.
    pub fn cache_key(&self) -> String {
        format!(
            "{}|{}|{}",
            normalize_query(&self.company),
            self.industry,
            self.domain.as_deref().unwrap_or_default()
        )
    }
}

/// Whatever a provider knows about a company. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentData {
    pub website: Option<String>,
    pub employee_count: Option<u32>,
    pub size: Option<String>,
    pub revenue: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub ids: CompanyIds,
    pub contacts: Vec<Contact>,
    pub tech_stack: Vec<String>,
    pub signals: Vec<Signal>,
}

impl EnrichmentData {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Augments a lead with contacts, firmographics and tech-stack data.
#[async_trait]
pub trait EnrichmentProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn lookup(&self, query: &CompanyQuery) -> ProviderResult<EnrichmentData>;
}

/// Detects buying signals (job postings, executive changes, announcements).
#[async_trait]
pub trait SignalProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn detect(&self, query: &CompanyQuery) -> ProviderResult<Vec<Signal>>;
}
