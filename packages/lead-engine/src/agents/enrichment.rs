//! Enrichment agent.
//!
//! Asks every configured [`EnrichmentProvider`] about a lead (through the
//! cache and rate limiter) and merges what comes back. Merging only fills
//! gaps and unions collections, so enriching twice with the same data is a
//! no-op.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::error::ProviderError;
use crate::gateway::ProviderGateway;
use crate::traits::provider::{CompanyQuery, EnrichmentData, EnrichmentProvider};
use crate::types::lead::{CompanyProfile, Lead, LeadStatus};

/// What one enrichment pass did to a lead.
#[derive(Debug, Default)]
pub struct EnrichmentOutcome {
    /// Providers that answered.
    pub succeeded: usize,
    pub errors: Vec<ProviderError>,
}

fn fill<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
    if slot.is_none() {
        if let Some(v) = value {
            *slot = Some(v.clone());
        }
    }
}

fn fill_text(slot: &mut Option<String>, value: &Option<String>) {
    let empty = slot.as_deref().map_or(true, |s| s.trim().is_empty());
    if empty && value.as_deref().is_some_and(|v| !v.trim().is_empty()) {
        *slot = value.clone();
    }
}

fn fill_profile(profile: &mut CompanyProfile, data: &EnrichmentData) {
    fill_text(&mut profile.website, &data.website);
    fill(&mut profile.employee_count, &data.employee_count);
    fill_text(&mut profile.size, &data.size);
    fill_text(&mut profile.revenue, &data.revenue);
    fill_text(&mut profile.location, &data.location);
    fill_text(&mut profile.description, &data.description);
    fill_text(&mut profile.ids.fdic_cert, &data.ids.fdic_cert);
    fill_text(&mut profile.ids.naic_code, &data.ids.naic_code);
    fill_text(&mut profile.ids.duns, &data.ids.duns);
    fill_text(&mut profile.ids.sam_uei, &data.ids.sam_uei);
}

/// Merge provider data into a lead. Existing scalar values win.
pub fn apply_enrichment(lead: &mut Lead, data: &EnrichmentData) {
    if lead.is_frozen() {
        return;
    }
    lead.update_company(|profile| fill_profile(profile, data));
    lead.merge_contacts(data.contacts.iter().cloned());
    lead.merge_tech_stack(&data.tech_stack);
    lead.merge_signals(data.signals.iter().cloned());
}

/// Augments leads with contacts, firmographics and tech-stack data.
pub struct EnrichmentAgent {
    providers: Vec<Arc<dyn EnrichmentProvider>>,
    gateway: ProviderGateway,
}

impl EnrichmentAgent {
    pub fn new(gateway: ProviderGateway) -> Self {
        Self {
            providers: Vec::new(),
            gateway,
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn EnrichmentProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn with_providers(
        mut self,
        providers: impl IntoIterator<Item = Arc<dyn EnrichmentProvider>>,
    ) -> Self {
        self.providers.extend(providers);
        self
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// Query every provider for `lead` and merge the answers.
    ///
    /// The lead moves to `Enriched` when at least one provider answered.
    /// When all fail, its status is left alone and the errors are returned.
    pub async fn enrich(&self, lead: &mut Lead) -> EnrichmentOutcome {
        if lead.is_frozen() || self.providers.is_empty() {
            return EnrichmentOutcome::default();
        }

        let query = CompanyQuery::for_lead(lead);
        let key = query.cache_key();
        let query = &query;
        let key = key.as_str();

        let calls = self.providers.iter().map(|provider| async move {
            let result = self
                .gateway
                .call(provider.name(), key, || provider.lookup(query))
                .await;
            (provider.name(), result)
        });

        let mut outcome = EnrichmentOutcome::default();
        for (provider, result) in join_all(calls).await {
            match result {
                Ok(data) => {
                    debug!(lead = %lead.key(), provider, "enrichment data received");
                    apply_enrichment(lead, &data);
                    lead.add_source(provider);
                    outcome.succeeded += 1;
                }
                Err(e) => {
                    warn!(lead = %lead.key(), provider, error = %e, "enrichment failed");
                    outcome.errors.push(e);
                }
            }
        }

        if outcome.succeeded > 0 {
            lead.advance(LeadStatus::Enriched);
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::RetryPolicy;
    use crate::testing::MockEnrichmentProvider;
    use crate::types::config::LeadConfig;
    use crate::types::lead::{Contact, Industry};
    use crate::types::raw::RawLead;

    fn gateway() -> ProviderGateway {
        ProviderGateway::from_config(&LeadConfig::default().with_rate_limit("clearbit", 6000))
            .with_retry(RetryPolicy::none())
    }

    fn data() -> EnrichmentData {
        EnrichmentData {
            employee_count: Some(1200),
            location: Some("Columbus, OH".into()),
            contacts: vec![Contact {
                name: Some("Jane Doe".into()),
                title: Some("CIO".into()),
                email: Some("jane@firstbank.com".into()),
                ..Default::default()
            }],
            tech_stack: vec!["COBOL".into(), "AWS".into()],
            ..Default::default()
        }
    }

    fn deduped(name: &str) -> Lead {
        let mut lead = Lead::from_raw(RawLead::new(name, Industry::Banking));
        lead.advance(LeadStatus::Deduped);
        lead
    }

    #[test]
    fn test_apply_is_idempotent_and_keeps_existing_scalars() {
        let mut lead = Lead::from_raw(
            RawLead::new("First Bank", Industry::Banking).with_employees(900),
        );
        apply_enrichment(&mut lead, &data());
        let once = lead.clone();
        apply_enrichment(&mut lead, &data());

        assert_eq!(lead.company(), once.company());
        assert_eq!(lead.contacts(), once.contacts());
        assert_eq!(lead.tech_stack(), once.tech_stack());
        assert_eq!(lead.company().employee_count, Some(900));
        assert_eq!(lead.company().location.as_deref(), Some("Columbus, OH"));
        assert!(lead.tech_stack().contains("cobol"));
    }

    #[tokio::test]
    async fn test_enrich_advances_status_and_uses_cache() {
        let provider = Arc::new(MockEnrichmentProvider::new("clearbit").with_default(data()));
        let agent = EnrichmentAgent::new(gateway()).with_provider(provider.clone());

        let mut lead = deduped("First Bank");
        let outcome = agent.enrich(&mut lead).await;
        assert_eq!(outcome.succeeded, 1);
        assert_eq!(lead.status(), LeadStatus::Enriched);
        assert_eq!(lead.contacts().len(), 1);

        let mut again = deduped("First Bank");
        agent.enrich(&mut again).await;
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_failure_leaves_status_unchanged() {
        let provider = Arc::new(MockEnrichmentProvider::new("clearbit").failing_permanently());
        let agent = EnrichmentAgent::new(gateway()).with_provider(provider);

        let mut lead = deduped("First Bank");
        let outcome = agent.enrich(&mut lead).await;
        assert_eq!(outcome.succeeded, 0);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(lead.status(), LeadStatus::Deduped);
    }
}
