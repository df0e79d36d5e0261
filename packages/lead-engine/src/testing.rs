//! Testing utilities including mock implementations.
//!
//! These are useful for testing applications that use the lead engine
//! without making real network calls. Every mock counts its calls and can
//! be told to fail or to stall.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::agents::search::SearchAgent;
use crate::error::{ProviderError, ProviderResult, SearchError, StoreError, StoreResult};
use crate::traits::provider::{CompanyQuery, EnrichmentData, EnrichmentProvider, SignalProvider};
use crate::traits::source::SourceAdapter;
use crate::traits::store::LeadStore;
use crate::types::lead::{canonical_company_name, Industry, Lead};
use crate::types::raw::{RawLead, SearchCriteria, SourceQuery};
use crate::types::signal::Signal;

/// How a mock should fail.
#[derive(Debug, Default)]
struct FailureMode {
    permanent: bool,
    /// Remaining calls that fail transiently before succeeding.
    transient: AtomicU32,
}

impl FailureMode {
    fn check(&self, provider: &str) -> ProviderResult<()> {
        if self.permanent {
            return Err(ProviderError::permanent(provider, "mock permanent failure"));
        }
        let remaining = self
            .transient
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if remaining.is_ok() {
            return Err(ProviderError::transient(provider, "mock transient failure"));
        }
        Ok(())
    }
}

async fn stall(delay: Option<Duration>) {
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
}

/// A mock source adapter returning a fixed result set.
#[derive(Debug, Default)]
pub struct MockSource {
    name: String,
    results: Vec<RawLead>,
    failure: FailureMode,
    delay: Option<Duration>,
    calls: AtomicU32,
    queries: Mutex<Vec<SourceQuery>>,
}

impl MockSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Results returned for every query (truncated to the query limit).
    pub fn with_results(mut self, results: impl IntoIterator<Item = RawLead>) -> Self {
        self.results = results.into_iter().collect();
        self
    }

    pub fn failing_permanently(mut self) -> Self {
        self.failure.permanent = true;
        self
    }

    /// Fail the next `times` calls with a transient error.
    pub fn failing_transiently(self, times: u32) -> Self {
        self.failure.transient.store(times, Ordering::SeqCst);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> Vec<SourceQuery> {
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl SourceAdapter for MockSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, query: &SourceQuery) -> ProviderResult<Vec<RawLead>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(query.clone());
        stall(self.delay).await;
        self.failure.check(&self.name)?;
        Ok(self.results.iter().take(query.limit).cloned().collect())
    }
}

/// A search agent that returns fixed results without any sources.
#[derive(Debug)]
pub struct StaticSearchAgent {
    name: String,
    industry: Industry,
    results: Vec<RawLead>,
    delay: Option<Duration>,
    calls: AtomicU32,
}

impl StaticSearchAgent {
    pub fn new(name: impl Into<String>, industry: Industry, results: Vec<RawLead>) -> Self {
        Self {
            name: name.into(),
            industry,
            results,
            delay: None,
            calls: AtomicU32::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchAgent for StaticSearchAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn industry(&self) -> Industry {
        self.industry
    }

    async fn search(&self, criteria: &SearchCriteria) -> Result<Vec<RawLead>, SearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        stall(self.delay).await;
        let limit = criteria.limit.unwrap_or(usize::MAX);
        Ok(self.results.iter().take(limit).cloned().collect())
    }
}

/// A search agent that fails every call.
#[derive(Debug)]
pub struct FailingSearchAgent {
    name: String,
    industry: Industry,
    calls: AtomicU32,
}

impl FailingSearchAgent {
    pub fn new(name: impl Into<String>, industry: Industry) -> Self {
        Self {
            name: name.into(),
            industry,
            calls: AtomicU32::new(0),
        }
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchAgent for FailingSearchAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn industry(&self) -> Industry {
        self.industry
    }

    async fn search(&self, _criteria: &SearchCriteria) -> Result<Vec<RawLead>, SearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(SearchError::Failed {
            agent: self.name.clone(),
            message: "mock search failure".to_string(),
        })
    }
}

/// A mock enrichment provider.
///
/// Answers with per-company data when registered (keyed by canonical
/// company name), otherwise with the default data.
#[derive(Debug, Default)]
pub struct MockEnrichmentProvider {
    name: String,
    default: EnrichmentData,
    by_company: HashMap<String, EnrichmentData>,
    failure: FailureMode,
    delay: Option<Duration>,
    calls: AtomicU32,
}

impl MockEnrichmentProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_default(mut self, data: EnrichmentData) -> Self {
        self.default = data;
        self
    }

    pub fn with_data_for(mut self, company: &str, data: EnrichmentData) -> Self {
        self.by_company.insert(canonical_company_name(company), data);
        self
    }

    pub fn failing_permanently(mut self) -> Self {
        self.failure.permanent = true;
        self
    }

    pub fn failing_transiently(self, times: u32) -> Self {
        self.failure.transient.store(times, Ordering::SeqCst);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EnrichmentProvider for MockEnrichmentProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn lookup(&self, query: &CompanyQuery) -> ProviderResult<EnrichmentData> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        stall(self.delay).await;
        self.failure.check(&self.name)?;
        Ok(self
            .by_company
            .get(&canonical_company_name(&query.company))
            .unwrap_or(&self.default)
            .clone())
    }
}

/// A mock signal provider returning the same signals for every company.
#[derive(Debug, Default)]
pub struct MockSignalProvider {
    name: String,
    signals: Vec<Signal>,
    failure: FailureMode,
    delay: Option<Duration>,
    calls: AtomicU32,
}

impl MockSignalProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_signals(mut self, signals: Vec<Signal>) -> Self {
        self.signals = signals;
        self
    }

    pub fn failing_permanently(mut self) -> Self {
        self.failure.permanent = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SignalProvider for MockSignalProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn detect(&self, _query: &CompanyQuery) -> ProviderResult<Vec<Signal>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        stall(self.delay).await;
        self.failure.check(&self.name)?;
        Ok(self.signals.clone())
    }
}

/// A lead store whose writes always fail.
#[derive(Debug, Default)]
pub struct FailingStore {
    puts: AtomicU32,
}

impl FailingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_count(&self) -> u32 {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LeadStore for FailingStore {
    async fn put(&self, _lead: &Lead) -> StoreResult<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Backend("mock store unavailable".into()))
    }

    async fn get(&self, _id: &str) -> StoreResult<Option<Lead>> {
        Ok(None)
    }

    async fn query_top(&self, _limit: usize) -> StoreResult<Vec<Lead>> {
        Ok(Vec::new())
    }

    async fn count(&self) -> StoreResult<usize> {
        Ok(0)
    }
}
