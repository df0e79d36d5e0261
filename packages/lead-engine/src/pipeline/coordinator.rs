//! Run coordinator.
//!
//! Drives the fixed phase sequence
//!
//! ```text
//! Searching → Deduping → Enriching → Validating → TimingAnalysis → Scoring → Completed
//! ```
//!
//! Each phase is a barrier over the whole lead collection. Search agents run
//! concurrently, one task per agent; the per-lead phases run on a bounded
//! worker pool. Agent and per-lead failures are recorded on the run and
//! absorbed; only phase-wide failures abort it.
//!
//! A run-level deadline cancels in-flight calls, launches nothing new, and
//! finalizes whatever reached `Deduped` as a partial run.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::agents::enrichment::EnrichmentAgent;
use crate::agents::search::SearchAgent;
use crate::agents::timing::TimingAgent;
use crate::agents::validation::ValidationAgent;
use crate::error::{ConfigError, FatalError, FatalReason, SearchError};
use crate::gateway::ProviderGateway;
use crate::pipeline::dedup::deduplicate;
use crate::pipeline::scorer::{rank, Scorer};
use crate::traits::provider::{EnrichmentProvider, SignalProvider};
use crate::traits::store::LeadStore;
use crate::types::config::LeadConfig;
use crate::types::lead::{Lead, LeadStatus};
use crate::types::raw::{RawLead, SearchCriteria};
use crate::types::run::{ErrorKind, Phase, RunRecorder, WorkflowRun};

const ENRICHMENT_AGENT: &str = "enrichment_agent";
const TIMING_AGENT: &str = "timing_agent";
const PERSISTENCE: &str = "persistence";

/// Per-run options.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Wall-clock budget for the whole run.
    pub deadline: Option<Duration>,
    /// Overrides `require_results`: allow a run with zero deduplicated leads
    /// to complete.
    pub allow_empty: Option<bool>,
    /// Skip the persistence gateway.
    pub skip_persist: bool,
    /// External cancellation (treated like the deadline firing).
    pub cancel: Option<CancellationToken>,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn allow_empty(mut self, allow: bool) -> Self {
        self.allow_empty = Some(allow);
        self
    }

    pub fn without_persistence(mut self) -> Self {
        self.skip_persist = true;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// Outcome of one guarded call.
enum Guarded<T> {
    Done(T),
    TimedOut,
    Cancelled,
}

/// Await `fut` bounded by `limit`, giving up as soon as `cancel` fires.
async fn guarded<F: Future>(fut: F, limit: Duration, cancel: &CancellationToken) -> Guarded<F::Output> {
    if cancel.is_cancelled() {
        return Guarded::Cancelled;
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Guarded::Cancelled,
        out = tokio::time::timeout(limit, fut) => match out {
            Ok(value) => Guarded::Done(value),
            Err(_) => Guarded::TimedOut,
        },
    }
}

/// Aborts the deadline timer however the run ends.
struct DeadlineTimer(Option<JoinHandle<()>>);

impl DeadlineTimer {
    fn start(deadline: Option<Duration>, cancel: &CancellationToken) -> Self {
        Self(deadline.map(|limit| {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(limit).await;
                cancel.cancel();
            })
        }))
    }
}

impl Drop for DeadlineTimer {
    fn drop(&mut self) {
        if let Some(handle) = self.0.take() {
            handle.abort();
        }
    }
}

/// A failure absorbed while processing one lead.
struct LeadError {
    kind: ErrorKind,
    message: String,
}

/// Orchestrates search agents and the per-lead pipeline for a run.
pub struct Coordinator {
    config: LeadConfig,
    gateway: ProviderGateway,
    agents: Vec<Arc<dyn SearchAgent>>,
    enrichment: EnrichmentAgent,
    validation: ValidationAgent,
    timing: TimingAgent,
    scorer: Scorer,
    store: Option<Arc<dyn LeadStore>>,
}

impl Coordinator {
    /// Validate `config` and build a coordinator with no agents or store.
    pub fn new(config: LeadConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let gateway = ProviderGateway::from_config(&config);
        Ok(Self::with_gateway(config, gateway))
    }

    /// Build around an existing gateway (shared cache and limiters).
    pub fn with_gateway(config: LeadConfig, gateway: ProviderGateway) -> Self {
        Self {
            enrichment: EnrichmentAgent::new(gateway.clone()),
            validation: ValidationAgent::new(config.icp_thresholds.clone()),
            timing: TimingAgent::new(config.timing.clone(), gateway.clone()),
            scorer: Scorer::from_config(&config),
            agents: Vec::new(),
            store: None,
            gateway,
            config,
        }
    }

    pub fn config(&self) -> &LeadConfig {
        &self.config
    }

    /// Gateway to hand to search agents so they share cache and limiters.
    pub fn gateway(&self) -> &ProviderGateway {
        &self.gateway
    }

    pub fn with_search_agent(mut self, agent: Arc<dyn SearchAgent>) -> Self {
        self.agents.push(agent);
        self
    }

    pub fn with_search_agents(mut self, agents: impl IntoIterator<Item = Arc<dyn SearchAgent>>) -> Self {
        self.agents.extend(agents);
        self
    }

    pub fn with_enrichment_provider(mut self, provider: Arc<dyn EnrichmentProvider>) -> Self {
        self.enrichment = self.enrichment.with_provider(provider);
        self
    }

    pub fn with_signal_provider(mut self, provider: Arc<dyn SignalProvider>) -> Self {
        self.timing = self.timing.with_signal_provider(provider);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn LeadStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    /// Execute one run.
    ///
    /// Returns the closed run on `Completed` (including partial runs with
    /// surviving leads). Phase-wide failures return a [`FatalError`] that
    /// carries the closed `Failed` run.
    pub async fn run(
        &self,
        criteria: &SearchCriteria,
        options: RunOptions,
    ) -> Result<WorkflowRun, FatalError> {
        let recorder = RunRecorder::new();
        let span = info_span!("lead_run", run_id = %recorder.id());
        self.execute(criteria, options, recorder).instrument(span).await
    }

    async fn execute(
        &self,
        criteria: &SearchCriteria,
        options: RunOptions,
        recorder: RunRecorder,
    ) -> Result<WorkflowRun, FatalError> {
        let cancel = options
            .cancel
            .as_ref()
            .map(CancellationToken::child_token)
            .unwrap_or_default();
        let _timer = DeadlineTimer::start(options.deadline, &cancel);
        let allow_empty = options.allow_empty.unwrap_or(!self.config.require_results);

        let swept = self.gateway.cache().sweep();
        info!(agents = self.agents.len(), swept, "run started");

        // Searching
        recorder.enter(Phase::Searching);
        if self.agents.is_empty() {
            return Err(self.abort(recorder, FatalReason::NoSearchAgents));
        }
        let (raws, failed) = self.search_phase(criteria, &cancel, &recorder).await;
        recorder.update_stats(|s| s.found = raws.len());

        if raws.is_empty() && cancel.is_cancelled() {
            return Err(self.abort(recorder, FatalReason::DeadlineBeforeDedup));
        }
        if failed == self.agents.len() {
            return Err(self.abort(recorder, FatalReason::AllSearchAgentsFailed { failed }));
        }

        // Deduping
        recorder.enter(Phase::Deduping);
        let mut leads = deduplicate(raws);
        recorder.update_stats(|s| s.deduped = leads.len());
        recorder.note(format!("{} unique leads", leads.len()));
        info!(leads = leads.len(), "deduplicated");

        if leads.is_empty() && !allow_empty {
            return Err(self.abort(recorder, FatalReason::NoLeads));
        }

        // Enriching
        if self.proceed(Phase::Enriching, &cancel, &recorder) {
            leads = self
                .lead_phase(ENRICHMENT_AGENT, leads, &cancel, &recorder, move |mut lead| async move {
                    let outcome = self.enrichment.enrich(&mut lead).await;
                    let errors = outcome
                        .errors
                        .iter()
                        .map(|e| LeadError {
                            kind: ErrorKind::from(e),
                            message: e.to_string(),
                        })
                        .collect();
                    (lead, errors)
                })
                .await;
            let enriched = count_status(&leads, LeadStatus::Enriched);
            recorder.update_stats(|s| s.enriched = enriched);
            info!(enriched, "enrichment finished");
        }

        // Validating
        if self.proceed(Phase::Validating, &cancel, &recorder) {
            let mut icp = self.validation.icp().clone();
            if let Some(min) = criteria.min_employees {
                icp.min_employees = min;
            }
            let validator = ValidationAgent::new(icp);
            for lead in &mut leads {
                validator.apply(lead);
            }
            let validated = count_status(&leads, LeadStatus::Validated);
            let disqualified = count_status(&leads, LeadStatus::Disqualified);
            recorder.update_stats(|s| {
                s.validated = validated;
                s.disqualified = disqualified;
            });
            info!(validated, disqualified, "validation finished");
        }

        // TimingAnalysis
        if self.proceed(Phase::TimingAnalysis, &cancel, &recorder) {
            let now = Utc::now();
            let (excluded, active): (Vec<Lead>, Vec<Lead>) = leads
                .into_iter()
                .partition(|lead| lead.status() == LeadStatus::Disqualified);
            leads = self
                .lead_phase(TIMING_AGENT, active, &cancel, &recorder, move |mut lead| async move {
                    let outcome = self.timing.analyze(&mut lead, now).await;
                    let errors = outcome
                        .error
                        .iter()
                        .map(|e| LeadError {
                            kind: ErrorKind::from(e),
                            message: e.to_string(),
                        })
                        .collect();
                    (lead, errors)
                })
                .await;
            leads.extend(excluded);
            info!("timing analysis finished");
        }

        // Scoring: pure, so it runs even on a partial run.
        recorder.enter(Phase::Scoring);
        let mut ranked: Vec<Lead> = leads
            .into_iter()
            .filter(|lead| lead.status() != LeadStatus::Disqualified)
            .collect();
        for lead in &mut ranked {
            let score = self.scorer.score(lead);
            lead.set_score(score);
        }
        rank(&mut ranked);
        let scored = ranked.len();
        recorder.update_stats(|s| s.scored = scored);

        if recorder.is_partial() && ranked.is_empty() {
            return Err(self.abort(recorder, FatalReason::DeadlineBeforeDedup));
        }

        if !options.skip_persist {
            self.persist(&ranked, &recorder).await;
        }

        let run = recorder.complete(ranked);
        info!(
            scored = run.stats().scored,
            errors = run.error_count(),
            partial = run.is_partial(),
            "run completed"
        );
        Ok(run)
    }

    /// Enter `phase` unless the run was cancelled, in which case mark it
    /// partial and skip.
    fn proceed(&self, phase: Phase, cancel: &CancellationToken, recorder: &RunRecorder) -> bool {
        if cancel.is_cancelled() {
            if !recorder.is_partial() {
                warn!(phase = %phase, "deadline reached, finalizing partial run");
                recorder.mark_partial();
                recorder.note(format!("deadline reached before {phase}"));
            }
            return false;
        }
        recorder.enter(phase);
        true
    }

    async fn search_phase(
        &self,
        criteria: &SearchCriteria,
        cancel: &CancellationToken,
        recorder: &RunRecorder,
    ) -> (Vec<RawLead>, usize) {
        let limit = self.config.phase_timeout();
        let searches = self.agents.iter().map(|agent| async move {
            let outcome = guarded(agent.search(criteria), limit, cancel).await;
            (agent, outcome)
        });

        let mut raws = Vec::new();
        let mut failed = 0;
        for (agent, outcome) in join_all(searches).await {
            let error = match outcome {
                Guarded::Done(Ok(batch)) => {
                    info!(agent = %agent.name(), results = batch.len(), "agent finished");
                    recorder.note(format!("{} returned {} leads", agent.name(), batch.len()));
                    raws.extend(batch);
                    continue;
                }
                Guarded::Done(Err(e)) => e,
                Guarded::TimedOut => SearchError::Timeout {
                    agent: agent.name().to_string(),
                    elapsed: limit,
                },
                Guarded::Cancelled => SearchError::Cancelled {
                    agent: agent.name().to_string(),
                },
            };
            warn!(agent = %agent.name(), error = %error, "search agent failed");
            recorder.record_error(agent.name(), None, ErrorKind::from(&error), error.to_string());
            if !matches!(error, SearchError::Cancelled { .. }) {
                failed += 1;
            }
        }
        if cancel.is_cancelled() {
            recorder.mark_partial();
        }
        (raws, failed)
    }

    /// Run `op` over every lead on the bounded worker pool, preserving
    /// input order. A lead whose call times out or is cancelled keeps the
    /// state it entered the phase with.
    async fn lead_phase<'a, F, Fut>(
        &'a self,
        agent: &'a str,
        leads: Vec<Lead>,
        cancel: &'a CancellationToken,
        recorder: &'a RunRecorder,
        op: F,
    ) -> Vec<Lead>
    where
        F: Fn(Lead) -> Fut + 'a,
        Fut: Future<Output = (Lead, Vec<LeadError>)> + 'a,
    {
        let limit = self.config.phase_timeout();
        let op = &op;

        let mut results: Vec<(usize, Lead)> = stream::iter(leads.into_iter().enumerate())
            .map(|(index, lead)| async move {
                let fallback = lead.clone();
                match guarded(op(lead), limit, cancel).await {
                    Guarded::Done((lead, errors)) => {
                        for error in errors {
                            recorder.record_error(agent, Some(lead.key()), error.kind, error.message);
                        }
                        (index, lead)
                    }
                    Guarded::TimedOut => {
                        warn!(agent, lead = %fallback.key(), "lead call timed out");
                        recorder.record_error(
                            agent,
                            Some(fallback.key()),
                            ErrorKind::Timeout,
                            format!("timed out after {limit:?}"),
                        );
                        (index, fallback)
                    }
                    Guarded::Cancelled => {
                        debug!(agent, lead = %fallback.key(), "lead call cancelled");
                        recorder.record_error(
                            agent,
                            Some(fallback.key()),
                            ErrorKind::Cancelled,
                            "run deadline reached",
                        );
                        (index, fallback)
                    }
                }
            })
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;

        if cancel.is_cancelled() && !recorder.is_partial() {
            recorder.mark_partial();
            recorder.note(format!("deadline reached during {agent}"));
        }

        results.sort_by_key(|(index, _)| *index);
        results.into_iter().map(|(_, lead)| lead).collect()
    }

    async fn persist(&self, ranked: &[Lead], recorder: &RunRecorder) {
        let Some(store) = &self.store else {
            return;
        };
        let mut persisted = 0;
        for lead in ranked {
            match store.put(lead).await {
                Ok(()) => persisted += 1,
                Err(e) => {
                    warn!(lead = %lead.key(), error = %e, "failed to persist lead");
                    recorder.record_error(PERSISTENCE, Some(lead.key()), ErrorKind::Storage, e.to_string());
                }
            }
        }
        recorder.update_stats(|s| s.persisted = persisted);
    }

    fn abort(&self, recorder: RunRecorder, reason: FatalReason) -> FatalError {
        warn!(reason = %reason, "run failed");
        FatalError {
            run: Box::new(recorder.fail(&reason)),
            reason,
        }
    }
}

fn count_status(leads: &[Lead], status: LeadStatus) -> usize {
    leads.iter().filter(|lead| lead.status() == status).count()
}
