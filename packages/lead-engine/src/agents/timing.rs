//! Timing agent: urgency from signal recency.
//!
//! Each signal kind contributes its weight decayed by age with an
//! exponential half-life; only the most recent signal of a kind counts, and
//! nothing older than the expiry horizon contributes at all.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ProviderError;
use crate::gateway::ProviderGateway;
use crate::traits::provider::{CompanyQuery, SignalProvider};
use crate::types::config::TimingConfig;
use crate::types::lead::Lead;
use crate::types::score::round1;
use crate::types::signal::SignalKind;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Outreach urgency bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyLevel {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl UrgencyLevel {
    pub fn from_timing(timing: f64) -> Self {
        if timing >= 70.0 {
            UrgencyLevel::VeryHigh
        } else if timing >= 50.0 {
            UrgencyLevel::High
        } else if timing >= 30.0 {
            UrgencyLevel::Medium
        } else {
            UrgencyLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UrgencyLevel::VeryHigh => "VERY HIGH",
            UrgencyLevel::High => "HIGH",
            UrgencyLevel::Medium => "MEDIUM",
            UrgencyLevel::Low => "LOW",
        }
    }

    pub fn recommended_action(&self) -> &'static str {
        match self {
            UrgencyLevel::VeryHigh => "Immediate outreach recommended",
            UrgencyLevel::High => "Prioritize outreach this week",
            UrgencyLevel::Medium => "Engage within the month",
            UrgencyLevel::Low => "Add to nurture campaign",
        }
    }
}

impl std::fmt::Display for UrgencyLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Timing score in `[0, 100]` for `lead` as of `now`.
pub fn score_timing(lead: &Lead, config: &TimingConfig, now: DateTime<Utc>) -> f64 {
    let mut latest: BTreeMap<SignalKind, DateTime<Utc>> = BTreeMap::new();
    for signal in lead.signals() {
        latest
            .entry(signal.kind)
            .and_modify(|t| *t = (*t).max(signal.observed_at))
            .or_insert(signal.observed_at);
    }

    let mut total = 0.0;
    let mut contributing = 0;
    for (kind, observed_at) in latest {
        // Future timestamps count as fresh.
        let age_days = ((now - observed_at).num_seconds().max(0) as f64) / SECONDS_PER_DAY;
        if age_days > config.expiry_days {
            continue;
        }
        let weight = config
            .kind_weights
            .get(&kind)
            .copied()
            .unwrap_or(config.default_weight);
        total += weight * 0.5f64.powf(age_days / config.half_life_days);
        contributing += 1;
    }

    if contributing > config.boost_after_kinds {
        total *= config.multi_kind_boost;
    }
    round1(total.clamp(0.0, 100.0))
}

/// Timing result for one lead.
#[derive(Debug)]
pub struct TimingOutcome {
    pub timing: f64,
    pub urgency: UrgencyLevel,
    /// Signals added by detection.
    pub detected: usize,
    pub error: Option<ProviderError>,
}

/// Optionally detects fresh signals, then scores timing.
pub struct TimingAgent {
    config: TimingConfig,
    detector: Option<Arc<dyn SignalProvider>>,
    gateway: ProviderGateway,
}

impl TimingAgent {
    pub fn new(config: TimingConfig, gateway: ProviderGateway) -> Self {
        Self {
            config,
            detector: None,
            gateway,
        }
    }

    pub fn with_signal_provider(mut self, provider: Arc<dyn SignalProvider>) -> Self {
        self.detector = Some(provider);
        self
    }

    /// Detect signals (if a provider is configured), then score timing.
    /// A detection failure is returned alongside a score computed from the
    /// signals the lead already had.
    pub async fn analyze(&self, lead: &mut Lead, now: DateTime<Utc>) -> TimingOutcome {
        let mut detected = 0;
        let mut error = None;

        if let (Some(provider), false) = (&self.detector, lead.is_frozen()) {
            let query = CompanyQuery::for_lead(lead);
            let key = query.cache_key();
            match self
                .gateway
                .call(provider.name(), &key, || provider.detect(&query))
                .await
            {
                Ok(signals) => {
                    detected = lead.merge_signals(signals);
                    if detected > 0 {
                        lead.add_source(provider.name());
                    }
                }
                Err(e) => {
                    warn!(lead = %lead.key(), provider = provider.name(), error = %e, "signal detection failed");
                    error = Some(e);
                }
            }
        }

        let timing = score_timing(lead, &self.config, now);
        lead.set_timing(timing);
        let urgency = UrgencyLevel::from_timing(timing);
        debug!(lead = %lead.key(), timing, urgency = %urgency, "timing analyzed");

        TimingOutcome {
            timing,
            urgency,
            detected,
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::RetryPolicy;
    use crate::testing::MockSignalProvider;
    use crate::types::config::LeadConfig;
    use crate::types::lead::Industry;
    use crate::types::raw::RawLead;
    use crate::types::signal::Signal;
    use chrono::Duration;

    fn lead_with(signals: Vec<Signal>) -> Lead {
        let mut raw = RawLead::new("First Bank", Industry::Banking);
        raw.signals = signals;
        Lead::from_raw(raw)
    }

    #[test]
    fn test_fresh_signal_scores_full_weight() {
        let now = Utc::now();
        let lead = lead_with(vec![Signal::new(SignalKind::RfpPublished, now, "rfp-1")]);
        assert_eq!(score_timing(&lead, &TimingConfig::default(), now), 30.0);
    }

    #[test]
    fn test_half_life_decay() {
        let now = Utc::now();
        let lead = lead_with(vec![Signal::new(
            SignalKind::JobPosting,
            now - Duration::days(30),
            "job-1",
        )]);
        assert_eq!(score_timing(&lead, &TimingConfig::default(), now), 10.0);
    }

    #[test]
    fn test_expired_signals_contribute_nothing() {
        let now = Utc::now();
        let lead = lead_with(vec![Signal::new(
            SignalKind::RfpPublished,
            now - Duration::days(181),
            "rfp-old",
        )]);
        assert_eq!(score_timing(&lead, &TimingConfig::default(), now), 0.0);
    }

    #[test]
    fn test_same_kind_counts_once_using_most_recent() {
        let now = Utc::now();
        let lead = lead_with(vec![
            Signal::new(SignalKind::JobPosting, now - Duration::days(60), "job-1"),
            Signal::new(SignalKind::JobPosting, now, "job-2"),
            Signal::new(SignalKind::JobPosting, now - Duration::days(5), "job-3"),
        ]);
        assert_eq!(score_timing(&lead, &TimingConfig::default(), now), 20.0);
    }

    #[test]
    fn test_many_kinds_are_boosted_and_capped() {
        let now = Utc::now();
        let lead = lead_with(
            SignalKind::ALL
                .iter()
                .map(|kind| Signal::new(*kind, now, kind.as_str()))
                .collect(),
        );
        assert_eq!(score_timing(&lead, &TimingConfig::default(), now), 100.0);
    }

    #[test]
    fn test_urgency_levels() {
        assert_eq!(UrgencyLevel::from_timing(70.0), UrgencyLevel::VeryHigh);
        assert_eq!(UrgencyLevel::from_timing(55.0), UrgencyLevel::High);
        assert_eq!(UrgencyLevel::from_timing(30.0), UrgencyLevel::Medium);
        assert_eq!(UrgencyLevel::from_timing(0.0), UrgencyLevel::Low);
        assert!(UrgencyLevel::Low
            .recommended_action()
            .to_lowercase()
            .contains("nurture"));
    }

    #[tokio::test]
    async fn test_detected_signals_union_into_lead() {
        let now = Utc::now();
        let provider = Arc::new(MockSignalProvider::new("signals").with_signals(vec![
            Signal::new(SignalKind::ExecutiveChange, now, "news-1"),
        ]));
        let gateway = ProviderGateway::from_config(&LeadConfig::default())
            .with_retry(RetryPolicy::none());
        let agent = TimingAgent::new(TimingConfig::default(), gateway)
            .with_signal_provider(provider);

        let mut lead = lead_with(vec![Signal::new(SignalKind::JobPosting, now, "job-1")]);
        let outcome = agent.analyze(&mut lead, now).await;

        assert_eq!(outcome.detected, 1);
        assert!(outcome.error.is_none());
        assert_eq!(lead.signals().len(), 2);
        assert_eq!(outcome.timing, 35.0);
        assert_eq!(lead.timing(), Some(35.0));
    }

    #[tokio::test]
    async fn test_detection_failure_still_scores() {
        let now = Utc::now();
        let provider = Arc::new(MockSignalProvider::new("signals").failing_permanently());
        let gateway = ProviderGateway::from_config(&LeadConfig::default())
            .with_retry(RetryPolicy::none());
        let agent = TimingAgent::new(TimingConfig::default(), gateway)
            .with_signal_provider(provider);

        let mut lead = lead_with(vec![Signal::new(SignalKind::RfpPublished, now, "rfp")]);
        let outcome = agent.analyze(&mut lead, now).await;
        assert!(outcome.error.is_some());
        assert_eq!(outcome.timing, 30.0);
    }
}
