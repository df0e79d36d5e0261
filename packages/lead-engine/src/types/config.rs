//! Configuration for a lead-generation run.
//!
//! A [`LeadConfig`] is built once (defaults, JSON file, `LEADGEN_*`
//! environment overrides), validated, and then passed by reference to every
//! component of the run.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::lead::Industry;
use crate::types::score::ScoreWeights;
use crate::types::signal::SignalKind;

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeadConfig {
    /// Per-agent result cap. Default: 50.
    pub max_results: usize,

    /// Worker pool size for the per-lead phases. Default: 8.
    pub concurrency: usize,

    /// Provider response cache TTL. Default: 3600.
    pub cache_ttl_seconds: u64,

    /// Bound on each agent call and on each per-lead phase. Default: 300.
    pub phase_timeout_seconds: u64,

    /// Requests per minute, per provider name.
    pub rate_limit_per_provider: BTreeMap<String, u32>,

    /// Requests per minute for providers not listed above. Default: 60.
    pub default_rate_limit: u32,

    /// Token-bucket burst. Default: 5.
    pub rate_limit_burst: u32,

    /// How long a caller may wait for a rate-limit permit before getting
    /// "retry later". Default: 30s.
    pub admission_wait_ms: u64,

    pub retry: RetryConfig,

    /// Fail the run when nothing survives deduplication. Default: true.
    pub require_results: bool,

    pub icp_thresholds: IcpThresholds,

    pub score_weights: ScoreWeights,

    pub scoring: ScoringConfig,

    pub timing: TimingConfig,

    pub providers: ProvidersConfig,
}

impl Default for LeadConfig {
    fn default() -> Self {
        Self {
            max_results: 50,
            concurrency: 8,
            cache_ttl_seconds: 3600,
            phase_timeout_seconds: 300,
            rate_limit_per_provider: BTreeMap::new(),
            default_rate_limit: 60,
            rate_limit_burst: 5,
            admission_wait_ms: 30_000,
            retry: RetryConfig::default(),
            require_results: true,
            icp_thresholds: IcpThresholds::default(),
            score_weights: ScoreWeights::default(),
            scoring: ScoringConfig::default(),
            timing: TimingConfig::default(),
            providers: ProvidersConfig::default(),
        }
    }
}

/// Transient-failure retry policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
            max_delay_ms: 5_000,
        }
    }
}

/// Ideal-customer-profile rules applied by validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IcpThresholds {
    /// Leads with a known employee count below this are disqualified.
    pub min_employees: u32,

    /// Industries that pass the industry rule. `Unknown` always passes.
    pub target_industries: Vec<Industry>,

    /// Require at least one buying signal.
    pub require_signal: bool,
}

impl Default for IcpThresholds {
    fn default() -> Self {
        Self {
            min_employees: 100,
            target_industries: Industry::TARGETS.to_vec(),
            require_signal: false,
        }
    }
}

/// One employee-count band of the size-fit table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizeBand {
    pub min_employees: u32,
    pub score: f64,
}

/// Fit and intent tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Ordered by descending `min_employees`; first match wins.
    pub size_bands: Vec<SizeBand>,

    /// Size fit below the smallest band.
    pub below_bands_score: f64,

    /// Size fit by size label (lower-case) when no count is known.
    pub size_labels: BTreeMap<String, f64>,

    /// Size fit for an unrecognized label.
    pub unknown_label_score: f64,

    /// Size fit with no size data at all.
    pub no_size_score: f64,

    /// Timing used when the timing phase produced nothing for a lead.
    pub neutral_timing: f64,

    /// Intent when a lead has no signals.
    pub no_signal_intent: f64,

    /// Intent strength per signal kind.
    pub intent_weights: BTreeMap<SignalKind, f64>,

    /// Strength for kinds missing from `intent_weights`.
    pub default_intent_weight: f64,

    /// Tech tags containing one of these mark a legacy estate.
    pub legacy_markers: Vec<String>,

    /// Tech tags containing one of these mark a cloud migration.
    pub cloud_markers: Vec<String>,
}

fn default_signal_weights() -> BTreeMap<SignalKind, f64> {
    BTreeMap::from([
        (SignalKind::RfpPublished, 30.0),
        (SignalKind::RegulatoryDeadline, 25.0),
        (SignalKind::JobPosting, 20.0),
        (SignalKind::ExecutiveChange, 15.0),
        (SignalKind::RecentFunding, 15.0),
        (SignalKind::TechnologyInitiative, 10.0),
        (SignalKind::PartnershipAnnouncement, 10.0),
        (SignalKind::Announcement, 5.0),
    ])
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            size_bands: vec![
                SizeBand { min_employees: 5000, score: 100.0 },
                SizeBand { min_employees: 1000, score: 80.0 },
                SizeBand { min_employees: 500, score: 60.0 },
                SizeBand { min_employees: 100, score: 40.0 },
            ],
            below_bands_score: 20.0,
            size_labels: BTreeMap::from([
                ("enterprise".to_string(), 100.0),
                ("large".to_string(), 80.0),
                ("medium".to_string(), 60.0),
                ("small".to_string(), 30.0),
            ]),
            unknown_label_score: 50.0,
            no_size_score: 50.0,
            neutral_timing: 50.0,
            no_signal_intent: 30.0,
            intent_weights: default_signal_weights(),
            default_intent_weight: 5.0,
            legacy_markers: ["legacy", "mainframe", "cobol", "as/400", "as400", "on-prem"]
                .into_iter()
                .map(String::from)
                .collect(),
            cloud_markers: ["cloud", "aws", "azure", "gcp", "saas"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// Signal-recency decay for the timing score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// A signal's contribution halves every `half_life_days`.
    pub half_life_days: f64,

    /// Signals older than this contribute nothing.
    pub expiry_days: f64,

    pub kind_weights: BTreeMap<SignalKind, f64>,

    /// Weight for kinds missing from `kind_weights`.
    pub default_weight: f64,

    /// Multiplier once more than `boost_after_kinds` kinds contribute.
    pub multi_kind_boost: f64,

    pub boost_after_kinds: usize,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            half_life_days: 30.0,
            expiry_days: 180.0,
            kind_weights: default_signal_weights(),
            default_weight: 5.0,
            multi_kind_boost: 1.2,
            boost_after_kinds: 3,
        }
    }
}

/// Where a search source reads its candidates from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceTarget {
    /// JSON-over-HTTP search endpoint.
    Http {
        url: String,
        /// Name of the environment variable holding the API key.
        #[serde(default)]
        api_key_env: Option<String>,
    },
    /// JSON array of raw leads on disk.
    File { path: PathBuf },
}

/// A search source adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceEndpoint {
    pub name: String,
    /// Industries this source serves. Empty means all.
    #[serde(default)]
    pub industries: Vec<Industry>,
    #[serde(flatten)]
    pub target: SourceTarget,
}

impl SourceEndpoint {
    pub fn serves(&self, industry: Industry) -> bool {
        self.industries.is_empty() || self.industries.contains(&industry)
    }
}

/// An HTTP enrichment or signal provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpEndpoint {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub api_key_env: Option<String>,
}

/// Provider wiring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub sources: Vec<SourceEndpoint>,
    pub enrichment: Vec<HttpEndpoint>,
    pub signals: Option<HttpEndpoint>,
    /// Per-request HTTP timeout. Default: 30.
    pub request_timeout_seconds: u64,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            enrichment: Vec::new(),
            signals: None,
            request_timeout_seconds: 30,
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnv {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Parse `"fdic=30,web_search=100"`.
fn parse_rate_limits(key: &str, value: &str) -> Result<BTreeMap<String, u32>, ConfigError> {
    let mut limits = BTreeMap::new();
    for pair in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (provider, rate) = pair.split_once('=').ok_or_else(|| ConfigError::InvalidEnv {
            key: key.to_string(),
            value: pair.to_string(),
        })?;
        limits.insert(provider.trim().to_string(), parse_env(key, rate)?);
    }
    Ok(limits)
}

impl LeadConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Defaults (or `LEADGEN_CONFIG` file) with `LEADGEN_*` overrides.
    /// Loads `.env` if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let base = match std::env::var("LEADGEN_CONFIG") {
            Ok(path) if !path.trim().is_empty() => Self::from_json_file(path)?,
            _ => Self::default(),
        };
        base.with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `LEADGEN_*` overrides read through `lookup`.
    pub fn with_env_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        const MAX_RESULTS: &str = "LEADGEN_MAX_RESULTS";
        const CONCURRENCY: &str = "LEADGEN_CONCURRENCY";
        const CACHE_TTL: &str = "LEADGEN_CACHE_TTL_SECONDS";
        const PHASE_TIMEOUT: &str = "LEADGEN_PHASE_TIMEOUT_SECONDS";
        const DEFAULT_RATE: &str = "LEADGEN_DEFAULT_RATE_LIMIT";
        const BURST: &str = "LEADGEN_RATE_LIMIT_BURST";
        const RATE_LIMITS: &str = "LEADGEN_RATE_LIMITS";
        const ADMISSION_WAIT: &str = "LEADGEN_ADMISSION_WAIT_MS";
        const RETRY_ATTEMPTS: &str = "LEADGEN_RETRY_ATTEMPTS";
        const MIN_EMPLOYEES: &str = "LEADGEN_MIN_EMPLOYEES";
        const REQUIRE_RESULTS: &str = "LEADGEN_REQUIRE_RESULTS";
        const WEIGHTS: &str = "LEADGEN_SCORE_WEIGHTS";

        if let Some(v) = lookup(MAX_RESULTS) {
            self.max_results = parse_env(MAX_RESULTS, &v)?;
        }
        if let Some(v) = lookup(CONCURRENCY) {
            self.concurrency = parse_env(CONCURRENCY, &v)?;
        }
        if let Some(v) = lookup(CACHE_TTL) {
            self.cache_ttl_seconds = parse_env(CACHE_TTL, &v)?;
        }
        if let Some(v) = lookup(PHASE_TIMEOUT) {
            self.phase_timeout_seconds = parse_env(PHASE_TIMEOUT, &v)?;
        }
        if let Some(v) = lookup(DEFAULT_RATE) {
            self.default_rate_limit = parse_env(DEFAULT_RATE, &v)?;
        }
        if let Some(v) = lookup(BURST) {
            self.rate_limit_burst = parse_env(BURST, &v)?;
        }
        if let Some(v) = lookup(RATE_LIMITS) {
            self.rate_limit_per_provider.extend(parse_rate_limits(RATE_LIMITS, &v)?);
        }
        if let Some(v) = lookup(ADMISSION_WAIT) {
            self.admission_wait_ms = parse_env(ADMISSION_WAIT, &v)?;
        }
        if let Some(v) = lookup(RETRY_ATTEMPTS) {
            self.retry.max_attempts = parse_env(RETRY_ATTEMPTS, &v)?;
        }
        if let Some(v) = lookup(MIN_EMPLOYEES) {
            self.icp_thresholds.min_employees = parse_env(MIN_EMPLOYEES, &v)?;
        }
        if let Some(v) = lookup(REQUIRE_RESULTS) {
            self.require_results = parse_bool(REQUIRE_RESULTS, &v)?;
        }
        if let Some(v) = lookup(WEIGHTS) {
            let parts = v
                .split(',')
                .map(|p| parse_env::<f64>(WEIGHTS, p))
                .collect::<Result<Vec<_>, _>>()?;
            let [fit, intent, timing] = parts[..] else {
                return Err(ConfigError::InvalidEnv {
                    key: WEIGHTS.to_string(),
                    value: v,
                });
            };
            self.score_weights = ScoreWeights {
                fit,
                intent,
                timing,
            };
        }
        Ok(self)
    }

    /// Check every rule. Invalid configuration is fatal at startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let nonzero = [
            ("max_results", self.max_results as u64),
            ("concurrency", self.concurrency as u64),
            ("cache_ttl_seconds", self.cache_ttl_seconds),
            ("phase_timeout_seconds", self.phase_timeout_seconds),
            ("default_rate_limit", u64::from(self.default_rate_limit)),
            ("rate_limit_burst", u64::from(self.rate_limit_burst)),
            ("retry.max_attempts", u64::from(self.retry.max_attempts)),
            (
                "providers.request_timeout_seconds",
                self.providers.request_timeout_seconds,
            ),
        ];
        for (field, value) in nonzero {
            if value == 0 {
                return Err(ConfigError::Zero { field });
            }
        }

        if let Some((provider, _)) = self.rate_limit_per_provider.iter().find(|(_, r)| **r == 0) {
            return Err(ConfigError::ZeroRateLimit {
                provider: provider.clone(),
            });
        }

        self.score_weights.validate()?;

        if !(self.timing.half_life_days > 0.0) {
            return Err(ConfigError::OutOfRange {
                field: "timing.half_life_days",
                value: self.timing.half_life_days,
                min: f64::MIN_POSITIVE,
                max: f64::MAX,
            });
        }
        if !(self.timing.expiry_days >= 0.0) {
            return Err(ConfigError::OutOfRange {
                field: "timing.expiry_days",
                value: self.timing.expiry_days,
                min: 0.0,
                max: f64::MAX,
            });
        }

        let bands = &self.scoring.size_bands;
        if bands
            .windows(2)
            .any(|w| w[0].min_employees <= w[1].min_employees)
        {
            return Err(ConfigError::UnorderedSizeBands);
        }

        for (field, value) in [
            ("scoring.neutral_timing", self.scoring.neutral_timing),
            ("scoring.no_signal_intent", self.scoring.no_signal_intent),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(ConfigError::OutOfRange {
                    field,
                    value,
                    min: 0.0,
                    max: 100.0,
                });
            }
        }

        Ok(())
    }

    /// Rate for `provider`, falling back to the default.
    pub fn rate_limit_for(&self, provider: &str) -> u32 {
        self.rate_limit_per_provider
            .get(provider)
            .copied()
            .unwrap_or(self.default_rate_limit)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }

    pub fn phase_timeout(&self) -> Duration {
        Duration::from_secs(self.phase_timeout_seconds)
    }

    pub fn admission_wait(&self) -> Duration {
        Duration::from_millis(self.admission_wait_ms)
    }

    /// Set the per-agent result cap.
    pub fn with_max_results(mut self, max: usize) -> Self {
        self.max_results = max;
        self
    }

    /// Set lead-phase concurrency.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_cache_ttl_seconds(mut self, seconds: u64) -> Self {
        self.cache_ttl_seconds = seconds;
        self
    }

    pub fn with_phase_timeout_seconds(mut self, seconds: u64) -> Self {
        self.phase_timeout_seconds = seconds;
        self
    }

    /// Set the rate for one provider.
    pub fn with_rate_limit(mut self, provider: impl Into<String>, per_minute: u32) -> Self {
        self.rate_limit_per_provider.insert(provider.into(), per_minute);
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_require_results(mut self, require: bool) -> Self {
        self.require_results = require;
        self
    }

    pub fn with_min_employees(mut self, min: u32) -> Self {
        self.icp_thresholds.min_employees = min;
        self
    }

    pub fn with_score_weights(mut self, weights: ScoreWeights) -> Self {
        self.score_weights = weights;
        self
    }

    pub fn with_providers(mut self, providers: ProvidersConfig) -> Self {
        self.providers = providers;
        self
    }
}
