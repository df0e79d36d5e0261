//! Typed errors for the lead engine.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling. Provider errors carry the
//! transient/permanent split that drives retries; coordinator-level failures
//! carry the closed run so callers can still report what happened.

use std::time::Duration;

use thiserror::Error;

use crate::types::run::WorkflowRun;

/// Errors returned by external data providers (search sources, enrichment,
/// signal detection).
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Timeouts, 5xx-equivalents, dropped connections. Retried with backoff.
    #[error("{provider}: transient failure: {message}")]
    Transient { provider: String, message: String },

    /// Malformed input, 4xx-equivalents, undecodable payloads. Never retried.
    #[error("{provider}: permanent failure: {message}")]
    Permanent { provider: String, message: String },

    /// Rate limiter refused admission ("retry later").
    #[error("{provider}: rate limit exhausted")]
    RateLimited { provider: String },

    /// The call did not finish within its time budget.
    #[error("{provider}: timed out after {elapsed:?}")]
    Timeout { provider: String, elapsed: Duration },

    /// Transient failures persisted past the retry budget.
    #[error("{provider}: gave up after {attempts} attempts: {last}")]
    Exhausted {
        provider: String,
        attempts: u32,
        last: Box<ProviderError>,
    },
}

impl ProviderError {
    pub fn transient(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transient {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn permanent(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Permanent {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Whether a retry may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Transient { .. } | Self::RateLimited { .. } | Self::Timeout { .. }
        )
    }

    /// Name of the provider that produced the error.
    pub fn provider(&self) -> &str {
        match self {
            Self::Transient { provider, .. }
            | Self::Permanent { provider, .. }
            | Self::RateLimited { provider }
            | Self::Timeout { provider, .. }
            | Self::Exhausted { provider, .. } => provider,
        }
    }
}

/// Errors raised by a search agent as a whole.
#[derive(Debug, Clone, Error)]
pub enum SearchError {
    /// The agent has no source adapters configured.
    #[error("agent {agent} has no sources configured")]
    NoSources { agent: String },

    /// Every source query failed; carries each source error.
    #[error("agent {agent}: all {} source queries failed (first: {})", .errors.len(), first_message(.errors))]
    AllSourcesFailed {
        agent: String,
        errors: Vec<ProviderError>,
    },

    /// The phase timeout elapsed before the agent returned.
    #[error("agent {agent} timed out after {elapsed:?}")]
    Timeout { agent: String, elapsed: Duration },

    /// The run deadline fired while the agent was in flight.
    #[error("agent {agent} cancelled")]
    Cancelled { agent: String },

    /// Any other agent failure.
    #[error("agent {agent} failed: {message}")]
    Failed { agent: String, message: String },
}

fn first_message(errors: &[ProviderError]) -> String {
    errors
        .first()
        .map(|e| e.to_string())
        .unwrap_or_else(|| "none".to_string())
}

/// Malformed configuration. Fatal at startup.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("score weights must sum to 1.0 (got {sum:.4})")]
    WeightsSum { sum: f64 },

    #[error("{field} must be within [{min}, {max}] (got {value})")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("rate limit for provider {provider} must be greater than zero")]
    ZeroRateLimit { provider: String },

    #[error("size bands must be ordered by descending employee threshold")]
    UnorderedSizeBands,

    #[error("invalid value for {key}: {value}")]
    InvalidEnv { key: String, value: String },

    #[error("environment variable {key} is not set (required by provider {provider})")]
    MissingEnv { key: String, provider: String },

    #[error("failed to read config file {path}: {message}")]
    Io { path: String, message: String },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Persistence gateway errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Storage backend failed.
    #[error("storage error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Record could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Export rendering failed.
    #[error("export error: {0}")]
    Export(String),
}

/// Why a run aborted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FatalReason {
    /// No search agents were configured.
    NoSearchAgents,
    /// Every search agent failed.
    AllSearchAgentsFailed { failed: usize },
    /// Nothing survived deduplication while a non-empty result was required.
    NoLeads,
    /// The run deadline expired before any lead reached `Deduped`.
    DeadlineBeforeDedup,
}

impl std::fmt::Display for FatalReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoSearchAgents => f.write_str("no search agents configured"),
            Self::AllSearchAgentsFailed { failed } => {
                write!(f, "all {failed} search agents failed")
            }
            Self::NoLeads => f.write_str("no leads survived deduplication"),
            Self::DeadlineBeforeDedup => {
                f.write_str("run deadline expired before any lead was deduplicated")
            }
        }
    }
}

/// Phase-wide failure. The closed run (phase `Failed`) travels with it.
#[derive(Debug, Error)]
#[error("run {} failed: {reason}", .run.id())]
pub struct FatalError {
    pub reason: FatalReason,
    pub run: Box<WorkflowRun>,
}

/// Result type alias for provider calls.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ProviderError::transient("fdic", "503").is_transient());
        assert!(ProviderError::RateLimited {
            provider: "fdic".into()
        }
        .is_transient());
        assert!(!ProviderError::permanent("fdic", "400").is_transient());

        let exhausted = ProviderError::Exhausted {
            provider: "fdic".into(),
            attempts: 3,
            last: Box::new(ProviderError::transient("fdic", "503")),
        };
        assert!(!exhausted.is_transient());
        assert_eq!(exhausted.provider(), "fdic");
    }

    #[test]
    fn test_all_sources_failed_message() {
        let err = SearchError::AllSourcesFailed {
            agent: "banking_agent".into(),
            errors: vec![ProviderError::permanent("fdic", "bad request")],
        };
        let msg = err.to_string();
        assert!(msg.contains("banking_agent"));
        assert!(msg.contains("bad request"));
    }
}
