//! Workflow run record.
//!
//! The coordinator appends to a [`RunRecorder`] while a run is in flight and
//! closes it into an immutable [`WorkflowRun`] exactly once.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{FatalReason, ProviderError, SearchError};
use crate::types::lead::{Lead, LeadKey};

/// Coordinator phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Searching,
    Deduping,
    Enriching,
    Validating,
    TimingAnalysis,
    Scoring,
    Completed,
    Failed,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Searching => "searching",
            Phase::Deduping => "deduping",
            Phase::Enriching => "enriching",
            Phase::Validating => "validating",
            Phase::TimingAnalysis => "timing_analysis",
            Phase::Scoring => "scoring",
            Phase::Completed => "completed",
            Phase::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Completed | Phase::Failed)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse classification of a recorded error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Transient,
    Permanent,
    Timeout,
    Cancelled,
    Storage,
}

impl From<&ProviderError> for ErrorKind {
    fn from(err: &ProviderError) -> Self {
        match err {
            ProviderError::Timeout { .. } => ErrorKind::Timeout,
            e if e.is_transient() => ErrorKind::Transient,
            _ => ErrorKind::Permanent,
        }
    }
}

impl From<&SearchError> for ErrorKind {
    fn from(err: &SearchError) -> Self {
        match err {
            SearchError::Timeout { .. } => ErrorKind::Timeout,
            SearchError::Cancelled { .. } => ErrorKind::Cancelled,
            SearchError::AllSourcesFailed { errors, .. }
                if errors.iter().all(ProviderError::is_transient) =>
            {
                ErrorKind::Transient
            }
            _ => ErrorKind::Permanent,
        }
    }
}

/// One absorbed failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub at: DateTime<Utc>,
    pub phase: Phase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lead_key: Option<LeadKey>,
    pub kind: ErrorKind,
    pub message: String,
}

/// One activity-log line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub at: DateTime<Utc>,
    pub phase: Phase,
    pub message: String,
}

/// Per-phase counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub found: usize,
    pub deduped: usize,
    pub enriched: usize,
    pub validated: usize,
    pub disqualified: usize,
    pub scored: usize,
    pub persisted: usize,
}

/// A closed pipeline execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRun {
    id: Uuid,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    phase: Phase,
    partial: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    failure: Option<String>,
    errors: IndexMap<String, Vec<ErrorRecord>>,
    activity: Vec<ActivityEntry>,
    stats: RunStats,
    ranked: Vec<Lead>,
}

impl WorkflowRun {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }

    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    /// `Completed` or `Failed`.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The deadline cut the run short.
    pub fn is_partial(&self) -> bool {
        self.partial
    }

    pub fn is_completed(&self) -> bool {
        self.phase == Phase::Completed
    }

    /// Reason for a `Failed` run.
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Agent name → errors recorded against it, in first-seen order.
    pub fn errors(&self) -> &IndexMap<String, Vec<ErrorRecord>> {
        &self.errors
    }

    pub fn errors_for(&self, agent: &str) -> &[ErrorRecord] {
        self.errors.get(agent).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn error_count(&self) -> usize {
        self.errors.values().map(Vec::len).sum()
    }

    pub fn activity(&self) -> &[ActivityEntry] {
        &self.activity
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Final ranking, best first. Empty for failed runs.
    pub fn ranked(&self) -> &[Lead] {
        &self.ranked
    }

    pub fn into_ranked(self) -> Vec<Lead> {
        self.ranked
    }
}

struct RunState {
    phase: Phase,
    partial: bool,
    errors: IndexMap<String, Vec<ErrorRecord>>,
    activity: Vec<ActivityEntry>,
    stats: RunStats,
}

/// Mutable side of a run. Shared by reference across concurrent workers;
/// every append takes a short, non-async lock.
pub struct RunRecorder {
    id: Uuid,
    started_at: DateTime<Utc>,
    state: Mutex<RunState>,
}

impl Default for RunRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl RunRecorder {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            state: Mutex::new(RunState {
                phase: Phase::Searching,
                partial: false,
                errors: IndexMap::new(),
                activity: Vec::new(),
                stats: RunStats::default(),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut RunState) -> T) -> T {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    pub fn phase(&self) -> Phase {
        self.with_state(|s| s.phase)
    }

    /// Enter `phase` and log the transition.
    pub fn enter(&self, phase: Phase) {
        self.with_state(|s| {
            s.phase = phase;
            s.activity.push(ActivityEntry {
                at: Utc::now(),
                phase,
                message: format!("entered {phase}"),
            });
        });
    }

    pub fn note(&self, message: impl Into<String>) {
        let message = message.into();
        self.with_state(|s| {
            let phase = s.phase;
            s.activity.push(ActivityEntry {
                at: Utc::now(),
                phase,
                message,
            });
        });
    }

    pub fn record_error(
        &self,
        agent: &str,
        lead_key: Option<&LeadKey>,
        kind: ErrorKind,
        message: impl Into<String>,
    ) {
        let message = message.into();
        self.with_state(|s| {
            let record = ErrorRecord {
                at: Utc::now(),
                phase: s.phase,
                lead_key: lead_key.cloned(),
                kind,
                message,
            };
            s.errors.entry(agent.to_string()).or_default().push(record);
        });
    }

    pub fn update_stats(&self, f: impl FnOnce(&mut RunStats)) {
        self.with_state(|s| f(&mut s.stats));
    }

    pub fn stats(&self) -> RunStats {
        self.with_state(|s| s.stats)
    }

    pub fn mark_partial(&self) {
        self.with_state(|s| s.partial = true);
    }

    pub fn is_partial(&self) -> bool {
        self.with_state(|s| s.partial)
    }

    pub fn error_count(&self) -> usize {
        self.with_state(|s| s.errors.values().map(Vec::len).sum())
    }

    fn close(self, phase: Phase, failure: Option<String>, ranked: Vec<Lead>) -> WorkflowRun {
        let state = self.state.into_inner().unwrap_or_else(PoisonError::into_inner);
        let finished_at = Utc::now();
        let mut activity = state.activity;
        activity.push(ActivityEntry {
            at: finished_at,
            phase,
            message: match &failure {
                Some(reason) => format!("run failed: {reason}"),
                None if state.partial => "run partially completed".to_string(),
                None => "run completed".to_string(),
            },
        });
        WorkflowRun {
            id: self.id,
            started_at: self.started_at,
            finished_at,
            phase,
            partial: state.partial,
            failure,
            errors: state.errors,
            activity,
            stats: state.stats,
            ranked,
        }
    }

    /// Close the run as `Completed` with its final ranking.
    pub fn complete(self, ranked: Vec<Lead>) -> WorkflowRun {
        self.close(Phase::Completed, None, ranked)
    }

    /// Close the run as `Failed`.
    pub fn fail(self, reason: &FatalReason) -> WorkflowRun {
        self.close(Phase::Failed, Some(reason.to_string()), Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_concurrent_error_appends_are_not_lost() {
        let recorder = Arc::new(RunRecorder::new());
        let mut handles = Vec::new();
        for worker in 0..16 {
            let recorder = recorder.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..25 {
                    recorder.record_error(
                        &format!("agent_{}", worker % 4),
                        None,
                        ErrorKind::Transient,
                        format!("failure {i}"),
                    );
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let recorder = Arc::try_unwrap(recorder).ok().unwrap();
        let run = recorder.complete(Vec::new());
        assert_eq!(run.error_count(), 400);
        assert_eq!(run.errors().len(), 4);
        assert_eq!(run.errors_for("agent_0").len(), 100);
    }

    #[test]
    fn test_close_marks_terminal_phase() {
        let recorder = RunRecorder::new();
        recorder.enter(Phase::Deduping);
        let run = recorder.fail(&FatalReason::NoLeads);
        assert_eq!(run.phase(), Phase::Failed);
        assert!(run.failure().unwrap().contains("no leads"));
        assert!(run.ranked().is_empty());
        assert!(run.activity().len() >= 2);
    }

    #[test]
    fn test_errors_are_tagged_with_current_phase() {
        let recorder = RunRecorder::new();
        recorder.enter(Phase::Enriching);
        let key = LeadKey::new("First Bank", crate::types::lead::Industry::Banking);
        recorder.record_error("enrichment", Some(&key), ErrorKind::Permanent, "bad");
        let run = recorder.complete(Vec::new());
        let record = &run.errors_for("enrichment")[0];
        assert_eq!(record.phase, Phase::Enriching);
        assert_eq!(record.lead_key.as_ref(), Some(&key));
    }
}
