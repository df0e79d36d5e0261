//! Buying signals observed for a lead.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of observed buying/urgency event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    JobPosting,
    ExecutiveChange,
    RegulatoryDeadline,
    Announcement,
    TechnologyInitiative,
    RecentFunding,
    RfpPublished,
    PartnershipAnnouncement,
}

impl SignalKind {
    pub const ALL: [SignalKind; 8] = [
        SignalKind::JobPosting,
        SignalKind::ExecutiveChange,
        SignalKind::RegulatoryDeadline,
        SignalKind::Announcement,
        SignalKind::TechnologyInitiative,
        SignalKind::RecentFunding,
        SignalKind::RfpPublished,
        SignalKind::PartnershipAnnouncement,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::JobPosting => "job_posting",
            SignalKind::ExecutiveChange => "executive_change",
            SignalKind::RegulatoryDeadline => "regulatory_deadline",
            SignalKind::Announcement => "announcement",
            SignalKind::TechnologyInitiative => "technology_initiative",
            SignalKind::RecentFunding => "recent_funding",
            SignalKind::RfpPublished => "rfp_published",
            SignalKind::PartnershipAnnouncement => "partnership_announcement",
        }
    }
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A discrete observed event indicating buying intent or urgency.
///
/// Two signals are the same signal when kind and source reference match;
/// the observation time does not participate in identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub kind: SignalKind,
    pub observed_at: DateTime<Utc>,
    /// Free-form pointer to where the signal came from (URL, record id, ...).
    #[serde(default)]
    pub source_ref: String,
}

impl Signal {
    pub fn new(kind: SignalKind, observed_at: DateTime<Utc>, source_ref: impl Into<String>) -> Self {
        Self {
            kind,
            observed_at,
            source_ref: source_ref.into(),
        }
    }

    /// Whether `other` is a duplicate of this signal.
    pub fn same_as(&self, other: &Signal) -> bool {
        self.kind == other.kind && self.source_ref.trim() == other.source_ref.trim()
    }
}
