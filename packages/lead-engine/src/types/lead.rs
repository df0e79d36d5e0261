//! The lead record and its identity.
//!
//! A [`Lead`] is identified by its [`LeadKey`] (canonical company name plus
//! industry) which never changes after construction. All collection fields
//! grow by union, and the status machine only moves forward; once a lead is
//! `Disqualified` every mutator becomes a no-op.

use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::raw::RawLead;
use crate::types::score::ScoreBreakdown;
use crate::types::signal::Signal;

/// Legal-entity suffixes stripped from company names before keying.
const LEGAL_SUFFIXES: [&str; 5] = ["inc", "llc", "corp", "ltd", "co"];

/// Target industry verticals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Industry {
    Banking,
    Insurance,
    Energy,
    Government,
    #[serde(other)]
    Unknown,
}

impl Industry {
    pub const TARGETS: [Industry; 4] = [
        Industry::Banking,
        Industry::Insurance,
        Industry::Energy,
        Industry::Government,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Industry::Banking => "banking",
            Industry::Insurance => "insurance",
            Industry::Energy => "energy",
            Industry::Government => "government",
            Industry::Unknown => "unknown",
        }
    }
}

impl Default for Industry {
    fn default() -> Self {
        Industry::Unknown
    }
}

impl std::fmt::Display for Industry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Industry {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "banking" | "bank" => Industry::Banking,
            "insurance" => Industry::Insurance,
            "energy" | "utilities" => Industry::Energy,
            "government" | "public sector" => Industry::Government,
            _ => Industry::Unknown,
        })
    }
}

/// Canonical form of a company name: lower-cased, trimmed, internal
/// whitespace collapsed, trailing legal-entity suffixes removed.
///
/// `"ABC Bank, Inc."` and `"abc   bank"` both become `"abc bank"`.
pub fn canonical_company_name(name: &str) -> String {
    let lowered = name.to_lowercase();
    let mut tokens: Vec<&str> = lowered.split_whitespace().collect();

    while tokens.len() > 1 {
        let last = tokens[tokens.len() - 1].trim_matches(|c: char| c == '.' || c == ',');
        if !LEGAL_SUFFIXES.contains(&last) {
            break;
        }
        tokens.pop();
    }

    let mut joined = tokens.join(" ");
    while joined.ends_with(',') || joined.ends_with('.') {
        joined.pop();
    }
    joined
}

/// Immutable lead identity: `"<canonical name>|<industry>"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeadKey(String);

impl LeadKey {
    pub fn new(company_name: &str, industry: Industry) -> Self {
        Self(format!(
            "{}|{}",
            canonical_company_name(company_name),
            industry.as_str()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LeadKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pipeline status. Forward-only except for the terminal `Disqualified`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    New,
    Deduped,
    Enriched,
    Validated,
    Scored,
    Disqualified,
}

impl LeadStatus {
    fn rank(&self) -> u8 {
        match self {
            LeadStatus::New => 0,
            LeadStatus::Deduped => 1,
            LeadStatus::Enriched => 2,
            LeadStatus::Validated => 3,
            LeadStatus::Scored => 4,
            LeadStatus::Disqualified => u8::MAX,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LeadStatus::Disqualified)
    }

    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_advance_to(&self, next: LeadStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        next == LeadStatus::Disqualified || next.rank() > self.rank()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::New => "new",
            LeadStatus::Deduped => "deduped",
            LeadStatus::Enriched => "enriched",
            LeadStatus::Validated => "validated",
            LeadStatus::Scored => "scored",
            LeadStatus::Disqualified => "disqualified",
        }
    }
}

impl std::fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Industry-specific registry identifiers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyIds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fdic_cert: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub naic_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duns: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sam_uei: Option<String>,
}

/// Scalar company attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee_count: Option<u32>,
    /// Size label (Small, Medium, Large, Enterprise) when no count is known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revenue: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub ids: CompanyIds,
}

fn filled(value: &Option<String>) -> bool {
    value.as_deref().map(|v| !v.trim().is_empty()).unwrap_or(false)
}

impl CompanyProfile {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Number of non-empty scalar fields.
    pub fn completeness(&self) -> usize {
        let strings = [
            &self.website,
            &self.size,
            &self.revenue,
            &self.location,
            &self.description,
            &self.ids.fdic_cert,
            &self.ids.naic_code,
            &self.ids.duns,
            &self.ids.sam_uei,
        ];
        let name = usize::from(!self.name.trim().is_empty());
        name + usize::from(self.employee_count.is_some())
            + strings.iter().filter(|v| filled(v)).count()
    }

    /// Bare host of the company website (`https://www.abc.com/x` → `abc.com`).
    pub fn domain(&self) -> Option<String> {
        let website = self.website.as_deref()?.trim();
        if website.is_empty() {
            return None;
        }
        let with_scheme = if website.contains("://") {
            website.to_string()
        } else {
            format!("https://{website}")
        };
        let url = url::Url::parse(&with_scheme).ok()?;
        let host = url.host_str()?.to_lowercase();
        Some(host.strip_prefix("www.").unwrap_or(&host).to_string())
    }
}

/// A person at the company.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seniority: Option<String>,
}

fn norm(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(|v| v.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase())
        .filter(|v| !v.is_empty())
}

impl Contact {
    /// Dedup identity: normalized email, else `name|title`. `None` when the
    /// contact carries neither.
    pub fn identity(&self) -> Option<String> {
        if let Some(email) = norm(&self.email) {
            return Some(format!("email:{email}"));
        }
        match (norm(&self.name), norm(&self.title)) {
            (None, None) => None,
            (name, title) => Some(format!(
                "person:{}|{}",
                name.unwrap_or_default(),
                title.unwrap_or_default()
            )),
        }
    }

    /// Fill fields this contact lacks from `other`.
    fn absorb(&mut self, other: &Contact) {
        fn fill(slot: &mut Option<String>, value: &Option<String>) {
            if !filled(slot) && filled(value) {
                *slot = value.clone();
            }
        }
        fill(&mut self.name, &other.name);
        fill(&mut self.title, &other.title);
        fill(&mut self.email, &other.email);
        fill(&mut self.phone, &other.phone);
        fill(&mut self.department, &other.department);
        fill(&mut self.seniority, &other.seniority);
    }
}

fn normalize_tag(tag: &str) -> Option<String> {
    let tag = tag.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
    (!tag.is_empty()).then_some(tag)
}

/// A candidate prospective customer tracked through the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    key: LeadKey,
    industry: Industry,
    company: CompanyProfile,
    #[serde(default)]
    contacts: Vec<Contact>,
    #[serde(default)]
    tech_stack: BTreeSet<String>,
    #[serde(default)]
    signals: Vec<Signal>,
    #[serde(default)]
    sources: BTreeSet<String>,
    status: LeadStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timing: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    score: Option<ScoreBreakdown>,
    #[serde(default)]
    validation_notes: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Lead {
    /// Build a `New` lead from a raw search result.
    pub fn from_raw(raw: RawLead) -> Self {
        let now = Utc::now();
        let company = CompanyProfile {
            name: raw.company.trim().to_string(),
            website: raw.website,
            employee_count: raw.employee_count,
            size: raw.size,
            revenue: raw.revenue,
            location: raw.location,
            description: raw.description,
            ids: raw.ids,
        };
        let mut lead = Self {
            key: LeadKey::new(&company.name, raw.industry),
            industry: raw.industry,
            company,
            contacts: Vec::new(),
            tech_stack: BTreeSet::new(),
            signals: Vec::new(),
            sources: BTreeSet::new(),
            status: LeadStatus::New,
            timing: None,
            score: None,
            validation_notes: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        lead.merge_contacts(raw.contacts);
        lead.merge_tech_stack(raw.tech_stack);
        lead.merge_signals(raw.signals);
        if let Some(source) = raw.source.filter(|s| !s.trim().is_empty()) {
            lead.sources.insert(source);
        }
        lead
    }

    pub fn key(&self) -> &LeadKey {
        &self.key
    }

    /// Public identifier used by the persistence gateway.
    pub fn id(&self) -> &str {
        self.key.as_str()
    }

    pub fn industry(&self) -> Industry {
        self.industry
    }

    pub fn company(&self) -> &CompanyProfile {
        &self.company
    }

    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    pub fn tech_stack(&self) -> &BTreeSet<String> {
        &self.tech_stack
    }

    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }

    pub fn sources(&self) -> &BTreeSet<String> {
        &self.sources
    }

    pub fn status(&self) -> LeadStatus {
        self.status
    }

    pub fn timing(&self) -> Option<f64> {
        self.timing
    }

    pub fn score(&self) -> Option<&ScoreBreakdown> {
        self.score.as_ref()
    }

    pub fn validation_notes(&self) -> &[String] {
        &self.validation_notes
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Disqualified leads accept no further changes.
    pub fn is_frozen(&self) -> bool {
        self.status.is_terminal()
    }

    /// Most recent signal observation, if any.
    pub fn latest_signal_at(&self) -> Option<DateTime<Utc>> {
        self.signals.iter().map(|s| s.observed_at).max()
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Move to `next` if the transition is legal. Returns whether it moved.
    pub fn advance(&mut self, next: LeadStatus) -> bool {
        if !self.status.can_advance_to(next) {
            return false;
        }
        self.status = next;
        self.touch();
        true
    }

    /// Union signals, suppressing kind+source duplicates. Returns how many
    /// were added.
    pub fn merge_signals(&mut self, signals: impl IntoIterator<Item = Signal>) -> usize {
        if self.is_frozen() {
            return 0;
        }
        let mut added = 0;
        for signal in signals {
            if !self.signals.iter().any(|s| s.same_as(&signal)) {
                self.signals.push(signal);
                added += 1;
            }
        }
        if added > 0 {
            self.touch();
        }
        added
    }

    /// Union contacts by identity; a known contact only gains missing fields.
    pub fn merge_contacts(&mut self, contacts: impl IntoIterator<Item = Contact>) -> usize {
        if self.is_frozen() {
            return 0;
        }
        let mut added = 0;
        for contact in contacts {
            let Some(identity) = contact.identity() else {
                continue;
            };
            match self
                .contacts
                .iter_mut()
                .find(|c| c.identity().as_deref() == Some(identity.as_str()))
            {
                Some(existing) => existing.absorb(&contact),
                None => {
                    self.contacts.push(contact);
                    added += 1;
                }
            }
        }
        if added > 0 {
            self.touch();
        }
        added
    }

    /// Union technology tags (normalized to lower case).
    pub fn merge_tech_stack<S: AsRef<str>>(&mut self, tags: impl IntoIterator<Item = S>) -> usize {
        if self.is_frozen() {
            return 0;
        }
        let before = self.tech_stack.len();
        self.tech_stack
            .extend(tags.into_iter().filter_map(|t| normalize_tag(t.as_ref())));
        let added = self.tech_stack.len() - before;
        if added > 0 {
            self.touch();
        }
        added
    }

    pub fn add_source(&mut self, source: impl Into<String>) {
        if !self.is_frozen() {
            self.sources.insert(source.into());
        }
    }

    /// Apply `f` to the company profile unless the lead is frozen.
    pub fn update_company(&mut self, f: impl FnOnce(&mut CompanyProfile)) -> bool {
        if self.is_frozen() {
            return false;
        }
        f(&mut self.company);
        self.touch();
        true
    }

    /// Merge another lead with the same key into this one.
    ///
    /// Collections are unioned; the scalar profile is taken from `other` only
    /// when it is strictly more complete, so ties keep the first-seen record.
    pub fn absorb(&mut self, other: Lead) {
        if self.is_frozen() || other.key != self.key {
            return;
        }
        if other.company.completeness() > self.company.completeness() {
            self.company = other.company;
        }
        self.merge_contacts(other.contacts);
        self.merge_tech_stack(other.tech_stack);
        self.merge_signals(other.signals);
        self.sources.extend(other.sources);
    }

    pub fn set_timing(&mut self, timing: f64) {
        if !self.is_frozen() {
            self.timing = Some(timing.clamp(0.0, 100.0));
        }
    }

    pub fn set_validation_notes(&mut self, notes: Vec<String>) {
        if !self.is_frozen() {
            self.validation_notes = notes;
        }
    }

    /// Attach the final score and advance to `Scored`.
    pub fn set_score(&mut self, score: ScoreBreakdown) -> bool {
        if self.is_frozen() {
            return false;
        }
        self.score = Some(score);
        self.advance(LeadStatus::Scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::signal::SignalKind;

    fn raw(name: &str) -> RawLead {
        RawLead::new(name, Industry::Banking)
    }

    #[test]
    fn test_canonical_company_name() {
        assert_eq!(canonical_company_name("ABC Bank Inc"), "abc bank");
        assert_eq!(canonical_company_name("  abc   bank "), "abc bank");
        assert_eq!(canonical_company_name("ABC Bank, Inc."), "abc bank");
        assert_eq!(canonical_company_name("Acme Co LLC"), "acme");
        assert_eq!(canonical_company_name("Ltd"), "ltd");
        assert_eq!(canonical_company_name("Coastal Energy Corp."), "coastal energy");
    }

    #[test]
    fn test_lead_key_format() {
        let key = LeadKey::new("ABC Bank Inc", Industry::Banking);
        assert_eq!(key.as_str(), "abc bank|banking");
    }

    #[test]
    fn test_status_only_moves_forward() {
        let mut lead = Lead::from_raw(raw("First Bank"));
        assert!(lead.advance(LeadStatus::Enriched));
        assert!(!lead.advance(LeadStatus::Deduped));
        assert_eq!(lead.status(), LeadStatus::Enriched);
        assert!(lead.advance(LeadStatus::Validated));
    }

    #[test]
    fn test_disqualified_freezes_lead() {
        let mut lead = Lead::from_raw(raw("First Bank"));
        assert!(lead.advance(LeadStatus::Disqualified));

        assert!(!lead.advance(LeadStatus::Scored));
        assert_eq!(
            lead.merge_signals([Signal::new(SignalKind::JobPosting, Utc::now(), "x")]),
            0
        );
        assert_eq!(lead.merge_tech_stack(["cobol"]), 0);
        assert!(!lead.update_company(|c| c.employee_count = Some(10)));
        assert!(lead.company().employee_count.is_none());
    }

    #[test]
    fn test_contacts_dedup_by_email_then_name_title() {
        let mut lead = Lead::from_raw(raw("First Bank"));
        let jane = Contact {
            name: Some("Jane Doe".into()),
            email: Some("Jane.Doe@FirstBank.com ".into()),
            ..Default::default()
        };
        let jane_again = Contact {
            title: Some("CIO".into()),
            email: Some("jane.doe@firstbank.com".into()),
            ..Default::default()
        };
        let bob = Contact {
            name: Some("Bob Smith".into()),
            title: Some("CTO".into()),
            ..Default::default()
        };
        let bob_again = Contact {
            name: Some("bob  smith".into()),
            title: Some("cto".into()),
            phone: Some("555-0100".into()),
            ..Default::default()
        };

        assert_eq!(lead.merge_contacts([jane, jane_again, bob, bob_again]), 2);
        assert_eq!(lead.contacts().len(), 2);
        assert_eq!(lead.contacts()[0].title.as_deref(), Some("CIO"));
        assert_eq!(lead.contacts()[1].phone.as_deref(), Some("555-0100"));
    }

    #[test]
    fn test_domain_extraction() {
        let mut profile = CompanyProfile::named("ABC");
        profile.website = Some("https://www.ABCBank.com/about".into());
        assert_eq!(profile.domain().as_deref(), Some("abcbank.com"));

        profile.website = Some("abcbank.com".into());
        assert_eq!(profile.domain().as_deref(), Some("abcbank.com"));

        profile.website = None;
        assert!(profile.domain().is_none());
    }

    #[test]
    fn test_industry_parsing() {
        assert_eq!("Banking".parse::<Industry>().unwrap(), Industry::Banking);
        assert_eq!("retail".parse::<Industry>().unwrap(), Industry::Unknown);
        let parsed: Industry = serde_json::from_str("\"aerospace\"").unwrap();
        assert_eq!(parsed, Industry::Unknown);
    }
}
