//! Ideal-customer-profile validation.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::config::IcpThresholds;
use crate::types::lead::{Industry, Lead, LeadStatus};

pub const RULE_INDUSTRY: &str = "industry fit";
pub const RULE_SIZE: &str = "size fit";
pub const RULE_SIGNAL: &str = "buying signal";

/// Result of checking one lead against the ICP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub qualified: bool,
    /// Name of every failing rule.
    pub reasons: Vec<String>,
    /// One pass/fail line per rule evaluated.
    pub notes: Vec<String>,
}

fn note(rule: &str, passed: bool, detail: &str) -> String {
    let verdict = if passed { "PASS" } else { "FAIL" };
    if detail.is_empty() {
        format!("{rule}: {verdict}")
    } else {
        format!("{rule}: {verdict} ({detail})")
    }
}

/// Check `lead` against `icp`. Pure and deterministic; every failing rule
/// is reported.
///
/// Unknown industries and leads without an employee count get the benefit
/// of the doubt.
pub fn validate(lead: &Lead, icp: &IcpThresholds) -> ValidationOutcome {
    let mut reasons = Vec::new();
    let mut notes = Vec::new();

    let industry = lead.industry();
    let industry_ok = industry == Industry::Unknown || icp.target_industries.contains(&industry);
    notes.push(note(RULE_INDUSTRY, industry_ok, industry.as_str()));
    if !industry_ok {
        reasons.push(RULE_INDUSTRY.to_string());
    }

    let (size_ok, size_detail) = match lead.company().employee_count {
        Some(count) if count < icp.min_employees => (
            false,
            format!("{count} employees, minimum {}", icp.min_employees),
        ),
        Some(count) => (true, format!("{count} employees")),
        None => (true, "no employee count".to_string()),
    };
    notes.push(note(RULE_SIZE, size_ok, &size_detail));
    if !size_ok {
        reasons.push(RULE_SIZE.to_string());
    }

    if icp.require_signal {
        let signal_ok = !lead.signals().is_empty();
        notes.push(note(RULE_SIGNAL, signal_ok, ""));
        if !signal_ok {
            reasons.push(RULE_SIGNAL.to_string());
        }
    }

    ValidationOutcome {
        qualified: reasons.is_empty(),
        reasons,
        notes,
    }
}

/// Applies [`validate`] and moves the lead to `Validated` or `Disqualified`.
#[derive(Debug, Clone, Default)]
pub struct ValidationAgent {
    icp: IcpThresholds,
}

impl ValidationAgent {
    pub fn new(icp: IcpThresholds) -> Self {
        Self { icp }
    }

    pub fn icp(&self) -> &IcpThresholds {
        &self.icp
    }

    pub fn apply(&self, lead: &mut Lead) -> ValidationOutcome {
        let outcome = validate(lead, &self.icp);
        lead.set_validation_notes(outcome.notes.clone());
        if outcome.qualified {
            lead.advance(LeadStatus::Validated);
        } else {
            debug!(lead = %lead.key(), reasons = ?outcome.reasons, "lead disqualified");
            lead.advance(LeadStatus::Disqualified);
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::raw::RawLead;
    use crate::types::signal::{Signal, SignalKind};

    fn icp(min_employees: u32) -> IcpThresholds {
        IcpThresholds {
            min_employees,
            ..Default::default()
        }
    }

    #[test]
    fn test_small_company_fails_size_fit() {
        let lead = Lead::from_raw(RawLead::new("Tiny Bank", Industry::Banking).with_employees(10));
        let outcome = validate(&lead, &icp(50));
        assert!(!outcome.qualified);
        assert!(outcome.reasons.contains(&"size fit".to_string()));
    }

    #[test]
    fn test_missing_data_gets_benefit_of_doubt() {
        let lead = Lead::from_raw(RawLead::new("Mystery Corp", Industry::Unknown));
        let outcome = validate(&lead, &icp(100));
        assert!(outcome.qualified);
        assert_eq!(outcome.notes.len(), 2);
    }

    #[test]
    fn test_all_failing_rules_are_reported() {
        let lead = Lead::from_raw(RawLead::new("Tiny Utility", Industry::Energy).with_employees(5));
        let rules = IcpThresholds {
            min_employees: 100,
            target_industries: vec![Industry::Banking],
            require_signal: true,
        };
        let outcome = validate(&lead, &rules);
        assert_eq!(
            outcome.reasons,
            vec!["industry fit", "size fit", "buying signal"]
        );
    }

    #[test]
    fn test_apply_sets_status_and_notes() {
        let agent = ValidationAgent::new(icp(100));

        let mut good = Lead::from_raw(
            RawLead::new("Big Bank", Industry::Banking)
                .with_employees(2000)
                .with_signal(Signal::new(SignalKind::JobPosting, chrono::Utc::now(), "job-1")),
        );
        assert!(agent.apply(&mut good).qualified);
        assert_eq!(good.status(), LeadStatus::Validated);
        assert!(good.validation_notes()[1].starts_with("size fit: PASS"));

        let mut bad = Lead::from_raw(RawLead::new("Tiny Bank", Industry::Banking).with_employees(3));
        assert!(!agent.apply(&mut bad).qualified);
        assert_eq!(bad.status(), LeadStatus::Disqualified);
    }
}
