//! Fit / intent / timing scoring and final ranking.

use std::cmp::Ordering;

use crate::types::config::{LeadConfig, ScoringConfig};
use crate::types::lead::{Industry, Lead};
use crate::types::score::{ScoreBreakdown, ScoreFactors, ScoreWeights};
use crate::types::signal::SignalKind;

/// Pure function of a lead plus configuration.
#[derive(Debug, Clone)]
pub struct Scorer {
    weights: ScoreWeights,
    scoring: ScoringConfig,
    targets: Vec<Industry>,
}

impl Default for Scorer {
    fn default() -> Self {
        Self::from_config(&LeadConfig::default())
    }
}

impl Scorer {
    pub fn from_config(config: &LeadConfig) -> Self {
        Self {
            weights: config.score_weights,
            scoring: config.scoring.clone(),
            targets: config.icp_thresholds.target_industries.clone(),
        }
    }

    pub fn industry_fit(&self, lead: &Lead) -> f64 {
        match lead.industry() {
            Industry::Unknown => 50.0,
            industry if self.targets.contains(&industry) => 100.0,
            _ => 25.0,
        }
    }

    pub fn size_fit(&self, lead: &Lead) -> f64 {
        let company = lead.company();
        if let Some(count) = company.employee_count {
            return self
                .scoring
                .size_bands
                .iter()
                .find(|band| count >= band.min_employees)
                .map(|band| band.score)
                .unwrap_or(self.scoring.below_bands_score);
        }
        match company.size.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(label) => self
                .scoring
                .size_labels
                .get(&label.to_lowercase())
                .copied()
                .unwrap_or(self.scoring.unknown_label_score),
            None => self.scoring.no_size_score,
        }
    }

    /// Modernization opportunity: legacy estate, cloud migration, and up to
    /// three technology initiatives on top of a base of 50.
    pub fn technology_fit(&self, lead: &Lead) -> f64 {
        let has_marker = |markers: &[String]| {
            lead.tech_stack()
                .iter()
                .any(|tag| markers.iter().any(|m| tag.contains(m.as_str())))
        };

        let mut score = 50.0;
        if has_marker(&self.scoring.legacy_markers) {
            score += 30.0;
        }
        if has_marker(&self.scoring.cloud_markers) {
            score += 15.0;
        }
        let initiatives = lead
            .signals()
            .iter()
            .filter(|s| s.kind == SignalKind::TechnologyInitiative)
            .count()
            .min(3);
        score += 10.0 * initiatives as f64;
        score.min(100.0)
    }

    pub fn fit(&self, lead: &Lead) -> f64 {
        (self.industry_fit(lead) + self.size_fit(lead) + self.technology_fit(lead)) / 3.0
    }

    /// Intent from signal count and strength.
    pub fn intent(&self, lead: &Lead) -> f64 {
        let signals = lead.signals();
        if signals.is_empty() {
            return self.scoring.no_signal_intent;
        }
        let mut total: f64 = signals
            .iter()
            .map(|s| {
                self.scoring
                    .intent_weights
                    .get(&s.kind)
                    .copied()
                    .unwrap_or(self.scoring.default_intent_weight)
            })
            .sum();
        if signals.len() > 2 {
            total *= 1.2;
        }
        total.min(100.0)
    }

    pub fn score(&self, lead: &Lead) -> ScoreBreakdown {
        let industry_fit = self.industry_fit(lead);
        let size_fit = self.size_fit(lead);
        let technology_fit = self.technology_fit(lead);
        let fit = (industry_fit + size_fit + technology_fit) / 3.0;
        let intent = self.intent(lead);
        let timing = lead.timing().unwrap_or(self.scoring.neutral_timing);

        ScoreBreakdown::with_weights(fit, intent, timing, self.weights).with_factors(ScoreFactors {
            industry_fit,
            size_fit,
            technology_fit,
            budget_likelihood: (size_fit + intent) / 2.0,
        })
    }
}

/// Ranking order: overall descending, then most recent signal (leads with
/// no signals last), then lead key ascending.
pub fn compare(a: &Lead, b: &Lead) -> Ordering {
    let overall = |lead: &Lead| lead.score().map(|s| s.overall()).unwrap_or(0.0);
    overall(b)
        .total_cmp(&overall(a))
        .then_with(|| b.latest_signal_at().cmp(&a.latest_signal_at()))
        .then_with(|| a.key().cmp(b.key()))
}

/// Sort leads into final ranking order.
pub fn rank(leads: &mut [Lead]) {
    leads.sort_by(compare);
}
