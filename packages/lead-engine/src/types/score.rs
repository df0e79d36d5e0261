//! Score breakdown.
//!
//! `overall` is derived: it is computed from the components and weights on
//! construction and again on deserialization, so a stored value can never
//! drift from its parts.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Tolerance when checking that weights sum to one.
pub const WEIGHT_EPSILON: f64 = 1e-6;

/// Round to one decimal place.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn clamp_score(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

/// Relative weight of fit, intent and timing in the overall score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub fit: f64,
    pub intent: f64,
    pub timing: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            fit: 0.40,
            intent: 0.35,
            timing: 0.25,
        }
    }
}

impl ScoreWeights {
    /// Build a validated weight triple.
    pub fn new(fit: f64, intent: f64, timing: f64) -> Result<Self, ConfigError> {
        let weights = Self {
            fit,
            intent,
            timing,
        };
        weights.validate()?;
        Ok(weights)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("score_weights.fit", self.fit),
            ("score_weights.intent", self.intent),
            ("score_weights.timing", self.timing),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::OutOfRange {
                    field,
                    value,
                    min: 0.0,
                    max: 1.0,
                });
            }
        }
        let sum = self.fit + self.intent + self.timing;
        if (sum - 1.0).abs() > WEIGHT_EPSILON {
            return Err(ConfigError::WeightsSum { sum });
        }
        Ok(())
    }

    fn combine(&self, fit: f64, intent: f64, timing: f64) -> f64 {
        round1(self.fit * fit + self.intent * intent + self.timing * timing)
    }
}

/// Sub-scores kept for reporting. They do not feed `overall` directly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreFactors {
    pub industry_fit: f64,
    pub size_fit: f64,
    pub technology_fit: f64,
    pub budget_likelihood: f64,
}

/// Fit, intent and timing in `[0, 100]` plus their weighted overall.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredBreakdown")]
pub struct ScoreBreakdown {
    fit: f64,
    intent: f64,
    timing: f64,
    weights: ScoreWeights,
    overall: f64,
    factors: ScoreFactors,
}

#[derive(Deserialize)]
struct StoredBreakdown {
    fit: f64,
    intent: f64,
    timing: f64,
    #[serde(default)]
    weights: ScoreWeights,
    #[serde(default)]
    factors: ScoreFactors,
}

impl From<StoredBreakdown> for ScoreBreakdown {
    fn from(stored: StoredBreakdown) -> Self {
        let weights = if stored.weights.validate().is_ok() {
            stored.weights
        } else {
            ScoreWeights::default()
        };
        ScoreBreakdown::with_weights(stored.fit, stored.intent, stored.timing, weights)
            .with_factors(stored.factors)
    }
}

impl ScoreBreakdown {
    /// Breakdown under the default 0.40 / 0.35 / 0.25 weights.
    pub fn new(fit: f64, intent: f64, timing: f64) -> Self {
        Self::with_weights(fit, intent, timing, ScoreWeights::default())
    }

    pub fn with_weights(fit: f64, intent: f64, timing: f64, weights: ScoreWeights) -> Self {
        let fit = round1(clamp_score(fit));
        let intent = round1(clamp_score(intent));
        let timing = round1(clamp_score(timing));
        Self {
            fit,
            intent,
            timing,
            weights,
            overall: weights.combine(fit, intent, timing),
            factors: ScoreFactors::default(),
        }
    }

    pub fn with_factors(mut self, factors: ScoreFactors) -> Self {
        self.factors = ScoreFactors {
            industry_fit: round1(clamp_score(factors.industry_fit)),
            size_fit: round1(clamp_score(factors.size_fit)),
            technology_fit: round1(clamp_score(factors.technology_fit)),
            budget_likelihood: round1(clamp_score(factors.budget_likelihood)),
        };
        self
    }

    pub fn fit(&self) -> f64 {
        self.fit
    }

    pub fn intent(&self) -> f64 {
        self.intent
    }

    pub fn timing(&self) -> f64 {
        self.timing
    }

    pub fn overall(&self) -> f64 {
        self.overall
    }

    pub fn weights(&self) -> ScoreWeights {
        self.weights
    }

    pub fn factors(&self) -> &ScoreFactors {
        &self.factors
    }
}
