//! Search objective and model-selection score.
//!
//! ```text
//! objective   = mean_score
//!             + w_conf  * mean_confidence
//!             - w_lat   * (mean_latency_ms / latency_scale_ms)
//!             - w_cost  * (mean_token_cost / token_cost_scale)
//!             - w_cmplx * complexity
//!             - w_unc   * uncertainty
//! uncertainty = (1 - mean_agreement) + score_std
//! selection   = val_objective - w_gen * max(0, train_score - val_score)
//! ```

use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};

/// Fixed objective weights. None of them is a search-time variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectiveWeights {
    /// Reward for mean confidence
    pub confidence: f64,
    /// Penalty for normalized latency
    pub latency: f64,
    /// Penalty for normalized token cost
    pub cost: f64,
    /// Penalty for structural complexity
    pub complexity: f64,
    /// Penalty for judge uncertainty
    pub uncertainty: f64,
    /// Penalty for the train/validation generalization gap
    pub generalization: f64,
    /// Latency that normalizes to 1.0
    pub latency_scale_ms: f64,
    /// Token cost that normalizes to 1.0
    pub token_cost_scale: f64,
}

impl Default for ObjectiveWeights {
    fn default() -> Self {
        Self {
            confidence: 0.1,
            latency: 0.05,
            cost: 0.05,
            complexity: 0.02,
            uncertainty: 0.08,
            generalization: 0.2,
            latency_scale_ms: 1000.0,
            token_cost_scale: 1.0,
        }
    }
}

/// Inputs to the objective, taken from a split summary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectiveInputs {
    /// Mean aggregated score
    pub mean_score: f64,
    /// Score standard deviation
    pub score_std: f64,
    /// Mean confidence
    pub mean_confidence: f64,
    /// Mean agreement
    pub mean_agreement: f64,
    /// Mean latency in milliseconds
    pub mean_latency_ms: f64,
    /// Mean token cost
    pub mean_token_cost: f64,
    /// Blueprint complexity
    pub complexity: f64,
}

/// Judge uncertainty: disagreement plus score spread.
#[must_use]
pub fn uncertainty(mean_agreement: f64, score_std: f64) -> f64 {
    (1.0 - mean_agreement.clamp(0.0, 1.0)) + score_std.max(0.0)
}

/// Non-negative gap between train and validation mean score.
#[must_use]
pub fn generalization_gap(train_score: f64, val_score: f64) -> f64 {
    (train_score - val_score).max(0.0)
}

impl ObjectiveWeights {
    /// Objective value of one split summary.
    #[must_use]
    pub fn objective(&self, inputs: &ObjectiveInputs) -> f64 {
        inputs.mean_score + self.confidence * inputs.mean_confidence
            - self.latency * (inputs.mean_latency_ms / self.latency_scale_ms)
            - self.cost * (inputs.mean_token_cost / self.token_cost_scale)
            - self.complexity * inputs.complexity
            - self.uncertainty * uncertainty(inputs.mean_agreement, inputs.score_std)
    }

    /// Model-selection score: validation objective minus the generalization penalty.
    #[must_use]
    pub fn selection_score(&self, val_objective: f64, train_score: f64, val_score: f64) -> f64 {
        val_objective - self.generalization * generalization_gap(train_score, val_score)
    }

    /// Validate weights.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::OutOfRange`] for a negative or non-finite
    /// weight, or a non-positive scale.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let weights = [
            ("objective.confidence", self.confidence),
            ("objective.latency", self.latency),
            ("objective.cost", self.cost),
            ("objective.complexity", self.complexity),
            ("objective.uncertainty", self.uncertainty),
            ("objective.generalization", self.generalization),
        ];
        for (field, value) in weights {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigurationError::OutOfRange {
                    field,
                    detail: format!("must be a finite value >= 0, got {value}"),
                });
            }
        }
        for (field, value) in [
            ("objective.latency_scale_ms", self.latency_scale_ms),
            ("objective.token_cost_scale", self.token_cost_scale),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigurationError::OutOfRange {
                    field,
                    detail: format!("must be > 0, got {value}"),
                });
            }
        }
        Ok(())
    }
}
