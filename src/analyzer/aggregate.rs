//! Score aggregation and the final decision
//!
//! The four heuristic values are combined with fixed weights into one
//! aggregate in [0, 1]:
//!
//! ```text
//! aggregate  = 0.3·consistency + 0.3·prosody + 0.2·energy + 0.2·bandwidth
//! label      = "AI Generated" if aggregate > 0.5, else "Human"
//! confidence = |aggregate − 0.5| · 2
//! ```
//!
//! An aggregate of exactly 0.5 is labelled `Human`: without evidence either
//! way the recording is not accused of being synthetic. Confidence is 0 at the
//! boundary and 1 at either extreme.

use super::heuristics::{HeuristicScore, Signal};
use crate::config::Weights;
use serde::Serialize;
use std::fmt;

pub const DECISION_BOUNDARY: f64 = 0.5;

/// Final label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Classification {
    #[serde(rename = "AI Generated")]
    AiGenerated,
    #[serde(rename = "Human")]
    Human,
}

impl Classification {
    pub fn label(&self) -> &'static str {
        match self {
            Classification::AiGenerated => "AI Generated",
            Classification::Human => "Human",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Label for an aggregate score; the boundary itself is `Human`
pub fn classify(aggregate: f64) -> Classification {
    if aggregate > DECISION_BOUNDARY {
        Classification::AiGenerated
    } else {
        Classification::Human
    }
}

/// Distance from the boundary scaled onto [0, 1]
pub fn confidence(aggregate: f64) -> f64 {
    if !aggregate.is_finite() {
        return 0.0;
    }
    ((aggregate - DECISION_BOUNDARY).abs() * 2.0).clamp(0.0, 1.0)
}

/// Aggregate, label and confidence for one recording
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Decision {
    pub aggregate: f64,
    pub classification: Classification,
    pub confidence: f64,
}

/// Weighted combination of heuristic scores
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreAggregator {
    weights: Weights,
}

impl ScoreAggregator {
    pub fn new(weights: Weights) -> Self {
        Self { weights }
    }

    pub fn weight(&self, signal: Signal) -> f64 {
        match signal {
            Signal::Consistency => self.weights.consistency(),
            Signal::Prosody => self.weights.prosody(),
            Signal::Energy => self.weights.energy(),
            Signal::Bandwidth => self.weights.bandwidth(),
        }
    }

    /// Weighted sum, clamped to [0, 1]
    ///
    /// A signal missing from `scores` contributes a neutral 0.5 so the result
    /// never depends on which scorers happened to run.
    pub fn aggregate(&self, scores: &[HeuristicScore]) -> f64 {
        let total: f64 = Signal::ALL
            .iter()
            .map(|&signal| {
                let value = scores
                    .iter()
                    .find(|s| s.signal == signal)
                    .map_or(super::heuristics::NEUTRAL, |s| s.value);
                self.weight(signal) * value
            })
            .sum();
        total.clamp(0.0, 1.0)
    }

    pub fn decide(&self, scores: &[HeuristicScore]) -> Decision {
        let aggregate = self.aggregate(scores);
        Decision {
            aggregate,
            classification: classify(aggregate),
            confidence: confidence(aggregate),
        }
    }
}

impl Default for ScoreAggregator {
    fn default() -> Self {
        Self::new(Weights::default())
    }
}
