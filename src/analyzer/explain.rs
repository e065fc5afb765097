//! Human-readable explanations
//!
//! Every signal scoring above the trigger threshold contributes one clause;
//! the clauses are prefixed with the label and a confidence band.
//!
//! ```text
//! Confidence   | Band
//! -------------|-------
//! < 0.4        | low
//! 0.4 – 0.7    | medium
//! > 0.7        | high
//! ```

use super::aggregate::Decision;
use super::heuristics::{HeuristicScore, Signal};
use serde::Serialize;
use std::fmt;

const NO_TRIGGER_CLAUSE: &str = "natural variation in spectral, pitch and energy features";

/// Qualitative confidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceBand {
    Low,
    Medium,
    High,
}

impl ConfidenceBand {
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence > 0.7 {
            ConfidenceBand::High
        } else if confidence >= 0.4 {
            ConfidenceBand::Medium
        } else {
            ConfidenceBand::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceBand::Low => "low",
            ConfidenceBand::Medium => "medium",
            ConfidenceBand::High => "high",
        }
    }
}

impl fmt::Display for ConfidenceBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn clause(signal: Signal) -> &'static str {
    match signal {
        Signal::Consistency => "highly consistent spectral properties",
        Signal::Prosody => "flat, monotone pitch contour",
        Signal::Energy => "unusually uniform energy distribution",
        Signal::Bandwidth => "tightly constrained frequency range",
    }
}

/// Renders triggered signals into prose
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExplanationBuilder {
    trigger_threshold: f64,
}

impl ExplanationBuilder {
    pub fn new(trigger_threshold: f64) -> Self {
        Self { trigger_threshold }
    }

    /// Signals above the trigger threshold, in the order given
    pub fn triggered<'a>(&self, scores: &'a [HeuristicScore]) -> Vec<&'a HeuristicScore> {
        scores.iter().filter(|s| s.value > self.trigger_threshold).collect()
    }

    pub fn build(&self, scores: &[HeuristicScore], decision: &Decision) -> String {
        let clauses: Vec<&str> = self.triggered(scores).iter().map(|s| clause(s.signal)).collect();
        let reasons = if clauses.is_empty() {
            NO_TRIGGER_CLAUSE.to_string()
        } else {
            clauses.join(", ")
        };

        format!(
            "Analysis suggests {} voice with {} confidence: {}",
            decision.classification.label().to_lowercase(),
            ConfidenceBand::from_confidence(decision.confidence),
            reasons
        )
    }
}

impl Default for ExplanationBuilder {
    fn default() -> Self {
        Self::new(0.6)
    }
}
