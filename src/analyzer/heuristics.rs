//! Heuristic synthesis signals
//!
//! Four independent scorers each reduce the [`FeatureMatrix`] to one bounded
//! value in [0, 1], where higher means "more like synthetic speech". All four
//! follow the same pattern: measure how much some feature varies across
//! frames, map that variability onto [0, 1] with a configured range, and
//! invert it. Natural speech moves around; synthesized speech tends to hold
//! still.
//!
//! ```text
//! Signal       | Statistic                                   | Range (default)
//! -------------|---------------------------------------------|----------------
//! consistency  | mean(CV(centroid), CV(bandwidth))           | 0.02 - 0.30
//! prosody      | ½·CV(pitch) + ½·std(Δpitch)/mean(pitch)     | 0.02 - 0.25
//! energy       | CV(rms)                                     | 0.10 - 0.80
//! bandwidth    | var(bandwidth) in kHz²                      | 0.0025 - 0.36
//! ```
//!
//! When a statistic is undefined (silence, too few voiced frames) the scorer
//! returns a neutral 0.5 so it neither pushes towards nor away from either
//! label.

use super::features::{FeatureMatrix, FrameFeatures};
use crate::config::ScoringConfig;
use serde::Serialize;

pub const NEUTRAL: f64 = 0.5;

/// Means below this are treated as "no content"
const EPSILON: f64 = 1e-9;

/// Which heuristic produced a score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    Consistency,
    Prosody,
    Energy,
    Bandwidth,
}

impl Signal {
    pub const ALL: [Signal; 4] = [
        Signal::Consistency,
        Signal::Prosody,
        Signal::Energy,
        Signal::Bandwidth,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Signal::Consistency => "consistency",
            Signal::Prosody => "prosody",
            Signal::Energy => "energy",
            Signal::Bandwidth => "bandwidth",
        }
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One bounded likelihood-of-synthesis signal
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeuristicScore {
    pub signal: Signal,
    pub value: f64,
    pub rationale: String,
}

impl HeuristicScore {
    /// Clamps into [0, 1]; a non-finite value becomes neutral
    pub fn new(signal: Signal, value: f64, rationale: impl Into<String>) -> Self {
        let value = if value.is_finite() { value.clamp(0.0, 1.0) } else { NEUTRAL };
        Self { signal, value, rationale: rationale.into() }
    }

    fn neutral(signal: Signal, rationale: impl Into<String>) -> Self {
        Self::new(signal, NEUTRAL, rationale)
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance
fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

fn std_dev(values: &[f64]) -> f64 {
    variance(values).sqrt()
}

/// Coefficient of variation, `None` when the mean is ~0
fn coefficient_of_variation(values: &[f64]) -> Option<f64> {
    let m = mean(values);
    if m.abs() < EPSILON {
        return None;
    }
    Some(std_dev(values) / m.abs())
}

/// Stability of spectral shape across frames
pub fn consistency(matrix: &FeatureMatrix, config: &ScoringConfig) -> HeuristicScore {
    let centroid_cv = coefficient_of_variation(&matrix.column(|f| f.centroid_hz));
    let bandwidth_cv = coefficient_of_variation(&matrix.column(|f| f.bandwidth_hz));

    match (centroid_cv, bandwidth_cv) {
        (Some(c), Some(b)) => {
            let cv = (c + b) / 2.0;
            HeuristicScore::new(
                Signal::Consistency,
                1.0 - config.consistency_cv.normalize(cv),
                format!("centroid CV {:.3}, bandwidth CV {:.3}", c, b),
            )
        }
        _ => HeuristicScore::neutral(Signal::Consistency, "no spectral content"),
    }
}

/// Flatness of the pitch contour over voiced, non-silent frames
pub fn prosody(matrix: &FeatureMatrix, config: &ScoringConfig) -> HeuristicScore {
    let voiced: Vec<f64> = matrix
        .frames
        .iter()
        .filter(|f: &&FrameFeatures| f.rms >= config.silence_rms && f.pitch_hz > 0.0)
        .map(|f| f.pitch_hz)
        .collect();

    if voiced.len() < 2 {
        return HeuristicScore::neutral(
            Signal::Prosody,
            format!("{} voiced frame(s), too few for a pitch contour", voiced.len()),
        );
    }

    let mean_pitch = mean(&voiced);
    let pitch_cv = std_dev(&voiced) / mean_pitch;
    let deltas: Vec<f64> = voiced.windows(2).map(|w| w[1] - w[0]).collect();
    let delta_rel = std_dev(&deltas) / mean_pitch;
    let variability = 0.5 * pitch_cv + 0.5 * delta_rel;

    HeuristicScore::new(
        Signal::Prosody,
        1.0 - config.pitch_variability.normalize(variability),
        format!(
            "mean pitch {:.1} Hz over {} voiced frames, pitch CV {:.3}, relative pitch-change spread {:.3}",
            mean_pitch,
            voiced.len(),
            pitch_cv,
            delta_rel
        ),
    )
}

/// Uniformity of per-frame loudness
pub fn energy(matrix: &FeatureMatrix, config: &ScoringConfig) -> HeuristicScore {
    match coefficient_of_variation(&matrix.column(|f| f.rms)) {
        Some(cv) => HeuristicScore::new(
            Signal::Energy,
            1.0 - config.energy_cv.normalize(cv),
            format!("RMS energy CV {:.3}", cv),
        ),
        None => HeuristicScore::neutral(Signal::Energy, "signal is silent"),
    }
}

/// Spread of the occupied frequency range across frames
pub fn bandwidth(matrix: &FeatureMatrix, config: &ScoringConfig) -> HeuristicScore {
    let khz = matrix.column(|f| f.bandwidth_hz / 1000.0);
    if mean(&khz) < EPSILON {
        return HeuristicScore::neutral(Signal::Bandwidth, "no spectral content");
    }

    let var = variance(&khz);
    HeuristicScore::new(
        Signal::Bandwidth,
        1.0 - config.bandwidth_variance.normalize(var),
        format!("bandwidth variance {:.4} kHz²", var),
    )
}

/// Run all four scorers, in [`Signal::ALL`] order
pub fn score_all(matrix: &FeatureMatrix, config: &ScoringConfig) -> Vec<HeuristicScore> {
    vec![
        consistency(matrix, config),
        prosody(matrix, config),
        energy(matrix, config),
        bandwidth(matrix, config),
    ]
}
