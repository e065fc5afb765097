//! Language label
//!
//! This is a placeholder, not a language identifier. A language declared by
//! the caller is echoed back. Otherwise the only question asked is whether the
//! recording looks like speech at all: mean pitch and mean spectral centroid
//! inside ordinary voice and formant ranges yield the service default
//! ("English"), anything else yields "Unknown".

use super::features::FeatureMatrix;

pub const DEFAULT_LANGUAGE: &str = "English";
pub const UNKNOWN_LANGUAGE: &str = "Unknown";

const VOICE_PITCH_HZ: (f64, f64) = (70.0, 350.0);
const FORMANT_CENTROID_HZ: (f64, f64) = (300.0, 4000.0);

/// Guess a language label; never fails
pub fn guess(matrix: &FeatureMatrix, declared: Option<&str>, silence_rms: f64) -> String {
    if let Some(lang) = declared.map(str::trim).filter(|l| !l.is_empty()) {
        return lang.to_string();
    }

    let voiced: Vec<(f64, f64)> = matrix
        .frames
        .iter()
        .filter(|f| f.rms >= silence_rms && f.pitch_hz > 0.0)
        .map(|f| (f.pitch_hz, f.centroid_hz))
        .collect();

    if voiced.is_empty() {
        return UNKNOWN_LANGUAGE.to_string();
    }

    let n = voiced.len() as f64;
    let mean_pitch = voiced.iter().map(|v| v.0).sum::<f64>() / n;
    let mean_centroid = voiced.iter().map(|v| v.1).sum::<f64>() / n;

    let plausible_voice = (VOICE_PITCH_HZ.0..=VOICE_PITCH_HZ.1).contains(&mean_pitch)
        && (FORMANT_CENTROID_HZ.0..=FORMANT_CENTROID_HZ.1).contains(&mean_centroid);

    if plausible_voice {
        DEFAULT_LANGUAGE.to_string()
    } else {
        UNKNOWN_LANGUAGE.to_string()
    }
}
