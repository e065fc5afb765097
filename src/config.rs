//! Read-only configuration shared by every request
//!
//! A [`Config`] is built once at startup and handed to the pipeline and the
//! server by reference (the server wraps it in an `Arc`). Nothing mutates it
//! afterwards. Tests override individual fields through the `with_*` builders.
//!
//! The normalization ranges below are tunable heuristics, not measured truth.
//! They were chosen so that a sustained tone lands at the synthetic extreme and
//! level/band-switching noise lands at the natural extreme.

use std::fmt;
use std::time::Duration;

/// Invalid configuration values
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    NegativeWeight { signal: &'static str, weight: f64 },
    WeightsDoNotSumToOne { sum: f64 },
    InvalidFrame { frame_size: usize, hop_size: usize },
    InvalidRange { low: f64, high: f64 },
    InvalidParameter { name: &'static str, value: f64 },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NegativeWeight { signal, weight } => {
                write!(f, "weight for {} must be non-negative (got {})", signal, weight)
            }
            ConfigError::WeightsDoNotSumToOne { sum } => {
                write!(f, "weights must sum to 1 (got {})", sum)
            }
            ConfigError::InvalidFrame { frame_size, hop_size } => write!(
                f,
                "frame size {} and hop size {} must both be positive with hop <= frame",
                frame_size, hop_size
            ),
            ConfigError::InvalidRange { low, high } => {
                write!(f, "normalization range {}..{} must be increasing", low, high)
            }
            ConfigError::InvalidParameter { name, value } => {
                write!(f, "{} is out of range (got {})", name, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Aggregation weights for the four heuristic signals
///
/// Constructed only through [`Weights::new`] (or `Default`), so a value of this
/// type always holds non-negative weights summing to 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weights {
    consistency: f64,
    prosody: f64,
    energy: f64,
    bandwidth: f64,
}

impl Weights {
    const SUM_TOLERANCE: f64 = 1e-9;

    pub fn new(consistency: f64, prosody: f64, energy: f64, bandwidth: f64) -> Result<Self, ConfigError> {
        for (signal, weight) in [
            ("consistency", consistency),
            ("prosody", prosody),
            ("energy", energy),
            ("bandwidth", bandwidth),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(ConfigError::NegativeWeight { signal, weight });
            }
        }

        let sum = consistency + prosody + energy + bandwidth;
        if (sum - 1.0).abs() > Self::SUM_TOLERANCE {
            return Err(ConfigError::WeightsDoNotSumToOne { sum });
        }

        Ok(Self { consistency, prosody, energy, bandwidth })
    }

    pub fn consistency(&self) -> f64 {
        self.consistency
    }

    pub fn prosody(&self) -> f64 {
        self.prosody
    }

    pub fn energy(&self) -> f64 {
        self.energy
    }

    pub fn bandwidth(&self) -> f64 {
        self.bandwidth
    }

    pub fn sum(&self) -> f64 {
        self.consistency + self.prosody + self.energy + self.bandwidth
    }
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            consistency: 0.3,
            prosody: 0.3,
            energy: 0.2,
            bandwidth: 0.2,
        }
    }
}

/// Linear map of a raw statistic onto [0, 1]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormRange {
    low: f64,
    high: f64,
}

impl NormRange {
    pub fn new(low: f64, high: f64) -> Result<Self, ConfigError> {
        if !(low.is_finite() && high.is_finite() && high > low) {
            return Err(ConfigError::InvalidRange { low, high });
        }
        Ok(Self { low, high })
    }

    /// Position of `value` inside the range, clamped to [0, 1]; non-finite → 0
    pub fn normalize(&self, value: f64) -> f64 {
        if !value.is_finite() {
            return 0.0;
        }
        ((value - self.low) / (self.high - self.low)).clamp(0.0, 1.0)
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn high(&self) -> f64 {
        self.high
    }
}

/// Framing and per-frame analysis parameters
#[derive(Debug, Clone, PartialEq)]
pub struct FrameConfig {
    pub frame_size: usize,
    pub hop_size: usize,
    /// Fraction of spectral magnitude under the rolloff frequency
    pub rolloff_fraction: f64,
    pub mel_bands: usize,
    pub pitch_min_hz: f64,
    pub pitch_max_hz: f64,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            frame_size: 2048,
            hop_size: 512,
            rolloff_fraction: 0.85,
            mel_bands: 40,
            pitch_min_hz: 60.0,
            pitch_max_hz: 400.0,
        }
    }
}

impl FrameConfig {
    /// Check the values the framing and spectral stages depend on
    ///
    /// The fields are public, so [`features::extract`](crate::analyzer::features::extract)
    /// runs this before touching any sample.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frame_size < 2 || self.hop_size == 0 || self.hop_size > self.frame_size {
            return Err(ConfigError::InvalidFrame {
                frame_size: self.frame_size,
                hop_size: self.hop_size,
            });
        }
        if !(self.rolloff_fraction > 0.0 && self.rolloff_fraction <= 1.0) {
            return Err(ConfigError::InvalidParameter {
                name: "rolloff_fraction",
                value: self.rolloff_fraction,
            });
        }
        if self.mel_bands == 0 {
            return Err(ConfigError::InvalidParameter { name: "mel_bands", value: 0.0 });
        }
        if !(self.pitch_min_hz > 0.0 && self.pitch_min_hz < self.pitch_max_hz && self.pitch_max_hz.is_finite()) {
            return Err(ConfigError::InvalidRange {
                low: self.pitch_min_hz,
                high: self.pitch_max_hz,
            });
        }
        Ok(())
    }
}

/// Heuristic scoring parameters
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    pub weights: Weights,
    /// Frames quieter than this RMS carry no meaningful pitch
    pub silence_rms: f64,
    /// Scores above this are called out in the explanation
    pub trigger_threshold: f64,
    /// Mean CV of centroid and bandwidth
    pub consistency_cv: NormRange,
    /// Relative pitch variability
    pub pitch_variability: NormRange,
    /// CV of per-frame RMS
    pub energy_cv: NormRange,
    /// Bandwidth variance in kHz²
    pub bandwidth_variance: NormRange,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: Weights::default(),
            silence_rms: 0.01,
            trigger_threshold: 0.6,
            consistency_cv: NormRange { low: 0.02, high: 0.30 },
            pitch_variability: NormRange { low: 0.02, high: 0.25 },
            energy_cv: NormRange { low: 0.10, high: 0.80 },
            bandwidth_variance: NormRange { low: 0.0025, high: 0.36 },
        }
    }
}

/// Size, time and duration bounds
#[derive(Debug, Clone, PartialEq)]
pub struct Limits {
    pub min_duration_secs: f64,
    /// Decoding stops after this much audio
    pub max_analysis_secs: f64,
    pub max_download_bytes: u64,
    pub fetch_timeout: Duration,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            min_duration_secs: 0.5,
            max_analysis_secs: 60.0,
            max_download_bytes: 50 * 1024 * 1024,
            fetch_timeout: Duration::from_secs(30),
        }
    }
}

/// Complete process configuration
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Config {
    pub frames: FrameConfig,
    pub scoring: ScoringConfig,
    pub limits: Limits,
    /// Required `x-api-key` value; `None` disables authentication
    pub api_key: Option<String>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key.filter(|k| !k.is_empty());
        self
    }

    pub fn with_weights(mut self, weights: Weights) -> Self {
        self.scoring.weights = weights;
        self
    }

    pub fn with_min_duration(mut self, secs: f64) -> Self {
        self.limits.min_duration_secs = secs;
        self
    }

    pub fn with_max_download_bytes(mut self, bytes: u64) -> Self {
        self.limits.max_download_bytes = bytes;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.limits.fetch_timeout = timeout;
        self
    }

    pub fn with_frame(mut self, frame_size: usize, hop_size: usize) -> Result<Self, ConfigError> {
        let frames = FrameConfig { frame_size, hop_size, ..self.frames.clone() };
        frames.validate()?;
        self.frames = frames;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==========================================================================
    // WEIGHT INVARIANT
    // ==========================================================================
    //
    // The aggregate is only guaranteed to stay in [0, 1] when the weights are
    // non-negative and sum to exactly 1. Weights::new is the only way in.
    // ==========================================================================

    #[test]
    fn test_default_weights_sum_to_one() {
        let w = Weights::default();
        assert!((w.sum() - 1.0).abs() < 1e-12, "sum was {}", w.sum());
    }

    #[test]
    fn test_default_weights_non_negative() {
        let w = Weights::default();
        for v in [w.consistency(), w.prosody(), w.energy(), w.bandwidth()] {
            assert!(v >= 0.0);
        }
    }

    #[test]
    fn test_default_weights_match_documented_values() {
        let w = Weights::default();
        assert_eq!(w, Weights::new(0.3, 0.3, 0.2, 0.2).unwrap());
    }

    #[test]
    fn test_weights_reject_negative() {
        let err = Weights::new(0.5, 0.5, 0.2, -0.2).unwrap_err();
        assert!(matches!(err, ConfigError::NegativeWeight { signal: "bandwidth", .. }));
    }

    #[test]
    fn test_weights_reject_bad_sum() {
        let err = Weights::new(0.3, 0.3, 0.3, 0.3).unwrap_err();
        assert!(matches!(err, ConfigError::WeightsDoNotSumToOne { .. }));
    }

    #[test]
    fn test_weights_reject_nan() {
        assert!(Weights::new(f64::NAN, 0.5, 0.25, 0.25).is_err());
    }

    // ==========================================================================
    // NORMALIZATION RANGE
    // ==========================================================================

    #[test]
    fn test_norm_range_clamps() {
        let r = NormRange::new(0.1, 0.5).unwrap();
        assert_eq!(r.normalize(0.0), 0.0);
        assert_eq!(r.normalize(1.0), 1.0);
        assert!((r.normalize(0.3) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_norm_range_non_finite_is_zero() {
        let r = NormRange::new(0.0, 1.0).unwrap();
        assert_eq!(r.normalize(f64::NAN), 0.0);
        assert_eq!(r.normalize(f64::INFINITY), 0.0);
    }

    #[test]
    fn test_norm_range_rejects_inverted() {
        assert!(NormRange::new(1.0, 0.5).is_err());
        assert!(NormRange::new(0.5, 0.5).is_err());
    }

    // ==========================================================================
    // BUILDERS
    // ==========================================================================

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.frames.frame_size, 2048);
        assert_eq!(config.frames.hop_size, 512);
        assert_eq!(config.limits.min_duration_secs, 0.5);
        assert_eq!(config.limits.max_download_bytes, 50 * 1024 * 1024);
        assert_eq!(config.limits.fetch_timeout, Duration::from_secs(30));
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_empty_api_key_disables_auth() {
        let config = Config::new().with_api_key(Some(String::new()));
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_with_frame_validates() {
        assert!(Config::new().with_frame(1024, 256).is_ok());
        assert!(Config::new().with_frame(0, 256).is_err());
        assert!(Config::new().with_frame(256, 512).is_err());
        assert!(Config::new().with_frame(1, 1).is_err());
    }

    #[test]
    fn test_frame_config_validate() {
        assert!(FrameConfig::default().validate().is_ok());

        let zero = FrameConfig { frame_size: 0, ..Default::default() };
        assert_eq!(
            zero.validate(),
            Err(ConfigError::InvalidFrame { frame_size: 0, hop_size: 512 })
        );

        let no_bands = FrameConfig { mel_bands: 0, ..Default::default() };
        assert!(matches!(
            no_bands.validate(),
            Err(ConfigError::InvalidParameter { name: "mel_bands", .. })
        ));

        let rolloff = FrameConfig { rolloff_fraction: 1.5, ..Default::default() };
        assert!(rolloff.validate().is_err());

        let pitch = FrameConfig { pitch_min_hz: 400.0, pitch_max_hz: 60.0, ..Default::default() };
        assert!(matches!(pitch.validate(), Err(ConfigError::InvalidRange { .. })));
    }
}
