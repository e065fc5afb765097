//! Frame feature extraction
//!
//! Splits a waveform into overlapping frames and computes one
//! [`FrameFeatures`] record per frame, plus a single global tempo estimate.
//!
//! ```text
//! samples  |----frame 0 (2048)----|
//!          |-hop-|----frame 1 (2048)----|
//!                |-hop-|----frame 2 (2048)----|
//! ```
//!
//! Frames are independent, so they are processed in parallel; `collect`
//! preserves frame order and every frame sees the same read-only planner, so
//! the result is identical to a sequential pass.

use super::decode::AudioSignal;
use super::spectral::{rms, zero_crossing_rate, SpectralAnalyzer, N_CHROMA, N_MFCC};
use crate::config::FrameConfig;
use crate::error::DetectError;
use rayon::prelude::*;
use serde::Serialize;

/// Tempo search range
const TEMPO_MIN_BPM: f64 = 40.0;
const TEMPO_MAX_BPM: f64 = 240.0;

/// Features of one analysis frame. Every value is finite.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameFeatures {
    pub centroid_hz: f64,
    pub rolloff_hz: f64,
    pub bandwidth_hz: f64,
    /// Sign changes per neighbouring sample pair (0..1)
    pub zero_crossing_rate: f64,
    pub rms: f64,
    /// Estimated fundamental, 0 when the frame shows no periodicity
    pub pitch_hz: f64,
    pub mfcc: [f64; N_MFCC],
    /// Pitch-class energies C..B, normalized so the largest is 1
    pub chroma: [f64; N_CHROMA],
}

/// Time-ordered frame features of one signal plus global tempo
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureMatrix {
    pub frames: Vec<FrameFeatures>,
    /// Global tempo in BPM, 0 when the envelope has no periodicity
    pub tempo_bpm: f64,
    pub sample_rate: u32,
    pub hop_size: usize,
    /// Length of the decoded signal the frames were cut from
    pub duration_secs: f64,
}

impl FeatureMatrix {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Start time of frame `index` in seconds
    pub fn frame_time(&self, index: usize) -> f64 {
        (index * self.hop_size) as f64 / self.sample_rate as f64
    }

    /// One feature across all frames
    pub fn column(&self, feature: impl Fn(&FrameFeatures) -> f64) -> Vec<f64> {
        self.frames.iter().map(feature).collect()
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Estimate the fundamental of a frame from its autocorrelation
///
/// Picks the highest local maximum of the normalized autocorrelation between
/// the lags for `max_hz` and `min_hz`, then refines it with a parabola through
/// the peak and its neighbours. Returns 0 for an empty frame or when no local
/// maximum exists in range.
pub(crate) fn estimate_pitch(autocorr: &[f64], sample_rate: u32, min_hz: f64, max_hz: f64) -> f64 {
    let r0 = match autocorr.first() {
        Some(&r0) if r0 > 1e-12 => r0,
        _ => return 0.0,
    };

    let sr = sample_rate as f64;
    let min_lag = ((sr / max_hz).floor() as usize).max(2);
    let max_lag = ((sr / min_hz).ceil() as usize).min(autocorr.len().saturating_sub(2));
    if max_lag <= min_lag {
        return 0.0;
    }

    let norm = |lag: usize| autocorr[lag] / r0;

    let mut best: Option<(usize, f64)> = None;
    for lag in min_lag..=max_lag {
        let r = norm(lag);
        if r > 0.0 && r > norm(lag - 1) && r >= norm(lag + 1) {
            if best.map_or(true, |(_, best_r)| r > best_r) {
                best = Some((lag, r));
            }
        }
    }

    let Some((lag, _)) = best else {
        return 0.0;
    };

    let (a, b, c) = (norm(lag - 1), norm(lag), norm(lag + 1));
    let denom = a - 2.0 * b + c;
    let offset = if denom.abs() > 1e-12 {
        (0.5 * (a - c) / denom).clamp(-0.5, 0.5)
    } else {
        0.0
    };

    finite_or_zero(sr / (lag as f64 + offset))
}

/// Estimate tempo from the periodicity of the RMS envelope
///
/// Onset strength is the positive first difference of the envelope; its
/// autocorrelation is searched over lags for 40-240 BPM.
pub(crate) fn estimate_tempo(envelope: &[f64], frame_rate: f64) -> f64 {
    if envelope.len() < 3 || frame_rate <= 0.0 {
        return 0.0;
    }

    let onset: Vec<f64> = envelope
        .windows(2)
        .map(|w| (w[1] - w[0]).max(0.0))
        .collect();
    let mean = onset.iter().sum::<f64>() / onset.len() as f64;
    let centered: Vec<f64> = onset.iter().map(|&o| o - mean).collect();

    let min_lag = ((60.0 * frame_rate / TEMPO_MAX_BPM).round() as usize).max(1);
    let max_lag = ((60.0 * frame_rate / TEMPO_MIN_BPM).round() as usize).min(centered.len() - 1);
    if max_lag < min_lag {
        return 0.0;
    }

    let mut best: Option<(usize, f64)> = None;
    for lag in min_lag..=max_lag {
        let r: f64 = centered
            .iter()
            .zip(centered[lag..].iter())
            .map(|(a, b)| a * b)
            .sum();
        if r > 1e-12 && best.map_or(true, |(_, best_r)| r > best_r) {
            best = Some((lag, r));
        }
    }

    match best {
        Some((lag, _)) => finite_or_zero(60.0 * frame_rate / lag as f64),
        None => 0.0,
    }
}

fn frame_features(frame: &[f64], analyzer: &SpectralAnalyzer, sample_rate: u32, config: &FrameConfig) -> FrameFeatures {
    let spectral = analyzer.describe(&analyzer.magnitude_spectrum(frame));
    let pitch_hz = estimate_pitch(
        &analyzer.autocorrelation(frame),
        sample_rate,
        config.pitch_min_hz,
        config.pitch_max_hz,
    );

    FrameFeatures {
        centroid_hz: finite_or_zero(spectral.centroid_hz),
        rolloff_hz: finite_or_zero(spectral.rolloff_hz),
        bandwidth_hz: finite_or_zero(spectral.bandwidth_hz),
        zero_crossing_rate: finite_or_zero(zero_crossing_rate(frame)),
        rms: finite_or_zero(rms(frame)),
        pitch_hz,
        mfcc: spectral.mfcc.map(finite_or_zero),
        chroma: spectral.chroma.map(finite_or_zero),
    }
}

/// Extract the feature matrix of a decoded signal
pub fn extract(signal: &AudioSignal, config: &FrameConfig) -> Result<FeatureMatrix, DetectError> {
    config.validate().map_err(|e| DetectError::Processing {
        reason: format!("invalid frame configuration: {}", e),
    })?;
    let frame_size = config.frame_size;
    let hop_size = config.hop_size;
    let samples = &signal.samples;

    if signal.sample_rate == 0 || samples.len() < frame_size {
        return Err(DetectError::InsufficientAudio {
            duration_secs: signal.duration_secs(),
            min_secs: frame_size as f64 / signal.sample_rate.max(1) as f64,
        });
    }

    let analyzer = SpectralAnalyzer::new(signal.sample_rate, config);
    let num_frames = (samples.len() - frame_size) / hop_size + 1;

    let frames: Vec<FrameFeatures> = (0..num_frames)
        .into_par_iter()
        .map(|i| {
            let start = i * hop_size;
            frame_features(&samples[start..start + frame_size], &analyzer, signal.sample_rate, config)
        })
        .collect();

    let envelope: Vec<f64> = frames.iter().map(|f| f.rms).collect();
    let tempo_bpm = estimate_tempo(&envelope, signal.sample_rate as f64 / hop_size as f64);

    Ok(FeatureMatrix {
        frames,
        tempo_bpm,
        sample_rate: signal.sample_rate,
        hop_size,
        duration_secs: signal.duration_secs(),
    })
}
