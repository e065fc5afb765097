//! Spectral analysis of a single analysis frame
//!
//! Uses FFT (Fast Fourier Transform) to turn a windowed frame of samples into
//! a magnitude spectrum, then reduces that spectrum to the descriptors the
//! heuristics care about.
//!
//! # Descriptors
//!
//! ```text
//! Descriptor  | Formula                                   | Meaning
//! ------------|-------------------------------------------|------------------------
//! centroid    | Σ f·|X| / Σ |X|                           | "brightness"
//! rolloff     | min f with Σ_{≤f} |X| ≥ 0.85 · Σ |X|      | where energy runs out
//! bandwidth   | sqrt(Σ |X|·(f − centroid)² / Σ |X|)       | spread around centroid
//! MFCC        | DCT(log(mel filterbank · |X|²))[0..13]    | spectral envelope shape
//! chroma      | |X|² folded into 12 pitch classes         | harmonic content
//! ```
//!
//! The same planner also provides an FFT-based autocorrelation, which the
//! pitch tracker uses instead of an O(N²) time-domain sum.

use crate::config::FrameConfig;
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

/// Number of cepstral coefficients kept per frame
pub const N_MFCC: usize = 13;

/// Number of pitch classes (C, C#, ..., B)
pub const N_CHROMA: usize = 12;

/// Below this, a spectrum or frame counts as empty
const EPSILON: f64 = 1e-10;

/// Lowest frequency folded into chroma (DC and sub-audio bins carry no pitch class)
const CHROMA_MIN_HZ: f64 = 20.0;

/// Spectral descriptors of one frame
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralDescriptors {
    pub centroid_hz: f64,
    pub rolloff_hz: f64,
    pub bandwidth_hz: f64,
    pub mfcc: [f64; N_MFCC],
    pub chroma: [f64; N_CHROMA],
}

/// Hanning window function
pub(crate) fn hanning_window(size: usize) -> Vec<f64> {
    if size <= 1 {
        return vec![1.0; size];
    }
    (0..size)
        .map(|i| {
            0.5 * (1.0 - (2.0 * std::f64::consts::PI * i as f64 / (size - 1) as f64).cos())
        })
        .collect()
}

/// Calculate RMS of a slice
pub(crate) fn rms(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples.iter().map(|&x| x * x).sum();
    (sum_sq / samples.len() as f64).sqrt()
}

/// Fraction of adjacent sample pairs whose sign differs
pub(crate) fn zero_crossing_rate(samples: &[f64]) -> f64 {
    if samples.len() < 2 {
        return 0.0;
    }
    let crossings = samples
        .windows(2)
        .filter(|pair| (pair[0] >= 0.0) != (pair[1] >= 0.0))
        .count();
    crossings as f64 / (samples.len() - 1) as f64
}

/// Energy-weighted mean frequency
pub(crate) fn spectral_centroid(magnitudes: &[f64], bin_hz: f64) -> f64 {
    let total: f64 = magnitudes.iter().sum();
    if total <= EPSILON {
        return 0.0;
    }
    let weighted: f64 = magnitudes
        .iter()
        .enumerate()
        .map(|(i, &m)| i as f64 * bin_hz * m)
        .sum();
    weighted / total
}

/// Frequency below which `fraction` of the spectral magnitude lies
pub(crate) fn spectral_rolloff(magnitudes: &[f64], bin_hz: f64, fraction: f64) -> f64 {
    let total: f64 = magnitudes.iter().sum();
    if total <= EPSILON {
        return 0.0;
    }
    let threshold = fraction * total;
    let mut cumulative = 0.0;
    for (i, &m) in magnitudes.iter().enumerate() {
        cumulative += m;
        if cumulative >= threshold {
            return i as f64 * bin_hz;
        }
    }
    (magnitudes.len().saturating_sub(1)) as f64 * bin_hz
}

/// Energy-weighted standard deviation of frequency around `centroid`
pub(crate) fn spectral_bandwidth(magnitudes: &[f64], bin_hz: f64, centroid: f64) -> f64 {
    let total: f64 = magnitudes.iter().sum();
    if total <= EPSILON {
        return 0.0;
    }
    let spread: f64 = magnitudes
        .iter()
        .enumerate()
        .map(|(i, &m)| {
            let d = i as f64 * bin_hz - centroid;
            m * d * d
        })
        .sum();
    (spread / total).max(0.0).sqrt()
}

/// HTK mel scale
fn hz_to_mel(hz: f64) -> f64 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f64) -> f64 {
    700.0 * (10f64.powf(mel / 2595.0) - 1.0)
}

/// Triangular mel filters over spectrum bins, `[band][bin]`
fn mel_filterbank(sample_rate: u32, n_bins: usize, bin_hz: f64, n_mels: usize) -> Vec<Vec<f64>> {
    let mel_max = hz_to_mel(sample_rate as f64 / 2.0);
    let edges: Vec<f64> = (0..n_mels + 2)
        .map(|i| mel_to_hz(mel_max * i as f64 / (n_mels + 1) as f64))
        .collect();

    (0..n_mels)
        .map(|m| {
            let (lo, center, hi) = (edges[m], edges[m + 1], edges[m + 2]);
            (0..n_bins)
                .map(|k| {
                    let f = k as f64 * bin_hz;
                    let rising = (f - lo) / (center - lo);
                    let falling = (hi - f) / (hi - center);
                    rising.min(falling).max(0.0)
                })
                .collect()
        })
        .collect()
}

/// Orthonormal DCT-II basis, `[coefficient][band]`
fn dct_basis(n_coeffs: usize, n_bands: usize) -> Vec<Vec<f64>> {
    let m = n_bands as f64;
    (0..n_coeffs)
        .map(|k| {
            let scale = if k == 0 { (1.0 / m).sqrt() } else { (2.0 / m).sqrt() };
            (0..n_bands)
                .map(|b| scale * (std::f64::consts::PI * k as f64 * (b as f64 + 0.5) / m).cos())
                .collect()
        })
        .collect()
}

/// Pitch class of each spectrum bin (C = 0, A = 9), `None` below 20 Hz
fn chroma_map(n_bins: usize, bin_hz: f64) -> Vec<Option<usize>> {
    (0..n_bins)
        .map(|k| {
            let f = k as f64 * bin_hz;
            if f < CHROMA_MIN_HZ {
                return None;
            }
            let semitones_from_a4 = (12.0 * (f / 440.0).log2()).round() as i64;
            Some((semitones_from_a4 + 9).rem_euclid(N_CHROMA as i64) as usize)
        })
        .collect()
}

/// Per-frame FFT machinery, planned once per signal and shared across frames
pub struct SpectralAnalyzer {
    frame_size: usize,
    bin_hz: f64,
    rolloff_fraction: f64,
    window: Vec<f64>,
    fft: Arc<dyn Fft<f64>>,
    autocorr_forward: Arc<dyn Fft<f64>>,
    autocorr_inverse: Arc<dyn Fft<f64>>,
    mel_filters: Vec<Vec<f64>>,
    dct: Vec<Vec<f64>>,
    chroma_bins: Vec<Option<usize>>,
}

impl SpectralAnalyzer {
    pub fn new(sample_rate: u32, config: &FrameConfig) -> Self {
        let frame_size = config.frame_size;
        let n_bins = frame_size / 2 + 1;
        let bin_hz = sample_rate as f64 / frame_size as f64;

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(frame_size);
        // Zero-padding to 2N keeps the circular autocorrelation free of wrap-around
        let autocorr_forward = planner.plan_fft_forward(frame_size * 2);
        let autocorr_inverse = planner.plan_fft_inverse(frame_size * 2);

        let mel_bands = config.mel_bands.max(N_MFCC);

        Self {
            frame_size,
            bin_hz,
            rolloff_fraction: config.rolloff_fraction,
            window: hanning_window(frame_size),
            fft,
            autocorr_forward,
            autocorr_inverse,
            mel_filters: mel_filterbank(sample_rate, n_bins, bin_hz, mel_bands),
            dct: dct_basis(N_MFCC, mel_bands),
            chroma_bins: chroma_map(n_bins, bin_hz),
        }
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn bin_hz(&self) -> f64 {
        self.bin_hz
    }

    /// Magnitudes of bins 0..=N/2 of the Hann-windowed frame
    pub fn magnitude_spectrum(&self, frame: &[f64]) -> Vec<f64> {
        let mut buffer: Vec<Complex<f64>> = frame
            .iter()
            .zip(self.window.iter())
            .map(|(&s, &w)| Complex::new(s * w, 0.0))
            .collect();
        buffer.resize(self.frame_size, Complex::new(0.0, 0.0));

        self.fft.process(&mut buffer);

        buffer[..self.frame_size / 2 + 1].iter().map(|c| c.norm()).collect()
    }

    /// Biased autocorrelation r[lag] for lags 0..frame.len()
    pub fn autocorrelation(&self, frame: &[f64]) -> Vec<f64> {
        let padded = self.frame_size * 2;
        let mut buffer: Vec<Complex<f64>> = frame
            .iter()
            .map(|&s| Complex::new(s, 0.0))
            .collect();
        buffer.resize(padded, Complex::new(0.0, 0.0));

        self.autocorr_forward.process(&mut buffer);
        for c in buffer.iter_mut() {
            *c = Complex::new(c.norm_sqr(), 0.0);
        }
        self.autocorr_inverse.process(&mut buffer);

        // rustfft leaves the inverse unnormalized
        buffer[..frame.len().min(self.frame_size)]
            .iter()
            .map(|c| c.re / padded as f64)
            .collect()
    }

    /// Reduce a magnitude spectrum to centroid, rolloff, bandwidth, MFCC and chroma
    pub fn describe(&self, magnitudes: &[f64]) -> SpectralDescriptors {
        let centroid_hz = spectral_centroid(magnitudes, self.bin_hz);
        let rolloff_hz = spectral_rolloff(magnitudes, self.bin_hz, self.rolloff_fraction);
        let bandwidth_hz = spectral_bandwidth(magnitudes, self.bin_hz, centroid_hz);

        SpectralDescriptors {
            centroid_hz,
            rolloff_hz,
            bandwidth_hz,
            mfcc: self.mfcc(magnitudes),
            chroma: self.chroma(magnitudes),
        }
    }

    fn mfcc(&self, magnitudes: &[f64]) -> [f64; N_MFCC] {
        let log_mel: Vec<f64> = self
            .mel_filters
            .iter()
            .map(|filter| {
                let energy: f64 = filter
                    .iter()
                    .zip(magnitudes.iter())
                    .map(|(&w, &m)| w * m * m)
                    .sum();
                (energy + EPSILON).ln()
            })
            .collect();

        let mut coeffs = [0.0; N_MFCC];
        for (coeff, basis) in coeffs.iter_mut().zip(self.dct.iter()) {
            *coeff = basis.iter().zip(log_mel.iter()).map(|(&b, &l)| b * l).sum();
        }
        coeffs
    }

    fn chroma(&self, magnitudes: &[f64]) -> [f64; N_CHROMA] {
        let mut chroma = [0.0; N_CHROMA];
        for (&class, &m) in self.chroma_bins.iter().zip(magnitudes.iter()) {
            if let Some(pc) = class {
                chroma[pc] += m * m;
            }
        }

        let max = chroma.iter().cloned().fold(0.0, f64::max);
        if max > EPSILON {
            for c in chroma.iter_mut() {
                *c /= max;
            }
        } else {
            chroma = [0.0; N_CHROMA];
        }
        chroma
    }
}
