//! End-to-end classification scenarios on synthesized recordings

mod common;

use common::{switching_noise, tone, wav_bytes, SAMPLE_RATE};
use voicecheck::analyzer::decode::{self, AudioFormat};
use voicecheck::analyzer::heuristics::Signal;
use voicecheck::config::Limits;
use voicecheck::{Analyzer, Classification, Config, DetectError};

/// 57 frames of MPEG-1 Layer III, mono, 44.1 kHz, 64 kbps: a steady ~230 Hz tone
const TONE_MP3: &[u8] = include_bytes!("fixtures/tone_230hz.mp3");

fn score(analysis: &voicecheck::Analysis, signal: Signal) -> f64 {
    analysis
        .scores
        .iter()
        .find(|s| s.signal == signal)
        .map(|s| s.value)
        .unwrap()
}

// ==========================================================================
// SYNTHETIC VS NATURAL
// ==========================================================================
//
// A sustained tone holds every feature still and must read as synthetic.
// Noise that keeps switching band and level moves every feature and must
// read as human.
// ==========================================================================

#[test]
fn test_sustained_tone_is_ai_generated() {
    let wav = wav_bytes(&tone(220.0, 3.0, 0.5), SAMPLE_RATE);
    let analysis = Analyzer::new().analyze_bytes(&wav, Some("wav"), None).unwrap();

    assert_eq!(analysis.result.classification, Classification::AiGenerated);
    assert!(analysis.result.confidence > 0.7, "confidence {}", analysis.result.confidence);
    assert!(score(&analysis, Signal::Consistency) > 0.8, "consistency {}", score(&analysis, Signal::Consistency));
    assert!(score(&analysis, Signal::Bandwidth) > 0.8, "bandwidth {}", score(&analysis, Signal::Bandwidth));
    assert!(analysis.result.explanation.contains("highly consistent spectral properties"));
}

#[test]
fn test_switching_noise_is_human() {
    let wav = wav_bytes(&switching_noise(3.0, 7), SAMPLE_RATE);
    let analysis = Analyzer::new().analyze_bytes(&wav, None, None).unwrap();

    assert_eq!(analysis.result.classification, Classification::Human);
    assert!(score(&analysis, Signal::Consistency) < 0.3, "consistency {}", score(&analysis, Signal::Consistency));
    assert!(score(&analysis, Signal::Prosody) < 0.3, "prosody {}", score(&analysis, Signal::Prosody));
    assert!(analysis.aggregate < 0.5);
}

// ==========================================================================
// MP3 INPUT
// ==========================================================================

#[test]
fn test_mp3_is_sniffed_without_declaration() {
    assert_eq!(AudioFormat::resolve(None, TONE_MP3).unwrap(), AudioFormat::Mp3);
}

#[test]
fn test_mp3_decodes_at_stream_rate() {
    let signal = decode::decode(TONE_MP3, AudioFormat::Mp3, &Limits::default()).unwrap();
    let expected = 57.0 * 1152.0 / 44_100.0;

    assert_eq!(signal.sample_rate, 44_100);
    assert!(
        (signal.duration_secs() - expected).abs() < 0.1,
        "duration {} vs {}",
        signal.duration_secs(),
        expected
    );
    let peak = signal.samples.iter().fold(0.0f64, |m, s| m.max(s.abs()));
    assert!(peak > 0.05, "decoded mp3 is silent (peak {})", peak);
}

#[test]
fn test_mp3_tone_is_ai_generated() {
    let analysis = Analyzer::new().analyze_bytes(TONE_MP3, None, None).unwrap();

    assert_eq!(analysis.sample_rate, 44_100);
    assert_eq!(analysis.result.classification, Classification::AiGenerated);
    assert!(analysis.aggregate > 0.5, "aggregate {}", analysis.aggregate);
}

// ==========================================================================
// DETERMINISM AND BOUNDS
// ==========================================================================

#[test]
fn test_identical_bytes_identical_results() {
    let wav = wav_bytes(&switching_noise(2.0, 42), SAMPLE_RATE);
    let analyzer = Analyzer::new();

    let first = analyzer.analyze_bytes(&wav, None, None).unwrap();
    for _ in 0..3 {
        let again = analyzer.analyze_bytes(&wav, None, None).unwrap();
        assert_eq!(again.result, first.result);
        assert_eq!(again.aggregate.to_bits(), first.aggregate.to_bits());
        for (a, b) in again.scores.iter().zip(&first.scores) {
            assert_eq!(a.value.to_bits(), b.value.to_bits(), "{} differs between runs", a.signal);
        }
    }
}

#[test]
fn test_scores_bounded_for_degenerate_inputs() {
    let silence = vec![0.0; SAMPLE_RATE as usize * 2];
    let clipped: Vec<f64> = tone(150.0, 2.0, 4.0).iter().map(|s| s.clamp(-1.0, 1.0)).collect();
    let noise = switching_noise(2.0, 3);

    for (name, samples) in [("silence", silence), ("clipped", clipped), ("noise", noise)] {
        let analysis = Analyzer::new()
            .analyze_bytes(&wav_bytes(&samples, SAMPLE_RATE), None, None)
            .unwrap();
        for s in &analysis.scores {
            assert!((0.0..=1.0).contains(&s.value), "{}: {} = {}", name, s.signal, s.value);
        }
        assert!((0.0..=1.0).contains(&analysis.aggregate), "{}: aggregate {}", name, analysis.aggregate);
        assert!((0.0..=1.0).contains(&analysis.result.confidence), "{}: confidence", name);
    }
}

#[test]
fn test_silence_sits_on_the_boundary() {
    let wav = wav_bytes(&vec![0.0; SAMPLE_RATE as usize], SAMPLE_RATE);
    let result = Analyzer::new().classify(&wav, None, None).unwrap();

    assert_eq!(result.classification, Classification::Human);
    assert_eq!(result.confidence, 0.0);
    assert!(result.explanation.contains("low confidence"));
}

// ==========================================================================
// REJECTED INPUT
// ==========================================================================

#[test]
fn test_short_audio_is_insufficient() {
    let wav = wav_bytes(&tone(220.0, 0.2, 0.5), SAMPLE_RATE);
    match Analyzer::new().classify(&wav, None, None) {
        Err(DetectError::InsufficientAudio { duration_secs, min_secs }) => {
            assert!(duration_secs < min_secs);
        }
        other => panic!("expected InsufficientAudio, got {:?}", other),
    }
}

#[test]
fn test_minimum_duration_is_configurable() {
    let wav = wav_bytes(&tone(220.0, 0.3, 0.5), SAMPLE_RATE);
    let analyzer = Analyzer::with_config(Config::new().with_min_duration(0.25));
    assert!(analyzer.classify(&wav, None, None).is_ok());
}

#[test]
fn test_garbage_bytes_rejected() {
    let err = Analyzer::new().classify(b"definitely not audio", None, None).unwrap_err();
    assert_eq!(err.status_code(), 400);
}
