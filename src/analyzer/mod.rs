//! Detection pipeline
//!
//! ```text
//! bytes ─► decode ─► features ─► heuristics ─► aggregate ─► label/confidence
//!                                    │                            │
//!                                    └──────► explanation ◄───────┘
//! ```
//!
//! [`Analyzer`] is stateless between calls: the same bytes always produce the
//! same [`ClassificationResult`]. Two entry points exist: [`Analyzer::classify`]
//! for in-memory payloads (the HTTP service) and [`Analyzer::analyze`] for files
//! on disk (the batch CLI), which folds failures into [`Verdict::Error`] instead
//! of returning them.

pub mod aggregate;
pub mod decode;
pub mod explain;
pub mod features;
pub mod heuristics;
pub mod language;
pub mod spectral;

use crate::config::Config;
use crate::error::DetectError;
use aggregate::{Classification, ScoreAggregator};
use decode::AudioFormat;
use explain::ExplanationBuilder;
use features::FeatureMatrix;
use heuristics::HeuristicScore;
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// What a caller of the detection service receives
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    pub classification: Classification,
    pub confidence: f64,
    pub language: String,
    pub explanation: String,
}

/// Full pipeline output, including intermediate scores
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub result: ClassificationResult,
    pub scores: Vec<HeuristicScore>,
    pub aggregate: f64,
    pub sample_rate: u32,
    pub duration_secs: f64,
    pub frame_count: usize,
    pub tempo_bpm: f64,
}

/// Per-file verdict for batch runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Verdict {
    #[serde(rename = "AI_GENERATED")]
    AiGenerated,
    #[serde(rename = "HUMAN")]
    Human,
    #[serde(rename = "ERROR")]
    Error,
}

impl From<Classification> for Verdict {
    fn from(c: Classification) -> Self {
        match c {
            Classification::AiGenerated => Verdict::AiGenerated,
            Classification::Human => Verdict::Human,
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::AiGenerated => write!(f, "AI_GENERATED"),
            Verdict::Human => write!(f, "HUMAN"),
            Verdict::Error => write!(f, "ERROR"),
        }
    }
}

/// Result row for one file on disk
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub file_path: String,
    pub file_name: String,
    pub sample_rate: u32,
    pub duration_secs: f64,
    pub verdict: Verdict,
    pub confidence: f64,
    pub aggregate_score: f64,
    pub scores: Vec<HeuristicScore>,
    pub tempo_bpm: f64,
    pub language: String,
    pub explanation: String,
    pub error: Option<String>,
}

impl AnalysisResult {
    fn failed(file_path: String, file_name: String, error: &DetectError) -> Self {
        Self {
            file_path,
            file_name,
            sample_rate: 0,
            duration_secs: 0.0,
            verdict: Verdict::Error,
            confidence: 0.0,
            aggregate_score: 0.0,
            scores: vec![],
            tempo_bpm: 0.0,
            language: String::new(),
            explanation: String::new(),
            error: Some(error.to_string()),
        }
    }

    /// Score of one signal, if it was computed
    pub fn score(&self, signal: heuristics::Signal) -> Option<f64> {
        self.scores.iter().find(|s| s.signal == signal).map(|s| s.value)
    }
}

pub struct Analyzer {
    config: Config,
    aggregator: ScoreAggregator,
    explainer: ExplanationBuilder,
}

impl Analyzer {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        if let Err(e) = config.frames.validate() {
            warn!(error = %e, "frame configuration is invalid; every analysis will fail");
        }
        Self {
            aggregator: ScoreAggregator::new(config.scoring.weights),
            explainer: ExplanationBuilder::new(config.scoring.trigger_threshold),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Decode and extract the per-frame feature matrix
    pub fn features(&self, data: &[u8], format: Option<&str>) -> Result<FeatureMatrix, DetectError> {
        let format = AudioFormat::resolve(format, data)?;
        let signal = decode::decode(data, format, &self.config.limits)?;
        features::extract(&signal, &self.config.frames)
    }

    /// Run the whole pipeline on an in-memory payload
    pub fn analyze_bytes(
        &self,
        data: &[u8],
        format: Option<&str>,
        declared_language: Option<&str>,
    ) -> Result<Analysis, DetectError> {
        let matrix = self.features(data, format)?;
        Ok(self.analyze_matrix(&matrix, declared_language))
    }

    /// Score, label and explain an already extracted feature matrix
    pub fn analyze_matrix(&self, matrix: &FeatureMatrix, declared_language: Option<&str>) -> Analysis {
        let scores = heuristics::score_all(matrix, &self.config.scoring);
        for s in &scores {
            debug!(signal = s.signal.name(), value = s.value, rationale = %s.rationale, "heuristic");
        }

        let decision = self.aggregator.decide(&scores);
        let explanation = self.explainer.build(&scores, &decision);
        let language = language::guess(matrix, declared_language, self.config.scoring.silence_rms);

        info!(
            classification = %decision.classification,
            confidence = decision.confidence,
            aggregate = decision.aggregate,
            duration_secs = matrix.duration_secs,
            frames = matrix.len(),
            "classified audio"
        );

        Analysis {
            result: ClassificationResult {
                classification: decision.classification,
                confidence: decision.confidence,
                language,
                explanation,
            },
            scores,
            aggregate: decision.aggregate,
            sample_rate: matrix.sample_rate,
            duration_secs: matrix.duration_secs,
            frame_count: matrix.len(),
            tempo_bpm: matrix.tempo_bpm,
        }
    }

    /// Classify an in-memory payload
    pub fn classify(
        &self,
        data: &[u8],
        format: Option<&str>,
        declared_language: Option<&str>,
    ) -> Result<ClassificationResult, DetectError> {
        self.analyze_bytes(data, format, declared_language).map(|a| a.result)
    }

    /// Analyze a file on disk; failures become [`Verdict::Error`]
    pub fn analyze<P: AsRef<Path>>(&self, path: P) -> AnalysisResult {
        let path = path.as_ref();
        let file_path = path.display().to_string();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let data = match fs::read(path) {
            Ok(d) => d,
            Err(e) => {
                let err = DetectError::Processing { reason: format!("failed to read file: {}", e) };
                warn!(file = %file_path, error = %err, "analysis failed");
                return AnalysisResult::failed(file_path, file_name, &err);
            }
        };

        // An unknown extension falls back to sniffing the content
        let declared = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(AudioFormat::parse)
            .map(|f| f.extension());

        match self.analyze_bytes(&data, declared, None) {
            Ok(analysis) => AnalysisResult {
                file_path,
                file_name,
                sample_rate: analysis.sample_rate,
                duration_secs: analysis.duration_secs,
                verdict: analysis.result.classification.into(),
                confidence: analysis.result.confidence,
                aggregate_score: analysis.aggregate,
                scores: analysis.scores,
                tempo_bpm: analysis.tempo_bpm,
                language: analysis.result.language,
                explanation: analysis.result.explanation,
                error: None,
            },
            Err(err) => {
                warn!(file = %file_path, error = %err, "analysis failed");
                AnalysisResult::failed(file_path, file_name, &err)
            }
        }
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use decode::tests::wav_bytes;
    use heuristics::Signal;

    fn tone(freq: f64, secs: f64, sample_rate: u32) -> Vec<f64> {
        let n = (secs * sample_rate as f64) as usize;
        (0..n)
            .map(|i| 0.5 * (2.0 * std::f64::consts::PI * freq * i as f64 / sample_rate as f64).sin())
            .collect()
    }

    // ==========================================================================
    // END-TO-END CLASSIFICATION
    // ==========================================================================
    //
    // A pure sustained tone is the most "synthetic" input there is: constant
    // spectrum, constant pitch, constant energy. It must land on the AI side
    // with high confidence.
    // ==========================================================================

    #[test]
    fn test_steady_tone_is_ai() {
        let wav = wav_bytes(&tone(220.0, 2.0, 16000), 16000, 1);
        let analysis = Analyzer::new().analyze_bytes(&wav, Some("wav"), None).unwrap();

        assert_eq!(analysis.result.classification, Classification::AiGenerated);
        assert!(analysis.result.confidence > 0.7, "confidence {}", analysis.result.confidence);
        assert!(analysis.result.explanation.starts_with("Analysis suggests ai generated voice"));
        assert_eq!(analysis.scores.len(), 4);
        assert_eq!(analysis.sample_rate, 16000);
    }

    #[test]
    fn test_silence_is_human_with_zero_confidence() {
        let wav = wav_bytes(&vec![0.0; 16000], 16000, 1);
        let result = Analyzer::new().classify(&wav, None, None).unwrap();

        assert_eq!(result.classification, Classification::Human);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.language, language::UNKNOWN_LANGUAGE);
    }

    #[test]
    fn test_declared_language_echoed() {
        let wav = wav_bytes(&tone(220.0, 1.0, 16000), 16000, 1);
        let result = Analyzer::new().classify(&wav, None, Some("Hindi")).unwrap();
        assert_eq!(result.language, "Hindi");
    }

    #[test]
    fn test_matrix_analysis_matches_byte_analysis() {
        let wav = wav_bytes(&tone(220.0, 1.5, 16000), 16000, 1);
        let analyzer = Analyzer::new();

        let matrix = analyzer.features(&wav, None).unwrap();
        let from_matrix = analyzer.analyze_matrix(&matrix, None);
        let from_bytes = analyzer.analyze_bytes(&wav, None, None).unwrap();

        assert_eq!(from_matrix.result, from_bytes.result);
        assert_eq!(from_matrix.aggregate.to_bits(), from_bytes.aggregate.to_bits());
        assert_eq!(from_matrix.frame_count, matrix.len());
        assert_eq!(from_matrix.sample_rate, 16000);
        assert!((from_matrix.duration_secs - 1.5).abs() < 1e-9, "duration {}", from_matrix.duration_secs);
    }

    #[test]
    fn test_invalid_frame_config_fails_without_panicking() {
        let mut config = Config::new();
        config.frames.frame_size = 0;
        let analyzer = Analyzer::with_config(config);

        let wav = wav_bytes(&tone(220.0, 1.0, 16000), 16000, 1);
        let err = analyzer.classify(&wav, None, None).unwrap_err();
        assert!(matches!(err, DetectError::Processing { .. }), "got {:?}", err);
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn test_deterministic() {
        let wav = wav_bytes(&tone(180.0, 1.5, 22050), 22050, 1);
        let analyzer = Analyzer::new();
        let a = analyzer.classify(&wav, None, None).unwrap();
        let b = analyzer.classify(&wav, None, None).unwrap();
        assert_eq!(a, b);
    }

    // ==========================================================================
    // ERRORS
    // ==========================================================================

    #[test]
    fn test_too_short() {
        let wav = wav_bytes(&tone(220.0, 0.1, 16000), 16000, 1);
        let err = Analyzer::new().classify(&wav, None, None).unwrap_err();
        assert!(matches!(err, DetectError::InsufficientAudio { .. }), "got {:?}", err);
    }

    #[test]
    fn test_unsupported_declared_format() {
        let wav = wav_bytes(&tone(220.0, 1.0, 16000), 16000, 1);
        let err = Analyzer::new().classify(&wav, Some("flac"), None).unwrap_err();
        assert!(matches!(err, DetectError::UnsupportedFormat { .. }));
    }

    // ==========================================================================
    // FILES ON DISK
    // ==========================================================================

    #[test]
    fn test_analyze_file() {
        let dir = std::env::temp_dir().join(format!("voicecheck-analyze-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("tone.wav");
        std::fs::write(&path, wav_bytes(&tone(220.0, 1.0, 16000), 16000, 1)).unwrap();

        let result = Analyzer::new().analyze(&path);
        assert_eq!(result.verdict, Verdict::AiGenerated);
        assert_eq!(result.file_name, "tone.wav");
        assert!(result.error.is_none());
        assert!(result.score(Signal::Consistency).unwrap() > 0.5);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_analyze_missing_file_is_error_verdict() {
        let result = Analyzer::new().analyze("/nonexistent/voice.wav");
        assert_eq!(result.verdict, Verdict::Error);
        assert!(result.error.is_some());
        assert_eq!(result.file_name, "voice.wav");
    }

    #[test]
    fn test_verdict_display() {
        assert_eq!(Verdict::AiGenerated.to_string(), "AI_GENERATED");
        assert_eq!(Verdict::Human.to_string(), "HUMAN");
        assert_eq!(Verdict::Error.to_string(), "ERROR");
    }
}
