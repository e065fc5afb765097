//! voicecheck - Tell synthetic voices from human ones
//!
//! voicecheck classifies a speech recording as `AI Generated` or `Human`
//! using deterministic acoustic heuristics. There is no trained model: the
//! same bytes always give the same answer, and every answer comes with the
//! reasons behind it.
//!
//! # Overview
//!
//! Text-to-speech output tends to be *too steady*. Its spectrum barely moves
//! from frame to frame, its pitch contour is flat, its loudness is even and
//! its energy sits in a narrow band. Human speech wanders in all four. Each
//! of those tendencies becomes one scored signal.
//!
//! # Detection Signals
//!
//! 1. **Consistency**: variation of spectral centroid and bandwidth
//! 2. **Prosody**: variation of the pitch contour over voiced frames
//! 3. **Energy**: variation of per-frame RMS
//! 4. **Bandwidth**: variance of spectral bandwidth
//!
//! # Quick Start
//!
//! ```no_run
//! use voicecheck::{Analyzer, Classification};
//!
//! let analyzer = Analyzer::new();
//! let bytes = std::fs::read("clip.wav").unwrap();
//! let result = analyzer.classify(&bytes, Some("wav"), None).unwrap();
//!
//! match result.classification {
//!     Classification::AiGenerated => println!("Sounds synthetic"),
//!     Classification::Human => println!("Sounds human"),
//! }
//!
//! println!("Confidence: {:.2}", result.confidence);
//! println!("{}", result.explanation);
//! ```
//!
//! # Scoring System
//!
//! Each signal lands in [0, 1], higher meaning more synthetic. They are
//! combined with weights 0.3 / 0.3 / 0.2 / 0.2:
//!
//! | Aggregate | Label | Confidence |
//! |-----------|-------|------------|
//! | > 0.5 | AI Generated | 2·(a − 0.5) |
//! | ≤ 0.5 | Human | 2·(0.5 − a) |
//!
//! # Modules
//!
//! - [`analyzer`]: decoding, feature extraction, heuristics and the decision
//! - [`acquire`]: bounded URL downloads and base64 payloads
//! - [`serve`]: HTTP detection service
//! - [`report`]: Output formatters (JSON, CSV)

pub mod acquire;
pub mod analyzer;
pub mod config;
pub mod error;
pub mod report;
pub mod serve;

pub use analyzer::aggregate::Classification;
pub use analyzer::{Analysis, AnalysisResult, Analyzer, ClassificationResult, Verdict};
pub use config::Config;
pub use error::{AcquisitionError, DetectError};
