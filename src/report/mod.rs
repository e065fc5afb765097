//! Report generation for batch results
//!
//! - **JSON**: machine-readable, includes per-signal rationales
//! - **CSV**: one row per file, one column per signal
//!
//! # Usage
//!
//! ```ignore
//! use voicecheck::report;
//!
//! // Format follows the extension; anything but .json is CSV
//! report::generate("voices.json", &results)?;
//! report::generate("voices.csv", &results)?;
//! ```

pub mod csv;
pub mod json;

use crate::analyzer::{AnalysisResult, Verdict};
use serde::Serialize;
use std::io;
use std::path::Path;

/// Generate a report in the appropriate format based on file extension
pub fn generate<P: AsRef<Path>>(path: P, results: &[AnalysisResult]) -> io::Result<()> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let mut file = std::fs::File::create(path)?;

    match ext.as_str() {
        "json" => json::write(&mut file, results),
        _ => csv::write(&mut file, results),
    }
}

/// Verdict counts for a batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub ai_generated: usize,
    pub human: usize,
    pub error: usize,
}

impl Summary {
    pub fn from_results(results: &[AnalysisResult]) -> Self {
        let mut summary = Self {
            total: results.len(),
            ..Self::default()
        };

        for r in results {
            match r.verdict {
                Verdict::AiGenerated => summary.ai_generated += 1,
                Verdict::Human => summary.human += 1,
                Verdict::Error => summary.error += 1,
            }
        }

        summary
    }
}
