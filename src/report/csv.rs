//! CSV report, one row per file

use crate::analyzer::heuristics::Signal;
use crate::analyzer::AnalysisResult;
use std::io::{self, Write};

const HEADER: &str = "file_path,file_name,verdict,confidence,aggregate_score,\
consistency,prosody,energy,bandwidth,tempo_bpm,sample_rate,duration_secs,language,explanation,error";

/// Quote a field when it contains a delimiter, quote or newline
fn escape(field: &str) -> String {
    if field.contains(&[',', '"', '\n', '\r'][..]) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn score_cell(result: &AnalysisResult, signal: Signal) -> String {
    result
        .score(signal)
        .map(|v| format!("{:.4}", v))
        .unwrap_or_default()
}

pub fn write<W: Write>(writer: &mut W, results: &[AnalysisResult]) -> io::Result<()> {
    writeln!(writer, "{}", HEADER)?;

    for r in results {
        writeln!(
            writer,
            "{},{},{},{:.4},{:.4},{},{},{},{},{:.1},{},{:.3},{},{},{}",
            escape(&r.file_path),
            escape(&r.file_name),
            r.verdict,
            r.confidence,
            r.aggregate_score,
            score_cell(r, Signal::Consistency),
            score_cell(r, Signal::Prosody),
            score_cell(r, Signal::Energy),
            score_cell(r, Signal::Bandwidth),
            r.tempo_bpm,
            r.sample_rate,
            r.duration_secs,
            escape(&r.language),
            escape(&r.explanation),
            escape(r.error.as_deref().unwrap_or("")),
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::Verdict;
    use crate::report::tests::create_test_result;

    #[test]
    fn test_escape() {
        assert_eq!(escape("plain"), "plain");
        assert_eq!(escape("a,b"), "\"a,b\"");
        assert_eq!(escape("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_rows() {
        let mut failed = create_test_result(Verdict::Error);
        failed.scores.clear();
        failed.error = Some("Corrupt audio: no samples".to_string());

        let mut out = Vec::new();
        write(&mut out, &[create_test_result(Verdict::AiGenerated), failed]).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], HEADER);
        assert!(lines[1].starts_with("/clips/sample.wav,sample.wav,AI_GENERATED,0.8000,0.9000,0.9000,"));
        // Explanation contains a comma, so it is quoted
        assert!(lines[1].contains("\"Analysis suggests ai generated voice with high confidence: flat, monotone pitch contour\""));
        assert!(lines[2].contains("ERROR,"));
        assert!(lines[2].ends_with(",Corrupt audio: no samples"));
        assert!(lines[2].contains(",,,,"), "missing scores leave empty cells");
    }
}
