//! Per-frame feature dump for investigating a classification

use std::env;
use std::fs;
use voicecheck::Analyzer;

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: voicecheck-frames <file1> [file2]");
        std::process::exit(1);
    }

    let mut failed = false;
    for path in &args[1..] {
        println!("\n{}", "=".repeat(60));
        println!("FILE: {}", path);
        println!("{}", "=".repeat(60));
        if let Err(e) = dump_file(path) {
            eprintln!("Failed: {}", e);
            failed = true;
        }
    }

    if failed {
        std::process::exit(1);
    }
}

fn dump_file(path: &str) -> Result<(), String> {
    let data = fs::read(path).map_err(|e| format!("failed to read {}: {}", path, e))?;
    let analyzer = Analyzer::new();
    let matrix = analyzer.features(&data, None).map_err(|e| e.to_string())?;

    println!("Sample rate: {} Hz", matrix.sample_rate);
    println!("Duration: {:.2} s", matrix.duration_secs);
    println!("Frames: {} (hop {} samples)", matrix.len(), matrix.hop_size);
    println!("Tempo: {:.1} BPM", matrix.tempo_bpm);

    println!(
        "\n{:>8} {:>9} {:>9} {:>9} {:>6} {:>7} {:>8} {:>8}",
        "time", "centroid", "rolloff", "bandw", "zcr", "rms", "pitch", "mfcc0"
    );
    println!("{}", "-".repeat(72));
    for (i, f) in matrix.frames.iter().enumerate() {
        println!(
            "{:>7.2}s {:>9.1} {:>9.1} {:>9.1} {:>6.3} {:>7.4} {:>8.1} {:>8.2}",
            matrix.frame_time(i),
            f.centroid_hz,
            f.rolloff_hz,
            f.bandwidth_hz,
            f.zero_crossing_rate,
            f.rms,
            f.pitch_hz,
            f.mfcc[0]
        );
    }

    let analysis = analyzer.analyze_matrix(&matrix, None);

    println!("\n=== Heuristics ===");
    for score in &analysis.scores {
        println!("{:<12} {:.3}  {}", score.signal, score.value, score.rationale);
    }

    let result = &analysis.result;
    println!(
        "\n{} (aggregate {:.3}, confidence {:.2})",
        result.classification, analysis.aggregate, result.confidence
    );
    println!("{}", result.explanation);

    Ok(())
}
