use chrono::Local;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;
use voicecheck::analyzer::heuristics::Signal;
use voicecheck::report::Summary;
use voicecheck::{AnalysisResult, Analyzer, Config, Verdict};
use walkdir::WalkDir;

#[derive(Parser, Debug)]
#[command(name = "voicecheck")]
#[command(author, version, about = "Classify speech recordings as AI generated or human")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// WAV/MP3 file or directory to analyze
    path: Option<PathBuf>,

    /// Output report file (.csv, .json)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Directory for auto-generated reports
    #[arg(long, default_value = "voicecheck-reports")]
    report_dir: PathBuf,

    /// Don't auto-generate CSV report
    #[arg(long)]
    no_report: bool,

    /// Number of parallel workers (default: number of CPUs)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Minimum analyzable duration in seconds
    #[arg(long, default_value = "0.5")]
    min_duration: f64,

    /// Show per-signal scores and debug logs
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only show summary and warnings
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP detection service
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8000")]
        port: u16,

        /// Interface to bind
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// Require this value in the x-api-key header
        #[arg(long, env = "VOICECHECK_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// Download cap for audio URLs and base64 payloads, in MiB
        #[arg(long, default_value = "50")]
        max_download_mb: u64,

        /// Timeout for fetching audio URLs, in seconds
        #[arg(long, default_value = "30")]
        fetch_timeout: u64,

        /// Minimum analyzable duration in seconds
        #[arg(long, default_value = "0.5")]
        min_duration: f64,
    },
}

fn init_logging(verbose: bool, quiet: bool, default: Level) {
    let level = if verbose {
        Level::DEBUG
    } else if quiet {
        Level::WARN
    } else {
        default
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let args = Args::parse();

    if let Some(Command::Serve {
        port,
        host,
        api_key,
        max_download_mb,
        fetch_timeout,
        min_duration,
    }) = args.command
    {
        init_logging(args.verbose, args.quiet, Level::INFO);

        let config = Config::new()
            .with_api_key(api_key)
            .with_max_download_bytes(max_download_mb.saturating_mul(1024 * 1024))
            .with_fetch_timeout(Duration::from_secs(fetch_timeout))
            .with_min_duration(min_duration);

        if let Err(e) = voicecheck::serve::start(&host, port, config) {
            eprintln!("Server error: {}", e);
            std::process::exit(1);
        }
        return;
    }

    // Per-file outcomes are printed as a table, so logs stay at warn unless asked
    init_logging(args.verbose, args.quiet, Level::WARN);

    let path = if let Some(p) = args.path.clone() {
        p
    } else {
        eprintln!("Usage: voicecheck <PATH>");
        eprintln!("       voicecheck serve [--port 8000]");
        eprintln!("Run 'voicecheck --help' for more options.");
        std::process::exit(1);
    };

    // Set up thread pool
    if let Some(jobs) = args.jobs {
        rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build_global()
            .ok();
    }

    let supported_extensions = ["wav", "wave", "mp3"];

    // Collect audio files
    let files: Vec<PathBuf> = if path.is_dir() {
        WalkDir::new(&path)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| supported_extensions.contains(&ext.to_ascii_lowercase().as_str()))
                    .unwrap_or(false)
            })
            .map(|e| e.path().to_path_buf())
            .collect()
    } else {
        vec![path.clone()]
    };

    if files.is_empty() {
        eprintln!("No audio files found (supported: wav, mp3)");
        std::process::exit(1);
    }

    if !args.quiet {
        eprintln!("\x1b[1mvoicecheck - Synthetic Voice Detector\x1b[0m");
        eprintln!("{}", "─".repeat(70));
        eprintln!("Found {} audio file(s)\n", files.len());
    }

    // Set up progress bar
    let pb = if !args.quiet && files.len() > 1 {
        let pb = ProgressBar::new(files.len() as u64);
        if let Ok(style) = ProgressStyle::default_bar().template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}") {
            pb.set_style(style.progress_chars("=>-"));
        }
        Some(pb)
    } else {
        None
    };

    let analyzer = Analyzer::with_config(Config::new().with_min_duration(args.min_duration));

    // Analyze files in parallel
    let results: Vec<AnalysisResult> = files
        .par_iter()
        .map(|path| {
            let result = analyzer.analyze(path);
            if let Some(ref pb) = pb {
                pb.inc(1);
                pb.set_message(result.file_name.clone());
            }
            result
        })
        .collect();

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    // Print results
    if !args.quiet {
        for r in &results {
            print_result(r, args.verbose);
        }
    }

    let summary = Summary::from_results(&results);

    if !args.quiet {
        eprintln!("\n{}", "─".repeat(70));
        eprintln!("\x1b[1mSummary:\x1b[0m");
        eprintln!("  \x1b[32m✓ Human:\x1b[0m        {}", summary.human);
        eprintln!("  \x1b[31m✗ AI Generated:\x1b[0m {}", summary.ai_generated);
        if summary.error > 0 {
            eprintln!("  \x1b[90mErrors:\x1b[0m         {}", summary.error);
        }
    }

    // Determine report path
    let report_path = if let Some(ref output) = args.output {
        Some(output.clone())
    } else if !args.no_report {
        std::fs::create_dir_all(&args.report_dir).ok();
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let filename = format!("voicecheck_report_{}.csv", timestamp);
        Some(args.report_dir.join(filename))
    } else {
        None
    };

    if let Some(ref output_path) = report_path {
        if let Err(e) = voicecheck::report::generate(output_path, &results) {
            eprintln!("Failed to write report: {}", e);
            std::process::exit(1);
        }
        if !args.quiet {
            eprintln!("\n\x1b[32mReport saved: {}\x1b[0m", output_path.display());
        }
    }

    if !args.quiet {
        eprintln!("\n\x1b[90mAnalysis complete.\x1b[0m");
    }

    // Exit with appropriate code
    if summary.ai_generated > 0 {
        std::process::exit(2);
    } else if summary.error > 0 {
        std::process::exit(1);
    }
}

fn print_result(r: &AnalysisResult, verbose: bool) {
    let color = match r.verdict {
        Verdict::Human => "\x1b[32m",       // Green
        Verdict::AiGenerated => "\x1b[31m", // Red
        Verdict::Error => "\x1b[90m",       // Gray
    };
    let reset = "\x1b[0m";

    let detail = match &r.error {
        Some(err) => err.clone(),
        None => r.language.clone(),
    };

    println!(
        "{}{:<14}{} {:>4.0}%  {:>5.1}s  {:<30}  {}",
        color,
        format!("[{}]", r.verdict),
        reset,
        r.confidence * 100.0,
        r.duration_secs,
        truncate(&detail, 30),
        &r.file_name
    );

    if verbose && r.error.is_none() {
        let scores: Vec<String> = Signal::ALL
            .iter()
            .map(|&s| format!("{}={:.3}", s, r.score(s).unwrap_or(f64::NAN)))
            .collect();
        eprintln!("    Scores: {} | aggregate={:.3}", scores.join(" "), r.aggregate_score);
        eprintln!("    Tempo: {:.1} BPM | {} Hz", r.tempo_bpm, r.sample_rate);
        eprintln!("    {}", r.explanation);
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
