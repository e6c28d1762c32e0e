use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

// Import from logchunk-core
use logchunk_core::processor::StepProfiler;
use logchunk_core::{ChunkingProfile, LogProcessor, ProfileKind, ProfileManager, ReportFormat};

// Import CLI utilities
use logchunk::summary::{print_report_summary, show_profiles};
use logchunk::SizeOverrides;

#[derive(Parser)]
#[command(name = "logchunk")]
#[command(about = "Split automation run logs into structure-aligned chunks with metadata and alerts")]
struct Args {
    /// Path to the log file to process
    #[arg(short, long, required_unless_present = "show_profiles")]
    input: Option<String>,

    /// Built-in profile: alert, context, or error
    #[arg(short, long, default_value = "context")]
    profile: String,

    /// Path to custom profile file (YAML format); replaces --profile
    #[arg(short, long)]
    config: Option<String>,

    /// Override the profile's max chunk size
    #[arg(long)]
    max_size: Option<usize>,

    /// Override the profile's min chunk size
    #[arg(long)]
    min_size: Option<usize>,

    /// Override the profile's overlap size
    #[arg(long)]
    overlap: Option<usize>,

    /// Output format: report, chunks, or flat
    #[arg(short = 'f', long, default_value = "report")]
    output_format: String,

    /// Output file path (if not specified, auto-generated based on input)
    #[arg(short, long)]
    output: Option<String>,

    /// Time each pipeline step
    #[arg(long)]
    timings: bool,

    /// Debug-level logging on stderr
    #[arg(short, long)]
    verbose: bool,

    /// Show available profiles and exit
    #[arg(long)]
    show_profiles: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::WARN };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    println!("🦀 Logchunk Log Segmenter");

    if args.show_profiles {
        show_profiles(&ProfileManager::new());
        return Ok(());
    }

    let Some(input) = args.input.as_deref() else {
        return Err(anyhow::anyhow!("--input is required"));
    };
    if !Path::new(input).exists() {
        eprintln!("❌ Input log not found at: {input}");
        std::process::exit(1);
    }

    let format: ReportFormat = args.output_format.parse()?;
    let mut profile = load_profile(&args)?;

    let overrides = SizeOverrides {
        max_size: args.max_size,
        min_size: args.min_size,
        overlap_size: args.overlap,
    };
    if !overrides.is_empty() {
        overrides.apply(&mut profile)?;
        println!(
            "🔧 Sizes: max={} min={} overlap={}",
            profile.chunking.max_size, profile.chunking.min_size, profile.chunking.overlap_size
        );
    }

    let processor = LogProcessor::new(profile)?;
    let mut profiler = StepProfiler::new(args.timings);

    println!("📄 Processing: {input}");
    match processor.process_file_with_profiling(input, &mut profiler) {
        Ok(report) => {
            println!("✅ Successfully segmented log");
            print_report_summary(&report);

            let output_path = match &args.output {
                Some(output) => output.clone(),
                None => {
                    let input_name = Path::new(input)
                        .file_stem()
                        .and_then(|s| s.to_str())
                        .unwrap_or("output");
                    format!("{input_name}_{}_logchunk.json", report.profile)
                }
            };

            report.save_with_format(&output_path, format)?;
            println!("💾 {format} format results saved to: {output_path}");
            profiler.print_summary();
        }
        Err(e) => {
            eprintln!("❌ Processing failed: {e:#}");
            std::process::exit(1);
        }
    }

    Ok(())
}

fn load_profile(args: &Args) -> Result<ChunkingProfile> {
    match &args.config {
        Some(path) => {
            let profile = ChunkingProfile::load_from_file(path)?;
            println!("📋 Loaded profile '{}' from: {path}", profile.name);
            Ok(profile)
        }
        None => {
            let kind: ProfileKind = args.profile.parse()?;
            println!("📋 Using built-in profile: {kind}");
            Ok(kind.profile())
        }
    }
}
