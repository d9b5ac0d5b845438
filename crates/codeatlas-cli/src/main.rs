//! CodeAtlas CLI - deterministic code map generation
//!
//! # Usage
//!
//! ```bash
//! # Analyze a repository and write the code map
//! codeatlas analyze ./my-repo -o codemap.json
//!
//! # Print the supported language table
//! codeatlas languages
//! ```

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use codeatlas_config::{ConfigLoader, ConfigOverrides};
use codeatlas_core::{Language, Pipeline};

/// CodeAtlas - code map generation and analysis
#[derive(Parser, Debug)]
#[command(name = "codeatlas")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOptions,
}

/// Global options available to all commands
#[derive(Args, Debug, Clone)]
struct GlobalOptions {
    /// Path to configuration file directory
    #[arg(long, short = 'c', global = true, env = "CODEATLAS_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyze a repository and emit its code map
    Analyze(AnalyzeArgs),

    /// Print the supported extension table
    Languages,
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// Project root to analyze
    #[arg(default_value = ".")]
    root: PathBuf,

    /// Output file (stdout when omitted)
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// Cap on analyzed files
    #[arg(long)]
    max_files: Option<usize>,

    /// Per-file size cap in kilobytes
    #[arg(long)]
    max_file_size_kb: Option<u64>,

    /// Worker count (clamped to [1, 32])
    #[arg(long, short = 'j')]
    concurrency: Option<usize>,

    /// Analyze exactly these files, bypassing discovery
    #[arg(long)]
    only: Vec<PathBuf>,

    /// Fail on parse errors after the pipeline completes
    #[arg(long)]
    strict: bool,

    /// Print discovery limits and per-language counts
    #[arg(long)]
    diagnostics: bool,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.global);

    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {:#}", error);
            1
        }
    };
    std::process::exit(exit_code);
}

fn init_tracing(global: &GlobalOptions) {
    let level = if global.verbose {
        Level::DEBUG
    } else if global.quiet {
        Level::ERROR
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Analyze(args) => analyze(args, &cli.global),
        Commands::Languages => {
            languages();
            Ok(0)
        }
    }
}

fn analyze(args: AnalyzeArgs, global: &GlobalOptions) -> Result<i32> {
    let overrides = ConfigOverrides {
        max_files: args.max_files,
        max_file_size_kb: args.max_file_size_kb,
        concurrency: args.concurrency,
        only_files: if args.only.is_empty() {
            None
        } else {
            Some(args.only.clone())
        },
        strict: args.strict.then_some(true),
        diagnostics: args.diagnostics.then_some(true),
        ..ConfigOverrides::default()
    };

    let loader = match &global.config {
        Some(dir) => ConfigLoader::with_global_dir(dir),
        None => ConfigLoader::new(),
    };
    let config = loader
        .load(&args.root, Some(&overrides))
        .context("loading configuration")?;
    let strict = config.strict.unwrap_or(false);

    let pipeline = Pipeline::new(config.to_analysis_options());
    let report = pipeline
        .run(&args.root)
        .with_context(|| format!("analyzing {}", args.root.display()))?;

    match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("creating {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, &report.map)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
            tracing::info!("wrote {}", path.display());
        }
        None => {
            let stdout = std::io::stdout();
            let mut writer = BufWriter::new(stdout.lock());
            serde_json::to_writer_pretty(&mut writer, &report.map)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }
    }

    if strict && !report.parse_errors.is_empty() {
        for error in &report.parse_errors {
            tracing::error!("parse error: {}", error);
        }
        return Ok(1);
    }
    Ok(0)
}

fn languages() {
    println!("{:<12} {}", "EXTENSION", "LANGUAGE");
    for ext in Language::all_extensions() {
        if let Some(language) = Language::from_extension(ext) {
            println!(".{:<11} {}", ext, language);
        }
    }
    println!("{:<12} {}", "Dockerfile*", Language::Dockerfile);
}
