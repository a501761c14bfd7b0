//! Headless arena battle runner.
//!
//! # Usage
//!
//! ```bash
//! # Run one battle and stream its combat log as JSON lines on stdout
//! cargo run -p arena_headless -- run scenarios/skirmish.ron --seed 7 --events
//!
//! # Run a batch for balance statistics
//! cargo run -p arena_headless -- batch scenarios/skirmish.ron --count 1000 --output results/
//!
//! # Check that a seed replays identically
//! cargo run -p arena_headless -- verify scenarios/duel.ron --seed 12345 --runs 5
//!
//! # Write the built-in skirmish as a starting point
//! cargo run -p arena_headless -- template --output my_scenario.ron
//! ```
//!
//! Reports and events go to stdout; logs go to stderr.

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use arena_headless::{
    batch::{run_batch, verify_determinism, BatchConfig},
    runner::run_battle,
    scenario::Scenario,
};

#[derive(Parser)]
#[command(name = "arena_headless")]
#[command(about = "Headless tactical battle runner for tuning and CI")]
#[command(version)]
struct Cli {
    /// More logging on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single battle and print its report
    Run {
        /// Scenario file to load
        scenario: PathBuf,

        /// Random seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Stream every combat log record as a JSON line before the report
        #[arg(long)]
        events: bool,

        /// Override the scenario's tick limit
        #[arg(long)]
        max_ticks: Option<u64>,
    },

    /// Run a batch of battles for balance testing
    Batch {
        /// Scenario file to load
        scenario: PathBuf,

        /// Number of battles to run
        #[arg(short, long, default_value = "100")]
        count: u32,

        /// Starting random seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Worker threads (0 = auto)
        #[arg(short, long, default_value = "0")]
        parallel: usize,

        /// Output directory for results
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Verify determinism by running the same seed multiple times
    Verify {
        /// Scenario file to load
        scenario: PathBuf,

        /// Seed to verify
        #[arg(long, default_value = "12345")]
        seed: u64,

        /// Number of verification runs
        #[arg(short, long, default_value = "5")]
        runs: u32,
    },

    /// Write the built-in skirmish scenario as RON
    Template {
        /// Destination file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries reports and events.
    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .init();

    match cli.command {
        Commands::Run {
            scenario,
            seed,
            events,
            max_ticks,
        } => cmd_run(&scenario, seed, events, max_ticks),
        Commands::Batch {
            scenario,
            count,
            seed,
            parallel,
            output,
        } => cmd_batch(&scenario, count, seed, parallel, output),
        Commands::Verify {
            scenario,
            seed,
            runs,
        } => cmd_verify(&scenario, seed, runs),
        Commands::Template { output } => cmd_template(output),
    }
}

fn load_or_exit(path: &Path) -> Scenario {
    match Scenario::load(path) {
        Ok(scenario) => scenario,
        Err(e) => {
            tracing::error!(error = %e, path = %path.display(), "Failed to load scenario");
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Error: failed to encode output: {e}");
            std::process::exit(1);
        }
    }
}

/// Run one battle
fn cmd_run(path: &Path, seed: u64, events: bool, max_ticks: Option<u64>) {
    let mut scenario = load_or_exit(path);
    if let Some(limit) = max_ticks {
        scenario.max_ticks = limit;
    }
    tracing::info!(scenario = %scenario.name, seed, "Running battle");

    let stdout = std::io::stdout();
    let mut lock = stdout.lock();
    let stream: Option<&mut dyn Write> = if events { Some(&mut lock) } else { None };

    match run_battle(&scenario, seed, stream) {
        Ok(report) => {
            drop(lock);
            print_json(&report);
        }
        Err(e) => {
            tracing::error!(error = %e, "Battle failed");
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

/// Run a batch of battles
fn cmd_batch(path: &Path, count: u32, seed: u64, parallel: usize, output: Option<PathBuf>) {
    let scenario = load_or_exit(path);
    let config = BatchConfig {
        count,
        seed_start: seed,
        parallel,
    };

    let results = run_batch(&scenario, &config);
    let summary = &results.summary;

    eprintln!();
    eprintln!("=== Batch Complete: {} ===", results.scenario);
    eprintln!(
        "Battles: {} ({} failed) in {:.2}s",
        summary.total,
        results.errors.len(),
        results.duration_seconds
    );
    eprintln!(
        "Victories: {} ({:.1}%)  Defeats: {}  Timeouts: {}",
        summary.victories,
        summary.victory_rate * 100.0,
        summary.defeats,
        summary.timeouts
    );
    eprintln!("Mean battle length: {:.1} ticks", summary.mean_ticks);

    match output {
        Some(dir) => {
            let file = dir.join("batch_results.json");
            if let Err(e) = results.save(&file) {
                tracing::error!(error = %e, path = %file.display(), "Failed to save results");
                eprintln!("Error: cannot write '{}': {e}", file.display());
                std::process::exit(1);
            }
            eprintln!("Results saved to: {}", file.display());
        }
        None => print_json(&results.summary),
    }

    if !results.errors.is_empty() {
        std::process::exit(1);
    }
}

/// Verify determinism
fn cmd_verify(path: &Path, seed: u64, runs: u32) {
    let scenario = load_or_exit(path);
    tracing::info!(scenario = %scenario.name, seed, runs, "Verifying determinism");

    match verify_determinism(&scenario, seed, runs) {
        Ok(check) if check.identical => {
            println!(
                "PASS: {} runs of seed {seed} produced hash {:016x}",
                check.hashes.len(),
                check.hashes.first().copied().unwrap_or_default()
            );
        }
        Ok(check) => {
            println!("FAIL: seed {seed} diverged");
            for (i, hash) in check.hashes.iter().enumerate() {
                println!("  run {i}: {hash:016x}");
            }
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

/// Write the built-in skirmish
fn cmd_template(output: Option<PathBuf>) {
    let text = match Scenario::skirmish().to_ron_string() {
        Ok(text) => text,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    match output {
        Some(path) => {
            if let Err(e) = std::fs::write(&path, text) {
                eprintln!("Error: cannot write '{}': {e}", path.display());
                std::process::exit(1);
            }
            eprintln!("Wrote {}", path.display());
        }
        None => println!("{text}"),
    }
}
