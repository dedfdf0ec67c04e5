//! Headless squad battle runner.
//!
//! Runs scenarios without graphics and reports the outcome.
//!
//! # Usage
//!
//! ```bash
//! # Run the built-in 2v1 infantry skirmish
//! cargo run -p squad_headless -- skirmish
//!
//! # Run a scenario file, overriding its tick budget, with a JSON report on stdout
//! cargo run -p squad_headless -- run --scenario crossing.ron --ticks 600 --json
//!
//! # Check a scenario ends on the same state hash every time
//! cargo run -p squad_headless -- verify --scenario crossing.ron --runs 5
//!
//! # Verify a recorded replay
//! cargo run -p squad_headless -- replay --file crossing.replay --verify
//! ```
//!
//! Reports go to stdout, logs to stderr. `RUST_LOG` overrides the log level.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use squad_core::replay::{Replay, ReplayPlayer};
use squad_headless::{HeadlessRunner, MatchReport, Scenario};

#[derive(Parser)]
#[command(name = "squad_headless")]
#[command(about = "Headless squad battle runner for scripted scenarios and CI")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario file
    Run {
        /// Scenario file to load
        #[arg(short, long)]
        scenario: PathBuf,

        /// Override the scenario's tick budget
        #[arg(short, long)]
        ticks: Option<u64>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Save the recorded replay here
        #[arg(long)]
        replay_out: Option<PathBuf>,
    },

    /// Run the built-in 2v1 infantry skirmish
    Skirmish {
        /// Override the tick budget
        #[arg(short, long)]
        ticks: Option<u64>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Verify determinism by running a scenario several times
    Verify {
        /// Scenario file (defaults to the built-in skirmish)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Number of verification runs
        #[arg(short, long, default_value = "5")]
        runs: u32,
    },

    /// Replay a recorded run
    Replay {
        /// Replay file path
        #[arg(short, long)]
        file: PathBuf,

        /// Verify replay produces identical hash
        #[arg(long)]
        verify: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    // Logs go to stderr (stdout is for reports)
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(filter)
        .init();

    match cli.command {
        Commands::Run {
            scenario,
            ticks,
            json,
            replay_out,
        } => cmd_run(&scenario, ticks, json, replay_out),
        Commands::Skirmish { ticks, json } => {
            play(&Scenario::skirmish(), ticks, json, None);
        }
        Commands::Verify { scenario, runs } => cmd_verify(scenario, runs),
        Commands::Replay { file, verify } => cmd_replay(&file, verify),
    }
}

fn load_scenario(path: &Path) -> Scenario {
    match Scenario::load(path) {
        Ok(scenario) => scenario,
        Err(e) => {
            eprintln!("Failed to load scenario: {e}");
            std::process::exit(1);
        }
    }
}

/// Run a scenario file
fn cmd_run(path: &Path, ticks: Option<u64>, json: bool, replay_out: Option<PathBuf>) {
    tracing::info!("Running scenario: {}", path.display());
    let scenario = load_scenario(path);
    play(&scenario, ticks, json, replay_out);
}

fn play(scenario: &Scenario, ticks: Option<u64>, json: bool, replay_out: Option<PathBuf>) {
    let mut runner = match HeadlessRunner::new(scenario) {
        Ok(runner) => runner,
        Err(e) => {
            eprintln!("Invalid scenario: {e}");
            std::process::exit(1);
        }
    };

    runner.run(ticks.unwrap_or(scenario.ticks));
    let (report, replay) = runner.finish();

    if let Some(path) = replay_out {
        if let Err(e) = replay.save(&path) {
            eprintln!("Failed to save replay: {e}");
            std::process::exit(1);
        }
        tracing::info!("Replay saved to {}", path.display());
    }

    print_report(&report, json);
}

fn print_report(report: &MatchReport, json: bool) {
    if json {
        match report.to_json() {
            Ok(text) => println!("{text}"),
            Err(e) => {
                eprintln!("Failed to encode report: {e}");
                std::process::exit(1);
            }
        }
        return;
    }

    println!("{}", report.summary());
    for death in &report.deaths {
        println!(
            "  tick {:>5}: {} {} lost ({} VP)",
            death.tick,
            death.faction.display_name(),
            death.unit,
            death.vp_value
        );
    }
    println!("  state hash: {:016x}", report.final_state_hash);
}

/// Verify determinism
fn cmd_verify(scenario: Option<PathBuf>, runs: u32) {
    let scenario = scenario
        .as_deref()
        .map_or_else(Scenario::skirmish, load_scenario);
    tracing::info!("Verifying determinism: {} ({} runs)", scenario.name, runs);

    match squad_headless::verify_determinism(&scenario, runs) {
        Ok(true) => eprintln!("PASS: All {runs} runs produced identical results"),
        Ok(false) => {
            eprintln!("FAIL: Non-determinism detected!");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Invalid scenario: {e}");
            std::process::exit(1);
        }
    }
}

/// Replay a recorded run
fn cmd_replay(file: &Path, verify: bool) {
    if verify {
        tracing::info!("Verifying replay: {}", file.display());
    } else {
        tracing::info!("Playing replay: {}", file.display());
    }

    let replay = match Replay::load(file) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Failed to load replay: {e}");
            std::process::exit(1);
        }
    };

    eprintln!("Loaded replay:");
    eprintln!("  Scenario: {}", replay.scenario_id);
    eprintln!("  Commands: {}", replay.command_count());
    eprintln!("  Duration: {} ticks", replay.final_tick);

    if verify {
        match replay.verify() {
            Ok(()) => {
                eprintln!("PASS: Replay verification successful");
                eprintln!("  Hash: {:016x}", replay.final_hash);
            }
            Err(e) => {
                eprintln!("FAIL: {e}");
                std::process::exit(1);
            }
        }
        return;
    }

    let total = replay.final_tick;
    let mut player = match ReplayPlayer::new(replay) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to create replay player: {e}");
            std::process::exit(1);
        }
    };

    let mut last_percent = 0;
    while player.advance() {
        let percent = player.current_tick() * 100 / total.max(1);
        if percent > last_percent && percent % 10 == 0 {
            eprintln!("Progress: {percent}%");
            last_percent = percent;
        }
    }

    let registry = player.registry();
    eprintln!("Replay complete at tick {}", player.current_tick());
    eprintln!("Final state hash: {:016x}", registry.state_hash());
    eprintln!("\nFinal State:");
    eprintln!("  Units: {}", registry.unit_count());
}
