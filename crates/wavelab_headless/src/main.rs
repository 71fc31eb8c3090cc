//! Headless wave scenario runner.
//!
//! Runs repeated trials of a scenario document and writes the aggregated
//! tables as JSON.
//!
//! # Usage
//!
//! ```bash
//! # Smash run
//! cargo run -p wavelab_headless -- smash --config 1.json --repeat 320 --heavy 1000
//!
//! # Explode run with a scene override
//! cargo run -p wavelab_headless -- explode --config 1.json --scene PE --output explode.json
//!
//! # Refresh run, reporting missed refreshes as accidents
//! cargo run -p wavelab_headless -- refresh --config 1.json --repeat 1000 --activate
//!
//! # Inspect the compiled schedules
//! cargo run -p wavelab_headless -- schedule --config 1.json --mode explode
//! ```
//!
//! Logs go to stderr; summaries go to stdout.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wavelab_core::record::RefreshGoal;
use wavelab_core::schedule::ScenarioMode;
use wavelab_headless::{
    harness::{run_harness, HarnessConfig, HarnessResults, RoundTable},
    scenario::{parse_scene, Scenario},
};

#[derive(Parser)]
#[command(name = "wavelab")]
#[command(about = "Monte-Carlo trial runner for wave scenarios")]
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
    /// Heavy-unit smash run: outcome signatures per tracked unit
    Smash {
        /// Scenario file (.json or .ron)
        #[arg(short, long)]
        config: PathBuf,

        /// Total number of trials
        #[arg(short, long, default_value = "320")]
        repeat: u64,

        /// Worker threads (0 = auto)
        #[arg(short, long, default_value = "0")]
        threads: usize,

        /// Tracked heavy units per trial, split evenly over the waves
        #[arg(long, default_value = "1000")]
        heavy: usize,

        /// Override the scene (name or short code)
        #[arg(long)]
        scene: Option<String>,

        /// Output JSON file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Light-unit explode run: tick-indexed loss per round
    Explode {
        /// Scenario file (.json or .ron)
        #[arg(short, long)]
        config: PathBuf,

        /// Total number of trials
        #[arg(short, long, default_value = "10000")]
        repeat: u64,

        /// Worker threads (0 = auto)
        #[arg(short, long, default_value = "0")]
        threads: usize,

        /// Override the scene (name or short code)
        #[arg(long)]
        scene: Option<String>,

        /// Output JSON file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Refresh run: chance that each randomly composed wave refreshes early
    Refresh {
        /// Scenario file (.json or .ron)
        #[arg(short, long)]
        config: PathBuf,

        /// Total number of trials
        #[arg(short, long, default_value = "1000")]
        repeat: u64,

        /// Worker threads (0 = auto)
        #[arg(short, long, default_value = "0")]
        threads: usize,

        /// Override the scene (name or short code)
        #[arg(long)]
        scene: Option<String>,

        /// Count a missed refresh as the accident instead of an early one
        #[arg(long)]
        activate: bool,

        /// Output JSON file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the compiled Op count and action labels of every round
    Schedule {
        /// Scenario file (.json or .ron)
        #[arg(short, long)]
        config: PathBuf,

        /// Scenario mode to compile for
        #[arg(short, long, value_enum, default_value = "smash")]
        mode: ModeArg,

        /// Tracked heavy units per trial
        #[arg(long, default_value = "1000")]
        heavy: usize,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Smash,
    Explode,
    Refresh,
}

impl From<ModeArg> for ScenarioMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Smash => ScenarioMode::Smash,
            ModeArg::Explode => ScenarioMode::Explode,
            ModeArg::Refresh => ScenarioMode::Refresh,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging to stderr (stdout is for summaries)
    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(tracing_subscriber::filter::LevelFilter::from_level(
            log_level,
        ))
        .init();

    match cli.command {
        Commands::Smash {
            config,
            repeat,
            threads,
            heavy,
            scene,
            output,
        } => {
            let run = HarnessConfig::new(ScenarioMode::Smash, repeat)
                .with_threads(threads)
                .with_heavy_total(heavy);
            cmd_run(config, scene, run, output);
        }
        Commands::Explode {
            config,
            repeat,
            threads,
            scene,
            output,
        } => {
            let run = HarnessConfig::new(ScenarioMode::Explode, repeat).with_threads(threads);
            cmd_run(config, scene, run, output);
        }
        Commands::Refresh {
            config,
            repeat,
            threads,
            scene,
            activate,
            output,
        } => {
            let goal = if activate {
                RefreshGoal::Activate
            } else {
                RefreshGoal::Delay
            };
            let run = HarnessConfig::new(ScenarioMode::Refresh, repeat)
                .with_threads(threads)
                .with_refresh_goal(goal);
            cmd_run(config, scene, run, output);
        }
        Commands::Schedule {
            config,
            mode,
            heavy,
        } => {
            cmd_schedule(config, mode.into(), heavy);
        }
    }
}

/// Load a scenario or exit.
fn load_scenario(path: &Path, scene: Option<String>) -> Scenario {
    let mut scenario = match Scenario::load(path) {
        Ok(scenario) => scenario,
        Err(e) => fatal(&format!("Cannot load scenario '{}': {e}", path.display())),
    };

    if let Some(code) = scene {
        match parse_scene(&code) {
            Ok(kind) => {
                tracing::info!(scene = ?kind, "Scene overridden");
                scenario.setting.scene = kind;
            }
            Err(e) => fatal(&e.to_string()),
        }
    }
    scenario
}

fn fatal(message: &str) -> ! {
    tracing::error!("{message}");
    eprintln!("FATAL: {message}");
    std::process::exit(1);
}

/// Run the harness and report.
fn cmd_run(path: PathBuf, scene: Option<String>, config: HarnessConfig, output: Option<PathBuf>) {
    let scenario = load_scenario(&path, scene);
    let config = match output {
        Some(output) => config.with_output(output),
        None => config,
    };

    tracing::info!(
        config = %path.display(),
        scene = ?scenario.setting.scene,
        rounds = scenario.round_count(),
        "Scenario loaded"
    );

    let results = match run_harness(&scenario, config) {
        Ok(results) => results,
        Err(e) => fatal(&e.to_string()),
    };

    print_summary(&results);

    if let Some(output) = &results.config.output {
        match results.save(output) {
            Ok(()) => tracing::info!(path = %output.display(), "Results saved"),
            Err(e) => fatal(&format!("Cannot write '{}': {e}", output.display())),
        }
    }
}

fn print_summary(results: &HarnessResults) {
    for (idx, round) in results.rounds.iter().enumerate() {
        println!("Round {} ({} ops)", idx + 1, round.op_count);
        match &round.table {
            RoundTable::Smash(summary) => {
                for wave in &summary.waves {
                    let rate = wave.counts.hit_rate().unwrap_or(0.0);
                    println!(
                        "  wave {:>3}: {:>8} tracked, smash rate {:>6.2}%",
                        wave.wave,
                        wave.counts.total,
                        rate * 100.0
                    );
                }
                println!("  {} distinct signatures", summary.rows.len());
            }
            RoundTable::Explode(table) => {
                for (wave_idx, series) in table.waves.iter().enumerate() {
                    let last = series.start_tick + series.sums.len() as i64 - 1;
                    if let Some(mean) = table.mean_loss(wave_idx, last) {
                        println!(
                            "  wave {:>3}: loss {:>10.2} at tick {last}",
                            series.wave, mean.total
                        );
                    }
                }
            }
            RoundTable::Refresh(summary) => {
                let goal = results.config.refresh_goal;
                for wave in &summary.waves {
                    println!(
                        "  wave {:>3}: hp ratio {:>6.2}%, accident rate {:>6.2}% ({goal:?})",
                        wave.wave,
                        wave.overall.hp_ratio * 100.0,
                        wave.overall.accident_rate(goal) * 100.0
                    );
                    for row in &wave.rows {
                        println!(
                            "    {:>6.2}%  {:?}",
                            row.stats.accident_rate(goal) * 100.0,
                            row.types.kinds()
                        );
                    }
                }
            }
        }
    }
}

/// Compile every round and print its schedule.
fn cmd_schedule(path: PathBuf, mode: ScenarioMode, heavy: usize) {
    let scenario = load_scenario(&path, None);
    let schedules = match scenario.validate(mode, heavy) {
        Ok(schedules) => schedules,
        Err(e) => fatal(&e.to_string()),
    };

    for (idx, schedule) in schedules.iter().enumerate() {
        println!(
            "Round {}: {} ops, ticks {}..={}",
            idx + 1,
            schedule.op_count(),
            schedule.min_tick().unwrap_or(0),
            schedule.ops.last().map_or(0, |op| op.tick)
        );
        for label in schedule.labels() {
            println!("  {label}");
        }
    }
}
