//! Monte-Carlo trial harness.
//!
//! Splits the repeat count over a dedicated rayon pool. Every worker owns
//! one [`LaneWorld`], one entropy-seeded generator and one accumulator per
//! round, runs its share of trials sequentially and merges into the shared
//! accumulators exactly once.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use wavelab_core::aggregate::{
    Aggregate, LossTable, MeanLoss, RefreshSummary, RefreshTable, SignatureSummary, SignatureTable,
};
use wavelab_core::executor::Executor;
use wavelab_core::record::RefreshGoal;
use wavelab_core::schedule::{ScenarioMode, Schedule};
use wavelab_core::world::LaneWorld;

use crate::scenario::{Scenario, ScenarioError};

/// Error type for harness runs.
#[derive(Error, Debug)]
pub enum HarnessError {
    /// The scenario failed validation.
    #[error(transparent)]
    Scenario(#[from] ScenarioError),
    /// The worker pool could not be built.
    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Configuration for a harness run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Pipeline to run
    pub mode: ScenarioMode,
    /// Total number of trials
    pub repeat: u64,
    /// Worker threads (0 = available parallelism)
    pub threads: usize,
    /// Tracked heavy units per trial, split evenly over the waves
    pub heavy_total: usize,
    /// Where to write the results
    pub output: Option<PathBuf>,
    /// What counts as an accident in refresh runs
    #[serde(default)]
    pub refresh_goal: RefreshGoal,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            mode: ScenarioMode::Smash,
            repeat: 1000,
            threads: 0,
            heavy_total: 1000,
            output: None,
            refresh_goal: RefreshGoal::default(),
        }
    }
}

impl HarnessConfig {
    /// Create config for a mode and repeat count
    pub fn new(mode: ScenarioMode, repeat: u64) -> Self {
        Self {
            mode,
            repeat,
            ..Default::default()
        }
    }

    /// Set worker threads
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Set output file
    pub fn with_output(mut self, path: PathBuf) -> Self {
        self.output = Some(path);
        self
    }

    /// Set tracked heavy units per trial
    pub fn with_heavy_total(mut self, heavy_total: usize) -> Self {
        self.heavy_total = heavy_total;
        self
    }

    /// Set the refresh goal
    pub fn with_refresh_goal(mut self, goal: RefreshGoal) -> Self {
        self.refresh_goal = goal;
        self
    }

    /// Worker count after resolving 0 to the available parallelism.
    pub fn resolved_threads(&self) -> usize {
        if self.threads > 0 {
            return self.threads;
        }
        std::thread::available_parallelism()
            .map(|p| p.get())
            .unwrap_or(1)
    }
}

/// Split `total` trials over at most `threads` workers.
///
/// Shares differ by at most one; the first workers take the remainder. No
/// worker gets an empty share.
pub fn assign_repeat(total: u64, threads: usize) -> Vec<u64> {
    if total == 0 {
        return Vec::new();
    }
    let threads = (threads.max(1) as u64).min(total);
    let base = total / threads;
    let extra = total % threads;
    (0..threads)
        .map(|idx| if idx < extra { base + 1 } else { base })
        .collect()
}

/// Progress tracking for harness runs
#[derive(Debug)]
pub struct HarnessProgress {
    /// Total trials
    pub total: u64,
    /// Completed trials
    pub completed: Arc<AtomicU64>,
    /// Workers that have merged their results
    pub merged: Arc<AtomicU64>,
    /// Start time
    pub start_time: Instant,
}

impl HarnessProgress {
    /// Create new progress tracker
    pub fn new(total: u64) -> Self {
        Self {
            total,
            completed: Arc::new(AtomicU64::new(0)),
            merged: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }

    /// Record a completed trial
    pub fn record_completion(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a worker merge
    pub fn record_merge(&self) {
        self.merged.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current completion count
    pub fn current(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Get completion percentage
    pub fn percentage(&self) -> f64 {
        self.current() as f64 / self.total.max(1) as f64 * 100.0
    }

    /// Get estimated time remaining
    pub fn eta(&self) -> Duration {
        let completed = self.current();
        if completed == 0 {
            return Duration::from_secs(0);
        }

        let elapsed = self.start_time.elapsed();
        let per_trial = elapsed.as_secs_f64() / completed as f64;
        let remaining = self.total.saturating_sub(completed);
        Duration::from_secs_f64(per_trial * remaining as f64)
    }

    /// Display progress to stderr
    pub fn display(&self) {
        let eta = self.eta();
        eprintln!("╔════════════════════════════════════════╗");
        eprintln!(
            "║ Trials: {:>8}/{:<8} ({:>5.1}%)     ║",
            self.current(),
            self.total,
            self.percentage()
        );
        eprintln!(
            "║ Workers merged: {:>22} ║",
            self.merged.load(Ordering::Relaxed)
        );
        eprintln!(
            "║ Elapsed: {:>29} ║",
            format!("{:.1}s", self.start_time.elapsed().as_secs_f64())
        );
        eprintln!(
            "║ ETA: {:>33} ║",
            format!("{}m {}s", eta.as_secs() / 60, eta.as_secs() % 60)
        );
        eprintln!("╚════════════════════════════════════════╝");
    }
}

/// Run `config.repeat` trials of every round and return one accumulator per
/// round.
///
/// Every trial runs each round once on the worker's own simulation.
pub fn run_trials<T: Aggregate>(
    scenario: &Scenario,
    schedules: &[Schedule],
    config: &HarnessConfig,
    progress: &HarnessProgress,
) -> Result<Vec<T>, HarnessError> {
    let shares = assign_repeat(config.repeat, config.resolved_threads());
    if shares.is_empty() {
        warn!("Repeat count is zero, nothing to run");
        return Ok(fresh(schedules.len()));
    }
    let shared: Mutex<Vec<T>> = Mutex::new(fresh(schedules.len()));

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(shares.len())
        .build()?;

    pool.install(|| {
        shares.par_iter().enumerate().for_each(|(worker, &share)| {
            let mut world = LaneWorld::new(scenario.setting.scene);
            let mut rng = ChaCha8Rng::from_entropy();
            let mut local: Vec<T> = fresh(schedules.len());

            for _ in 0..share {
                for (schedule, acc) in schedules.iter().zip(local.iter_mut()) {
                    let record = Executor::new(&scenario.setting, config.mode, schedule.clone())
                        .run(&mut world, &mut rng);
                    acc.update(&record);
                }
                progress.record_completion();
            }

            let mut guard = shared.lock().unwrap_or_else(PoisonError::into_inner);
            for (dst, src) in guard.iter_mut().zip(local) {
                dst.merge(src);
            }
            drop(guard);
            progress.record_merge();
            debug!(worker, trials = share, "Worker merged");
        });
    });

    Ok(shared.into_inner().unwrap_or_else(PoisonError::into_inner))
}

fn fresh<T: Aggregate>(rounds: usize) -> Vec<T> {
    (0..rounds).map(|_| T::default()).collect()
}

/// Aggregated table of one round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "table")]
pub enum RoundTable {
    /// Outcome signatures of a smash round.
    Smash(SignatureSummary),
    /// Tick-indexed losses of an explode round.
    Explode(LossTable),
    /// Per-wave refresh rates of a refresh round.
    Refresh(RefreshSummary),
}

/// Result of one round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundResult {
    /// Compiled Op count.
    pub op_count: usize,
    /// Action labels, usable as column headers.
    pub labels: Vec<String>,
    /// Aggregated table.
    pub table: RoundTable,
}

/// Results from a harness run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarnessResults {
    /// Configuration used
    pub config: HarnessConfig,
    /// One entry per round
    pub rounds: Vec<RoundResult>,
    /// Total runtime
    pub duration_seconds: f64,
}

impl HarnessResults {
    /// Save results to JSON file
    pub fn save(&self, path: &std::path::Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Load results from JSON file
    pub fn load(path: &std::path::Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(std::io::Error::other)
    }

    /// Mean loss of `round`, `wave_idx` at `tick` (relative to the wave
    /// start). `None` for smash rounds or ticks outside the window.
    pub fn mean_loss(&self, round: usize, wave_idx: usize, tick: i64) -> Option<MeanLoss> {
        match &self.rounds.get(round)?.table {
            RoundTable::Explode(table) => table.mean_loss(wave_idx, tick),
            RoundTable::Smash(_) | RoundTable::Refresh(_) => None,
        }
    }

    /// Accident rate of `round`, `wave` (1-based) under the configured
    /// goal. `None` for other modes or unmeasured waves.
    pub fn accident_rate(&self, round: usize, wave: u32) -> Option<f64> {
        let RoundTable::Refresh(summary) = &self.rounds.get(round)?.table else {
            return None;
        };
        summary
            .waves
            .iter()
            .find(|entry| entry.wave == wave)
            .map(|entry| entry.overall.accident_rate(self.config.refresh_goal))
    }

    /// Round with the lowest mean loss at `wave_idx`, `tick`, when at least
    /// two rounds recorded that tick. Ties go to the later round.
    pub fn best_round(&self, wave_idx: usize, tick: i64) -> Option<usize> {
        let losses: Vec<(usize, f64)> = (0..self.rounds.len())
            .filter_map(|round| {
                self.mean_loss(round, wave_idx, tick)
                    .map(|mean| (round, mean.total))
            })
            .collect();
        if losses.len() < 2 {
            return None;
        }
        losses
            .into_iter()
            .fold(None, |best: Option<(usize, f64)>, (round, total)| match best {
                Some((_, best_total)) if best_total < total => best,
                _ => Some((round, total)),
            })
            .map(|(round, _)| round)
    }
}

/// Validate the scenario, run every trial and assemble the results.
pub fn run_harness(scenario: &Scenario, config: HarnessConfig) -> Result<HarnessResults, HarnessError> {
    let start = Instant::now();
    let schedules = scenario.validate(config.mode, config.heavy_total)?;

    if config.mode == ScenarioMode::Smash {
        let waves = scenario.rounds.iter().map(Vec::len).max().unwrap_or(0);
        if config.heavy_total < waves {
            warn!(
                heavy_total = config.heavy_total,
                waves, "Fewer heavy units than waves, some waves spawn none"
            );
        }
    }

    info!(
        mode = ?config.mode,
        rounds = schedules.len(),
        repeat = config.repeat,
        threads = config.resolved_threads(),
        heavy_total = config.heavy_total,
        "Starting harness run"
    );

    let progress = HarnessProgress::new(config.repeat);
    let tables: Vec<RoundTable> = match config.mode {
        ScenarioMode::Smash => run_trials::<SignatureTable>(scenario, &schedules, &config, &progress)?
            .iter()
            .map(|table| RoundTable::Smash(table.summarize()))
            .collect(),
        ScenarioMode::Explode => run_trials::<LossTable>(scenario, &schedules, &config, &progress)?
            .into_iter()
            .map(RoundTable::Explode)
            .collect(),
        ScenarioMode::Refresh => run_trials::<RefreshTable>(scenario, &schedules, &config, &progress)?
            .iter()
            .map(|table| RoundTable::Refresh(table.summarize()))
            .collect(),
    };
    progress.display();

    let rounds = schedules
        .iter()
        .zip(tables)
        .map(|(schedule, table)| RoundResult {
            op_count: schedule.op_count(),
            labels: schedule.labels().into_iter().map(str::to_string).collect(),
            table,
        })
        .collect();

    let duration_seconds = start.elapsed().as_secs_f64();
    info!(
        "Harness complete: {} trials in {:.1}s ({:.1} trials/sec)",
        config.repeat,
        duration_seconds,
        config.repeat as f64 / duration_seconds.max(f64::EPSILON)
    );

    Ok(HarnessResults {
        config,
        rounds,
        duration_seconds,
    })
}
