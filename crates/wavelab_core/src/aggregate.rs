//! Commutative accumulation of trial records.
//!
//! An [`Aggregate`] folds trial records in with [`Aggregate::update`] and
//! combines with another accumulator of the same kind through
//! [`Aggregate::merge`]. For independent trials `A` and `B`,
//! `merge(update(∅, A), update(∅, B))` equals `update(update(∅, A), B)`, and
//! merge is associative and commutative. The harness relies on this to give
//! thread-count independent results.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::record::{
    classify, refresh_probability, LossSample, OutcomeState, RefreshGoal, TrialRecord,
    EXPLODE_WEIGHT,
};
use crate::scene::MAX_LANES;
use crate::summon::SpawnTypes;

/// Fixed-point scale of stored ratios and probabilities.
const PPM: f64 = 1_000_000.0;

/// Accumulator over trial records.
pub trait Aggregate: Default + Send {
    /// Fold one trial in.
    fn update(&mut self, record: &TrialRecord);

    /// Absorb another accumulator.
    fn merge(&mut self, other: Self);

    /// Number of trials folded in so far.
    fn trials(&self) -> u64;
}

/// Aggregation key: per-action outcomes plus the subject's spawn wave.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Signature {
    /// One state per tracked action, in declaration order.
    pub states: Vec<OutcomeState>,
    /// Spawn wave of the heavy unit.
    pub wave: u32,
}

/// Counts stored under one signature.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureCounts {
    /// Heavy units observed with this signature.
    pub total: u64,
    /// Of those, units that smashed a protected entity.
    pub hit: u64,
    /// Smashing units by spawn lane (index 0 is lane 1).
    pub hit_by_lane: [u64; MAX_LANES],
}

impl SignatureCounts {
    fn add(&mut self, other: &Self) {
        self.total += other.total;
        self.hit += other.hit;
        for (dst, src) in self.hit_by_lane.iter_mut().zip(other.hit_by_lane) {
            *dst += src;
        }
    }

    /// Fraction of units that smashed, or `None` when nothing was observed.
    #[must_use]
    pub fn hit_rate(&self) -> Option<f64> {
        (self.total > 0).then(|| self.hit as f64 / self.total as f64)
    }
}

/// One summarized signature row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureRow {
    /// Outcome key.
    pub signature: Signature,
    /// Counts under the key.
    pub counts: SignatureCounts,
}

/// Totals of one spawn wave across all signatures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveSummary {
    /// Spawn wave.
    pub wave: u32,
    /// Summed counts.
    pub counts: SignatureCounts,
}

/// Hand-off form of a [`SignatureTable`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureSummary {
    /// Rows sorted by outcome vector, then wave.
    pub rows: Vec<SignatureRow>,
    /// Per-wave totals, in wave order.
    pub waves: Vec<WaveSummary>,
    /// Trials folded in.
    pub trials: u64,
}

/// Outcome signature table for smash scenarios.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignatureTable {
    entries: HashMap<Signature, SignatureCounts>,
    trials: u64,
}

impl SignatureTable {
    /// Counts under a signature.
    #[must_use]
    pub fn get(&self, signature: &Signature) -> Option<&SignatureCounts> {
        self.entries.get(signature)
    }

    /// Number of distinct signatures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no signature was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sorted rows and per-wave totals.
    #[must_use]
    pub fn summarize(&self) -> SignatureSummary {
        let mut rows: Vec<SignatureRow> = self
            .entries
            .iter()
            .map(|(signature, counts)| SignatureRow {
                signature: signature.clone(),
                counts: *counts,
            })
            .collect();
        rows.sort_by(|a, b| a.signature.cmp(&b.signature));

        let mut per_wave: BTreeMap<u32, SignatureCounts> = BTreeMap::new();
        for row in &rows {
            per_wave.entry(row.signature.wave).or_default().add(&row.counts);
        }

        SignatureSummary {
            rows,
            waves: per_wave
                .into_iter()
                .map(|(wave, counts)| WaveSummary { wave, counts })
                .collect(),
            trials: self.trials,
        }
    }
}

impl Aggregate for SignatureTable {
    fn update(&mut self, record: &TrialRecord) {
        for heavy in &record.heavies {
            let signature = Signature {
                states: record.actions.iter().map(|action| classify(action, heavy)).collect(),
                wave: heavy.wave,
            };
            let counts = self.entries.entry(signature).or_default();
            counts.total += 1;
            if heavy.smashed() {
                counts.hit += 1;
                if let Some(lane) = usize::from(heavy.lane).checked_sub(1) {
                    if let Some(slot) = counts.hit_by_lane.get_mut(lane) {
                        *slot += 1;
                    }
                }
            }
        }
        self.trials += 1;
    }

    fn merge(&mut self, other: Self) {
        if self.entries.is_empty() {
            self.entries = other.entries;
        } else {
            for (signature, counts) in other.entries {
                self.entries.entry(signature).or_default().add(&counts);
            }
        }
        self.trials += other.trials;
    }

    fn trials(&self) -> u64 {
        self.trials
    }
}

/// Summed loss at one observed tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LossSum {
    /// Explosions absorbed, over every lane and trial.
    pub explode: u64,
    /// Hit points lost, over every lane and trial.
    pub hp_loss: i64,
}

impl LossSum {
    fn add_snapshot(&mut self, lanes: &[LossSample]) {
        for sample in lanes {
            self.explode += u64::from(sample.explode.total());
            self.hp_loss += sample.hp_loss;
        }
    }

    fn add(&mut self, other: Self) {
        self.explode += other.explode;
        self.hp_loss += other.hp_loss;
    }
}

/// Tick-indexed sums of one wave.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaveSeries {
    /// Wave number (1-based).
    pub wave: u32,
    /// Tick of the first entry, relative to the wave start.
    pub start_tick: i64,
    /// One sum per observed tick.
    pub sums: Vec<LossSum>,
}

/// Per-trial mean loss at one tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeanLoss {
    /// Weighted explosions.
    pub explode: f64,
    /// Hit points.
    pub hp_loss: f64,
    /// Weighted explosions plus hit points.
    pub total: f64,
}

/// Tick-indexed loss table for explode scenarios.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LossTable {
    /// One series per observed wave; empty until the first update.
    pub waves: Vec<WaveSeries>,
    /// Trials folded in.
    pub trials: u64,
}

impl LossTable {
    /// Mean loss of `wave_idx` at `tick` (relative to the wave start), or
    /// `None` outside the recorded window.
    #[must_use]
    pub fn mean_loss(&self, wave_idx: usize, tick: i64) -> Option<MeanLoss> {
        if self.trials == 0 {
            return None;
        }
        let series = self.waves.get(wave_idx)?;
        let offset = usize::try_from(tick - series.start_tick).ok()?;
        let sum = series.sums.get(offset)?;

        let trials = self.trials as f64;
        let explode = (EXPLODE_WEIGHT as f64) * sum.explode as f64 / trials;
        let hp_loss = sum.hp_loss as f64 / trials;
        Some(MeanLoss {
            explode,
            hp_loss,
            total: explode + hp_loss,
        })
    }

    fn add_series(dst: &mut WaveSeries, sums: impl Iterator<Item = LossSum>) {
        for (idx, sum) in sums.enumerate() {
            if idx == dst.sums.len() {
                dst.sums.push(LossSum::default());
            }
            dst.sums[idx].add(sum);
        }
    }
}

impl Aggregate for LossTable {
    fn update(&mut self, record: &TrialRecord) {
        if self.waves.is_empty() {
            self.waves = record
                .losses
                .iter()
                .map(|loss| WaveSeries {
                    wave: loss.wave,
                    start_tick: loss.start_tick,
                    sums: vec![LossSum::default(); loss.snapshots.len()],
                })
                .collect();
        }

        for (series, loss) in self.waves.iter_mut().zip(&record.losses) {
            let sums = loss.snapshots.iter().map(|snapshot| {
                let mut sum = LossSum::default();
                sum.add_snapshot(snapshot);
                sum
            });
            Self::add_series(series, sums);
        }
        self.trials += 1;
    }

    fn merge(&mut self, other: Self) {
        if self.waves.is_empty() {
            self.waves = other.waves;
        } else {
            for (series, src) in self.waves.iter_mut().zip(other.waves) {
                Self::add_series(series, src.sums.into_iter());
            }
        }
        self.trials += other.trials;
    }

    fn trials(&self) -> u64 {
        self.trials
    }
}

/// Summed refresh observations under one wave and spawn-type set.
///
/// Ratios and probabilities are stored in parts per million so merges add
/// integers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshCounts {
    /// Measured waves.
    pub samples: u64,
    /// Summed HP ratios, in ppm.
    pub ratio_ppm: u64,
    /// Summed refresh probabilities, in ppm.
    pub refresh_ppm: u64,
}

impl RefreshCounts {
    fn add(&mut self, other: &Self) {
        self.samples += other.samples;
        self.ratio_ppm += other.ratio_ppm;
        self.refresh_ppm += other.refresh_ppm;
    }

    /// Mean ratio and probability, or `None` when nothing was measured.
    #[must_use]
    pub fn stats(&self) -> Option<RefreshStats> {
        (self.samples > 0).then(|| {
            let samples = self.samples as f64;
            RefreshStats {
                samples: self.samples,
                hp_ratio: self.ratio_ppm as f64 / PPM / samples,
                refresh_rate: self.refresh_ppm as f64 / PPM / samples,
            }
        })
    }
}

/// Means over the measured waves of one group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RefreshStats {
    /// Measured waves.
    pub samples: u64,
    /// Mean share of the summoned HP left at the check.
    pub hp_ratio: f64,
    /// Mean probability of an early refresh.
    pub refresh_rate: f64,
}

impl RefreshStats {
    /// Accident rate under a goal.
    #[must_use]
    pub fn accident_rate(&self, goal: RefreshGoal) -> f64 {
        goal.accident_rate(self.refresh_rate)
    }
}

/// One spawn-type set's row within a wave.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshRow {
    /// Kinds the waves were summoned from.
    pub types: SpawnTypes,
    /// Means under the set.
    pub stats: RefreshStats,
}

/// Refresh results of one wave.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshWaveSummary {
    /// Wave number (1-based).
    pub wave: u32,
    /// Means over every spawn-type set.
    pub overall: RefreshStats,
    /// Rows by descending refresh rate.
    pub rows: Vec<RefreshRow>,
}

/// Hand-off form of a [`RefreshTable`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshSummary {
    /// Per-wave results, in wave order.
    pub waves: Vec<RefreshWaveSummary>,
    /// Trials folded in.
    pub trials: u64,
}

/// Refresh table for refresh scenarios, keyed by wave and spawn-type set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshTable {
    entries: HashMap<(u32, SpawnTypes), RefreshCounts>,
    trials: u64,
}

impl RefreshTable {
    /// Counts under a wave and spawn-type set.
    #[must_use]
    pub fn get(&self, wave: u32, types: &SpawnTypes) -> Option<&RefreshCounts> {
        self.entries.get(&(wave, types.clone()))
    }

    /// Number of distinct groups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing was measured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Per-wave rows, most refresh-prone set first.
    #[must_use]
    pub fn summarize(&self) -> RefreshSummary {
        let mut per_wave: BTreeMap<u32, (RefreshCounts, Vec<RefreshRow>)> = BTreeMap::new();
        for ((wave, types), counts) in &self.entries {
            let Some(stats) = counts.stats() else {
                continue;
            };
            let (overall, rows) = per_wave.entry(*wave).or_default();
            overall.add(counts);
            rows.push(RefreshRow {
                types: types.clone(),
                stats,
            });
        }

        let waves = per_wave
            .into_iter()
            .filter_map(|(wave, (overall, mut rows))| {
                rows.sort_by(|a, b| {
                    b.stats
                        .refresh_rate
                        .total_cmp(&a.stats.refresh_rate)
                        .then_with(|| a.types.cmp(&b.types))
                });
                Some(RefreshWaveSummary {
                    wave,
                    overall: overall.stats()?,
                    rows,
                })
            })
            .collect();

        RefreshSummary {
            waves,
            trials: self.trials,
        }
    }
}

impl Aggregate for RefreshTable {
    fn update(&mut self, record: &TrialRecord) {
        for sample in &record.refresh {
            let Some(ratio) = sample.hp_ratio() else {
                continue;
            };
            let counts = self
                .entries
                .entry((sample.wave, record.spawn_types.clone()))
                .or_default();
            counts.samples += 1;
            counts.ratio_ppm += (ratio.max(0.0) * PPM).round() as u64;
            counts.refresh_ppm += (refresh_probability(ratio) * PPM).round() as u64;
        }
        self.trials += 1;
    }

    fn merge(&mut self, other: Self) {
        if self.entries.is_empty() {
            self.entries = other.entries;
        } else {
            for (key, counts) in other.entries {
                self.entries.entry(key).or_default().add(&counts);
            }
        }
        self.trials += other.trials;
    }

    fn trials(&self) -> u64 {
        self.trials
    }
}
