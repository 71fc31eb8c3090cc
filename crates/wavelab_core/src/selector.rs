//! Fire-time slot selection against live state.
//!
//! Selection happens in two steps. [`LaneCensus::observe`] reads the
//! simulation once and reduces it to per-lane figures; [`rank`] is then a
//! pure function of the candidates and that census. Keeping the ranking pure
//! makes it trivially repeatable: identical candidates and an identical
//! census always give the identical pick.

use std::collections::BTreeSet;

use crate::action::{CardPos, SelectionRule};
use crate::engine::{Simulation, UnitKind, UnitState};
use crate::scene::{Lane, MAX_LANES};

/// Per-lane summary of the qualifying live units.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaneCensus {
    min_x: [Option<i32>; MAX_LANES],
    count: [u32; MAX_LANES],
}

impl LaneCensus {
    /// Reduce the live, non-dying units that pass `qualifies`.
    pub fn observe<S: Simulation>(sim: &S, qualifies: impl Fn(&UnitState) -> bool) -> Self {
        let mut census = Self::default();
        for (_, unit) in sim.units() {
            if unit.is_active() && qualifies(unit) {
                census.record(unit.lane, unit.int_x());
            }
        }
        census
    }

    /// Census of the tracked heavy units, optionally restricted to waves.
    pub fn giga<S: Simulation>(sim: &S, waves: &BTreeSet<u32>) -> Self {
        Self::observe(sim, |unit| {
            unit.kind == UnitKind::GigaGargantuar && in_waves(waves, unit.wave)
        })
    }

    /// Census of every heavy unit.
    pub fn heavy<S: Simulation>(sim: &S) -> Self {
        Self::observe(sim, |unit| unit.kind.is_heavy())
    }

    /// Census of light units that threaten fodder, optionally restricted to waves.
    pub fn light<S: Simulation>(sim: &S, waves: &BTreeSet<u32>) -> Self {
        Self::observe(sim, |unit| unit.kind.is_light_threat() && in_waves(waves, unit.wave))
    }

    /// Add one unit at `x` in `lane`. Lanes outside the field are ignored.
    pub fn record(&mut self, lane: Lane, x: i32) {
        let Some(idx) = lane_index(lane) else {
            return;
        };
        self.count[idx] += 1;
        self.min_x[idx] = Some(self.min_x[idx].map_or(x, |min| min.min(x)));
    }

    /// Smallest x of a qualifying unit in the lane.
    #[must_use]
    pub fn min_x(&self, lane: Lane) -> Option<i32> {
        lane_index(lane).and_then(|idx| self.min_x[idx])
    }

    /// Number of qualifying units in the lane.
    #[must_use]
    pub fn count(&self, lane: Lane) -> u32 {
        lane_index(lane).map_or(0, |idx| self.count[idx])
    }

    /// Qualifying units within `radius` lanes of `lane`.
    #[must_use]
    pub fn count_near(&self, lane: Lane, radius: u8) -> u32 {
        let low = lane.saturating_sub(radius).max(1);
        let high = lane.saturating_add(radius);
        (low..=high).map(|l| self.count(l)).sum()
    }
}

fn in_waves(waves: &BTreeSet<u32>, wave: u32) -> bool {
    waves.is_empty() || waves.contains(&wave)
}

fn lane_index(lane: Lane) -> Option<usize> {
    let idx = usize::from(lane).checked_sub(1)?;
    (idx < MAX_LANES).then_some(idx)
}

/// Pick up to `how_many` candidate indices under `rule`.
///
/// Repeatedly takes the best remaining candidate; equal scores go to the
/// lowest index. Proximity never picks a lane without a qualifying unit, so
/// fewer than `how_many` indices may come back. `radius` widens the density
/// count to neighbouring lanes.
#[must_use]
pub fn rank(
    candidates: &[CardPos],
    census: &LaneCensus,
    how_many: usize,
    rule: SelectionRule,
    radius: u8,
) -> Vec<usize> {
    if rule == SelectionRule::All {
        return (0..candidates.len()).collect();
    }

    // Higher is better; `None` marks a candidate that cannot be ranked.
    let score = |pos: &CardPos| -> Option<i64> {
        match rule {
            SelectionRule::Proximity => census.min_x(pos.lane).map(|x| -i64::from(x)),
            SelectionRule::Density => Some(i64::from(census.count_near(pos.lane, radius))),
            SelectionRule::All => Some(0),
        }
    };

    let mut remaining: Vec<usize> = (0..candidates.len()).collect();
    let mut chosen = Vec::with_capacity(how_many.min(candidates.len()));

    while chosen.len() < how_many {
        let mut best: Option<(usize, i64)> = None;
        for (pos, &idx) in remaining.iter().enumerate() {
            if let Some(value) = score(&candidates[idx]) {
                if best.map_or(true, |(_, best_value)| value > best_value) {
                    best = Some((pos, value));
                }
            }
        }

        match best {
            Some((pos, _)) => chosen.push(remaining.remove(pos)),
            None => break,
        }
    }
    chosen
}

/// Dynamic fodder selection against the simulation's current state.
pub fn select<S: Simulation>(
    sim: &S,
    candidates: &[CardPos],
    how_many: usize,
    rule: SelectionRule,
    waves: &BTreeSet<u32>,
) -> Vec<usize> {
    let census = match rule {
        SelectionRule::All => LaneCensus::default(),
        SelectionRule::Proximity => LaneCensus::giga(sim, waves),
        SelectionRule::Density => LaneCensus::light(sim, waves),
    };
    rank(candidates, &census, how_many, rule, 0)
}

/// Dynamic card selection: the single cell whose lane neighbourhood holds
/// the most heavy units.
pub fn select_card<S: Simulation>(sim: &S, candidates: &[CardPos], radius: u8) -> Option<usize> {
    let census = LaneCensus::heavy(sim);
    rank(candidates, &census, 1, SelectionRule::Density, radius)
        .first()
        .copied()
}
