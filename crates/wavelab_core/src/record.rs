//! Per-trial observations and outcome classification.
//!
//! A [`TrialRecord`] is created fresh for every trial, filled in by the
//! executor, folded into an aggregate and dropped. Ops never hold references
//! into it: they carry the index of the [`ActionInfo`] they write to.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::action::ActionClass;
use crate::engine::{ExplodeCounts, UnitState};
use crate::handle::{EntityHandle, IdentityTag};
use crate::scene::{Lane, MAX_LANES};
use crate::schedule::Schedule;
use crate::summon::SpawnTypes;

/// Loss weight of one absorbed explosion, in hit points.
pub const EXPLODE_WEIGHT: i64 = 300;

/// HP ratio at or below which a wave always refreshes early.
pub const REFRESH_RATIO_LOW: f64 = 0.5;

/// HP ratio at or above which a wave never refreshes early.
pub const REFRESH_RATIO_HIGH: f64 = 0.65;

/// Probability that a wave left at `hp_ratio` of its HP refreshes before
/// its natural end. Linear between the two thresholds.
#[must_use]
pub fn refresh_probability(hp_ratio: f64) -> f64 {
    (REFRESH_RATIO_HIGH - hp_ratio.clamp(REFRESH_RATIO_LOW, REFRESH_RATIO_HIGH))
        / (REFRESH_RATIO_HIGH - REFRESH_RATIO_LOW)
}

/// What the player wants the refresh check to do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefreshGoal {
    /// Hold the wave; an early refresh is the accident.
    #[default]
    Delay,
    /// Trigger the next wave; a missed refresh is the accident.
    Activate,
}

impl RefreshGoal {
    /// Accident rate for a given refresh probability.
    #[must_use]
    pub fn accident_rate(self, refresh_probability: f64) -> f64 {
        match self {
            Self::Delay => refresh_probability,
            Self::Activate => 1.0 - refresh_probability,
        }
    }
}

/// HP of one summoned wave, at summon and at the refresh check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshSample {
    /// Wave number (1-based).
    pub wave: u32,
    /// Wave HP right after the summon.
    pub init_hp: i64,
    /// Wave HP at the refresh check; `None` until measured.
    pub current_hp: Option<i64>,
}

impl RefreshSample {
    /// Share of the summoned HP still standing, if measured.
    #[must_use]
    pub fn hp_ratio(&self) -> Option<f64> {
        match self.current_hp {
            Some(current) if self.init_hp > 0 => Some(current as f64 / self.init_hp as f64),
            _ => None,
        }
    }
}

/// One tracked action and the entities its Ops created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionInfo {
    /// Classification family.
    pub class: ActionClass,
    /// Wave the action belongs to (1-based).
    pub wave: u32,
    /// Absolute decision tick.
    pub tick: i64,
    /// Display label.
    pub label: String,
    /// Entities created by this action during the trial.
    pub handles: Vec<EntityHandle>,
}

/// A tracked heavy unit and its last observed state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeavyInfo {
    /// Handle of the unit.
    pub handle: EntityHandle,
    /// Spawn lane.
    pub lane: Lane,
    /// Spawn wave (1-based).
    pub wave: u32,
    /// Absolute spawn tick.
    pub spawn_tick: i64,
    /// Ticks the unit was observed alive.
    pub alive_time: i64,
    /// Entities whose effect damaged the unit.
    pub hit_by: BTreeSet<IdentityTag>,
    /// Defenders the unit tried to smash.
    pub attempted: BTreeSet<IdentityTag>,
    /// Smash attempts that had no effect.
    pub ignored: BTreeSet<IdentityTag>,
}

impl HeavyInfo {
    /// Start tracking a freshly spawned unit.
    #[must_use]
    pub fn new(handle: EntityHandle, lane: Lane, wave: u32, spawn_tick: i64) -> Self {
        Self {
            handle,
            lane,
            wave,
            spawn_tick,
            alive_time: 0,
            hit_by: BTreeSet::new(),
            attempted: BTreeSet::new(),
            ignored: BTreeSet::new(),
        }
    }

    /// Copy the observable state from the live unit.
    pub fn sync(&mut self, state: &UnitState) {
        self.alive_time = state.time_alive;
        self.hit_by.clone_from(&state.hit_by);
        self.attempted.clone_from(&state.attempted);
        self.ignored.clone_from(&state.ignored);
    }

    /// The unit smashed a protected entity at least once.
    #[must_use]
    pub fn smashed(&self) -> bool {
        !self.ignored.is_empty()
    }
}

/// Categorical outcome of one action against one heavy unit.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum OutcomeState {
    /// The unit was already gone at the decision tick.
    Dead,
    /// The action affected the unit.
    Hit,
    /// The unit was alive but unaffected.
    Miss,
    /// The unit had not spawned yet.
    NotBorn,
}

impl OutcomeState {
    /// Short column label for reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Dead => "dead",
            Self::Hit => "hit",
            Self::Miss => "miss",
            Self::NotBorn => "not born",
        }
    }
}

/// Classify an action against a tracked heavy unit.
///
/// Ash actions hit when one of their entities is in the unit's hit-by set;
/// fodder actions hit when the unit attempted to smash one of their
/// entities. Handles that went stale simply never match.
#[must_use]
pub fn classify(action: &ActionInfo, heavy: &HeavyInfo) -> OutcomeState {
    if action.tick < heavy.spawn_tick {
        return OutcomeState::NotBorn;
    }
    if action.tick > heavy.spawn_tick + heavy.alive_time {
        return OutcomeState::Dead;
    }

    let seen = match action.class {
        ActionClass::Ash => &heavy.hit_by,
        ActionClass::Fodder => &heavy.attempted,
    };
    if action.handles.iter().any(|handle| seen.contains(&handle.tag())) {
        OutcomeState::Hit
    } else {
        OutcomeState::Miss
    }
}

/// Loss observed on one lane's protected entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LossSample {
    /// Explosions absorbed so far.
    pub explode: ExplodeCounts,
    /// Hit points lost so far.
    pub hp_loss: i64,
}

impl LossSample {
    /// Scalar loss: weighted explosions plus hit points.
    #[must_use]
    pub fn value(&self) -> i64 {
        EXPLODE_WEIGHT * i64::from(self.explode.total()) + self.hp_loss
    }
}

/// Per-lane losses at one tick.
pub type LossSnapshot = [LossSample; MAX_LANES];

/// Tick-indexed losses observed during one wave's window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaveLoss {
    /// Wave number (1-based).
    pub wave: u32,
    /// First observed tick, relative to the wave start.
    pub start_tick: i64,
    /// One snapshot per observed tick.
    pub snapshots: Vec<LossSnapshot>,
}

/// Everything observed in one trial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialRecord {
    /// Tracked actions, indexed by Op slot.
    pub actions: Vec<ActionInfo>,
    /// Tracked heavy units, in spawn order.
    pub heavies: Vec<HeavyInfo>,
    /// Protected entities, one entry per configured position.
    pub protected: Vec<Option<EntityHandle>>,
    /// Field-wide static entities have been placed.
    pub statics_placed: bool,
    /// Observation windows, one per wave when the scenario samples losses.
    pub losses: Vec<WaveLoss>,
    /// Kinds the trial's waves are summoned from; drawn on first summon.
    pub spawn_types: SpawnTypes,
    /// One sample per summoned wave.
    pub refresh: Vec<RefreshSample>,
}

impl TrialRecord {
    /// Empty record shaped after a compiled schedule.
    #[must_use]
    pub fn new(schedule: &Schedule, protected: usize) -> Self {
        Self {
            actions: schedule.actions.clone(),
            heavies: Vec::new(),
            protected: vec![None; protected],
            statics_placed: false,
            losses: schedule
                .windows
                .iter()
                .map(|window| WaveLoss {
                    wave: window.wave,
                    start_tick: window.start - window.base,
                    snapshots: Vec::new(),
                })
                .collect(),
            spawn_types: SpawnTypes::default(),
            refresh: Vec::new(),
        }
    }

    /// Refresh sample of `wave`, if it was summoned.
    pub fn refresh_sample_mut(&mut self, wave: u32) -> Option<&mut RefreshSample> {
        self.refresh.iter_mut().find(|sample| sample.wave == wave)
    }

    /// Heavy units that smashed a protected entity.
    #[must_use]
    pub fn smashed_count(&self) -> usize {
        self.heavies.iter().filter(|heavy| heavy.smashed()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heavy(spawn_tick: i64, alive_time: i64) -> HeavyInfo {
        let mut info = HeavyInfo::new(EntityHandle::new(0, 1), 2, 1, spawn_tick);
        info.alive_time = alive_time;
        info
    }

    fn action(class: ActionClass, tick: i64, handles: Vec<EntityHandle>) -> ActionInfo {
        ActionInfo {
            class,
            wave: 1,
            tick,
            label: format!("{tick}PP"),
            handles,
        }
    }

    #[test]
    fn test_classify_by_tick() {
        let giga = heavy(500, 200);
        let shell = EntityHandle::new(3, 42);

        assert_eq!(classify(&action(ActionClass::Ash, 450, vec![shell]), &giga), OutcomeState::NotBorn);
        assert_eq!(classify(&action(ActionClass::Ash, 750, vec![shell]), &giga), OutcomeState::Dead);
        assert_eq!(classify(&action(ActionClass::Ash, 600, vec![shell]), &giga), OutcomeState::Miss);
    }

    #[test]
    fn test_classify_hit_by_class() {
        let mut giga = heavy(500, 200);
        giga.hit_by.insert(42);
        giga.attempted.insert(77);

        let shell = EntityHandle::new(3, 42);
        let fodder = EntityHandle::new(4, 77);
        assert_eq!(classify(&action(ActionClass::Ash, 600, vec![shell]), &giga), OutcomeState::Hit);
        assert_eq!(classify(&action(ActionClass::Fodder, 600, vec![fodder]), &giga), OutcomeState::Hit);
        assert_eq!(classify(&action(ActionClass::Fodder, 600, vec![shell]), &giga), OutcomeState::Miss);
    }

    #[test]
    fn test_classify_boundaries() {
        let giga = heavy(500, 200);
        assert_eq!(classify(&action(ActionClass::Ash, 500, vec![]), &giga), OutcomeState::Miss);
        assert_eq!(classify(&action(ActionClass::Ash, 700, vec![]), &giga), OutcomeState::Miss);
    }

    #[test]
    fn test_outcome_order() {
        assert!(OutcomeState::Dead < OutcomeState::Hit);
        assert!(OutcomeState::Miss < OutcomeState::NotBorn);
    }

    #[test]
    fn test_loss_value() {
        let sample = LossSample {
            explode: ExplodeCounts {
                from_upper: 1,
                from_same: 1,
                from_lower: 0,
            },
            hp_loss: 40,
        };
        assert_eq!(sample.value(), 640);
    }

    #[test]
    fn test_refresh_probability_thresholds() {
        assert!((refresh_probability(0.5) - 1.0).abs() < 1e-9);
        assert!((refresh_probability(0.575) - 0.5).abs() < 1e-9);
        assert!(refresh_probability(0.65).abs() < 1e-9);
    }

    #[test]
    fn test_refresh_probability_clamps() {
        assert!((refresh_probability(0.1) - 1.0).abs() < 1e-9);
        assert!(refresh_probability(0.9).abs() < 1e-9);
        assert!(refresh_probability(1.0).abs() < 1e-9);
    }

    #[test]
    fn test_goal_accident_rate() {
        assert!((RefreshGoal::Delay.accident_rate(0.25) - 0.25).abs() < 1e-9);
        assert!((RefreshGoal::Activate.accident_rate(0.25) - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_hp_ratio_needs_measurement() {
        let mut sample = RefreshSample {
            wave: 1,
            init_hp: 2000,
            current_hp: None,
        };
        assert_eq!(sample.hp_ratio(), None);
        sample.current_hp = Some(1150);
        assert_eq!(sample.hp_ratio(), Some(0.575));
        sample.init_hp = 0;
        assert_eq!(sample.hp_ratio(), None);
    }

    #[test]
    fn test_sync_copies_sets() {
        let mut info = heavy(0, 0);
        let state = UnitState {
            kind: crate::engine::UnitKind::GigaGargantuar,
            lane: 2,
            x: crate::math::fixed_px(500),
            hp: 100,
            wave: 1,
            spawn_tick: 0,
            time_alive: 321,
            dying: false,
            hit_by: [5].into_iter().collect(),
            attempted: [6].into_iter().collect(),
            ignored: [6].into_iter().collect(),
        };
        info.sync(&state);
        assert_eq!(info.alive_time, 321);
        assert!(info.smashed());
        assert!(info.hit_by.contains(&5));
    }
}
