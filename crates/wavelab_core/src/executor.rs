//! Stepping the simulation and firing Ops.
//!
//! The executor walks a compiled [`Schedule`] against a [`Simulation`]:
//!
//! ```text
//! Idle ──run──► Running ──ops exhausted, windows closed──► Done
//! ```
//!
//! Time starts at the earliest Op's tick, which may be negative. Between
//! Ops the simulation is advanced in one call; inside an observation window
//! it is advanced one tick at a time and a loss snapshot is taken after the
//! Ops of each tick fire.

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, trace};

use crate::action::{fodder_at, PlantKind};
use crate::engine::{PlantFlags, Simulation, UnitKind};
use crate::record::{HeavyInfo, LossSample, LossSnapshot, RefreshSample, TrialRecord};
use crate::scene::MAX_LANES;
use crate::schedule::{Effect, Roster, ScenarioMode, Schedule, Setting};
use crate::selector::{select, select_card};
use crate::summon::SpawnTypes;

/// Hit points given to protected entities in explode scenarios.
pub const PROTECTED_HP: i32 = i32::MAX / 2;

/// Units of each kind in the light-unit assault.
pub const ASSAULT_PER_KIND: usize = 5;

/// Kinds making up the light-unit assault.
pub const ASSAULT_KINDS: [UnitKind; 4] = [
    UnitKind::JackInTheBox,
    UnitKind::Ladder,
    UnitKind::Football,
    UnitKind::Catapult,
];

/// Executor lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorState {
    /// Not started.
    Idle,
    /// Stepping through the schedule.
    Running,
    /// Every Op fired and every window closed.
    Done,
}

/// Runs one compiled schedule as one trial.
#[derive(Debug)]
pub struct Executor<'a> {
    setting: &'a Setting,
    mode: ScenarioMode,
    schedule: Schedule,
    state: ExecutorState,
    clock: i64,
}

impl<'a> Executor<'a> {
    /// Prepare a trial.
    #[must_use]
    pub fn new(setting: &'a Setting, mode: ScenarioMode, schedule: Schedule) -> Self {
        Self {
            setting,
            mode,
            schedule,
            state: ExecutorState::Idle,
            clock: 0,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ExecutorState {
        self.state
    }

    /// Scenario tick the executor has reached.
    #[must_use]
    pub const fn clock(&self) -> i64 {
        self.clock
    }

    /// The schedule being run.
    #[must_use]
    pub const fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Run the whole schedule against a freshly reset simulation.
    pub fn run<S: Simulation, R: Rng + ?Sized>(&mut self, sim: &mut S, rng: &mut R) -> TrialRecord {
        sim.reset();
        let mut record = TrialRecord::new(&self.schedule, self.setting.protected.len());
        self.state = ExecutorState::Running;

        let Some(start) = self.schedule.min_tick() else {
            self.state = ExecutorState::Done;
            return record;
        };
        self.clock = start;
        trace!(start, ops = self.schedule.op_count(), "trial started");

        let mut cursor = 0;
        for (window_idx, window) in self.schedule.windows.iter().enumerate() {
            while let Some(op) = self.schedule.ops.get(cursor).filter(|op| op.tick < window.start) {
                advance_to(sim, &mut self.clock, op.tick);
                self.apply(&op.effect, sim, rng, &mut record);
                cursor += 1;
            }
            advance_to(sim, &mut self.clock, window.start);

            while self.clock <= window.end {
                while let Some(op) = self.schedule.ops.get(cursor).filter(|op| op.tick <= self.clock) {
                    self.apply(&op.effect, sim, rng, &mut record);
                    cursor += 1;
                }
                let snapshot = self.snapshot(sim, &record);
                record.losses[window_idx].snapshots.push(snapshot);
                let next = self.clock + 1;
                advance_to(sim, &mut self.clock, next);
            }
        }

        while let Some(op) = self.schedule.ops.get(cursor) {
            advance_to(sim, &mut self.clock, op.tick);
            self.apply(&op.effect, sim, rng, &mut record);
            cursor += 1;
        }

        self.state = ExecutorState::Done;
        debug!(
            end = self.clock,
            heavies = record.heavies.len(),
            smashed = record.smashed_count(),
            "trial finished"
        );
        record
    }

    fn apply<S: Simulation, R: Rng + ?Sized>(
        &self,
        effect: &Effect,
        sim: &mut S,
        rng: &mut R,
        record: &mut TrialRecord,
    ) {
        match effect {
            Effect::Setup => self.setup(sim, record),
            Effect::Populate { wave, roster } => {
                for heavy in &mut record.heavies {
                    if let Some(unit) = sim.unit(heavy.handle) {
                        heavy.sync(unit);
                    }
                }
                sim.set_wave(*wave);
                self.populate(*wave, *roster, sim, rng, record);
            }
            Effect::Freeze => {
                sim.plant(PlantKind::IceShroom, 1, 1, PlantFlags::default());
            }
            Effect::Launch {
                slot,
                target,
                launcher_column,
            } => {
                let handle = sim.launch(*target, *launcher_column);
                record.actions[*slot].handles.push(handle);
            }
            Effect::PlaceCard { slot, kind, pos } => {
                let handle = sim.plant(*kind, pos.lane, pos.column, PlantFlags::default());
                record.actions[*slot].handles.push(handle);
            }
            Effect::PlaceBestCard {
                slot,
                kind,
                candidates,
            } => {
                if let Some(idx) = select_card(sim, candidates, kind.lane_reach()) {
                    let pos = candidates[idx];
                    let handle = sim.plant(*kind, pos.lane, pos.column, PlantFlags::default());
                    record.actions[*slot].handles.push(handle);
                }
            }
            Effect::PlaceFodder {
                slot,
                fodders,
                positions,
            } => {
                for (idx, pos) in positions.iter().enumerate() {
                    let kind = fodder_at(fodders, idx).plant();
                    let handle = sim.plant(kind, pos.lane, pos.column, PlantFlags::default());
                    record.actions[*slot].handles.push(handle);
                }
            }
            Effect::PlaceChosenFodder {
                slot,
                fodders,
                candidates,
                rule,
                choose,
                waves,
            } => {
                for idx in select(sim, candidates, *choose, *rule, waves) {
                    let pos = candidates[idx];
                    let kind = fodder_at(fodders, idx).plant();
                    let handle = sim.plant(kind, pos.lane, pos.column, PlantFlags::default());
                    record.actions[*slot].handles.push(handle);
                }
            }
            Effect::Remove { slot } => {
                for handle in &record.actions[*slot].handles {
                    sim.destroy(*handle);
                }
            }
            Effect::MeasureHp { wave } => {
                let current = wave_hp(sim, *wave);
                if let Some(sample) = record.refresh_sample_mut(*wave) {
                    sample.current_hp = Some(current);
                    trace!(wave = *wave, init = sample.init_hp, current, "refresh check");
                }
            }
        }
    }

    fn setup<S: Simulation>(&self, sim: &mut S, record: &mut TrialRecord) {
        if self.mode == ScenarioMode::Explode && !record.statics_placed {
            for lane in 1..=sim.scene().lane_count() {
                sim.plant(PlantKind::Umbrella, lane, 1, PlantFlags::default());
            }
        }
        record.statics_placed = true;

        let flags = match self.mode {
            ScenarioMode::Smash | ScenarioMode::Refresh => PlantFlags {
                ignore_smash: true,
                ..PlantFlags::default()
            },
            ScenarioMode::Explode => PlantFlags {
                ignore_explode: true,
                hp: Some(PROTECTED_HP),
                ..PlantFlags::default()
            },
        };

        for (pos, slot) in self.setting.protected.iter().zip(record.protected.iter_mut()) {
            if slot.is_some_and(|handle| sim.is_valid(handle)) {
                continue;
            }
            *slot = Some(sim.plant(pos.plant_kind(), pos.lane, pos.plant_column(), flags));
        }
    }

    fn populate<S: Simulation, R: Rng + ?Sized>(
        &self,
        wave: u32,
        roster: Roster,
        sim: &mut S,
        rng: &mut R,
        record: &mut TrialRecord,
    ) {
        match roster {
            Roster::Giga(count) => {
                let mut lanes = self.setting.protected_lanes();
                if lanes.is_empty() {
                    lanes = sim.scene().ground_lanes();
                }
                for _ in 0..count {
                    let Some(lane) = lanes.choose(rng).copied() else {
                        break;
                    };
                    let handle = sim.spawn_unit(UnitKind::GigaGargantuar, lane);
                    record
                        .heavies
                        .push(HeavyInfo::new(handle, lane, wave, self.clock));
                }
            }
            Roster::Assault => {
                let lanes = sim.scene().ground_lanes();
                for kind in ASSAULT_KINDS {
                    for _ in 0..ASSAULT_PER_KIND {
                        if let Some(&lane) = lanes.choose(rng) {
                            sim.spawn_unit(kind, lane);
                        }
                    }
                }
            }
            Roster::Summon => {
                if record.spawn_types.is_empty() {
                    record.spawn_types = SpawnTypes::draw(rng);
                }
                let lanes = sim.scene().ground_lanes();
                for kind in record.spawn_types.spawn_list(rng) {
                    if let Some(&lane) = lanes.choose(rng) {
                        sim.spawn_unit(kind, lane);
                    }
                }
                record.refresh.push(RefreshSample {
                    wave,
                    init_hp: wave_hp(sim, wave),
                    current_hp: None,
                });
            }
            Roster::Empty => {}
        }
    }

    fn snapshot<S: Simulation>(&self, sim: &S, record: &TrialRecord) -> LossSnapshot {
        let mut snapshot = [LossSample::default(); MAX_LANES];
        for handle in record.protected.iter().flatten() {
            if let Some(defender) = sim.defender(*handle) {
                let lane = usize::from(defender.lane).checked_sub(1);
                if let Some(sample) = lane.and_then(|idx| snapshot.get_mut(idx)) {
                    sample.explode += defender.explode;
                    sample.hp_loss += i64::from(defender.hp_loss());
                }
            }
        }
        snapshot
    }
}

/// Hit points of every live unit of `wave`.
fn wave_hp<S: Simulation>(sim: &S, wave: u32) -> i64 {
    sim.units()
        .filter(|(_, unit)| unit.wave == wave && !unit.dying)
        .map(|(_, unit)| i64::from(unit.hp))
        .sum()
}

fn advance_to<S: Simulation>(sim: &mut S, clock: &mut i64, target: i64) {
    if target > *clock {
        sim.advance(target - *clock);
        *clock = target;
    }
}
