//! Compiling waves into a tick-sorted Op list.
//!
//! # Algorithm
//!
//! A running base tick starts at 0. For each wave:
//!
//! 1. a setup Op and a population Op at the base tick
//! 2. one freeze Op per cue, `lead` ticks ahead of the cue
//! 3. the Op(s) of every action, shifted back by the offset from
//!    [`crate::timing`]; projectiles expand into one Op per target
//! 4. a removal Op for actions that carry a removal tick
//! 5. in refresh scenarios, an HP check Op [`REFRESH_CHECK_TICK`] ticks in
//!
//! then the base tick advances by the wave length. The horizon policy of the
//! scenario mode is applied, the list is stably sorted by tick (same-tick
//! Ops keep declaration order) and a trailing resync Op is appended one tick
//! after both the last wave and the latest Op.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::action::{Action, CardPos, FodderKind, PlantKind, ProjectileTarget, SelectionRule};
use crate::error::{Result, ScheduleError};
use crate::record::ActionInfo;
use crate::scene::{Lane, SceneKind};
use crate::timing::{removal_offset, resolve_offset};

/// Ticks at the end of each wave that are never observed.
pub const WINDOW_TAIL: i64 = 200;

/// Ticks after a wave's summon at which its remaining HP is measured.
pub const REFRESH_CHECK_TICK: i64 = 401;

/// What happens to Ops whose tick lies beyond the last wave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HorizonPolicy {
    /// Drop them.
    Truncate,
    /// Keep them; the executor drains them after the last window.
    Keep,
}

/// Which pipeline a scenario runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScenarioMode {
    /// Heavy units against smash-ignoring protected entities; outcome
    /// signatures per heavy unit.
    Smash,
    /// Light-unit assault against explosion-ignoring protected entities;
    /// tick-indexed loss.
    Explode,
    /// Randomly composed waves; the share of each wave's HP still standing
    /// at the refresh check.
    Refresh,
}

impl ScenarioMode {
    /// Ticks between a freeze Op and its cue.
    #[must_use]
    pub const fn freeze_lead(self) -> i64 {
        match self {
            Self::Smash => 100,
            Self::Explode | Self::Refresh => 99,
        }
    }

    /// Horizon policy applied by [`compile`].
    #[must_use]
    pub const fn horizon(self) -> HorizonPolicy {
        match self {
            Self::Smash => HorizonPolicy::Truncate,
            Self::Explode | Self::Refresh => HorizonPolicy::Keep,
        }
    }

    /// Mode samples per-tick losses inside observation windows.
    #[must_use]
    pub const fn samples_losses(self) -> bool {
        matches!(self, Self::Explode)
    }

    /// Mode measures wave HP at the refresh check.
    #[must_use]
    pub const fn measures_refresh(self) -> bool {
        matches!(self, Self::Refresh)
    }
}

/// One unit-spawning phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wave {
    /// Freeze cue ticks, relative to the wave start.
    #[serde(rename = "iceTimes", default)]
    pub freeze_cues: Vec<i64>,
    /// Wave duration in ticks.
    #[serde(rename = "waveLength")]
    pub length: i64,
    /// First observed tick, relative to the wave start.
    #[serde(rename = "startTick", default, skip_serializing_if = "Option::is_none")]
    pub observe_from: Option<i64>,
    /// Player decisions, in declaration order.
    #[serde(default)]
    pub actions: Vec<Action>,
}

impl Wave {
    /// Wave with no cues or actions.
    #[must_use]
    pub fn new(length: i64) -> Self {
        Self {
            freeze_cues: Vec::new(),
            length,
            observe_from: None,
            actions: Vec::new(),
        }
    }

    /// First observed tick, relative to the wave start.
    #[must_use]
    pub fn observe_start(&self) -> i64 {
        self.observe_from.unwrap_or(self.length - WINDOW_TAIL)
    }

    /// Last observed tick, relative to the wave start.
    #[must_use]
    pub const fn observe_end(&self) -> i64 {
        self.length - WINDOW_TAIL
    }
}

/// Protected entity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtectedKind {
    /// Projectile launcher; the column names its right cell.
    #[serde(rename = "Cob")]
    Launcher,
    /// Single-cell protected entity.
    Normal,
}

/// Where a protected entity stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProtectedPos {
    /// Entity kind.
    #[serde(rename = "type")]
    pub kind: ProtectedKind,
    /// Lane (1-based).
    #[serde(rename = "row")]
    pub lane: Lane,
    /// Column (1-based).
    #[serde(rename = "col")]
    pub column: u8,
}

impl ProtectedPos {
    /// Defender kind placed for this position.
    #[must_use]
    pub const fn plant_kind(&self) -> PlantKind {
        match self.kind {
            ProtectedKind::Launcher => PlantKind::Launcher,
            ProtectedKind::Normal => PlantKind::Umbrella,
        }
    }

    /// Leftmost column the defender occupies.
    #[must_use]
    pub const fn plant_column(&self) -> u8 {
        match self.kind {
            ProtectedKind::Launcher => self.column.saturating_sub(1),
            ProtectedKind::Normal => self.column,
        }
    }
}

/// Static scenario setting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setting {
    /// Scene the scenario is played on.
    #[serde(default)]
    pub scene: SceneKind,
    /// Protected entities placed by every setup Op.
    #[serde(rename = "protect", default)]
    pub protected: Vec<ProtectedPos>,
}

impl Setting {
    /// Lanes of the protected entities, in declaration order.
    #[must_use]
    pub fn protected_lanes(&self) -> Vec<Lane> {
        self.protected.iter().map(|pos| pos.lane).collect()
    }
}

/// Opposing units created by a population Op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Roster {
    /// This many tracked heavy units in randomly chosen protected lanes.
    Giga(usize),
    /// The fixed light-unit assault, in random ground lanes.
    Assault,
    /// A full wave drawn from the trial's spawn types, in random ground
    /// lanes.
    Summon,
    /// Nothing; the Op only refreshes tracked state.
    Empty,
}

/// What an Op does when it fires.
///
/// `slot` indexes the trial record's action list.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Place the protected and static entities that are missing.
    Setup,
    /// Refresh tracked heavy units, then spawn the roster.
    Populate {
        /// Wave number stamped on spawned units.
        wave: u32,
        /// Units to spawn.
        roster: Roster,
    },
    /// Start a freeze.
    Freeze,
    /// Fire one projectile.
    Launch {
        /// Action slot.
        slot: usize,
        /// Impact point.
        target: ProjectileTarget,
        /// Launcher column on elevated terrain.
        launcher_column: Option<u8>,
    },
    /// Place a card at a fixed cell.
    PlaceCard {
        /// Action slot.
        slot: usize,
        /// Card kind.
        kind: PlantKind,
        /// Target cell.
        pos: CardPos,
    },
    /// Place a card at the best candidate cell.
    PlaceBestCard {
        /// Action slot.
        slot: usize,
        /// Card kind.
        kind: PlantKind,
        /// Candidate cells.
        candidates: Vec<CardPos>,
    },
    /// Place fodder at fixed cells.
    PlaceFodder {
        /// Action slot.
        slot: usize,
        /// Fodder kind per cell.
        fodders: Vec<FodderKind>,
        /// Target cells.
        positions: Vec<CardPos>,
    },
    /// Place fodder at cells chosen from live state.
    PlaceChosenFodder {
        /// Action slot.
        slot: usize,
        /// Fodder kind per candidate.
        fodders: Vec<FodderKind>,
        /// Candidate cells.
        candidates: Vec<CardPos>,
        /// Ranking rule.
        rule: SelectionRule,
        /// How many cells to take.
        choose: usize,
        /// Spawn waves that count for ranking.
        waves: BTreeSet<u32>,
    },
    /// Remove every entity an action created.
    Remove {
        /// Action slot.
        slot: usize,
    },
    /// Record the HP still standing in a summoned wave.
    MeasureHp {
        /// Wave to measure.
        wave: u32,
    },
}

/// A scheduled, tick-stamped effect.
#[derive(Debug, Clone, PartialEq)]
pub struct Op {
    /// Absolute tick the Op fires at. May be negative.
    pub tick: i64,
    /// Effect applied to the simulation.
    pub effect: Effect,
}

impl Op {
    /// Create an Op.
    #[must_use]
    pub const fn new(tick: i64, effect: Effect) -> Self {
        Self { tick, effect }
    }
}

/// Absolute tick range of one wave's loss observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservationWindow {
    /// Wave number (1-based).
    pub wave: u32,
    /// Absolute tick the wave starts at.
    pub base: i64,
    /// First observed tick.
    pub start: i64,
    /// Last observed tick, inclusive.
    pub end: i64,
}

/// A compiled scenario round.
#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    /// Ops sorted by tick.
    pub ops: Vec<Op>,
    /// Tracked action templates, indexed by Op slot.
    pub actions: Vec<ActionInfo>,
    /// Observation windows, in wave order.
    pub windows: Vec<ObservationWindow>,
    /// Absolute tick the last wave ends at.
    pub end_tick: i64,
}

impl Schedule {
    /// Number of Ops.
    #[must_use]
    pub fn op_count(&self) -> usize {
        self.ops.len()
    }

    /// Tick of the earliest Op.
    #[must_use]
    pub fn min_tick(&self) -> Option<i64> {
        self.ops.first().map(|op| op.tick)
    }

    /// Display labels of the tracked actions, in declaration order.
    #[must_use]
    pub fn labels(&self) -> Vec<&str> {
        self.actions.iter().map(|action| action.label.as_str()).collect()
    }
}

/// Compile a round of waves into a sorted schedule.
///
/// `heavy_total` tracked heavy units are split evenly over the waves in
/// [`ScenarioMode::Smash`].
pub fn compile(
    setting: &Setting,
    waves: &[Wave],
    mode: ScenarioMode,
    heavy_total: usize,
) -> Result<Schedule> {
    let scene = setting.scene;
    let heavy_per_wave = heavy_total.checked_div(waves.len()).unwrap_or(0);

    let mut ops = Vec::new();
    let mut actions = Vec::new();
    let mut windows = Vec::new();
    let mut base = 0;

    for (idx, wave) in waves.iter().enumerate() {
        let wave_num = idx as u32 + 1;
        let roster = match mode {
            ScenarioMode::Smash => Roster::Giga(heavy_per_wave),
            ScenarioMode::Explode => Roster::Assault,
            ScenarioMode::Refresh => Roster::Summon,
        };

        ops.push(Op::new(base, Effect::Setup));
        ops.push(Op::new(
            base,
            Effect::Populate {
                wave: wave_num,
                roster,
            },
        ));

        if mode.measures_refresh() {
            ops.push(Op::new(
                base + REFRESH_CHECK_TICK,
                Effect::MeasureHp { wave: wave_num },
            ));
        }

        for cue in &wave.freeze_cues {
            ops.push(Op::new(base + cue - mode.freeze_lead(), Effect::Freeze));
        }

        for action in &wave.actions {
            action.validate(scene)?;
            let slot = actions.len();
            let tick = base + action.tick();
            actions.push(ActionInfo {
                class: action.class(),
                wave: wave_num,
                tick,
                label: action.label(),
                handles: Vec::new(),
            });
            emit_action(&mut ops, action, slot, tick, scene)?;

            if let Some(offset) = removal_offset(action) {
                ops.push(Op::new(tick + offset, Effect::Remove { slot }));
            }
        }

        if mode.samples_losses() {
            windows.push(ObservationWindow {
                wave: wave_num,
                base,
                start: base + wave.observe_start(),
                end: base + wave.observe_end(),
            });
        }

        base += wave.length;
    }

    if mode.horizon() == HorizonPolicy::Truncate {
        ops.retain(|op| op.tick <= base);
    }
    ops.sort_by_key(|op| op.tick);

    let latest = ops.last().map_or(base, |op| op.tick);
    ops.push(Op::new(
        (base + 1).max(latest + 1),
        Effect::Populate {
            wave: waves.len() as u32 + 1,
            roster: Roster::Empty,
        },
    ));

    Ok(Schedule {
        ops,
        actions,
        windows,
        end_tick: base,
    })
}

fn emit_action(
    ops: &mut Vec<Op>,
    action: &Action,
    slot: usize,
    tick: i64,
    scene: SceneKind,
) -> Result<()> {
    match action {
        Action::Projectile(a) => {
            for (idx, target) in a.positions.iter().enumerate() {
                let offset = resolve_offset(action, idx, scene)?;
                ops.push(Op::new(
                    tick - offset,
                    Effect::Launch {
                        slot,
                        target: *target,
                        launcher_column: a.launcher_column,
                    },
                ));
            }
        }
        Action::FixedCard(a) => {
            let offset = resolve_offset(action, 0, scene)?;
            ops.push(Op::new(
                tick - offset,
                Effect::PlaceCard {
                    slot,
                    kind: a.kind,
                    pos: a.position,
                },
            ));
        }
        Action::DynamicCard(a) => {
            let offset = resolve_offset(action, 0, scene)?;
            ops.push(Op::new(
                tick - offset,
                Effect::PlaceBestCard {
                    slot,
                    kind: a.kind,
                    candidates: a.positions.clone(),
                },
            ));
        }
        Action::FixedFodder(a) => {
            ops.push(Op::new(
                tick,
                Effect::PlaceFodder {
                    slot,
                    fodders: a.fodders.clone(),
                    positions: a.positions.clone(),
                },
            ));
        }
        Action::DynamicFodder(a) => {
            let rule = SelectionRule::from_symbol(&a.symbol)
                .ok_or_else(|| ScheduleError::UnknownSelectionRule(a.symbol.clone()))?;
            ops.push(Op::new(
                tick,
                Effect::PlaceChosenFodder {
                    slot,
                    fodders: a.fodders.clone(),
                    candidates: a.positions.clone(),
                    rule,
                    choose: a.choose,
                    waves: a.waves.clone(),
                },
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{DynamicFodderAction, FixedFodderAction, ProjectileAction};

    fn setting() -> Setting {
        Setting {
            scene: SceneKind::Day,
            protected: vec![ProtectedPos {
                kind: ProtectedKind::Launcher,
                lane: 2,
                column: 8,
            }],
        }
    }

    fn projectile(tick: i64, lane: Lane, column: f32) -> Action {
        Action::Projectile(ProjectileAction {
            symbol: "PP".to_string(),
            tick,
            positions: vec![ProjectileTarget { lane, column }],
            launcher_column: None,
        })
    }

    fn launch_ticks(schedule: &Schedule) -> Vec<i64> {
        schedule
            .ops
            .iter()
            .filter(|op| matches!(op.effect, Effect::Launch { .. }))
            .map(|op| op.tick)
            .collect()
    }

    #[test]
    fn test_single_projectile_fires_early() {
        let mut wave = Wave::new(601);
        wave.actions.push(projectile(300, 2, 9.0));

        let schedule = compile(&setting(), &[wave], ScenarioMode::Smash, 0).unwrap();
        assert_eq!(launch_ticks(&schedule), vec![-73]);
        assert_eq!(schedule.min_tick(), Some(-73));
        assert_eq!(schedule.labels(), vec!["300PP"]);
    }

    #[test]
    fn test_ops_sorted_and_stable() {
        let mut wave = Wave::new(1000);
        wave.freeze_cues.push(100);
        wave.actions.push(projectile(400, 1, 9.0));
        wave.actions.push(projectile(400, 5, 9.0));

        let schedule = compile(&setting(), &[wave], ScenarioMode::Smash, 2).unwrap();
        assert!(schedule.ops.windows(2).all(|w| w[0].tick <= w[1].tick));

        // setup, populate and freeze all land on tick 0, in that order
        assert_eq!(schedule.ops[0].effect, Effect::Setup);
        assert!(matches!(schedule.ops[1].effect, Effect::Populate { wave: 1, .. }));
        assert_eq!(schedule.ops[2].effect, Effect::Freeze);

        let slots: Vec<usize> = schedule
            .ops
            .iter()
            .filter_map(|op| match op.effect {
                Effect::Launch { slot, .. } => Some(slot),
                _ => None,
            })
            .collect();
        assert_eq!(slots, vec![0, 1]);
    }

    #[test]
    fn test_multi_target_projectile_expands() {
        let mut wave = Wave::new(1000);
        wave.actions.push(Action::Projectile(ProjectileAction {
            symbol: "PP".to_string(),
            tick: 500,
            positions: vec![
                ProjectileTarget { lane: 2, column: 9.0 },
                ProjectileTarget { lane: 3, column: 9.0 },
            ],
            launcher_column: None,
        }));

        let setting = Setting {
            scene: SceneKind::Fog,
            ..Setting::default()
        };
        let schedule = compile(&setting, &[wave], ScenarioMode::Smash, 0).unwrap();
        assert_eq!(launch_ticks(&schedule), vec![122, 127]);
        assert_eq!(schedule.actions.len(), 1);
    }

    #[test]
    fn test_truncate_drops_late_ops() {
        let mut wave = Wave::new(300);
        wave.actions.push(Action::FixedFodder(FixedFodderAction {
            symbol: "F".to_string(),
            tick: 200,
            removal_tick: Some(400),
            fodders: vec![],
            positions: vec![CardPos::new(1, 9)],
        }));

        let smash = compile(&setting(), &[wave.clone()], ScenarioMode::Smash, 0).unwrap();
        assert!(!smash.ops.iter().any(|op| matches!(op.effect, Effect::Remove { .. })));
        assert_eq!(smash.ops.last().map(|op| op.tick), Some(301));

        let explode = compile(&setting(), &[wave], ScenarioMode::Explode, 0).unwrap();
        let removal = explode
            .ops
            .iter()
            .find(|op| matches!(op.effect, Effect::Remove { .. }))
            .map(|op| op.tick);
        assert_eq!(removal, Some(400));
        assert_eq!(explode.ops.last().map(|op| op.tick), Some(401));
    }

    #[test]
    fn test_trailing_resync() {
        let waves = vec![Wave::new(500), Wave::new(700)];
        let schedule = compile(&setting(), &waves, ScenarioMode::Smash, 4).unwrap();
        let last = schedule.ops.last().unwrap();
        assert_eq!(last.tick, 1201);
        assert_eq!(
            last.effect,
            Effect::Populate {
                wave: 3,
                roster: Roster::Empty
            }
        );
        assert_eq!(schedule.end_tick, 1200);
        assert!(schedule.ops.iter().any(|op| op.tick == 500
            && op.effect
                == Effect::Populate {
                    wave: 2,
                    roster: Roster::Giga(2)
                }));
    }

    #[test]
    fn test_freeze_lead_per_mode() {
        let mut wave = Wave::new(1000);
        wave.freeze_cues.push(300);
        let freeze = |mode: ScenarioMode| {
            compile(&setting(), &[wave.clone()], mode, 0)
                .unwrap()
                .ops
                .iter()
                .find(|op| op.effect == Effect::Freeze)
                .map(|op| op.tick)
        };
        assert_eq!(freeze(ScenarioMode::Smash), Some(200));
        assert_eq!(freeze(ScenarioMode::Explode), Some(201));
        assert_eq!(freeze(ScenarioMode::Refresh), Some(201));
    }

    #[test]
    fn test_refresh_checks_every_wave() {
        let waves = vec![Wave::new(601), Wave::new(1200)];
        let schedule = compile(&setting(), &waves, ScenarioMode::Refresh, 0).unwrap();

        let checks: Vec<(i64, &Effect)> = schedule
            .ops
            .iter()
            .filter(|op| matches!(op.effect, Effect::MeasureHp { .. }))
            .map(|op| (op.tick, &op.effect))
            .collect();
        assert_eq!(
            checks,
            vec![
                (401, &Effect::MeasureHp { wave: 1 }),
                (1002, &Effect::MeasureHp { wave: 2 }),
            ]
        );
        assert!(schedule.ops.iter().any(|op| op.tick == 601
            && op.effect
                == Effect::Populate {
                    wave: 2,
                    roster: Roster::Summon
                }));
        assert!(schedule.windows.is_empty());
    }

    #[test]
    fn test_explode_windows() {
        let mut first = Wave::new(1000);
        first.observe_from = Some(500);
        let waves = vec![first, Wave::new(800)];
        let schedule = compile(&setting(), &waves, ScenarioMode::Explode, 0).unwrap();

        assert_eq!(
            schedule.windows,
            vec![
                ObservationWindow {
                    wave: 1,
                    base: 0,
                    start: 500,
                    end: 800
                },
                ObservationWindow {
                    wave: 2,
                    base: 1000,
                    start: 1600,
                    end: 1600
                },
            ]
        );
    }

    #[test]
    fn test_compile_rejects_bad_rule() {
        let mut wave = Wave::new(1000);
        wave.actions.push(Action::DynamicFodder(DynamicFodderAction {
            symbol: "C_BAD".to_string(),
            tick: 200,
            removal_tick: None,
            fodders: vec![],
            positions: vec![CardPos::new(1, 9)],
            choose: 1,
            waves: BTreeSet::new(),
        }));
        let err = compile(&setting(), &[wave], ScenarioMode::Smash, 0).unwrap_err();
        assert_eq!(err, ScheduleError::UnknownSelectionRule("C_BAD".to_string()));
    }

    #[test]
    fn test_protected_placement() {
        let launcher = setting().protected[0];
        assert_eq!(launcher.plant_kind(), PlantKind::Launcher);
        assert_eq!(launcher.plant_column(), 7);
    }
}
