//! Test fixtures and helpers.
//!
//! Scenario builders for the common action shapes, synthetic trial records
//! for aggregate tests, and a RON renderer for loader tests.

use serde::Serialize;
use wavelab_core::action::{
    Action, ActionClass, CardPos, DynamicFodderAction, FixedCardAction, FixedFodderAction,
    PlantKind, ProjectileAction, ProjectileTarget,
};
use wavelab_core::handle::EntityHandle;
use wavelab_core::engine::UnitKind;
use wavelab_core::record::{
    ActionInfo, HeavyInfo, LossSample, LossSnapshot, RefreshSample, TrialRecord, WaveLoss,
};
use wavelab_core::scene::{Lane, SceneKind};
use wavelab_core::schedule::{ProtectedKind, ProtectedPos, Setting, Wave};
use wavelab_core::summon::SpawnTypes;

/// Tag offset for the synthetic handles a [`RecordBuilder`] hands out.
pub const ACTION_TAG_BASE: u32 = 1000;

/// Single-cell protected entity.
#[must_use]
pub fn protect(lane: Lane, column: u8) -> ProtectedPos {
    ProtectedPos {
        kind: ProtectedKind::Normal,
        lane,
        column,
    }
}

/// Launcher protected entity; `column` names its right cell.
#[must_use]
pub fn launcher(lane: Lane, column: u8) -> ProtectedPos {
    ProtectedPos {
        kind: ProtectedKind::Launcher,
        lane,
        column,
    }
}

/// Setting on `scene` with the given protected entities.
#[must_use]
pub fn setting(scene: SceneKind, protected: Vec<ProtectedPos>) -> Setting {
    Setting { scene, protected }
}

/// Daytime lawn with one protected entity per lane, all in column 8.
#[must_use]
pub fn flat_setting(lanes: &[Lane]) -> Setting {
    setting(
        SceneKind::Day,
        lanes.iter().map(|&lane| protect(lane, 8)).collect(),
    )
}

/// Fogged backyard with launchers in column 8 of the given lanes.
#[must_use]
pub fn pool_setting(lanes: &[Lane]) -> Setting {
    setting(
        SceneKind::Fog,
        lanes.iter().map(|&lane| launcher(lane, 8)).collect(),
    )
}

/// Projectile strike at one target.
#[must_use]
pub fn projectile(tick: i64, lane: Lane, column: f32) -> Action {
    Action::Projectile(ProjectileAction {
        symbol: "P".to_string(),
        tick,
        positions: vec![ProjectileTarget { lane, column }],
        launcher_column: None,
    })
}

/// Projectile strike fired from an elevated launcher column.
#[must_use]
pub fn roof_projectile(tick: i64, lane: Lane, column: f32, launcher_column: u8) -> Action {
    Action::Projectile(ProjectileAction {
        symbol: "P".to_string(),
        tick,
        positions: vec![ProjectileTarget { lane, column }],
        launcher_column: Some(launcher_column),
    })
}

/// Card placed at a fixed cell.
#[must_use]
pub fn fixed_card(tick: i64, kind: PlantKind, lane: Lane, column: u8) -> Action {
    Action::FixedCard(FixedCardAction {
        symbol: format!("{kind:?}"),
        tick,
        removal_tick: None,
        kind,
        position: CardPos::new(lane, column),
    })
}

/// Normal fodder at fixed cells, optionally removed again.
#[must_use]
pub fn fixed_fodder(tick: i64, removal_tick: Option<i64>, cells: &[(Lane, u8)]) -> Action {
    Action::FixedFodder(FixedFodderAction {
        symbol: "F".to_string(),
        tick,
        removal_tick,
        fodders: Vec::new(),
        positions: cells_to_positions(cells),
    })
}

/// Normal fodder chosen from candidates under the rule `symbol`.
#[must_use]
pub fn dynamic_fodder(symbol: &str, tick: i64, cells: &[(Lane, u8)], choose: usize) -> Action {
    Action::DynamicFodder(DynamicFodderAction {
        symbol: symbol.to_string(),
        tick,
        removal_tick: None,
        fodders: Vec::new(),
        positions: cells_to_positions(cells),
        choose,
        waves: Default::default(),
    })
}

fn cells_to_positions(cells: &[(Lane, u8)]) -> Vec<CardPos> {
    cells
        .iter()
        .map(|&(lane, column)| CardPos::new(lane, column))
        .collect()
}

/// Wave of `length` ticks holding `actions`.
#[must_use]
pub fn wave(length: i64, actions: Vec<Action>) -> Wave {
    Wave {
        actions,
        ..Wave::new(length)
    }
}

/// Wave with freeze cues.
#[must_use]
pub fn frozen_wave(length: i64, freeze_cues: Vec<i64>, actions: Vec<Action>) -> Wave {
    Wave {
        freeze_cues,
        actions,
        ..Wave::new(length)
    }
}

/// Builds synthetic [`TrialRecord`]s without running a simulation.
///
/// Action `i` owns one handle tagged `ACTION_TAG_BASE + i`; `hit` marks the
/// last added heavy unit as affected by (ash) or as having attempted
/// (fodder) that action.
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    record: TrialRecord,
}

impl Default for RecordBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordBuilder {
    /// Empty record.
    #[must_use]
    pub fn new() -> Self {
        Self {
            record: TrialRecord {
                actions: Vec::new(),
                heavies: Vec::new(),
                protected: Vec::new(),
                statics_placed: false,
                losses: Vec::new(),
                spawn_types: SpawnTypes::default(),
                refresh: Vec::new(),
            },
        }
    }

    /// Track an action decided at absolute `tick`.
    #[must_use]
    pub fn action(mut self, class: ActionClass, tick: i64) -> Self {
        let slot = self.record.actions.len() as u32;
        self.record.actions.push(ActionInfo {
            class,
            wave: 1,
            tick,
            label: format!("{tick}A{slot}"),
            handles: vec![EntityHandle::new(slot, ACTION_TAG_BASE + slot)],
        });
        self
    }

    /// Track a heavy unit.
    #[must_use]
    pub fn heavy(mut self, lane: Lane, wave: u32, spawn_tick: i64, alive_time: i64) -> Self {
        let tag = self.record.heavies.len() as u32;
        let mut info = HeavyInfo::new(EntityHandle::new(tag, tag + 1), lane, wave, spawn_tick);
        info.alive_time = alive_time;
        self.record.heavies.push(info);
        self
    }

    /// The last heavy unit was affected by action `slot`.
    #[must_use]
    pub fn hit(mut self, slot: usize) -> Self {
        let class = self.record.actions.get(slot).map(|action| action.class);
        if let (Some(class), Some(heavy)) = (class, self.record.heavies.last_mut()) {
            let tag = ACTION_TAG_BASE + slot as u32;
            match class {
                ActionClass::Ash => heavy.hit_by.insert(tag),
                ActionClass::Fodder => heavy.attempted.insert(tag),
            };
        }
        self
    }

    /// The last heavy unit smashed a protected entity.
    #[must_use]
    pub fn smashed(mut self) -> Self {
        if let Some(heavy) = self.record.heavies.last_mut() {
            heavy.ignored.insert(u32::MAX);
        }
        self
    }

    /// Add an observed wave with one snapshot per entry of `losses`.
    ///
    /// Each entry sets the same hp loss on every lane with no explosions.
    #[must_use]
    pub fn losses(mut self, wave: u32, start_tick: i64, losses: &[i64]) -> Self {
        let snapshots = losses
            .iter()
            .map(|&hp_loss| uniform_snapshot(hp_loss))
            .collect();
        self.record.losses.push(WaveLoss {
            wave,
            start_tick,
            snapshots,
        });
        self
    }

    /// Add an observed wave with explicit snapshots.
    #[must_use]
    pub fn snapshots(mut self, wave: u32, start_tick: i64, snapshots: Vec<LossSnapshot>) -> Self {
        self.record.losses.push(WaveLoss {
            wave,
            start_tick,
            snapshots,
        });
        self
    }

    /// Set the kinds the record's waves were summoned from.
    #[must_use]
    pub fn spawn_types(mut self, kinds: &[UnitKind]) -> Self {
        self.record.spawn_types = SpawnTypes::new(kinds.iter().copied());
        self
    }

    /// Add a summoned wave with its HP at summon and at the check.
    #[must_use]
    pub fn refresh(mut self, wave: u32, init_hp: i64, current_hp: Option<i64>) -> Self {
        self.record.refresh.push(RefreshSample {
            wave,
            init_hp,
            current_hp,
        });
        self
    }

    /// Finish the record.
    #[must_use]
    pub fn build(self) -> TrialRecord {
        self.record
    }
}

/// Snapshot with `hp_loss` on every lane.
#[must_use]
pub fn uniform_snapshot(hp_loss: i64) -> LossSnapshot {
    [LossSample {
        explode: Default::default(),
        hp_loss,
    }; wavelab_core::scene::MAX_LANES]
}

#[derive(Serialize)]
struct Document<'a> {
    setting: &'a Setting,
    rounds: &'a [Vec<Wave>],
}

/// Render a scenario document as pretty RON.
///
/// # Panics
///
/// Panics if serialization fails (test-only helper).
#[must_use]
pub fn render_ron(setting: &Setting, rounds: &[Vec<Wave>]) -> String {
    ron::ser::to_string_pretty(&Document { setting, rounds }, ron::ser::PrettyConfig::default())
        .expect("scenario document serializes")
}
