//! Declarative player actions.
//!
//! An [`Action`] is one decision taken at a scenario-relative decision tick.
//! It carries no timing offsets: the effect tick is derived by
//! [`crate::timing`] when the schedule is compiled.
//!
//! The serde layout follows the scenario file format (`op` tag, `time`,
//! `row`/`col`, `shovelTime`, `cobCol`), so the same types load from RON or
//! JSON documents.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScheduleError};
use crate::scene::{Lane, SceneKind};

/// Projectile impact point: lane plus fractional column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectileTarget {
    /// Target lane.
    #[serde(rename = "row")]
    pub lane: Lane,
    /// Target column in `[0.0, 10.0]`.
    #[serde(rename = "col")]
    pub column: f32,
}

/// Grid cell for a placed card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CardPos {
    /// Lane (1-based).
    #[serde(rename = "row")]
    pub lane: Lane,
    /// Column (1-based).
    #[serde(rename = "col")]
    pub column: u8,
}

impl CardPos {
    /// Create a grid position.
    #[must_use]
    pub const fn new(lane: Lane, column: u8) -> Self {
        Self { lane, column }
    }
}

/// Defender kinds that can be placed on the field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlantKind {
    /// Projectile launcher; occupies two cells.
    Launcher,
    /// High-hp blocker.
    Wallnut,
    /// Blocker that also shields its neighbourhood from lobbed attacks.
    Umbrella,
    /// Cheap single-cell fodder.
    Puff,
    /// Cheap single-cell fodder.
    Pot,
    /// Burns a whole lane after its fuse.
    Jalapeno,
    /// Explodes over a 3x3 area after its fuse.
    CherryBomb,
    /// Crushes the first unit that comes within reach.
    Squash,
    /// Freezes every unit on the field after its fuse.
    IceShroom,
}

impl PlantKind {
    /// Immediate-effect area attacks: classified as ash, carry a fuse.
    #[must_use]
    pub const fn is_area_attack(self) -> bool {
        matches!(self, Self::Jalapeno | Self::CherryBomb)
    }

    /// Kinds whose effect is damage to units rather than absorbing them.
    #[must_use]
    pub const fn is_ash(self) -> bool {
        matches!(self, Self::Jalapeno | Self::CherryBomb | Self::Squash)
    }

    /// Lanes either side of the placement that the effect reaches.
    #[must_use]
    pub const fn lane_reach(self) -> u8 {
        match self {
            Self::CherryBomb => 1,
            _ => 0,
        }
    }
}

/// Fodder card kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum FodderKind {
    /// Ordinary fodder.
    #[default]
    Normal,
    /// Cheap mushroom fodder.
    Puff,
    /// Flower pot fodder.
    Pot,
}

impl FodderKind {
    /// Defender placed for this fodder kind.
    #[must_use]
    pub const fn plant(self) -> PlantKind {
        match self {
            Self::Normal => PlantKind::Umbrella,
            Self::Puff => PlantKind::Puff,
            Self::Pot => PlantKind::Pot,
        }
    }
}

/// How a dynamic action ranks its candidate slots at fire time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SelectionRule {
    /// Take every candidate (`C`).
    All,
    /// Lanes whose nearest heavy unit is furthest advanced first (`C_POS`).
    Proximity,
    /// Lanes holding the most qualifying units first (`C_NUM`).
    Density,
}

impl SelectionRule {
    /// Parse the rule symbol used by dynamic fodder actions.
    #[must_use]
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "C" => Some(Self::All),
            "C_POS" => Some(Self::Proximity),
            "C_NUM" => Some(Self::Density),
            _ => None,
        }
    }
}

/// Outcome classification family of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionClass {
    /// Damaging action; counts as a hit when the unit was affected by it.
    Ash,
    /// Absorbing action; counts as a hit when the unit attempted to crush it.
    Fodder,
}

/// Projectile strike at one or more targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectileAction {
    /// Display symbol.
    pub symbol: String,
    /// Decision tick (impact tick).
    #[serde(rename = "time")]
    pub tick: i64,
    /// Impact points; each expands into its own Op.
    pub positions: Vec<ProjectileTarget>,
    /// Launcher column, required on elevated terrain.
    #[serde(rename = "cobCol", default, skip_serializing_if = "Option::is_none")]
    pub launcher_column: Option<u8>,
}

/// Card placed at an exact cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedCardAction {
    /// Display symbol.
    pub symbol: String,
    /// Decision tick (activation tick).
    #[serde(rename = "time")]
    pub tick: i64,
    /// Tick at which the card is removed again.
    #[serde(rename = "shovelTime", default, skip_serializing_if = "Option::is_none")]
    pub removal_tick: Option<i64>,
    /// Defender kind.
    #[serde(rename = "plantType")]
    pub kind: PlantKind,
    /// Target cell.
    pub position: CardPos,
}

/// Card whose cell is chosen from candidates at fire time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicCardAction {
    /// Display symbol.
    pub symbol: String,
    /// Decision tick (activation tick).
    #[serde(rename = "time")]
    pub tick: i64,
    /// Defender kind.
    #[serde(rename = "plantType")]
    pub kind: PlantKind,
    /// Candidate cells.
    pub positions: Vec<CardPos>,
}

/// Fodder placed at exact cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedFodderAction {
    /// Display symbol.
    pub symbol: String,
    /// Decision tick.
    #[serde(rename = "time")]
    pub tick: i64,
    /// Tick at which the fodder is removed again.
    #[serde(rename = "shovelTime", default, skip_serializing_if = "Option::is_none")]
    pub removal_tick: Option<i64>,
    /// Fodder kind per position; empty means all [`FodderKind::Normal`].
    #[serde(rename = "cards", alias = "fodders", default)]
    pub fodders: Vec<FodderKind>,
    /// Target cells.
    pub positions: Vec<CardPos>,
}

/// Fodder whose cells are chosen from candidates at fire time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicFodderAction {
    /// Selection rule symbol (`C`, `C_POS`, `C_NUM`).
    pub symbol: String,
    /// Decision tick.
    #[serde(rename = "time")]
    pub tick: i64,
    /// Tick at which the fodder is removed again.
    #[serde(rename = "shovelTime", default, skip_serializing_if = "Option::is_none")]
    pub removal_tick: Option<i64>,
    /// Fodder kind per candidate; empty means all [`FodderKind::Normal`].
    #[serde(rename = "cards", alias = "fodders", default)]
    pub fodders: Vec<FodderKind>,
    /// Candidate cells.
    pub positions: Vec<CardPos>,
    /// How many candidates to pick.
    pub choose: usize,
    /// Only count units from these spawn waves; empty means all waves.
    #[serde(default)]
    pub waves: BTreeSet<u32>,
}

/// One declarative player decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op")]
pub enum Action {
    /// Projectile strike.
    #[serde(rename = "Cob")]
    Projectile(ProjectileAction),
    /// Card at a fixed cell.
    FixedCard(FixedCardAction),
    /// Card at a cell chosen at fire time.
    #[serde(rename = "SmartCard")]
    DynamicCard(DynamicCardAction),
    /// Fodder at fixed cells.
    FixedFodder(FixedFodderAction),
    /// Fodder at cells chosen at fire time.
    #[serde(rename = "SmartFodder")]
    DynamicFodder(DynamicFodderAction),
}

impl Action {
    /// Display symbol.
    #[must_use]
    pub fn symbol(&self) -> &str {
        match self {
            Self::Projectile(a) => &a.symbol,
            Self::FixedCard(a) => &a.symbol,
            Self::DynamicCard(a) => &a.symbol,
            Self::FixedFodder(a) => &a.symbol,
            Self::DynamicFodder(a) => &a.symbol,
        }
    }

    /// Decision tick, relative to the start of the wave.
    #[must_use]
    pub const fn tick(&self) -> i64 {
        match self {
            Self::Projectile(a) => a.tick,
            Self::FixedCard(a) => a.tick,
            Self::DynamicCard(a) => a.tick,
            Self::FixedFodder(a) => a.tick,
            Self::DynamicFodder(a) => a.tick,
        }
    }

    /// Removal tick, relative to the start of the wave.
    #[must_use]
    pub const fn removal_tick(&self) -> Option<i64> {
        match self {
            Self::FixedCard(a) => a.removal_tick,
            Self::FixedFodder(a) => a.removal_tick,
            Self::DynamicFodder(a) => a.removal_tick,
            Self::Projectile(_) | Self::DynamicCard(_) => None,
        }
    }

    /// Classification family used by outcome signatures.
    #[must_use]
    pub const fn class(&self) -> ActionClass {
        match self {
            Self::Projectile(_) | Self::DynamicCard(_) => ActionClass::Ash,
            Self::FixedCard(a) => {
                if a.kind.is_ash() {
                    ActionClass::Ash
                } else {
                    ActionClass::Fodder
                }
            }
            Self::FixedFodder(_) | Self::DynamicFodder(_) => ActionClass::Fodder,
        }
    }

    /// Display label used verbatim as a report column header.
    ///
    /// `"{tick}"`, then `"~{removal}"` when a removal tick is set, then the
    /// symbol. Dynamic fodder that picks fewer than all candidates appends
    /// `" {lanes}>{choose}"`.
    #[must_use]
    pub fn label(&self) -> String {
        let mut label = self.tick().to_string();
        if let Some(removal) = self.removal_tick() {
            let _ = write!(label, "~{removal}");
        }
        label.push_str(self.symbol());

        if let Self::DynamicFodder(a) = self {
            if a.choose != a.positions.len() {
                label.push(' ');
                for pos in &a.positions {
                    let _ = write!(label, "{}", pos.lane);
                }
                let _ = write!(label, ">{}", a.choose);
            }
        }
        label
    }

    /// Check configuration invariants against the scene.
    pub fn validate(&self, scene: SceneKind) -> Result<()> {
        if self.tick() < 0 {
            return Err(ScheduleError::NegativeTick {
                label: self.label(),
                tick: self.tick(),
            });
        }
        if let Some(removal) = self.removal_tick() {
            if removal < self.tick() {
                return Err(ScheduleError::InvalidRemovalTick {
                    label: self.label(),
                    tick: self.tick(),
                    removal,
                });
            }
        }

        match self {
            Self::Projectile(a) => {
                if scene.is_roof() && a.launcher_column.is_none() {
                    return Err(ScheduleError::MissingLauncherColumn {
                        label: self.label(),
                        scene,
                    });
                }
                for target in &a.positions {
                    check_lane(scene, target.lane)?;
                    if !(0.0..=10.0).contains(&target.column) {
                        return Err(ScheduleError::InvalidColumn(target.column));
                    }
                }
                if let Some(column) = a.launcher_column {
                    check_column(column)?;
                }
            }
            Self::FixedCard(a) => check_cell(scene, a.position)?,
            Self::DynamicCard(a) => {
                if a.positions.is_empty() {
                    return Err(ScheduleError::EmptyCandidates(self.label()));
                }
                check_cells(scene, &a.positions)?;
            }
            Self::FixedFodder(a) => {
                check_fodders(self, &a.fodders, a.positions.len())?;
                check_cells(scene, &a.positions)?;
            }
            Self::DynamicFodder(a) => {
                if SelectionRule::from_symbol(&a.symbol).is_none() {
                    return Err(ScheduleError::UnknownSelectionRule(a.symbol.clone()));
                }
                if a.positions.is_empty() {
                    return Err(ScheduleError::EmptyCandidates(self.label()));
                }
                check_fodders(self, &a.fodders, a.positions.len())?;
                check_cells(scene, &a.positions)?;
            }
        }
        Ok(())
    }
}

/// Fodder kind at a position index, defaulting to [`FodderKind::Normal`].
#[must_use]
pub fn fodder_at(fodders: &[FodderKind], index: usize) -> FodderKind {
    fodders.get(index).copied().unwrap_or_default()
}

fn check_lane(scene: SceneKind, lane: Lane) -> Result<()> {
    if scene.has_lane(lane) {
        Ok(())
    } else {
        Err(ScheduleError::InvalidLane {
            lane,
            lanes: scene.lane_count(),
            scene,
        })
    }
}

fn check_column(column: u8) -> Result<()> {
    if (1..=9).contains(&column) {
        Ok(())
    } else {
        Err(ScheduleError::InvalidColumn(f32::from(column)))
    }
}

fn check_cell(scene: SceneKind, pos: CardPos) -> Result<()> {
    check_lane(scene, pos.lane)?;
    check_column(pos.column)
}

fn check_cells(scene: SceneKind, positions: &[CardPos]) -> Result<()> {
    positions.iter().try_for_each(|pos| check_cell(scene, *pos))
}

fn check_fodders(action: &Action, fodders: &[FodderKind], positions: usize) -> Result<()> {
    if fodders.is_empty() || fodders.len() == positions {
        Ok(())
    } else {
        Err(ScheduleError::FodderCountMismatch {
            label: action.label(),
            kinds: fodders.len(),
            positions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn projectile(tick: i64, lane: Lane, column: f32) -> Action {
        Action::Projectile(ProjectileAction {
            symbol: "PP".to_string(),
            tick,
            positions: vec![ProjectileTarget { lane, column }],
            launcher_column: None,
        })
    }

    fn smart_fodder(symbol: &str, choose: usize) -> Action {
        Action::DynamicFodder(DynamicFodderAction {
            symbol: symbol.to_string(),
            tick: 400,
            removal_tick: Some(500),
            fodders: vec![],
            positions: vec![CardPos::new(1, 9), CardPos::new(2, 9), CardPos::new(5, 9)],
            choose,
            waves: BTreeSet::new(),
        })
    }

    #[test]
    fn test_label_plain() {
        assert_eq!(projectile(300, 2, 9.0).label(), "300PP");
    }

    #[test]
    fn test_label_with_removal() {
        let action = Action::FixedFodder(FixedFodderAction {
            symbol: "C".to_string(),
            tick: 250,
            removal_tick: Some(400),
            fodders: vec![FodderKind::Puff],
            positions: vec![CardPos::new(1, 8)],
        });
        assert_eq!(action.label(), "250~400C");
    }

    #[test]
    fn test_label_partial_choice() {
        assert_eq!(smart_fodder("C_POS", 2).label(), "400~500C_POS 125>2");
        assert_eq!(smart_fodder("C_POS", 3).label(), "400~500C_POS");
    }

    #[test]
    fn test_action_classes() {
        assert_eq!(projectile(0, 1, 5.0).class(), ActionClass::Ash);
        assert_eq!(smart_fodder("C", 1).class(), ActionClass::Fodder);

        let squash = Action::FixedCard(FixedCardAction {
            symbol: "Q".to_string(),
            tick: 100,
            removal_tick: None,
            kind: PlantKind::Squash,
            position: CardPos::new(2, 7),
        });
        assert_eq!(squash.class(), ActionClass::Ash);
    }

    #[test]
    fn test_selection_rule_symbols() {
        assert_eq!(SelectionRule::from_symbol("C"), Some(SelectionRule::All));
        assert_eq!(SelectionRule::from_symbol("C_POS"), Some(SelectionRule::Proximity));
        assert_eq!(SelectionRule::from_symbol("C_NUM"), Some(SelectionRule::Density));
        assert_eq!(SelectionRule::from_symbol("X"), None);
    }

    #[test]
    fn test_roof_projectile_needs_launcher_column() {
        let err = projectile(300, 2, 9.0).validate(SceneKind::Roof).unwrap_err();
        assert!(matches!(err, ScheduleError::MissingLauncherColumn { .. }));
        assert!(projectile(300, 2, 9.0).validate(SceneKind::Fog).is_ok());
    }

    #[test]
    fn test_validate_rejects_unknown_rule() {
        let err = smart_fodder("C_WHAT", 1).validate(SceneKind::Fog).unwrap_err();
        assert_eq!(err, ScheduleError::UnknownSelectionRule("C_WHAT".to_string()));
    }

    #[test]
    fn test_validate_rejects_lane_outside_scene() {
        let err = projectile(300, 6, 9.0).validate(SceneKind::Day).unwrap_err();
        assert!(matches!(err, ScheduleError::InvalidLane { lane: 6, .. }));
    }

    #[test]
    fn test_validate_rejects_fodder_mismatch() {
        let action = Action::FixedFodder(FixedFodderAction {
            symbol: "C".to_string(),
            tick: 250,
            removal_tick: None,
            fodders: vec![FodderKind::Puff, FodderKind::Pot],
            positions: vec![CardPos::new(1, 8)],
        });
        assert!(matches!(
            action.validate(SceneKind::Fog),
            Err(ScheduleError::FodderCountMismatch { kinds: 2, positions: 1, .. })
        ));
    }

    #[test]
    fn test_validate_rejects_early_removal() {
        let action = Action::FixedFodder(FixedFodderAction {
            symbol: "C".to_string(),
            tick: 250,
            removal_tick: Some(100),
            fodders: vec![],
            positions: vec![CardPos::new(1, 8)],
        });
        assert!(matches!(
            action.validate(SceneKind::Fog),
            Err(ScheduleError::InvalidRemovalTick { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_negative_tick() {
        let err = projectile(-50, 2, 9.0).validate(SceneKind::Fog).unwrap_err();
        assert_eq!(
            err,
            ScheduleError::NegativeTick {
                label: "-50PP".to_string(),
                tick: -50,
            }
        );
        assert!(projectile(0, 2, 9.0).validate(SceneKind::Fog).is_ok());
    }

    #[test]
    fn test_fodder_at_defaults_to_normal() {
        assert_eq!(fodder_at(&[], 3), FodderKind::Normal);
        assert_eq!(fodder_at(&[FodderKind::Pot], 0), FodderKind::Pot);
    }
}
