//! Decision-tick to effect-tick offsets.
//!
//! An action's decision tick is when its effect must land. The Op that
//! causes it fires earlier by the offset resolved here:
//!
//! - projectiles: flight time (flat, rear lane, or elevated terrain table)
//! - cards: pre-activation fuse (area attacks only)
//! - fodder: none
//! - removal: `removal_tick - decision_tick`, applied after the decision

use crate::action::{Action, PlantKind};
use crate::error::{Result, ScheduleError};
use crate::math::column_to_pixel;
use crate::scene::{Lane, SceneKind};

/// Projectile flight on flat terrain.
pub const FLAT_FLIGHT_TICKS: i64 = 373;

/// Projectile flight into the backyard rear lanes.
pub const REAR_LANE_FLIGHT_TICKS: i64 = 378;

/// Fuse of immediate-effect area cards.
pub const AREA_CARD_LATENCY: i64 = 100;

/// Horizontal offset between a target column's pixel and the impact x used
/// by the elevated-terrain flight table.
const ROOF_IMPACT_SHIFT: i32 = 47;

/// Pixels of horizontal travel per extra tick of vertical descent.
const ROOF_STEP_PX: i32 = 32;

/// `(min_x, min_flight)` per launcher column 1..=8.
///
/// Targets at or beyond `min_x` take `min_flight`; nearer targets take one
/// extra tick plus one more per [`ROOF_STEP_PX`] pixels.
const ROOF_FLIGHT_TABLE: [(i32, i64); 8] = [
    (515, 359),
    (499, 362),
    (515, 364),
    (499, 367),
    (515, 369),
    (499, 372),
    (511, 373),
    (511, 373),
];

/// Impact x of a projectile aimed at a fractional column.
#[must_use]
pub fn impact_x(column: f32) -> i32 {
    column_to_pixel(column) - ROOF_IMPACT_SHIFT
}

/// Flight time on elevated terrain.
///
/// Launcher columns past the table reuse its last row.
#[must_use]
pub fn roof_flight_ticks(column: f32, launcher_column: u8) -> i64 {
    let row = usize::from(launcher_column.clamp(1, 8) - 1);
    let (min_x, min_flight) = ROOF_FLIGHT_TABLE[row];
    let x = impact_x(column);

    let ticks = if x >= min_x {
        min_flight
    } else {
        min_flight + 1 + i64::from((min_x - 1 - x) / ROOF_STEP_PX)
    };
    ticks.max(0)
}

/// Projectile flight time for a target in the given scene.
pub fn projectile_flight(
    scene: SceneKind,
    lane: Lane,
    column: f32,
    launcher_column: Option<u8>,
) -> Result<i64> {
    if scene.is_rear_lane(lane) {
        return Ok(REAR_LANE_FLIGHT_TICKS);
    }
    if scene.is_roof() {
        let launcher_column = launcher_column.ok_or_else(|| ScheduleError::MissingLauncherColumn {
            label: format!("lane {lane} column {column}"),
            scene,
        })?;
        return Ok(roof_flight_ticks(column, launcher_column));
    }
    Ok(FLAT_FLIGHT_TICKS)
}

/// Pre-activation latency of a placed card.
#[must_use]
pub const fn card_latency(kind: PlantKind) -> i64 {
    if kind.is_area_attack() {
        AREA_CARD_LATENCY
    } else {
        0
    }
}

/// Ticks between an action's Op and its decision tick.
///
/// `target` picks the projectile target; other variants ignore it.
pub fn resolve_offset(action: &Action, target: usize, scene: SceneKind) -> Result<i64> {
    match action {
        Action::Projectile(a) => {
            let Some(pos) = a.positions.get(target) else {
                return Err(ScheduleError::EmptyCandidates(action.label()));
            };
            projectile_flight(scene, pos.lane, pos.column, a.launcher_column)
        }
        Action::FixedCard(a) => Ok(card_latency(a.kind)),
        Action::DynamicCard(a) => Ok(card_latency(a.kind)),
        Action::FixedFodder(_) | Action::DynamicFodder(_) => Ok(0),
    }
}

/// Ticks from an action's decision tick to its cleanup Op, if any.
#[must_use]
pub fn removal_offset(action: &Action) -> Option<i64> {
    action.removal_tick().map(|removal| removal - action.tick())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{CardPos, FixedCardAction, FixedFodderAction, ProjectileAction, ProjectileTarget};

    fn projectile(lane: Lane, column: f32, launcher_column: Option<u8>) -> Action {
        Action::Projectile(ProjectileAction {
            symbol: "P".to_string(),
            tick: 300,
            positions: vec![ProjectileTarget { lane, column }],
            launcher_column,
        })
    }

    #[test]
    fn test_flat_flight_ignores_column() {
        for column in [0.0, 2.5, 9.0, 10.0] {
            let action = projectile(3, column, None);
            assert_eq!(resolve_offset(&action, 0, SceneKind::Day).unwrap(), 373);
        }
    }

    #[test]
    fn test_rear_lane_flight() {
        assert_eq!(resolve_offset(&projectile(3, 9.0, None), 0, SceneKind::Fog).unwrap(), 378);
        assert_eq!(resolve_offset(&projectile(4, 9.0, None), 0, SceneKind::Pool).unwrap(), 378);
        assert_eq!(resolve_offset(&projectile(2, 9.0, None), 0, SceneKind::Pool).unwrap(), 373);
    }

    #[test]
    fn test_roof_requires_launcher_column() {
        let err = resolve_offset(&projectile(2, 9.0, None), 0, SceneKind::Roof).unwrap_err();
        assert!(matches!(err, ScheduleError::MissingLauncherColumn { .. }));
    }

    #[test]
    fn test_roof_far_target_takes_minimum_flight() {
        assert_eq!(roof_flight_ticks(9.0, 1), 359);
        assert_eq!(roof_flight_ticks(9.0, 7), 373);
    }

    #[test]
    fn test_roof_near_target_steps_up() {
        // impact x = 400 - 47 = 353; (515 - 1 - 353) / 32 = 5
        assert_eq!(roof_flight_ticks(5.0, 1), 359 + 1 + 5);
        assert!(roof_flight_ticks(1.0, 3) > roof_flight_ticks(4.0, 3));
    }

    #[test]
    fn test_card_latency_tiers() {
        assert_eq!(card_latency(PlantKind::Jalapeno), 100);
        assert_eq!(card_latency(PlantKind::CherryBomb), 100);
        assert_eq!(card_latency(PlantKind::Squash), 0);
        assert_eq!(card_latency(PlantKind::Wallnut), 0);
    }

    #[test]
    fn test_removal_offset() {
        let card = Action::FixedCard(FixedCardAction {
            symbol: "J".to_string(),
            tick: 200,
            removal_tick: Some(260),
            kind: PlantKind::Jalapeno,
            position: CardPos::new(1, 5),
        });
        assert_eq!(removal_offset(&card), Some(60));

        let fodder = Action::FixedFodder(FixedFodderAction {
            symbol: "F".to_string(),
            tick: 200,
            removal_tick: None,
            fodders: vec![],
            positions: vec![CardPos::new(1, 5)],
        });
        assert_eq!(removal_offset(&fodder), None);
        assert_eq!(resolve_offset(&fodder, 0, SceneKind::Fog).unwrap(), 0);
    }
}
