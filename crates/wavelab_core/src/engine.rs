//! The simulation interface consumed by the executor and selector.
//!
//! Scheduling never looks inside the simulation. It calls into it through
//! [`Simulation`] to advance time and create or destroy entities, and reads
//! back the small amount of per-entity state needed for selection and
//! outcome classification.

use std::collections::BTreeSet;
use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

use crate::action::{PlantKind, ProjectileTarget};
use crate::handle::{EntityHandle, IdentityTag};
use crate::math::{to_px, Fixed};
use crate::scene::{Lane, SceneKind};

/// Attacker unit kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UnitKind {
    /// Basic walker.
    Regular,
    /// Heavy unit that smashes defenders.
    Gargantuar,
    /// Tougher heavy unit; the tracked subject of smash scenarios.
    GigaGargantuar,
    /// Light unit carrying a ladder.
    Ladder,
    /// Light unit that explodes after a random delay.
    JackInTheBox,
    /// Fast armoured walker.
    Football,
    /// Ranged lobber.
    Catapult,
}

impl UnitKind {
    /// Units that smash defenders instead of biting them.
    #[must_use]
    pub const fn is_heavy(self) -> bool {
        matches!(self, Self::Gargantuar | Self::GigaGargantuar)
    }

    /// Units counted by the density rule for dynamic fodder.
    #[must_use]
    pub const fn is_light_threat(self) -> bool {
        matches!(self, Self::Ladder | Self::JackInTheBox)
    }
}

/// Explosions absorbed by a defender, split by the relative lane of the
/// exploding unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExplodeCounts {
    /// From the lane above.
    pub from_upper: u32,
    /// From the defender's own lane.
    pub from_same: u32,
    /// From the lane below.
    pub from_lower: u32,
}

impl ExplodeCounts {
    /// Total explosions from every direction.
    #[must_use]
    pub const fn total(self) -> u32 {
        self.from_upper + self.from_same + self.from_lower
    }
}

impl Add for ExplodeCounts {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            from_upper: self.from_upper + rhs.from_upper,
            from_same: self.from_same + rhs.from_same,
            from_lower: self.from_lower + rhs.from_lower,
        }
    }
}

impl AddAssign for ExplodeCounts {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

/// Observable state of an attacker unit.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitState {
    /// Unit kind.
    pub kind: UnitKind,
    /// Lane the unit walks in.
    pub lane: Lane,
    /// Horizontal position.
    pub x: Fixed,
    /// Remaining hit points.
    pub hp: i32,
    /// Spawn wave.
    pub wave: u32,
    /// Tick the unit was created at.
    pub spawn_tick: i64,
    /// Ticks since spawn.
    pub time_alive: i64,
    /// Unit is playing its death animation and no longer interacts.
    pub dying: bool,
    /// Identity tags of every entity whose effect damaged this unit.
    pub hit_by: BTreeSet<IdentityTag>,
    /// Identity tags of every defender this unit tried to smash.
    pub attempted: BTreeSet<IdentityTag>,
    /// Identity tags of smash attempts the target shrugged off.
    pub ignored: BTreeSet<IdentityTag>,
}

impl UnitState {
    /// Integer pixel position.
    #[must_use]
    pub fn int_x(&self) -> i32 {
        to_px(self.x)
    }

    /// Unit still takes part in the fight.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        !self.dying && self.hp > 0
    }
}

/// Observable state of a defender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefenderState {
    /// Defender kind.
    pub kind: PlantKind,
    /// Lane (1-based).
    pub lane: Lane,
    /// Leftmost occupied column (1-based).
    pub column: u8,
    /// Remaining hit points.
    pub hp: i32,
    /// Maximum hit points.
    pub max_hp: i32,
    /// Explosions absorbed so far.
    pub explode: ExplodeCounts,
    /// Smashes against this defender are recorded but have no effect.
    pub ignore_smash: bool,
    /// Light-unit explosions are recorded but deal no damage.
    pub ignore_explode: bool,
}

impl DefenderState {
    /// Hit points lost so far.
    #[must_use]
    pub const fn hp_loss(&self) -> i32 {
        self.max_hp - self.hp
    }
}

/// Overrides applied when placing a defender.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlantFlags {
    /// Record smashes without taking damage.
    pub ignore_smash: bool,
    /// Record explosions without taking damage.
    pub ignore_explode: bool,
    /// Replace the kind's default hit points.
    pub hp: Option<i32>,
}

/// Tick-stepped lane simulation.
///
/// Entity creation returns an [`EntityHandle`]; every query through a stale
/// handle returns `None` or `false` rather than failing.
pub trait Simulation {
    /// Scene the simulation runs.
    fn scene(&self) -> SceneKind;

    /// Remove every entity and rewind the clock to zero.
    fn reset(&mut self);

    /// Current tick.
    fn tick(&self) -> i64;

    /// Step the simulation forward. Non-positive counts do nothing.
    fn advance(&mut self, ticks: i64);

    /// Set the wave number stamped on subsequently spawned units.
    fn set_wave(&mut self, wave: u32);

    /// Place a defender.
    fn plant(&mut self, kind: PlantKind, lane: Lane, column: u8, flags: PlantFlags) -> EntityHandle;

    /// Fire a projectile at a target.
    fn launch(&mut self, target: ProjectileTarget, launcher_column: Option<u8>) -> EntityHandle;

    /// Spawn an attacker at the right edge of a lane.
    fn spawn_unit(&mut self, kind: UnitKind, lane: Lane) -> EntityHandle;

    /// Remove an entity. Returns `false` for stale handles.
    fn destroy(&mut self, handle: EntityHandle) -> bool;

    /// Check whether a handle still refers to a live entity.
    fn is_valid(&self, handle: EntityHandle) -> bool;

    /// State of a live attacker unit.
    fn unit(&self, handle: EntityHandle) -> Option<&UnitState>;

    /// State of a live defender.
    fn defender(&self, handle: EntityHandle) -> Option<&DefenderState>;

    /// Every live attacker unit, in a stable order.
    fn units(&self) -> impl Iterator<Item = (EntityHandle, &UnitState)> + '_;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explode_counts_add() {
        let a = ExplodeCounts {
            from_upper: 1,
            from_same: 2,
            from_lower: 0,
        };
        let mut b = ExplodeCounts {
            from_upper: 0,
            from_same: 1,
            from_lower: 3,
        };
        b += a;
        assert_eq!(b.total(), 7);
        assert_eq!(b.from_same, 3);
    }

    #[test]
    fn test_heavy_kinds() {
        assert!(UnitKind::GigaGargantuar.is_heavy());
        assert!(UnitKind::Gargantuar.is_heavy());
        assert!(!UnitKind::Football.is_heavy());
        assert!(UnitKind::JackInTheBox.is_light_threat());
    }
}
