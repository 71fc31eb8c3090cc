//! `LaneWorld`, a compact reference simulation.
//!
//! Implements [`Simulation`] with just enough behaviour for scenarios to
//! produce meaningful outcomes: units walk left at fixed-point speeds,
//! projectiles land after their flight time, area cards burn after a fuse,
//! heavy units smash whatever blocks them, jacks explode and light units
//! bite. All state lives in generational [`Slots`] arenas that share one
//! [`TagSource`], so identity tags are unique across entity kinds and
//! across [`Simulation::reset`].

use std::collections::BTreeSet;

use tracing::{trace, warn};

use crate::action::{PlantKind, ProjectileTarget};
use crate::engine::{DefenderState, ExplodeCounts, PlantFlags, Simulation, UnitKind, UnitState};
use crate::handle::{EntityHandle, IdentityTag, Slots, TagSource};
use crate::math::{column_to_pixel, fixed_px, Fixed, COLUMN_WIDTH, FIELD_RIGHT_X};
use crate::scene::{Lane, SceneKind};
use crate::timing::{projectile_flight, AREA_CARD_LATENCY};

const SHELL_DAMAGE: i32 = 1800;
const SHELL_RADIUS: i32 = 115;
const CARD_DAMAGE: i32 = 1800;
const CHERRY_RADIUS: i32 = 120;
const SQUASH_RANGE: i32 = 80;
const FREEZE_TICKS: i64 = 400;
const SMASH_TICKS: i64 = 100;
const HEAVY_REACH: i32 = 40;
const LIGHT_REACH: i32 = 10;
const BITE_DAMAGE: i32 = 4;
const JACK_RADIUS: i32 = 90;
const JACK_DAMAGE: i32 = 1800;
const DYING_TICKS: i64 = 100;
const EXIT_X: i32 = -100;

#[derive(Debug, Clone, Copy)]
struct Smash {
    target: EntityHandle,
    remaining: i64,
}

#[derive(Debug, Clone)]
struct Unit {
    state: UnitState,
    speed: Fixed,
    frozen: i64,
    dying_left: i64,
    explode_at: Option<i64>,
    smash: Option<Smash>,
}

impl Unit {
    fn hurt(&mut self, source: IdentityTag, damage: i32) {
        self.state.hit_by.insert(source);
        self.state.hp -= damage;
        if self.state.hp <= 0 {
            self.state.hp = 0;
            self.state.dying = true;
            self.dying_left = DYING_TICKS;
            self.smash = None;
        }
    }
}

#[derive(Debug, Clone)]
struct Defender {
    state: DefenderState,
    fuse: Option<i64>,
}

impl Defender {
    fn left(&self) -> i32 {
        (i32::from(self.state.column) - 1) * COLUMN_WIDTH
    }

    fn right(&self) -> i32 {
        self.left() + width(self.state.kind) * COLUMN_WIDTH
    }

    fn center(&self) -> i32 {
        (self.left() + self.right()) / 2
    }

    /// Whether walking units stop at this defender.
    fn blocks(&self) -> bool {
        self.fuse.is_none() && self.state.kind != PlantKind::Squash
    }

    fn take_damage(&mut self, damage: i32) -> bool {
        self.state.hp -= damage;
        self.state.hp <= 0
    }
}

#[derive(Debug, Clone, Copy)]
struct Shell {
    target: ProjectileTarget,
    remaining: i64,
}

#[derive(Debug, Clone, Copy)]
struct Blocker {
    handle: EntityHandle,
    lane: Lane,
    left: i32,
    right: i32,
}

#[derive(Debug, Clone, Copy)]
enum Event {
    Smash {
        unit: EntityHandle,
        target: EntityHandle,
    },
    Bite {
        target: EntityHandle,
    },
    Explode {
        lane: Lane,
        x: i32,
    },
}

const fn width(kind: PlantKind) -> i32 {
    match kind {
        PlantKind::Launcher => 2,
        _ => 1,
    }
}

const fn default_hp(kind: PlantKind) -> i32 {
    match kind {
        PlantKind::Wallnut => 4000,
        _ => 300,
    }
}

const fn unit_hp(kind: UnitKind) -> i32 {
    match kind {
        UnitKind::Regular => 270,
        UnitKind::Gargantuar => 3000,
        UnitKind::GigaGargantuar => 6000,
        UnitKind::Ladder | UnitKind::JackInTheBox => 500,
        UnitKind::Football => 1600,
        UnitKind::Catapult => 850,
    }
}

fn unit_speed(kind: UnitKind) -> Fixed {
    let speed = match kind {
        UnitKind::Regular | UnitKind::Gargantuar | UnitKind::GigaGargantuar => 0.25,
        UnitKind::Football => 0.9,
        UnitKind::Ladder => 0.6,
        UnitKind::JackInTheBox => 0.5,
        UnitKind::Catapult => 0.4,
    };
    Fixed::from_num(speed)
}

/// Reference lane simulation.
#[derive(Debug, Clone)]
pub struct LaneWorld {
    scene: SceneKind,
    clock: i64,
    wave: u32,
    tags: TagSource,
    units: Slots<Unit>,
    defenders: Slots<Defender>,
    shells: Slots<Shell>,
}

impl LaneWorld {
    /// Create an empty world for a scene.
    #[must_use]
    pub fn new(scene: SceneKind) -> Self {
        Self {
            scene,
            clock: 0,
            wave: 0,
            tags: TagSource::new(),
            units: Slots::new(),
            defenders: Slots::new(),
            shells: Slots::new(),
        }
    }

    /// Number of live attacker units, dying ones included.
    #[must_use]
    pub const fn unit_count(&self) -> usize {
        self.units.len()
    }

    /// Number of live defenders.
    #[must_use]
    pub const fn defender_count(&self) -> usize {
        self.defenders.len()
    }

    /// Number of projectiles in flight.
    #[must_use]
    pub const fn shells_in_flight(&self) -> usize {
        self.shells.len()
    }

    fn step(&mut self) {
        self.clock += 1;
        self.land_shells();
        self.burn_fuses();
        self.move_units();
        self.spring_squashes();
    }

    fn damage_units(&mut self, source: IdentityTag, damage: i32, hits: impl Fn(&UnitState) -> bool) {
        for (_, unit) in self.units.iter_mut() {
            if unit.state.is_active() && hits(&unit.state) {
                unit.hurt(source, damage);
            }
        }
    }

    fn land_shells(&mut self) {
        let mut landed = Vec::new();
        for (handle, shell) in self.shells.iter_mut() {
            shell.remaining -= 1;
            if shell.remaining <= 0 {
                landed.push((handle, shell.target));
            }
        }

        for (handle, target) in landed {
            self.shells.remove(handle);
            let x = column_to_pixel(target.column);
            trace!(tick = self.clock, lane = target.lane, x, "shell landed");
            self.damage_units(handle.tag(), SHELL_DAMAGE, |unit| {
                unit.lane.abs_diff(target.lane) <= 1 && (unit.int_x() - x).abs() <= SHELL_RADIUS
            });
        }
    }

    fn burn_fuses(&mut self) {
        let mut fired = Vec::new();
        for (handle, defender) in self.defenders.iter_mut() {
            if let Some(fuse) = defender.fuse.as_mut() {
                *fuse -= 1;
                if *fuse <= 0 {
                    fired.push((handle, defender.state.kind, defender.state.lane, defender.center()));
                }
            }
        }

        for (handle, kind, lane, x) in fired {
            self.defenders.remove(handle);
            let tag = handle.tag();
            match kind {
                PlantKind::Jalapeno => {
                    self.damage_units(tag, CARD_DAMAGE, |unit| unit.lane == lane);
                }
                PlantKind::CherryBomb => self.damage_units(tag, CARD_DAMAGE, |unit| {
                    unit.lane.abs_diff(lane) <= 1 && (unit.int_x() - x).abs() <= CHERRY_RADIUS
                }),
                PlantKind::IceShroom => {
                    for (_, unit) in self.units.iter_mut() {
                        if unit.state.is_active() {
                            unit.frozen = FREEZE_TICKS;
                        }
                    }
                }
                _ => {}
            }
        }
    }

    fn move_units(&mut self) {
        let blockers: Vec<Blocker> = self
            .defenders
            .iter()
            .filter(|(_, defender)| defender.blocks())
            .map(|(handle, defender)| Blocker {
                handle,
                lane: defender.state.lane,
                left: defender.left(),
                right: defender.right(),
            })
            .collect();

        let mut events = Vec::new();
        let mut gone = Vec::new();

        for (handle, unit) in self.units.iter_mut() {
            unit.state.time_alive += 1;

            if unit.state.dying {
                unit.dying_left -= 1;
                if unit.dying_left <= 0 {
                    gone.push(handle);
                }
                continue;
            }
            if unit.frozen > 0 {
                unit.frozen -= 1;
                continue;
            }
            if unit.explode_at.is_some_and(|at| unit.state.time_alive >= at) {
                events.push(Event::Explode {
                    lane: unit.state.lane,
                    x: unit.state.int_x(),
                });
                gone.push(handle);
                continue;
            }
            if let Some(smash) = unit.smash.as_mut() {
                smash.remaining -= 1;
                if smash.remaining <= 0 {
                    events.push(Event::Smash {
                        unit: handle,
                        target: smash.target,
                    });
                    unit.smash = None;
                }
                continue;
            }

            let x = unit.state.int_x();
            let heavy = unit.state.kind.is_heavy();
            let reach = if heavy { HEAVY_REACH } else { LIGHT_REACH };
            let blocker = blockers
                .iter()
                .filter(|b| b.lane == unit.state.lane && b.left <= x && x <= b.right + reach)
                .max_by_key(|b| b.right);

            match blocker {
                Some(b) if heavy => {
                    unit.state.attempted.insert(b.handle.tag());
                    unit.smash = Some(Smash {
                        target: b.handle,
                        remaining: SMASH_TICKS,
                    });
                }
                Some(b) => events.push(Event::Bite { target: b.handle }),
                None => {
                    unit.state.x -= unit.speed;
                    if unit.state.int_x() < EXIT_X {
                        gone.push(handle);
                    }
                }
            }
        }

        for handle in gone {
            self.units.remove(handle);
        }
        for event in events {
            self.resolve(event);
        }
    }

    fn resolve(&mut self, event: Event) {
        match event {
            Event::Smash { unit, target } => {
                let Some(defender) = self.defenders.get(target) else {
                    return;
                };
                if defender.state.ignore_smash {
                    if let Some(unit) = self.units.get_mut(unit) {
                        unit.state.ignored.insert(target.tag());
                    }
                } else {
                    self.defenders.remove(target);
                }
            }
            Event::Bite { target } => {
                let destroyed = self
                    .defenders
                    .get_mut(target)
                    .is_some_and(|defender| defender.take_damage(BITE_DAMAGE));
                if destroyed {
                    self.defenders.remove(target);
                }
            }
            Event::Explode { lane, x } => {
                let mut destroyed = Vec::new();
                for (handle, defender) in self.defenders.iter_mut() {
                    let d_lane = defender.state.lane;
                    if d_lane.abs_diff(lane) > 1 || (defender.center() - x).abs() > JACK_RADIUS {
                        continue;
                    }
                    let counts = if lane + 1 == d_lane {
                        ExplodeCounts {
                            from_upper: 1,
                            ..ExplodeCounts::default()
                        }
                    } else if d_lane + 1 == lane {
                        ExplodeCounts {
                            from_lower: 1,
                            ..ExplodeCounts::default()
                        }
                    } else {
                        ExplodeCounts {
                            from_same: 1,
                            ..ExplodeCounts::default()
                        }
                    };
                    defender.state.explode += counts;
                    if !defender.state.ignore_explode && defender.take_damage(JACK_DAMAGE) {
                        destroyed.push(handle);
                    }
                }
                for handle in destroyed {
                    self.defenders.remove(handle);
                }
            }
        }
    }

    fn spring_squashes(&mut self) {
        let squashes: Vec<_> = self
            .defenders
            .iter()
            .filter(|(_, defender)| defender.state.kind == PlantKind::Squash)
            .map(|(handle, defender)| (handle, defender.state.lane, defender.left(), defender.right()))
            .collect();

        for (handle, lane, left, right) in squashes {
            let victim = self.units.iter_mut().find(|(_, unit)| {
                let x = unit.state.int_x();
                unit.state.is_active()
                    && unit.state.lane == lane
                    && x >= left
                    && x <= right + SQUASH_RANGE
            });
            if let Some((_, unit)) = victim {
                unit.hurt(handle.tag(), CARD_DAMAGE);
                self.defenders.remove(handle);
            }
        }
    }
}

impl Simulation for LaneWorld {
    fn scene(&self) -> SceneKind {
        self.scene
    }

    fn reset(&mut self) {
        self.clock = 0;
        self.wave = 0;
        self.units.clear();
        self.defenders.clear();
        self.shells.clear();
    }

    fn tick(&self) -> i64 {
        self.clock
    }

    fn advance(&mut self, ticks: i64) {
        for _ in 0..ticks.max(0) {
            self.step();
        }
    }

    fn set_wave(&mut self, wave: u32) {
        self.wave = wave;
    }

    fn plant(&mut self, kind: PlantKind, lane: Lane, column: u8, flags: PlantFlags) -> EntityHandle {
        let hp = flags.hp.unwrap_or_else(|| default_hp(kind));
        let fuse = match kind {
            PlantKind::Jalapeno | PlantKind::CherryBomb | PlantKind::IceShroom => {
                Some(AREA_CARD_LATENCY)
            }
            _ => None,
        };
        let defender = Defender {
            state: DefenderState {
                kind,
                lane,
                column,
                hp,
                max_hp: hp,
                explode: ExplodeCounts::default(),
                ignore_smash: flags.ignore_smash,
                ignore_explode: flags.ignore_explode,
            },
            fuse,
        };
        let tag = self.tags.issue();
        self.defenders.insert(tag, defender)
    }

    /// A projectile whose flight time cannot be resolved is never created;
    /// the returned handle is stale from the start.
    fn launch(&mut self, target: ProjectileTarget, launcher_column: Option<u8>) -> EntityHandle {
        let tag = self.tags.issue();
        match projectile_flight(self.scene, target.lane, target.column, launcher_column) {
            Ok(remaining) => self.shells.insert(tag, Shell { target, remaining }),
            Err(err) => {
                warn!(%err, "projectile dropped");
                EntityHandle::new(u32::MAX, tag)
            }
        }
    }

    fn spawn_unit(&mut self, kind: UnitKind, lane: Lane) -> EntityHandle {
        let tag = self.tags.issue();
        let jitter = (tag % 20) as i32;
        let explode_at = (kind == UnitKind::JackInTheBox)
            .then(|| 400 + i64::from(tag.wrapping_mul(37) % 400));

        let unit = Unit {
            state: UnitState {
                kind,
                lane,
                x: fixed_px(FIELD_RIGHT_X + jitter),
                hp: unit_hp(kind),
                wave: self.wave,
                spawn_tick: self.clock,
                time_alive: 0,
                dying: false,
                hit_by: BTreeSet::new(),
                attempted: BTreeSet::new(),
                ignored: BTreeSet::new(),
            },
            speed: unit_speed(kind),
            frozen: 0,
            dying_left: 0,
            explode_at,
            smash: None,
        };
        self.units.insert(tag, unit)
    }

    fn destroy(&mut self, handle: EntityHandle) -> bool {
        self.defenders.remove(handle).is_some()
            || self.units.remove(handle).is_some()
            || self.shells.remove(handle).is_some()
    }

    fn is_valid(&self, handle: EntityHandle) -> bool {
        self.defenders.contains(handle) || self.units.contains(handle) || self.shells.contains(handle)
    }

    fn unit(&self, handle: EntityHandle) -> Option<&UnitState> {
        self.units.get(handle).map(|unit| &unit.state)
    }

    fn defender(&self, handle: EntityHandle) -> Option<&DefenderState> {
        self.defenders.get(handle).map(|defender| &defender.state)
    }

    fn units(&self) -> impl Iterator<Item = (EntityHandle, &UnitState)> + '_ {
        self.units.iter().map(|(handle, unit)| (handle, &unit.state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(lane: Lane, column: f32) -> ProjectileTarget {
        ProjectileTarget { lane, column }
    }

    #[test]
    fn test_shell_lands_after_flight_time() {
        let mut world = LaneWorld::new(SceneKind::Day);
        let giga = world.spawn_unit(UnitKind::GigaGargantuar, 2);
        let shell = world.launch(target(2, 9.0), None);

        world.advance(372);
        assert!(world.unit(giga).unwrap().hit_by.is_empty());
        assert!(world.is_valid(shell));

        world.advance(1);
        let unit = world.unit(giga).unwrap();
        assert!(unit.hit_by.contains(&shell.tag()));
        assert_eq!(unit.hp, 6000 - 1800);
        assert!(!world.is_valid(shell));
    }

    #[test]
    fn test_roof_launch_without_launcher_column_is_dropped() {
        let mut world = LaneWorld::new(SceneKind::Roof);
        let giga = world.spawn_unit(UnitKind::GigaGargantuar, 2);
        let shell = world.launch(target(2, 9.0), None);

        assert!(!world.is_valid(shell));
        assert_eq!(world.shells_in_flight(), 0);
        world.advance(400);
        assert!(world.unit(giga).unwrap().hit_by.is_empty());

        let shell = world.launch(target(2, 9.0), Some(1));
        assert!(world.is_valid(shell));
    }

    #[test]
    fn test_shell_misses_far_lane() {
        let mut world = LaneWorld::new(SceneKind::Day);
        let giga = world.spawn_unit(UnitKind::GigaGargantuar, 5);
        world.launch(target(2, 9.0), None);
        world.advance(400);
        assert!(world.unit(giga).unwrap().hit_by.is_empty());
    }

    #[test]
    fn test_ignored_smash_is_recorded() {
        let mut world = LaneWorld::new(SceneKind::Day);
        let flags = PlantFlags {
            ignore_smash: true,
            ..PlantFlags::default()
        };
        let umbrella = world.plant(PlantKind::Umbrella, 1, 9, flags);
        let giga = world.spawn_unit(UnitKind::GigaGargantuar, 1);

        world.advance(300);
        let unit = world.unit(giga).unwrap();
        assert!(unit.attempted.contains(&umbrella.tag()));
        assert!(unit.ignored.contains(&umbrella.tag()));
        assert!(world.is_valid(umbrella));
    }

    #[test]
    fn test_smash_destroys_fodder() {
        let mut world = LaneWorld::new(SceneKind::Day);
        let fodder = world.plant(PlantKind::Puff, 1, 9, PlantFlags::default());
        let giga = world.spawn_unit(UnitKind::GigaGargantuar, 1);

        world.advance(300);
        assert!(!world.is_valid(fodder));
        let unit = world.unit(giga).unwrap();
        assert!(unit.attempted.contains(&fodder.tag()));
        assert!(unit.ignored.is_empty());
    }

    #[test]
    fn test_jalapeno_burns_lane_after_fuse() {
        let mut world = LaneWorld::new(SceneKind::Day);
        let unit = world.spawn_unit(UnitKind::Regular, 3);
        let other = world.spawn_unit(UnitKind::Regular, 4);
        let card = world.plant(PlantKind::Jalapeno, 3, 1, PlantFlags::default());

        world.advance(99);
        assert!(world.unit(unit).unwrap().is_active());
        world.advance(1);
        assert!(world.unit(unit).unwrap().dying);
        assert!(world.unit(unit).unwrap().hit_by.contains(&card.tag()));
        assert!(world.unit(other).unwrap().is_active());
    }

    #[test]
    fn test_dying_units_are_removed() {
        let mut world = LaneWorld::new(SceneKind::Day);
        let unit = world.spawn_unit(UnitKind::Regular, 3);
        world.plant(PlantKind::Jalapeno, 3, 1, PlantFlags::default());
        world.advance(100 + DYING_TICKS);
        assert!(!world.is_valid(unit));
    }

    #[test]
    fn test_freeze_stops_movement() {
        let mut world = LaneWorld::new(SceneKind::Day);
        let unit = world.spawn_unit(UnitKind::Regular, 1);
        world.plant(PlantKind::IceShroom, 1, 1, PlantFlags::default());
        world.advance(100);
        let x = world.unit(unit).unwrap().x;
        world.advance(200);
        assert_eq!(world.unit(unit).unwrap().x, x);
    }

    #[test]
    fn test_jack_explosion_counts_by_lane() {
        let mut world = LaneWorld::new(SceneKind::Day);
        let flags = PlantFlags {
            ignore_explode: true,
            hp: Some(1_000_000),
            ..PlantFlags::default()
        };
        let wall = world.plant(PlantKind::Wallnut, 2, 9, flags);
        world.spawn_unit(UnitKind::JackInTheBox, 2);

        world.advance(900);
        let state = world.defender(wall).unwrap();
        assert_eq!(state.explode.from_same, 1);
        assert!(state.hp_loss() > 0);
    }

    #[test]
    fn test_reset_invalidates_handles() {
        let mut world = LaneWorld::new(SceneKind::Fog);
        let unit = world.spawn_unit(UnitKind::Football, 1);
        world.advance(10);
        world.reset();

        assert_eq!(world.tick(), 0);
        assert!(!world.is_valid(unit));
        let again = world.spawn_unit(UnitKind::Football, 1);
        assert_eq!(again.slot(), unit.slot());
        assert!(!world.is_valid(unit));
    }
}
