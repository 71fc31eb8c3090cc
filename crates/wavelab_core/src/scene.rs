//! Terrain kinds and lane geometry.
//!
//! Lanes are 1-based everywhere in this crate, matching scenario files.

use serde::{Deserialize, Serialize};

/// 1-based lane index.
pub type Lane = u8;

/// Upper bound on lanes in any scene.
pub const MAX_LANES: usize = 6;

/// Terrain the scenario is played on.
///
/// Scenario files may use the short scene codes: `DE`/`NE` map to
/// [`SceneKind::Night`], `PE`/`FE` to [`SceneKind::Fog`] and `RE`/`ME` to
/// [`SceneKind::MoonNight`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SceneKind {
    /// Open lawn, daytime.
    Day,
    /// Open lawn, night.
    #[serde(alias = "NE", alias = "DE")]
    Night,
    /// Backyard with a pool.
    Pool,
    /// Backyard with a pool, fogged.
    #[default]
    #[serde(alias = "FE", alias = "PE")]
    Fog,
    /// Elevated roof terrain.
    Roof,
    /// Elevated roof terrain, night.
    #[serde(alias = "ME", alias = "RE")]
    MoonNight,
}

impl SceneKind {
    /// Flat lawn with five lanes.
    #[must_use]
    pub const fn is_frontyard(self) -> bool {
        matches!(self, Self::Day | Self::Night)
    }

    /// Six-lane backyard whose middle lanes are water.
    #[must_use]
    pub const fn is_backyard(self) -> bool {
        matches!(self, Self::Pool | Self::Fog)
    }

    /// Elevated terrain; projectile flight depends on the launcher column.
    #[must_use]
    pub const fn is_roof(self) -> bool {
        matches!(self, Self::Roof | Self::MoonNight)
    }

    /// Number of lanes.
    #[must_use]
    pub const fn lane_count(self) -> u8 {
        if self.is_backyard() {
            6
        } else {
            5
        }
    }

    /// Check that a 1-based lane exists in this scene.
    #[must_use]
    pub const fn has_lane(self, lane: Lane) -> bool {
        lane >= 1 && lane <= self.lane_count()
    }

    /// Water lanes hold no ground units or ground-level defenders.
    #[must_use]
    pub const fn is_water_lane(self, lane: Lane) -> bool {
        self.is_backyard() && (lane == 3 || lane == 4)
    }

    /// Rear lanes of the backyard, where projectiles take longer to land.
    #[must_use]
    pub const fn is_rear_lane(self, lane: Lane) -> bool {
        self.is_water_lane(lane)
    }

    /// Lanes that ground units walk in.
    #[must_use]
    pub fn ground_lanes(self) -> Vec<Lane> {
        (1..=self.lane_count())
            .filter(|lane| !self.is_water_lane(*lane))
            .collect()
    }

    /// Vertical pixel pitch between lanes.
    #[must_use]
    pub const fn lane_pitch(self) -> i32 {
        if self.is_frontyard() {
            100
        } else {
            85
        }
    }

    /// Vertical pixel of a projectile impact in the given lane.
    #[must_use]
    pub const fn lane_to_pixel(self, lane: Lane) -> i32 {
        120 + (lane as i32 - 1) * self.lane_pitch()
    }
}
