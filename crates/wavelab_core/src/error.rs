//! Error types for scenario compilation.
//!
//! Every variant here is a configuration-invariant violation: the scenario
//! is malformed and the run must abort. Stale entity handles and
//! under-supplied selections are expected at runtime and never surface as
//! errors.

use thiserror::Error;

use crate::scene::SceneKind;

/// Result type alias using [`ScheduleError`].
pub type Result<T> = std::result::Result<T, ScheduleError>;

/// Top-level error type for scenario compilation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScheduleError {
    /// Elevated terrain needs the launcher column to time a projectile.
    #[error("Projectile action '{label}' on {scene:?} requires a launcher column")]
    MissingLauncherColumn {
        /// Display label of the offending action.
        label: String,
        /// Scene the scenario runs on.
        scene: SceneKind,
    },

    /// Dynamic fodder symbol does not name a selection rule.
    #[error("Unknown selection rule '{0}' (expected C, C_POS or C_NUM)")]
    UnknownSelectionRule(String),

    /// Fodder kinds given but not one per position.
    #[error("Action '{label}' lists {kinds} fodder kinds for {positions} positions")]
    FodderCountMismatch {
        /// Display label of the offending action.
        label: String,
        /// Number of fodder kinds.
        kinds: usize,
        /// Number of positions.
        positions: usize,
    },

    /// Lane outside the scene.
    #[error("Lane {lane} is outside the {lanes} lanes of {scene:?}")]
    InvalidLane {
        /// Requested lane (1-based).
        lane: u8,
        /// Lane count of the scene.
        lanes: u8,
        /// Scene the scenario runs on.
        scene: SceneKind,
    },

    /// Column outside the field.
    #[error("Column {0} is outside the field")]
    InvalidColumn(f32),

    /// Dynamic action without candidate slots.
    #[error("Action '{0}' has no candidate positions")]
    EmptyCandidates(String),

    /// Decision tick before the wave start.
    #[error("Action '{label}' is decided at tick {tick}, before its wave starts")]
    NegativeTick {
        /// Display label of the offending action.
        label: String,
        /// Decision tick, relative to the wave start.
        tick: i64,
    },

    /// Removal scheduled before the action it cleans up.
    #[error("Action '{label}' removes at tick {removal}, before its decision tick {tick}")]
    InvalidRemovalTick {
        /// Display label of the offending action.
        label: String,
        /// Decision tick.
        tick: i64,
        /// Removal tick.
        removal: i64,
    },
}
