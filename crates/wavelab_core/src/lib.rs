//! # Wavelab Core
//!
//! Scenario scheduling and statistical aggregation for repeated trials
//! against a tick-stepped lane simulation.
//!
//! This crate contains **only** the scheduling and reduction logic:
//! - No IO
//! - No threads (the harness lives in `wavelab_headless`)
//! - No clock or entropy (randomness is injected by the caller)
//!
//! ## Pipeline
//!
//! ```text
//! Action ──► timing ──► schedule (flat Op list) ──► executor ──► TrialRecord ──► aggregate
//!                                                      │
//!                                                 Simulation
//! ```
//!
//! ## Crate Structure
//!
//! - [`handle`] - Generational entity handles and the slot arena behind them
//! - [`scene`] - Terrain kinds and lane geometry
//! - [`action`] - Declarative player actions parsed from scenario files
//! - [`timing`] - Decision-tick to effect-tick offsets
//! - [`engine`] - The simulation interface consumed by the executor
//! - [`world`] - `LaneWorld`, a compact reference simulation
//! - [`summon`] - Random wave compositions for refresh scenarios
//! - [`selector`] - Fire-time slot selection against live state
//! - [`schedule`] - Compiling waves into a tick-sorted Op list
//! - [`executor`] - Stepping the simulation and firing Ops
//! - [`record`] - Per-trial observations and outcome classification
//! - [`aggregate`] - Commutative accumulation of trial records

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod action;
pub mod aggregate;
pub mod engine;
pub mod error;
pub mod executor;
pub mod handle;
pub mod math;
pub mod record;
pub mod scene;
pub mod schedule;
pub mod selector;
pub mod summon;
pub mod timing;
pub mod world;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::action::{
        Action, ActionClass, CardPos, FodderKind, PlantKind, ProjectileTarget, SelectionRule,
    };
    pub use crate::aggregate::{
        Aggregate, LossTable, RefreshTable, Signature, SignatureCounts, SignatureTable,
    };
    pub use crate::engine::{PlantFlags, Simulation, UnitKind};
    pub use crate::error::{Result, ScheduleError};
    pub use crate::executor::{Executor, ExecutorState};
    pub use crate::handle::EntityHandle;
    pub use crate::record::{OutcomeState, RefreshGoal, TrialRecord};
    pub use crate::scene::{Lane, SceneKind};
    pub use crate::schedule::{
        compile, HorizonPolicy, Op, ProtectedPos, ScenarioMode, Schedule, Setting, Wave,
    };
    pub use crate::summon::SpawnTypes;
    pub use crate::world::LaneWorld;
}
