//! Headless Monte-Carlo runner for wave scenarios.
//!
//! This crate loads scenario documents, validates them against a scenario
//! mode and runs many independent trials in parallel:
//!
//! - **Smash runs**: outcome signature tables per heavy unit
//! - **Explode runs**: tick-indexed loss tables per round
//! - **Schedule inspection**: compiled Op counts and action labels
//!
//! Results are written as pretty JSON; tabular rendering is left to the
//! consumer.
//!
//! # Example
//!
//! ```bash
//! # Smash run over 320 trials, 1000 tracked heavy units per trial
//! cargo run -p wavelab_headless -- smash --config scenario.json --repeat 320
//!
//! # Explode run, results saved for later inspection
//! cargo run -p wavelab_headless -- explode --config scenario.ron --output results/explode.json
//!
//! # Show the compiled schedule of every round
//! cargo run -p wavelab_headless -- schedule --config scenario.json --mode smash
//! ```

pub mod harness;
pub mod scenario;

pub use harness::{
    assign_repeat, run_harness, run_trials, HarnessConfig, HarnessError, HarnessProgress,
    HarnessResults, RoundResult, RoundTable,
};
pub use scenario::{parse_scene, Scenario, ScenarioError};
