//! # Wavelab Test Utilities
//!
//! Shared testing utilities for all crates:
//! - Scenario builders and ready-made trial records
//! - Merge-law harness for aggregates
//! - Property-based testing strategies

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod laws;

/// Re-export proptest for convenience.
pub use proptest;
