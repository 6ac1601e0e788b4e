//! Domain models for the deal engine.
//!
//! These are the core types shared across all crates.

pub mod activity;
pub mod deal;
pub mod stage;
