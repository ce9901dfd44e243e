//! laneguard Test Harness - Scenario testing and benchmarks
//!
//! This crate provides:
//! - Simulated edge nodes with calibrated lane polygons
//! - A simulated dashboard operator
//! - A recording stand-in for the cooperating incident system
//! - End-to-end scenarios with exactly-once and suppression checks

pub mod simulator;
pub mod integration;

pub use simulator::*;
pub use integration::*;
