//! laneguard Liveness - Edge node registry
//!
//! This crate implements:
//! - Node storage with per-node locking
//! - Heartbeat ingestion (last-write-wins by sender timestamp)
//! - Lazy and periodic staleness sweeps (ONLINE -> OFFLINE)
//! - Registration and terminal deregistration

pub mod store;
pub mod monitor;

pub use store::*;
pub use monitor::*;
