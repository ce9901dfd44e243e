//! laneguard Coordinator - Shared incident state
//!
//! This crate holds the process-wide mutable state of incident handling,
//! each piece behind a store trait so a multi-instance deployment can back
//! it with a shared cache:
//! - Pending operator decisions with exactly-once resolution
//! - Outbound notification markers for echo suppression
//! - Incidents awaiting resolution

pub mod pending;
pub mod suppressor;
pub mod incidents;

pub use pending::*;
pub use suppressor::*;
pub use incidents::*;
