//! laneguard Runtime - Incident response service
//!
//! This crate provides:
//! - Runtime configuration and logging setup
//! - The incident orchestrator (analysis, plan, operator wait, apply)
//! - Dashboard event broadcast
//! - Outbound notification to the cooperating incident system
//! - The axum HTTP boundary used by the `laneguard` binary

pub mod config;
pub mod events;
pub mod http;
pub mod logging;
pub mod notifier;
pub mod orchestrator;

pub use config::*;
pub use events::*;
pub use http::{router, ApiError};
pub use logging::*;
pub use notifier::*;
pub use orchestrator::*;
