//! laneguard Decision - What the roadside should do about an accident
//!
//! Pure functions, no shared state:
//! - Per-lane directives and the display configuration string
//! - Speed-limit reduction from blocked ratio, severity and recommendations
//! - Action derivation and the display payload

pub mod lanes;
pub mod speed;
pub mod plan;

pub use lanes::*;
pub use speed::*;
pub use plan::*;
