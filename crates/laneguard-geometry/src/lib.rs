//! laneguard Geometry - Lane blockage analysis
//!
//! This crate decides which calibrated lanes an accident outline covers:
//! - Normalization of frame polygons into a shared 0-1000 space
//! - Ear-clipping triangulation and convex clipping
//! - Overlap-area based intersection test
//! - Lane number extraction from lane names

pub mod normalize;
pub mod clip;
pub mod analyzer;

pub use normalize::*;
pub use clip::*;
pub use analyzer::*;
