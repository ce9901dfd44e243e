//! Speed-limit reduction
//!
//! reduction = blocked/total * 0.5
//!           (+ severity/5 * 0.3, combined cap 0.7)
//!           raised to any floor a recommendation tag asks for.
//! The posted result is always within [40, 200] km/h.

use serde::{Deserialize, Serialize};

/// Lowest limit ever posted, km/h
pub const MIN_SPEED_LIMIT: u32 = 40;
/// Highest limit ever posted, km/h
pub const MAX_SPEED_LIMIT: u32 = 200;

const BLOCKED_RATIO_WEIGHT: f64 = 0.5;
const SEVERITY_WEIGHT: f64 = 0.3;
const MAX_SEVERITY: u8 = 5;
const MAX_COMBINED_REDUCTION: f64 = 0.7;

/// Classifier recommendation tags that carry a reduction floor
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Recommendation {
    ReduceSpeed50,
    ReduceSpeed30,
}

impl Recommendation {
    /// Accepts `REDUCE_SPEED_50`, `reduce-speed-50`, `SPEED_REDUCTION_30` ...
    pub fn parse(tag: &str) -> Option<Self> {
        let norm: String = tag
            .trim()
            .chars()
            .map(|c| if c == '-' || c == ' ' { '_' } else { c.to_ascii_uppercase() })
            .collect();
        match norm.as_str() {
            "REDUCE_SPEED_50" | "SPEED_REDUCTION_50" | "REDUCE_SPEED_50_PERCENT" => {
                Some(Recommendation::ReduceSpeed50)
            }
            "REDUCE_SPEED_30" | "SPEED_REDUCTION_30" | "REDUCE_SPEED_30_PERCENT" => {
                Some(Recommendation::ReduceSpeed30)
            }
            _ => None,
        }
    }

    pub fn min_reduction(self) -> f64 {
        match self {
            Recommendation::ReduceSpeed50 => 0.5,
            Recommendation::ReduceSpeed30 => 0.3,
        }
    }
}

/// Result of the speed computation
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeedAdjustment {
    pub original: u32,
    pub adjusted: u32,
    pub reduction_factor: f64,
}

impl SpeedAdjustment {
    /// km/h taken off by the reduction. An original limit outside the
    /// posted range is clamped first, so the clamp alone never counts.
    pub fn reduced_by(&self) -> u32 {
        self.original
            .clamp(MIN_SPEED_LIMIT, MAX_SPEED_LIMIT)
            .saturating_sub(self.adjusted)
    }
}

/// Fractional reduction in [0, 1]
pub fn reduction_factor(
    blocked_count: usize,
    total_lanes: usize,
    severity: Option<u8>,
    recommendations: &[String],
) -> f64 {
    let ratio = if total_lanes == 0 {
        0.0
    } else {
        (blocked_count.min(total_lanes) as f64) / (total_lanes as f64)
    };
    let mut reduction = ratio * BLOCKED_RATIO_WEIGHT;

    if let Some(severity) = severity {
        let severity = severity.min(MAX_SEVERITY) as f64;
        reduction = (reduction + severity / MAX_SEVERITY as f64 * SEVERITY_WEIGHT)
            .min(MAX_COMBINED_REDUCTION);
    }

    let floor = recommendations
        .iter()
        .filter_map(|tag| Recommendation::parse(tag))
        .map(Recommendation::min_reduction)
        .fold(0.0, f64::max);

    reduction.max(floor).clamp(0.0, 1.0)
}

/// Apply a reduction and clamp into the posted range
pub fn adjust_speed_limit(original: u32, reduction: f64) -> u32 {
    let reduction = if reduction.is_finite() {
        reduction.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let raw = (original as f64 * (1.0 - reduction)).round();
    (raw as u32).clamp(MIN_SPEED_LIMIT, MAX_SPEED_LIMIT)
}

pub fn compute_speed(
    original: u32,
    blocked_count: usize,
    total_lanes: usize,
    severity: Option<u8>,
    recommendations: &[String],
) -> SpeedAdjustment {
    let reduction_factor = reduction_factor(blocked_count, total_lanes, severity, recommendations);
    SpeedAdjustment {
        original,
        adjusted: adjust_speed_limit(original, reduction_factor),
        reduction_factor,
    }
}
