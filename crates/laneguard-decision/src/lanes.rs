//! Lane configuration
//!
//! Lane positions are 1-indexed and follow the node's stored lane order.
//! A free lane next to exactly one blocked neighbour steers traffic away
//! from that neighbour.

use laneguard_core::LaneDirective;

/// Directive for every lane position `1..=lane_count`
pub fn lane_directives(lane_count: usize, blocked: &[u32]) -> Vec<LaneDirective> {
    let is_blocked = |pos: usize| pos >= 1 && pos <= lane_count && blocked.contains(&(pos as u32));

    (1..=lane_count)
        .map(|pos| {
            if is_blocked(pos) {
                return LaneDirective::Blocked;
            }
            let left = is_blocked(pos - 1);
            let right = is_blocked(pos + 1);
            match (left, right) {
                (true, false) => LaneDirective::Right,
                (false, true) => LaneDirective::Left,
                _ => LaneDirective::Open,
            }
        })
        .collect()
}

/// Comma-joined directives, the literal text for the roadside display
pub fn configuration_string(directives: &[LaneDirective]) -> String {
    directives
        .iter()
        .map(|d| d.as_str())
        .collect::<Vec<_>>()
        .join(",")
}
