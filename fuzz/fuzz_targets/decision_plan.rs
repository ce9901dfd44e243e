//! Arbitrary lane counts, blocked sets and severities through the plan
//! calculator. The posted limit must stay within bounds.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use laneguard_core::Lane;
use laneguard_decision::{calculate, PlanInput, MAX_SPEED_LIMIT, MIN_SPEED_LIMIT};

#[derive(Arbitrary, Debug)]
struct Input {
    lane_count: u8,
    blocked: Vec<u32>,
    severity: Option<u8>,
    recommendations: Vec<String>,
    speed_limit: u32,
}

fuzz_target!(|input: Input| {
    let lanes: Vec<Lane> = (1..=input.lane_count.min(32) as usize)
        .map(|i| Lane::new(format!("L{}", i), format!("Lane {}", i)))
        .collect();

    let plan = calculate(PlanInput {
        lanes: &lanes,
        blocked: &input.blocked,
        severity: input.severity,
        recommendations: &input.recommendations,
        speed_limit: input.speed_limit,
    });

    assert!((MIN_SPEED_LIMIT..=MAX_SPEED_LIMIT).contains(&plan.speed.adjusted));
    assert_eq!(plan.directives.len(), lanes.len());
    let tokens = plan.lane_configuration.split(',').filter(|s| !s.is_empty());
    assert_eq!(tokens.count(), lanes.len());
});
