//! Arbitrary accident and lane polygons through the analyzer.
//! Degenerate input must degrade to "no match", never panic.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use laneguard_core::{FramePolygon, LanePolygon, Point};
use laneguard_geometry::{analyze, blocked_lane_numbers};

#[derive(Arbitrary, Debug)]
struct Shape {
    points: Vec<(f64, f64)>,
    base_width: f64,
    base_height: f64,
}

impl Shape {
    fn polygon(&self) -> FramePolygon {
        FramePolygon::new(
            self.points.iter().map(|&(x, y)| Point::new(x, y)).collect(),
            self.base_width,
            self.base_height,
        )
    }
}

#[derive(Arbitrary, Debug)]
struct Input {
    accident: Shape,
    lanes: Vec<(String, Shape)>,
}

fuzz_target!(|input: Input| {
    let accident = input.accident.polygon();
    let lanes: Vec<LanePolygon> = input
        .lanes
        .iter()
        .take(16)
        .enumerate()
        .map(|(i, (name, shape))| {
            LanePolygon::new(format!("P{}", i), name.clone(), shape.polygon())
        })
        .collect();

    let blocked = analyze(&accident, &lanes);
    assert!(blocked.len() <= lanes.len());
    for lane in &blocked {
        assert!(lane.overlap_area.is_finite() && lane.overlap_area > 0.0);
    }
    let numbers = blocked_lane_numbers(&blocked);
    assert!(numbers.len() <= blocked.len());
});
