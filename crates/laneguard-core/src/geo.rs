//! Geometry input types
//!
//! Polygons are drawn by operators on camera frames, so their points live in
//! the pixel space of whatever resolution that frame had. Each polygon
//! carries the base width/height of its own frame.

use serde::{Deserialize, Serialize};

use crate::{LaneguardError, LaneguardResult};

/// 2-D point in source pixel space
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Point { x, y }
    }
}

/// A polygon drawn on a frame of `base_width` x `base_height` pixels
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FramePolygon {
    pub points: Vec<Point>,
    pub base_width: f64,
    pub base_height: f64,
}

impl FramePolygon {
    pub fn new(points: Vec<Point>, base_width: f64, base_height: f64) -> Self {
        FramePolygon {
            points,
            base_width,
            base_height,
        }
    }

    pub fn from_tuples(points: &[(f64, f64)], base_width: f64, base_height: f64) -> Self {
        Self::new(
            points.iter().copied().map(Point::from).collect(),
            base_width,
            base_height,
        )
    }
}

/// WGS84 position of an incident
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Coordinates { lat, lng }
    }

    /// Reject NaN and out-of-range values
    pub fn validate(&self) -> LaneguardResult<()> {
        if !self.lat.is_finite() || !(-90.0..=90.0).contains(&self.lat) {
            return Err(LaneguardError::validation(format!(
                "latitude {} outside [-90, 90]",
                self.lat
            )));
        }
        if !self.lng.is_finite() || !(-180.0..=180.0).contains(&self.lng) {
            return Err(LaneguardError::validation(format!(
                "longitude {} outside [-180, 180]",
                self.lng
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinates_bounds() {
        assert!(Coordinates::new(37.5, 127.0).validate().is_ok());
        assert!(Coordinates::new(-90.0, 180.0).validate().is_ok());
        assert!(Coordinates::new(90.1, 0.0).validate().is_err());
        assert!(Coordinates::new(0.0, -180.5).validate().is_err());
        assert!(Coordinates::new(f64::NAN, 0.0).validate().is_err());
    }

    #[test]
    fn test_frame_polygon_wire_names() {
        let json = r#"{"points":[{"x":1,"y":2}],"baseWidth":1920,"baseHeight":1080}"#;
        let poly: FramePolygon = serde_json::from_str(json).unwrap();
        assert_eq!(poly.points[0], Point::new(1.0, 2.0));
        assert_eq!(poly.base_width, 1920.0);
    }
}
