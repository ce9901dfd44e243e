//! Normalization into the shared 0-1000 coordinate space
//!
//! Every polygon is scaled by the base dimensions of the frame it was drawn
//! on, so a lane calibrated on a 1920x1080 snapshot and an accident outline
//! reported on a 640x360 stream can be compared directly.

use laneguard_core::{FramePolygon, Point};

/// Side length of the normalized space
pub const NORMALIZED_EXTENT: f64 = 1000.0;

/// Minimum number of points a polygon needs before closing
pub const MIN_POLYGON_POINTS: usize = 3;

/// Why a frame polygon could not be normalized
#[derive(Clone, Debug, PartialEq)]
pub enum Malformed {
    TooFewPoints(usize),
    InvalidBase { width: f64, height: f64 },
    NonFinitePoint(usize),
}

impl std::fmt::Display for Malformed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Malformed::TooFewPoints(n) => {
                write!(f, "polygon has {} points, need at least {}", n, MIN_POLYGON_POINTS)
            }
            Malformed::InvalidBase { width, height } => {
                write!(f, "invalid base dimensions {}x{}", width, height)
            }
            Malformed::NonFinitePoint(i) => write!(f, "point {} is not finite", i),
        }
    }
}

/// Closed polygon in normalized space (first point == last point)
#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedPolygon {
    ring: Vec<Point>,
}

impl NormalizedPolygon {
    /// Closed ring including the repeated first point
    pub fn ring(&self) -> &[Point] {
        &self.ring
    }

    /// Distinct vertices (ring without the closing point)
    pub fn vertices(&self) -> &[Point] {
        &self.ring[..self.ring.len() - 1]
    }

    /// Signed shoelace area, positive for counter-clockwise rings
    pub fn signed_area(&self) -> f64 {
        crate::clip::signed_area(self.vertices())
    }
}

/// Scale a frame polygon into normalized space and close it
pub fn normalize(polygon: &FramePolygon) -> Result<NormalizedPolygon, Malformed> {
    if polygon.points.len() < MIN_POLYGON_POINTS {
        return Err(Malformed::TooFewPoints(polygon.points.len()));
    }

    let (w, h) = (polygon.base_width, polygon.base_height);
    if !(w.is_finite() && h.is_finite() && w > 0.0 && h > 0.0) {
        return Err(Malformed::InvalidBase {
            width: w,
            height: h,
        });
    }

    let mut ring = Vec::with_capacity(polygon.points.len() + 1);
    for (i, p) in polygon.points.iter().enumerate() {
        let scaled = Point::new(p.x / w * NORMALIZED_EXTENT, p.y / h * NORMALIZED_EXTENT);
        // also catches overflow from a tiny base
        if !(scaled.x.is_finite() && scaled.y.is_finite()) {
            return Err(Malformed::NonFinitePoint(i));
        }
        ring.push(scaled);
    }

    let first = ring[0];
    if ring.last() != Some(&first) {
        ring.push(first);
    }

    Ok(NormalizedPolygon { ring })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_scales_by_own_base() {
        let hd = FramePolygon::from_tuples(&[(0.0, 0.0), (1920.0, 0.0), (960.0, 1080.0)], 1920.0, 1080.0);
        let sd = FramePolygon::from_tuples(&[(0.0, 0.0), (640.0, 0.0), (320.0, 360.0)], 640.0, 360.0);

        let a = normalize(&hd).unwrap();
        let b = normalize(&sd).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.vertices()[1], Point::new(1000.0, 0.0));
        assert_eq!(a.vertices()[2], Point::new(500.0, 1000.0));
    }

    #[test]
    fn test_normalize_closes_open_ring() {
        let poly = FramePolygon::from_tuples(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)], 10.0, 10.0);
        let norm = normalize(&poly).unwrap();

        assert_eq!(norm.ring().len(), 4);
        assert_eq!(norm.ring()[0], norm.ring()[3]);
        assert_eq!(norm.vertices().len(), 3);
    }

    #[test]
    fn test_normalize_keeps_closed_ring() {
        let poly = FramePolygon::from_tuples(
            &[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 0.0)],
            10.0,
            10.0,
        );
        let norm = normalize(&poly).unwrap();
        assert_eq!(norm.ring().len(), 4);
    }

    #[test]
    fn test_normalize_rejects_malformed() {
        let two = FramePolygon::from_tuples(&[(0.0, 0.0), (1.0, 1.0)], 10.0, 10.0);
        assert_eq!(normalize(&two), Err(Malformed::TooFewPoints(2)));

        let zero_base = FramePolygon::from_tuples(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)], 0.0, 10.0);
        assert!(matches!(
            normalize(&zero_base),
            Err(Malformed::InvalidBase { .. })
        ));

        let nan = FramePolygon::from_tuples(&[(0.0, 0.0), (f64::NAN, 0.0), (1.0, 1.0)], 10.0, 10.0);
        assert_eq!(normalize(&nan), Err(Malformed::NonFinitePoint(1)));
    }
}
