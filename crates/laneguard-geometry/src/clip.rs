//! Polygon overlap area
//!
//! Lane outlines are often concave (curving lanes, perspective wedges), so
//! both polygons are first ear-clipped into triangles. The triangles of one
//! polygon partition it, which makes the overlap area the sum of the
//! pairwise triangle intersections, each of which is a convex clip.

use laneguard_core::Point;

/// Areas below this are treated as zero (normalized units squared)
pub const AREA_EPSILON: f64 = 1e-6;

const CROSS_EPSILON: f64 = 1e-9;

pub type Triangle = [Point; 3];

#[inline]
fn cross(o: Point, a: Point, b: Point) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// Shoelace area of an open ring, positive when counter-clockwise
pub fn signed_area(vertices: &[Point]) -> f64 {
    if vertices.len() < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    let mut j = vertices.len() - 1;
    for i in 0..vertices.len() {
        sum += (vertices[j].x * vertices[i].y) - (vertices[i].x * vertices[j].y);
        j = i;
    }
    sum / 2.0
}

fn point_in_triangle(p: Point, a: Point, b: Point, c: Point) -> bool {
    cross(a, b, p) >= -CROSS_EPSILON
        && cross(b, c, p) >= -CROSS_EPSILON
        && cross(c, a, p) >= -CROSS_EPSILON
}

/// Ear-clip an open ring into counter-clockwise triangles.
///
/// Returns `None` when the ring has no area or cannot be fully clipped
/// (self-intersecting outlines); the triangles found so far are dropped in
/// that case since they would under-report the covered area.
pub fn triangulate(vertices: &[Point]) -> Option<Vec<Triangle>> {
    let mut ring = open_ring(vertices);
    if ring.len() < 3 || signed_area(&ring).abs() < AREA_EPSILON {
        return None;
    }
    if signed_area(&ring) < 0.0 {
        ring.reverse();
    }

    let mut triangles = Vec::with_capacity(ring.len() - 2);
    let mut idx: Vec<usize> = (0..ring.len()).collect();

    while idx.len() > 3 {
        let n = idx.len();
        let mut clipped = false;

        for i in 0..n {
            let (a, b, c) = (ring[idx[(i + n - 1) % n]], ring[idx[i]], ring[idx[(i + 1) % n]]);
            if cross(a, b, c) <= CROSS_EPSILON {
                continue;
            }
            let blocked = idx.iter().enumerate().any(|(k, &v)| {
                k != i && k != (i + n - 1) % n && k != (i + 1) % n && point_in_triangle(ring[v], a, b, c)
            });
            if !blocked {
                triangles.push([a, b, c]);
                idx.remove(i);
                clipped = true;
                break;
            }
        }

        if !clipped {
            // Collinear vertices carry no area; drop one and retry.
            let collinear = (0..n).find(|&i| {
                let (a, b, c) = (ring[idx[(i + n - 1) % n]], ring[idx[i]], ring[idx[(i + 1) % n]]);
                cross(a, b, c).abs() <= CROSS_EPSILON
            });
            match collinear {
                Some(i) => {
                    idx.remove(i);
                }
                None => return None,
            }
        }
    }

    let last = [ring[idx[0]], ring[idx[1]], ring[idx[2]]];
    if cross(last[0], last[1], last[2]) > CROSS_EPSILON {
        triangles.push(last);
    }

    if triangles.is_empty() {
        None
    } else {
        Some(triangles)
    }
}

/// Drop repeated consecutive points and the closing point
fn open_ring(vertices: &[Point]) -> Vec<Point> {
    let mut ring: Vec<Point> = Vec::with_capacity(vertices.len());
    for &p in vertices {
        if ring.last() != Some(&p) {
            ring.push(p);
        }
    }
    while ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    ring
}

/// Crossing point of segments `p1p2` and `q1q2` when they cross at a
/// single interior point of both (touching endpoints do not count)
fn proper_crossing(p1: Point, p2: Point, q1: Point, q2: Point) -> Option<Point> {
    let d1 = cross(p1, p2, q1);
    let d2 = cross(p1, p2, q2);
    let d3 = cross(q1, q2, p1);
    let d4 = cross(q1, q2, p2);
    let straddles = |a: f64, b: f64| {
        (a > CROSS_EPSILON && b < -CROSS_EPSILON) || (a < -CROSS_EPSILON && b > CROSS_EPSILON)
    };
    if !(straddles(d1, d2) && straddles(d3, d4)) {
        return None;
    }
    let t = d3 / (d3 - d4);
    Some(Point::new(p1.x + (p2.x - p1.x) * t, p1.y + (p2.y - p1.y) * t))
}

/// First pair of non-adjacent edges that cross, with the crossing point
fn first_crossing(ring: &[Point]) -> Option<(usize, usize, Point)> {
    let n = ring.len();
    for i in 0..n {
        for j in (i + 2)..n {
            if i == 0 && j == n - 1 {
                continue;
            }
            let hit = proper_crossing(ring[i], ring[(i + 1) % n], ring[j], ring[(j + 1) % n]);
            if let Some(x) = hit {
                return Some((i, j, x));
            }
        }
    }
    None
}

/// Split a self-intersecting ring at its edge crossings into rings that
/// do not cross themselves. A simple ring comes back unchanged.
///
/// Splitting edges `i` and `j` at crossing `x` yields
/// `[x, v(i+1) ..= v(j)]` and `[v(j+1) .. v(i), x]`; both are strictly
/// shorter than the input, so the worklist drains.
pub fn simple_rings(vertices: &[Point]) -> Vec<Vec<Point>> {
    let mut done = Vec::new();
    let mut work = vec![open_ring(vertices)];

    while let Some(ring) = work.pop() {
        if ring.len() < 3 {
            continue;
        }
        match first_crossing(&ring) {
            Some((i, j, x)) => {
                let mut inner = Vec::with_capacity(j - i + 1);
                inner.push(x);
                inner.extend_from_slice(&ring[i + 1..=j]);

                let mut outer = Vec::with_capacity(ring.len() - (j - i) + 1);
                outer.extend_from_slice(&ring[j + 1..]);
                outer.extend_from_slice(&ring[..=i]);
                outer.push(x);

                work.push(open_ring(&inner));
                work.push(open_ring(&outer));
            }
            None => done.push(ring),
        }
    }

    done
}

/// Triangles covering any ring, including outlines that cross themselves.
///
/// Each simple piece is ear-clipped on its own; pieces with no area are
/// skipped. `None` only when no piece has area.
pub fn triangulate_any(vertices: &[Point]) -> Option<Vec<Triangle>> {
    let triangles: Vec<Triangle> = simple_rings(vertices)
        .iter()
        .filter_map(|ring| triangulate(ring))
        .flatten()
        .collect();
    if triangles.is_empty() {
        None
    } else {
        Some(triangles)
    }
}

/// Sutherland-Hodgman clip of `subject` by a convex counter-clockwise `clip`
pub fn clip_convex(subject: &[Point], clip: &[Point]) -> Vec<Point> {
    let mut output: Vec<Point> = subject.to_vec();
    let m = clip.len();

    for e in 0..m {
        if output.is_empty() {
            break;
        }
        let (ca, cb) = (clip[e], clip[(e + 1) % m]);
        let input = std::mem::take(&mut output);
        let mut prev = input[input.len() - 1];
        let mut prev_in = cross(ca, cb, prev) >= 0.0;

        for &cur in &input {
            let cur_in = cross(ca, cb, cur) >= 0.0;
            if cur_in != prev_in {
                output.push(edge_intersection(prev, cur, ca, cb));
            }
            if cur_in {
                output.push(cur);
            }
            prev = cur;
            prev_in = cur_in;
        }
    }

    output
}

fn edge_intersection(p: Point, q: Point, a: Point, b: Point) -> Point {
    let dp = cross(a, b, p);
    let dq = cross(a, b, q);
    let denom = dp - dq;
    if denom.abs() < f64::EPSILON {
        return q;
    }
    let t = dp / denom;
    Point::new(p.x + (q.x - p.x) * t, p.y + (q.y - p.y) * t)
}

#[derive(Clone, Copy)]
struct Bounds {
    min: Point,
    max: Point,
}

impl Bounds {
    fn of(points: &[Point]) -> Self {
        let mut b = Bounds {
            min: Point::new(f64::INFINITY, f64::INFINITY),
            max: Point::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
        };
        for p in points {
            b.min.x = b.min.x.min(p.x);
            b.min.y = b.min.y.min(p.y);
            b.max.x = b.max.x.max(p.x);
            b.max.y = b.max.y.max(p.y);
        }
        b
    }

    fn overlaps(&self, other: &Bounds) -> bool {
        self.min.x < other.max.x
            && other.min.x < self.max.x
            && self.min.y < other.max.y
            && other.min.y < self.max.y
    }
}

/// Area shared by two triangulated polygons
pub fn intersection_area(a: &[Triangle], b: &[Triangle]) -> f64 {
    let b_bounds: Vec<Bounds> = b.iter().map(|t| Bounds::of(t)).collect();
    let mut total = 0.0;

    for ta in a {
        let ba = Bounds::of(ta);
        for (tb, bb) in b.iter().zip(&b_bounds) {
            if !ba.overlaps(bb) {
                continue;
            }
            let piece = clip_convex(ta, tb);
            total += signed_area(&piece).abs();
        }
    }

    total
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pts(raw: &[(f64, f64)]) -> Vec<Point> {
        raw.iter().copied().map(Point::from).collect()
    }

    fn area_of(tris: &[Triangle]) -> f64 {
        tris.iter().map(|t| signed_area(t)).sum()
    }

    #[test]
    fn test_signed_area_orientation() {
        let ccw = pts(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]);
        assert_eq!(signed_area(&ccw), 100.0);

        let mut cw = ccw.clone();
        cw.reverse();
        assert_eq!(signed_area(&cw), -100.0);
    }

    #[test]
    fn test_triangulate_concave_preserves_area() {
        // L-shape, area 300
        let l = pts(&[
            (0.0, 0.0),
            (20.0, 0.0),
            (20.0, 10.0),
            (10.0, 10.0),
            (10.0, 20.0),
            (0.0, 20.0),
        ]);
        let tris = triangulate(&l).unwrap();
        assert!((area_of(&tris) - 300.0).abs() < 1e-9);
    }

    #[test]
    fn test_triangulate_clockwise_input() {
        let cw = pts(&[(0.0, 10.0), (10.0, 10.0), (10.0, 0.0), (0.0, 0.0)]);
        let tris = triangulate(&cw).unwrap();
        assert!((area_of(&tris) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_triangulate_degenerate() {
        let line = pts(&[(0.0, 0.0), (5.0, 5.0), (10.0, 10.0)]);
        assert!(triangulate(&line).is_none());

        let repeated = pts(&[(1.0, 1.0), (1.0, 1.0), (1.0, 1.0)]);
        assert!(triangulate(&repeated).is_none());
    }

    #[test]
    fn test_triangulate_skips_collinear_vertex() {
        let square = pts(&[(0.0, 0.0), (5.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]);
        let tris = triangulate(&square).unwrap();
        assert!((area_of(&tris) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_clip_convex_half_overlap() {
        let a = pts(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]);
        let b = pts(&[(5.0, 0.0), (15.0, 0.0), (15.0, 10.0), (5.0, 10.0)]);
        let piece = clip_convex(&a, &b);
        assert!((signed_area(&piece).abs() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_intersection_area_identical() {
        let a = triangulate(&pts(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)])).unwrap();
        assert!((intersection_area(&a, &a) - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_intersection_area_edge_touch_is_zero() {
        let a = triangulate(&pts(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)])).unwrap();
        let b = triangulate(&pts(&[(10.0, 0.0), (20.0, 0.0), (20.0, 10.0), (10.0, 10.0)])).unwrap();
        assert!(intersection_area(&a, &b) < AREA_EPSILON);
    }

    #[test]
    fn test_intersection_area_contained() {
        let outer = triangulate(&pts(&[(0.0, 0.0), (100.0, 0.0), (100.0, 100.0), (0.0, 100.0)])).unwrap();
        let inner = triangulate(&pts(&[(40.0, 40.0), (60.0, 40.0), (50.0, 60.0)])).unwrap();
        assert!((intersection_area(&outer, &inner) - 200.0).abs() < 1e-6);
        assert!((intersection_area(&inner, &outer) - 200.0).abs() < 1e-6);
    }

    #[test]
    fn test_simple_ring_is_not_split() {
        let square = pts(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]);
        assert_eq!(simple_rings(&square), vec![square]);
    }

    #[test]
    fn test_bowtie_splits_into_two_lobes() {
        let bowtie = pts(&[(0.0, 0.0), (100.0, 100.0), (100.0, 0.0), (0.0, 100.0)]);
        assert!(triangulate(&bowtie).is_none());

        let rings = simple_rings(&bowtie);
        assert_eq!(rings.len(), 2);
        assert!(rings.iter().all(|r| r.contains(&Point::new(50.0, 50.0))));

        let tris = triangulate_any(&bowtie).unwrap();
        assert!((area_of(&tris) - 5000.0).abs() < 1e-6);
    }

    #[test]
    fn test_bowtie_overlaps_itself_and_a_cover() {
        let bowtie = triangulate_any(&pts(&[(0.0, 0.0), (100.0, 100.0), (100.0, 0.0), (0.0, 100.0)])).unwrap();
        assert!((intersection_area(&bowtie, &bowtie) - 5000.0).abs() < 1e-6);

        let cover = triangulate(&pts(&[(0.0, 0.0), (1000.0, 0.0), (1000.0, 1000.0), (0.0, 1000.0)])).unwrap();
        assert!((intersection_area(&cover, &bowtie) - 5000.0).abs() < 1e-6);
    }

    #[test]
    fn test_doubly_crossed_ring_terminates() {
        // several edge crossings
        let zigzag = pts(&[(0.0, 0.0), (30.0, 10.0), (30.0, 0.0), (0.0, 10.0), (60.0, 0.0), (60.0, 10.0)]);
        let tris = triangulate_any(&zigzag).unwrap();
        assert!(area_of(&tris) > 0.0);
    }
}
