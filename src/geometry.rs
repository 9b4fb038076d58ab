//! Robust geometric predicates (§4.B): orientation, segment intersection,
//! point-in-polygon, and the plane-projection helpers the rest of the crate
//! leans on to stay exact near-degenerate input.

use glam::{DVec2, DVec3};

/// Which side of a directed line `(a, b)` a point `p` falls on, computed
/// with an adaptive-precision determinant so near-collinear inputs still
/// get the sign right.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Left,
    Right,
    Collinear,
}

/// The signed value behind [`orient2d`]: twice the signed area of triangle
/// `(a, b, c)`. Exposed separately so callers that need a magnitude (e.g. a
/// near-collinearity tolerance) aren't limited to the three-way sign.
pub fn orient2d_raw(a: DVec2, b: DVec2, c: DVec2) -> f64 {
    robust::orient2d(
        robust::Coord { x: a.x, y: a.y },
        robust::Coord { x: b.x, y: b.y },
        robust::Coord { x: c.x, y: c.y },
    )
}

/// Exact-sign 2D orientation test via `robust::orient2d`.
pub fn orient2d(a: DVec2, b: DVec2, c: DVec2) -> Orientation {
    let sign = orient2d_raw(a, b, c);

    if sign > 0.0 {
        Orientation::Left
    } else if sign < 0.0 {
        Orientation::Right
    } else {
        Orientation::Collinear
    }
}

pub fn collinear(a: DVec2, b: DVec2, c: DVec2) -> bool {
    orient2d(a, b, c) == Orientation::Collinear
}

/// Outcome of intersecting two 2D segments `(a0, a1)` and `(b0, b1)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SegmentIntersection {
    /// No overlap at all.
    None,
    /// A single crossing point, interior to at least one of the segments.
    Point(DVec2),
    /// The segments lie on the same line and overlap along a sub-segment.
    Collinear { from: DVec2, to: DVec2 },
}

/// Intersects two segments using `orient2d` for the crossing test and exact
/// parameter solves for the crossing point, so nearly-parallel segments
/// don't produce a spurious point far from either.
pub fn compute_segment_intersection(a0: DVec2, a1: DVec2, b0: DVec2, b1: DVec2) -> SegmentIntersection {
    let o1 = orient2d(a0, a1, b0);
    let o2 = orient2d(a0, a1, b1);
    let o3 = orient2d(b0, b1, a0);
    let o4 = orient2d(b0, b1, a1);

    if o1 == Orientation::Collinear
        && o2 == Orientation::Collinear
        && o3 == Orientation::Collinear
        && o4 == Orientation::Collinear
    {
        return collinear_overlap(a0, a1, b0, b1);
    }

    if o1 != o2 && o3 != o4 {
        let d1 = a1 - a0;
        let d2 = b1 - b0;
        let denom = d1.x * d2.y - d1.y * d2.x;
        if denom.abs() <= f64::EPSILON {
            return SegmentIntersection::None;
        }
        let t = ((b0.x - a0.x) * d2.y - (b0.y - a0.y) * d2.x) / denom;
        return SegmentIntersection::Point(a0 + d1 * t);
    }

    SegmentIntersection::None
}

fn collinear_overlap(a0: DVec2, a1: DVec2, b0: DVec2, b1: DVec2) -> SegmentIntersection {
    let axis = a1 - a0;
    let project = |p: DVec2| if axis.x.abs() >= axis.y.abs() { p.x } else { p.y };

    let (a_lo, a_hi) = minmax(project(a0), project(a1));
    let (b_lo, b_hi) = minmax(project(b0), project(b1));

    let lo = a_lo.max(b_lo);
    let hi = a_hi.min(b_hi);

    if lo > hi {
        return SegmentIntersection::None;
    }

    let param = |t: f64| -> DVec2 {
        if axis.x.abs() >= axis.y.abs() {
            a0.lerp(a1, (t - a0.x) / (a1.x - a0.x))
        } else {
            a0.lerp(a1, (t - a0.y) / (a1.y - a0.y))
        }
    };

    if (hi - lo).abs() <= f64::EPSILON {
        SegmentIntersection::Point(param(lo))
    } else {
        SegmentIntersection::Collinear {
            from: param(lo),
            to: param(hi),
        }
    }
}

fn minmax(a: f64, b: f64) -> (f64, f64) {
    if a <= b { (a, b) } else { (b, a) }
}

/// Outcome of a point-in-polygon test (§4.B; spec `{'i','o','v','e'}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointInPolygon {
    Interior,
    Exterior,
    OnVertex,
    OnEdge,
}

/// Crossing-number test against a CCW simple polygon, with `orient2d` used
/// to resolve the boundary cases exactly. A point coincident with a vertex
/// is reported as `OnVertex` rather than folded into `OnEdge`, since callers
/// that partition around a vertex need to tell the two apart.
pub fn compute_point_in_polygon_test(point: DVec2, polygon: &[DVec2]) -> PointInPolygon {
    let n = polygon.len();
    if n < 3 {
        return PointInPolygon::Exterior;
    }

    for &vertex in polygon {
        if coincident(point, vertex) {
            return PointInPolygon::OnVertex;
        }
    }

    for i in 0..n {
        let a = polygon[i];
        let b = polygon[(i + 1) % n];
        if collinear(a, b, point) && within_bbox(point, a, b) {
            return PointInPolygon::OnEdge;
        }
    }

    let mut inside = false;
    for i in 0..n {
        let a = polygon[i];
        let b = polygon[(i + 1) % n];

        let crosses = (a.y > point.y) != (b.y > point.y);
        if crosses {
            let x_at_y = a.x + (point.y - a.y) / (b.y - a.y) * (b.x - a.x);
            if point.x < x_at_y {
                inside = !inside;
            }
        }
    }

    if inside {
        PointInPolygon::Interior
    } else {
        PointInPolygon::Exterior
    }
}

fn coincident(p: DVec2, q: DVec2) -> bool {
    (p - q).length_squared() <= f64::EPSILON
}

fn within_bbox(p: DVec2, a: DVec2, b: DVec2) -> bool {
    let (lo_x, hi_x) = minmax(a.x, b.x);
    let (lo_y, hi_y) = minmax(a.y, b.y);
    p.x >= lo_x - f64::EPSILON
        && p.x <= hi_x + f64::EPSILON
        && p.y >= lo_y - f64::EPSILON
        && p.y <= hi_y + f64::EPSILON
}

/// `(normal, d)` such that `dot(normal, p) = d` for every `p` on the plane
/// through `polygon`'s first three non-collinear vertices.
pub fn compute_polygon_plane_coefficients(polygon: &[DVec3]) -> Option<(DVec3, f64)> {
    if polygon.len() < 3 {
        return None;
    }

    let origin = polygon[0];
    let mut normal = DVec3::ZERO;
    // Newell's method: robust to a polygon whose first three vertices
    // happen to be (near-)collinear even though the polygon as a whole
    // isn't degenerate.
    for i in 0..polygon.len() {
        let current = polygon[i];
        let next = polygon[(i + 1) % polygon.len()];
        normal.x += (current.y - next.y) * (current.z + next.z);
        normal.y += (current.z - next.z) * (current.x + next.x);
        normal.z += (current.x - next.x) * (current.y + next.y);
    }

    if normal.length_squared() <= f64::EPSILON {
        return None;
    }

    let normal = normal.normalize();
    Some((normal, normal.dot(origin)))
}

pub fn coplanar(points: &[DVec3], epsilon: f64) -> bool {
    let Some((normal, d)) = compute_polygon_plane_coefficients(points) else {
        return true;
    };
    points.iter().all(|p| (normal.dot(*p) - d).abs() <= epsilon)
}

/// The axis dropped when projecting a plane with the given normal down to
/// 2D: whichever axis the normal is most aligned with, to keep the
/// projected area maximal (and so numerically best-conditioned).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DroppedAxis {
    X,
    Y,
    Z,
}

pub fn dominant_axis(normal: DVec3) -> DroppedAxis {
    let abs = normal.abs();
    if abs.x >= abs.y && abs.x >= abs.z {
        DroppedAxis::X
    } else if abs.y >= abs.x && abs.y >= abs.z {
        DroppedAxis::Y
    } else {
        DroppedAxis::Z
    }
}

/// Projects a 3D point to 2D by dropping its dominant-normal axis.
pub fn project_to_2d(p: DVec3, drop: DroppedAxis) -> DVec2 {
    match drop {
        DroppedAxis::X => DVec2::new(p.y, p.z),
        DroppedAxis::Y => DVec2::new(p.x, p.z),
        DroppedAxis::Z => DVec2::new(p.x, p.y),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orient2d_detects_left_right_collinear() {
        let a = DVec2::new(0.0, 0.0);
        let b = DVec2::new(1.0, 0.0);
        assert_eq!(orient2d(a, b, DVec2::new(0.5, 1.0)), Orientation::Left);
        assert_eq!(orient2d(a, b, DVec2::new(0.5, -1.0)), Orientation::Right);
        assert_eq!(orient2d(a, b, DVec2::new(2.0, 0.0)), Orientation::Collinear);
    }

    #[test]
    fn segment_intersection_finds_crossing_point() {
        let a0 = DVec2::new(0.0, 0.0);
        let a1 = DVec2::new(2.0, 2.0);
        let b0 = DVec2::new(0.0, 2.0);
        let b1 = DVec2::new(2.0, 0.0);
        match compute_segment_intersection(a0, a1, b0, b1) {
            SegmentIntersection::Point(p) => {
                assert!((p - DVec2::new(1.0, 1.0)).length() < 1e-9);
            }
            other => panic!("expected a point, got {other:?}"),
        }
    }

    #[test]
    fn segment_intersection_handles_parallel_non_overlapping() {
        let a0 = DVec2::new(0.0, 0.0);
        let a1 = DVec2::new(1.0, 0.0);
        let b0 = DVec2::new(0.0, 1.0);
        let b1 = DVec2::new(1.0, 1.0);
        assert_eq!(
            compute_segment_intersection(a0, a1, b0, b1),
            SegmentIntersection::None
        );
    }

    #[test]
    fn segment_intersection_handles_collinear_overlap() {
        let a0 = DVec2::new(0.0, 0.0);
        let a1 = DVec2::new(2.0, 0.0);
        let b0 = DVec2::new(1.0, 0.0);
        let b1 = DVec2::new(3.0, 0.0);
        match compute_segment_intersection(a0, a1, b0, b1) {
            SegmentIntersection::Collinear { from, to } => {
                assert!((from - DVec2::new(1.0, 0.0)).length() < 1e-9);
                assert!((to - DVec2::new(2.0, 0.0)).length() < 1e-9);
            }
            other => panic!("expected a collinear overlap, got {other:?}"),
        }
    }

    #[test]
    fn point_in_polygon_classifies_square() {
        let square = [
            DVec2::new(0.0, 0.0),
            DVec2::new(2.0, 0.0),
            DVec2::new(2.0, 2.0),
            DVec2::new(0.0, 2.0),
        ];
        assert_eq!(
            compute_point_in_polygon_test(DVec2::new(1.0, 1.0), &square),
            PointInPolygon::Interior
        );
        assert_eq!(
            compute_point_in_polygon_test(DVec2::new(3.0, 1.0), &square),
            PointInPolygon::Exterior
        );
        assert_eq!(
            compute_point_in_polygon_test(DVec2::new(0.0, 1.0), &square),
            PointInPolygon::OnEdge
        );
        assert_eq!(
            compute_point_in_polygon_test(DVec2::new(0.0, 0.0), &square),
            PointInPolygon::OnVertex
        );
    }

    #[test]
    fn plane_coefficients_recover_axis_aligned_plane() {
        let quad = [
            DVec3::new(0.0, 0.0, 5.0),
            DVec3::new(1.0, 0.0, 5.0),
            DVec3::new(1.0, 1.0, 5.0),
            DVec3::new(0.0, 1.0, 5.0),
        ];
        let (normal, d) = compute_polygon_plane_coefficients(&quad).unwrap();
        assert!((normal.abs() - DVec3::new(0.0, 0.0, 1.0)).length() < 1e-9);
        assert!((d.abs() - 5.0).abs() < 1e-9);
        assert!(coplanar(&quad, 1e-9));
    }

    #[test]
    fn project_to_2d_drops_dominant_axis() {
        let drop = dominant_axis(DVec3::new(0.0, 0.0, 1.0));
        assert_eq!(drop, DroppedAxis::Z);
        let p = project_to_2d(DVec3::new(1.0, 2.0, 3.0), drop);
        assert_eq!(p, DVec2::new(1.0, 2.0));
    }
}
