//! Floating-polygon resolution (§4.E): when the kernel reports an
//! intersection polygon wholly inside a face's interior (no edge of that
//! face severed), partition the face with a new interior edge so the next
//! kernel pass can sever it normally.

use glam::{DVec2, DVec3};
use hashbrown::HashMap;
use tracing::warn;

use crate::error::CutError;
use crate::geometry::{
    compute_point_in_polygon_test, compute_segment_intersection, orient2d_raw, project_to_2d,
    DroppedAxis, PointInPolygon, SegmentIntersection,
};
use crate::kernel::FloatingPolygon;
use crate::mesh::HalfedgeMesh;
use crate::{FaceId, HalfedgeId, VertexId};

/// `child face -> client birth face`, populated only for faces created by
/// partitioning.
pub type ChildBirthMap = HashMap<FaceId, FaceId>;

/// `new vertex -> its 3D position`, populated only for vertices created by
/// partitioning.
pub type PartitionVertexMap = HashMap<VertexId, DVec3>;

/// Threshold on `|orient2d|`, scaled by the larger magnitude involved, below
/// which a candidate partitioning line is treated as collinear with an
/// existing vertex and rejected (§4.E step 2). Heuristic, not auto-tuned
/// (§9 design notes).
const NEAR_COLLINEAR_EPS: f64 = 1e-6;

/// Outcome of attempting to resolve one floating polygon.
pub struct PartitionOutcome {
    /// Whether a new edge was actually added (the parent mesh's BVH must be
    /// rebuilt). `false` means an earlier partition already severed this
    /// polygon and nothing changed.
    pub rebuilt: bool,
}

/// Resolves one reported floating polygon by partitioning its parent (or an
/// already-partitioned descendant of it) with a new interior edge.
pub fn resolve_floating_polygon(
    mesh: &mut HalfedgeMesh,
    parent_face: FaceId,
    polygon: &FloatingPolygon,
    child_to_birth: &mut ChildBirthMap,
    partition_vertices: &mut PartitionVertexMap,
) -> Result<PartitionOutcome, CutError> {
    let Some(target_face) = select_target_face(mesh, parent_face, polygon, child_to_birth) else {
        return Ok(PartitionOutcome { rebuilt: false });
    };

    let drop = polygon.drop_axis;
    let poly2d: Vec<DVec2> = polygon.points.iter().map(|p| project_to_2d(*p, drop)).collect();

    let Some((mid_a, mid_b)) = choose_partition_segment(&poly2d, mesh, target_face, drop) else {
        return Err(CutError::internal(
            "floating polygon: every candidate partitioning segment was collinear with an existing vertex",
        ));
    };

    let boundary: Vec<HalfedgeId> = mesh.halfedges_around_face(target_face).collect();
    let midpoint = (mid_a + mid_b) * 0.5;

    let mut crossings: Vec<(HalfedgeId, DVec2, f64)> = Vec::new();
    for &he in &boundary {
        let source = mesh.source(he).expect("face halfedge has a source");
        let target = mesh.target(he).expect("face halfedge has a target");
        let s2 = project_to_2d(mesh.position(source).expect("vertex has a position"), drop);
        let t2 = project_to_2d(mesh.position(target).expect("vertex has a position"), drop);

        if let SegmentIntersection::Point(p) = compute_segment_intersection(mid_a, mid_b, s2, t2) {
            let param = edge_parameter(s2, t2, p);
            if (0.0..=1.0).contains(&param) {
                crossings.push((he, p, p.distance_squared(midpoint)));
            }
        }
    }

    crossings.sort_by(|a, b| a.2.partial_cmp(&b.2).expect("distances are finite"));

    if crossings.len() < 2 {
        warn!(
            target: "cutmesh_core::floating_polygon",
            "partitioning segment crossed fewer than two boundary edges of the target face"
        );
        return Err(CutError::internal(
            "floating polygon: partitioning segment crossed fewer than two boundary edges",
        ));
    }

    let (he_a, point_a, _) = crossings[0];
    let (he_b, point_b, _) = crossings[1];

    let pos_a = edge_point_3d(mesh, he_a, point_a, drop);
    let pos_b = edge_point_3d(mesh, he_b, point_b, drop);

    let nv_a = mesh.add_vertex(pos_a);
    let nv_b = mesh.add_vertex(pos_b);
    partition_vertices.insert(nv_a, pos_a);
    partition_vertices.insert(nv_b, pos_b);

    // Splice the new vertices into the faces neighbouring `target_face`
    // across the two partitioned boundary edges before touching
    // `target_face` itself: `target_face`'s own rebuild then cleans up the
    // stale half of each split edge (§3 lifecycle: edits are remove+add,
    // never in-place).
    if let Some(opp) = mesh.opposite(he_a)
        && let Some(neighbour) = mesh.face_of(opp)
    {
        splice_vertex_into_face(mesh, neighbour, opp, nv_a, child_to_birth);
    }
    if let Some(opp) = mesh.opposite(he_b)
        && let Some(neighbour) = mesh.face_of(opp)
    {
        splice_vertex_into_face(mesh, neighbour, opp, nv_b, child_to_birth);
    }

    split_target_face(mesh, target_face, he_a, nv_a, he_b, nv_b, child_to_birth)?;

    Ok(PartitionOutcome { rebuilt: true })
}

/// §4.E step 1: picks the face to partition, or reports that an earlier
/// partition already resolved this polygon.
fn select_target_face(
    mesh: &HalfedgeMesh,
    parent_face: FaceId,
    polygon: &FloatingPolygon,
    child_to_birth: &ChildBirthMap,
) -> Option<FaceId> {
    mesh.face(parent_face)?;

    let birth = child_to_birth.get(&parent_face).copied().unwrap_or(parent_face);
    let candidates: Vec<FaceId> = mesh
        .faces()
        .filter(|&f| f == birth || child_to_birth.get(&f).copied() == Some(birth))
        .collect();

    let drop = polygon.drop_axis;
    let poly2d: Vec<DVec2> = polygon.points.iter().map(|p| project_to_2d(*p, drop)).collect();
    let n = poly2d.len();
    let poly_edges: Vec<(DVec2, DVec2)> = (0..n).map(|i| (poly2d[i], poly2d[(i + 1) % n])).collect();

    for &candidate in &candidates {
        for he in mesh.halfedges_around_face(candidate) {
            let s2 = project_to_2d(mesh.position(mesh.source(he).unwrap()).unwrap(), drop);
            let t2 = project_to_2d(mesh.position(mesh.target(he).unwrap()).unwrap(), drop);

            let already_severed = poly_edges.iter().any(|&(pa, pb)| {
                matches!(
                    compute_segment_intersection(s2, t2, pa, pb),
                    SegmentIntersection::Point(_) | SegmentIntersection::Collinear { .. }
                )
            });

            if already_severed {
                return None;
            }
        }
    }

    let centroid = poly2d.iter().fold(DVec2::ZERO, |acc, p| acc + *p) / n as f64;

    candidates.into_iter().find(|&candidate| {
        let face_poly: Vec<DVec2> = mesh
            .vertices_around_face(candidate)
            .map(|v| project_to_2d(mesh.position(v).unwrap(), drop))
            .collect();
        compute_point_in_polygon_test(centroid, &face_poly) == PointInPolygon::Interior
    })
}

/// §4.E step 2: the segment joining the midpoints of the floating polygon's
/// two "farthest apart" edges, rejecting candidates collinear with an
/// existing vertex.
fn choose_partition_segment(
    poly2d: &[DVec2],
    mesh: &HalfedgeMesh,
    target_face: FaceId,
    drop: DroppedAxis,
) -> Option<(DVec2, DVec2)> {
    let n = poly2d.len();
    if n < 2 {
        return None;
    }

    let edge_midpoint = |i: usize| (poly2d[i] + poly2d[(i + 1) % n]) * 0.5;

    let mut pairs: Vec<(usize, usize)> = Vec::new();
    for i in 0..n {
        for j in (i + 1)..n {
            pairs.push((i, j));
        }
    }
    pairs.sort_by(|&(i1, j1), &(i2, j2)| {
        let d1 = edge_midpoint(i1).distance_squared(edge_midpoint(j1));
        let d2 = edge_midpoint(i2).distance_squared(edge_midpoint(j2));
        d2.partial_cmp(&d1).expect("distances are finite")
    });

    let face_vertices: Vec<DVec2> = mesh
        .vertices_around_face(target_face)
        .map(|v| project_to_2d(mesh.position(v).unwrap(), drop))
        .collect();

    for (i, j) in pairs {
        let a = edge_midpoint(i);
        let b = edge_midpoint(j);
        if a.distance_squared(b) <= f64::EPSILON {
            continue;
        }

        let collinear_with_any = poly2d
            .iter()
            .chain(face_vertices.iter())
            .any(|&v| near_collinear(a, b, v));

        if !collinear_with_any {
            return Some((a, b));
        }
    }

    None
}

fn near_collinear(a: DVec2, b: DVec2, p: DVec2) -> bool {
    let area2 = orient2d_raw(a, b, p).abs();
    let scale = a.length().max(b.length()).max(p.length()).max(1.0);
    area2 <= NEAR_COLLINEAR_EPS * scale
}

/// The 2D parameter of `p` along segment `s -> t` (assumes `p` already lies
/// on the line through `s, t`).
fn edge_parameter(s: DVec2, t: DVec2, p: DVec2) -> f64 {
    let d = t - s;
    if d.x.abs() >= d.y.abs() {
        (p.x - s.x) / d.x
    } else {
        (p.y - s.y) / d.y
    }
}

/// Reconstructs the 3D position of a 2D point known to lie on halfedge
/// `he`'s edge, by re-deriving the edge parameter and lerping in 3D.
fn edge_point_3d(mesh: &HalfedgeMesh, he: HalfedgeId, point2d: DVec2, drop: DroppedAxis) -> DVec3 {
    let source = mesh.source(he).expect("halfedge has a source");
    let target = mesh.target(he).expect("halfedge has a target");
    let s3 = mesh.position(source).expect("vertex has a position");
    let t3 = mesh.position(target).expect("vertex has a position");
    let s2 = project_to_2d(s3, drop);
    let t2 = project_to_2d(t3, drop);
    let t = edge_parameter(s2, t2, point2d);
    s3.lerp(t3, t)
}

/// Rebuilds `face`, inserting `new_vertex` into its cycle right after the
/// source vertex of `he_in_face` (which must belong to `face`'s own
/// winding). Mesh edits are remove+add, never in-place (§3 lifecycle).
fn splice_vertex_into_face(
    mesh: &mut HalfedgeMesh,
    face: FaceId,
    he_in_face: HalfedgeId,
    new_vertex: VertexId,
    child_to_birth: &mut ChildBirthMap,
) -> FaceId {
    let birth = child_to_birth.remove(&face).unwrap_or(face);

    let mut cycle = Vec::new();
    for he in mesh.halfedges_around_face(face) {
        cycle.push(mesh.source(he).expect("face halfedge has a source"));
        if he == he_in_face {
            cycle.push(new_vertex);
        }
    }

    mesh.remove_face(face);
    let new_face = mesh
        .add_face(&cycle)
        .expect("splicing one vertex into an untouched face cycle cannot fail insertion");

    child_to_birth.insert(new_face, birth);
    new_face
}

/// Rebuilds `target_face` with both new vertices inserted, then splits the
/// resulting cycle into its two children along the `nv_a -> nv_b` edge
/// (§4.E step 5).
fn split_target_face(
    mesh: &mut HalfedgeMesh,
    target_face: FaceId,
    he_a: HalfedgeId,
    nv_a: VertexId,
    he_b: HalfedgeId,
    nv_b: VertexId,
    child_to_birth: &mut ChildBirthMap,
) -> Result<(), CutError> {
    let birth = child_to_birth.remove(&target_face).unwrap_or(target_face);

    let mut cycle = Vec::new();
    for he in mesh.halfedges_around_face(target_face) {
        cycle.push(mesh.source(he).expect("face halfedge has a source"));
        if he == he_a {
            cycle.push(nv_a);
        }
        if he == he_b {
            cycle.push(nv_b);
        }
    }

    mesh.remove_face(target_face);

    let idx_a = cycle
        .iter()
        .position(|&v| v == nv_a)
        .expect("nv_a was just inserted into the cycle");
    let idx_b = cycle
        .iter()
        .position(|&v| v == nv_b)
        .expect("nv_b was just inserted into the cycle");
    let (lo, hi) = if idx_a < idx_b { (idx_a, idx_b) } else { (idx_b, idx_a) };

    let first_poly = cycle[lo..=hi].to_vec();
    let second_poly: Vec<VertexId> = cycle[hi..]
        .iter()
        .chain(cycle[..=lo].iter())
        .copied()
        .collect();

    if first_poly.len() < 3 || second_poly.len() < 3 {
        return Err(CutError::internal(
            "floating polygon: partition produced a degenerate sub-face",
        ));
    }

    let child_1 = mesh
        .add_face(&first_poly)
        .ok_or_else(|| CutError::internal("floating polygon: failed to re-insert first partitioned face"))?;
    let child_2 = mesh
        .add_face(&second_poly)
        .ok_or_else(|| CutError::internal("floating polygon: failed to re-insert second partitioned face"))?;

    child_to_birth.insert(child_1, birth);
    child_to_birth.insert(child_2, birth);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad_mesh() -> (HalfedgeMesh, FaceId) {
        let mut mesh = HalfedgeMesh::new();
        let a = mesh.add_vertex(DVec3::new(0.0, 0.0, 0.0));
        let b = mesh.add_vertex(DVec3::new(4.0, 0.0, 0.0));
        let c = mesh.add_vertex(DVec3::new(4.0, 4.0, 0.0));
        let d = mesh.add_vertex(DVec3::new(0.0, 4.0, 0.0));
        let face = mesh.add_face(&[a, b, c, d]).unwrap();
        (mesh, face)
    }

    #[test]
    fn partitions_a_face_around_a_floating_polygon() {
        let (mut mesh, face) = quad_mesh();

        let polygon = FloatingPolygon {
            points: vec![
                DVec3::new(1.0, 1.0, 0.0),
                DVec3::new(3.0, 1.0, 0.0),
                DVec3::new(3.0, 3.0, 0.0),
                DVec3::new(1.0, 3.0, 0.0),
            ],
            plane_normal: DVec3::Z,
            drop_axis: DroppedAxis::Z,
        };

        let mut child_to_birth = ChildBirthMap::new();
        let mut partition_vertices = PartitionVertexMap::new();

        let outcome =
            resolve_floating_polygon(&mut mesh, face, &polygon, &mut child_to_birth, &mut partition_vertices)
                .expect("resolution should succeed on a simple convex quad");

        assert!(outcome.rebuilt);
        assert_eq!(mesh.face_count(), 2);
        assert_eq!(partition_vertices.len(), 2);
        assert_eq!(child_to_birth.len(), 2);
        for &birth in child_to_birth.values() {
            assert_eq!(birth, face);
        }
    }

    #[test]
    fn skips_when_already_severed_by_an_earlier_partition() {
        let (mut mesh, face) = quad_mesh();

        let polygon = FloatingPolygon {
            points: vec![
                DVec3::new(1.0, 1.0, 0.0),
                DVec3::new(3.0, 1.0, 0.0),
                DVec3::new(3.0, 3.0, 0.0),
                DVec3::new(1.0, 3.0, 0.0),
            ],
            plane_normal: DVec3::Z,
            drop_axis: DroppedAxis::Z,
        };

        let mut child_to_birth = ChildBirthMap::new();
        let mut partition_vertices = PartitionVertexMap::new();

        resolve_floating_polygon(&mut mesh, face, &polygon, &mut child_to_birth, &mut partition_vertices).unwrap();

        // A second, identical report against the original (now-stale) face
        // id can't find a live face to work on and is treated as already
        // resolved rather than erroring.
        let outcome =
            resolve_floating_polygon(&mut mesh, face, &polygon, &mut child_to_birth, &mut partition_vertices)
                .unwrap();
        assert!(!outcome.rebuilt);
    }
}
