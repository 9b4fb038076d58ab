//! Per-face constrained Delaunay triangulation (§4.F), triggered lazily
//! when a caller asks a connected component for `FaceTriangulation`.
//!
//! Faces in a connected component can be n-gons (fan-out from a parent
//! face, or a partition child from §4.E). This retriangulates one such
//! face into triangles while preserving its original winding, validated
//! against a small auxiliary mesh (the "winding-order tracker", WOT) built
//! from the face's real one-hop neighbors.

use glam::{DVec2, DVec3};
use hashbrown::{HashMap, HashSet};
use spade::{ConstrainedDelaunayTriangulation, Point2, Triangulation};
use tracing::warn;

use crate::debug::{DebugSeverity, DebugSink, DebugSource, DebugType};
use crate::geometry::{
    compute_point_in_polygon_test, compute_polygon_plane_coefficients, dominant_axis,
    orient2d_raw, project_to_2d, PointInPolygon,
};
use crate::mesh::HalfedgeMesh;
use crate::{FaceId, VertexId};

/// Duplicate-vertex perturbation attempts before giving up on a face
/// (§4.F step 5; the spec doesn't name a bound for the retry, this one is
/// an engineering safety net against the recheck never converging).
const MAX_DUPLICATE_PERTURBATION_ATTEMPTS: u32 = 4;

const DUPLICATE_PERTURBATION_FACTOR: f64 = 1e-2;
const NEAR_PARALLEL_COS_THRESHOLD: f64 = 1.0 - 1e-2;

/// Triangulates `face`, returning a flat list of vertex descriptors
/// (triples) in the mesh's own winding, or `None` if the face had to be
/// skipped (logged via `sink` in every such case).
pub fn triangulate_face(mesh: &HalfedgeMesh, face: FaceId, sink: &DebugSink) -> Option<Vec<VertexId>> {
    let verts: Vec<VertexId> = mesh.vertices_around_face(face).collect();
    let n = verts.len();

    if n == 3 {
        return Some(verts);
    }
    if n < 3 {
        return None;
    }

    let positions: Vec<DVec3> = verts
        .iter()
        .map(|&v| mesh.position(v).expect("face vertex has a position"))
        .collect();

    let Some((normal, _)) = compute_polygon_plane_coefficients(&positions) else {
        report(sink, DebugSeverity::High, "face is degenerate (no well-defined plane); skipping");
        return None;
    };
    let drop = dominant_axis(normal);

    let mut local_verts = verts.clone();
    let mut poly2d: Vec<DVec2> = positions.iter().map(|p| project_to_2d(*p, drop)).collect();

    // Step 2: orient the 2D projection CCW; a plane normal pointing away
    // from the viewer flips the projected winding.
    let signed_area2: f64 = (0..n)
        .map(|i| orient2d_raw(poly2d[i], poly2d[(i + 1) % n], poly2d[(i + 2) % n]))
        .sum();
    if signed_area2 < 0.0 {
        poly2d.reverse();
        local_verts.reverse();
    }

    if !resolve_duplicate_vertices(&mut poly2d) {
        report(
            sink,
            DebugSeverity::High,
            "face still has coincident 2D vertices after perturbation; skipping",
        );
        return None;
    }

    let triangles_local = match delaunay_triangles(&poly2d) {
        Some(triangles) if !triangles.is_empty() => triangles,
        _ => {
            report(sink, DebugSeverity::Medium, "constrained triangulation produced no interior triangles");
            return None;
        }
    };

    // Winding-order tracker: a scratch mesh seeded with the face's real
    // one-hop neighbors, so every CDT triangle gets validated against
    // actual topology before it is accepted.
    let mut wot = HalfedgeMesh::new();
    let mut wot_vertex_for: HashMap<VertexId, VertexId> = HashMap::new();

    for neighbour in mesh.faces_around_face(face) {
        let neighbour_verts: Vec<VertexId> = mesh
            .vertices_around_face(neighbour)
            .map(|v| wot_vertex_of(&mut wot, &mut wot_vertex_for, mesh, v))
            .collect();
        wot.add_face(&neighbour_verts);
    }
    for &v in &local_verts {
        wot_vertex_of(&mut wot, &mut wot_vertex_for, mesh, v);
    }

    let mut output = Vec::with_capacity(triangles_local.len() * 3);
    let mut used = HashSet::with_capacity(n);

    for [i, j, k] in triangles_local {
        let (vi, vj, vk) = (local_verts[i], local_verts[j], local_verts[k]);
        let (wi, wj, wk) = (wot_vertex_for[&vi], wot_vertex_for[&vj], wot_vertex_for[&vk]);

        if wot.is_insertable(&[wi, wj, wk]) {
            wot.add_face(&[wi, wj, wk]);
            output.extend([vi, vj, vk]);
        } else if wot.is_insertable(&[wi, wk, wj]) {
            wot.add_face(&[wi, wk, wj]);
            output.extend([vi, vk, vj]);
        } else {
            report(
                sink,
                DebugSeverity::Medium,
                "dropping a CDT triangle whose winding could not be reconciled with its neighbors",
            );
            continue;
        }
        used.extend([vi, vj, vk]);
    }

    if used.len() < local_verts.iter().collect::<HashSet<_>>().len() {
        report(sink, DebugSeverity::High, "not every face vertex appeared in the emitted triangulation");
    }

    Some(output)
}

fn report(sink: &DebugSink, severity: DebugSeverity, message: &str) {
    warn!(target: "cutmesh_core::triangulate", "{message}");
    sink.emit(DebugSource::Kernel, DebugType::Other, 0, severity, message);
}

fn wot_vertex_of(
    wot: &mut HalfedgeMesh,
    map: &mut HashMap<VertexId, VertexId>,
    mesh: &HalfedgeMesh,
    v: VertexId,
) -> VertexId {
    *map.entry(v)
        .or_insert_with(|| wot.add_vertex(mesh.position(v).expect("vertex has a position")))
}

/// §4.F step 6: constrained Delaunay triangulation of the (already
/// duplicate-free) 2D polygon, keeping only triangles enclosed by the
/// polygon boundary.
fn delaunay_triangles(poly2d: &[DVec2]) -> Option<Vec<[usize; 3]>> {
    let n = poly2d.len();
    let mut cdt = ConstrainedDelaunayTriangulation::<Point2<f64>>::new();

    let mut handles = Vec::with_capacity(n);
    for p in poly2d {
        handles.push(cdt.insert(Point2::new(p.x, p.y)).ok()?);
    }

    let handle_to_local: HashMap<_, usize> =
        handles.iter().enumerate().map(|(i, h)| (*h, i)).collect();

    for i in 0..n {
        cdt.add_constraint(handles[i], handles[(i + 1) % n]);
    }

    let mut triangles = Vec::new();
    for face in cdt.inner_faces() {
        let corners = face.vertices();
        let idx = [
            handle_to_local[&corners[0].fix()],
            handle_to_local[&corners[1].fix()],
            handle_to_local[&corners[2].fix()],
        ];

        let centroid = (poly2d[idx[0]] + poly2d[idx[1]] + poly2d[idx[2]]) / 3.0;
        if compute_point_in_polygon_test(centroid, poly2d) != PointInPolygon::Exterior {
            triangles.push(idx);
        }
    }

    Some(triangles)
}

/// §4.F step 5: perturbs exact 2D duplicates (produced e.g. by a
/// floating-polygon slit on a partially cut face) into general position.
fn resolve_duplicate_vertices(poly2d: &mut [DVec2]) -> bool {
    let n = poly2d.len();

    for _ in 0..MAX_DUPLICATE_PERTURBATION_ATTEMPTS {
        let Some((i, j)) = find_duplicate_pair(poly2d) else {
            return true;
        };

        for (idx, mate) in [(i, j), (j, i)] {
            let direction = perturbation_direction(poly2d, idx);
            if direction == DVec2::ZERO {
                continue;
            }

            let excluded = [(idx + n - 1) % n, idx, (mate + n - 1) % n, mate];
            let distance = (0..n)
                .filter(|e| !excluded.contains(e))
                .filter_map(|e| ray_segment_distance(poly2d[idx], direction, poly2d[e], poly2d[(e + 1) % n]))
                .fold(f64::INFINITY, f64::min);

            if distance.is_finite() {
                poly2d[idx] += direction * (DUPLICATE_PERTURBATION_FACTOR * distance);
            }
        }
    }

    find_duplicate_pair(poly2d).is_none()
}

fn find_duplicate_pair(poly2d: &[DVec2]) -> Option<(usize, usize)> {
    let n = poly2d.len();
    for i in 0..n {
        for j in (i + 1)..n {
            if poly2d[i].distance_squared(poly2d[j]) <= f64::EPSILON {
                return Some((i, j));
            }
        }
    }
    None
}

/// The direction a duplicate vertex at `poly2d[i]` should be nudged: the
/// mean of its two incident edge vectors, sign-flipped if that mean points
/// out of the polygon (a CW turn), or the 90°-CCW rotation of the shorter
/// incident edge when the two edges are nearly parallel.
fn perturbation_direction(poly2d: &[DVec2], i: usize) -> DVec2 {
    let n = poly2d.len();
    let prev = poly2d[(i + n - 1) % n];
    let cur = poly2d[i];
    let next = poly2d[(i + 1) % n];

    let incoming = cur - prev;
    let outgoing = next - cur;

    let incoming_dir = incoming.normalize_or_zero();
    let outgoing_dir = outgoing.normalize_or_zero();

    if incoming_dir.dot(outgoing_dir).abs() >= NEAR_PARALLEL_COS_THRESHOLD {
        let shorter = if incoming.length() <= outgoing.length() { incoming } else { outgoing };
        return DVec2::new(-shorter.y, shorter.x).normalize_or_zero();
    }

    let mean = incoming_dir + outgoing_dir;
    if mean == DVec2::ZERO {
        return DVec2::new(-incoming_dir.y, incoming_dir.x);
    }
    let mean = mean.normalize();

    let turn = incoming.x * outgoing.y - incoming.y * outgoing.x;
    if turn < 0.0 { -mean } else { mean }
}

/// Distance along the ray `origin + t * dir` (`t >= 0`) to its crossing
/// with segment `(a, b)`, or `None` if they don't cross.
fn ray_segment_distance(origin: DVec2, dir: DVec2, a: DVec2, b: DVec2) -> Option<f64> {
    let v1 = origin - a;
    let v2 = b - a;
    let v3 = DVec2::new(-dir.y, dir.x);

    let denom = v2.dot(v3);
    if denom.abs() <= f64::EPSILON {
        return None;
    }

    let t = (v2.x * v1.y - v2.y * v1.x) / denom;
    let s = v1.dot(v3) / denom;

    if t >= 0.0 && (0.0..=1.0).contains(&s) {
        Some(t)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pentagon() -> (HalfedgeMesh, FaceId) {
        let mut mesh = HalfedgeMesh::new();
        let verts: Vec<VertexId> = [
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(2.0, 0.0, 0.0),
            DVec3::new(3.0, 2.0, 0.0),
            DVec3::new(1.0, 3.5, 0.0),
            DVec3::new(-1.0, 2.0, 0.0),
        ]
        .into_iter()
        .map(|p| mesh.add_vertex(p))
        .collect();
        let face = mesh.add_face(&verts).unwrap();
        (mesh, face)
    }

    #[test]
    fn triangle_face_passes_through_unchanged() {
        let mut mesh = HalfedgeMesh::new();
        let a = mesh.add_vertex(DVec3::new(0.0, 0.0, 0.0));
        let b = mesh.add_vertex(DVec3::new(1.0, 0.0, 0.0));
        let c = mesh.add_vertex(DVec3::new(0.0, 1.0, 0.0));
        let face = mesh.add_face(&[a, b, c]).unwrap();

        let sink = DebugSink::default();
        let triangles = triangulate_face(&mesh, face, &sink).unwrap();
        assert_eq!(triangles, vec![a, b, c]);
    }

    #[test]
    fn pentagon_triangulates_into_three_triangles_covering_every_vertex() {
        let (mesh, face) = pentagon();
        let sink = DebugSink::default();

        let triangles = triangulate_face(&mesh, face, &sink).unwrap();
        assert_eq!(triangles.len(), 9);

        let used: HashSet<VertexId> = triangles.iter().copied().collect();
        let expected: HashSet<VertexId> = mesh.vertices_around_face(face).collect();
        assert_eq!(used, expected);
    }

    #[test]
    fn duplicate_perturbation_separates_coincident_points() {
        let mut poly = vec![
            DVec2::new(0.0, 0.0),
            DVec2::new(2.0, 0.0),
            DVec2::new(2.0, 2.0),
            DVec2::new(2.0, 2.0),
            DVec2::new(0.0, 2.0),
        ];
        assert!(resolve_duplicate_vertices(&mut poly));
        assert!(poly[2].distance_squared(poly[3]) > f64::EPSILON);
    }
}
