//! Input mesh validation (§4.C): ingests a raw index/position buffer pair
//! into a [`HalfedgeMesh`], rejecting it with a precise reason on the first
//! structural problem, and warning (but not rejecting) non-coplanar faces.

use glam::DVec3;
use hashbrown::HashMap;
use tracing::warn;

use crate::debug::{DebugSeverity, DebugSink, DebugSource, DebugType};
use crate::error::InvalidMeshReason;
use crate::geometry::coplanar;
use crate::mesh::HalfedgeMesh;
use crate::{FaceId, VertexId};

/// A raw, client-shaped mesh: interleaved vertex positions plus a flat face
/// index buffer, optionally with per-face sizes (absent = triangle-only).
pub struct RawMesh<'a> {
    pub positions: &'a [DVec3],
    pub face_indices: &'a [u32],
    pub face_sizes: Option<&'a [u32]>,
}

const COPLANARITY_EPSILON: f64 = 1e-6;

/// Builds and validates a [`HalfedgeMesh`] from client buffers (§4.C).
///
/// Rejects: fewer than 3 vertices, zero faces, any face smaller than 3
/// vertices, any face with a duplicate or out-of-range vertex index, any
/// face whose insertion would violate manifoldness, and any mesh with more
/// than one connected component (face-adjacency union-find). Non-coplanar
/// faces are reported through `sink` but do not fail validation.
pub fn check_input_mesh(
    raw: &RawMesh<'_>,
    sink: &DebugSink,
) -> Result<(HalfedgeMesh, Vec<VertexId>, Vec<FaceId>), InvalidMeshReason> {
    if raw.positions.len() < 3 {
        return Err(InvalidMeshReason::TooFewVertices(raw.positions.len()));
    }

    let sizes: Vec<u32> = match raw.face_sizes {
        Some(sizes) => sizes.to_vec(),
        None => {
            if raw.face_indices.len() % 3 != 0 {
                return Err(InvalidMeshReason::NoFaces);
            }
            vec![3; raw.face_indices.len() / 3]
        }
    };

    if sizes.is_empty() {
        return Err(InvalidMeshReason::NoFaces);
    }

    let mut mesh = HalfedgeMesh::new();
    let vertex_ids: Vec<VertexId> = raw.positions.iter().map(|p| mesh.add_vertex(*p)).collect();

    let mut offset = 0usize;
    let mut face_ids = Vec::with_capacity(sizes.len());

    for (face_index, &size) in sizes.iter().enumerate() {
        let size = size as usize;
        if size < 3 {
            return Err(InvalidMeshReason::FaceTooSmall {
                face: face_index,
                size,
            });
        }

        let indices = &raw.face_indices[offset..offset + size];
        offset += size;

        let mut seen = hashbrown::HashSet::with_capacity(size);
        let mut verts = Vec::with_capacity(size);
        for &index in indices {
            if index as usize >= vertex_ids.len() {
                return Err(InvalidMeshReason::VertexIndexOutOfRange {
                    face: face_index,
                    index,
                });
            }
            if !seen.insert(index) {
                return Err(InvalidMeshReason::DuplicateVertexInFace {
                    face: face_index,
                    index,
                });
            }
            verts.push(vertex_ids[index as usize]);
        }

        let face = mesh.add_face(&verts).ok_or(InvalidMeshReason::NonManifoldEdge {
            face: face_index,
        })?;

        let positions: Vec<DVec3> = verts
            .iter()
            .map(|v| mesh.position(*v).expect("vertex was just inserted"))
            .collect();
        if !coplanar(&positions, COPLANARITY_EPSILON) {
            let message = format!("face {face_index} is not coplanar within {COPLANARITY_EPSILON}");
            warn!(target: "cutmesh_core::validate", face = face_index, "{message}");
            sink.emit(
                DebugSource::Api,
                DebugType::Other,
                face_index as u32,
                DebugSeverity::Low,
                message,
            );
        }

        face_ids.push(face);
    }

    let components = count_connected_components(&mesh, &face_ids);
    if components != 1 {
        return Err(InvalidMeshReason::NotSingleComponent(components));
    }

    Ok((mesh, vertex_ids, face_ids))
}

/// Counts connected components of the face-adjacency graph via union-find.
fn count_connected_components(mesh: &HalfedgeMesh, faces: &[FaceId]) -> usize {
    let mut parent: HashMap<FaceId, FaceId> = faces.iter().map(|&f| (f, f)).collect();

    fn find(parent: &mut HashMap<FaceId, FaceId>, x: FaceId) -> FaceId {
        let p = parent[&x];
        if p == x {
            return x;
        }
        let root = find(parent, p);
        parent.insert(x, root);
        root
    }

    fn union(parent: &mut HashMap<FaceId, FaceId>, a: FaceId, b: FaceId) {
        let ra = find(parent, a);
        let rb = find(parent, b);
        if ra != rb {
            parent.insert(ra, rb);
        }
    }

    for &face in faces {
        for neighbour in mesh.faces_around_face(face) {
            union(&mut parent, face, neighbour);
        }
    }

    let mut roots = hashbrown::HashSet::new();
    for &face in faces {
        roots.insert(find(&mut parent, face));
    }
    roots.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn debug_sink() -> DebugSink {
        DebugSink::default()
    }

    #[test]
    fn accepts_single_triangle() {
        let positions = vec![
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(0.0, 1.0, 0.0),
        ];
        let indices = vec![0, 1, 2];
        let raw = RawMesh {
            positions: &positions,
            face_indices: &indices,
            face_sizes: None,
        };
        let (mesh, verts, faces) = check_input_mesh(&raw, &debug_sink()).unwrap();
        assert_eq!(mesh.face_count(), 1);
        assert_eq!(verts.len(), 3);
        assert_eq!(faces.len(), 1);
    }

    #[test]
    fn rejects_too_few_vertices() {
        let positions = vec![DVec3::ZERO, DVec3::X];
        let raw = RawMesh {
            positions: &positions,
            face_indices: &[],
            face_sizes: None,
        };
        assert_eq!(
            check_input_mesh(&raw, &debug_sink()).unwrap_err(),
            InvalidMeshReason::TooFewVertices(2)
        );
    }

    #[test]
    fn rejects_duplicate_vertex_in_face() {
        let positions = vec![
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(0.0, 1.0, 0.0),
        ];
        let indices = vec![0, 1, 1];
        let raw = RawMesh {
            positions: &positions,
            face_indices: &indices,
            face_sizes: None,
        };
        assert_eq!(
            check_input_mesh(&raw, &debug_sink()).unwrap_err(),
            InvalidMeshReason::DuplicateVertexInFace { face: 0, index: 1 }
        );
    }

    #[test]
    fn rejects_multiple_connected_components() {
        // Two disjoint triangles sharing no vertex.
        let positions = vec![
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(0.0, 1.0, 0.0),
            DVec3::new(5.0, 5.0, 0.0),
            DVec3::new(6.0, 5.0, 0.0),
            DVec3::new(5.0, 6.0, 0.0),
        ];
        let indices = vec![0, 1, 2, 3, 4, 5];
        let raw = RawMesh {
            positions: &positions,
            face_indices: &indices,
            face_sizes: None,
        };
        assert_eq!(
            check_input_mesh(&raw, &debug_sink()).unwrap_err(),
            InvalidMeshReason::NotSingleComponent(2)
        );
    }

    #[test]
    fn rejects_face_smaller_than_three() {
        let positions = vec![DVec3::ZERO, DVec3::X, DVec3::Y];
        let indices = vec![0, 1];
        let sizes = vec![2];
        let raw = RawMesh {
            positions: &positions,
            face_indices: &indices,
            face_sizes: Some(&sizes),
        };
        assert_eq!(
            check_input_mesh(&raw, &debug_sink()).unwrap_err(),
            InvalidMeshReason::FaceTooSmall { face: 0, size: 2 }
        );
    }
}
