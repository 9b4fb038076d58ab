//! Broad-phase candidate-pair finding (§6). The actual intersection
//! algorithm is an external collaborator (the kernel); this is the small
//! bounding-volume layer the orchestrator uses to hand it a short
//! candidate list instead of every `O(n*m)` face pair.

use hashbrown::HashMap;
use parry3d::bounding_volume::{Aabb, BoundingVolume};
use parry3d::math::Point;

use crate::mesh::HalfedgeMesh;
use crate::FaceId;

/// Per-face AABBs for one mesh, inflated by `eps` on every side so
/// coincident-within-tolerance faces still register as touching.
pub struct Bvh {
    boxes: Vec<(FaceId, Aabb)>,
}

impl Bvh {
    /// Builds a per-face AABB list for `mesh`, each box loosened by `eps`.
    pub fn build(mesh: &HalfedgeMesh, eps: f64) -> Self {
        let mut boxes = Vec::with_capacity(mesh.face_count());

        for face in mesh.faces() {
            let points: Vec<Point<f64>> = mesh
                .vertices_around_face(face)
                .map(|v| {
                    let p = mesh.position(v).expect("face vertex always has a position");
                    Point::new(p.x, p.y, p.z)
                })
                .collect();

            let aabb = Aabb::from_points(&points).loosened(eps);
            boxes.push((face, aabb));
        }

        Self { boxes }
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }
}

/// All pairs of (source face, cut face) whose loosened AABBs overlap.
/// O(n*m) on the box count; fine at the scale this crate's candidate lists
/// operate at (a real deployment would wrap this in an actual tree, which
/// is out of scope here).
pub fn candidate_pairs(src_bvh: &Bvh, cut_bvh: &Bvh) -> HashMap<FaceId, Vec<FaceId>> {
    let mut pairs: HashMap<FaceId, Vec<FaceId>> = HashMap::new();

    for (src_face, src_box) in &src_bvh.boxes {
        for (cut_face, cut_box) in &cut_bvh.boxes {
            if src_box.intersects(cut_box) {
                pairs.entry(*src_face).or_default().push(*cut_face);
            }
        }
    }

    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;

    fn single_triangle_mesh(offset: DVec3) -> HalfedgeMesh {
        let mut mesh = HalfedgeMesh::new();
        let a = mesh.add_vertex(offset + DVec3::new(0.0, 0.0, 0.0));
        let b = mesh.add_vertex(offset + DVec3::new(1.0, 0.0, 0.0));
        let c = mesh.add_vertex(offset + DVec3::new(0.0, 1.0, 0.0));
        mesh.add_face(&[a, b, c]);
        mesh
    }

    #[test]
    fn overlapping_meshes_produce_a_candidate_pair() {
        let src = single_triangle_mesh(DVec3::ZERO);
        let cut = single_triangle_mesh(DVec3::new(0.2, 0.2, 0.0));

        let src_bvh = Bvh::build(&src, 1e-6);
        let cut_bvh = Bvh::build(&cut, 1e-6);

        let pairs = candidate_pairs(&src_bvh, &cut_bvh);
        assert_eq!(pairs.values().map(Vec::len).sum::<usize>(), 1);
    }

    #[test]
    fn disjoint_meshes_produce_no_candidate_pairs() {
        let src = single_triangle_mesh(DVec3::ZERO);
        let cut = single_triangle_mesh(DVec3::new(100.0, 100.0, 100.0));

        let src_bvh = Bvh::build(&src, 1e-6);
        let cut_bvh = Bvh::build(&cut, 1e-6);

        let pairs = candidate_pairs(&src_bvh, &cut_bvh);
        assert!(pairs.is_empty());
    }
}
