use glam::DVec3;

use crate::error::CutError;
use crate::{EdgeId, FaceId, HalfedgeId, VertexId};

use super::{Edge, Face, HalfedgeMesh, Halfedge, Vertex};

/// Result of inserting (or looking up) an edge between two vertices.
pub struct InsertedEdge {
    /// Halfedge running from the first vertex to the second.
    pub forward: HalfedgeId,
    /// Halfedge running from the second vertex to the first.
    pub backward: HalfedgeId,
    pub edge: EdgeId,
    pub created_forward: bool,
    pub created_backward: bool,
}

/// Entities a `remove_face` cascaded away because they were no longer used
/// by any other face.
#[derive(Debug, Default, Clone)]
pub struct RemovedElements {
    pub vertices: Vec<VertexId>,
    pub halfedges: Vec<HalfedgeId>,
}

impl HalfedgeMesh {
    /// Inserts a vertex and its position. Doesn't connect it to anything.
    pub fn add_vertex(&mut self, position: DVec3) -> VertexId {
        let id = self.vertices.insert(Vertex::default());
        self.positions.insert(id, position);
        self.outgoing_halfedges.insert(id, Vec::new());
        self.vertex_order.push(id);
        id
    }

    /// Inserts (or looks up) the pair of twin halfedges between `a` and `b`.
    pub fn add_edge(&mut self, a: VertexId, b: VertexId) -> InsertedEdge {
        let forward_existing = self.directed_lookup.get(&(a, b)).copied();
        let backward_existing = self.directed_lookup.get(&(b, a)).copied();

        match (forward_existing, backward_existing) {
            (Some(forward), Some(backward)) => InsertedEdge {
                forward,
                backward,
                edge: self.halfedges[forward].edge,
                created_forward: false,
                created_backward: false,
            },
            (Some(forward), None) => {
                let edge = self.halfedges[forward].edge;
                let backward = self.push_halfedge(b, a, edge);
                self.link_twins(forward, backward, edge);
                InsertedEdge {
                    forward,
                    backward,
                    edge,
                    created_forward: false,
                    created_backward: true,
                }
            }
            (None, Some(backward)) => {
                let edge = self.halfedges[backward].edge;
                let forward = self.push_halfedge(a, b, edge);
                self.link_twins(forward, backward, edge);
                InsertedEdge {
                    forward,
                    backward,
                    edge,
                    created_forward: true,
                    created_backward: false,
                }
            }
            (None, None) => {
                let edge = self.edges.insert(Edge {
                    halfedges: [HalfedgeId::default(); 2],
                });
                let forward = self.push_halfedge(a, b, edge);
                let backward = self.push_halfedge(b, a, edge);
                self.link_twins(forward, backward, edge);
                InsertedEdge {
                    forward,
                    backward,
                    edge,
                    created_forward: true,
                    created_backward: true,
                }
            }
        }
    }

    fn push_halfedge(&mut self, source: VertexId, target: VertexId, edge: EdgeId) -> HalfedgeId {
        let he = self.halfedges.insert(Halfedge {
            source,
            target,
            opposite: None,
            face: None,
            next: None,
            prev: None,
            edge,
        });
        self.directed_lookup.insert((source, target), he);
        self.outgoing_halfedges
            .entry(source)
            .expect("vertex was inserted before its halfedges")
            .or_default()
            .push(he);

        if let Some(vertex) = self.vertices.get_mut(source) {
            vertex.outgoing_halfedge.get_or_insert(he);
        }

        he
    }

    fn link_twins(&mut self, forward: HalfedgeId, backward: HalfedgeId, edge: EdgeId) {
        self.halfedges[forward].opposite = Some(backward);
        self.halfedges[backward].opposite = Some(forward);
        self.edges[edge].halfedges = [forward, backward];
    }

    /// Reports whether `add_face(verts)` would succeed, without mutating
    /// anything: `verts.len() >= 3`, no repeated vertex, and no directed
    /// halfedge it needs is already owned by another face.
    pub fn is_insertable(&self, verts: &[VertexId]) -> bool {
        if verts.len() < 3 {
            return false;
        }

        for i in 0..verts.len() {
            for j in (i + 1)..verts.len() {
                if verts[i] == verts[j] {
                    return false;
                }
            }
        }

        for i in 0..verts.len() {
            let a = verts[i];
            let b = verts[(i + 1) % verts.len()];

            if let Some(he) = self.directed_lookup.get(&(a, b))
                && self.halfedges[*he].face.is_some()
            {
                return false;
            }
        }

        true
    }

    /// Inserts a face from its CCW vertex cycle. Returns `None` (never
    /// panics) if the cycle is too short, repeats a vertex, or would reuse a
    /// directed halfedge already owned by another face (non-manifold).
    pub fn add_face(&mut self, verts: &[VertexId]) -> Option<FaceId> {
        if !self.is_insertable(verts) {
            return None;
        }

        let n = verts.len();
        let mut forward = Vec::with_capacity(n);
        for i in 0..n {
            let a = verts[i];
            let b = verts[(i + 1) % n];
            forward.push(self.add_edge(a, b).forward);
        }

        let face_id = self.faces.insert(Face {
            halfedge: forward[0],
        });

        for i in 0..n {
            let he = forward[i];
            let next = forward[(i + 1) % n];
            let prev = forward[(i + n - 1) % n];
            let halfedge = &mut self.halfedges[he];
            halfedge.face = Some(face_id);
            halfedge.next = Some(next);
            halfedge.prev = Some(prev);
        }

        self.face_order.push(face_id);

        Some(face_id)
    }

    /// Removes a face, then cascades: any of its boundary edges that are
    /// left bordering no face at all are removed, and any vertex left with
    /// no incident edge is removed too.
    pub fn remove_face(&mut self, face: FaceId) -> RemovedElements {
        let Some(f) = self.faces.get(face).copied() else {
            return RemovedElements::default();
        };

        let cycle_start = f.halfedge;
        let mut halfedges = Vec::new();
        let mut current = cycle_start;
        loop {
            halfedges.push(current);
            current = self.halfedges[current]
                .next
                .expect("face cycle halfedge always has next");
            if current == cycle_start {
                break;
            }
        }

        let touched_vertices: Vec<VertexId> =
            halfedges.iter().filter_map(|he| self.target(*he)).collect();

        let mut removed_halfedges = Vec::new();

        for &he in &halfedges {
            let opp = self.halfedges[he]
                .opposite
                .expect("halfedge always has an opposite once inserted");

            if self.halfedges[opp].is_boundary() {
                removed_halfedges.push(he);
                removed_halfedges.push(opp);
            } else {
                let halfedge = &mut self.halfedges[he];
                halfedge.face = None;
                halfedge.next = None;
                halfedge.prev = None;
            }
        }

        let mut removed_edges = hashbrown::HashSet::new();
        for &he in &removed_halfedges {
            removed_edges.insert(self.halfedges[he].edge);
        }
        for edge in removed_edges {
            self.edges.remove(edge);
        }

        for &he in &removed_halfedges {
            let source = self.halfedges[he].source;
            let target = self.halfedges[he].target;
            self.directed_lookup.remove(&(source, target));
            if let Some(list) = self.outgoing_halfedges.get_mut(source) {
                list.retain(|x| *x != he);
            }
            self.halfedges.remove(he);
        }

        let mut removed_vertices = Vec::new();
        for v in touched_vertices {
            let Some(list) = self.outgoing_halfedges.get(v) else {
                continue;
            };

            if list.is_empty() {
                self.positions.remove(v);
                self.outgoing_halfedges.remove(v);
                self.vertices.remove(v);
                self.vertex_order.remove(v);
                removed_vertices.push(v);
            } else if let Some(vertex) = self.vertices.get_mut(v)
                && vertex
                    .outgoing_halfedge
                    .is_some_and(|he| removed_halfedges.contains(&he))
            {
                vertex.outgoing_halfedge = list.first().copied();
            }
        }

        self.faces.remove(face);
        self.face_order.remove(face);

        RemovedElements {
            vertices: removed_vertices,
            halfedges: removed_halfedges,
        }
    }

    /// Removes an edge outright. Both halfedges must already be boundary
    /// (un-faced); use [`Self::remove_face`] to tear down a face first.
    pub fn remove_edge(&mut self, edge: EdgeId) -> Result<(), CutError> {
        let Some(e) = self.edges.get(edge).copied() else {
            return Err(CutError::invalid_argument("unknown edge"));
        };

        for he in e.halfedges {
            if !self.halfedges[he].is_boundary() {
                return Err(CutError::invalid_argument(
                    "cannot remove an edge that still borders a face",
                ));
            }
        }

        for he in e.halfedges {
            let source = self.halfedges[he].source;
            let target = self.halfedges[he].target;
            self.directed_lookup.remove(&(source, target));

            if let Some(list) = self.outgoing_halfedges.get_mut(source) {
                list.retain(|x| *x != he);
            }
            if self.vertices[source].outgoing_halfedge == Some(he) {
                self.vertices[source].outgoing_halfedge =
                    self.outgoing_halfedges[source].first().copied();
            }

            self.halfedges.remove(he);
        }

        self.edges.remove(edge);

        Ok(())
    }

    /// Removes an isolated vertex (no incident halfedges).
    pub fn remove_vertex(&mut self, vertex: VertexId) -> Result<(), CutError> {
        let has_edges = self
            .outgoing_halfedges
            .get(vertex)
            .is_some_and(|list| !list.is_empty());

        if has_edges {
            return Err(CutError::invalid_argument(
                "cannot remove a vertex with incident edges",
            ));
        }

        self.positions.remove(vertex);
        self.outgoing_halfedges.remove(vertex);
        self.vertices.remove(vertex);
        self.vertex_order.remove(vertex);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> (HalfedgeMesh, [VertexId; 3]) {
        let mut mesh = HalfedgeMesh::new();
        let a = mesh.add_vertex(DVec3::new(0.0, 0.0, 0.0));
        let b = mesh.add_vertex(DVec3::new(1.0, 0.0, 0.0));
        let c = mesh.add_vertex(DVec3::new(0.0, 1.0, 0.0));
        (mesh, [a, b, c])
    }

    #[test]
    fn add_face_rejects_short_cycles() {
        let (mut mesh, [a, b, _]) = triangle();
        assert!(mesh.add_face(&[a, b]).is_none());
    }

    #[test]
    fn add_face_rejects_duplicate_vertex() {
        let (mut mesh, [a, b, _]) = triangle();
        assert!(mesh.add_face(&[a, b, a]).is_none());
    }

    #[test]
    fn add_face_rejects_non_manifold_reuse() {
        let (mut mesh, [a, b, c]) = triangle();
        let face = mesh.add_face(&[a, b, c]);
        assert!(face.is_some());
        // Same winding again would reuse a->b, b->c, c->a: non-manifold.
        assert!(mesh.add_face(&[a, b, c]).is_none());
        assert!(!mesh.is_insertable(&[a, b, c]));
    }

    #[test]
    fn add_face_allows_opposite_winding_as_neighbor() {
        let (mut mesh, [a, b, c]) = triangle();
        mesh.add_face(&[a, b, c]).unwrap();
        let d = mesh.add_vertex(DVec3::new(1.0, 1.0, 0.0));
        // b->c is now owned; the neighbor triangle uses c->b instead.
        assert!(mesh.add_face(&[b, d, c]).is_some());
    }

    #[test]
    fn twin_and_next_invariants_hold() {
        let (mut mesh, [a, b, c]) = triangle();
        let face = mesh.add_face(&[a, b, c]).unwrap();

        for he in mesh.halfedges_around_face(face) {
            let opp = mesh.opposite(he).unwrap();
            assert_eq!(mesh.opposite(opp), Some(he));

            let next = mesh.halfedges[he].next.unwrap();
            assert_eq!(mesh.source(next), mesh.target(he));
        }

        assert_eq!(mesh.face_degree(face), 3);
    }

    #[test]
    fn remove_face_cascades_edges_and_isolated_vertices() {
        let (mut mesh, [a, b, c]) = triangle();
        let face = mesh.add_face(&[a, b, c]).unwrap();

        let removed = mesh.remove_face(face);

        assert_eq!(removed.vertices.len(), 3);
        assert_eq!(removed.halfedges.len(), 6);
        assert_eq!(mesh.face_count(), 0);
        assert_eq!(mesh.vertex_count(), 0);
        assert_eq!(mesh.halfedges().count(), 0);
        assert_eq!(mesh.edges().count(), 0);
    }

    #[test]
    fn remove_face_keeps_shared_edge_alive_for_neighbor() {
        let (mut mesh, [a, b, c]) = triangle();
        let face1 = mesh.add_face(&[a, b, c]).unwrap();
        let d = mesh.add_vertex(DVec3::new(1.0, 1.0, 0.0));
        mesh.add_face(&[b, d, c]).unwrap();

        mesh.remove_face(face1);

        // b-c edge is still used by the neighbor, so b, c and the b-c edge
        // must survive; only vertex `a` (now isolated) goes away.
        assert_eq!(mesh.face_count(), 1);
        assert_eq!(mesh.vertex_count(), 3);
        assert!(mesh.halfedge_from_to(b, c).is_some());
    }

    #[test]
    fn dense_indices_skip_removed_faces() {
        let (mut mesh, [a, b, c]) = triangle();
        let d = mesh.add_vertex(DVec3::new(2.0, 2.0, 0.0));
        let e = mesh.add_vertex(DVec3::new(3.0, 2.0, 0.0));

        let f1 = mesh.add_face(&[a, b, c]).unwrap();
        let f2 = mesh.add_face(&[c, d, e]).unwrap();

        mesh.remove_face(f1);

        assert_eq!(mesh.dense_face_index(f2), Some(0));
    }
}
