//! The halfedge mesh store (§4.A): an incremental topological container
//! supporting add/remove of vertices, edges, halfedges and faces, plus
//! neighborhood queries. Generalized from the teacher crate's
//! triangle-only `MeshGraph` to arbitrary n-gon faces.

mod edge;
mod face;
mod halfedge;
mod iter;
mod ops;
mod order;
mod vertex;

pub use edge::Edge;
pub use face::Face;
pub use halfedge::Halfedge;
pub use iter::CircularHalfedges;
pub use ops::InsertedEdge;
pub use vertex::Vertex;

use glam::DVec3;
use hashbrown::HashMap;
use slotmap::{SecondaryMap, SlotMap};

use crate::{EdgeId, FaceId, HalfedgeId, VertexId};
use order::OrderedSlots;

/// An incremental halfedge mesh. Descriptors (`VertexId`, `HalfedgeId`,
/// `EdgeId`, `FaceId`) are stable `slotmap` keys: they never change meaning
/// while the entity they name is alive, and a removed entity's key can never
/// be confused with a live one (generational reuse).
#[derive(Debug, Default, Clone)]
pub struct HalfedgeMesh {
    pub(crate) vertices: SlotMap<VertexId, Vertex>,
    pub(crate) halfedges: SlotMap<HalfedgeId, Halfedge>,
    pub(crate) edges: SlotMap<EdgeId, Edge>,
    pub(crate) faces: SlotMap<FaceId, Face>,

    pub(crate) positions: SecondaryMap<VertexId, DVec3>,
    pub(crate) outgoing_halfedges: SecondaryMap<VertexId, Vec<HalfedgeId>>,

    /// `(source, target) -> halfedge`, used to detect non-manifold
    /// directed-edge reuse in O(1) during `add_face`/`is_insertable`.
    pub(crate) directed_lookup: HashMap<(VertexId, VertexId), HalfedgeId>,

    /// Insertion order for vertices/faces, with tombstones for removals, so
    /// external code can ask for a dense index (§9 design note).
    pub(crate) vertex_order: OrderedSlots<VertexId>,
    pub(crate) face_order: OrderedSlots<FaceId>,
}

impl HalfedgeMesh {
    pub fn new() -> Self {
        Self::default()
    }

    // --- basic accessors -------------------------------------------------

    #[inline]
    pub fn position(&self, v: VertexId) -> Option<DVec3> {
        self.positions.get(v).copied()
    }

    #[inline]
    pub fn set_position(&mut self, v: VertexId, p: DVec3) {
        if let Some(slot) = self.positions.get_mut(v) {
            *slot = p;
        }
    }

    #[inline]
    pub fn halfedge(&self, id: HalfedgeId) -> Option<&Halfedge> {
        self.halfedges.get(id)
    }

    #[inline]
    pub fn face(&self, id: FaceId) -> Option<&Face> {
        self.faces.get(id)
    }

    #[inline]
    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id)
    }

    #[inline]
    pub fn source(&self, he: HalfedgeId) -> Option<VertexId> {
        self.halfedges.get(he).map(|h| h.source)
    }

    #[inline]
    pub fn target(&self, he: HalfedgeId) -> Option<VertexId> {
        self.halfedges.get(he).map(|h| h.target)
    }

    #[inline]
    pub fn opposite(&self, he: HalfedgeId) -> Option<HalfedgeId> {
        self.halfedges.get(he).and_then(|h| h.opposite)
    }

    #[inline]
    pub fn next_halfedge(&self, he: HalfedgeId) -> Option<HalfedgeId> {
        self.halfedges.get(he).and_then(|h| h.next)
    }

    #[inline]
    pub fn prev_halfedge(&self, he: HalfedgeId) -> Option<HalfedgeId> {
        self.halfedges.get(he).and_then(|h| h.prev)
    }

    #[inline]
    pub fn face_of(&self, he: HalfedgeId) -> Option<FaceId> {
        self.halfedges.get(he).and_then(|h| h.face)
    }

    /// The `i`-th (`i` in `{0, 1}`) halfedge of an edge.
    pub fn vertex_of_edge(&self, edge: EdgeId, i: usize) -> Option<VertexId> {
        let edge = self.edges.get(edge)?;
        let he = edge.halfedges[i];
        self.source(he)
    }

    pub fn edge_halfedges(&self, edge: EdgeId) -> Option<[HalfedgeId; 2]> {
        self.edges.get(edge).map(|e| e.halfedges)
    }

    // --- counts / iteration ----------------------------------------------

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertex_order.len()
    }

    #[inline]
    pub fn face_count(&self) -> usize {
        self.face_order.len()
    }

    pub fn vertices(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.vertex_order.iter()
    }

    pub fn faces(&self) -> impl Iterator<Item = FaceId> + '_ {
        self.face_order.iter()
    }

    pub fn edges(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.edges.keys()
    }

    pub fn halfedges(&self) -> impl Iterator<Item = HalfedgeId> + '_ {
        self.halfedges.keys()
    }

    /// The index this vertex would occupy in a dense array built from
    /// [`Self::vertices`] right now.
    pub fn dense_vertex_index(&self, v: VertexId) -> Option<usize> {
        self.vertex_order.dense_index_of(v)
    }

    /// The index this face would occupy in a dense array built from
    /// [`Self::faces`] right now.
    pub fn dense_face_index(&self, f: FaceId) -> Option<usize> {
        self.face_order.dense_index_of(f)
    }

    // --- face-cycle queries ------------------------------------------------

    /// Halfedges around a face in CCW order, starting at `face.halfedge`.
    pub fn halfedges_around_face(&self, face: FaceId) -> CircularHalfedges<'_> {
        let start = self.faces.get(face).map(|f| f.halfedge);
        CircularHalfedges::new(start, self, |he, mesh| mesh.halfedges.get(he)?.next)
    }

    /// Vertices around a face in CCW order (the `target` of each halfedge).
    pub fn vertices_around_face(&self, face: FaceId) -> impl Iterator<Item = VertexId> + '_ {
        self.halfedges_around_face(face)
            .filter_map(|he| self.target(he))
    }

    pub fn face_degree(&self, face: FaceId) -> usize {
        self.halfedges_around_face(face).count()
    }

    /// Faces sharing an edge with `face`, one per boundary-crossing edge
    /// (skips boundary edges, which have no neighboring face).
    pub fn faces_around_face(&self, face: FaceId) -> impl Iterator<Item = FaceId> + '_ {
        self.halfedges_around_face(face)
            .filter_map(|he| self.opposite(he))
            .filter_map(|opp| self.face_of(opp))
    }

    // --- vertex-fan queries ------------------------------------------------

    /// Halfedges pointing away from `vertex`, in CW rotation order around it.
    pub fn outgoing_halfedges(&self, vertex: VertexId) -> impl Iterator<Item = HalfedgeId> + '_ {
        self.outgoing_halfedges
            .get(vertex)
            .into_iter()
            .flatten()
            .copied()
    }

    pub fn incoming_halfedges(&self, vertex: VertexId) -> impl Iterator<Item = HalfedgeId> + '_ {
        self.outgoing_halfedges(vertex)
            .filter_map(|he| self.opposite(he))
    }

    pub fn neighbours(&self, vertex: VertexId) -> impl Iterator<Item = VertexId> + '_ {
        self.outgoing_halfedges(vertex)
            .filter_map(|he| self.target(he))
    }

    pub fn faces_around_vertex(&self, vertex: VertexId) -> impl Iterator<Item = FaceId> + '_ {
        self.outgoing_halfedges(vertex)
            .filter_map(|he| self.face_of(he))
    }

    pub fn vertex_degree(&self, vertex: VertexId) -> usize {
        self.outgoing_halfedges(vertex).count()
    }

    pub fn is_boundary_vertex(&self, vertex: VertexId) -> bool {
        self.outgoing_halfedges(vertex)
            .any(|he| self.halfedges[he].is_boundary())
    }

    /// Looks up the halfedge running from `source` to `target`, if any.
    pub fn halfedge_from_to(&self, source: VertexId, target: VertexId) -> Option<HalfedgeId> {
        self.directed_lookup.get(&(source, target)).copied()
    }
}
