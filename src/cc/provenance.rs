//! Per-dispatch provenance (§4.H, §5): the bookkeeping needed to translate a
//! CC's internal vertex/face ids back into the client's original numbering.
//!
//! The kernel's own wire format describes this translation as arithmetic
//! over a unified integer namespace (`v − internal_count + client_count`).
//! This crate never constructs that raw namespace — every id it touches is
//! already one of our own stable `VertexId`/`FaceId` slotmap keys — so the
//! translation below walks that id graph directly instead: a vertex/face
//! that was never touched by partitioning is looked up in the client-order
//! table recorded at ingestion; the offset is applied only for the
//! cut-mesh side. The externally observed sentinel/offset semantics are
//! identical to §4.H; only the internal mechanism differs (see DESIGN.md).

use hashbrown::HashMap;

use crate::{FaceId, VertexId};

/// Sentinel written into a vertex map for a vertex invented by partitioning
/// (§4.E) rather than present in either client input mesh.
pub const INTERSECTION_POINT_SENTINEL: u32 = u32::MAX;

/// Everything produced during one dispatch that the query layer needs to
/// translate CC vertex/face ids back to client-facing indices.
///
/// Shared `Arc`-read-only across every CC the dispatch publishes (§5);
/// created once per dispatch and dropped when the last referencing CC is
/// released.
#[derive(Debug, Default)]
pub struct Provenance {
    /// Vertices invented when a face was partitioned around a floating
    /// polygon (§4.E), keyed by mesh side.
    pub source_partition_vertices: HashMap<VertexId, ()>,
    pub cut_partition_vertices: HashMap<VertexId, ()>,

    /// A partition-child face's nearest ancestor that existed at ingestion
    /// time, keyed by mesh side. Faces absent from this map are their own
    /// ancestor (never split).
    pub source_child_to_birth_face: HashMap<FaceId, FaceId>,
    pub cut_child_to_birth_face: HashMap<FaceId, FaceId>,

    /// `VertexId` -> client-order index, as ingested by `check_input_mesh`,
    /// before any partitioning added vertices.
    pub source_client_vertices: HashMap<VertexId, u32>,
    pub cut_client_vertices: HashMap<VertexId, u32>,

    /// `FaceId` -> client-order index, as ingested.
    pub source_client_faces: HashMap<FaceId, u32>,
    pub cut_client_faces: HashMap<FaceId, u32>,

    /// The client's original source-mesh vertex/face counts, i.e. the
    /// offset added to a translated cut-side index (§4.H).
    pub source_client_vertex_count: u32,
    pub source_client_face_count: u32,
}

impl Provenance {
    /// Translates a vertex into the client-facing index described by §4.H,
    /// or the sentinel if it was invented by partitioning. A CC can mix
    /// vertices from both input meshes (a fragment straddles a cut), so
    /// this checks both sides' bookkeeping rather than trusting a single
    /// assumed origin.
    pub fn translate_vertex(&self, vertex: VertexId) -> u32 {
        if self.source_partition_vertices.contains_key(&vertex)
            || self.cut_partition_vertices.contains_key(&vertex)
        {
            return INTERSECTION_POINT_SENTINEL;
        }
        if let Some(&client_index) = self.source_client_vertices.get(&vertex) {
            return client_index;
        }
        if let Some(&client_index) = self.cut_client_vertices.get(&vertex) {
            return client_index + self.source_client_vertex_count;
        }
        INTERSECTION_POINT_SENTINEL
    }

    /// Translates a face id, first redirecting a partition-child face to
    /// its birth ancestor on whichever side recognizes it (§4.H).
    pub fn translate_face(&self, face: FaceId) -> u32 {
        let source_birth = self
            .source_child_to_birth_face
            .get(&face)
            .copied()
            .unwrap_or(face);
        if let Some(&client_index) = self.source_client_faces.get(&source_birth) {
            return client_index;
        }

        let cut_birth = self.cut_child_to_birth_face.get(&face).copied().unwrap_or(face);
        if let Some(&client_index) = self.cut_client_faces.get(&cut_birth) {
            return client_index + self.source_client_face_count;
        }

        INTERSECTION_POINT_SENTINEL
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[test]
    fn source_vertex_passes_through_unchanged() {
        let mut verts: SlotMap<VertexId, ()> = SlotMap::with_key();
        let v = verts.insert(());

        let mut prov = Provenance::default();
        prov.source_client_vertices.insert(v, 7);
        prov.source_client_vertex_count = 100;

        assert_eq!(prov.translate_vertex(v), 7);
    }

    #[test]
    fn cut_vertex_is_offset_by_source_client_count() {
        let mut verts: SlotMap<VertexId, ()> = SlotMap::with_key();
        let v = verts.insert(());

        let mut prov = Provenance::default();
        prov.cut_client_vertices.insert(v, 3);
        prov.source_client_vertex_count = 10;

        assert_eq!(prov.translate_vertex(v), 13);
    }

    #[test]
    fn partitioned_vertex_is_sentinel_on_either_side() {
        let mut verts: SlotMap<VertexId, ()> = SlotMap::with_key();
        let v = verts.insert(());

        let mut prov = Provenance::default();
        prov.source_partition_vertices.insert(v, ());

        assert_eq!(prov.translate_vertex(v), INTERSECTION_POINT_SENTINEL);
    }

    #[test]
    fn partition_child_face_resolves_through_birth_ancestor() {
        let mut faces: SlotMap<FaceId, ()> = SlotMap::with_key();
        let birth = faces.insert(());
        let child = faces.insert(());

        let mut prov = Provenance::default();
        prov.source_client_faces.insert(birth, 2);
        prov.source_child_to_birth_face.insert(child, birth);

        assert_eq!(prov.translate_face(child), 2);
    }
}
