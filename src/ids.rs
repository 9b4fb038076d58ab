//! Stable descriptors for every entity the crate hands out.
//!
//! All of them are `slotmap` generational keys: identity survives insertion,
//! and a removed entity's key can never alias a live one.

use slotmap::new_key_type;

new_key_type! {
    /// Descriptor for a vertex in a [`crate::mesh::HalfedgeMesh`].
    pub struct VertexId;

    /// Descriptor for a directed halfedge.
    pub struct HalfedgeId;

    /// Descriptor for an (undirected) edge, i.e. a pair of twin halfedges.
    pub struct EdgeId;

    /// Descriptor for a face (an n-gon, n >= 3).
    pub struct FaceId;

    /// Opaque handle to a live context, held by the [`crate::cc::Registry`].
    pub struct ContextId;

    /// Opaque handle to a published connected component.
    pub struct ComponentId;
}
