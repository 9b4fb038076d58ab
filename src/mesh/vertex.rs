use crate::HalfedgeId;

/// A corner point shared by one or more faces.
#[derive(Debug, Default, Clone, Copy)]
pub struct Vertex {
    /// One of the halfedges with this vertex as source. Prefers a boundary
    /// halfedge when one exists, so boundary walks can start here directly.
    pub outgoing_halfedge: Option<HalfedgeId>,
}
