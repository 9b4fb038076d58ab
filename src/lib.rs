//! `cutmesh-core`: the intersection-resolution engine behind a robust
//! Boolean-style mesh cutter.
//!
//! Given a source mesh `S` and a cut mesh `C`, this crate drives the
//! retry/repair loop around an external intersection kernel (not part of
//! this crate — see [`kernel::Kernel`]) until it produces a clean set of
//! connected components: fragments, patches, seams, and input copies, each
//! carrying provenance back to the caller's original vertex/face indices.
//!
//! ## Layout
//!
//! - [`mesh`] — the halfedge mesh store (n-gon faces, incremental add/remove).
//! - [`geometry`] — 2D/3D predicates the rest of the crate is built on.
//! - [`validate`] — input ingestion and manifoldness/connectivity checks.
//! - [`perturb`] — deterministic general-position perturbation of `C`.
//! - [`floating_polygon`] — partitions a face around a fully-interior
//!   intersection polygon.
//! - [`triangulate`] — lazy per-face constrained-Delaunay retriangulation.
//! - [`bvh`] — broad-phase candidate face pairs.
//! - [`kernel`] — the external collaborator interface.
//! - [`orchestrator`] — the dispatch state machine tying all of the above
//!   together.
//! - [`cc`] — the connected-component store and byte-buffer query surface.
//! - [`debug`] — the severity-filtered debug callback surface.
//! - [`error`] — the `CutError` taxonomy.

pub mod bvh;
pub mod cc;
pub mod debug;
pub mod error;
pub mod floating_polygon;
pub mod geometry;
mod ids;
pub mod kernel;
pub mod mesh;
pub mod orchestrator;
pub mod perturb;
pub mod triangulate;
pub mod validate;

pub use error::{CutError, InvalidMeshReason, KernelFailureReason};
pub use ids::{ComponentId, ContextId, EdgeId, FaceId, HalfedgeId, VertexId};
pub use validate::RawMesh;

use bitflags::bitflags;

bitflags! {
    /// Per-dispatch behaviour flags (§6).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DispatchFlags: u32 {
        /// Emit vertex arrays as `f32`. Mutually exclusive with
        /// [`Self::VERTEX_ARRAY_DOUBLE`]; exactly one must be set.
        const VERTEX_ARRAY_FLOAT = 1 << 0;
        /// Emit vertex arrays as `f64`.
        const VERTEX_ARRAY_DOUBLE = 1 << 1;

        /// Reject kernel output that leaves a through-cut unresolved.
        const REQUIRE_THROUGH_CUTS = 1 << 2;
        /// Populate each published CC's vertex map.
        const INCLUDE_VERTEX_MAP = 1 << 3;
        /// Populate each published CC's face map.
        const INCLUDE_FACE_MAP = 1 << 4;
        /// Run the perturbation retry loop on `GeneralPositionViolation`.
        const ENFORCE_GENERAL_POSITION = 1 << 5;
    }

    /// Output filter over which connected components a dispatch publishes
    /// (§6). Presence of any bit enables filtering; an empty mask disables
    /// it (everything is published).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FilterFlags: u32 {
        const FRAGMENT_LOCATION_ABOVE = 1 << 0;
        const FRAGMENT_LOCATION_BELOW = 1 << 1;
        const FRAGMENT_LOCATION_UNDEFINED = 1 << 2;

        const FRAGMENT_SEALING_INSIDE = 1 << 3;
        const FRAGMENT_SEALING_OUTSIDE = 1 << 4;
        const FRAGMENT_SEALING_INSIDE_EXHAUSTIVE = 1 << 5;
        const FRAGMENT_SEALING_OUTSIDE_EXHAUSTIVE = 1 << 6;
        const FRAGMENT_SEALING_NONE = 1 << 7;

        const PATCH_INSIDE = 1 << 8;
        const PATCH_OUTSIDE = 1 << 9;

        const SEAM_SRCMESH = 1 << 10;
        const SEAM_CUTMESH = 1 << 11;
    }
}

/// Runs one dispatch against `context` and publishes its output connected
/// components into it, returning their handles.
///
/// This is the crate's single public entry point tying the orchestrator
/// (§4.G) to a caller-owned [`cc::Registry`]. `kernel` is the external
/// intersection collaborator (§1, §6) — out of scope to implement here,
/// supplied by the caller.
pub fn dispatch(
    registry: &cc::Registry,
    context: ContextId,
    source: &RawMesh<'_>,
    cut: &RawMesh<'_>,
    flags: DispatchFlags,
    filter: FilterFlags,
    kernel: &mut dyn kernel::Kernel,
) -> Result<Vec<ComponentId>, CutError> {
    registry
        .with_context(context, |ctx| {
            orchestrator::dispatch(ctx, source, cut, flags, filter, kernel)
        })
        .ok_or_else(|| CutError::invalid_argument("unknown context"))?
}
