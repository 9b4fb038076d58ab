//! The kernel collaborator interface (§6). The intersection algorithm
//! itself is out of scope (§1); this module only fixes the boundary the
//! orchestrator drives it through, as a trait so the orchestrator can be
//! exercised against a test double.

use hashbrown::HashMap;

use crate::bvh::Bvh;
use crate::geometry::DroppedAxis;
use crate::mesh::HalfedgeMesh;
use crate::{DispatchFlags, FaceId};
use glam::DVec3;

/// Status returned by one kernel dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum KernelStatus {
    Success,
    GeneralPositionViolation,
    DetectedFloatingPolygon,
    InvalidMeshIntersection(String),
    Other(String),
}

/// An intersection polygon the kernel found wholly inside one face's
/// interior, with no boundary edge of that face severed.
#[derive(Debug, Clone)]
pub struct FloatingPolygon {
    /// 3D vertices of the floating polygon, in order.
    pub points: Vec<DVec3>,
    pub plane_normal: DVec3,
    pub drop_axis: DroppedAxis,
}

/// Where a fragment lies relative to the cut mesh's defining plane/volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentLocation {
    Above,
    Below,
    Undefined,
}

/// Where a patch or fragment lies relative to the source mesh's enclosed
/// volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchLocation {
    Inside,
    Outside,
    Undefined,
}

/// A single piece of output mesh the kernel hands back, before it is
/// published as a connected component.
#[derive(Debug, Clone)]
pub struct KernelFace {
    pub mesh: HalfedgeMesh,
}

/// Everything the kernel needs for one dispatch attempt.
pub struct KernelInput<'a> {
    pub source: &'a HalfedgeMesh,
    pub cut: &'a HalfedgeMesh,
    pub candidate_pairs: &'a HashMap<FaceId, Vec<FaceId>>,
    pub source_bvh: &'a Bvh,
    pub cut_bvh: &'a Bvh,
    pub flags: DispatchFlags,
}

/// Everything the orchestrator needs back from one dispatch attempt.
#[derive(Debug, Default, Clone)]
pub struct KernelOutput {
    pub status_is_success: bool,
    pub fragments: Vec<KernelFragment>,
    pub unsealed_fragments: Vec<KernelFragment>,
    pub inside_patches: Vec<KernelFace>,
    pub outside_patches: Vec<KernelFace>,
    pub source_seam: Option<KernelFace>,
    pub cut_seam: Option<KernelFace>,
    pub detected_floating_polygons: HashMap<FaceId, Vec<FloatingPolygon>>,
}

#[derive(Debug, Clone)]
pub struct KernelFragment {
    pub mesh: HalfedgeMesh,
    pub location: FragmentLocation,
    pub patch_location: PatchLocation,
}

impl std::fmt::Debug for KernelFace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelFace")
            .field("face_count", &self.mesh.face_count())
            .finish()
    }
}

impl Default for KernelFace {
    fn default() -> Self {
        Self {
            mesh: HalfedgeMesh::new(),
        }
    }
}

/// The external collaborator: computes the intersection of `input.source`
/// and `input.cut` restricted to `input.candidate_pairs`. Out of scope to
/// implement (§1) — modeled as a trait so the orchestrator can be driven
/// deterministically by a test double in this crate's own test suite.
pub trait Kernel {
    fn dispatch(&mut self, input: KernelInput<'_>) -> (KernelStatus, KernelOutput);
}
