//! The connected-component store (§4.H): the typed output of a dispatch,
//! queried as raw byte buffers by the caller.
//!
//! A single tagged-variant `ConnectedComponent { common, variant }` holds
//! every CC type rather than four separate structs (§9 design note); query
//! code matches on `variant` to decide which kinds are even meaningful.

mod provenance;
mod query;
mod registry;

pub use provenance::Provenance;
pub use query::{component_data, connected_components, ComponentTypeMask, DataKind};
pub use registry::{Context, Registry};

use hashbrown::HashMap;
use std::sync::Arc;

use crate::mesh::HalfedgeMesh;
use crate::{FaceId, VertexId};

/// Caller-visible CC type tag (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentType {
    Fragment,
    Patch,
    Seam,
    Input,
}

/// How completely a fragment's cut-induced boundary was re-triangulated
/// with patch geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SealType {
    None,
    Partial,
    Complete,
}

/// Which input mesh a seam or input-copy CC mirrors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    SrcMesh,
    CutMesh,
}

use crate::kernel::{FragmentLocation, PatchLocation};

/// The per-variant fields that distinguish the four CC kinds.
#[derive(Debug, Clone)]
pub enum ComponentVariant {
    Fragment {
        location: FragmentLocation,
        patch_location: PatchLocation,
        seal_type: SealType,
    },
    Patch {
        patch_location: PatchLocation,
    },
    Seam {
        origin: Origin,
    },
    Input {
        origin: Origin,
    },
}

impl ComponentVariant {
    pub fn component_type(&self) -> ComponentType {
        match self {
            ComponentVariant::Fragment { .. } => ComponentType::Fragment,
            ComponentVariant::Patch { .. } => ComponentType::Patch,
            ComponentVariant::Seam { .. } => ComponentType::Seam,
            ComponentVariant::Input { .. } => ComponentType::Input,
        }
    }
}

/// Fields every CC carries regardless of variant.
#[derive(Debug)]
pub struct ConnectedComponentCommon {
    pub mesh: HalfedgeMesh,

    /// Vertices lying on the source/cut intersection curve, sorted by dense
    /// index. Present on every CC variant, not only `Seam` (a fragment's
    /// cut-induced boundary is made of seam vertices too).
    pub seam_vertices: Vec<VertexId>,

    /// Client-facing vertex index for every vertex the kernel invented by
    /// partitioning a face around a floating polygon (§4.E); everything
    /// else passes through the identity / offset rule in §4.H.
    pub vertex_map: Option<Vec<u32>>,
    pub face_map: Option<Vec<u32>>,

    /// Lazily computed and cached on first query (§4.F is only ever run at
    /// query time, not at publish time — the caller may never ask).
    pub triangulation: std::sync::Mutex<HashMap<FaceId, Vec<VertexId>>>,

    /// Shared read-only across every CC produced by one dispatch (§5).
    pub provenance: Arc<Provenance>,
}

/// One piece of kernel output, published into a context's store.
#[derive(Debug)]
pub struct ConnectedComponent {
    pub common: ConnectedComponentCommon,
    pub variant: ComponentVariant,
}

impl ConnectedComponent {
    pub fn new(mesh: HalfedgeMesh, variant: ComponentVariant, provenance: Arc<Provenance>) -> Self {
        Self {
            common: ConnectedComponentCommon {
                mesh,
                seam_vertices: Vec::new(),
                vertex_map: None,
                face_map: None,
                triangulation: std::sync::Mutex::new(HashMap::new()),
                provenance,
            },
            variant,
        }
    }

    pub fn with_seam_vertices(mut self, seam_vertices: Vec<VertexId>) -> Self {
        self.common.seam_vertices = seam_vertices;
        self
    }

    pub fn component_type(&self) -> ComponentType {
        self.variant.component_type()
    }

    pub fn with_vertex_map(mut self, map: Vec<u32>) -> Self {
        self.common.vertex_map = Some(map);
        self
    }

    pub fn with_face_map(mut self, map: Vec<u32>) -> Self {
        self.common.face_map = Some(map);
        self
    }
}
