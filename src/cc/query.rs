//! Byte-buffer data queries over a published connected component (§4.H,
//! §6). Every per-CC datum funnels through `component_data`: the caller
//! names a `DataKind`, gets back a tightly packed little-endian buffer.

use bitflags::bitflags;

use crate::error::CutError;
use crate::triangulate::triangulate_face;
use crate::ComponentId;

use super::{ComponentType, ComponentVariant, ConnectedComponent};

bitflags! {
    /// Bitmask filter for [`connected_components`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ComponentTypeMask: u8 {
        const FRAGMENT = 1 << 0;
        const PATCH = 1 << 1;
        const SEAM = 1 << 2;
        const INPUT = 1 << 3;
    }
}

impl From<ComponentType> for ComponentTypeMask {
    fn from(value: ComponentType) -> Self {
        match value {
            ComponentType::Fragment => ComponentTypeMask::FRAGMENT,
            ComponentType::Patch => ComponentTypeMask::PATCH,
            ComponentType::Seam => ComponentTypeMask::SEAM,
            ComponentType::Input => ComponentTypeMask::INPUT,
        }
    }
}

/// Every queryable per-CC datum (§4.H).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataKind {
    VertexFloat,
    VertexDouble,
    Face,
    FaceSize,
    FaceAdjacentFace,
    FaceAdjacentFaceSize,
    Edge,
    Type,
    FragmentLocation,
    PatchLocation,
    FragmentSealType,
    Origin,
    SeamVertex,
    VertexMap,
    FaceMap,
    FaceTriangulation,
}

impl DataKind {
    /// Byte stride a `Some(bytes)` limit must be a multiple of (§4.H).
    fn stride(self) -> usize {
        match self {
            DataKind::VertexFloat => 3 * 4,
            DataKind::VertexDouble => 3 * 8,
            DataKind::Face
            | DataKind::FaceAdjacentFace
            | DataKind::VertexMap
            | DataKind::FaceMap
            | DataKind::FaceTriangulation => 4,
            DataKind::FaceSize | DataKind::FaceAdjacentFaceSize | DataKind::SeamVertex => 4,
            DataKind::Edge => 2 * 4,
            DataKind::Type
            | DataKind::FragmentLocation
            | DataKind::PatchLocation
            | DataKind::FragmentSealType
            | DataKind::Origin => 1,
        }
    }
}

fn push_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn encode_vertices_f32(cc: &ConnectedComponent) -> Vec<u8> {
    let mut buf = Vec::with_capacity(cc.common.mesh.vertex_count() * 12);
    for v in cc.common.mesh.vertices() {
        let p = cc.common.mesh.position(v).unwrap_or_default();
        buf.extend_from_slice(&(p.x as f32).to_le_bytes());
        buf.extend_from_slice(&(p.y as f32).to_le_bytes());
        buf.extend_from_slice(&(p.z as f32).to_le_bytes());
    }
    buf
}

fn encode_vertices_f64(cc: &ConnectedComponent) -> Vec<u8> {
    let mut buf = Vec::with_capacity(cc.common.mesh.vertex_count() * 24);
    for v in cc.common.mesh.vertices() {
        let p = cc.common.mesh.position(v).unwrap_or_default();
        buf.extend_from_slice(&p.x.to_le_bytes());
        buf.extend_from_slice(&p.y.to_le_bytes());
        buf.extend_from_slice(&p.z.to_le_bytes());
    }
    buf
}

fn encode_faces(cc: &ConnectedComponent) -> Vec<u8> {
    let mut buf = Vec::new();
    for f in cc.common.mesh.faces() {
        for v in cc.common.mesh.vertices_around_face(f) {
            push_u32(&mut buf, cc.common.mesh.dense_vertex_index(v).unwrap_or(0) as u32);
        }
    }
    buf
}

fn encode_face_sizes(cc: &ConnectedComponent) -> Vec<u8> {
    let mut buf = Vec::new();
    for f in cc.common.mesh.faces() {
        push_u32(&mut buf, cc.common.mesh.face_degree(f) as u32);
    }
    buf
}

fn encode_face_adjacent_faces(cc: &ConnectedComponent) -> Vec<u8> {
    let mut buf = Vec::new();
    for f in cc.common.mesh.faces() {
        for neighbour in cc.common.mesh.faces_around_face(f) {
            push_u32(&mut buf, cc.common.mesh.dense_face_index(neighbour).unwrap_or(0) as u32);
        }
    }
    buf
}

fn encode_face_adjacent_face_sizes(cc: &ConnectedComponent) -> Vec<u8> {
    let mut buf = Vec::new();
    for f in cc.common.mesh.faces() {
        push_u32(&mut buf, cc.common.mesh.faces_around_face(f).count() as u32);
    }
    buf
}

fn encode_edges(cc: &ConnectedComponent) -> Vec<u8> {
    let mut buf = Vec::new();
    for e in cc.common.mesh.edges() {
        let [a, b] = cc.common.mesh.edge_halfedges(e).expect("edge exists");
        let src = cc.common.mesh.source(a).expect("halfedge has a source");
        let tgt = cc.common.mesh.source(b).expect("halfedge has a source");
        push_u32(&mut buf, cc.common.mesh.dense_vertex_index(src).unwrap_or(0) as u32);
        push_u32(&mut buf, cc.common.mesh.dense_vertex_index(tgt).unwrap_or(0) as u32);
    }
    buf
}

fn encode_vertex_map(cc: &ConnectedComponent) -> Result<Vec<u8>, CutError> {
    let map = cc
        .common
        .vertex_map
        .as_ref()
        .ok_or_else(|| CutError::invalid_argument("vertex map was not requested for this dispatch"))?;
    let mut buf = Vec::with_capacity(map.len() * 4);
    for &value in map {
        push_u32(&mut buf, value);
    }
    Ok(buf)
}

fn encode_face_map(cc: &ConnectedComponent) -> Result<Vec<u8>, CutError> {
    let map = cc
        .common
        .face_map
        .as_ref()
        .ok_or_else(|| CutError::invalid_argument("face map was not requested for this dispatch"))?;
    let mut buf = Vec::with_capacity(map.len() * 4);
    for &value in map {
        push_u32(&mut buf, value);
    }
    Ok(buf)
}

fn encode_face_triangulation(cc: &ConnectedComponent) -> Vec<u8> {
    let mut cache = cc.common.triangulation.lock().unwrap();
    let sink = crate::debug::DebugSink::default();

    let mut buf = Vec::new();
    for f in cc.common.mesh.faces() {
        let triples = cache
            .entry(f)
            .or_insert_with(|| triangulate_face(&cc.common.mesh, f, &sink).unwrap_or_default());
        for &v in triples.iter() {
            push_u32(&mut buf, cc.common.mesh.dense_vertex_index(v).unwrap_or(0) as u32);
        }
    }
    buf
}

/// `component_data(handle, kind, byte_limit)` (§4.H), already resolved to
/// the `ConnectedComponent` the handle named.
///
/// A `None` limit returns the whole buffer. A `Some(bytes)` slices it down,
/// and is rejected if it exceeds the required size or isn't a whole number
/// of `kind`'s stride.
pub fn component_data(
    cc: &ConnectedComponent,
    kind: DataKind,
    byte_limit: Option<usize>,
) -> Result<Vec<u8>, CutError> {
    let full = match kind {
        DataKind::VertexFloat => encode_vertices_f32(cc),
        DataKind::VertexDouble => encode_vertices_f64(cc),
        DataKind::Face => encode_faces(cc),
        DataKind::FaceSize => encode_face_sizes(cc),
        DataKind::FaceAdjacentFace => encode_face_adjacent_faces(cc),
        DataKind::FaceAdjacentFaceSize => encode_face_adjacent_face_sizes(cc),
        DataKind::Edge => encode_edges(cc),
        DataKind::Type => vec![component_type_code(cc.component_type())],
        DataKind::FragmentLocation => vec![fragment_location_code(cc)?],
        DataKind::PatchLocation => vec![patch_location_code(cc)?],
        DataKind::FragmentSealType => vec![fragment_seal_type_code(cc)?],
        DataKind::Origin => vec![origin_code(cc)?],
        DataKind::SeamVertex => encode_seam_vertices(cc)?,
        DataKind::VertexMap => encode_vertex_map(cc)?,
        DataKind::FaceMap => encode_face_map(cc)?,
        DataKind::FaceTriangulation => encode_face_triangulation(cc),
    };

    match byte_limit {
        None => Ok(full),
        Some(bytes) => {
            let stride = kind.stride();
            if stride != 0 && bytes % stride != 0 {
                return Err(CutError::invalid_argument(format!(
                    "byte_limit {bytes} is not a multiple of stride {stride}"
                )));
            }
            if bytes > full.len() {
                return Err(CutError::invalid_argument(format!(
                    "byte_limit {bytes} exceeds required size {}",
                    full.len()
                )));
            }
            Ok(full[..bytes].to_vec())
        }
    }
}

fn component_type_code(t: ComponentType) -> u8 {
    match t {
        ComponentType::Fragment => 0,
        ComponentType::Patch => 1,
        ComponentType::Seam => 2,
        ComponentType::Input => 3,
    }
}

fn fragment_location_code(cc: &ConnectedComponent) -> Result<u8, CutError> {
    match &cc.variant {
        ComponentVariant::Fragment { location, .. } => Ok(match location {
            crate::kernel::FragmentLocation::Above => 0,
            crate::kernel::FragmentLocation::Below => 1,
            crate::kernel::FragmentLocation::Undefined => 2,
        }),
        _ => Err(CutError::invalid_argument(
            "FragmentLocation is only defined for Fragment components",
        )),
    }
}

fn patch_location_code(cc: &ConnectedComponent) -> Result<u8, CutError> {
    let patch_location = match &cc.variant {
        ComponentVariant::Fragment { patch_location, .. } => *patch_location,
        ComponentVariant::Patch { patch_location } => *patch_location,
        _ => {
            return Err(CutError::invalid_argument(
                "PatchLocation is only defined for Fragment and Patch components",
            ))
        }
    };
    Ok(match patch_location {
        crate::kernel::PatchLocation::Inside => 0,
        crate::kernel::PatchLocation::Outside => 1,
        crate::kernel::PatchLocation::Undefined => 2,
    })
}

fn fragment_seal_type_code(cc: &ConnectedComponent) -> Result<u8, CutError> {
    match &cc.variant {
        ComponentVariant::Fragment { seal_type, .. } => Ok(match seal_type {
            super::SealType::None => 0,
            super::SealType::Partial => 1,
            super::SealType::Complete => 2,
        }),
        _ => Err(CutError::invalid_argument(
            "FragmentSealType is only defined for Fragment components",
        )),
    }
}

fn origin_code(cc: &ConnectedComponent) -> Result<u8, CutError> {
    let origin = match &cc.variant {
        ComponentVariant::Seam { origin } => *origin,
        ComponentVariant::Input { origin } => *origin,
        _ => {
            return Err(CutError::invalid_argument(
                "Origin is only defined for Seam and Input components",
            ))
        }
    };
    Ok(match origin {
        super::Origin::SrcMesh => 0,
        super::Origin::CutMesh => 1,
    })
}

fn encode_seam_vertices(cc: &ConnectedComponent) -> Result<Vec<u8>, CutError> {
    let mut buf = Vec::with_capacity(cc.common.seam_vertices.len() * 4);
    for &v in &cc.common.seam_vertices {
        push_u32(&mut buf, cc.common.mesh.dense_vertex_index(v).unwrap_or(0) as u32);
    }
    Ok(buf)
}

/// `connected_components(type_mask)` (§4.H).
pub fn connected_components(
    components: &slotmap::SlotMap<ComponentId, ConnectedComponent>,
    type_mask: ComponentTypeMask,
) -> Vec<ComponentId> {
    components
        .iter()
        .filter(|(_, cc)| type_mask.contains(cc.component_type().into()))
        .map(|(id, _)| id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cc::{ComponentVariant, ConnectedComponent, Origin, Provenance};
    use crate::mesh::HalfedgeMesh;
    use glam::DVec3;
    use std::sync::Arc;

    fn triangle_cc() -> ConnectedComponent {
        let mut mesh = HalfedgeMesh::new();
        let a = mesh.add_vertex(DVec3::new(0.0, 0.0, 0.0));
        let b = mesh.add_vertex(DVec3::new(1.0, 0.0, 0.0));
        let c = mesh.add_vertex(DVec3::new(0.0, 1.0, 0.0));
        mesh.add_face(&[a, b, c]).unwrap();

        ConnectedComponent::new(
            mesh,
            ComponentVariant::Input {
                origin: Origin::SrcMesh,
            },
            Arc::new(Provenance::default()),
        )
    }

    #[test]
    fn vertex_float_buffer_has_expected_size() {
        let cc = triangle_cc();
        let buf = component_data(&cc, DataKind::VertexFloat, None).unwrap();
        assert_eq!(buf.len(), 3 * 3 * 4);
    }

    #[test]
    fn byte_limit_larger_than_required_is_rejected() {
        let cc = triangle_cc();
        let full = component_data(&cc, DataKind::VertexFloat, None).unwrap().len();
        assert!(component_data(&cc, DataKind::VertexFloat, Some(full + 12)).is_err());
    }

    #[test]
    fn byte_limit_not_a_multiple_of_stride_is_rejected() {
        let cc = triangle_cc();
        assert!(component_data(&cc, DataKind::VertexFloat, Some(5)).is_err());
    }

    #[test]
    fn fragment_location_query_on_input_component_is_invalid_argument() {
        let cc = triangle_cc();
        assert!(component_data(&cc, DataKind::FragmentLocation, None).is_err());
    }

    #[test]
    fn type_mask_filters_components() {
        use crate::ComponentId as Cid;
        let mut slots: slotmap::SlotMap<Cid, ConnectedComponent> = slotmap::SlotMap::with_key();
        slots.insert(triangle_cc());

        let matches = connected_components(&slots, ComponentTypeMask::INPUT);
        assert_eq!(matches.len(), 1);

        let none = connected_components(&slots, ComponentTypeMask::FRAGMENT);
        assert!(none.is_empty());
    }
}
