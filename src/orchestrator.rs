//! The orchestrator (§4.G): runs one dispatch end to end — ingest both
//! input meshes, build BVHs, call the kernel, react to its status (retry
//! under perturbation, resolve floating polygons, or give up), and publish
//! connected components into the caller's context.
//!
//! Modeled as a loop around an explicit state enum rather than a single
//! straight-line function: §4.G names eight states and the transitions
//! between them aren't linear (two of them loop back), so keeping the
//! state visible in the type is worth the indirection.

use std::sync::Arc;

use hashbrown::HashMap;

use crate::bvh::{candidate_pairs, Bvh};
use crate::cc::{ComponentVariant, ConnectedComponent, Context, Origin, Provenance, SealType};
use crate::debug::{DebugSeverity, DebugSink, DebugSource, DebugType};
use crate::error::{CutError, KernelFailureReason};
use crate::floating_polygon::{resolve_floating_polygon, ChildBirthMap, PartitionVertexMap};
use crate::kernel::{FragmentLocation, Kernel, KernelInput, KernelOutput, KernelStatus, PatchLocation};
use crate::mesh::HalfedgeMesh;
use crate::perturb::{aabb_diagonal, PerturbationDriver, MAX_PERTURBATION_ATTEMPTS};
use crate::validate::{check_input_mesh, RawMesh};
use crate::{ComponentId, DispatchFlags, FaceId, FilterFlags, VertexId};

const BVH_LOOSENING_EPSILON: f64 = 1e-6;

enum State {
    BuildSource,
    ValidateSource,
    BuildCut,
    ValidateCut,
    BuildBvh,
    FindCandidatePairs,
    CallKernel,
    React(KernelStatus, KernelOutput),
    Publish(KernelOutput),
    Abort(CutError),
}

/// Mutable working state threaded through the retry loop.
struct Dispatch<'a> {
    raw_source: &'a RawMesh<'a>,
    raw_cut: &'a RawMesh<'a>,
    flags: DispatchFlags,
    sink: &'a DebugSink,

    source: HalfedgeMesh,
    source_client_vertices: Vec<VertexId>,
    source_client_faces: Vec<FaceId>,

    cut: HalfedgeMesh,
    cut_client_vertices: Vec<VertexId>,
    cut_client_faces: Vec<FaceId>,

    source_bvh: Bvh,
    cut_bvh: Bvh,
    candidate_pairs: HashMap<FaceId, Vec<FaceId>>,
    bvh_dirty: bool,

    driver: PerturbationDriver,
    perturbation_active: bool,
    pending_delta: glam::DVec3,

    source_child_to_birth: ChildBirthMap,
    cut_child_to_birth: ChildBirthMap,
    source_partition_vertices: PartitionVertexMap,
    cut_partition_vertices: PartitionVertexMap,
}

/// Runs one full dispatch and publishes its connected components into
/// `context`. Returns the handles of the CCs just published.
pub fn dispatch(
    context: &mut Context,
    raw_source: &RawMesh<'_>,
    raw_cut: &RawMesh<'_>,
    flags: DispatchFlags,
    filter: FilterFlags,
    kernel: &mut dyn Kernel,
) -> Result<Vec<ComponentId>, CutError> {
    let sink = std::mem::take(&mut context.debug_sink);
    let result = run(&sink, raw_source, raw_cut, flags, kernel);
    context.debug_sink = sink;

    let output = result?;
    Ok(publish(context, output, filter))
}

fn run(
    sink: &DebugSink,
    raw_source: &RawMesh<'_>,
    raw_cut: &RawMesh<'_>,
    flags: DispatchFlags,
    kernel: &mut dyn Kernel,
) -> Result<PublishInput, CutError> {
    let mut d = Dispatch {
        raw_source,
        raw_cut,
        flags,
        sink,
        source: HalfedgeMesh::new(),
        source_client_vertices: Vec::new(),
        source_client_faces: Vec::new(),
        cut: HalfedgeMesh::new(),
        cut_client_vertices: Vec::new(),
        cut_client_faces: Vec::new(),
        source_bvh: Bvh::build(&HalfedgeMesh::new(), BVH_LOOSENING_EPSILON),
        cut_bvh: Bvh::build(&HalfedgeMesh::new(), BVH_LOOSENING_EPSILON),
        candidate_pairs: HashMap::new(),
        bvh_dirty: true,
        driver: PerturbationDriver::new(),
        perturbation_active: false,
        pending_delta: glam::DVec3::ZERO,
        source_child_to_birth: ChildBirthMap::new(),
        cut_child_to_birth: ChildBirthMap::new(),
        source_partition_vertices: PartitionVertexMap::new(),
        cut_partition_vertices: PartitionVertexMap::new(),
    };

    let mut state = State::BuildSource;
    loop {
        state = match state {
            State::BuildSource => {
                let (mesh, verts, faces) =
                    check_input_mesh(d.raw_source, d.sink).map_err(CutError::from)?;
                d.source = mesh;
                d.source_client_vertices = verts;
                d.source_client_faces = faces;
                State::ValidateSource
            }
            State::ValidateSource => State::BuildCut,
            State::BuildCut => {
                let (mesh, verts, faces) = build_cut(&d)?;
                d.cut = mesh;
                d.cut_client_vertices = verts;
                d.cut_client_faces = faces;
                d.bvh_dirty = true;
                State::ValidateCut
            }
            State::ValidateCut => State::BuildBvh,
            State::BuildBvh => {
                d.source_bvh = Bvh::build(&d.source, BVH_LOOSENING_EPSILON);
                d.cut_bvh = Bvh::build(&d.cut, BVH_LOOSENING_EPSILON);
                State::FindCandidatePairs
            }
            State::FindCandidatePairs => {
                if d.bvh_dirty {
                    d.candidate_pairs = candidate_pairs(&d.source_bvh, &d.cut_bvh);
                    d.bvh_dirty = false;
                }
                if d.candidate_pairs.is_empty() && d.perturbation_active {
                    State::React(KernelStatus::GeneralPositionViolation, KernelOutput::default())
                } else if d.candidate_pairs.is_empty() {
                    State::Publish(KernelOutput::default())
                } else {
                    State::CallKernel
                }
            }
            State::CallKernel => {
                let input = KernelInput {
                    source: &d.source,
                    cut: &d.cut,
                    candidate_pairs: &d.candidate_pairs,
                    source_bvh: &d.source_bvh,
                    cut_bvh: &d.cut_bvh,
                    flags: d.flags,
                };
                let (status, output) = kernel.dispatch(input);
                State::React(status, output)
            }
            State::React(status, output) => react(&mut d, status, output)?,
            State::Publish(output) => {
                return Ok(PublishInput {
                    output,
                    source: d.source,
                    cut: d.cut,
                    source_client_vertices: d.source_client_vertices,
                    source_client_faces: d.source_client_faces,
                    cut_client_vertices: d.cut_client_vertices,
                    cut_client_faces: d.cut_client_faces,
                    source_child_to_birth: d.source_child_to_birth,
                    cut_child_to_birth: d.cut_child_to_birth,
                    source_partition_vertices: d.source_partition_vertices,
                    cut_partition_vertices: d.cut_partition_vertices,
                    flags: d.flags,
                });
            }
            State::Abort(err) => return Err(err),
        };
    }
}

fn build_cut(d: &Dispatch<'_>) -> Result<(HalfedgeMesh, Vec<VertexId>, Vec<FaceId>), CutError> {
    if !d.perturbation_active {
        return check_input_mesh(d.raw_cut, d.sink).map_err(CutError::from);
    }

    let positions: Vec<glam::DVec3> = d
        .raw_cut
        .positions
        .iter()
        .map(|p| *p + d.pending_delta)
        .collect();
    let raw = RawMesh {
        positions: &positions,
        face_indices: d.raw_cut.face_indices,
        face_sizes: d.raw_cut.face_sizes,
    };
    check_input_mesh(&raw, d.sink).map_err(CutError::from)
}

fn react(d: &mut Dispatch<'_>, status: KernelStatus, output: KernelOutput) -> Result<State, CutError> {
    match status {
        KernelStatus::Success => Ok(State::Publish(output)),
        KernelStatus::GeneralPositionViolation => {
            if d.driver.exhausted() {
                return Ok(State::Abort(CutError::KernelFailure(
                    KernelFailureReason::GeneralPositionExhausted(MAX_PERTURBATION_ATTEMPTS),
                )));
            }
            let diagonal = aabb_diagonal(d.raw_cut.positions.iter().copied());
            d.pending_delta = d
                .driver
                .next_translation(diagonal)
                .expect("attempts checked against MAX above");
            d.perturbation_active = true;
            d.sink.emit(
                DebugSource::Kernel,
                DebugType::Other,
                0,
                DebugSeverity::Notification,
                format!("general position violation, retrying (attempt {})", d.driver.attempts()),
            );
            Ok(State::BuildCut)
        }
        KernelStatus::DetectedFloatingPolygon => {
            // `parent` is a `FaceId` (a typed slotmap key), not the raw
            // unified integer the kernel's own wire format uses (§4.E) —
            // that arithmetic is the kernel's internal concern. Which of
            // our two meshes it belongs to is decided by trying the lookup
            // rather than guessed, since two independent slotmaps can
            // otherwise produce colliding keys.
            for (parent, polygons) in output.detected_floating_polygons.iter() {
                for polygon in polygons {
                    if d.source.face(*parent).is_some() {
                        resolve_floating_polygon(
                            &mut d.source,
                            *parent,
                            polygon,
                            &mut d.source_child_to_birth,
                            &mut d.source_partition_vertices,
                        )?;
                    } else if d.cut.face(*parent).is_some() {
                        resolve_floating_polygon(
                            &mut d.cut,
                            *parent,
                            polygon,
                            &mut d.cut_child_to_birth,
                            &mut d.cut_partition_vertices,
                        )?;
                    } else {
                        d.sink.emit(
                            DebugSource::Kernel,
                            DebugType::Error,
                            0,
                            DebugSeverity::High,
                            "floating polygon reported against an unknown parent face, skipping",
                        );
                    }
                }
            }
            d.bvh_dirty = true;
            Ok(State::FindCandidatePairs)
        }
        KernelStatus::InvalidMeshIntersection(reason) => Ok(State::Abort(CutError::KernelFailure(
            KernelFailureReason::InvalidMeshIntersection(reason),
        ))),
        KernelStatus::Other(reason) => {
            Ok(State::Abort(CutError::KernelFailure(KernelFailureReason::Other(reason))))
        }
    }
}

/// Everything `publish` needs, handed off from the retry loop once it
/// reaches `Publish`.
struct PublishInput {
    output: KernelOutput,
    source: HalfedgeMesh,
    cut: HalfedgeMesh,
    source_client_vertices: Vec<VertexId>,
    source_client_faces: Vec<FaceId>,
    cut_client_vertices: Vec<VertexId>,
    cut_client_faces: Vec<FaceId>,
    source_child_to_birth: ChildBirthMap,
    cut_child_to_birth: ChildBirthMap,
    source_partition_vertices: PartitionVertexMap,
    cut_partition_vertices: PartitionVertexMap,
    flags: DispatchFlags,
}

/// Builds the `vertex_map`/`face_map` arrays §4.H describes, if the
/// corresponding dispatch flag was set.
fn maps_for(mesh: &HalfedgeMesh, provenance: &Provenance, flags: DispatchFlags) -> (Option<Vec<u32>>, Option<Vec<u32>>) {
    let vertex_map = flags.contains(DispatchFlags::INCLUDE_VERTEX_MAP).then(|| {
        mesh.vertices()
            .map(|v| provenance.translate_vertex(v))
            .collect()
    });
    let face_map = flags.contains(DispatchFlags::INCLUDE_FACE_MAP).then(|| {
        mesh.faces().map(|f| provenance.translate_face(f)).collect()
    });
    (vertex_map, face_map)
}

fn with_maps(mut cc: ConnectedComponent, provenance: &Provenance, flags: DispatchFlags) -> ConnectedComponent {
    let (vertex_map, face_map) = maps_for(&cc.common.mesh, provenance, flags);
    if let Some(map) = vertex_map {
        cc = cc.with_vertex_map(map);
    }
    if let Some(map) = face_map {
        cc = cc.with_face_map(map);
    }
    cc
}

/// Publishes `cc` into `context` and records its handle, unless `filter`
/// excludes it (§6).
fn publish_if(
    context: &mut Context,
    handles: &mut Vec<ComponentId>,
    provenance: &Arc<Provenance>,
    flags: DispatchFlags,
    filter: FilterFlags,
    cc: ConnectedComponent,
) {
    if passes_filter(&cc, filter) {
        handles.push(context.publish(with_maps(cc, provenance, flags)));
    }
}

/// Materializes kernel output into connected components (§4.G `Publish`),
/// skipping any CC the caller's `FilterFlags` excludes (§6).
fn publish(context: &mut Context, input: PublishInput, filter: FilterFlags) -> Vec<ComponentId> {
    let provenance = Arc::new(build_provenance(&input));
    let flags = input.flags;
    let mut handles = Vec::new();

    for fragment in input.output.fragments {
        let seal_type = infer_seal_type(&fragment.mesh);
        let cc = ConnectedComponent::new(
            fragment.mesh,
            ComponentVariant::Fragment {
                location: fragment.location,
                patch_location: fragment.patch_location,
                seal_type,
            },
            provenance.clone(),
        );
        publish_if(context, &mut handles, &provenance, flags, filter, cc);
    }

    for fragment in input.output.unsealed_fragments {
        let cc = ConnectedComponent::new(
            fragment.mesh,
            ComponentVariant::Fragment {
                location: fragment.location,
                patch_location: PatchLocation::Undefined,
                seal_type: SealType::None,
            },
            provenance.clone(),
        );
        publish_if(context, &mut handles, &provenance, flags, filter, cc);
    }

    for patch in input.output.inside_patches {
        let cc = ConnectedComponent::new(
            patch.mesh,
            ComponentVariant::Patch {
                patch_location: PatchLocation::Inside,
            },
            provenance.clone(),
        );
        publish_if(context, &mut handles, &provenance, flags, filter, cc);
    }

    for patch in input.output.outside_patches {
        let cc = ConnectedComponent::new(
            patch.mesh,
            ComponentVariant::Patch {
                patch_location: PatchLocation::Outside,
            },
            provenance.clone(),
        );
        publish_if(context, &mut handles, &provenance, flags, filter, cc);
    }

    if let Some(seam) = input.output.source_seam {
        let seam_vertices: Vec<VertexId> = seam.mesh.vertices().collect();
        let cc = ConnectedComponent::new(
            seam.mesh,
            ComponentVariant::Seam {
                origin: Origin::SrcMesh,
            },
            provenance.clone(),
        )
        .with_seam_vertices(seam_vertices);
        publish_if(context, &mut handles, &provenance, flags, filter, cc);
    }

    if let Some(seam) = input.output.cut_seam {
        let seam_vertices: Vec<VertexId> = seam.mesh.vertices().collect();
        let cc = ConnectedComponent::new(
            seam.mesh,
            ComponentVariant::Seam {
                origin: Origin::CutMesh,
            },
            provenance.clone(),
        )
        .with_seam_vertices(seam_vertices);
        publish_if(context, &mut handles, &provenance, flags, filter, cc);
    }

    let source_copy = ConnectedComponent::new(
        input.source,
        ComponentVariant::Input {
            origin: Origin::SrcMesh,
        },
        provenance.clone(),
    );
    publish_if(context, &mut handles, &provenance, flags, filter, source_copy);

    let cut_copy = ConnectedComponent::new(
        input.cut,
        ComponentVariant::Input {
            origin: Origin::CutMesh,
        },
        provenance.clone(),
    );
    publish_if(context, &mut handles, &provenance, flags, filter, cut_copy);

    handles
}

/// Every `FilterFlags` bit that concerns a `Fragment` CC.
const FRAGMENT_FILTER_BITS: FilterFlags = FilterFlags::FRAGMENT_LOCATION_ABOVE
    .union(FilterFlags::FRAGMENT_LOCATION_BELOW)
    .union(FilterFlags::FRAGMENT_LOCATION_UNDEFINED)
    .union(FilterFlags::FRAGMENT_SEALING_INSIDE)
    .union(FilterFlags::FRAGMENT_SEALING_OUTSIDE)
    .union(FilterFlags::FRAGMENT_SEALING_INSIDE_EXHAUSTIVE)
    .union(FilterFlags::FRAGMENT_SEALING_OUTSIDE_EXHAUSTIVE)
    .union(FilterFlags::FRAGMENT_SEALING_NONE);

const FRAGMENT_LOCATION_BITS: FilterFlags = FilterFlags::FRAGMENT_LOCATION_ABOVE
    .union(FilterFlags::FRAGMENT_LOCATION_BELOW)
    .union(FilterFlags::FRAGMENT_LOCATION_UNDEFINED);

const FRAGMENT_SEALING_BITS: FilterFlags = FilterFlags::FRAGMENT_SEALING_INSIDE
    .union(FilterFlags::FRAGMENT_SEALING_OUTSIDE)
    .union(FilterFlags::FRAGMENT_SEALING_INSIDE_EXHAUSTIVE)
    .union(FilterFlags::FRAGMENT_SEALING_OUTSIDE_EXHAUSTIVE)
    .union(FilterFlags::FRAGMENT_SEALING_NONE);

const PATCH_FILTER_BITS: FilterFlags = FilterFlags::PATCH_INSIDE.union(FilterFlags::PATCH_OUTSIDE);

const SEAM_FILTER_BITS: FilterFlags = FilterFlags::SEAM_SRCMESH.union(FilterFlags::SEAM_CUTMESH);

/// Whether `cc` should be published under `filter` (§6). An empty mask
/// disables filtering entirely. A non-empty mask only publishes CCs whose
/// type contributes at least one bit to it — `Input` has no filter bits of
/// its own, so input copies are dropped whenever any filtering is active.
fn passes_filter(cc: &ConnectedComponent, filter: FilterFlags) -> bool {
    if filter.is_empty() {
        return true;
    }

    match &cc.variant {
        ComponentVariant::Fragment {
            location,
            patch_location,
            seal_type,
        } => {
            let relevant = filter & FRAGMENT_FILTER_BITS;
            if relevant.is_empty() {
                return false;
            }
            let location_bits = relevant & FRAGMENT_LOCATION_BITS;
            let location_ok = location_bits.is_empty() || location_bits.contains(location_filter_bit(*location));

            let sealing_bits = relevant & FRAGMENT_SEALING_BITS;
            let sealing_ok = sealing_bits.is_empty()
                || sealing_bits
                    .iter()
                    .any(|bit| sealing_bit_matches(bit, *seal_type, *patch_location));

            location_ok && sealing_ok
        }
        ComponentVariant::Patch { patch_location } => {
            let relevant = filter & PATCH_FILTER_BITS;
            if relevant.is_empty() {
                return false;
            }
            relevant.contains(patch_filter_bit(*patch_location))
        }
        ComponentVariant::Seam { origin } => {
            let relevant = filter & SEAM_FILTER_BITS;
            if relevant.is_empty() {
                return false;
            }
            relevant.contains(seam_filter_bit(*origin))
        }
        ComponentVariant::Input { .. } => false,
    }
}

fn location_filter_bit(location: FragmentLocation) -> FilterFlags {
    match location {
        FragmentLocation::Above => FilterFlags::FRAGMENT_LOCATION_ABOVE,
        FragmentLocation::Below => FilterFlags::FRAGMENT_LOCATION_BELOW,
        FragmentLocation::Undefined => FilterFlags::FRAGMENT_LOCATION_UNDEFINED,
    }
}

fn patch_filter_bit(patch_location: PatchLocation) -> FilterFlags {
    match patch_location {
        PatchLocation::Inside => FilterFlags::PATCH_INSIDE,
        PatchLocation::Outside => FilterFlags::PATCH_OUTSIDE,
        PatchLocation::Undefined => FilterFlags::empty(),
    }
}

fn seam_filter_bit(origin: Origin) -> FilterFlags {
    match origin {
        Origin::SrcMesh => FilterFlags::SEAM_SRCMESH,
        Origin::CutMesh => FilterFlags::SEAM_CUTMESH,
    }
}

/// Whether a single `FRAGMENT_SEALING_*` bit accepts this fragment's own
/// `(seal_type, patch_location)` pair (§6, mirroring the kernel's
/// exhaustive-vs-exact sealing distinction).
fn sealing_bit_matches(bit: FilterFlags, seal_type: SealType, patch_location: PatchLocation) -> bool {
    let sealed_either = matches!(seal_type, SealType::Complete | SealType::Partial);

    if bit == FilterFlags::FRAGMENT_SEALING_INSIDE {
        seal_type == SealType::Complete && patch_location == PatchLocation::Inside
    } else if bit == FilterFlags::FRAGMENT_SEALING_OUTSIDE {
        seal_type == SealType::Complete && patch_location == PatchLocation::Outside
    } else if bit == FilterFlags::FRAGMENT_SEALING_INSIDE_EXHAUSTIVE {
        patch_location == PatchLocation::Inside && sealed_either
    } else if bit == FilterFlags::FRAGMENT_SEALING_OUTSIDE_EXHAUSTIVE {
        patch_location == PatchLocation::Outside && sealed_either
    } else if bit == FilterFlags::FRAGMENT_SEALING_NONE {
        seal_type == SealType::None
    } else {
        false
    }
}

fn build_provenance(input: &PublishInput) -> Provenance {
    let mut prov = Provenance {
        source_client_vertex_count: input.source_client_vertices.len() as u32,
        source_client_face_count: input.source_client_faces.len() as u32,
        ..Provenance::default()
    };

    for (i, &v) in input.source_client_vertices.iter().enumerate() {
        prov.source_client_vertices.insert(v, i as u32);
    }
    for (i, &v) in input.cut_client_vertices.iter().enumerate() {
        prov.cut_client_vertices.insert(v, i as u32);
    }
    for (i, &f) in input.source_client_faces.iter().enumerate() {
        prov.source_client_faces.insert(f, i as u32);
    }
    for (i, &f) in input.cut_client_faces.iter().enumerate() {
        prov.cut_client_faces.insert(f, i as u32);
    }

    for &v in input.source_partition_vertices.keys() {
        prov.source_partition_vertices.insert(v, ());
    }
    for &v in input.cut_partition_vertices.keys() {
        prov.cut_partition_vertices.insert(v, ());
    }
    prov.source_child_to_birth_face = input.source_child_to_birth.clone();
    prov.cut_child_to_birth_face = input.cut_child_to_birth.clone();

    prov
}

/// A fragment is `Complete` only if every boundary edge introduced by the
/// cut was itself closed off by patch geometry, i.e. the mesh has no
/// boundary at all (§7 round-trip property: a `Complete` fragment must
/// re-pass `check_input_mesh`'s manifold check on its own).
fn infer_seal_type(mesh: &HalfedgeMesh) -> SealType {
    let has_boundary = mesh
        .halfedges()
        .any(|he| mesh.face_of(he).is_none());
    if has_boundary {
        SealType::Partial
    } else {
        SealType::Complete
    }
}
