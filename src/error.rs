//! Error taxonomy (§7 of the design spec).
//!
//! Every fallible public entry point returns `Result<_, CutError>`. There is
//! no exception-style control flow anywhere on the public surface.

use thiserror::Error;

/// Unified error type returned from the public API.
#[derive(Debug, Error)]
pub enum CutError {
    /// Bad handle, null/empty argument, mismatched buffer size, or a query
    /// that doesn't apply to the connected component's type.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The input mesh failed validation (§4.C).
    #[error("invalid input mesh: {0}")]
    InvalidInputMesh(#[from] InvalidMeshReason),

    /// The kernel could not complete the intersection.
    #[error("kernel failure: {0}")]
    KernelFailure(#[from] KernelFailureReason),

    /// An internal consistency violation (a bug). The caller can't do
    /// anything about these except report them; affected faces are skipped
    /// rather than propagating a panic.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Why an input mesh was rejected by the validator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvalidMeshReason {
    #[error("mesh has fewer than 3 vertices ({0})")]
    TooFewVertices(usize),

    #[error("mesh has no faces")]
    NoFaces,

    #[error("face {face} has size {size}, which is less than 3")]
    FaceTooSmall { face: usize, size: usize },

    #[error("face {face} references vertex index {index} more than once")]
    DuplicateVertexInFace { face: usize, index: u32 },

    #[error("face {face} references out-of-range vertex index {index}")]
    VertexIndexOutOfRange { face: usize, index: u32 },

    #[error(
        "face {face} could not be inserted: one of its directed edges is already owned by another face (non-manifold)"
    )]
    NonManifoldEdge { face: usize },

    #[error("mesh has {0} connected components, expected exactly 1")]
    NotSingleComponent(usize),
}

/// Why the kernel could not produce a result.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KernelFailureReason {
    #[error("general position violation persisted after {0} perturbation attempts")]
    GeneralPositionExhausted(u32),

    #[error("kernel reported an invalid mesh intersection: {0}")]
    InvalidMeshIntersection(String),

    #[error("kernel reported an error: {0}")]
    Other(String),
}

impl CutError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
