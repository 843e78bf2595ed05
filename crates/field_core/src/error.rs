//! Error taxonomy for mesh loading and field synthesis.
//!
//! Mesh errors are load failures and are kept apart from field errors so a
//! caller never confuses a malformed input file with a failed solve.

use std::path::PathBuf;

use crate::mesh::{FaceId, VertexId};

/// Errors raised while reading or building a mesh.
#[derive(Debug, thiserror::Error)]
pub enum MeshError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("mesh has no faces")]
    Empty,
    #[error("face {face} references vertex {vertex} but the mesh has {vertex_count} vertices")]
    VertexOutOfRange {
        face: usize,
        vertex: usize,
        vertex_count: usize,
    },
    #[error("face {face} repeats a corner vertex")]
    RepeatedCorner { face: usize },
    #[error("non-manifold edge {from:?} -> {to:?}: directed edge used by more than one face")]
    NonManifoldEdge { from: VertexId, to: VertexId },
    #[error("vertex {0:?} is non-manifold: its incident faces do not form a single fan")]
    NonManifoldVertex(VertexId),
    #[error("field file declares {declared} {what} directions but the mesh has {actual}")]
    FieldCount {
        what: &'static str,
        declared: usize,
        actual: usize,
    },
}

/// Errors raised by connection building and field solves.
#[derive(Debug, thiserror::Error)]
pub enum FieldError {
    #[error("field degree must be at least 1, got {0}")]
    InvalidDegree(u32),
    #[error(
        "singularity indices on component {component} sum to {observed}, \
         expected degree {degree} x euler characteristic = {expected}"
    )]
    IndexSum {
        component: usize,
        expected: i64,
        observed: i64,
        degree: u32,
    },
    #[error("singularity assigned to face {0:?}, which is not part of the mesh")]
    UnknownFace(FaceId),
    #[error("fixed-boundary solve requested on a mesh without boundary")]
    NoBoundary,
    #[error("curvature reference field vanishes everywhere; nothing to align to")]
    DegenerateReference,
    #[error("sparse Cholesky factorization failed while {stage}")]
    Factorization { stage: String },
    #[error("solve produced a non-finite value while {stage}")]
    NonFinite { stage: String },
    #[error(transparent)]
    Mesh(#[from] MeshError),
}
