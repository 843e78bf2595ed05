//! Half-edge triangle mesh and its intrinsic metric.
//!
//! The topology is immutable once built: the field engine only reads it.
//! Per-element geometric quantities (areas, angles, cotangent weights,
//! angle defects, tangent frames) live in [`MeshGeometry`].

mod construction;
mod geometry;
mod topology;
mod types;

pub use geometry::{MeshGeometry, DEGENERATE_AREA};
pub use types::{Component, EdgeId, Face, FaceId, HalfEdge, HalfEdgeId, Vertex, VertexId};

/// Half-edge mesh made of triangles only.
#[derive(Debug, Clone)]
pub struct Mesh {
    pub(crate) vertices: Vec<Vertex>,
    pub(crate) half_edges: Vec<HalfEdge>,
    pub(crate) faces: Vec<Face>,
    /// First half-edge numbered into each undirected edge.
    pub(crate) edges: Vec<HalfEdgeId>,
}
