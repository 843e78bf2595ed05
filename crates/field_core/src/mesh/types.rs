//! Type definitions for the half-edge triangle mesh.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Type-safe vertex identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VertexId(pub usize);

/// Type-safe half-edge identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HalfEdgeId(pub usize);

/// Type-safe face identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FaceId(pub usize);

/// Index of an undirected edge (shared by a half-edge and its twin)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeId(pub usize);

/// A vertex in the half-edge mesh
#[derive(Debug, Clone)]
pub struct Vertex {
    pub position: Vector3<f64>,
    /// Reference outgoing half-edge: the start of the counter-clockwise ring.
    /// On boundary vertices this is the outgoing boundary half-edge.
    /// `None` for vertices not used by any face.
    pub outgoing: Option<HalfEdgeId>,
}

/// A half-edge in the mesh
///
/// Every half-edge belongs to exactly one triangle. Boundary edges are the
/// ones whose half-edge has no twin.
#[derive(Debug, Clone)]
pub struct HalfEdge {
    /// The vertex this half-edge originates from
    pub origin: VertexId,
    /// The opposite half-edge (None on the boundary)
    pub twin: Option<HalfEdgeId>,
    /// The next half-edge around the face (counter-clockwise)
    pub next: HalfEdgeId,
    /// The previous half-edge around the face (counter-clockwise)
    pub prev: HalfEdgeId,
    pub face: FaceId,
    pub edge: EdgeId,
}

/// A triangle
#[derive(Debug, Clone)]
pub struct Face {
    /// First half-edge of the triangle; the other two follow via `next`.
    pub half_edge: HalfEdgeId,
}

/// A face-connected piece of the mesh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    pub faces: Vec<FaceId>,
    pub vertex_count: usize,
    pub edge_count: usize,
    pub boundary_edge_count: usize,
}

impl Component {
    pub fn is_closed(&self) -> bool {
        self.boundary_edge_count == 0
    }

    /// V - E + F for this component.
    pub fn euler_characteristic(&self) -> i64 {
        self.vertex_count as i64 - self.edge_count as i64 + self.faces.len() as i64
    }
}
