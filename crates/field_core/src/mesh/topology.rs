//! Topology queries for [`Mesh`].

use std::collections::VecDeque;

use super::types::{Component, EdgeId, FaceId, HalfEdge, HalfEdgeId, Vertex, VertexId};
use super::Mesh;

impl Mesh {
    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn vertex(&self, id: VertexId) -> &Vertex {
        &self.vertices[id.0]
    }

    pub fn half_edge(&self, id: HalfEdgeId) -> &HalfEdge {
        &self.half_edges[id.0]
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn half_edges(&self) -> &[HalfEdge] {
        &self.half_edges
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn half_edge_count(&self) -> usize {
        self.half_edges.len()
    }

    /// Number of undirected edges (twin pairs count once).
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn vertex_ids(&self) -> impl Iterator<Item = VertexId> {
        (0..self.vertices.len()).map(VertexId)
    }

    pub fn face_ids(&self) -> impl Iterator<Item = FaceId> {
        (0..self.faces.len()).map(FaceId)
    }

    pub fn half_edge_ids(&self) -> impl Iterator<Item = HalfEdgeId> {
        (0..self.half_edges.len()).map(HalfEdgeId)
    }

    // ========================================================================
    // Topology Queries
    // ========================================================================

    /// Destination vertex of a half-edge.
    pub fn head(&self, id: HalfEdgeId) -> VertexId {
        self.half_edge(self.half_edge(id).next).origin
    }

    /// The three half-edges of a face, in counter-clockwise order.
    pub fn face_half_edges(&self, face: FaceId) -> [HalfEdgeId; 3] {
        let first = self.faces[face.0].half_edge;
        let second = self.half_edge(first).next;
        let third = self.half_edge(second).next;
        [first, second, third]
    }

    /// The three corners of a face, in counter-clockwise order.
    pub fn face_vertices(&self, face: FaceId) -> [VertexId; 3] {
        self.face_half_edges(face)
            .map(|h| self.half_edge(h).origin)
    }

    /// Outgoing half-edges of a vertex in counter-clockwise order, starting
    /// at the vertex's reference half-edge.
    pub fn outgoing(&self, vertex: VertexId) -> Vec<HalfEdgeId> {
        let mut ring = Vec::new();
        let Some(start) = self.vertices[vertex.0].outgoing else {
            return ring;
        };

        let mut current = start;
        loop {
            ring.push(current);
            // Next outgoing half-edge counter-clockwise: twin of prev.
            match self.half_edge(self.half_edge(current).prev).twin {
                Some(next) if next != start => current = next,
                _ => break,
            }
            if ring.len() > self.half_edges.len() {
                break;
            }
        }
        ring
    }

    pub fn is_boundary_half_edge(&self, id: HalfEdgeId) -> bool {
        self.half_edge(id).twin.is_none()
    }

    /// An undirected edge is on the boundary when only one triangle uses it.
    pub fn is_boundary_edge(&self, edge: EdgeId) -> bool {
        self.is_boundary_half_edge(self.edges[edge.0])
    }

    /// A vertex is on the boundary when its reference half-edge has no twin.
    pub fn is_boundary_vertex(&self, vertex: VertexId) -> bool {
        match self.vertices[vertex.0].outgoing {
            Some(h) => self.is_boundary_half_edge(h),
            None => false,
        }
    }

    pub fn has_boundary(&self) -> bool {
        self.half_edges.iter().any(|he| he.twin.is_none())
    }

    /// V - E + F over the whole mesh (isolated vertices excluded).
    pub fn euler_characteristic(&self) -> i64 {
        self.components()
            .iter()
            .map(Component::euler_characteristic)
            .sum()
    }

    /// Face-connected components, in order of their lowest face index.
    pub fn components(&self) -> Vec<Component> {
        let mut label = vec![usize::MAX; self.faces.len()];
        let mut components = Vec::new();

        for seed in 0..self.faces.len() {
            if label[seed] != usize::MAX {
                continue;
            }
            let id = components.len();
            let mut faces = Vec::new();
            let mut queue = VecDeque::from([FaceId(seed)]);
            label[seed] = id;
            while let Some(face) = queue.pop_front() {
                faces.push(face);
                for h in self.face_half_edges(face) {
                    if let Some(twin) = self.half_edge(h).twin {
                        let neighbor = self.half_edge(twin).face;
                        if label[neighbor.0] == usize::MAX {
                            label[neighbor.0] = id;
                            queue.push_back(neighbor);
                        }
                    }
                }
            }

            let mut vertex_seen = vec![false; self.vertices.len()];
            let mut vertex_count = 0;
            let mut half_edge_total = 0;
            let mut boundary_edge_count = 0;
            for &face in &faces {
                for h in self.face_half_edges(face) {
                    let origin = self.half_edge(h).origin;
                    if !vertex_seen[origin.0] {
                        vertex_seen[origin.0] = true;
                        vertex_count += 1;
                    }
                    half_edge_total += 1;
                    if self.is_boundary_half_edge(h) {
                        boundary_edge_count += 1;
                    }
                }
            }
            // Interior edges are seen twice, boundary edges once.
            let edge_count = (half_edge_total - boundary_edge_count) / 2 + boundary_edge_count;

            faces.sort();
            components.push(Component {
                faces,
                vertex_count,
                edge_count,
                boundary_edge_count,
            });
        }
        components
    }

    /// Component index of every face.
    pub fn face_components(&self) -> Vec<usize> {
        let mut labels = vec![0; self.faces.len()];
        for (index, component) in self.components().iter().enumerate() {
            for face in &component.faces {
                labels[face.0] = index;
            }
        }
        labels
    }
}
