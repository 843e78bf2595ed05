//! Construction of a [`Mesh`] from an indexed triangle list.

use std::collections::HashMap;

use nalgebra::Vector3;

use super::types::{EdgeId, Face, FaceId, HalfEdge, HalfEdgeId, Vertex, VertexId};
use super::Mesh;
use crate::error::MeshError;

impl Mesh {
    /// Build a half-edge mesh from positions and counter-clockwise triangles.
    ///
    /// Faces must be consistently oriented and every directed edge may be
    /// used at most once. Vertices not referenced by any triangle are kept
    /// but carry no field.
    pub fn from_triangles(
        positions: Vec<Vector3<f64>>,
        triangles: &[[usize; 3]],
    ) -> Result<Self, MeshError> {
        if triangles.is_empty() {
            return Err(MeshError::Empty);
        }

        let vertex_count = positions.len();
        let mut vertices: Vec<Vertex> = positions
            .into_iter()
            .map(|position| Vertex {
                position,
                outgoing: None,
            })
            .collect();

        let mut half_edges: Vec<HalfEdge> = Vec::with_capacity(triangles.len() * 3);
        let mut faces: Vec<Face> = Vec::with_capacity(triangles.len());
        let mut edge_map: HashMap<(VertexId, VertexId), HalfEdgeId> = HashMap::new();

        for (face_index, tri) in triangles.iter().enumerate() {
            for &corner in tri {
                if corner >= vertex_count {
                    return Err(MeshError::VertexOutOfRange {
                        face: face_index,
                        vertex: corner,
                        vertex_count,
                    });
                }
            }
            if tri[0] == tri[1] || tri[1] == tri[2] || tri[0] == tri[2] {
                return Err(MeshError::RepeatedCorner { face: face_index });
            }

            let face_id = FaceId(face_index);
            let base = half_edges.len();
            for k in 0..3 {
                half_edges.push(HalfEdge {
                    origin: VertexId(tri[k]),
                    twin: None,
                    next: HalfEdgeId(base + (k + 1) % 3),
                    prev: HalfEdgeId(base + (k + 2) % 3),
                    face: face_id,
                    edge: EdgeId(usize::MAX),
                });
            }

            for k in 0..3 {
                let he_id = HalfEdgeId(base + k);
                let origin = VertexId(tri[k]);
                let dest = VertexId(tri[(k + 1) % 3]);
                if edge_map.contains_key(&(origin, dest)) {
                    return Err(MeshError::NonManifoldEdge {
                        from: origin,
                        to: dest,
                    });
                }
                if let Some(&twin_id) = edge_map.get(&(dest, origin)) {
                    half_edges[he_id.0].twin = Some(twin_id);
                    half_edges[twin_id.0].twin = Some(he_id);
                }
                edge_map.insert((origin, dest), he_id);
            }

            faces.push(Face {
                half_edge: HalfEdgeId(base),
            });
        }

        // Undirected edge numbering: a twin pair shares the id assigned to
        // whichever half-edge is seen first.
        let mut edges = Vec::new();
        for index in 0..half_edges.len() {
            if half_edges[index].edge.0 != usize::MAX {
                continue;
            }
            let edge = EdgeId(edges.len());
            half_edges[index].edge = edge;
            if let Some(twin) = half_edges[index].twin {
                half_edges[twin.0].edge = edge;
            }
            edges.push(HalfEdgeId(index));
        }

        // Reference half-edge per vertex: the boundary one if it exists,
        // otherwise the first one encountered.
        for (index, he) in half_edges.iter().enumerate() {
            let vertex = &mut vertices[he.origin.0];
            match vertex.outgoing {
                None => vertex.outgoing = Some(HalfEdgeId(index)),
                Some(current) => {
                    if he.twin.is_none() && half_edges[current.0].twin.is_some() {
                        vertex.outgoing = Some(HalfEdgeId(index));
                    }
                }
            }
        }

        let mesh = Self {
            vertices,
            half_edges,
            faces,
            edges,
        };
        mesh.check_vertex_fans()?;
        Ok(mesh)
    }

    /// Every vertex must see all of its outgoing half-edges on a single
    /// counter-clockwise walk; otherwise it is a pinch point.
    fn check_vertex_fans(&self) -> Result<(), MeshError> {
        let mut degree = vec![0usize; self.vertices.len()];
        for he in &self.half_edges {
            degree[he.origin.0] += 1;
        }
        for (index, &count) in degree.iter().enumerate() {
            if count == 0 {
                continue;
            }
            let vertex = VertexId(index);
            if self.outgoing(vertex).len() != count {
                return Err(MeshError::NonManifoldVertex(vertex));
            }
        }
        Ok(())
    }
}
