//! Intrinsic metric of a triangle mesh.
//!
//! Everything the field energy needs from the embedding is computed once
//! here: face areas, corner angles, cotangent weights, angle defects,
//! lumped vertex areas and the rescaled polar angle of every outgoing
//! half-edge, which defines each vertex's local tangent frame.

use std::f64::consts::PI;

use nalgebra::Vector3;

use super::types::{EdgeId, FaceId, HalfEdgeId, VertexId};
use super::Mesh;

/// Faces whose area falls below this fraction of their squared longest
/// edge are treated as degenerate.
pub const DEGENERATE_AREA: f64 = 1e-12;

/// Smallest lumped vertex area, relative to the mean face area.
const MIN_VERTEX_AREA: f64 = 1e-12;

#[derive(Debug, Clone)]
pub struct MeshGeometry {
    face_area: Vec<f64>,
    face_normal: Vec<Vector3<f64>>,
    face_degenerate: Vec<bool>,
    /// Interior angle at the origin of each half-edge, inside its face.
    corner_angle: Vec<f64>,
    /// Cotangent of the angle opposite each half-edge (zero on degenerate faces).
    cotan: Vec<f64>,
    edge_weight: Vec<f64>,
    edge_length: Vec<f64>,
    /// Signed dihedral angle, positive where the surface is convex.
    dihedral: Vec<f64>,
    angle_sum: Vec<f64>,
    angle_scale: Vec<f64>,
    angle_defect: Vec<f64>,
    vertex_area: Vec<f64>,
    vertex_normal: Vec<Vector3<f64>>,
    /// Rescaled angle of each half-edge in its origin's tangent frame.
    polar_angle: Vec<f64>,
    boundary_vertex: Vec<bool>,
}

impl MeshGeometry {
    pub fn new(mesh: &Mesh) -> Self {
        let face_count = mesh.face_count();
        let half_edge_count = mesh.half_edge_count();
        let vertex_count = mesh.vertex_count();
        let position = |v: VertexId| mesh.vertex(v).position;

        let mut face_area = vec![0.0; face_count];
        let mut face_normal = vec![Vector3::zeros(); face_count];
        let mut face_degenerate = vec![false; face_count];
        let mut corner_angle = vec![0.0; half_edge_count];
        let mut cotan = vec![0.0; half_edge_count];

        for face in mesh.face_ids() {
            let [a, b, c] = mesh.face_vertices(face).map(position);
            let cross = (b - a).cross(&(c - a));
            let area = 0.5 * cross.norm();
            let longest = (b - a)
                .norm_squared()
                .max((c - b).norm_squared())
                .max((a - c).norm_squared());
            face_area[face.0] = area;
            face_degenerate[face.0] = area <= DEGENERATE_AREA * longest || longest == 0.0;
            if !face_degenerate[face.0] {
                face_normal[face.0] = cross / (2.0 * area);
            }

            for h in mesh.face_half_edges(face) {
                let he = mesh.half_edge(h);
                let origin = position(he.origin);
                let head = position(mesh.head(h));
                let opposite = position(mesh.half_edge(he.prev).origin);

                let u = head - origin;
                let w = opposite - origin;
                // atan2 keeps coincident points finite (atan2(0, 0) = 0).
                corner_angle[h.0] = u.cross(&w).norm().atan2(u.dot(&w));

                if !face_degenerate[face.0] {
                    let p = origin - opposite;
                    let q = head - opposite;
                    let sine = p.cross(&q).norm();
                    cotan[h.0] = p.dot(&q) / sine;
                }
            }
        }

        let mut edge_weight = vec![0.0; mesh.edge_count()];
        let mut edge_length = vec![0.0; mesh.edge_count()];
        let mut dihedral = vec![0.0; mesh.edge_count()];
        for h in mesh.half_edge_ids() {
            let he = mesh.half_edge(h);
            edge_weight[he.edge.0] += 0.5 * cotan[h.0];
            edge_length[he.edge.0] = (position(mesh.head(h)) - position(he.origin)).norm();
            if let Some(twin) = he.twin {
                if h < twin {
                    let n1 = face_normal[he.face.0];
                    let n2 = face_normal[mesh.half_edge(twin).face.0];
                    let direction = position(mesh.head(h)) - position(he.origin);
                    let length = direction.norm();
                    if length > 0.0 {
                        let axis = direction / length;
                        dihedral[he.edge.0] = n1.cross(&n2).dot(&axis).atan2(n1.dot(&n2));
                    }
                }
            }
        }
        for weight in &mut edge_weight {
            // Negative cotangent sums (obtuse pairs) are clamped so the
            // connection Laplacian stays positive semi-definite.
            *weight = weight.max(0.0);
        }

        let mean_face_area =
            face_area.iter().sum::<f64>() / face_count.max(1) as f64;
        let area_floor = (MIN_VERTEX_AREA * mean_face_area).max(f64::MIN_POSITIVE);

        let mut angle_sum = vec![0.0; vertex_count];
        let mut angle_scale = vec![1.0; vertex_count];
        let mut angle_defect = vec![0.0; vertex_count];
        let mut vertex_area = vec![0.0; vertex_count];
        let mut vertex_normal = vec![Vector3::zeros(); vertex_count];
        let mut polar_angle = vec![0.0; half_edge_count];
        let mut boundary_vertex = vec![false; vertex_count];

        for face in mesh.face_ids() {
            if face_degenerate[face.0] {
                continue;
            }
            let share = face_area[face.0] / 3.0;
            for v in mesh.face_vertices(face) {
                vertex_area[v.0] += share;
                vertex_normal[v.0] += face_normal[face.0] * face_area[face.0];
            }
        }

        for v in mesh.vertex_ids() {
            vertex_area[v.0] = vertex_area[v.0].max(area_floor);
            let normal = vertex_normal[v.0];
            vertex_normal[v.0] = if normal.norm() > 0.0 {
                normal.normalize()
            } else {
                Vector3::z()
            };

            let ring = mesh.outgoing(v);
            if ring.is_empty() {
                continue;
            }
            let boundary = mesh.is_boundary_vertex(v);
            boundary_vertex[v.0] = boundary;

            let total: f64 = ring.iter().map(|h| corner_angle[h.0]).sum();
            angle_sum[v.0] = total;
            angle_defect[v.0] = if boundary { PI - total } else { 2.0 * PI - total };
            angle_scale[v.0] = if boundary || total <= f64::EPSILON {
                1.0
            } else {
                2.0 * PI / total
            };

            let scale = angle_scale[v.0];
            let mut accumulated = 0.0;
            for h in ring {
                polar_angle[h.0] = accumulated;
                accumulated += scale * corner_angle[h.0];
            }
        }

        Self {
            face_area,
            face_normal,
            face_degenerate,
            corner_angle,
            cotan,
            edge_weight,
            edge_length,
            dihedral,
            angle_sum,
            angle_scale,
            angle_defect,
            vertex_area,
            vertex_normal,
            polar_angle,
            boundary_vertex,
        }
    }

    pub fn face_area(&self, face: FaceId) -> f64 {
        self.face_area[face.0]
    }

    pub fn face_normal(&self, face: FaceId) -> Vector3<f64> {
        self.face_normal[face.0]
    }

    pub fn is_degenerate(&self, face: FaceId) -> bool {
        self.face_degenerate[face.0]
    }

    pub fn corner_angle(&self, h: HalfEdgeId) -> f64 {
        self.corner_angle[h.0]
    }

    pub fn cotan(&self, h: HalfEdgeId) -> f64 {
        self.cotan[h.0]
    }

    /// Cotangent weight `½(cot α + cot β)` of an edge, clamped at zero.
    pub fn edge_weight(&self, e: EdgeId) -> f64 {
        self.edge_weight[e.0]
    }

    pub fn edge_length(&self, e: EdgeId) -> f64 {
        self.edge_length[e.0]
    }

    pub fn dihedral_angle(&self, e: EdgeId) -> f64 {
        self.dihedral[e.0]
    }

    pub fn angle_sum(&self, v: VertexId) -> f64 {
        self.angle_sum[v.0]
    }

    /// Factor mapping true angles around `v` to the rescaled frame angles.
    pub fn angle_scale(&self, v: VertexId) -> f64 {
        self.angle_scale[v.0]
    }

    /// Discrete Gaussian curvature: 2π (π on the boundary) minus the angle sum.
    pub fn angle_defect(&self, v: VertexId) -> f64 {
        self.angle_defect[v.0]
    }

    pub fn angle_defects(&self) -> &[f64] {
        &self.angle_defect
    }

    /// Lumped (barycentric) vertex area.
    pub fn vertex_area(&self, v: VertexId) -> f64 {
        self.vertex_area[v.0]
    }

    pub fn vertex_normal(&self, v: VertexId) -> Vector3<f64> {
        self.vertex_normal[v.0]
    }

    pub fn polar_angle(&self, h: HalfEdgeId) -> f64 {
        self.polar_angle[h.0]
    }

    pub fn is_boundary_vertex(&self, v: VertexId) -> bool {
        self.boundary_vertex[v.0]
    }

    /// Integrated curvature of a face as seen by the vertex frames:
    /// `Σ s_v α_v - π` over its corners. Sums to 2πχ on closed meshes.
    pub fn face_curvature(&self, mesh: &Mesh, face: FaceId) -> f64 {
        mesh.face_half_edges(face)
            .iter()
            .map(|&h| self.angle_scale[mesh.half_edge(h).origin.0] * self.corner_angle[h.0])
            .sum::<f64>()
            - PI
    }

    /// Orthonormal tangent basis `(e1, e2, n)` of a vertex; `e1` follows the
    /// reference half-edge projected into the tangent plane.
    pub fn vertex_basis(
        &self,
        mesh: &Mesh,
        v: VertexId,
    ) -> (Vector3<f64>, Vector3<f64>, Vector3<f64>) {
        let normal = self.vertex_normal[v.0];
        let reference = mesh
            .vertex(v)
            .outgoing
            .map(|h| mesh.vertex(mesh.head(h)).position - mesh.vertex(v).position)
            .unwrap_or_else(Vector3::x);
        tangent_basis(normal, reference)
    }

    /// Orthonormal basis `(e1, e2, n)` of a face; `e1` follows its first edge.
    pub fn face_basis(
        &self,
        mesh: &Mesh,
        face: FaceId,
    ) -> (Vector3<f64>, Vector3<f64>, Vector3<f64>) {
        let [a, b, _] = mesh.face_vertices(face);
        let reference = mesh.vertex(b).position - mesh.vertex(a).position;
        let normal = if self.face_degenerate[face.0] {
            self.vertex_normal[a.0]
        } else {
            self.face_normal[face.0]
        };
        tangent_basis(normal, reference)
    }
}

fn tangent_basis(
    normal: Vector3<f64>,
    reference: Vector3<f64>,
) -> (Vector3<f64>, Vector3<f64>, Vector3<f64>) {
    let mut e1 = reference - normal * normal.dot(&reference);
    if e1.norm() <= f64::EPSILON {
        // Reference edge parallel to the normal: fall back to any
        // direction orthogonal to it.
        let helper = if normal.x.abs() < 0.9 {
            Vector3::x()
        } else {
            Vector3::y()
        };
        e1 = helper - normal * normal.dot(&helper);
    }
    let e1 = e1.normalize();
    let e2 = normal.cross(&e1);
    (e1, e2, normal)
}
