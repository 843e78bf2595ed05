use std::collections::VecDeque;
use std::f64::consts::PI;

use nalgebra::Vector3;
use num_complex::Complex;
use serde::{Deserialize, Serialize};

use super::SolveMode;
use crate::connection::{wrap_angle, Connection};
use crate::mesh::{Mesh, MeshGeometry, VertexId};
use crate::singularity::SingularitySet;

/// Phases below this magnitude carry no direction when sampling to faces.
const MIN_PHASE_NORM: f64 = 1e-14;

/// Outcome of one field solve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSolution {
    degree: u32,
    mode: SolveMode,
    phases: Vec<Complex<f64>>,
    angles: Vec<f64>,
    feature: f64,
}

impl FieldSolution {
    pub(crate) fn new(
        mesh: &Mesh,
        connection: &Connection,
        mode: SolveMode,
        phases: Vec<Complex<f64>>,
        feature: f64,
    ) -> Self {
        let degree = connection.degree();
        let angles = propagate_angles(mesh, connection, &phases);
        Self {
            degree,
            mode,
            phases,
            angles,
            feature,
        }
    }

    pub fn degree(&self) -> u32 {
        self.degree
    }

    pub fn mode(&self) -> SolveMode {
        self.mode
    }

    /// Scalar summary of the solve: λ_min for the smoothest field, the
    /// normalized alignment `t` for curvature alignment, the Rayleigh
    /// quotient for fixed boundary.
    pub fn feature(&self) -> f64 {
        self.feature
    }

    pub fn phase(&self, v: VertexId) -> Complex<f64> {
        self.phases[v.0]
    }

    pub fn phases(&self) -> &[Complex<f64>] {
        &self.phases
    }

    /// Direction angle in the rescaled frame of `v`, wrapped to (-π, π].
    pub fn angle(&self, v: VertexId) -> f64 {
        self.angles[v.0]
    }

    pub fn angles(&self) -> &[f64] {
        &self.angles
    }

    /// Frame angle of the direction [`vertex_directions`](Self::vertex_directions)
    /// picks at each vertex: of the N equivalent angles, the one closest to
    /// the frame's reference edge.
    pub fn direction_angles(&self) -> Vec<f64> {
        self.angles
            .iter()
            .map(|&theta| smallest_representative(theta, self.degree))
            .collect()
    }

    /// One world-space unit direction per vertex.
    pub fn vertex_directions(&self, mesh: &Mesh, geometry: &MeshGeometry) -> Vec<Vector3<f64>> {
        mesh.vertex_ids()
            .zip(self.direction_angles())
            .map(|(v, theta)| vertex_direction(mesh, geometry, v, theta))
            .collect()
    }

    /// Field sampled at faces: the corners' N-th power phases are averaged
    /// in each face's own frame.
    pub fn face_directions(&self, mesh: &Mesh, geometry: &MeshGeometry) -> Vec<Vector3<f64>> {
        let n = self.degree as f64;
        let corners = self.vertex_directions(mesh, geometry);
        mesh.face_ids()
            .map(|f| {
                let (e1, e2, _) = geometry.face_basis(mesh, f);
                let mut sum = Complex::new(0.0, 0.0);
                let mut fallback = None;
                for v in mesh.face_vertices(f) {
                    let w = corners[v.0];
                    let gamma = w.dot(&e2).atan2(w.dot(&e1));
                    fallback.get_or_insert(gamma);
                    sum += Complex::from_polar(self.phases[v.0].norm(), n * gamma);
                }
                let gamma = if sum.norm() > MIN_PHASE_NORM {
                    sum.arg() / n
                } else {
                    fallback.unwrap_or(0.0)
                };
                e1 * gamma.cos() + e2 * gamma.sin()
            })
            .collect()
    }

    /// Indices of the singularities the field actually has, measured
    /// against the unadjusted connection. Faces with index zero are left out.
    pub fn singularities(&self, mesh: &Mesh, connection: &Connection) -> SingularitySet {
        let n = self.degree as f64;
        let mut detected = SingularitySet::new();
        for f in mesh.face_ids() {
            let turning: f64 = mesh
                .face_half_edges(f)
                .iter()
                .map(|&h| {
                    let src = self.phases[mesh.half_edge(h).origin.0];
                    let dst = self.phases[mesh.head(h).0];
                    (dst * (connection.levi_civita_phase(h) * src).conj()).arg()
                })
                .sum();
            let index = ((n * connection.face_curvature(f) + turning) / (2.0 * PI)).round() as i32;
            if index != 0 {
                detected.set(f, index);
            }
        }
        detected
    }
}

/// Recover angles from phases. Each vertex picks, among its N candidate
/// angles, the one closest to its BFS parent's angle carried over by the
/// connection.
fn propagate_angles(mesh: &Mesh, connection: &Connection, phases: &[Complex<f64>]) -> Vec<f64> {
    let n = connection.degree() as f64;
    let sector = 2.0 * PI / n;
    let mut angles: Vec<f64> = phases.iter().map(|u| u.arg() / n).collect();
    let mut visited = vec![false; mesh.vertex_count()];
    let mut queue = VecDeque::new();

    for root in mesh.vertex_ids() {
        if visited[root.0] {
            continue;
        }
        visited[root.0] = true;
        queue.push_back(root);
        while let Some(v) = queue.pop_front() {
            for h in mesh.outgoing(v) {
                let w = mesh.head(h);
                if visited[w.0] {
                    continue;
                }
                visited[w.0] = true;
                let predicted = angles[v.0] + connection.transport(h);
                let offset = ((predicted - angles[w.0]) / sector).round();
                angles[w.0] += offset * sector;
                queue.push_back(w);
            }
            // The ring skips the head of the last boundary half-edge.
            if let Some(last) = mesh.outgoing(v).last() {
                let prev = mesh.half_edge(mesh.half_edge(*last).prev);
                if prev.twin.is_none() && !visited[prev.origin.0] {
                    let w = prev.origin;
                    visited[w.0] = true;
                    // `prev` runs w -> v, so carry v back against it.
                    let predicted = angles[v.0] - connection.transport(mesh.half_edge(*last).prev);
                    let offset = ((predicted - angles[w.0]) / sector).round();
                    angles[w.0] += offset * sector;
                    queue.push_back(w);
                }
            }
        }
    }

    angles.into_iter().map(wrap_half_open).collect()
}

/// Wrap into (-π, π].
fn wrap_half_open(angle: f64) -> f64 {
    let wrapped = wrap_angle(angle);
    if wrapped <= -PI {
        wrapped + 2.0 * PI
    } else {
        wrapped
    }
}

/// Representative of `theta` modulo 2π/N with the smallest magnitude.
fn smallest_representative(theta: f64, degree: u32) -> f64 {
    let sector = 2.0 * PI / degree as f64;
    theta - sector * (theta / sector).round()
}

fn vertex_direction(
    mesh: &Mesh,
    geometry: &MeshGeometry,
    v: VertexId,
    theta: f64,
) -> Vector3<f64> {
    let (e1, e2, _) = geometry.vertex_basis(mesh, v);
    let beta = theta / geometry.angle_scale(v);
    e1 * beta.cos() + e2 * beta.sin()
}

/// Rescaled frame angle of a world-space direction at `v`. Inverts
/// [`FieldSolution::vertex_directions`] only while `|θ / s_v| <= π`; saddle
/// vertices (`s_v < 1`) can exceed that.
pub(crate) fn frame_angle(
    mesh: &Mesh,
    geometry: &MeshGeometry,
    v: VertexId,
    direction: &Vector3<f64>,
) -> f64 {
    let (e1, e2, _) = geometry.vertex_basis(mesh, v);
    let beta = direction.dot(&e2).atan2(direction.dot(&e1));
    beta * geometry.angle_scale(v)
}
