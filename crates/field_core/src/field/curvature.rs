//! Reference fields the solver can be pulled towards.

use std::f64::consts::PI;

use num_complex::Complex;

use crate::error::FieldError;
use crate::mesh::{Mesh, MeshGeometry};

/// Discrete shape operator projected onto 2-directions, per vertex, rotated
/// to point along the direction of maximum curvature and raised to degree
/// `degree`.
///
/// `Q_v = -Σ_{h out of v} ½ ℓ_e β_e e^{2iφ(h)}`, then
/// `q_v = |Q_v| e^{i(N/2) arg Q_v}`. The magnitude is the local anisotropy,
/// so umbilic regions exert no pull.
pub fn curvature_reference(
    mesh: &Mesh,
    geometry: &MeshGeometry,
    degree: u32,
) -> Result<Vec<Complex<f64>>, FieldError> {
    let half_degree = degree as f64 / 2.0;
    let mut total_length = 0.0;
    let reference: Vec<Complex<f64>> = mesh
        .vertex_ids()
        .map(|v| {
            let mut shape = Complex::new(0.0, 0.0);
            for h in mesh.outgoing(v) {
                let edge = mesh.half_edge(h).edge;
                let length = geometry.edge_length(edge);
                let weight = 0.5 * length * geometry.dihedral_angle(edge);
                shape -= Complex::from_polar(weight, 2.0 * geometry.polar_angle(h));
                total_length += length;
            }
            Complex::from_polar(shape.norm(), half_degree * shape.arg())
        })
        .collect();

    let largest = reference.iter().map(|q| q.norm()).fold(0.0f64, f64::max);
    if !(largest > f64::EPSILON * total_length.max(1.0)) {
        return Err(FieldError::DegenerateReference);
    }
    Ok(reference)
}

/// Unit field along the boundary, per vertex: boundary vertex `b` gets
/// `e^{iN(Θ_b - π)/2}`, the bisector of its two boundary edges in its own
/// frame; interior vertices get `None`.
pub fn boundary_reference(
    mesh: &Mesh,
    geometry: &MeshGeometry,
    degree: u32,
) -> Vec<Option<Complex<f64>>> {
    mesh.vertex_ids()
        .map(|v| {
            geometry.is_boundary_vertex(v).then(|| {
                let bisector = 0.5 * (geometry.angle_sum(v) - PI);
                Complex::from_polar(1.0, degree as f64 * bisector)
            })
        })
        .collect()
}
