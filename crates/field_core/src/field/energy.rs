//! Quadratic energy of an N-direction field in its complex phase form.
//!
//! For phases `u ∈ ℂ^V` the energy is
//!
//! ```text
//! E(u) = Σ_edges w_e |u_j - e^{iNρ(h)} u_i|²  +  s N Σ_v K_v |u_v|²
//! ```
//!
//! stored as a real symmetric matrix with two rows per unknown (see
//! [`crate::solvers`]). Vertices outside every face are not unknowns; their
//! phase is zero.

use nalgebra::DVector;
use nalgebra_sparse::CscMatrix;
use num_complex::Complex;

use crate::connection::Connection;
use crate::mesh::{Mesh, MeshGeometry, VertexId};
use crate::solvers::{
    diagonal_norm_squared, quadratic_form, to_complex, to_real, SymmetricAssembler,
};

/// Relative gap kept between the inverse-iteration shift and the bottom of
/// the spectrum.
const SHIFT_MARGIN: f64 = 1e-8;

#[derive(Debug, Clone)]
pub struct FieldEnergy {
    matrix: CscMatrix<f64>,
    /// Lumped mass, repeated for the real and imaginary component.
    mass: DVector<f64>,
    /// Diagonal of the curvature term divided by the mass, per unknown.
    curvature_ratio: Vec<f64>,
    /// Unknown slot of each vertex.
    unknowns: Vec<Option<usize>>,
    /// Vertex of each unknown slot.
    vertices: Vec<VertexId>,
}

impl FieldEnergy {
    pub fn assemble(
        mesh: &Mesh,
        geometry: &MeshGeometry,
        connection: &Connection,
        smoothness: f64,
    ) -> Self {
        let n = connection.degree() as f64;
        let mut unknowns = vec![None; mesh.vertex_count()];
        let vertices: Vec<VertexId> = mesh
            .vertex_ids()
            .filter(|&v| mesh.vertex(v).outgoing.is_some())
            .collect();
        for (slot, v) in vertices.iter().enumerate() {
            unknowns[v.0] = Some(slot);
        }
        let mut assembler = SymmetricAssembler::new(2 * vertices.len());

        for h in mesh.half_edge_ids() {
            let he = mesh.half_edge(h);
            if he.twin.is_some_and(|twin| twin < h) {
                continue;
            }
            let weight = geometry.edge_weight(he.edge);
            if weight == 0.0 {
                continue;
            }
            let (Some(i), Some(j)) = (unknowns[he.origin.0], unknowns[mesh.head(h).0]) else {
                continue;
            };
            let r = connection.transport_phase(h);
            assembler.add_complex(i, i, Complex::new(weight, 0.0));
            assembler.add_complex(j, j, Complex::new(weight, 0.0));
            assembler.add_complex(j, i, -r * weight);
            assembler.add_complex(i, j, -r.conj() * weight);
        }

        let mut curvature_ratio = Vec::with_capacity(vertices.len());
        for (slot, &v) in vertices.iter().enumerate() {
            let diagonal = smoothness * n * geometry.angle_defect(v);
            assembler.add_complex(slot, slot, Complex::new(diagonal, 0.0));
            curvature_ratio.push(diagonal / geometry.vertex_area(v));
        }

        let mass = DVector::from_fn(2 * vertices.len(), |i, _| {
            geometry.vertex_area(vertices[i / 2])
        });

        Self {
            matrix: assembler.finish(),
            mass,
            curvature_ratio,
            unknowns,
            vertices,
        }
    }

    /// Unknown slot of `v`, `None` for vertices outside every face.
    pub fn unknown(&self, v: VertexId) -> Option<usize> {
        self.unknowns[v.0]
    }

    pub fn unknown_count(&self) -> usize {
        self.vertices.len()
    }

    /// Per-vertex values gathered into the unknowns, real layout.
    pub fn restrict(&self, values: &[Complex<f64>]) -> DVector<f64> {
        let gathered: Vec<Complex<f64>> = self.vertices.iter().map(|v| values[v.0]).collect();
        to_real(&gathered)
    }

    /// Unknowns scattered back to one phase per vertex.
    pub fn extend(&self, x: &DVector<f64>) -> Vec<Complex<f64>> {
        let mut phases = vec![Complex::new(0.0, 0.0); self.unknowns.len()];
        for (slot, value) in to_complex(x).into_iter().enumerate() {
            phases[self.vertices[slot].0] = value;
        }
        phases
    }

    pub fn matrix(&self) -> &CscMatrix<f64> {
        &self.matrix
    }

    pub fn mass(&self) -> &DVector<f64> {
        &self.mass
    }

    /// `xᵀ A x`.
    pub fn energy(&self, x: &DVector<f64>) -> f64 {
        quadratic_form(&self.matrix, x)
    }

    /// `xᵀ A x / xᵀ M x`, zero for the zero vector.
    pub fn rayleigh_quotient(&self, x: &DVector<f64>) -> f64 {
        let norm = diagonal_norm_squared(&self.mass, x);
        if norm > 0.0 {
            self.energy(x) / norm
        } else {
            0.0
        }
    }

    /// A value strictly below the smallest generalized eigenvalue.
    ///
    /// The smoothness part is positive semi-definite, so the spectrum is
    /// bounded below by the smallest ratio of the curvature diagonal to the
    /// mass, and by zero.
    pub fn spectrum_floor(&self) -> f64 {
        let floor = self
            .curvature_ratio
            .iter()
            .copied()
            .fold(0.0f64, f64::min);
        let scale = self
            .matrix
            .triplet_iter()
            .filter(|(row, col, _)| row == col)
            .map(|(row, _, &value)| (value / self.mass[row]).abs())
            .fold(1.0f64, f64::max);
        floor - SHIFT_MARGIN * scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::singularity::SingularitySet;

    fn energy_for(mesh: &Mesh, degree: u32, smoothness: f64) -> (MeshGeometry, Connection, FieldEnergy) {
        let geometry = MeshGeometry::new(mesh);
        let connection = Connection::build(mesh, &geometry, &SingularitySet::new(), degree)
            .expect("connection should build");
        let energy = FieldEnergy::assemble(mesh, &geometry, &connection, smoothness);
        (geometry, connection, energy)
    }

    #[test]
    fn matrix_is_symmetric() {
        let mesh = fixtures::icosphere(1);
        let (_, _, energy) = energy_for(&mesh, 3, 0.5);
        let dense = nalgebra::DMatrix::from(energy.matrix());
        assert!((&dense - dense.transpose()).norm() < 1e-12);
    }

    #[test]
    fn quadratic_form_matches_edge_sum() {
        let mesh = fixtures::icosphere(1);
        let (geometry, connection, energy) = energy_for(&mesh, 2, 0.0);
        let phases: Vec<Complex<f64>> = (0..mesh.vertex_count())
            .map(|i| Complex::from_polar(1.0 + 0.1 * i as f64, 0.7 * i as f64))
            .collect();

        let mut expected = 0.0;
        for h in mesh.half_edge_ids() {
            let he = mesh.half_edge(h);
            if he.twin.is_some_and(|twin| twin < h) {
                continue;
            }
            let ui = phases[he.origin.0];
            let uj = phases[mesh.head(h).0];
            expected += geometry.edge_weight(he.edge) * (uj - connection.transport_phase(h) * ui).norm_sqr();
        }

        let x = to_real(&phases);
        assert!((energy.energy(&x) - expected).abs() < 1e-9 * expected.max(1.0));
    }

    #[test]
    fn spectrum_floor_accounts_for_negative_curvature_term() {
        let mesh = fixtures::icosphere(1);
        let (_, _, flat) = energy_for(&mesh, 1, 0.0);
        assert!(flat.spectrum_floor() < 0.0);
        assert!(flat.spectrum_floor() > -1e-6);

        let (_, _, curved) = energy_for(&mesh, 1, -1.0);
        assert!(curved.spectrum_floor() < -0.1);
    }

    #[test]
    fn rayleigh_quotient_of_zero_is_zero() {
        let mesh = fixtures::grid(2, 2, 1.0);
        let (_, _, energy) = energy_for(&mesh, 1, 0.0);
        assert_eq!(energy.rayleigh_quotient(&DVector::zeros(2 * mesh.vertex_count())), 0.0);
    }

    #[test]
    fn faceless_vertices_are_not_unknowns() {
        let mesh = fixtures::icosphere_with_stray_vertex(1);
        let stray = VertexId(mesh.vertex_count() - 1);
        let (_, _, energy) = energy_for(&mesh, 1, 0.0);

        assert_eq!(energy.unknown(stray), None);
        assert_eq!(energy.unknown_count(), mesh.vertex_count() - 1);
        assert_eq!(energy.matrix().nrows(), 2 * energy.unknown_count());
        assert_eq!(energy.mass().len(), 2 * energy.unknown_count());

        let phases = vec![Complex::new(1.0, -2.0); mesh.vertex_count()];
        let extended = energy.extend(&energy.restrict(&phases));
        assert_eq!(extended[stray.0], Complex::new(0.0, 0.0));
        assert_eq!(extended[0], phases[0]);
    }
}
