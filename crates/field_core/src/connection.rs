//! Discrete connection between vertex tangent frames.
//!
//! `ρ(h)` rotates a direction expressed in the frame of `origin(h)` into the
//! frame of `head(h)`. The Levi-Civita part comes from the rescaled polar
//! angles of the mesh metric; an optional per-edge adjustment `δ` changes
//! the holonomy around faces so that prescribed singularities are realized:
//!
//! ```text
//! Ω_f + Σ_{h ∈ f} δ(h) = 2π k_f / N
//! ```
//!
//! The adjustment is the least-norm solution of these face constraints.

use std::f64::consts::PI;

use nalgebra::DVector;
use num_complex::Complex;

use crate::error::FieldError;
use crate::mesh::{FaceId, HalfEdgeId, Mesh, MeshGeometry};
use crate::singularity::SingularitySet;
use crate::solvers::{SpdSolver, SymmetricAssembler};

#[derive(Debug, Clone)]
pub struct Connection {
    degree: u32,
    levi_civita: Vec<f64>,
    adjustment: Vec<f64>,
    face_curvature: Vec<f64>,
}

impl Connection {
    /// Build the connection for an N-direction field.
    ///
    /// An empty singularity set leaves the Levi-Civita connection untouched
    /// and singularities emerge wherever the solve puts them. A non-empty set
    /// must satisfy the index-sum invariant; it is never renormalized here.
    pub fn build(
        mesh: &Mesh,
        geometry: &MeshGeometry,
        singularities: &SingularitySet,
        degree: u32,
    ) -> Result<Self, FieldError> {
        if degree == 0 {
            return Err(FieldError::InvalidDegree(degree));
        }

        let levi_civita = levi_civita_angles(mesh, geometry);
        let face_curvature: Vec<f64> = mesh
            .face_ids()
            .map(|f| geometry.face_curvature(mesh, f))
            .collect();

        let adjustment = if singularities.is_empty() {
            vec![0.0; mesh.half_edge_count()]
        } else {
            singularities.check(mesh, degree)?;
            solve_adjustment(mesh, &face_curvature, singularities, degree)?
        };

        tracing::debug!(
            degree,
            singularities = singularities.len(),
            max_adjustment = adjustment.iter().fold(0.0f64, |m, d| m.max(d.abs())),
            "built discrete connection"
        );

        Ok(Self {
            degree,
            levi_civita,
            adjustment,
            face_curvature,
        })
    }

    pub fn degree(&self) -> u32 {
        self.degree
    }

    /// Adjusted transport angle along `h`.
    pub fn transport(&self, h: HalfEdgeId) -> f64 {
        self.levi_civita[h.0] + self.adjustment[h.0]
    }

    /// `e^{iNρ(h)}`: the transport acting on N-th power phases.
    pub fn transport_phase(&self, h: HalfEdgeId) -> Complex<f64> {
        Complex::from_polar(1.0, self.degree as f64 * self.transport(h))
    }

    pub fn levi_civita(&self, h: HalfEdgeId) -> f64 {
        self.levi_civita[h.0]
    }

    /// `e^{iNρ(h)}` for the unadjusted (Levi-Civita) transport.
    pub fn levi_civita_phase(&self, h: HalfEdgeId) -> Complex<f64> {
        Complex::from_polar(1.0, self.degree as f64 * self.levi_civita[h.0])
    }

    pub fn adjustment(&self, h: HalfEdgeId) -> f64 {
        self.adjustment[h.0]
    }

    /// Exact (unwrapped) integrated curvature `Ω_f` of a face.
    pub fn face_curvature(&self, face: FaceId) -> f64 {
        self.face_curvature[face.0]
    }

    /// Adjusted holonomy around a face, `Ω_f + Σ δ`.
    pub fn holonomy(&self, mesh: &Mesh, face: FaceId) -> f64 {
        self.face_curvature[face.0]
            + mesh
                .face_half_edges(face)
                .iter()
                .map(|&h| self.adjustment[h.0])
                .sum::<f64>()
    }
}

/// Wrap an angle into [-π, π].
pub fn wrap_angle(angle: f64) -> f64 {
    angle - 2.0 * PI * (angle / (2.0 * PI)).round()
}

fn levi_civita_angles(mesh: &Mesh, geometry: &MeshGeometry) -> Vec<f64> {
    mesh.half_edge_ids()
        .map(|h| {
            let he = mesh.half_edge(h);
            // Direction of the reversed edge in the head's frame.
            let reversed = match he.twin {
                Some(twin) => geometry.polar_angle(twin),
                None => {
                    let next = he.next;
                    let head = mesh.half_edge(next).origin;
                    geometry.polar_angle(next)
                        + geometry.angle_scale(head) * geometry.corner_angle(next)
                }
            };
            wrap_angle(reversed - geometry.polar_angle(h) + PI)
        })
        .collect()
}

/// Least-norm `δ = Dᵀy` with `(DDᵀ) y = b`, `b_f = 2πk_f/N - Ω_f`.
///
/// `DDᵀ` is the face adjacency Laplacian with the face's boundary edge
/// count added on the diagonal. On closed components it is singular with
/// constant kernel; grounding one face per closed component keeps it
/// positive definite without changing the solution of a consistent system.
fn solve_adjustment(
    mesh: &Mesh,
    face_curvature: &[f64],
    singularities: &SingularitySet,
    degree: u32,
) -> Result<Vec<f64>, FieldError> {
    let face_count = mesh.face_count();
    let mut assembler = SymmetricAssembler::new(face_count);
    for face in mesh.face_ids() {
        assembler.add(face.0, face.0, 3.0);
        for h in mesh.face_half_edges(face) {
            if let Some(twin) = mesh.half_edge(h).twin {
                assembler.add(face.0, mesh.half_edge(twin).face.0, -1.0);
            }
        }
    }
    for component in mesh.components() {
        if component.is_closed() {
            assembler.add(component.faces[0].0, component.faces[0].0, 1.0);
        }
    }

    let rhs = DVector::from_fn(face_count, |f, _| {
        2.0 * PI * singularities.get(FaceId(f)) as f64 / degree as f64 - face_curvature[f]
    });
    let solver = SpdSolver::factor(&assembler.finish(), "solving for the connection adjustment")?;
    let y = solver.solve(&rhs);

    Ok(mesh
        .half_edge_ids()
        .map(|h| {
            let he = mesh.half_edge(h);
            match he.twin {
                Some(twin) => y[he.face.0] - y[mesh.half_edge(twin).face.0],
                None => y[he.face.0],
            }
        })
        .collect())
}
