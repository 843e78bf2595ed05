//! Field synthesis: energy assembly, the three solve modes and their results.

mod curvature;
mod energy;
mod solution;

use nalgebra::DVector;
use num_complex::Complex;
use serde::{Deserialize, Serialize};

pub use curvature::{boundary_reference, curvature_reference};
pub use energy::FieldEnergy;
pub use solution::FieldSolution;
pub(crate) use solution::frame_angle;

use crate::connection::Connection;
use crate::error::FieldError;
use crate::mesh::{Mesh, MeshGeometry};
use crate::singularity::SingularitySet;
use crate::solvers::{
    add_diagonal, smallest_eigenpair, to_real, EigenSettings, SpdSolver, SymmetricAssembler,
};
use crate::traits::FeatureProbe;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SolveSettings {
    /// Rotational symmetry N of the field.
    pub degree: u32,
    /// Weight `s` of the curvature term; 0 gives the plain Dirichlet energy.
    pub smoothness: f64,
    /// Report solve summaries at info level instead of debug.
    pub verbose: bool,
    pub eigen: EigenSettings,
}

impl Default for SolveSettings {
    fn default() -> Self {
        Self {
            degree: 1,
            smoothness: 0.0,
            verbose: false,
            eigen: EigenSettings::default(),
        }
    }
}

/// Which field to compute.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SolveMode {
    /// Smoothest field with no alignment.
    Free,
    /// Smoothest field pulled towards the curvature directions with weight
    /// `lambda`; more negative values align more strongly.
    CurvatureAligned { lambda: f64 },
    /// Smoothest field with boundary vertices pinned to the boundary tangent.
    FixedBoundary,
}

impl SolveMode {
    /// Mode selected by the alignment flags. Boundary alignment wins over
    /// curvature alignment.
    pub fn select(align_to_curvature: bool, align_to_boundary: bool, lambda: f64) -> Self {
        if align_to_boundary {
            SolveMode::FixedBoundary
        } else if align_to_curvature {
            SolveMode::CurvatureAligned { lambda }
        } else {
            SolveMode::Free
        }
    }
}

/// Everything a solve needs that only changes with the singularities or
/// the settings.
struct Prepared {
    connection: Connection,
    energy: FieldEnergy,
}

impl Prepared {
    fn new(
        mesh: &Mesh,
        geometry: &MeshGeometry,
        singularities: &SingularitySet,
        settings: &SolveSettings,
    ) -> Result<Self, FieldError> {
        let connection = Connection::build(mesh, geometry, singularities, settings.degree)?;
        let energy = FieldEnergy::assemble(mesh, geometry, &connection, settings.smoothness);
        Ok(Self { connection, energy })
    }
}

/// Synthesis session over one mesh.
///
/// The metric is computed once. The connection and the energy are built on
/// the first solve and reused until the singularities or the settings
/// change.
pub struct FieldSynthesizer<'m> {
    mesh: &'m Mesh,
    geometry: MeshGeometry,
    singularities: SingularitySet,
    settings: SolveSettings,
    prepared: Option<Prepared>,
    solution: Option<FieldSolution>,
}

impl<'m> FieldSynthesizer<'m> {
    pub fn new(mesh: &'m Mesh, settings: SolveSettings) -> Result<Self, FieldError> {
        if settings.degree == 0 {
            return Err(FieldError::InvalidDegree(settings.degree));
        }
        Ok(Self {
            mesh,
            geometry: MeshGeometry::new(mesh),
            singularities: SingularitySet::new(),
            settings,
            prepared: None,
            solution: None,
        })
    }

    pub fn mesh(&self) -> &'m Mesh {
        self.mesh
    }

    pub fn geometry(&self) -> &MeshGeometry {
        &self.geometry
    }

    pub fn settings(&self) -> &SolveSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: SolveSettings) -> Result<(), FieldError> {
        if settings.degree == 0 {
            return Err(FieldError::InvalidDegree(settings.degree));
        }
        self.settings = settings;
        self.prepared = None;
        Ok(())
    }

    pub fn singularities(&self) -> &SingularitySet {
        &self.singularities
    }

    /// Mutable access to the prescribed singularities. The cached
    /// connection is dropped, so the next solve sees the change.
    pub fn singularities_mut(&mut self) -> &mut SingularitySet {
        self.prepared = None;
        &mut self.singularities
    }

    pub fn clear_singularities(&mut self) {
        self.singularities_mut().clear();
    }

    /// Result of the most recent successful solve.
    pub fn solution(&self) -> Option<&FieldSolution> {
        self.solution.as_ref()
    }

    /// Connection for the current singularities, built if needed.
    pub fn connection(&mut self) -> Result<&Connection, FieldError> {
        let prepared = match self.prepared.take() {
            Some(prepared) => prepared,
            None => Prepared::new(self.mesh, &self.geometry, &self.singularities, &self.settings)?,
        };
        Ok(&self.prepared.insert(prepared).connection)
    }

    /// Singularities the given field actually has.
    pub fn detect_singularities(
        &mut self,
        solution: &FieldSolution,
    ) -> Result<SingularitySet, FieldError> {
        let mesh = self.mesh;
        let connection = self.connection()?;
        Ok(solution.singularities(mesh, connection))
    }

    /// Smoothest field. The feature value is the smallest eigenvalue of
    /// the energy relative to the mass.
    pub fn compute_smoothest(&mut self) -> Result<FieldSolution, FieldError> {
        self.solve(SolveMode::Free)
    }

    /// Smoothest field aligned to principal curvature with weight `lambda`.
    /// `lambda` must stay below the smallest eigenvalue returned by
    /// [`compute_smoothest`](Self::compute_smoothest).
    pub fn smoothest_curvature_alignment(
        &mut self,
        lambda: f64,
    ) -> Result<FieldSolution, FieldError> {
        self.solve(SolveMode::CurvatureAligned { lambda })
    }

    /// Smoothest field with the boundary tangent imposed on boundary
    /// vertices.
    pub fn compute_smoothest_fixed_boundary(&mut self) -> Result<FieldSolution, FieldError> {
        self.solve(SolveMode::FixedBoundary)
    }

    pub fn solve(&mut self, mode: SolveMode) -> Result<FieldSolution, FieldError> {
        let prepared = match self.prepared.take() {
            Some(prepared) => prepared,
            None => Prepared::new(self.mesh, &self.geometry, &self.singularities, &self.settings)?,
        };
        let prepared = &*self.prepared.insert(prepared);

        let (x, feature) = match mode {
            SolveMode::Free => solve_free(&prepared.energy, self.settings.eigen)?,
            SolveMode::CurvatureAligned { lambda } => {
                solve_aligned(self.mesh, &self.geometry, prepared, lambda)?
            }
            SolveMode::FixedBoundary => {
                if !self.singularities.is_empty() {
                    self.singularities
                        .check_fixed_boundary(self.mesh, self.settings.degree)?;
                }
                solve_fixed_boundary(self.mesh, &self.geometry, prepared)?
            }
        };
        if !feature.is_finite() || !x.iter().all(|v| v.is_finite()) {
            return Err(FieldError::NonFinite {
                stage: format!("solving {mode:?}"),
            });
        }

        let phases = prepared.energy.extend(&x);
        let solution = FieldSolution::new(self.mesh, &prepared.connection, mode, phases, feature);
        if self.settings.verbose {
            tracing::info!(?mode, feature, degree = self.settings.degree, "field solved");
        } else {
            tracing::debug!(?mode, feature, degree = self.settings.degree, "field solved");
        }
        self.solution = Some(solution.clone());
        Ok(solution)
    }
}

impl FeatureProbe for FieldSynthesizer<'_> {
    fn upper_bound(&mut self) -> Result<f64, FieldError> {
        Ok(self.compute_smoothest()?.feature())
    }

    fn feature_at(&mut self, lambda: f64) -> Result<f64, FieldError> {
        Ok(self.smoothest_curvature_alignment(lambda)?.feature())
    }
}

fn solve_free(
    energy: &FieldEnergy,
    settings: EigenSettings,
) -> Result<(DVector<f64>, f64), FieldError> {
    let shift = energy.spectrum_floor();
    let pair = smallest_eigenpair(energy.matrix(), energy.mass(), shift, settings)?;
    tracing::trace!(shift, iterations = pair.iterations, "inverse iteration finished");
    Ok((pair.vector, pair.value))
}

/// Solve `(A - λM) u = q` and report how far the field moved from the
/// reference towards the smoothest field:
/// `t = (R(M⁻¹q) - R(u)) / |R(M⁻¹q)|`.
fn solve_aligned(
    mesh: &Mesh,
    geometry: &MeshGeometry,
    prepared: &Prepared,
    lambda: f64,
) -> Result<(DVector<f64>, f64), FieldError> {
    let energy = &prepared.energy;
    let reference =
        energy.restrict(&curvature_reference(mesh, geometry, prepared.connection.degree())?);
    let system = add_diagonal(energy.matrix(), energy.mass(), -lambda);
    let solver = SpdSolver::factor(
        &system,
        &format!("factoring the curvature-aligned system at lambda = {lambda}"),
    )?;
    let x = solver.solve(&reference);

    let reference_quotient = energy.rayleigh_quotient(&reference.component_div(energy.mass()));
    let feature = (reference_quotient - energy.rayleigh_quotient(&x))
        / reference_quotient.abs().max(f64::MIN_POSITIVE);
    Ok((x, feature))
}

/// Pin boundary vertices to the boundary tangent and minimize the energy
/// over the rest: `A_II x_I = -A_IB g`.
fn solve_fixed_boundary(
    mesh: &Mesh,
    geometry: &MeshGeometry,
    prepared: &Prepared,
) -> Result<(DVector<f64>, f64), FieldError> {
    if !mesh.has_boundary() {
        return Err(FieldError::NoBoundary);
    }
    let energy = &prepared.energy;
    let boundary = boundary_reference(mesh, geometry, prepared.connection.degree());
    let pinned: Vec<Option<Complex<f64>>> = mesh
        .vertex_ids()
        .filter(|&v| energy.unknown(v).is_some())
        .map(|v| boundary[v.0])
        .collect();

    let mut free_index = vec![None; pinned.len()];
    let mut free_count = 0;
    for (slot, value) in pinned.iter().enumerate() {
        if value.is_none() {
            free_index[slot] = Some(free_count);
            free_count += 1;
        }
    }

    let fixed = to_real(&pinned.iter().map(|g| g.unwrap_or_default()).collect::<Vec<_>>());
    let mut x = fixed.clone();
    if free_count > 0 {
        let mut assembler = SymmetricAssembler::new(2 * free_count);
        let mut rhs = DVector::zeros(2 * free_count);
        for (row, col, &value) in energy.matrix().triplet_iter() {
            let Some(r) = free_index[row / 2] else {
                continue;
            };
            let r = 2 * r + row % 2;
            match free_index[col / 2] {
                Some(c) => assembler.add(r, 2 * c + col % 2, value),
                None => rhs[r] -= value * fixed[col],
            }
        }
        let solver = SpdSolver::factor(&assembler.finish(), "factoring the interior block")?;
        let interior = solver.solve(&rhs);
        for (slot, index) in free_index.iter().enumerate() {
            if let Some(i) = index {
                x[2 * slot] = interior[2 * i];
                x[2 * slot + 1] = interior[2 * i + 1];
            }
        }
    }

    let feature = energy.rayleigh_quotient(&x);
    Ok((x, feature))
}
