//! Sparse linear algebra used by the field solves.
//!
//! All systems are real symmetric. Complex Hermitian operators are stored in
//! their real 2n x 2n form, where the complex entry `p + iq` becomes the
//! block `[[p, -q], [q, p]]` and the complex unknown `z_i` occupies
//! components `2i` (real part) and `2i + 1` (imaginary part).

use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::factorization::CscCholesky;
use nalgebra_sparse::{CooMatrix, CscMatrix};
use num_complex::Complex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::FieldError;

/// Accumulates a real symmetric matrix from duplicate-summing triplets.
pub struct SymmetricAssembler {
    coo: CooMatrix<f64>,
}

impl SymmetricAssembler {
    pub fn new(dim: usize) -> Self {
        Self {
            coo: CooMatrix::new(dim, dim),
        }
    }

    pub fn dim(&self) -> usize {
        self.coo.nrows()
    }

    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        if value != 0.0 {
            self.coo.push(row, col, value);
        }
    }

    /// Add complex entry `value` at complex position (row, col).
    pub fn add_complex(&mut self, row: usize, col: usize, value: Complex<f64>) {
        let (r, c) = (2 * row, 2 * col);
        self.add(r, c, value.re);
        self.add(r, c + 1, -value.im);
        self.add(r + 1, c, value.im);
        self.add(r + 1, c + 1, value.re);
    }

    pub fn finish(self) -> CscMatrix<f64> {
        CscMatrix::from(&self.coo)
    }
}

/// `matrix + scale * diag(diagonal)` as a new matrix.
pub fn add_diagonal(matrix: &CscMatrix<f64>, diagonal: &DVector<f64>, scale: f64) -> CscMatrix<f64> {
    let mut assembler = SymmetricAssembler::new(matrix.nrows());
    for (row, col, &value) in matrix.triplet_iter() {
        assembler.add(row, col, value);
    }
    for (i, &d) in diagonal.iter().enumerate() {
        assembler.add(i, i, scale * d);
    }
    assembler.finish()
}

/// Sparse matrix-vector product.
pub fn multiply(matrix: &CscMatrix<f64>, x: &DVector<f64>) -> DVector<f64> {
    let mut out = DVector::zeros(matrix.nrows());
    for (row, col, &value) in matrix.triplet_iter() {
        out[row] += value * x[col];
    }
    out
}

/// `xᵀ A x`.
pub fn quadratic_form(matrix: &CscMatrix<f64>, x: &DVector<f64>) -> f64 {
    matrix
        .triplet_iter()
        .map(|(row, col, &value)| x[row] * value * x[col])
        .sum()
}

/// `xᵀ diag(d) x`.
pub fn diagonal_norm_squared(diagonal: &DVector<f64>, x: &DVector<f64>) -> f64 {
    diagonal
        .iter()
        .zip(x.iter())
        .map(|(d, v)| d * v * v)
        .sum()
}

/// Sparse Cholesky factorization of a symmetric positive definite matrix.
pub struct SpdSolver {
    factor: CscCholesky<f64>,
}

impl SpdSolver {
    pub fn factor(matrix: &CscMatrix<f64>, stage: &str) -> Result<Self, FieldError> {
        CscCholesky::factor(matrix)
            .map(|factor| Self { factor })
            .map_err(|_| FieldError::Factorization {
                stage: stage.to_string(),
            })
    }

    pub fn solve(&self, rhs: &DVector<f64>) -> DVector<f64> {
        let rhs = DMatrix::from_column_slice(rhs.len(), 1, rhs.as_slice());
        let solution = self.factor.solve(&rhs);
        DVector::from_column_slice(solution.column(0).as_slice())
    }
}

/// Settings for the shifted inverse power iteration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EigenSettings {
    pub max_iterations: usize,
    pub tolerance: f64,
    pub seed: u64,
}

impl Default for EigenSettings {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            tolerance: 1e-12,
            seed: 0x5eed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Eigenpair {
    pub value: f64,
    /// Normalized so that `xᵀ M x = 1`.
    pub vector: DVector<f64>,
    pub iterations: usize,
}

/// Smallest eigenpair of the generalized problem `A x = λ M x` with `M`
/// diagonal and positive. `shift` must lie strictly below the spectrum so
/// that `A - shift M` is positive definite.
pub fn smallest_eigenpair(
    matrix: &CscMatrix<f64>,
    mass: &DVector<f64>,
    shift: f64,
    settings: EigenSettings,
) -> Result<Eigenpair, FieldError> {
    let shifted = add_diagonal(matrix, mass, -shift);
    let solver = SpdSolver::factor(&shifted, "factoring the shifted energy for inverse iteration")?;

    let mut rng = StdRng::seed_from_u64(settings.seed);
    let mut x = DVector::from_fn(matrix.nrows(), |_, _| rng.random_range(-1.0..1.0));
    normalize_in_mass(&mut x, mass);

    let mut value = quadratic_form(matrix, &x);
    let mut iterations = 0;
    while iterations < settings.max_iterations {
        let rhs = x.component_mul(mass);
        let mut next = solver.solve(&rhs);
        if !next.iter().all(|v| v.is_finite()) {
            return Err(FieldError::NonFinite {
                stage: "running inverse iteration".to_string(),
            });
        }
        normalize_in_mass(&mut next, mass);
        let next_value = quadratic_form(matrix, &next);
        iterations += 1;

        let converged =
            (next_value - value).abs() <= settings.tolerance * next_value.abs().max(1.0);
        x = next;
        value = next_value;
        if converged {
            break;
        }
    }

    Ok(Eigenpair {
        value,
        vector: x,
        iterations,
    })
}

fn normalize_in_mass(x: &mut DVector<f64>, mass: &DVector<f64>) {
    let norm = diagonal_norm_squared(mass, x).sqrt();
    if norm > 0.0 {
        *x /= norm;
    }
}

/// Pack complex values into the interleaved real layout.
pub fn to_real(values: &[Complex<f64>]) -> DVector<f64> {
    DVector::from_fn(2 * values.len(), |i, _| {
        let z = values[i / 2];
        if i % 2 == 0 {
            z.re
        } else {
            z.im
        }
    })
}

/// Unpack the interleaved real layout into complex values.
pub fn to_complex(x: &DVector<f64>) -> Vec<Complex<f64>> {
    x.as_slice()
        .chunks_exact(2)
        .map(|pair| Complex::new(pair[0], pair[1]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path_laplacian(n: usize) -> CscMatrix<f64> {
        let mut assembler = SymmetricAssembler::new(n);
        for i in 0..n - 1 {
            assembler.add(i, i, 1.0);
            assembler.add(i + 1, i + 1, 1.0);
            assembler.add(i, i + 1, -1.0);
            assembler.add(i + 1, i, -1.0);
        }
        assembler.finish()
    }

    #[test]
    fn complex_block_is_symmetric_for_hermitian_pairs() {
        let mut assembler = SymmetricAssembler::new(4);
        let value = Complex::new(0.3, -0.7);
        assembler.add_complex(0, 1, value);
        assembler.add_complex(1, 0, value.conj());
        let dense: DMatrix<f64> = DMatrix::from(&assembler.finish());
        assert!((&dense - dense.transpose()).norm() < 1e-15);
        assert_eq!(dense[(0, 2)], 0.3);
        assert_eq!(dense[(0, 3)], 0.7);
        assert_eq!(dense[(1, 2)], -0.7);
    }

    #[test]
    fn spd_solver_matches_dense_solution() {
        let matrix = add_diagonal(&path_laplacian(5), &DVector::repeat(5, 1.0), 1.0);
        let rhs = DVector::from_vec(vec![1.0, -2.0, 0.5, 0.0, 3.0]);
        let solution = SpdSolver::factor(&matrix, "test")
            .expect("shifted laplacian is positive definite")
            .solve(&rhs);
        let residual = multiply(&matrix, &solution) - rhs;
        assert!(residual.norm() < 1e-12);
    }

    #[test]
    fn spd_solver_rejects_indefinite_matrix() {
        let matrix = add_diagonal(&path_laplacian(3), &DVector::repeat(3, 1.0), -5.0);
        let err = SpdSolver::factor(&matrix, "factoring an indefinite test matrix")
            .err()
            .expect("indefinite matrix must not factor");
        assert!(format!("{err}").contains("indefinite test matrix"));
    }

    #[test]
    fn inverse_iteration_finds_constant_null_vector() {
        let n = 6;
        let mass = DVector::repeat(n, 0.5);
        let pair = smallest_eigenpair(&path_laplacian(n), &mass, -1e-6, EigenSettings::default())
            .expect("eigenpair should compute");
        assert!(pair.value.abs() < 1e-10);
        let first = pair.vector[0];
        assert!(pair.vector.iter().all(|v| (v - first).abs() < 1e-6));
        assert!((diagonal_norm_squared(&mass, &pair.vector) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn real_and_complex_layouts_round_trip() {
        let values = vec![Complex::new(1.0, 2.0), Complex::new(-3.0, 0.5)];
        let real = to_real(&values);
        assert_eq!(real.as_slice(), &[1.0, 2.0, -3.0, 0.5]);
        assert_eq!(to_complex(&real), values);
    }
}
