//! Linear system solvers.
//!
//! Every Newton iteration solves `K du = r` against the assembled tangent.
//! Constrained iterations solve for two right-hand sides against the same
//! factorization through [`LinearSolver::solve_many`].
//!
//! # Solver Backends
//!
//! - [`DenseLuSolver`]: nalgebra dense LU with partial pivoting. Handles the
//!   indefinite tangents that appear past a limit point.
//! - [`FaerCholeskySolver`]: sparse Cholesky factorization using the faer
//!   library. Requires a symmetric positive definite tangent.
//!
//! A singular (or, for Cholesky, non positive definite) tangent is reported
//! as [`Error::SingularSystem`]; no solution is returned.

use crate::error::{Error, Result};
use crate::sparse::CsrMatrix;
use faer::linalg::cholesky::llt::factor::LltError;
use faer::prelude::*;
use faer::sparse::linalg::solvers::{Llt, SymbolicLlt};
use faer::sparse::linalg::LltError as SparseLltError;
use faer::sparse::{SparseColMat, SymbolicSparseColMat};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Pivots smaller than this fraction of the largest matrix entry are zero.
const PIVOT_TOLERANCE: f64 = 1e-12;

/// Linear solver interface.
pub trait LinearSolver: Debug + Send + Sync {
    /// Solve the linear system Ax = b.
    fn solve(&self, matrix: &CsrMatrix, rhs: &[f64]) -> Result<Vec<f64>>;

    /// Solve for several right-hand sides sharing one factorization.
    fn solve_many(&self, matrix: &CsrMatrix, rhs: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        rhs.iter().map(|b| self.solve(matrix, b)).collect()
    }

    /// Solver name for diagnostics.
    fn name(&self) -> &str;
}

/// Linear solver selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LinearSolverKind {
    /// Dense LU; general tangents, small systems.
    #[default]
    DenseLu,
    /// Sparse Cholesky; positive definite tangents.
    SparseCholesky,
}

/// Create the solver for `kind`.
pub fn select_solver(kind: LinearSolverKind) -> Box<dyn LinearSolver> {
    match kind {
        LinearSolverKind::DenseLu => Box::new(DenseLuSolver::new()),
        LinearSolverKind::SparseCholesky => Box::new(FaerCholeskySolver::new()),
    }
}

fn check_dimensions(matrix: &CsrMatrix, rhs: &[Vec<f64>]) -> Result<()> {
    let n = matrix.nrows();
    if n != matrix.ncols() {
        return Err(Error::Solver("Matrix must be square".into()));
    }
    if rhs.iter().any(|b| b.len() != n) {
        return Err(Error::Solver("RHS size mismatch".into()));
    }
    Ok(())
}

/// Direct solver using nalgebra dense LU factorization.
///
/// Converts the operator to dense storage; intended for small models.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenseLuSolver;

impl DenseLuSolver {
    pub fn new() -> Self {
        Self
    }

    fn solve_columns(&self, matrix: &CsrMatrix, rhs: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        check_dimensions(matrix, rhs)?;
        let n = matrix.nrows();
        if n == 0 {
            return Ok(vec![Vec::new(); rhs.len()]);
        }

        let dense = DMatrix::from(matrix);
        let scale = dense.amax();
        let lu = dense.lu();

        let u = lu.u();
        if let Some(row) = (0..n).find(|&i| !(u[(i, i)].abs() > PIVOT_TOLERANCE * scale)) {
            return Err(Error::SingularSystem(format!("zero pivot at equation {}", row)));
        }

        let b = DMatrix::from_fn(n, rhs.len(), |i, j| rhs[j][i]);
        let x = lu
            .solve(&b)
            .ok_or_else(|| Error::SingularSystem("LU factorization failed".into()))?;

        Ok(x.column_iter()
            .map(|col| col.iter().copied().collect())
            .collect())
    }
}

impl LinearSolver for DenseLuSolver {
    fn solve(&self, matrix: &CsrMatrix, rhs: &[f64]) -> Result<Vec<f64>> {
        let mut x = self.solve_columns(matrix, &[rhs.to_vec()])?;
        Ok(x.pop().unwrap_or_default())
    }

    fn solve_many(&self, matrix: &CsrMatrix, rhs: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        self.solve_columns(matrix, rhs)
    }

    fn name(&self) -> &str {
        "nalgebra dense LU"
    }
}

/// Convert nalgebra-sparse CSR matrix to faer SparseColMat (CSC format).
///
/// Only the pattern is transposed; for the symmetric tangents this solver
/// accepts, CSC(K) = CSC(Kᵀ).
fn csr_to_faer_csc(csr: &CsrMatrix) -> SparseColMat<usize, f64> {
    let nrows = csr.nrows();
    let ncols = csr.ncols();

    let row_offsets = csr.row_offsets();
    let col_indices = csr.col_indices();
    let values = csr.values();

    let mut col_offsets = vec![0usize; ncols + 1];
    for &col in col_indices {
        col_offsets[col + 1] += 1;
    }
    for i in 0..ncols {
        col_offsets[i + 1] += col_offsets[i];
    }

    let nnz = values.len();
    let mut csc_row_indices = vec![0usize; nnz];
    let mut csc_values = vec![0.0f64; nnz];
    let mut col_positions = col_offsets[..ncols].to_vec();

    for row in 0..nrows {
        for idx in row_offsets[row]..row_offsets[row + 1] {
            let col = col_indices[idx];
            let pos = col_positions[col];
            csc_row_indices[pos] = row;
            csc_values[pos] = values[idx];
            col_positions[col] += 1;
        }
    }

    // SAFETY: offsets are monotone and rows within a column are ascending,
    // since CSR rows are visited in order.
    unsafe {
        SparseColMat::new(
            SymbolicSparseColMat::new_unchecked(nrows, ncols, col_offsets, None, csc_row_indices),
            csc_values,
        )
    }
}

/// Sparse Cholesky solver using the faer library.
///
/// Uses faer's sparse LLᵀ factorization. A tangent that loses positive
/// definiteness (softening, limit points) is reported as singular; use
/// [`DenseLuSolver`] for those analyses.
#[derive(Debug, Clone, Copy, Default)]
pub struct FaerCholeskySolver;

impl FaerCholeskySolver {
    pub fn new() -> Self {
        Self
    }

    fn factor(&self, matrix: &CsrMatrix) -> Result<Llt<usize, f64>> {
        let csc = csr_to_faer_csc(matrix);
        let csc_ref = csc.as_ref();

        let symbolic = SymbolicLlt::try_new(csc_ref.symbolic(), faer::Side::Lower)
            .map_err(|_| Error::Solver("Symbolic Cholesky analysis failed".into()))?;

        Llt::try_new_with_symbolic(symbolic, csc_ref, faer::Side::Lower).map_err(|e| match e {
            SparseLltError::Generic(err) => {
                Error::Solver(format!("Sparse Cholesky error: {:?}", err))
            }
            SparseLltError::Numeric(LltError::NonPositivePivot { index }) => Error::SingularSystem(
                format!("Matrix is not positive definite at pivot {}", index),
            ),
        })
    }
}

impl LinearSolver for FaerCholeskySolver {
    fn solve(&self, matrix: &CsrMatrix, rhs: &[f64]) -> Result<Vec<f64>> {
        let mut x = self.solve_many(matrix, &[rhs.to_vec()])?;
        Ok(x.pop().unwrap_or_default())
    }

    fn solve_many(&self, matrix: &CsrMatrix, rhs: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        check_dimensions(matrix, rhs)?;
        let n = matrix.nrows();
        if n == 0 {
            return Ok(vec![Vec::new(); rhs.len()]);
        }

        let llt = self.factor(matrix)?;
        let mut x = faer::Mat::from_fn(n, rhs.len(), |i, j| rhs[j][i]);
        llt.solve_in_place(x.as_mut());

        let solution: Vec<Vec<f64>> = (0..rhs.len())
            .map(|j| (0..n).map(|i| x[(i, j)]).collect())
            .collect();
        if solution.iter().flatten().any(|v| !v.is_finite()) {
            return Err(Error::SingularSystem("non-finite Cholesky solution".into()));
        }
        Ok(solution)
    }

    fn name(&self) -> &str {
        "faer Sparse Cholesky (LLᵀ)"
    }
}

/// Dense residual `b - A x`, for checking solutions.
pub fn residual(matrix: &CsrMatrix, x: &[f64], rhs: &[f64]) -> DVector<f64> {
    let ax = matrix * &DVector::from_column_slice(x);
    DVector::from_column_slice(rhs) - ax
}
