//! Sparse matrix operations.
//!
//! Global operators are assembled as (row, col, value) triplets and
//! converted to CSR once per assembly pass.

use crate::error::{Error, Result};
use nalgebra::DMatrix;
use nalgebra_sparse::coo::CooMatrix;
use nalgebra_sparse::csr::CsrMatrix as NalgebraCsr;

/// Compressed Sparse Row matrix.
pub type CsrMatrix = NalgebraCsr<f64>;

/// Builder for assembling a sparse matrix from triplets (COO format).
///
/// Explicit zeros are kept so that the sparsity pattern does not depend on
/// the current tangent values.
#[derive(Debug, Clone)]
pub struct TripletMatrix {
    n_rows: usize,
    n_cols: usize,
    rows: Vec<usize>,
    cols: Vec<usize>,
    values: Vec<f64>,
}

impl TripletMatrix {
    pub fn new(n_rows: usize, n_cols: usize) -> Self {
        Self::with_capacity(n_rows, n_cols, 0)
    }

    /// Create with estimated capacity.
    pub fn with_capacity(n_rows: usize, n_cols: usize, nnz_estimate: usize) -> Self {
        Self {
            n_rows,
            n_cols,
            rows: Vec::with_capacity(nnz_estimate),
            cols: Vec::with_capacity(nnz_estimate),
            values: Vec::with_capacity(nnz_estimate),
        }
    }

    /// Add a value at (row, col). Duplicates are summed during conversion.
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        debug_assert!(row < self.n_rows, "Row index out of bounds");
        debug_assert!(col < self.n_cols, "Column index out of bounds");
        self.rows.push(row);
        self.cols.push(col);
        self.values.push(value);
    }

    /// Scatter a dense element matrix into the global pattern.
    ///
    /// `equations[i]` is the global row/column of local DOF `i`, or `None`
    /// for an eliminated DOF whose row and column are dropped.
    pub fn add_submatrix(&mut self, equations: &[Option<usize>], submatrix: &DMatrix<f64>) {
        debug_assert_eq!(submatrix.nrows(), equations.len());
        debug_assert_eq!(submatrix.ncols(), equations.len());

        for (i, row) in equations.iter().enumerate() {
            let Some(row) = *row else { continue };
            for (j, col) in equations.iter().enumerate() {
                if let Some(col) = *col {
                    self.add(row, col, submatrix[(i, j)]);
                }
            }
        }
    }

    /// Number of stored triplets.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Convert to CSR format, summing duplicate entries.
    pub fn to_csr(self) -> Result<CsrMatrix> {
        let coo = CooMatrix::try_from_triplets(
            self.n_rows,
            self.n_cols,
            self.rows,
            self.cols,
            self.values,
        )
        .map_err(|e| Error::Solver(format!("invalid triplet data: {}", e)))?;
        Ok(CsrMatrix::from(&coo))
    }
}
