//! Coordinate-format input for sparse bases.
//!
//! Balance bases over a hierarchical clustering are mostly zeros and are
//! usually produced in COO form. The distributions only need dense products,
//! so a [`CooMatrix`] is densified once at construction.

use crate::dynmatrix::DynMatrix;
use crate::error::FactorError;
use crate::traits::Scalar;

/// COO (coordinate) sparse matrix.
///
/// # Example
///
/// ```
/// use factor_normal::sparse::CooMatrix;
///
/// let coo = CooMatrix::new(vec![0, 1], vec![1, 0], vec![2.0_f64, 3.0], (2, 2)).unwrap();
/// let dense = coo.to_dense();
/// assert_eq!(dense[(0, 1)], 2.0);
/// assert_eq!(dense[(1, 0)], 3.0);
/// assert_eq!(dense[(0, 0)], 0.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CooMatrix<T> {
    rows: Vec<usize>,
    cols: Vec<usize>,
    values: Vec<T>,
    shape: (usize, usize),
}

impl<T: Scalar> CooMatrix<T> {
    /// Create a COO matrix from index and value arrays.
    ///
    /// # Errors
    ///
    /// `ShapeMismatch` if the three arrays differ in length or an index falls
    /// outside `shape`.
    pub fn new(
        rows: Vec<usize>,
        cols: Vec<usize>,
        values: Vec<T>,
        shape: (usize, usize),
    ) -> Result<Self, FactorError> {
        let nnz = values.len();
        if rows.len() != nnz {
            return Err(FactorError::shape("coo row indices", nnz, rows.len()));
        }
        if cols.len() != nnz {
            return Err(FactorError::shape("coo column indices", nnz, cols.len()));
        }
        if let Some(&r) = rows.iter().find(|&&r| r >= shape.0) {
            return Err(FactorError::shape("coo row bound", shape.0, r + 1));
        }
        if let Some(&c) = cols.iter().find(|&&c| c >= shape.1) {
            return Err(FactorError::shape("coo column bound", shape.1, c + 1));
        }
        Ok(Self {
            rows,
            cols,
            values,
            shape,
        })
    }

    /// `(nrows, ncols)`.
    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    /// Number of stored entries (duplicates counted separately).
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Dense copy. Duplicate coordinates are summed.
    pub fn to_dense(&self) -> DynMatrix<T> {
        let mut out = DynMatrix::zeros(self.shape.0, self.shape.1);
        for ((&r, &c), &v) in self.rows.iter().zip(&self.cols).zip(&self.values) {
            out[(r, c)] = out[(r, c)] + v;
        }
        out
    }
}

impl<T: Scalar> From<&CooMatrix<T>> for DynMatrix<T> {
    fn from(coo: &CooMatrix<T>) -> Self {
        coo.to_dense()
    }
}

impl<T: Scalar> From<CooMatrix<T>> for DynMatrix<T> {
    fn from(coo: CooMatrix<T>) -> Self {
        coo.to_dense()
    }
}
