mod linalg;
mod ops;
mod vector;

pub use linalg::{DynCholesky, DynLu};
pub use vector::DynVector;

use core::ops::{Index, IndexMut};

use crate::traits::{FloatScalar, MatrixMut, MatrixRef, Scalar};

/// Dynamically-sized heap-allocated matrix.
///
/// Column-major `Vec<T>` storage with dimensions set at runtime. Implements
/// [`MatrixRef`] and [`MatrixMut`], so the decomposition free functions in
/// [`crate::linalg`] work on it directly.
///
/// # Examples
///
/// ```
/// use factor_normal::DynMatrix;
///
/// let a = DynMatrix::from_rows(2, 2, &[1.0_f64, 2.0, 3.0, 4.0]);
/// assert_eq!(a[(0, 1)], 2.0);
/// assert_eq!(a.nrows(), 2);
///
/// let b = DynMatrix::<f64>::eye(3);
/// assert_eq!(b[(0, 0)], 1.0);
/// assert_eq!(b[(0, 1)], 0.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DynMatrix<T> {
    data: Vec<T>,
    nrows: usize,
    ncols: usize,
}

// ── Constructors ────────────────────────────────────────────────────

impl<T: Scalar> DynMatrix<T> {
    /// Create an `nrows x ncols` matrix of zeros.
    pub fn zeros(nrows: usize, ncols: usize) -> Self {
        Self {
            data: vec![T::zero(); nrows * ncols],
            nrows,
            ncols,
        }
    }

    /// Create an `n x n` identity matrix.
    pub fn eye(n: usize) -> Self {
        let mut m = Self::zeros(n, n);
        for i in 0..n {
            m[(i, i)] = T::one();
        }
        m
    }

    /// Square matrix with `diag` on the diagonal.
    ///
    /// ```
    /// use factor_normal::DynMatrix;
    /// let d = DynMatrix::from_diag(&[2.0_f64, 3.0]);
    /// assert_eq!(d[(1, 1)], 3.0);
    /// assert_eq!(d[(0, 1)], 0.0);
    /// ```
    pub fn from_diag(diag: &[T]) -> Self {
        let n = diag.len();
        let mut m = Self::zeros(n, n);
        for (i, &v) in diag.iter().enumerate() {
            m[(i, i)] = v;
        }
        m
    }

    /// Create a matrix from a flat slice in row-major order.
    ///
    /// Panics if `row_major.len() != nrows * ncols`.
    ///
    /// ```
    /// use factor_normal::DynMatrix;
    /// let m = DynMatrix::from_rows(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    /// assert_eq!(m[(0, 2)], 3.0);
    /// assert_eq!(m[(1, 0)], 4.0);
    /// ```
    pub fn from_rows(nrows: usize, ncols: usize, row_major: &[T]) -> Self {
        assert_eq!(
            row_major.len(),
            nrows * ncols,
            "slice length {} does not match {}x{} matrix",
            row_major.len(),
            nrows,
            ncols,
        );
        let mut data = vec![T::zero(); nrows * ncols];
        for i in 0..nrows {
            for j in 0..ncols {
                data[j * nrows + i] = row_major[i * ncols + j];
            }
        }
        Self { data, nrows, ncols }
    }

    /// Create a matrix from an owned `Vec<T>` in column-major order.
    ///
    /// Panics if `data.len() != nrows * ncols`.
    pub fn from_vec(nrows: usize, ncols: usize, data: Vec<T>) -> Self {
        assert_eq!(
            data.len(),
            nrows * ncols,
            "vec length {} does not match {}x{} matrix",
            data.len(),
            nrows,
            ncols,
        );
        Self { data, nrows, ncols }
    }

    /// Transpose.
    pub fn transpose(&self) -> Self {
        Self::from_fn(self.ncols, self.nrows, |i, j| self[(j, i)])
    }

    /// Copy of row `i` as a vector.
    pub fn row(&self, i: usize) -> DynVector<T> {
        DynVector::from_vec((0..self.ncols).map(|j| self[(i, j)]).collect())
    }

    /// `self · diag(s)`: scale column `j` by `s[j]`.
    pub fn scale_cols(&self, s: &[T]) -> Self {
        assert_eq!(s.len(), self.ncols, "column scale length mismatch");
        let mut out = self.clone();
        for (j, &sj) in s.iter().enumerate() {
            for x in out.col_as_mut_slice(j, 0) {
                *x = *x * sj;
            }
        }
        out
    }

    /// `self · diag(s) · selfᵗ`, exploiting symmetry of the result.
    ///
    /// Costs O(nrows² · ncols) and never forms `diag(s)`.
    ///
    /// ```
    /// use factor_normal::DynMatrix;
    /// let a = DynMatrix::from_rows(2, 3, &[1.0_f64, 0.0, 1.0, 0.0, 1.0, 0.0]);
    /// let g = a.weighted_gram(&[1.0, 2.0, 3.0]);
    /// assert_eq!(g[(0, 0)], 4.0);
    /// assert_eq!(g[(1, 1)], 2.0);
    /// assert_eq!(g[(0, 1)], 0.0);
    /// ```
    pub fn weighted_gram(&self, s: &[T]) -> Self {
        assert_eq!(s.len(), self.ncols, "weight length mismatch");
        let m = self.nrows;
        let mut out = Self::zeros(m, m);
        for (k, &sk) in s.iter().enumerate() {
            let col = self.col_as_slice(k, 0);
            for j in 0..m {
                let cj = col[j] * sk;
                if cj == T::zero() {
                    continue;
                }
                for i in j..m {
                    out[(i, j)] = out[(i, j)] + col[i] * cj;
                }
            }
        }
        for j in 0..m {
            for i in (j + 1)..m {
                out[(j, i)] = out[(i, j)];
            }
        }
        out
    }

    /// Flat column-major view of the storage.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }
}

impl<T: FloatScalar> DynMatrix<T> {
    /// Whether `|a_ij − a_ji| ≤ tol` for every pair.
    pub fn is_symmetric(&self, tol: T) -> bool {
        if !self.is_square() {
            return false;
        }
        for j in 0..self.ncols {
            for i in (j + 1)..self.nrows {
                if (self[(i, j)] - self[(j, i)]).abs() > tol {
                    return false;
                }
            }
        }
        true
    }

    /// Largest absolute element-wise difference to `other`.
    ///
    /// Panics if the shapes differ.
    pub fn max_abs_diff(&self, other: &Self) -> T {
        assert_eq!(
            (self.nrows, self.ncols),
            (other.nrows, other.ncols),
            "shape mismatch"
        );
        self.data
            .iter()
            .zip(&other.data)
            .fold(T::zero(), |acc, (&a, &b)| acc.max((a - b).abs()))
    }
}

impl<T> DynMatrix<T> {
    /// Number of rows.
    #[inline]
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    /// Number of columns.
    #[inline]
    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// `(nrows, ncols)`.
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.nrows, self.ncols)
    }

    /// Whether the matrix is square.
    #[inline]
    pub fn is_square(&self) -> bool {
        self.nrows == self.ncols
    }

    /// Create a matrix by calling `f(row, col)` for each element.
    ///
    /// ```
    /// use factor_normal::DynMatrix;
    /// let m = DynMatrix::from_fn(3, 3, |i, j| if i == j { 1.0_f64 } else { 0.0 });
    /// assert_eq!(m[(0, 0)], 1.0);
    /// assert_eq!(m[(0, 1)], 0.0);
    /// ```
    pub fn from_fn(nrows: usize, ncols: usize, f: impl Fn(usize, usize) -> T) -> Self {
        let mut data = Vec::with_capacity(nrows * ncols);
        for j in 0..ncols {
            for i in 0..nrows {
                data.push(f(i, j));
            }
        }
        Self { data, nrows, ncols }
    }
}

// ── MatrixRef / MatrixMut ───────────────────────────────────────────

impl<T> MatrixRef<T> for DynMatrix<T> {
    #[inline]
    fn nrows(&self) -> usize {
        self.nrows
    }

    #[inline]
    fn ncols(&self) -> usize {
        self.ncols
    }

    #[inline]
    fn get(&self, row: usize, col: usize) -> &T {
        &self.data[col * self.nrows + row]
    }

    #[inline]
    fn col_as_slice(&self, col: usize, row_start: usize) -> &[T] {
        let start = col * self.nrows + row_start;
        let end = col * self.nrows + self.nrows;
        &self.data[start..end]
    }
}

impl<T> MatrixMut<T> for DynMatrix<T> {
    #[inline]
    fn get_mut(&mut self, row: usize, col: usize) -> &mut T {
        &mut self.data[col * self.nrows + row]
    }

    #[inline]
    fn col_as_mut_slice(&mut self, col: usize, row_start: usize) -> &mut [T] {
        let start = col * self.nrows + row_start;
        let end = col * self.nrows + self.nrows;
        &mut self.data[start..end]
    }
}

// ── Index ───────────────────────────────────────────────────────────

impl<T> Index<(usize, usize)> for DynMatrix<T> {
    type Output = T;

    #[inline]
    fn index(&self, (row, col): (usize, usize)) -> &T {
        &self.data[col * self.nrows + row]
    }
}

impl<T> IndexMut<(usize, usize)> for DynMatrix<T> {
    #[inline]
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut T {
        &mut self.data[col * self.nrows + row]
    }
}
