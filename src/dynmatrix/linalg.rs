use crate::linalg::cholesky::{back_substitute_lt, cholesky_in_place, forward_substitute};
use crate::linalg::lu::{lu_in_place, lu_solve};
use crate::linalg::LinalgError;
use crate::traits::FloatScalar;

use super::vector::DynVector;
use super::DynMatrix;

// ── DynLu ───────────────────────────────────────────────────────────

/// LU decomposition of a dynamically-sized square matrix.
///
/// Stores the packed L/U factors and permutation vector.
///
/// # Example
///
/// ```
/// use factor_normal::{DynMatrix, DynVector};
///
/// let a = DynMatrix::from_rows(2, 2, &[2.0_f64, 1.0, 5.0, 3.0]);
/// let lu = a.lu().unwrap();
///
/// let x = lu.solve(&DynVector::from_slice(&[4.0, 11.0]));
/// assert!((x[0] - 1.0).abs() < 1e-12);
/// assert!((x[1] - 2.0).abs() < 1e-12);
/// ```
#[derive(Debug)]
pub struct DynLu<T> {
    lu: DynMatrix<T>,
    perm: Vec<usize>,
    even: bool,
}

impl<T: FloatScalar> DynLu<T> {
    /// Decompose a matrix. Returns an error if the matrix is singular.
    pub fn new(a: &DynMatrix<T>) -> Result<Self, LinalgError> {
        assert!(a.is_square(), "LU decomposition requires a square matrix");
        let mut lu = a.clone();
        let mut perm = vec![0usize; a.nrows()];
        let even = lu_in_place(&mut lu, &mut perm)?;
        Ok(Self { lu, perm, even })
    }

    /// Solve Ax = b for x.
    pub fn solve(&self, b: &DynVector<T>) -> DynVector<T> {
        let n = self.lu.nrows();
        assert_eq!(b.len(), n, "rhs length mismatch");
        let mut x = vec![T::zero(); n];
        lu_solve(&self.lu, &self.perm, b.as_slice(), &mut x);
        DynVector::from_vec(x)
    }

    /// Compute the matrix inverse.
    pub fn inverse(&self) -> DynMatrix<T> {
        let n = self.lu.nrows();
        let mut inv = DynMatrix::zeros(n, n);
        let mut e = vec![T::zero(); n];
        let mut x = vec![T::zero(); n];
        for col in 0..n {
            if col > 0 {
                e[col - 1] = T::zero();
            }
            e[col] = T::one();
            lu_solve(&self.lu, &self.perm, &e, &mut x);
            for (row, &v) in x.iter().enumerate() {
                inv[(row, col)] = v;
            }
        }
        inv
    }

    /// Determinant (product of U's diagonal, signed by the permutation parity).
    pub fn det(&self) -> T {
        let mut prod = T::one();
        for i in 0..self.lu.nrows() {
            prod = prod * self.lu[(i, i)];
        }
        if self.even {
            prod
        } else {
            -prod
        }
    }
}

// ── DynCholesky ─────────────────────────────────────────────────────

/// Cholesky decomposition of a dynamically-sized positive-definite matrix.
///
/// Stores the lower triangular factor L where `A = L * Lᵗ`.
///
/// # Example
///
/// ```
/// use factor_normal::{DynMatrix, DynVector};
///
/// let a = DynMatrix::from_rows(2, 2, &[4.0_f64, 2.0, 2.0, 3.0]);
/// let chol = a.cholesky().unwrap();
///
/// let x = chol.solve(&DynVector::from_slice(&[8.0, 7.0]));
/// assert!((chol.det() - 8.0).abs() < 1e-12);
/// assert!((chol.ln_det() - 8.0_f64.ln()).abs() < 1e-12);
/// ```
#[derive(Debug)]
pub struct DynCholesky<T> {
    l: DynMatrix<T>,
}

impl<T: FloatScalar> DynCholesky<T> {
    /// Decompose a positive-definite matrix.
    pub fn new(a: &DynMatrix<T>) -> Result<Self, LinalgError> {
        assert!(a.is_square(), "Cholesky decomposition requires a square matrix");
        let mut l = a.clone();
        cholesky_in_place(&mut l)?;
        Ok(Self { l })
    }

    /// Dimension of the factored matrix.
    #[inline]
    pub fn dim(&self) -> usize {
        self.l.nrows()
    }

    /// Extract the full lower triangular factor (zeros above diagonal).
    pub fn l_full(&self) -> DynMatrix<T> {
        let n = self.l.nrows();
        DynMatrix::from_fn(n, n, |i, j| if j <= i { self.l[(i, j)] } else { T::zero() })
    }

    /// Solve A*x = b for x, where A = L*Lᵗ.
    pub fn solve(&self, b: &DynVector<T>) -> DynVector<T> {
        let n = self.l.nrows();
        assert_eq!(b.len(), n, "rhs length mismatch");
        let mut y = vec![T::zero(); n];
        forward_substitute(&self.l, b.as_slice(), &mut y);
        let mut x = vec![T::zero(); n];
        back_substitute_lt(&self.l, &y, &mut x);
        DynVector::from_vec(x)
    }

    /// Solve A*X = B for every column of `b`.
    pub fn solve_matrix(&self, b: &DynMatrix<T>) -> DynMatrix<T> {
        let n = self.l.nrows();
        assert_eq!(b.nrows(), n, "rhs row count mismatch");
        let mut out = DynMatrix::zeros(n, b.ncols());
        let mut col = vec![T::zero(); n];
        let mut y = vec![T::zero(); n];
        let mut x = vec![T::zero(); n];
        for j in 0..b.ncols() {
            for (i, c) in col.iter_mut().enumerate() {
                *c = b[(i, j)];
            }
            forward_substitute(&self.l, &col, &mut y);
            back_substitute_lt(&self.l, &y, &mut x);
            for (i, &v) in x.iter().enumerate() {
                out[(i, j)] = v;
            }
        }
        out
    }

    /// Determinant: det(A) = product(L\[i\]\[i\])^2.
    pub fn det(&self) -> T {
        let mut prod = T::one();
        for i in 0..self.l.nrows() {
            prod = prod * self.l[(i, i)];
        }
        prod * prod
    }

    /// Log-determinant: ln(det(A)) = 2 * sum(ln(L\[i\]\[i\])).
    ///
    /// Stable where `det()` under- or overflows.
    pub fn ln_det(&self) -> T {
        let mut sum = T::zero();
        for i in 0..self.l.nrows() {
            sum = sum + self.l[(i, i)].ln();
        }
        sum + sum
    }

    /// Ratio of the largest to the smallest squared pivot.
    ///
    /// A cheap lower bound on the spectral condition number of A.
    pub fn pivot_ratio(&self) -> T {
        let n = self.l.nrows();
        if n == 0 {
            return T::one();
        }
        let mut lo = T::infinity();
        let mut hi = T::zero();
        for i in 0..n {
            let p = self.l[(i, i)] * self.l[(i, i)];
            lo = lo.min(p);
            hi = hi.max(p);
        }
        hi / lo
    }

    /// Matrix inverse using the Cholesky factorization.
    ///
    /// The result is symmetrized.
    pub fn inverse(&self) -> DynMatrix<T> {
        let n = self.l.nrows();
        let mut inv = self.solve_matrix(&DynMatrix::eye(n));
        let two = T::one() + T::one();
        for j in 0..n {
            for i in (j + 1)..n {
                let avg = (inv[(i, j)] + inv[(j, i)]) / two;
                inv[(i, j)] = avg;
                inv[(j, i)] = avg;
            }
        }
        inv
    }
}

// ── Convenience methods ─────────────────────────────────────────────

impl<T: FloatScalar> DynMatrix<T> {
    /// LU decomposition with partial pivoting.
    pub fn lu(&self) -> Result<DynLu<T>, LinalgError> {
        DynLu::new(self)
    }

    /// Cholesky decomposition (`A = L * Lᵗ`).
    pub fn cholesky(&self) -> Result<DynCholesky<T>, LinalgError> {
        DynCholesky::new(self)
    }

    /// Solve `Ax = b` for `x` via LU decomposition.
    pub fn solve(&self, b: &DynVector<T>) -> Result<DynVector<T>, LinalgError> {
        Ok(self.lu()?.solve(b))
    }

    /// Matrix inverse via LU decomposition.
    ///
    /// ```
    /// use factor_normal::DynMatrix;
    /// let a = DynMatrix::from_rows(2, 2, &[4.0_f64, 7.0, 2.0, 6.0]);
    /// let a_inv = a.inverse().unwrap();
    /// let id = &a * &a_inv;
    /// assert!((id[(0, 0)] - 1.0).abs() < 1e-12);
    /// assert!((id[(0, 1)]).abs() < 1e-12);
    /// ```
    pub fn inverse(&self) -> Result<DynMatrix<T>, LinalgError> {
        Ok(self.lu()?.inverse())
    }

    /// Determinant via LU decomposition.
    ///
    /// A singular matrix yields `Ok(0)`.
    pub fn det(&self) -> Result<T, LinalgError> {
        match self.lu() {
            Ok(lu) => Ok(lu.det()),
            Err(LinalgError::Singular) => Ok(T::zero()),
            Err(e) => Err(e),
        }
    }
}
