use crate::linalg::LinalgError;
use crate::traits::{FloatScalar, MatrixMut, MatrixRef};

/// Cholesky decomposition in place: A = L * Lᵗ.
///
/// On return, the lower triangle of `a` (including diagonal) contains L.
/// The upper triangle is left unchanged.
///
/// Returns an error if a pivot is not strictly positive (or is NaN).
pub fn cholesky_in_place<T: FloatScalar>(a: &mut impl MatrixMut<T>) -> Result<(), LinalgError> {
    let n = a.nrows();
    assert_eq!(n, a.ncols(), "Cholesky decomposition requires a square matrix");

    for j in 0..n {
        // Left-looking update: a[j.., j] -= a[j.., k] * l[j, k]
        for k in 0..j {
            let ljk = *a.get(j, k);
            if ljk == T::zero() {
                continue;
            }
            for i in j..n {
                let lik = *a.get(i, k);
                let v = a.get_mut(i, j);
                *v = *v - lik * ljk;
            }
        }

        let diag = *a.get(j, j);
        if !(diag > T::zero()) {
            return Err(LinalgError::NotPositiveDefinite);
        }
        let ljj = diag.sqrt();
        *a.get_mut(j, j) = ljj;

        let inv_ljj = T::one() / ljj;
        for x in a.col_as_mut_slice(j, j + 1) {
            *x = *x * inv_ljj;
        }
    }

    Ok(())
}

/// Solve L*x = b by forward substitution, where L is lower triangular.
#[inline]
pub fn forward_substitute<T: FloatScalar>(l: &impl MatrixRef<T>, b: &[T], x: &mut [T]) {
    let n = l.nrows();
    for i in 0..n {
        let mut sum = b[i];
        for j in 0..i {
            sum = sum - *l.get(i, j) * x[j];
        }
        x[i] = sum / *l.get(i, i);
    }
}

/// Solve Lᵗ * x = b by back substitution, where L is lower triangular.
#[inline]
pub fn back_substitute_lt<T: FloatScalar>(l: &impl MatrixRef<T>, b: &[T], x: &mut [T]) {
    let n = l.nrows();
    for i in (0..n).rev() {
        let mut sum = b[i];
        for j in (i + 1)..n {
            sum = sum - *l.get(j, i) * x[j];
        }
        x[i] = sum / *l.get(i, i);
    }
}
