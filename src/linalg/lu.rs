use crate::linalg::LinalgError;
use crate::traits::{FloatScalar, MatrixMut, MatrixRef};

/// Perform LU decomposition with partial pivoting, in place.
///
/// On return, `a` contains both L and U packed together:
/// - Upper triangle (including diagonal): U
/// - Lower triangle (excluding diagonal): L (diagonal of L is implicitly 1)
///
/// `perm` is filled with the row permutation indices.
/// Returns `true` if the number of row swaps was even.
pub fn lu_in_place<T: FloatScalar>(
    a: &mut impl MatrixMut<T>,
    perm: &mut [usize],
) -> Result<bool, LinalgError> {
    let n = a.nrows();
    assert_eq!(n, a.ncols(), "LU decomposition requires a square matrix");
    assert_eq!(n, perm.len(), "permutation slice length must match matrix size");

    for (i, p) in perm.iter_mut().enumerate() {
        *p = i;
    }

    let mut even = true;

    for col in 0..n {
        let mut max_row = col;
        let mut max_val = a.get(col, col).abs();
        for row in (col + 1)..n {
            let val = a.get(row, col).abs();
            if val > max_val {
                max_val = val;
                max_row = row;
            }
        }

        if !(max_val >= T::epsilon()) {
            return Err(LinalgError::Singular);
        }

        if max_row != col {
            perm.swap(col, max_row);
            for j in 0..n {
                let tmp = *a.get(col, j);
                *a.get_mut(col, j) = *a.get(max_row, j);
                *a.get_mut(max_row, j) = tmp;
            }
            even = !even;
        }

        let inv_pivot = T::one() / *a.get(col, col);
        for x in a.col_as_mut_slice(col, col + 1) {
            *x = *x * inv_pivot;
        }

        // Rank-1 update of the trailing block, one contiguous column at a time.
        for j in (col + 1)..n {
            let a_col_j = *a.get(col, j);
            if a_col_j == T::zero() {
                continue;
            }
            for i in (col + 1)..n {
                let l_ic = *a.get(i, col);
                let v = a.get_mut(i, j);
                *v = *v - l_ic * a_col_j;
            }
        }
    }

    Ok(even)
}

/// Solve Ax = b given the packed LU decomposition and permutation.
///
/// `b` (input) and `x` (output) are separate slices of length n.
pub fn lu_solve<T: FloatScalar>(lu: &impl MatrixRef<T>, perm: &[usize], b: &[T], x: &mut [T]) {
    let n = lu.nrows();

    // Ly = Pb
    for i in 0..n {
        let mut sum = b[perm[i]];
        for j in 0..i {
            sum = sum - *lu.get(i, j) * x[j];
        }
        x[i] = sum;
    }

    // Ux = y
    for i in (0..n).rev() {
        let mut sum = x[i];
        for j in (i + 1)..n {
            sum = sum - *lu.get(i, j) * x[j];
        }
        x[i] = sum / *lu.get(i, i);
    }
}
