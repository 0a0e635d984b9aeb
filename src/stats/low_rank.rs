//! Low-rank updates of an inverse and a log-determinant.
//!
//! For Σ = A + U·diag(D)·Uᵗ with A m×m, U m×k and k small, both the inverse
//! and the log-determinant of Σ follow from A⁻¹ and the k×k capacitance
//! matrix C = diag(D)⁻¹ + Uᵗ·A⁻¹·U:
//!
//! - Woodbury: Σ⁻¹ = A⁻¹ − A⁻¹U·C⁻¹·UᵗA⁻¹
//! - determinant lemma: ln det Σ = ln det A + ln det C + Σᵢ ln Dᵢ

use crate::dynmatrix::{DynCholesky, DynMatrix};
use crate::error::{check_dim, FactorError};
use crate::traits::FloatScalar;

use super::FactorSettings;

/// A⁻¹U together with the Cholesky factor of the capacitance matrix.
struct Capacitance<T> {
    a_inv_u: DynMatrix<T>,
    chol: DynCholesky<T>,
    /// Pivot ratio exceeded `settings.condition_warn_ratio`.
    ill_conditioned: bool,
}

fn capacitance<T: FloatScalar>(
    a_inv: &DynMatrix<T>,
    u: &DynMatrix<T>,
    d: &[T],
    settings: &FactorSettings,
    context: &'static str,
) -> Result<Capacitance<T>, FactorError> {
    let m = a_inv.nrows();
    check_dim("inverse columns", m, a_inv.ncols())?;
    check_dim("low-rank factor rows", m, u.nrows())?;
    check_dim("low-rank weights length", u.ncols(), d.len())?;
    if d.iter().any(|&x| !(x > T::zero())) {
        return Err(FactorError::DomainViolation("low-rank weights must be positive"));
    }

    let a_inv_u = a_inv * u;
    let mut cap = &u.transpose() * &a_inv_u;
    let k = cap.nrows();
    for (i, &di) in d.iter().enumerate() {
        cap[(i, i)] = cap[(i, i)] + di.recip();
    }
    let two = T::one() + T::one();
    for j in 0..k {
        for i in (j + 1)..k {
            let avg = (cap[(i, j)] + cap[(j, i)]) / two;
            cap[(i, j)] = avg;
            cap[(j, i)] = avg;
        }
    }

    let chol = cap.cholesky().map_err(FactorError::unstable(context))?;
    let ratio = chol.pivot_ratio();
    let ill_conditioned = settings.is_ill_conditioned(ratio);
    if ill_conditioned {
        log::warn!(
            "{}: capacitance matrix pivot ratio {:?} exceeds {:e}",
            context,
            ratio,
            settings.condition_warn_ratio
        );
    }
    Ok(Capacitance {
        a_inv_u,
        chol,
        ill_conditioned,
    })
}

/// Inverse of A + U·diag(D)·Uᵗ from A⁻¹ by the Woodbury identity.
///
/// Only a k×k system is factored. With k = 0 the result equals `a_inv`.
/// A warning is logged when the capacitance pivots exceed
/// `settings.condition_warn_ratio`.
///
/// # Errors
///
/// `ShapeMismatch` for inconsistent dimensions, `DomainViolation` for a
/// non-positive entry of `d` and `NumericalInstability` when the capacitance
/// matrix is not positive definite.
///
/// ```
/// use factor_normal::stats::{woodbury_precision, FactorSettings};
/// use factor_normal::DynMatrix;
///
/// // A = I, U = [1, 1]ᵗ, D = [1]: Σ = [[2, 1], [1, 2]].
/// let a_inv = DynMatrix::<f64>::eye(2);
/// let u = DynMatrix::from_rows(2, 1, &[1.0, 1.0]);
/// let p = woodbury_precision(&a_inv, &u, &[1.0], &FactorSettings::default()).unwrap();
/// assert!((p[(0, 0)] - 2.0 / 3.0).abs() < 1e-12);
/// assert!((p[(0, 1)] + 1.0 / 3.0).abs() < 1e-12);
/// ```
pub fn woodbury_precision<T: FloatScalar>(
    a_inv: &DynMatrix<T>,
    u: &DynMatrix<T>,
    d: &[T],
    settings: &FactorSettings,
) -> Result<DynMatrix<T>, FactorError> {
    if d.is_empty() {
        check_dim("low-rank weights length", u.ncols(), 0)?;
        return Ok(a_inv.clone());
    }
    let Capacitance { a_inv_u, chol, .. } = capacitance(a_inv, u, d, settings, "woodbury precision")?;
    // C⁻¹·(A⁻¹U)ᵗ, k×m
    let correction = chol.solve_matrix(&a_inv_u.transpose());
    let mut out = a_inv - &(&a_inv_u * &correction);
    let m = out.nrows();
    let two = T::one() + T::one();
    for j in 0..m {
        for i in (j + 1)..m {
            let avg = (out[(i, j)] + out[(j, i)]) / two;
            out[(i, j)] = avg;
            out[(j, i)] = avg;
        }
    }
    Ok(out)
}

/// ln det(A + U·diag(D)·Uᵗ) from ln det A and A⁻¹ by the matrix
/// determinant lemma.
///
/// With k = 0 the result equals `base_log_det`.
///
/// # Errors
///
/// As [`woodbury_precision`].
pub fn determinant_lemma_log_det<T: FloatScalar>(
    base_log_det: T,
    a_inv: &DynMatrix<T>,
    u: &DynMatrix<T>,
    d: &[T],
    settings: &FactorSettings,
) -> Result<T, FactorError> {
    if d.is_empty() {
        check_dim("low-rank weights length", u.ncols(), 0)?;
        return Ok(base_log_det);
    }
    let cap = capacitance(a_inv, u, d, settings, "determinant lemma")?;
    let ln_d = d.iter().fold(T::zero(), |acc, &x| acc + x.ln());
    Ok(base_log_det + cap.chol.ln_det() + ln_d)
}
