//! Dense decompositions used by the factored distributions.
//!
//! Free functions operate in place on `&mut impl MatrixMut<T>`; the
//! [`DynCholesky`](crate::DynCholesky) and [`DynLu`](crate::DynLu) wrappers
//! offer the higher-level API (`solve`, `inverse`, `det`, `ln_det`).

pub(crate) mod cholesky;
pub(crate) mod lu;

pub use cholesky::{back_substitute_lt, cholesky_in_place, forward_substitute};
pub use lu::{lu_in_place, lu_solve};

use thiserror::Error;

/// Errors from linear algebra operations.
///
/// ```
/// use factor_normal::DynMatrix;
/// use factor_normal::linalg::LinalgError;
///
/// let singular = DynMatrix::from_rows(2, 2, &[1.0_f64, 2.0, 2.0, 4.0]);
/// assert_eq!(singular.lu().unwrap_err(), LinalgError::Singular);
///
/// let not_pd = DynMatrix::from_rows(2, 2, &[1.0_f64, 5.0, 5.0, 1.0]);
/// assert_eq!(not_pd.cholesky().unwrap_err(), LinalgError::NotPositiveDefinite);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LinalgError {
    /// Matrix is singular or nearly singular.
    #[error("matrix is singular")]
    Singular,
    /// Matrix is not positive definite (required for Cholesky).
    #[error("matrix is not positive definite")]
    NotPositiveDefinite,
    /// An entry or a derived quantity is NaN or infinite.
    #[error("non-finite value")]
    NonFinite,
}
