//! # factor-normal
//!
//! Multivariate normal distributions whose covariance is held in factored
//! form, for variational models over compositional (simplex) data.
//!
//! The covariance is an orthonormal basis scaled by a diagonal,
//! Σ = (1/n)·Ψ·diag(w)·Ψᵗ, optionally plus a low-rank term W·diag(D)·Wᵗ.
//! Precision, log-determinant, reparameterized sampling, log-density and
//! entropy are computed from the factors without a general m×m inverse.
//!
//! ## Quick start
//!
//! ```
//! use factor_normal::{DynMatrix, DynVector, FactorSumNormal, MultivariateDistribution};
//! use rand::SeedableRng;
//!
//! // ILR basis of the 3-part simplex.
//! let a = 1.0 / 2.0_f64.sqrt();
//! let b = 1.0 / 6.0_f64.sqrt();
//! let psi = DynMatrix::from_rows(2, 3, &[a, -a, 0.0, b, b, -2.0 * b]);
//!
//! let dist = FactorSumNormal::new(
//!     DynVector::zeros(2),
//!     psi,
//!     vec![3.0, 3.0, 3.0],
//!     DynMatrix::from_rows(2, 1, &[0.5, 0.5]),
//!     DynVector::from_slice(&[1.0]),
//!     10.0,
//! )
//! .unwrap();
//!
//! assert_eq!(dist.covariance_matrix().shape(), (2, 2));
//! let draws = dist.rsample(&[100], rand::rngs::StdRng::seed_from_u64(0)).into_matrix();
//! let lp = dist.log_prob(&draws).unwrap();
//! assert_eq!(lp.len(), 100);
//! ```
//!
//! ## Modules
//!
//! - [`stats`] — [`FactorNormal`] and [`FactorSumNormal`], the shared
//!   [`MultivariateDistribution`] trait, the lazy [`stats::Samples`]
//!   iterator and [`stats::FactorSettings`].
//!
//! - [`dynmatrix`] — Heap-allocated column-major `DynMatrix<T>` with runtime
//!   dimensions and the [`DynVector<T>`] newtype. Includes the [`DynLu`] and
//!   [`DynCholesky`] wrapper structs.
//!
//! - [`linalg`] — LU (partial pivoting) and Cholesky decompositions as
//!   in-place free functions on `&mut impl MatrixMut<T>`.
//!
//! - [`sparse`] — Coordinate-format basis input.
//!
//! - [`error`] — [`FactorError`].
//!
//! - [`traits`] — Element trait hierarchy:
//!   - [`Scalar`] — all matrix elements (`Copy + PartialEq + Debug + Zero + One + Num`)
//!   - [`FloatScalar`] — real floats, used by decompositions and distributions
//!   - [`MatrixRef`] / [`MatrixMut`] — generic read/write access for algorithms
//!
//! ## Logging
//!
//! Construction is reported at `debug` level and ill-conditioned inputs at
//! `warn` level through the [`log`] facade. No logger is installed.
//!
//! ## Cargo features
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `std`   | yes     | Hardware FPU via system libm |
//! | `libm`  | no      | Pure-Rust software float fallback |

#[cfg(not(any(feature = "std", feature = "libm")))]
compile_error!("enable either the `std` or the `libm` feature for float math");

pub mod dynmatrix;
pub mod error;
pub mod linalg;
pub mod sparse;
pub mod stats;
pub mod traits;

pub use dynmatrix::{DynCholesky, DynLu, DynMatrix, DynVector};
pub use error::FactorError;
pub use stats::{FactorNormal, FactorSumNormal, MultivariateDistribution};
pub use traits::{FloatScalar, MatrixMut, MatrixRef, Scalar};
