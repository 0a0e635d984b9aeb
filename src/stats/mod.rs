//! Factored multivariate normal distributions.
//!
//! Both distributions implement [`MultivariateDistribution`], which derives
//! sampling, log-density and entropy from four primitives: the covariance,
//! the precision, the log-determinant and a reparameterization map from
//! standard-normal noise to a draw.
//!
//! | Distribution | Covariance | Precision | log det |
//! |---|---|---|---|
//! | [`FactorNormal`] | (1/n)·Ψ·diag(w)·Ψᵗ | n·Ψ·diag(1/w)·Ψᵗ | Cholesky, m×m |
//! | [`FactorSumNormal`] | (1/n)·Ψ·diag(w)·Ψᵗ + W·diag(D)·Wᵗ | Woodbury, k×k inner | determinant lemma |
//!
//! # Example
//!
//! ```
//! use factor_normal::stats::{FactorNormal, MultivariateDistribution};
//! use factor_normal::{DynMatrix, DynVector};
//! use rand::SeedableRng;
//!
//! // One coordinate of a two-part composition.
//! let h = std::f64::consts::FRAC_1_SQRT_2;
//! let basis = DynMatrix::from_rows(1, 2, &[h, -h]);
//! let dist = FactorNormal::new(
//!     DynVector::from_slice(&[0.0]),
//!     basis,
//!     vec![2.0, 2.0],
//!     4.0,
//! )
//! .unwrap();
//!
//! // (1/4)·(0.5·2 + 0.5·2) = 0.5
//! assert!((dist.covariance_matrix()[(0, 0)] - 0.5).abs() < 1e-12);
//!
//! let rng = rand::rngs::StdRng::seed_from_u64(7);
//! let draws = dist.rsample(&[3, 2], rng).into_matrix();
//! assert_eq!(draws.shape(), (6, 1));
//! ```

mod factor_normal;
mod factor_sum_normal;
mod low_rank;
mod samples;
mod settings;

#[cfg(test)]
mod tests;

pub use factor_normal::{FactorNormal, Normalizer, Weights};
pub use factor_sum_normal::FactorSumNormal;
pub use low_rank::{determinant_lemma_log_det, woodbury_precision};
pub use samples::Samples;
pub use settings::{FactorSettings, PrecisionMode};

use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

use crate::dynmatrix::{DynMatrix, DynVector};
use crate::error::{check_dim, FactorError};
use crate::linalg::LinalgError;
use crate::traits::{from_count, FloatScalar};

/// Common query surface of the factored Gaussians.
///
/// Implementors supply the covariance algebra and the noise-to-sample map;
/// sampling, log-density and entropy are provided on top of them.
pub trait MultivariateDistribution<T: FloatScalar> {
    /// Dimension m of a draw.
    fn dim(&self) -> usize;

    /// Mean vector.
    fn mean(&self) -> &DynVector<T>;

    /// m×m covariance matrix.
    fn covariance_matrix(&self) -> DynMatrix<T>;

    /// m×m precision (inverse covariance) matrix.
    fn precision_matrix(&self) -> Result<DynMatrix<T>, FactorError>;

    /// Natural log of the covariance determinant.
    fn log_det(&self) -> Result<T, FactorError>;

    /// Length of the standard-normal noise vector consumed per draw.
    fn noise_dim(&self) -> usize;

    /// Map standard-normal noise to a draw: `mean + L·noise` with L·Lᵗ = Σ.
    ///
    /// Deterministic and affine in the parameters, so gradients flow to the
    /// mean and to every factor. Panics if `noise.len() != noise_dim()`.
    fn transform_noise(&self, noise: &[T]) -> DynVector<T>;

    /// Checked form of [`transform_noise`](Self::transform_noise).
    fn reparameterize(&self, noise: &[T]) -> Result<DynVector<T>, FactorError> {
        check_dim("reparameterization noise", self.noise_dim(), noise.len())?;
        Ok(self.transform_noise(noise))
    }

    /// Lazy reparameterized draws.
    ///
    /// The sequence holds `sample_shape.iter().product()` draws of length m
    /// and can be rewound with [`Samples::restart`].
    fn rsample<R>(&self, sample_shape: &[usize], rng: R) -> Samples<'_, Self, T, R>
    where
        Self: Sized,
        R: Rng + Clone,
        StandardNormal: Distribution<T>,
    {
        Samples::new(self, sample_shape, rng)
    }

    /// Log-density of every row of `value` (shape S×m).
    ///
    /// # Errors
    ///
    /// `ShapeMismatch` for a width other than m, anything the precision or
    /// log-determinant raise, and `NumericalInstability` when a quadratic
    /// form is not finite.
    fn log_prob(&self, value: &DynMatrix<T>) -> Result<Vec<T>, FactorError> {
        check_dim("log_prob value width", self.dim(), value.ncols())?;
        let precision = self.precision_matrix()?;
        let log_det = self.log_det()?;
        batch_log_density(self.mean(), &precision, log_det, value)
    }

    /// Log-density of a single point.
    fn log_prob_one(&self, value: &DynVector<T>) -> Result<T, FactorError> {
        check_dim("log_prob value width", self.dim(), value.len())?;
        let row = DynMatrix::from_vec(1, value.len(), value.as_slice().to_vec());
        let lp = self.log_prob(&row)?;
        Ok(lp[0])
    }

    /// Differential entropy 0.5·(m·(1 + ln 2π) + ln det Σ).
    fn entropy(&self) -> Result<T, FactorError> {
        Ok(gaussian_entropy(self.dim(), self.log_det()?))
    }
}

/// ln(2π).
#[inline]
fn ln_two_pi<T: FloatScalar>() -> T {
    (T::PI() + T::PI()).ln()
}

/// −½·(m·ln 2π + ln det Σ + quad).
pub(crate) fn gaussian_log_density<T: FloatScalar>(quad: T, log_det: T, dim: usize) -> T {
    let half = T::one() / (T::one() + T::one());
    -half * (from_count::<T>(dim) * ln_two_pi::<T>() + log_det + quad)
}

/// Gaussian log-density of every row of `value` from a precomputed precision
/// and log-determinant.
pub(crate) fn batch_log_density<T: FloatScalar>(
    loc: &DynVector<T>,
    precision: &DynMatrix<T>,
    log_det: T,
    value: &DynMatrix<T>,
) -> Result<Vec<T>, FactorError> {
    let dim = loc.len();
    (0..value.nrows())
        .map(|r| {
            let diff = DynVector::from_vec((0..dim).map(|j| value[(r, j)] - loc[j]).collect());
            let quad = diff.dot(&(precision * &diff));
            if !quad.is_finite() {
                return Err(FactorError::unstable("log_prob")(LinalgError::NonFinite));
            }
            Ok(gaussian_log_density(quad, log_det, dim))
        })
        .collect()
}

/// ½·(m·(1 + ln 2π) + ln det Σ).
pub(crate) fn gaussian_entropy<T: FloatScalar>(dim: usize, log_det: T) -> T {
    let half = T::one() / (T::one() + T::one());
    half * (from_count::<T>(dim) * (T::one() + ln_two_pi::<T>()) + log_det)
}
