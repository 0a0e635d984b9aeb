use crate::dynmatrix::{DynMatrix, DynVector};
use crate::error::{check_dim, FactorError};
use crate::traits::FloatScalar;

use super::{
    batch_log_density, determinant_lemma_log_det, woodbury_precision, FactorNormal,
    FactorSettings, MultivariateDistribution, Normalizer, Weights,
};

/// Multivariate normal with covariance
/// Σ = (1/n)·Ψ·diag(w)·Ψᵗ + W·diag(D)·Wᵗ.
///
/// Wraps a [`FactorNormal`] for the diagonal-factor term A and adds an m×k
/// low-rank term. Precision and log-determinant are computed from A's
/// precision with a k×k correction, so they inherit the
/// [`PrecisionMode`](super::PrecisionMode) of the inner distribution. With
/// k = 0 every query returns exactly what the inner distribution returns.
///
/// # Example
///
/// ```
/// use factor_normal::stats::{FactorSumNormal, MultivariateDistribution};
/// use factor_normal::{DynMatrix, DynVector};
///
/// let h = std::f64::consts::FRAC_1_SQRT_2;
/// let basis = DynMatrix::from_rows(2, 2, &[h, h, h, -h]);
/// let w = DynMatrix::from_rows(2, 1, &[1.0, 0.0]);
/// let dist = FactorSumNormal::new(
///     DynVector::zeros(2),
///     basis,
///     vec![1.0, 1.0],
///     w,
///     DynVector::from_slice(&[3.0]),
///     1.0,
/// )
/// .unwrap();
///
/// let cov = dist.covariance_matrix();
/// assert!((cov[(0, 0)] - 4.0).abs() < 1e-12);
/// assert!((dist.log_det().unwrap() - 4.0_f64.ln()).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct FactorSumNormal<T> {
    base: FactorNormal<T>,
    low_rank_factors: DynMatrix<T>,
    low_rank_weights: DynVector<T>,
}

impl<T: FloatScalar> FactorSumNormal<T> {
    /// Build from the diagonal-factor inputs plus W (m×k) and D (length k).
    ///
    /// # Errors
    ///
    /// Everything [`FactorNormal::new`] rejects, and `ShapeMismatch` if
    /// `low_rank_factors` does not have m rows or `low_rank_weights` does not
    /// have k entries.
    pub fn new(
        loc: DynVector<T>,
        basis: impl Into<DynMatrix<T>>,
        weights: impl Into<Weights<T>>,
        low_rank_factors: DynMatrix<T>,
        low_rank_weights: DynVector<T>,
        n: impl Into<Normalizer<T>>,
    ) -> Result<Self, FactorError> {
        Self::with_settings(
            loc,
            basis,
            weights,
            low_rank_factors,
            low_rank_weights,
            n,
            FactorSettings::default(),
        )
    }

    /// As [`new`](Self::new) with explicit settings.
    pub fn with_settings(
        loc: DynVector<T>,
        basis: impl Into<DynMatrix<T>>,
        weights: impl Into<Weights<T>>,
        low_rank_factors: DynMatrix<T>,
        low_rank_weights: DynVector<T>,
        n: impl Into<Normalizer<T>>,
        settings: FactorSettings,
    ) -> Result<Self, FactorError> {
        let base = FactorNormal::with_settings(loc, basis, weights, n, settings)?;
        Self::from_base(base, low_rank_factors, low_rank_weights)
    }

    /// Add a low-rank term to an existing diagonal-factor distribution.
    pub fn from_base(
        base: FactorNormal<T>,
        low_rank_factors: DynMatrix<T>,
        low_rank_weights: DynVector<T>,
    ) -> Result<Self, FactorError> {
        check_dim("low-rank factor rows", base.dim(), low_rank_factors.nrows())?;
        check_dim(
            "low-rank weights length (factor columns)",
            low_rank_factors.ncols(),
            low_rank_weights.len(),
        )?;
        if low_rank_weights.iter().any(|&x| !(x > T::zero())) {
            log::warn!("low-rank weights include a non-positive entry; precision and log_det will fail");
        }
        log::debug!(
            "FactorSumNormal: m = {}, k = {}",
            base.dim(),
            low_rank_factors.ncols()
        );
        Ok(Self {
            base,
            low_rank_factors,
            low_rank_weights,
        })
    }

    /// The diagonal-factor part.
    pub fn base(&self) -> &FactorNormal<T> {
        &self.base
    }

    /// W (m×k).
    pub fn low_rank_factors(&self) -> &DynMatrix<T> {
        &self.low_rank_factors
    }

    /// D (length k).
    pub fn low_rank_weights(&self) -> &DynVector<T> {
        &self.low_rank_weights
    }

    /// Rank k of the low-rank term.
    pub fn rank(&self) -> usize {
        self.low_rank_factors.ncols()
    }

    fn lemma_log_det(&self, base_log_det: T, a_inv: &DynMatrix<T>) -> Result<T, FactorError> {
        determinant_lemma_log_det(
            base_log_det,
            a_inv,
            &self.low_rank_factors,
            self.low_rank_weights.as_slice(),
            self.base.settings(),
        )
    }
}

impl<T: FloatScalar> MultivariateDistribution<T> for FactorSumNormal<T> {
    fn dim(&self) -> usize {
        self.base.dim()
    }

    fn mean(&self) -> &DynVector<T> {
        self.base.mean()
    }

    fn covariance_matrix(&self) -> DynMatrix<T> {
        let mut cov = self.base.covariance_matrix();
        if self.rank() > 0 {
            cov += &self
                .low_rank_factors
                .weighted_gram(self.low_rank_weights.as_slice());
        }
        cov
    }

    fn precision_matrix(&self) -> Result<DynMatrix<T>, FactorError> {
        let a_inv = self.base.precision_matrix()?;
        woodbury_precision(
            &a_inv,
            &self.low_rank_factors,
            self.low_rank_weights.as_slice(),
            self.base.settings(),
        )
    }

    fn log_det(&self) -> Result<T, FactorError> {
        let base = self.base.log_det()?;
        if self.rank() == 0 {
            return Ok(base);
        }
        let a_inv = self.base.precision_matrix()?;
        self.lemma_log_det(base, &a_inv)
    }

    /// Shares one base precision between the Woodbury and determinant-lemma
    /// corrections.
    fn log_prob(&self, value: &DynMatrix<T>) -> Result<Vec<T>, FactorError> {
        check_dim("log_prob value width", self.dim(), value.ncols())?;
        let a_inv = self.base.precision_matrix()?;
        let precision = woodbury_precision(
            &a_inv,
            &self.low_rank_factors,
            self.low_rank_weights.as_slice(),
            self.base.settings(),
        )?;
        let base = self.base.log_det()?;
        let log_det = if self.rank() == 0 {
            base
        } else {
            self.lemma_log_det(base, &a_inv)?
        };
        batch_log_density(self.mean(), &precision, log_det, value)
    }

    fn noise_dim(&self) -> usize {
        self.base.noise_dim() + self.rank()
    }

    /// loc + Ψ·(√s ⊙ ε₁) + W·(√D ⊙ ε₂), with ε = [ε₁, ε₂].
    fn transform_noise(&self, noise: &[T]) -> DynVector<T> {
        assert_eq!(noise.len(), self.noise_dim(), "noise length mismatch");
        let (eps_diag, eps_low) = noise.split_at(self.base.noise_dim());
        let mut x = self.base.transform_noise(eps_diag);
        if self.rank() > 0 {
            let scaled = DynVector::from_vec(
                self.low_rank_weights
                    .iter()
                    .zip(eps_low)
                    .map(|(&d, &e)| d.sqrt() * e)
                    .collect(),
            );
            let low = &self.low_rank_factors * &scaled;
            for (xi, &li) in x.as_mut_slice().iter_mut().zip(low.iter()) {
                *xi = *xi + li;
            }
        }
        x
    }
}
