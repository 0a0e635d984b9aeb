use crate::dynmatrix::{DynCholesky, DynMatrix, DynVector};
use crate::error::{check_dim, FactorError};
use crate::traits::{from_count, FloatScalar};

use super::{FactorSettings, MultivariateDistribution, PrecisionMode};

/// Diagonal weights w, one vector or one vector per observation.
///
/// Weights are inverse scales: pass `1 / p` for a probability vector p.
#[derive(Debug, Clone, PartialEq)]
pub enum Weights<T> {
    /// A single length-d vector.
    Single(DynVector<T>),
    /// N×d, one row of weights per observation.
    Batch(DynMatrix<T>),
}

impl<T> From<DynVector<T>> for Weights<T> {
    fn from(w: DynVector<T>) -> Self {
        Weights::Single(w)
    }
}

impl<T: FloatScalar> From<Vec<T>> for Weights<T> {
    fn from(w: Vec<T>) -> Self {
        Weights::Single(DynVector::from_vec(w))
    }
}

impl<T> From<DynMatrix<T>> for Weights<T> {
    fn from(w: DynMatrix<T>) -> Self {
        Weights::Batch(w)
    }
}

/// The count normalizer n dividing the diagonal term.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalizer<T> {
    /// Shared by every weight row.
    Scalar(T),
    /// One normalizer per row of [`Weights::Batch`].
    PerRow(Vec<T>),
}

impl From<f64> for Normalizer<f64> {
    fn from(n: f64) -> Self {
        Normalizer::Scalar(n)
    }
}

impl From<f32> for Normalizer<f32> {
    fn from(n: f32) -> Self {
        Normalizer::Scalar(n)
    }
}

impl<T> From<Vec<T>> for Normalizer<T> {
    fn from(n: Vec<T>) -> Self {
        Normalizer::PerRow(n)
    }
}

/// Multivariate normal with covariance Σ = (1/n)·Ψ·diag(w)·Ψᵗ.
///
/// Ψ is an m×d basis with orthonormal rows (ΨΨᵗ = I). Orthonormality is a
/// caller precondition; only shapes are checked. Weights must be strictly
/// positive: a weight at or near zero makes the corresponding precision
/// entries unbounded. That case is logged at construction and never
/// clamped; the approximate precision refuses it with a `DomainViolation`.
///
/// Batched weights are reduced to one effective diagonal
/// s = (1/N)·Σᵣ wᵣ / nᵣ, so every query still describes a single m×m
/// Gaussian. A one-row batch is identical to the single-vector case.
///
/// # Example
///
/// ```
/// use factor_normal::stats::{FactorNormal, MultivariateDistribution};
/// use factor_normal::{DynMatrix, DynVector};
///
/// // Square orthonormal basis: the factored precision is exact.
/// let h = std::f64::consts::FRAC_1_SQRT_2;
/// let basis = DynMatrix::from_rows(2, 2, &[h, h, h, -h]);
/// let dist = FactorNormal::new(DynVector::zeros(2), basis, vec![1.0, 4.0], 2.0).unwrap();
///
/// let cov = dist.covariance_matrix();
/// let prec = dist.precision_matrix().unwrap();
/// let id = &cov * &prec;
/// assert!((id[(0, 0)] - 1.0).abs() < 1e-12);
/// assert!(id[(0, 1)].abs() < 1e-12);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct FactorNormal<T> {
    loc: DynVector<T>,
    basis: DynMatrix<T>,
    /// Effective diagonal w / n, length d.
    scale: DynVector<T>,
    settings: FactorSettings,
}

impl<T: FloatScalar> FactorNormal<T> {
    /// Build from a mean, basis, weights and normalizer with default settings.
    ///
    /// # Errors
    ///
    /// - `ShapeMismatch` if `loc.len() != basis.nrows()`, the basis has more
    ///   rows than columns, the weight length differs from `basis.ncols()`,
    ///   or a per-row normalizer does not match the number of weight rows.
    /// - `DomainViolation` for an empty basis or weight batch, or a
    ///   normalizer that is not positive and finite.
    pub fn new(
        loc: DynVector<T>,
        basis: impl Into<DynMatrix<T>>,
        weights: impl Into<Weights<T>>,
        n: impl Into<Normalizer<T>>,
    ) -> Result<Self, FactorError> {
        Self::with_settings(loc, basis, weights, n, FactorSettings::default())
    }

    /// As [`new`](Self::new) with explicit settings.
    pub fn with_settings(
        loc: DynVector<T>,
        basis: impl Into<DynMatrix<T>>,
        weights: impl Into<Weights<T>>,
        n: impl Into<Normalizer<T>>,
        settings: FactorSettings,
    ) -> Result<Self, FactorError> {
        let basis = basis.into();
        let (m, d) = basis.shape();
        if m == 0 || d == 0 {
            return Err(FactorError::DomainViolation("basis must be non-empty"));
        }
        check_dim("loc length (basis rows)", m, loc.len())?;
        if m > d {
            return Err(FactorError::shape("basis columns (at least rows)", m, d));
        }

        let scale = effective_scale(&weights.into(), &n.into(), d)?;
        warn_on_weights(&scale, &settings);
        log::debug!(
            "FactorNormal: m = {}, d = {}, precision = {:?}",
            m,
            d,
            settings.precision_mode
        );

        Ok(Self {
            loc,
            basis,
            scale,
            settings,
        })
    }

    /// Basis Ψ (m×d).
    pub fn basis(&self) -> &DynMatrix<T> {
        &self.basis
    }

    /// Effective diagonal w / n (length d) after normalizer broadcasting and
    /// batch averaging.
    pub fn diag_scale(&self) -> &DynVector<T> {
        &self.scale
    }

    /// Settings in effect.
    pub fn settings(&self) -> &FactorSettings {
        &self.settings
    }

    /// n·Ψ·diag(1/w)·Ψᵗ regardless of the configured mode.
    ///
    /// # Errors
    ///
    /// `DomainViolation` if an effective weight is zero, negative or not
    /// finite: its reciprocal would poison the product with infinities and
    /// NaNs.
    pub fn approximate_precision(&self) -> Result<DynMatrix<T>, FactorError> {
        if self.scale.iter().any(|&s| !(s > T::zero() && s.is_finite())) {
            return Err(FactorError::DomainViolation(
                "approximate precision needs positive finite weights",
            ));
        }
        let inv_scale: Vec<T> = self.scale.iter().map(|&s| s.recip()).collect();
        Ok(self.basis.weighted_gram(&inv_scale))
    }

    /// Cholesky factor of the covariance, checked for conditioning.
    pub(crate) fn covariance_cholesky(&self, context: &'static str) -> Result<DynCholesky<T>, FactorError> {
        let chol = self
            .covariance_matrix()
            .cholesky()
            .map_err(FactorError::unstable(context))?;
        let ratio = chol.pivot_ratio();
        if self.settings.is_ill_conditioned(ratio) {
            log::warn!(
                "{}: covariance pivot ratio {:?} exceeds {:e}; results may be inaccurate",
                context,
                ratio,
                self.settings.condition_warn_ratio
            );
        }
        Ok(chol)
    }

    /// Ψ·(√s ⊙ eps) for the first d noise entries.
    pub(crate) fn diagonal_part(&self, eps: &[T]) -> DynVector<T> {
        let scaled = DynVector::from_vec(
            self.scale
                .iter()
                .zip(eps)
                .map(|(&s, &e)| s.sqrt() * e)
                .collect(),
        );
        &self.basis * &scaled
    }
}

impl<T: FloatScalar> MultivariateDistribution<T> for FactorNormal<T> {
    fn dim(&self) -> usize {
        self.basis.nrows()
    }

    fn mean(&self) -> &DynVector<T> {
        &self.loc
    }

    /// Σ = Ψ·diag(w/n)·Ψᵗ in O(m²d).
    fn covariance_matrix(&self) -> DynMatrix<T> {
        self.basis.weighted_gram(self.scale.as_slice())
    }

    fn precision_matrix(&self) -> Result<DynMatrix<T>, FactorError> {
        match self.settings.precision_mode {
            PrecisionMode::Approximate => self.approximate_precision(),
            PrecisionMode::Dense => Ok(self.covariance_cholesky("precision_matrix")?.inverse()),
        }
    }

    fn log_det(&self) -> Result<T, FactorError> {
        Ok(self.covariance_cholesky("log_det")?.ln_det())
    }

    fn noise_dim(&self) -> usize {
        self.basis.ncols()
    }

    fn transform_noise(&self, noise: &[T]) -> DynVector<T> {
        assert_eq!(noise.len(), self.noise_dim(), "noise length mismatch");
        let mut x = self.diagonal_part(noise);
        for (xi, &li) in x.as_mut_slice().iter_mut().zip(self.loc.iter()) {
            *xi = *xi + li;
        }
        x
    }
}

/// Divide weights by their normalizer and average batch rows.
fn effective_scale<T: FloatScalar>(
    weights: &Weights<T>,
    n: &Normalizer<T>,
    d: usize,
) -> Result<DynVector<T>, FactorError> {
    let rows = match weights {
        Weights::Single(w) => {
            check_dim("weights length (basis columns)", d, w.len())?;
            1
        }
        Weights::Batch(w) => {
            check_dim("weights columns (basis columns)", d, w.ncols())?;
            if w.nrows() == 0 {
                return Err(FactorError::DomainViolation("weight batch must be non-empty"));
            }
            w.nrows()
        }
    };

    let norms: Vec<T> = match n {
        Normalizer::Scalar(n) => vec![*n; rows],
        Normalizer::PerRow(ns) => {
            check_dim("per-row normalizer length", rows, ns.len())?;
            ns.clone()
        }
    };
    if norms.iter().any(|&n| !(n > T::zero() && n.is_finite())) {
        return Err(FactorError::DomainViolation("normalizer must be positive and finite"));
    }

    let scale = match weights {
        Weights::Single(w) => w.map(|x| x / norms[0]),
        Weights::Batch(w) => {
            let inv_rows = from_count::<T>(rows).recip();
            DynVector::from_vec(
                (0..d)
                    .map(|j| {
                        let sum = norms
                            .iter()
                            .enumerate()
                            .fold(T::zero(), |acc, (r, &nr)| acc + w[(r, j)] / nr);
                        sum * inv_rows
                    })
                    .collect(),
            )
        }
    };
    Ok(scale)
}

fn warn_on_weights<T: FloatScalar>(scale: &DynVector<T>, settings: &FactorSettings) {
    let (lo, hi) = scale
        .iter()
        .fold((T::infinity(), T::neg_infinity()), |(lo, hi), &s| (lo.min(s), hi.max(s)));
    if !(lo > T::zero()) {
        log::warn!(
            "diagonal weights include a non-positive or NaN entry (min = {:?}); covariance is not positive definite",
            lo
        );
    } else if settings.is_ill_conditioned(hi / lo) {
        log::warn!(
            "diagonal weight ratio {:?} exceeds {:e}; precision entries may be unbounded",
            hi / lo,
            settings.condition_warn_ratio
        );
    }
}
