/// How [`precision_matrix`](super::MultivariateDistribution::precision_matrix)
/// inverts the diagonal-factor term (1/n)·Ψ·diag(w)·Ψᵗ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrecisionMode {
    /// n·Ψ·diag(1/w)·Ψᵗ in O(m²d).
    ///
    /// Exact when ΨᵗΨ = I (square basis). When Ψ has d − m extra columns
    /// spanning a known null direction (the m = d − 1 compositional case) the
    /// error is a rank-(d − m) term whose entries shrink roughly like n/d², so
    /// it is only appropriate for large d.
    #[default]
    Approximate,
    /// Cholesky inverse of the m×m covariance. Exact, O(m³).
    Dense,
}

/// Tunables shared by [`FactorNormal`](super::FactorNormal) and
/// [`FactorSumNormal`](super::FactorSumNormal).
///
/// ```
/// use factor_normal::stats::{FactorSettings, PrecisionMode};
///
/// let s = FactorSettings::default().with_precision_mode(PrecisionMode::Dense);
/// assert_eq!(s.precision_mode, PrecisionMode::Dense);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FactorSettings {
    /// Inversion strategy for the diagonal-factor precision.
    pub precision_mode: PrecisionMode,
    /// Largest-to-smallest ratio of effective diagonal weights (and of
    /// squared Cholesky pivots) above which a warning is logged.
    pub condition_warn_ratio: f64,
}

impl Default for FactorSettings {
    fn default() -> Self {
        Self {
            precision_mode: PrecisionMode::Approximate,
            condition_warn_ratio: 1e10,
        }
    }
}

impl FactorSettings {
    /// Set the precision inversion strategy.
    pub fn with_precision_mode(mut self, mode: PrecisionMode) -> Self {
        self.precision_mode = mode;
        self
    }

    /// Set the conditioning threshold for warnings.
    pub fn with_condition_warn_ratio(mut self, ratio: f64) -> Self {
        self.condition_warn_ratio = ratio;
        self
    }

    /// Whether `ratio` exceeds the warning threshold. NaN counts as exceeding.
    pub(crate) fn is_ill_conditioned<T: num_traits::ToPrimitive>(&self, ratio: T) -> bool {
        ratio
            .to_f64()
            .map_or(true, |r| !(r <= self.condition_warn_ratio))
    }
}
