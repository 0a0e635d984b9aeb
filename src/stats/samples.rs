use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

use crate::dynmatrix::{DynMatrix, DynVector};
use crate::traits::FloatScalar;

use super::MultivariateDistribution;

/// Lazy, finite, restartable sequence of reparameterized draws.
///
/// Created by [`MultivariateDistribution::rsample`]. Each step draws
/// `noise_dim()` standard-normal values from the generator and maps them
/// through [`MultivariateDistribution::transform_noise`]. The generator state
/// at creation is kept so [`restart`](Self::restart) replays the same draws.
pub struct Samples<'a, D, T, R> {
    dist: &'a D,
    rng: R,
    start: R,
    sample_shape: Vec<usize>,
    total: usize,
    remaining: usize,
    noise: Vec<T>,
}

impl<'a, D, T, R> Samples<'a, D, T, R>
where
    D: MultivariateDistribution<T>,
    T: FloatScalar,
    R: Rng + Clone,
    StandardNormal: Distribution<T>,
{
    pub(crate) fn new(dist: &'a D, sample_shape: &[usize], rng: R) -> Self {
        let total = sample_shape.iter().product();
        Self {
            dist,
            start: rng.clone(),
            rng,
            sample_shape: sample_shape.to_vec(),
            total,
            remaining: total,
            noise: vec![T::zero(); dist.noise_dim()],
        }
    }

    /// Requested leading shape; each draw adds a trailing axis of length m.
    pub fn sample_shape(&self) -> &[usize] {
        &self.sample_shape
    }

    /// Full output shape `sample_shape + [m]`.
    pub fn output_shape(&self) -> Vec<usize> {
        let mut shape = self.sample_shape.clone();
        shape.push(self.dist.dim());
        shape
    }

    /// Rewind to the first draw.
    pub fn restart(&mut self) {
        self.rng = self.start.clone();
        self.remaining = self.total;
    }

    /// Collect the remaining draws as the rows of a matrix.
    ///
    /// Leading sample axes are flattened in row-major order.
    pub fn into_matrix(self) -> DynMatrix<T> {
        let m = self.dist.dim();
        let rows = self.remaining;
        let mut out = DynMatrix::zeros(rows, m);
        for (r, draw) in self.enumerate() {
            for (j, &v) in draw.iter().enumerate() {
                out[(r, j)] = v;
            }
        }
        out
    }
}

impl<'a, D, T, R> Iterator for Samples<'a, D, T, R>
where
    D: MultivariateDistribution<T>,
    T: FloatScalar,
    R: Rng + Clone,
    StandardNormal: Distribution<T>,
{
    type Item = DynVector<T>;

    fn next(&mut self) -> Option<DynVector<T>> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        for e in self.noise.iter_mut() {
            *e = self.rng.sample(StandardNormal);
        }
        Some(self.dist.transform_noise(&self.noise))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, D, T, R> ExactSizeIterator for Samples<'a, D, T, R>
where
    D: MultivariateDistribution<T>,
    T: FloatScalar,
    R: Rng + Clone,
    StandardNormal: Distribution<T>,
{
}

impl<'a, D, T: Clone, R: Clone> Clone for Samples<'a, D, T, R> {
    fn clone(&self) -> Self {
        Self {
            dist: self.dist,
            rng: self.rng.clone(),
            start: self.start.clone(),
            sample_shape: self.sample_shape.clone(),
            total: self.total,
            remaining: self.remaining,
            noise: self.noise.clone(),
        }
    }
}
