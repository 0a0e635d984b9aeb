use core::ops::{Index, IndexMut};

use crate::traits::Scalar;

/// Dynamically-sized vector.
///
/// Used for means, diagonal weights and single draws. Provides single-index
/// access `v[i]`.
///
/// # Examples
///
/// ```
/// use factor_normal::DynVector;
///
/// let v = DynVector::from_slice(&[1.0_f64, 2.0, 3.0]);
/// assert_eq!(v[0], 1.0);
/// assert_eq!(v.len(), 3);
/// assert!((v.dot(&v) - 14.0).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DynVector<T> {
    data: Vec<T>,
}

impl<T: Scalar> DynVector<T> {
    /// Create a vector from a flat slice.
    pub fn from_slice(data: &[T]) -> Self {
        Self {
            data: data.to_vec(),
        }
    }

    /// Create a vector from an owned `Vec`.
    pub fn from_vec(data: Vec<T>) -> Self {
        Self { data }
    }

    /// Create a zero vector of length `n`.
    pub fn zeros(n: usize) -> Self {
        Self {
            data: vec![T::zero(); n],
        }
    }

    /// Create a vector filled with a value.
    ///
    /// ```
    /// use factor_normal::DynVector;
    /// let v = DynVector::fill(3, 1.0_f64);
    /// assert_eq!(v.as_slice(), &[1.0, 1.0, 1.0]);
    /// ```
    pub fn fill(n: usize, value: T) -> Self {
        Self {
            data: vec![value; n],
        }
    }

    /// Number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the vector is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Dot product.
    ///
    /// Panics on a length mismatch.
    pub fn dot(&self, rhs: &Self) -> T {
        assert_eq!(self.len(), rhs.len(), "vector length mismatch");
        self.data
            .iter()
            .zip(&rhs.data)
            .fold(T::zero(), |acc, (&a, &b)| acc + a * b)
    }

    /// Apply `f` element-wise.
    pub fn map(&self, f: impl Fn(T) -> T) -> Self {
        Self {
            data: self.data.iter().map(|&x| f(x)).collect(),
        }
    }

    /// View the vector data as a slice.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// View the vector data as a mutable slice.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Iterate over the elements.
    pub fn iter(&self) -> core::slice::Iter<'_, T> {
        self.data.iter()
    }
}

impl<T: Scalar> From<Vec<T>> for DynVector<T> {
    fn from(data: Vec<T>) -> Self {
        Self::from_vec(data)
    }
}

impl<T: Scalar> From<&[T]> for DynVector<T> {
    fn from(data: &[T]) -> Self {
        Self::from_slice(data)
    }
}

// ── Index ───────────────────────────────────────────────────────────

impl<T> Index<usize> for DynVector<T> {
    type Output = T;

    #[inline]
    fn index(&self, i: usize) -> &T {
        &self.data[i]
    }
}

impl<T> IndexMut<usize> for DynVector<T> {
    #[inline]
    fn index_mut(&mut self, i: usize) -> &mut T {
        &mut self.data[i]
    }
}
