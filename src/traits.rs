use core::fmt::Debug;
use num_traits::{Float, FloatConst, FromPrimitive, Num, One, Zero};

/// Trait for types that can be used as matrix elements.
///
/// Blanket-implemented for all types satisfying the bounds.
pub trait Scalar: Copy + PartialEq + Debug + Zero + One + Num {}

impl<T: Copy + PartialEq + Debug + Zero + One + Num> Scalar for T {}

/// Trait for the real floating-point elements the distributions are built on.
///
/// Covers `f32` and `f64`. Required by everything that needs `sqrt`, `ln`,
/// ordered comparisons or the constant π (decompositions, densities, entropy).
pub trait FloatScalar:
    Scalar + Float + FloatConst + FromPrimitive + core::iter::Sum + Send + Sync + 'static
{
}

impl<T> FloatScalar for T where
    T: Scalar + Float + FloatConst + FromPrimitive + core::iter::Sum + Send + Sync + 'static
{
}

/// Convert a dimension or count into a float element.
#[inline]
pub(crate) fn from_count<T: FloatScalar>(n: usize) -> T {
    T::from_usize(n).unwrap_or_else(T::infinity)
}

/// Read-only access to a matrix-like type.
///
/// Decomposition free functions take `&impl MatrixRef<T>` so they work on
/// any column-major storage.
pub trait MatrixRef<T> {
    fn nrows(&self) -> usize;
    fn ncols(&self) -> usize;
    fn get(&self, row: usize, col: usize) -> &T;

    /// Contiguous slice of column `col` starting at `row_start`.
    fn col_as_slice(&self, col: usize, row_start: usize) -> &[T];
}

/// Mutable access to a matrix-like type.
///
/// Extends `MatrixRef` with mutable element access, enabling
/// in-place algorithms (Cholesky, LU) to work generically.
pub trait MatrixMut<T>: MatrixRef<T> {
    fn get_mut(&mut self, row: usize, col: usize) -> &mut T;

    /// Mutable contiguous slice of column `col` starting at `row_start`.
    fn col_as_mut_slice(&mut self, col: usize, row_start: usize) -> &mut [T];
}
