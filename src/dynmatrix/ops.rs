use core::ops::{Add, AddAssign, Div, Mul, Sub, SubAssign};

use crate::traits::Scalar;

use super::{DynMatrix, DynVector};

// ── Element-wise add / sub ──────────────────────────────────────────

fn zip_with<T: Scalar>(a: &DynMatrix<T>, b: &DynMatrix<T>, op: &str, f: impl Fn(T, T) -> T) -> DynMatrix<T> {
    assert_eq!(
        (a.nrows, a.ncols),
        (b.nrows, b.ncols),
        "dimension mismatch: {}x{} {} {}x{}",
        a.nrows,
        a.ncols,
        op,
        b.nrows,
        b.ncols,
    );
    DynMatrix {
        data: a.data.iter().zip(&b.data).map(|(&x, &y)| f(x, y)).collect(),
        nrows: a.nrows,
        ncols: a.ncols,
    }
}

impl<T: Scalar> Add<&DynMatrix<T>> for &DynMatrix<T> {
    type Output = DynMatrix<T>;

    fn add(self, rhs: &DynMatrix<T>) -> DynMatrix<T> {
        zip_with(self, rhs, "+", |x, y| x + y)
    }
}

impl<T: Scalar> Add for DynMatrix<T> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        &self + &rhs
    }
}

impl<T: Scalar> Sub<&DynMatrix<T>> for &DynMatrix<T> {
    type Output = DynMatrix<T>;

    fn sub(self, rhs: &DynMatrix<T>) -> DynMatrix<T> {
        zip_with(self, rhs, "-", |x, y| x - y)
    }
}

impl<T: Scalar> Sub for DynMatrix<T> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        &self - &rhs
    }
}

impl<T: Scalar> AddAssign<&DynMatrix<T>> for DynMatrix<T> {
    fn add_assign(&mut self, rhs: &DynMatrix<T>) {
        assert_eq!(self.shape(), rhs.shape(), "dimension mismatch in +=");
        for (x, &y) in self.data.iter_mut().zip(&rhs.data) {
            *x = *x + y;
        }
    }
}

impl<T: Scalar> SubAssign<&DynMatrix<T>> for DynMatrix<T> {
    fn sub_assign(&mut self, rhs: &DynMatrix<T>) {
        assert_eq!(self.shape(), rhs.shape(), "dimension mismatch in -=");
        for (x, &y) in self.data.iter_mut().zip(&rhs.data) {
            *x = *x - y;
        }
    }
}

// ── Matrix multiplication: (M×N) * (N×P) → (M×P) ──────────────────

impl<T: Scalar> Mul<&DynMatrix<T>> for &DynMatrix<T> {
    type Output = DynMatrix<T>;

    fn mul(self, rhs: &DynMatrix<T>) -> DynMatrix<T> {
        assert_eq!(
            self.ncols, rhs.nrows,
            "dimension mismatch: {}x{} * {}x{}",
            self.nrows, self.ncols, rhs.nrows, rhs.ncols,
        );
        let m = self.nrows;
        let n = self.ncols;
        let p = rhs.ncols;
        let mut data = vec![T::zero(); m * p];
        // Column-major: out[:, j] += a[:, k] * b[k, j]
        for j in 0..p {
            let out_col = &mut data[j * m..(j + 1) * m];
            for k in 0..n {
                let b_kj = rhs.data[j * n + k];
                if b_kj == T::zero() {
                    continue;
                }
                let a_col = &self.data[k * m..(k + 1) * m];
                for (o, &a) in out_col.iter_mut().zip(a_col) {
                    *o = *o + a * b_kj;
                }
            }
        }
        DynMatrix {
            data,
            nrows: m,
            ncols: p,
        }
    }
}

impl<T: Scalar> Mul for DynMatrix<T> {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        &self * &rhs
    }
}

// ── Matrix-vector: (M×N) * N → M ───────────────────────────────────

impl<T: Scalar> Mul<&DynVector<T>> for &DynMatrix<T> {
    type Output = DynVector<T>;

    fn mul(self, rhs: &DynVector<T>) -> DynVector<T> {
        assert_eq!(
            self.ncols,
            rhs.len(),
            "dimension mismatch: {}x{} * {}",
            self.nrows,
            self.ncols,
            rhs.len(),
        );
        let m = self.nrows;
        let mut out = vec![T::zero(); m];
        for (k, &x) in rhs.iter().enumerate() {
            if x == T::zero() {
                continue;
            }
            let a_col = &self.data[k * m..(k + 1) * m];
            for (o, &a) in out.iter_mut().zip(a_col) {
                *o = *o + a * x;
            }
        }
        DynVector::from_vec(out)
    }
}

// ── Scalar multiplication / division ────────────────────────────────

impl<T: Scalar> Mul<T> for &DynMatrix<T> {
    type Output = DynMatrix<T>;

    fn mul(self, rhs: T) -> DynMatrix<T> {
        DynMatrix {
            data: self.data.iter().map(|&x| x * rhs).collect(),
            nrows: self.nrows,
            ncols: self.ncols,
        }
    }
}

impl<T: Scalar> Mul<T> for DynMatrix<T> {
    type Output = Self;

    fn mul(mut self, rhs: T) -> Self {
        for x in self.data.iter_mut() {
            *x = *x * rhs;
        }
        self
    }
}

impl<T: Scalar> Div<T> for DynMatrix<T> {
    type Output = Self;

    fn div(mut self, rhs: T) -> Self {
        for x in self.data.iter_mut() {
            *x = *x / rhs;
        }
        self
    }
}
