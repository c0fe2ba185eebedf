//! Symmetric banded matrices and their Cholesky factorization
//!
//! Only the diagonal and the `bandwidth` sub-diagonals are stored, row by
//! row, so an `n × n` system with half-bandwidth `p` costs `O(n·p)` memory and
//! `O(n·p²)` time to factor.

use crate::error::{PhotoError, Result};

/// Symmetric matrix with non-zeros only within `bandwidth` of the diagonal.
///
/// Storage is lower-triangular: entry `(i, i - k)` lives at
/// `data[i * (bandwidth + 1) + k]` for `k <= min(i, bandwidth)`.
#[derive(Debug, Clone, PartialEq)]
pub struct SymmetricBanded {
    n: usize,
    bandwidth: usize,
    data: Vec<f64>,
}

impl SymmetricBanded {
    pub fn zeros(n: usize, bandwidth: usize) -> Self {
        Self {
            n,
            bandwidth,
            data: vec![0.0; n * (bandwidth + 1)],
        }
    }

    #[inline]
    fn index(&self, i: usize, j: usize) -> Option<usize> {
        let (row, col) = if i >= j { (i, j) } else { (j, i) };
        let k = row - col;
        if row >= self.n || k > self.bandwidth {
            None
        } else {
            Some(row * (self.bandwidth + 1) + k)
        }
    }

    /// Entry `(i, j)`; zero outside the band.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.index(i, j).map(|idx| self.data[idx]).unwrap_or(0.0)
    }

    /// Add `value` to entry `(i, j)` (and, by symmetry, `(j, i)`).
    /// Entries outside the band are ignored.
    pub fn add(&mut self, i: usize, j: usize, value: f64) {
        debug_assert!(self.index(i, j).is_some(), "({}, {}) outside band", i, j);
        if let Some(idx) = self.index(i, j) {
            self.data[idx] += value;
        }
    }

    /// `self + lambda * other`, plus `diagonal` added on the main diagonal
    pub fn scaled_with_diagonal(&self, lambda: f64, diagonal: &[f64]) -> Result<Self> {
        if diagonal.len() != self.n {
            return Err(PhotoError::LengthMismatch {
                expected: self.n,
                actual: diagonal.len(),
            });
        }

        let stride = self.bandwidth + 1;
        let mut out = self.clone();
        for (i, row) in out.data.chunks_mut(stride).enumerate() {
            for v in row.iter_mut() {
                *v *= lambda;
            }
            row[0] += diagonal[i];
        }
        Ok(out)
    }

    /// Factor into `L Lᵀ` and return the lower factor.
    pub fn cholesky(&self) -> Result<BandedCholesky> {
        let n = self.n;
        let bw = self.bandwidth;
        let stride = bw + 1;
        let mut l = vec![0.0; self.data.len()];

        for i in 0..n {
            let first = i.saturating_sub(bw);
            for j in first..=i {
                let mut sum = self.data[i * stride + (i - j)];
                let m_start = first.max(j.saturating_sub(bw));
                for m in m_start..j {
                    sum -= l[i * stride + (i - m)] * l[j * stride + (j - m)];
                }

                if i == j {
                    if sum <= 0.0 || !sum.is_finite() {
                        return Err(PhotoError::SingularSystem(format!(
                            "non-positive pivot {:e} at row {}",
                            sum, i
                        )));
                    }
                    l[i * stride] = sum.sqrt();
                } else {
                    l[i * stride + (i - j)] = sum / l[j * stride];
                }
            }
        }

        Ok(BandedCholesky {
            n,
            bandwidth: bw,
            lower: l,
        })
    }
}

/// Lower Cholesky factor of a [`SymmetricBanded`] matrix.
#[derive(Debug, Clone)]
pub struct BandedCholesky {
    n: usize,
    bandwidth: usize,
    lower: Vec<f64>,
}

impl BandedCholesky {
    /// Solve `A x = b` by forward then backward substitution.
    pub fn solve(&self, b: &[f64]) -> Result<Vec<f64>> {
        if b.len() != self.n {
            return Err(PhotoError::LengthMismatch {
                expected: self.n,
                actual: b.len(),
            });
        }

        let n = self.n;
        let bw = self.bandwidth;
        let stride = bw + 1;
        let l = &self.lower;

        // L y = b
        let mut y = b.to_vec();
        for i in 0..n {
            let mut sum = y[i];
            for m in i.saturating_sub(bw)..i {
                sum -= l[i * stride + (i - m)] * y[m];
            }
            y[i] = sum / l[i * stride];
        }

        // Lᵀ x = y
        for i in (0..n).rev() {
            let mut sum = y[i];
            for m in (i + 1)..n.min(i + bw + 1) {
                sum -= l[m * stride + (m - i)] * y[m];
            }
            y[i] = sum / l[i * stride];
        }

        Ok(y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{DMatrix, DVector};

    fn tridiagonal(n: usize) -> SymmetricBanded {
        let mut a = SymmetricBanded::zeros(n, 1);
        for i in 0..n {
            a.add(i, i, 4.0);
            if i > 0 {
                a.add(i, i - 1, -1.0);
            }
        }
        a
    }

    #[test]
    fn test_symmetric_access() {
        let a = tridiagonal(5);
        assert_eq!(a.get(2, 1), -1.0);
        assert_eq!(a.get(1, 2), -1.0);
        assert_eq!(a.get(0, 3), 0.0);
        assert_eq!(a.get(3, 3), 4.0);
    }

    #[test]
    fn test_solve_matches_dense() {
        let n = 8;
        let mut a = SymmetricBanded::zeros(n, 2);
        for i in 0..n {
            a.add(i, i, 6.0 + i as f64);
            if i >= 1 {
                a.add(i, i - 1, -2.0);
            }
            if i >= 2 {
                a.add(i, i - 2, 0.5);
            }
        }
        let b: Vec<f64> = (0..n).map(|i| (i as f64).cos()).collect();

        let x = a.cholesky().unwrap().solve(&b).unwrap();

        let dense = DMatrix::from_fn(n, n, |i, j| a.get(i, j));
        let expected = dense.lu().solve(&DVector::from_vec(b)).unwrap();
        for i in 0..n {
            assert!((x[i] - expected[i]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_scaled_with_diagonal() {
        let a = tridiagonal(3);
        let m = a.scaled_with_diagonal(2.0, &[1.0, 0.0, 3.0]).unwrap();
        assert_eq!(m.get(0, 0), 9.0);
        assert_eq!(m.get(1, 1), 8.0);
        assert_eq!(m.get(2, 2), 11.0);
        assert_eq!(m.get(1, 0), -2.0);
    }

    #[test]
    fn test_singular_matrix_rejected() {
        let a = SymmetricBanded::zeros(3, 1);
        assert!(matches!(a.cholesky(), Err(PhotoError::SingularSystem(_))));
    }

    #[test]
    fn test_solve_rejects_wrong_length() {
        let chol = tridiagonal(4).cholesky().unwrap();
        assert!(chol.solve(&[1.0, 2.0]).is_err());
    }
}
