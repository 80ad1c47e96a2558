//! LU factorization with partial pivoting of the interaction matrix.

use std::time::{Duration, Instant};

use nalgebra::{DMatrix, DVector, Dyn, LU};

use crate::errors::{Diagnostic, NecError, Result};
use crate::math::{CScalar, Scalar};

/// Statistics of a factorization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FactorStats {
    /// Ratio of the largest to the smallest pivot magnitude.
    pub condition_estimate: Option<Scalar>,
    /// Smallest pivot magnitude.
    pub smallest_pivot: Scalar,
    /// Zero-based column of the smallest pivot.
    pub smallest_pivot_column: usize,
    /// Time spent factoring.
    pub factor_time: Duration,
    /// Human-readable notes.
    pub notes: Vec<String>,
}

/// Factors of the interaction matrix, reusable for any number of
/// right-hand sides.
#[derive(Debug, Clone)]
pub struct Factored {
    lu: LU<CScalar, Dyn, Dyn>,
    order: usize,
    /// Factorization statistics.
    pub stats: FactorStats,
}

impl Factored {
    /// Factors `matrix`. A zero or non-finite pivot is fatal; a pivot whose
    /// squared magnitude falls below `pivot_warning` yields a warning.
    pub fn factor(matrix: DMatrix<CScalar>, pivot_warning: Scalar) -> Result<(Self, Vec<Diagnostic>)> {
        let order = matrix.nrows();
        if matrix.ncols() != order {
            return Err(NecError::Config(format!(
                "interaction matrix is {}x{}, not square",
                order,
                matrix.ncols()
            )));
        }

        let start = Instant::now();
        let lu = matrix.lu();
        let factor_time = start.elapsed();

        let mut stats = FactorStats {
            smallest_pivot: Scalar::INFINITY,
            factor_time,
            ..FactorStats::default()
        };
        let mut largest: Scalar = 0.0;
        let mut diagnostics = Vec::new();
        let u = lu.u();
        for k in 0..order {
            let d = u[(k, k)];
            if !(d.re.is_finite() && d.im.is_finite()) || (d.re == 0.0 && d.im == 0.0) {
                tracing::error!(pivot = k, "singular interaction matrix");
                return Err(NecError::SingularMatrix { pivot: k });
            }
            let m = d.norm();
            if m < stats.smallest_pivot {
                stats.smallest_pivot = m;
                stats.smallest_pivot_column = k;
            }
            largest = largest.max(m);
            if d.norm_sqr() < pivot_warning {
                diagnostics.push(Diagnostic::warning(format!(
                    "pivot {} is nearly singular (|u|² = {:.3e})",
                    k + 1,
                    d.norm_sqr()
                )));
            }
        }
        if order > 0 {
            stats.condition_estimate = Some(largest / stats.smallest_pivot);
        }
        if !diagnostics.is_empty() {
            stats.notes.push("matrix is ill-conditioned; results may be inaccurate".into());
        }
        tracing::debug!(order, ?factor_time, cond = ?stats.condition_estimate, "matrix factored");

        Ok((Self { lu, order, stats }, diagnostics))
    }

    /// Order of the factored matrix.
    #[must_use]
    pub const fn order(&self) -> usize {
        self.order
    }

    /// Solves `A x = rhs`.
    pub fn solve(&self, rhs: &DVector<CScalar>) -> Result<DVector<CScalar>> {
        if rhs.len() != self.order {
            return Err(NecError::Config(format!(
                "excitation has {} entries, matrix order is {}",
                rhs.len(),
                self.order
            )));
        }
        self.lu
            .solve(rhs)
            .ok_or(NecError::SingularMatrix { pivot: self.stats.smallest_pivot_column })
    }

    /// Solves `A X = rhs` for every column of `rhs`.
    pub fn solve_many(&self, rhs: &DMatrix<CScalar>) -> Result<DMatrix<CScalar>> {
        if rhs.nrows() != self.order {
            return Err(NecError::Config(format!(
                "right-hand sides have {} rows, matrix order is {}",
                rhs.nrows(),
                self.order
            )));
        }
        self.lu
            .solve(rhs)
            .ok_or(NecError::SingularMatrix { pivot: self.stats.smallest_pivot_column })
    }

    /// Solves for a unit excitation at unknown `index`.
    pub fn solve_unit(&self, index: usize) -> Result<DVector<CScalar>> {
        let mut rhs = DVector::from_element(self.order, CScalar::new(0.0, 0.0));
        if index >= self.order {
            return Err(NecError::Config(format!("unknown {index} out of range")));
        }
        rhs[index] = CScalar::new(1.0, 0.0);
        self.solve(&rhs)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn sample(n: usize) -> DMatrix<CScalar> {
        DMatrix::from_fn(n, n, |i, j| {
            let x = (i * 7 + j * 3) as Scalar;
            let diag = if i == j { 10.0 } else { 0.0 };
            CScalar::new(diag + (x * 0.37).sin(), (x * 0.11).cos())
        })
    }

    #[test]
    fn solve_reproduces_the_right_hand_side() {
        let a = sample(6);
        let b = DVector::from_fn(6, |i, _| CScalar::new(i as Scalar, 1.0));
        let (f, diags) = Factored::factor(a.clone(), 1.0e-10).unwrap();
        assert!(diags.is_empty());
        let x = f.solve(&b).unwrap();
        let r = &a * &x - &b;
        assert_relative_eq!(r.norm(), 0.0, epsilon = 1.0e-10);
        assert!(f.stats.condition_estimate.unwrap() >= 1.0);
    }

    #[test]
    fn many_right_hand_sides_match_single_solves() {
        let a = sample(4);
        let (f, _) = Factored::factor(a, 1.0e-10).unwrap();
        let b = DMatrix::from_fn(4, 2, |i, j| CScalar::new((i + j) as Scalar, 0.5));
        let x = f.solve_many(&b).unwrap();
        let x0 = f.solve(&b.column(0).into_owned()).unwrap();
        assert_relative_eq!((x.column(0) - x0).norm(), 0.0, epsilon = 1.0e-12);
    }

    #[test]
    fn zero_pivot_is_fatal() {
        let mut a = sample(3);
        a.row_mut(1).fill(CScalar::new(0.0, 0.0));
        assert!(matches!(
            Factored::factor(a, 1.0e-10),
            Err(NecError::SingularMatrix { .. })
        ));
    }

    #[test]
    fn tiny_pivot_warns_and_mismatched_rhs_fails() {
        let mut a = DMatrix::<Scalar>::identity(2, 2).map(|v| CScalar::new(v, 0.0));
        a[(1, 1)] = CScalar::new(1.0e-7, 0.0);
        let (f, diags) = Factored::factor(a, 1.0e-10).unwrap();
        assert_eq!(diags.len(), 1);
        assert!(f.solve(&DVector::from_element(3, CScalar::new(1.0, 0.0))).is_err());
    }
}
