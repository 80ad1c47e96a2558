//! Zero-order Bessel and Hankel functions of complex argument.
//!
//! Both use the power series for small `|z|`, the large-argument asymptotic
//! expansion otherwise, and a cosine blend of the two across a narrow band of
//! `|z|²` so the Sommerfeld integrands stay smooth where the forms switch.

use crate::constants::{
    BESSEL_C1, BESSEL_C2, BESSEL_C3, GAMMA, P10, P11, P20, P21, PI, PI10, POF, Q10, Q11, Q20, Q21,
};
use crate::errors::{NecError, Result};
use crate::math::{CScalar, Scalar, C_ONE, J};

const SERIES_COEFFICIENTS: usize = 25;
const TERM_TABLE: usize = 101;
const SERIES_TOLERANCE: Scalar = 1.0e-6;

/// Bessel series is used for `|z|² <= 37.21`, blended above 36.
const BESSEL_SERIES_LIMIT: Scalar = 37.21;
const BESSEL_BLEND_START: Scalar = 36.0;
/// Hankel series is used for `|z|² <= 16.81`, blended above 16.
const HANKEL_SERIES_LIMIT: Scalar = 16.81;
const HANKEL_BLEND_START: Scalar = 16.0;

/// A function value together with its derivative.
pub type ValueAndSlope = (CScalar, CScalar);

/// Precomputed power-series coefficients shared by both functions.
#[derive(Debug, Clone)]
pub struct BesselSeries {
    a1: [Scalar; SERIES_COEFFICIENTS],
    a2: [Scalar; SERIES_COEFFICIENTS],
    a3: [Scalar; SERIES_COEFFICIENTS],
    a4: [Scalar; SERIES_COEFFICIENTS],
    bessel_terms: [usize; TERM_TABLE],
    hankel_terms: [usize; TERM_TABLE],
}

impl Default for BesselSeries {
    fn default() -> Self {
        Self::new()
    }
}

impl BesselSeries {
    /// Builds the coefficient tables and the number of series terms needed
    /// for each integer value of `|z|²`.
    #[must_use]
    pub fn new() -> Self {
        let mut a1 = [0.0; SERIES_COEFFICIENTS];
        let mut a2 = [0.0; SERIES_COEFFICIENTS];
        let mut a3 = [0.0; SERIES_COEFFICIENTS];
        let mut a4 = [0.0; SERIES_COEFFICIENTS];
        let mut psi = -GAMMA;
        for k in 0..SERIES_COEFFICIENTS {
            let kf = (k + 1) as Scalar;
            a1[k] = -0.25 / (kf * kf);
            a2[k] = 1.0 / (kf + 1.0);
            psi += 1.0 / kf;
            a3[k] = psi + psi;
            a4[k] = (psi + psi + 1.0 / (kf + 1.0)) / (kf + 1.0);
        }

        let count_terms = |weight: &dyn Fn(usize) -> Scalar| {
            let mut terms = [0usize; TERM_TABLE];
            for (i, slot) in terms.iter_mut().enumerate() {
                let x = (i + 1) as Scalar;
                let mut tst = 1.0;
                let mut last = 0;
                for (k, a) in a1.iter().enumerate().take(SERIES_COEFFICIENTS - 1) {
                    last = k;
                    tst *= -x * a;
                    if tst * weight(k) < SERIES_TOLERANCE {
                        break;
                    }
                }
                *slot = last + 1;
            }
            terms
        };
        let bessel_terms = count_terms(&|_| 1.0);
        let hankel_terms = count_terms(&|k| a3[k]);

        Self {
            a1,
            a2,
            a3,
            a4,
            bessel_terms,
            hankel_terms,
        }
    }

    /// Returns `J0(z)` and `J0'(z)`.
    #[must_use]
    pub fn bessel(&self, z: CScalar) -> ValueAndSlope {
        let zms = z.norm_sqr();
        if zms <= 1.0e-12 {
            return (C_ONE, -0.5 * z);
        }

        let mut series = None;
        if zms <= BESSEL_SERIES_LIMIT {
            let terms = self.bessel_terms[zms as usize];
            let mut j0 = C_ONE;
            let mut j0p = C_ONE;
            let mut zk = C_ONE;
            let zi = z * z;
            for k in 0..terms {
                zk *= self.a1[k] * zi;
                j0 += zk;
                j0p += self.a2[k] * zk;
            }
            j0p *= -0.5 * z;
            if zms <= BESSEL_BLEND_START {
                return (j0, j0p);
            }
            series = Some((j0, j0p));
        }

        let (p0z, p1z, q0z, q1z, zi) = asymptotic_factors(z);
        let zk = (J * (z - POF)).exp();
        let zk_inv = 1.0 / zk;
        let cz = 0.5 * (zk + zk_inv);
        let sz = J * 0.5 * (zk_inv - zk);
        let amp = BESSEL_C3 * zi.sqrt();
        let j0 = amp * (p0z * cz - q0z * sz);
        let j0p = -amp * (p1z * sz + q1z * cz);

        match series {
            Some(s) => blend(s, (j0, j0p), ((zms.sqrt() - 6.0) * PI10).cos()),
            None => (j0, j0p),
        }
    }

    /// Returns `H0(1)(z)` and its derivative. `z` must be nonzero.
    pub fn hankel(&self, z: CScalar) -> Result<ValueAndSlope> {
        let zms = z.norm_sqr();
        if zms == 0.0 {
            return Err(NecError::Config(
                "Hankel function is not defined at z = 0".into(),
            ));
        }

        let mut series = None;
        if zms <= HANKEL_SERIES_LIMIT {
            let terms = self.hankel_terms[zms as usize];
            let mut j0 = C_ONE;
            let mut j0p = C_ONE;
            let mut y0 = CScalar::new(0.0, 0.0);
            let mut y0p = y0;
            let mut zk = C_ONE;
            let zi = z * z;
            for k in 0..terms {
                zk *= self.a1[k] * zi;
                j0 += zk;
                j0p += self.a2[k] * zk;
                y0 += self.a3[k] * zk;
                y0p += self.a4[k] * zk;
            }
            j0p *= -0.5 * z;
            let clogz = (0.5 * z).ln();
            let y0 = (2.0 * j0 * clogz - y0) / PI + BESSEL_C2;
            let y0p = (2.0 / z + 2.0 * j0p * clogz + 0.5 * y0p * z) / PI + BESSEL_C1 * z;
            let h = (j0 + J * y0, j0p + J * y0p);
            if zms <= HANKEL_BLEND_START {
                return Ok(h);
            }
            series = Some(h);
        }

        let (p0z, p1z, q0z, q1z, zi) = asymptotic_factors(z);
        let zk = (J * (z - POF)).exp() * zi.sqrt() * BESSEL_C3;
        let h0 = zk * (p0z + J * q0z);
        let h0p = J * zk * (p1z + J * q1z);

        Ok(match series {
            Some(s) => blend(s, (h0, h0p), ((zms.sqrt() - 4.0) * PI10).cos()),
            None => (h0, h0p),
        })
    }
}

fn asymptotic_factors(z: CScalar) -> (CScalar, CScalar, CScalar, CScalar, CScalar) {
    let zi = 1.0 / z;
    let zi2 = zi * zi;
    let p0z = 1.0 + (P20 * zi2 - P10) * zi2;
    let p1z = 1.0 + (P11 - P21 * zi2) * zi2;
    let q0z = (Q20 * zi2 - Q10) * zi;
    let q1z = (Q11 - Q21 * zi2) * zi;
    (p0z, p1z, q0z, q1z, zi)
}

fn blend(series: ValueAndSlope, asymptotic: ValueAndSlope, w: Scalar) -> ValueAndSlope {
    (
        0.5 * (series.0 * (1.0 + w) + asymptotic.0 * (1.0 - w)),
        0.5 * (series.1 * (1.0 + w) + asymptotic.1 * (1.0 - w)),
    )
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn bessel_matches_tabulated_real_values() {
        let s = BesselSeries::new();
        // J0(1) = 0.7651976866, J0'(1) = -J1(1) = -0.4400505857
        let (j0, j0p) = s.bessel(CScalar::new(1.0, 0.0));
        assert_relative_eq!(j0.re, 0.765_197_686_6, epsilon = 1.0e-6);
        assert_relative_eq!(j0p.re, -0.440_050_585_7, epsilon = 1.0e-6);
        assert!(j0.im.abs() < 1.0e-12);
    }

    #[test]
    fn bessel_asymptotic_branch_is_accurate() {
        let s = BesselSeries::new();
        // J0(10) = -0.2459357645, J1(10) = 0.0434727462
        let (j0, j0p) = s.bessel(CScalar::new(10.0, 0.0));
        assert_relative_eq!(j0.re, -0.245_935_764_5, epsilon = 1.0e-5);
        assert_relative_eq!(j0p.re, -0.043_472_746_2, epsilon = 1.0e-5);
    }

    #[test]
    fn bessel_is_continuous_across_blend_band() {
        let s = BesselSeries::new();
        let below = s.bessel(CScalar::new(5.999, 0.0)).0;
        let above = s.bessel(CScalar::new(6.101, 0.0)).0;
        // J0 varies by about 0.028 over this interval.
        assert!((below - above).norm() < 0.05);
    }

    #[test]
    fn hankel_real_part_is_bessel() {
        let s = BesselSeries::new();
        for x in [0.5, 2.0, 5.0] {
            let z = CScalar::new(x, 0.0);
            let (h0, _) = s.hankel(z).unwrap();
            let (j0, _) = s.bessel(z);
            assert_relative_eq!(h0.re, j0.re, epsilon = 1.0e-4);
        }
        // Y0(2) = 0.5103756726
        let (h0, _) = s.hankel(CScalar::new(2.0, 0.0)).unwrap();
        assert_relative_eq!(h0.im, 0.510_375_672_6, epsilon = 1.0e-5);
    }

    #[test]
    fn hankel_rejects_origin() {
        let s = BesselSeries::new();
        assert!(s.hankel(CScalar::new(0.0, 0.0)).is_err());
    }
}
