//! Variable-interval Romberg integration along a segment.
//!
//! Each step compares the 3-point and 5-point Romberg estimates. A step that
//! fails the 5-point test is halved until the subdivision limit is reached,
//! after which the 5-point value is accepted and the result is flagged as
//! step-size limited. After four accepted steps the interval is doubled
//! again.

use crate::constants::{ROMBERG_GROWTH_STEPS, ROMBERG_MAX_STEPS};
use crate::math::{CScalar, Scalar, C_ZERO};

/// Integral of an `N`-component integrand.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Quadrature<const N: usize> {
    pub value: [CScalar; N],
    /// True when some step could not meet the tolerance.
    pub limited: bool,
}

/// Integrates `f` from `a` to `b` (`b >= a`).
///
/// `ep_divisor` sets the smallest remaining interval, `(b - a) / ep_divisor`,
/// that ends the integration. `converged(coarse, fine)` decides whether a
/// step is accurate enough.
pub(crate) fn integrate<const N: usize>(
    a: Scalar,
    b: Scalar,
    ep_divisor: Scalar,
    mut f: impl FnMut(Scalar) -> [CScalar; N],
    converged: impl Fn(&[CScalar; N], &[CScalar; N]) -> bool,
) -> Quadrature<N> {
    let s = b - a;
    let ep = s / ep_divisor;
    let zend = b - ep;
    let mut sum = [C_ZERO; N];
    let mut limited = false;

    let mut z = a;
    let mut ns = 1usize;
    let mut nt = 0usize;
    let mut g1 = f(z);
    let mut g3 = g1;
    let mut g5 = g1;
    let mut dz = 0.0;
    let mut dzot = 0.0;
    let mut fresh = true;

    loop {
        if fresh {
            dz = s / ns as Scalar;
            if z + dz > b {
                dz = b - z;
                if dz.abs() <= ep {
                    return Quadrature { value: sum, limited };
                }
            }
            dzot = 0.5 * dz;
            g3 = f(z + dzot);
            g5 = f(z + dz);
        }
        fresh = true;

        let mut t01 = [C_ZERO; N];
        let mut t10 = [C_ZERO; N];
        for i in 0..N {
            let t00 = (g1[i] + g5[i]) * dzot;
            t01[i] = (t00 + dz * g3[i]) * 0.5;
            t10[i] = (4.0 * t01[i] - t00) / 3.0;
        }

        let accepted = if converged(&t01, &t10) {
            t10
        } else {
            let g2 = f(z + 0.25 * dz);
            let g4 = f(z + 0.75 * dz);
            let mut t11 = [C_ZERO; N];
            let mut t20 = [C_ZERO; N];
            for i in 0..N {
                let t02 = (t01[i] + dzot * (g2[i] + g4[i])) * 0.5;
                t11[i] = (4.0 * t02 - t01[i]) / 3.0;
                t20[i] = (16.0 * t11[i] - t10[i]) / 15.0;
            }
            if !converged(&t11, &t20) {
                nt = 0;
                if ns < ROMBERG_MAX_STEPS {
                    ns *= 2;
                    dz = s / ns as Scalar;
                    dzot = 0.5 * dz;
                    g5 = g3;
                    g3 = g2;
                    fresh = false;
                    continue;
                }
                limited = true;
            }
            nt += 1;
            for (acc, t) in sum.iter_mut().zip(&t20) {
                *acc += *t;
            }
            z += dz;
            if z >= zend {
                return Quadrature { value: sum, limited };
            }
            g1 = g5;
            if nt >= ROMBERG_GROWTH_STEPS && ns > 1 {
                ns /= 2;
                nt = 1;
            }
            continue;
        };

        for (acc, t) in sum.iter_mut().zip(&accepted) {
            *acc += *t;
        }
        nt += 2;
        z += dz;
        if z >= zend {
            return Quadrature { value: sum, limited };
        }
        g1 = g5;
        if nt >= ROMBERG_GROWTH_STEPS && ns > 1 {
            ns /= 2;
            nt = 1;
        }
    }
}
