//! Norton's asymptotic ground-wave fields for a current element over a
//! lossy half space (Proc. IRE, Sept. 1937), used where the Sommerfeld
//! table does not reach.

use crate::constants::{CONST4, FBAR_ACCURACY, SQRT_PI, TOSP, TWO_PI};
use crate::math::{CScalar, Scalar, C_ONE, C_ZERO, J};

/// Sommerfeld attenuation function `F(p)` of the numerical distance `p`.
#[must_use]
pub fn attenuation(p: CScalar) -> CScalar {
    if p == C_ZERO {
        return C_ONE;
    }
    let mut z = J * p.sqrt();
    if z.norm() <= 3.0 {
        let zs = z * z;
        let mut sum = z;
        let mut pow = z;
        for i in 1..=100 {
            let fi = Scalar::from(i);
            pow = -pow * zs / fi;
            let term = pow / (2.0 * fi + 1.0);
            sum += term;
            if term.norm_sqr() / sum.norm_sqr() < FBAR_ACCURACY {
                break;
            }
        }
        return 1.0 - (1.0 - sum * TOSP) * z * zs.exp() * SQRT_PI;
    }

    let minus = z.re < 0.0;
    if minus {
        z = -z;
    }
    let zs = 0.5 / (z * z);
    let mut sum = C_ZERO;
    let mut term = C_ONE;
    for i in 1..=6 {
        term = -term * (2.0 * Scalar::from(i) - 1.0) * zs;
        sum += term;
    }
    if minus {
        sum -= 2.0 * SQRT_PI * z * (z * z).exp();
    }
    -sum
}

/// Geometry of the direct and ground-reflected paths.
///
/// `r1`/`zmh` describe the direct ray (distance and height difference) and
/// `xx1` its phase factor; `r2`/`zph` the image ray and `xx2` its phase
/// factor. Passing `r1 = zmh = 1` with `xx1 = 0` suppresses the direct term.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NortonPath {
    /// Height difference of the direct ray.
    pub zmh: Scalar,
    /// Length of the direct ray.
    pub r1: Scalar,
    /// `exp(-jk r1)` of the direct ray.
    pub xx1: CScalar,
    /// Height sum of the image ray.
    pub zph: Scalar,
    /// Length of the image ray.
    pub r2: Scalar,
    /// `exp(-jk r2)` of the image ray.
    pub xx2: CScalar,
}

/// Cylindrical field components of vertical (`*v`) and horizontal (`*h`)
/// current elements.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NortonField {
    /// Radial field of a vertical element.
    pub erv: CScalar,
    /// Vertical field of a vertical element.
    pub ezv: CScalar,
    /// Radial field of a horizontal element.
    pub erh: CScalar,
    /// Vertical field of a horizontal element.
    pub ezh: CScalar,
    /// Azimuthal field of a horizontal element.
    pub eph: CScalar,
}

/// Evaluates the Norton ground-wave fields for ground wave impedance ratio
/// `u = 1/√ε_c`.
#[must_use]
pub fn ground_wave(path: &NortonPath, u: CScalar) -> NortonField {
    let u2 = u * u;
    let sppp = path.zmh / path.r1;
    let sppp2 = sppp * sppp;
    let cppp2 = (1.0 - sppp2).max(1.0e-20);
    let cppp = cppp2.sqrt();
    let spp = path.zph / path.r2;
    let spp2 = spp * spp;
    let cpp2 = (1.0 - spp2).max(1.0e-20);
    let cpp = cpp2.sqrt();

    let rk1 = -J * TWO_PI * path.r1;
    let rk2 = -J * TWO_PI * path.r2;
    let t1 = 1.0 - u2 * cpp2;
    let t2 = t1.sqrt();
    let t3 = (1.0 - 1.0 / rk1) / rk1;
    let t4 = (1.0 - 1.0 / rk2) / rk2;
    let p1 = rk2 * u2 * t1 / (2.0 * cpp2);
    let rv = (spp - u * t2) / (spp + u * t2);
    let omr = 1.0 - rv;
    let w = 1.0 / omr;
    let f = attenuation(4.0 * p1 * w * w);
    let q1 = rk2 * t1 / (2.0 * u2 * cpp2);
    let rh = (t2 - u * spp) / (t2 + u * spp);
    let v = 1.0 / (1.0 + rh);
    let g = attenuation(4.0 * q1 * v * v);
    let xr1 = path.xx1 / path.r1;
    let xr2 = path.xx2 / path.r2;
    let scale = -CONST4;

    let ezv = {
        let x1 = cppp2 * xr1;
        let x2 = rv * cpp2 * xr2;
        let x3 = omr * cpp2 * f * xr2;
        let x4 = u * t2 * spp * 2.0 * xr2 / rk2;
        let x5 = xr1 * t3 * (1.0 - 3.0 * sppp2);
        let x6 = xr2 * t4 * (1.0 - 3.0 * spp2);
        (x1 + x2 + x3 - x4 - x5 - x6) * scale
    };

    let x1 = sppp * cppp * xr1;
    let x2 = rv * spp * cpp * xr2;
    let x3 = cpp * omr * u * t2 * f * xr2;
    let x4 = spp * cpp * omr * xr2 / rk2;
    let x5 = 3.0 * sppp * cppp * t3 * xr1;
    let x6 = cpp * u * t2 * omr * xr2 / rk2 * 0.5;
    let x7 = 3.0 * spp * cpp * t4 * xr2;
    let erv = -(x1 + x2 - x3 + x4 - x5 + x6 - x7) * scale;
    let ezh = -(x1 - x2 + x3 - x4 - x5 - x6 + x7) * scale;

    let erh = {
        let x1 = sppp2 * xr1;
        let x2 = rv * spp2 * xr2;
        let x4 = u2 * t1 * omr * f * xr2;
        let x5 = t3 * (1.0 - 3.0 * cppp2) * xr1;
        let x6 = t4 * (1.0 - u2 * (1.0 + rv) - u2 * omr * f) * xr2;
        let x7 = u2 * cpp2 * omr * (1.0 - 1.0 / rk2) * (f * (u2 * t1 - spp2 - 1.0 / rk2) + 1.0 / rk2) * xr2;
        (x1 - x2 - x4 - x5 + x6 + x7) * scale
    };

    let eph = {
        let x1 = xr1;
        let x2 = rh * xr2;
        let x3 = (rh + 1.0) * g * xr2;
        let x4 = t3 * xr1;
        let x5 = t4 * (1.0 - u2 * (1.0 + rv) - u2 * omr * f) * xr2;
        let x6 = 0.5 * u2 * omr * (f * (u2 * t1 - spp2 - 1.0 / rk2) + 1.0 / rk2) * xr2 / rk2;
        -(x1 - x2 + x3 - x4 + x5 + x6) * scale
    };

    NortonField {
        erv,
        ezv,
        erh,
        ezh,
        eph,
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn attenuation_is_unity_at_zero_distance() {
        assert_eq!(attenuation(C_ZERO), C_ONE);
        let near = attenuation(CScalar::new(1.0e-6, 0.0));
        assert_relative_eq!(near.re, 1.0, epsilon = 1.0e-2);
    }

    #[test]
    fn attenuation_is_continuous_between_series_and_asymptote() {
        let below = attenuation(CScalar::new(8.99, 0.5));
        let above = attenuation(CScalar::new(9.01, 0.5));
        assert!((below - above).norm() < 1.0e-3);
        assert_relative_eq!(below.re, -0.069_518, epsilon = 1.0e-5);
    }

    #[test]
    fn attenuation_decays_as_inverse_distance() {
        let f = attenuation(CScalar::new(100.0, 10.0));
        assert_relative_eq!(f.re, -0.005_025_1, epsilon = 1.0e-6);
        assert_relative_eq!(f.im, 0.000_510_3, epsilon = 1.0e-6);
    }

    #[test]
    fn perfect_conductor_limit_doubles_the_vertical_field() {
        // With u -> 0 the reflection coefficient of a vertical element is +1,
        // so direct and image rays of equal length add.
        let xx = crate::math::phasor(-TWO_PI * 5.0);
        let path = NortonPath {
            zmh: 0.0,
            r1: 5.0,
            xx1: xx,
            zph: 0.0,
            r2: 5.0,
            xx2: xx,
        };
        let grounded = ground_wave(&path, CScalar::new(1.0e-6, 0.0));
        let direct_only = ground_wave(
            &NortonPath {
                xx2: C_ZERO,
                ..path
            },
            CScalar::new(1.0e-6, 0.0),
        );
        assert_relative_eq!(
            grounded.ezv.norm(),
            2.0 * direct_only.ezv.norm(),
            max_relative = 1.0e-3
        );
    }
}
