//! Closed-form and integrated fields of a straight current filament carrying
//! constant, `sin(ks)` and `cos(ks)` current distributions.
//!
//! Coordinates are local to the source segment: `z` runs along the segment
//! from its centre and `rh` is the radial distance of the observer. All
//! lengths are in wavelengths, so the wavenumber is `2π`.

use crate::constants::{CONST1, PI8, ROMBERG_CRIT, ROMBERG_MAX_STEPS, TWO_PI};
use crate::math::{relative_difference, CScalar, Scalar, C_ZERO, J};

use super::romberg::integrate;

/// Axial and radial field components of one current distribution.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct KernelField {
    /// Component along the source segment.
    pub axial: CScalar,
    /// Component along the radial unit vector.
    pub radial: CScalar,
}

/// Fields of the constant, sine and cosine distributions.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WireKernel {
    /// Constant current.
    pub constant: KernelField,
    /// `sin(ks)` current.
    pub sine: KernelField,
    /// `cos(ks)` current.
    pub cosine: KernelField,
    /// True when the filament integral hit the subdivision limit.
    pub limited: bool,
}

/// `exp(-jkr)/r` and its derivative factor at distance `(zz, rh)`.
fn green(zz: Scalar, rh: Scalar) -> (CScalar, CScalar) {
    let r2 = zz * zz + rh * rh;
    let r = r2.sqrt();
    let rkz = TWO_PI * r;
    let gz = CScalar::new(rkz.cos(), -rkz.sin()) / r;
    let gzp = -CScalar::new(1.0, rkz) * gz / r2;
    (gz, gzp)
}

/// End terms of the extended thin-wire kernel.
struct EndTerms {
    g1: CScalar,
    g1p: CScalar,
    g2: CScalar,
    g2p: CScalar,
    g3: CScalar,
    gzp: CScalar,
}

fn extended_end(zz: Scalar, rh: Scalar, a: Scalar, inside: bool) -> EndTerms {
    let a2 = a * a;
    let r2 = zz * zz + rh * rh;
    let r = r2.sqrt();
    let r4 = r2 * r2;
    let rk = TWO_PI * r;
    let rk2 = rk * rk;
    let rh2 = rh * rh;
    let t1 = 0.25 * a2 * rh2 / r4;
    let t2 = 0.5 * a2 / r2;
    let c1 = CScalar::new(1.0, rk);
    let c2 = 3.0 * c1 - rk2;
    let c3 = CScalar::new(6.0, rk) * rk2 - 15.0 * c1;
    let gz = CScalar::new(rk.cos(), -rk.sin()) / r;
    let g2 = gz * (1.0 + t1 * c2);
    let g1 = g2 - t2 * c1 * gz;
    let gz = gz / r2;
    let g2p = gz * (t1 * c3 - c1);
    let gzp = t2 * c2 * gz;
    let g3 = g2p + gzp;
    let g1p = g3 * zz;

    if !inside {
        let (g2, g2p) = if rh <= 1.0e-10 {
            (C_ZERO, C_ZERO)
        } else {
            (g2 / rh, g2p * zz / rh)
        };
        return EndTerms {
            g1,
            g1p,
            g2,
            g2p,
            g3: (g3 + gzp) * rh,
            gzp: -zz * c1 * gz,
        };
    }

    let t2 = 0.5 * a;
    let g2p = t2 * gz * c2 / r2;
    EndTerms {
        g1,
        g1p,
        g2: -t2 * c1 * gz,
        g2p: g2p * zz,
        g3: rh2 * g2p - a * gz * c1,
        gzp: -zz * c1 * gz,
    }
}

/// `∫ exp(-jkr)/(kr) d(kz')` over the filament, returned as `cos + j·sin`
/// parts. With `singular` the `1/(kr)` singularity of the self term is
/// subtracted and integrated analytically.
fn filament_integral(half_length_k: Scalar, rhk: Scalar, zpk: Scalar, singular: bool) -> (CScalar, bool) {
    let rkb2 = rhk * rhk;
    let lower = -half_length_k;
    let upper = if singular { 0.0 } else { half_length_k };
    let integrand = |zk: Scalar| {
        let zdk = zk - zpk;
        let rk = (rkb2 + zdk * zdk).sqrt();
        let si = rk.sin() / rk;
        let co = if !singular {
            rk.cos() / rk
        } else if rk >= 0.2 {
            (rk.cos() - 1.0) / rk
        } else {
            let rks = rk * rk;
            ((-1.388_888_89e-3 * rks + 4.166_666_67e-2) * rks - 0.5) * rk
        };
        [CScalar::new(co, si)]
    };
    let q = integrate(lower, upper, 10.0 * ROMBERG_MAX_STEPS as Scalar, integrand, |a, b| {
        let (tr, ti) = relative_difference(a[0], b[0], 0.0);
        tr <= ROMBERG_CRIT && ti <= ROMBERG_CRIT
    });
    let mut sum = q.value[0];
    if singular {
        let s = upper - lower;
        let b = rhk;
        sum = CScalar::new(
            2.0 * (sum.re + (((b * b + s * s).sqrt() + s) / b).ln()),
            2.0 * sum.im,
        );
    }
    (sum, q.limited)
}

/// Thin-wire kernel: current on the segment axis, observer at `(z, rh)`.
///
/// `singular` is set when the observer lies on the source segment itself.
pub fn thin_wire(s: Scalar, z: Scalar, rh: Scalar, singular: bool) -> WireKernel {
    let zpk = TWO_PI * z;
    let rhk = TWO_PI * rh;
    let sh = 0.5 * s;
    let shk = TWO_PI * sh;
    let (ss, cs) = shk.sin_cos();
    let z2a = sh - z;
    let z1a = -(sh + z);
    let (gz1, gp1) = green(z1a, rh);
    let (gz2, gp2) = green(z2a, rh);
    let gzp1 = gp1 * z1a;
    let gzp2 = gp2 * z2a;

    let ezs = CONST1 * ((gz2 - gz1) * cs * TWO_PI - (gzp2 + gzp1) * ss);
    let ezc = -CONST1 * ((gz2 + gz1) * ss * TWO_PI + (gzp2 - gzp1) * cs);
    let erk = CONST1 * (gp2 - gp1) * rh;
    let (int, limited) = filament_integral(shk, rhk, zpk, singular);
    let ezk = -CONST1 * (gzp2 - gzp1 + TWO_PI * TWO_PI * int.conj());

    let (ers, erc) = if rh >= 1.0e-10 {
        let gzp1 = gzp1 * z1a;
        let gzp2 = gzp2 * z2a;
        (
            -CONST1 * ((gzp2 + gzp1 + gz2 + gz1) * ss - (z2a * gz2 - z1a * gz1) * cs * TWO_PI) / rh,
            -CONST1 * ((gzp2 - gzp1 + gz2 - gz1) * cs + (z2a * gz2 + z1a * gz1) * ss * TWO_PI) / rh,
        )
    } else {
        (C_ZERO, C_ZERO)
    };

    WireKernel {
        constant: KernelField {
            axial: ezk,
            radial: erk,
        },
        sine: KernelField {
            axial: ezs,
            radial: ers,
        },
        cosine: KernelField {
            axial: ezc,
            radial: erc,
        },
        limited,
    }
}

/// Extended thin-wire kernel: current on the wire surface of radius `b`.
///
/// `smooth_ends[k]` is true when end `k` continues into a collinear segment
/// of equal radius or is free; otherwise that end uses the thin-wire end
/// term.
pub fn extended_thin_wire(
    b: Scalar,
    s: Scalar,
    z: Scalar,
    rhx: Scalar,
    singular: bool,
    smooth_ends: [bool; 2],
) -> WireKernel {
    let (rh, b, inside) = if rhx >= b { (rhx, b, false) } else { (b, rhx, true) };
    let sh = 0.5 * s;
    let zpk = TWO_PI * z;
    let rhk = TWO_PI * rh;
    let shk = TWO_PI * sh;
    let (ss, cs) = shk.sin_cos();
    let z2a = sh - z;
    let z1a = -(sh + z);

    let end = |zz: Scalar, smooth: bool| {
        if smooth {
            extended_end(zz, rh, b, inside)
        } else {
            let (gz, grk) = green(zz, rhx);
            let gzp = grk * zz;
            EndTerms {
                g1: gz,
                g1p: gzp,
                g2: gz / rhx,
                g2p: gzp / rhx,
                g3: grk * rhx,
                gzp: C_ZERO,
            }
        }
    };
    let e1 = end(z1a, smooth_ends[0]);
    let e2 = end(z2a, smooth_ends[1]);

    let ezs = CONST1 * ((e2.g1 - e1.g1) * cs * TWO_PI - (e2.g1p + e1.g1p) * ss);
    let ezc = -CONST1 * ((e2.g1 + e1.g1) * ss * TWO_PI + (e2.g1p - e1.g1p) * cs);
    let ers = -CONST1
        * ((z2a * e2.g2p + z1a * e1.g2p + e2.g2 + e1.g2) * ss
            - (z2a * e2.g2 - z1a * e1.g2) * cs * TWO_PI);
    let erc = -CONST1
        * ((z2a * e2.g2p - z1a * e1.g2p + e2.g2 - e1.g2) * cs
            + (z2a * e2.g2 + z1a * e1.g2) * ss * TWO_PI);
    let erk = CONST1 * (e2.g3 - e1.g3);
    let (int, limited) = filament_integral(shk, rhk, zpk, singular);
    let bk = b * TWO_PI;
    let bk2 = 0.25 * bk * bk;
    let ezk = -CONST1
        * (e2.g1p - e1.g1p + TWO_PI * TWO_PI * (1.0 - bk2) * int.conj() - bk2 * (e2.gzp - e1.gzp));

    WireKernel {
        constant: KernelField {
            axial: ezk,
            radial: erk,
        },
        sine: KernelField {
            axial: ezs,
            radial: ers,
        },
        cosine: KernelField {
            axial: ezc,
            radial: erc,
        },
        limited,
    }
}

/// Magnetic field of the three current distributions, all along the
/// azimuthal direction around the segment.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AzimuthalField {
    /// Constant current.
    pub constant: CScalar,
    /// `sin(ks)` current.
    pub sine: CScalar,
    /// `cos(ks)` current.
    pub cosine: CScalar,
    /// True when the filament integral hit the subdivision limit.
    pub limited: bool,
}

/// H field of a uniform filament by numerical integration.
fn uniform_filament_h(el1: Scalar, el2: Scalar, rhk: Scalar, zpk: Scalar) -> (CScalar, bool) {
    let rhks = rhk * rhk;
    let integrand = |zk: Scalar| {
        let rs = zk - zpk;
        let rs = rhks + rs * rs;
        let r = rs.sqrt();
        let (skr, ckr) = r.sin_cos();
        let rr2 = 1.0 / rs;
        let rr3 = rr2 / r;
        [CScalar::new(skr * rr2 + ckr * rr3, ckr * rr2 - skr * rr3)]
    };
    let q = integrate(el1, el2, 10.0 * ROMBERG_MAX_STEPS as Scalar, integrand, |a, b| {
        let (tr, ti) = relative_difference(a[0], b[0], 0.0);
        tr <= ROMBERG_CRIT && ti <= ROMBERG_CRIT
    });
    (q.value[0] * rhk * 0.5, q.limited)
}

/// H field of a segment of length `s` at radial distance `rh` and axial
/// offset `zpx` from the segment centre.
pub fn segment_h(s: Scalar, rh: Scalar, zpx: Scalar) -> AzimuthalField {
    if rh < 1.0e-10 {
        return AzimuthalField::default();
    }
    let fjk = -J * TWO_PI;
    let (zp, hss) = if zpx >= 0.0 { (zpx, 1.0) } else { (-zpx, -1.0) };
    let dh = 0.5 * s;
    let z1 = zp + dh;
    let z2a = zp - dh;
    let rhz = if z2a >= 1.0e-7 { rh / z2a } else { 1.0 };
    let dk = TWO_PI * dh;
    let (sdk, cdk) = dk.sin_cos();
    let (constant, limited) = uniform_filament_h(-dk, dk, rh * TWO_PI, zp * TWO_PI);

    if rhz >= 1.0e-3 {
        let rh2 = rh * rh;
        let r1 = (rh2 + z1 * z1).sqrt();
        let r2 = (rh2 + z2a * z2a).sqrt();
        let ekr1 = (fjk * r1).exp();
        let ekr2 = (fjk * r2).exp();
        let t1 = z1 * ekr1 / r1;
        let t2 = z2a * ekr2 / r2;
        let cons = -J / (2.0 * TWO_PI * rh);
        return AzimuthalField {
            constant,
            sine: cons * (cdk * (ekr2 - ekr1) - J * sdk * (t2 + t1)) * hss,
            cosine: cons * (-sdk * (ekr2 + ekr1) - J * cdk * (t2 - t1)),
            limited,
        };
    }

    let ekr1 = CScalar::new(cdk, sdk) / (z2a * z2a);
    let ekr2 = CScalar::new(cdk, -sdk) / (z1 * z1);
    let t1 = TWO_PI * (1.0 / z1 - 1.0 / z2a);
    let t2 = (fjk * zp).exp() * rh / PI8;
    AzimuthalField {
        constant,
        sine: t2 * (t1 + (ekr1 + ekr2) * sdk) * hss,
        cosine: t2 * (-J * t1 + (ekr1 - ekr2) * cdk),
        limited,
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn sine_and_cosine_fields_are_closed_form_at_distance() {
        // Far from a short filament, the sine distribution is odd in z so
        // its broadside axial field vanishes.
        let k = thin_wire(0.05, 0.0, 2.0, false);
        assert!(k.sine.axial.norm() < 1.0e-12 * k.cosine.axial.norm().max(1.0));
        assert!(k.constant.axial.norm() > 0.0);
        assert!(!k.limited);
    }

    #[test]
    fn cosine_current_matches_constant_for_short_segment() {
        // For ks << 1 the cosine distribution is nearly uniform.
        let k = thin_wire(1.0e-3, 0.0, 0.5, false);
        let ratio = k.cosine.axial / k.constant.axial;
        assert_relative_eq!(ratio.re, 1.0, epsilon = 1.0e-3);
        assert_relative_eq!(ratio.im, 0.0, epsilon = 1.0e-3);
    }

    #[test]
    fn extended_kernel_approaches_thin_wire_far_from_axis() {
        let thin = thin_wire(0.05, 0.01, 0.3, false);
        let ext = extended_thin_wire(1.0e-5, 0.05, 0.01, 0.3, false, [true, true]);
        let d = (thin.constant.axial - ext.constant.axial).norm() / thin.constant.axial.norm();
        assert!(d < 1.0e-4);
        let d = (thin.cosine.radial - ext.cosine.radial).norm() / thin.cosine.radial.norm();
        assert!(d < 1.0e-4);
    }

    #[test]
    fn self_term_is_finite() {
        let k = thin_wire(0.05, 0.0, 0.001, true);
        assert!(k.constant.axial.re.is_finite() && k.constant.axial.im.is_finite());
        assert!(k.cosine.radial.re.is_finite());
    }

    #[test]
    fn magnetic_field_vanishes_on_axis() {
        let h = segment_h(0.1, 0.0, 0.3);
        assert_eq!(h.constant, C_ZERO);
        let h = segment_h(0.1, 0.2, 0.0);
        // Broadside, the odd sine distribution produces no azimuthal field.
        assert!(h.sine.norm() < 1.0e-12);
        assert!(h.constant.norm() > 0.0);
    }
}
