//! Shared numerical primitives anchored on `nalgebra` and `num-complex`.

use nalgebra::{Matrix3, Vector3};
use num_complex::Complex;

/// Primary scalar type used across the crate.
pub type Scalar = f64;
/// Convenient alias for three-dimensional real vectors.
pub type R3 = Vector3<Scalar>;
/// Convenient alias for three-by-three real matrices.
pub type R3x3 = Matrix3<Scalar>;
/// Primary complex scalar type used for phasors.
pub type CScalar = Complex<Scalar>;
/// Convenient alias for three-dimensional complex vectors.
pub type C3 = Vector3<CScalar>;

/// Complex zero.
pub const C_ZERO: CScalar = Complex::new(0.0, 0.0);
/// Complex one.
pub const C_ONE: CScalar = Complex::new(1.0, 0.0);
/// Imaginary unit.
pub const J: CScalar = Complex::new(0.0, 1.0);

/// Returns the complex exponential `e^(j * theta)` using `Scalar` precision.
#[must_use]
pub fn phasor(theta: Scalar) -> CScalar {
    Complex::from_polar(1.0, theta)
}

/// Promotes a real vector to a complex one.
#[must_use]
pub fn complexify(v: &R3) -> C3 {
    C3::new(v.x.into(), v.y.into(), v.z.into())
}

/// Dot product of a complex vector with a real vector (no conjugation).
#[inline]
#[must_use]
pub fn cdot(c: &C3, r: &R3) -> CScalar {
    c.x * r.x + c.y * r.y + c.z * r.z
}

/// Scales a real vector by a complex scalar.
#[inline]
#[must_use]
pub fn scale(r: &R3, s: CScalar) -> C3 {
    C3::new(s * r.x, s * r.y, s * r.z)
}

/// Phase angle of a complex number in degrees.
#[must_use]
pub fn phase_deg(z: CScalar) -> Scalar {
    if z.re == 0.0 && z.im == 0.0 {
        0.0
    } else {
        z.im.atan2(z.re).to_degrees()
    }
}

/// Sum of absolute real and imaginary parts (the 1-norm of a complex number).
#[inline]
#[must_use]
pub fn abs1(z: CScalar) -> Scalar {
    z.re.abs() + z.im.abs()
}

/// Relative difference used by the Romberg convergence tests.
///
/// Returns `(|f1r - f2r| / den, |f1i - f2i| / den)` with
/// `den = max(|f2r|, |f2i|, dmin)`, or zeros when `den < 1e-37`.
#[must_use]
pub fn relative_difference(f1: CScalar, f2: CScalar, dmin: Scalar) -> (Scalar, Scalar) {
    let den = f2.re.abs().max(f2.im.abs()).max(dmin);
    if den < 1.0e-37 {
        return (0.0, 0.0);
    }
    ((f1.re - f2.re).abs() / den, (f1.im - f2.im).abs() / den)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn complex_real_dot_matches_componentwise_sum() {
        let c = C3::new(Complex::new(1.0, 1.0), Complex::new(0.0, 2.0), C_ONE);
        let r = R3::new(2.0, 1.0, -1.0);
        let d = cdot(&c, &r);
        assert_relative_eq!(d.re, 1.0, epsilon = 1.0e-12);
        assert_relative_eq!(d.im, 4.0, epsilon = 1.0e-12);
    }

    #[test]
    fn phase_of_imaginary_unit_is_ninety_degrees() {
        assert_relative_eq!(phase_deg(J), 90.0, epsilon = 1.0e-12);
        assert_eq!(phase_deg(C_ZERO), 0.0);
    }

    #[test]
    fn relative_difference_uses_floor() {
        let (tr, ti) = relative_difference(Complex::new(1.0, 0.0), C_ZERO, 0.5);
        assert_relative_eq!(tr, 2.0, epsilon = 1.0e-12);
        assert_relative_eq!(ti, 0.0, epsilon = 1.0e-12);
        assert_eq!(relative_difference(C_ONE, C_ZERO, 0.0), (0.0, 0.0));
    }
}
