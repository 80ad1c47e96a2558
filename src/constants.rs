//! Numerical and physical constants of the moment-method engine.
//!
//! ## Units
//!
//! The engine works in wavelength-normalised units: every length that reaches
//! a field kernel has already been divided by the free-space wavelength, so
//! the free-space wavenumber is simply `2π`. Frequencies are in MHz and the
//! velocity of light is therefore expressed in metres per microsecond.
//!
//! ## Provenance
//!
//! The values below are the ones the NEC-2 engine has always used. Several of
//! them are rounded (for example `ETA` and `CVEL`) and several composite
//! constants are pre-multiplied products of the rounded ones; changing their
//! precision shifts computed impedances in the fourth or fifth significant
//! digit, which is why they are kept as literal values rather than derived.
//! - Burke, G. J. & Poggio, A. J. (1981). *Numerical Electromagnetics Code
//!   (NEC) - Method of Moments*, Part I: Program Description - Theory.

use num_complex::Complex;

use crate::math::{CScalar, Scalar};

/// π as used by the series and Bessel constants.
pub const PI: Scalar = std::f64::consts::PI;
/// 2π, the free-space wavenumber in wavelength units.
pub const TWO_PI: Scalar = 2.0 * PI;
/// 8π.
pub const PI8: Scalar = 25.132_741_23;
/// 10π, used by the Bessel/Hankel blending window.
pub const PI10: Scalar = 31.415_926_54;
/// 4π.
pub const FOUR_PI: Scalar = 12.566_370_62;
/// π/5, the path step used by the Shanks contour integration.
pub const PTP: Scalar = 0.628_318_530_8;
/// Degrees to radians.
pub const TO_RAD: Scalar = 1.745_329_252e-2;
/// Radians to degrees.
pub const TO_DEG: Scalar = 57.295_779_51;

/// Free-space wave impedance in ohms.
pub const ETA: Scalar = 376.73;
/// Velocity of light in metres per microsecond (so `λ = CVEL / f_MHz`).
pub const CVEL: Scalar = 299.8;
/// Scale factor applied to plane-wave excitation of surface patches (`1/ETA`).
pub const RETA: Scalar = 2.654_420_938e-3;
/// Conductivity-to-permittivity factor: `ε_c = ε_r - j·CONDUCTIVITY_FACTOR·λ·σ`.
pub const CONDUCTIVITY_FACTOR: Scalar = 59.96;
/// Reactance scale of inductive/capacitive loads: `j·2π·10⁶·f` folded with `CVEL`.
pub const LOAD_REACTANCE: Scalar = 1.883_698_955e9;
/// Field constant of an elementary current source (`ETA / 2π`).
pub const CURRENT_SOURCE_FIELD: Scalar = 59.958;
/// Input power of a unit elementary current source per `λ²`.
pub const CURRENT_SOURCE_POWER: Scalar = 394.510;

/// `-j/(60)`: scales a current-discontinuity source voltage to a current.
pub const CCJ: CScalar = Complex::new(0.0, -0.016_666_666_67);
/// `j·ETA/(8π²)`: electric field constant of the segment kernels.
pub const CONST1: CScalar = Complex::new(0.0, 4.771_341_189);
/// `ETA/(8π²)` as a real scalar.
pub const CONST2: Scalar = 4.771_341_188;
/// `-j·ETA/(4π)`: far-field scale of wire currents.
pub const CONST3: CScalar = Complex::new(0.0, -29.979_220_85);
/// `j·ETA/2`: far-field scale of patch currents and the Norton ground wave.
pub const CONST4: CScalar = Complex::new(0.0, 188.365);

/// Euler–Mascheroni constant.
pub const GAMMA: Scalar = 0.577_215_664_9;
/// Series constant of `Y0'` near the origin.
pub const BESSEL_C1: Scalar = -0.024_578_509_15;
/// Series constant of `Y0` near the origin.
pub const BESSEL_C2: Scalar = 0.367_466_905_2;
/// `sqrt(2/π)`, amplitude of the large-argument Bessel asymptotics.
pub const BESSEL_C3: Scalar = 0.797_884_560_8;
/// Coefficients of the large-argument Bessel/Hankel asymptotic series.
pub const P10: Scalar = 0.070_312_5;
/// See [`P10`].
pub const P20: Scalar = 0.112_152_099_6;
/// See [`P10`].
pub const Q10: Scalar = 0.125;
/// See [`P10`].
pub const Q20: Scalar = 0.073_242_187_5;
/// See [`P10`].
pub const P11: Scalar = 0.117_187_5;
/// See [`P10`].
pub const P21: Scalar = 0.144_195_556_6;
/// See [`P10`].
pub const Q11: Scalar = 0.375;
/// See [`P10`].
pub const Q21: Scalar = 0.102_539_062_5;
/// π/4 phase offset of the asymptotic Bessel forms.
pub const POF: Scalar = 0.785_398_163_5;

/// `2/sqrt(π)`.
pub const TOSP: Scalar = 1.128_379_167;
/// `sqrt(π)`.
pub const SQRT_PI: Scalar = 1.772_453_851;
/// Relative accuracy of the Norton `F(p)` series.
pub const FBAR_ACCURACY: Scalar = 1.0e-12;

/// Maximum number of halvings of the Shanks-accelerated contour.
pub const SHANKS_MAX_TERMS: usize = 20;
/// Relative convergence criterion of the Sommerfeld integration.
pub const SOMMERFELD_CRIT: Scalar = 1.0e-4;
/// Largest number of Romberg subintervals per Sommerfeld contour segment.
pub const SOMMERFELD_MAX_STEPS: usize = 131_072;
/// Largest number of Romberg subintervals per segment integral.
pub const ROMBERG_MAX_STEPS: usize = 65_536;
/// Relative convergence criterion of the segment Romberg integrations.
pub const ROMBERG_CRIT: Scalar = 1.0e-4;
/// Number of accepted steps before the Romberg step is doubled.
pub const ROMBERG_GROWTH_STEPS: usize = 4;

/// Relative tolerance of endpoint matching in the connectivity pass.
pub const CONNECTION_TOLERANCE: Scalar = 1.0e-3;

/// Ratio of source-to-observer distance beyond which the lumped kernel is
/// used when the caller does not provide one.
pub const DEFAULT_RKH: Scalar = 1.0;

/// Sentinel dB value for magnitudes below 1e-20.
pub const DB_FLOOR: Scalar = -999.99;

/// Returns the free-space wavelength in metres for a frequency in MHz.
#[inline]
#[must_use]
pub fn wavelength_from_mhz(freq_mhz: Scalar) -> Scalar {
    CVEL / freq_mhz
}

/// Returns `10·log10(x)`, or [`DB_FLOOR`] for `x < 1e-20`.
#[inline]
#[must_use]
pub fn db10(x: Scalar) -> Scalar {
    if x < 1.0e-20 {
        DB_FLOOR
    } else {
        10.0 * x.log10()
    }
}

/// Returns `20·log10(x)`, or [`DB_FLOOR`] for `x < 1e-20`.
#[inline]
#[must_use]
pub fn db20(x: Scalar) -> Scalar {
    if x < 1.0e-20 {
        DB_FLOOR
    } else {
        20.0 * x.log10()
    }
}
