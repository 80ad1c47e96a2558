//! Lossless transmission lines between two segments.

use crate::constants::TWO_PI;
use crate::errors::{NecError, Result};
use crate::math::{CScalar, Scalar, C_ZERO, J};

use super::twoport::{TwoPort, YParameters};

/// Ideal line of characteristic impedance `z0`.
///
/// A negative `z0` requests a line whose conductors are crossed at one end;
/// its magnitude is the impedance. A length of zero or less means the line
/// spans the distance between the centres of the segments it joins.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransmissionLine {
    /// Characteristic impedance in ohms, negative when crossed.
    pub z0: Scalar,
    /// Length in metres.
    pub length_m: Scalar,
    /// Shunt admittance across the end at port 1.
    pub shunt1: CScalar,
    /// Shunt admittance across the end at port 2.
    pub shunt2: CScalar,
}

impl TransmissionLine {
    /// Line without end shunts.
    #[must_use]
    pub fn new(z0: Scalar, length_m: Scalar) -> Self {
        Self {
            z0,
            length_m,
            shunt1: C_ZERO,
            shunt2: C_ZERO,
        }
    }

    /// Adds shunt admittances at both ends.
    #[must_use]
    pub fn with_shunts(mut self, shunt1: CScalar, shunt2: CScalar) -> Self {
        self.shunt1 = shunt1;
        self.shunt2 = shunt2;
        self
    }

    /// Whether the conductors are crossed.
    #[must_use]
    pub fn is_crossed(&self) -> bool {
        self.z0 < 0.0
    }

    /// Length used for the solution given the distance between the port
    /// segments, both in metres.
    #[must_use]
    pub fn effective_length(&self, port_distance_m: Scalar) -> Scalar {
        if self.length_m > 0.0 {
            self.length_m
        } else {
            port_distance_m
        }
    }

    /// Chain matrix at electrical length `beta_l` radians.
    #[must_use]
    pub fn to_twoport(&self, beta_l: Scalar) -> TwoPort {
        let z0 = self.z0.abs();
        let (s, c) = beta_l.sin_cos();
        TwoPort::from_abcd(
            CScalar::new(c, 0.0),
            J * (z0 * s),
            J * (s / z0),
            CScalar::new(c, 0.0),
        )
    }

    /// Short-circuit admittances at `wavelength`, shunts and crossing
    /// included.
    pub fn admittance(&self, port_distance_m: Scalar, wavelength: Scalar) -> Result<YParameters> {
        if self.z0 == 0.0 || !self.z0.is_finite() {
            return Err(NecError::Network(format!(
                "transmission line impedance {} is not usable",
                self.z0
            )));
        }
        let length = self.effective_length(port_distance_m);
        let beta_l = TWO_PI * length / wavelength;
        if beta_l.sin().abs() < 1.0e-12 {
            return Err(NecError::Network(format!(
                "transmission line of {length} m is a multiple of a half wavelength at {wavelength} m"
            )));
        }
        let y = self.to_twoport(beta_l).to_y()?;
        let y = if self.is_crossed() { y.crossed() } else { y };
        Ok(y.with_shunts(self.shunt1, self.shunt2))
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn quarter_wave_line() {
        let line = TransmissionLine::new(50.0, 0.25);
        let y = line.admittance(0.0, 1.0).unwrap();
        assert_relative_eq!(y.y11.norm(), 0.0, epsilon = 1.0e-12);
        assert_relative_eq!(y.y12.im, 1.0 / 50.0, epsilon = 1.0e-12);
        assert_relative_eq!(y.y12.re, 0.0, epsilon = 1.0e-12);
    }

    #[test]
    fn eighth_wave_line_matches_closed_form() {
        let line = TransmissionLine::new(75.0, 1.0).with_shunts(CScalar::new(0.001, 0.002), C_ZERO);
        let y = line.admittance(0.0, 8.0).unwrap();
        let bl = TWO_PI / 8.0;
        let y12 = 1.0 / (75.0 * bl.sin());
        assert_relative_eq!(y.y12.im, y12, epsilon = 1.0e-12);
        assert_relative_eq!(y.y11.re, 0.001, epsilon = 1.0e-12);
        assert_relative_eq!(y.y11.im, -y12 * bl.cos() + 0.002, epsilon = 1.0e-12);
        assert_relative_eq!(y.y22.im, -y12 * bl.cos(), epsilon = 1.0e-12);
    }

    #[test]
    fn crossed_line_and_default_length() {
        let straight = TransmissionLine::new(300.0, 0.0).admittance(0.3, 2.0).unwrap();
        let crossed = TransmissionLine::new(-300.0, -1.0).admittance(0.3, 2.0).unwrap();
        assert_relative_eq!(crossed.y12.im, -straight.y12.im, epsilon = 1.0e-12);
        assert_relative_eq!(crossed.y11.im, straight.y11.im, epsilon = 1.0e-12);
        assert!(TransmissionLine::new(50.0, 0.5).admittance(0.0, 1.0).is_err());
        assert!(TransmissionLine::new(0.0, 0.1).admittance(0.0, 1.0).is_err());
    }
}
