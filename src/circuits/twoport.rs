//! Two-port descriptions of the networks that join segment ports.

use crate::errors::{NecError, Result};
use crate::math::{CScalar, C_ONE};

/// Short-circuit admittance parameters of a reciprocal two-port in siemens.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YParameters {
    /// Driving-point admittance at port 1.
    pub y11: CScalar,
    /// Transfer admittance, equal in both directions.
    pub y12: CScalar,
    /// Driving-point admittance at port 2.
    pub y22: CScalar,
}

impl YParameters {
    /// Admittances given directly.
    #[must_use]
    pub const fn new(y11: CScalar, y12: CScalar, y22: CScalar) -> Self {
        Self { y11, y12, y22 }
    }

    /// Same network seen with its transfer admittance negated, as for a line
    /// whose conductors are crossed at one end.
    #[must_use]
    pub fn crossed(self) -> Self {
        Self { y12: -self.y12, ..self }
    }

    /// Adds shunt admittances across port 1 and port 2.
    #[must_use]
    pub fn with_shunts(self, shunt1: CScalar, shunt2: CScalar) -> Self {
        Self {
            y11: self.y11 + shunt1,
            y22: self.y22 + shunt2,
            ..self
        }
    }

    /// Full 2×2 matrix.
    #[must_use]
    pub fn matrix(&self) -> [[CScalar; 2]; 2] {
        [[self.y11, self.y12], [self.y12, self.y22]]
    }

    /// Admittance of port `side` (0 or 1) to port `other`.
    #[must_use]
    pub(crate) fn entry(&self, side: usize, other: usize) -> CScalar {
        self.matrix()[side][other]
    }
}

/// ABCD chain matrix of a two-port.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TwoPort {
    /// A element.
    pub a: CScalar,
    /// B element.
    pub b: CScalar,
    /// C element.
    pub c: CScalar,
    /// D element.
    pub d: CScalar,
}

impl TwoPort {
    /// Two-port with explicit chain elements.
    #[must_use]
    pub const fn from_abcd(a: CScalar, b: CScalar, c: CScalar, d: CScalar) -> Self {
        Self { a, b, c, d }
    }

    /// `ad - bc`; one for a reciprocal network.
    #[must_use]
    pub fn determinant(&self) -> CScalar {
        self.a * self.d - self.b * self.c
    }

    /// Short-circuit admittances. Fails when `b` vanishes, since the ports are
    /// then shorted together, or when the network is not reciprocal.
    pub fn to_y(&self) -> Result<YParameters> {
        if self.b.norm() <= 1.0e-300 {
            return Err(NecError::Network(
                "two-port has no finite admittance representation".into(),
            ));
        }
        let det = self.determinant();
        if (det - C_ONE).norm() > 1.0e-9 {
            return Err(NecError::Network(format!(
                "two-port is not reciprocal (ad - bc = {det})"
            )));
        }
        Ok(YParameters {
            y11: self.d / self.b,
            y12: -C_ONE / self.b,
            y22: self.a / self.b,
        })
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::math::C_ZERO;

    #[test]
    fn series_impedance_admittances() {
        let z = CScalar::new(50.0, 25.0);
        let y = TwoPort::from_abcd(C_ONE, z, C_ZERO, C_ONE).to_y().unwrap();
        let expected = C_ONE / z;
        assert_relative_eq!(y.y11.re, expected.re, epsilon = 1.0e-15);
        assert_relative_eq!(y.y22.im, expected.im, epsilon = 1.0e-15);
        assert_relative_eq!(y.y12.re, -expected.re, epsilon = 1.0e-15);
    }

    #[test]
    fn shunt_alone_and_non_reciprocal_have_no_admittance_form() {
        let shunt = TwoPort::from_abcd(C_ONE, C_ZERO, CScalar::new(0.01, 0.0), C_ONE);
        assert!(shunt.to_y().is_err());
        assert!(TwoPort::from_abcd(C_ONE, C_ONE, C_ONE, C_ONE).to_y().is_err());
    }

    #[test]
    fn crossing_and_shunts() {
        let y = YParameters::new(CScalar::new(1.0, 0.0), CScalar::new(0.0, 2.0), CScalar::new(3.0, 0.0))
            .crossed()
            .with_shunts(CScalar::new(0.0, 1.0), CScalar::new(0.5, 0.0));
        assert_eq!(y.y12, CScalar::new(0.0, -2.0));
        assert_eq!(y.entry(0, 0), CScalar::new(1.0, 1.0));
        assert_eq!(y.entry(1, 1), CScalar::new(3.5, 0.0));
        assert_eq!(y.entry(1, 0), y.entry(0, 1));
    }
}
