//! Rigid transforms applied by the move and reflect commands.

use crate::math::{Scalar, R3, R3x3};

/// Rotation about the x, y and z axes (in that order), followed by a shift.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rotation {
    matrix: R3x3,
    shift: R3,
}

impl Rotation {
    /// Builds the transform from rotation angles in radians and a translation.
    #[must_use]
    pub fn new(rx: Scalar, ry: Scalar, rz: Scalar, shift: R3) -> Self {
        let (sps, cps) = rx.sin_cos();
        let (sth, cth) = ry.sin_cos();
        let (sph, cph) = rz.sin_cos();
        let matrix = R3x3::new(
            cph * cth,
            cph * sth * sps - sph * cps,
            cph * sth * cps + sph * sps,
            sph * cth,
            sph * sth * sps + cph * cps,
            sph * sth * cps - cph * sps,
            -sth,
            cth * sps,
            cth * cps,
        );
        Self { matrix, shift }
    }

    /// Rotation by `angle` about the z axis.
    #[must_use]
    pub fn about_z(angle: Scalar) -> Self {
        Self::new(0.0, 0.0, angle, R3::zeros())
    }

    /// Transforms a point (rotation then shift).
    #[must_use]
    pub fn point(&self, p: &R3) -> R3 {
        self.matrix * p + self.shift
    }

    /// Transforms a direction (rotation only).
    #[must_use]
    pub fn vector(&self, v: &R3) -> R3 {
        self.matrix * v
    }
}

/// Mirrors `p` in the coordinate plane normal to `axis` (0 = x, 1 = y, 2 = z).
#[must_use]
pub fn reflect_point(p: &R3, axis: usize) -> R3 {
    let mut out = *p;
    out[axis] = -out[axis];
    out
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::constants::PI;

    #[test]
    fn quarter_turn_about_z_maps_x_to_y() {
        let rot = Rotation::about_z(0.5 * PI);
        let p = rot.point(&R3::new(1.0, 0.0, 2.0));
        assert_relative_eq!(p, R3::new(0.0, 1.0, 2.0), epsilon = 1.0e-12);
    }

    #[test]
    fn shift_applies_to_points_only() {
        let rot = Rotation::new(0.0, 0.0, 0.0, R3::new(1.0, 2.0, 3.0));
        assert_relative_eq!(rot.point(&R3::zeros()), R3::new(1.0, 2.0, 3.0));
        assert_relative_eq!(rot.vector(&R3::x()), R3::x());
    }

    #[test]
    fn reflection_negates_one_coordinate() {
        assert_eq!(reflect_point(&R3::new(1.0, 2.0, 3.0), 1), R3::new(1.0, -2.0, 3.0));
    }
}
