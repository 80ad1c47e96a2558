//! Near fields of segment and patch currents, including ground effects.
//!
//! A [`FieldEvaluator`] carries the per-frequency ground state and the
//! kernel settings. It is created once per matrix fill (or per near-field
//! request) and owns the Sommerfeld interpolation cache, so separate fills
//! never share mutable state.

mod kernel;
mod magnetic;
mod patch;
mod romberg;
mod sommerfeld;
mod wire;

pub use kernel::{extended_thin_wire, segment_h, thin_wire, AzimuthalField, KernelField, WireKernel};
pub use patch::{PatchField, PatchJunctionField};
pub use wire::{SegmentField, SourceSegment};

use crate::errors::{NecError, Result};
use crate::ground::{GroundInterpolator, GroundKind, GroundParameters, GroundTable};
use crate::math::{CScalar, Scalar};

/// Evaluates fields of one frequency step.
#[derive(Debug, Clone)]
pub struct FieldEvaluator<'a> {
    ground: &'a GroundParameters,
    interpolator: Option<GroundInterpolator<'a>>,
    rkh: Scalar,
    extended_kernel: bool,
    limited_steps: usize,
}

impl<'a> FieldEvaluator<'a> {
    /// Creates an evaluator. A Sommerfeld ground needs its table.
    pub fn new(
        ground: &'a GroundParameters,
        table: Option<&'a GroundTable>,
        rkh: Scalar,
        extended_kernel: bool,
    ) -> Result<Self> {
        let interpolator = match (ground.kind, table) {
            (GroundKind::Sommerfeld, Some(t)) => {
                t.check(ground.epsc)?;
                Some(GroundInterpolator::new(t))
            }
            (GroundKind::Sommerfeld, None) => {
                return Err(NecError::Config(
                    "Sommerfeld ground requested without a ground table".into(),
                ))
            }
            _ => None,
        };
        Ok(Self {
            ground,
            interpolator,
            rkh,
            extended_kernel,
            limited_steps: 0,
        })
    }

    /// Ground parameters in use.
    #[must_use]
    pub const fn ground(&self) -> &'a GroundParameters {
        self.ground
    }

    /// Number of kernel integrations that hit the subdivision limit.
    #[must_use]
    pub const fn limited_steps(&self) -> usize {
        self.limited_steps
    }

    /// Number of image passes: 2 with a ground plane, 1 in free space.
    fn passes(&self) -> usize {
        if self.ground.has_image() {
            2
        } else {
            1
        }
    }
}

/// Fresnel reflection coefficients `(R_v, R_h)` for a wave impedance ratio
/// `zrat` and the cosine of the angle from the vertical.
#[must_use]
pub(crate) fn fresnel(zrat: CScalar, cth: Scalar) -> (CScalar, CScalar) {
    let zrsin = (1.0 - zrat * zrat * (1.0 - cth * cth)).sqrt();
    let rv = (cth - zrat * zrsin) / (cth + zrat * zrsin);
    let rh = (zrat * cth - zrsin) / (zrat * cth + zrsin);
    (rv, rh)
}

/// Horizontal unit vector normal to the plane of incidence, or `None` for
/// vertical incidence.
#[must_use]
pub(crate) fn incidence_normal(dx: Scalar, dy: Scalar) -> Option<(Scalar, Scalar)> {
    let xymag = dx.hypot(dy);
    (xymag > 1.0e-6).then(|| (-dy / xymag, dx / xymag))
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::ground::GroundSpec;
    use crate::math::C_ONE;

    #[test]
    fn fresnel_coefficients_have_the_expected_limits() {
        // Perfect conductor: R_v = 1, R_h = -1.
        let (rv, rh) = fresnel(CScalar::new(0.0, 0.0), 0.3);
        assert_relative_eq!(rv.re, 1.0, epsilon = 1.0e-12);
        assert_relative_eq!(rh.re, -1.0, epsilon = 1.0e-12);
        // Matched medium reflects nothing.
        let (rv, rh) = fresnel(C_ONE, 0.7);
        assert!(rv.norm() < 1.0e-12 && rh.norm() < 1.0e-12);
    }

    #[test]
    fn sommerfeld_evaluator_requires_a_table() {
        let spec = GroundSpec::Finite(crate::ground::FiniteGround {
            epsr: 10.0,
            sig: 0.01,
            method: crate::ground::GroundMethod::Sommerfeld,
            screen: None,
            second_medium: None,
        });
        let params = GroundParameters::new(&spec, 10.0).unwrap();
        assert!(matches!(
            FieldEvaluator::new(&params, None, 1.0, false),
            Err(NecError::Config(_))
        ));
    }

    #[test]
    fn vertical_incidence_has_no_plane() {
        assert!(incidence_normal(0.0, 1.0e-8).is_none());
        let (px, py) = incidence_normal(1.0, 0.0).unwrap();
        assert_relative_eq!(px, 0.0);
        assert_relative_eq!(py, 1.0);
    }
}
