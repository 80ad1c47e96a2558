//! Interaction matrix engine.
//!
//! One frequency step runs through [`ScaledStructure::new`] (wavelength
//! units and basis functions), [`MatrixFill::fill`], [`Factored::factor`],
//! [`build_excitation`] and [`Factored::solve`], and finally
//! [`CurrentDistribution::from_solution`] to turn basis amplitudes into
//! physical currents.
//!
//! Unknown ordering: one amplitude per segment basis function, then two per
//! patch (`t1` then `t2` surface current). Rows follow the same ordering:
//! segment rows test the tangential E field at the segment centre, and the
//! two rows of a patch test `n × H` along `t2` and `t1` respectively.

mod currents;
mod excitation;
mod fill;
mod lu;

pub use currents::{CurrentCoefficients, CurrentDistribution};
pub use excitation::{
    build_excitation, DiscontinuitySource, Excitation, ExcitationClass, ExcitationVector, Polarization,
    SegmentRef,
};
pub use fill::{FillOptions, FilledMatrix, MatrixFill};
pub use lu::{FactorStats, Factored};

use crate::basis::BasisSet;
use crate::constants::wavelength_from_mhz;
use crate::errors::{NecError, Result};
use crate::geometry::Geometry;
use crate::math::Scalar;

/// Geometry and basis functions of one frequency step in wavelength units.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaledStructure {
    /// Copy of the template scaled by `1/λ`.
    pub geometry: Geometry,
    /// Basis functions of the scaled geometry.
    pub basis: BasisSet,
    /// Free-space wavelength in metres.
    pub wavelength: Scalar,
    /// Frequency in MHz.
    pub freq_mhz: Scalar,
}

impl ScaledStructure {
    /// Scales `template` to `freq_mhz` and synthesizes its basis functions.
    pub fn new(template: &Geometry, freq_mhz: Scalar) -> Result<Self> {
        if !(freq_mhz.is_finite() && freq_mhz > 0.0) {
            return Err(NecError::Config(format!("invalid frequency {freq_mhz} MHz")));
        }
        let wavelength = wavelength_from_mhz(freq_mhz);
        let geometry = template.scaled(1.0 / wavelength);
        let basis = BasisSet::new(&geometry)?;
        Ok(Self {
            geometry,
            basis,
            wavelength,
            freq_mhz,
        })
    }

    /// Order of the interaction matrix.
    #[must_use]
    pub fn unknowns(&self) -> usize {
        self.geometry.unknowns()
    }

    /// Number of wire segments.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.geometry.segment_count()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::geometry::GeometryBuilder;
    use crate::math::R3;

    #[test]
    fn scaling_leaves_the_template_in_metres() {
        let mut b = GeometryBuilder::new();
        b.wire(1, 3, R3::zeros(), R3::new(0.0, 0.0, 1.5), 0.001, 1.0, 1.0)
            .unwrap();
        let g = b.finish(false).unwrap();
        let s = ScaledStructure::new(&g, 299.8).unwrap();
        assert_relative_eq!(s.wavelength, 1.0, max_relative = 1.0e-12);
        assert_relative_eq!(s.geometry.segments[0].length, 0.5, max_relative = 1.0e-12);
        assert_eq!(s.basis.trio.len(), 3);
        assert_eq!(s.unknowns(), 3);
        assert!(ScaledStructure::new(&g, 0.0).is_err());
    }
}
