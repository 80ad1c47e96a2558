//! Physical currents from basis amplitudes.

use nalgebra::DVector;

use crate::constants::PI;
use crate::errors::{NecError, Result};
use crate::geometry::SegmentEnd;
use crate::math::{CScalar, Scalar, C3, C_ZERO};

use super::excitation::DiscontinuitySource;
use super::ScaledStructure;

/// Current on one segment as `a + b·sin(ks) + c·cos(ks)`, `s` measured from
/// the segment centre in wavelengths, `k = 2π`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CurrentCoefficients {
    /// Constant part.
    pub a: CScalar,
    /// Sine part.
    pub b: CScalar,
    /// Cosine part.
    pub c: CScalar,
}

impl Default for CurrentCoefficients {
    fn default() -> Self {
        Self {
            a: C_ZERO,
            b: C_ZERO,
            c: C_ZERO,
        }
    }
}

impl CurrentCoefficients {
    /// Current at phase `ks` from the centre.
    #[must_use]
    pub fn at(&self, ks: Scalar) -> CScalar {
        let (s, c) = ks.sin_cos();
        self.a + self.b * s + self.c * c
    }

    fn accumulate(&mut self, a: Scalar, b: Scalar, c: Scalar, amplitude: CScalar) {
        self.a += amplitude * a;
        self.b += amplitude * b;
        self.c += amplitude * c;
    }
}

/// Current distribution of one solution.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CurrentDistribution {
    /// Per-segment expansion coefficients in wavelength-normalised units.
    pub coefficients: Vec<CurrentCoefficients>,
    /// Centre current of every segment in amperes.
    pub segment_currents: Vec<CScalar>,
    /// Surface current of every patch as a Cartesian vector.
    pub patch_currents: Vec<C3>,
    /// Raw `(t1, t2)` amplitudes of every patch.
    pub patch_components: Vec<(CScalar, CScalar)>,
    /// Wavelength in metres.
    pub wavelength: Scalar,
    segment_lengths: Vec<Scalar>,
}

impl CurrentDistribution {
    /// Expands the solution `x` over the basis functions of `structure`,
    /// adding the currents of the discontinuity sources.
    pub fn from_solution(
        structure: &ScaledStructure,
        x: &DVector<CScalar>,
        discontinuities: &[DiscontinuitySource],
    ) -> Result<Self> {
        let geom = &structure.geometry;
        let n = geom.segment_count();
        if x.len() != structure.unknowns() {
            return Err(NecError::Config(format!(
                "solution has {} entries, structure has {} unknowns",
                x.len(),
                structure.unknowns()
            )));
        }

        let mut coefficients = vec![CurrentCoefficients::default(); n];
        for (i, terms) in structure.basis.full.iter().enumerate() {
            for t in terms {
                coefficients[t.segment].accumulate(t.a, t.b, t.c, x[i]);
            }
        }
        for source in discontinuities {
            for t in &source.terms {
                coefficients[t.segment].accumulate(t.a, t.b, t.c, source.current);
            }
        }

        let lambda = structure.wavelength;
        let segment_currents = coefficients.iter().map(|k| (k.a + k.c) * lambda).collect();

        let patch_components: Vec<_> = (0..geom.patch_count())
            .map(|p| (x[n + 2 * p], x[n + 2 * p + 1]))
            .collect();
        let patch_currents = geom
            .patches
            .iter()
            .zip(&patch_components)
            .map(|(patch, &(c1, c2))| {
                C3::new(
                    c1 * patch.t1.x + c2 * patch.t2.x,
                    c1 * patch.t1.y + c2 * patch.t2.y,
                    c1 * patch.t1.z + c2 * patch.t2.z,
                )
            })
            .collect();

        Ok(Self {
            coefficients,
            segment_currents,
            patch_currents,
            patch_components,
            wavelength: lambda,
            segment_lengths: geom.segments.iter().map(|s| s.length).collect(),
        })
    }

    /// Number of segments.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.coefficients.len()
    }

    /// Centre current of segment `i` in wavelength-normalised units.
    #[must_use]
    pub fn normalized_center(&self, i: usize) -> CScalar {
        let k = &self.coefficients[i];
        k.a + k.c
    }

    /// Current in amperes flowing through `end` of segment `i`.
    #[must_use]
    pub fn end_current(&self, i: usize, end: SegmentEnd) -> CScalar {
        let half = PI * self.segment_lengths[i];
        self.coefficients[i].at(end.sign() * half) * self.wavelength
    }

    /// Current in amperes into the gap of a discontinuity source, taken at the
    /// start of its segment.
    #[must_use]
    pub fn source_current(&self, source: &DiscontinuitySource) -> CScalar {
        self.end_current(source.segment, SegmentEnd::Start)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::geometry::GeometryBuilder;
    use crate::math::R3;

    fn structure(with_patch: bool) -> ScaledStructure {
        let mut b = GeometryBuilder::new();
        b.wire(1, 5, R3::new(0.0, 0.0, 1.0), R3::new(0.0, 0.0, 1.5), 0.001, 1.0, 1.0)
            .unwrap();
        if with_patch {
            b.arbitrary_patch(R3::new(2.0, 0.0, 0.0), 90.0, 0.0, 0.01).unwrap();
        }
        ScaledStructure::new(&b.finish(false).unwrap(), 299.8).unwrap()
    }

    #[test]
    fn one_amplitude_reproduces_its_basis_function() {
        let s = structure(false);
        let mut x = DVector::from_element(5, C_ZERO);
        x[2] = CScalar::new(0.0, 2.0);
        let d = CurrentDistribution::from_solution(&s, &x, &[]).unwrap();
        let mut touched = vec![false; 5];
        for t in &s.basis.full[2] {
            touched[t.segment] = true;
            assert_relative_eq!(d.normalized_center(t.segment).im, 2.0 * (t.a + t.c), epsilon = 1.0e-12);
            assert_relative_eq!(d.segment_currents[t.segment].im, 2.0 * (t.a + t.c), epsilon = 1.0e-12);
        }
        for (k, seen) in touched.iter().enumerate() {
            if !seen {
                assert_eq!(d.segment_currents[k], C_ZERO);
            }
        }
    }

    #[test]
    fn current_is_continuous_across_segment_joints() {
        let s = structure(false);
        let x = DVector::from_fn(5, |i, _| CScalar::new(1.0 + i as Scalar, 0.5));
        let d = CurrentDistribution::from_solution(&s, &x, &[]).unwrap();
        for i in 0..4 {
            let a = d.end_current(i, SegmentEnd::End);
            let b = d.end_current(i + 1, SegmentEnd::Start);
            assert_relative_eq!((a - b).norm(), 0.0, epsilon = 1.0e-9 * a.norm());
        }
    }

    #[test]
    fn patch_components_become_cartesian() {
        let s = structure(true);
        let mut x = DVector::from_element(7, C_ZERO);
        x[5] = CScalar::new(1.0, 0.0);
        x[6] = CScalar::new(0.0, 3.0);
        let d = CurrentDistribution::from_solution(&s, &x, &[]).unwrap();
        let j = d.patch_currents[0];
        assert_relative_eq!(j.x.re, 1.0, epsilon = 1.0e-12);
        assert_relative_eq!(j.y.im, 3.0, epsilon = 1.0e-12);
        assert_eq!(j.z, C_ZERO);
        assert!(CurrentDistribution::from_solution(&s, &DVector::from_element(5, C_ZERO), &[]).is_err());
    }
}
