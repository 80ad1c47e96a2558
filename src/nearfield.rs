//! Near electric and magnetic fields of the solved currents.

use std::time::Instant;

use crate::constants::TO_RAD;
use crate::errors::{NecError, Result};
use crate::fields::{FieldEvaluator, SourceSegment};
use crate::math::{Scalar, C3, R3};
use crate::moment::{CurrentDistribution, ScaledStructure};

/// Points at which the field is evaluated. Angles in degrees, lengths in
/// metres.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NearFieldGrid {
    /// Cartesian grid.
    Rectangular {
        /// First point.
        start: R3,
        /// Increments along x, y and z.
        step: R3,
        /// Points along x, y and z.
        counts: [usize; 3],
    },
    /// Spherical grid about the origin.
    Spherical {
        /// First radius, θ and φ.
        start: R3,
        /// Increments of radius, θ and φ.
        step: R3,
        /// Points along radius, θ and φ.
        counts: [usize; 3],
    },
}

impl NearFieldGrid {
    fn counts(&self) -> [usize; 3] {
        match self {
            Self::Rectangular { counts, .. } | Self::Spherical { counts, .. } => *counts,
        }
    }

    /// Every point in metres; x (or radius) varies fastest, then y (θ),
    /// then z (φ).
    #[must_use]
    pub fn points(&self) -> Vec<R3> {
        let [nx, ny, nz] = self.counts();
        let mut out = Vec::with_capacity(nx * ny * nz);
        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    out.push(match self {
                        Self::Rectangular { start, step, .. } => R3::new(
                            start.x + i as Scalar * step.x,
                            start.y + j as Scalar * step.y,
                            start.z + k as Scalar * step.z,
                        ),
                        Self::Spherical { start, step, .. } => {
                            let r = start.x + i as Scalar * step.x;
                            let (sth, cth) = ((start.y + j as Scalar * step.y) * TO_RAD).sin_cos();
                            let (sph, cph) = ((start.z + k as Scalar * step.z) * TO_RAD).sin_cos();
                            R3::new(r * sth * cph, r * sth * sph, r * cth)
                        }
                    });
                }
            }
        }
        out
    }
}

/// How the total field vector is summarized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FieldTotal {
    /// Real parts at `t = 0`.
    Snapshot,
    /// Time maximum of the elliptically polarized vector.
    #[default]
    Peak,
}

/// A near-field request.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NearFieldRequest {
    /// Observation points.
    pub grid: NearFieldGrid,
    /// Compute E.
    pub electric: bool,
    /// Compute H.
    pub magnetic: bool,
    /// Summary of the total vector.
    pub total: FieldTotal,
}

/// Which near fields a worker computes, as carried by the `nearehf`
/// command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NearFieldMask(pub u8);

impl NearFieldMask {
    /// Electric field bit.
    pub const ELECTRIC: u8 = 1;
    /// Magnetic field bit.
    pub const MAGNETIC: u8 = 2;
    /// Nothing enabled.
    pub const NONE: Self = Self(0);
    /// Both fields enabled.
    pub const ALL: Self = Self(Self::ELECTRIC | Self::MAGNETIC);

    /// Whether any field is enabled.
    #[must_use]
    pub const fn any(self) -> bool {
        self.0 & (Self::ELECTRIC | Self::MAGNETIC) != 0
    }

    /// `request` restricted to the enabled fields, or `None` when nothing
    /// is left.
    #[must_use]
    pub fn restrict(self, request: &NearFieldRequest) -> Option<NearFieldRequest> {
        let electric = request.electric && self.0 & Self::ELECTRIC != 0;
        let magnetic = request.magnetic && self.0 & Self::MAGNETIC != 0;
        (electric || magnetic).then_some(NearFieldRequest {
            electric,
            magnetic,
            ..*request
        })
    }
}

impl Default for NearFieldMask {
    fn default() -> Self {
        Self::ALL
    }
}

/// Field at one point.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FieldSample {
    /// Point in metres.
    pub position: R3,
    /// Complex Cartesian field.
    pub field: C3,
    /// Component magnitudes.
    pub magnitude: [Scalar; 3],
    /// Component phases in radians.
    pub phase: [Scalar; 3],
    /// Real components of the summarized vector.
    pub real: [Scalar; 3],
    /// Magnitude of the summarized vector.
    pub total: Scalar,
}

/// One field over the whole grid.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FieldMap {
    /// Samples in grid order.
    pub samples: Vec<FieldSample>,
    /// Largest total.
    pub max_total: Scalar,
    /// Largest distance of a grid point from the origin, in metres.
    pub max_radius: Scalar,
}

/// Near fields of one frequency step.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NearFields {
    /// Electric field, V/m.
    pub electric: Option<FieldMap>,
    /// Magnetic field, A/m.
    pub magnetic: Option<FieldMap>,
}

fn summarize(position: R3, field: C3, total: FieldTotal) -> FieldSample {
    let c = [field.x, field.y, field.z];
    let magnitude = c.map(|v| v.norm());
    let phase = c.map(|v| if v.norm() == 0.0 { 0.0 } else { v.arg() });
    let (real, total) = match total {
        FieldTotal::Snapshot => {
            let real = c.map(|v| v.re);
            (real, real.iter().map(|v| v * v).sum::<Scalar>().sqrt())
        }
        FieldTotal::Peak => {
            let m2 = magnitude.map(|m| m * m);
            let cp: Scalar = (0..3).map(|k| m2[k] * (2.0 * phase[k]).cos()).sum();
            let sp: Scalar = (0..3).map(|k| m2[k] * (2.0 * phase[k]).sin()).sum();
            let tp = cp.hypot(sp);
            let wt = (-sp).atan2(cp) / 2.0;
            let real = [0, 1, 2].map(|k| magnitude[k] * (wt + phase[k]).cos());
            (real, ((m2.iter().sum::<Scalar>() + tp) / 2.0).sqrt())
        }
    };
    FieldSample {
        position,
        field,
        magnitude,
        phase,
        real,
        total,
    }
}

/// Computes fields of solved currents at points given in wavelengths.
#[derive(Debug)]
pub struct NearFieldEvaluator<'s, 'g> {
    structure: &'s ScaledStructure,
    currents: &'s CurrentDistribution,
    eval: FieldEvaluator<'g>,
    sources: Vec<SourceSegment>,
}

impl<'s, 'g> NearFieldEvaluator<'s, 'g> {
    /// Evaluator over `currents` using the ground state of `eval`.
    #[must_use]
    pub fn new(structure: &'s ScaledStructure, currents: &'s CurrentDistribution, eval: FieldEvaluator<'g>) -> Self {
        let geom = &structure.geometry;
        let sources = (0..geom.segment_count()).map(|j| SourceSegment::new(geom, j)).collect();
        Self {
            structure,
            currents,
            eval,
            sources,
        }
    }

    /// Radius of the wire the point lies inside, or zero.
    fn observer_radius(&self, obs: &R3) -> Scalar {
        self.structure
            .geometry
            .segments
            .iter()
            .find(|seg| {
                let d = obs - seg.center;
                let along = d.dot(&seg.direction);
                along.abs() <= 0.5001 * seg.length
                    && d.norm_squared() - along * along <= 0.9 * seg.radius * seg.radius
            })
            .map_or(0.0, |seg| seg.radius)
    }

    /// Electric field at `obs` (wavelengths).
    pub fn electric(&mut self, obs: &R3) -> C3 {
        let ax = self.observer_radius(obs);
        let mut e = C3::zeros();
        for (src, k) in self.sources.iter().zip(&self.currents.coefficients) {
            e += self.eval.wire_e(src, obs, ax, false).combine(k.a, k.b, k.c);
        }
        let image = self.eval.ground().has_image();
        for (patch, &(c1, c2)) in self.structure.geometry.patches.iter().zip(&self.currents.patch_components) {
            let mut f = self.eval.patch_e(patch, obs, false);
            if image {
                let g = self.eval.patch_e(patch, obs, true);
                f.t1 += g.t1;
                f.t2 += g.t2;
            }
            e += f.t1 * c1 + f.t2 * c2;
        }
        e
    }

    /// Magnetic field at `obs` (wavelengths).
    pub fn magnetic(&mut self, obs: &R3) -> C3 {
        let ax = self.observer_radius(obs);
        let mut h = C3::zeros();
        for (src, k) in self.sources.iter().zip(&self.currents.coefficients) {
            h += self.eval.wire_h(src, obs, ax).combine(k.a, k.b, k.c);
        }
        for (patch, &(c1, c2)) in self.structure.geometry.patches.iter().zip(&self.currents.patch_components) {
            let f = self.eval.patch_h(patch, obs);
            h += f.t1 * c1 + f.t2 * c2;
        }
        h
    }

    fn map(&mut self, points: &[R3], total: FieldTotal, magnetic: bool) -> FieldMap {
        let lambda = self.structure.wavelength;
        let mut samples = Vec::with_capacity(points.len());
        let mut max_total: Scalar = 0.0;
        let mut max_radius: Scalar = 0.0;
        for p in points {
            let obs = p / lambda;
            let field = if magnetic { self.magnetic(&obs) } else { self.electric(&obs) };
            let sample = summarize(*p, field, total);
            max_total = max_total.max(sample.total);
            max_radius = max_radius.max(p.norm());
            samples.push(sample);
        }
        FieldMap {
            samples,
            max_total,
            max_radius,
        }
    }

    /// Evaluates `request` over its grid.
    pub fn compute(&mut self, request: &NearFieldRequest) -> Result<NearFields> {
        if !(request.electric || request.magnetic) {
            return Err(NecError::Config("near-field request selects neither E nor H".into()));
        }
        let points = request.grid.points();
        if points.is_empty() {
            return Err(NecError::Config("near-field grid has no points".into()));
        }
        let start = Instant::now();
        let electric = request.electric.then(|| self.map(&points, request.total, false));
        let magnetic = request.magnetic.then(|| self.map(&points, request.total, true));
        tracing::debug!(points = points.len(), elapsed = ?start.elapsed(), "near fields computed");
        Ok(NearFields { electric, magnetic })
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::circuits::NetworkSolver;
    use crate::constants::DEFAULT_RKH;
    use crate::geometry::GeometryBuilder;
    use crate::ground::{GroundParameters, GroundSpec};
    use crate::math::{CScalar, C_ONE};
    use crate::moment::{build_excitation, Excitation, Factored, FillOptions, MatrixFill, SegmentRef};

    fn dipole() -> (ScaledStructure, CurrentDistribution, GroundParameters) {
        let mut b = GeometryBuilder::new();
        b.wire(1, 9, R3::new(0.0, 0.0, -0.24), R3::new(0.0, 0.0, 0.24), 0.001, 1.0, 1.0)
            .unwrap();
        let structure = ScaledStructure::new(&b.finish(false).unwrap(), 299.8).unwrap();
        let ground = GroundParameters::new(&GroundSpec::FreeSpace, structure.wavelength).unwrap();
        let filled = MatrixFill::new(&structure, &ground, None, None, FillOptions::default())
            .fill()
            .unwrap();
        let (f, _) = Factored::factor(filled.matrix, 1.0e-10).unwrap();
        let mut eval = FieldEvaluator::new(&ground, None, DEFAULT_RKH, false).unwrap();
        let source = Excitation::Voltage {
            segment: SegmentRef::new(1, 5),
            voltage: C_ONE,
        };
        let e = build_excitation(&structure, &mut eval, &[source], None).unwrap();
        let currents = NetworkSolver::new(&structure, &f, &[]).solve(&e, false).unwrap().currents;
        (structure, currents, ground)
    }

    #[test]
    fn grids_enumerate_x_fastest() {
        let rect = NearFieldGrid::Rectangular {
            start: R3::new(1.0, 2.0, 3.0),
            step: R3::new(0.5, 1.0, 2.0),
            counts: [2, 2, 2],
        };
        let p = rect.points();
        assert_eq!(p.len(), 8);
        assert_eq!(p[1], R3::new(1.5, 2.0, 3.0));
        assert_eq!(p[2], R3::new(1.0, 3.0, 3.0));
        assert_eq!(p[7], R3::new(1.5, 3.0, 5.0));

        let sphere = NearFieldGrid::Spherical {
            start: R3::new(2.0, 90.0, 0.0),
            step: R3::new(1.0, 0.0, 90.0),
            counts: [1, 1, 2],
        };
        let p = sphere.points();
        assert_relative_eq!(p[0].x, 2.0, epsilon = 1.0e-9);
        assert_relative_eq!(p[1].y, 2.0, epsilon = 1.0e-9);
    }

    #[test]
    fn fields_of_a_dipole_have_the_expected_symmetry() {
        let (s, currents, ground) = dipole();
        let eval = FieldEvaluator::new(&ground, None, DEFAULT_RKH, false).unwrap();
        let mut near = NearFieldEvaluator::new(&s, &currents, eval);
        let request = NearFieldRequest {
            grid: NearFieldGrid::Rectangular {
                start: R3::new(0.5, 0.0, 0.0),
                step: R3::new(0.0, 0.0, 0.0),
                counts: [1, 1, 1],
            },
            electric: true,
            magnetic: true,
            total: FieldTotal::Peak,
        };
        let out = near.compute(&request).unwrap();
        let e = out.electric.unwrap().samples[0];
        let h = out.magnetic.unwrap().samples[0];
        // In the broadside plane E is along z and H circles the wire.
        assert!(e.magnitude[0] < 1.0e-6 * e.magnitude[2]);
        assert!(h.magnitude[2] < 1.0e-6 * h.magnitude[1]);
        assert_relative_eq!(e.total, e.magnitude[2], max_relative = 1.0e-6);
        assert_relative_eq!(h.total, h.magnitude[1], max_relative = 1.0e-6);
    }

    #[test]
    fn snapshot_and_peak_totals() {
        let f = C3::new(CScalar::new(0.0, 1.0), CScalar::new(1.0, 0.0), CScalar::new(0.0, 0.0));
        let snap = summarize(R3::zeros(), f, FieldTotal::Snapshot);
        assert_relative_eq!(snap.total, 1.0, epsilon = 1.0e-12);
        // A circularly polarized vector has the same peak at every instant.
        let peak = summarize(R3::zeros(), f, FieldTotal::Peak);
        assert_relative_eq!(peak.total, 1.0, epsilon = 1.0e-12);
        let lin = summarize(R3::zeros(), C3::new(CScalar::new(3.0, 4.0), CScalar::new(0.0, 0.0), CScalar::new(0.0, 0.0)), FieldTotal::Peak);
        assert_relative_eq!(lin.total, 5.0, epsilon = 1.0e-12);
    }

    #[test]
    fn empty_requests_are_rejected() {
        let (s, currents, ground) = dipole();
        let eval = FieldEvaluator::new(&ground, None, DEFAULT_RKH, false).unwrap();
        let mut near = NearFieldEvaluator::new(&s, &currents, eval);
        let request = NearFieldRequest {
            grid: NearFieldGrid::Rectangular {
                start: R3::zeros(),
                step: R3::zeros(),
                counts: [0, 1, 1],
            },
            electric: true,
            magnetic: false,
            total: FieldTotal::Snapshot,
        };
        assert!(near.compute(&request).is_err());
        let none = NearFieldRequest {
            electric: false,
            ..request
        };
        assert!(near.compute(&none).is_err());
    }
}
