//! Electric field of a wire segment, with the image in a ground plane.

use std::ops::{AddAssign, SubAssign};

use crate::constants::{ETA, PI, TWO_PI};
use crate::geometry::{Connection, Geometry, Segment, SegmentEnd};
use crate::ground::GroundKind;
use crate::math::{cdot, scale, CScalar, Scalar, C3, R3};

use super::kernel::{extended_thin_wire, thin_wire, KernelField, WireKernel};
use super::{fresnel, incidence_normal, FieldEvaluator};

/// A source segment as seen by the field kernels, in wavelength units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceSegment {
    /// Centre.
    pub center: R3,
    /// Unit vector from start to end.
    pub direction: R3,
    /// Length.
    pub length: Scalar,
    /// Wire radius.
    pub radius: Scalar,
    /// Per end: true when the extended kernel may use its smooth end term.
    pub smooth_ends: [bool; 2],
}

impl SourceSegment {
    /// Source view of segment `j`, deciding the extended-kernel end terms
    /// from its connections.
    #[must_use]
    pub fn new(geom: &Geometry, j: usize) -> Self {
        let seg = &geom.segments[j];
        Self {
            center: seg.center,
            direction: seg.direction,
            length: seg.length,
            radius: seg.radius,
            smooth_ends: SegmentEnd::BOTH.map(|end| smooth_end(geom, j, end)),
        }
    }

    /// Source view of a bare segment with both ends smooth.
    #[must_use]
    pub const fn isolated(seg: &Segment) -> Self {
        Self {
            center: seg.center,
            direction: seg.direction,
            length: seg.length,
            radius: seg.radius,
            smooth_ends: [true, true],
        }
    }
}

fn smooth_end(geom: &Geometry, j: usize, end: SegmentEnd) -> bool {
    let seg = &geom.segments[j];
    match seg.connection(end) {
        Connection::Free => true,
        Connection::Patch(_) => false,
        Connection::Ground => seg.direction.x.powi(2) + seg.direction.y.powi(2) <= 1.0e-8,
        Connection::Segment { index, end: other } => {
            let k = &geom.segments[index];
            let points_back = matches!(
                k.connection(other),
                Connection::Segment { index: back, .. } if back == j
            );
            points_back
                && seg.direction.dot(&k.direction).abs() >= 0.999_999
                && (k.radius / seg.radius - 1.0).abs() <= 1.0e-6
        }
    }
}

/// Field of the constant, sine and cosine current distributions of one
/// segment, as Cartesian vectors.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SegmentField {
    /// Constant current.
    pub constant: C3,
    /// `sin(ks)` current.
    pub sine: C3,
    /// `cos(ks)` current.
    pub cosine: C3,
}

impl SegmentField {
    /// Applies `f` to each of the three fields.
    #[must_use]
    pub fn map(self, mut f: impl FnMut(C3) -> C3) -> Self {
        Self {
            constant: f(self.constant),
            sine: f(self.sine),
            cosine: f(self.cosine),
        }
    }

    /// Tangential components `(constant, sine, cosine)` along `dir`.
    #[must_use]
    pub fn along(&self, dir: &R3) -> (CScalar, CScalar, CScalar) {
        (cdot(&self.constant, dir), cdot(&self.sine, dir), cdot(&self.cosine, dir))
    }

    /// Field of the current `a + b·sin(ks) + c·cos(ks)`.
    #[must_use]
    pub fn combine(&self, a: CScalar, b: CScalar, c: CScalar) -> C3 {
        self.constant * a + self.sine * b + self.cosine * c
    }
}

impl AddAssign for SegmentField {
    fn add_assign(&mut self, rhs: Self) {
        self.constant += rhs.constant;
        self.sine += rhs.sine;
        self.cosine += rhs.cosine;
    }
}

impl SubAssign for SegmentField {
    fn sub_assign(&mut self, rhs: Self) {
        self.constant -= rhs.constant;
        self.sine -= rhs.sine;
        self.cosine -= rhs.cosine;
    }
}

/// Far-separation approximation: the current lumped at the segment centre.
fn lumped(s: Scalar, zp: Scalar, rh: Scalar, r: Scalar) -> WireKernel {
    let rmag = TWO_PI * r;
    let cth = zp / r;
    let px = rh / r;
    let g = CScalar::new(rmag.cos(), -rmag.sin());
    let py = TWO_PI * r * r;
    let radial_part = ETA * cth * g * CScalar::new(1.0, -1.0 / rmag) / py;
    let theta_part = ETA * px * g * CScalar::new(1.0, rmag - 1.0 / rmag) / (2.0 * py);
    let axial = radial_part * cth - theta_part * px;
    let radial = radial_part * px + theta_part * cth;
    let sinc = (PI * s).sin() / PI;
    WireKernel {
        constant: KernelField {
            axial: axial * s,
            radial: radial * s,
        },
        sine: KernelField::default(),
        cosine: KernelField {
            axial: axial * sinc,
            radial: radial * sinc,
        },
        limited: false,
    }
}

fn cartesian(k: &KernelField, dir: &R3, rho: &R3) -> C3 {
    scale(dir, k.axial) + scale(rho, k.radial)
}

impl FieldEvaluator<'_> {
    /// Electric field at `obs` due to the source segment, including the
    /// ground image and the Sommerfeld correction when required.
    ///
    /// `ai` is the observer's wire radius; `singular` selects the self-term
    /// treatment of the direct field.
    pub fn wire_e(&mut self, src: &SourceSegment, obs: &R3, ai: Scalar, singular: bool) -> SegmentField {
        let xij = obs.x - src.center.x;
        let yij = obs.y - src.center.y;
        let mut total = SegmentField::default();

        for pass in 0..self.passes() {
            let image = pass == 1;
            let rfl = if image { -1.0 } else { 1.0 };
            let dir = R3::new(src.direction.x, src.direction.y, src.direction.z * rfl);
            let zij = obs.z - rfl * src.center.z;
            let d = R3::new(xij, yij, zij);
            let zp = d.dot(&dir);
            let mut rho = d - dir * zp;
            let rh = (rho.norm_squared() + ai * ai).sqrt();
            if rh <= 1.0e-10 {
                rho = R3::zeros();
            } else {
                rho /= rh;
            }

            let r = (zp * zp + rh * rh).sqrt();
            let kernel = if r >= self.rkh {
                lumped(src.length, zp, rh, r)
            } else if self.extended_kernel {
                extended_thin_wire(src.radius, src.length, zp, rh, singular && !image, src.smooth_ends)
            } else {
                thin_wire(src.length, zp, rh, singular && !image)
            };
            if kernel.limited {
                self.limited_steps += 1;
            }
            let mut field = SegmentField {
                constant: cartesian(&kernel.constant, &dir, &rho),
                sine: cartesian(&kernel.sine, &dir, &rho),
                cosine: cartesian(&kernel.cosine, &dir, &rho),
            };

            if !image {
                total = field;
                continue;
            }
            if self.ground.kind == GroundKind::ReflectionCoefficient {
                field = self.reflect_image(field, src, obs, xij, yij, zij, r);
            }
            let frati = self.ground.frati;
            total -= field.map(|v| v * frati);
        }

        if self.ground.is_sommerfeld() {
            total += self.sommerfeld_correction(src, obs, ai, &total.constant);
        }
        total
    }

    /// Scales an image field by the Fresnel coefficients at the specular
    /// point, with the radial screen's surface impedance when present.
    #[allow(clippy::too_many_arguments)]
    fn reflect_image(
        &self,
        field: SegmentField,
        src: &SourceSegment,
        obs: &R3,
        xij: Scalar,
        yij: Scalar,
        zij: Scalar,
        rmag: Scalar,
    ) -> SegmentField {
        let mut zratx = self.ground.zrati;
        if let Some(screen) = &self.ground.screen {
            let zsum = obs.z + src.center.z;
            let xspec = (obs.x * src.center.z + obs.z * src.center.x) / zsum;
            let yspec = (obs.y * src.center.z + obs.z * src.center.y) / zsum;
            let rhospc = (xspec * xspec + yspec * yspec + screen.t2 * screen.t2).sqrt();
            zratx = screen.impedance_ratio(rhospc, self.ground.zrati);
        }

        let (px, py, cth) = match incidence_normal(xij, yij) {
            Some((px, py)) => (px, py, zij / rmag),
            None => (0.0, 0.0, 1.0),
        };
        let (refs, rh) = fresnel(zratx, cth);
        let refps = -rh - refs;
        field.map(|v| {
            let epy = v.x * px + v.y * py;
            C3::new(refs * v.x + refps * px * epy, refs * v.y + refps * py * epy, refs * v.z)
        })
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::ground::{GroundParameters, GroundSpec};

    fn source(length: Scalar) -> SourceSegment {
        SourceSegment {
            center: R3::new(0.0, 0.0, 0.5),
            direction: R3::z(),
            length,
            radius: 0.001,
            smooth_ends: [true, true],
        }
    }

    #[test]
    fn lumped_and_integrated_fields_agree_at_moderate_range() {
        let free = GroundParameters::new(&GroundSpec::FreeSpace, 10.0).unwrap();
        let obs = R3::new(0.8, 0.0, 0.6);
        let src = source(0.02);
        let mut near = FieldEvaluator::new(&free, None, 10.0, false).unwrap();
        let mut far = FieldEvaluator::new(&free, None, 0.1, false).unwrap();
        let a = near.wire_e(&src, &obs, 0.0, false);
        let b = far.wire_e(&src, &obs, 0.0, false);
        let scale = a.constant.norm();
        assert!(scale > 0.0);
        assert_relative_eq!((a.constant - b.constant).norm() / scale, 0.0, epsilon = 1.0e-2);
        assert_relative_eq!((a.cosine - b.cosine).norm() / scale, 0.0, epsilon = 1.0e-2);
    }

    #[test]
    fn perfect_ground_cancels_tangential_field_on_the_plane() {
        let perfect = GroundParameters::new(&GroundSpec::Perfect, 10.0).unwrap();
        let mut eval = FieldEvaluator::new(&perfect, None, 1.0, false).unwrap();
        let src = SourceSegment {
            direction: R3::x(),
            ..source(0.05)
        };
        let f = eval.wire_e(&src, &R3::new(0.3, 0.2, 0.0), 0.0, false);
        for v in [f.constant, f.sine, f.cosine] {
            assert!(v.x.norm() < 1.0e-9 * (1.0 + v.z.norm()));
            assert!(v.y.norm() < 1.0e-9 * (1.0 + v.z.norm()));
        }
    }

    #[test]
    fn isolated_sources_use_smooth_ends() {
        let seg = Segment::from_ends(1, R3::zeros(), R3::new(0.0, 0.0, 0.1), 0.001);
        assert_eq!(SourceSegment::isolated(&seg).smooth_ends, [true, true]);
    }
}
