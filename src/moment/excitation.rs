//! Right-hand side of the matrix equation.
//!
//! Each entry is the negative of the incident field tested by the matching
//! row: the tangential E field at a segment centre, or `n × H` along a
//! patch tangent. Applied-voltage sources are lumped on their segment;
//! current-discontinuity sources radiate the field of their own basis
//! current into every row.

use nalgebra::DVector;

use crate::basis::{discontinuity_basis, BasisTerm};
use crate::constants::{CCJ, CURRENT_SOURCE_FIELD, RETA, TO_RAD, TWO_PI};
use crate::errors::{NecError, Result};
use crate::fields::{fresnel, FieldEvaluator, SourceSegment};
use crate::geometry::Geometry;
use crate::ground::GroundParameters;
use crate::math::{cdot, complexify, phasor, scale, CScalar, Scalar, C3, C_ONE, C_ZERO, J, R3};

use super::ScaledStructure;

/// Addresses the `m`-th (one-based) segment carrying `tag`; tag 0 addresses
/// absolute segment `m`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SegmentRef {
    /// Wire tag, or 0 for absolute numbering.
    pub tag: u32,
    /// One-based position within the tag.
    pub m: usize,
}

impl SegmentRef {
    /// Creates a reference.
    #[must_use]
    pub const fn new(tag: u32, m: usize) -> Self {
        Self { tag, m }
    }

    /// Absolute segment number `m` (one-based).
    #[must_use]
    pub const fn absolute(m: usize) -> Self {
        Self { tag: 0, m }
    }

    /// Zero-based segment index in `geom`.
    pub fn resolve(&self, geom: &Geometry) -> Result<usize> {
        geom.segment_by_tag(self.tag, self.m)
            .map_err(|e| NecError::Excitation(format!("source on tag {} segment {}: {e}", self.tag, self.m)))
    }
}

/// Polarization of an incident plane wave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Polarization {
    /// Linear, along the angle `eta`.
    #[default]
    Linear,
    /// Right-hand elliptic.
    RightElliptic,
    /// Left-hand elliptic.
    LeftElliptic,
}

/// One excitation record.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Excitation {
    /// Applied field of a voltage source across a segment.
    Voltage {
        /// Source segment.
        segment: SegmentRef,
        /// Source voltage in volts.
        voltage: CScalar,
    },
    /// Voltage source modelled as a discontinuity in current slope.
    Discontinuity {
        /// Source segment.
        segment: SegmentRef,
        /// Source voltage in volts.
        voltage: CScalar,
    },
    /// Incident plane wave of unit amplitude.
    PlaneWave {
        /// Polar angle of the arrival direction.
        theta_deg: Scalar,
        /// Azimuth of the arrival direction.
        phi_deg: Scalar,
        /// Polarization angle of the E vector.
        eta_deg: Scalar,
        /// Polarization kind.
        polarization: Polarization,
        /// Minor to major axis ratio of an elliptic wave.
        axial_ratio: Scalar,
    },
    /// Elementary current source.
    CurrentElement {
        /// Position in metres.
        position_m: R3,
        /// Elevation of the current direction above the x-y plane.
        elevation_deg: Scalar,
        /// Azimuth of the current direction from the x axis.
        azimuth_deg: Scalar,
        /// Current moment in ampere-metres.
        moment: Scalar,
    },
}

impl Excitation {
    /// True for fields arriving from outside the structure.
    #[must_use]
    pub const fn is_incident(&self) -> bool {
        matches!(self, Self::PlaneWave { .. } | Self::CurrentElement { .. })
    }

    const fn class(&self) -> ExcitationClass {
        match *self {
            Self::Voltage { .. } | Self::Discontinuity { .. } => ExcitationClass::Voltage,
            Self::PlaneWave { axial_ratio, .. } => ExcitationClass::PlaneWave { axial_ratio },
            Self::CurrentElement { moment, .. } => ExcitationClass::CurrentElement { moment },
        }
    }
}

/// Kind of excitation in effect, which decides how gain is normalised.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ExcitationClass {
    /// Voltage or discontinuity sources; gain follows input power.
    #[default]
    Voltage,
    /// Incident plane wave; patterns are scattering cross sections.
    PlaneWave {
        /// Axial ratio of the incident wave.
        axial_ratio: Scalar,
    },
    /// Elementary current source.
    CurrentElement {
        /// Moment in ampere-metres.
        moment: Scalar,
    },
}

/// A current-discontinuity source after it has been applied.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DiscontinuitySource {
    /// Zero-based source segment.
    pub segment: usize,
    /// Source voltage.
    pub voltage: CScalar,
    /// Basis function of the source, own segment last.
    pub terms: Vec<BasisTerm>,
    /// Amplitude of `terms`, in wavelength-normalised units.
    pub current: CScalar,
}

/// Excitation vector of one frequency step with its source records.
#[derive(Debug, Clone, PartialEq)]
pub struct ExcitationVector {
    /// Right-hand side, one entry per unknown.
    pub vector: DVector<CScalar>,
    /// Applied-voltage sources as `(segment, voltage)`.
    pub voltage_sources: Vec<(usize, CScalar)>,
    /// Discontinuity sources.
    pub discontinuities: Vec<DiscontinuitySource>,
    /// Normalisation class.
    pub class: ExcitationClass,
}

impl ExcitationVector {
    /// Segments carrying any voltage source, applied first.
    pub fn source_segments(&self) -> impl Iterator<Item = usize> + '_ {
        self.voltage_sources
            .iter()
            .map(|(s, _)| *s)
            .chain(self.discontinuities.iter().map(|d| d.segment))
    }
}

/// Builds the excitation vector of `excitations` on `structure`.
///
/// Plane waves and current elements must be the only excitation; any number
/// of voltage and discontinuity sources may be combined, one per segment.
/// `loads` must be the same per-segment impedances used for the fill.
pub fn build_excitation(
    structure: &ScaledStructure,
    eval: &mut FieldEvaluator<'_>,
    excitations: &[Excitation],
    loads: Option<&[CScalar]>,
) -> Result<ExcitationVector> {
    let class = classify(excitations)?;
    let geom = &structure.geometry;
    let lambda = structure.wavelength;
    let mut out = ExcitationVector {
        vector: DVector::from_element(structure.unknowns(), C_ZERO),
        voltage_sources: Vec::new(),
        discontinuities: Vec::new(),
        class,
    };
    let mut claimed = Vec::new();
    let mut claim = |segment: &SegmentRef| -> Result<usize> {
        let is = segment.resolve(geom)?;
        if claimed.contains(&is) {
            return Err(NecError::Excitation(format!("segment {} carries more than one source", is + 1)));
        }
        claimed.push(is);
        Ok(is)
    };

    // Discontinuity fields add onto the applied fields, so voltages go first.
    for ex in excitations {
        if let Excitation::Voltage { segment, voltage } = ex {
            let is = claim(segment)?;
            let v = unit_if_zero(*voltage);
            out.vector[is] = -v / (geom.segments[is].length * lambda);
            out.voltage_sources.push((is, v));
        }
    }
    for ex in excitations {
        match *ex {
            Excitation::Voltage { .. } => {}
            Excitation::Discontinuity { segment, voltage } => {
                let is = claim(&segment)?;
                let source = discontinuity_source(structure, eval, is, unit_if_zero(voltage), loads, &mut out.vector)?;
                out.discontinuities.push(source);
            }
            Excitation::PlaneWave {
                theta_deg,
                phi_deg,
                eta_deg,
                polarization,
                axial_ratio,
            } => {
                let ellipticity = match polarization {
                    Polarization::Linear => C_ZERO,
                    Polarization::RightElliptic => -J * axial_ratio,
                    Polarization::LeftElliptic => J * axial_ratio,
                };
                let wave = PlaneWave::new(theta_deg * TO_RAD, phi_deg * TO_RAD, eta_deg * TO_RAD, ellipticity);
                wave.apply(geom, eval.ground(), &mut out.vector);
            }
            Excitation::CurrentElement {
                position_m,
                elevation_deg,
                azimuth_deg,
                moment,
            } => {
                let element = CurrentElement::new(
                    position_m / lambda,
                    elevation_deg * TO_RAD,
                    azimuth_deg * TO_RAD,
                    moment / (lambda * lambda),
                );
                element.apply(geom, &mut out.vector);
            }
        }
    }

    tracing::debug!(
        voltage = out.voltage_sources.len(),
        discontinuity = out.discontinuities.len(),
        class = ?out.class,
        "excitation vector built"
    );
    Ok(out)
}

fn classify(excitations: &[Excitation]) -> Result<ExcitationClass> {
    let mut incident = excitations.iter().filter(|e| e.is_incident());
    match (incident.next(), excitations.len()) {
        (_, 0) => Err(NecError::Excitation("no excitation specified".into())),
        (None, _) => Ok(ExcitationClass::Voltage),
        (Some(one), 1) => Ok(one.class()),
        (Some(_), _) => Err(NecError::Excitation(
            "an incident plane wave or current element must be the only excitation".into(),
        )),
    }
}

/// A source given as zero volts drives one volt.
fn unit_if_zero(v: CScalar) -> CScalar {
    if v.norm() < 1.0e-20 {
        C_ONE
    } else {
        v
    }
}

fn discontinuity_source(
    structure: &ScaledStructure,
    eval: &mut FieldEvaluator<'_>,
    is: usize,
    voltage: CScalar,
    loads: Option<&[CScalar]>,
    e: &mut DVector<CScalar>,
) -> Result<DiscontinuitySource> {
    let geom = &structure.geometry;
    let n = geom.segment_count();
    let terms = discontinuity_basis(geom, is)?;
    let own = terms
        .last()
        .copied()
        .ok_or_else(|| NecError::Excitation(format!("segment {} has no source basis", is + 1)))?;

    let seg = &geom.segments[is];
    let s = 0.5 * seg.length;
    let (sin, cos) = (TWO_PI * s).sin_cos();
    let den = ((2.0 * s / seg.radius).ln() - 1.0) * (own.b * cos + own.c * sin) * structure.wavelength;
    if !den.is_finite() || den == 0.0 {
        return Err(NecError::Excitation(format!(
            "discontinuity source on segment {} is degenerate",
            is + 1
        )));
    }
    let curd = CCJ * voltage / den;

    for t in &terms {
        let src = SourceSegment::new(geom, t.segment);
        for (i, obs) in geom.segments.iter().enumerate() {
            let field = eval.wire_e(&src, &obs.center, obs.radius, i == t.segment);
            let (k, sn, cs) = field.along(&obs.direction);
            e[i] -= (k * t.a + sn * t.b + cs * t.c) * curd;
        }
        for (p, patch) in geom.patches.iter().enumerate() {
            let h = eval.wire_h(&src, &patch.center, 0.0);
            for (row, tangent) in [(n + 2 * p, &patch.t2), (n + 2 * p + 1, &patch.t1)] {
                let (k, sn, cs) = h.along(tangent);
                e[row] += (k * t.a + sn * t.b + cs * t.c) * curd * patch.handedness;
            }
        }
        if let Some(z) = loads {
            e[t.segment] += z[t.segment] * curd * (t.a + t.c);
        }
    }

    Ok(DiscontinuitySource {
        segment: is,
        voltage,
        terms,
        current: curd,
    })
}

/// Incident plane wave with its polarization vectors.
struct PlaneWave {
    cth: Scalar,
    sph: Scalar,
    cph: Scalar,
    /// Unit propagation vector.
    w: R3,
    /// Complex E polarization.
    electric: C3,
    /// Complex H polarization, scaled by the free-space impedance.
    magnetic: C3,
}

impl PlaneWave {
    fn new(theta: Scalar, phi: Scalar, eta: Scalar, ellipticity: CScalar) -> Self {
        let (sth, cth) = theta.sin_cos();
        let (sph, cph) = phi.sin_cos();
        let (set, cet) = eta.sin_cos();
        let p = R3::new(cth * cph * cet - sph * set, cth * sph * cet + cph * set, -sth * cet);
        let w = R3::new(-sth * cph, -sth * sph, -cth);
        let q = w.cross(&p);
        Self {
            cth,
            sph,
            cph,
            w,
            electric: complexify(&p) + scale(&q, ellipticity),
            magnetic: complexify(&q) - scale(&p, ellipticity),
        }
    }

    fn phase(&self, r: &R3, image: bool) -> CScalar {
        let z = if image { -r.z } else { r.z };
        phasor(-TWO_PI * (self.w.x * r.x + self.w.y * r.y + self.w.z * z))
    }

    /// `(R_v, R_h)` of the ground for this arrival angle.
    fn reflection(&self, ground: &GroundParameters) -> (CScalar, CScalar) {
        if ground.is_perfect() {
            (-C_ONE, -C_ONE)
        } else {
            let (rv, rh) = fresnel(ground.zrati, self.cth);
            (-rv, rh)
        }
    }

    fn reflected_electric(&self, c: &C3, (rv, rh): (CScalar, CScalar)) -> C3 {
        let t = (c.y * self.cph - c.x * self.sph) * (rh - rv);
        C3::new(rv * c.x - t * self.sph, rv * c.y + t * self.cph, -rv * c.z)
    }

    fn reflected_magnetic(&self, c: &C3, (rv, rh): (CScalar, CScalar)) -> C3 {
        let t = (c.y * self.cph - c.x * self.sph) * (rv - rh);
        C3::new(-(rh * c.x - t * self.sph), -(rh * c.y + t * self.cph), rh * c.z)
    }

    fn apply(&self, geom: &Geometry, ground: &GroundParameters, e: &mut DVector<CScalar>) {
        let n = geom.segment_count();
        let coefficients = ground.has_image().then(|| self.reflection(ground));

        for (i, seg) in geom.segments.iter().enumerate() {
            e[i] = -cdot(&self.electric, &seg.direction) * self.phase(&seg.center, false);
        }
        for (p, patch) in geom.patches.iter().enumerate() {
            let tt = self.phase(&patch.center, false) * patch.handedness * RETA;
            e[n + 2 * p + 1] = cdot(&self.magnetic, &patch.t1) * tt;
            e[n + 2 * p] = cdot(&self.magnetic, &patch.t2) * tt;
        }

        let Some(rr) = coefficients else {
            return;
        };
        let electric = self.reflected_electric(&self.electric, rr);
        for (i, seg) in geom.segments.iter().enumerate() {
            e[i] -= cdot(&electric, &seg.direction) * self.phase(&seg.center, true);
        }
        let magnetic = self.reflected_magnetic(&self.magnetic, rr);
        for (p, patch) in geom.patches.iter().enumerate() {
            let tt = self.phase(&patch.center, true) * patch.handedness * RETA;
            e[n + 2 * p + 1] += cdot(&magnetic, &patch.t1) * tt;
            e[n + 2 * p] += cdot(&magnetic, &patch.t2) * tt;
        }
    }
}

/// Elementary current source in free space, wavelength units.
struct CurrentElement {
    position: R3,
    direction: R3,
    moment: Scalar,
}

/// Geometry of an observation point relative to the element.
struct Offset {
    r: Scalar,
    cth: Scalar,
    sth: Scalar,
    /// Unit vector normal to the element in the plane of the observer.
    q: R3,
}

impl CurrentElement {
    fn new(position: R3, elevation: Scalar, azimuth: Scalar, moment: Scalar) -> Self {
        let (sel, cel) = elevation.sin_cos();
        let (saz, caz) = azimuth.sin_cos();
        Self {
            position,
            direction: R3::new(cel * caz, cel * saz, sel),
            moment,
        }
    }

    fn offset(&self, obs: &R3) -> Option<Offset> {
        let d = obs - self.position;
        let rs = d.norm_squared();
        if rs < 1.0e-30 {
            return None;
        }
        let r = rs.sqrt();
        let u = d / r;
        let cth = u.dot(&self.direction);
        let sth = (1.0 - cth * cth).max(0.0).sqrt();
        let q = u - self.direction * cth;
        let qn = q.norm();
        let q = if qn >= 1.0e-30 { q / qn } else { R3::x() };
        Some(Offset { r, cth, sth, q })
    }

    fn apply(&self, geom: &Geometry, e: &mut DVector<CScalar>) {
        let n = geom.segment_count();
        let ds = self.moment * CURRENT_SOURCE_FIELD;
        let dsh = self.moment / (2.0 * TWO_PI);

        for (i, seg) in geom.segments.iter().enumerate() {
            let Some(Offset { r, cth, sth, q }) = self.offset(&seg.center) else {
                continue;
            };
            let retard = phasor(-TWO_PI * r);
            let radial = CScalar::new(1.0, -1.0 / (r * TWO_PI)) / (r * r);
            let er = ds * retard * radial * cth;
            let et = 0.5 * ds * retard * (J * TWO_PI / r + radial) * sth;
            let ez = er * cth - et * sth;
            let eq = er * sth + et * cth;
            let field = scale(&self.direction, ez) + scale(&q, eq);
            e[i] = -cdot(&field, &seg.direction);
        }

        for (p, patch) in geom.patches.iter().enumerate() {
            let Some(Offset { r, sth, q, .. }) = self.offset(&patch.center) else {
                continue;
            };
            let retard = phasor(-TWO_PI * r);
            let hphi = self.direction.cross(&q);
            let tt = dsh * retard * CScalar::new(1.0 / r, TWO_PI) / r * sth * patch.handedness;
            e[n + 2 * p + 1] = tt * hphi.dot(&patch.t1);
            e[n + 2 * p] = tt * hphi.dot(&patch.t2);
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::constants::DEFAULT_RKH;
    use crate::geometry::GeometryBuilder;
    use crate::ground::GroundSpec;

    fn structure(ns: usize, p1: R3, p2: R3, ground: bool) -> ScaledStructure {
        let mut b = GeometryBuilder::new();
        b.wire(1, ns, p1, p2, 0.001, 1.0, 1.0).unwrap();
        let g = b.finish(ground).unwrap();
        ScaledStructure::new(&g, 299.8).unwrap()
    }

    fn dipole(ns: usize) -> ScaledStructure {
        structure(ns, R3::new(0.0, 0.0, -0.25), R3::new(0.0, 0.0, 0.25), false)
    }

    fn params(spec: &GroundSpec) -> GroundParameters {
        GroundParameters::new(spec, 1.0).unwrap()
    }

    #[test]
    fn voltage_source_drives_only_its_segment() {
        let s = dipole(5);
        let ground = params(&GroundSpec::FreeSpace);
        let mut eval = FieldEvaluator::new(&ground, None, DEFAULT_RKH, false).unwrap();
        let ex = [Excitation::Voltage {
            segment: SegmentRef::new(1, 3),
            voltage: CScalar::new(2.0, 0.0),
        }];
        let v = build_excitation(&s, &mut eval, &ex, None).unwrap();
        assert_eq!(v.voltage_sources, vec![(2, CScalar::new(2.0, 0.0))]);
        assert_eq!(v.class, ExcitationClass::Voltage);
        for i in [0, 1, 3, 4] {
            assert_eq!(v.vector[i], C_ZERO);
        }
        // Segment length is 0.1 m.
        assert_relative_eq!(v.vector[2].re, -20.0, max_relative = 1.0e-9);
    }

    #[test]
    fn zero_voltage_defaults_to_one_volt() {
        let s = dipole(3);
        let ground = params(&GroundSpec::FreeSpace);
        let mut eval = FieldEvaluator::new(&ground, None, DEFAULT_RKH, false).unwrap();
        let ex = [Excitation::Voltage {
            segment: SegmentRef::absolute(2),
            voltage: C_ZERO,
        }];
        let v = build_excitation(&s, &mut eval, &ex, None).unwrap();
        assert_eq!(v.voltage_sources[0].1, C_ONE);
    }

    #[test]
    fn incident_fields_cannot_be_mixed_or_missing() {
        let s = dipole(3);
        let ground = params(&GroundSpec::FreeSpace);
        let mut eval = FieldEvaluator::new(&ground, None, DEFAULT_RKH, false).unwrap();
        let wave = Excitation::PlaneWave {
            theta_deg: 90.0,
            phi_deg: 0.0,
            eta_deg: 0.0,
            polarization: Polarization::Linear,
            axial_ratio: 0.0,
        };
        let source = Excitation::Voltage {
            segment: SegmentRef::absolute(2),
            voltage: C_ONE,
        };
        assert!(matches!(
            build_excitation(&s, &mut eval, &[wave, source], None),
            Err(NecError::Excitation(_))
        ));
        assert!(matches!(build_excitation(&s, &mut eval, &[], None), Err(NecError::Excitation(_))));
        assert!(matches!(
            build_excitation(&s, &mut eval, &[source, source], None),
            Err(NecError::Excitation(_))
        ));
        let missing = Excitation::Voltage {
            segment: SegmentRef::new(7, 1),
            voltage: C_ONE,
        };
        assert!(matches!(
            build_excitation(&s, &mut eval, &[missing], None),
            Err(NecError::Excitation(_))
        ));
    }

    #[test]
    fn broadside_plane_wave_is_uniform_on_a_vertical_wire() {
        let s = dipole(5);
        let ground = params(&GroundSpec::FreeSpace);
        let mut eval = FieldEvaluator::new(&ground, None, DEFAULT_RKH, false).unwrap();
        let ex = [Excitation::PlaneWave {
            theta_deg: 90.0,
            phi_deg: 0.0,
            eta_deg: 0.0,
            polarization: Polarization::Linear,
            axial_ratio: 0.0,
        }];
        let v = build_excitation(&s, &mut eval, &ex, None).unwrap();
        assert_eq!(v.class, ExcitationClass::PlaneWave { axial_ratio: 0.0 });
        for e in v.vector.iter() {
            assert_relative_eq!(e.re, 1.0, epsilon = 1.0e-9);
            assert_relative_eq!(e.im, 0.0, epsilon = 1.0e-9);
        }
    }

    #[test]
    fn perfect_ground_cancels_at_the_plane_and_doubles_a_quarter_wave_up() {
        // Horizontal wire a quarter wavelength above perfect ground, wave
        // arriving from the zenith polarized along the wire.
        let s = structure(3, R3::new(-0.1, 0.0, 0.25), R3::new(0.1, 0.0, 0.25), true);
        let ground = params(&GroundSpec::Perfect);
        let mut eval = FieldEvaluator::new(&ground, None, DEFAULT_RKH, false).unwrap();
        let ex = [Excitation::PlaneWave {
            theta_deg: 0.0,
            phi_deg: 0.0,
            eta_deg: 0.0,
            polarization: Polarization::Linear,
            axial_ratio: 0.0,
        }];
        let v = build_excitation(&s, &mut eval, &ex, None).unwrap();
        for e in v.vector.iter() {
            assert_relative_eq!(e.re, 0.0, epsilon = 1.0e-9);
            assert_relative_eq!(e.im, -2.0, epsilon = 1.0e-9);
        }
    }

    #[test]
    fn current_element_field_is_symmetric_about_its_plane() {
        let s = dipole(6);
        let ground = params(&GroundSpec::FreeSpace);
        let mut eval = FieldEvaluator::new(&ground, None, DEFAULT_RKH, false).unwrap();
        let ex = [Excitation::CurrentElement {
            position_m: R3::new(2.0, 0.0, 0.0),
            elevation_deg: 90.0,
            azimuth_deg: 0.0,
            moment: 1.0,
        }];
        let v = build_excitation(&s, &mut eval, &ex, None).unwrap();
        for i in 0..3 {
            let (a, b) = (v.vector[i], v.vector[5 - i]);
            assert!(a.norm() > 0.0);
            assert_relative_eq!((a - b).norm() / a.norm(), 0.0, epsilon = 1.0e-9);
        }
    }

    #[test]
    fn discontinuity_source_is_recorded_and_radiates() {
        let s = dipole(7);
        let ground = params(&GroundSpec::FreeSpace);
        let mut eval = FieldEvaluator::new(&ground, None, DEFAULT_RKH, false).unwrap();
        let ex = [Excitation::Discontinuity {
            segment: SegmentRef::new(1, 4),
            voltage: C_ONE,
        }];
        let v = build_excitation(&s, &mut eval, &ex, None).unwrap();
        assert_eq!(v.discontinuities.len(), 1);
        let d = &v.discontinuities[0];
        assert_eq!(d.segment, 3);
        assert_eq!(d.terms.last().map(|t| t.segment), Some(3));
        assert!(d.current.norm() > 0.0);
        assert!(v.vector.iter().all(|e| e.norm() > 0.0));
        assert_eq!(v.source_segments().collect::<Vec<_>>(), vec![3]);
    }
}
