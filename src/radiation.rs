//! Far-zone radiation patterns.
//!
//! The far field of the segment currents is integrated in closed form over
//! each segment's sinusoidal expansion; patches radiate as point current
//! elements. Over ground the image is added with the plane-wave reflection
//! coefficients of the ground, locally replaced by those of a radial wire
//! screen or a second medium beyond a straight cliff at the specular point.

use std::time::Instant;

use crate::circuits::PowerBudget;
use crate::constants::{db10, CONST3, CONST4, CURRENT_SOURCE_POWER, ETA, FOUR_PI, PI, TO_RAD, TWO_PI};
use crate::errors::{NecError, Result};
use crate::fields::fresnel;
use crate::ground::GroundParameters;
use crate::math::{phasor, CScalar, Scalar, C3, C_ONE, R3};
use crate::moment::{CurrentDistribution, ExcitationClass, ScaledStructure};

/// Gain reported for each direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GainType {
    /// Along the major axis of the polarization ellipse.
    Major,
    /// Along the minor axis.
    Minor,
    /// θ component.
    Vertical,
    /// φ component.
    Horizontal,
    /// Both components.
    #[default]
    Total,
}

/// Sense of rotation of the polarization ellipse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PolarizationSense {
    /// Axial ratio below 1e-5.
    Linear,
    /// Right-hand rotation.
    Right,
    /// Left-hand rotation.
    Left,
}

/// Receiving polarization used to weight the gain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PolarizationFilter {
    /// No weighting.
    Total,
    /// Horizontal linear.
    Horizontal,
    /// Vertical linear.
    Vertical,
    /// Right-hand circular.
    RightCircular,
    /// Left-hand circular.
    LeftCircular,
}

impl PolarizationFilter {
    /// Every filter, in the order of [`RadiationPattern::extremes`].
    pub const ALL: [Self; 5] = [
        Self::Total,
        Self::Horizontal,
        Self::Vertical,
        Self::RightCircular,
        Self::LeftCircular,
    ];

    /// Fraction of the power received, in dB, from a wave of signed axial
    /// ratio `axial_ratio` (negative for right-hand) and tilt `tilt` radians.
    #[must_use]
    pub fn factor_db(self, axial_ratio: Scalar, tilt: Scalar) -> Scalar {
        let ax2 = axial_ratio * axial_ratio;
        let polf = match self {
            Self::Total => 1.0,
            Self::Horizontal => (ax2 + (1.0 - ax2) * tilt.sin().powi(2)) / (1.0 + ax2),
            Self::Vertical => (ax2 + (1.0 - ax2) * tilt.cos().powi(2)) / (1.0 + ax2),
            Self::LeftCircular => (1.0 + 2.0 * axial_ratio + ax2) / 2.0 / (1.0 + ax2),
            Self::RightCircular => (1.0 - 2.0 * axial_ratio + ax2) / 2.0 / (1.0 + ax2),
        };
        10.0 * polf.max(1.0e-200).log10()
    }
}

/// Far-field request in degrees and metres.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FarFieldRequest {
    /// First θ.
    pub theta_start: Scalar,
    /// θ increment.
    pub theta_step: Scalar,
    /// Number of θ values.
    pub theta_count: usize,
    /// First φ.
    pub phi_start: Scalar,
    /// φ increment.
    pub phi_step: Scalar,
    /// Number of φ values.
    pub phi_count: usize,
    /// Range of the reported field; 0 gives the field times range at 1 m.
    pub range_m: Scalar,
    /// Gain reported in [`PatternPoint::gain_db`].
    pub gain: GainType,
    /// Directive rather than power gain.
    pub directive: bool,
    /// Also report gains relative to the maximum.
    pub normalize: bool,
    /// Surface-wave field at ground level; not supported.
    pub surface_wave: bool,
    /// Average power gain over the pattern; not supported.
    pub average_gain: bool,
}

impl Default for FarFieldRequest {
    fn default() -> Self {
        Self {
            theta_start: 0.0,
            theta_step: 5.0,
            theta_count: 37,
            phi_start: 0.0,
            phi_step: 5.0,
            phi_count: 73,
            range_m: 0.0,
            gain: GainType::Total,
            directive: false,
            normalize: false,
            surface_wave: false,
            average_gain: false,
        }
    }
}

impl FarFieldRequest {
    /// θ/φ grid with the given starts, steps and counts.
    #[must_use]
    pub fn grid(theta: (Scalar, Scalar, usize), phi: (Scalar, Scalar, usize)) -> Self {
        Self {
            theta_start: theta.0,
            theta_step: theta.1,
            theta_count: theta.2,
            phi_start: phi.0,
            phi_step: phi.1,
            phi_count: phi.2,
            ..Self::default()
        }
    }

    /// Rejects what the pattern computation cannot do.
    pub fn validate(&self, ground: &GroundParameters) -> Result<()> {
        if self.surface_wave {
            return Err(NecError::Config("surface-wave far field is not supported".into()));
        }
        if self.average_gain {
            return Err(NecError::Config("average gain over the pattern is not supported".into()));
        }
        if self.theta_count == 0 || self.phi_count == 0 {
            return Err(NecError::Config("far-field request has no directions".into()));
        }
        if ground.has_image() {
            let last = self.theta_start + (self.theta_count - 1) as Scalar * self.theta_step;
            if self.theta_start.max(last) > 90.01 {
                return Err(NecError::Config("theta above 90 degrees with ground specified".into()));
            }
        }
        Ok(())
    }

    /// `(θ, φ)` of every direction, θ varying fastest.
    pub fn directions(&self) -> impl Iterator<Item = (Scalar, Scalar)> + '_ {
        (0..self.phi_count).flat_map(move |kp| {
            let phi = self.phi_start + kp as Scalar * self.phi_step;
            (0..self.theta_count).map(move |kt| (self.theta_start + kt as Scalar * self.theta_step, phi))
        })
    }
}

/// Pattern values in one direction.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PatternPoint {
    /// θ in degrees.
    pub theta: Scalar,
    /// φ in degrees.
    pub phi: Scalar,
    /// θ component of E in V/m at the requested range.
    pub e_theta: CScalar,
    /// φ component of E in V/m at the requested range.
    pub e_phi: CScalar,
    /// Major-axis gain in dB.
    pub major_db: Scalar,
    /// Minor-axis gain in dB.
    pub minor_db: Scalar,
    /// Vertical gain in dB.
    pub vertical_db: Scalar,
    /// Horizontal gain in dB.
    pub horizontal_db: Scalar,
    /// Total gain in dB.
    pub total_db: Scalar,
    /// The gain selected by the request.
    pub gain_db: Scalar,
    /// Axial ratio, negative for right-hand rotation.
    pub axial_ratio: Scalar,
    /// Tilt of the major axis from the θ direction, radians.
    pub tilt: Scalar,
    /// Rotation sense.
    pub sense: PolarizationSense,
}

/// Largest and smallest gain for one receiving polarization.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GainExtremes {
    /// Maximum gain in dB.
    pub max_db: Scalar,
    /// Index of the maximum in [`RadiationPattern::points`].
    pub max_index: usize,
    /// θ of the maximum.
    pub max_theta: Scalar,
    /// φ of the maximum.
    pub max_phi: Scalar,
    /// Minimum gain in dB.
    pub min_db: Scalar,
    /// Index of the minimum.
    pub min_index: usize,
}

impl Default for GainExtremes {
    fn default() -> Self {
        Self {
            max_db: -10_000.0,
            max_index: 0,
            max_theta: 0.0,
            max_phi: 0.0,
            min_db: 10_000.0,
            min_index: 0,
        }
    }
}

/// A computed pattern.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RadiationPattern {
    /// One entry per direction, θ varying fastest.
    pub points: Vec<PatternPoint>,
    /// θ values per φ cut.
    pub theta_count: usize,
    /// Number of φ cuts.
    pub phi_count: usize,
    /// Extremes in the order of [`PolarizationFilter::ALL`].
    pub extremes: [GainExtremes; 5],
    /// `gain_db` less its maximum, when normalisation was requested.
    pub normalized_db: Option<Vec<Scalar>>,
    /// Constant that turns `|E|²` into gain.
    pub gain_constant: Scalar,
}

impl RadiationPattern {
    /// Extremes for one receiving polarization.
    #[must_use]
    pub fn extremes_for(&self, filter: PolarizationFilter) -> &GainExtremes {
        let k = PolarizationFilter::ALL.iter().position(|f| *f == filter).unwrap_or(0);
        &self.extremes[k]
    }
}

/// Reflection model of the image at the far field.
#[derive(Debug, Clone, Copy)]
enum FarGround {
    FreeSpace,
    Infinite,
    /// Straight cliff, optionally with a screen near the origin.
    Cliff {
        distance: Scalar,
        height: Scalar,
        zrati2: CScalar,
        screen: bool,
    },
    Screen,
}

/// Far-zone field evaluator for one current distribution.
#[derive(Debug, Clone, Copy)]
pub struct FarField<'a> {
    structure: &'a ScaledStructure,
    currents: &'a CurrentDistribution,
    ground: &'a GroundParameters,
    model: FarGround,
}

impl<'a> FarField<'a> {
    /// Evaluator for `currents` flowing on `structure` over `ground`.
    #[must_use]
    pub fn new(structure: &'a ScaledStructure, currents: &'a CurrentDistribution, ground: &'a GroundParameters) -> Self {
        let model = if !ground.has_image() {
            FarGround::FreeSpace
        } else if ground.is_perfect() {
            FarGround::Infinite
        } else {
            match (ground.cliff, ground.screen.is_some()) {
                (Some(c), screen) => FarGround::Cliff {
                    distance: c.distance,
                    height: c.height,
                    zrati2: c.zrati,
                    screen,
                },
                (None, true) => FarGround::Screen,
                (None, false) => FarGround::Infinite,
            }
        };
        Self {
            structure,
            currents,
            ground,
            model,
        }
    }

    fn reflection(&self, zrati: CScalar, cos_theta: Scalar) -> (CScalar, CScalar) {
        if self.ground.is_perfect() {
            return (-C_ONE, -C_ONE);
        }
        let (rv, rh) = fresnel(zrati, cos_theta);
        (-rv, rh)
    }

    /// `(E_θ, E_φ)` in direction `(theta, phi)` radians without the
    /// `exp(-jkr)/(r/λ)` factor.
    #[must_use]
    pub fn field(&self, theta: Scalar, phi: Scalar) -> (CScalar, CScalar) {
        let (sph, cph) = phi.sin_cos();
        let (sth, cth) = theta.sin_cos();
        let ph = R3::new(-sph, cph, 0.0);
        let th = R3::new(cth * cph, cth * sph, -sth);
        let ro = R3::new(sth * cph, sth * sph, cth);

        let mut ci = C3::zeros();
        if self.structure.segment_count() > 0 {
            ci = self.segment_sum(&ro);
            if self.ground.has_image() {
                ci = self.add_segment_image(ci, theta, &ro, &ph);
            }
        }

        let mut e = C3::zeros();
        if self.structure.geometry.patch_count() > 0 {
            e = self.patch_sum(&ro);
            if self.ground.has_image() {
                let mut g = self.patch_sum(&R3::new(ro.x, ro.y, -ro.z));
                if self.ground.is_perfect() {
                    g = -g;
                } else {
                    let (rrv, rrh) = self.reflection(self.ground.zrati, cth);
                    let t = (g.x * ph.x + g.y * ph.y) * (rrh - rrv);
                    g = C3::new(g.x * rrv + t * ph.x, g.y * rrv + t * ph.y, g.z * rrv);
                }
                e += C3::new(g.x, g.y, -g.z);
            }
        }

        e += ci * CONST3;
        let e_theta = e.x * th.x + e.y * th.y + e.z * th.z;
        let e_phi = e.x * ph.x + e.y * ph.y;
        (e_theta, e_phi)
    }

    /// Radiation integral of the segment currents toward `ro`.
    fn segment_sum(&self, ro: &R3) -> C3 {
        let mut ci = C3::zeros();
        for (i, seg) in self.structure.geometry.segments.iter().enumerate() {
            let exa = self.segment_term(i, ro);
            ci += C3::new(exa * seg.direction.x, exa * seg.direction.y, exa * seg.direction.z);
        }
        ci
    }

    fn segment_term(&self, i: usize, ro: &R3) -> CScalar {
        let seg = &self.structure.geometry.segments[i];
        let k = &self.currents.coefficients[i];
        let omega = -ro.dot(&seg.direction);
        let el = PI * seg.length;
        let sill = omega * el;
        let top = el + sill;
        let bot = el - sill;
        let a = if omega.abs() >= 1.0e-7 {
            2.0 * sill.sin() / omega
        } else {
            (2.0 - omega * omega * el * el / 3.0) * el
        };
        let sinc = |x: Scalar| if x.abs() >= 1.0e-7 { x.sin() / x } else { 1.0 - x * x / 6.0 };
        let (too, boo) = (sinc(top), sinc(bot));
        let b = el * (boo - too);
        let c = el * (boo + too);
        let amplitude = k.a * a + k.c * c + CScalar::new(k.b.im, -k.b.re) * b;
        phasor(TWO_PI * seg.center.dot(ro)) * amplitude
    }

    fn add_segment_image(&self, direct: C3, theta: Scalar, ro: &R3, ph: &R3) -> C3 {
        let cth = theta.cos();
        let (rrv1, rrh1) = self.reflection(self.ground.zrati, cth);
        let ri = R3::new(ro.x, ro.y, -ro.z);

        let (cliff, screen) = match self.model {
            FarGround::Cliff {
                distance,
                height,
                zrati2,
                screen,
            } => {
                let (rrv2, rrh2) = self.reflection(zrati2, cth);
                let darg = -TWO_PI * 2.0 * height * cth;
                (Some((distance, rrv2, rrh2, darg)), screen)
            }
            FarGround::Screen => (None, true),
            _ => {
                let ci = self.segment_sum(&ri);
                let t = (ci.x * ph.x + ci.y * ph.y) * (rrh1 - rrv1);
                return direct + C3::new(ci.x * rrv1 + t * ph.x, ci.y * rrv1 + t * ph.y, -ci.z * rrv1);
            }
        };

        let tthet = theta.tan();
        let mut ci = C3::zeros();
        for (i, seg) in self.structure.geometry.segments.iter().enumerate() {
            let mut exa = self.segment_term(i, &ri);
            let dr = seg.center.z * tthet;
            let along = dr * ph.y + seg.center.x;
            let radial = along.hypot(seg.center.y - dr * ph.x);

            let mut coefficients = (rrv1, rrh1);
            let on_screen = screen
                && self
                    .ground
                    .screen
                    .is_some_and(|s| s.length - radial >= 0.0);
            if on_screen {
                coefficients = self.screen_reflection(radial, cth);
            } else if let Some((distance, rrv2, rrh2, darg)) = cliff {
                if distance - along <= 0.0 {
                    coefficients = (rrv2, rrh2);
                    exa *= phasor(darg);
                }
            }

            let (rrv, rrh) = coefficients;
            let t = C3::new(exa * seg.direction.x, exa * seg.direction.y, exa * seg.direction.z);
            let cdp = (t.x * ph.x + t.y * ph.y) * (rrh - rrv);
            ci += C3::new(t.x * rrv + cdp * ph.x, t.y * rrv + cdp * ph.y, -t.z * rrv);
        }
        direct + ci
    }

    fn screen_reflection(&self, radial: Scalar, cth: Scalar) -> (CScalar, CScalar) {
        let Some(screen) = self.ground.screen else {
            return self.reflection(self.ground.zrati, cth);
        };
        let d = radial + screen.t2;
        let mut zscrn = screen.t1 * d * (d / screen.t2).ln();
        zscrn = (zscrn * self.ground.zrati) / (ETA * self.ground.zrati + zscrn);
        let zrsin = (C_ONE - zscrn * zscrn * (1.0 - cth * cth)).sqrt();
        let rrv = (cth + zscrn * zrsin) / (-cth + zscrn * zrsin);
        let rrh = (zscrn * cth + zrsin) / (zscrn * cth - zrsin);
        (rrv, rrh)
    }

    fn patch_sum(&self, ro: &R3) -> C3 {
        let mut e = C3::zeros();
        for (patch, j) in self.structure.geometry.patches.iter().zip(&self.currents.patch_currents) {
            let ct = phasor(TWO_PI * ro.dot(&patch.center)) * patch.area;
            e += j * ct;
        }
        let along = e.x * ro.x + e.y * ro.y + e.z * ro.z;
        C3::new(
            CONST4 * (along * ro.x - e.x),
            CONST4 * (along * ro.y - e.y),
            CONST4 * (along * ro.z - e.z),
        )
    }
}

/// Constant that turns `|E|²` of [`FarField::field`] into gain.
pub fn gain_constant(
    class: ExcitationClass,
    budget: &PowerBudget,
    wavelength: Scalar,
    directive: bool,
) -> Result<Scalar> {
    let from_power = |input: Scalar| -> Result<Scalar> {
        if input <= 0.0 {
            return Err(NecError::Config(format!(
                "input power {input:.3e} W cannot normalise the gain"
            )));
        }
        let gcop = wavelength * wavelength * TWO_PI / (ETA * input);
        if directive {
            let radiated = input - budget.structure_loss - budget.network_loss;
            if radiated <= 0.0 {
                return Err(NecError::Config("no radiated power for directive gain".into()));
            }
            Ok(gcop * input / radiated)
        } else {
            Ok(gcop)
        }
    };
    match class {
        ExcitationClass::Voltage => from_power(budget.input),
        ExcitationClass::CurrentElement { moment } => {
            from_power(CURRENT_SOURCE_POWER * moment * moment * wavelength * wavelength)
        }
        ExcitationClass::PlaneWave { axial_ratio } => Ok(FOUR_PI / (1.0 + axial_ratio * axial_ratio)),
    }
}

fn polarization(eth: CScalar, eph: CScalar) -> (Scalar, Scalar, Scalar, Scalar, PolarizationSense) {
    let ethm2 = eth.norm_sqr();
    let ephm2 = eph.norm_sqr();
    if ethm2 <= 1.0e-20 && ephm2 <= 1.0e-20 {
        return (0.0, 0.0, 0.0, 0.0, PolarizationSense::Linear);
    }
    let etha = crate::math::phase_deg(eth);
    let epha = crate::math::phase_deg(eph);
    let mut dfaz = epha - etha;
    let dfaz2 = if epha >= 0.0 { dfaz - 360.0 } else { dfaz + 360.0 };
    if dfaz.abs() > dfaz2.abs() {
        dfaz = dfaz2;
    }
    let cdfaz = (dfaz * TO_RAD).cos();
    let mut t1 = ethm2 - ephm2;
    let mut t2 = 2.0 * ephm2.sqrt() * ethm2.sqrt() * cdfaz;
    let tilt = t2.atan2(t1) / 2.0;
    let st = tilt.sin();
    t1 *= st * st;
    t2 *= st * tilt.cos();
    let emajr2 = -t1 + t2 + ethm2;
    let eminr2 = (t1 - t2 + ephm2).max(0.0);
    let axrat = if emajr2 > 0.0 { (eminr2 / emajr2).sqrt() } else { 0.0 };
    let sense = if axrat <= 1.0e-5 {
        PolarizationSense::Linear
    } else if dfaz <= 0.0 {
        PolarizationSense::Right
    } else {
        PolarizationSense::Left
    };
    (emajr2, eminr2, axrat, tilt, sense)
}

/// Computes the pattern of `currents` for `request`.
pub fn radiation_pattern(
    structure: &ScaledStructure,
    currents: &CurrentDistribution,
    ground: &GroundParameters,
    class: ExcitationClass,
    budget: &PowerBudget,
    request: &FarFieldRequest,
) -> Result<RadiationPattern> {
    request.validate(ground)?;
    let start = Instant::now();
    let lambda = structure.wavelength;
    let gcon = gain_constant(class, budget, lambda, request.directive)?;
    let far = FarField::new(structure, currents, ground);

    let (range_scale, range_phase) = if request.range_m < 1.0e-20 {
        (1.0 / lambda, C_ONE)
    } else {
        let kr = request.range_m / lambda;
        (1.0 / request.range_m, phasor(-TWO_PI * (kr - kr.floor())))
    };

    let mut extremes = [GainExtremes::default(); 5];
    let mut points = Vec::with_capacity(request.theta_count * request.phi_count);
    for (theta, phi) in request.directions() {
        let (eth, eph) = far.field(theta * TO_RAD, phi * TO_RAD);
        let (emajr2, eminr2, axrat, tilt, sense) = polarization(eth, eph);
        let ethm2 = eth.norm_sqr();
        let ephm2 = eph.norm_sqr();
        let major_db = db10(gcon * emajr2);
        let minor_db = db10(gcon * eminr2);
        let vertical_db = db10(gcon * ethm2);
        let horizontal_db = db10(gcon * ephm2);
        let total_db = db10(gcon * (ethm2 + ephm2));
        let gain_db = match request.gain {
            GainType::Major => major_db,
            GainType::Minor => minor_db,
            GainType::Vertical => vertical_db,
            GainType::Horizontal => horizontal_db,
            GainType::Total => total_db,
        };
        let axial_ratio = if sense == PolarizationSense::Right { -axrat } else { axrat };

        let idx = points.len();
        for (ext, filter) in extremes.iter_mut().zip(PolarizationFilter::ALL) {
            let gain = (gain_db + filter.factor_db(axial_ratio, tilt)).max(-999.99);
            if ext.max_db < gain {
                ext.max_db = gain;
                ext.max_theta = theta;
                ext.max_phi = phi;
                ext.max_index = idx;
            }
            if ext.min_db > gain {
                ext.min_db = gain;
                ext.min_index = idx;
            }
        }

        points.push(PatternPoint {
            theta,
            phi,
            e_theta: eth * range_phase * range_scale,
            e_phi: eph * range_phase * range_scale,
            major_db,
            minor_db,
            vertical_db,
            horizontal_db,
            total_db,
            gain_db,
            axial_ratio,
            tilt,
            sense,
        });
    }

    let normalized_db = request.normalize.then(|| {
        let max = points.iter().map(|p| p.gain_db).fold(Scalar::NEG_INFINITY, Scalar::max);
        points.iter().map(|p| p.gain_db - max).collect()
    });
    tracing::debug!(
        directions = points.len(),
        elapsed = ?start.elapsed(),
        max_gain = extremes[0].max_db,
        "radiation pattern computed"
    );
    Ok(RadiationPattern {
        points,
        theta_count: request.theta_count,
        phi_count: request.phi_count,
        extremes,
        normalized_db,
        gain_constant: gcon,
    })
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::circuits::NetworkSolver;
    use crate::constants::DEFAULT_RKH;
    use crate::fields::FieldEvaluator;
    use crate::geometry::GeometryBuilder;
    use crate::ground::GroundSpec;
    use crate::moment::{build_excitation, Excitation, Factored, FillOptions, MatrixFill, SegmentRef};

    struct Solved {
        structure: ScaledStructure,
        ground: GroundParameters,
        currents: CurrentDistribution,
        budget: PowerBudget,
    }

    /// Half-wave dipole of 11 segments along z at 299.8 MHz, centre height `z`.
    fn dipole(spec: GroundSpec, z: Scalar, horizontal: bool) -> Solved {
        let mut b = GeometryBuilder::new();
        let (p1, p2) = if horizontal {
            (R3::new(-0.24, 0.0, z), R3::new(0.24, 0.0, z))
        } else {
            (R3::new(0.0, 0.0, z - 0.24), R3::new(0.0, 0.0, z + 0.24))
        };
        b.wire(1, 11, p1, p2, 0.001, 1.0, 1.0).unwrap();
        let geometry = b.finish(spec.has_ground()).unwrap();
        let structure = ScaledStructure::new(&geometry, 299.8).unwrap();
        let ground = GroundParameters::new(&spec, structure.wavelength).unwrap();
        let filled = MatrixFill::new(&structure, &ground, None, None, FillOptions::default())
            .fill()
            .unwrap();
        let (factored, _) = Factored::factor(filled.matrix, 1.0e-10).unwrap();
        let mut eval = FieldEvaluator::new(&ground, None, DEFAULT_RKH, false).unwrap();
        let source = Excitation::Voltage {
            segment: SegmentRef::new(1, 6),
            voltage: C_ONE,
        };
        let e = build_excitation(&structure, &mut eval, &[source], None).unwrap();
        let solution = NetworkSolver::new(&structure, &factored, &[]).solve(&e, false).unwrap();
        let budget = PowerBudget::of(&solution, 0.0);
        Solved {
            structure,
            ground,
            currents: solution.currents,
            budget,
        }
    }

    fn pattern(s: &Solved, request: &FarFieldRequest) -> Result<RadiationPattern> {
        radiation_pattern(&s.structure, &s.currents, &s.ground, ExcitationClass::Voltage, &s.budget, request)
    }

    #[test]
    fn half_wave_dipole_gain_and_null() {
        let s = dipole(GroundSpec::FreeSpace, 0.0, false);
        let request = FarFieldRequest::grid((0.0, 10.0, 10), (0.0, 90.0, 2));
        let p = pattern(&s, &request).unwrap();
        assert_eq!(p.points.len(), 20);
        let broadside = p.points.iter().find(|q| q.theta == 90.0).unwrap();
        assert!((1.9..2.4).contains(&broadside.total_db), "gain {}", broadside.total_db);
        assert!(p.points[0].total_db < -100.0);
        assert_eq!(broadside.sense, PolarizationSense::Linear);
        assert!(broadside.horizontal_db < broadside.vertical_db - 100.0);
        let max = p.extremes_for(PolarizationFilter::Total);
        assert_relative_eq!(max.max_theta, 90.0, epsilon = 1.0e-12);
        let vertical = p.extremes_for(PolarizationFilter::Vertical);
        assert_relative_eq!(vertical.max_db, max.max_db, epsilon = 1.0e-6);
    }

    #[test]
    fn pattern_is_symmetric_in_azimuth() {
        let s = dipole(GroundSpec::FreeSpace, 0.0, false);
        let mut request = FarFieldRequest::grid((30.0, 30.0, 3), (0.0, 45.0, 8));
        request.normalize = true;
        let p = pattern(&s, &request).unwrap();
        for k in 0..3 {
            let first = p.points[k].total_db;
            for cut in 1..8 {
                assert_relative_eq!(p.points[cut * 3 + k].total_db, first, epsilon = 1.0e-6);
            }
        }
        let normalized = p.normalized_db.unwrap();
        assert_relative_eq!(normalized.iter().cloned().fold(Scalar::MIN, Scalar::max), 0.0, epsilon = 1.0e-12);
    }

    #[test]
    fn horizontal_dipole_over_perfect_ground_cancels_at_the_horizon() {
        let s = dipole(GroundSpec::Perfect, 0.25, true);
        let p = pattern(&s, &FarFieldRequest::grid((0.0, 90.0, 2), (90.0, 0.0, 1))).unwrap();
        assert!(p.points[1].total_db < p.points[0].total_db - 60.0);
        // The image adds in phase overhead.
        assert!(p.points[0].total_db > 5.0, "gain {}", p.points[0].total_db);
    }

    #[test]
    fn unsupported_requests_are_config_errors() {
        let s = dipole(GroundSpec::Perfect, 0.5, false);
        let below = FarFieldRequest::grid((0.0, 10.0, 12), (0.0, 0.0, 1));
        assert!(matches!(pattern(&s, &below), Err(NecError::Config(_))));
        let mut wave = FarFieldRequest::default();
        wave.theta_count = 10;
        wave.surface_wave = true;
        assert!(matches!(pattern(&s, &wave), Err(NecError::Config(_))));
        wave.surface_wave = false;
        wave.average_gain = true;
        assert!(matches!(pattern(&s, &wave), Err(NecError::Config(_))));
    }

    #[test]
    fn circular_filters_split_a_linear_wave_evenly() {
        let half = 10.0 * 0.5f64.log10();
        assert_relative_eq!(PolarizationFilter::RightCircular.factor_db(0.0, 0.3), half, epsilon = 1.0e-12);
        assert_relative_eq!(PolarizationFilter::LeftCircular.factor_db(0.0, 0.3), half, epsilon = 1.0e-12);
        assert_relative_eq!(PolarizationFilter::Vertical.factor_db(0.0, 0.0), 0.0, epsilon = 1.0e-12);
        assert!(PolarizationFilter::Horizontal.factor_db(0.0, 0.0) < -1000.0);
        let (_, _, ax, _, sense) = polarization(C_ONE, CScalar::new(0.0, 1.0));
        assert_relative_eq!(ax, 1.0, epsilon = 1.0e-9);
        assert_eq!(sense, PolarizationSense::Left);
    }

    #[test]
    fn plane_wave_gain_constant_ignores_power() {
        let budget = PowerBudget::new(0.0, 0.0, 0.0);
        let g = gain_constant(ExcitationClass::PlaneWave { axial_ratio: 0.0 }, &budget, 1.0, false).unwrap();
        assert_relative_eq!(g, FOUR_PI, epsilon = 1.0e-12);
        assert!(gain_constant(ExcitationClass::Voltage, &budget, 1.0, false).is_err());
    }
}
