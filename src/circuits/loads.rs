//! Lumped and distributed segment loading.
//!
//! Every load is converted to `λ·Z'`, the impedance per unit length of the
//! loaded segment scaled by the wavelength, which is the form the matrix fill
//! subtracts from the diagonal and the discontinuity source adds back.

use crate::constants::{LOAD_REACTANCE, PI, TWO_PI};
use crate::errors::{Diagnostic, NecError, Result};
use crate::geometry::Geometry;
use crate::math::{CScalar, Scalar, C_ZERO, J};

/// Values below this magnitude mean "element absent".
const ABSENT: Scalar = 1.0e-20;

/// `2π·f·μ₀` per MHz, used by the skin-depth argument.
const SKIN_FACTOR: Scalar = 2.368_705e3;

/// Electrical description of a load.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LoadKind {
    /// Lumped series R, L and C (ohms, henries, farads); zero C means none.
    SeriesRlc {
        /// Resistance.
        r: Scalar,
        /// Inductance.
        l: Scalar,
        /// Capacitance.
        c: Scalar,
    },
    /// Lumped parallel R, L and C; zero R or L means none.
    ParallelRlc {
        /// Resistance.
        r: Scalar,
        /// Inductance.
        l: Scalar,
        /// Capacitance.
        c: Scalar,
    },
    /// Series R, L and C per metre of wire.
    SeriesPerMetre {
        /// Ohms per metre.
        r: Scalar,
        /// Henries per metre.
        l: Scalar,
        /// Farad-metres.
        c: Scalar,
    },
    /// Parallel R, L and C per metre of wire.
    ParallelPerMetre {
        /// Ohm-metres.
        r: Scalar,
        /// Henry-metres.
        l: Scalar,
        /// Farads per metre.
        c: Scalar,
    },
    /// Fixed lumped impedance `r + jx`.
    Impedance {
        /// Resistance.
        r: Scalar,
        /// Reactance.
        x: Scalar,
    },
    /// Finite wire conductivity in siemens per metre.
    Conductivity {
        /// Conductivity.
        sigma: Scalar,
    },
}

impl LoadKind {
    /// `λ·Z'` of a segment of `length` and `radius` (wavelengths) at
    /// `wavelength` metres.
    #[must_use]
    pub fn normalized_impedance(&self, length: Scalar, radius: Scalar, wavelength: Scalar) -> CScalar {
        let tpcj = J * LOAD_REACTANCE;
        let s = length;
        let lambda = wavelength;
        match *self {
            Self::SeriesRlc { r, l, c } => {
                let mut zt = r / s + tpcj * l / (s * lambda);
                if c.abs() > ABSENT {
                    zt += lambda / (tpcj * s * c);
                }
                zt
            }
            Self::ParallelRlc { r, l, c } => {
                let mut yt = tpcj * s * c / lambda;
                if l.abs() > ABSENT {
                    yt += s * lambda / (tpcj * l);
                }
                if r.abs() > ABSENT {
                    yt += s / r;
                }
                1.0 / yt
            }
            Self::SeriesPerMetre { r, l, c } => {
                let mut zt = r * lambda + tpcj * l;
                if c.abs() > ABSENT {
                    zt += 1.0 / (tpcj * s * s * c);
                }
                zt
            }
            Self::ParallelPerMetre { r, l, c } => {
                let mut yt = tpcj * s * s * c;
                if l.abs() > ABSENT {
                    yt += 1.0 / (tpcj * l);
                }
                if r.abs() > ABSENT {
                    yt += 1.0 / (r * lambda);
                }
                1.0 / yt
            }
            Self::Impedance { r, x } => CScalar::new(r, x) / s,
            Self::Conductivity { sigma } => wire_internal_impedance(sigma * lambda, radius),
        }
    }
}

/// A load applied to a range of segments.
///
/// With a non-zero `tag`, `first..=last` count segments within that tag and
/// `first == 0` selects every segment of the tag. With tag 0 they are
/// absolute segment numbers and `first == last == 0` selects the whole
/// structure. `last == 0` means `last = first`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LoadSpec {
    /// Electrical values.
    pub kind: LoadKind,
    /// Tag of the loaded wire, or 0.
    pub tag: u32,
    /// First segment, one-based.
    pub first: usize,
    /// Last segment, one-based.
    pub last: usize,
}

impl LoadSpec {
    /// Load on every segment of `tag` (or of the whole structure for tag 0).
    #[must_use]
    pub const fn on_tag(kind: LoadKind, tag: u32) -> Self {
        Self {
            kind,
            tag,
            first: 0,
            last: 0,
        }
    }

    /// Load on segments `first..=last` of `tag`.
    #[must_use]
    pub const fn on_range(kind: LoadKind, tag: u32, first: usize, last: usize) -> Self {
        Self { kind, tag, first, last }
    }

    /// Zero-based indices of the loaded segments.
    pub fn segments(&self, geom: &Geometry) -> Result<Vec<usize>> {
        let last = if self.last == 0 { self.first } else { self.last };
        if last < self.first {
            return Err(NecError::Load(format!(
                "first segment {} is greater than last segment {last}",
                self.first
            )));
        }
        if self.tag != 0 {
            let members: Vec<usize> = geom
                .segments
                .iter()
                .enumerate()
                .filter(|(_, s)| s.tag == self.tag)
                .map(|(i, _)| i)
                .collect();
            if members.is_empty() {
                return Err(NecError::Load(format!("no segment has an itag of {}", self.tag)));
            }
            if self.first == 0 {
                return Ok(members);
            }
            return Ok(members
                .into_iter()
                .skip(self.first - 1)
                .take(last + 1 - self.first)
                .collect());
        }

        let n = geom.segment_count();
        if self.first == 0 {
            return Ok((0..n).collect());
        }
        if last > n {
            return Err(NecError::Load(format!("segment {last} does not exist")));
        }
        Ok((self.first - 1..last).collect())
    }
}

/// One card of the loading deck.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LoadCard {
    /// Removes every load given before it.
    Nullify,
    /// Adds a load.
    Load(LoadSpec),
}

/// Loads still in effect after the last [`LoadCard::Nullify`].
#[must_use]
pub fn effective_loads(cards: &[LoadCard]) -> Vec<LoadSpec> {
    let start = cards
        .iter()
        .rposition(|c| matches!(c, LoadCard::Nullify))
        .map_or(0, |i| i + 1);
    cards[start..]
        .iter()
        .filter_map(|c| match c {
            LoadCard::Load(spec) => Some(*spec),
            LoadCard::Nullify => None,
        })
        .collect()
}

/// Per-segment loading of one frequency step.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SegmentLoads {
    /// `λ·Z'` of every segment.
    pub impedance: Vec<CScalar>,
    /// Number of load specs touching every segment.
    pub load_count: Vec<usize>,
    lengths: Vec<Scalar>,
}

impl SegmentLoads {
    /// Accumulates `specs` on the scaled geometry `geom` at `wavelength`
    /// metres. Returns `None` when there is nothing to load.
    pub fn apply(geom: &Geometry, wavelength: Scalar, specs: &[LoadSpec]) -> Result<Option<(Self, Vec<Diagnostic>)>> {
        if specs.is_empty() {
            return Ok(None);
        }
        let n = geom.segment_count();
        let mut loads = Self {
            impedance: vec![C_ZERO; n],
            load_count: vec![0; n],
            lengths: geom.segments.iter().map(|s| s.length).collect(),
        };
        for spec in specs {
            for i in spec.segments(geom)? {
                let seg = &geom.segments[i];
                loads.impedance[i] += spec.kind.normalized_impedance(seg.length, seg.radius, wavelength);
                loads.load_count[i] += 1;
            }
        }

        let diagnostics = loads
            .load_count
            .iter()
            .enumerate()
            .filter(|&(_, &k)| k > 1)
            .map(|(i, k)| Diagnostic::warning(format!("segment {} is loaded by {k} load cards", i + 1)))
            .collect();
        Ok(Some((loads, diagnostics)))
    }

    /// Slice handed to the matrix fill and the excitation builder.
    #[must_use]
    pub fn as_slice(&self) -> &[CScalar] {
        &self.impedance
    }

    /// Lumped impedance of segment `i` in ohms.
    #[must_use]
    pub fn segment_impedance(&self, i: usize) -> CScalar {
        self.impedance[i] * self.lengths[i]
    }

    /// Power dissipated in the loads for centre currents in amperes.
    #[must_use]
    pub fn structure_loss(&self, currents: &[CScalar]) -> Scalar {
        currents
            .iter()
            .enumerate()
            .map(|(i, cur)| 0.5 * cur.norm_sqr() * self.segment_impedance(i).re)
            .sum()
    }
}

/// Internal impedance per wavelength of a round wire, `λ·Z'`, for
/// `sigl = σ·λ` and radius `rolam` in wavelengths.
#[must_use]
pub fn wire_internal_impedance(sigl: Scalar, rolam: Scalar) -> CScalar {
    let x = (SKIN_FACTOR * sigl).sqrt() * rolam;
    let scale = J * (60.0 / sigl).sqrt() / rolam;
    scale * bessel_ratio(x)
}

/// `ber(x) + j·bei(x)` over its derivative, by series for small arguments and
/// asymptotic expansions above.
fn bessel_ratio(x: Scalar) -> CScalar {
    if x > 110.0 {
        return CScalar::new(0.707_106_78, -0.707_106_78);
    }
    if x <= 8.0 {
        let y = (x / 8.0).powi(2);
        let s = y * y;
        let ber = ((((((-9.01e-6 * s + 1.22552e-3) * s - 0.08349609) * s + 2.6419140) * s - 32.363456) * s
            + 113.77778)
            * s
            - 64.0)
            * s
            + 1.0;
        let bei = ((((((1.1346e-4 * s - 0.01103667) * s + 0.52185615) * s - 10.567658) * s + 72.817777) * s
            - 113.77778)
            * s
            + 16.0)
            * y;
        let dber = (((((((-3.94e-6 * s + 4.5957e-4) * s - 0.02609253) * s + 0.66047849) * s - 6.0681481) * s
            + 14.222222)
            * s
            - 4.0)
            * y)
            * x;
        let dbei = ((((((4.609e-5 * s - 3.79386e-3) * s + 0.14677204) * s - 2.3116751) * s + 11.377778) * s
            - 10.666667)
            * s
            + 0.5)
            * x;
        return CScalar::new(ber, bei) / CScalar::new(dber, dbei);
    }

    let theta = |d: Scalar| {
        let cc = [
            CScalar::new(6.0e-7, 1.9e-6),
            CScalar::new(-3.4e-6, 5.1e-6),
            CScalar::new(-2.52e-5, 0.0),
            CScalar::new(-9.06e-5, -9.01e-5),
            CScalar::new(0.0, -9.765e-4),
            CScalar::new(0.0110486, -0.0110485),
        ];
        horner(&cc, d) * d + CScalar::new(0.0, -0.3926991)
    };
    let phi = |d: Scalar| {
        let cc = [
            CScalar::new(1.6e-6, -3.2e-6),
            CScalar::new(1.17e-5, -2.4e-6),
            CScalar::new(3.46e-5, 3.38e-5),
            CScalar::new(5.0e-7, 2.452e-4),
            CScalar::new(-1.3813e-3, 1.3811e-3),
            CScalar::new(-6.25001e-2, -1.0e-7),
        ];
        horner(&cc, d) * d + CN
    };

    let f = (PI / 2.0 / x).sqrt() * (-CN * x + theta(-8.0 / x)).exp();
    let g = (CN * x + theta(8.0 / x)).exp() / (TWO_PI * x).sqrt();
    let kelvin = J * f / PI;
    (g + kelvin) / (g * phi(8.0 / x) - kelvin * phi(-8.0 / x))
}

const CN: CScalar = CScalar::new(0.707_106_8, 0.707_106_8);

fn horner(coefficients: &[CScalar], d: Scalar) -> CScalar {
    coefficients.iter().fold(C_ZERO, |acc, c| acc * d + c)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::geometry::GeometryBuilder;
    use crate::math::R3;

    fn two_wires() -> Geometry {
        let mut b = GeometryBuilder::new();
        b.wire(1, 4, R3::zeros(), R3::new(0.0, 0.0, 0.4), 0.001, 1.0, 1.0)
            .unwrap();
        b.wire(2, 2, R3::new(1.0, 0.0, 0.0), R3::new(1.0, 0.0, 0.2), 0.001, 1.0, 1.0)
            .unwrap();
        // One metre wavelength: lengths are already in wavelengths.
        b.finish(false).unwrap()
    }

    #[test]
    fn lumped_loads_recover_their_ohms() {
        let g = two_wires();
        let series = LoadSpec::on_range(LoadKind::SeriesRlc { r: 50.0, l: 0.0, c: 0.0 }, 1, 2, 0);
        let fixed = LoadSpec::on_range(LoadKind::Impedance { r: 10.0, x: -5.0 }, 2, 1, 1);
        let parallel = LoadSpec::on_range(LoadKind::ParallelRlc { r: 200.0, l: 0.0, c: 0.0 }, 0, 6, 6);
        let (loads, diags) = SegmentLoads::apply(&g, 1.0, &[series, fixed, parallel]).unwrap().unwrap();
        assert!(diags.is_empty());
        assert_relative_eq!(loads.segment_impedance(1).re, 50.0, max_relative = 1.0e-12);
        assert_eq!(loads.impedance[0], C_ZERO);
        let z = loads.segment_impedance(4);
        assert_relative_eq!(z.re, 10.0, max_relative = 1.0e-12);
        assert_relative_eq!(z.im, -5.0, max_relative = 1.0e-12);
        assert_relative_eq!(loads.segment_impedance(5).re, 200.0, max_relative = 1.0e-12);
    }

    #[test]
    fn series_inductor_reactance_follows_frequency() {
        let g = two_wires();
        // 1 µH at 299.8 MHz.
        let spec = LoadSpec::on_range(LoadKind::SeriesRlc { r: 0.0, l: 1.0e-6, c: 0.0 }, 1, 1, 1);
        let (loads, _) = SegmentLoads::apply(&g, 1.0, &[spec]).unwrap().unwrap();
        let x = loads.segment_impedance(0).im;
        assert_relative_eq!(x, TWO_PI * 299.8e6 * 1.0e-6, max_relative = 1.0e-3);
    }

    #[test]
    fn missing_tag_is_an_error_and_overlaps_warn() {
        let g = two_wires();
        let kind = LoadKind::Impedance { r: 1.0, x: 0.0 };
        assert!(matches!(
            SegmentLoads::apply(&g, 1.0, &[LoadSpec::on_tag(kind, 9)]),
            Err(NecError::Load(_))
        ));
        assert!(matches!(
            SegmentLoads::apply(&g, 1.0, &[LoadSpec::on_range(kind, 1, 3, 2)]),
            Err(NecError::Load(_))
        ));
        let (loads, diags) = SegmentLoads::apply(&g, 1.0, &[LoadSpec::on_tag(kind, 0), LoadSpec::on_tag(kind, 2)])
            .unwrap()
            .unwrap();
        assert_eq!(loads.load_count, vec![1, 1, 1, 1, 2, 2]);
        assert_eq!(diags.len(), 2);
        assert!(SegmentLoads::apply(&g, 1.0, &[]).unwrap().is_none());
    }

    #[test]
    fn nullify_drops_earlier_cards() {
        let kind = LoadKind::Impedance { r: 1.0, x: 0.0 };
        let cards = [
            LoadCard::Load(LoadSpec::on_tag(kind, 1)),
            LoadCard::Nullify,
            LoadCard::Load(LoadSpec::on_tag(kind, 2)),
        ];
        assert_eq!(effective_loads(&cards), vec![LoadSpec::on_tag(kind, 2)]);
    }

    #[test]
    fn internal_impedance_matches_dc_and_skin_effect_limits() {
        // Thin poor conductor: DC resistance per wavelength 1/(π σλ a²).
        let z = wire_internal_impedance(1.0e3, 1.0e-4);
        assert_relative_eq!(z.re, 1.0 / (PI * 1.0e3 * 1.0e-8), max_relative = 1.0e-3);
        // Copper at 299.8 MHz, 1 mm radius: R = X = Rs/(2πa).
        let z = wire_internal_impedance(5.8e7, 1.0e-3);
        assert_relative_eq!(z.re, 0.719, max_relative = 1.0e-2);
        assert_relative_eq!(z.re, z.im, max_relative = 1.0e-6);
    }

    #[test]
    fn internal_impedance_branches_join() {
        let at = |x: Scalar| {
            let sigl = 1.0e4;
            wire_internal_impedance(sigl, x / (SKIN_FACTOR * sigl).sqrt())
        };
        for edge in [8.0, 110.0] {
            let (lo, hi) = (at(edge * 0.9999), at(edge * 1.0001));
            assert!((lo - hi).norm() / lo.norm() < 1.0e-2);
        }
    }
}
