//! Byte framing of worker commands and per-step results.
//!
//! Commands are a 7-byte tag followed by a fixed payload. A result is a
//! 4-byte tag, `nfeh` when near-field data follows and `noeh` otherwise,
//! then one blob: a [`BlobHeader`] followed by `f64` arrays whose lengths
//! follow from the header.

use bytemuck::{Pod, Zeroable};

use crate::circuits::PowerBudget;
use crate::errors::{NecError, Result};
use crate::math::{CScalar, Scalar, C3, R3};
use crate::moment::CurrentCoefficients;
use crate::nearfield::{FieldMap, FieldSample, NearFieldMask, NearFields};
use crate::radiation::{PolarizationSense, RadiationPattern};
use crate::simulation::FrequencyResult;

/// Rebuild the geometry from the worker's copy of the input.
pub const OPEN_INPUT: &[u8; 7] = b"inpfile";
/// Solve one frequency; followed by the frequency in MHz as `f64`.
pub const FREQUENCY_DATA: &[u8; 7] = b"frqdata";
/// Select near fields; followed by one flag byte.
pub const NEAR_FIELD_FLAGS: &[u8; 7] = b"nearehf";
/// Result tag when near-field data follows.
pub const WITH_NEAR_FIELDS: &[u8; 4] = b"nfeh";
/// Result tag without near-field data.
pub const WITHOUT_NEAR_FIELDS: &[u8; 4] = b"noeh";

/// A command from the coordinator to a worker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Load the geometry.
    OpenInput,
    /// Compute one frequency step.
    FrequencyData(Scalar),
    /// Toggle the near fields computed from now on.
    NearFieldFlags(NearFieldMask),
}

impl Command {
    /// Frames the command.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(16);
        match self {
            Self::OpenInput => out.extend_from_slice(OPEN_INPUT),
            Self::FrequencyData(f) => {
                out.extend_from_slice(FREQUENCY_DATA);
                out.extend_from_slice(bytemuck::bytes_of(f));
            }
            Self::NearFieldFlags(mask) => {
                out.extend_from_slice(NEAR_FIELD_FLAGS);
                out.push(mask.0);
            }
        }
        out
    }

    /// Parses a framed command.
    pub fn decode(frame: &[u8]) -> Result<Self> {
        if frame.len() < 7 {
            return Err(NecError::Protocol(format!("command frame of {} bytes", frame.len())));
        }
        let (tag, payload) = frame.split_at(7);
        let expect = |n: usize| {
            if payload.len() == n {
                Ok(())
            } else {
                Err(NecError::Protocol(format!(
                    "{} payload is {} bytes, expected {n}",
                    String::from_utf8_lossy(tag),
                    payload.len()
                )))
            }
        };
        match tag {
            t if t == OPEN_INPUT => {
                expect(0)?;
                Ok(Self::OpenInput)
            }
            t if t == FREQUENCY_DATA => {
                expect(8)?;
                Ok(Self::FrequencyData(bytemuck::pod_read_unaligned(payload)))
            }
            t if t == NEAR_FIELD_FLAGS => {
                expect(1)?;
                Ok(Self::NearFieldFlags(NearFieldMask(payload[0])))
            }
            other => Err(NecError::Protocol(format!(
                "unknown command tag {:?}",
                String::from_utf8_lossy(other)
            ))),
        }
    }
}

const HAS_IMPEDANCE: u32 = 1;
const HAS_PATTERN: u32 = 2;

/// Fixed part of a result blob.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct BlobHeader {
    /// Frequency in MHz.
    pub freq_mhz: f64,
    /// Wavelength in metres.
    pub wavelength: f64,
    /// Input impedance, real and imaginary.
    pub impedance: [f64; 2],
    /// Input, radiated, structure loss, network loss, efficiency.
    pub budget: [f64; 5],
    /// Number of segments.
    pub segments: u32,
    /// Number of patches.
    pub patches: u32,
    /// θ values of the pattern.
    pub theta_count: u32,
    /// φ values of the pattern.
    pub phi_count: u32,
    /// Near-field sections that follow.
    pub near_sections: u32,
    /// Presence bits.
    pub flags: u32,
    /// Diagnostics raised during the step.
    pub diagnostics: u32,
    _pad: u32,
}

/// Header of one near-field section.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
struct NearHeader {
    points: u32,
    electric: u32,
    magnetic: u32,
    _pad: u32,
}

/// Pattern data carried by a result.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PatternSummary {
    /// θ values per φ cut.
    pub theta_count: usize,
    /// Number of φ cuts.
    pub phi_count: usize,
    /// Selected gain in dB, θ fastest.
    pub gain_db: Vec<Scalar>,
    /// Tilt angle in radians.
    pub tilt: Vec<Scalar>,
    /// Signed axial ratio.
    pub axial_ratio: Vec<Scalar>,
    /// Rotation sense.
    pub sense: Vec<PolarizationSense>,
    /// Per receiving polarization: maximum, minimum, θ and φ of the maximum.
    pub extremes: [[Scalar; 4]; 5],
}

impl PatternSummary {
    fn of(pattern: &RadiationPattern) -> Self {
        Self {
            theta_count: pattern.theta_count,
            phi_count: pattern.phi_count,
            gain_db: pattern.points.iter().map(|p| p.gain_db).collect(),
            tilt: pattern.points.iter().map(|p| p.tilt).collect(),
            axial_ratio: pattern.points.iter().map(|p| p.axial_ratio).collect(),
            sense: pattern.points.iter().map(|p| p.sense).collect(),
            extremes: pattern.extremes.map(|e| [e.max_db, e.min_db, e.max_theta, e.max_phi]),
        }
    }
}

/// What a worker reports for one frequency step.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StepRecord {
    /// Frequency in MHz.
    pub freq_mhz: Scalar,
    /// Wavelength in metres.
    pub wavelength: Scalar,
    /// Impedance at the first source.
    pub impedance: Option<CScalar>,
    /// Power budget.
    pub budget: PowerBudget,
    /// Current expansion of every segment.
    pub coefficients: Vec<CurrentCoefficients>,
    /// Centre current of every segment in amperes.
    pub segment_currents: Vec<CScalar>,
    /// Surface current of every patch.
    pub patch_currents: Vec<C3>,
    /// Pattern, when computed.
    pub pattern: Option<PatternSummary>,
    /// Near fields, when computed.
    pub near_fields: Vec<NearFields>,
    /// Number of diagnostics raised during the step.
    pub diagnostics: usize,
}

impl From<&FrequencyResult> for StepRecord {
    fn from(r: &FrequencyResult) -> Self {
        Self {
            freq_mhz: r.freq_mhz,
            wavelength: r.wavelength,
            impedance: r.impedance,
            budget: r.budget,
            coefficients: r.currents.coefficients.clone(),
            segment_currents: r.currents.segment_currents.clone(),
            patch_currents: r.currents.patch_currents.clone(),
            pattern: r.pattern.as_ref().map(PatternSummary::of),
            near_fields: r.near_fields.clone(),
            diagnostics: r.diagnostics.len(),
        }
    }
}

fn sense_code(s: PolarizationSense) -> f64 {
    match s {
        PolarizationSense::Linear => 0.0,
        PolarizationSense::Right => 1.0,
        PolarizationSense::Left => 2.0,
    }
}

fn sense_from(code: f64) -> Result<PolarizationSense> {
    match code as i64 {
        0 => Ok(PolarizationSense::Linear),
        1 => Ok(PolarizationSense::Right),
        2 => Ok(PolarizationSense::Left),
        other => Err(NecError::Protocol(format!("polarization sense code {other}"))),
    }
}

fn count(n: usize) -> Result<u32> {
    u32::try_from(n).map_err(|_| NecError::Protocol(format!("{n} entries do not fit a blob header")))
}

fn put(out: &mut Vec<u8>, values: &[f64]) {
    out.extend_from_slice(bytemuck::cast_slice(values));
}

fn put_field_map(out: &mut Vec<u8>, map: &FieldMap) {
    for s in &map.samples {
        put(out, &s.real);
        put(out, &s.magnitude);
        put(out, &s.phase);
        put(out, &[s.total]);
    }
    put(out, &[map.max_total, map.max_radius]);
}

impl StepRecord {
    /// Whether the record carries near fields.
    #[must_use]
    pub fn has_near_fields(&self) -> bool {
        !self.near_fields.is_empty()
    }

    /// Tag and blob of this record.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let n = self.coefficients.len();
        let np = self.patch_currents.len();
        let z = self.impedance.unwrap_or_default();
        let b = &self.budget;
        let mut flags = 0;
        if self.impedance.is_some() {
            flags |= HAS_IMPEDANCE;
        }
        if self.pattern.is_some() {
            flags |= HAS_PATTERN;
        }
        let header = BlobHeader {
            freq_mhz: self.freq_mhz,
            wavelength: self.wavelength,
            impedance: [z.re, z.im],
            budget: [b.input, b.radiated, b.structure_loss, b.network_loss, b.efficiency],
            segments: count(n)?,
            patches: count(np)?,
            theta_count: count(self.pattern.as_ref().map_or(0, |p| p.theta_count))?,
            phi_count: count(self.pattern.as_ref().map_or(0, |p| p.phi_count))?,
            near_sections: count(self.near_fields.len())?,
            flags,
            diagnostics: count(self.diagnostics)?,
            _pad: 0,
        };

        let mut out = Vec::with_capacity(4 + std::mem::size_of::<BlobHeader>() + 8 * (8 * n + 6 * np));
        out.extend_from_slice(if self.has_near_fields() {
            WITH_NEAR_FIELDS
        } else {
            WITHOUT_NEAR_FIELDS
        });
        out.extend_from_slice(bytemuck::bytes_of(&header));

        let parts: [fn(&CurrentCoefficients) -> CScalar; 3] = [|k| k.a, |k| k.b, |k| k.c];
        for part in parts {
            let values: Vec<CScalar> = self.coefficients.iter().map(part).collect();
            put(&mut out, &values.iter().map(|v| v.re).collect::<Vec<_>>());
            put(&mut out, &values.iter().map(|v| v.im).collect::<Vec<_>>());
        }
        put(&mut out, &self.segment_currents.iter().map(|v| v.re).collect::<Vec<_>>());
        put(&mut out, &self.segment_currents.iter().map(|v| v.im).collect::<Vec<_>>());
        for c in &self.patch_currents {
            put(&mut out, &[c.x.re, c.x.im, c.y.re, c.y.im, c.z.re, c.z.im]);
        }

        if let Some(p) = &self.pattern {
            put(&mut out, &p.gain_db);
            put(&mut out, &p.tilt);
            put(&mut out, &p.axial_ratio);
            put(&mut out, &p.sense.iter().map(|s| sense_code(*s)).collect::<Vec<_>>());
            for e in &p.extremes {
                put(&mut out, e);
            }
        }

        for section in &self.near_fields {
            let samples = section
                .electric
                .as_ref()
                .or(section.magnetic.as_ref())
                .map_or(&[][..], |m| m.samples.as_slice());
            let nh = NearHeader {
                points: count(samples.len())?,
                electric: u32::from(section.electric.is_some()),
                magnetic: u32::from(section.magnetic.is_some()),
                _pad: 0,
            };
            out.extend_from_slice(bytemuck::bytes_of(&nh));
            for s in samples {
                put(&mut out, &[s.position.x, s.position.y, s.position.z]);
            }
            for map in [&section.electric, &section.magnetic].into_iter().flatten() {
                put_field_map(&mut out, map);
            }
        }
        Ok(out)
    }

    /// Parses a tagged blob.
    pub fn decode(frame: &[u8]) -> Result<Self> {
        if frame.len() < 4 {
            return Err(NecError::Protocol("result frame without a tag".into()));
        }
        let (tag, blob) = frame.split_at(4);
        let near = match tag {
            t if t == WITH_NEAR_FIELDS => true,
            t if t == WITHOUT_NEAR_FIELDS => false,
            other => {
                return Err(NecError::Protocol(format!(
                    "unknown result tag {:?}",
                    String::from_utf8_lossy(other)
                )))
            }
        };
        let mut r = Reader { bytes: blob };
        let h: BlobHeader = r.pod()?;
        if near != (h.near_sections > 0) {
            return Err(NecError::Protocol("result tag disagrees with its near-field sections".into()));
        }
        let n = h.segments as usize;
        let np = h.patches as usize;

        let mut parts = Vec::with_capacity(3);
        for _ in 0..3 {
            let re = r.f64s(n)?;
            let im = r.f64s(n)?;
            parts.push(re.into_iter().zip(im).map(|(a, b)| CScalar::new(a, b)).collect::<Vec<_>>());
        }
        let coefficients = (0..n)
            .map(|i| CurrentCoefficients {
                a: parts[0][i],
                b: parts[1][i],
                c: parts[2][i],
            })
            .collect();
        let re = r.f64s(n)?;
        let im = r.f64s(n)?;
        let segment_currents = re.into_iter().zip(im).map(|(a, b)| CScalar::new(a, b)).collect();
        let patch_currents = r
            .f64s(6 * np)?
            .chunks_exact(6)
            .map(|c| C3::new(CScalar::new(c[0], c[1]), CScalar::new(c[2], c[3]), CScalar::new(c[4], c[5])))
            .collect();

        let pattern = if h.flags & HAS_PATTERN != 0 {
            let (nt, nph) = (h.theta_count as usize, h.phi_count as usize);
            let points = nt * nph;
            let gain_db = r.f64s(points)?;
            let tilt = r.f64s(points)?;
            let axial_ratio = r.f64s(points)?;
            let sense = r.f64s(points)?.into_iter().map(sense_from).collect::<Result<Vec<_>>>()?;
            let mut extremes = [[0.0; 4]; 5];
            for e in &mut extremes {
                e.copy_from_slice(&r.f64s(4)?);
            }
            Some(PatternSummary {
                theta_count: nt,
                phi_count: nph,
                gain_db,
                tilt,
                axial_ratio,
                sense,
                extremes,
            })
        } else {
            None
        };

        let mut near_fields = Vec::with_capacity(h.near_sections as usize);
        for _ in 0..h.near_sections {
            let nh: NearHeader = r.pod()?;
            let positions: Vec<R3> = r
                .f64s(3 * nh.points as usize)?
                .chunks_exact(3)
                .map(|c| R3::new(c[0], c[1], c[2]))
                .collect();
            let electric = if nh.electric != 0 { Some(r.field_map(&positions)?) } else { None };
            let magnetic = if nh.magnetic != 0 { Some(r.field_map(&positions)?) } else { None };
            near_fields.push(NearFields { electric, magnetic });
        }
        if !r.bytes.is_empty() {
            return Err(NecError::Protocol(format!("{} trailing bytes in result", r.bytes.len())));
        }

        let b = h.budget;
        Ok(Self {
            freq_mhz: h.freq_mhz,
            wavelength: h.wavelength,
            impedance: (h.flags & HAS_IMPEDANCE != 0).then(|| CScalar::new(h.impedance[0], h.impedance[1])),
            budget: PowerBudget {
                input: b[0],
                radiated: b[1],
                structure_loss: b[2],
                network_loss: b[3],
                efficiency: b[4],
            },
            coefficients,
            segment_currents,
            patch_currents,
            pattern,
            near_fields,
            diagnostics: h.diagnostics as usize,
        })
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
}

impl Reader<'_> {
    fn take(&mut self, len: usize) -> Result<&[u8]> {
        if self.bytes.len() < len {
            return Err(NecError::Protocol(format!(
                "result blob truncated: need {len} bytes, have {}",
                self.bytes.len()
            )));
        }
        let (head, rest) = self.bytes.split_at(len);
        self.bytes = rest;
        Ok(head)
    }

    fn pod<T: Pod>(&mut self) -> Result<T> {
        Ok(bytemuck::pod_read_unaligned(self.take(std::mem::size_of::<T>())?))
    }

    fn f64s(&mut self, n: usize) -> Result<Vec<f64>> {
        Ok(self.take(8 * n)?.chunks_exact(8).map(bytemuck::pod_read_unaligned).collect())
    }

    fn field_map(&mut self, positions: &[R3]) -> Result<FieldMap> {
        let mut samples = Vec::with_capacity(positions.len());
        for p in positions {
            let v = self.f64s(10)?;
            let magnitude = [v[3], v[4], v[5]];
            let phase = [v[6], v[7], v[8]];
            let c = |k: usize| CScalar::from_polar(magnitude[k], phase[k]);
            samples.push(FieldSample {
                position: *p,
                field: C3::new(c(0), c(1), c(2)),
                magnitude,
                phase,
                real: [v[0], v[1], v[2]],
                total: v[9],
            });
        }
        let tail = self.f64s(2)?;
        Ok(FieldMap {
            samples,
            max_total: tail[0],
            max_radius: tail[1],
        })
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::math::C_ONE;

    fn record(near: bool) -> StepRecord {
        let sample = FieldSample {
            position: R3::new(1.0, 2.0, 3.0),
            field: C3::new(CScalar::new(0.0, 2.0), C_ONE, CScalar::new(0.0, 0.0)),
            magnitude: [2.0, 1.0, 0.0],
            phase: [std::f64::consts::FRAC_PI_2, 0.0, 0.0],
            real: [0.0, 1.0, 0.0],
            total: 2.0,
        };
        let map = FieldMap {
            samples: vec![sample],
            max_total: 2.0,
            max_radius: 14.0_f64.sqrt(),
        };
        StepRecord {
            freq_mhz: 14.2,
            wavelength: 21.1,
            impedance: Some(CScalar::new(73.0, 42.5)),
            budget: PowerBudget::new(1.0, 0.1, 0.0),
            coefficients: vec![
                CurrentCoefficients {
                    a: CScalar::new(1.0, -1.0),
                    b: CScalar::new(0.5, 0.0),
                    c: CScalar::new(0.0, 0.25),
                };
                3
            ],
            segment_currents: vec![CScalar::new(0.01, 0.002); 3],
            patch_currents: vec![C3::new(C_ONE, -C_ONE, CScalar::new(0.0, 3.0))],
            pattern: Some(PatternSummary {
                theta_count: 2,
                phi_count: 1,
                gain_db: vec![2.1, -999.99],
                tilt: vec![0.0, 0.1],
                axial_ratio: vec![0.0, -0.5],
                sense: vec![PolarizationSense::Linear, PolarizationSense::Right],
                extremes: [[2.1, -999.99, 90.0, 0.0]; 5],
            }),
            near_fields: if near {
                vec![NearFields {
                    electric: Some(map.clone()),
                    magnetic: Some(map),
                }]
            } else {
                Vec::new()
            },
            diagnostics: 1,
        }
    }

    #[test]
    fn commands_have_fixed_frames() {
        let f = Command::FrequencyData(146.52).encode();
        assert_eq!(&f[..7], b"frqdata");
        assert_eq!(f.len(), 15);
        assert_eq!(Command::decode(&f).unwrap(), Command::FrequencyData(146.52));

        let n = Command::NearFieldFlags(NearFieldMask(NearFieldMask::MAGNETIC)).encode();
        assert_eq!(n, b"nearehf\x02");
        assert_eq!(Command::decode(b"inpfile").unwrap(), Command::OpenInput);

        assert!(Command::decode(b"frqdat").is_err());
        assert!(Command::decode(b"inpfileX").is_err());
        assert!(Command::decode(b"shutdwn").is_err());
    }

    #[test]
    fn header_has_no_padding() {
        assert_eq!(std::mem::size_of::<BlobHeader>(), 9 * 8 + 8 * 4);
    }

    #[test]
    fn result_without_near_fields() {
        let r = record(false);
        let frame = r.encode().unwrap();
        assert_eq!(&frame[..4], b"noeh");
        assert_eq!(StepRecord::decode(&frame).unwrap(), r);
    }

    #[test]
    fn result_with_near_fields() {
        let r = record(true);
        let frame = r.encode().unwrap();
        assert_eq!(&frame[..4], b"nfeh");
        let back = StepRecord::decode(&frame).unwrap();
        let e = &back.near_fields[0].electric.as_ref().unwrap().samples[0];
        assert_relative_eq!(e.field.x.im, 2.0, epsilon = 1.0e-12);
        assert_relative_eq!(e.field.x.re, 0.0, epsilon = 1.0e-12);
        assert_eq!(e.position, R3::new(1.0, 2.0, 3.0));
        assert_eq!(back.pattern, r.pattern);
        assert_eq!(back.coefficients, r.coefficients);
    }

    #[test]
    fn damaged_results_are_rejected() {
        let frame = record(false).encode().unwrap();
        assert!(StepRecord::decode(&frame[..frame.len() - 3]).is_err());
        let mut wrong = frame.clone();
        wrong[..4].copy_from_slice(b"nfeh");
        assert!(StepRecord::decode(&wrong).is_err());
        let mut longer = frame;
        longer.push(0);
        assert!(StepRecord::decode(&longer).is_err());
    }
}
