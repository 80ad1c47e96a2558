//! Solution of the structure together with the two-port networks joining
//! its segments.
//!
//! Every network port sits across the gap at the centre of a segment. Ports
//! on segments driven by a voltage source have a known voltage; every other
//! port gets one unknown, its voltage. Coupling through the structure comes
//! from unit solves of the factored interaction matrix, so the extra system
//! only has as many equations as there are distinct unsourced ports.

use nalgebra::{DMatrix, DVector};

use crate::errors::{Diagnostic, NecError, Result};
use crate::math::{CScalar, Scalar, C_ZERO};
use crate::moment::{CurrentDistribution, ExcitationVector, Factored, ScaledStructure, SegmentRef};

use super::transmission::TransmissionLine;
use super::twoport::YParameters;

/// Relative asymmetry of the port coupling above which a warning is issued.
pub const ASYMMETRY_WARNING: Scalar = 1.0e-3;

/// What joins the two ports.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NetworkElement {
    /// Short-circuit admittances given directly.
    Admittance(YParameters),
    /// Ideal transmission line.
    Line(TransmissionLine),
}

/// A two-port network between two segments.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NetworkSpec {
    /// Segment at port 1.
    pub port1: SegmentRef,
    /// Segment at port 2.
    pub port2: SegmentRef,
    /// The network itself.
    pub element: NetworkElement,
}

impl NetworkSpec {
    /// Network given by its admittances.
    #[must_use]
    pub const fn admittance(port1: SegmentRef, port2: SegmentRef, y: YParameters) -> Self {
        Self {
            port1,
            port2,
            element: NetworkElement::Admittance(y),
        }
    }

    /// Transmission line between the ports.
    #[must_use]
    pub const fn line(port1: SegmentRef, port2: SegmentRef, line: TransmissionLine) -> Self {
        Self {
            port1,
            port2,
            element: NetworkElement::Line(line),
        }
    }

    /// Locates the port segments and evaluates the admittances at the
    /// wavelength of `structure`.
    pub fn resolve(&self, structure: &ScaledStructure) -> Result<ResolvedNetwork> {
        let geom = &structure.geometry;
        let seg1 = self.port1.resolve(geom)?;
        let seg2 = self.port2.resolve(geom)?;
        let y = match &self.element {
            NetworkElement::Admittance(y) => *y,
            NetworkElement::Line(line) => {
                let distance = (geom.segments[seg1].center - geom.segments[seg2].center).norm()
                    * structure.wavelength;
                line.admittance(distance, structure.wavelength)?
            }
        };
        Ok(ResolvedNetwork { ports: [seg1, seg2], y })
    }
}

/// A network with its ports located and its admittances evaluated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedNetwork {
    /// Segment indices of port 1 and port 2.
    pub ports: [usize; 2],
    /// Admittances at the current frequency.
    pub y: YParameters,
}

/// Kind of a driven port.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Applied-field voltage source.
    Applied,
    /// Current-slope discontinuity source.
    Discontinuity,
}

/// Terminal quantities of one voltage source.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceReport {
    /// Driven segment.
    pub segment: usize,
    /// Source model.
    pub kind: SourceKind,
    /// Source voltage in volts.
    pub voltage: CScalar,
    /// Current delivered by the source in amperes.
    pub current: CScalar,
    /// Impedance seen by the source in ohms.
    pub impedance: CScalar,
    /// Power delivered by the source in watts.
    pub power: Scalar,
    /// Whether the source also feeds a network.
    pub on_network: bool,
}

/// Largest relative asymmetry of the coupling between driven and network
/// ports.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AsymmetryReport {
    /// `|c_ij - c_ji| / |c_ij|` at its maximum.
    pub max_relative: Scalar,
    /// Segments of the worst pair.
    pub segments: (usize, usize),
}

/// Everything one excitation produces.
#[derive(Debug, Clone, PartialEq)]
pub struct StructureSolution {
    /// Currents on the structure.
    pub currents: CurrentDistribution,
    /// One entry per voltage source, applied sources first.
    pub sources: Vec<SourceReport>,
    /// Total power delivered by the sources in watts.
    pub input_power: Scalar,
    /// Power dissipated in the networks in watts.
    pub network_loss: Scalar,
    /// Coupling asymmetry, when requested and meaningful.
    pub asymmetry: Option<AsymmetryReport>,
    /// Non-fatal findings.
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Port {
    Equation(usize),
    Source(usize),
}

/// Solves the factored structure with its networks for any excitation.
#[derive(Debug)]
pub struct NetworkSolver<'a> {
    structure: &'a ScaledStructure,
    factored: &'a Factored,
    networks: &'a [ResolvedNetwork],
}

impl<'a> NetworkSolver<'a> {
    /// Solver for `structure` factored into `factored`, with `networks`.
    #[must_use]
    pub fn new(structure: &'a ScaledStructure, factored: &'a Factored, networks: &'a [ResolvedNetwork]) -> Self {
        Self {
            structure,
            factored,
            networks,
        }
    }

    fn segment_length(&self, i: usize) -> Scalar {
        self.structure.geometry.segments[i].length
    }

    /// Centre currents of a unit tangential field at segment `seg`.
    fn unit_response(&self, seg: usize) -> Result<CurrentDistribution> {
        let x = self.factored.solve_unit(seg)?;
        CurrentDistribution::from_solution(self.structure, &x, &[])
    }

    /// Solves for `excitation`. With `report_asymmetry` the coupling between
    /// all driven and network ports is checked for reciprocity.
    pub fn solve(&self, excitation: &ExcitationVector, report_asymmetry: bool) -> Result<StructureSolution> {
        let mut diagnostics = Vec::new();

        let mut input_power = 0.0;
        let mut network_loss = 0.0;
        let mut sources = Vec::with_capacity(excitation.voltage_sources.len() + excitation.discontinuities.len());

        let currents = if self.networks.is_empty() {
            let x = self.factored.solve(&excitation.vector)?;
            let currents = CurrentDistribution::from_solution(self.structure, &x, &excitation.discontinuities)?;
            for &(segment, voltage) in &excitation.voltage_sources {
                let current = currents.segment_currents[segment];
                let report = applied_report(segment, voltage, current, false)?;
                input_power += report.power;
                sources.push(report);
            }
            currents
        } else {
            self.solve_with_networks(excitation, &mut sources, &mut input_power, &mut network_loss)?
        };

        for d in &excitation.discontinuities {
            let current = currents.source_current(d);
            if current.norm() == 0.0 {
                return Err(NecError::Excitation(format!(
                    "no current into the discontinuity source on segment {}",
                    d.segment + 1
                )));
            }
            let power = 0.5 * (d.voltage * current.conj()).re;
            input_power += power;
            sources.push(SourceReport {
                segment: d.segment,
                kind: SourceKind::Discontinuity,
                voltage: d.voltage,
                current,
                impedance: d.voltage / current,
                power,
                on_network: false,
            });
        }

        let asymmetry = if report_asymmetry {
            self.asymmetry(excitation)?
        } else {
            None
        };
        if let Some(a) = &asymmetry {
            let message = format!(
                "maximum relative asymmetry of the port coupling is {:.3e} between segments {} and {}",
                a.max_relative,
                a.segments.0 + 1,
                a.segments.1 + 1
            );
            diagnostics.push(if a.max_relative > ASYMMETRY_WARNING {
                Diagnostic::warning(message)
            } else {
                Diagnostic::info(message)
            });
        }

        tracing::debug!(
            sources = sources.len(),
            networks = self.networks.len(),
            input_power,
            network_loss,
            "structure solved"
        );
        Ok(StructureSolution {
            currents,
            sources,
            input_power,
            network_loss,
            asymmetry,
            diagnostics,
        })
    }

    fn solve_with_networks(
        &self,
        excitation: &ExcitationVector,
        sources: &mut Vec<SourceReport>,
        input_power: &mut Scalar,
        network_loss: &mut Scalar,
    ) -> Result<CurrentDistribution> {
        let lambda = self.structure.wavelength;
        let driven = &excitation.voltage_sources;

        // Port unknowns in order of first appearance, equations before sources.
        let mut equations: Vec<usize> = Vec::new();
        let mut source_ports: Vec<(usize, CScalar)> = Vec::new();
        let mut ports = Vec::with_capacity(self.networks.len());
        for net in self.networks {
            let mut pair = [Port::Equation(0); 2];
            for (side, &seg) in net.ports.iter().enumerate() {
                pair[side] = if let Some(&(_, v)) = driven.iter().find(|(s, _)| *s == seg) {
                    let k = position_or_push(&mut source_ports, (seg, v), |p| p.0 == seg);
                    Port::Source(k)
                } else {
                    Port::Equation(position_or_push(&mut equations, seg, |&s| s == seg))
                };
            }
            ports.push(pair);
        }
        let neq = equations.len();
        let row = |p: Port| match p {
            Port::Equation(k) => k,
            Port::Source(k) => neq + k,
        };

        // Rows and columns: port voltages, then the driven ports whose rows
        // only feed the source currents.
        let dim = neq + source_ports.len();
        let mut m = DMatrix::from_element(dim, dim, C_ZERO);
        let mut rhs = DVector::from_element(dim, C_ZERO);
        for (net, pair) in self.networks.iter().zip(&ports) {
            for side in 0..2 {
                let other = 1 - side;
                let (r_self, r_other) = (row(pair[side]), row(pair[other]));
                match pair[side] {
                    Port::Equation(_) => {
                        let s = self.segment_length(net.ports[side]);
                        m[(r_self, r_self)] -= net.y.entry(side, side) * s;
                        m[(r_other, r_self)] -= net.y.entry(side, other) * s;
                    }
                    Port::Source(k) => {
                        let v = source_ports[k].1 / lambda;
                        rhs[r_self] += net.y.entry(side, side) * v;
                        rhs[r_other] += net.y.entry(side, other) * v;
                    }
                }
            }
        }

        for (i, &seg_i) in equations.iter().enumerate() {
            let unit = self.unit_response(seg_i)?;
            for (j, &seg_j) in equations.iter().enumerate() {
                m[(j, i)] += unit.normalized_center(seg_j);
            }
        }

        let x0 = self.factored.solve(&excitation.vector)?;
        let open = CurrentDistribution::from_solution(self.structure, &x0, &excitation.discontinuities)?;
        let port_voltages = if neq > 0 {
            let mut b = DVector::from_fn(neq, |i, _| rhs[i] + open.normalized_center(equations[i]));
            let lu = m.view((0, 0), (neq, neq)).into_owned().lu();
            if !lu.solve_mut(&mut b) {
                return Err(NecError::Network("network equations are singular".into()));
            }
            b
        } else {
            DVector::from_element(0, C_ZERO)
        };

        let mut e = excitation.vector.clone();
        for (i, &seg) in equations.iter().enumerate() {
            e[seg] -= port_voltages[i];
        }
        let x = self.factored.solve(&e)?;
        let currents = CurrentDistribution::from_solution(self.structure, &x, &excitation.discontinuities)?;

        for (i, &seg) in equations.iter().enumerate() {
            let v = port_voltages[i] * self.segment_length(seg) * lambda;
            let current = currents.segment_currents[seg];
            *network_loss -= 0.5 * (v * current.conj()).re;
        }
        for &(seg, v) in &source_ports {
            *network_loss -= 0.5 * (v * currents.segment_currents[seg].conj()).re;
        }

        for &(segment, voltage) in driven {
            let Some(k) = source_ports.iter().position(|p| p.0 == segment) else {
                let report = applied_report(segment, voltage, currents.segment_currents[segment], false)?;
                *input_power += report.power;
                sources.push(report);
                continue;
            };
            let r = neq + k;
            let mut into_network = rhs[r];
            for j in 0..neq {
                into_network -= m[(r, j)] * port_voltages[j];
            }
            let current = currents.segment_currents[segment] + into_network * lambda;
            let report = applied_report(segment, voltage, current, true)?;
            *input_power += report.power;
            *network_loss += report.power;
            sources.push(report);
        }
        Ok(currents)
    }

    fn asymmetry(&self, excitation: &ExcitationVector) -> Result<Option<AsymmetryReport>> {
        let mut segments: Vec<usize> = Vec::new();
        let candidates = self
            .networks
            .iter()
            .flat_map(|n| n.ports)
            .chain(excitation.voltage_sources.iter().map(|&(s, _)| s));
        for seg in candidates {
            if !segments.contains(&seg) {
                segments.push(seg);
            }
        }
        if segments.len() < 2 {
            return Ok(None);
        }

        let n = segments.len();
        let mut c = DMatrix::from_element(n, n, C_ZERO);
        for (i, &seg_i) in segments.iter().enumerate() {
            let unit = self.unit_response(seg_i)?;
            let s = self.segment_length(seg_i);
            for (j, &seg_j) in segments.iter().enumerate() {
                c[(j, i)] = unit.normalized_center(seg_j) / s;
            }
        }

        let mut worst = AsymmetryReport {
            max_relative: 0.0,
            segments: (segments[0], segments[1]),
        };
        for i in 1..n {
            for j in 0..i {
                let reference = c[(i, j)];
                if reference.norm() == 0.0 {
                    continue;
                }
                let rel = ((reference - c[(j, i)]) / reference).norm();
                if rel > worst.max_relative {
                    worst = AsymmetryReport {
                        max_relative: rel,
                        segments: (segments[i], segments[j]),
                    };
                }
            }
        }
        Ok(Some(worst))
    }
}

fn position_or_push<T>(list: &mut Vec<T>, item: T, matches: impl Fn(&T) -> bool) -> usize {
    if let Some(k) = list.iter().position(matches) {
        k
    } else {
        list.push(item);
        list.len() - 1
    }
}

fn applied_report(segment: usize, voltage: CScalar, current: CScalar, on_network: bool) -> Result<SourceReport> {
    if current.norm() == 0.0 {
        return Err(NecError::Excitation(format!(
            "no current through the voltage source on segment {}",
            segment + 1
        )));
    }
    Ok(SourceReport {
        segment,
        kind: SourceKind::Applied,
        voltage,
        current,
        impedance: voltage / current,
        power: 0.5 * (voltage * current.conj()).re,
        on_network,
    })
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::fields::FieldEvaluator;
    use crate::geometry::GeometryBuilder;
    use crate::ground::{GroundParameters, GroundSpec};
    use crate::math::{C_ONE, R3};
    use crate::moment::{build_excitation, Excitation, FillOptions, MatrixFill};

    const FREQ: Scalar = 299.8;

    /// Two parallel half-wave dipoles of 7 segments, 0.25 m apart.
    fn pair() -> ScaledStructure {
        let mut b = GeometryBuilder::new();
        b.wire(1, 7, R3::new(0.0, 0.0, -0.25), R3::new(0.0, 0.0, 0.25), 0.001, 1.0, 1.0)
            .unwrap();
        b.wire(2, 7, R3::new(0.25, 0.0, -0.25), R3::new(0.25, 0.0, 0.25), 0.001, 1.0, 1.0)
            .unwrap();
        ScaledStructure::new(&b.finish(false).unwrap(), FREQ).unwrap()
    }

    fn factor(structure: &ScaledStructure) -> Factored {
        let ground = GroundParameters::new(&GroundSpec::FreeSpace, structure.wavelength).unwrap();
        let filled = MatrixFill::new(structure, &ground, None, None, FillOptions::default())
            .fill()
            .unwrap();
        Factored::factor(filled.matrix, 1.0e-10).unwrap().0
    }

    fn drive(structure: &ScaledStructure, excitations: &[Excitation]) -> ExcitationVector {
        let ground = GroundParameters::new(&GroundSpec::FreeSpace, structure.wavelength).unwrap();
        let mut eval = FieldEvaluator::new(&ground, None, crate::constants::DEFAULT_RKH, false).unwrap();
        build_excitation(structure, &mut eval, excitations, None).unwrap()
    }

    fn feed(tag: u32) -> Excitation {
        Excitation::Voltage {
            segment: SegmentRef::new(tag, 4),
            voltage: C_ONE,
        }
    }

    #[test]
    fn without_networks_power_follows_the_source_current() {
        let s = pair();
        let f = factor(&s);
        let e = drive(&s, &[feed(1)]);
        let sol = NetworkSolver::new(&s, &f, &[]).solve(&e, false).unwrap();
        assert_eq!(sol.sources.len(), 1);
        let src = sol.sources[0];
        assert_eq!(src.segment, 3);
        assert!(!src.on_network);
        assert_relative_eq!(src.current.re, sol.currents.segment_currents[3].re, epsilon = 1.0e-15);
        assert_relative_eq!(sol.input_power, 0.5 * src.current.re, epsilon = 1.0e-12);
        assert!(src.impedance.re > 0.0);
        assert_eq!(sol.network_loss, 0.0);
        assert!(sol.asymmetry.is_none());
    }

    fn port_network(s: &ScaledStructure, y11: CScalar) -> ResolvedNetwork {
        NetworkSpec::admittance(
            SegmentRef::new(1, 4),
            SegmentRef::new(2, 4),
            YParameters::new(y11, C_ZERO, C_ZERO),
        )
        .resolve(s)
        .unwrap()
    }

    #[test]
    fn open_port_interrupts_the_parasitic_element() {
        let s = pair();
        let f = factor(&s);
        let e = drive(&s, &[feed(1)]);
        let bare = NetworkSolver::new(&s, &f, &[]).solve(&e, false).unwrap();
        let open = NetworkSolver::new(&s, &f, &[port_network(&s, C_ZERO)]).solve(&e, false).unwrap();
        let induced = bare.currents.segment_currents[10].norm();
        assert!(induced > 0.0);
        assert_relative_eq!(open.currents.segment_currents[10].norm(), 0.0, epsilon = 1.0e-8 * induced);
        assert!(open.sources[0].on_network);
        assert!((open.sources[0].impedance - bare.sources[0].impedance).norm() > 1.0e-3);
    }

    #[test]
    fn shunt_conductance_draws_extra_source_current() {
        // 1 mS across the driven gap draws V·G more current, all of it lost.
        let s = pair();
        let f = factor(&s);
        let e = drive(&s, &[feed(1)]);
        let open = NetworkSolver::new(&s, &f, &[port_network(&s, C_ZERO)]).solve(&e, false).unwrap();
        let g = CScalar::new(1.0e-3, 0.0);
        let shunt = NetworkSolver::new(&s, &f, &[port_network(&s, g)]).solve(&e, false).unwrap();
        let extra = shunt.sources[0].current - open.sources[0].current;
        assert_relative_eq!(extra.re, 1.0e-3, epsilon = 1.0e-9);
        assert_relative_eq!(extra.im, 0.0, epsilon = 1.0e-9);
        assert_relative_eq!(shunt.network_loss - open.network_loss, 0.5e-3, epsilon = 1.0e-9);
    }

    #[test]
    fn line_to_the_parasitic_element_drives_it() {
        let s = pair();
        let f = factor(&s);
        let e = drive(&s, &[feed(1)]);
        let net = NetworkSpec::line(SegmentRef::new(1, 4), SegmentRef::new(2, 4), TransmissionLine::new(300.0, 0.1))
            .resolve(&s)
            .unwrap();
        let bare = NetworkSolver::new(&s, &f, &[]).solve(&e, false).unwrap();
        let with = NetworkSolver::new(&s, &f, &[net]).solve(&e, true).unwrap();
        let parasitic_bare = bare.currents.segment_currents[10].norm();
        let parasitic = with.currents.segment_currents[10].norm();
        assert!((parasitic - parasitic_bare).abs() > 1.0e-3 * parasitic_bare);
        // A lossless line dissipates nothing.
        assert_relative_eq!(with.network_loss, 0.0, epsilon = 1.0e-6 * with.input_power.abs());
        let asym = with.asymmetry.unwrap();
        assert!(asym.max_relative < 1.0e-2);
        assert_eq!(with.diagnostics.len(), 1);
    }

    #[test]
    fn unknown_port_tag_is_an_error() {
        let s = pair();
        let spec = NetworkSpec::line(SegmentRef::new(1, 4), SegmentRef::new(9, 1), TransmissionLine::new(50.0, 0.2));
        assert!(spec.resolve(&s).is_err());
    }
}
