//! Lumped loads and the two-port networks that connect segments.

/// Power budget of a driven solution.
pub mod analysis;
/// Segment impedance loading.
pub mod loads;
/// Structure solution with networks attached.
pub mod network;
/// Ideal transmission lines.
pub mod transmission;
/// Two-port admittance and chain representations.
pub mod twoport;

pub use analysis::PowerBudget;
pub use loads::{effective_loads, wire_internal_impedance, LoadCard, LoadKind, LoadSpec, SegmentLoads};
pub use network::{
    AsymmetryReport, NetworkElement, NetworkSolver, NetworkSpec, ResolvedNetwork, SourceKind, SourceReport,
    StructureSolution, ASYMMETRY_WARNING,
};
pub use transmission::TransmissionLine;
pub use twoport::{TwoPort, YParameters};
