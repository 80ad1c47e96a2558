//! Convenience re-exports for building and solving antenna models.

pub use crate::circuits::{
    LoadCard, LoadKind, LoadSpec, NetworkSpec, PowerBudget, SourceReport, TransmissionLine, TwoPort, YParameters,
};
pub use crate::constants::*;
pub use crate::errors::{Diagnostic, NecError, Result, Severity};
pub use crate::geometry::{Geometry, GeometryBuilder};
pub use crate::ground::{FiniteGround, GroundMethod, GroundSpec, RadialScreen, SecondMedium};
pub use crate::math::{phasor, CScalar, Scalar, C3, R3};
pub use crate::model::{build_geometry, ControlDeck, GeometryCommand, NecModel, PatchShape};
pub use crate::moment::{Excitation, Polarization, SegmentRef};
pub use crate::nearfield::{FieldTotal, NearFieldGrid, NearFieldMask, NearFieldRequest, NearFields};
pub use crate::radiation::{FarFieldRequest, GainType, PolarizationFilter, RadiationPattern};
pub use crate::simulation::{run_frequency, run_sweep_local, FrequencyResult, FrequencyRunner, SolverConfig};
pub use crate::sweep::{FrequencyBlock, FrequencySpec, StepPhase, SweepScheduler};
pub use crate::worker::{run_sweep, StepRecord, WorkerPool};
