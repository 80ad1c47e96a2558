//! Orchestration of one frequency step and of whole sweeps.

use std::sync::Arc;
use std::time::Duration;

use crate::circuits::{
    effective_loads, AsymmetryReport, LoadSpec, NetworkSolver, PowerBudget, SegmentLoads, SourceReport,
};
use crate::errors::{Diagnostic, NecError, Result};
use crate::fields::FieldEvaluator;
use crate::geometry::Geometry;
use crate::ground::{prepare_table, GroundParameters, GroundTable};
use crate::math::{CScalar, Scalar};
use crate::model::{ControlDeck, NecModel};
use crate::moment::{build_excitation, CurrentDistribution, Factored, FillOptions, MatrixFill, ScaledStructure};
use crate::nearfield::{NearFieldEvaluator, NearFieldMask, NearFields};
use crate::radiation::{radiation_pattern, RadiationPattern};
use crate::sweep::{StepPhase, SweepScheduler};

/// Solver settings that are not part of the input deck.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SolverConfig {
    /// Worker threads; 0 runs every step in the coordinator.
    pub workers: usize,
    /// Observation rows per fill block; 0 fills in one block.
    pub matrix_block_rows: usize,
    /// Relative pivot magnitude below which factoring warns.
    pub pivot_warning: Scalar,
    /// Overrides the deck's asymmetry report flag.
    pub asymmetry_report: Option<bool>,
    /// Overrides the deck's kernel choice.
    pub extended_kernel: Option<bool>,
    /// Overrides the deck's lumped-kernel threshold in wavelengths.
    pub kernel_threshold_rkh: Option<Scalar>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            matrix_block_rows: 0,
            pivot_warning: 1.0e-10,
            asymmetry_report: None,
            extended_kernel: None,
            kernel_threshold_rkh: None,
        }
    }
}

impl SolverConfig {
    /// Sets the number of worker threads.
    #[must_use]
    pub const fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Sets the fill block height.
    #[must_use]
    pub const fn with_matrix_block_rows(mut self, rows: usize) -> Self {
        self.matrix_block_rows = rows;
        self
    }

    /// Sets the pivot warning threshold.
    #[must_use]
    pub const fn with_pivot_warning(mut self, threshold: Scalar) -> Self {
        self.pivot_warning = threshold;
        self
    }

    /// Forces the asymmetry report on or off.
    #[must_use]
    pub const fn with_asymmetry_report(mut self, report: bool) -> Self {
        self.asymmetry_report = Some(report);
        self
    }

    /// Forces the extended kernel on or off.
    #[must_use]
    pub const fn with_extended_kernel(mut self, extended: bool) -> Self {
        self.extended_kernel = Some(extended);
        self
    }

    /// Sets the lumped-kernel threshold.
    #[must_use]
    pub const fn with_kernel_threshold_rkh(mut self, rkh: Scalar) -> Self {
        self.kernel_threshold_rkh = Some(rkh);
        self
    }

    fn fill_options(&self, deck: &ControlDeck) -> FillOptions {
        FillOptions {
            rkh: self.kernel_threshold_rkh.unwrap_or(deck.rkh),
            extended_kernel: self.extended_kernel.unwrap_or(deck.extended_kernel),
            block_rows: self.matrix_block_rows,
        }
    }
}

/// Everything computed at one frequency.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FrequencyResult {
    /// Frequency in MHz.
    pub freq_mhz: Scalar,
    /// Wavelength in metres.
    pub wavelength: Scalar,
    /// Currents on the structure.
    pub currents: CurrentDistribution,
    /// Terminal quantities of every voltage source.
    pub sources: Vec<SourceReport>,
    /// Impedance at the first source, in ohms.
    pub impedance: Option<CScalar>,
    /// Power budget.
    pub budget: PowerBudget,
    /// Network coupling asymmetry, when reported.
    pub asymmetry: Option<AsymmetryReport>,
    /// Radiation pattern, when requested.
    pub pattern: Option<RadiationPattern>,
    /// One entry per near-field request left after masking.
    pub near_fields: Vec<NearFields>,
    /// Time spent filling the matrix.
    pub fill_time: Duration,
    /// Time spent factoring it.
    pub factor_time: Duration,
    /// Every recoverable condition met during the step.
    pub diagnostics: Vec<Diagnostic>,
}

/// Runs frequency steps of one model.
///
/// The runner owns an unscaled copy of the geometry and the Sommerfeld
/// table of the last step, so the table is only rebuilt when the ground
/// permittivity changes.
#[derive(Debug, Clone)]
pub struct FrequencyRunner {
    geometry: Geometry,
    deck: ControlDeck,
    loads: Vec<LoadSpec>,
    config: SolverConfig,
    table: Option<Arc<GroundTable>>,
    previous_epsc: Option<CScalar>,
}

impl FrequencyRunner {
    /// Builds the geometry of `model` and checks its deck.
    pub fn new(model: &NecModel, config: SolverConfig) -> Result<Self> {
        model.control.validate()?;
        let geometry = model.build_geometry()?;
        Ok(Self::from_parts(geometry, model.control.clone(), config))
    }

    /// Runner over an already built geometry.
    #[must_use]
    pub fn from_parts(geometry: Geometry, deck: ControlDeck, config: SolverConfig) -> Self {
        let loads = effective_loads(&deck.loads);
        Self {
            geometry,
            deck,
            loads,
            config,
            table: None,
            previous_epsc: None,
        }
    }

    /// The unscaled geometry.
    #[must_use]
    pub const fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// The control deck.
    #[must_use]
    pub const fn deck(&self) -> &ControlDeck {
        &self.deck
    }

    /// Solves at `freq_mhz`.
    pub fn run(&mut self, freq_mhz: Scalar, near: NearFieldMask) -> Result<FrequencyResult> {
        self.run_with_phases(freq_mhz, near, |_| ())
    }

    /// Solves at `freq_mhz`, reporting every pipeline phase as it is
    /// reached.
    pub fn run_with_phases(
        &mut self,
        freq_mhz: Scalar,
        near: NearFieldMask,
        mut on_phase: impl FnMut(StepPhase),
    ) -> Result<FrequencyResult> {
        let span = tracing::info_span!("frequency", mhz = freq_mhz);
        let _entered = span.enter();

        let structure = ScaledStructure::new(&self.geometry, freq_mhz)?;
        on_phase(StepPhase::Scaled);
        let lambda = structure.wavelength;

        let ground = GroundParameters::new(&self.deck.ground, lambda)?;
        if self.previous_epsc != Some(ground.epsc) {
            self.table = prepare_table(&ground, self.table.take());
            self.previous_epsc = Some(ground.epsc);
            on_phase(StepPhase::GroundReady);
        }
        if let Some(request) = &self.deck.far_field {
            request.validate(&ground)?;
        }
        let table = self.table.clone();
        let table = table.as_deref();

        // Integration warnings of the table hold for every step that uses it.
        let mut diagnostics: Vec<Diagnostic> = table.map_or_else(Vec::new, |t| t.diagnostics().to_vec());
        let loads = match SegmentLoads::apply(&structure.geometry, lambda, &self.loads)? {
            Some((loads, found)) => {
                diagnostics.extend(found);
                Some(loads)
            }
            None => None,
        };
        let load_slice = loads.as_ref().map(SegmentLoads::as_slice);

        let options = self.config.fill_options(&self.deck);
        let filled = MatrixFill::new(&structure, &ground, table, load_slice, options).fill()?;
        diagnostics.extend(filled.diagnostics);
        let (factored, found) = Factored::factor(filled.matrix, self.config.pivot_warning)?;
        diagnostics.extend(found);
        let factor_time = factored.stats.factor_time;
        on_phase(StepPhase::MatrixFactored);

        let mut eval = FieldEvaluator::new(&ground, table, options.rkh, options.extended_kernel)?;
        let excitation = build_excitation(&structure, &mut eval, &self.deck.excitations, load_slice)?;
        on_phase(StepPhase::Excited);

        let networks = self
            .deck
            .networks
            .iter()
            .map(|n| n.resolve(&structure))
            .collect::<Result<Vec<_>>>()?;
        let report_asymmetry = self.config.asymmetry_report.unwrap_or(self.deck.report_asymmetry);
        let solution = NetworkSolver::new(&structure, &factored, &networks).solve(&excitation, report_asymmetry)?;
        diagnostics.extend(solution.diagnostics.iter().cloned());
        on_phase(StepPhase::Solved);

        let structure_loss = loads
            .as_ref()
            .map_or(0.0, |l| l.structure_loss(&solution.currents.segment_currents));
        let budget = PowerBudget::of(&solution, structure_loss);

        let pattern = self
            .deck
            .far_field
            .as_ref()
            .map(|request| {
                radiation_pattern(&structure, &solution.currents, &ground, excitation.class, &budget, request)
            })
            .transpose()?;

        let mut near_fields = Vec::new();
        for request in self.deck.near_fields.iter().filter_map(|r| near.restrict(r)) {
            let eval = FieldEvaluator::new(&ground, table, options.rkh, options.extended_kernel)?;
            near_fields.push(NearFieldEvaluator::new(&structure, &solution.currents, eval).compute(&request)?);
        }
        on_phase(StepPhase::PostProcessed);

        let impedance = solution.sources.first().map(|s| s.impedance);
        if let Some(z) = impedance {
            tracing::debug!(re = z.re, im = z.im, "input impedance");
        }
        Ok(FrequencyResult {
            freq_mhz,
            wavelength: lambda,
            currents: solution.currents,
            sources: solution.sources,
            impedance,
            budget,
            asymmetry: solution.asymmetry,
            pattern,
            near_fields,
            fill_time: filled.elapsed,
            factor_time,
            diagnostics,
        })
    }
}

/// Solves `model` at a single frequency.
pub fn run_frequency(model: &NecModel, config: &SolverConfig, freq_mhz: Scalar) -> Result<FrequencyResult> {
    FrequencyRunner::new(model, config.clone())?.run(freq_mhz, NearFieldMask::ALL)
}

/// Sweeps every frequency of `model` in the calling thread, handing each
/// result to `on_step` in frequency order.
pub fn run_sweep_local(
    model: &NecModel,
    config: &SolverConfig,
    mut on_step: impl FnMut(usize, &FrequencyResult),
) -> Result<Vec<FrequencyResult>> {
    let mut runner = FrequencyRunner::new(model, config.clone())?;
    let mut scheduler = SweepScheduler::new(model.control.frequency.frequencies()?, 1);
    let mut results = Vec::with_capacity(scheduler.len());
    while let Some(assignment) = scheduler.dispatch() {
        let mut phase_error = None;
        let result = runner.run_with_phases(assignment.freq_mhz, NearFieldMask::ALL, |phase| {
            if let Err(e) = scheduler.advance(assignment.step, phase) {
                phase_error.get_or_insert(e);
            }
        })?;
        if let Some(e) = phase_error {
            return Err(e);
        }
        scheduler.complete(&assignment)?;
        on_step(assignment.step, &result);
        results.push(result);
    }
    if !scheduler.is_finished() {
        return Err(NecError::Worker("sweep stopped before its last step".into()));
    }
    Ok(results)
}
