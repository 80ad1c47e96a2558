//! Frequency sweep definitions and the out-of-order step scheduler.

use crate::errors::{NecError, Result};
use crate::math::Scalar;

/// One block of frequency steps, in MHz.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FrequencyBlock {
    /// `start + i·step` for `count` steps.
    Linear {
        /// First frequency.
        start: Scalar,
        /// Increment.
        step: Scalar,
        /// Number of steps.
        count: i64,
    },
    /// `start·step^i` for `count` steps.
    Multiplicative {
        /// First frequency.
        start: Scalar,
        /// Ratio between steps.
        step: Scalar,
        /// Number of steps.
        count: i64,
    },
    /// `count` equal intervals from `min` to `max`, both ends included.
    LinearRange {
        /// Lowest frequency.
        min: Scalar,
        /// Highest frequency.
        max: Scalar,
        /// Number of intervals.
        count: i64,
    },
    /// `count` equal ratios from `min` to `max`, both ends included.
    MultiplicativeRange {
        /// Lowest frequency.
        min: Scalar,
        /// Highest frequency.
        max: Scalar,
        /// Number of intervals.
        count: i64,
    },
}

impl FrequencyBlock {
    /// Frequencies of this block.
    pub fn frequencies(&self) -> Result<Vec<Scalar>> {
        let steps = |count: i64| usize::try_from(count.max(1)).unwrap_or(1);
        let out: Vec<Scalar> = match *self {
            Self::Linear { start, step, count } => {
                (0..steps(count)).map(|i| start + step * i as Scalar).collect()
            }
            Self::Multiplicative { start, step, count } => {
                (0..steps(count)).map(|i| start * step.powi(i as i32)).collect()
            }
            Self::LinearRange { min, max, count } => {
                let n = steps(count);
                let step = (max - min) / n as Scalar;
                (0..=n).map(|i| min + step * i as Scalar).collect()
            }
            Self::MultiplicativeRange { min, max, count } => {
                if !(min > 0.0 && max > 0.0) {
                    return Err(NecError::Config(format!(
                        "multiplicative range needs positive limits, got {min}..{max} MHz"
                    )));
                }
                let n = steps(count);
                let ratio = (max / min).powf(1.0 / n as Scalar);
                (0..=n).map(|i| min * ratio.powi(i as i32)).collect()
            }
        };
        if let Some(bad) = out.iter().find(|f| !(f.is_finite() && **f > 0.0)) {
            return Err(NecError::Config(format!("frequency {bad} MHz is not positive")));
        }
        Ok(out)
    }
}

/// The frequency steps of a run: blocks are swept in order.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FrequencySpec {
    /// Blocks in sweep order.
    pub blocks: Vec<FrequencyBlock>,
}

impl FrequencySpec {
    /// A single frequency.
    #[must_use]
    pub fn single(freq_mhz: Scalar) -> Self {
        Self::from(FrequencyBlock::Linear {
            start: freq_mhz,
            step: 0.0,
            count: 1,
        })
    }

    /// Appends a block.
    #[must_use]
    pub fn then(mut self, block: FrequencyBlock) -> Self {
        self.blocks.push(block);
        self
    }

    /// Every frequency of the sweep in MHz.
    pub fn frequencies(&self) -> Result<Vec<Scalar>> {
        let mut out = Vec::new();
        for block in &self.blocks {
            out.extend(block.frequencies()?);
        }
        if out.is_empty() {
            return Err(NecError::Config("no frequency specified".into()));
        }
        Ok(out)
    }
}

impl From<FrequencyBlock> for FrequencySpec {
    fn from(block: FrequencyBlock) -> Self {
        Self { blocks: vec![block] }
    }
}

/// Pipeline position of one frequency step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StepPhase {
    /// Not started.
    #[default]
    Idle,
    /// Geometry scaled to wavelengths.
    Scaled,
    /// Ground parameters and table prepared.
    GroundReady,
    /// Interaction matrix filled and factored.
    MatrixFactored,
    /// Excitation vector built.
    Excited,
    /// Currents solved.
    Solved,
    /// Pattern and near fields computed.
    PostProcessed,
}

impl StepPhase {
    /// Every phase in pipeline order.
    pub const ORDER: [Self; 7] = [
        Self::Idle,
        Self::Scaled,
        Self::GroundReady,
        Self::MatrixFactored,
        Self::Excited,
        Self::Solved,
        Self::PostProcessed,
    ];

    /// The phase after this one.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        Self::ORDER.get(self as usize + 1).copied()
    }

    /// Whether `to` may follow this phase. `GroundReady` may be skipped
    /// when the ground is unchanged from the previous step.
    #[must_use]
    pub fn may_advance_to(self, to: Self) -> bool {
        self.next() == Some(to) || (self == Self::Scaled && to == Self::MatrixFactored)
    }
}

/// Fixed-size set of completed steps.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StepBitmap {
    words: Vec<u64>,
    len: usize,
}

impl StepBitmap {
    /// An empty bitmap of `len` steps.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(64)],
            len,
        }
    }

    /// Marks `step`.
    pub fn set(&mut self, step: usize) {
        if step < self.len {
            self.words[step / 64] |= 1 << (step % 64);
        }
    }

    /// Whether `step` is marked.
    #[must_use]
    pub fn get(&self, step: usize) -> bool {
        step < self.len && self.words[step / 64] & (1 << (step % 64)) != 0
    }

    /// Number of marked steps.
    #[must_use]
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Clears every step.
    pub fn clear(&mut self) {
        self.words.iter_mut().for_each(|w| *w = 0);
    }
}

/// A step handed to a worker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Assignment {
    /// Worker index.
    pub worker: usize,
    /// Step index.
    pub step: usize,
    /// Frequency of the step in MHz.
    pub freq_mhz: Scalar,
    /// Reset generation the assignment belongs to.
    pub generation: u64,
}

/// Hands frequency steps to workers and tracks their completion.
///
/// Steps may complete in any order. The externally visible
/// [`last_complete`](Self::last_complete) pointer only moves to the highest
/// step with no incomplete predecessor.
#[derive(Debug, Clone)]
pub struct SweepScheduler {
    frequencies: Vec<Scalar>,
    phases: Vec<StepPhase>,
    done: StepBitmap,
    /// Step and generation each worker is computing.
    workers: Vec<Option<(usize, u64)>>,
    next_step: usize,
    last_complete: Option<usize>,
    paused: bool,
    generation: u64,
}

impl SweepScheduler {
    /// A scheduler over `frequencies` with `workers` workers (at least one).
    #[must_use]
    pub fn new(frequencies: Vec<Scalar>, workers: usize) -> Self {
        let n = frequencies.len();
        Self {
            frequencies,
            phases: vec![StepPhase::Idle; n],
            done: StepBitmap::new(n),
            workers: vec![None; workers.max(1)],
            next_step: 0,
            last_complete: None,
            paused: false,
            generation: 0,
        }
    }

    /// Number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    /// Whether the sweep has no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }

    /// Frequency of `step` in MHz.
    #[must_use]
    pub fn frequency(&self, step: usize) -> Option<Scalar> {
        self.frequencies.get(step).copied()
    }

    /// Highest step with every predecessor complete.
    #[must_use]
    pub const fn last_complete(&self) -> Option<usize> {
        self.last_complete
    }

    /// Phase of `step`.
    #[must_use]
    pub fn phase(&self, step: usize) -> Option<StepPhase> {
        self.phases.get(step).copied()
    }

    /// Whether `step` has completed.
    #[must_use]
    pub fn is_complete(&self, step: usize) -> bool {
        self.done.get(step)
    }

    /// Whether every step has completed.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.done.count() == self.len()
    }

    /// Number of workers the scheduler hands steps to.
    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers.len()
    }

    /// Number of workers holding a step.
    #[must_use]
    pub fn busy_workers(&self) -> usize {
        self.workers.iter().filter(|w| w.is_some()).count()
    }

    /// Whether new assignments are suspended.
    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.paused
    }

    /// Current reset generation.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Gives the next unprocessed step to the first idle worker.
    pub fn dispatch(&mut self) -> Option<Assignment> {
        if self.paused || self.next_step >= self.len() {
            return None;
        }
        let worker = self.workers.iter().position(Option::is_none)?;
        let step = self.next_step;
        self.next_step += 1;
        self.workers[worker] = Some((step, self.generation));
        tracing::trace!(worker, step, "step dispatched");
        Some(Assignment {
            worker,
            step,
            freq_mhz: self.frequencies[step],
            generation: self.generation,
        })
    }

    /// Records pipeline progress of an in-flight step.
    pub fn advance(&mut self, step: usize, to: StepPhase) -> Result<()> {
        let from = *self
            .phases
            .get(step)
            .ok_or_else(|| NecError::Worker(format!("step {step} out of range")))?;
        if !from.may_advance_to(to) {
            return Err(NecError::Worker(format!(
                "step {step} cannot move from {from:?} to {to:?}"
            )));
        }
        self.phases[step] = to;
        Ok(())
    }

    /// Records that `assignment` finished and frees its worker. Results of
    /// an earlier generation only free the worker. Returns the new
    /// [`last_complete`](Self::last_complete) when it moved.
    pub fn complete(&mut self, assignment: &Assignment) -> Result<Option<usize>> {
        let slot = self
            .workers
            .get_mut(assignment.worker)
            .ok_or_else(|| NecError::Worker(format!("no worker {}", assignment.worker)))?;
        let held = Some((assignment.step, assignment.generation));
        if assignment.generation != self.generation {
            if *slot == held {
                *slot = None;
            }
            tracing::debug!(step = assignment.step, "stale result ignored");
            return Ok(None);
        }
        if *slot != held {
            return Err(NecError::Worker(format!(
                "worker {} was not assigned step {}",
                assignment.worker, assignment.step
            )));
        }
        *slot = None;
        self.phases[assignment.step] = StepPhase::PostProcessed;
        self.done.set(assignment.step);

        let before = self.last_complete;
        let mut idx = self.last_complete.map_or(0, |l| l + 1);
        while self.done.get(idx) {
            self.last_complete = Some(idx);
            idx += 1;
        }
        Ok((self.last_complete != before).then_some(self.last_complete).flatten())
    }

    /// Stops issuing new steps. In-flight steps still complete.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Resumes issuing steps.
    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// Clears all per-step state and restarts from the first frequency.
    /// A worker still computing a step of the old generation stays busy
    /// until that result is passed to [`complete`](Self::complete).
    pub fn reset(&mut self) {
        self.phases.iter_mut().for_each(|p| *p = StepPhase::Idle);
        self.done.clear();
        self.next_step = 0;
        self.last_complete = None;
        self.paused = false;
        self.generation += 1;
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn block_forms() {
        let lin = FrequencyBlock::Linear {
            start: 10.0,
            step: 2.5,
            count: 3,
        };
        assert_eq!(lin.frequencies().unwrap(), vec![10.0, 12.5, 15.0]);

        let mul = FrequencyBlock::Multiplicative {
            start: 1.0,
            step: 2.0,
            count: 4,
        };
        assert_eq!(mul.frequencies().unwrap(), vec![1.0, 2.0, 4.0, 8.0]);

        let range = FrequencyBlock::LinearRange {
            min: 100.0,
            max: 200.0,
            count: 4,
        };
        let f = range.frequencies().unwrap();
        assert_eq!(f.len(), 5);
        assert_relative_eq!(f[4], 200.0, epsilon = 1.0e-12);

        let octaves = FrequencyBlock::MultiplicativeRange {
            min: 1.0,
            max: 16.0,
            count: 4,
        };
        let f = octaves.frequencies().unwrap();
        assert_relative_eq!(f[1], 2.0, epsilon = 1.0e-12);
        assert_relative_eq!(f[4], 16.0, epsilon = 1.0e-12);
    }

    #[test]
    fn non_positive_counts_become_one() {
        let lin = FrequencyBlock::Linear {
            start: 7.0,
            step: 1.0,
            count: -3,
        };
        assert_eq!(lin.frequencies().unwrap(), vec![7.0]);
        let range = FrequencyBlock::LinearRange {
            min: 1.0,
            max: 3.0,
            count: 0,
        };
        assert_eq!(range.frequencies().unwrap(), vec![1.0, 3.0]);
    }

    #[test]
    fn blocks_concatenate_and_bad_frequencies_fail() {
        let spec = FrequencySpec::single(5.0).then(FrequencyBlock::Linear {
            start: 6.0,
            step: 1.0,
            count: 2,
        });
        assert_eq!(spec.frequencies().unwrap(), vec![5.0, 6.0, 7.0]);
        assert!(FrequencySpec::default().frequencies().is_err());
        let down = FrequencyBlock::Linear {
            start: 1.0,
            step: -1.0,
            count: 3,
        };
        assert!(down.frequencies().is_err());
    }

    #[test]
    fn phases_move_forward_only() {
        assert!(StepPhase::Idle.may_advance_to(StepPhase::Scaled));
        assert!(StepPhase::Scaled.may_advance_to(StepPhase::MatrixFactored));
        assert!(!StepPhase::Solved.may_advance_to(StepPhase::Excited));
        assert_eq!(StepPhase::PostProcessed.next(), None);

        let mut s = SweepScheduler::new(vec![1.0], 1);
        assert!(s.advance(0, StepPhase::Scaled).is_ok());
        assert!(s.advance(0, StepPhase::Solved).is_err());
    }

    #[test]
    fn out_of_order_completion_keeps_the_pointer_monotonic() {
        let mut s = SweepScheduler::new(vec![1.0, 2.0, 3.0], 2);
        let a = s.dispatch().unwrap();
        let b = s.dispatch().unwrap();
        assert_eq!((a.worker, a.step, b.worker, b.step), (0, 0, 1, 1));
        assert!(s.dispatch().is_none());

        assert_eq!(s.complete(&b).unwrap(), None);
        assert_eq!(s.last_complete(), None);
        assert!(s.is_complete(1));

        let c = s.dispatch().unwrap();
        assert_eq!((c.worker, c.step), (1, 2));
        assert_eq!(s.complete(&a).unwrap(), Some(1));
        assert_eq!(s.complete(&c).unwrap(), Some(2));
        assert!(s.is_finished());
        assert!(s.dispatch().is_none());
    }

    #[test]
    fn pause_reset_and_stale_results() {
        let mut s = SweepScheduler::new(vec![1.0, 2.0], 1);
        let a = s.dispatch().unwrap();
        s.pause();
        assert!(s.dispatch().is_none());
        s.complete(&a).unwrap();
        s.resume();
        let b = s.dispatch().unwrap();
        assert_eq!(b.step, 1);

        s.reset();
        assert_eq!(s.complete(&b).unwrap(), None);
        assert_eq!(s.last_complete(), None);
        assert_eq!(s.dispatch().unwrap().step, 0);

        let bogus = Assignment { step: 1, ..a };
        let bogus = Assignment {
            generation: s.generation(),
            ..bogus
        };
        assert!(s.complete(&bogus).is_err());
    }

    #[test]
    fn reset_keeps_busy_workers_busy() {
        let mut s = SweepScheduler::new(vec![1.0, 2.0, 3.0], 2);
        let a = s.dispatch().unwrap();
        let b = s.dispatch().unwrap();
        s.complete(&a).unwrap();
        s.reset();
        assert_eq!(s.busy_workers(), 1);

        let c = s.dispatch().unwrap();
        assert_eq!((c.worker, c.step), (0, 0));
        assert!(s.dispatch().is_none());

        assert_eq!(s.complete(&b).unwrap(), None);
        assert!(!s.is_complete(1));
        let d = s.dispatch().unwrap();
        assert_eq!((d.worker, d.step), (1, 1));
        // A stale result arriving twice leaves the new assignment alone.
        assert_eq!(s.complete(&b).unwrap(), None);
        assert_eq!(s.busy_workers(), 2);
    }

    #[test]
    fn bitmap_spans_words() {
        let mut m = StepBitmap::new(130);
        m.set(0);
        m.set(129);
        m.set(500);
        assert!(m.get(129) && !m.get(128) && !m.get(500));
        assert_eq!(m.count(), 2);
    }
}
