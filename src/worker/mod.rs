//! Frequency steps solved by a pool of workers.
//!
//! Each worker holds its own copy of the input and its own Sommerfeld
//! table; nothing mutable is shared. Coordinator and workers talk only in
//! the byte frames of [`protocol`].

/// Worker pool and its channels.
pub mod pool;
/// Command and result framing.
pub mod protocol;

use std::sync::Arc;

pub use pool::{run_sweep, InProcessChannel, Reply, ThreadChannel, WorkerChannel, WorkerPool};
pub use protocol::{BlobHeader, Command, PatternSummary, StepRecord};

use crate::errors::{NecError, Result};
use crate::model::NecModel;
use crate::nearfield::NearFieldMask;
use crate::simulation::{FrequencyRunner, SolverConfig};

/// The worker side of the protocol.
#[derive(Debug)]
pub struct Worker {
    model: Arc<NecModel>,
    config: SolverConfig,
    runner: Option<FrequencyRunner>,
    near: NearFieldMask,
}

impl Worker {
    /// A worker over its own copy of `model`. The geometry is built when
    /// the `inpfile` command arrives.
    #[must_use]
    pub fn new(model: Arc<NecModel>, config: SolverConfig) -> Self {
        Self {
            model,
            config,
            runner: None,
            near: NearFieldMask::ALL,
        }
    }

    /// Executes one framed command, returning the framed result if the
    /// command produces one.
    pub fn handle(&mut self, frame: &[u8]) -> Result<Option<Vec<u8>>> {
        match Command::decode(frame)? {
            Command::OpenInput => {
                self.runner = Some(FrequencyRunner::new(&self.model, self.config.clone())?);
                Ok(None)
            }
            Command::NearFieldFlags(mask) => {
                self.near = mask;
                Ok(None)
            }
            Command::FrequencyData(freq_mhz) => {
                let runner = self
                    .runner
                    .as_mut()
                    .ok_or_else(|| NecError::Protocol("frequency requested before the input was opened".into()))?;
                let result = runner.run(freq_mhz, self.near)?;
                StepRecord::from(&result).encode().map(Some)
            }
        }
    }
}
