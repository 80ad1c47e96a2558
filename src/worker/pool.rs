//! Channels to workers and the coordinator loop over them.

use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::errors::{NecError, Result};
use crate::model::NecModel;
use crate::nearfield::NearFieldMask;
use crate::simulation::SolverConfig;
use crate::sweep::{Assignment, SweepScheduler};

use super::protocol::{Command, StepRecord};
use super::Worker;

/// A result frame, or the error that stopped the worker.
#[derive(Debug)]
pub struct Reply {
    /// Index of the worker that sent it.
    pub worker: usize,
    /// The framed result.
    pub frame: std::result::Result<Vec<u8>, String>,
}

/// Sends command frames to one worker. Replies arrive on the pool's shared
/// result channel.
pub trait WorkerChannel {
    /// Queues `frame` for the worker.
    fn send(&mut self, frame: Vec<u8>) -> Result<()>;
}

fn deliver(replies: &Sender<Reply>, worker: usize, outcome: Result<Option<Vec<u8>>>) -> bool {
    let frame = match outcome {
        Ok(None) => return true,
        Ok(Some(frame)) => Ok(frame),
        Err(e) => {
            tracing::error!(worker, error = %e, "worker stopped");
            Err(e.to_string())
        }
    };
    let stopped = frame.is_err();
    replies.send(Reply { worker, frame }).is_ok() && !stopped
}

/// A worker running on its own thread.
#[derive(Debug)]
pub struct ThreadChannel {
    commands: Option<Sender<Vec<u8>>>,
    handle: Option<JoinHandle<()>>,
}

impl ThreadChannel {
    /// Starts worker `index` over its own copy of `model`.
    pub fn spawn(index: usize, model: Arc<NecModel>, config: SolverConfig, replies: Sender<Reply>) -> Result<Self> {
        let (tx, rx) = mpsc::channel::<Vec<u8>>();
        let handle = std::thread::Builder::new()
            .name(format!("nec-worker-{index}"))
            .spawn(move || {
                let mut worker = Worker::new(model, config);
                for frame in rx {
                    if !deliver(&replies, index, worker.handle(&frame)) {
                        break;
                    }
                }
            })?;
        Ok(Self {
            commands: Some(tx),
            handle: Some(handle),
        })
    }
}

impl WorkerChannel for ThreadChannel {
    fn send(&mut self, frame: Vec<u8>) -> Result<()> {
        self.commands
            .as_ref()
            .and_then(|tx| tx.send(frame).ok())
            .ok_or_else(|| NecError::Worker("worker thread has exited".into()))
    }
}

impl Drop for ThreadChannel {
    fn drop(&mut self) {
        self.commands.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("worker thread panicked");
            }
        }
    }
}

/// A worker run synchronously inside the coordinator.
#[derive(Debug)]
pub struct InProcessChannel {
    index: usize,
    worker: Worker,
    replies: Sender<Reply>,
    stopped: bool,
}

impl InProcessChannel {
    /// Worker `index` over `model`, replying on `replies`.
    #[must_use]
    pub fn new(index: usize, model: Arc<NecModel>, config: SolverConfig, replies: Sender<Reply>) -> Self {
        Self {
            index,
            worker: Worker::new(model, config),
            replies,
            stopped: false,
        }
    }
}

impl WorkerChannel for InProcessChannel {
    fn send(&mut self, frame: Vec<u8>) -> Result<()> {
        if self.stopped {
            return Err(NecError::Worker("in-process worker has stopped".into()));
        }
        self.stopped = !deliver(&self.replies, self.index, self.worker.handle(&frame));
        Ok(())
    }
}

/// Workers plus the result channel they share.
pub struct WorkerPool {
    channels: Vec<Box<dyn WorkerChannel>>,
    replies: Receiver<Reply>,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool").field("workers", &self.channels.len()).finish()
    }
}

impl WorkerPool {
    /// `count` worker threads.
    pub fn threads(model: &Arc<NecModel>, config: &SolverConfig, count: usize) -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        let channels = (0..count.max(1))
            .map(|i| {
                ThreadChannel::spawn(i, Arc::clone(model), config.clone(), tx.clone())
                    .map(|c| Box::new(c) as Box<dyn WorkerChannel>)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { channels, replies: rx })
    }

    /// One worker run inside the calling thread.
    #[must_use]
    pub fn in_process(model: &Arc<NecModel>, config: &SolverConfig) -> Self {
        let (tx, rx) = mpsc::channel();
        let channel = InProcessChannel::new(0, Arc::clone(model), config.clone(), tx);
        Self {
            channels: vec![Box::new(channel)],
            replies: rx,
        }
    }

    /// Threads when `config.workers` is positive, otherwise in-process.
    pub fn for_config(model: &Arc<NecModel>, config: &SolverConfig) -> Result<Self> {
        match config.workers {
            0 => Ok(Self::in_process(model, config)),
            n => Self::threads(model, config, n),
        }
    }

    /// Number of workers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Whether the pool has no workers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    fn broadcast(&mut self, command: Command) -> Result<()> {
        let frame = command.encode();
        for channel in &mut self.channels {
            channel.send(frame.clone())?;
        }
        Ok(())
    }

    /// Has every worker build its geometry and select near fields.
    pub fn open(&mut self, near: NearFieldMask) -> Result<()> {
        self.broadcast(Command::OpenInput)?;
        self.broadcast(Command::NearFieldFlags(near))?;
        self.check_replies()
    }

    /// Changes the near fields computed from the next step on.
    pub fn set_near_fields(&mut self, near: NearFieldMask) -> Result<()> {
        self.broadcast(Command::NearFieldFlags(near))
    }

    /// Surfaces an error raised by a command without a result.
    fn check_replies(&mut self) -> Result<()> {
        while let Ok(reply) = self.replies.try_recv() {
            if let Err(msg) = reply.frame {
                return Err(NecError::Worker(format!("worker {}: {msg}", reply.worker)));
            }
        }
        Ok(())
    }

    /// Drives `scheduler` until every step is done, or until it is paused
    /// with nothing in flight. `on_step` sees every result as it arrives
    /// and may pause or reset the scheduler.
    pub fn run(
        &mut self,
        scheduler: &mut SweepScheduler,
        mut on_step: impl FnMut(&mut SweepScheduler, usize, &StepRecord),
    ) -> Result<Vec<Option<StepRecord>>> {
        if scheduler.workers() != self.len() {
            return Err(NecError::Config(format!(
                "scheduler has {} workers, pool has {}",
                scheduler.workers(),
                self.len()
            )));
        }
        let mut results = vec![None; scheduler.len()];
        // Assignments sent to each worker whose result has not come back,
        // oldest first. Workers answer in the order they were asked.
        let mut sent: Vec<VecDeque<Assignment>> = vec![VecDeque::new(); self.len()];
        loop {
            while let Some(a) = scheduler.dispatch() {
                self.channels[a.worker].send(Command::FrequencyData(a.freq_mhz).encode())?;
                sent[a.worker].push_back(a);
            }
            if sent.iter().all(VecDeque::is_empty) {
                break;
            }
            let reply = self
                .replies
                .recv()
                .map_err(|_| NecError::Worker("every worker has exited".into()))?;
            let frame = reply
                .frame
                .map_err(|msg| NecError::Worker(format!("worker {}: {msg}", reply.worker)))?;
            let assignment = sent
                .get_mut(reply.worker)
                .and_then(VecDeque::pop_front)
                .ok_or_else(|| NecError::Protocol(format!("unexpected result from worker {}", reply.worker)))?;
            let stale = assignment.generation != scheduler.generation();
            if let Some(last) = scheduler.complete(&assignment)? {
                tracing::debug!(last, "sweep advanced");
            }
            if stale {
                continue;
            }
            let record = StepRecord::decode(&frame)?;
            on_step(scheduler, assignment.step, &record);
            if scheduler.generation() != assignment.generation {
                results.iter_mut().for_each(|r| *r = None);
            } else if let Some(slot) = results.get_mut(assignment.step) {
                *slot = Some(record);
            }
        }
        Ok(results)
    }
}

/// Sweeps every frequency of `model` on the pool chosen by `config`.
pub fn run_sweep(
    model: NecModel,
    config: &SolverConfig,
    on_step: impl FnMut(&mut SweepScheduler, usize, &StepRecord),
) -> Result<Vec<StepRecord>> {
    model.control.validate()?;
    let frequencies = model.control.frequency.frequencies()?;
    let model = Arc::new(model);
    let mut pool = WorkerPool::for_config(&model, config)?;
    let mut scheduler = SweepScheduler::new(frequencies, pool.len());
    pool.open(NearFieldMask::ALL)?;
    let results = pool.run(&mut scheduler, on_step)?;
    results
        .into_iter()
        .enumerate()
        .map(|(k, r)| r.ok_or_else(|| NecError::Worker(format!("step {k} did not complete"))))
        .collect()
}
