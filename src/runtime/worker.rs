//! Offload worker backed by a dedicated OS thread.
//!
//! The worker owns its own [`GenerationProcessor`] (its own copy of the working
//! image) and runs it on a single-threaded tokio runtime, so a slow batch of
//! re-encodes never blocks the runtime the driver loop lives on. Jobs travel
//! over a bounded crossbeam channel; replies come back on tokio oneshots.
//!
//! Dropping the sender is the shutdown signal: `recv()` fails and the thread
//! exits after the job it is running.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};

use async_trait::async_trait;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::core::error::{PlaybackError, ProcessError};
use crate::core::processor::{run_batch, BatchOutcome, GenerationProcessor, OffloadedProcessor};

/// Jobs that may wait in the channel behind the running one.
const JOB_QUEUE_DEPTH: usize = 4;

enum WorkerJob {
    Process {
        qualities: Vec<f64>,
        max_retry: u32,
        reply: oneshot::Sender<BatchOutcome>,
    },
    Resync {
        reply: oneshot::Sender<Result<(), ProcessError>>,
    },
}

/// [`OffloadedProcessor`] that runs batches on its own thread.
pub struct OffloadWorker {
    name: String,
    job_tx: Mutex<Option<Sender<WorkerJob>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
    shutdown: AtomicBool,
    batches: AtomicU64,
}

impl OffloadWorker {
    /// Spawn a worker thread that owns `processor`.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::Offload` when the OS refuses to spawn the thread.
    pub fn spawn<Q>(name: impl Into<String>, processor: Q) -> Result<Self, PlaybackError>
    where
        Q: GenerationProcessor,
    {
        let name = name.into();
        let (job_tx, job_rx) = bounded(JOB_QUEUE_DEPTH);
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn({
                let name = name.clone();
                move || worker_loop(&name, &job_rx, &processor)
            })
            .map_err(|e| PlaybackError::Offload(format!("failed to spawn worker thread: {e}")))?;

        info!(worker = %name, "offload worker started");
        Ok(Self {
            name,
            job_tx: Mutex::new(Some(job_tx)),
            handle: Mutex::new(Some(handle)),
            shutdown: AtomicBool::new(false),
            batches: AtomicU64::new(0),
        })
    }

    /// Batches accepted so far.
    #[must_use]
    pub fn batches_submitted(&self) -> u64 {
        self.batches.load(Ordering::Relaxed)
    }

    /// Whether [`OffloadWorker::shutdown`] has been called.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Stop accepting jobs and wait for the thread to exit.
    ///
    /// Blocks until the job currently running (if any) finishes.
    pub fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        info!(worker = %self.name, "shutting down offload worker");
        self.job_tx.lock().take();
        if let Some(handle) = self.handle.lock().take() {
            if handle.join().is_err() {
                error!(worker = %self.name, "offload worker panicked");
            }
        }
    }

    fn submit(&self, job: WorkerJob) -> Result<(), ProcessError> {
        let guard = self.job_tx.lock();
        let Some(tx) = guard.as_ref() else {
            return Err(ProcessError::Unavailable("worker is shut down".into()));
        };
        tx.try_send(job).map_err(|e| match e {
            TrySendError::Full(_) => ProcessError::Unavailable("worker queue is full".into()),
            TrySendError::Disconnected(_) => ProcessError::Unavailable("worker thread exited".into()),
        })
    }
}

#[async_trait]
impl OffloadedProcessor for OffloadWorker {
    async fn process(&self, qualities: Vec<f64>, max_retry: u32) -> Result<BatchOutcome, ProcessError> {
        let (reply, rx) = oneshot::channel();
        self.submit(WorkerJob::Process {
            qualities,
            max_retry,
            reply,
        })?;
        self.batches.fetch_add(1, Ordering::Relaxed);
        rx.await
            .map_err(|_| ProcessError::Unavailable("worker dropped the batch".into()))
    }

    async fn resync(&self) -> Result<(), ProcessError> {
        let (reply, rx) = oneshot::channel();
        self.submit(WorkerJob::Resync { reply })?;
        rx.await
            .map_err(|_| ProcessError::Unavailable("worker dropped the resync".into()))?
    }
}

impl Drop for OffloadWorker {
    fn drop(&mut self) {
        // Detach rather than join so a drop inside async code never blocks.
        if !self.shutdown.swap(true, Ordering::AcqRel) {
            self.job_tx.lock().take();
            debug!(worker = %self.name, "offload worker dropped without shutdown; thread detached");
        }
    }
}

fn worker_loop<Q>(name: &str, job_rx: &Receiver<WorkerJob>, processor: &Q)
where
    Q: GenerationProcessor,
{
    let rt = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            error!(worker = %name, error = %e, "failed to create worker runtime");
            return;
        }
    };

    while let Ok(job) = job_rx.recv() {
        match job {
            WorkerJob::Process {
                qualities,
                max_retry,
                reply,
            } => {
                let steps = qualities.len();
                let outcome = rt.block_on(async {
                    let mut outcome = run_batch(processor, &qualities, max_retry).await;
                    if outcome.processed > 0 {
                        outcome.frame = processor.snapshot_frame().await;
                    }
                    outcome
                });
                debug!(worker = %name, steps, processed = outcome.processed, failed = outcome.failed, "batch done");
                if reply.send(outcome).is_err() {
                    // The driver gave up waiting (timeout or a newer session).
                    warn!(worker = %name, "batch result was not collected");
                }
            }
            WorkerJob::Resync { reply } => {
                let result = rt.block_on(processor.reset_frame());
                if reply.send(result).is_err() {
                    warn!(worker = %name, "resync result was not collected");
                }
            }
        }
    }
    debug!(worker = %name, "worker channel closed, exiting");
}
