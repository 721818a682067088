//! Size coordinator - orchestrates the parallel traversal
//!
//! The coordinator is responsible for:
//! - Seeding the work queue with the root and spawning the worker pool
//! - Deciding the outcome: drained, first error, or cancellation
//! - Stopping and joining every worker before returning
//! - Progress heartbeats while the traversal runs

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TrySendError, never, tick, unbounded};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::accumulator::{SizeAccumulator, SizeResult};
use super::progress::{SizeProgress, WorkerStats};
use super::queue::WorkQueue;
use super::worker::{Worker, WorkerContext, WorkerEvent, WorkerState};
use crate::Result;
use crate::cancel::CancellationToken;
use crate::error::SizeError;
use crate::tree::DirNode;

/// Used when the number of CPUs can't be determined
const FALLBACK_WORKERS: usize = 4;

/// Sizer configuration
#[derive(Debug, Clone)]
pub struct SizerConfig {
    /// Number of worker threads (0 = one per available CPU)
    pub num_workers: usize,
    /// How often progress is reported, when a progress channel is set
    pub progress_interval: Duration,
}

impl Default for SizerConfig {
    fn default() -> Self {
        Self {
            num_workers: 0, // auto
            progress_interval: Duration::from_millis(100),
        }
    }
}

impl SizerConfig {
    pub fn with_workers(num_workers: usize) -> Self {
        Self {
            num_workers,
            ..Self::default()
        }
    }

    /// Resolved worker count, never zero
    pub fn worker_count(&self) -> usize {
        if self.num_workers > 0 {
            return self.num_workers;
        }
        std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(FALLBACK_WORKERS)
    }
}

/// Result of a completed traversal with per-worker detail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizeReport {
    pub result: SizeResult,
    pub workers: Vec<WorkerStats>,
    pub elapsed: Duration,
}

impl SizeReport {
    pub fn totals(&self) -> WorkerStats {
        let mut totals = WorkerStats::default();
        for stats in &self.workers {
            totals.merge(stats);
        }
        totals
    }
}

/// Computes the total size of a directory tree with a fixed pool of workers
pub struct Sizer {
    config: SizerConfig,
    progress: Option<Sender<SizeProgress>>,
}

impl Sizer {
    pub fn new(config: SizerConfig) -> Self {
        Self {
            config,
            progress: None,
        }
    }

    /// Send a [`SizeProgress`] every `progress_interval` while running.
    ///
    /// Heartbeats are dropped rather than waited on if the channel is full.
    pub fn with_progress(mut self, tx: Sender<SizeProgress>) -> Self {
        self.progress = Some(tx);
        self
    }

    pub fn config(&self) -> &SizerConfig {
        &self.config
    }

    /// Total size and file count of everything under `root`.
    ///
    /// On any failure or cancellation only the error is returned; partial
    /// totals are discarded.
    pub fn size(&self, ctx: &CancellationToken, root: DirNode) -> Result<SizeResult> {
        self.size_with_report(ctx, root).map(|report| report.result)
    }

    pub fn size_with_report(&self, ctx: &CancellationToken, root: DirNode) -> Result<SizeReport> {
        if let Some(err) = ctx.error() {
            return Err(err);
        }

        let start = Instant::now();
        let num_workers = self.config.worker_count();
        let (events_tx, events_rx) = unbounded();
        let shared = WorkerContext {
            queue: WorkQueue::new(),
            accumulator: Arc::new(SizeAccumulator::new()),
            events: events_tx,
            stop: ctx.child_token(),
        };

        debug!(workers = num_workers, root = %root.name(), "Starting size computation");
        shared.queue.push(root);

        let mut workers = Vec::with_capacity(num_workers);
        let mut outcome = Ok(());
        for id in 0..num_workers {
            match Worker::spawn(id, shared.clone()) {
                Ok(worker) => workers.push(worker),
                Err(err) => {
                    outcome = Err(err);
                    break;
                }
            }
        }

        if outcome.is_ok() {
            outcome = self.wait_for_outcome(ctx, &shared, &events_rx, &workers, start);
        }

        // Release idle workers and interrupt busy ones
        shared.stop.cancel();
        if outcome.is_err() {
            shared.accumulator.invalidate();
        }

        let mut stats = Vec::with_capacity(workers.len());
        for worker in workers {
            let id = worker.id();
            match worker.join() {
                Ok(s) => stats.push(s),
                Err(err) => {
                    debug!(worker = id, "Joined panicked worker");
                    if outcome.is_ok() {
                        outcome = Err(err);
                    }
                }
            }
        }

        let elapsed = start.elapsed();
        match outcome {
            Ok(()) => {
                let result = shared.accumulator.snapshot();
                debug!(
                    size = result.size,
                    count = result.count,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Size computation completed"
                );
                self.report_progress(&shared, &stats, 0, elapsed);
                Ok(SizeReport {
                    result,
                    workers: stats,
                    elapsed,
                })
            }
            Err(err) => {
                let queue = shared.queue.stats();
                debug!(
                    error = %err,
                    enqueued = queue.enqueued.load(Ordering::Relaxed),
                    dequeued = queue.dequeued.load(Ordering::Relaxed),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Size computation aborted"
                );
                Err(err)
            }
        }
    }

    /// Block until the traversal drains, fails, or is cancelled
    fn wait_for_outcome(
        &self,
        ctx: &CancellationToken,
        shared: &WorkerContext,
        events: &Receiver<WorkerEvent>,
        workers: &[Worker],
        start: Instant,
    ) -> Result<()> {
        let done = ctx.done();
        let deadline = ctx.deadline_channel();
        let heartbeat = match self.progress {
            Some(_) => tick(self.config.progress_interval),
            None => never(),
        };

        loop {
            crossbeam_channel::select! {
                recv(events) -> event => match event {
                    Ok(WorkerEvent::Drained) => return Ok(()),
                    Ok(WorkerEvent::Failed { worker, error }) => {
                        warn!(worker = worker, error = %error, "Aborting on first error");
                        return Err(error);
                    }
                    Ok(WorkerEvent::Panicked { worker }) => {
                        warn!(worker = worker, "Worker panicked");
                        return Err(SizeError::WorkerPanicked { id: worker });
                    }
                    // `shared` keeps a sender alive
                    Err(_) => return Err(SizeError::Cancelled),
                },
                recv(done) -> _ => {
                    return Err(ctx.error().unwrap_or(SizeError::Cancelled));
                }
                recv(deadline) -> _ => return Err(SizeError::DeadlineExceeded),
                recv(heartbeat) -> _ => {
                    let stats: Vec<WorkerStats> = workers.iter().map(Worker::stats).collect();
                    let busy = workers
                        .iter()
                        .filter(|w| {
                            matches!(w.state(), WorkerState::Listing | WorkerState::Statting)
                        })
                        .count();
                    self.report_progress(shared, &stats, busy, start.elapsed());
                }
            }
        }
    }

    fn report_progress(
        &self,
        shared: &WorkerContext,
        stats: &[WorkerStats],
        busy_workers: usize,
        elapsed: Duration,
    ) {
        let Some(tx) = &self.progress else {
            return;
        };

        let totals = shared.accumulator.snapshot();
        let progress = SizeProgress {
            bytes: totals.size,
            files: totals.count,
            dirs_done: stats.iter().map(|s| s.dirs_processed).sum(),
            pending: shared.queue.pending(),
            busy_workers,
            elapsed,
        };
        if let Err(TrySendError::Disconnected(_)) = tx.try_send(progress) {
            debug!("Progress receiver dropped");
        }
    }
}

impl Default for Sizer {
    fn default() -> Self {
        Self::new(SizerConfig::default())
    }
}

/// Compute the size of `root` with `workers` threads (`None` = one per CPU)
pub fn compute_size(
    ctx: &CancellationToken,
    root: DirNode,
    workers: Option<usize>,
) -> Result<SizeResult> {
    Sizer::new(SizerConfig::with_workers(workers.unwrap_or(0))).size(ctx, root)
}
