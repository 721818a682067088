//! Worker thread logic for parallel sizing
//!
//! Each worker:
//! - Pulls a directory from the work queue
//! - Lists it and pushes its sub-directories back onto the queue
//! - Stats its files and folds the total into the shared accumulator
//! - Marks the directory complete, reporting `Drained` if it was the last one
//!
//! Any failure is reported once on the event channel and ends the worker.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam_channel::Sender;
use tracing::{debug, trace};

use super::accumulator::SizeAccumulator;
use super::progress::WorkerStats;
use super::queue::WorkQueue;
use crate::Result;
use crate::cancel::CancellationToken;
use crate::error::SizeError;
use crate::tree::{Children, DirNode};

/// What a worker is doing right now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    /// Waiting on the queue
    Idle = 0,
    Listing = 1,
    Statting = 2,
    /// Exited, takes no more work
    Terminated = 3,
}

impl WorkerState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => WorkerState::Idle,
            1 => WorkerState::Listing,
            2 => WorkerState::Statting,
            _ => WorkerState::Terminated,
        }
    }
}

/// Terminal events sent from workers to the coordinator
#[derive(Debug)]
pub enum WorkerEvent {
    /// The last in-flight directory was completed
    Drained,
    /// A listing or stat failed
    Failed { worker: usize, error: SizeError },
    /// The worker thread panicked; its directory will never complete
    Panicked { worker: usize },
}

/// Everything a worker shares with the coordinator and its peers
#[derive(Clone)]
pub struct WorkerContext {
    pub queue: WorkQueue,
    pub accumulator: Arc<SizeAccumulator>,
    pub events: Sender<WorkerEvent>,
    /// Cancelled by the caller, or by the coordinator once the outcome is known
    pub stop: CancellationToken,
}

#[derive(Debug, Default)]
struct SharedStats {
    dirs_processed: AtomicU64,
    files_statted: AtomicU64,
    bytes_statted: AtomicU64,
}

impl SharedStats {
    fn record_dir(&self, files: u64, bytes: u64) {
        self.dirs_processed.fetch_add(1, Ordering::Relaxed);
        self.files_statted.fetch_add(files, Ordering::Relaxed);
        self.bytes_statted.fetch_add(bytes, Ordering::Relaxed);
    }

    fn snapshot(&self) -> WorkerStats {
        WorkerStats {
            dirs_processed: self.dirs_processed.load(Ordering::Relaxed),
            files_statted: self.files_statted.load(Ordering::Relaxed),
            bytes_statted: self.bytes_statted.load(Ordering::Relaxed),
        }
    }
}

/// A worker thread draining the queue
pub struct Worker {
    id: usize,
    handle: Option<JoinHandle<()>>,
    state: Arc<AtomicU8>,
    stats: Arc<SharedStats>,
}

impl Worker {
    pub fn spawn(id: usize, ctx: WorkerContext) -> Result<Self> {
        let state = Arc::new(AtomicU8::new(WorkerState::Idle as u8));
        let stats = Arc::new(SharedStats::default());

        let thread_state = Arc::clone(&state);
        let thread_stats = Arc::clone(&stats);
        let handle = thread::Builder::new()
            .name(format!("dirsize-{}", id))
            .spawn(move || worker_loop(id, ctx, &thread_state, &thread_stats))
            .map_err(|source| SizeError::WorkerSpawn { id, source })?;

        Ok(Self {
            id,
            handle: Some(handle),
            state,
            stats,
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn stats(&self) -> WorkerStats {
        self.stats.snapshot()
    }

    /// Wait for the thread to exit
    pub fn join(mut self) -> Result<WorkerStats> {
        if let Some(handle) = self.handle.take() {
            handle
                .join()
                .map_err(|_| SizeError::WorkerPanicked { id: self.id })?;
        }
        Ok(self.stats.snapshot())
    }
}

/// Reports a panic to the coordinator while the worker thread unwinds
struct PanicGuard<'a> {
    id: usize,
    events: &'a Sender<WorkerEvent>,
}

impl Drop for PanicGuard<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            let _ = self.events.send(WorkerEvent::Panicked { worker: self.id });
        }
    }
}

fn worker_loop(id: usize, ctx: WorkerContext, state: &AtomicU8, stats: &SharedStats) {
    let _guard = PanicGuard {
        id,
        events: &ctx.events,
    };
    debug!(worker = id, "Worker starting");

    while let Some(dir) = ctx.queue.pop(&ctx.stop) {
        match process_directory(id, dir, &ctx, state, stats) {
            Ok(()) => {
                state.store(WorkerState::Idle as u8, Ordering::Release);
                if ctx.queue.complete() {
                    trace!(worker = id, "Last directory completed");
                    let _ = ctx.events.send(WorkerEvent::Drained);
                }
            }
            Err(error) => {
                // Once stopped, the outcome is already decided elsewhere
                if !ctx.stop.is_cancelled() {
                    debug!(worker = id, error = %error, "Traversal failed");
                    let _ = ctx.events.send(WorkerEvent::Failed { worker: id, error });
                }
                break;
            }
        }
    }

    state.store(WorkerState::Terminated as u8, Ordering::Release);
    let totals = stats.snapshot();
    debug!(
        worker = id,
        dirs = totals.dirs_processed,
        files = totals.files_statted,
        "Worker stopping"
    );
}

/// List one directory, queue its sub-directories and fold its files.
fn process_directory(
    id: usize,
    dir: DirNode,
    ctx: &WorkerContext,
    state: &AtomicU8,
    stats: &SharedStats,
) -> Result<()> {
    state.store(WorkerState::Listing as u8, Ordering::Release);
    if let Some(err) = ctx.stop.error() {
        return Err(err);
    }

    let Children { dirs, files } = dir.list_children(&ctx.stop)?;
    trace!(
        worker = id,
        dir = %dir.name(),
        dirs = dirs.len(),
        files = files.len(),
        "Listed directory"
    );

    for sub in dirs {
        ctx.queue.push(sub);
    }

    state.store(WorkerState::Statting as u8, Ordering::Release);
    let mut bytes = 0u64;
    for file in &files {
        if let Some(err) = ctx.stop.error() {
            return Err(err);
        }
        let size = file.size(&ctx.stop)?;
        bytes = bytes.checked_add(size).ok_or(SizeError::Overflow)?;
    }

    if let Some(err) = ctx.stop.error() {
        return Err(err);
    }
    let count = files.len() as u64;
    ctx.accumulator.add_files(bytes, count)?;
    stats.record_dir(count, bytes);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{MemDir, MemFile};
    use crossbeam_channel::unbounded;

    fn context() -> (WorkerContext, crossbeam_channel::Receiver<WorkerEvent>) {
        let (tx, rx) = unbounded();
        (
            WorkerContext {
                queue: WorkQueue::new(),
                accumulator: Arc::new(SizeAccumulator::new()),
                events: tx,
                stop: CancellationToken::new(),
            },
            rx,
        )
    }

    #[test]
    fn test_single_worker_drains_tree() {
        let (ctx, events) = context();
        let tree = MemDir::new("root")
            .file("a", 10)
            .dir(MemDir::new("sub").file("b", 5));
        ctx.queue.push(Box::new(tree));

        let worker = Worker::spawn(0, ctx.clone()).unwrap();
        assert!(matches!(events.recv().unwrap(), WorkerEvent::Drained));

        ctx.stop.cancel();
        let stats = worker.join().unwrap();

        assert_eq!(stats.dirs_processed, 2);
        assert_eq!(stats.files_statted, 2);
        assert_eq!(stats.bytes_statted, 15);
        assert_eq!(ctx.accumulator.snapshot().size, 15);
        assert!(ctx.queue.is_drained());
    }

    #[test]
    fn test_failure_is_reported_and_worker_exits() {
        let (ctx, events) = context();
        let tree = MemDir::new("root").with_file(MemFile::new("bad", 1).failing("stat failed"));
        ctx.queue.push(Box::new(tree));

        let worker = Worker::spawn(3, ctx.clone()).unwrap();
        match events.recv().unwrap() {
            WorkerEvent::Failed { worker, error } => {
                assert_eq!(worker, 3);
                assert_eq!(error.to_string(), "stat failed");
            }
            other => panic!("unexpected event: {:?}", other),
        }

        // Exits on its own, without a stop signal
        worker.join().unwrap();
        assert_eq!(ctx.queue.pending(), 1);
        assert_eq!(ctx.accumulator.snapshot().count, 0);
    }

    #[test]
    fn test_idle_worker_stops_on_cancel() {
        let (ctx, events) = context();
        let worker = Worker::spawn(0, ctx.clone()).unwrap();

        std::thread::sleep(std::time::Duration::from_millis(20));
        assert_eq!(worker.state(), WorkerState::Idle);

        ctx.stop.cancel();
        worker.join().unwrap();
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_directory_total_overflow_is_reported() {
        let (ctx, events) = context();
        let huge = i64::MAX as u64;
        let tree = MemDir::new("root")
            .file("a", huge)
            .file("b", huge)
            .file("c", huge);
        ctx.queue.push(Box::new(tree));

        let worker = Worker::spawn(0, ctx.clone()).unwrap();
        assert!(matches!(
            events.recv().unwrap(),
            WorkerEvent::Failed {
                worker: 0,
                error: SizeError::Overflow
            }
        ));

        let stats = worker.join().unwrap();
        assert_eq!(stats.dirs_processed, 0);
        assert_eq!(ctx.accumulator.snapshot().count, 0);
    }

    struct Exploding;

    impl crate::tree::Directory for Exploding {
        fn list_children(&self, _ctx: &CancellationToken) -> Result<Children> {
            panic!("collaborator bug");
        }
    }

    #[test]
    fn test_panic_is_reported() {
        let (ctx, events) = context();
        ctx.queue.push(Box::new(Exploding));

        let worker = Worker::spawn(1, ctx.clone()).unwrap();
        assert!(matches!(
            events.recv().unwrap(),
            WorkerEvent::Panicked { worker: 1 }
        ));
        assert!(matches!(
            worker.join(),
            Err(SizeError::WorkerPanicked { id: 1 })
        ));
    }
}
