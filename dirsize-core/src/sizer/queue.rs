//! Work queue of directories waiting to be listed.
//!
//! The queue is unbounded: a wide directory can push any number of children
//! without waiting on a worker, so a full pool can never deadlock on its own
//! pushes. Whether the queue being empty means the traversal is finished is
//! decided by [`InFlight`], not by the queue.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crossbeam_channel::{Receiver, Sender, unbounded};

use crate::cancel::CancellationToken;
use crate::tree::DirNode;

/// Number of directories pushed but not yet fully processed.
///
/// A directory counts from the moment it is pushed until the worker that took
/// it has pushed all of its sub-directories and folded its files. Zero means
/// no directory is queued or held by a worker, so no more can ever arrive.
#[derive(Debug, Default)]
pub struct InFlight {
    pending: AtomicUsize,
}

impl InFlight {
    pub fn inc(&self) {
        self.pending.fetch_add(1, Ordering::SeqCst);
    }

    /// Returns true if this call brought the count to zero
    pub fn dec(&self) -> bool {
        let prev = self.pending.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(prev > 0, "in-flight counter underflow");
        prev == 1
    }

    pub fn is_zero(&self) -> bool {
        self.get() == 0
    }

    pub fn get(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }
}

/// Statistics for the work queue
#[derive(Debug, Default)]
pub struct QueueStats {
    /// Total directories enqueued
    pub enqueued: AtomicU64,
    /// Total directories dequeued
    pub dequeued: AtomicU64,
}

/// Shared handle to the queue; clone one per worker
#[derive(Clone)]
pub struct WorkQueue {
    sender: Sender<DirNode>,
    receiver: Receiver<DirNode>,
    in_flight: Arc<InFlight>,
    stats: Arc<QueueStats>,
}

impl WorkQueue {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            sender,
            receiver,
            in_flight: Arc::new(InFlight::default()),
            stats: Arc::new(QueueStats::default()),
        }
    }

    /// Enqueue a directory. Never blocks.
    pub fn push(&self, dir: DirNode) {
        // Counted before it becomes visible so a fast consumer can't
        // finish it while the counter still reads zero
        self.in_flight.inc();
        if self.sender.send(dir).is_err() {
            // Only possible with no receivers, and `self` holds one
            self.in_flight.dec();
            return;
        }
        self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    /// Take the next directory, waiting for one to be pushed.
    ///
    /// Returns `None` only once `stop` is cancelled.
    pub fn pop(&self, stop: &CancellationToken) -> Option<DirNode> {
        if stop.is_cancelled() {
            return None;
        }

        let done = stop.done();
        crossbeam_channel::select! {
            recv(self.receiver) -> dir => {
                let dir = dir.ok()?;
                self.stats.dequeued.fetch_add(1, Ordering::Relaxed);
                Some(dir)
            }
            recv(done) -> _ => None,
        }
    }

    /// Mark a popped directory as fully processed.
    ///
    /// Must only be called after its sub-directories have been pushed.
    /// Returns true when this was the last directory in flight.
    pub fn complete(&self) -> bool {
        self.in_flight.dec()
    }

    pub fn pending(&self) -> usize {
        self.in_flight.get()
    }

    pub fn is_drained(&self) -> bool {
        self.in_flight.is_zero()
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    pub fn stats(&self) -> &QueueStats {
        &self.stats
    }
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new()
    }
}
