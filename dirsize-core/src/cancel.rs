use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};

use crate::error::SizeError;

const ACTIVE: u8 = 0;
const CANCELLED: u8 = 1;
const DEADLINE: u8 = 2;

/// Cancellation token shared between a caller, the coordinator and workers.
///
/// Cancelling a token cancels every token derived from it with
/// [`CancellationToken::child_token`]. Blocking code can wait on
/// [`CancellationToken::done`], which disconnects once the token is cancelled.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    state: AtomicU8,
    deadline: Option<Instant>,
    /// Dropped on cancel so that every `done` receiver disconnects
    signal: Mutex<Option<Sender<()>>>,
    done: Receiver<()>,
    children: Mutex<Vec<Weak<Inner>>>,
}

impl Inner {
    fn new(deadline: Option<Instant>) -> Arc<Self> {
        let (tx, rx) = crossbeam_channel::bounded(0);
        Arc::new(Self {
            state: AtomicU8::new(ACTIVE),
            deadline,
            signal: Mutex::new(Some(tx)),
            done: rx,
            children: Mutex::new(Vec::new()),
        })
    }

    fn cancel_with(&self, reason: u8) {
        if self
            .state
            .compare_exchange(ACTIVE, reason, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        self.signal
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();

        let children =
            std::mem::take(&mut *self.children.lock().unwrap_or_else(|e| e.into_inner()));
        for child in children.iter().filter_map(Weak::upgrade) {
            child.cancel_with(reason);
        }
    }

    fn deadline_passed(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            inner: Inner::new(None),
        }
    }

    /// Token that reports [`SizeError::DeadlineExceeded`] once `timeout` has elapsed
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            inner: Inner::new(Some(deadline)),
        }
    }

    /// Derive a token that is cancelled together with `self` but can also be
    /// cancelled on its own without affecting `self`.
    pub fn child_token(&self) -> Self {
        let child = Inner::new(self.inner.deadline);
        {
            let mut children = self.inner.children.lock().unwrap_or_else(|e| e.into_inner());
            children.retain(|c| c.strong_count() > 0);
            children.push(Arc::downgrade(&child));
        }

        // The parent may have been cancelled before the child was registered
        let state = self.inner.state.load(Ordering::SeqCst);
        if state != ACTIVE {
            child.cancel_with(state);
        }

        Self { inner: child }
    }

    pub fn cancel(&self) {
        self.inner.cancel_with(CANCELLED);
    }

    pub fn is_cancelled(&self) -> bool {
        if self.inner.state.load(Ordering::SeqCst) != ACTIVE {
            return true;
        }
        if self.inner.deadline_passed() {
            self.inner.cancel_with(DEADLINE);
            return true;
        }
        false
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Receiver that disconnects when the token is cancelled explicitly.
    ///
    /// Deadlines are not signalled here; pair it with [`Self::deadline_channel`].
    pub fn done(&self) -> Receiver<()> {
        self.inner.done.clone()
    }

    /// Receiver that fires at the deadline, or never if there is none
    pub fn deadline_channel(&self) -> Receiver<Instant> {
        match self.inner.deadline {
            Some(deadline) => crossbeam_channel::at(deadline),
            None => crossbeam_channel::never(),
        }
    }

    /// Why the token stopped, if it did
    pub fn error(&self) -> Option<SizeError> {
        if !self.is_cancelled() {
            return None;
        }
        match self.inner.state.load(Ordering::SeqCst) {
            DEADLINE => Some(SizeError::DeadlineExceeded),
            _ => Some(SizeError::Cancelled),
        }
    }

    /// Sleep for `duration` unless the token is cancelled first.
    ///
    /// Returns the cancellation error if woken early.
    pub fn sleep(&self, duration: Duration) -> crate::Result<()> {
        if let Some(err) = self.error() {
            return Err(err);
        }

        let done = self.done();
        let deadline = self.deadline_channel();
        let timer = crossbeam_channel::after(duration);
        crossbeam_channel::select! {
            recv(done) -> _ => Err(self.error().unwrap_or(SizeError::Cancelled)),
            recv(deadline) -> _ => {
                self.inner.cancel_with(DEADLINE);
                Err(SizeError::DeadlineExceeded)
            }
            recv(timer) -> _ => Ok(()),
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}
