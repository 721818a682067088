use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::error::SizeError;

/// Total size and file count of a subtree
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SizeResult {
    /// Sum of all file sizes in bytes
    pub size: u64,
    /// Number of files
    pub count: u64,
}

/// Running totals shared by all workers.
///
/// Every update is a pair of independent checked adds, so workers never wait
/// on each other here. `snapshot` is only meaningful once all writers have
/// stopped.
#[derive(Debug, Default)]
pub struct SizeAccumulator {
    size: AtomicU64,
    count: AtomicU64,
    invalid: AtomicBool,
}

impl SizeAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&self, size: u64) -> Result<()> {
        self.add_files(size, 1)
    }

    /// Fold `count` files totalling `bytes` in one step.
    ///
    /// Fails with [`SizeError::Overflow`] instead of wrapping; the totals
    /// must then be treated as invalid.
    pub fn add_files(&self, bytes: u64, count: u64) -> Result<()> {
        if self.invalid.load(Ordering::Acquire) {
            return Ok(());
        }
        checked_add(&self.size, bytes)?;
        checked_add(&self.count, count)
    }

    /// Stop honouring updates; the totals are no longer meaningful
    pub fn invalidate(&self) {
        self.invalid.store(true, Ordering::Release);
    }

    pub fn is_valid(&self) -> bool {
        !self.invalid.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> SizeResult {
        SizeResult {
            size: self.size.load(Ordering::Relaxed),
            count: self.count.load(Ordering::Relaxed),
        }
    }
}

fn checked_add(total: &AtomicU64, value: u64) -> Result<()> {
    total
        .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
            current.checked_add(value)
        })
        .map(|_| ())
        .map_err(|_| SizeError::Overflow)
}
