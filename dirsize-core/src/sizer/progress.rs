use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Progress heartbeat emitted while a traversal is running
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SizeProgress {
    /// Bytes counted so far
    pub bytes: u64,
    /// Files counted so far
    pub files: u64,
    /// Directories fully processed
    pub dirs_done: u64,
    /// Directories queued or being processed
    pub pending: usize,
    /// Workers currently listing or statting
    pub busy_workers: usize,
    pub elapsed: Duration,
}

impl SizeProgress {
    pub fn total_entries(&self) -> u64 {
        self.files + self.dirs_done
    }
}

/// Counters collected by one worker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerStats {
    pub dirs_processed: u64,
    pub files_statted: u64,
    pub bytes_statted: u64,
}

impl WorkerStats {
    pub fn merge(&mut self, other: &WorkerStats) {
        self.dirs_processed += other.dirs_processed;
        self.files_statted += other.files_statted;
        self.bytes_statted += other.bytes_statted;
    }
}
