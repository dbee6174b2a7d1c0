//! Run counters shared between the worker and observers.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// Counters for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStatistics {
    pub total: usize,
    pub sorted: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RunStatistics {
    /// Files with a final outcome so far
    pub fn processed(&self) -> usize {
        self.sorted + self.skipped + self.failed
    }

    /// Every scanned file has an outcome
    pub fn is_balanced(&self) -> bool {
        self.processed() == self.total
    }
}

/// What happened to one file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileTally {
    Sorted,
    Skipped,
    Failed,
}

/// Lock-protected statistics.
///
/// Clones share the same counters; readers always get a whole snapshot.
#[derive(Debug, Clone, Default)]
pub struct StatsCell {
    inner: Arc<Mutex<RunStatistics>>,
}

impl StatsCell {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RunStatistics> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn snapshot(&self) -> RunStatistics {
        *self.lock()
    }

    /// Zero every counter
    pub fn reset(&self) {
        *self.lock() = RunStatistics::default();
    }

    pub fn set_total(&self, total: usize) {
        self.lock().total = total;
    }

    /// Count one outcome and return the new snapshot
    pub fn record(&self, tally: FileTally) -> RunStatistics {
        let mut stats = self.lock();
        match tally {
            FileTally::Sorted => stats.sorted += 1,
            FileTally::Skipped => stats.skipped += 1,
            FileTally::Failed => stats.failed += 1,
        }
        *stats
    }
}
