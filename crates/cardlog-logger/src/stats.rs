//! Logging counters and the cached free-space reading

use cardlog_common::FreeSpaceReading;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// Logging statistics
#[derive(Debug, Default)]
pub struct LoggerStats {
    pub records_written: AtomicU64,
    pub write_failures: AtomicU64,
    pub files_created: AtomicU64,
    pub diagnostics_written: AtomicU64,
    pub evictions: AtomicU64,
    pub eviction_failures: AtomicU64,
    /// Last successful free-space query
    last_free_space: RwLock<Option<FreeSpaceReading>>,
}

impl LoggerStats {
    /// Replace the cached reading
    pub fn record_free_space(&self, reading: FreeSpaceReading) {
        *self.last_free_space.write() = Some(reading);
    }

    /// Last known reading; may be stale if the volume was since unmounted
    pub fn last_free_space(&self) -> Option<FreeSpaceReading> {
        *self.last_free_space.read()
    }

    pub fn records_written(&self) -> u64 {
        self.records_written.load(Ordering::Relaxed)
    }

    pub fn write_failures(&self) -> u64 {
        self.write_failures.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}
