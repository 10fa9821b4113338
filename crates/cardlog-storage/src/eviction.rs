//! Oldest-file eviction
//!
//! When free space drops below a threshold the least recently modified file
//! on the volume is deleted. One file per invocation; the space monitor calls
//! [`EvictionPolicy::apply`] once per tick.

use crate::file_store::FileStore;
use cardlog_common::{FreeSpaceReading, Result};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Check if a volume with `free_kb` left is below `threshold_kb`
#[must_use]
pub const fn should_evict(free_kb: u64, threshold_kb: u64) -> bool {
    free_kb < threshold_kb
}

/// What one eviction pass did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvictionOutcome {
    /// Enough free space; nothing touched
    NotNeeded(FreeSpaceReading),
    /// The oldest file was deleted
    Evicted {
        path: PathBuf,
        reading: FreeSpaceReading,
    },
    /// Below threshold but no file to delete
    NothingToEvict(FreeSpaceReading),
    /// Below threshold and the oldest file could not be deleted
    DeleteFailed {
        path: PathBuf,
        reading: FreeSpaceReading,
    },
}

impl EvictionOutcome {
    /// Reading the decision was based on
    pub const fn reading(&self) -> &FreeSpaceReading {
        match self {
            Self::NotNeeded(reading)
            | Self::NothingToEvict(reading)
            | Self::Evicted { reading, .. }
            | Self::DeleteFailed { reading, .. } => reading,
        }
    }
}

/// Free-space threshold policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictionPolicy {
    threshold_kb: u64,
}

impl EvictionPolicy {
    /// Policy evicting below `threshold_kb` free
    pub const fn new(threshold_kb: u64) -> Self {
        Self { threshold_kb }
    }

    /// Threshold in KB
    pub const fn threshold_kb(&self) -> u64 {
        self.threshold_kb
    }

    /// Check if `reading` is below the threshold
    pub const fn should_evict(&self, reading: &FreeSpaceReading) -> bool {
        should_evict(reading.free_kb, self.threshold_kb)
    }

    /// Query free space and delete the oldest file if below the threshold.
    ///
    /// Errors only when the free-space query itself fails (including
    /// `NotMounted`); a missing or undeletable file is reported in the
    /// outcome.
    pub fn apply(&self, store: &FileStore) -> Result<EvictionOutcome> {
        let reading = store.free_space()?;

        if !self.should_evict(&reading) {
            debug!("Free space OK: {}", reading);
            return Ok(EvictionOutcome::NotNeeded(reading));
        }

        info!(
            "Free space below {} KB ({}), removing oldest file",
            self.threshold_kb, reading
        );

        let Some(path) = store.oldest_file()? else {
            warn!("Free space low but no file left to remove");
            return Ok(EvictionOutcome::NothingToEvict(reading));
        };

        if store.delete_file(&path)? {
            Ok(EvictionOutcome::Evicted { path, reading })
        } else {
            Ok(EvictionOutcome::DeleteFailed { path, reading })
        }
    }
}
