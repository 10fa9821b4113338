//! Core value types shared across cardlog crates

use serde::{Deserialize, Serialize};
use std::fmt;

/// Mount state of the single storage slot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeState {
    /// No filesystem is attached; every file operation fails with `NotMounted`
    #[default]
    Unmounted,
    /// The filesystem is attached at the mount point
    Mounted,
}

impl VolumeState {
    /// Check if the volume is attached
    #[must_use]
    pub const fn is_mounted(self) -> bool {
        matches!(self, Self::Mounted)
    }
}

impl fmt::Display for VolumeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unmounted => write!(f, "unmounted"),
            Self::Mounted => write!(f, "mounted"),
        }
    }
}

/// Capacity of the mounted volume, in kilobytes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeSpaceReading {
    /// Total capacity
    pub total_kb: u64,
    /// Space still available to the logger
    pub free_kb: u64,
}

impl FreeSpaceReading {
    /// Create a reading from a (total, free) pair
    #[must_use]
    pub const fn new(total_kb: u64, free_kb: u64) -> Self {
        Self { total_kb, free_kb }
    }

    /// Build a reading from filesystem unit counts.
    ///
    /// `unit_size` is the size in bytes of the unit both counts are expressed
    /// in (cluster, fragment or sector).
    #[must_use]
    pub const fn from_units(total_units: u64, free_units: u64, unit_size: u64) -> Self {
        Self {
            total_kb: total_units.saturating_mul(unit_size) / 1024,
            free_kb: free_units.saturating_mul(unit_size) / 1024,
        }
    }

    /// Space in use
    #[must_use]
    pub const fn used_kb(&self) -> u64 {
        self.total_kb.saturating_sub(self.free_kb)
    }

    /// Used fraction (0.0 - 1.0); zero for an empty volume
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn usage_ratio(&self) -> f64 {
        if self.total_kb == 0 {
            0.0
        } else {
            self.used_kb() as f64 / self.total_kb as f64
        }
    }
}

impl fmt::Display for FreeSpaceReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} KB free of {} KB", self.free_kb, self.total_kb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_state() {
        assert_eq!(VolumeState::default(), VolumeState::Unmounted);
        assert!(VolumeState::Mounted.is_mounted());
        assert_eq!(VolumeState::Mounted.to_string(), "mounted");
    }

    #[test]
    fn test_reading_from_units() {
        // 512-byte sectors: two sectors per KB
        let reading = FreeSpaceReading::from_units(2_000, 1_000, 512);
        assert_eq!(reading, FreeSpaceReading::new(1_000, 500));
        assert_eq!(reading.used_kb(), 500);
        assert!((reading.usage_ratio() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_reading_empty_volume() {
        let reading = FreeSpaceReading::default();
        assert_eq!(reading.used_kb(), 0);
        assert!(reading.usage_ratio().abs() < f64::EPSILON);
    }
}
