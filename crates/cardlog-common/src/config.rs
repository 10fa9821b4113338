//! Configuration types for cardlog
//!
//! Every section deserializes with defaults, so an empty TOML document is a
//! valid configuration. Durations are stored in milliseconds and exposed as
//! [`Duration`] through accessor methods.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration for cardlog
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where and how the volume is attached
    pub mount: MountPoint,
    /// Record writer and space monitor
    pub recorder: RecorderConfig,
    /// Auto-mount loop
    pub supervisor: SupervisorConfig,
}

impl Config {
    /// Reject values the background loops cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.mount.root.as_os_str().is_empty() {
            return Err(Error::configuration("mount.root must not be empty"));
        }
        if !self.mount.root.is_absolute() {
            return Err(Error::configuration(format!(
                "mount.root must be an absolute path, got {}",
                self.mount.root.display()
            )));
        }
        if self.mount.max_files == 0 {
            return Err(Error::configuration("mount.max_files must be at least 1"));
        }
        if self.recorder.write_interval_ms == 0 {
            return Err(Error::configuration(
                "recorder.write_interval_ms must be greater than zero",
            ));
        }
        if self.recorder.monitor_multiplier == 0 {
            return Err(Error::configuration(
                "recorder.monitor_multiplier must be greater than zero",
            ));
        }
        if self.recorder.file_extension.is_empty() || self.recorder.file_extension.contains('/') {
            return Err(Error::configuration(format!(
                "recorder.file_extension is not a valid extension: {:?}",
                self.recorder.file_extension
            )));
        }
        if self.supervisor.interval_ms == 0 {
            return Err(Error::configuration(
                "supervisor.interval_ms must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Mount point of the storage volume. Fixed at startup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MountPoint {
    /// Directory the volume's filesystem appears under
    pub root: PathBuf,
    /// Maximum number of files open at one time
    pub max_files: u32,
    /// Allocation unit size in KB used when the filesystem is laid out
    pub allocation_unit_kb: u32,
    /// How the volume is attached
    pub transport: TransportConfig,
}

impl MountPoint {
    /// Mount point rooted at `root` with default parameters
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }
}

impl Default for MountPoint {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/sdcard"),
            max_files: 3,
            allocation_unit_kb: 16,
            transport: TransportConfig::default(),
        }
    }
}

/// Transport used to attach the volume
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransportConfig {
    /// The root directory is attached by someone else (automounter, test
    /// fixture); mounting only probes it
    #[default]
    Directory,
    /// A block device mounted onto the root with mount(2)
    BlockDevice {
        /// Device node, e.g. /dev/mmcblk0p1
        device: PathBuf,
        /// Filesystem type passed to mount(2)
        #[serde(default = "default_fstype")]
        fstype: String,
        /// Filesystem-specific mount options
        #[serde(default)]
        options: Option<String>,
    },
}

fn default_fstype() -> String {
    "vfat".to_string()
}

/// Record writer and space monitor configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Period of the record writer (milliseconds)
    pub write_interval_ms: u64,
    /// Space monitor period as a multiple of the write period
    pub monitor_multiplier: u32,
    /// Delay between starting the writer and the space monitor (milliseconds)
    pub monitor_start_delay_ms: u64,
    /// Evict the oldest file when free space drops below this (KB)
    pub eviction_threshold_kb: u64,
    /// Extension of the daily log files
    pub file_extension: String,
    /// Optional file receiving one diagnostic line per write tick
    pub diagnostics_file: Option<String>,
}

impl RecorderConfig {
    /// Period of the record writer
    #[must_use]
    pub const fn write_interval(&self) -> Duration {
        Duration::from_millis(self.write_interval_ms)
    }

    /// Period of the space monitor
    #[must_use]
    pub fn monitor_interval(&self) -> Duration {
        self.write_interval().saturating_mul(self.monitor_multiplier)
    }

    /// Settling delay before the space monitor starts
    #[must_use]
    pub const fn monitor_start_delay(&self) -> Duration {
        Duration::from_millis(self.monitor_start_delay_ms)
    }
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            write_interval_ms: 14_500,
            monitor_multiplier: 10,
            monitor_start_delay_ms: 1_000,
            eviction_threshold_kb: 10_000,
            file_extension: "csv".to_string(),
            diagnostics_file: None,
        }
    }
}

/// Auto-mount supervisor configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Run the supervisor at all
    pub enabled: bool,
    /// Wait for the bus/controller to power up (milliseconds)
    pub initial_delay_ms: u64,
    /// Period between mount attempts and free-space refreshes (milliseconds)
    pub interval_ms: u64,
}

impl SupervisorConfig {
    /// Settling delay before the first tick
    #[must_use]
    pub const fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    /// Tick period
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_delay_ms: 3_000,
            interval_ms: 2_000,
        }
    }
}
