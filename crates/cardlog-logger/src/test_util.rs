//! Collaborator stand-ins for the logger unit tests

use crate::source::{Clock, DataSource};
use cardlog_common::{FreeSpaceReading, IoError, MountError, MountPoint};
use cardlog_storage::{DirectoryTransport, VolumeTransport};
use chrono::{NaiveDate, NaiveDateTime};
use parking_lot::Mutex;

/// Data source returning fixed values
#[derive(Debug, Clone)]
pub struct StaticSource {
    header: String,
    values: Vec<String>,
    diagnostic: Option<String>,
}

impl StaticSource {
    pub fn new(header: &str, values: &[&str]) -> Self {
        Self {
            header: header.to_string(),
            values: values.iter().map(ToString::to_string).collect(),
            diagnostic: None,
        }
    }

    pub fn with_diagnostic(mut self, text: &str) -> Self {
        self.diagnostic = Some(text.to_string());
        self
    }
}

impl DataSource for StaticSource {
    fn header(&self) -> String {
        self.header.clone()
    }

    fn value_count(&self) -> usize {
        self.values.len()
    }

    fn value(&self, index: usize) -> String {
        self.values.get(index).cloned().unwrap_or_default()
    }

    fn diagnostic(&self) -> Option<String> {
        self.diagnostic.clone()
    }
}

/// Clock stuck at one instant
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<NaiveDateTime>,
}

impl FixedClock {
    pub fn ymd_hms(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> Self {
        let now = NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap();
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: NaiveDateTime) {
        *self.now.lock() = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock()
    }
}

/// Directory transport reporting a chosen free-space reading
#[derive(Debug)]
pub struct FixedSpaceTransport {
    inner: DirectoryTransport,
    reading: Mutex<FreeSpaceReading>,
}

impl FixedSpaceTransport {
    pub fn new(reading: FreeSpaceReading) -> Self {
        Self {
            inner: DirectoryTransport,
            reading: Mutex::new(reading),
        }
    }

    pub fn set_reading(&self, reading: FreeSpaceReading) {
        *self.reading.lock() = reading;
    }
}

impl VolumeTransport for FixedSpaceTransport {
    fn name(&self) -> &'static str {
        "fixed-space"
    }

    fn connect(&self, mount: &MountPoint) -> Result<(), MountError> {
        self.inner.connect(mount)
    }

    fn disconnect(&self, mount: &MountPoint) -> Result<(), MountError> {
        self.inner.disconnect(mount)
    }

    fn statfs(&self, mount: &MountPoint) -> Result<FreeSpaceReading, IoError> {
        if mount.root.is_dir() {
            Ok(*self.reading.lock())
        } else {
            Err(IoError::DeviceNotReady {
                path: mount.root.clone(),
            })
        }
    }
}
