//! Test doubles shared by the storage unit tests

use crate::transport::{VolumeTransport, statvfs_reading};
use crate::volume::VolumeObserver;
use cardlog_common::{FreeSpaceReading, IoError, MountError, MountPoint};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Transport whose outcomes are set by the test
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    connect_error: Mutex<Option<MountError>>,
    disconnect_error: Mutex<Option<MountError>>,
    reading: Mutex<Option<FreeSpaceReading>>,
    not_ready: AtomicBool,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
}

impl ScriptedTransport {
    pub fn fail_connect(&self, err: MountError) {
        *self.connect_error.lock() = Some(err);
    }

    pub fn fail_disconnect(&self, err: MountError) {
        *self.disconnect_error.lock() = Some(err);
    }

    pub fn clear_failures(&self) {
        *self.connect_error.lock() = None;
        *self.disconnect_error.lock() = None;
        self.not_ready.store(false, Ordering::SeqCst);
    }

    /// Report this reading instead of asking statvfs
    pub fn set_reading(&self, reading: FreeSpaceReading) {
        *self.reading.lock() = Some(reading);
    }

    /// Make free-space queries fail as if the card stopped answering
    pub fn set_not_ready(&self) {
        self.not_ready.store(true, Ordering::SeqCst);
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

impl VolumeTransport for ScriptedTransport {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn connect(&self, _mount: &MountPoint) -> Result<(), MountError> {
        if let Some(err) = self.connect_error.lock().clone() {
            return Err(err);
        }
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn disconnect(&self, _mount: &MountPoint) -> Result<(), MountError> {
        if let Some(err) = self.disconnect_error.lock().clone() {
            return Err(err);
        }
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn statfs(&self, mount: &MountPoint) -> Result<FreeSpaceReading, IoError> {
        if self.not_ready.load(Ordering::SeqCst) {
            return Err(IoError::DeviceNotReady {
                path: mount.root.clone(),
            });
        }
        match *self.reading.lock() {
            Some(reading) => Ok(reading),
            None => statvfs_reading(&mount.root),
        }
    }
}

/// Observer recording the order of notifications
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<&'static str>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<&'static str> {
        self.events.lock().clone()
    }
}

impl VolumeObserver for RecordingObserver {
    fn volume_mounted(&self) {
        self.events.lock().push("mounted");
    }

    fn volume_unmounted(&self) {
        self.events.lock().push("unmounted");
    }
}
