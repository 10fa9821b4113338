//! Mount/unmount state machine for the storage volume
//!
//! [`VolumeHandle`] is the only owner of the mount state. Dependents (the
//! logging orchestrator) hook in through [`VolumeObserver`] and are told
//! after every successful attach and detach:
//! - mount: transport connect, state -> Mounted, then `volume_mounted`
//! - unmount: transport disconnect, `volume_unmounted`, then state -> Unmounted
//!
//! A failed transport call never changes the state, with one exception: a
//! remount that detached successfully but then fails to reconnect leaves the
//! volume unmounted and returns the connect error.

use crate::transport::VolumeTransport;
use cardlog_common::{FreeSpaceReading, IoError, MountError, MountPoint, VolumeState};
use parking_lot::{Mutex, RwLock};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Receives volume attach/detach notifications
pub trait VolumeObserver: Send + Sync {
    /// The volume was attached and is ready for file operations
    fn volume_mounted(&self);

    /// The volume was detached; runs before the state flips to Unmounted
    fn volume_unmounted(&self);
}

/// Attached-volume bookkeeping; present only while mounted
#[derive(Debug, Clone, Copy)]
struct MountSession {
    mounted_at: Instant,
}

/// Mount statistics
#[derive(Debug, Default)]
pub struct VolumeStats {
    pub mounts: AtomicU64,
    pub unmounts: AtomicU64,
    pub mount_failures: AtomicU64,
    pub unmount_failures: AtomicU64,
}

/// Owner of the single storage slot's mount state
pub struct VolumeHandle {
    /// Fixed mount configuration
    mount_point: MountPoint,
    /// Platform attach/detach
    transport: Arc<dyn VolumeTransport>,
    /// Some while mounted
    session: RwLock<Option<MountSession>>,
    /// Serializes mount/unmount transitions
    transition: Mutex<()>,
    /// Dependent notified on transitions
    observer: RwLock<Option<Weak<dyn VolumeObserver>>>,
    /// Statistics
    stats: VolumeStats,
}

impl VolumeHandle {
    /// Create an unmounted handle for `mount_point`
    pub fn new(mount_point: MountPoint, transport: Arc<dyn VolumeTransport>) -> Self {
        Self {
            mount_point,
            transport,
            session: RwLock::new(None),
            transition: Mutex::new(()),
            observer: RwLock::new(None),
            stats: VolumeStats::default(),
        }
    }

    /// Register the dependent notified on mount and unmount
    pub fn set_observer(&self, observer: Weak<dyn VolumeObserver>) {
        *self.observer.write() = Some(observer);
    }

    /// Mount the volume, remounting if it is already mounted
    pub fn mount(&self) -> Result<(), MountError> {
        let _guard = self.transition.lock();

        if self.is_mounted() {
            info!(
                "Volume already mounted at {}, remounting",
                self.mount_point.root.display()
            );
            self.detach()?;
        }

        if let Err(e) = self.transport.connect(&self.mount_point) {
            self.stats.mount_failures.fetch_add(1, Ordering::Relaxed);
            warn!(
                "Failed to mount volume at {} via {}: {}",
                self.mount_point.root.display(),
                self.transport.name(),
                e
            );
            return Err(e);
        }

        *self.session.write() = Some(MountSession {
            mounted_at: Instant::now(),
        });
        self.stats.mounts.fetch_add(1, Ordering::Relaxed);
        info!(
            "Volume mounted at {} via {} (max_files={}, allocation_unit={} KB)",
            self.mount_point.root.display(),
            self.transport.name(),
            self.mount_point.max_files,
            self.mount_point.allocation_unit_kb
        );

        self.notify(|observer| observer.volume_mounted());
        Ok(())
    }

    /// Unmount the volume; a no-op when not mounted
    pub fn unmount(&self) -> Result<(), MountError> {
        let _guard = self.transition.lock();

        if !self.is_mounted() {
            debug!("Unmount requested but volume is not mounted");
            return Ok(());
        }
        self.detach()
    }

    /// Check if the volume is attached
    pub fn is_mounted(&self) -> bool {
        self.session.read().is_some()
    }

    /// Current state
    pub fn state(&self) -> VolumeState {
        if self.is_mounted() {
            VolumeState::Mounted
        } else {
            VolumeState::Unmounted
        }
    }

    /// Time since the current mount, if mounted
    pub fn mounted_for(&self) -> Option<Duration> {
        self.session.read().map(|s| s.mounted_at.elapsed())
    }

    /// Mount configuration
    pub fn mount_point(&self) -> &MountPoint {
        &self.mount_point
    }

    /// Root directory files live under
    pub fn root(&self) -> &Path {
        &self.mount_point.root
    }

    /// Get statistics
    pub fn stats(&self) -> &VolumeStats {
        &self.stats
    }

    /// Ask the transport for total and free capacity.
    ///
    /// Does not check the mount state; callers go through
    /// [`FileStore::free_space`](crate::FileStore::free_space).
    pub(crate) fn statfs(&self) -> Result<FreeSpaceReading, IoError> {
        self.transport.statfs(&self.mount_point)
    }

    /// Detach while holding the transition lock
    fn detach(&self) -> Result<(), MountError> {
        if let Err(e) = self.transport.disconnect(&self.mount_point) {
            self.stats.unmount_failures.fetch_add(1, Ordering::Relaxed);
            error!(
                "Failed to unmount volume at {}: {} (volume stays mounted)",
                self.mount_point.root.display(),
                e
            );
            return Err(e);
        }

        // Dependents stop before the handle is released
        self.notify(|observer| observer.volume_unmounted());
        *self.session.write() = None;
        self.stats.unmounts.fetch_add(1, Ordering::Relaxed);
        info!(
            "Volume at {} unmounted, logging stopped",
            self.mount_point.root.display()
        );
        Ok(())
    }

    fn notify(&self, f: impl FnOnce(&dyn VolumeObserver)) {
        let observer = self.observer.read().as_ref().and_then(Weak::upgrade);
        if let Some(observer) = observer {
            f(observer.as_ref());
        }
    }
}

impl std::fmt::Debug for VolumeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VolumeHandle")
            .field("root", &self.mount_point.root)
            .field("transport", &self.transport.name())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{RecordingObserver, ScriptedTransport};
    use tempfile::tempdir;

    fn handle_with(transport: &Arc<ScriptedTransport>) -> (tempfile::TempDir, VolumeHandle) {
        let dir = tempdir().unwrap();
        let handle = VolumeHandle::new(MountPoint::at(dir.path()), transport.clone());
        (dir, handle)
    }

    #[test]
    fn test_mount_unmount() {
        let transport = Arc::new(ScriptedTransport::default());
        let (_dir, handle) = handle_with(&transport);

        assert_eq!(handle.state(), VolumeState::Unmounted);
        handle.mount().unwrap();
        assert!(handle.is_mounted());
        assert!(handle.mounted_for().is_some());

        handle.unmount().unwrap();
        assert!(!handle.is_mounted());
        assert!(handle.mounted_for().is_none());
        assert_eq!(transport.connects(), 1);
        assert_eq!(transport.disconnects(), 1);
    }

    #[test]
    fn test_unmount_when_unmounted_is_noop() {
        let transport = Arc::new(ScriptedTransport::default());
        let (_dir, handle) = handle_with(&transport);

        handle.unmount().unwrap();
        handle.unmount().unwrap();
        assert_eq!(transport.disconnects(), 0);
        assert_eq!(handle.stats().unmounts.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_remount_detaches_first() {
        let transport = Arc::new(ScriptedTransport::default());
        let (_dir, handle) = handle_with(&transport);
        let observer = Arc::new(RecordingObserver::default());
        let weak: Weak<dyn VolumeObserver> = Arc::downgrade(&observer) as Weak<dyn VolumeObserver>;
        handle.set_observer(weak);

        handle.mount().unwrap();
        handle.mount().unwrap();

        assert!(handle.is_mounted());
        assert_eq!(transport.connects(), 2);
        assert_eq!(transport.disconnects(), 1);
        assert_eq!(observer.events(), vec!["mounted", "unmounted", "mounted"]);
    }

    #[test]
    fn test_mount_failure_stays_unmounted() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.fail_connect(MountError::DeviceAbsent("slot empty".into()));
        let (_dir, handle) = handle_with(&transport);
        let observer = Arc::new(RecordingObserver::default());
        let weak: Weak<dyn VolumeObserver> = Arc::downgrade(&observer) as Weak<dyn VolumeObserver>;
        handle.set_observer(weak);

        let err = handle.mount().unwrap_err();
        assert!(matches!(err, MountError::DeviceAbsent(_)));
        assert!(!handle.is_mounted());
        assert!(observer.events().is_empty());
        assert_eq!(handle.stats().mount_failures.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_unmount_failure_stays_mounted() {
        let transport = Arc::new(ScriptedTransport::default());
        let (_dir, handle) = handle_with(&transport);
        let observer = Arc::new(RecordingObserver::default());
        let weak: Weak<dyn VolumeObserver> = Arc::downgrade(&observer) as Weak<dyn VolumeObserver>;
        handle.set_observer(weak);

        handle.mount().unwrap();
        transport.fail_disconnect(MountError::Busy("file open".into()));

        assert!(handle.unmount().is_err());
        assert!(handle.is_mounted());
        assert_eq!(observer.events(), vec!["mounted"]);

        // Remount cannot proceed either: the old attachment is still held
        assert!(handle.mount().is_err());
        assert!(handle.is_mounted());

        transport.clear_failures();
        handle.unmount().unwrap();
        assert!(!handle.is_mounted());
        assert_eq!(observer.events(), vec!["mounted", "unmounted"]);
    }

    #[test]
    fn test_state_follows_last_successful_call() {
        let transport = Arc::new(ScriptedTransport::default());
        let (_dir, handle) = handle_with(&transport);

        // (operation, connect fails, disconnect fails)
        let script = [
            ("mount", false, false),
            ("unmount", false, true),
            ("unmount", false, false),
            ("mount", true, false),
            ("unmount", false, false),
            ("mount", false, false),
            ("mount", false, false),
            ("unmount", false, false),
            ("unmount", false, false),
        ];

        let mut expected = false;
        for (op, connect_fails, disconnect_fails) in script {
            transport.clear_failures();
            if connect_fails {
                transport.fail_connect(MountError::BusFault("crc".into()));
            }
            if disconnect_fails {
                transport.fail_disconnect(MountError::Busy("busy".into()));
            }

            let result = if op == "mount" {
                handle.mount()
            } else {
                handle.unmount()
            };
            if result.is_ok() {
                expected = op == "mount";
            }
            assert_eq!(handle.is_mounted(), expected, "after {op}");
        }
    }

    #[test]
    fn test_dropped_observer_is_ignored() {
        let transport = Arc::new(ScriptedTransport::default());
        let (_dir, handle) = handle_with(&transport);
        {
            let observer = Arc::new(RecordingObserver::default());
            let weak: Weak<dyn VolumeObserver> =
                Arc::downgrade(&observer) as Weak<dyn VolumeObserver>;
            handle.set_observer(weak);
        }

        handle.mount().unwrap();
        handle.unmount().unwrap();
    }
}
