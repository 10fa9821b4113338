//! Card manager: the single owner of the volume and its logging loops
//!
//! External control surfaces (CLI, status display, supervisor) go through
//! [`CardManager`]. Mounting starts logging and unmounting stops it; both
//! are safe to call at any time from any task.

use crate::orchestrator::{LoggingOrchestrator, RecorderContext};
use crate::source::{Clock, DataSource};
use crate::stats::LoggerStats;
use cardlog_common::{Config, Error, FreeSpaceReading, MountError, Result, VolumeState};
use cardlog_storage::{
    EvictionPolicy, FileStore, VolumeHandle, VolumeObserver, VolumeTransport, transport_from_config,
};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tokio::runtime::Handle;
use tracing::{debug, info};

/// Point-in-time view for a status display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardStatus {
    pub state: VolumeState,
    pub logging: bool,
    pub free_space: Option<FreeSpaceReading>,
    pub records_written: u64,
    pub write_failures: u64,
    pub evictions: u64,
    pub mounts: u64,
    pub mount_failures: u64,
}

impl fmt::Display for CardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "volume {}, logging {}",
            self.state,
            if self.logging { "on" } else { "off" }
        )?;
        if let Some(reading) = &self.free_space {
            write!(f, ", {reading}")?;
        }
        write!(
            f,
            ", {} records, {} write failures, {} evictions, {} mounts ({} failed)",
            self.records_written,
            self.write_failures,
            self.evictions,
            self.mounts,
            self.mount_failures
        )
    }
}

/// Owns the volume, the file store and the logging orchestrator
#[derive(Debug)]
pub struct CardManager {
    volume: Arc<VolumeHandle>,
    store: FileStore,
    orchestrator: Arc<LoggingOrchestrator>,
    stats: Arc<LoggerStats>,
    runtime: Handle,
}

impl CardManager {
    /// Build a manager over `transport`.
    ///
    /// Must be called from within a tokio runtime; the logging loops are
    /// spawned onto it.
    pub fn new(
        config: &Config,
        transport: Arc<dyn VolumeTransport>,
        source: Arc<dyn DataSource>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;

        let runtime = Handle::try_current()
            .map_err(|e| Error::internal(format!("no tokio runtime for logging tasks: {e}")))?;

        let volume = Arc::new(VolumeHandle::new(config.mount.clone(), transport));
        let store = FileStore::new(Arc::clone(&volume));
        let stats = Arc::new(LoggerStats::default());

        let ctx = RecorderContext {
            volume: Arc::clone(&volume),
            store: store.clone(),
            source,
            clock,
            policy: EvictionPolicy::new(config.recorder.eviction_threshold_kb),
            config: config.recorder.clone(),
            stats: Arc::clone(&stats),
        };
        let orchestrator = Arc::new(LoggingOrchestrator::new(ctx, runtime.clone()));

        let observer: Arc<dyn VolumeObserver> = orchestrator.clone();
        volume.set_observer(Arc::downgrade(&observer));

        debug!("Card manager created for {}", config.mount.root.display());

        Ok(Self {
            volume,
            store,
            orchestrator,
            stats,
            runtime,
        })
    }

    /// Build a manager with the transport named in the configuration
    pub fn from_config(
        config: &Config,
        source: Arc<dyn DataSource>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let transport = transport_from_config(&config.mount.transport)?;
        Self::new(config, transport, source, clock)
    }

    /// Mount the card (remounting if mounted) and start logging
    pub fn mount(&self) -> std::result::Result<(), MountError> {
        self.volume.mount()
    }

    /// Stop logging and unmount the card; a no-op when not mounted
    pub fn unmount(&self) -> std::result::Result<(), MountError> {
        self.volume.unmount()
    }

    pub fn is_mounted(&self) -> bool {
        self.volume.is_mounted()
    }

    /// Start the logging loops without touching the mount state.
    ///
    /// If the card is not mounted the writer mounts it on its first tick.
    pub fn start_logging(&self) {
        self.orchestrator.start();
    }

    /// Stop the logging loops, leaving the card mounted
    pub fn stop_logging(&self) {
        self.orchestrator.stop();
    }

    /// Check if both loops are scheduled and the card is mounted
    pub fn is_logging(&self) -> bool {
        self.orchestrator.is_running()
    }

    /// Query free space and cache the reading.
    ///
    /// On failure the cached reading is left as it was.
    pub fn refresh_free_space(&self) -> Result<FreeSpaceReading> {
        let reading = self.store.free_space()?;
        self.stats.record_free_space(reading);
        Ok(reading)
    }

    /// Last cached free-space reading
    pub fn last_free_space(&self) -> Option<FreeSpaceReading> {
        self.stats.last_free_space()
    }

    pub fn store(&self) -> &FileStore {
        &self.store
    }

    pub fn volume(&self) -> &Arc<VolumeHandle> {
        &self.volume
    }

    pub fn orchestrator(&self) -> &Arc<LoggingOrchestrator> {
        &self.orchestrator
    }

    pub fn stats(&self) -> &LoggerStats {
        &self.stats
    }

    /// Runtime the logging loops run on
    pub fn runtime(&self) -> &Handle {
        &self.runtime
    }

    /// Snapshot for a status display
    pub fn status(&self) -> CardStatus {
        let volume_stats = self.volume.stats();
        CardStatus {
            state: self.volume.state(),
            logging: self.is_logging(),
            free_space: self.stats.last_free_space(),
            records_written: self.stats.records_written(),
            write_failures: self.stats.write_failures(),
            evictions: self.stats.evictions(),
            mounts: volume_stats.mounts.load(Ordering::Relaxed),
            mount_failures: volume_stats.mount_failures.load(Ordering::Relaxed),
        }
    }
}

impl Drop for CardManager {
    fn drop(&mut self) {
        if self.orchestrator.writer_scheduled() || self.orchestrator.monitor_scheduled() {
            info!("Card manager dropped, stopping logging");
            self.orchestrator.stop();
        }
    }
}
