//! Auto-mount supervisor
//!
//! After an initial settling delay, periodically mounts the card if it is
//! not mounted and refreshes the cached free-space reading. Mount failures
//! are retried on the next tick; a failed reading leaves the previous one in
//! place.

use crate::manager::CardManager;
use crate::task::PeriodicTask;
use cardlog_common::SupervisorConfig;
use std::ops::ControlFlow;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Keeps the card mounted and the free-space reading fresh
#[derive(Debug)]
pub struct AutoMountSupervisor {
    manager: Arc<CardManager>,
    config: SupervisorConfig,
}

impl AutoMountSupervisor {
    pub const fn new(manager: Arc<CardManager>, config: SupervisorConfig) -> Self {
        Self { manager, config }
    }

    /// One supervisor pass
    pub fn tick(&self) {
        if !self.manager.is_mounted() {
            match self.manager.mount() {
                Ok(()) => info!("Card detected and mounted"),
                Err(e) if e.needs_format() => {
                    warn!("Card present but unusable, not formatting: {}", e);
                }
                Err(e) => debug!("Card not available yet: {}", e),
            }
        }

        match self.manager.refresh_free_space() {
            Ok(reading) => debug!("Free space: {}", reading),
            Err(e) if e.is_not_mounted() => {}
            Err(e) => warn!("Failed to read free space: {}", e),
        }
    }

    /// Run the loop on the manager's runtime until the returned task is
    /// cancelled or dropped
    pub fn spawn(self) -> PeriodicTask {
        info!(
            "Auto-mount supervisor starting in {:?}, checking every {:?}",
            self.config.initial_delay(),
            self.config.interval()
        );
        let runtime = self.manager.runtime().clone();
        let initial_delay = self.config.initial_delay();
        let interval = self.config.interval();
        PeriodicTask::spawn(&runtime, "auto-mount", initial_delay, interval, move || {
            self.tick();
            ControlFlow::Continue(())
        })
    }
}
