//! Record-writer and space-monitor lifecycle
//!
//! [`LoggingOrchestrator`] owns at most one record-writer and at most one
//! space-monitor [`PeriodicTask`]. It is registered as the volume's
//! [`VolumeObserver`], so every successful mount starts logging and every
//! successful unmount (explicit, after a write failure, or after the card
//! stopped answering) stops it before the volume is released.
//!
//! Lock order is volume transition, then task set. Ticks may call back into
//! the volume; `start`/`stop` never do.

use crate::record::{format_diagnostic, format_record, log_file_name};
use crate::source::{Clock, DataSource};
use crate::stats::LoggerStats;
use crate::task::PeriodicTask;
use cardlog_common::{RecorderConfig, Result};
use cardlog_storage::{EvictionOutcome, EvictionPolicy, FileStore, VolumeHandle, VolumeObserver};
use chrono::NaiveDateTime;
use parking_lot::Mutex;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

/// Everything the two loops need, shared between them
pub struct RecorderContext {
    pub volume: Arc<VolumeHandle>,
    pub store: FileStore,
    pub source: Arc<dyn DataSource>,
    pub clock: Arc<dyn Clock>,
    pub policy: EvictionPolicy,
    pub config: RecorderConfig,
    pub stats: Arc<LoggerStats>,
}

/// Handles of the scheduled loops; `Some` iff the loop is scheduled
#[derive(Debug, Default)]
struct LoggingTaskSet {
    writer: Option<PeriodicTask>,
    monitor: Option<PeriodicTask>,
}

/// Starts and stops the background logging loops
pub struct LoggingOrchestrator {
    ctx: Arc<RecorderContext>,
    runtime: Handle,
    tasks: Mutex<LoggingTaskSet>,
}

impl LoggingOrchestrator {
    /// Create a stopped orchestrator spawning onto `runtime`
    pub fn new(ctx: RecorderContext, runtime: Handle) -> Self {
        Self {
            ctx: Arc::new(ctx),
            runtime,
            tasks: Mutex::new(LoggingTaskSet::default()),
        }
    }

    /// Schedule whichever loops are not already scheduled.
    ///
    /// The writer ticks immediately; the monitor waits for the settling
    /// delay first.
    pub fn start(&self) {
        let mut tasks = self.tasks.lock();

        if tasks.writer.is_some() && tasks.monitor.is_some() {
            debug!("Logging already running");
            return;
        }

        if tasks.writer.is_none() {
            let ctx = Arc::clone(&self.ctx);
            tasks.writer = Some(PeriodicTask::spawn(
                &self.runtime,
                "record-writer",
                Duration::ZERO,
                self.ctx.config.write_interval(),
                move || write_tick(&ctx),
            ));
        }

        if tasks.monitor.is_none() {
            let ctx = Arc::clone(&self.ctx);
            tasks.monitor = Some(PeriodicTask::spawn(
                &self.runtime,
                "space-monitor",
                self.ctx.config.monitor_start_delay(),
                self.ctx.config.monitor_interval(),
                move || monitor_tick(&ctx),
            ));
        }

        info!(
            "Logging started (write every {:?}, space check every {:?})",
            self.ctx.config.write_interval(),
            self.ctx.config.monitor_interval()
        );
    }

    /// Cancel both loops; a no-op when stopped.
    ///
    /// Does not wait: a tick already in progress runs to completion, and
    /// nothing ticks afterwards.
    pub fn stop(&self) {
        let mut tasks = self.tasks.lock();
        let writer = tasks.writer.take();
        let monitor = tasks.monitor.take();
        drop(tasks);

        if writer.is_none() && monitor.is_none() {
            debug!("Logging already stopped");
            return;
        }

        // Dropping a task cancels it
        drop(writer);
        drop(monitor);
        info!("Logging stopped");
    }

    /// True only when both loops are scheduled and the volume is mounted
    pub fn is_running(&self) -> bool {
        let tasks = self.tasks.lock();
        tasks.writer.is_some() && tasks.monitor.is_some() && self.ctx.volume.is_mounted()
    }

    /// Check if the record writer is scheduled
    pub fn writer_scheduled(&self) -> bool {
        self.tasks.lock().writer.is_some()
    }

    /// Check if the space monitor is scheduled
    pub fn monitor_scheduled(&self) -> bool {
        self.tasks.lock().monitor.is_some()
    }

    /// Shared loop context
    pub fn context(&self) -> &RecorderContext {
        &self.ctx
    }
}

impl VolumeObserver for LoggingOrchestrator {
    fn volume_mounted(&self) {
        self.start();
    }

    fn volume_unmounted(&self) {
        self.stop();
    }
}

impl std::fmt::Debug for LoggingOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggingOrchestrator")
            .field("tasks", &*self.tasks.lock())
            .finish_non_exhaustive()
    }
}

/// One record-writer tick
fn write_tick(ctx: &RecorderContext) -> ControlFlow<()> {
    if !ctx.volume.is_mounted() {
        if let Err(e) = ctx.volume.mount() {
            debug!("Volume unavailable, skipping write: {}", e);
            return ControlFlow::Continue(());
        }
    }

    let now = ctx.clock.now();
    let file_name = log_file_name(now.date(), &ctx.config.file_extension);

    if let Err(e) = write_record(ctx, &file_name, now) {
        if e.is_not_mounted() {
            debug!("Volume detached before write to {}", file_name);
        } else {
            LoggerStats::bump(&ctx.stats.write_failures);
            error!("Failed to log to {}: {}, unmounting", file_name, e);
            if let Err(unmount_err) = ctx.volume.unmount() {
                error!("Unmount after write failure failed: {}", unmount_err);
            }
        }
        return ControlFlow::Continue(());
    }

    if let Some(diagnostics_file) = ctx.config.diagnostics_file.as_deref() {
        write_diagnostic(ctx, diagnostics_file, now);
    }

    ControlFlow::Continue(())
}

/// Create the day's file with its header if needed, then append one record
fn write_record(ctx: &RecorderContext, file_name: &str, now: NaiveDateTime) -> Result<()> {
    if !ctx.store.has_file(file_name)? {
        ctx.store.append_line(file_name, &ctx.source.header())?;
        LoggerStats::bump(&ctx.stats.files_created);
        info!("Created a new file {}", file_name);
    }

    let line = format_record(now, ctx.source.as_ref());
    ctx.store.append_line(file_name, &line)?;
    LoggerStats::bump(&ctx.stats.records_written);
    debug!("Logged to {}: {}", file_name, line);
    Ok(())
}

fn write_diagnostic(ctx: &RecorderContext, file_name: &str, now: NaiveDateTime) {
    let Some(text) = ctx.source.diagnostic() else {
        return;
    };

    match ctx.store.append_line(file_name, &format_diagnostic(now, &text)) {
        Ok(()) => LoggerStats::bump(&ctx.stats.diagnostics_written),
        Err(e) => warn!("Failed to write diagnostics to {}: {}", file_name, e),
    }
}

/// One space-monitor tick
fn monitor_tick(ctx: &RecorderContext) -> ControlFlow<()> {
    match ctx.policy.apply(&ctx.store) {
        Ok(outcome) => {
            ctx.stats.record_free_space(*outcome.reading());
            match outcome {
                EvictionOutcome::Evicted { path, .. } => {
                    LoggerStats::bump(&ctx.stats.evictions);
                    info!("Evicted {} to reclaim space", path.display());
                }
                EvictionOutcome::DeleteFailed { .. } => {
                    LoggerStats::bump(&ctx.stats.eviction_failures);
                }
                EvictionOutcome::NotNeeded(_) | EvictionOutcome::NothingToEvict(_) => {}
            }
        }
        Err(e) if e.is_not_mounted() => debug!("Volume not mounted, skipping space check"),
        Err(e) => warn!("Free space check failed: {}", e),
    }
    ControlFlow::Continue(())
}
