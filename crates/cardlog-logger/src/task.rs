//! Periodic background task with cooperative cancellation
//!
//! A [`PeriodicTask`] runs a tick closure on a fixed period after an optional
//! initial delay. Cancellation is a flag checked before every tick and raced
//! against the wait for the next one, so a tick that is already running
//! always finishes. Dropping the task cancels it.
//!
//! Ticks run inline on the runtime and must be short.

use std::ops::ControlFlow;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Handle to a spawned periodic loop
#[derive(Debug)]
pub struct PeriodicTask {
    name: &'static str,
    cancel: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicTask {
    /// Spawn `tick` on `runtime`, first after `initial_delay`, then every
    /// `period`. The loop ends when cancelled or when `tick` breaks.
    pub fn spawn<F>(
        runtime: &Handle,
        name: &'static str,
        initial_delay: Duration,
        period: Duration,
        mut tick: F,
    ) -> Self
    where
        F: FnMut() -> ControlFlow<()> + Send + 'static,
    {
        let (cancel, mut cancelled) = watch::channel(false);

        let handle = runtime.spawn(async move {
            if !initial_delay.is_zero() {
                tokio::select! {
                    biased;
                    () = wait_cancelled(&mut cancelled) => {
                        debug!("{} task cancelled before first tick", name);
                        return;
                    }
                    () = tokio::time::sleep(initial_delay) => {}
                }
            }

            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    () = wait_cancelled(&mut cancelled) => break,
                    _ = ticker.tick() => {}
                }

                if *cancelled.borrow() {
                    break;
                }
                if tick().is_break() {
                    debug!("{} task finished", name);
                    break;
                }
            }

            debug!("{} task exited", name);
        });

        Self {
            name,
            cancel,
            handle: Some(handle),
        }
    }

    /// Task name for logs
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Ask the loop to stop before its next tick
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    /// Check if cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Check if the loop has exited
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Cancel and wait for the loop to exit
    pub async fn shutdown(mut self) {
        self.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                debug!("{} task ended abnormally: {}", self.name, e);
            }
        }
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Resolves once cancellation is requested or the sender is gone
async fn wait_cancelled(cancelled: &mut watch::Receiver<bool>) {
    let _ = cancelled.wait_for(|cancelled| *cancelled).await;
}
