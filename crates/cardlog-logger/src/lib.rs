//! cardlog Logger - Periodic record logging onto a removable card
//!
//! This crate runs the background side of cardlog:
//! - The record-writer loop appending one CSV line per tick
//! - The space-monitor loop evicting the oldest file when space runs low
//! - [`CardManager`], tying mount state and both loops together
//! - [`AutoMountSupervisor`], remounting the card when it comes back

pub mod manager;
pub mod orchestrator;
pub mod record;
pub mod source;
pub mod stats;
pub mod supervisor;
pub mod task;

#[cfg(test)]
pub(crate) mod test_util;

// Re-exports
pub use manager::{CardManager, CardStatus};
pub use orchestrator::{LoggingOrchestrator, RecorderContext};
pub use record::{TIMESTAMP_FORMAT, format_record, log_file_name};
pub use source::{Clock, DataSource, SystemClock};
pub use stats::LoggerStats;
pub use supervisor::AutoMountSupervisor;
pub use task::PeriodicTask;
