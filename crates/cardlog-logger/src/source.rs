//! Collaborators supplying what gets logged and when

use chrono::{NaiveDateTime, Utc};

/// Provider of the values written on each record.
///
/// Implementations must not block: they are called from the record-writer
/// loop once per tick.
pub trait DataSource: Send + Sync {
    /// Header line written once at the top of every new log file
    fn header(&self) -> String;

    /// Number of values in one record
    fn value_count(&self) -> usize;

    /// Value at `index`, already formatted with its unit
    fn value(&self, index: usize) -> String;

    /// Optional free-form diagnostic line (memory usage and the like)
    fn diagnostic(&self) -> Option<String> {
        None
    }
}

/// Source of the current calendar time
pub trait Clock: Send + Sync {
    /// Current date and time
    fn now(&self) -> NaiveDateTime;
}

/// Wall clock in UTC
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Utc::now().naive_utc()
    }
}
