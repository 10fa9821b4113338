//! Log file naming and record line formatting
//!
//! One file per day named `YYYYMMDD.<ext>`. Each line is the timestamp
//! followed by the data source's values, comma separated. Values are written
//! as the source formats them; no quoting is applied.

use crate::source::DataSource;
use chrono::{NaiveDate, NaiveDateTime};

/// Timestamp format of the first column of every record
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Name of the log file for `date`
pub fn log_file_name(date: NaiveDate, extension: &str) -> String {
    format!("{}.{}", date.format("%Y%m%d"), extension)
}

/// One record line for the source's current values
pub fn format_record(now: NaiveDateTime, source: &dyn DataSource) -> String {
    let mut line = now.format(TIMESTAMP_FORMAT).to_string();
    for index in 0..source.value_count() {
        line.push(',');
        line.push_str(&source.value(index));
    }
    line
}

/// One diagnostics line
pub fn format_diagnostic(now: NaiveDateTime, text: &str) -> String {
    format!("{},{}", now.format(TIMESTAMP_FORMAT), text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::StaticSource;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    #[test]
    fn test_log_file_name() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 7).unwrap();
        assert_eq!(log_file_name(date, "csv"), "20260307.csv");
        assert_eq!(log_file_name(date, "log"), "20260307.log");
    }

    #[test]
    fn test_format_record() {
        let source = StaticSource::new("Date,Voltage,Current", &["3.71V", "-0.20A"]);
        assert_eq!(
            format_record(at(2026, 10, 17, 8, 5, 9), &source),
            "2026-10-17 08:05:09,3.71V,-0.20A"
        );
    }

    #[test]
    fn test_format_record_without_values() {
        let source = StaticSource::new("Date", &[]);
        assert_eq!(
            format_record(at(2026, 1, 1, 0, 0, 0), &source),
            "2026-01-01 00:00:00"
        );
    }

    #[test]
    fn test_format_diagnostic() {
        assert_eq!(
            format_diagnostic(at(2026, 1, 1, 12, 0, 0), "free_memory=1024 kB"),
            "2026-01-01 12:00:00,free_memory=1024 kB"
        );
    }
}
