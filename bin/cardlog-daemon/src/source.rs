//! Host metrics as the logged data source

use cardlog_logger::DataSource;
use tracing::debug;

const HEADER: &str = "Date (UTC),Load (1m),Load (5m),Available Memory";

/// Logs the host's load average and available memory
#[derive(Debug, Default)]
pub struct HostSource;

impl HostSource {
    fn available_memory_kb() -> Option<u64> {
        match sys_info::mem_info() {
            Ok(mem) => Some(mem.avail),
            Err(e) => {
                debug!("Failed to read memory info: {}", e);
                None
            }
        }
    }
}

impl DataSource for HostSource {
    fn header(&self) -> String {
        HEADER.to_string()
    }

    fn value_count(&self) -> usize {
        3
    }

    fn value(&self, index: usize) -> String {
        match index {
            0 | 1 => match sys_info::loadavg() {
                Ok(load) if index == 0 => format!("{:.2}", load.one),
                Ok(load) => format!("{:.2}", load.five),
                Err(e) => {
                    debug!("Failed to read load average: {}", e);
                    String::new()
                }
            },
            2 => Self::available_memory_kb()
                .map(|kb| format!("{kb} kB"))
                .unwrap_or_default(),
            _ => String::new(),
        }
    }

    fn diagnostic(&self) -> Option<String> {
        let mem = sys_info::mem_info().ok()?;
        Some(format!(
            "mem_total={} kB,mem_free={} kB,mem_avail={} kB",
            mem.total, mem.free, mem.avail
        ))
    }
}
