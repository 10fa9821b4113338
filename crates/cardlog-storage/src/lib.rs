//! cardlog Storage - Removable volume handling
//!
//! This crate owns everything that touches the storage card:
//! - Transports that attach and detach the volume (directory, block device)
//! - The mount/unmount state machine ([`VolumeHandle`])
//! - File operations on the mounted volume ([`FileStore`])
//! - The oldest-file eviction policy ([`EvictionPolicy`])

pub mod eviction;
pub mod file_store;
pub mod transport;
pub mod volume;

#[cfg(test)]
pub(crate) mod test_util;

// Re-exports
pub use eviction::{EvictionOutcome, EvictionPolicy, should_evict};
pub use file_store::FileStore;
pub use transport::{DirectoryTransport, VolumeTransport, statvfs_reading, transport_from_config};
#[cfg(target_os = "linux")]
pub use transport::BlockDeviceTransport;
pub use volume::{VolumeHandle, VolumeObserver};
