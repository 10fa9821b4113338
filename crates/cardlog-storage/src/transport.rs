//! Volume transports
//!
//! A transport is the platform half of mounting: it attaches the volume's
//! filesystem at the mount point, detaches it again, and answers free-space
//! queries. The implementation is chosen from configuration at startup:
//! - [`DirectoryTransport`]: the root is already attached by the host
//! - [`BlockDeviceTransport`] (Linux): a block device mounted with mount(2)

use cardlog_common::{FreeSpaceReading, IoError, MountError, MountPoint, Result, TransportConfig};
use nix::errno::Errno;
use std::fmt;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Platform capability to attach and detach the storage volume
pub trait VolumeTransport: Send + Sync + fmt::Debug {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Attach the volume at `mount.root`
    fn connect(&self, mount: &MountPoint) -> std::result::Result<(), MountError>;

    /// Detach the volume from `mount.root`
    fn disconnect(&self, mount: &MountPoint) -> std::result::Result<(), MountError>;

    /// Query total and free capacity of the attached filesystem
    fn statfs(&self, mount: &MountPoint) -> std::result::Result<FreeSpaceReading, IoError> {
        statvfs_reading(&mount.root)
    }
}

/// Build the transport named by the configuration
pub fn transport_from_config(config: &TransportConfig) -> Result<Arc<dyn VolumeTransport>> {
    match config {
        TransportConfig::Directory => Ok(Arc::new(DirectoryTransport)),
        #[cfg(target_os = "linux")]
        TransportConfig::BlockDevice {
            device,
            fstype,
            options,
        } => Ok(Arc::new(BlockDeviceTransport::new(
            device,
            fstype.clone(),
            options.clone(),
        ))),
        #[cfg(not(target_os = "linux"))]
        TransportConfig::BlockDevice { .. } => Err(cardlog_common::Error::configuration(
            "block_device transport is only supported on Linux",
        )),
    }
}

/// Free space of the filesystem containing `root`, via statvfs(3)
pub fn statvfs_reading(root: &Path) -> std::result::Result<FreeSpaceReading, IoError> {
    let stat = nix::sys::statvfs::statvfs(root).map_err(|errno| {
        if errno == Errno::ENOENT {
            // The mount root itself vanished: the card is gone
            IoError::DeviceNotReady {
                path: root.to_path_buf(),
            }
        } else {
            IoError::read(root, std::io::Error::from(errno))
        }
    })?;

    #[allow(clippy::useless_conversion)]
    let reading = FreeSpaceReading::from_units(
        u64::from(stat.blocks()),
        u64::from(stat.blocks_available()),
        u64::from(stat.fragment_size()),
    );
    Ok(reading)
}

/// Transport for a root directory attached outside this process.
///
/// Connecting probes the directory; disconnecting releases nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectoryTransport;

impl VolumeTransport for DirectoryTransport {
    fn name(&self) -> &'static str {
        "directory"
    }

    fn connect(&self, mount: &MountPoint) -> std::result::Result<(), MountError> {
        let root = &mount.root;
        let meta = std::fs::metadata(root).map_err(|e| match e.kind() {
            ErrorKind::NotFound => {
                MountError::DeviceAbsent(format!("{} does not exist", root.display()))
            }
            _ => MountError::BusFault(format!("cannot stat {}: {}", root.display(), e)),
        })?;

        if !meta.is_dir() {
            return Err(MountError::NeedsFormat(format!(
                "{} is not a directory",
                root.display()
            )));
        }

        // A directory we cannot list is as good as an unreachable card
        std::fs::read_dir(root)
            .map_err(|e| MountError::BusFault(format!("cannot list {}: {}", root.display(), e)))?;

        debug!("Directory volume present at {}", root.display());
        Ok(())
    }

    fn disconnect(&self, mount: &MountPoint) -> std::result::Result<(), MountError> {
        debug!("Releasing directory volume at {}", mount.root.display());
        Ok(())
    }
}

/// Transport mounting a block device (SD/MMC card, USB stick) with mount(2)
#[cfg(target_os = "linux")]
#[derive(Debug, Clone)]
pub struct BlockDeviceTransport {
    device: std::path::PathBuf,
    fstype: String,
    options: Option<String>,
}

#[cfg(target_os = "linux")]
impl BlockDeviceTransport {
    /// Create a transport for `device` holding a `fstype` filesystem
    pub fn new(device: impl AsRef<Path>, fstype: String, options: Option<String>) -> Self {
        Self {
            device: device.as_ref().to_path_buf(),
            fstype,
            options,
        }
    }

    fn map_errno(&self, errno: Errno, what: &str) -> MountError {
        let detail = format!("{what} {}: {errno}", self.device.display());
        match errno {
            Errno::ENOENT | Errno::ENXIO | Errno::ENODEV | Errno::ENOMEDIUM | Errno::ENOTBLK => {
                MountError::DeviceAbsent(detail)
            }
            Errno::EINVAL | Errno::EUCLEAN => MountError::NeedsFormat(detail),
            Errno::EBUSY => MountError::Busy(detail),
            _ => MountError::BusFault(detail),
        }
    }
}

#[cfg(target_os = "linux")]
impl VolumeTransport for BlockDeviceTransport {
    fn name(&self) -> &'static str {
        "block-device"
    }

    fn connect(&self, mount: &MountPoint) -> std::result::Result<(), MountError> {
        use nix::mount::MsFlags;

        if !self.device.exists() {
            return Err(MountError::DeviceAbsent(format!(
                "{} does not exist",
                self.device.display()
            )));
        }

        std::fs::create_dir_all(&mount.root).map_err(|e| {
            MountError::BusFault(format!(
                "cannot create mount point {}: {}",
                mount.root.display(),
                e
            ))
        })?;

        nix::mount::mount(
            Some(self.device.as_path()),
            mount.root.as_path(),
            Some(self.fstype.as_str()),
            MsFlags::MS_NOATIME | MsFlags::MS_NODEV | MsFlags::MS_NOSUID,
            self.options.as_deref(),
        )
        .map_err(|errno| self.map_errno(errno, "mount"))?;

        debug!(
            "Mounted {} ({}) at {}",
            self.device.display(),
            self.fstype,
            mount.root.display()
        );
        Ok(())
    }

    fn disconnect(&self, mount: &MountPoint) -> std::result::Result<(), MountError> {
        nix::mount::umount2(mount.root.as_path(), nix::mount::MntFlags::empty())
            .map_err(|errno| self.map_errno(errno, "unmount"))?;
        debug!("Unmounted {}", mount.root.display());
        Ok(())
    }
}
