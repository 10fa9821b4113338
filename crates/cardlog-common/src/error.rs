//! Error types for cardlog
//!
//! Three families: [`MountError`] for attaching and detaching the volume,
//! [`IoError`] for file operations on a mounted volume, and the umbrella
//! [`Error`] which adds the `NotMounted` precondition failure.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Common result type for cardlog operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for cardlog
#[derive(Debug, Error)]
pub enum Error {
    #[error("volume is not mounted")]
    NotMounted,

    #[error("mount error: {0}")]
    Mount(#[from] MountError),

    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Check if this is the unmounted-volume precondition failure
    #[must_use]
    pub const fn is_not_mounted(&self) -> bool {
        matches!(self, Self::NotMounted)
    }

    /// Check if this error means the device stopped responding
    #[must_use]
    pub const fn is_device_not_ready(&self) -> bool {
        matches!(self, Self::Io(IoError::DeviceNotReady { .. }))
    }
}

/// Failure to attach or detach the storage volume
#[derive(Debug, Clone, Error)]
pub enum MountError {
    #[error("storage device not present: {0}")]
    DeviceAbsent(String),

    #[error("bus fault talking to storage device: {0}")]
    BusFault(String),

    #[error("no usable filesystem on device (format required): {0}")]
    NeedsFormat(String),

    #[error("storage device busy: {0}")]
    Busy(String),
}

impl MountError {
    /// Check if retrying the mount later can succeed without intervention.
    ///
    /// A missing filesystem is never retryable: the volume is not formatted
    /// automatically.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::DeviceAbsent(_) | Self::BusFault(_) | Self::Busy(_)
        )
    }

    /// Check if the device answered but carries no usable filesystem
    #[must_use]
    pub const fn needs_format(&self) -> bool {
        matches!(self, Self::NeedsFormat(_))
    }
}

/// Failure of a file operation on the mounted volume
#[derive(Debug, Error)]
pub enum IoError {
    #[error("failed to open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("device not ready at {}", .path.display())]
    DeviceNotReady { path: PathBuf },
}

impl IoError {
    /// Classify a failed open
    pub fn open(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::classify(path, source, |path, source| Self::Open { path, source })
    }

    /// Classify a failed write, flush or sync
    pub fn write(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::classify(path, source, |path, source| Self::Write { path, source })
    }

    /// Classify a failed read, stat or directory scan
    pub fn read(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::classify(path, source, |path, source| Self::Read { path, source })
    }

    /// Path the failed operation was aimed at
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Open { path, .. }
            | Self::Write { path, .. }
            | Self::Read { path, .. }
            | Self::DeviceNotReady { path } => path,
        }
    }

    /// Check if the device stopped responding
    #[must_use]
    pub const fn is_device_not_ready(&self) -> bool {
        matches!(self, Self::DeviceNotReady { .. })
    }

    fn classify(
        path: impl AsRef<Path>,
        source: std::io::Error,
        otherwise: impl FnOnce(PathBuf, std::io::Error) -> Self,
    ) -> Self {
        let path = path.as_ref().to_path_buf();
        if is_device_gone(&source) {
            Self::DeviceNotReady { path }
        } else {
            otherwise(path, source)
        }
    }
}

/// OS errors a removed or dead card surfaces as
fn is_device_gone(err: &std::io::Error) -> bool {
    let Some(code) = err.raw_os_error() else {
        return false;
    };

    #[cfg(target_os = "linux")]
    {
        if code == libc::ENOMEDIUM {
            return true;
        }
    }

    matches!(
        code,
        libc::ENODEV | libc::ENXIO | libc::EIO | libc::ESHUTDOWN
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mount_error_retryable() {
        assert!(MountError::DeviceAbsent("slot empty".into()).is_retryable());
        assert!(MountError::BusFault("crc".into()).is_retryable());
        assert!(MountError::Busy("in use".into()).is_retryable());
        assert!(!MountError::NeedsFormat("no fat".into()).is_retryable());
        assert!(MountError::NeedsFormat("no fat".into()).needs_format());
    }

    #[test]
    fn test_io_error_classification() {
        let gone = std::io::Error::from_raw_os_error(libc::ENODEV);
        assert!(IoError::write("/sdcard/a.csv", gone).is_device_not_ready());

        let eio = std::io::Error::from_raw_os_error(libc::EIO);
        assert!(IoError::read("/sdcard", eio).is_device_not_ready());

        let missing = std::io::Error::from_raw_os_error(libc::ENOENT);
        let err = IoError::open("/sdcard/a.csv", missing);
        assert!(!err.is_device_not_ready());
        assert!(matches!(err, IoError::Open { .. }));
        assert_eq!(err.path(), Path::new("/sdcard/a.csv"));

        // No OS code at all: never treated as device loss
        let custom = std::io::Error::other("short write");
        assert!(!IoError::write("/sdcard/a.csv", custom).is_device_not_ready());
    }

    #[test]
    fn test_error_predicates() {
        assert!(Error::NotMounted.is_not_mounted());
        let err: Error = IoError::DeviceNotReady {
            path: PathBuf::from("/sdcard"),
        }
        .into();
        assert!(err.is_device_not_ready());
        assert!(!err.is_not_mounted());
    }
}
