//! File operations on the mounted volume
//!
//! Every operation checks the mount state first and fails with
//! `Error::NotMounted` without touching the filesystem when the volume is
//! detached. The check is advisory: the volume can go away between the
//! check and the I/O, so the I/O result is what callers act on.

use crate::volume::VolumeHandle;
use cardlog_common::{Error, FreeSpaceReading, IoError, Result};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, error, info, warn};

/// Thin file operations scoped to the volume's mount point
#[derive(Debug, Clone)]
pub struct FileStore {
    volume: Arc<VolumeHandle>,
}

impl FileStore {
    /// Create a file store over `volume`
    pub fn new(volume: Arc<VolumeHandle>) -> Self {
        Self { volume }
    }

    /// The volume this store writes to
    pub fn volume(&self) -> &Arc<VolumeHandle> {
        &self.volume
    }

    /// Qualify `name` with the mount point unless it already carries it
    pub fn resolve(&self, name: impl AsRef<Path>) -> PathBuf {
        let name = name.as_ref();
        let root = self.volume.root();
        if name.starts_with(root) {
            name.to_path_buf()
        } else {
            let relative = name.strip_prefix("/").unwrap_or(name);
            root.join(relative)
        }
    }

    /// Check if `name` exists on the volume.
    ///
    /// Only a missing entry counts as absent; any other stat failure is an
    /// error, so a flaky card is not mistaken for an empty one.
    pub fn has_file(&self, name: impl AsRef<Path>) -> Result<bool> {
        self.ensure_mounted()?;
        let path = self.resolve(name);
        match fs::metadata(&path) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(IoError::read(&path, e).into()),
        }
    }

    /// Append `text` and a newline to `name`, creating the file if needed.
    ///
    /// The file is flushed, synced and closed before returning.
    pub fn append_line(&self, name: impl AsRef<Path>, text: &str) -> Result<()> {
        self.ensure_mounted()?;
        let path = self.resolve(name);

        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&path)
            .map_err(|e| IoError::open(&path, e))?;

        let mut line = String::with_capacity(text.len() + 1);
        line.push_str(text);
        line.push('\n');

        file.write_all(line.as_bytes())
            .and_then(|()| file.flush())
            .and_then(|()| file.sync_data())
            .map_err(|e| IoError::write(&path, e))?;

        Ok(())
    }

    /// Best-effort unlink. Returns whether the file was removed; failures
    /// are logged, not returned.
    pub fn delete_file(&self, path: impl AsRef<Path>) -> Result<bool> {
        self.ensure_mounted()?;
        let path = self.resolve(path);

        match fs::remove_file(&path) {
            Ok(()) => {
                info!("Removed file {}", path.display());
                Ok(true)
            }
            Err(e) => {
                error!("Failed to remove file {}: {}", path.display(), e);
                Ok(false)
            }
        }
    }

    /// The least recently modified regular file directly under the mount
    /// point, or `None` if there is none or the directory cannot be read.
    ///
    /// Ties on modification time go to the lexicographically smallest name,
    /// so the result does not depend on directory iteration order.
    pub fn oldest_file(&self) -> Result<Option<PathBuf>> {
        self.ensure_mounted()?;
        let root = self.volume.root();

        let entries = match fs::read_dir(root) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Failed to open directory {}: {}", root.display(), e);
                return Ok(None);
            }
        };

        let mut oldest: Option<(SystemTime, PathBuf)> = None;
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!("Skipping unreadable entry in {}: {}", root.display(), e);
                    continue;
                }
            };

            let path = entry.path();
            let modified = match fs::metadata(&path) {
                Ok(meta) if meta.is_file() => match meta.modified() {
                    Ok(modified) => modified,
                    Err(e) => {
                        debug!("No modification time for {}: {}", path.display(), e);
                        continue;
                    }
                },
                Ok(_) => continue,
                Err(e) => {
                    debug!("Cannot stat {}: {}", path.display(), e);
                    continue;
                }
            };

            let is_older = oldest.as_ref().is_none_or(|(best_time, best_path)| {
                (modified, &path) < (*best_time, best_path)
            });
            if is_older {
                oldest = Some((modified, path));
            }
        }

        Ok(oldest.map(|(_, path)| path))
    }

    /// Total and free capacity of the volume.
    ///
    /// A device that stopped answering is unmounted before the error is
    /// returned.
    pub fn free_space(&self) -> Result<FreeSpaceReading> {
        self.ensure_mounted()?;

        match self.volume.statfs() {
            Ok(reading) => Ok(reading),
            Err(e) if e.is_device_not_ready() => {
                warn!("Storage device not ready ({}), unmounting", e);
                if let Err(unmount_err) = self.volume.unmount() {
                    error!("Unmount after device loss failed: {}", unmount_err);
                }
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn ensure_mounted(&self) -> Result<()> {
        if self.volume.is_mounted() {
            Ok(())
        } else {
            Err(Error::NotMounted)
        }
    }
}
