//! cardlog Common - Shared types and utilities
//!
//! This crate provides the error taxonomy, configuration structures and
//! small value types shared by the storage, logger and daemon crates.

pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, MountPoint, RecorderConfig, SupervisorConfig, TransportConfig};
pub use error::{Error, IoError, MountError, Result};
pub use types::*;
