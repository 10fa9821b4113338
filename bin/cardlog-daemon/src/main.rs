//! cardlog Daemon - Periodic data logging to a removable card
//!
//! Mounts the card, appends one record per write interval to a daily CSV
//! file and evicts the oldest file when the card fills up. With the
//! supervisor enabled, a pulled card is remounted when it comes back.

mod source;

use anyhow::{Context, Result};
use cardlog_common::{Config, TransportConfig};
use cardlog_logger::{AutoMountSupervisor, CardManager, SystemClock};
use clap::Parser;
use serde::Deserialize;
use source::HostSource;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "cardlog-daemon")]
#[command(about = "Log data to a removable storage card")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, env = "CARDLOG_CONFIG", default_value = "/etc/cardlog/cardlog.toml")]
    config: PathBuf,

    /// Directory the card is mounted at
    #[arg(long, env = "CARDLOG_ROOT")]
    root: Option<PathBuf>,

    /// Block device to mount at the root (e.g. /dev/mmcblk0p1)
    #[arg(long)]
    device: Option<PathBuf>,

    /// Filesystem type of --device
    #[arg(long, default_value = "vfat")]
    fstype: String,

    /// Record write interval in milliseconds
    #[arg(long)]
    write_interval_ms: Option<u64>,

    /// Evict the oldest file when free space drops below this many KB
    #[arg(long)]
    threshold_kb: Option<u64>,

    /// Also append a diagnostics line to this file every write
    #[arg(long)]
    diagnostics_file: Option<String>,

    /// Mount once at startup instead of running the auto-mount supervisor
    #[arg(long)]
    no_supervisor: bool,

    /// Log level (overrides `[logging] level`)
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

/// Configuration file structure
#[derive(Debug, Deserialize, Default)]
struct FileConfig {
    #[serde(flatten)]
    card: Config,
    #[serde(default)]
    logging: LoggingConfig,
}

#[derive(Debug, Deserialize)]
struct LoggingConfig {
    #[serde(default = "default_log_level")]
    level: String,
    #[serde(default)]
    json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Load the configuration file; a missing file means defaults
fn load_config(path: &Path) -> Result<FileConfig> {
    if !path.exists() {
        return Ok(FileConfig::default());
    }
    let config_str = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    toml::from_str(&config_str).with_context(|| format!("failed to parse {}", path.display()))
}

/// Merge CLI args into the file configuration (CLI takes precedence)
fn apply_args(mut config: Config, args: &Args) -> Config {
    if let Some(root) = &args.root {
        config.mount.root.clone_from(root);
    }
    if let Some(device) = &args.device {
        config.mount.transport = TransportConfig::BlockDevice {
            device: device.clone(),
            fstype: args.fstype.clone(),
            options: None,
        };
    }
    if let Some(interval) = args.write_interval_ms {
        config.recorder.write_interval_ms = interval;
    }
    if let Some(threshold) = args.threshold_kb {
        config.recorder.eviction_threshold_kb = threshold;
    }
    if let Some(file) = &args.diagnostics_file {
        config.recorder.diagnostics_file = Some(file.clone());
    }
    if args.no_supervisor {
        config.supervisor.enabled = false;
    }
    config
}

/// CLI level if given, otherwise the file's
fn resolve_log_level(args: &Args, logging: &LoggingConfig) -> String {
    args.log_level
        .clone()
        .unwrap_or_else(|| logging.level.clone())
}

fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let file_config = load_config(&args.config)?;
    let log_level = resolve_log_level(&args, &file_config.logging);
    init_tracing(&log_level, args.log_json || file_config.logging.json);

    let config = apply_args(file_config.card, &args);

    info!("Starting cardlog daemon");
    info!("Config file: {}", args.config.display());
    info!("Card root: {}", config.mount.root.display());
    info!(
        "Write interval: {} ms, eviction below {} KB",
        config.recorder.write_interval_ms, config.recorder.eviction_threshold_kb
    );

    let manager = Arc::new(
        CardManager::from_config(&config, Arc::new(HostSource), Arc::new(SystemClock))
            .context("failed to set up card manager")?,
    );

    let supervisor = if config.supervisor.enabled {
        Some(AutoMountSupervisor::new(Arc::clone(&manager), config.supervisor.clone()).spawn())
    } else {
        if let Err(e) = manager.mount() {
            warn!("Initial mount failed: {} (the writer retries every tick)", e);
        }
        manager.start_logging();
        None
    };

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    info!("Shutting down...");

    if let Some(task) = supervisor {
        task.shutdown().await;
    }
    if let Err(e) = manager.unmount() {
        error!("Failed to unmount card on shutdown: {}", e);
    }
    manager.stop_logging();

    info!("Final status: {}", manager.status());
    info!("cardlog daemon shut down gracefully");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_config_sections() {
        let config: FileConfig = toml::from_str(
            r#"
            [mount]
            root = "/media/card"

            [recorder]
            write_interval_ms = 5000

            [logging]
            level = "debug"
            json = true
            "#,
        )
        .unwrap();

        assert_eq!(config.card.mount.root, PathBuf::from("/media/card"));
        assert_eq!(config.card.recorder.write_interval_ms, 5_000);
        assert!(config.card.supervisor.enabled);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = load_config(Path::new("/nonexistent/cardlog.toml")).unwrap();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.card.recorder.write_interval_ms, 14_500);
    }

    #[test]
    fn test_log_level_precedence() {
        let file = LoggingConfig {
            level: "debug".to_string(),
            json: false,
        };

        let args = Args::parse_from(["cardlog-daemon"]);
        assert_eq!(resolve_log_level(&args, &file), "debug");

        let args = Args::parse_from(["cardlog-daemon", "--log-level", "info"]);
        assert_eq!(resolve_log_level(&args, &file), "info");

        let args = Args::parse_from(["cardlog-daemon"]);
        assert_eq!(resolve_log_level(&args, &LoggingConfig::default()), "info");
    }

    #[test]
    fn test_cli_overrides_file() {
        let args = Args::parse_from([
            "cardlog-daemon",
            "--root",
            "/mnt/sd",
            "--device",
            "/dev/mmcblk0p1",
            "--threshold-kb",
            "2000",
            "--no-supervisor",
        ]);
        let config = apply_args(Config::default(), &args);

        assert_eq!(config.mount.root, PathBuf::from("/mnt/sd"));
        assert_eq!(
            config.mount.transport,
            TransportConfig::BlockDevice {
                device: PathBuf::from("/dev/mmcblk0p1"),
                fstype: "vfat".to_string(),
                options: None,
            }
        );
        assert_eq!(config.recorder.eviction_threshold_kb, 2_000);
        assert!(!config.supervisor.enabled);
        assert!(config.validate().is_ok());
    }
}
