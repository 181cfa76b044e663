//! Configuration management for pimond.
//!
//! Loads settings from /etc/pi-monitor/config.toml (or the `--config` path).
//! Every key has a default, but the file itself must exist: the agent refuses
//! to start without one.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::power::PowerField;

/// Config file path
pub const CONFIG_PATH: &str = "/etc/pi-monitor/config.toml";

/// Poll loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Namespace every metric is pushed under
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Seconds between ticks
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Modem metrics go out on every N-th tick, starting with the first
    #[serde(default = "default_modem_every")]
    pub modem_every: u32,

    /// Log filter used when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Push the current readings under the "Input Voltage" and
    /// "System Voltage" labels, as deployed dashboards expect
    #[serde(default = "default_true")]
    pub voltage_reports_current: bool,
}

fn default_namespace() -> String {
    "rpi".to_string()
}

fn default_interval() -> u64 {
    10
}

fn default_modem_every() -> u32 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            interval_secs: default_interval(),
            modem_every: default_modem_every(),
            log_level: default_log_level(),
            voltage_reports_current: default_true(),
        }
    }
}

/// qmicli invocation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModemConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_qmicli")]
    pub qmicli_path: String,

    /// QMI control device
    #[serde(default = "default_device")]
    pub device: String,

    /// Run qmicli through this program; empty runs it directly
    #[serde(default = "default_privilege_wrapper")]
    pub privilege_wrapper: String,

    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,

    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
}

fn default_qmicli() -> String {
    "/usr/bin/qmicli".to_string()
}

fn default_device() -> String {
    pimon_common::normalize::DEFAULT_DEVICE.to_string()
}

fn default_privilege_wrapper() -> String {
    "/usr/bin/sudo".to_string()
}

fn default_cache_ttl() -> u64 {
    60
}

fn default_command_timeout() -> u64 {
    10
}

impl Default for ModemConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            qmicli_path: default_qmicli(),
            device: default_device(),
            privilege_wrapper: default_privilege_wrapper(),
            cache_ttl_secs: default_cache_ttl(),
            command_timeout_secs: default_command_timeout(),
        }
    }
}

/// One sysfs attribute backing a power field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SysfsSource {
    pub path: PathBuf,

    /// Multiplier applied to the raw number (e.g. 0.001 for milli-units)
    #[serde(default = "default_scale")]
    pub scale: f64,
}

fn default_scale() -> f64 {
    1.0
}

/// Power peripheral settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Fields without an entry always fail and report zero
    #[serde(default)]
    pub sysfs: BTreeMap<PowerField, SysfsSource>,
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sysfs: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    Log,
    Jsonl,
}

/// Metric sink settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    #[serde(default = "default_sink_kind")]
    pub kind: SinkKind,

    /// Output file for `jsonl`
    #[serde(default)]
    pub path: Option<PathBuf>,
}

fn default_sink_kind() -> SinkKind {
    SinkKind::Log
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            kind: default_sink_kind(),
            path: None,
        }
    }
}

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,

    #[serde(default)]
    pub modem: ModemConfig,

    #[serde(default)]
    pub power: PowerConfig,

    #[serde(default)]
    pub sink: SinkConfig,
}

impl Config {
    /// Load and validate config from `path`
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Config file {} could not be read", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse and validate config text
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.daemon.interval_secs == 0 {
            bail!("daemon.interval_secs must be greater than zero");
        }
        if self.daemon.modem_every == 0 {
            bail!("daemon.modem_every must be greater than zero");
        }
        if self.modem.cache_ttl_secs == 0 {
            bail!("modem.cache_ttl_secs must be greater than zero");
        }
        if self.modem.command_timeout_secs == 0 {
            bail!("modem.command_timeout_secs must be greater than zero");
        }
        if self.sink.kind == SinkKind::Jsonl && self.sink.path.is_none() {
            bail!("sink.path is required when sink.kind = \"jsonl\"");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.daemon.namespace, "rpi");
        assert_eq!(config.daemon.interval_secs, 10);
        assert_eq!(config.daemon.modem_every, 10);
        assert!(config.daemon.voltage_reports_current);
        assert_eq!(config.modem.device, "/dev/cdc-wdm0");
        assert_eq!(config.modem.privilege_wrapper, "/usr/bin/sudo");
        assert_eq!(config.modem.cache_ttl_secs, 60);
        assert_eq!(config.sink.kind, SinkKind::Log);
        assert!(config.power.sysfs.is_empty());
    }

    #[test]
    fn test_full_config() {
        let content = r#"
[daemon]
namespace = "pi-07"
interval_secs = 5
voltage_reports_current = false

[modem]
device = "/dev/cdc-wdm1"
privilege_wrapper = ""

[power.sysfs.battery_level]
path = "/sys/class/power_supply/BAT0/capacity"

[power.sysfs.battery_voltage]
path = "/sys/class/power_supply/BAT0/voltage_now"
scale = 0.000001

[sink]
kind = "jsonl"
path = "/var/log/pi-monitor/metrics.jsonl"
"#;
        let config = Config::parse(content).unwrap();
        assert_eq!(config.daemon.namespace, "pi-07");
        assert_eq!(config.daemon.interval_secs, 5);
        assert!(!config.daemon.voltage_reports_current);
        assert_eq!(config.modem.device, "/dev/cdc-wdm1");
        assert!(config.modem.privilege_wrapper.is_empty());
        assert_eq!(config.power.sysfs.len(), 2);
        assert_eq!(config.power.sysfs[&PowerField::BatteryLevel].scale, 1.0);
        assert_eq!(config.power.sysfs[&PowerField::BatteryVoltage].scale, 0.000001);
        assert_eq!(config.sink.kind, SinkKind::Jsonl);
    }

    #[test]
    fn test_rejects_zero_interval() {
        assert!(Config::parse("[daemon]\ninterval_secs = 0\n").is_err());
    }

    #[test]
    fn test_rejects_jsonl_without_path() {
        assert!(Config::parse("[sink]\nkind = \"jsonl\"\n").is_err());
    }

    #[test]
    fn test_rejects_unknown_power_field() {
        assert!(Config::parse("[power.sysfs.warp_core]\npath = \"/x\"\n").is_err());
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = tempdir().unwrap();
        assert!(Config::load(&dir.path().join("absent.toml")).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[daemon]\nnamespace = \"bench\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.daemon.namespace, "bench");
    }
}
