//! Power peripheral readings with last-known-good fallback.
//!
//! Unlike modem queries, power reads are cheap and local, so there is no TTL:
//! every access asks the peripheral again. A failed read falls back to the
//! last good value for that field only, or zero if the field never produced
//! one.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use tracing::warn;

use crate::config::SysfsSource;
use crate::error::PowerError;

/// Every reading the power peripheral exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerField {
    InputTemperature,
    InputVoltage,
    InputCurrent,
    InputPower,
    SystemTemperature,
    SystemVoltage,
    SystemCurrent,
    SystemPower,
    BatteryTemperature,
    BatteryVoltage,
    BatteryCurrent,
    BatteryPower,
    BatteryLevel,
    BatteryHealth,
    FanHealth,
    FanSpeed,
}

impl PowerField {
    pub const ALL: [PowerField; 16] = [
        Self::InputTemperature,
        Self::InputVoltage,
        Self::InputCurrent,
        Self::InputPower,
        Self::SystemTemperature,
        Self::SystemVoltage,
        Self::SystemCurrent,
        Self::SystemPower,
        Self::BatteryTemperature,
        Self::BatteryVoltage,
        Self::BatteryCurrent,
        Self::BatteryPower,
        Self::BatteryLevel,
        Self::BatteryHealth,
        Self::FanHealth,
        Self::FanSpeed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InputTemperature => "input_temperature",
            Self::InputVoltage => "input_voltage",
            Self::InputCurrent => "input_current",
            Self::InputPower => "input_power",
            Self::SystemTemperature => "system_temperature",
            Self::SystemVoltage => "system_voltage",
            Self::SystemCurrent => "system_current",
            Self::SystemPower => "system_power",
            Self::BatteryTemperature => "battery_temperature",
            Self::BatteryVoltage => "battery_voltage",
            Self::BatteryCurrent => "battery_current",
            Self::BatteryPower => "battery_power",
            Self::BatteryLevel => "battery_level",
            Self::BatteryHealth => "battery_health",
            Self::FanHealth => "fan_health",
            Self::FanSpeed => "fan_speed",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for PowerField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Synchronous access to the power peripheral, one field at a time.
pub trait PowerApi: Send + Sync {
    fn read(&self, field: PowerField) -> Result<f64, PowerError>;
}

/// Reads each field from a configured sysfs attribute (power_supply, hwmon).
pub struct SysfsPowerApi {
    sources: BTreeMap<PowerField, SysfsSource>,
}

impl SysfsPowerApi {
    pub fn new(sources: BTreeMap<PowerField, SysfsSource>) -> Self {
        Self { sources }
    }
}

impl PowerApi for SysfsPowerApi {
    fn read(&self, field: PowerField) -> Result<f64, PowerError> {
        let source = self.sources.get(&field).ok_or(PowerError::NotMapped(field))?;

        let raw = fs::read_to_string(&source.path).map_err(|source_err| PowerError::Io {
            field,
            path: source.path.display().to_string(),
            source: source_err,
        })?;
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(PowerError::Empty(field));
        }

        let value: f64 = raw.parse().map_err(|_| PowerError::InvalidReading {
            field,
            raw: raw.to_string(),
        })?;
        Ok(value * source.scale)
    }
}

/// Last-known-good cell for one field.
#[derive(Debug, Clone, Default)]
pub struct Reading {
    last_good: Option<f64>,
}

impl Reading {
    /// Run `read`; keep and return its value on success, otherwise return
    /// the last good value or zero.
    pub fn refresh<F>(&mut self, field: PowerField, read: F) -> f64
    where
        F: FnOnce() -> Result<f64, PowerError>,
    {
        let outcome = read().and_then(|v| {
            if v.is_finite() {
                Ok(v)
            } else {
                Err(PowerError::Empty(field))
            }
        });

        match outcome {
            Ok(value) => {
                self.last_good = Some(value);
                value
            }
            Err(e) => {
                warn!("Power read failed: {}", e);
                self.last_good.unwrap_or(0.0)
            }
        }
    }

    pub fn last_good(&self) -> Option<f64> {
        self.last_good
    }
}

/// All sixteen power fields, each with independent fallback state.
pub struct PowerStatus {
    api: Box<dyn PowerApi>,
    readings: [Reading; 16],
}

impl PowerStatus {
    pub fn new(api: Box<dyn PowerApi>) -> Self {
        Self {
            api,
            readings: Default::default(),
        }
    }

    /// Read one field from the peripheral, falling back per field.
    pub fn read(&mut self, field: PowerField) -> f64 {
        let api = &self.api;
        self.readings[field.index()].refresh(field, || api.read(field))
    }

    pub fn last_good(&self, field: PowerField) -> Option<f64> {
        self.readings[field.index()].last_good()
    }
}
