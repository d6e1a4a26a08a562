//! Raw sensor table and its enable/disable latch.
//!
//! A raw query that fails once is switched off for the rest of the process
//! lifetime, so boards that do not implement it stop costing a subprocess on
//! every poll. There is no re-probing; only a restart re-enables a sensor.

use std::sync::atomic::{AtomicBool, Ordering};

/// Compiled-in raw queries: PSU input power on Supermicro X8 boards.
const DEFAULT_RAW_SENSORS: [(&str, &str, &str); 2] = [
    ("InputPowerPSU1", "raw 0x06 0x52 0x07 0x78 0x01 0x97", "W"),
    ("InputPowerPSU2", "raw 0x06 0x52 0x07 0x7a 0x01 0x97", "W"),
];

/// One vendor-specific raw query.
#[derive(Debug)]
pub struct RawSensorSpec {
    name: String,
    command: String,
    unit: String,
    enabled: AtomicBool,
}

impl RawSensorSpec {
    /// Creates an enabled raw sensor.
    ///
    /// `command` is the argument suffix passed to ipmitool, e.g.
    /// `"raw 0x06 0x52 0x07 0x78 0x01 0x97"`.
    pub fn new(
        name: impl Into<String>,
        command: impl Into<String>,
        unit: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            unit: unit.into(),
            enabled: AtomicBool::new(true),
        }
    }

    /// Returns the sensor label.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the raw argument suffix.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Returns the arguments appended to the ipmitool binary.
    pub fn args(&self) -> impl Iterator<Item = &str> {
        self.command.split_whitespace()
    }

    /// Returns the unit of the decoded value.
    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// Returns true while the query has not failed.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Switches the query off. Returns true only for the call that did so.
    pub fn disable(&self) -> bool {
        self.enabled.swap(false, Ordering::AcqRel)
    }
}

/// The raw sensors queried on every poll, in a fixed order.
#[derive(Debug)]
pub struct SensorRegistry {
    sensors: Vec<RawSensorSpec>,
}

impl SensorRegistry {
    /// Creates a registry from an explicit sensor list.
    pub fn new(sensors: Vec<RawSensorSpec>) -> Self {
        Self { sensors }
    }

    /// Creates a registry with no raw sensors.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Returns all sensors, enabled or not.
    pub fn sensors(&self) -> &[RawSensorSpec] {
        &self.sensors
    }

    /// Returns the sensors that are still enabled.
    pub fn enabled(&self) -> impl Iterator<Item = &RawSensorSpec> {
        self.sensors.iter().filter(|s| s.is_enabled())
    }

}

impl Default for SensorRegistry {
    fn default() -> Self {
        Self::new(
            DEFAULT_RAW_SENSORS
                .iter()
                .map(|(name, command, unit)| RawSensorSpec::new(*name, *command, *unit))
                .collect(),
        )
    }
}
