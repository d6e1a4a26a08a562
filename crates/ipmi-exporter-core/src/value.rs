//! Conversion of sensor table rows into numeric readings.

use tracing::error;

use crate::{Error, Result};

/// Value printed by ipmitool for sensors without a reading.
pub const NOT_AVAILABLE: &str = "na";

/// Unit of sensors whose value is a hex event bitmask.
pub const DISCRETE_UNIT: &str = "discrete";

/// One sensor value from a single poll.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    /// Sensor name, unique within one poll.
    pub name: String,
    /// Normalized value, always finite.
    pub value: f64,
    /// Unit as printed by ipmitool (e.g. "degrees C", "discrete").
    pub unit: String,
}

impl Reading {
    /// Creates a reading.
    pub fn new(name: impl Into<String>, value: f64, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value,
            unit: unit.into(),
        }
    }
}

/// Converts a value field to a number according to its unit.
///
/// `"na"` is an absent value and yields 0. Discrete sensors are read as
/// 32-bit hex with an optional `0x` prefix; everything else as decimal.
pub fn convert_value(value: &str, unit: &str) -> Result<f64> {
    if value == NOT_AVAILABLE {
        return Ok(0.0);
    }

    if unit == DISCRETE_UNIT {
        let digits = value.strip_prefix("0x").unwrap_or(value);
        return u32::from_str_radix(digits, 16)
            .map(f64::from)
            .map_err(|source| Error::Hex {
                value: value.to_string(),
                source,
            });
    }

    let parsed: f64 = value.parse().map_err(|source| Error::Decimal {
        value: value.to_string(),
        source,
    })?;
    if !parsed.is_finite() {
        return Err(Error::NotFinite(value.to_string()));
    }
    Ok(parsed)
}

/// Builds a reading from a split row of `name | value | unit | ...`.
///
/// Conversion failures are logged and the reading carries 0.
pub fn convert_row(row: &[String]) -> Reading {
    let field = |i: usize| row.get(i).map(String::as_str).unwrap_or_default();
    let (name, value, unit) = (field(0), field(1), field(2));

    let value = convert_value(value, unit).unwrap_or_else(|e| {
        error!("Could not parse ipmi output for {}: {}", name, e);
        0.0
    });

    Reading::new(name, value, unit)
}

/// Converts every row, in order.
pub fn convert_rows(rows: &[Vec<String>]) -> Vec<Reading> {
    rows.iter().map(|row| convert_row(row)).collect()
}
