//! Error types for the IPMI exporter core.

use std::num::{ParseFloatError, ParseIntError};
use std::process::ExitStatus;
use std::time::Duration;
use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while querying and parsing sensor data.
#[derive(Error, Debug)]
pub enum Error {
    /// The command line to run had no program.
    #[error("Empty command line")]
    EmptyCommand,

    /// The sensor-query binary could not be started.
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The command did not finish within the configured timeout.
    #[error("{program} did not finish within {timeout:?}")]
    Timeout { program: String, timeout: Duration },

    /// The command exited unsuccessfully.
    #[error("{program} exited with {status}: {stderr}")]
    ExitStatus {
        program: String,
        status: ExitStatus,
        stderr: String,
    },

    /// The sensor table could not be read as pipe-delimited text.
    #[error("Malformed sensor output: {0}")]
    Csv(#[from] csv::Error),

    /// A sensor row did not carry name, value and unit.
    #[error("Sensor row {line} has {fields} fields, expected at least 3")]
    ShortRow { line: u64, fields: usize },

    /// A quoted field was never closed.
    #[error("Malformed sensor output: unterminated quoted field")]
    UnterminatedQuote,

    /// A discrete sensor value is not a hex number.
    #[error("Could not translate hex {value:?}: {source}")]
    Hex {
        value: String,
        #[source]
        source: ParseIntError,
    },

    /// An analog sensor value is not a decimal number.
    #[error("Could not parse {value:?} as a number: {source}")]
    Decimal {
        value: String,
        #[source]
        source: ParseFloatError,
    },

    /// An analog sensor value parsed to infinity or NaN.
    #[error("Sensor value {0:?} is not finite")]
    NotFinite(String),

    /// A raw response contains characters other than hex digits.
    #[error("Raw payload {0:?} is not hex")]
    RawPayload(String),

    /// A raw response does not fit in 8 bytes.
    #[error("Raw payload {0:?} is longer than 8 bytes")]
    RawPayloadTooLong(String),

    /// Metrics could not be registered or encoded.
    #[error("Prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}
