//! IPMI Exporter Core
//!
//! Turns `ipmitool` output into Prometheus metrics: runs the sensor query,
//! splits and normalizes the pipe-delimited table, decodes vendor raw
//! queries, classifies readings into metric families and encodes them.

pub mod classify;
pub mod collector;
pub mod error;
pub mod exposition;
pub mod raw;
pub mod registry;
pub mod rows;
pub mod runner;
pub mod value;

pub use classify::{Category, MetricDescriptor, Observation};
pub use collector::{parse_sensor_table, Collector, PollResult};
pub use error::{Error, Result};
pub use registry::{RawSensorSpec, SensorRegistry};
pub use runner::{CommandOutput, CommandRunner, ProcessRunner};
pub use value::Reading;
