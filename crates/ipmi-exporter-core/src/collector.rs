//! Poll cycle: query ipmitool, parse, classify.
//!
//! Each call to [`Collector::collect`] runs the primary sensor query and then
//! every enabled raw query, one after another. No failure aborts the poll; a
//! broken table, a failing command or a bad value only removes or zeroes the
//! affected readings.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::classify::{self, Category, MetricDescriptor, Observation};
use crate::raw::raw_reading;
use crate::registry::SensorRegistry;
use crate::rows::split_output;
use crate::runner::{CommandRunner, ProcessRunner};
use crate::value::{convert_rows, Reading};
use crate::Result;

/// Default ipmitool binary.
pub const DEFAULT_BINARY: &str = "ipmitool";

/// ipmitool subcommand printing the sensor table.
const SENSOR_COMMAND: &str = "sensor";

/// Everything gathered by one poll.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PollResult {
    /// Readings from the sensor table.
    pub readings: Vec<Reading>,
    /// Readings from successful raw queries.
    pub raw_readings: Vec<Reading>,
    /// Total time spent running commands.
    pub exec_time: Duration,
}

impl PollResult {
    /// Classifies every reading and appends the execution time.
    pub fn observations(&self) -> Vec<Observation> {
        let mut observations: Vec<Observation> =
            self.readings.iter().flat_map(classify::classify).collect();
        observations.extend(self.raw_readings.iter().map(classify::classify_raw));
        observations.push(Observation {
            category: Category::ExecTime,
            label: None,
            value: self.exec_time.as_secs_f64() * 1000.0,
        });
        observations
    }
}

/// Parses ipmitool sensor table output into readings.
pub fn parse_sensor_table(output: &[u8]) -> Result<Vec<Reading>> {
    let rows = split_output(output)?;
    Ok(convert_rows(&rows))
}

/// Collects BMC sensor readings through ipmitool.
pub struct Collector {
    runner: Arc<dyn CommandRunner>,
    binary: String,
    timeout: Option<Duration>,
    registry: SensorRegistry,
}

impl Collector {
    /// Creates a collector running `binary` as a child process.
    ///
    /// `binary` is split on whitespace, so wrappers such as
    /// `"sudo ipmitool"` or extra interface flags can be given inline.
    pub fn new(binary: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self {
            runner: Arc::new(ProcessRunner),
            binary: binary.into(),
            timeout,
            registry: SensorRegistry::default(),
        }
    }

    /// Replaces the command runner.
    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Replaces the raw sensor table.
    pub fn with_registry(mut self, registry: SensorRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Returns the raw sensor table and its enable state.
    pub fn registry(&self) -> &SensorRegistry {
        &self.registry
    }

    /// Returns the metric families this collector produces.
    pub fn describe(&self) -> &'static [MetricDescriptor] {
        classify::describe()
    }

    /// Runs a full poll and returns the classified observations.
    pub async fn collect(&self) -> Vec<Observation> {
        self.poll().await.observations()
    }

    /// Runs a full poll.
    pub async fn poll(&self) -> PollResult {
        let primary = self
            .runner
            .run(&self.command_line([SENSOR_COMMAND]), self.timeout)
            .await;
        let mut exec_time = primary.duration;

        if let Some(e) = &primary.error {
            error!("Error while calling ipmitool: {}", e);
        }

        let readings = parse_sensor_table(&primary.stdout).unwrap_or_else(|e| {
            error!("Could not parse ipmi output: {}", e);
            Vec::new()
        });

        let mut raw_readings = Vec::new();
        for sensor in self.registry.enabled() {
            let output = self
                .runner
                .run(&self.command_line(sensor.args()), self.timeout)
                .await;
            exec_time += output.duration;

            if let Some(e) = output.error {
                if sensor.disable() {
                    warn!(
                        "Error detected on querying {} ({}). Disabling this sensor: {}",
                        sensor.name(),
                        sensor.command(),
                        e
                    );
                }
                continue;
            }

            let payload = String::from_utf8_lossy(&output.stdout);
            raw_readings.push(raw_reading(sensor.name(), &payload, sensor.unit()));
        }

        debug!(
            "Poll finished: {} sensor readings, {} raw readings in {:?}",
            readings.len(),
            raw_readings.len(),
            exec_time
        );

        PollResult {
            readings,
            raw_readings,
            exec_time,
        }
    }

    fn command_line<'a>(&'a self, args: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        self.binary
            .split_whitespace()
            .chain(args)
            .map(str::to_string)
            .collect()
    }
}

impl Default for Collector {
    fn default() -> Self {
        Self::new(DEFAULT_BINARY, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RawSensorSpec;
    use crate::runner::CommandOutput;
    use crate::Error;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const SENSOR_TABLE: &[u8] = include_bytes!("../testdata/ipmi_output1.txt");

    #[derive(Clone)]
    struct Response {
        stdout: Vec<u8>,
        fails: bool,
        millis: u64,
    }

    /// Answers command lines from a script and records every call.
    #[derive(Default)]
    struct ScriptedRunner {
        responses: Mutex<HashMap<String, Response>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedRunner {
        fn respond(&self, command: &str, stdout: &[u8], fails: bool, millis: u64) {
            self.responses.lock().unwrap().insert(
                command.to_string(),
                Response {
                    stdout: stdout.to_vec(),
                    fails,
                    millis,
                },
            );
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CommandRunner for ScriptedRunner {
        async fn run(&self, argv: &[String], timeout: Option<Duration>) -> CommandOutput {
            let command = argv.join(" ");
            self.calls.lock().unwrap().push(command.clone());

            let response = self.responses.lock().unwrap().get(&command).cloned();
            let response = response.unwrap_or(Response {
                stdout: Vec::new(),
                fails: true,
                millis: 0,
            });
            CommandOutput {
                stdout: response.stdout,
                duration: Duration::from_millis(response.millis),
                error: response.fails.then(|| Error::Timeout {
                    program: argv[0].clone(),
                    timeout: timeout.unwrap_or_default(),
                }),
            }
        }
    }

    const PSU1: &str = "ipmitool raw 0x06 0x52 0x07 0x78 0x01 0x97";
    const PSU2: &str = "ipmitool raw 0x06 0x52 0x07 0x7a 0x01 0x97";

    fn collector(runner: &Arc<ScriptedRunner>) -> Collector {
        Collector::default().with_runner(runner.clone())
    }

    fn find<'a>(obs: &'a [Observation], category: Category, label: &str) -> Option<&'a Observation> {
        obs.iter()
            .find(|o| o.category == category && o.label.as_deref() == Some(label))
    }

    #[tokio::test]
    async fn test_poll_parses_sensor_table() {
        let runner = Arc::new(ScriptedRunner::default());
        runner.respond("ipmitool sensor", SENSOR_TABLE, false, 0);
        runner.respond(PSU1, b" 9a\n", false, 0);
        runner.respond(PSU2, b" 01 2c\n", false, 0);

        let result = collector(&runner).poll().await;
        assert_eq!(result.readings.len(), 18);
        assert_eq!(result.readings[4].name, "DIMM Temp2");
        assert_eq!(result.readings[4].value, 0.0);
        assert_eq!(
            result.raw_readings,
            vec![
                Reading::new("InputPowerPSU1", 154.0, "W"),
                Reading::new("InputPowerPSU2", 300.0, "W"),
            ]
        );

        let obs = result.observations();
        assert_eq!(find(&obs, Category::Temperature, "CPU2 Temp").unwrap().value, 36.0);
        assert_eq!(find(&obs, Category::FanSpeed, "FAN1").unwrap().value, 3375.0);
        assert_eq!(find(&obs, Category::Voltage, "12V").unwrap().value, 12.192);
        assert_eq!(find(&obs, Category::Current, "PS1 Current").unwrap().value, 1.4);
        assert_eq!(find(&obs, Category::Power, "PS1 Power").unwrap().value, 168.0);
        assert_eq!(
            find(&obs, Category::PowerSupplyStatus, "PS2 Status").unwrap().value,
            9.0
        );
        assert_eq!(find(&obs, Category::Power, "InputPowerPSU2").unwrap().value, 300.0);

        let intrusion: Vec<&Observation> = obs
            .iter()
            .filter(|o| o.category == Category::Intrusion)
            .collect();
        assert_eq!(intrusion.len(), 1);
        assert_eq!(intrusion[0].label, None);

        assert!(obs.iter().all(|o| o.label.as_deref() != Some("Watchdog2")));
    }

    #[tokio::test]
    async fn test_exec_time_sums_all_commands() {
        let runner = Arc::new(ScriptedRunner::default());
        runner.respond("ipmitool sensor", SENSOR_TABLE, false, 100);
        runner.respond(PSU1, b"10", false, 20);
        runner.respond(PSU2, b"20", true, 30);

        let result = collector(&runner).poll().await;
        assert_eq!(result.exec_time, Duration::from_millis(150));

        let obs = result.observations();
        let exec = obs.last().unwrap();
        assert_eq!(exec.category, Category::ExecTime);
        assert!((exec.value - 150.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_failed_raw_sensor_stays_disabled() {
        let runner = Arc::new(ScriptedRunner::default());
        runner.respond("ipmitool sensor", SENSOR_TABLE, false, 0);
        runner.respond(PSU1, b"", true, 0);
        runner.respond(PSU2, b"20", false, 0);
        let collector = collector(&runner);

        let first = collector.poll().await;
        assert_eq!(first.raw_readings.len(), 1);
        assert_eq!(first.raw_readings[0].name, "InputPowerPSU2");
        assert!(!collector.registry().sensors()[0].is_enabled());

        // The query would now succeed, but the sensor is never asked again.
        runner.respond(PSU1, b"10", false, 0);
        for _ in 0..3 {
            let obs = collector.collect().await;
            assert!(find(&obs, Category::Power, "InputPowerPSU1").is_none());
            assert!(find(&obs, Category::Power, "InputPowerPSU2").is_some());
        }

        let psu1_calls = runner.calls().iter().filter(|c| c.as_str() == PSU1).count();
        assert_eq!(psu1_calls, 1);
    }

    #[tokio::test]
    async fn test_broken_table_keeps_raw_readings() {
        let runner = Arc::new(ScriptedRunner::default());
        runner.respond("ipmitool sensor", b"FAN1 | 3400 | RPM\n\"FAN2 | 1 | RPM\n", false, 0);
        runner.respond(PSU1, b"10", false, 0);
        runner.respond(PSU2, b"20", false, 0);

        let result = collector(&runner).poll().await;
        assert!(result.readings.is_empty());
        assert_eq!(result.raw_readings.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_sensor_query_uses_partial_output() {
        let runner = Arc::new(ScriptedRunner::default());
        runner.respond("ipmitool sensor", b"FAN1 | 3400 | RPM | ok\n", true, 0);

        let collector = collector(&runner).with_registry(SensorRegistry::empty());
        let obs = collector.collect().await;
        assert_eq!(find(&obs, Category::FanSpeed, "FAN1").unwrap().value, 3400.0);
        assert_eq!(runner.calls(), vec!["ipmitool sensor"]);
    }

    #[tokio::test]
    async fn test_binary_with_arguments() {
        let runner = Arc::new(ScriptedRunner::default());
        let collector = Collector::new("sudo ipmitool -I open", None)
            .with_runner(runner.clone())
            .with_registry(SensorRegistry::new(vec![RawSensorSpec::new(
                "PSU",
                "raw 0x01",
                "W",
            )]));

        collector.poll().await;
        assert_eq!(
            runner.calls(),
            vec!["sudo ipmitool -I open sensor", "sudo ipmitool -I open raw 0x01"]
        );
    }

    #[test]
    fn test_parse_is_repeatable() {
        let first = parse_sensor_table(SENSOR_TABLE).unwrap();
        let second = parse_sensor_table(SENSOR_TABLE).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_describe_is_fixed() {
        let names: Vec<String> = Collector::default()
            .describe()
            .iter()
            .map(|d| d.full_name())
            .collect();
        assert_eq!(
            names,
            vec![
                "ipmi_temperatures",
                "ipmi_fan_speed",
                "ipmi_voltages",
                "ipmi_current",
                "ipmi_intrusion_status",
                "ipmi_power_supply_status",
                "ipmi_exec_time",
            ]
        );
    }
}
