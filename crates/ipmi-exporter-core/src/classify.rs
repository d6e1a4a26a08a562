//! Mapping of readings onto metric categories.

use crate::value::Reading;

/// Prefix of every exported metric name.
pub const NAMESPACE: &str = "ipmi";

/// Marker that starts a power supply status name ("PS1 Status").
const PSU_STATUS_PREFIX: &str = "PS";

/// Marker that follows it somewhere later in the name.
const PSU_STATUS_SUFFIX: &str = " Status";

/// Name suffix of the chassis intrusion sensor.
const INTRUSION_SUFFIX: &str = "Chassis Intru";

/// Metric category a reading is exported under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Temperature,
    FanSpeed,
    Voltage,
    Current,
    /// Power draw in watts. Shares the power supply family.
    Power,
    /// Status code of a power supply, labelled by sensor name.
    PowerSupplyStatus,
    Intrusion,
    /// Time spent running ipmitool during one poll, in milliseconds.
    ExecTime,
}

impl Category {
    /// Returns the metric family this category is exported as.
    pub fn descriptor(self) -> &'static MetricDescriptor {
        let index = match self {
            Category::Temperature => 0,
            Category::FanSpeed => 1,
            Category::Voltage => 2,
            Category::Current => 3,
            Category::Intrusion => 4,
            Category::Power | Category::PowerSupplyStatus => 5,
            Category::ExecTime => 6,
        };
        &DESCRIPTORS[index]
    }

    /// Returns the category for a unit string, ignoring case.
    pub fn from_unit(unit: &str) -> Option<Self> {
        match unit.to_lowercase().as_str() {
            "degrees c" => Some(Category::Temperature),
            "volts" => Some(Category::Voltage),
            "rpm" => Some(Category::FanSpeed),
            "watts" => Some(Category::Power),
            "amps" => Some(Category::Current),
            _ => None,
        }
    }
}

/// Static description of one exported metric family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricDescriptor {
    /// Name without the namespace prefix.
    pub name: &'static str,
    pub help: &'static str,
    /// Label key, if the family is labelled.
    pub label: Option<&'static str>,
}

impl MetricDescriptor {
    /// Returns the namespaced metric name.
    pub fn full_name(&self) -> String {
        format!("{}_{}", NAMESPACE, self.name)
    }
}

static DESCRIPTORS: [MetricDescriptor; 7] = [
    MetricDescriptor {
        name: "temperatures",
        help: "Contains the collected temperatures from IPMI",
        label: Some("sensor"),
    },
    MetricDescriptor {
        name: "fan_speed",
        help: "Fan Speed in RPM",
        label: Some("fan"),
    },
    MetricDescriptor {
        name: "voltages",
        help: "Contains the voltages from IPMI",
        label: Some("sensor"),
    },
    MetricDescriptor {
        name: "current",
        help: "Contains the current from IPMI",
        label: Some("sensor"),
    },
    MetricDescriptor {
        name: "intrusion_status",
        help: "Indicates if a chassis is open",
        label: None,
    },
    MetricDescriptor {
        name: "power_supply_status",
        help: "Indicates if a power supply is operational",
        label: Some("PSU"),
    },
    MetricDescriptor {
        name: "exec_time",
        help: "How much time in milliseconds was spent executing ipmitool",
        label: None,
    },
];

/// Returns every metric family the exporter can produce.
pub fn describe() -> &'static [MetricDescriptor] {
    &DESCRIPTORS
}

/// One value ready for exposition.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub category: Category,
    /// Label value, present when the category's family is labelled.
    pub label: Option<String>,
    pub value: f64,
}

impl Observation {
    /// Creates an observation, labelling it with `name` if the family has a label.
    pub fn new(category: Category, name: &str, value: f64) -> Self {
        let label = category.descriptor().label.map(|_| name.to_string());
        Self {
            category,
            label,
            value,
        }
    }
}

/// Returns true when "PS" is followed somewhere later by " Status".
///
/// Matches anywhere in the name: "PS1 Status", "CPU PS1 Status" and
/// "PS1 Status Fault" all count.
pub fn is_power_supply_status(name: &str) -> bool {
    name.find(PSU_STATUS_PREFIX)
        .is_some_and(|i| name[i + PSU_STATUS_PREFIX.len()..].contains(PSU_STATUS_SUFFIX))
}

/// Returns true for the chassis intrusion sensor.
pub fn is_chassis_intrusion(name: &str) -> bool {
    name.ends_with(INTRUSION_SUFFIX)
}

/// Classifies a sensor table reading.
///
/// The unit rule and both name rules apply independently, so one reading
/// can produce zero, one or several observations.
pub fn classify(reading: &Reading) -> Vec<Observation> {
    let mut observations = Vec::new();

    if let Some(category) = Category::from_unit(&reading.unit) {
        observations.push(Observation::new(category, &reading.name, reading.value));
    }
    if is_power_supply_status(&reading.name) {
        observations.push(Observation::new(
            Category::PowerSupplyStatus,
            &reading.name,
            reading.value,
        ));
    }
    if is_chassis_intrusion(&reading.name) {
        observations.push(Observation::new(
            Category::Intrusion,
            &reading.name,
            reading.value,
        ));
    }

    observations
}

/// Classifies a raw query reading. Raw sensors all report power.
pub fn classify_raw(reading: &Reading) -> Observation {
    Observation::new(Category::Power, &reading.name, reading.value)
}
