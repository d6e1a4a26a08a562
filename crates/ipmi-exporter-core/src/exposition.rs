//! Conversion of observations into the Prometheus text format.
//!
//! Every scrape gets a fresh registry holding only the families that have
//! observations in this poll, so sensors that vanish between polls vanish
//! from the output too.

use prometheus::proto::MetricFamily;
use prometheus::{Encoder, Gauge, GaugeVec, Opts, Registry, TextEncoder};
use std::collections::hash_map::{Entry, HashMap};

use crate::classify::{MetricDescriptor, Observation, NAMESPACE};
use crate::Result;

/// A registered gauge family.
enum Family {
    Labelled(GaugeVec),
    Plain(Gauge),
}

impl Family {
    fn register(descriptor: &MetricDescriptor, registry: &Registry) -> Result<Self> {
        let opts = Opts::new(descriptor.name, descriptor.help).namespace(NAMESPACE);
        let family = match descriptor.label {
            Some(label) => {
                let vec = GaugeVec::new(opts, &[label])?;
                registry.register(Box::new(vec.clone()))?;
                Family::Labelled(vec)
            }
            None => {
                let gauge = Gauge::with_opts(opts)?;
                registry.register(Box::new(gauge.clone()))?;
                Family::Plain(gauge)
            }
        };
        Ok(family)
    }

    fn set(&self, observation: &Observation) {
        match self {
            Family::Labelled(vec) => {
                let label = observation.label.as_deref().unwrap_or_default();
                vec.with_label_values(&[label]).set(observation.value);
            }
            Family::Plain(gauge) => gauge.set(observation.value),
        }
    }
}

/// Turns one poll's observations into metric families.
///
/// A repeated family and label value keeps the last observation.
pub fn gather(observations: &[Observation]) -> Result<Vec<MetricFamily>> {
    let registry = Registry::new();
    let mut families: HashMap<&'static str, Family> = HashMap::new();

    for observation in observations {
        let descriptor = observation.category.descriptor();
        let family = match families.entry(descriptor.name) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                entry.insert(Family::register(descriptor, &registry)?)
            }
        };
        family.set(observation);
    }

    Ok(registry.gather())
}

/// Encodes metric families in the text exposition format.
pub fn encode(families: &[MetricFamily]) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(families, &mut buffer)?;
    Ok(buffer)
}

/// Content type of [`encode`]'s output.
pub fn content_type() -> String {
    TextEncoder::new().format_type().to_string()
}
