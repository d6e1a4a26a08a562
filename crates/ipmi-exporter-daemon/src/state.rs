//! Application state management.

use anyhow::{Context, Result};
use ipmi_exporter_core::{exposition, Collector};
use prometheus::{GaugeVec, Opts, Registry};
use tracing::{debug, info};

use crate::config::Config;

/// State shared by all HTTP handlers.
pub struct AppState {
    collector: Collector,
    /// Metrics that do not change between scrapes.
    static_metrics: Registry,
    metrics_path: String,
}

impl AppState {
    /// Creates the application state from configuration.
    pub fn new(config: &Config) -> Result<Self> {
        let collector = Collector::new(config.ipmi.path.clone(), config.timeout())
            .with_registry(config.registry());

        for sensor in collector.registry().sensors() {
            info!(
                "Raw sensor {} enabled ({} {})",
                sensor.name(),
                config.ipmi.path,
                sensor.command()
            );
        }

        Ok(Self {
            collector,
            static_metrics: build_info_registry().context("Failed to register build info")?,
            metrics_path: config.web.path.clone(),
        })
    }

    /// Returns the path metrics are served under.
    pub fn metrics_path(&self) -> &str {
        &self.metrics_path
    }

    /// Polls ipmitool and renders the text exposition.
    pub async fn scrape(&self) -> ipmi_exporter_core::Result<Vec<u8>> {
        let observations = self.collector.collect().await;
        debug!("Scrape produced {} observations", observations.len());

        let mut families = exposition::gather(&observations)?;
        families.extend(self.static_metrics.gather());
        exposition::encode(&families)
    }
}

/// Registers `ipmi_exporter_build_info{version} 1`.
fn build_info_registry() -> prometheus::Result<Registry> {
    let registry = Registry::new();
    let build_info = GaugeVec::new(
        Opts::new(
            "ipmi_exporter_build_info",
            "A metric with a constant '1' value labeled by the version ipmi_exporter was built from",
        ),
        &["version"],
    )?;
    build_info
        .with_label_values(&[env!("CARGO_PKG_VERSION")])
        .set(1.0);
    registry.register(Box::new(build_info))?;
    Ok(registry)
}
