//! IPMI Exporter
//!
//! Serves BMC sensor readings gathered with ipmitool as Prometheus metrics.

mod config;
mod state;
mod web;

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal::unix::{signal, SignalKind};
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::Config;
use state::AppState;

#[derive(Parser, Debug)]
#[command(name = "ipmi_exporter")]
#[command(about = "Prometheus exporter for IPMI sensor readings")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address on which to expose metrics and web interface
    #[arg(long = "web.listen")]
    listen: Option<String>,

    /// Path under which to expose metrics
    #[arg(long = "web.path")]
    path: Option<String>,

    /// Path to the ipmitool binary
    #[arg(long = "ipmi.path")]
    ipmi_path: Option<String>,

    /// How many milliseconds to allow ipmitool to run before cancelling (zero or negative: no limit)
    #[arg(long = "ipmi.timeout", allow_negative_numbers = true)]
    timeout: Option<i64>,
}

impl Cli {
    /// Overrides configuration values with the flags that were given.
    fn apply(&self, config: &mut Config) {
        if let Some(listen) = &self.listen {
            config.web.listen = listen.clone();
        }
        if let Some(path) = &self.path {
            config.web.path = path.clone();
        }
        if let Some(ipmi_path) = &self.ipmi_path {
            config.ipmi.path = ipmi_path.clone();
        }
        if let Some(timeout) = self.timeout {
            config.ipmi.timeout = timeout;
        }
        config.normalize();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.parse()?))
        .init();

    // Load configuration
    let mut config = match &cli.config {
        Some(path) => {
            let config = Config::load(path).context("Failed to load configuration")?;
            info!("Loaded configuration from: {}", path.display());
            config
        }
        None => Config::default(),
    };
    cli.apply(&mut config);

    info!("Starting IPMI Exporter version {}", env!("CARGO_PKG_VERSION"));

    let state = Arc::new(AppState::new(&config)?);
    let app = web::create_router(state);

    let addr: SocketAddr = config
        .web
        .listen
        .parse()
        .context("Invalid listen address")?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on http://{}{}", addr, config.web.path);

    // Setup Unix signal handlers
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down");
        }
        _ = sigint.recv() => {
            info!("Received SIGINT, shutting down");
        }
    }

    Ok(())
}
