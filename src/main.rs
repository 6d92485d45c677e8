//! hadoop-jmx-exporter - Prometheus exporter for Hadoop ecosystem services
//!
//! This binary serves a multi-target scrape endpoint that fetches the
//! /jmx servlet of the requested service and exports curated metrics.

use anyhow::Result;
use clap::Parser;
use tracing::info;

use hadoop_jmx_exporter::{cli::Cli, config::Config, server};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Cli::parse();

    // Initialize logging
    hadoop_jmx_exporter::init_logging(&args.log_level.to_string())?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting hadoop-jmx-exporter"
    );

    // Load configuration and apply CLI overrides
    let mut config = Config::load_or_default(&args.config)?;
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(bind_address) = args.bind_address {
        config.server.bind_address = bind_address;
    }
    if let Some(path) = args.scrape_path {
        config.server.path = path;
    }
    if let Some(timeout_ms) = args.fetch_timeout {
        config.fetch.timeout_ms = timeout_ms;
    }

    // Start server
    server::run(config).await?;

    Ok(())
}
