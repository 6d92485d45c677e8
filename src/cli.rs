//! CLI argument parsing for hadoop-jmx-exporter
//!
//! This module provides the command-line interface using clap derive macros.
//!
//! # Options
//!
//! - `--config` / `-c`: Configuration file path (default: config.yaml, env: HADOOP_JMX_CONFIG)
//! - `--port` / `-p`: Server port (overrides config file, env: HADOOP_JMX_PORT)
//! - `--bind-address`: Server bind address (env: HADOOP_JMX_BIND_ADDRESS)
//! - `--scrape-path`: Scrape endpoint path (env: HADOOP_JMX_SCRAPE_PATH)
//! - `--fetch-timeout`: Target HTTP timeout in milliseconds (env: HADOOP_JMX_FETCH_TIMEOUT)
//! - `--log-level` / `-l`: Log level (trace/debug/info/warn/error, env: HADOOP_JMX_LOG_LEVEL)
//!
//! # Precedence
//!
//! Configuration values are resolved in the following order (highest to lowest priority):
//! 1. CLI arguments
//! 2. Environment variables
//! 3. Configuration file
//! 4. Default values

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// hadoop-jmx-exporter - Prometheus exporter for Hadoop ecosystem JMX endpoints
///
/// Fetches the /jmx servlet of NameNodes, DataNodes, ResourceManagers and
/// friends on each Prometheus scrape and exports a curated metric set.
///
/// Environment variables can be used for all configuration options.
/// CLI arguments take precedence over environment variables,
/// which take precedence over config file values.
#[derive(Parser, Debug)]
#[command(name = "hadoop-jmx-exporter")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        value_name = "FILE",
        default_value = "config.yaml",
        env = "HADOOP_JMX_CONFIG"
    )]
    pub config: PathBuf,

    /// Server port (overrides config file)
    #[arg(short, long, value_name = "PORT", env = "HADOOP_JMX_PORT")]
    pub port: Option<u16>,

    /// Server bind address (overrides config file)
    /// Supported values: IP addresses (0.0.0.0, 127.0.0.1, ::1) or "localhost"
    #[arg(long, value_name = "ADDRESS", env = "HADOOP_JMX_BIND_ADDRESS")]
    pub bind_address: Option<String>,

    /// Scrape endpoint path (overrides config file)
    /// Must start with '/'
    #[arg(long, value_name = "PATH", env = "HADOOP_JMX_SCRAPE_PATH")]
    pub scrape_path: Option<String>,

    /// Target HTTP timeout in milliseconds (overrides config file)
    #[arg(long, value_name = "MS", env = "HADOOP_JMX_FETCH_TIMEOUT")]
    pub fetch_timeout: Option<u64>,

    /// Log level
    #[arg(
        short,
        long,
        value_enum,
        default_value = "info",
        env = "HADOOP_JMX_LOG_LEVEL"
    )]
    pub log_level: LogLevel,
}

/// Log level options
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// Trace level - most verbose
    Trace,
    /// Debug level
    Debug,
    /// Info level - default
    Info,
    /// Warn level
    Warn,
    /// Error level - least verbose
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_display() {
        assert_eq!(LogLevel::Trace.to_string(), "trace");
        assert_eq!(LogLevel::Debug.to_string(), "debug");
        assert_eq!(LogLevel::Info.to_string(), "info");
        assert_eq!(LogLevel::Warn.to_string(), "warn");
        assert_eq!(LogLevel::Error.to_string(), "error");
    }

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(tracing::Level::from(LogLevel::Trace), tracing::Level::TRACE);
        assert_eq!(tracing::Level::from(LogLevel::Info), tracing::Level::INFO);
        assert_eq!(tracing::Level::from(LogLevel::Error), tracing::Level::ERROR);
    }

    #[test]
    fn test_cli_default_values() {
        let cli = Cli::parse_from(["hadoop-jmx-exporter"]);
        assert_eq!(cli.config, PathBuf::from("config.yaml"));
        assert_eq!(cli.port, None);
        assert_eq!(cli.bind_address, None);
        assert_eq!(cli.scrape_path, None);
        assert_eq!(cli.fetch_timeout, None);
        assert_eq!(cli.log_level, LogLevel::Info);
    }

    #[test]
    fn test_cli_with_options() {
        let cli = Cli::parse_from([
            "hadoop-jmx-exporter",
            "-c",
            "custom.yaml",
            "-p",
            "9170",
            "--log-level",
            "debug",
        ]);
        assert_eq!(cli.config, PathBuf::from("custom.yaml"));
        assert_eq!(cli.port, Some(9170));
        assert_eq!(cli.log_level, LogLevel::Debug);
    }

    #[test]
    fn test_cli_server_overrides() {
        let cli = Cli::parse_from([
            "hadoop-jmx-exporter",
            "--bind-address",
            "127.0.0.1",
            "--scrape-path",
            "/probe",
            "--fetch-timeout",
            "10000",
        ]);
        assert_eq!(cli.bind_address, Some("127.0.0.1".to_string()));
        assert_eq!(cli.scrape_path, Some("/probe".to_string()));
        assert_eq!(cli.fetch_timeout, Some(10000));
    }
}
