//! Error types for hadoop-jmx-exporter
//!
//! This module defines the error types used throughout the application.

use thiserror::Error;

/// Scrape parameter and authentication setup errors
///
/// Raised before any network activity takes place.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    /// Remote target requested without a usable authentication method
    #[error("Unsupported auth method: remote targets require a Kerberos principal with a password or keytab")]
    UnsupportedAuthMethod,

    /// Principal does not split into `user@REALM`
    #[error("Invalid Kerberos principal '{0}': expected exactly one '@' separating user and realm")]
    InvalidPrincipal(String),
}

/// Errors raised while fetching a JMX dump from a target
#[derive(Error, Debug)]
pub enum FetchError {
    /// Parameter validation failed before the request was built
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Target URL could not be parsed or has no host component
    #[error("Invalid target URL: {0}")]
    InvalidUrl(String),

    /// HTTP client initialization failed
    #[error("Failed to initialize HTTP client: {0}")]
    ClientInit(#[source] reqwest::Error),

    /// Kerberos realm configuration could not be loaded
    #[error("Failed to load Kerberos realm configuration: {0}")]
    RealmConfig(String),

    /// Kerberos login failed
    #[error("Kerberos login failed: {0}")]
    Login(String),

    /// SPNEGO context negotiation failed
    #[error("SPNEGO negotiation failed: {0}")]
    Negotiation(String),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Transport(#[source] reqwest::Error),

    /// HTTP response body could not be read
    #[error("Failed to read HTTP response body: {0}")]
    Body(#[source] reqwest::Error),
}

/// Errors raised while deciding which service produced a JMX dump
#[derive(Error, Debug)]
pub enum ResolutionError {
    /// Body is not valid JSON
    #[error("Response body is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    /// Top-level `beans` array is missing
    #[error("JMX dump has no top-level 'beans' array")]
    MissingBeans,

    /// A bean carries the service prefix but not the expected name shape
    #[error("Unrecognized JMX bean name '{0}'")]
    UnknownJmxSchema(String),
}

/// Errors raised while mapping bean fields into gauges
#[derive(Error, Debug)]
pub enum MappingError {
    /// Expected attribute is absent from the bean
    #[error("Bean attribute '{attribute}' is missing")]
    MissingField { attribute: String },

    /// Attribute exists but is not numeric
    #[error("Bean attribute '{attribute}' is not a number")]
    WrongType { attribute: String },

    /// Typed decode of the bean failed
    #[error("Failed to decode bean: {0}")]
    Decode(String),

    /// Gauge construction or registration failed
    #[error("Metric registration failed: {0}")]
    Registry(#[from] prometheus::Error),
}

/// Handler-level union of everything that can go wrong during one scrape
///
/// Every variant degrades the scrape to `hadoop_jmx_export_success 0`;
/// none of them surface as an HTTP error status.
#[derive(Error, Debug)]
pub enum ScrapeError {
    /// Fetch stage failed
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Resolution stage failed
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// Dump resolved to a service with no registered mapping, or to none at all
    #[error("No metric mapping registered for the resolved service")]
    UnknownService,

    /// Mapping stage failed beyond per-bean recovery
    #[error(transparent)]
    Mapping(#[from] MappingError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_messages() {
        let err = ConfigurationError::UnsupportedAuthMethod;
        assert!(err.to_string().contains("Unsupported auth method"));

        let err = ConfigurationError::InvalidPrincipal("hdfs".to_string());
        assert!(err.to_string().contains("hdfs"));
    }

    #[test]
    fn test_configuration_error_converts_to_fetch_error() {
        let err: FetchError = ConfigurationError::UnsupportedAuthMethod.into();
        assert!(matches!(err, FetchError::Configuration(_)));
    }

    #[test]
    fn test_scrape_error_from_fetch() {
        let err: ScrapeError = FetchError::InvalidUrl("not a url".to_string()).into();
        assert!(matches!(err, ScrapeError::Fetch(_)));
    }
}
